//! Device Transport
//!
//! Reads and writes a character device opened as a file.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Result;
use super::{idle_read, open_error, Transport};

/// A UART character device
///
/// The device is expected to be in raw mode with a read timeout (`VTIME`),
/// e.g. `stty -F /dev/ttyS0 115200 raw min 0 time 1`, so reads return
/// `Ok(0)` when the line is idle. A read that returns nothing straight away
/// is padded out to the idle wait so the pump does not spin.
///
/// Without `VTIME` a tty read blocks until a byte arrives, and the pump can
/// only notice `stop()` once the board sends something.
pub struct DeviceTransport {
    path: PathBuf,
    file: File,
    idle_wait: Duration,
    char_device: bool,
}

impl DeviceTransport {
    pub fn open(path: impl AsRef<Path>, idle_wait: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| open_error(&path.display().to_string(), e))?;

        let char_device = is_char_device(&file);
        if char_device {
            tracing::warn!(
                "{} must be in raw mode with a read timeout (stty raw min 0 time 1); \
                 without VTIME reads block and stop() waits for the next byte",
                path.display()
            );
        }

        Ok(Self {
            path,
            file,
            idle_wait,
            char_device,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True for a tty or other character device, false for a plain file
    pub fn is_char_device(&self) -> bool {
        self.char_device
    }
}

impl Transport for DeviceTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let started = Instant::now();
        let n = idle_read(self.file.read(buf))?;
        if n == 0 {
            let elapsed = started.elapsed();
            if elapsed < self.idle_wait {
                thread::sleep(self.idle_wait - elapsed);
            }
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        self.file.flush()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(unix)]
fn is_char_device(file: &File) -> bool {
    use std::os::unix::fs::FileTypeExt;
    file.metadata()
        .map(|m| m.file_type().is_char_device())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_char_device(_file: &File) -> bool {
    false
}
