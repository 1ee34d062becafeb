//! CRC-CCITT
//!
//! Polynomial 0x1021, seed 0xFFFF, MSB-first, no final xor
//! (the "CCITT-FALSE" variant). Check value for `b"123456789"` is 0x29B1.

const POLYNOMIAL: u16 = 0x1021;

/// Initial register value
pub const CRC_SEED: u16 = 0xFFFF;

static CRC_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the CRC of `bytes`
pub fn compute_crc(bytes: &[u8]) -> u16 {
    bytes.iter().fold(CRC_SEED, |crc, &byte| {
        (crc << 8) ^ CRC_TABLE[((crc >> 8) as u8 ^ byte) as usize]
    })
}
