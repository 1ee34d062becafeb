//! Simulation Module
//!
//! An in-process control board for tests and dry runs.
//!
//! ## Pieces
//! - `SimulatedBoard`: parses requests, keeps key/unit-info state, builds
//!   ack and response frames, and can be told to misbehave (`Faults`)
//! - `SimulatedTransport`: a `Transport` whose far end is the board
//! - `BoardHandle`: test-side control of a board behind a running pump

mod board;
mod transport;

pub use board::{BoardState, Faults, SimulatedBoard};
pub use transport::{BoardHandle, SimulatedTransport};
