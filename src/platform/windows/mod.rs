//! Windows implementation using low-level keyboard and mouse hooks.

mod keycodes;
mod listen;

pub use listen::{BACKEND, run_tap, stop_tap};
