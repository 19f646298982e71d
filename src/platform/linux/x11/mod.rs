//! X11 implementation using X Record.

mod listen;

pub use listen::{BACKEND, run_tap, stop_tap};
