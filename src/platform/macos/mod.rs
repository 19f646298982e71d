//! macOS implementation using a Quartz event tap.

mod keycodes;
mod listen;

pub use listen::{BACKEND, run_tap, stop_tap};
