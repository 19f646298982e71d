//! Linux platform implementation.
//!
//! Input is captured with the X Record extension (`x11` feature, on by default).
//! Wayland sessions are not supported.

#[cfg(feature = "x11")]
mod keycodes;

#[cfg(feature = "x11")]
mod x11;

#[cfg(feature = "x11")]
pub use x11::*;

#[cfg(not(feature = "x11"))]
mod stub {
    use crate::error::{Error, Result};
    use crate::hook::TapSink;
    use std::sync::Arc;

    pub const BACKEND: &str = "none";

    pub fn run_tap(_sink: Arc<TapSink>) -> Result<()> {
        Err(Error::Unsupported(
            "no Linux backend enabled, build with the 'x11' feature".into(),
        ))
    }

    pub fn stop_tap() {}
}

#[cfg(not(feature = "x11"))]
pub use stub::*;
