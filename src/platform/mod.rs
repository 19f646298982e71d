//! Platform-specific taps.
//!
//! Every backend exposes the same three items: `BACKEND`, `run_tap` and `stop_tap`.

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub use macos::*;

#[cfg(target_os = "windows")]
mod windows;
#[cfg(target_os = "windows")]
pub use windows::*;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::*;

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
mod stub {
    use crate::error::{Error, Result};
    use crate::hook::TapSink;
    use std::sync::Arc;

    pub const BACKEND: &str = "unsupported";

    pub fn run_tap(_sink: Arc<TapSink>) -> Result<()> {
        Err(Error::Unsupported(format!(
            "no input hook for {}",
            std::env::consts::OS
        )))
    }

    pub fn stop_tap() {}
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
pub use stub::*;
