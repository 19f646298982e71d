//! Error types for the hook library.

use thiserror::Error;

/// Result type alias for keytap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by starting a session, registering hotkeys, or configuring the hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The platform has no usable tap (e.g. a Wayland session).
    #[error("not supported: {0}")]
    Unsupported(String),

    /// The OS refused to install the hook.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// `start` was called while a session is starting or stopping.
    #[error("hook is already running")]
    AlreadyRunning,

    /// A key name is not in the keycode directory.
    #[error("unknown key: {0:?}")]
    UnknownKey(String),

    /// A hotkey pattern does not name exactly one primary key.
    #[error("invalid hotkey pattern: {0}")]
    InvalidPattern(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected platform failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build an [`Error::Internal`] that carries an OS error code.
    pub fn os(context: &str, code: i64) -> Self {
        Error::Internal(format!("{context} (os error {code})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_error_includes_code() {
        let err = Error::os("SetWindowsHookExW failed", 5);
        assert_eq!(
            err.to_string(),
            "internal error: SetWindowsHookExW failed (os error 5)"
        );
    }

    #[test]
    fn test_unknown_key_message_quotes_name() {
        let err = Error::UnknownKey("not-a-key".into());
        assert_eq!(err.to_string(), "unknown key: \"not-a-key\"");
    }
}
