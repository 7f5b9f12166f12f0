//! Grepable error codes shared by every error enum in the crate.
//!
//! Hosts print `[CODE] message` so a failing flow file or a rejected
//! caller action can be found in logs without parsing prose.

/// Grepable error code for structured error reporting.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

/// Render an error as `[CODE] message`.
#[must_use]
pub fn describe(err: &(impl ErrorCode + ?Sized)) -> String {
    format!("[{}] {err}", err.error_code())
}
