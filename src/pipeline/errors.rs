//! Structured spec diagnostics: code, JSON pointer, message and hint.

use serde::Serialize;
use thiserror::Error;

use super::error_code::ErrorCode;

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("[{code}] {path}: {message}")]
pub struct SpecError {
    pub code: ErrorCode,
    /// JSON pointer to the offending field, e.g. `/survival/alpha`
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl SpecError {
    pub fn new(code: ErrorCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
