//! Stable error codes for analysis spec diagnostics.
//!
//! Codes are part of the JSON output of `tidysurv validate`; rename with care.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// `v` is not a supported spec version.
    UnsupportedVersion,
    /// Neither a `text` nor a `survival` section is present.
    MissingSection,
    /// A required field is empty.
    MissingField,
    /// A value is out of range or malformed.
    InvalidValue,
    /// Two settings contradict each other.
    InvalidCombo,
    /// A field is not part of the schema.
    UnknownField,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedVersion => "unsupported_version",
            Self::MissingSection => "missing_section",
            Self::MissingField => "missing_field",
            Self::InvalidValue => "invalid_value",
            Self::InvalidCombo => "invalid_combo",
            Self::UnknownField => "unknown_field",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
