//! Integer status codes reported by the native mesh library.
//!
//! [`ErrorCode`] wraps the raw `i32` returned by every native entry point.
//! `NOERR` (0) is success; every other value is a failure. The well-known
//! codes are named constants so callers can match on them, but any value the
//! library produces is representable.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Status code returned by a native mesh library call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i32);

/// Result alias used by every layer below the dataset orchestrator.
pub type ApiResult<T> = Result<T, ErrorCode>;

impl ErrorCode {
    /// Success.
    pub const NOERR: ErrorCode = ErrorCode(0);
    /// Uncategorized failure, also used for caught panics, an uninitialized
    /// API and a dead worker process.
    pub const GENERAL_FATAL_ERR: ErrorCode = ErrorCode(-1000);
    /// A caller-provided buffer did not match the requested element count.
    pub const GENERAL_ARRAY_LENGTH_FATAL_ERR: ErrorCode = ErrorCode(-1001);
    /// Reserved for fault injection in tests.
    pub const TESTING_ERROR: ErrorCode = ErrorCode(-1234);

    // ── library codes ──────────────────────────────────────────

    /// The dataset handle is stale or was never issued.
    pub const IONC_EBADID: ErrorCode = ErrorCode(-2001);
    /// The dataset file could not be opened.
    pub const IONC_ENOPEN: ErrorCode = ErrorCode(-2002);
    /// Allocation failure inside the library.
    pub const IONC_ENOMEM: ErrorCode = ErrorCode(-2003);
    /// The dataset does not follow a supported convention.
    pub const IONC_ENONCOMPLIANT: ErrorCode = ErrorCode(-2004);
    /// The requested entity is not available in the dataset.
    pub const IONC_ENOTAVAILABLE: ErrorCode = ErrorCode(-2005);
    /// A required attribute is missing.
    pub const IONC_ENOTATT: ErrorCode = ErrorCode(-2006);
    /// A required dimension is missing.
    pub const IONC_ENOTDIM: ErrorCode = ErrorCode(-2007);
    /// A required variable is missing.
    pub const IONC_ENOTVAR: ErrorCode = ErrorCode(-2008);
    /// A write was attempted on a dataset opened read-only.
    pub const IONC_EREADONLY: ErrorCode = ErrorCode(-2009);
    /// The mesh id is out of range for the dataset.
    pub const IONC_EBADMESH: ErrorCode = ErrorCode(-2010);
    /// Persisting the dataset to disk failed.
    pub const IONC_EWRITE: ErrorCode = ErrorCode(-2011);

    /// Convert a raw native return value into a `Result`.
    pub fn check(raw: i32) -> ApiResult<()> {
        if raw == 0 {
            Ok(())
        } else {
            Err(ErrorCode(raw))
        }
    }

    /// The raw integer value.
    pub fn code(self) -> i32 {
        self.0
    }

    /// Whether this code denotes success.
    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Symbolic name for well-known codes.
    pub fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "NOERR",
            -1000 => "GENERAL_FATAL_ERR",
            -1001 => "GENERAL_ARRAY_LENGTH_FATAL_ERR",
            -1234 => "TESTING_ERROR",
            -2001 => "IONC_EBADID",
            -2002 => "IONC_ENOPEN",
            -2003 => "IONC_ENOMEM",
            -2004 => "IONC_ENONCOMPLIANT",
            -2005 => "IONC_ENOTAVAILABLE",
            -2006 => "IONC_ENOTATT",
            -2007 => "IONC_ENOTDIM",
            -2008 => "IONC_ENOTVAR",
            -2009 => "IONC_EREADONLY",
            -2010 => "IONC_EBADMESH",
            -2011 => "IONC_EWRITE",
            _ => return None,
        };
        Some(name)
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> i32 {
        code.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.0),
            None => write!(f, "error code {}", self.0),
        }
    }
}

impl Error for ErrorCode {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_values_are_stable() {
        assert_eq!(ErrorCode::NOERR.code(), 0);
        assert_eq!(ErrorCode::GENERAL_FATAL_ERR.code(), -1000);
        assert_eq!(ErrorCode::GENERAL_ARRAY_LENGTH_FATAL_ERR.code(), -1001);
        assert_eq!(ErrorCode::IONC_EBADID.code(), -2001);
    }

    #[test]
    fn check_maps_zero_to_ok() {
        assert_eq!(ErrorCode::check(0), Ok(()));
        assert_eq!(ErrorCode::check(-1000), Err(ErrorCode::GENERAL_FATAL_ERR));
        assert_eq!(ErrorCode::check(17), Err(ErrorCode(17)));
    }

    #[test]
    fn display_names_known_codes() {
        assert_eq!(
            ErrorCode::GENERAL_FATAL_ERR.to_string(),
            "GENERAL_FATAL_ERR (-1000)"
        );
        assert_eq!(ErrorCode(-7).to_string(), "error code -7");
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&ErrorCode::IONC_ENOTVAR).unwrap();
        assert_eq!(json, "-2008");
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorCode::IONC_ENOTVAR);
    }
}
