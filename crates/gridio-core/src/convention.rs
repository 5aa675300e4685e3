//! File conventions and their versions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Minimum UGRID version the access layer supports.
pub const UG_CONV_MIN_VERSION: f64 = 1.0;

/// Metadata convention a dataset file declares.
///
/// Discriminants match the native library's integer encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Convention {
    /// No convention could be determined (or nothing is open).
    Null = 0,
    /// Climate and Forecast conventions without mesh topology.
    Cf = 1,
    /// UGRID unstructured grid conventions.
    Ugrid = 2,
    /// SGRID staggered grid conventions.
    Sgrid = 3,
    /// A convention the library does not support.
    Other = -99,
    /// Reserved for tests.
    Test = -111,
}

impl Convention {
    /// Integer encoding used by the native library.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Decode the native integer encoding.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Null),
            1 => Some(Self::Cf),
            2 => Some(Self::Ugrid),
            3 => Some(Self::Sgrid),
            -99 => Some(Self::Other),
            -111 => Some(Self::Test),
            _ => None,
        }
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "NULL",
            Self::Cf => "CF",
            Self::Ugrid => "UGRID",
            Self::Sgrid => "SGRID",
            Self::Other => "OTHER",
            Self::Test => "TEST",
        };
        f.write_str(name)
    }
}

/// Convention and version of one dataset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConventionInfo {
    /// Declared convention.
    pub convention: Convention,
    /// Declared convention version.
    pub version: f64,
}

impl ConventionInfo {
    /// Info for a dataset whose convention is unknown.
    pub const NULL: ConventionInfo = ConventionInfo {
        convention: Convention::Null,
        version: 0.0,
    };

    /// Construct from parts.
    pub fn new(convention: Convention, version: f64) -> Self {
        Self {
            convention,
            version,
        }
    }

    /// UGRID at or above [`UG_CONV_MIN_VERSION`].
    pub fn is_supported_ugrid(&self) -> bool {
        self.convention == Convention::Ugrid && self.version >= UG_CONV_MIN_VERSION
    }

    /// Collapse UGRID below the minimum version to `Other`.
    pub fn normalized(self) -> Convention {
        if self.convention == Convention::Ugrid && !self.is_supported_ugrid() {
            Convention::Other
        } else {
            self.convention
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for conv in [
            Convention::Null,
            Convention::Cf,
            Convention::Ugrid,
            Convention::Sgrid,
            Convention::Other,
            Convention::Test,
        ] {
            assert_eq!(Convention::from_code(conv.code()), Some(conv));
        }
        assert_eq!(Convention::from_code(42), None);
    }

    #[test]
    fn ugrid_below_minimum_is_other() {
        let legacy = ConventionInfo::new(Convention::Ugrid, 0.9);
        assert!(!legacy.is_supported_ugrid());
        assert_eq!(legacy.normalized(), Convention::Other);

        let current = ConventionInfo::new(Convention::Ugrid, 1.0);
        assert!(current.is_supported_ugrid());
        assert_eq!(current.normalized(), Convention::Ugrid);
    }

    #[test]
    fn nan_version_is_not_supported() {
        let info = ConventionInfo::new(Convention::Ugrid, f64::NAN);
        assert_eq!(info.normalized(), Convention::Other);
    }

    #[test]
    fn non_ugrid_conventions_pass_through() {
        assert_eq!(
            ConventionInfo::new(Convention::Cf, 0.0).normalized(),
            Convention::Cf
        );
    }
}
