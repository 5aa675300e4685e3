//! Coordinate system references.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the variable holding a geographic coordinate system.
pub const GEOGRAPHIC_CRS_VARIABLE: &str = "wgs84";
/// Name of the variable holding a projected coordinate system.
pub const PROJECTED_CRS_VARIABLE: &str = "projected_coordinate_system";

/// A coordinate system identified by its EPSG authority code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoordinateSystemRef {
    /// EPSG authority code. 0 means "unknown".
    pub authority_code: i32,
    /// Geographic (latitude/longitude) rather than projected.
    pub is_spherical: bool,
}

impl CoordinateSystemRef {
    /// Reference for an EPSG code; geographic 2D systems live in the
    /// 4000-4999 block.
    pub fn from_epsg(code: i32) -> Self {
        Self {
            authority_code: code,
            is_spherical: (4000..5000).contains(&code),
        }
    }

    /// WGS 84 (EPSG:4326).
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// `EPSG:<code>` string as stored in the `EPSG_code` attribute.
    pub fn epsg_string(&self) -> String {
        format!("EPSG:{}", self.authority_code)
    }

    /// Value for the `grid_mapping_name` attribute.
    pub fn grid_mapping_name(&self) -> &'static str {
        if self.is_spherical {
            "latitude_longitude"
        } else {
            "Unknown projected"
        }
    }

    /// Variable this system is primarily stored in.
    pub fn variable_name(&self) -> &'static str {
        if self.is_spherical {
            GEOGRAPHIC_CRS_VARIABLE
        } else {
            PROJECTED_CRS_VARIABLE
        }
    }
}

impl fmt::Display for CoordinateSystemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.epsg_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geographic_codes_are_spherical() {
        assert!(CoordinateSystemRef::from_epsg(4326).is_spherical);
        assert!(!CoordinateSystemRef::from_epsg(28992).is_spherical);
        assert!(!CoordinateSystemRef::from_epsg(0).is_spherical);
    }

    #[test]
    fn variable_and_mapping_follow_kind() {
        let wgs = CoordinateSystemRef::wgs84();
        assert_eq!(wgs.variable_name(), "wgs84");
        assert_eq!(wgs.grid_mapping_name(), "latitude_longitude");
        assert_eq!(wgs.epsg_string(), "EPSG:4326");

        let rd = CoordinateSystemRef::from_epsg(28992);
        assert_eq!(rd.variable_name(), "projected_coordinate_system");
    }
}
