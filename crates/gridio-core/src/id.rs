//! Strongly-typed identifiers for datasets, meshes, and variables.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a mesh within an open dataset.
///
/// Mesh ids are 1-based, matching the native library's numbering.
/// Use [`MeshId::index`] for the 0-based position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeshId(pub u32);

impl MeshId {
    /// The first mesh of a dataset.
    pub const FIRST: MeshId = MeshId(1);

    /// Build a mesh id from a 0-based position.
    pub fn from_index(index: usize) -> Self {
        MeshId(index as u32 + 1)
    }

    /// 0-based position of this mesh, or `None` for the invalid id 0.
    pub fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to a dataset opened by the native library.
///
/// Slot and generation are packed inside; a closed handle is detected as
/// stale rather than aliasing a newer dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetHandle(pub u64);

/// Identifies a variable within a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarId(pub i32);

/// Mesh location a variable is defined on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationType {
    /// Mesh nodes (vertices).
    Node,
    /// Mesh edges.
    Edge,
    /// Mesh faces (cells).
    Face,
    /// Any location of a 2D mesh.
    All2D,
}

impl LocationType {
    /// Value of the `location` attribute for variables at this location.
    pub fn attribute_value(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Edge => "edge",
            Self::Face => "face",
            Self::All2D => "all2d",
        }
    }

    /// Parse a `location` attribute value.
    pub fn from_attribute(value: &str) -> Option<Self> {
        match value {
            "node" => Some(Self::Node),
            "edge" => Some(Self::Edge),
            "face" => Some(Self::Face),
            _ => None,
        }
    }

    /// Whether a variable located at `other` belongs to this location.
    pub fn includes(self, other: LocationType) -> bool {
        self == Self::All2D || self == other
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute_value())
    }
}

/// Access mode for opening a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpenMode {
    /// Read-only access.
    Read,
    /// Read/write access; changes are persisted on close.
    Write,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_id_is_one_based() {
        assert_eq!(MeshId::FIRST.index(), Some(0));
        assert_eq!(MeshId::from_index(2), MeshId(3));
        assert_eq!(MeshId(0).index(), None);
    }

    #[test]
    fn all2d_includes_every_location() {
        assert!(LocationType::All2D.includes(LocationType::Face));
        assert!(LocationType::Node.includes(LocationType::Node));
        assert!(!LocationType::Node.includes(LocationType::Face));
    }

    #[test]
    fn location_attribute_round_trip() {
        for loc in [LocationType::Node, LocationType::Edge, LocationType::Face] {
            assert_eq!(LocationType::from_attribute(loc.attribute_value()), Some(loc));
        }
        assert_eq!(LocationType::from_attribute("volume"), None);
    }
}
