//! Mesh topology records: node coordinates, edge and face connectivity.
//!
//! Connectivity ids are 1-based ([`CONNECTIVITY_START_INDEX`]). Faces are
//! stored as a rectangular array of `rows x max_width` ids in which a face
//! with fewer vertices than `max_width` is padded with the fill sentinel.
//! [`FaceNodes`] keeps that layout explicit so the padding can never be
//! mistaken for a real node id.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Sentinel for unused slots in integer connectivity arrays.
pub const FILL_VALUE_INT: i32 = -999;
/// Fill value for floating point variables such as bed levels.
pub const DEFAULT_FILL_VALUE: f64 = -999.0;
/// Index of the first node in connectivity arrays.
pub const CONNECTIVITY_START_INDEX: i32 = 1;

// ── TopologyError ──────────────────────────────────────────────

/// Structural problems in topology records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopologyError {
    /// Flat data length does not match the declared shape.
    LengthMismatch {
        /// `rows * width` of the declared shape.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },
    /// A face has more vertices than the declared maximum.
    FaceTooWide {
        /// 0-based face index.
        face: usize,
        /// Number of vertices in the face.
        width: usize,
        /// Declared maximum.
        max_width: usize,
    },
    /// A connectivity entry refers to a node that does not exist.
    NodeOutOfRange {
        /// The offending 1-based id.
        node: i32,
        /// Number of nodes in the mesh.
        node_count: usize,
    },
    /// X and Y coordinate arrays differ in length.
    CoordinateMismatch {
        /// Number of x values.
        x: usize,
        /// Number of y values.
        y: usize,
    },
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch { expected, actual } => {
                write!(f, "expected {expected} connectivity entries, got {actual}")
            }
            Self::FaceTooWide {
                face,
                width,
                max_width,
            } => write!(
                f,
                "face {face} has {width} nodes, more than the maximum of {max_width}"
            ),
            Self::NodeOutOfRange { node, node_count } => {
                write!(f, "node id {node} out of range for {node_count} nodes")
            }
            Self::CoordinateMismatch { x, y } => {
                write!(f, "{x} x coordinates but {y} y coordinates")
            }
        }
    }
}

impl Error for TopologyError {}

// ── NodeCoordinate ─────────────────────────────────────────────

/// Position of one mesh node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeCoordinate {
    /// X (or longitude).
    pub x: f64,
    /// Y (or latitude).
    pub y: f64,
    /// Bed level at the node, the fill value when absent.
    pub z: f64,
}

impl NodeCoordinate {
    /// Construct from components.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

// ── EdgeNodes ──────────────────────────────────────────────────

/// Edge connectivity: each edge joins two 1-based node ids.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeNodes(pub Vec<[i32; 2]>);

impl EdgeNodes {
    /// Interpret a flat `[a0, b0, a1, b1, ..]` array.
    pub fn from_flat(flat: &[i32]) -> Result<Self, TopologyError> {
        if flat.len() % 2 != 0 {
            return Err(TopologyError::LengthMismatch {
                expected: flat.len() + 1,
                actual: flat.len(),
            });
        }
        Ok(Self(flat.chunks_exact(2).map(|c| [c[0], c[1]]).collect()))
    }

    /// Flatten into `[a0, b0, a1, b1, ..]`.
    pub fn to_flat(&self) -> Vec<i32> {
        self.0.iter().flat_map(|e| e.iter().copied()).collect()
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when there are no edges.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the edges.
    pub fn iter(&self) -> impl Iterator<Item = &[i32; 2]> {
        self.0.iter()
    }
}

// ── FaceNodes ──────────────────────────────────────────────────

/// Face connectivity as a padded rectangular array.
///
/// Every row has exactly `max_width` entries. Entries past a face's vertex
/// count hold `fill_value`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFaceNodes")]
pub struct FaceNodes {
    rows: usize,
    max_width: usize,
    fill_value: i32,
    data: Vec<i32>,
}

/// Serialized form of [`FaceNodes`], checked by [`FaceNodes::from_flat`].
#[derive(Deserialize)]
struct RawFaceNodes {
    rows: usize,
    max_width: usize,
    fill_value: i32,
    data: Vec<i32>,
}

impl TryFrom<RawFaceNodes> for FaceNodes {
    type Error = TopologyError;

    fn try_from(raw: RawFaceNodes) -> Result<Self, Self::Error> {
        Self::from_flat(raw.rows, raw.max_width, raw.fill_value, raw.data)
    }
}

impl FaceNodes {
    /// Wrap a flat row-major array of `rows * max_width` entries.
    pub fn from_flat(
        rows: usize,
        max_width: usize,
        fill_value: i32,
        data: Vec<i32>,
    ) -> Result<Self, TopologyError> {
        let expected = rows.checked_mul(max_width);
        if expected != Some(data.len()) {
            return Err(TopologyError::LengthMismatch {
                expected: expected.unwrap_or(usize::MAX),
                actual: data.len(),
            });
        }
        Ok(Self {
            rows,
            max_width,
            fill_value,
            data,
        })
    }

    /// Pad ragged faces out to `max_width` with `fill_value`.
    pub fn from_ragged<F: AsRef<[i32]>>(
        faces: &[F],
        max_width: usize,
        fill_value: i32,
    ) -> Result<Self, TopologyError> {
        let mut data = Vec::with_capacity(faces.len() * max_width);
        for (face, nodes) in faces.iter().enumerate() {
            let nodes = nodes.as_ref();
            if nodes.len() > max_width {
                return Err(TopologyError::FaceTooWide {
                    face,
                    width: nodes.len(),
                    max_width,
                });
            }
            data.extend_from_slice(nodes);
            data.extend(std::iter::repeat(fill_value).take(max_width - nodes.len()));
        }
        Ok(Self {
            rows: faces.len(),
            max_width,
            fill_value,
            data,
        })
    }

    /// A record with no faces.
    pub fn empty(max_width: usize, fill_value: i32) -> Self {
        Self {
            rows: 0,
            max_width,
            fill_value,
            data: Vec::new(),
        }
    }

    /// Number of faces.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Entries per row.
    pub fn max_width(&self) -> usize {
        self.max_width
    }

    /// Padding sentinel.
    pub fn fill_value(&self) -> i32 {
        self.fill_value
    }

    /// Row-major flat data.
    pub fn as_flat(&self) -> &[i32] {
        &self.data
    }

    /// The padded row of face `index`.
    pub fn row(&self, index: usize) -> Option<&[i32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.max_width;
        Some(&self.data[start..start + self.max_width])
    }

    /// Real node ids of face `index`, padding skipped.
    pub fn valid_nodes(&self, index: usize) -> impl Iterator<Item = i32> + '_ {
        let fill = self.fill_value;
        self.row(index)
            .unwrap_or(&[])
            .iter()
            .copied()
            .filter(move |&n| n != fill)
    }

    /// Iterate over padded rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[i32]> {
        // chunks_exact panics on zero.
        self.data.chunks_exact(self.max_width.max(1))
    }

    /// Unpadded faces.
    pub fn to_ragged(&self) -> Vec<Vec<i32>> {
        (0..self.rows)
            .map(|i| self.valid_nodes(i).collect())
            .collect()
    }
}

// ── MeshGeometry ───────────────────────────────────────────────

/// A complete 2D mesh definition used to write a new mesh into a dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshGeometry {
    /// Mesh topology variable name, e.g. `mesh2d`.
    pub name: String,
    /// Node x coordinates.
    pub node_x: Vec<f64>,
    /// Node y coordinates.
    pub node_y: Vec<f64>,
    /// 1-based edge connectivity.
    pub edges: Vec<[i32; 2]>,
    /// 1-based face connectivity, one entry per face.
    pub faces: Vec<SmallVec<[i32; 4]>>,
}

impl MeshGeometry {
    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.node_x.len()
    }

    /// Widest face, 0 if there are no faces.
    pub fn max_face_nodes(&self) -> usize {
        self.faces.iter().map(|f| f.len()).max().unwrap_or(0)
    }

    /// Edge connectivity record.
    pub fn edge_nodes(&self) -> EdgeNodes {
        EdgeNodes(self.edges.clone())
    }

    /// Padded face connectivity record.
    pub fn face_nodes(&self) -> Result<FaceNodes, TopologyError> {
        FaceNodes::from_ragged(&self.faces, self.max_face_nodes(), FILL_VALUE_INT)
    }

    /// Check coordinate lengths and that every connectivity id names a node.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.node_x.len() != self.node_y.len() {
            return Err(TopologyError::CoordinateMismatch {
                x: self.node_x.len(),
                y: self.node_y.len(),
            });
        }
        let node_count = self.node_count();
        let last = CONNECTIVITY_START_INDEX + node_count as i32;
        let ids = self
            .edges
            .iter()
            .flat_map(|e| e.iter())
            .chain(self.faces.iter().flat_map(|f| f.iter()));
        for &node in ids {
            if node < CONNECTIVITY_START_INDEX || node >= last {
                return Err(TopologyError::NodeOutOfRange { node, node_count });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use smallvec::smallvec;

    #[test]
    fn deserializing_checks_the_array_shape() {
        let faces = FaceNodes::from_ragged(&[vec![1, 2, 3]], 4, FILL_VALUE_INT).unwrap();
        let json = serde_json::to_string(&faces).unwrap();
        assert_eq!(serde_json::from_str::<FaceNodes>(&json).unwrap(), faces);

        let short = r#"{"rows":2,"max_width":4,"fill_value":-999,"data":[1,2,3,-999]}"#;
        let err = serde_json::from_str::<FaceNodes>(short).unwrap_err();
        assert!(err.to_string().contains("expected 8"), "{err}");

        let huge = format!(
            r#"{{"rows":{},"max_width":2,"fill_value":-999,"data":[]}}"#,
            usize::MAX
        );
        assert!(serde_json::from_str::<FaceNodes>(&huge).is_err());
    }

    #[test]
    fn triangle_is_padded_with_fill() {
        let faces = FaceNodes::from_ragged(&[vec![1, 2, 5], vec![2, 3, 4, 5]], 4, FILL_VALUE_INT)
            .unwrap();
        assert_eq!(faces.row(0), Some(&[1, 2, 5, -999][..]));
        assert_eq!(faces.row(1), Some(&[2, 3, 4, 5][..]));
        assert_eq!(faces.valid_nodes(0).collect::<Vec<_>>(), vec![1, 2, 5]);
        assert_eq!(faces.row(2), None);
    }

    #[test]
    fn from_flat_rejects_wrong_length() {
        let err = FaceNodes::from_flat(2, 4, FILL_VALUE_INT, vec![1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            TopologyError::LengthMismatch {
                expected: 8,
                actual: 3
            }
        );
    }

    #[test]
    fn too_wide_face_is_rejected() {
        let err = FaceNodes::from_ragged(&[vec![1, 2, 3, 4, 5]], 4, FILL_VALUE_INT).unwrap_err();
        assert!(matches!(err, TopologyError::FaceTooWide { face: 0, .. }));
    }

    #[test]
    fn edge_nodes_from_flat() {
        let edges = EdgeNodes::from_flat(&[5, 2, 2, 1]).unwrap();
        assert_eq!(edges.0, vec![[5, 2], [2, 1]]);
        assert_eq!(edges.to_flat(), vec![5, 2, 2, 1]);
        assert!(EdgeNodes::from_flat(&[1, 2, 3]).is_err());
    }

    #[test]
    fn geometry_validation_catches_bad_ids() {
        let mut geometry = MeshGeometry {
            name: "mesh2d".into(),
            node_x: vec![0.0, 1.0, 0.0],
            node_y: vec![0.0, 0.0, 1.0],
            edges: vec![[1, 2]],
            faces: vec![smallvec![1, 2, 3]],
        };
        assert_eq!(geometry.validate(), Ok(()));
        assert_eq!(geometry.max_face_nodes(), 3);

        geometry.faces.push(smallvec![1, 4, 2]);
        assert_eq!(
            geometry.validate(),
            Err(TopologyError::NodeOutOfRange {
                node: 4,
                node_count: 3
            })
        );
    }

    #[test]
    fn empty_faces_iterate_nothing() {
        let faces = FaceNodes::empty(0, FILL_VALUE_INT);
        assert_eq!(faces.iter_rows().count(), 0);
        assert!(faces.to_ragged().is_empty());
    }

    proptest! {
        #[test]
        fn padded_rows_have_uniform_width(
            faces in prop::collection::vec(prop::collection::vec(1i32..100, 1..6), 0..20)
        ) {
            let max_width = faces.iter().map(Vec::len).max().unwrap_or(0);
            let record = FaceNodes::from_ragged(&faces, max_width, FILL_VALUE_INT).unwrap();
            prop_assert_eq!(record.as_flat().len(), faces.len() * max_width);
            for (i, face) in faces.iter().enumerate() {
                let row = record.row(i).unwrap();
                prop_assert_eq!(row.len(), max_width);
                prop_assert_eq!(&row[..face.len()], &face[..]);
                prop_assert!(row[face.len()..].iter().all(|&n| n == FILL_VALUE_INT));
            }
            prop_assert_eq!(record.to_ragged(), faces);
        }
    }
}
