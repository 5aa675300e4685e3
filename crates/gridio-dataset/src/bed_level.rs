//! Bed level locations and cross-location aggregation.
//!
//! A [`BedLevelLocation`] says where bathymetry lives and how it relates
//! to the other location:
//!
//! | location                  | stored at | derived from the other location |
//! |---------------------------|-----------|---------------------------------|
//! | `Faces`                   | faces     | mean of the face's nodes        |
//! | `FacesMeanLevFromNodes`   | faces     | mean of the face's nodes        |
//! | `NodesMeanLev`            | nodes     | mean of the touching faces      |
//! | `NodesMinLev`             | nodes     | min of the touching faces       |
//! | `NodesMaxLev`             | nodes     | max of the touching faces       |
//! | `CellEdges`               | unsupported                                 |
//!
//! Unsupported locations log a warning and read as empty / write nothing.

use std::fmt;

use gridio_api::MeshAccess;
use gridio_core::{FaceNodes, LocationType, MeshId, CONNECTIVITY_START_INDEX};

use crate::dataset::MeshDataset;
use crate::error::DatasetError;

/// Where bed levels are defined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum BedLevelLocation {
    /// Face values.
    Faces = 1,
    /// Edge values; not supported.
    CellEdges = 2,
    /// Node values, faces take the mean.
    NodesMeanLev = 3,
    /// Node values, faces take the minimum.
    NodesMinLev = 4,
    /// Node values, faces take the maximum.
    NodesMaxLev = 5,
    /// Face values computed as the mean of the face's nodes.
    FacesMeanLevFromNodes = 6,
}

impl BedLevelLocation {
    /// Every location, in numeric order.
    pub const ALL: [BedLevelLocation; 6] = [
        Self::Faces,
        Self::CellEdges,
        Self::NodesMeanLev,
        Self::NodesMinLev,
        Self::NodesMaxLev,
        Self::FacesMeanLevFromNodes,
    ];

    /// Numeric value.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Location for a numeric value.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.code() == code)
    }

    /// Mesh location the values are stored at; `None` when unsupported.
    pub fn storage(self) -> Option<LocationType> {
        match self {
            Self::Faces | Self::FacesMeanLevFromNodes => Some(LocationType::Face),
            Self::NodesMeanLev | Self::NodesMinLev | Self::NodesMaxLev => {
                Some(LocationType::Node)
            }
            Self::CellEdges => None,
        }
    }

    /// How values are combined when derived from the other location.
    pub fn aggregation(self) -> Option<Aggregation> {
        match self {
            Self::Faces | Self::FacesMeanLevFromNodes | Self::NodesMeanLev => {
                Some(Aggregation::Mean)
            }
            Self::NodesMinLev => Some(Aggregation::Min),
            Self::NodesMaxLev => Some(Aggregation::Max),
            Self::CellEdges => None,
        }
    }
}

impl fmt::Display for BedLevelLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── Aggregation ────────────────────────────────────────────────

/// Reduction applied over neighbouring values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregation {
    /// Arithmetic mean.
    Mean,
    /// Minimum.
    Min,
    /// Maximum.
    Max,
}

impl Aggregation {
    /// Reduce `values`; `None` when there are none.
    pub fn apply(self, values: impl IntoIterator<Item = f64>) -> Option<f64> {
        let mut iter = values.into_iter();
        let first = iter.next()?;
        let (acc, n) = iter.fold((first, 1usize), |(acc, n), v| {
            let acc = match self {
                Self::Mean => acc + v,
                Self::Min => acc.min(v),
                Self::Max => acc.max(v),
            };
            (acc, n + 1)
        });
        Some(match self {
            Self::Mean => acc / n as f64,
            Self::Min | Self::Max => acc,
        })
    }
}

fn is_missing(value: f64, fill: f64) -> bool {
    value.is_nan() || value == fill
}

fn node_index(id: i32, node_count: usize) -> Option<usize> {
    usize::try_from(id - CONNECTIVITY_START_INDEX)
        .ok()
        .filter(|&i| i < node_count)
}

/// Face values from node values.
///
/// Each face aggregates the values of its distinct nodes, skipping padding
/// and nodes whose value is missing. Faces with no usable node get `fill`.
pub fn face_values_from_nodes(
    faces: &FaceNodes,
    node_values: &[f64],
    aggregation: Aggregation,
    fill: f64,
) -> Vec<f64> {
    (0..faces.rows())
        .map(|face| {
            let mut seen: Vec<usize> = Vec::with_capacity(faces.max_width());
            for id in faces.valid_nodes(face) {
                if let Some(i) = node_index(id, node_values.len()) {
                    if !seen.contains(&i) {
                        seen.push(i);
                    }
                }
            }
            let values = seen
                .into_iter()
                .map(|i| node_values[i])
                .filter(|&v| !is_missing(v, fill));
            aggregation.apply(values).unwrap_or(fill)
        })
        .collect()
}

/// Node values from face values.
///
/// Each node aggregates the values of the faces touching it, skipping faces
/// whose value is missing. Untouched nodes get `fill`.
pub fn node_values_from_faces(
    faces: &FaceNodes,
    node_count: usize,
    face_values: &[f64],
    aggregation: Aggregation,
    fill: f64,
) -> Vec<f64> {
    let mut touching: Vec<Vec<f64>> = vec![Vec::new(); node_count];
    for (face, &value) in face_values.iter().enumerate().take(faces.rows()) {
        if is_missing(value, fill) {
            continue;
        }
        let mut seen: Vec<usize> = Vec::with_capacity(faces.max_width());
        for id in faces.valid_nodes(face) {
            if let Some(i) = node_index(id, node_count) {
                if !seen.contains(&i) {
                    seen.push(i);
                    touching[i].push(value);
                }
            }
        }
    }
    touching
        .into_iter()
        .map(|values| aggregation.apply(values).unwrap_or(fill))
        .collect()
}

// ── Dataset operations ─────────────────────────────────────────

/// Read the bed levels stored for `location`.
pub fn read_bed_levels<A: MeshAccess>(
    dataset: &mut MeshDataset<A>,
    mesh: MeshId,
    location: BedLevelLocation,
) -> Result<Vec<f64>, DatasetError> {
    match location.storage() {
        Some(LocationType::Face) => dataset.read_z_values_at_faces(mesh),
        Some(_) => dataset.read_z_values_at_nodes(mesh),
        None => {
            log::warn!("cannot read z values at {location}: cell edges are not supported");
            Ok(Vec::new())
        }
    }
}

/// Store bed levels for `location`.
pub fn write_bed_levels<A: MeshAccess>(
    dataset: &mut MeshDataset<A>,
    mesh: MeshId,
    location: BedLevelLocation,
    values: &[f64],
) -> Result<(), DatasetError> {
    match location.storage() {
        Some(LocationType::Face) => dataset.write_z_values_at_faces(mesh, values),
        Some(_) => dataset.write_z_values_at_nodes(mesh, values),
        None => {
            log::warn!("cannot write z values at {location}: cell edges are not supported");
            Ok(())
        }
    }
}

/// Values at the storage location of `location`, computed from the bed
/// levels stored at the other location.
///
/// Empty when the other location holds no bed levels.
pub fn derived_values<A: MeshAccess>(
    dataset: &mut MeshDataset<A>,
    mesh: MeshId,
    location: BedLevelLocation,
) -> Result<Vec<f64>, DatasetError> {
    let (Some(target), Some(aggregation)) = (location.storage(), location.aggregation()) else {
        log::warn!("cannot derive z values at {location}: cell edges are not supported");
        return Ok(Vec::new());
    };
    match target {
        LocationType::Face => {
            let node_values = dataset.read_z_values_at_nodes(mesh)?;
            if node_values.is_empty() {
                return Ok(Vec::new());
            }
            let fill = dataset.z_fill_value()?;
            let faces = dataset.face_nodes(mesh)?;
            Ok(face_values_from_nodes(faces, &node_values, aggregation, fill))
        }
        _ => {
            let face_values = dataset.read_z_values_at_faces(mesh)?;
            if face_values.is_empty() {
                return Ok(Vec::new());
            }
            let fill = dataset.z_fill_value()?;
            let node_count = dataset.number_of_nodes(mesh)?;
            let faces = dataset.face_nodes(mesh)?;
            Ok(node_values_from_faces(
                faces,
                node_count,
                &face_values,
                aggregation,
                fill,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridio_core::FILL_VALUE_INT;
    use proptest::prelude::*;

    const FILL: f64 = -999.0;

    fn sample_faces() -> FaceNodes {
        FaceNodes::from_ragged(&[vec![1, 2, 5], vec![2, 3, 4, 5]], 4, FILL_VALUE_INT).unwrap()
    }

    #[test]
    fn codes_round_trip() {
        for location in BedLevelLocation::ALL {
            assert_eq!(BedLevelLocation::from_code(location.code()), Some(location));
        }
        assert_eq!(BedLevelLocation::Faces.code(), 1);
        assert_eq!(BedLevelLocation::FacesMeanLevFromNodes.code(), 6);
        assert_eq!(BedLevelLocation::from_code(7), None);
    }

    #[test]
    fn storage_follows_location() {
        use BedLevelLocation::*;
        assert_eq!(Faces.storage(), Some(LocationType::Face));
        assert_eq!(FacesMeanLevFromNodes.storage(), Some(LocationType::Face));
        assert_eq!(NodesMinLev.storage(), Some(LocationType::Node));
        assert_eq!(CellEdges.storage(), None);
        assert_eq!(CellEdges.aggregation(), None);
    }

    #[test]
    fn aggregation_of_nothing_is_none() {
        assert_eq!(Aggregation::Mean.apply([]), None);
        assert_eq!(Aggregation::Mean.apply([1.0, 2.0, 6.0]), Some(3.0));
        assert_eq!(Aggregation::Min.apply([4.0, -2.0]), Some(-2.0));
        assert_eq!(Aggregation::Max.apply([4.0, -2.0]), Some(4.0));
    }

    #[test]
    fn face_mean_skips_padding() {
        let faces = sample_faces();
        let nodes = [1.0, 2.0, 3.0, 4.0, 6.0];
        let values = face_values_from_nodes(&faces, &nodes, Aggregation::Mean, FILL);
        assert_eq!(values, vec![3.0, 3.75]);
    }

    #[test]
    fn repeated_nodes_count_once() {
        let faces = FaceNodes::from_ragged(&[vec![1, 2, 2, 3]], 4, FILL_VALUE_INT).unwrap();
        let values = face_values_from_nodes(&faces, &[0.0, 3.0, 6.0], Aggregation::Mean, FILL);
        assert_eq!(values, vec![3.0]);
    }

    #[test]
    fn missing_node_values_are_skipped() {
        let faces = sample_faces();
        let nodes = [FILL, FILL, FILL, FILL, FILL];
        assert_eq!(
            face_values_from_nodes(&faces, &nodes, Aggregation::Mean, FILL),
            vec![FILL, FILL]
        );
        let nodes = [1.0, f64::NAN, 3.0, 4.0, 5.0];
        assert_eq!(
            face_values_from_nodes(&faces, &nodes, Aggregation::Max, FILL),
            vec![5.0, 5.0]
        );
    }

    #[test]
    fn node_values_aggregate_touching_faces() {
        let faces = sample_faces();
        let face_values = [2.0, 8.0];
        let mean = node_values_from_faces(&faces, 5, &face_values, Aggregation::Mean, FILL);
        assert_eq!(mean, vec![2.0, 5.0, 8.0, 8.0, 5.0]);
        let min = node_values_from_faces(&faces, 5, &face_values, Aggregation::Min, FILL);
        assert_eq!(min, vec![2.0, 2.0, 8.0, 8.0, 2.0]);
        let max = node_values_from_faces(&faces, 5, &face_values, Aggregation::Max, FILL);
        assert_eq!(max, vec![2.0, 8.0, 8.0, 8.0, 8.0]);
    }

    #[test]
    fn untouched_nodes_get_fill() {
        let faces = sample_faces();
        let values = node_values_from_faces(&faces, 7, &[1.0, 1.0], Aggregation::Mean, FILL);
        assert_eq!(values[5..], [FILL, FILL]);
    }

    fn arb_mesh() -> impl Strategy<Value = (usize, Vec<Vec<i32>>)> {
        (1usize..12).prop_flat_map(|nodes| {
            let face = prop::collection::vec(1..=nodes as i32, 3..=6);
            (Just(nodes), prop::collection::vec(face, 0..10))
        })
    }

    proptest! {
        #[test]
        fn face_aggregates_stay_within_node_bounds(
            (node_count, ragged) in arb_mesh(),
            seed in prop::collection::vec(-50.0f64..50.0, 12),
        ) {
            let faces = FaceNodes::from_ragged(&ragged, 6, FILL_VALUE_INT).unwrap();
            let nodes = &seed[..node_count];
            let mean = face_values_from_nodes(&faces, nodes, Aggregation::Mean, FILL);
            let min = face_values_from_nodes(&faces, nodes, Aggregation::Min, FILL);
            let max = face_values_from_nodes(&faces, nodes, Aggregation::Max, FILL);
            prop_assert_eq!(mean.len(), faces.rows());
            for face in 0..faces.rows() {
                let lo = ragged[face].iter().map(|&id| nodes[id as usize - 1]).fold(f64::INFINITY, f64::min);
                let hi = ragged[face].iter().map(|&id| nodes[id as usize - 1]).fold(f64::NEG_INFINITY, f64::max);
                prop_assert_eq!(min[face], lo);
                prop_assert_eq!(max[face], hi);
                prop_assert!(mean[face] >= lo - 1e-9 && mean[face] <= hi + 1e-9);
            }
        }

        #[test]
        fn node_aggregates_are_ordered(
            (node_count, ragged) in arb_mesh(),
            face_seed in prop::collection::vec(-50.0f64..50.0, 10),
        ) {
            let faces = FaceNodes::from_ragged(&ragged, 6, FILL_VALUE_INT).unwrap();
            let face_values = &face_seed[..faces.rows()];
            let mean = node_values_from_faces(&faces, node_count, face_values, Aggregation::Mean, FILL);
            let min = node_values_from_faces(&faces, node_count, face_values, Aggregation::Min, FILL);
            let max = node_values_from_faces(&faces, node_count, face_values, Aggregation::Max, FILL);
            prop_assert_eq!(mean.len(), node_count);
            for node in 0..node_count {
                let touched = ragged.iter().any(|f| f.contains(&(node as i32 + 1)));
                if touched {
                    prop_assert!(min[node] <= mean[node] + 1e-9);
                    prop_assert!(mean[node] <= max[node] + 1e-9);
                } else {
                    prop_assert_eq!(mean[node], FILL);
                }
            }
        }
    }
}
