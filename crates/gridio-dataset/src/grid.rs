//! In-memory unstructured grid loaded from a dataset.

use gridio_api::MeshAccess;
use gridio_core::{
    CoordinateSystemRef, EdgeNodes, FaceNodes, MeshGeometry, MeshId, NodeCoordinate,
    FILL_VALUE_INT,
};

use crate::dataset::MeshDataset;
use crate::error::DatasetError;

/// One 2D mesh with its coordinate system.
#[derive(Clone, Debug, PartialEq)]
pub struct UnstructuredGrid {
    /// Mesh name in the dataset.
    pub name: String,
    /// Nodes, `z` holding the bed level or the fill value.
    pub vertices: Vec<NodeCoordinate>,
    /// 1-based edge connectivity.
    pub edges: EdgeNodes,
    /// 1-based face connectivity.
    pub cells: FaceNodes,
    /// Coordinate system, when the dataset declares one.
    pub coordinate_system: Option<CoordinateSystemRef>,
}

impl UnstructuredGrid {
    /// A grid without nodes, edges or faces.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertices: Vec::new(),
            edges: EdgeNodes::default(),
            cells: FaceNodes::empty(0, FILL_VALUE_INT),
            coordinate_system: None,
        }
    }

    /// Read `mesh` and the coordinate system from `dataset`.
    pub fn from_dataset<A: MeshAccess>(
        dataset: &mut MeshDataset<A>,
        mesh: MeshId,
    ) -> Result<Self, DatasetError> {
        let name = dataset.mesh_name(mesh)?;
        let vertices = dataset.all_node_coordinates(mesh)?.to_vec();
        let edges = dataset.edge_nodes(mesh)?.clone();
        let cells = dataset.face_nodes(mesh)?.clone();
        let coordinate_system = dataset.coordinate_system()?;
        Ok(Self {
            name,
            vertices,
            edges,
            cells,
            coordinate_system,
        })
    }

    /// No vertices and no cells.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.cells.rows() == 0
    }

    /// Vertex x coordinates.
    pub fn xs(&self) -> Vec<f64> {
        self.vertices.iter().map(|v| v.x).collect()
    }

    /// Vertex y coordinates.
    pub fn ys(&self) -> Vec<f64> {
        self.vertices.iter().map(|v| v.y).collect()
    }

    /// Vertex bed levels.
    pub fn zs(&self) -> Vec<f64> {
        self.vertices.iter().map(|v| v.z).collect()
    }

    /// Mesh definition for writing this grid into a new dataset.
    pub fn to_geometry(&self) -> MeshGeometry {
        MeshGeometry {
            name: self.name.clone(),
            node_x: self.xs(),
            node_y: self.ys(),
            edges: self.edges.0.clone(),
            faces: (0..self.cells.rows())
                .map(|i| self.cells.valid_nodes(i).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_grid_is_empty() {
        let grid = UnstructuredGrid::empty("mesh2d");
        assert!(grid.is_empty());
        assert_eq!(grid.to_geometry().node_count(), 0);
    }

    #[test]
    fn geometry_drops_face_padding() {
        let cells = FaceNodes::from_ragged(&[vec![1, 2, 3], vec![1, 3, 4, 2]], 4, FILL_VALUE_INT)
            .unwrap();
        let grid = UnstructuredGrid {
            name: "mesh2d".into(),
            vertices: vec![
                NodeCoordinate::new(0.0, 0.0, -1.0),
                NodeCoordinate::new(1.0, 0.0, -2.0),
                NodeCoordinate::new(1.0, 1.0, -3.0),
                NodeCoordinate::new(0.0, 1.0, -4.0),
            ],
            edges: EdgeNodes(vec![[1, 2]]),
            cells,
            coordinate_system: None,
        };
        let geometry = grid.to_geometry();
        assert_eq!(geometry.faces[0].as_slice(), &[1, 2, 3]);
        assert_eq!(geometry.faces[1].as_slice(), &[1, 3, 4, 2]);
        assert_eq!(geometry.node_y, vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(grid.zs(), vec![-1.0, -2.0, -3.0, -4.0]);
        assert!(geometry.validate().is_ok());
    }
}
