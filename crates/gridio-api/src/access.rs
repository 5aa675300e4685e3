//! The mesh access capability interface.

use std::path::Path;

use gridio_core::{
    ApiResult, Convention, CoordinateSystemRef, EdgeNodes, FaceNodes, GlobalMetadata,
    LocationType, MeshGeometry, MeshId, OpenMode, VarId,
};

/// Everything the dataset layer needs from a mesh API.
///
/// Implemented by [`UGridApi`](crate::UGridApi), which calls the native
/// library in-process, and by the process-isolated proxy, which forwards
/// each call to a worker process. Every call fails with
/// [`ErrorCode::GENERAL_FATAL_ERR`](gridio_core::ErrorCode::GENERAL_FATAL_ERR)
/// when no dataset is open, without reaching the native library.
pub trait MeshAccess: Send {
    /// Open a dataset, closing any dataset already open.
    fn open(&mut self, path: &Path, mode: OpenMode) -> ApiResult<()>;

    /// Create a new dataset carrying `metadata` and keep it open for writing.
    fn create_file(&mut self, path: &Path, metadata: &GlobalMetadata) -> ApiResult<()>;

    /// Close the open dataset. A no-op when nothing is open.
    fn close(&mut self) -> ApiResult<()>;

    /// Whether a dataset is open.
    fn is_initialized(&self) -> bool;

    /// Convention of the file at `path`, or of the open dataset when `None`.
    fn convention(&mut self, path: Option<&Path>) -> ApiResult<Convention>;

    /// Convention version of the open dataset; NaN when nothing is open.
    fn version(&mut self) -> f64;

    /// Fill value reported by the most recent bed level read.
    fn z_fill_value(&mut self) -> f64;

    /// Number of 2D meshes.
    fn mesh_count(&mut self) -> ApiResult<usize>;

    /// Name of a mesh.
    fn mesh_name(&mut self, mesh: MeshId) -> ApiResult<String>;

    /// Number of nodes.
    fn node_count(&mut self, mesh: MeshId) -> ApiResult<usize>;

    /// Number of edges.
    fn edge_count(&mut self, mesh: MeshId) -> ApiResult<usize>;

    /// Number of faces.
    fn face_count(&mut self, mesh: MeshId) -> ApiResult<usize>;

    /// Widest face.
    fn max_face_nodes(&mut self, mesh: MeshId) -> ApiResult<usize>;

    /// EPSG code of the stored coordinate system, 0 when none.
    fn coordinate_system_code(&mut self) -> ApiResult<i32>;

    /// Node x coordinates.
    fn node_x(&mut self, mesh: MeshId) -> ApiResult<Vec<f64>>;

    /// Node y coordinates.
    fn node_y(&mut self, mesh: MeshId) -> ApiResult<Vec<f64>>;

    /// Node bed levels from the primary or legacy variable.
    fn node_z(&mut self, mesh: MeshId) -> ApiResult<Vec<f64>>;

    /// Edge connectivity.
    fn edge_nodes(&mut self, mesh: MeshId) -> ApiResult<EdgeNodes>;

    /// Face connectivity padded to the widest face.
    fn face_nodes(&mut self, mesh: MeshId) -> ApiResult<FaceNodes>;

    /// Number of data variables at a location.
    fn var_count(&mut self, mesh: MeshId, location: LocationType) -> ApiResult<usize>;

    /// Ids of the data variables at a location.
    fn var_ids(&mut self, mesh: MeshId, location: LocationType) -> ApiResult<Vec<VarId>>;

    /// Overwrite node coordinates.
    fn write_xy_coordinates(&mut self, mesh: MeshId, xs: &[f64], ys: &[f64]) -> ApiResult<()>;

    /// Write bed levels, defining the variable first if it does not exist.
    fn write_z_values(
        &mut self,
        mesh: MeshId,
        location: LocationType,
        var_name: &str,
        long_name: &str,
        values: &[f64],
    ) -> ApiResult<()>;

    /// Read bed levels. Empty when no altitude variable exists there.
    fn read_z_values(
        &mut self,
        mesh: MeshId,
        location: LocationType,
        var_name: &str,
    ) -> ApiResult<Vec<f64>>;

    /// Define a new mesh in the open dataset.
    fn define_mesh(&mut self, geometry: &MeshGeometry) -> ApiResult<MeshId>;

    /// Store a coordinate system in the open dataset.
    fn write_coordinate_system(&mut self, crs: &CoordinateSystemRef) -> ApiResult<()>;
}
