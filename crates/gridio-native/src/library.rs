//! The native mesh library call surface.
//!
//! [`NativeMeshLibrary`] is the fixed set of low-level entry points the
//! access layer calls. Every entry point reports an [`ErrorCode`] on failure.
//! Payload calls fill caller-sized buffers and fail with
//! [`ErrorCode::GENERAL_ARRAY_LENGTH_FATAL_ERR`] when a buffer length does not
//! match the data.

use std::path::Path;

use gridio_core::{
    ApiResult, Convention, ConventionInfo, CoordinateSystemRef, DatasetHandle, GlobalMetadata,
    LocationType, MeshGeometry, MeshId, OpenMode, VarId, DEFAULT_FILL_VALUE,
};

/// Result of opening a dataset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Opened {
    /// Handle for subsequent calls.
    pub handle: DatasetHandle,
    /// Convention and version the file declares.
    pub info: ConventionInfo,
}

/// Definition of a new data variable.
#[derive(Clone, Debug, PartialEq)]
pub struct VarSpec {
    /// Variable name without the mesh prefix, e.g. `node_z`.
    pub name: String,
    /// Location the values live on. Must be node, edge, or face.
    pub location: LocationType,
    /// `standard_name` attribute.
    pub standard_name: String,
    /// `long_name` attribute.
    pub long_name: String,
    /// `units` attribute.
    pub units: String,
    /// `_FillValue` attribute.
    pub fill_value: f64,
}

impl VarSpec {
    /// Bed level ("altitude") variable at `location`.
    pub fn altitude(name: &str, long_name: &str, location: LocationType) -> Self {
        Self {
            name: name.to_owned(),
            location,
            standard_name: "altitude".to_owned(),
            long_name: long_name.to_owned(),
            units: "m".to_owned(),
            fill_value: DEFAULT_FILL_VALUE,
        }
    }
}

/// Low-level entry points of a UGRID mesh library.
///
/// Implementations own all open datasets; handles are only meaningful to the
/// library that issued them.
pub trait NativeMeshLibrary: Send {
    /// Open an existing dataset and report its declared convention.
    fn open(&mut self, path: &Path, mode: OpenMode) -> ApiResult<Opened>;

    /// Create a new, empty dataset in write mode, replacing any file at `path`.
    fn create(&mut self, path: &Path) -> ApiResult<DatasetHandle>;

    /// Close a dataset, persisting changes made in write mode.
    fn close(&mut self, handle: DatasetHandle) -> ApiResult<()>;

    /// Convention and version of an open dataset.
    fn inq_conventions(&mut self, handle: DatasetHandle) -> ApiResult<ConventionInfo>;

    /// Whether the dataset claims to follow `convention`.
    fn adheres_to_conventions(
        &mut self,
        handle: DatasetHandle,
        convention: Convention,
    ) -> ApiResult<bool>;

    /// Write provenance and `Conventions` global attributes.
    fn add_global_attributes(
        &mut self,
        handle: DatasetHandle,
        metadata: &GlobalMetadata,
    ) -> ApiResult<()>;

    /// Number of 2D meshes.
    fn mesh_count(&mut self, handle: DatasetHandle) -> ApiResult<usize>;

    /// Name of a mesh topology variable.
    fn mesh_name(&mut self, handle: DatasetHandle, mesh: MeshId) -> ApiResult<String>;

    /// Number of nodes of a mesh.
    fn node_count(&mut self, handle: DatasetHandle, mesh: MeshId) -> ApiResult<usize>;

    /// Number of edges of a mesh.
    fn edge_count(&mut self, handle: DatasetHandle, mesh: MeshId) -> ApiResult<usize>;

    /// Number of faces of a mesh.
    fn face_count(&mut self, handle: DatasetHandle, mesh: MeshId) -> ApiResult<usize>;

    /// Largest number of nodes of any face.
    fn max_face_nodes(&mut self, handle: DatasetHandle, mesh: MeshId) -> ApiResult<usize>;

    /// Fill node x and y coordinates.
    fn node_coordinates(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        xs: &mut [f64],
        ys: &mut [f64],
    ) -> ApiResult<()>;

    /// Overwrite node x and y coordinates.
    fn put_node_coordinates(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        xs: &[f64],
        ys: &[f64],
    ) -> ApiResult<()>;

    /// Fill `2 * edge_count` 1-based edge node ids.
    fn edge_nodes(&mut self, handle: DatasetHandle, mesh: MeshId, out: &mut [i32])
        -> ApiResult<()>;

    /// Fill `face_count * max_face_nodes` 1-based face node ids and return
    /// the padding fill value.
    fn face_nodes(&mut self, handle: DatasetHandle, mesh: MeshId, out: &mut [i32])
        -> ApiResult<i32>;

    /// Define a complete new mesh; returns its id.
    fn def_mesh(&mut self, handle: DatasetHandle, geometry: &MeshGeometry) -> ApiResult<MeshId>;

    /// EPSG code of the dataset's coordinate system, 0 when none is stored.
    fn coordinate_system(&mut self, handle: DatasetHandle) -> ApiResult<i32>;

    /// Store a coordinate system.
    fn put_coordinate_system(
        &mut self,
        handle: DatasetHandle,
        crs: &CoordinateSystemRef,
    ) -> ApiResult<()>;

    /// Number of data variables of a mesh at a location.
    fn var_count(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        location: LocationType,
    ) -> ApiResult<usize>;

    /// Fill the ids of the data variables of a mesh at a location.
    fn inq_varids(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        location: LocationType,
        out: &mut [VarId],
    ) -> ApiResult<()>;

    /// Id of a named variable; tries the mesh-prefixed name first.
    fn inq_varid(&mut self, handle: DatasetHandle, mesh: MeshId, name: &str) -> ApiResult<VarId>;

    /// Id of the variable with a given `standard_name` at a location, if any.
    fn inq_varid_by_standard_name(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        location: LocationType,
        standard_name: &str,
    ) -> ApiResult<Option<VarId>>;

    /// Define a data variable filled with its fill value.
    fn def_var(&mut self, handle: DatasetHandle, mesh: MeshId, spec: &VarSpec) -> ApiResult<VarId>;

    /// Fill `out` with a variable's values and return its fill value.
    fn get_var(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        location: LocationType,
        name: &str,
        out: &mut [f64],
    ) -> ApiResult<f64>;

    /// Overwrite a variable's values.
    fn put_var(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        location: LocationType,
        name: &str,
        values: &[f64],
    ) -> ApiResult<()>;
}
