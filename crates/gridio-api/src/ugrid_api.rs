//! Unstructured mesh API over [`GridApi`].
//!
//! Resolves the count-then-payload call pairs of the native library into
//! single calls returning owned data.

use std::path::Path;

use gridio_core::{
    ApiResult, Convention, CoordinateSystemRef, EdgeNodes, ErrorCode, FaceNodes, GlobalMetadata,
    LocationType, MeshGeometry, MeshId, OpenMode, VarId, DEFAULT_FILL_VALUE,
};
use gridio_native::{DefaultLibrary, NativeMeshLibrary, VarSpec};

use crate::access::MeshAccess;
use crate::grid_api::GridApi;

/// Primary name of the node bed level variable.
pub const NODE_Z: &str = "node_z";
/// Name of the node bed level variable in older files.
pub const LEGACY_NODE_Z: &str = "NetNode_z";
/// Standard name identifying bed level variables.
pub const ALTITUDE: &str = "altitude";

/// In-process implementation of [`MeshAccess`].
pub struct UGridApi<L: NativeMeshLibrary = DefaultLibrary> {
    grid: GridApi<L>,
    z_fill_value: f64,
}

impl UGridApi<DefaultLibrary> {
    /// API over the default library.
    pub fn new() -> Self {
        Self::from_grid_api(GridApi::new())
    }
}

impl Default for UGridApi<DefaultLibrary> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: NativeMeshLibrary> UGridApi<L> {
    /// API over `library`.
    pub fn with_library(library: L) -> Self {
        Self::from_grid_api(GridApi::with_library(library))
    }

    /// API over an existing low-level API.
    pub fn from_grid_api(grid: GridApi<L>) -> Self {
        Self {
            grid,
            z_fill_value: DEFAULT_FILL_VALUE,
        }
    }

    /// The low-level API.
    pub fn grid_api(&self) -> &GridApi<L> {
        &self.grid
    }

    /// The low-level API, mutably.
    pub fn grid_api_mut(&mut self) -> &mut GridApi<L> {
        &mut self.grid
    }

    fn read_var(
        &mut self,
        mesh: MeshId,
        location: LocationType,
        name: &str,
        len: usize,
    ) -> ApiResult<Vec<f64>> {
        let mut values = vec![0.0; len];
        self.z_fill_value = self.grid.get_var(mesh, location, name, &mut values)?;
        Ok(values)
    }

    fn location_len(&mut self, mesh: MeshId, location: LocationType) -> ApiResult<usize> {
        match location {
            LocationType::Node => self.grid.node_count(mesh),
            LocationType::Edge => self.grid.edge_count(mesh),
            LocationType::Face => self.grid.face_count(mesh),
            LocationType::All2D => Err(ErrorCode::IONC_ENOTAVAILABLE),
        }
    }
}

impl<L: NativeMeshLibrary> MeshAccess for UGridApi<L> {
    fn open(&mut self, path: &Path, mode: OpenMode) -> ApiResult<()> {
        self.grid.open(path, mode)
    }

    fn create_file(&mut self, path: &Path, metadata: &GlobalMetadata) -> ApiResult<()> {
        self.grid.create_file(path, metadata)
    }

    fn close(&mut self) -> ApiResult<()> {
        self.grid.close()
    }

    fn is_initialized(&self) -> bool {
        self.grid.is_initialized()
    }

    fn convention(&mut self, path: Option<&Path>) -> ApiResult<Convention> {
        Ok(self.grid.convention(path))
    }

    fn version(&mut self) -> f64 {
        self.grid.version()
    }

    fn z_fill_value(&mut self) -> f64 {
        self.z_fill_value
    }

    fn mesh_count(&mut self) -> ApiResult<usize> {
        self.grid.mesh_count()
    }

    fn mesh_name(&mut self, mesh: MeshId) -> ApiResult<String> {
        self.grid.mesh_name(mesh)
    }

    fn node_count(&mut self, mesh: MeshId) -> ApiResult<usize> {
        self.grid.node_count(mesh)
    }

    fn edge_count(&mut self, mesh: MeshId) -> ApiResult<usize> {
        self.grid.edge_count(mesh)
    }

    fn face_count(&mut self, mesh: MeshId) -> ApiResult<usize> {
        self.grid.face_count(mesh)
    }

    fn max_face_nodes(&mut self, mesh: MeshId) -> ApiResult<usize> {
        self.grid.max_face_nodes(mesh)
    }

    fn coordinate_system_code(&mut self) -> ApiResult<i32> {
        self.grid.coordinate_system()
    }

    fn node_x(&mut self, mesh: MeshId) -> ApiResult<Vec<f64>> {
        let n = self.grid.node_count(mesh)?;
        let (mut xs, mut ys) = (vec![0.0; n], vec![0.0; n]);
        self.grid.node_coordinates(mesh, &mut xs, &mut ys)?;
        Ok(xs)
    }

    fn node_y(&mut self, mesh: MeshId) -> ApiResult<Vec<f64>> {
        let n = self.grid.node_count(mesh)?;
        let (mut xs, mut ys) = (vec![0.0; n], vec![0.0; n]);
        self.grid.node_coordinates(mesh, &mut xs, &mut ys)?;
        Ok(ys)
    }

    fn node_z(&mut self, mesh: MeshId) -> ApiResult<Vec<f64>> {
        let n = self.grid.node_count(mesh)?;
        match self.read_var(mesh, LocationType::Node, NODE_Z, n) {
            Ok(zs) => Ok(zs),
            Err(code) => {
                log::debug!("reading {NODE_Z} failed ({code}), trying {LEGACY_NODE_Z}");
                self.read_var(mesh, LocationType::Node, LEGACY_NODE_Z, n)
            }
        }
    }

    fn edge_nodes(&mut self, mesh: MeshId) -> ApiResult<EdgeNodes> {
        let n = self.grid.edge_count(mesh)?;
        let mut flat = vec![0; n * 2];
        self.grid.edge_nodes(mesh, &mut flat)?;
        EdgeNodes::from_flat(&flat).map_err(|e| {
            log::warn!("edge connectivity of mesh {mesh} is malformed: {e}");
            ErrorCode::GENERAL_ARRAY_LENGTH_FATAL_ERR
        })
    }

    fn face_nodes(&mut self, mesh: MeshId) -> ApiResult<FaceNodes> {
        let rows = self.grid.face_count(mesh)?;
        let width = self.grid.max_face_nodes(mesh)?;
        let mut flat = vec![0; rows * width];
        let fill = self.grid.face_nodes(mesh, &mut flat)?;
        FaceNodes::from_flat(rows, width, fill, flat).map_err(|e| {
            log::warn!("face connectivity of mesh {mesh} is malformed: {e}");
            ErrorCode::GENERAL_ARRAY_LENGTH_FATAL_ERR
        })
    }

    fn var_count(&mut self, mesh: MeshId, location: LocationType) -> ApiResult<usize> {
        self.grid.var_count(mesh, location)
    }

    fn var_ids(&mut self, mesh: MeshId, location: LocationType) -> ApiResult<Vec<VarId>> {
        let n = self.grid.var_count(mesh, location)?;
        let mut ids = vec![VarId(0); n];
        self.grid.inq_varids(mesh, location, &mut ids)?;
        Ok(ids)
    }

    fn write_xy_coordinates(&mut self, mesh: MeshId, xs: &[f64], ys: &[f64]) -> ApiResult<()> {
        self.grid.put_node_coordinates(mesh, xs, ys)
    }

    fn write_z_values(
        &mut self,
        mesh: MeshId,
        location: LocationType,
        var_name: &str,
        long_name: &str,
        values: &[f64],
    ) -> ApiResult<()> {
        match self.grid.inq_varid(mesh, var_name) {
            Ok(_) => {}
            Err(ErrorCode::IONC_ENOTVAR) => {
                let spec = VarSpec::altitude(var_name, long_name, location);
                self.grid.def_var(mesh, &spec)?;
            }
            Err(code) => return Err(code),
        }
        self.grid.put_var(mesh, location, var_name, values)
    }

    fn read_z_values(
        &mut self,
        mesh: MeshId,
        location: LocationType,
        var_name: &str,
    ) -> ApiResult<Vec<f64>> {
        if self
            .grid
            .inq_varid_by_standard_name(mesh, location, ALTITUDE)?
            .is_none()
        {
            return Ok(Vec::new());
        }
        let n = self.location_len(mesh, location)?;
        self.read_var(mesh, location, var_name, n)
    }

    fn define_mesh(&mut self, geometry: &MeshGeometry) -> ApiResult<MeshId> {
        self.grid.def_mesh(geometry)
    }

    fn write_coordinate_system(&mut self, crs: &CoordinateSystemRef) -> ApiResult<()> {
        self.grid.put_coordinate_system(crs)
    }
}
