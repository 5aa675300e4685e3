//! Selection between the direct and the process-isolated mesh API.

use std::path::Path;

use gridio_api::{MeshAccess, UGridApi};
use gridio_core::{
    ApiResult, Convention, CoordinateSystemRef, EdgeNodes, FaceNodes, GlobalMetadata,
    LocationType, MeshGeometry, MeshId, OpenMode, VarId,
};
use gridio_proxy::{ConfigError, IsolatedGridApi, ProxyConfig};

/// Which mesh API a dataset runs on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ApiKind {
    /// Call the native library in this process.
    #[default]
    Direct,
    /// Run the native library in a worker process.
    ProcessIsolated(ProxyConfig),
}

impl ApiKind {
    /// Process isolation configured from the environment.
    pub fn isolated_from_env() -> Result<Self, ConfigError> {
        ProxyConfig::from_env().map(Self::ProcessIsolated)
    }
}

/// One of the two [`MeshAccess`] implementations.
pub enum MeshApi {
    /// In-process API.
    Direct(UGridApi),
    /// Worker-process API.
    Isolated(IsolatedGridApi),
}

impl MeshApi {
    /// Build the API selected by `kind`. A worker process is only started on
    /// first use.
    pub fn create(kind: &ApiKind) -> Self {
        match kind {
            ApiKind::Direct => Self::Direct(UGridApi::new()),
            ApiKind::ProcessIsolated(config) => {
                Self::Isolated(IsolatedGridApi::new(config.clone()))
            }
        }
    }

    /// Whether calls run in a worker process.
    pub fn is_isolated(&self) -> bool {
        matches!(self, Self::Isolated(_))
    }
}

impl From<UGridApi> for MeshApi {
    fn from(api: UGridApi) -> Self {
        Self::Direct(api)
    }
}

impl From<IsolatedGridApi> for MeshApi {
    fn from(api: IsolatedGridApi) -> Self {
        Self::Isolated(api)
    }
}

macro_rules! delegate {
    ($self:ident, $api:ident => $call:expr) => {
        match $self {
            MeshApi::Direct($api) => $call,
            MeshApi::Isolated($api) => $call,
        }
    };
}

impl MeshAccess for MeshApi {
    fn open(&mut self, path: &Path, mode: OpenMode) -> ApiResult<()> {
        delegate!(self, api => api.open(path, mode))
    }

    fn create_file(&mut self, path: &Path, metadata: &GlobalMetadata) -> ApiResult<()> {
        delegate!(self, api => api.create_file(path, metadata))
    }

    fn close(&mut self) -> ApiResult<()> {
        delegate!(self, api => api.close())
    }

    fn is_initialized(&self) -> bool {
        delegate!(self, api => api.is_initialized())
    }

    fn convention(&mut self, path: Option<&Path>) -> ApiResult<Convention> {
        delegate!(self, api => api.convention(path))
    }

    fn version(&mut self) -> f64 {
        delegate!(self, api => api.version())
    }

    fn z_fill_value(&mut self) -> f64 {
        delegate!(self, api => api.z_fill_value())
    }

    fn mesh_count(&mut self) -> ApiResult<usize> {
        delegate!(self, api => api.mesh_count())
    }

    fn mesh_name(&mut self, mesh: MeshId) -> ApiResult<String> {
        delegate!(self, api => api.mesh_name(mesh))
    }

    fn node_count(&mut self, mesh: MeshId) -> ApiResult<usize> {
        delegate!(self, api => api.node_count(mesh))
    }

    fn edge_count(&mut self, mesh: MeshId) -> ApiResult<usize> {
        delegate!(self, api => api.edge_count(mesh))
    }

    fn face_count(&mut self, mesh: MeshId) -> ApiResult<usize> {
        delegate!(self, api => api.face_count(mesh))
    }

    fn max_face_nodes(&mut self, mesh: MeshId) -> ApiResult<usize> {
        delegate!(self, api => api.max_face_nodes(mesh))
    }

    fn coordinate_system_code(&mut self) -> ApiResult<i32> {
        delegate!(self, api => api.coordinate_system_code())
    }

    fn node_x(&mut self, mesh: MeshId) -> ApiResult<Vec<f64>> {
        delegate!(self, api => api.node_x(mesh))
    }

    fn node_y(&mut self, mesh: MeshId) -> ApiResult<Vec<f64>> {
        delegate!(self, api => api.node_y(mesh))
    }

    fn node_z(&mut self, mesh: MeshId) -> ApiResult<Vec<f64>> {
        delegate!(self, api => api.node_z(mesh))
    }

    fn edge_nodes(&mut self, mesh: MeshId) -> ApiResult<EdgeNodes> {
        delegate!(self, api => api.edge_nodes(mesh))
    }

    fn face_nodes(&mut self, mesh: MeshId) -> ApiResult<FaceNodes> {
        delegate!(self, api => api.face_nodes(mesh))
    }

    fn var_count(&mut self, mesh: MeshId, location: LocationType) -> ApiResult<usize> {
        delegate!(self, api => api.var_count(mesh, location))
    }

    fn var_ids(&mut self, mesh: MeshId, location: LocationType) -> ApiResult<Vec<VarId>> {
        delegate!(self, api => api.var_ids(mesh, location))
    }

    fn write_xy_coordinates(&mut self, mesh: MeshId, xs: &[f64], ys: &[f64]) -> ApiResult<()> {
        delegate!(self, api => api.write_xy_coordinates(mesh, xs, ys))
    }

    fn write_z_values(
        &mut self,
        mesh: MeshId,
        location: LocationType,
        var_name: &str,
        long_name: &str,
        values: &[f64],
    ) -> ApiResult<()> {
        delegate!(self, api => api.write_z_values(mesh, location, var_name, long_name, values))
    }

    fn read_z_values(
        &mut self,
        mesh: MeshId,
        location: LocationType,
        var_name: &str,
    ) -> ApiResult<Vec<f64>> {
        delegate!(self, api => api.read_z_values(mesh, location, var_name))
    }

    fn define_mesh(&mut self, geometry: &MeshGeometry) -> ApiResult<MeshId> {
        delegate!(self, api => api.define_mesh(geometry))
    }

    fn write_coordinate_system(&mut self, crs: &CoordinateSystemRef) -> ApiResult<()> {
        delegate!(self, api => api.write_coordinate_system(crs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_builds_the_selected_variant() {
        assert!(!MeshApi::create(&ApiKind::Direct).is_isolated());
        let kind = ApiKind::ProcessIsolated(ProxyConfig::for_worker("/nonexistent/gridio-worker"));
        let api = MeshApi::create(&kind);
        assert!(api.is_isolated());
        assert!(!api.is_initialized());
    }

    #[test]
    fn default_kind_is_direct() {
        assert_eq!(ApiKind::default(), ApiKind::Direct);
    }
}
