//! Cached access to one mesh dataset.
//!
//! [`MeshDataset`] owns exactly one mesh API and the dataset it has open.
//! The dataset is opened lazily on first use, and everything read from it
//! (convention, coordinate system, topology, variable catalogs) is cached
//! until the dataset is disposed.
//!
//! # Lifecycle
//!
//! ```text
//! Unopened --initialize()--> Initializing --ok--> Ready --dispose()--> Disposed
//!                                  |
//!                                  +--open failed--> Failed
//! ```
//!
//! `Disposed` and `Failed` are terminal: the API has been dropped (a worker
//! process is shut down with it). Every later call on a disposed dataset
//! fails with [`DatasetError::Disposed`]; a dataset that failed to open keeps
//! answering with the original [`DatasetError::Open`].

use std::path::{Path, PathBuf};

use gridio_api::MeshAccess;
use gridio_core::{
    Convention, ConventionInfo, CoordinateSystemRef, EdgeNodes, ErrorCode, FaceNodes,
    GlobalMetadata, LocationType, MeshGeometry, MeshId, NodeCoordinate, OpenMode, VarId,
};
use indexmap::IndexMap;

use crate::api::{ApiKind, MeshApi};
use crate::error::{DatasetError, Operation, OperationContext};

/// Variable holding bed levels at mesh nodes.
pub const NODE_Z_VAR: &str = "node_z";
/// Variable holding bed levels at mesh faces.
pub const FACE_Z_VAR: &str = "face_z";

const NODE_Z_LONG_NAME: &str = "z-coordinate of mesh nodes";
const FACE_Z_LONG_NAME: &str = "z-coordinate of mesh faces";

// ── State ──────────────────────────────────────────────────────

/// Lifecycle stage of a [`MeshDataset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatasetStatus {
    /// Not opened yet.
    Unopened,
    /// Open in progress.
    Initializing,
    /// Open and usable.
    Ready,
    /// Closed for good.
    Disposed,
}

enum DatasetState {
    Unopened,
    Initializing,
    Ready(Box<Caches>),
    Disposed,
    Failed(ErrorCode),
}

impl DatasetState {
    fn status(&self) -> DatasetStatus {
        match self {
            Self::Unopened => DatasetStatus::Unopened,
            Self::Initializing => DatasetStatus::Initializing,
            Self::Ready(_) => DatasetStatus::Ready,
            Self::Disposed | Self::Failed(_) => DatasetStatus::Disposed,
        }
    }
}

#[derive(Default)]
struct Caches {
    convention: Option<ConventionInfo>,
    coordinate_system: Option<Option<CoordinateSystemRef>>,
    meshes: IndexMap<MeshId, MeshCache>,
}

impl Caches {
    fn mesh(&mut self, mesh: MeshId) -> &mut MeshCache {
        self.meshes.entry(mesh).or_default()
    }
}

#[derive(Default)]
struct MeshCache {
    nodes: Option<Vec<NodeCoordinate>>,
    edges: Option<EdgeNodes>,
    faces: Option<FaceNodes>,
    name_counts: IndexMap<LocationType, usize>,
    names: IndexMap<LocationType, Vec<VarId>>,
}

/// How the dataset file is reached on initialization.
#[derive(Clone, Debug)]
enum Target {
    Open(OpenMode),
    Create(GlobalMetadata),
}

// ── MeshDataset ────────────────────────────────────────────────

/// One dataset file accessed through a [`MeshAccess`] implementation.
pub struct MeshDataset<A: MeshAccess = MeshApi> {
    path: PathBuf,
    target: Target,
    api: Option<A>,
    state: DatasetState,
}

impl MeshDataset<MeshApi> {
    /// Dataset for an existing file, opened on first use.
    pub fn new(path: impl Into<PathBuf>, mode: OpenMode, kind: &ApiKind) -> Self {
        Self::with_api(path, mode, MeshApi::create(kind))
    }

    /// Dataset for a new file carrying `metadata`, created on first use.
    pub fn new_file(
        path: impl Into<PathBuf>,
        metadata: GlobalMetadata,
        kind: &ApiKind,
    ) -> Self {
        Self::creating_with_api(path, metadata, MeshApi::create(kind))
    }
}

impl<A: MeshAccess> MeshDataset<A> {
    /// Dataset for an existing file on a caller-supplied API.
    pub fn with_api(path: impl Into<PathBuf>, mode: OpenMode, api: A) -> Self {
        Self::build(path.into(), Target::Open(mode), api)
    }

    /// Dataset for a new file on a caller-supplied API.
    pub fn creating_with_api(
        path: impl Into<PathBuf>,
        metadata: GlobalMetadata,
        api: A,
    ) -> Self {
        Self::build(path.into(), Target::Create(metadata), api)
    }

    fn build(path: PathBuf, target: Target, api: A) -> Self {
        Self {
            path,
            target,
            api: Some(api),
            state: DatasetState::Unopened,
        }
    }

    /// The dataset file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current lifecycle stage.
    pub fn status(&self) -> DatasetStatus {
        self.state.status()
    }

    /// The underlying API, until the dataset is disposed.
    pub fn api(&self) -> Option<&A> {
        self.api.as_ref()
    }

    // ── Lifecycle ──────────────────────────────────────────────

    /// Open (or create) the dataset. A no-op once ready.
    ///
    /// A failed open disposes the dataset; this and every later call then
    /// report the open failure.
    pub fn initialize(&mut self) -> Result<(), DatasetError> {
        match &self.state {
            DatasetState::Ready(_) => return Ok(()),
            DatasetState::Failed(code) => return Err(self.open_failed(*code)),
            DatasetState::Disposed | DatasetState::Initializing => {
                return Err(self.disposed());
            }
            DatasetState::Unopened => {}
        }
        self.state = DatasetState::Initializing;
        let result = match (self.api.as_mut(), &self.target) {
            (Some(api), Target::Open(mode)) => api.open(&self.path, *mode),
            (Some(api), Target::Create(metadata)) => api.create_file(&self.path, metadata),
            (None, _) => {
                self.state = DatasetState::Disposed;
                return Err(DatasetError::Disposed {
                    path: self.path.clone(),
                });
            }
        };
        match result {
            Ok(()) => {
                log::debug!("mesh dataset {} ready", self.path.display());
                self.state = DatasetState::Ready(Box::default());
                Ok(())
            }
            Err(code) => {
                log::debug!("opening {} failed: {code}", self.path.display());
                self.dispose();
                self.state = DatasetState::Failed(code);
                Err(self.open_failed(code))
            }
        }
    }

    /// Close the dataset, drop the API and clear every cache. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(mut api) = self.api.take() {
            if api.is_initialized() {
                if let Err(code) = api.close() {
                    log::warn!("closing {} failed: {code}", self.path.display());
                }
            }
        }
        if !matches!(self.state, DatasetState::Failed(_)) {
            self.state = DatasetState::Disposed;
        }
    }

    /// Whether the dataset opens as UGRID at or above the minimum version.
    /// Never fails; any error reads as `false`.
    pub fn is_valid(&mut self) -> bool {
        if self.api.is_none() {
            return false;
        }
        self.convention_info()
            .map(|info| info.is_supported_ugrid())
            .unwrap_or(false)
    }

    /// Convention of the dataset file, asked of this dataset's API without
    /// opening the dataset.
    pub fn file_convention(&mut self) -> Result<Convention, DatasetError> {
        match self.api.as_mut() {
            Some(api) => api
                .convention(Some(&self.path))
                .during(Operation::Convention),
            None => Err(DatasetError::Disposed {
                path: self.path.clone(),
            }),
        }
    }

    fn open_failed(&self, code: ErrorCode) -> DatasetError {
        DatasetError::Open {
            path: self.path.clone(),
            code,
        }
    }

    fn disposed(&self) -> DatasetError {
        DatasetError::Disposed {
            path: self.path.clone(),
        }
    }

    /// The API and caches of a ready dataset, opening it first if needed.
    fn session(&mut self) -> Result<(&mut A, &mut Caches), DatasetError> {
        self.initialize()?;
        match (self.api.as_mut(), &mut self.state) {
            (Some(api), DatasetState::Ready(caches)) => Ok((api, &mut **caches)),
            _ => Err(DatasetError::Disposed {
                path: self.path.clone(),
            }),
        }
    }

    // ── Dataset-wide ───────────────────────────────────────────

    /// Convention and version, read once.
    pub fn convention_info(&mut self) -> Result<ConventionInfo, DatasetError> {
        let (api, caches) = self.session()?;
        if let Some(info) = caches.convention {
            return Ok(info);
        }
        let convention = api.convention(None).during(Operation::Convention)?;
        let info = ConventionInfo::new(convention, api.version());
        caches.convention = Some(info);
        Ok(info)
    }

    /// Stored coordinate system, `None` when the file declares none.
    pub fn coordinate_system(&mut self) -> Result<Option<CoordinateSystemRef>, DatasetError> {
        let (api, caches) = self.session()?;
        if let Some(crs) = &caches.coordinate_system {
            return Ok(crs.clone());
        }
        let crs = match api
            .coordinate_system_code()
            .during(Operation::CoordinateSystem)?
        {
            0 => None,
            code => Some(CoordinateSystemRef::from_epsg(code)),
        };
        caches.coordinate_system = Some(crs.clone());
        Ok(crs)
    }

    /// Store a coordinate system, replacing any existing one.
    pub fn set_coordinate_system(
        &mut self,
        crs: &CoordinateSystemRef,
    ) -> Result<(), DatasetError> {
        let (api, caches) = self.session()?;
        api.write_coordinate_system(crs)
            .during(Operation::WriteCoordinateSystem)?;
        caches.coordinate_system = Some(Some(crs.clone()));
        Ok(())
    }

    /// Fill value reported by the most recent bed level read.
    pub fn z_fill_value(&mut self) -> Result<f64, DatasetError> {
        let (api, _) = self.session()?;
        Ok(api.z_fill_value())
    }

    // ── Counts ─────────────────────────────────────────────────

    /// Number of 2D meshes in the dataset.
    pub fn number_of_2d_meshes(&mut self) -> Result<usize, DatasetError> {
        let (api, _) = self.session()?;
        api.mesh_count().during(Operation::MeshCount)
    }

    /// Number of nodes of `mesh`.
    pub fn number_of_nodes(&mut self, mesh: MeshId) -> Result<usize, DatasetError> {
        let (api, _) = self.session()?;
        api.node_count(mesh).during(Operation::NodeCount)
    }

    /// Number of edges of `mesh`.
    pub fn number_of_edges(&mut self, mesh: MeshId) -> Result<usize, DatasetError> {
        let (api, _) = self.session()?;
        api.edge_count(mesh).during(Operation::EdgeCount)
    }

    /// Number of faces of `mesh`.
    pub fn number_of_faces(&mut self, mesh: MeshId) -> Result<usize, DatasetError> {
        let (api, _) = self.session()?;
        api.face_count(mesh).during(Operation::FaceCount)
    }

    /// Node count of the widest face of `mesh`.
    pub fn number_of_max_face_nodes(&mut self, mesh: MeshId) -> Result<usize, DatasetError> {
        let (api, _) = self.session()?;
        api.max_face_nodes(mesh).during(Operation::MaxFaceNodes)
    }

    /// Name of `mesh`.
    pub fn mesh_name(&mut self, mesh: MeshId) -> Result<String, DatasetError> {
        let (api, _) = self.session()?;
        api.mesh_name(mesh).during(Operation::MeshName)
    }

    // ── Topology ───────────────────────────────────────────────

    /// Every node of `mesh` as `(x, y, z)`.
    ///
    /// Nodes without a bed level variable get the fill value as `z`.
    pub fn all_node_coordinates(
        &mut self,
        mesh: MeshId,
    ) -> Result<&[NodeCoordinate], DatasetError> {
        let (api, caches) = self.session()?;
        let cache = caches.mesh(mesh);
        if cache.nodes.is_none() {
            cache.nodes = Some(fetch_nodes(api, mesh)?);
        }
        Ok(cache.nodes.as_deref().unwrap_or_default())
    }

    /// Edge connectivity of `mesh`.
    pub fn edge_nodes(&mut self, mesh: MeshId) -> Result<&EdgeNodes, DatasetError> {
        let (api, caches) = self.session()?;
        let cache = caches.mesh(mesh);
        let edges = match cache.edges.take() {
            Some(edges) => edges,
            None => api.edge_nodes(mesh).during(Operation::EdgeNodes)?,
        };
        let edges: &EdgeNodes = cache.edges.insert(edges);
        Ok(edges)
    }

    /// Face connectivity of `mesh`, padded to its widest face.
    pub fn face_nodes(&mut self, mesh: MeshId) -> Result<&FaceNodes, DatasetError> {
        let (api, caches) = self.session()?;
        let cache = caches.mesh(mesh);
        let faces = match cache.faces.take() {
            Some(faces) => faces,
            None => api.face_nodes(mesh).during(Operation::FaceNodes)?,
        };
        let faces: &FaceNodes = cache.faces.insert(faces);
        Ok(faces)
    }

    /// Number of data variables of `mesh` at `location`.
    pub fn number_of_names_for_location(
        &mut self,
        mesh: MeshId,
        location: LocationType,
    ) -> Result<usize, DatasetError> {
        let (api, caches) = self.session()?;
        let cache = caches.mesh(mesh);
        if let Some(&count) = cache.name_counts.get(&location) {
            return Ok(count);
        }
        let count = api
            .var_count(mesh, location)
            .during(Operation::NameCount)?;
        cache.name_counts.insert(location, count);
        Ok(count)
    }

    /// Ids of the data variables of `mesh` at `location`.
    pub fn names_at_location(
        &mut self,
        mesh: MeshId,
        location: LocationType,
    ) -> Result<&[VarId], DatasetError> {
        let (api, caches) = self.session()?;
        let cache = caches.mesh(mesh);
        if !cache.names.contains_key(&location) {
            let ids = api.var_ids(mesh, location).during(Operation::Names)?;
            cache.names.insert(location, ids);
        }
        Ok(cache
            .names
            .get(&location)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    // ── Writes ─────────────────────────────────────────────────

    /// Overwrite the x/y coordinates of every node of `mesh`.
    pub fn rewrite_grid_coordinates(
        &mut self,
        mesh: MeshId,
        xs: &[f64],
        ys: &[f64],
    ) -> Result<(), DatasetError> {
        let (api, caches) = self.session()?;
        api.write_xy_coordinates(mesh, xs, ys)
            .during(Operation::RewriteCoordinates)?;
        caches.mesh(mesh).nodes = None;
        Ok(())
    }

    /// Define a new mesh.
    pub fn define_mesh(&mut self, geometry: &MeshGeometry) -> Result<MeshId, DatasetError> {
        let (api, caches) = self.session()?;
        let mesh = api.define_mesh(geometry).during(Operation::DefineMesh)?;
        caches.meshes.shift_remove(&mesh);
        Ok(mesh)
    }

    // ── Bed levels ─────────────────────────────────────────────

    /// Write bed levels at the nodes of `mesh`.
    pub fn write_z_values_at_nodes(
        &mut self,
        mesh: MeshId,
        values: &[f64],
    ) -> Result<(), DatasetError> {
        let (api, caches) = self.session()?;
        api.write_z_values(mesh, LocationType::Node, NODE_Z_VAR, NODE_Z_LONG_NAME, values)
            .during(Operation::WriteNodeZ)?;
        let cache = caches.mesh(mesh);
        cache.nodes = None;
        cache.name_counts.clear();
        cache.names.clear();
        Ok(())
    }

    /// Write bed levels at the faces of `mesh`.
    pub fn write_z_values_at_faces(
        &mut self,
        mesh: MeshId,
        values: &[f64],
    ) -> Result<(), DatasetError> {
        let (api, caches) = self.session()?;
        api.write_z_values(mesh, LocationType::Face, FACE_Z_VAR, FACE_Z_LONG_NAME, values)
            .during(Operation::WriteFaceZ)?;
        let cache = caches.mesh(mesh);
        cache.name_counts.clear();
        cache.names.clear();
        Ok(())
    }

    /// Bed levels at the nodes of `mesh`; empty when none were written.
    pub fn read_z_values_at_nodes(&mut self, mesh: MeshId) -> Result<Vec<f64>, DatasetError> {
        let (api, _) = self.session()?;
        api.read_z_values(mesh, LocationType::Node, NODE_Z_VAR)
            .during(Operation::ReadNodeZ)
    }

    /// Bed levels at the faces of `mesh`; empty when none were written.
    pub fn read_z_values_at_faces(&mut self, mesh: MeshId) -> Result<Vec<f64>, DatasetError> {
        let (api, _) = self.session()?;
        api.read_z_values(mesh, LocationType::Face, FACE_Z_VAR)
            .during(Operation::ReadFaceZ)
    }
}

fn fetch_nodes<A: MeshAccess>(
    api: &mut A,
    mesh: MeshId,
) -> Result<Vec<NodeCoordinate>, DatasetError> {
    let count = api.node_count(mesh).during(Operation::NodeCount)?;
    if count == 0 {
        return Ok(Vec::new());
    }
    let xs = api.node_x(mesh).during(Operation::NodeX)?;
    let ys = api.node_y(mesh).during(Operation::NodeY)?;
    let zs = api.node_z(mesh).during(Operation::NodeZ)?;
    Ok(xs
        .into_iter()
        .zip(ys)
        .zip(zs)
        .map(|((x, y), z)| NodeCoordinate::new(x, y, z))
        .collect())
}

impl<A: MeshAccess> Drop for MeshDataset<A> {
    fn drop(&mut self) {
        self.dispose();
    }
}
