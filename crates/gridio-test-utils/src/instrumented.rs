//! A call-recording, fault-injecting wrapper around a native library.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use gridio_core::{
    ApiResult, Convention, ConventionInfo, CoordinateSystemRef, DatasetHandle, ErrorCode,
    GlobalMetadata, LocationType, MeshGeometry, MeshId, OpenMode, VarId,
};
use gridio_native::{DefaultLibrary, NativeMeshLibrary, Opened, VarSpec};

/// Injected behavior for one native operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Return this status without calling the wrapped library.
    Fail(ErrorCode),
    /// Panic, as a crashing native library would.
    Panic,
}

#[derive(Default)]
struct Shared {
    calls: Vec<&'static str>,
    faults: HashMap<&'static str, Fault>,
}

/// Observer and fault switchboard for an [`InstrumentedLibrary`].
///
/// Remains usable after the library has been moved into an API.
#[derive(Clone, Default)]
pub struct LibraryProbe {
    shared: Arc<Mutex<Shared>>,
}

impl LibraryProbe {
    /// Names of the native calls made so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.shared.lock().unwrap().calls.clone()
    }

    /// Total number of native calls made so far.
    pub fn call_count(&self) -> usize {
        self.shared.lock().unwrap().calls.len()
    }

    /// How often `op` was called.
    pub fn count_of(&self, op: &str) -> usize {
        self.shared
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c == op)
            .count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.shared.lock().unwrap().calls.clear();
    }

    /// Make every call to `op` fail with `code`.
    pub fn fail(&self, op: &'static str, code: ErrorCode) {
        self.inject(op, Fault::Fail(code));
    }

    /// Make every call to `op` panic.
    pub fn panic_on(&self, op: &'static str) {
        self.inject(op, Fault::Panic);
    }

    /// Install a fault for `op`.
    pub fn inject(&self, op: &'static str, fault: Fault) {
        self.shared.lock().unwrap().faults.insert(op, fault);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.shared.lock().unwrap().faults.clear();
    }

    fn record(&self, op: &'static str) -> Option<Fault> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(op);
        shared.faults.get(op).copied()
    }
}

/// Wraps a [`NativeMeshLibrary`], recording every call and applying faults.
pub struct InstrumentedLibrary<L = DefaultLibrary> {
    inner: L,
    probe: LibraryProbe,
}

impl InstrumentedLibrary<DefaultLibrary> {
    /// Instrument the default library.
    pub fn new() -> Self {
        Self::wrap(DefaultLibrary::default())
    }
}

impl Default for InstrumentedLibrary<DefaultLibrary> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: NativeMeshLibrary> InstrumentedLibrary<L> {
    /// Instrument `inner`.
    pub fn wrap(inner: L) -> Self {
        Self {
            inner,
            probe: LibraryProbe::default(),
        }
    }

    /// A probe sharing this library's call log and faults.
    pub fn probe(&self) -> LibraryProbe {
        self.probe.clone()
    }

    fn run<T>(&mut self, op: &'static str, f: impl FnOnce(&mut L) -> ApiResult<T>) -> ApiResult<T> {
        match self.probe.record(op) {
            Some(Fault::Fail(code)) => Err(code),
            Some(Fault::Panic) => panic!("injected fault in {op}"),
            None => f(&mut self.inner),
        }
    }
}

impl<L: NativeMeshLibrary> NativeMeshLibrary for InstrumentedLibrary<L> {
    fn open(&mut self, path: &Path, mode: OpenMode) -> ApiResult<Opened> {
        self.run("open", |l| l.open(path, mode))
    }

    fn create(&mut self, path: &Path) -> ApiResult<DatasetHandle> {
        self.run("create", |l| l.create(path))
    }

    fn close(&mut self, handle: DatasetHandle) -> ApiResult<()> {
        self.run("close", |l| l.close(handle))
    }

    fn inq_conventions(&mut self, handle: DatasetHandle) -> ApiResult<ConventionInfo> {
        self.run("inq_conventions", |l| l.inq_conventions(handle))
    }

    fn adheres_to_conventions(
        &mut self,
        handle: DatasetHandle,
        convention: Convention,
    ) -> ApiResult<bool> {
        self.run("adheres_to_conventions", |l| {
            l.adheres_to_conventions(handle, convention)
        })
    }

    fn add_global_attributes(
        &mut self,
        handle: DatasetHandle,
        metadata: &GlobalMetadata,
    ) -> ApiResult<()> {
        self.run("add_global_attributes", |l| {
            l.add_global_attributes(handle, metadata)
        })
    }

    fn mesh_count(&mut self, handle: DatasetHandle) -> ApiResult<usize> {
        self.run("mesh_count", |l| l.mesh_count(handle))
    }

    fn mesh_name(&mut self, handle: DatasetHandle, mesh: MeshId) -> ApiResult<String> {
        self.run("mesh_name", |l| l.mesh_name(handle, mesh))
    }

    fn node_count(&mut self, handle: DatasetHandle, mesh: MeshId) -> ApiResult<usize> {
        self.run("node_count", |l| l.node_count(handle, mesh))
    }

    fn edge_count(&mut self, handle: DatasetHandle, mesh: MeshId) -> ApiResult<usize> {
        self.run("edge_count", |l| l.edge_count(handle, mesh))
    }

    fn face_count(&mut self, handle: DatasetHandle, mesh: MeshId) -> ApiResult<usize> {
        self.run("face_count", |l| l.face_count(handle, mesh))
    }

    fn max_face_nodes(&mut self, handle: DatasetHandle, mesh: MeshId) -> ApiResult<usize> {
        self.run("max_face_nodes", |l| l.max_face_nodes(handle, mesh))
    }

    fn node_coordinates(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        xs: &mut [f64],
        ys: &mut [f64],
    ) -> ApiResult<()> {
        self.run("node_coordinates", |l| l.node_coordinates(handle, mesh, xs, ys))
    }

    fn put_node_coordinates(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        xs: &[f64],
        ys: &[f64],
    ) -> ApiResult<()> {
        self.run("put_node_coordinates", |l| {
            l.put_node_coordinates(handle, mesh, xs, ys)
        })
    }

    fn edge_nodes(&mut self, handle: DatasetHandle, mesh: MeshId, out: &mut [i32]) -> ApiResult<()> {
        self.run("edge_nodes", |l| l.edge_nodes(handle, mesh, out))
    }

    fn face_nodes(&mut self, handle: DatasetHandle, mesh: MeshId, out: &mut [i32]) -> ApiResult<i32> {
        self.run("face_nodes", |l| l.face_nodes(handle, mesh, out))
    }

    fn def_mesh(&mut self, handle: DatasetHandle, geometry: &MeshGeometry) -> ApiResult<MeshId> {
        self.run("def_mesh", |l| l.def_mesh(handle, geometry))
    }

    fn coordinate_system(&mut self, handle: DatasetHandle) -> ApiResult<i32> {
        self.run("coordinate_system", |l| l.coordinate_system(handle))
    }

    fn put_coordinate_system(
        &mut self,
        handle: DatasetHandle,
        crs: &CoordinateSystemRef,
    ) -> ApiResult<()> {
        self.run("put_coordinate_system", |l| l.put_coordinate_system(handle, crs))
    }

    fn var_count(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        location: LocationType,
    ) -> ApiResult<usize> {
        self.run("var_count", |l| l.var_count(handle, mesh, location))
    }

    fn inq_varids(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        location: LocationType,
        out: &mut [VarId],
    ) -> ApiResult<()> {
        self.run("inq_varids", |l| l.inq_varids(handle, mesh, location, out))
    }

    fn inq_varid(&mut self, handle: DatasetHandle, mesh: MeshId, name: &str) -> ApiResult<VarId> {
        self.run("inq_varid", |l| l.inq_varid(handle, mesh, name))
    }

    fn inq_varid_by_standard_name(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        location: LocationType,
        standard_name: &str,
    ) -> ApiResult<Option<VarId>> {
        self.run("inq_varid_by_standard_name", |l| {
            l.inq_varid_by_standard_name(handle, mesh, location, standard_name)
        })
    }

    fn def_var(&mut self, handle: DatasetHandle, mesh: MeshId, spec: &VarSpec) -> ApiResult<VarId> {
        self.run("def_var", |l| l.def_var(handle, mesh, spec))
    }

    fn get_var(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        location: LocationType,
        name: &str,
        out: &mut [f64],
    ) -> ApiResult<f64> {
        self.run("get_var", |l| l.get_var(handle, mesh, location, name, out))
    }

    fn put_var(
        &mut self,
        handle: DatasetHandle,
        mesh: MeshId,
        location: LocationType,
        name: &str,
        values: &[f64],
    ) -> ApiResult<()> {
        self.run("put_var", |l| l.put_var(handle, mesh, location, name, values))
    }
}
