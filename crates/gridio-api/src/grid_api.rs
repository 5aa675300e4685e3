//! Low-level mesh API: one open dataset, fault-guarded native calls.
//!
//! [`GridApi`] owns a native library and at most one open dataset handle.
//! Every native call runs inside a panic guard, so a fault inside the
//! library surfaces as [`ErrorCode::GENERAL_FATAL_ERR`] rather than
//! unwinding into the caller. Calls that need an open dataset fail with the
//! same code, without touching the library, when nothing is open.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use gridio_core::{
    ApiResult, Convention, ConventionInfo, CoordinateSystemRef, DatasetHandle, ErrorCode,
    GlobalMetadata, LocationType, MeshGeometry, MeshId, OpenMode, VarId, UG_CONV_MIN_VERSION,
};
use gridio_native::{DefaultLibrary, DefaultStorage, NativeMeshLibrary, VarSpec};

use crate::sniffer::{ConventionSniffer, StorageSniffer};

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Low-level access to one dataset through a native mesh library.
pub struct GridApi<L: NativeMeshLibrary = DefaultLibrary> {
    library: L,
    sniffer: Box<dyn ConventionSniffer>,
    handle: Option<DatasetHandle>,
    info: ConventionInfo,
}

impl GridApi<DefaultLibrary> {
    /// API over the default library.
    pub fn new() -> Self {
        Self::with_library(DefaultLibrary::default())
    }
}

impl Default for GridApi<DefaultLibrary> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: NativeMeshLibrary> GridApi<L> {
    /// API over `library`, sniffing unreadable files through default storage.
    pub fn with_library(library: L) -> Self {
        Self::with_sniffer(library, StorageSniffer::<DefaultStorage>::default())
    }

    /// API over `library` with a custom last-resort convention sniffer.
    pub fn with_sniffer(library: L, sniffer: impl ConventionSniffer + 'static) -> Self {
        Self {
            library,
            sniffer: Box::new(sniffer),
            handle: None,
            info: ConventionInfo::NULL,
        }
    }

    /// The wrapped library.
    pub fn library(&self) -> &L {
        &self.library
    }

    /// Whether a dataset is open.
    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    /// Handle of the open dataset.
    pub fn handle(&self) -> Option<DatasetHandle> {
        self.handle
    }

    /// Convention info cached when the dataset was opened.
    pub fn convention_info(&self) -> Option<ConventionInfo> {
        self.handle.map(|_| self.info)
    }

    /// Run a native call, converting a panic into `GENERAL_FATAL_ERR`.
    fn call<T>(&mut self, op: &'static str, f: impl FnOnce(&mut L) -> ApiResult<T>) -> ApiResult<T> {
        let library = &mut self.library;
        match catch_unwind(AssertUnwindSafe(|| f(library))) {
            Ok(result) => result,
            Err(payload) => {
                log::error!("native call {op} faulted: {}", panic_message(payload.as_ref()));
                Err(ErrorCode::GENERAL_FATAL_ERR)
            }
        }
    }

    /// Run a native call against the open dataset.
    fn with_handle<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut L, DatasetHandle) -> ApiResult<T>,
    ) -> ApiResult<T> {
        let Some(handle) = self.handle else {
            return Err(ErrorCode::GENERAL_FATAL_ERR);
        };
        self.call(op, |lib| f(lib, handle))
    }

    // ── lifecycle ──────────────────────────────────────────────

    /// Open a dataset, closing any dataset already open.
    pub fn open(&mut self, path: &Path, mode: OpenMode) -> ApiResult<()> {
        self.close()?;
        let opened = self.call("open", |lib| lib.open(path, mode))?;
        self.handle = Some(opened.handle);
        self.info = opened.info;
        Ok(())
    }

    /// Create a dataset with global attributes and keep it open for writing.
    pub fn create_file(&mut self, path: &Path, metadata: &GlobalMetadata) -> ApiResult<()> {
        self.close()?;
        let handle = self.call("create", |lib| lib.create(path))?;
        if let Err(code) = self.call("add_global_attributes", |lib| {
            lib.add_global_attributes(handle, metadata)
        }) {
            if let Err(close) = self.call("close", |lib| lib.close(handle)) {
                log::warn!("closing half-created {} failed: {close}", path.display());
            }
            return Err(code);
        }
        self.info = self
            .call("inq_conventions", |lib| lib.inq_conventions(handle))
            .unwrap_or(ConventionInfo::NULL);
        self.handle = Some(handle);
        Ok(())
    }

    /// Close the open dataset. A failed close keeps the handle.
    pub fn close(&mut self) -> ApiResult<()> {
        let Some(handle) = self.handle else {
            return Ok(());
        };
        self.call("close", |lib| lib.close(handle))?;
        self.handle = None;
        self.info = ConventionInfo::NULL;
        Ok(())
    }

    // ── conventions ────────────────────────────────────────────

    /// Convention of the file at `path`, or of the open dataset.
    ///
    /// Without a path this is `Null` when nothing is open and the cached
    /// convention otherwise (`Other` if the library reported none).
    pub fn convention(&mut self, path: Option<&Path>) -> Convention {
        match path {
            Some(path) => self.detect_convention(path),
            None if !self.is_initialized() => Convention::Null,
            None => match self.info.convention {
                Convention::Null => Convention::Other,
                convention => convention,
            },
        }
    }

    /// Version of the open dataset's convention, NaN when nothing is open.
    pub fn version(&self) -> f64 {
        if self.is_initialized() {
            self.info.version
        } else {
            f64::NAN
        }
    }

    /// Detect the convention of a file, trying each strategy in order.
    pub fn detect_convention(&mut self, path: &Path) -> Convention {
        if let Some(convention) = self.declared_convention(path) {
            log::debug!("{}: library reports {convention}", path.display());
            return convention;
        }
        if let Some(convention) = self.legacy_convention(path) {
            log::debug!("{}: legacy check reports {convention}", path.display());
            return convention;
        }
        let sniffed = catch_unwind(AssertUnwindSafe(|| self.sniffer.sniff(path)));
        match sniffed {
            Ok(Ok(info)) => {
                log::debug!("{}: sniffer reports {}", path.display(), info.convention);
                info.normalized()
            }
            Ok(Err(e)) => {
                log::warn!("convention detection failed: {e}");
                Convention::Other
            }
            Err(payload) => {
                log::error!("convention sniffer faulted: {}", panic_message(payload.as_ref()));
                Convention::Other
            }
        }
    }

    /// Convention as reported on open; `None` unless known and supported.
    fn declared_convention(&mut self, path: &Path) -> Option<Convention> {
        let opened = self.call("open", |lib| lib.open(path, OpenMode::Read)).ok()?;
        if let Err(code) = self.call("close", |lib| lib.close(opened.handle)) {
            log::debug!("ignoring close failure {code} for {}", path.display());
        }
        let info = opened.info;
        match info.convention {
            Convention::Null => None,
            Convention::Ugrid if !info.is_supported_ugrid() => None,
            convention => Some(convention),
        }
    }

    /// Ask the library whether the file adheres to UGRID at all.
    fn legacy_convention(&mut self, path: &Path) -> Option<Convention> {
        let handle = self
            .call("open", |lib| lib.open(path, OpenMode::Read))
            .ok()?
            .handle;
        let adheres = self
            .call("adheres_to_conventions", |lib| {
                lib.adheres_to_conventions(handle, Convention::Ugrid)
            })
            .unwrap_or(false);
        let version = self
            .call("inq_conventions", |lib| lib.inq_conventions(handle))
            .map(|info| info.version)
            .unwrap_or(0.0);
        if let Err(code) = self.call("close", |lib| lib.close(handle)) {
            log::debug!("ignoring close failure {code} for {}", path.display());
        }
        if adheres && version >= UG_CONV_MIN_VERSION {
            Some(Convention::Ugrid)
        } else {
            Some(Convention::Other)
        }
    }

    // ── queries ────────────────────────────────────────────────

    /// Number of 2D meshes.
    pub fn mesh_count(&mut self) -> ApiResult<usize> {
        self.with_handle("mesh_count", |lib, h| lib.mesh_count(h))
    }

    /// Name of a mesh.
    pub fn mesh_name(&mut self, mesh: MeshId) -> ApiResult<String> {
        self.with_handle("mesh_name", |lib, h| lib.mesh_name(h, mesh))
    }

    /// Number of nodes.
    pub fn node_count(&mut self, mesh: MeshId) -> ApiResult<usize> {
        self.with_handle("node_count", |lib, h| lib.node_count(h, mesh))
    }

    /// Number of edges.
    pub fn edge_count(&mut self, mesh: MeshId) -> ApiResult<usize> {
        self.with_handle("edge_count", |lib, h| lib.edge_count(h, mesh))
    }

    /// Number of faces.
    pub fn face_count(&mut self, mesh: MeshId) -> ApiResult<usize> {
        self.with_handle("face_count", |lib, h| lib.face_count(h, mesh))
    }

    /// Widest face.
    pub fn max_face_nodes(&mut self, mesh: MeshId) -> ApiResult<usize> {
        self.with_handle("max_face_nodes", |lib, h| lib.max_face_nodes(h, mesh))
    }

    /// EPSG code of the stored coordinate system.
    pub fn coordinate_system(&mut self) -> ApiResult<i32> {
        self.with_handle("coordinate_system", |lib, h| lib.coordinate_system(h))
    }

    /// Number of data variables at a location.
    pub fn var_count(&mut self, mesh: MeshId, location: LocationType) -> ApiResult<usize> {
        self.with_handle("var_count", |lib, h| lib.var_count(h, mesh, location))
    }

    /// Fill variable ids at a location.
    pub fn inq_varids(
        &mut self,
        mesh: MeshId,
        location: LocationType,
        out: &mut [VarId],
    ) -> ApiResult<()> {
        self.with_handle("inq_varids", |lib, h| lib.inq_varids(h, mesh, location, out))
    }

    /// Id of a named variable.
    pub fn inq_varid(&mut self, mesh: MeshId, name: &str) -> ApiResult<VarId> {
        self.with_handle("inq_varid", |lib, h| lib.inq_varid(h, mesh, name))
    }

    /// Id of the variable with `standard_name` at a location.
    pub fn inq_varid_by_standard_name(
        &mut self,
        mesh: MeshId,
        location: LocationType,
        standard_name: &str,
    ) -> ApiResult<Option<VarId>> {
        self.with_handle("inq_varid_by_standard_name", |lib, h| {
            lib.inq_varid_by_standard_name(h, mesh, location, standard_name)
        })
    }

    // ── payloads ───────────────────────────────────────────────

    /// Fill node coordinate buffers.
    pub fn node_coordinates(&mut self, mesh: MeshId, xs: &mut [f64], ys: &mut [f64]) -> ApiResult<()> {
        self.with_handle("node_coordinates", |lib, h| {
            lib.node_coordinates(h, mesh, xs, ys)
        })
    }

    /// Fill the edge connectivity buffer.
    pub fn edge_nodes(&mut self, mesh: MeshId, out: &mut [i32]) -> ApiResult<()> {
        self.with_handle("edge_nodes", |lib, h| lib.edge_nodes(h, mesh, out))
    }

    /// Fill the face connectivity buffer; returns the fill value.
    pub fn face_nodes(&mut self, mesh: MeshId, out: &mut [i32]) -> ApiResult<i32> {
        self.with_handle("face_nodes", |lib, h| lib.face_nodes(h, mesh, out))
    }

    /// Fill a variable buffer; returns the fill value.
    pub fn get_var(
        &mut self,
        mesh: MeshId,
        location: LocationType,
        name: &str,
        out: &mut [f64],
    ) -> ApiResult<f64> {
        self.with_handle("get_var", |lib, h| lib.get_var(h, mesh, location, name, out))
    }

    // ── writes ─────────────────────────────────────────────────

    /// Overwrite node coordinates.
    pub fn put_node_coordinates(&mut self, mesh: MeshId, xs: &[f64], ys: &[f64]) -> ApiResult<()> {
        self.with_handle("put_node_coordinates", |lib, h| {
            lib.put_node_coordinates(h, mesh, xs, ys)
        })
    }

    /// Define a data variable.
    pub fn def_var(&mut self, mesh: MeshId, spec: &VarSpec) -> ApiResult<VarId> {
        self.with_handle("def_var", |lib, h| lib.def_var(h, mesh, spec))
    }

    /// Overwrite a variable.
    pub fn put_var(
        &mut self,
        mesh: MeshId,
        location: LocationType,
        name: &str,
        values: &[f64],
    ) -> ApiResult<()> {
        self.with_handle("put_var", |lib, h| lib.put_var(h, mesh, location, name, values))
    }

    /// Define a complete mesh.
    pub fn def_mesh(&mut self, geometry: &MeshGeometry) -> ApiResult<MeshId> {
        self.with_handle("def_mesh", |lib, h| lib.def_mesh(h, geometry))
    }

    /// Store a coordinate system.
    pub fn put_coordinate_system(&mut self, crs: &CoordinateSystemRef) -> ApiResult<()> {
        self.with_handle("put_coordinate_system", |lib, h| {
            lib.put_coordinate_system(h, crs)
        })
    }
}

impl<L: NativeMeshLibrary> Drop for GridApi<L> {
    fn drop(&mut self) {
        if let Err(code) = self.close() {
            log::warn!("closing dataset on drop failed: {code}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridio_native::{DocumentStorage, UgridLibrary};

    fn api() -> GridApi<UgridLibrary<DocumentStorage>> {
        GridApi::with_sniffer(
            UgridLibrary::new(DocumentStorage),
            StorageSniffer::new(DocumentStorage),
        )
    }

    #[test]
    fn uninitialized_calls_are_fatal() {
        let mut api = api();
        assert!(!api.is_initialized());
        assert_eq!(api.mesh_count(), Err(ErrorCode::GENERAL_FATAL_ERR));
        assert_eq!(api.node_count(MeshId(1)), Err(ErrorCode::GENERAL_FATAL_ERR));
        assert_eq!(api.coordinate_system(), Err(ErrorCode::GENERAL_FATAL_ERR));
        assert!(api.version().is_nan());
        assert_eq!(api.convention(None), Convention::Null);
        assert_eq!(api.close(), Ok(()));
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut api = api();
        let err = api.open(&dir.path().join("nope.json"), OpenMode::Read);
        assert_eq!(err, Err(ErrorCode::IONC_ENOPEN));
        assert!(!api.is_initialized());
    }

    #[test]
    fn created_file_reports_ugrid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        let mut api = api();
        api.create_file(&path, &GlobalMetadata::default()).unwrap();
        assert!(api.is_initialized());
        assert_eq!(api.convention(None), Convention::Ugrid);
        assert_eq!(api.version(), 1.0);
        api.close().unwrap();
        assert_eq!(api.convention(Some(&path)), Convention::Ugrid);
    }

    #[test]
    fn panic_message_reads_both_payload_kinds() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
    }
}
