//! Host side of the proxy: one worker process per [`IsolatedGridApi`].
//!
//! Calls are synchronous. The host writes one request line to the worker's
//! stdin and waits on a channel, fed by a reader thread draining the
//! worker's stdout, for at most `call_timeout`. Any transport failure kills
//! the worker and leaves the proxy dead: every later call returns
//! `GENERAL_FATAL_ERR` immediately, until `open` or `create_file` starts a
//! fresh worker.

use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use gridio_api::MeshAccess;
use gridio_core::{
    ApiResult, Convention, CoordinateSystemRef, EdgeNodes, ErrorCode, FaceNodes, GlobalMetadata,
    LocationType, MeshGeometry, MeshId, OpenMode, VarId, DEFAULT_FILL_VALUE,
};
use thiserror::Error;

use crate::config::ProxyConfig;
use crate::protocol::{self, ProtocolError, Reply, Request, RequestFrame};

// ── TransportError ─────────────────────────────────────────────

/// Why an exchange with the worker failed.
#[derive(Error, Debug)]
enum TransportError {
    #[error("cannot start worker: {0}")]
    Spawn(#[source] io::Error),
    #[error("cannot send request: {0}")]
    Send(#[source] io::Error),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("worker exited")]
    Disconnected,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

// ── WorkerProcess ──────────────────────────────────────────────

struct WorkerProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    responses: Receiver<String>,
    reader: Option<JoinHandle<()>>,
}

impl WorkerProcess {
    fn spawn(config: &ProxyConfig) -> io::Result<Self> {
        let mut child = Command::new(&config.worker_program)
            .envs(config.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdin = child.stdin.take();
        let Some(stdout) = child.stdout.take() else {
            reap(&mut child);
            return Err(io::Error::other("worker stdout unavailable"));
        };
        let (tx, responses) = crossbeam_channel::unbounded();
        let reader = thread::Builder::new()
            .name(format!("gridio-reader-{}", child.id()))
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        let reader = match reader {
            Ok(handle) => handle,
            Err(e) => {
                reap(&mut child);
                return Err(e);
            }
        };
        log::debug!(
            "started worker {} ({})",
            child.id(),
            config.worker_program.display()
        );
        Ok(Self {
            child,
            stdin,
            responses,
            reader: Some(reader),
        })
    }

    fn id(&self) -> u32 {
        self.child.id()
    }

    fn send(&mut self, line: &str) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::BrokenPipe))?;
        writeln!(stdin, "{line}")?;
        stdin.flush()
    }

    /// One request/response round trip. The outer error is a transport
    /// failure; the inner result is what the worker reported.
    fn exchange(
        &mut self,
        frame: &RequestFrame,
        timeout: Duration,
    ) -> Result<ApiResult<Reply>, TransportError> {
        let line = protocol::encode(frame)?;
        self.send(&line).map_err(TransportError::Send)?;
        match self.responses.recv_timeout(timeout) {
            Ok(line) => Ok(protocol::decode_response(&line, frame.seq)?.result),
            Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Disconnected),
        }
    }

    /// Close stdin, give the worker `grace` to exit, then kill it.
    fn finish(mut self, grace: Duration) {
        self.stdin.take();
        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    log::debug!("worker {} exited with {status}", self.id());
                    break;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
                Ok(None) => {
                    log::warn!("worker {} did not exit within {grace:?}, killing", self.id());
                    self.kill();
                    break;
                }
                Err(e) => {
                    log::warn!("cannot poll worker {}: {e}", self.id());
                    self.kill();
                    break;
                }
            }
        }
        self.join_reader();
    }

    fn kill(&mut self) {
        self.stdin.take();
        reap(&mut self.child);
    }

    fn join_reader(&mut self) {
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                log::warn!("reader thread of worker {} panicked", self.id());
            }
        }
    }
}

/// Kill `child` and wait for it, logging what fails.
fn reap(child: &mut Child) {
    let id = child.id();
    if let Err(e) = child.kill() {
        log::debug!("kill worker {id}: {e}");
    }
    if let Err(e) = child.wait() {
        log::debug!("reap worker {id}: {e}");
    }
}

// ── IsolatedGridApi ────────────────────────────────────────────

enum WorkerState {
    /// No worker yet, or shut down cleanly.
    Idle,
    Running(WorkerProcess),
    /// The worker crashed, hung or broke protocol.
    Dead,
}

/// [`MeshAccess`] implementation forwarding every call to a worker process.
pub struct IsolatedGridApi {
    config: ProxyConfig,
    state: WorkerState,
    seq: u64,
    open: bool,
}

impl IsolatedGridApi {
    /// Proxy launching workers as described by `config`. The worker starts
    /// on first use.
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            state: WorkerState::Idle,
            seq: 0,
            open: false,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Whether the worker died and has not been replaced.
    pub fn is_dead(&self) -> bool {
        matches!(self.state, WorkerState::Dead)
    }

    /// Process id of the running worker.
    pub fn worker_id(&self) -> Option<u32> {
        match &self.state {
            WorkerState::Running(worker) => Some(worker.id()),
            _ => None,
        }
    }

    /// Close the remote dataset and stop the worker.
    ///
    /// The next `open` or `create_file` starts a new worker.
    pub fn shutdown(&mut self) {
        if self.open {
            if let Err(code) = self.close() {
                log::warn!("closing remote dataset during shutdown failed: {code}");
            }
        }
        let WorkerState::Running(mut worker) =
            std::mem::replace(&mut self.state, WorkerState::Idle)
        else {
            self.open = false;
            return;
        };
        self.seq += 1;
        let frame = RequestFrame {
            seq: self.seq,
            request: Request::Shutdown,
        };
        if let Err(e) = worker.exchange(&frame, self.config.shutdown_grace) {
            log::debug!("worker {} shutdown exchange: {e}", worker.id());
        }
        worker.finish(self.config.shutdown_grace);
        self.open = false;
    }

    fn mark_dead(&mut self, op: &str, error: &TransportError) {
        log::error!("worker failed during {op}: {error}");
        if let WorkerState::Running(mut worker) =
            std::mem::replace(&mut self.state, WorkerState::Dead)
        {
            worker.kill();
            worker.join_reader();
        }
        self.open = false;
    }

    fn call(&mut self, request: Request) -> ApiResult<Reply> {
        let op = request.name();
        if matches!(self.state, WorkerState::Idle) {
            match WorkerProcess::spawn(&self.config) {
                Ok(worker) => self.state = WorkerState::Running(worker),
                Err(e) => {
                    self.mark_dead(op, &TransportError::Spawn(e));
                    return Err(ErrorCode::GENERAL_FATAL_ERR);
                }
            }
        }
        let WorkerState::Running(worker) = &mut self.state else {
            return Err(ErrorCode::GENERAL_FATAL_ERR);
        };
        self.seq += 1;
        let frame = RequestFrame {
            seq: self.seq,
            request,
        };
        match worker.exchange(&frame, self.config.call_timeout) {
            Ok(result) => result,
            Err(e) => {
                self.mark_dead(op, &e);
                Err(ErrorCode::GENERAL_FATAL_ERR)
            }
        }
    }

    /// Call requiring an open dataset; fails locally otherwise.
    fn call_open(&mut self, request: Request) -> ApiResult<Reply> {
        if !self.is_initialized() {
            return Err(ErrorCode::GENERAL_FATAL_ERR);
        }
        self.call(request)
    }

    fn revive(&mut self) {
        if self.is_dead() {
            log::debug!("replacing dead worker");
            self.state = WorkerState::Idle;
        }
    }
}

impl Drop for IsolatedGridApi {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl MeshAccess for IsolatedGridApi {
    fn open(&mut self, path: &Path, mode: OpenMode) -> ApiResult<()> {
        self.revive();
        let result = self
            .call(Request::Open {
                path: path.to_path_buf(),
                mode,
            })
            .and_then(Reply::into_unit);
        self.open = result.is_ok();
        result
    }

    fn create_file(&mut self, path: &Path, metadata: &GlobalMetadata) -> ApiResult<()> {
        self.revive();
        let result = self
            .call(Request::CreateFile {
                path: path.to_path_buf(),
                metadata: metadata.clone(),
            })
            .and_then(Reply::into_unit);
        self.open = result.is_ok();
        result
    }

    fn close(&mut self) -> ApiResult<()> {
        if !self.open {
            return if self.is_dead() {
                Err(ErrorCode::GENERAL_FATAL_ERR)
            } else {
                Ok(())
            };
        }
        self.call(Request::Close).and_then(Reply::into_unit)?;
        self.open = false;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.open && matches!(self.state, WorkerState::Running(_))
    }

    fn convention(&mut self, path: Option<&Path>) -> ApiResult<Convention> {
        match path {
            None if !self.is_initialized() => Ok(Convention::Null),
            None => self
                .call(Request::Convention { path: None })
                .and_then(Reply::into_convention),
            Some(path) => self
                .call(Request::Convention {
                    path: Some(path.to_path_buf()),
                })
                .and_then(Reply::into_convention),
        }
    }

    fn version(&mut self) -> f64 {
        self.call_open(Request::Version)
            .and_then(Reply::into_float)
            .unwrap_or(f64::NAN)
    }

    fn z_fill_value(&mut self) -> f64 {
        self.call_open(Request::ZFillValue)
            .and_then(Reply::into_float)
            .unwrap_or(DEFAULT_FILL_VALUE)
    }

    fn mesh_count(&mut self) -> ApiResult<usize> {
        self.call_open(Request::MeshCount)?.into_count()
    }

    fn mesh_name(&mut self, mesh: MeshId) -> ApiResult<String> {
        self.call_open(Request::MeshName { mesh })?.into_name()
    }

    fn node_count(&mut self, mesh: MeshId) -> ApiResult<usize> {
        self.call_open(Request::NodeCount { mesh })?.into_count()
    }

    fn edge_count(&mut self, mesh: MeshId) -> ApiResult<usize> {
        self.call_open(Request::EdgeCount { mesh })?.into_count()
    }

    fn face_count(&mut self, mesh: MeshId) -> ApiResult<usize> {
        self.call_open(Request::FaceCount { mesh })?.into_count()
    }

    fn max_face_nodes(&mut self, mesh: MeshId) -> ApiResult<usize> {
        self.call_open(Request::MaxFaceNodes { mesh })?.into_count()
    }

    fn coordinate_system_code(&mut self) -> ApiResult<i32> {
        self.call_open(Request::CoordinateSystemCode)?.into_code()
    }

    fn node_x(&mut self, mesh: MeshId) -> ApiResult<Vec<f64>> {
        self.call_open(Request::NodeX { mesh })?.into_values()
    }

    fn node_y(&mut self, mesh: MeshId) -> ApiResult<Vec<f64>> {
        self.call_open(Request::NodeY { mesh })?.into_values()
    }

    fn node_z(&mut self, mesh: MeshId) -> ApiResult<Vec<f64>> {
        self.call_open(Request::NodeZ { mesh })?.into_values()
    }

    fn edge_nodes(&mut self, mesh: MeshId) -> ApiResult<EdgeNodes> {
        self.call_open(Request::EdgeNodes { mesh })?.into_edges()
    }

    fn face_nodes(&mut self, mesh: MeshId) -> ApiResult<FaceNodes> {
        self.call_open(Request::FaceNodes { mesh })?.into_faces()
    }

    fn var_count(&mut self, mesh: MeshId, location: LocationType) -> ApiResult<usize> {
        self.call_open(Request::VarCount { mesh, location })?.into_count()
    }

    fn var_ids(&mut self, mesh: MeshId, location: LocationType) -> ApiResult<Vec<VarId>> {
        self.call_open(Request::VarIds { mesh, location })?.into_var_ids()
    }

    fn write_xy_coordinates(&mut self, mesh: MeshId, xs: &[f64], ys: &[f64]) -> ApiResult<()> {
        self.call_open(Request::WriteXyCoordinates {
            mesh,
            xs: xs.to_vec(),
            ys: ys.to_vec(),
        })?
        .into_unit()
    }

    fn write_z_values(
        &mut self,
        mesh: MeshId,
        location: LocationType,
        var_name: &str,
        long_name: &str,
        values: &[f64],
    ) -> ApiResult<()> {
        self.call_open(Request::WriteZValues {
            mesh,
            location,
            var_name: var_name.to_owned(),
            long_name: long_name.to_owned(),
            values: values.to_vec(),
        })?
        .into_unit()
    }

    fn read_z_values(
        &mut self,
        mesh: MeshId,
        location: LocationType,
        var_name: &str,
    ) -> ApiResult<Vec<f64>> {
        self.call_open(Request::ReadZValues {
            mesh,
            location,
            var_name: var_name.to_owned(),
        })?
        .into_values()
    }

    fn define_mesh(&mut self, geometry: &MeshGeometry) -> ApiResult<MeshId> {
        self.call_open(Request::DefineMesh {
            geometry: geometry.clone(),
        })?
        .into_mesh()
    }

    fn write_coordinate_system(&mut self, crs: &CoordinateSystemRef) -> ApiResult<()> {
        self.call_open(Request::WriteCoordinateSystem { crs: crs.clone() })?.into_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_worker() -> IsolatedGridApi {
        let dir = std::env::temp_dir().join("gridio-no-such-dir");
        IsolatedGridApi::new(ProxyConfig::for_worker(dir.join("gridio-no-such-worker")))
    }

    #[test]
    fn uninitialized_calls_do_not_start_a_worker() {
        let mut api = missing_worker();
        assert_eq!(api.mesh_count(), Err(ErrorCode::GENERAL_FATAL_ERR));
        assert_eq!(api.node_x(MeshId(1)), Err(ErrorCode::GENERAL_FATAL_ERR));
        assert_eq!(api.close(), Ok(()));
        assert_eq!(api.convention(None), Ok(Convention::Null));
        assert!(api.version().is_nan());
        assert!(!api.is_dead());
        assert_eq!(api.worker_id(), None);
    }

    #[test]
    fn spawn_failure_leaves_proxy_dead() {
        let mut api = missing_worker();
        let path = Path::new("anything.nc");
        assert_eq!(api.open(path, OpenMode::Read), Err(ErrorCode::GENERAL_FATAL_ERR));
        assert!(api.is_dead());
        assert!(!api.is_initialized());
        assert_eq!(api.mesh_count(), Err(ErrorCode::GENERAL_FATAL_ERR));
        assert_eq!(
            api.convention(Some(path)),
            Err(ErrorCode::GENERAL_FATAL_ERR)
        );
        assert_eq!(api.convention(None), Ok(Convention::Null));
        assert_eq!(api.close(), Err(ErrorCode::GENERAL_FATAL_ERR));
        assert_eq!(api.z_fill_value(), DEFAULT_FILL_VALUE);

        // open retries the spawn, and fails the same way
        assert_eq!(api.open(path, OpenMode::Read), Err(ErrorCode::GENERAL_FATAL_ERR));
        assert!(api.is_dead());
    }

    #[cfg(unix)]
    #[test]
    fn reaped_child_has_exited() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        reap(&mut child);
        assert!(child.try_wait().unwrap().is_some());
        // a second reap only logs
        reap(&mut child);
    }
}
