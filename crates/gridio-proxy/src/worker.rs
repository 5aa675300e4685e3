//! Worker side of the proxy: serves requests against an in-process API.
//!
//! The `gridio-worker` binary calls [`serve`] with its stdin and stdout.
//! `GRIDIO_WORKER_FAULT=abort:<op>` or `hang:<op>` makes the worker abort or
//! stop responding when it receives operation `<op>`, simulating a native
//! crash or hang.

use std::io::{self, BufRead, Write};
use std::thread;

use gridio_api::MeshAccess;
use gridio_core::{ApiResult, ErrorCode};

use crate::protocol::{self, Reply, Request, RequestFrame, ResponseFrame};

/// Environment variable selecting an injected fault.
pub const FAULT_ENV: &str = "GRIDIO_WORKER_FAULT";

/// A simulated native failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerFault {
    /// Abort the process on this operation.
    Abort(String),
    /// Stop responding on this operation.
    Hang(String),
}

impl WorkerFault {
    /// Parse `abort:<op>` or `hang:<op>`.
    pub fn parse(spec: &str) -> Option<Self> {
        let (kind, op) = spec.split_once(':')?;
        let op = op.trim();
        if op.is_empty() {
            return None;
        }
        match kind.trim() {
            "abort" => Some(Self::Abort(op.to_owned())),
            "hang" => Some(Self::Hang(op.to_owned())),
            _ => None,
        }
    }

    /// Fault configured through [`FAULT_ENV`], if any.
    pub fn from_env() -> Option<Self> {
        let spec = std::env::var(FAULT_ENV).ok()?;
        let fault = Self::parse(&spec);
        if fault.is_none() {
            log::warn!("ignoring unrecognized {FAULT_ENV}={spec}");
        }
        fault
    }

    fn trigger(&self, op: &str) {
        match self {
            Self::Abort(target) if target == op => {
                log::error!("injected abort in {op}");
                std::process::abort();
            }
            Self::Hang(target) if target == op => {
                log::error!("injected hang in {op}");
                loop {
                    thread::park();
                }
            }
            _ => {}
        }
    }
}

/// Execute one request.
pub fn dispatch<A: MeshAccess>(api: &mut A, request: Request) -> ApiResult<Reply> {
    let reply = match request {
        Request::Open { path, mode } => api.open(&path, mode).map(|()| Reply::Unit)?,
        Request::CreateFile { path, metadata } => {
            api.create_file(&path, &metadata).map(|()| Reply::Unit)?
        }
        Request::Close | Request::Shutdown => api.close().map(|()| Reply::Unit)?,
        Request::Convention { path } => Reply::Convention(api.convention(path.as_deref())?),
        Request::Version => Reply::Float(api.version()),
        Request::ZFillValue => Reply::Float(api.z_fill_value()),
        Request::MeshCount => Reply::Count(api.mesh_count()?),
        Request::MeshName { mesh } => Reply::Name(api.mesh_name(mesh)?),
        Request::NodeCount { mesh } => Reply::Count(api.node_count(mesh)?),
        Request::EdgeCount { mesh } => Reply::Count(api.edge_count(mesh)?),
        Request::FaceCount { mesh } => Reply::Count(api.face_count(mesh)?),
        Request::MaxFaceNodes { mesh } => Reply::Count(api.max_face_nodes(mesh)?),
        Request::CoordinateSystemCode => Reply::Code(api.coordinate_system_code()?),
        Request::NodeX { mesh } => Reply::Values(api.node_x(mesh)?),
        Request::NodeY { mesh } => Reply::Values(api.node_y(mesh)?),
        Request::NodeZ { mesh } => Reply::Values(api.node_z(mesh)?),
        Request::EdgeNodes { mesh } => Reply::Edges(api.edge_nodes(mesh)?),
        Request::FaceNodes { mesh } => Reply::faces(&api.face_nodes(mesh)?),
        Request::VarCount { mesh, location } => Reply::Count(api.var_count(mesh, location)?),
        Request::VarIds { mesh, location } => Reply::VarIds(api.var_ids(mesh, location)?),
        Request::WriteXyCoordinates { mesh, xs, ys } => {
            api.write_xy_coordinates(mesh, &xs, &ys).map(|()| Reply::Unit)?
        }
        Request::WriteZValues {
            mesh,
            location,
            var_name,
            long_name,
            values,
        } => api
            .write_z_values(mesh, location, &var_name, &long_name, &values)
            .map(|()| Reply::Unit)?,
        Request::ReadZValues {
            mesh,
            location,
            var_name,
        } => Reply::Values(api.read_z_values(mesh, location, &var_name)?),
        Request::DefineMesh { geometry } => Reply::Mesh(api.define_mesh(&geometry)?),
        Request::WriteCoordinateSystem { crs } => {
            api.write_coordinate_system(&crs).map(|()| Reply::Unit)?
        }
    };
    Ok(reply)
}

fn respond(output: &mut impl Write, frame: &ResponseFrame) -> io::Result<()> {
    let line = protocol::encode(frame).map_err(io::Error::other)?;
    writeln!(output, "{line}")?;
    output.flush()
}

/// Serve requests from `input` until `Shutdown` or end of input.
///
/// The open dataset is closed before returning.
pub fn serve<A: MeshAccess>(
    api: &mut A,
    input: impl BufRead,
    mut output: impl Write,
    fault: Option<&WorkerFault>,
) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let RequestFrame { seq, request } = match protocol::decode_request(&line) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("rejecting request: {e}");
                let frame = ResponseFrame {
                    seq: 0,
                    result: Err(ErrorCode::GENERAL_FATAL_ERR),
                };
                respond(&mut output, &frame)?;
                continue;
            }
        };
        let op = request.name();
        if let Some(fault) = fault {
            fault.trigger(op);
        }
        log::debug!("request {seq}: {op}");
        let shutdown = matches!(request, Request::Shutdown);
        let result = dispatch(api, request);
        if let Err(code) = &result {
            log::debug!("request {seq}: {op} failed with {code}");
        }
        respond(&mut output, &ResponseFrame { seq, result })?;
        if shutdown {
            return Ok(());
        }
    }
    log::debug!("input closed");
    if let Err(code) = api.close() {
        log::warn!("closing dataset at end of input failed: {code}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridio_api::UGridApi;
    use gridio_core::MeshId;
    use std::io::Cursor;

    fn lines(requests: &[Request]) -> String {
        requests
            .iter()
            .enumerate()
            .map(|(i, request)| {
                let frame = RequestFrame {
                    seq: i as u64 + 1,
                    request: request.clone(),
                };
                protocol::encode(&frame).unwrap() + "\n"
            })
            .collect()
    }

    fn responses(output: &[u8]) -> Vec<ResponseFrame> {
        String::from_utf8_lossy(output)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn fault_specs_parse() {
        assert_eq!(
            WorkerFault::parse("abort:node_count"),
            Some(WorkerFault::Abort("node_count".into()))
        );
        assert_eq!(
            WorkerFault::parse("hang: open"),
            Some(WorkerFault::Hang("open".into()))
        );
        assert_eq!(WorkerFault::parse("explode:open"), None);
        assert_eq!(WorkerFault::parse("abort:"), None);
        assert_eq!(WorkerFault::parse("abort"), None);
    }

    #[test]
    fn uninitialized_requests_fail_and_shutdown_stops() {
        let input = lines(&[
            Request::MeshCount,
            Request::NodeCount { mesh: MeshId(1) },
            Request::Shutdown,
            Request::MeshCount,
        ]);
        let mut out = Vec::new();
        let mut api = UGridApi::new();
        serve(&mut api, Cursor::new(input), &mut out, None).unwrap();

        let frames = responses(&out);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].seq, 1);
        assert_eq!(frames[0].result, Err(ErrorCode::GENERAL_FATAL_ERR));
        assert_eq!(frames[1].result, Err(ErrorCode::GENERAL_FATAL_ERR));
        assert_eq!(frames[2].result, Ok(Reply::Unit));
    }

    #[test]
    fn malformed_line_gets_an_error_response() {
        let mut out = Vec::new();
        let mut api = UGridApi::new();
        serve(&mut api, Cursor::new("{\"seq\":\n"), &mut out, None).unwrap();
        let frames = responses(&out);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].seq, 0);
    }

    #[test]
    fn unrelated_fault_does_not_trigger() {
        let fault = WorkerFault::Abort("node_count".into());
        let mut out = Vec::new();
        let mut api = UGridApi::new();
        let input = lines(&[Request::Version, Request::Shutdown]);
        serve(&mut api, Cursor::new(input), &mut out, Some(&fault)).unwrap();
        let frames = responses(&out);
        let Ok(Reply::Float(version)) = frames[0].result else {
            panic!("unexpected {:?}", frames[0].result);
        };
        assert!(version.is_nan());
    }
}
