//! Worker process for process-isolated mesh access.
//!
//! Serves newline-delimited JSON requests on stdin and answers on stdout.
//! Logs go to stderr; set `RUST_LOG` to control them.

use std::io::{self, BufWriter};
use std::process::ExitCode;

use gridio::api::UGridApi;
use gridio::proxy::worker::{self, WorkerFault};

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    let fault = WorkerFault::from_env();
    if let Some(fault) = &fault {
        log::warn!("fault injection active: {fault:?}");
    }

    let mut api = UGridApi::new();
    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());
    match worker::serve(&mut api, stdin, stdout, fault.as_ref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("worker I/O failed: {e}");
            ExitCode::FAILURE
        }
    }
}
