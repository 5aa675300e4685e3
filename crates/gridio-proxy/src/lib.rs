//! Process-isolated mesh access for gridio.
//!
//! [`IsolatedGridApi`] implements [`MeshAccess`](gridio_api::MeshAccess) by
//! forwarding each call, as one request/response exchange, to a worker
//! process that runs the in-process API. A crash or hang inside the native
//! library then takes down only the worker: the host sees
//! `GENERAL_FATAL_ERR` and keeps running.
//!
//! # Architecture
//!
//! ```text
//! Host thread                 Reader thread              Worker process
//!     |                            |                           |
//!     |--request line (stdin)------------------------------->  | worker::serve
//!     |                            |                           | UGridApi call
//!     |                            |<--response line (stdout)--|
//!     |<--crossbeam channel--------|                           |
//!     |   recv_timeout(call_timeout)                           |
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod protocol;
pub mod proxy;
pub mod worker;

pub use config::{ConfigError, ProxyConfig};
pub use proxy::IsolatedGridApi;
