//! Mesh access APIs for gridio.
//!
//! [`GridApi`] wraps a [`NativeMeshLibrary`](gridio_native::NativeMeshLibrary)
//! and turns every native call into a `Result`, catching faults and tracking
//! the single open dataset. [`UGridApi`] builds the unstructured-mesh
//! operations on top of it and implements [`MeshAccess`], the capability
//! interface shared with the process-isolated proxy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod access;
pub mod grid_api;
pub mod sniffer;
pub mod ugrid_api;

pub use access::MeshAccess;
pub use grid_api::GridApi;
pub use sniffer::{ConventionSniffer, SniffError, StorageSniffer};
pub use ugrid_api::{UGridApi, ALTITUDE, LEGACY_NODE_Z, NODE_Z};
