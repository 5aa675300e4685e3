//! Core types and status codes for the gridio mesh access layer.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by every layer above it: native status codes, dataset
//! and mesh identifiers, file conventions, mesh topology records, and
//! coordinate system references.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod convention;
pub mod crs;
pub mod id;
pub mod metadata;
pub mod status;
pub mod topology;

pub use convention::{Convention, ConventionInfo, UG_CONV_MIN_VERSION};
pub use crs::CoordinateSystemRef;
pub use id::{DatasetHandle, LocationType, MeshId, OpenMode, VarId};
pub use metadata::GlobalMetadata;
pub use status::{ApiResult, ErrorCode};
pub use topology::{
    EdgeNodes, FaceNodes, MeshGeometry, NodeCoordinate, TopologyError, CONNECTIVITY_START_INDEX,
    DEFAULT_FILL_VALUE, FILL_VALUE_INT,
};
