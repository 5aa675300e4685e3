//! Native mesh library call surface for gridio.
//!
//! [`NativeMeshLibrary`] is the low-level, status-code based interface the
//! access layer is written against. [`UgridLibrary`] implements it over an
//! in-memory netCDF-style [`DatasetModel`](model::DatasetModel) persisted
//! through a [`DatasetStorage`](storage::DatasetStorage) backend.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod conventions;
pub mod library;
pub mod model;
#[cfg(feature = "netcdf")]
pub mod netcdf_storage;
mod registry;
pub mod storage;
pub mod ugrid;

pub use conventions::parse_conventions;
pub use library::{NativeMeshLibrary, Opened, VarSpec};
pub use storage::{DatasetStorage, DefaultStorage, DocumentStorage, StorageError};
pub use ugrid::UgridLibrary;

/// The library used when no other is configured.
pub type DefaultLibrary = UgridLibrary<DefaultStorage>;
