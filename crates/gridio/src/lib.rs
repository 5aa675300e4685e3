//! gridio: read and write unstructured 2D meshes in UGRID datasets.
//!
//! This is the facade crate that re-exports the public API of the gridio
//! sub-crates. It also ships the `gridio-worker` executable used by
//! process-isolated datasets.
//!
//! # Quick start
//!
//! ```no_run
//! use gridio::prelude::*;
//!
//! let files = GridFiles::new(ApiKind::Direct);
//! files.write_empty_unstructured_grid_file("empty_net.nc".as_ref())?;
//!
//! let mut dataset = MeshDataset::new("empty_net.nc", OpenMode::Write, &ApiKind::Direct);
//! assert!(dataset.is_valid());
//! # Ok::<(), DatasetError>(())
//! ```
//!
//! To keep native crashes out of the host process, build datasets with
//! [`ApiKind::ProcessIsolated`](dataset::ApiKind::ProcessIsolated); every
//! call then runs in a `gridio-worker` child process.
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `gridio-core` | Status codes, ids, conventions, topology records |
//! | [`native`] | `gridio-native` | Native library call surface and reference library |
//! | [`api`] | `gridio-api` | Low-level and unstructured mesh APIs, `MeshAccess` |
//! | [`proxy`] | `gridio-proxy` | Worker-process proxy and its configuration |
//! | [`dataset`] | `gridio-dataset` | Cached datasets, bed levels, file operations |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Status codes, identifiers and topology records (`gridio-core`).
pub use gridio_core as types;

/// Native mesh library call surface (`gridio-native`).
pub use gridio_native as native;

/// Mesh access APIs (`gridio-api`).
///
/// [`api::MeshAccess`] is the capability interface implemented by both the
/// in-process [`api::UGridApi`] and the process-isolated proxy.
pub use gridio_api as api;

/// Process isolation (`gridio-proxy`).
pub use gridio_proxy as proxy;

/// Datasets, bed level locations and file operations (`gridio-dataset`).
pub use gridio_dataset as dataset;

/// Common imports.
pub mod prelude {
    pub use gridio_core::{
        Convention, ConventionInfo, CoordinateSystemRef, ErrorCode, LocationType, MeshId,
        NodeCoordinate, OpenMode,
    };

    pub use gridio_api::{MeshAccess, UGridApi};

    pub use gridio_proxy::{IsolatedGridApi, ProxyConfig};

    pub use gridio_dataset::{
        ApiKind, BedLevelLocation, DatasetError, GridFiles, MeshApi, MeshDataset,
        UnstructuredGrid,
    };
}
