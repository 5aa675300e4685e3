//! Dataset-level access to UGRID mesh files.
//!
//! [`MeshDataset`] wraps one open dataset behind either mesh API (see
//! [`ApiKind`]), caches what it reads and turns status codes into
//! [`DatasetError`]s naming the failed operation. [`bed_level`] maps bed
//! level locations onto node and face variables, and [`GridFiles`] bundles
//! the common one-shot file operations.
//!
//! ```no_run
//! use gridio_core::{MeshId, OpenMode};
//! use gridio_dataset::{ApiKind, MeshDataset};
//!
//! let mut dataset = MeshDataset::new("model_net.nc", OpenMode::Read, &ApiKind::Direct);
//! let faces = dataset.number_of_faces(MeshId::FIRST)?;
//! let levels = dataset.read_z_values_at_faces(MeshId::FIRST)?;
//! assert!(levels.is_empty() || levels.len() == faces);
//! # Ok::<(), gridio_dataset::DatasetError>(())
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod api;
pub mod bed_level;
pub mod dataset;
pub mod error;
pub mod file_ops;
pub mod grid;

pub use api::{ApiKind, MeshApi};
pub use bed_level::{Aggregation, BedLevelLocation};
pub use dataset::{DatasetStatus, MeshDataset, FACE_Z_VAR, NODE_Z_VAR};
pub use error::{DatasetError, Operation};
pub use file_ops::GridFiles;
pub use grid::UnstructuredGrid;
