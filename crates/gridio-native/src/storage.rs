//! Persistence backends for [`DatasetModel`].
//!
//! [`DocumentStorage`] keeps a dataset as a self-describing JSON document and
//! needs no system libraries. With the `netcdf` feature enabled,
//! [`NetcdfStorage`](crate::netcdf_storage::NetcdfStorage) reads and writes
//! real netCDF files instead.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use gridio_core::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AttrValue, DatasetModel};

/// Errors raised by storage backends.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file is not a dataset document.
    #[error("not a dataset document: {0}")]
    Document(#[from] serde_json::Error),

    /// The document declares an unknown format tag or revision.
    #[error("unsupported document format '{format}' revision {revision}")]
    UnsupportedFormat {
        /// Declared format tag.
        format: String,
        /// Declared revision.
        revision: u32,
    },

    /// Error from the netCDF library.
    #[cfg(feature = "netcdf")]
    #[error("netCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),
}

impl StorageError {
    /// Status code reported to callers of the native surface.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) | Self::Document(_) | Self::UnsupportedFormat { .. } => {
                ErrorCode::IONC_ENOPEN
            }
            #[cfg(feature = "netcdf")]
            Self::NetCdf(_) => ErrorCode::IONC_ENOPEN,
        }
    }
}

/// Loads and saves whole datasets.
pub trait DatasetStorage: Send {
    /// Read the dataset at `path`.
    fn load(&self, path: &Path) -> Result<DatasetModel, StorageError>;

    /// Write `model` to `path`, replacing any existing file.
    fn save(&self, path: &Path, model: &DatasetModel) -> Result<(), StorageError>;

    /// Read one global attribute without interpreting the dataset.
    fn global_attribute(&self, path: &Path, name: &str) -> Result<Option<AttrValue>, StorageError> {
        Ok(self.load(path)?.attributes.swap_remove(name))
    }
}

// ── DocumentStorage ────────────────────────────────────────────

const DOCUMENT_FORMAT: &str = "gridio-dataset";
const DOCUMENT_REVISION: u32 = 1;

#[derive(Serialize)]
struct DocumentRef<'a> {
    format: &'a str,
    revision: u32,
    dataset: &'a DatasetModel,
}

#[derive(Deserialize)]
struct Document {
    format: String,
    revision: u32,
    dataset: DatasetModel,
}

/// Stores datasets as tagged JSON documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentStorage;

impl DatasetStorage for DocumentStorage {
    fn load(&self, path: &Path) -> Result<DatasetModel, StorageError> {
        let reader = BufReader::new(File::open(path)?);
        let doc: Document = serde_json::from_reader(reader)?;
        if doc.format != DOCUMENT_FORMAT || doc.revision > DOCUMENT_REVISION {
            return Err(StorageError::UnsupportedFormat {
                format: doc.format,
                revision: doc.revision,
            });
        }
        Ok(doc.dataset)
    }

    fn save(&self, path: &Path, model: &DatasetModel) -> Result<(), StorageError> {
        let mut writer = BufWriter::new(File::create(path)?);
        let doc = DocumentRef {
            format: DOCUMENT_FORMAT,
            revision: DOCUMENT_REVISION,
            dataset: model,
        };
        serde_json::to_writer(&mut writer, &doc)?;
        writer.flush()?;
        Ok(())
    }
}

/// Storage used by [`DefaultLibrary`](crate::DefaultLibrary).
#[cfg(not(feature = "netcdf"))]
pub type DefaultStorage = DocumentStorage;

/// Storage used by [`DefaultLibrary`](crate::DefaultLibrary).
#[cfg(feature = "netcdf")]
pub type DefaultStorage = crate::netcdf_storage::NetcdfStorage;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variable;

    #[test]
    fn document_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.json");

        let mut model = DatasetModel::default();
        model
            .attributes
            .insert("Conventions".into(), "CF-1.8 UGRID-1.0".into());
        model.dimensions.insert("nNodes".into(), 3);
        model.variables.insert("b".into(), Variable::scalar());
        model.variables.insert("a".into(), Variable::scalar());

        DocumentStorage.save(&path, &model).unwrap();
        let loaded = DocumentStorage.load(&path).unwrap();
        assert_eq!(loaded, model);
        assert_eq!(loaded.variables.get_index(0).map(|(k, _)| k.as_str()), Some("b"));
    }

    #[test]
    fn missing_file_maps_to_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DocumentStorage.load(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IONC_ENOPEN);
    }

    #[test]
    fn foreign_json_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.json");
        std::fs::write(
            &path,
            r#"{"format":"something-else","revision":1,"dataset":{"attributes":{},"dimensions":{},"variables":{}}}"#,
        )
        .unwrap();
        assert!(matches!(
            DocumentStorage.load(&path),
            Err(StorageError::UnsupportedFormat { .. })
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            DocumentStorage.load(&path),
            Err(StorageError::Document(_))
        ));
    }

    #[test]
    fn global_attribute_reads_single_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.json");
        let mut model = DatasetModel::default();
        model.attributes.insert("source".into(), "test".into());
        DocumentStorage.save(&path, &model).unwrap();

        let value = DocumentStorage.global_attribute(&path, "source").unwrap();
        assert_eq!(value, Some(AttrValue::Text("test".into())));
        assert_eq!(DocumentStorage.global_attribute(&path, "missing").unwrap(), None);
    }
}
