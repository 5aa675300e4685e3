//! Convention detection that bypasses the mesh library.
//!
//! A [`ConventionSniffer`] is the last resort when the native library cannot
//! open a file at all: it reads the declared conventions straight from
//! storage without validating any mesh topology.

use std::path::{Path, PathBuf};

use gridio_core::ConventionInfo;
use gridio_native::conventions::CONVENTIONS_ATTRIBUTE;
use gridio_native::model::AttrValue;
use gridio_native::{parse_conventions, DatasetStorage, DefaultStorage, StorageError};
use thiserror::Error;

/// Failure to sniff a file's conventions.
#[derive(Error, Debug)]
pub enum SniffError {
    /// The file could not be read.
    #[error("cannot read conventions of {path}: {source}")]
    Storage {
        /// File that was sniffed.
        path: PathBuf,
        /// Underlying storage error.
        #[source]
        source: StorageError,
    },
    /// Any other detection failure.
    #[error("{0}")]
    Other(String),
}

/// Reads a file's declared convention without the mesh library.
pub trait ConventionSniffer: Send {
    /// Convention and version declared by the file at `path`.
    fn sniff(&self, path: &Path) -> Result<ConventionInfo, SniffError>;
}

/// Sniffer reading the global `Conventions` attribute through a storage backend.
#[derive(Clone, Debug, Default)]
pub struct StorageSniffer<S = DefaultStorage> {
    storage: S,
}

impl<S: DatasetStorage> StorageSniffer<S> {
    /// Sniffer over `storage`.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }
}

impl<S: DatasetStorage> ConventionSniffer for StorageSniffer<S> {
    fn sniff(&self, path: &Path) -> Result<ConventionInfo, SniffError> {
        let value = self
            .storage
            .global_attribute(path, CONVENTIONS_ATTRIBUTE)
            .map_err(|source| SniffError::Storage {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(parse_conventions(value.as_ref().and_then(AttrValue::as_text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridio_core::Convention;
    use gridio_native::model::DatasetModel;
    use gridio_native::DocumentStorage;

    #[test]
    fn reads_declared_convention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("declared.json");
        let mut model = DatasetModel::default();
        model
            .attributes
            .insert("Conventions".into(), "CF-1.6 UGRID-1.0".into());
        DocumentStorage.save(&path, &model).unwrap();

        let info = StorageSniffer::new(DocumentStorage).sniff(&path).unwrap();
        assert_eq!(info, ConventionInfo::new(Convention::Ugrid, 1.0));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StorageSniffer::new(DocumentStorage)
            .sniff(&dir.path().join("absent.json"))
            .unwrap_err();
        assert!(matches!(err, SniffError::Storage { .. }));
    }
}
