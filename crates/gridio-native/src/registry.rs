//! Datasets held open by a [`UgridLibrary`](crate::UgridLibrary).
//!
//! Every open or create is issued a fresh serial number as its handle, so a
//! handle outlives its dataset only as a stale number: it never refers to a
//! dataset opened later. Write-mode datasets are kept in memory and saved
//! when they are closed, and only if something was written.

use std::path::{Path, PathBuf};

use gridio_core::{ApiResult, DatasetHandle, ErrorCode, OpenMode};
use indexmap::IndexMap;

use crate::model::DatasetModel;
use crate::storage::DatasetStorage;

/// One open dataset and its pending changes.
pub(crate) struct OpenDataset {
    pub path: PathBuf,
    pub mode: OpenMode,
    pub model: DatasetModel,
    dirty: bool,
}

impl OpenDataset {
    /// Whether closing has to write the model back.
    fn needs_save(&self) -> bool {
        self.mode == OpenMode::Write && self.dirty
    }
}

/// Open datasets keyed by handle.
pub(crate) struct DatasetRegistry {
    open: IndexMap<DatasetHandle, OpenDataset>,
    next_serial: u64,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self {
            open: IndexMap::new(),
            next_serial: 1,
        }
    }

    fn register(&mut self, dataset: OpenDataset) -> DatasetHandle {
        let handle = DatasetHandle(self.next_serial);
        self.next_serial += 1;
        self.open.insert(handle, dataset);
        handle
    }

    /// Track a dataset read from `path`. Nothing is saved until it changes.
    pub fn opened(&mut self, path: &Path, mode: OpenMode, model: DatasetModel) -> DatasetHandle {
        self.register(OpenDataset {
            path: path.to_path_buf(),
            mode,
            model,
            dirty: false,
        })
    }

    /// Track a new dataset at `path`; it is saved on close even if unchanged.
    pub fn created(&mut self, path: &Path) -> DatasetHandle {
        self.register(OpenDataset {
            path: path.to_path_buf(),
            mode: OpenMode::Write,
            model: DatasetModel::default(),
            dirty: true,
        })
    }

    pub fn get(&self, handle: DatasetHandle) -> ApiResult<&OpenDataset> {
        self.open.get(&handle).ok_or(ErrorCode::IONC_EBADID)
    }

    /// The dataset behind `handle` for writing; marks it for saving.
    pub fn writable(&mut self, handle: DatasetHandle) -> ApiResult<&mut OpenDataset> {
        let dataset = self.open.get_mut(&handle).ok_or(ErrorCode::IONC_EBADID)?;
        if dataset.mode != OpenMode::Write {
            return Err(ErrorCode::IONC_EREADONLY);
        }
        dataset.dirty = true;
        Ok(dataset)
    }

    /// Save pending changes and forget the dataset.
    ///
    /// A failed save leaves the dataset open so the caller can retry.
    pub fn close(&mut self, handle: DatasetHandle, storage: &impl DatasetStorage) -> ApiResult<()> {
        let dataset = self.get(handle)?;
        if dataset.needs_save() {
            storage.save(&dataset.path, &dataset.model).map_err(|e| {
                log::warn!("failed to save {}: {e}", dataset.path.display());
                ErrorCode::IONC_EWRITE
            })?;
        }
        self.open.shift_remove(&handle);
        Ok(())
    }

    /// Close everything still open, saving what has changed.
    pub fn close_all(&mut self, storage: &impl DatasetStorage) {
        for (_, dataset) in self.open.drain(..) {
            if !dataset.needs_save() {
                continue;
            }
            log::warn!("dataset {} still open at shutdown, saving", dataset.path.display());
            if let Err(e) = storage.save(&dataset.path, &dataset.model) {
                log::error!("failed to save {}: {e}", dataset.path.display());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DocumentStorage;
    use proptest::prelude::*;

    #[test]
    fn closed_handle_is_stale_and_never_reissued() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DatasetRegistry::new();
        let first = registry.opened(&dir.path().join("a.nc"), OpenMode::Read, DatasetModel::default());
        registry.close(first, &DocumentStorage).unwrap();
        assert_eq!(registry.get(first).err(), Some(ErrorCode::IONC_EBADID));
        assert_eq!(
            registry.close(first, &DocumentStorage),
            Err(ErrorCode::IONC_EBADID)
        );

        let second = registry.opened(&dir.path().join("a.nc"), OpenMode::Read, DatasetModel::default());
        assert_ne!(first, second);
        assert_eq!(registry.get(first).err(), Some(ErrorCode::IONC_EBADID));
    }

    #[test]
    fn read_only_dataset_is_not_writable_or_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("read.nc");
        let mut registry = DatasetRegistry::new();
        let h = registry.opened(&path, OpenMode::Read, DatasetModel::default());
        assert_eq!(registry.writable(h).err(), Some(ErrorCode::IONC_EREADONLY));
        registry.close(h, &DocumentStorage).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn unchanged_write_dataset_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("untouched.nc");
        let mut registry = DatasetRegistry::new();
        let h = registry.opened(&path, OpenMode::Write, DatasetModel::default());
        registry.close(h, &DocumentStorage).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn created_dataset_is_saved_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.nc");
        let mut registry = DatasetRegistry::new();
        let h = registry.created(&path);
        registry.close(h, &DocumentStorage).unwrap();
        assert_eq!(DocumentStorage.load(&path).unwrap(), DatasetModel::default());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn failed_save_keeps_the_dataset_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("new.nc");
        let mut registry = DatasetRegistry::new();
        let h = registry.created(&path);
        assert_eq!(
            registry.close(h, &DocumentStorage),
            Err(ErrorCode::IONC_EWRITE)
        );
        assert!(registry.get(h).is_ok());
    }

    #[test]
    fn close_all_saves_changed_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let changed = dir.path().join("changed.nc");
        let untouched = dir.path().join("untouched.nc");
        let mut registry = DatasetRegistry::new();
        let h = registry.opened(&changed, OpenMode::Write, DatasetModel::default());
        registry.writable(h).unwrap();
        registry.opened(&untouched, OpenMode::Write, DatasetModel::default());

        registry.close_all(&DocumentStorage);
        assert_eq!(registry.len(), 0);
        assert!(changed.exists());
        assert!(!untouched.exists());
    }

    proptest! {
        #[test]
        fn only_open_handles_resolve(ops in prop::collection::vec(any::<bool>(), 1..64)) {
            let mut registry = DatasetRegistry::new();
            let mut live: Vec<DatasetHandle> = Vec::new();
            let mut closed: Vec<DatasetHandle> = Vec::new();
            for open in ops {
                if open || live.is_empty() {
                    live.push(registry.opened(Path::new("x.nc"), OpenMode::Read, DatasetModel::default()));
                } else {
                    let h = live.remove(0);
                    prop_assert!(registry.close(h, &DocumentStorage).is_ok());
                    closed.push(h);
                }
            }
            prop_assert_eq!(registry.len(), live.len());
            for h in &live {
                prop_assert!(registry.get(*h).is_ok());
            }
            for h in &closed {
                prop_assert!(registry.get(*h).is_err());
            }
        }
    }
}
