//! One-call operations on grid files.
//!
//! Each [`GridFiles`] method builds one dataset on the configured API, asks
//! that API for the file's convention, does one thing and closes the dataset
//! again. Bed level and coordinate operations only touch UGRID files;
//! anything else is logged and skipped.

use std::path::Path;

use gridio_api::MeshAccess;
use gridio_core::{Convention, CoordinateSystemRef, GlobalMetadata, MeshId, OpenMode};

use crate::api::ApiKind;
use crate::bed_level::{self, BedLevelLocation};
use crate::dataset::MeshDataset;
use crate::error::DatasetError;
use crate::grid::UnstructuredGrid;

/// Per-file grid operations on a chosen mesh API.
#[derive(Clone, Debug, Default)]
pub struct GridFiles {
    kind: ApiKind,
}

impl GridFiles {
    /// Operations running on `kind`.
    pub fn new(kind: ApiKind) -> Self {
        Self { kind }
    }

    /// The configured API.
    pub fn api_kind(&self) -> &ApiKind {
        &self.kind
    }

    /// Dataset for `path` and the convention of its file, both on the same
    /// API. The dataset is not opened yet.
    fn inspect(
        &self,
        path: &Path,
        mode: OpenMode,
    ) -> Result<(MeshDataset, Convention), DatasetError> {
        let mut dataset = MeshDataset::new(path, mode, &self.kind);
        let convention = dataset.file_convention()?;
        Ok((dataset, convention))
    }

    /// Convention of the file at `path`.
    pub fn convention(&self, path: &Path) -> Result<Convention, DatasetError> {
        self.inspect(path, OpenMode::Read)
            .map(|(_, convention)| convention)
    }

    /// First mesh of the file at `path`, or `None` when the file is missing,
    /// cannot be opened or is not UGRID.
    pub fn load_from_file(&self, path: &Path) -> Option<UnstructuredGrid> {
        if !path.is_file() {
            log::error!("Could not find grid at {}", path.display());
            return None;
        }
        let mut dataset = match self.inspect(path, OpenMode::Read) {
            Ok((dataset, Convention::Ugrid)) => dataset,
            Ok((_, other)) => {
                log::warn!("not loading {}: convention is {other}", path.display());
                return None;
            }
            Err(e) => {
                log::error!("not loading {}: {e}", path.display());
                return None;
            }
        };
        match UnstructuredGrid::from_dataset(&mut dataset, MeshId::FIRST) {
            Ok(grid) => Some(grid),
            Err(e) => {
                log::error!("loading grid from {} failed: {e}", path.display());
                None
            }
        }
    }

    /// Bed levels of the first mesh at `location`; empty for non-UGRID files.
    pub fn read_z_values(
        &self,
        path: &Path,
        location: BedLevelLocation,
    ) -> Result<Vec<f64>, DatasetError> {
        let (mut dataset, convention) = self.inspect(path, OpenMode::Read)?;
        if convention != Convention::Ugrid {
            log::warn!(
                "unable to read z values from {}: file is not UGRID",
                path.display()
            );
            return Ok(Vec::new());
        }
        bed_level::read_bed_levels(&mut dataset, MeshId::FIRST, location)
    }

    /// Store bed levels of the first mesh at `location`; skipped for
    /// non-UGRID files.
    pub fn write_z_values(
        &self,
        path: &Path,
        location: BedLevelLocation,
        values: &[f64],
    ) -> Result<(), DatasetError> {
        let (mut dataset, convention) = self.inspect(path, OpenMode::Write)?;
        if convention != Convention::Ugrid {
            log::warn!(
                "unable to write z values to {}: file is not UGRID",
                path.display()
            );
            return Ok(());
        }
        bed_level::write_bed_levels(&mut dataset, MeshId::FIRST, location, values)
    }

    /// Coordinate system of a UGRID file; `None` for other files or when
    /// none is declared.
    pub fn coordinate_system(
        &self,
        path: &Path,
    ) -> Result<Option<CoordinateSystemRef>, DatasetError> {
        let (mut dataset, convention) = self.inspect(path, OpenMode::Read)?;
        if convention != Convention::Ugrid {
            return Ok(None);
        }
        dataset.coordinate_system()
    }

    /// Store `crs` in the file, replacing the current coordinate system.
    /// Files of unknown convention are left alone.
    pub fn set_coordinate_system(
        &self,
        path: &Path,
        crs: &CoordinateSystemRef,
    ) -> Result<(), DatasetError> {
        match self.inspect(path, OpenMode::Write)? {
            (_, Convention::Null) => {
                log::debug!("not writing {crs} to {}: no convention", path.display());
                Ok(())
            }
            (mut dataset, _) => dataset.set_coordinate_system(crs),
        }
    }

    /// Run `action` on the file's dataset when it is UGRID. Returns `None`
    /// without opening the file otherwise.
    pub fn do_if_ugrid<R>(
        &self,
        path: &Path,
        action: impl FnOnce(&mut MeshDataset) -> R,
    ) -> Result<Option<R>, DatasetError> {
        let (mut dataset, convention) = self.inspect(path, OpenMode::Read)?;
        if convention != Convention::Ugrid {
            return Ok(None);
        }
        dataset.initialize()?;
        Ok(Some(action(&mut dataset)))
    }

    /// Create a UGRID file at `path` with metadata only.
    pub fn write_empty_unstructured_grid_file(&self, path: &Path) -> Result<(), DatasetError> {
        let mut dataset = MeshDataset::new_file(path, GlobalMetadata::default(), &self.kind);
        dataset.initialize()
    }

    /// Write `grid` as the only mesh of a new UGRID file at `path`, with its
    /// bed levels and coordinate system. An empty grid gives a file with
    /// metadata only.
    pub fn write_grid_to_file(
        &self,
        path: &Path,
        grid: &UnstructuredGrid,
    ) -> Result<(), DatasetError> {
        let mut dataset = MeshDataset::new_file(path, GlobalMetadata::default(), &self.kind);
        dataset.initialize()?;
        if grid.is_empty() {
            log::debug!("grid {} is empty, writing metadata only", grid.name);
            return Ok(());
        }
        let mesh = dataset.define_mesh(&grid.to_geometry())?;
        dataset.write_z_values_at_nodes(mesh, &grid.zs())?;
        if let Some(crs) = &grid.coordinate_system {
            dataset.set_coordinate_system(crs)?;
        }
        Ok(())
    }

    /// Overwrite the node coordinates of the first mesh with those of
    /// `grid`. Skipped for non-UGRID files.
    pub fn rewrite_grid_coordinates(
        &self,
        path: &Path,
        grid: &UnstructuredGrid,
    ) -> Result<(), DatasetError> {
        let (mut dataset, convention) = self.inspect(path, OpenMode::Write)?;
        if convention != Convention::Ugrid {
            log::warn!(
                "unable to rewrite coordinates in {}: file is not UGRID",
                path.display()
            );
            return Ok(());
        }
        dataset
            .rewrite_grid_coordinates(MeshId::FIRST, &grid.xs(), &grid.ys())
    }
}
