//! Per-file operations and bed level locations on real datasets.

use gridio_core::{Convention, CoordinateSystemRef, MeshId, OpenMode};
use gridio_dataset::bed_level::{self, BedLevelLocation};
use gridio_dataset::{ApiKind, DatasetStatus, GridFiles, MeshDataset, UnstructuredGrid};
use gridio_test_utils::fixtures::{
    sample_geometry, write_conventions_only, write_garbage, write_sample_dataset,
    write_sample_with_crs, write_sample_with_node_z, SAMPLE_MESH,
};

fn files() -> GridFiles {
    GridFiles::new(ApiKind::Direct)
}

#[test]
fn empty_file_is_ugrid_and_accepts_every_supported_location() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty_net.nc");
    let files = files();
    files.write_empty_unstructured_grid_file(&path).unwrap();
    assert_eq!(files.convention(&path).unwrap(), Convention::Ugrid);

    {
        let mut dataset = MeshDataset::new(&path, OpenMode::Write, &ApiKind::Direct);
        dataset.define_mesh(&sample_geometry()).unwrap();
    }

    for location in BedLevelLocation::ALL {
        let len = match location {
            BedLevelLocation::Faces | BedLevelLocation::FacesMeanLevFromNodes => 2,
            _ => 5,
        };
        let values = vec![location.code() as f64 * 1.25; len];
        files.write_z_values(&path, location, &values).unwrap();
        let read = files.read_z_values(&path, location).unwrap();
        if location == BedLevelLocation::CellEdges {
            assert!(read.is_empty());
        } else {
            assert_eq!(read, values, "{location}");
        }
    }
}

#[test]
fn load_from_file_reads_the_first_mesh() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample_with_crs(dir.path(), "sample.nc", 28992);
    let grid = files().load_from_file(&path).unwrap();

    assert_eq!(grid.name, SAMPLE_MESH);
    assert_eq!(grid.vertices.len(), 5);
    assert_eq!(grid.edges.len(), 6);
    assert_eq!(grid.cells.rows(), 2);
    assert_eq!(grid.cells.max_width(), 4);
    assert_eq!(
        grid.coordinate_system,
        Some(CoordinateSystemRef::from_epsg(28992))
    );
    assert_eq!(grid.to_geometry(), sample_geometry());
}

#[test]
fn load_from_file_rejects_missing_unreadable_and_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    let files = files();
    assert!(files.load_from_file(&dir.path().join("nope.nc")).is_none());
    let garbage = write_garbage(dir.path(), "garbage.nc");
    assert!(files.load_from_file(&garbage).is_none());
    let cf = write_conventions_only(dir.path(), "cf.nc", "CF-1.8");
    assert!(files.load_from_file(&cf).is_none());
}

#[test]
fn non_ugrid_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let cf = write_conventions_only(dir.path(), "cf.nc", "CF-1.8");
    let files = files();

    assert!(files
        .read_z_values(&cf, BedLevelLocation::Faces)
        .unwrap()
        .is_empty());
    files
        .write_z_values(&cf, BedLevelLocation::NodesMeanLev, &[1.0])
        .unwrap();
    assert_eq!(files.coordinate_system(&cf).unwrap(), None);

    let mut ran = false;
    let result = files.do_if_ugrid(&cf, |_| ran = true).unwrap();
    assert!(result.is_none());
    assert!(!ran);
}

#[test]
fn do_if_ugrid_hands_over_an_open_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample_dataset(dir.path(), "sample.nc");
    let faces = files()
        .do_if_ugrid(&path, |dataset| dataset.number_of_faces(MeshId::FIRST))
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(faces, 2);
}

#[test]
fn coordinate_system_is_upserted_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample_with_crs(dir.path(), "sample.nc", 4326);
    let files = files();
    assert_eq!(
        files.coordinate_system(&path).unwrap(),
        Some(CoordinateSystemRef::wgs84())
    );

    files
        .set_coordinate_system(&path, &CoordinateSystemRef::from_epsg(28992))
        .unwrap();
    assert_eq!(
        files.coordinate_system(&path).unwrap(),
        Some(CoordinateSystemRef::from_epsg(28992))
    );
}

#[test]
fn rewrite_grid_coordinates_moves_nodes_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample_with_node_z(dir.path(), "sample.nc", "node_z");
    let files = files();
    let mut grid = files.load_from_file(&path).unwrap();
    for v in &mut grid.vertices {
        v.x *= 2.0;
        v.y += 1.0;
        v.z = 1000.0;
    }
    files.rewrite_grid_coordinates(&path, &grid).unwrap();

    let reloaded = files.load_from_file(&path).unwrap();
    assert_eq!(reloaded.xs(), vec![0.0, 20.0, 30.0, 20.0, 10.0]);
    assert_eq!(reloaded.ys(), vec![1.0, 1.0, 6.0, 11.0, 6.0]);
    assert_eq!(reloaded.zs(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn derived_values_cross_locations() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample_with_node_z(dir.path(), "sample.nc", "node_z");
    let mut dataset = MeshDataset::new(&path, OpenMode::Write, &ApiKind::Direct);
    let mesh = MeshId::FIRST;

    // Node levels are 0..5; faces are [1, 2, 5] and [2, 3, 4, 5].
    let face_means =
        bed_level::derived_values(&mut dataset, mesh, BedLevelLocation::FacesMeanLevFromNodes)
            .unwrap();
    assert_eq!(face_means, vec![5.0 / 3.0, 2.5]);

    assert!(
        bed_level::derived_values(&mut dataset, mesh, BedLevelLocation::NodesMinLev)
            .unwrap()
            .is_empty()
    );

    bed_level::write_bed_levels(&mut dataset, mesh, BedLevelLocation::Faces, &[-2.0, 4.0])
        .unwrap();
    let min = bed_level::derived_values(&mut dataset, mesh, BedLevelLocation::NodesMinLev).unwrap();
    assert_eq!(min, vec![-2.0, -2.0, 4.0, 4.0, -2.0]);
    let max = bed_level::derived_values(&mut dataset, mesh, BedLevelLocation::NodesMaxLev).unwrap();
    assert_eq!(max, vec![-2.0, 4.0, 4.0, 4.0, 4.0]);

    assert!(
        bed_level::derived_values(&mut dataset, mesh, BedLevelLocation::CellEdges)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn written_grid_loads_back_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_sample_with_crs(dir.path(), "source.nc", 28992);
    let files = files();
    let mut grid = files.load_from_file(&source).unwrap();
    for (i, v) in grid.vertices.iter_mut().enumerate() {
        v.z = -(i as f64);
    }

    let copy = dir.path().join("copy.nc");
    files.write_grid_to_file(&copy, &grid).unwrap();
    assert_eq!(files.convention(&copy).unwrap(), Convention::Ugrid);
    assert_eq!(files.load_from_file(&copy).unwrap(), grid);
}

#[test]
fn empty_grid_writes_a_metadata_only_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.nc");
    let files = files();
    files
        .write_grid_to_file(&path, &UnstructuredGrid::empty(SAMPLE_MESH))
        .unwrap();
    assert_eq!(files.convention(&path).unwrap(), Convention::Ugrid);
    assert!(files.load_from_file(&path).is_none());
}

#[test]
fn file_convention_leaves_the_dataset_unopened() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample_dataset(dir.path(), "sample.nc");
    let mut dataset = MeshDataset::new(&path, OpenMode::Read, &ApiKind::Direct);
    assert_eq!(dataset.file_convention().unwrap(), Convention::Ugrid);
    assert_eq!(dataset.status(), DatasetStatus::Unopened);

    assert_eq!(dataset.number_of_faces(MeshId::FIRST).unwrap(), 2);
    dataset.dispose();
    assert!(dataset.file_convention().is_err());
}
