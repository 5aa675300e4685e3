//! Reusable dataset fixtures.
//!
//! The sample mesh has 5 nodes, 6 edges and 2 faces (a triangle and a
//! quadrilateral), so its face array is padded to 4 columns.

use std::path::{Path, PathBuf};

use gridio_core::{
    CoordinateSystemRef, GlobalMetadata, LocationType, MeshGeometry, MeshId, OpenMode,
};
use gridio_native::model::DatasetModel;
use gridio_native::ugrid::NODE_Z;
use gridio_native::{DatasetStorage, DefaultLibrary, DefaultStorage, NativeMeshLibrary, VarSpec};
use smallvec::smallvec;

/// Name of the sample mesh topology variable.
pub const SAMPLE_MESH: &str = "mesh2d";

/// The 5-node, 6-edge, 2-face sample mesh.
pub fn sample_geometry() -> MeshGeometry {
    MeshGeometry {
        name: SAMPLE_MESH.into(),
        node_x: vec![0.0, 10.0, 15.0, 10.0, 5.0],
        node_y: vec![0.0, 0.0, 5.0, 10.0, 5.0],
        edges: vec![[5, 2], [2, 1], [1, 5], [5, 4], [4, 3], [3, 2]],
        faces: vec![smallvec![1, 2, 5], smallvec![2, 3, 4, 5]],
    }
}

/// Padded face rows of [`sample_geometry`].
pub fn sample_face_rows() -> Vec<[i32; 4]> {
    vec![[1, 2, 5, -999], [2, 3, 4, 5]]
}

/// Write the sample mesh into a new dataset under `dir`.
pub fn write_sample_dataset(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let mut lib = DefaultLibrary::default();
    let h = lib.create(&path).expect("create sample dataset");
    lib.add_global_attributes(h, &GlobalMetadata::default())
        .expect("global attributes");
    lib.def_mesh(h, &sample_geometry()).expect("define sample mesh");
    lib.close(h).expect("close sample dataset");
    path
}

/// Sample dataset carrying node bed levels `0..5` under `var_name`.
///
/// Any other name than `node_z` replaces the mesh's own `node_z` variable,
/// so only `var_name` holds bed levels.
pub fn write_sample_with_node_z(dir: &Path, name: &str, var_name: &str) -> PathBuf {
    let path = if var_name == NODE_Z {
        write_sample_dataset(dir, name)
    } else {
        write_sample_without_node_z(dir, name)
    };
    let mut lib = DefaultLibrary::default();
    let h = lib
        .open(&path, OpenMode::Write)
        .expect("reopen sample dataset")
        .handle;
    let spec = VarSpec::altitude(var_name, "bed level at nodes", LocationType::Node);
    lib.def_var(h, MeshId::FIRST, &spec).expect("define z");
    lib.put_var(h, MeshId::FIRST, LocationType::Node, var_name, &[0.0, 1.0, 2.0, 3.0, 4.0])
        .expect("write z");
    lib.close(h).expect("close sample dataset");
    path
}

/// Sample dataset without any node bed level variable.
pub fn write_sample_without_node_z(dir: &Path, name: &str) -> PathBuf {
    let path = write_sample_dataset(dir, name);
    let storage = DefaultStorage::default();
    let mut model = storage.load(&path).expect("load sample dataset");
    model
        .variables
        .shift_remove(&format!("{SAMPLE_MESH}_{NODE_Z}"));
    storage.save(&path, &model).expect("save sample dataset");
    path
}

/// Sample dataset with a stored coordinate system.
pub fn write_sample_with_crs(dir: &Path, name: &str, epsg: i32) -> PathBuf {
    let path = write_sample_dataset(dir, name);
    let mut lib = DefaultLibrary::default();
    let h = lib
        .open(&path, OpenMode::Write)
        .expect("reopen sample dataset")
        .handle;
    lib.put_coordinate_system(h, &CoordinateSystemRef::from_epsg(epsg))
        .expect("write crs");
    lib.close(h).expect("close sample dataset");
    path
}

/// Dataset without meshes whose `Conventions` attribute is `conventions`.
pub fn write_conventions_only(dir: &Path, name: &str, conventions: &str) -> PathBuf {
    let path = dir.join(name);
    let mut model = DatasetModel::default();
    model
        .attributes
        .insert("Conventions".into(), conventions.into());
    DefaultStorage::default()
        .save(&path, &model)
        .expect("save conventions dataset");
    path
}

/// A file no storage backend can read.
pub fn write_garbage(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"this is not a dataset").expect("write garbage");
    path
}
