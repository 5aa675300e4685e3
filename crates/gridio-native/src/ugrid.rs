//! Reference implementation of [`NativeMeshLibrary`] over a [`DatasetModel`].
//!
//! Meshes are scalar topology variables carrying `cf_role = mesh_topology`
//! and `topology_dimension = 2`, numbered from 1 in declaration order. The
//! topology variable names the dimensions and connectivity variables of its
//! mesh. Data variables are tied to a mesh through their `mesh` and
//! `location` attributes.
//!
//! Datasets are loaded whole on open and persisted on close when opened for
//! writing.

use std::path::Path;

use gridio_core::crs::{GEOGRAPHIC_CRS_VARIABLE, PROJECTED_CRS_VARIABLE};
use gridio_core::{
    ApiResult, Convention, ConventionInfo, CoordinateSystemRef, DatasetHandle, ErrorCode,
    GlobalMetadata, LocationType, MeshGeometry, MeshId, OpenMode, VarId, CONNECTIVITY_START_INDEX,
    DEFAULT_FILL_VALUE, FILL_VALUE_INT,
};
use indexmap::IndexMap;

use crate::conventions::{parse_conventions, CONVENTIONS_ATTRIBUTE};
use crate::library::{NativeMeshLibrary, Opened, VarSpec};
use crate::model::{AttrValue, DatasetModel, VarData, Variable};
use crate::registry::{DatasetRegistry, OpenDataset};
use crate::storage::{DatasetStorage, DefaultStorage};

const MESH_TOPOLOGY: &str = "mesh_topology";

/// Node bed level variable every defined mesh carries.
pub const NODE_Z: &str = "node_z";
const NODE_Z_LONG_NAME: &str = "z-coordinate of mesh nodes";

// Topology attribute names.
const NODE_COORDINATES: &str = "node_coordinates";
const NODE_DIMENSION: &str = "node_dimension";
const EDGE_DIMENSION: &str = "edge_dimension";
const FACE_DIMENSION: &str = "face_dimension";
const MAX_FACE_NODES_DIMENSION: &str = "max_face_nodes_dimension";
const EDGE_NODE_CONNECTIVITY: &str = "edge_node_connectivity";
const FACE_NODE_CONNECTIVITY: &str = "face_node_connectivity";

const WGS84_SEMI_MAJOR: f64 = 6_378_137.0;
const WGS84_SEMI_MINOR: f64 = 6_356_752.314_245;
const WGS84_INVERSE_FLATTENING: f64 = 298.257_223_563;

/// UGRID mesh library backed by a pluggable [`DatasetStorage`].
pub struct UgridLibrary<S: DatasetStorage = DefaultStorage> {
    storage: S,
    datasets: DatasetRegistry,
}

impl<S: DatasetStorage> UgridLibrary<S> {
    /// Library reading and writing through `storage`.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            datasets: DatasetRegistry::new(),
        }
    }

    /// The storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Number of datasets currently open.
    pub fn open_count(&self) -> usize {
        self.datasets.len()
    }

    fn writable(&mut self, handle: DatasetHandle) -> ApiResult<&mut OpenDataset> {
        self.datasets.writable(handle)
    }

    fn model(&self, handle: DatasetHandle) -> ApiResult<&DatasetModel> {
        Ok(&self.datasets.get(handle)?.model)
    }
}

impl<S: DatasetStorage + Default> Default for UgridLibrary<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: DatasetStorage> Drop for UgridLibrary<S> {
    fn drop(&mut self) {
        self.datasets.close_all(&self.storage);
    }
}

// ── topology lookup ────────────────────────────────────────────

fn is_mesh_2d(var: &Variable) -> bool {
    var.text_attr("cf_role") == Some(MESH_TOPOLOGY) && var.int_attr("topology_dimension") == Some(2)
}

fn meshes(model: &DatasetModel) -> impl Iterator<Item = (&str, &Variable)> {
    model
        .variables
        .iter()
        .filter(|(_, v)| is_mesh_2d(v))
        .map(|(k, v)| (k.as_str(), v))
}

fn mesh(model: &DatasetModel, id: MeshId) -> ApiResult<(&str, &Variable)> {
    let index = id.index().ok_or(ErrorCode::IONC_EBADMESH)?;
    meshes(model).nth(index).ok_or(ErrorCode::IONC_EBADMESH)
}

/// Length of the dimension a topology attribute names; `None` when the
/// topology does not declare it.
fn declared_dim(model: &DatasetModel, topo: &Variable, attr: &str) -> ApiResult<Option<usize>> {
    match topo.text_attr(attr) {
        None => Ok(None),
        Some(dim) => model.dimension(dim).map(Some).ok_or(ErrorCode::IONC_ENOTDIM),
    }
}

fn location_dim_attr(location: LocationType) -> ApiResult<&'static str> {
    match location {
        LocationType::Node => Ok(NODE_DIMENSION),
        LocationType::Edge => Ok(EDGE_DIMENSION),
        LocationType::Face => Ok(FACE_DIMENSION),
        LocationType::All2D => Err(ErrorCode::IONC_ENOTAVAILABLE),
    }
}

fn coordinate_names(topo: &Variable) -> ApiResult<(&str, &str)> {
    let mut names = topo
        .text_attr(NODE_COORDINATES)
        .ok_or(ErrorCode::IONC_ENOTATT)?
        .split_whitespace();
    match (names.next(), names.next()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(ErrorCode::IONC_ENOTATT),
    }
}

/// Reject datasets whose mesh topology refers to missing parts.
fn check_compliance(model: &DatasetModel) -> ApiResult<()> {
    for (name, topo) in meshes(model) {
        let node_dim = declared_dim(model, topo, NODE_DIMENSION)?;
        let (x, y) = coordinate_names(topo)?;
        for coord in [x, y] {
            let var = model.variable(coord).ok_or(ErrorCode::IONC_ENONCOMPLIANT)?;
            if node_dim.is_some_and(|n| n != var.data.len()) {
                log::debug!("mesh {name}: {coord} does not match the node dimension");
                return Err(ErrorCode::IONC_ENONCOMPLIANT);
            }
        }
        for attr in [EDGE_NODE_CONNECTIVITY, FACE_NODE_CONNECTIVITY] {
            if let Some(var) = topo.text_attr(attr) {
                if model.variable(var).is_none() {
                    log::debug!("mesh {name}: {attr} names missing variable {var}");
                    return Err(ErrorCode::IONC_ENONCOMPLIANT);
                }
            }
        }
    }
    Ok(())
}

fn variable_location(var: &Variable) -> Option<LocationType> {
    var.text_attr("location").and_then(LocationType::from_attribute)
}

fn data_vars<'a>(
    model: &'a DatasetModel,
    mesh_name: &'a str,
    location: LocationType,
) -> impl Iterator<Item = (usize, &'a Variable)> + 'a {
    model
        .variables
        .values()
        .enumerate()
        .filter(move |(_, v)| {
            v.text_attr("mesh") == Some(mesh_name)
                && variable_location(v).is_some_and(|l| location.includes(l))
        })
}

fn resolve_name(model: &DatasetModel, mesh_name: &str, name: &str) -> Option<String> {
    let prefixed = format!("{mesh_name}_{name}");
    if model.variables.contains_key(&prefixed) {
        Some(prefixed)
    } else if model.variables.contains_key(name) {
        Some(name.to_owned())
    } else {
        None
    }
}

fn check_location(var: &Variable, location: LocationType) -> ApiResult<()> {
    match variable_location(var) {
        Some(at) if !location.includes(at) => Err(ErrorCode::IONC_ENOTAVAILABLE),
        _ => Ok(()),
    }
}

// ── payload copies ─────────────────────────────────────────────

fn copy_doubles(var: &Variable, out: &mut [f64]) -> ApiResult<()> {
    if var.data.len() != out.len() {
        return Err(ErrorCode::GENERAL_ARRAY_LENGTH_FATAL_ERR);
    }
    match &var.data {
        VarData::Double(values) => out.copy_from_slice(values),
        VarData::Int(values) => {
            for (o, v) in out.iter_mut().zip(values) {
                *o = f64::from(*v);
            }
        }
    }
    Ok(())
}

/// Copy connectivity, shifting ids to start at [`CONNECTIVITY_START_INDEX`].
fn copy_ids(var: &Variable, out: &mut [i32]) -> ApiResult<i32> {
    if var.data.len() != out.len() {
        return Err(ErrorCode::GENERAL_ARRAY_LENGTH_FATAL_ERR);
    }
    let fill = var.int_attr("_FillValue").unwrap_or(FILL_VALUE_INT);
    let shift = CONNECTIVITY_START_INDEX - var.int_attr("start_index").unwrap_or(CONNECTIVITY_START_INDEX);
    match &var.data {
        VarData::Int(values) => {
            for (o, &v) in out.iter_mut().zip(values) {
                *o = if v == fill { fill } else { v + shift };
            }
        }
        VarData::Double(values) => {
            for (o, &v) in out.iter_mut().zip(values) {
                let v = v as i32;
                *o = if v == fill { fill } else { v + shift };
            }
        }
    }
    Ok(fill)
}

// ── coordinate systems ─────────────────────────────────────────

fn stored_epsg(model: &DatasetModel) -> i32 {
    for name in [PROJECTED_CRS_VARIABLE, GEOGRAPHIC_CRS_VARIABLE] {
        let Some(var) = model.variable(name) else {
            continue;
        };
        if let Some(code) = var.int_attr("epsg") {
            return code;
        }
        if let Some(code) = var
            .text_attr("EPSG_code")
            .and_then(|s| s.strip_prefix("EPSG:"))
            .and_then(|s| s.trim().parse().ok())
        {
            return code;
        }
    }
    0
}

fn crs_attributes(crs: &CoordinateSystemRef) -> IndexMap<String, AttrValue> {
    let mut attrs = IndexMap::new();
    let mut set = |k: &str, v: AttrValue| {
        attrs.insert(k.to_owned(), v);
    };
    set("name", crs.epsg_string().into());
    set("epsg", crs.authority_code.into());
    set("grid_mapping_name", crs.grid_mapping_name().into());
    set("longitude_of_prime_meridian", AttrValue::Double(0.0));
    set("semi_major_axis", WGS84_SEMI_MAJOR.into());
    set("semi_minor_axis", WGS84_SEMI_MINOR.into());
    set("inverse_flattening", WGS84_INVERSE_FLATTENING.into());
    set("EPSG_code", crs.epsg_string().into());
    attrs
}

fn upsert_crs_variable(model: &mut DatasetModel, name: &str, crs: &CoordinateSystemRef) {
    let var = model
        .variables
        .entry(name.to_owned())
        .or_insert_with(Variable::scalar);
    var.attributes.extend(crs_attributes(crs));
}

// ── mesh definition ────────────────────────────────────────────

/// Variable of `len` fill values at `spec.location` of `mesh_name`.
fn data_variable(mesh_name: &str, dim: String, len: usize, spec: &VarSpec) -> Variable {
    Variable {
        dimensions: vec![dim],
        attributes: IndexMap::new(),
        data: VarData::Double(vec![spec.fill_value; len]),
    }
    .with_attr("mesh", mesh_name)
    .with_attr("location", spec.location.attribute_value())
    .with_attr("standard_name", spec.standard_name.as_str())
    .with_attr("long_name", spec.long_name.as_str())
    .with_attr("units", spec.units.as_str())
    .with_attr("_FillValue", spec.fill_value)
}

fn add_mesh(model: &mut DatasetModel, geometry: &MeshGeometry) -> ApiResult<()> {
    let name = geometry.name.as_str();
    let faces = geometry.face_nodes().map_err(|_| ErrorCode::IONC_ENONCOMPLIANT)?;
    let node_dim = format!("{name}_nNodes");
    let edge_dim = format!("{name}_nEdges");
    let face_dim = format!("{name}_nFaces");
    let max_dim = format!("{name}_nMax_face_nodes");
    let x_name = format!("{name}_node_x");
    let y_name = format!("{name}_node_y");
    let edge_var = format!("{name}_edge_nodes");
    let face_var = format!("{name}_face_nodes");

    let mut topo = Variable::scalar()
        .with_attr("cf_role", MESH_TOPOLOGY)
        .with_attr("long_name", "Topology data of 2D mesh")
        .with_attr("topology_dimension", 2)
        .with_attr(NODE_COORDINATES, format!("{x_name} {y_name}"))
        .with_attr(NODE_DIMENSION, node_dim.as_str());

    model.dimensions.insert(node_dim.clone(), geometry.node_count());
    for (var_name, values, axis) in [(&x_name, &geometry.node_x, "x"), (&y_name, &geometry.node_y, "y")] {
        let var = Variable {
            dimensions: vec![node_dim.clone()],
            attributes: IndexMap::new(),
            data: VarData::Double(values.clone()),
        }
        .with_attr("mesh", name)
        .with_attr("location", "node")
        .with_attr("standard_name", format!("projection_{axis}_coordinate"))
        .with_attr("units", "m");
        model.variables.insert(var_name.clone(), var);
    }
    // Bed levels start out unknown.
    let node_z = VarSpec::altitude(NODE_Z, NODE_Z_LONG_NAME, LocationType::Node);
    model.variables.insert(
        format!("{name}_{NODE_Z}"),
        data_variable(name, node_dim.clone(), geometry.node_count(), &node_z),
    );

    if !geometry.edges.is_empty() {
        model.dimensions.insert("Two".to_owned(), 2);
        model.dimensions.insert(edge_dim.clone(), geometry.edges.len());
        topo = topo
            .with_attr(EDGE_NODE_CONNECTIVITY, edge_var.as_str())
            .with_attr(EDGE_DIMENSION, edge_dim.as_str());
        let var = Variable {
            dimensions: vec![edge_dim, "Two".to_owned()],
            attributes: IndexMap::new(),
            data: VarData::Int(geometry.edge_nodes().to_flat()),
        }
        .with_attr("cf_role", "edge_node_connectivity")
        .with_attr("start_index", CONNECTIVITY_START_INDEX)
        .with_attr("_FillValue", FILL_VALUE_INT);
        model.variables.insert(edge_var, var);
    }

    if faces.rows() > 0 {
        model.dimensions.insert(face_dim.clone(), faces.rows());
        model.dimensions.insert(max_dim.clone(), faces.max_width());
        topo = topo
            .with_attr(FACE_NODE_CONNECTIVITY, face_var.as_str())
            .with_attr(FACE_DIMENSION, face_dim.as_str())
            .with_attr(MAX_FACE_NODES_DIMENSION, max_dim.as_str());
        let var = Variable {
            dimensions: vec![face_dim, max_dim],
            attributes: IndexMap::new(),
            data: VarData::Int(faces.as_flat().to_vec()),
        }
        .with_attr("cf_role", "face_node_connectivity")
        .with_attr("start_index", CONNECTIVITY_START_INDEX)
        .with_attr("_FillValue", faces.fill_value());
        model.variables.insert(face_var, var);
    }

    model.variables.insert(name.to_owned(), topo);
    Ok(())
}

// ── NativeMeshLibrary ──────────────────────────────────────────

impl<S: DatasetStorage> NativeMeshLibrary for UgridLibrary<S> {
    fn open(&mut self, path: &Path, mode: OpenMode) -> ApiResult<Opened> {
        let model = self.storage.load(path).map_err(|e| {
            log::debug!("cannot open {}: {e}", path.display());
            e.code()
        })?;
        check_compliance(&model)?;
        let info = parse_conventions(model.global_text(CONVENTIONS_ATTRIBUTE));
        let handle = self.datasets.opened(path, mode, model);
        log::debug!("opened {} as {handle:?} ({})", path.display(), info.convention);
        Ok(Opened { handle, info })
    }

    fn create(&mut self, path: &Path) -> ApiResult<DatasetHandle> {
        let model = DatasetModel::default();
        self.storage.save(path, &model).map_err(|e| {
            log::debug!("cannot create {}: {e}", path.display());
            e.code()
        })?;
        Ok(self.datasets.created(path))
    }

    fn close(&mut self, handle: DatasetHandle) -> ApiResult<()> {
        self.datasets.close(handle, &self.storage)
    }

    fn inq_conventions(&mut self, handle: DatasetHandle) -> ApiResult<ConventionInfo> {
        let model = self.model(handle)?;
        Ok(parse_conventions(model.global_text(CONVENTIONS_ATTRIBUTE)))
    }

    fn adheres_to_conventions(
        &mut self,
        handle: DatasetHandle,
        convention: Convention,
    ) -> ApiResult<bool> {
        Ok(self.inq_conventions(handle)?.convention == convention)
    }

    fn add_global_attributes(
        &mut self,
        handle: DatasetHandle,
        metadata: &GlobalMetadata,
    ) -> ApiResult<()> {
        let attrs = &mut self.writable(handle)?.model.attributes;
        attrs.insert(CONVENTIONS_ATTRIBUTE.to_owned(), metadata.conventions().into());
        attrs.insert("institution".to_owned(), metadata.model_name.as_str().into());
        attrs.insert("source".to_owned(), metadata.source.as_str().into());
        Ok(())
    }

    fn mesh_count(&mut self, handle: DatasetHandle) -> ApiResult<usize> {
        Ok(meshes(self.model(handle)?).count())
    }

    fn mesh_name(&mut self, handle: DatasetHandle, id: MeshId) -> ApiResult<String> {
        let (name, _) = mesh(self.model(handle)?, id)?;
        Ok(name.to_owned())
    }

    fn node_count(&mut self, handle: DatasetHandle, id: MeshId) -> ApiResult<usize> {
        let model = self.model(handle)?;
        let (_, topo) = mesh(model, id)?;
        declared_dim(model, topo, NODE_DIMENSION)?.ok_or(ErrorCode::IONC_ENOTATT)
    }

    fn edge_count(&mut self, handle: DatasetHandle, id: MeshId) -> ApiResult<usize> {
        let model = self.model(handle)?;
        let (_, topo) = mesh(model, id)?;
        Ok(declared_dim(model, topo, EDGE_DIMENSION)?.unwrap_or(0))
    }

    fn face_count(&mut self, handle: DatasetHandle, id: MeshId) -> ApiResult<usize> {
        let model = self.model(handle)?;
        let (_, topo) = mesh(model, id)?;
        Ok(declared_dim(model, topo, FACE_DIMENSION)?.unwrap_or(0))
    }

    fn max_face_nodes(&mut self, handle: DatasetHandle, id: MeshId) -> ApiResult<usize> {
        let model = self.model(handle)?;
        let (_, topo) = mesh(model, id)?;
        Ok(declared_dim(model, topo, MAX_FACE_NODES_DIMENSION)?.unwrap_or(0))
    }

    fn node_coordinates(
        &mut self,
        handle: DatasetHandle,
        id: MeshId,
        xs: &mut [f64],
        ys: &mut [f64],
    ) -> ApiResult<()> {
        let model = self.model(handle)?;
        let (_, topo) = mesh(model, id)?;
        let (x, y) = coordinate_names(topo)?;
        copy_doubles(model.variable(x).ok_or(ErrorCode::IONC_ENOTVAR)?, xs)?;
        copy_doubles(model.variable(y).ok_or(ErrorCode::IONC_ENOTVAR)?, ys)
    }

    fn put_node_coordinates(
        &mut self,
        handle: DatasetHandle,
        id: MeshId,
        xs: &[f64],
        ys: &[f64],
    ) -> ApiResult<()> {
        let model = &mut self.writable(handle)?.model;
        let (_, topo) = mesh(model, id)?;
        let (x, y) = coordinate_names(topo)?;
        let (x, y) = (x.to_owned(), y.to_owned());
        let nodes = declared_dim(model, topo, NODE_DIMENSION)?.ok_or(ErrorCode::IONC_ENOTATT)?;
        if xs.len() != nodes || ys.len() != nodes {
            return Err(ErrorCode::GENERAL_ARRAY_LENGTH_FATAL_ERR);
        }
        for (name, values) in [(x, xs), (y, ys)] {
            let var = model.variable_mut(&name).ok_or(ErrorCode::IONC_ENOTVAR)?;
            var.data = VarData::Double(values.to_vec());
        }
        Ok(())
    }

    fn edge_nodes(&mut self, handle: DatasetHandle, id: MeshId, out: &mut [i32]) -> ApiResult<()> {
        let model = self.model(handle)?;
        let (_, topo) = mesh(model, id)?;
        match topo.text_attr(EDGE_NODE_CONNECTIVITY) {
            Some(var) => copy_ids(model.variable(var).ok_or(ErrorCode::IONC_ENOTVAR)?, out).map(drop),
            None if out.is_empty() => Ok(()),
            None => Err(ErrorCode::GENERAL_ARRAY_LENGTH_FATAL_ERR),
        }
    }

    fn face_nodes(&mut self, handle: DatasetHandle, id: MeshId, out: &mut [i32]) -> ApiResult<i32> {
        let model = self.model(handle)?;
        let (_, topo) = mesh(model, id)?;
        match topo.text_attr(FACE_NODE_CONNECTIVITY) {
            Some(var) => copy_ids(model.variable(var).ok_or(ErrorCode::IONC_ENOTVAR)?, out),
            None if out.is_empty() => Ok(FILL_VALUE_INT),
            None => Err(ErrorCode::GENERAL_ARRAY_LENGTH_FATAL_ERR),
        }
    }

    fn def_mesh(&mut self, handle: DatasetHandle, geometry: &MeshGeometry) -> ApiResult<MeshId> {
        let model = &mut self.writable(handle)?.model;
        if let Err(e) = geometry.validate() {
            log::warn!("rejecting mesh {}: {e}", geometry.name);
            return Err(ErrorCode::IONC_ENONCOMPLIANT);
        }
        if geometry.name.is_empty() || model.variables.contains_key(&geometry.name) {
            return Err(ErrorCode::IONC_ENONCOMPLIANT);
        }
        add_mesh(model, geometry)?;
        Ok(MeshId(meshes(model).count() as u32))
    }

    fn coordinate_system(&mut self, handle: DatasetHandle) -> ApiResult<i32> {
        Ok(stored_epsg(self.model(handle)?))
    }

    fn put_coordinate_system(
        &mut self,
        handle: DatasetHandle,
        crs: &CoordinateSystemRef,
    ) -> ApiResult<()> {
        let model = &mut self.writable(handle)?.model;
        let current = match stored_epsg(model) {
            0 => None,
            code => Some(CoordinateSystemRef::from_epsg(code)),
        };
        if current.as_ref() == Some(crs) {
            return Ok(());
        }
        // Both container variables may already exist; keep every one that is
        // touched in agreement with the new system.
        let current_spherical = current.as_ref().is_some_and(|c| c.is_spherical);
        if current_spherical || crs.is_spherical {
            upsert_crs_variable(model, GEOGRAPHIC_CRS_VARIABLE, crs);
        }
        let current_projected = current.as_ref().is_some_and(|c| !c.is_spherical);
        if !crs.is_spherical || current_projected {
            upsert_crs_variable(model, PROJECTED_CRS_VARIABLE, crs);
        }
        let mesh_names: Vec<String> = meshes(model).map(|(n, _)| n.to_owned()).collect();
        for name in mesh_names {
            if let Some(z) = model.variable_mut(&format!("{name}_node_z")) {
                z.attributes
                    .insert("grid_mapping".to_owned(), crs.variable_name().into());
            }
        }
        Ok(())
    }

    fn var_count(
        &mut self,
        handle: DatasetHandle,
        id: MeshId,
        location: LocationType,
    ) -> ApiResult<usize> {
        let model = self.model(handle)?;
        let (name, _) = mesh(model, id)?;
        Ok(data_vars(model, name, location).count())
    }

    fn inq_varids(
        &mut self,
        handle: DatasetHandle,
        id: MeshId,
        location: LocationType,
        out: &mut [VarId],
    ) -> ApiResult<()> {
        let model = self.model(handle)?;
        let (name, _) = mesh(model, id)?;
        let ids: Vec<VarId> = data_vars(model, name, location)
            .map(|(idx, _)| VarId(idx as i32))
            .collect();
        if ids.len() != out.len() {
            return Err(ErrorCode::GENERAL_ARRAY_LENGTH_FATAL_ERR);
        }
        out.copy_from_slice(&ids);
        Ok(())
    }

    fn inq_varid(&mut self, handle: DatasetHandle, id: MeshId, name: &str) -> ApiResult<VarId> {
        let model = self.model(handle)?;
        let (mesh_name, _) = mesh(model, id)?;
        resolve_name(model, mesh_name, name)
            .and_then(|n| model.variable_index(&n))
            .map(|idx| VarId(idx as i32))
            .ok_or(ErrorCode::IONC_ENOTVAR)
    }

    fn inq_varid_by_standard_name(
        &mut self,
        handle: DatasetHandle,
        id: MeshId,
        location: LocationType,
        standard_name: &str,
    ) -> ApiResult<Option<VarId>> {
        let model = self.model(handle)?;
        let (name, _) = mesh(model, id)?;
        Ok(data_vars(model, name, location)
            .find(|(_, v)| v.text_attr("standard_name") == Some(standard_name))
            .map(|(idx, _)| VarId(idx as i32)))
    }

    fn def_var(&mut self, handle: DatasetHandle, id: MeshId, spec: &VarSpec) -> ApiResult<VarId> {
        let model = &mut self.writable(handle)?.model;
        let (mesh_name, topo) = mesh(model, id)?;
        let mesh_name = mesh_name.to_owned();
        let dim = topo
            .text_attr(location_dim_attr(spec.location)?)
            .ok_or(ErrorCode::IONC_ENOTDIM)?
            .to_owned();
        let len = model.dimension(&dim).ok_or(ErrorCode::IONC_ENOTDIM)?;
        let var_name = format!("{mesh_name}_{}", spec.name);
        if let Some(idx) = model.variable_index(&var_name) {
            return Ok(VarId(idx as i32));
        }
        let mut var = data_variable(&mesh_name, dim, len, spec);
        if stored_epsg(model) != 0 {
            let crs = CoordinateSystemRef::from_epsg(stored_epsg(model));
            var = var.with_attr("grid_mapping", crs.variable_name());
        }
        let (idx, _) = model.variables.insert_full(var_name, var);
        Ok(VarId(idx as i32))
    }

    fn get_var(
        &mut self,
        handle: DatasetHandle,
        id: MeshId,
        location: LocationType,
        name: &str,
        out: &mut [f64],
    ) -> ApiResult<f64> {
        let model = self.model(handle)?;
        let (mesh_name, _) = mesh(model, id)?;
        let var = resolve_name(model, mesh_name, name)
            .and_then(|n| model.variable(&n))
            .ok_or(ErrorCode::IONC_ENOTVAR)?;
        check_location(var, location)?;
        copy_doubles(var, out)?;
        Ok(var.double_attr("_FillValue").unwrap_or(DEFAULT_FILL_VALUE))
    }

    fn put_var(
        &mut self,
        handle: DatasetHandle,
        id: MeshId,
        location: LocationType,
        name: &str,
        values: &[f64],
    ) -> ApiResult<()> {
        let model = &mut self.writable(handle)?.model;
        let (mesh_name, _) = mesh(model, id)?;
        let var_name = resolve_name(model, mesh_name, name).ok_or(ErrorCode::IONC_ENOTVAR)?;
        let expected = {
            let var = model.variable(&var_name).ok_or(ErrorCode::IONC_ENOTVAR)?;
            check_location(var, location)?;
            var.dimensions
                .iter()
                .map(|d| model.dimension(d).ok_or(ErrorCode::IONC_ENOTDIM))
                .product::<ApiResult<usize>>()?
        };
        if values.len() != expected {
            return Err(ErrorCode::GENERAL_ARRAY_LENGTH_FATAL_ERR);
        }
        let var = model.variable_mut(&var_name).ok_or(ErrorCode::IONC_ENOTVAR)?;
        var.data = VarData::Double(values.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DocumentStorage;
    use smallvec::smallvec;
    use std::path::PathBuf;

    fn sample() -> MeshGeometry {
        MeshGeometry {
            name: "mesh2d".into(),
            node_x: vec![0.0, 10.0, 15.0, 10.0, 5.0],
            node_y: vec![0.0, 0.0, 5.0, 10.0, 5.0],
            edges: vec![[5, 2], [2, 1], [1, 5], [5, 4], [4, 3], [3, 2]],
            faces: vec![smallvec![1, 2, 5], smallvec![2, 3, 4, 5]],
        }
    }

    fn library() -> UgridLibrary<DocumentStorage> {
        UgridLibrary::new(DocumentStorage)
    }

    fn written(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("sample_net.json");
        let mut lib = library();
        let h = lib.create(&path).unwrap();
        lib.add_global_attributes(h, &GlobalMetadata::default()).unwrap();
        assert_eq!(lib.def_mesh(h, &sample()), Ok(MeshId(1)));
        lib.close(h).unwrap();
        path
    }

    #[test]
    fn created_mesh_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = written(&dir);
        let mut lib = library();
        let opened = lib.open(&path, OpenMode::Read).unwrap();
        let h = opened.handle;
        assert_eq!(opened.info, ConventionInfo::new(Convention::Ugrid, 1.0));
        assert_eq!(lib.mesh_count(h), Ok(1));
        assert_eq!(lib.mesh_name(h, MeshId(1)).as_deref(), Ok("mesh2d"));
        assert_eq!(lib.node_count(h, MeshId(1)), Ok(5));
        assert_eq!(lib.edge_count(h, MeshId(1)), Ok(6));
        assert_eq!(lib.face_count(h, MeshId(1)), Ok(2));
        assert_eq!(lib.max_face_nodes(h, MeshId(1)), Ok(4));

        let mut faces = [0; 8];
        assert_eq!(lib.face_nodes(h, MeshId(1), &mut faces), Ok(FILL_VALUE_INT));
        assert_eq!(faces, [1, 2, 5, -999, 2, 3, 4, 5]);

        let mut edges = [0; 12];
        lib.edge_nodes(h, MeshId(1), &mut edges).unwrap();
        assert_eq!(&edges[..4], &[5, 2, 2, 1]);
        lib.close(h).unwrap();
        assert_eq!(lib.open_count(), 0);
    }

    #[test]
    fn wrong_buffer_length_is_array_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = written(&dir);
        let mut lib = library();
        let h = lib.open(&path, OpenMode::Read).unwrap().handle;
        let mut xs = [0.0; 4];
        let mut ys = [0.0; 5];
        assert_eq!(
            lib.node_coordinates(h, MeshId(1), &mut xs, &mut ys),
            Err(ErrorCode::GENERAL_ARRAY_LENGTH_FATAL_ERR)
        );
    }

    #[test]
    fn stale_handle_and_bad_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let path = written(&dir);
        let mut lib = library();
        let h = lib.open(&path, OpenMode::Read).unwrap().handle;
        assert_eq!(lib.node_count(h, MeshId(2)), Err(ErrorCode::IONC_EBADMESH));
        assert_eq!(lib.node_count(h, MeshId(0)), Err(ErrorCode::IONC_EBADMESH));
        lib.close(h).unwrap();
        assert_eq!(lib.mesh_count(h), Err(ErrorCode::IONC_EBADID));
        assert_eq!(lib.close(h), Err(ErrorCode::IONC_EBADID));
    }

    #[test]
    fn read_only_dataset_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = written(&dir);
        let mut lib = library();
        let h = lib.open(&path, OpenMode::Read).unwrap().handle;
        let spec = VarSpec::altitude("node_z", "z", LocationType::Node);
        assert_eq!(lib.def_var(h, MeshId(1), &spec), Err(ErrorCode::IONC_EREADONLY));
    }

    #[test]
    fn define_write_and_read_variable() {
        let dir = tempfile::tempdir().unwrap();
        let path = written(&dir);
        let mut lib = library();
        let h = lib.open(&path, OpenMode::Write).unwrap().handle;
        assert_eq!(
            lib.inq_varid_by_standard_name(h, MeshId(1), LocationType::Face, "altitude"),
            Ok(None)
        );
        let spec = VarSpec::altitude("face_z", "bed level at faces", LocationType::Face);
        let id = lib.def_var(h, MeshId(1), &spec).unwrap();
        assert_eq!(lib.def_var(h, MeshId(1), &spec), Ok(id));
        lib.put_var(h, MeshId(1), LocationType::Face, "face_z", &[1.5, -2.0])
            .unwrap();
        assert_eq!(
            lib.put_var(h, MeshId(1), LocationType::Face, "face_z", &[1.0]),
            Err(ErrorCode::GENERAL_ARRAY_LENGTH_FATAL_ERR)
        );
        lib.close(h).unwrap();

        let h = lib.open(&path, OpenMode::Read).unwrap().handle;
        assert_eq!(
            lib.inq_varid_by_standard_name(h, MeshId(1), LocationType::Face, "altitude"),
            Ok(Some(id))
        );
        let mut out = [0.0; 2];
        let fill = lib
            .get_var(h, MeshId(1), LocationType::Face, "face_z", &mut out)
            .unwrap();
        assert_eq!(out, [1.5, -2.0]);
        assert_eq!(fill, DEFAULT_FILL_VALUE);
        assert_eq!(
            lib.get_var(h, MeshId(1), LocationType::Node, "face_z", &mut out),
            Err(ErrorCode::IONC_ENOTAVAILABLE)
        );
    }

    #[test]
    fn defined_mesh_carries_fill_bed_levels() {
        let dir = tempfile::tempdir().unwrap();
        let path = written(&dir);
        let mut lib = library();
        let h = lib.open(&path, OpenMode::Read).unwrap().handle;
        assert!(lib
            .inq_varid_by_standard_name(h, MeshId(1), LocationType::Node, "altitude")
            .unwrap()
            .is_some());
        let mut out = [0.0; 5];
        let fill = lib
            .get_var(h, MeshId(1), LocationType::Node, NODE_Z, &mut out)
            .unwrap();
        assert_eq!(out, [DEFAULT_FILL_VALUE; 5]);
        assert_eq!(fill, DEFAULT_FILL_VALUE);
    }

    #[test]
    fn coordinate_system_switch_keeps_variables_in_agreement() {
        let dir = tempfile::tempdir().unwrap();
        let path = written(&dir);
        let mut lib = library();
        let h = lib.open(&path, OpenMode::Write).unwrap().handle;
        assert_eq!(lib.coordinate_system(h), Ok(0));
        lib.put_coordinate_system(h, &CoordinateSystemRef::wgs84()).unwrap();
        assert_eq!(lib.coordinate_system(h), Ok(4326));
        lib.put_coordinate_system(h, &CoordinateSystemRef::from_epsg(28992))
            .unwrap();
        assert_eq!(lib.coordinate_system(h), Ok(28992));
        let model = lib.model(h).unwrap();
        for name in [GEOGRAPHIC_CRS_VARIABLE, PROJECTED_CRS_VARIABLE] {
            assert_eq!(model.variable(name).unwrap().int_attr("epsg"), Some(28992));
        }
    }

    #[test]
    fn missing_connectivity_variable_is_non_compliant() {
        let dir = tempfile::tempdir().unwrap();
        let path = written(&dir);
        let mut model = DocumentStorage.load(&path).unwrap();
        model.variables.shift_remove("mesh2d_face_nodes");
        DocumentStorage.save(&path, &model).unwrap();
        assert_eq!(
            library().open(&path, OpenMode::Read),
            Err(ErrorCode::IONC_ENONCOMPLIANT)
        );
    }

    #[test]
    fn zero_based_connectivity_is_shifted() {
        let dir = tempfile::tempdir().unwrap();
        let path = written(&dir);
        let mut model = DocumentStorage.load(&path).unwrap();
        let faces = model.variable_mut("mesh2d_face_nodes").unwrap();
        faces.attributes.insert("start_index".into(), AttrValue::Int(0));
        faces.data = VarData::Int(vec![0, 1, 4, -999, 1, 2, 3, 4]);
        DocumentStorage.save(&path, &model).unwrap();

        let mut lib = library();
        let h = lib.open(&path, OpenMode::Read).unwrap().handle;
        let mut out = [0; 8];
        lib.face_nodes(h, MeshId(1), &mut out).unwrap();
        assert_eq!(out, [1, 2, 5, -999, 2, 3, 4, 5]);
    }

    #[test]
    fn unsaved_writes_persist_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.json");
        {
            let mut lib = library();
            let h = lib.create(&path).unwrap();
            lib.def_mesh(h, &sample()).unwrap();
        }
        let mut lib = library();
        let h = lib.open(&path, OpenMode::Read).unwrap().handle;
        assert_eq!(lib.mesh_count(h), Ok(1));
    }
}
