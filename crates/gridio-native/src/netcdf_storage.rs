//! netCDF file storage through libnetcdf.
//!
//! Only integer and floating point variables are loaded. Variables of other
//! types, such as char or string variables, are skipped.

use std::path::Path;

use indexmap::IndexMap;
use netcdf::types::NcVariableType;
use netcdf::AttributeValue;

use crate::model::{AttrValue, DatasetModel, VarData, Variable};
use crate::storage::{DatasetStorage, StorageError};

/// Reads and writes datasets as netCDF files.
#[derive(Clone, Copy, Debug, Default)]
pub struct NetcdfStorage;

fn convert_attr(value: AttributeValue) -> Option<AttrValue> {
    match value {
        AttributeValue::Str(s) => Some(AttrValue::Text(s)),
        AttributeValue::Int(i) => Some(AttrValue::Int(i)),
        AttributeValue::Short(i) => Some(AttrValue::Int(i32::from(i))),
        AttributeValue::Schar(i) => Some(AttrValue::Int(i32::from(i))),
        AttributeValue::Double(d) => Some(AttrValue::Double(d)),
        AttributeValue::Float(f) => Some(AttrValue::Double(f64::from(f))),
        AttributeValue::Ints(v) if v.len() == 1 => Some(AttrValue::Int(v[0])),
        AttributeValue::Doubles(v) if v.len() == 1 => Some(AttrValue::Double(v[0])),
        _ => None,
    }
}

fn read_attrs<'a>(attrs: impl Iterator<Item = netcdf::Attribute<'a>>) -> IndexMap<String, AttrValue> {
    let mut out = IndexMap::new();
    for attr in attrs {
        match attr.value().ok().and_then(convert_attr) {
            Some(value) => {
                out.insert(attr.name().to_owned(), value);
            }
            None => log::debug!("skipping attribute {} of unsupported type", attr.name()),
        }
    }
    out
}

impl DatasetStorage for NetcdfStorage {
    fn load(&self, path: &Path) -> Result<DatasetModel, StorageError> {
        let file = netcdf::open(path)?;
        let mut model = DatasetModel {
            attributes: read_attrs(file.attributes()),
            ..DatasetModel::default()
        };
        for dim in file.dimensions() {
            model.dimensions.insert(dim.name(), dim.len());
        }
        for var in file.variables() {
            let name = var.name();
            let data = match var.vartype() {
                NcVariableType::Int(_) => VarData::Int(var.get_values::<i32, _>(..)?),
                NcVariableType::Float(_) => VarData::Double(var.get_values::<f64, _>(..)?),
                _ => {
                    log::debug!("skipping variable {name} of unsupported type");
                    continue;
                }
            };
            let variable = Variable {
                dimensions: var.dimensions().iter().map(|d| d.name()).collect(),
                attributes: read_attrs(var.attributes()),
                data,
            };
            model.variables.insert(name, variable);
        }
        Ok(model)
    }

    fn save(&self, path: &Path, model: &DatasetModel) -> Result<(), StorageError> {
        let mut file = netcdf::create(path)?;
        for (name, len) in &model.dimensions {
            file.add_dimension(name, *len)?;
        }
        for (name, value) in &model.attributes {
            match value {
                AttrValue::Text(s) => file.add_attribute(name, s.as_str())?,
                AttrValue::Int(i) => file.add_attribute(name, *i)?,
                AttrValue::Double(d) => file.add_attribute(name, *d)?,
            };
        }
        for (name, var) in &model.variables {
            let dims: Vec<&str> = var.dimensions.iter().map(String::as_str).collect();
            match &var.data {
                VarData::Int(values) => {
                    let mut v = file.add_variable::<i32>(name, &dims)?;
                    put_attrs(&mut v, &var.attributes)?;
                    v.put_values(values, ..)?;
                }
                VarData::Double(values) => {
                    let mut v = file.add_variable::<f64>(name, &dims)?;
                    put_attrs(&mut v, &var.attributes)?;
                    v.put_values(values, ..)?;
                }
            }
        }
        Ok(())
    }

    fn global_attribute(&self, path: &Path, name: &str) -> Result<Option<AttrValue>, StorageError> {
        let file = netcdf::open(path)?;
        Ok(file
            .attribute(name)
            .and_then(|a| a.value().ok())
            .and_then(convert_attr))
    }
}

fn put_attrs(
    var: &mut netcdf::VariableMut<'_>,
    attrs: &IndexMap<String, AttrValue>,
) -> Result<(), StorageError> {
    for (name, value) in attrs {
        match value {
            AttrValue::Text(s) => var.put_attribute(name, s.as_str())?,
            AttrValue::Int(i) => var.put_attribute(name, *i)?,
            AttrValue::Double(d) => var.put_attribute(name, *d)?,
        };
    }
    Ok(())
}
