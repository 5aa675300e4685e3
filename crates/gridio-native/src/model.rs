//! In-memory netCDF-style data model.
//!
//! A [`DatasetModel`] holds global attributes, named dimensions, and named
//! variables in declaration order. Storage backends translate between this
//! model and bytes on disk; the UGRID layer interprets it as meshes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Attribute value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// Character data.
    Text(String),
    /// 32-bit integer.
    Int(i32),
    /// Double precision float.
    Double(#[serde(with = "json_float")] f64),
}

impl AttrValue {
    /// Text content, if this is a text attribute.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Integer content; doubles with an integral value are accepted.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Double(d) if d.fract() == 0.0 => Some(*d as i32),
            _ => None,
        }
    }

    /// Floating point content.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Int(i) => Some(f64::from(*i)),
            Self::Text(_) => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i32> for AttrValue {
    fn from(i: i32) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for AttrValue {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

/// Variable payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum VarData {
    /// Integer values.
    Int(Vec<i32>),
    /// Double precision values.
    Double(#[serde(with = "json_float::seq")] Vec<f64>),
}

// JSON numbers cannot hold NaN or the infinities; those are stored as the
// strings "NaN", "inf" and "-inf".
mod json_float {
    use serde::de::{Error, Unexpected};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    const NAN: &str = "NaN";
    const INF: &str = "inf";
    const NEG_INF: &str = "-inf";

    struct Float(f64);

    impl Serialize for Float {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            match self.0 {
                v if v.is_finite() => s.serialize_f64(v),
                v if v.is_nan() => s.serialize_str(NAN),
                v if v > 0.0 => s.serialize_str(INF),
                _ => s.serialize_str(NEG_INF),
            }
        }
    }

    impl<'de> Deserialize<'de> for Float {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            #[derive(Deserialize)]
            #[serde(untagged)]
            enum Repr {
                Number(f64),
                Text(String),
            }
            match Repr::deserialize(d)? {
                Repr::Number(v) => Ok(Float(v)),
                Repr::Text(text) => match text.as_str() {
                    NAN => Ok(Float(f64::NAN)),
                    INF => Ok(Float(f64::INFINITY)),
                    NEG_INF => Ok(Float(f64::NEG_INFINITY)),
                    other => Err(D::Error::invalid_value(
                        Unexpected::Str(other),
                        &"a number, \"NaN\", \"inf\" or \"-inf\"",
                    )),
                },
            }
        }
    }

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        Float(*value).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Float::deserialize(d).map(|f| f.0)
    }

    pub mod seq {
        use super::Float;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
            s.collect_seq(values.iter().map(|v| Float(*v)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
            let values = Vec::<Float>::deserialize(d)?;
            Ok(values.into_iter().map(|f| f.0).collect())
        }
    }
}

impl VarData {
    /// Number of stored values.
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Double(v) => v.len(),
        }
    }

    /// `true` when no values are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One variable: its dimensions, attributes, and data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Dimension names, outermost first.
    pub dimensions: Vec<String>,
    /// Attributes in declaration order.
    pub attributes: IndexMap<String, AttrValue>,
    /// Row-major data.
    pub data: VarData,
}

impl Variable {
    /// A scalar integer variable, as used for topology and CRS containers.
    pub fn scalar() -> Self {
        Self {
            dimensions: Vec::new(),
            attributes: IndexMap::new(),
            data: VarData::Int(vec![0]),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.to_owned(), value.into());
        self
    }

    /// Look up a text attribute.
    pub fn text_attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(AttrValue::as_text)
    }

    /// Look up an integer attribute.
    pub fn int_attr(&self, name: &str) -> Option<i32> {
        self.attributes.get(name).and_then(AttrValue::as_int)
    }

    /// Look up a floating point attribute.
    pub fn double_attr(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).and_then(AttrValue::as_double)
    }
}

/// A whole dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetModel {
    /// Global attributes.
    pub attributes: IndexMap<String, AttrValue>,
    /// Dimension lengths by name.
    pub dimensions: IndexMap<String, usize>,
    /// Variables by name.
    pub variables: IndexMap<String, Variable>,
}

impl DatasetModel {
    /// Text value of a global attribute.
    pub fn global_text(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(AttrValue::as_text)
    }

    /// Length of a dimension.
    pub fn dimension(&self, name: &str) -> Option<usize> {
        self.dimensions.get(name).copied()
    }

    /// Variable by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Mutable variable by name.
    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.get_mut(name)
    }

    /// Declaration index of a variable.
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.get_index_of(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_doubles_survive_json() {
        let data = VarData::Double(vec![f64::INFINITY, f64::NEG_INFINITY, f64::NAN, -0.0, 1.5]);
        let text = serde_json::to_string(&data).unwrap();
        let VarData::Double(back) = serde_json::from_str::<VarData>(&text).unwrap() else {
            panic!("expected doubles, got {text}");
        };
        assert_eq!(back[0], f64::INFINITY);
        assert_eq!(back[1], f64::NEG_INFINITY);
        assert!(back[2].is_nan());
        assert_eq!(back[3].to_bits(), (-0.0f64).to_bits());
        assert_eq!(back[4], 1.5);
    }

    #[test]
    fn non_finite_attributes_survive_json() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -999.0] {
            let attr = AttrValue::Double(value);
            let text = serde_json::to_string(&attr).unwrap();
            let back = serde_json::from_str::<AttrValue>(&text).unwrap();
            let restored = back.as_double().unwrap();
            assert!(
                restored == value || (restored.is_nan() && value.is_nan()),
                "{text}"
            );
        }
    }

    #[test]
    fn unknown_text_is_rejected() {
        assert!(serde_json::from_str::<VarData>(r#"{"Double":["big"]}"#).is_err());
    }
}
