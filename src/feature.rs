//! Features: identified records conforming to a [`FeatureType`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{GeoStreamError, Result};
use crate::geometry::Geometry;
use crate::schema::{AttributeType, FeatureType};

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Absent value, assignable to any descriptor.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer value.
    Int(i64),
    /// 64-bit floating point value.
    Double(f64),
    /// UTF-8 string value.
    String(String),
    /// Geometry value.
    Geometry(Geometry),
}

impl AttributeValue {
    /// Whether this value is assignable to a descriptor with the given
    /// binding. `Null` is assignable to anything.
    pub fn conforms_to(&self, binding: AttributeType) -> bool {
        match self {
            AttributeValue::Null => true,
            AttributeValue::Bool(_) => binding == AttributeType::Bool,
            AttributeValue::Int(_) => binding == AttributeType::Int,
            AttributeValue::Double(_) => binding == AttributeType::Double,
            AttributeValue::String(_) => binding == AttributeType::String,
            AttributeValue::Geometry(_) => binding == AttributeType::Geometry,
        }
    }

    /// The contained geometry, if this is a geometry value.
    pub fn as_geometry(&self) -> Option<&Geometry> {
        match self {
            AttributeValue::Geometry(g) => Some(g),
            _ => None,
        }
    }

    /// Total order over values of one attribute, used for sorting. `Null`
    /// sorts before every non-null value; values of different variants (which
    /// a schema-conforming collection never mixes) compare as equal.
    pub fn compare(&self, other: &Self) -> Ordering {
        use AttributeValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Double(a), Double(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl From<Geometry> for AttributeValue {
    fn from(value: Geometry) -> Self {
        AttributeValue::Geometry(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

/// An identified record with a fixed, ordered set of typed attributes.
///
/// Identity is a string id, conventionally `"<typeName>.<localId>"`. Features
/// additionally carry an opaque user-data map that transforms must preserve.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    id: String,
    schema: Arc<FeatureType>,
    values: Vec<AttributeValue>,
    user_data: HashMap<String, Value>,
}

impl Feature {
    /// Build a feature, validating arity and per-attribute bindings against
    /// the schema.
    pub fn try_new(
        schema: Arc<FeatureType>,
        id: impl Into<String>,
        values: Vec<AttributeValue>,
    ) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(GeoStreamError::TypeMismatch(format!(
                "feature type '{}' has {} attributes but {} values were supplied",
                schema.name(),
                schema.len(),
                values.len()
            )));
        }
        for (descriptor, value) in schema.attributes().zip(&values) {
            if !value.conforms_to(descriptor.binding()) {
                return Err(GeoStreamError::TypeMismatch(format!(
                    "value {:?} is not assignable to attribute '{}' of type {:?}",
                    value,
                    descriptor.name(),
                    descriptor.binding()
                )));
            }
        }
        Ok(Self {
            id: id.into(),
            schema,
            values,
            user_data: HashMap::new(),
        })
    }

    /// The feature id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The schema every value conforms to.
    pub fn schema(&self) -> &Arc<FeatureType> {
        &self.schema
    }

    /// Values in schema order.
    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    /// Look up a value by attribute name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.schema.index_of(name).map(|i| &self.values[i])
    }

    /// The value at a positional index.
    pub fn attribute_at(&self, index: usize) -> Option<&AttributeValue> {
        self.values.get(index)
    }

    /// The value of the schema's default geometry attribute.
    pub fn default_geometry(&self) -> Option<&Geometry> {
        let descriptor = self.schema.default_geometry()?;
        self.attribute(descriptor.name())?.as_geometry()
    }

    /// Replace a named attribute's value, validating the binding.
    pub fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        let index = self.schema.index_of(name).ok_or_else(|| {
            GeoStreamError::TypeMismatch(format!(
                "feature type '{}' has no attribute '{name}'",
                self.schema.name()
            ))
        })?;
        let descriptor = self.schema.attribute_at(index).unwrap();
        if !value.conforms_to(descriptor.binding()) {
            return Err(GeoStreamError::TypeMismatch(format!(
                "value {:?} is not assignable to attribute '{name}' of type {:?}",
                value,
                descriptor.binding()
            )));
        }
        self.values[index] = value;
        Ok(())
    }

    /// Opaque user data attached to this feature.
    pub fn user_data(&self) -> &HashMap<String, Value> {
        &self.user_data
    }

    /// Attach one user-data entry.
    pub fn insert_user_data(&mut self, key: impl Into<String>, value: Value) {
        self.user_data.insert(key.into(), value);
    }

    /// Replace the whole user-data map. Used by transforms to carry the
    /// source feature's map over to the derived feature.
    pub(crate) fn set_user_data(&mut self, user_data: HashMap<String, Value>) {
        self.user_data = user_data;
    }
}
