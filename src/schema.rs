//! Feature type descriptions: ordered, named, typed attribute descriptors.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::error::{GeoStreamError, Result};

/// The value domain of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    /// Boolean values.
    Bool,
    /// 64-bit signed integers.
    Int,
    /// 64-bit floating point numbers.
    Double,
    /// UTF-8 strings.
    String,
    /// Geometry values, optionally carrying a reference system.
    Geometry,
}

/// One named, typed slot in a feature type.
///
/// Geometry-typed descriptors may declare the reference system every value in
/// that slot is expressed in; non-geometry descriptors never carry one.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    name: String,
    binding: AttributeType,
    crs: Option<Crs>,
}

impl AttributeDescriptor {
    /// A non-spatial descriptor.
    pub fn new(name: impl Into<String>, binding: AttributeType) -> Self {
        Self {
            name: name.into(),
            binding,
            crs: None,
        }
    }

    /// A geometry descriptor declaring the CRS of its values.
    pub fn geometry(name: impl Into<String>, crs: Option<Crs>) -> Self {
        Self {
            name: name.into(),
            binding: AttributeType::Geometry,
            crs,
        }
    }

    /// The attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attribute's value domain.
    pub fn binding(&self) -> AttributeType {
        self.binding
    }

    /// Declared reference system, only ever present on geometry descriptors.
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// Whether this descriptor holds geometry values.
    pub fn is_geometry(&self) -> bool {
        self.binding == AttributeType::Geometry
    }

    /// The same descriptor with its declared CRS replaced.
    pub fn with_crs(&self, crs: Option<Crs>) -> Self {
        Self {
            name: self.name.clone(),
            binding: self.binding,
            crs,
        }
    }
}

/// The structural description of a feature: a type name plus an ordered list
/// of attribute descriptors, immutable once built.
///
/// Descriptor lookup by name is O(1); iteration follows declaration order.
#[derive(Debug, Clone)]
pub struct FeatureType {
    name: String,
    attributes: IndexMap<String, AttributeDescriptor>,
    default_geometry: Option<String>,
}

impl FeatureType {
    /// Start building a feature type with the given type name.
    pub fn builder(name: impl Into<String>) -> FeatureTypeBuilder {
        FeatureTypeBuilder {
            name: name.into(),
            attributes: IndexMap::new(),
            default_geometry: None,
        }
    }

    /// The type name, also the conventional feature id prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the type has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Descriptors in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.values()
    }

    /// Look up a descriptor by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    /// The positional index of a named attribute.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.get_index_of(name)
    }

    /// The descriptor at a positional index.
    pub fn attribute_at(&self, index: usize) -> Option<&AttributeDescriptor> {
        self.attributes.get_index(index).map(|(_, d)| d)
    }

    /// The default geometry descriptor, if the type has one.
    pub fn default_geometry(&self) -> Option<&AttributeDescriptor> {
        self.default_geometry
            .as_deref()
            .and_then(|name| self.attributes.get(name))
    }

    /// The reference system of the default geometry descriptor.
    pub fn crs(&self) -> Option<&Crs> {
        self.default_geometry().and_then(|d| d.crs())
    }

    /// A copy of this type with every geometry descriptor's CRS replaced by
    /// `crs`. Attribute names, order and bindings are untouched.
    pub fn with_geometry_crs(&self, crs: &Crs) -> Self {
        let attributes = self
            .attributes
            .iter()
            .map(|(name, desc)| {
                let desc = if desc.is_geometry() {
                    desc.with_crs(Some(crs.clone()))
                } else {
                    desc.clone()
                };
                (name.clone(), desc)
            })
            .collect();
        Self {
            name: self.name.clone(),
            attributes,
            default_geometry: self.default_geometry.clone(),
        }
    }

    /// A copy of this type under a different type name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: self.attributes.clone(),
            default_geometry: self.default_geometry.clone(),
        }
    }
}

impl PartialEq for FeatureType {
    /// Structural equality: same type name and the same descriptors in the
    /// same order. `IndexMap`'s own equality ignores order, which is too weak
    /// for schema compatibility checks.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.default_geometry == other.default_geometry
            && self.attributes.len() == other.attributes.len()
            && self
                .attributes
                .values()
                .zip(other.attributes.values())
                .all(|(a, b)| a == b)
    }
}

impl Eq for FeatureType {}

/// Builder for [`FeatureType`].
#[derive(Debug)]
pub struct FeatureTypeBuilder {
    name: String,
    attributes: IndexMap<String, AttributeDescriptor>,
    default_geometry: Option<String>,
}

impl FeatureTypeBuilder {
    /// Append a non-spatial attribute.
    pub fn attribute(mut self, name: impl Into<String>, binding: AttributeType) -> Self {
        let name = name.into();
        self.attributes
            .insert(name.clone(), AttributeDescriptor::new(name, binding));
        self
    }

    /// Append a geometry attribute. The first geometry attribute added
    /// becomes the default geometry.
    pub fn geometry(mut self, name: impl Into<String>, crs: Option<Crs>) -> Self {
        let name = name.into();
        if self.default_geometry.is_none() {
            self.default_geometry = Some(name.clone());
        }
        self.attributes
            .insert(name.clone(), AttributeDescriptor::geometry(name, crs));
        self
    }

    /// Finish, validating that the default geometry refers to a geometry
    /// attribute.
    pub fn build(self) -> Result<FeatureType> {
        if let Some(name) = &self.default_geometry {
            match self.attributes.get(name) {
                Some(desc) if desc.is_geometry() => {}
                _ => {
                    return Err(GeoStreamError::SchemaTransform(format!(
                        "default geometry '{name}' is not a geometry attribute"
                    )))
                }
            }
        }
        Ok(FeatureType {
            name: self.name,
            attributes: self.attributes,
            default_geometry: self.default_geometry,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lakes() -> FeatureType {
        FeatureType::builder("lakes")
            .attribute("name", AttributeType::String)
            .attribute("depth", AttributeType::Int)
            .geometry("geom", Some(Crs::epsg(4326)))
            .build()
            .unwrap()
    }

    #[test]
    fn lookup_and_order() {
        let schema = lakes();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.index_of("depth"), Some(1));
        assert_eq!(schema.attribute("geom").unwrap().crs(), Some(&Crs::epsg(4326)));
        let names: Vec<_> = schema.attributes().map(|d| d.name()).collect();
        assert_eq!(names, vec!["name", "depth", "geom"]);
    }

    #[test]
    fn geometry_crs_replacement_keeps_structure() {
        let schema = lakes();
        let projected = schema.with_geometry_crs(&Crs::epsg(3857));

        assert_eq!(projected.name(), schema.name());
        assert_eq!(projected.len(), schema.len());
        for (a, b) in schema.attributes().zip(projected.attributes()) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.binding(), b.binding());
        }
        assert_eq!(projected.crs(), Some(&Crs::epsg(3857)));
        assert_eq!(projected.attribute("depth").unwrap().crs(), None);
    }

    #[test]
    fn default_geometry_is_first_geometry() {
        let schema = lakes();
        assert_eq!(schema.default_geometry().unwrap().name(), "geom");
    }
}
