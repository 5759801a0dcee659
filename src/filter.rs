//! A small filter algebra plus the CRS-rewriting passes decorators apply
//! before pushing a filter down to their delegate.

use std::cmp::Ordering;

use geo::algorithm::{BoundingRect, Intersects};
use geo::Rect;
use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::error::{GeoStreamError, Result};
use crate::feature::{AttributeValue, Feature};
use crate::geometry::Geometry;
use crate::transform::TransformFactory;

/// A predicate over features.
///
/// Spatial predicates reference a geometry attribute by name (`None` meaning
/// the schema's default geometry) and carry a literal whose CRS may be
/// unqualified; decorators qualify and reproject those literals before
/// delegating, see [`Filter::with_default_crs`] and
/// [`Filter::reproject_literals`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every feature.
    Include,
    /// Matches no feature.
    Exclude,
    /// Matches features whose id is in the given set.
    FeatureId(Vec<String>),
    /// Matches features whose named attribute equals the literal.
    PropertyEq {
        /// Attribute name.
        name: String,
        /// Literal to compare against.
        value: AttributeValue,
    },
    /// Matches features whose geometry's bounding rectangle intersects the
    /// given rectangle.
    Bbox {
        /// Geometry attribute name, `None` for the default geometry.
        name: Option<String>,
        /// The query rectangle.
        bounds: Rect<f64>,
        /// The CRS the rectangle is expressed in, if known.
        crs: Option<Crs>,
    },
    /// Matches features whose geometry intersects the literal geometry.
    Intersects {
        /// Geometry attribute name, `None` for the default geometry.
        name: Option<String>,
        /// The literal geometry.
        geometry: Geometry,
    },
    /// Matches when every operand matches.
    And(Vec<Filter>),
    /// Matches when any operand matches.
    Or(Vec<Filter>),
    /// Matches when the operand does not match.
    Not(Box<Filter>),
}

impl Filter {
    /// Evaluate against a single feature. Used by in-memory collections;
    /// decorators never evaluate, they delegate.
    pub fn evaluate(&self, feature: &Feature) -> bool {
        match self {
            Filter::Include => true,
            Filter::Exclude => false,
            Filter::FeatureId(ids) => ids.iter().any(|id| id == feature.id()),
            Filter::PropertyEq { name, value } => {
                feature.attribute(name).is_some_and(|v| v == value)
            }
            Filter::Bbox { name, bounds, .. } => resolve_geometry(feature, name.as_deref())
                .and_then(|g| g.bounding_rect())
                .is_some_and(|rect| rect.intersects(bounds)),
            Filter::Intersects { name, geometry } => resolve_geometry(feature, name.as_deref())
                .is_some_and(|g| g.shape().intersects(geometry.shape())),
            Filter::And(operands) => operands.iter().all(|f| f.evaluate(feature)),
            Filter::Or(operands) => operands.iter().any(|f| f.evaluate(feature)),
            Filter::Not(operand) => !operand.evaluate(feature),
        }
    }

    /// Attach `crs` to every spatial literal that does not already declare
    /// one. Applied by reprojecting decorators so an unqualified literal is
    /// interpreted in the decorator's (target) CRS rather than the
    /// delegate's.
    pub fn with_default_crs(&self, crs: &Crs) -> Filter {
        match self {
            Filter::Bbox {
                name,
                bounds,
                crs: None,
            } => Filter::Bbox {
                name: name.clone(),
                bounds: *bounds,
                crs: Some(crs.clone()),
            },
            Filter::Intersects { name, geometry } if geometry.crs().is_none() => {
                Filter::Intersects {
                    name: name.clone(),
                    geometry: Geometry::with_crs(geometry.shape().clone(), crs.clone()),
                }
            }
            Filter::And(operands) => {
                Filter::And(operands.iter().map(|f| f.with_default_crs(crs)).collect())
            }
            Filter::Or(operands) => {
                Filter::Or(operands.iter().map(|f| f.with_default_crs(crs)).collect())
            }
            Filter::Not(operand) => Filter::Not(Box::new(operand.with_default_crs(crs))),
            other => other.clone(),
        }
    }

    /// Reproject every spatial literal into `target`, constructing transforms
    /// with `factory`. Literals with no CRS and literals already in `target`
    /// pass through unchanged.
    pub fn reproject_literals(
        &self,
        target: &Crs,
        factory: &dyn TransformFactory,
    ) -> Result<Filter> {
        match self {
            Filter::Bbox {
                name,
                bounds,
                crs: Some(crs),
            } if crs != target => {
                let transform = factory.create(crs, target)?;
                let polygon = geo::Geometry::Polygon(bounds.to_polygon());
                let bounds = transform.apply(&polygon)?.bounding_rect().ok_or_else(|| {
                    GeoStreamError::Filter(
                        "bbox literal transformed to an empty geometry".to_string(),
                    )
                })?;
                Ok(Filter::Bbox {
                    name: name.clone(),
                    bounds,
                    crs: Some(target.clone()),
                })
            }
            Filter::Intersects { name, geometry } => match geometry.crs() {
                Some(crs) if crs != target => {
                    let transform = factory.create(crs, target)?;
                    let shape = transform.apply(geometry.shape())?;
                    Ok(Filter::Intersects {
                        name: name.clone(),
                        geometry: Geometry::with_crs(shape, target.clone()),
                    })
                }
                _ => Ok(self.clone()),
            },
            Filter::And(operands) => Ok(Filter::And(
                operands
                    .iter()
                    .map(|f| f.reproject_literals(target, factory))
                    .collect::<Result<_>>()?,
            )),
            Filter::Or(operands) => Ok(Filter::Or(
                operands
                    .iter()
                    .map(|f| f.reproject_literals(target, factory))
                    .collect::<Result<_>>()?,
            )),
            Filter::Not(operand) => Ok(Filter::Not(Box::new(
                operand.reproject_literals(target, factory)?,
            ))),
            other => Ok(other.clone()),
        }
    }
}

fn resolve_geometry<'a>(feature: &'a Feature, name: Option<&str>) -> Option<&'a Geometry> {
    match name {
        Some(name) => feature.attribute(name)?.as_geometry(),
        None => feature.default_geometry(),
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Smallest value first, nulls first.
    Ascending,
    /// Largest value first, nulls last.
    Descending,
}

/// A sort specification: one attribute plus a direction.
#[derive(Debug, Clone, PartialEq)]
pub struct SortBy {
    property: String,
    order: SortOrder,
}

impl SortBy {
    /// Sort ascending by the named attribute.
    pub fn ascending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            order: SortOrder::Ascending,
        }
    }

    /// Sort descending by the named attribute.
    pub fn descending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            order: SortOrder::Descending,
        }
    }

    /// The attribute sorted on.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// The direction.
    pub fn order(&self) -> SortOrder {
        self.order
    }

    /// Compare two features under this specification. Features missing the
    /// attribute sort as null.
    pub fn compare(&self, a: &Feature, b: &Feature) -> Ordering {
        let va = a.attribute(&self.property).unwrap_or(&AttributeValue::Null);
        let vb = b.attribute(&self.property).unwrap_or(&AttributeValue::Null);
        match self.order {
            SortOrder::Ascending => va.compare(vb),
            SortOrder::Descending => va.compare(vb).reverse(),
        }
    }
}

#[cfg(test)]
mod test {
    use geo::{point, Coord};

    use super::*;
    use crate::test::{lake, lakes_schema};

    #[test]
    fn property_and_id_filters() {
        let feature = lake(1, "Mead", 532, point!(x: 1., y: 2.));

        assert!(Filter::Include.evaluate(&feature));
        assert!(!Filter::Exclude.evaluate(&feature));
        assert!(Filter::FeatureId(vec!["lakes.1".into()]).evaluate(&feature));
        assert!(Filter::PropertyEq {
            name: "name".into(),
            value: "Mead".into(),
        }
        .evaluate(&feature));
        assert!(!Filter::PropertyEq {
            name: "depth".into(),
            value: AttributeValue::Int(3),
        }
        .evaluate(&feature));
    }

    #[test]
    fn bbox_uses_default_geometry() {
        let feature = lake(1, "Mead", 532, point!(x: 1., y: 2.));
        let hit = Filter::Bbox {
            name: None,
            bounds: Rect::new(Coord { x: 0., y: 0. }, Coord { x: 5., y: 5. }),
            crs: None,
        };
        let miss = Filter::Bbox {
            name: None,
            bounds: Rect::new(Coord { x: 10., y: 10. }, Coord { x: 20., y: 20. }),
            crs: None,
        };
        assert!(hit.evaluate(&feature));
        assert!(!miss.evaluate(&feature));
    }

    #[test]
    fn default_crs_attaches_only_to_unqualified_literals() {
        let qualified = Filter::Bbox {
            name: None,
            bounds: Rect::new(Coord { x: 0., y: 0. }, Coord { x: 1., y: 1. }),
            crs: Some(Crs::epsg(4326)),
        };
        let unqualified = Filter::Bbox {
            name: None,
            bounds: Rect::new(Coord { x: 0., y: 0. }, Coord { x: 1., y: 1. }),
            crs: None,
        };
        let filter = Filter::And(vec![qualified.clone(), unqualified]);

        let rewritten = filter.with_default_crs(&Crs::epsg(3857));
        let Filter::And(operands) = rewritten else {
            panic!("expected And");
        };
        assert_eq!(operands[0], qualified);
        let Filter::Bbox { crs, .. } = &operands[1] else {
            panic!("expected Bbox");
        };
        assert_eq!(crs.as_ref(), Some(&Crs::epsg(3857)));
    }

    #[test]
    fn sort_compare_orders_nulls_first() {
        let shallow = lake(1, "Mead", 10, point!(x: 0., y: 0.));
        let deep = lake(2, "Baikal", 1642, point!(x: 1., y: 1.));
        let unnamed = crate::feature::Feature::try_new(
            lakes_schema(),
            "lakes.3",
            vec![
                AttributeValue::Null,
                AttributeValue::Int(5),
                AttributeValue::Null,
            ],
        )
        .unwrap();

        let by_depth = SortBy::ascending("depth");
        assert_eq!(by_depth.compare(&shallow, &deep), Ordering::Less);
        assert_eq!(
            SortBy::descending("depth").compare(&shallow, &deep),
            Ordering::Greater
        );

        let by_name = SortBy::ascending("name");
        assert_eq!(by_name.compare(&unnamed, &shallow), Ordering::Less);
    }
}
