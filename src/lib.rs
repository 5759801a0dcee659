//! Streaming feature collections with lazy, on-the-fly coordinate
//! reprojection and schema retyping.
//!
//! The central abstraction is [`FeatureCollection`](collection::FeatureCollection):
//! a closeable, possibly-unbounded sequence of [`Feature`](feature::Feature)s
//! sharing one [`FeatureType`](schema::FeatureType). Decorators wrap any
//! collection transparently:
//!
//! - [`ReprojectedFeatureCollection`](reproject::ReprojectedFeatureCollection)
//!   rewrites geometry attributes into a target CRS, one feature per pull,
//!   caching one coordinate transform per distinct source CRS.
//! - [`RetypedFeatureCollection`](retype::RetypedFeatureCollection) adapts
//!   features to a different but related schema, copying attributes by name
//!   and rewriting `"<typeName>.<localId>"` ids.
//!
//! [`CompositeFeatureCollection`](collection::CompositeFeatureCollection) and
//! [`MemoryFeatureCollection`](collection::MemoryFeatureCollection) aggregate
//! and materialize. Coordinate transforms are pluggable through
//! [`TransformFactory`](transform::TransformFactory); enable the `proj`
//! feature for a [PROJ](https://proj.org)-backed factory.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub mod collection;
pub mod crs;
pub mod error;
pub mod feature;
pub mod filter;
pub mod geometry;
pub mod reproject;
pub mod retype;
pub mod schema;
#[cfg(test)]
pub(crate) mod test;
pub mod transform;

pub use collection::{
    CompositeFeatureCollection, Envelope, FeatureCollection, FeatureReader,
    MemoryFeatureCollection,
};
pub use crs::Crs;
pub use error::{GeoStreamError, Result};
pub use feature::{AttributeValue, Feature};
pub use filter::{Filter, SortBy, SortOrder};
pub use geometry::Geometry;
pub use reproject::{FeatureReprojector, ReprojectedFeatureCollection};
pub use retype::{FeatureRetyper, RetypedFeatureCollection};
pub use schema::{AttributeDescriptor, AttributeType, FeatureType};
pub use transform::{CoordinateTransform, TransformCache, TransformFactory};
