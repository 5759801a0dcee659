//! Geometry values with an explicit, optional reference system tag.

use geo::algorithm::BoundingRect;
use geo::Rect;
use wkt::ToWkt;

use crate::crs::Crs;

/// A spatial value plus the reference system its coordinates are expressed in.
///
/// The CRS is carried as an explicit optional field rather than untyped side
/// metadata, so "this geometry's reference system is unknown" is visible in
/// the type. A geometry with `crs: None` can still be reprojected when the
/// surrounding collection supplies a default source CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    shape: geo::Geometry<f64>,
    crs: Option<Crs>,
}

impl Geometry {
    /// A geometry with no reference system information.
    pub fn new(shape: geo::Geometry<f64>) -> Self {
        Self { shape, crs: None }
    }

    /// A geometry whose coordinates are known to be expressed in `crs`.
    pub fn with_crs(shape: geo::Geometry<f64>, crs: Crs) -> Self {
        Self {
            shape,
            crs: Some(crs),
        }
    }

    /// The raw shape.
    pub fn shape(&self) -> &geo::Geometry<f64> {
        &self.shape
    }

    /// The attached reference system, if known.
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// Axis-aligned bounding rectangle, `None` for empty shapes.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.shape.bounding_rect()
    }

    /// WKT rendering, used in error messages.
    pub fn wkt_string(&self) -> String {
        self.shape.wkt_string()
    }
}

impl From<geo::Geometry<f64>> for Geometry {
    fn from(shape: geo::Geometry<f64>) -> Self {
        Self::new(shape)
    }
}

impl From<geo::Point<f64>> for Geometry {
    fn from(point: geo::Point<f64>) -> Self {
        Self::new(geo::Geometry::Point(point))
    }
}
