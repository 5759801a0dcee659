//! Lazy, per-feature reprojection into a target reference system, exposed as
//! a whole-collection decorator.

use std::sync::Arc;

use crate::collection::registry::ReaderRegistry;
use crate::collection::{FeatureCollection, FeatureReader};
use crate::crs::Crs;
use crate::error::{GeoStreamError, Result};
use crate::feature::{AttributeValue, Feature};
use crate::filter::Filter;
use crate::geometry::Geometry;
use crate::schema::FeatureType;
use crate::transform::{TransformCache, TransformFactory};

/// Rewrites one feature at a time into the target CRS.
///
/// The target schema is the source schema with every geometry descriptor's
/// CRS replaced; attribute names, order and types never change. Per-source
/// transforms are cached for the reprojector's lifetime.
pub struct FeatureReprojector {
    source_schema: Arc<FeatureType>,
    target_schema: Arc<FeatureType>,
    /// Target attribute index to source attribute index, resolved by name
    /// once at construction.
    mapping: Vec<usize>,
    default_source: Option<Crs>,
    cache: TransformCache,
}

impl FeatureReprojector {
    /// Build a reprojector into `target`.
    ///
    /// Fails with [`SchemaTransform`](GeoStreamError::SchemaTransform) when a
    /// geometry descriptor declares no CRS and no `default_source` is
    /// configured, since such a geometry could never be interpreted.
    pub fn try_new(
        source_schema: Arc<FeatureType>,
        target: Crs,
        factory: Arc<dyn TransformFactory>,
        default_source: Option<Crs>,
    ) -> Result<Self> {
        for descriptor in source_schema.attributes() {
            if descriptor.is_geometry() && descriptor.crs().is_none() && default_source.is_none() {
                return Err(GeoStreamError::SchemaTransform(format!(
                    "geometry attribute '{}' of '{}' declares no CRS and no default source CRS \
                     is configured",
                    descriptor.name(),
                    source_schema.name()
                )));
            }
        }
        let target_schema = Arc::new(source_schema.with_geometry_crs(&target));
        let mapping = target_schema
            .attributes()
            .map(|descriptor| {
                // Same attribute set by construction.
                source_schema
                    .index_of(descriptor.name())
                    .expect("target schema derived from source")
            })
            .collect();
        Ok(Self {
            source_schema,
            target_schema,
            mapping,
            default_source,
            cache: TransformCache::new(factory, target),
        })
    }

    /// The schema derived features conform to.
    pub fn target_schema(&self) -> &Arc<FeatureType> {
        &self.target_schema
    }

    /// The fixed target reference system.
    pub fn target_crs(&self) -> &Crs {
        self.cache.target()
    }

    /// The default source CRS applied to untagged geometries, if configured.
    pub fn default_source(&self) -> Option<&Crs> {
        self.default_source.as_ref()
    }

    /// Number of distinct source systems transformed so far.
    pub fn cached_transforms(&self) -> usize {
        self.cache.len()
    }

    /// Derive the target-CRS rendition of `feature`. The id and user data are
    /// carried over unchanged; non-geometry values pass through.
    pub fn reproject(&self, feature: &Feature) -> Result<Feature> {
        let mut values = Vec::with_capacity(self.mapping.len());
        for &source_index in &self.mapping {
            let value = feature
                .attribute_at(source_index)
                .unwrap_or(&AttributeValue::Null);
            match value {
                AttributeValue::Geometry(geometry) => {
                    values.push(self.reproject_geometry(geometry)?.into());
                }
                other => values.push(other.clone()),
            }
        }
        let mut out = Feature::try_new(self.target_schema.clone(), feature.id(), values)?;
        out.set_user_data(feature.user_data().clone());
        Ok(out)
    }

    /// Transform one geometry value. Geometries whose effective source CRS is
    /// unknown, or already the target, pass through unchanged.
    fn reproject_geometry(&self, geometry: &Geometry) -> Result<Geometry> {
        let effective = geometry.crs().or(self.default_source.as_ref());
        let Some(source) = effective else {
            return Ok(geometry.clone());
        };
        if source == self.cache.target() {
            return Ok(geometry.clone());
        }
        let wrap = |err: GeoStreamError| GeoStreamError::Reprojection {
            wkt: geometry.wkt_string(),
            crs: source.code().to_string(),
            source: Box::new(err),
        };
        let transform = self.cache.get_or_create(source).map_err(&wrap)?;
        let shape = transform.apply(geometry.shape()).map_err(&wrap)?;
        Ok(Geometry::with_crs(shape, self.cache.target().clone()))
    }
}

/// Decorator exposing a delegate collection in a different CRS.
///
/// Features are transformed lazily, one per `try_next` call; no part of the
/// delegate is materialized. Filters passed to
/// [`sub_collection`](FeatureCollection::sub_collection) are rewritten into
/// the delegate's native CRS before being pushed down.
pub struct ReprojectedFeatureCollection {
    delegate: Arc<dyn FeatureCollection>,
    reprojector: Arc<FeatureReprojector>,
    factory: Arc<dyn TransformFactory>,
    registry: ReaderRegistry,
}

impl ReprojectedFeatureCollection {
    /// Wrap `delegate`, presenting its features in `target` coordinates.
    pub fn try_new(
        delegate: Arc<dyn FeatureCollection>,
        target: Crs,
        factory: Arc<dyn TransformFactory>,
    ) -> Result<Self> {
        Self::with_default_source(delegate, target, factory, None)
    }

    /// Like [`try_new`](Self::try_new), additionally supplying the CRS
    /// assumed for geometries that carry none.
    pub fn with_default_source(
        delegate: Arc<dyn FeatureCollection>,
        target: Crs,
        factory: Arc<dyn TransformFactory>,
        default_source: Option<Crs>,
    ) -> Result<Self> {
        let reprojector = FeatureReprojector::try_new(
            delegate.schema().clone(),
            target,
            factory.clone(),
            default_source,
        )?;
        Ok(Self {
            delegate,
            reprojector: Arc::new(reprojector),
            factory,
            registry: ReaderRegistry::new(),
        })
    }

    /// The per-feature transform this collection applies.
    pub fn reprojector(&self) -> &FeatureReprojector {
        &self.reprojector
    }

    /// The CRS filters must be rewritten into before pushdown: what the
    /// delegate's data is actually expressed in.
    fn native_crs(&self) -> Option<Crs> {
        self.reprojector
            .source_schema
            .crs()
            .cloned()
            .or_else(|| self.reprojector.default_source.clone())
    }
}

impl std::fmt::Debug for ReprojectedFeatureCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReprojectedFeatureCollection")
            .field("schema", &self.delegate.schema().name())
            .finish()
    }
}

impl FeatureCollection for ReprojectedFeatureCollection {
    fn schema(&self) -> &Arc<FeatureType> {
        self.reprojector.target_schema()
    }

    fn reader(&self) -> Result<Box<dyn FeatureReader>> {
        let reader = ReprojectingReader {
            delegate: Some(self.delegate.reader()?),
            reprojector: self.reprojector.clone(),
        };
        Ok(Box::new(self.registry.track(Box::new(reader))))
    }

    fn sub_collection(&self, filter: &Filter) -> Result<Arc<dyn FeatureCollection>> {
        // Callers phrase spatial literals in this collection's CRS; qualify
        // the unqualified ones, then move them all into the delegate's CRS.
        let qualified = filter.with_default_crs(self.reprojector.target_crs());
        let pushed = match self.native_crs() {
            Some(native) => qualified.reproject_literals(&native, self.factory.as_ref())?,
            None => qualified,
        };
        let sub = self.delegate.sub_collection(&pushed)?;
        Ok(Arc::new(Self::with_default_source(
            sub,
            self.reprojector.target_crs().clone(),
            self.factory.clone(),
            self.reprojector.default_source.clone(),
        )?))
    }

    fn close(&self) {
        self.registry.close_all();
    }
}

/// Reader applying the reprojector to each feature pulled from the delegate.
struct ReprojectingReader {
    delegate: Option<Box<dyn FeatureReader>>,
    reprojector: Arc<FeatureReprojector>,
}

impl FeatureReader for ReprojectingReader {
    fn try_next(&mut self) -> Result<Option<Feature>> {
        let Some(delegate) = self.delegate.as_mut() else {
            return Ok(None);
        };
        match delegate.try_next()? {
            Some(feature) => Ok(Some(self.reprojector.reproject(&feature)?)),
            None => Ok(None),
        }
    }

    fn close(&mut self) -> Result<()> {
        match self.delegate.take() {
            Some(mut delegate) => delegate.close(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use geo::point;

    use super::*;
    use crate::collection::MemoryFeatureCollection;
    use crate::test::{
        lake, lake_untagged, lakes_schema, CountingFactory, EpsgFactory, WEB_MERCATOR_RADIUS,
    };

    fn lakes_4326() -> Arc<dyn FeatureCollection> {
        Arc::new(
            MemoryFeatureCollection::try_new(
                lakes_schema(),
                vec![
                    lake(1, "Mead", 532, point!(x: -114.4, y: 36.2)),
                    lake(2, "Baikal", 1642, point!(x: 107.7, y: 53.5)),
                    lake(3, "Victoria", 84, point!(x: 33.0, y: -1.0)),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn schema_only_changes_geometry_crs() {
        let source = lakes_4326();
        let projected =
            ReprojectedFeatureCollection::try_new(source.clone(), Crs::epsg(3857), Arc::new(EpsgFactory))
                .unwrap();

        let before = source.schema();
        let after = projected.schema();
        assert_eq!(after.len(), before.len());
        for (a, b) in before.attributes().zip(after.attributes()) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.binding(), b.binding());
        }
        assert_eq!(after.crs(), Some(&Crs::epsg(3857)));
    }

    #[test]
    fn identity_reprojection_yields_equal_features() {
        let source = lakes_4326();
        let projected =
            ReprojectedFeatureCollection::try_new(source.clone(), Crs::epsg(4326), Arc::new(EpsgFactory))
                .unwrap();

        let original = source.to_vec().unwrap();
        let reprojected = projected.to_vec().unwrap();
        assert_eq!(original.len(), reprojected.len());
        for (a, b) in original.iter().zip(&reprojected) {
            assert_eq!(a.id(), b.id());
            assert_eq!(a.values(), b.values());
        }
    }

    #[test]
    fn untagged_geometries_with_default_source_are_transformed() {
        let untagged = Arc::new(
            MemoryFeatureCollection::try_new(
                lakes_schema(),
                vec![
                    lake_untagged(1, "Mead", 532, point!(x: -114.4, y: 36.2)),
                    lake_untagged(2, "Baikal", 1642, point!(x: 107.7, y: 53.5)),
                    lake_untagged(3, "Victoria", 84, point!(x: 33.0, y: -1.0)),
                ],
            )
            .unwrap(),
        );
        let projected = ReprojectedFeatureCollection::with_default_source(
            untagged,
            Crs::epsg(3857),
            Arc::new(EpsgFactory),
            Some(Crs::epsg(4326)),
        )
        .unwrap();

        let filtered = projected.sub_collection(&Filter::Include).unwrap();
        let features = filtered.to_vec().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(filtered.schema().crs(), Some(&Crs::epsg(3857)));

        let geo::Geometry::Point(p) = features[2].default_geometry().unwrap().shape() else {
            panic!("expected a point");
        };
        assert_relative_eq!(p.x(), 33.0_f64.to_radians() * WEB_MERCATOR_RADIUS);
        assert_eq!(
            features[2].default_geometry().unwrap().crs(),
            Some(&Crs::epsg(3857))
        );
    }

    #[test]
    fn transform_is_constructed_once_per_source_crs() {
        let features = (0..1000i64)
            .map(|i| lake(i, "Lake", 10, point!(x: (i % 90) as f64, y: 0.)))
            .collect::<Vec<_>>();
        let source = Arc::new(
            MemoryFeatureCollection::try_new(lakes_schema(), features).unwrap(),
        );
        let factory = Arc::new(CountingFactory::new(EpsgFactory));
        let projected =
            ReprojectedFeatureCollection::try_new(source, Crs::epsg(3857), factory.clone())
                .unwrap();

        assert_eq!(projected.size().unwrap(), 1000);
        assert_eq!(factory.constructions(), 1);
        assert_eq!(projected.reprojector().cached_transforms(), 1);
    }

    #[test]
    fn schema_without_crs_and_no_default_fails_construction() {
        let schema = Arc::new(
            crate::schema::FeatureType::builder("sketches")
                .geometry("geom", None)
                .build()
                .unwrap(),
        );
        let source: Arc<dyn FeatureCollection> = Arc::new(MemoryFeatureCollection::new(schema));

        let err =
            ReprojectedFeatureCollection::try_new(source, Crs::epsg(3857), Arc::new(EpsgFactory))
                .unwrap_err();
        assert!(matches!(err, GeoStreamError::SchemaTransform(_)));
    }

    #[test]
    fn transform_failure_surfaces_as_reprojection_error() {
        let schema = Arc::new(
            crate::schema::FeatureType::builder("lakes")
                .geometry("geom", Some(Crs::new("ENGINEERING:LOCAL")))
                .build()
                .unwrap(),
        );
        let feature = Feature::try_new(
            schema.clone(),
            "lakes.1",
            vec![Geometry::with_crs(
                point!(x: 1., y: 2.).into(),
                Crs::new("ENGINEERING:LOCAL"),
            )
            .into()],
        )
        .unwrap();
        let source = Arc::new(
            MemoryFeatureCollection::try_new(schema, vec![feature]).unwrap(),
        );
        let projected =
            ReprojectedFeatureCollection::try_new(source, Crs::epsg(3857), Arc::new(EpsgFactory))
                .unwrap();

        let mut reader = projected.reader().unwrap();
        let err = reader.try_next().unwrap_err();
        reader.close().unwrap();
        match err {
            GeoStreamError::Reprojection { wkt, crs, .. } => {
                assert_eq!(wkt, "POINT(1 2)");
                assert_eq!(crs, "ENGINEERING:LOCAL");
            }
            other => panic!("expected Reprojection, got {other:?}"),
        }
    }

    #[test]
    fn bulk_operations_wrap_mid_stream_failures() {
        let schema = Arc::new(
            crate::schema::FeatureType::builder("lakes")
                .geometry("geom", Some(Crs::new("ENGINEERING:LOCAL")))
                .build()
                .unwrap(),
        );
        let feature = Feature::try_new(
            schema.clone(),
            "lakes.1",
            vec![Geometry::with_crs(
                point!(x: 1., y: 2.).into(),
                Crs::new("ENGINEERING:LOCAL"),
            )
            .into()],
        )
        .unwrap();
        let source = Arc::new(
            MemoryFeatureCollection::try_new(schema, vec![feature]).unwrap(),
        );
        let projected =
            ReprojectedFeatureCollection::try_new(source, Crs::epsg(3857), Arc::new(EpsgFactory))
                .unwrap();

        for err in [
            projected.bounds().unwrap_err(),
            projected.to_vec().unwrap_err(),
            projected.size().unwrap_err(),
        ] {
            let GeoStreamError::Collection(cause) = err else {
                panic!("expected Collection wrapper");
            };
            assert!(matches!(*cause, GeoStreamError::Reprojection { .. }));
        }
    }

    #[test]
    fn reader_close_is_idempotent() {
        let projected =
            ReprojectedFeatureCollection::try_new(lakes_4326(), Crs::epsg(3857), Arc::new(EpsgFactory))
                .unwrap();
        let mut reader = projected.reader().unwrap();
        assert!(reader.try_next().unwrap().is_some());
        reader.close().unwrap();
        reader.close().unwrap();
        assert!(reader.try_next().unwrap().is_none());
    }

    #[test]
    fn user_data_is_carried_over() {
        let mut feature = lake(1, "Mead", 532, point!(x: -114.4, y: 36.2));
        feature.insert_user_data("origin", serde_json::json!("import-42"));
        let source = Arc::new(
            MemoryFeatureCollection::try_new(lakes_schema(), vec![feature]).unwrap(),
        );
        let projected =
            ReprojectedFeatureCollection::try_new(source, Crs::epsg(3857), Arc::new(EpsgFactory))
                .unwrap();

        let out = projected.to_vec().unwrap();
        assert_eq!(
            out[0].user_data().get("origin"),
            Some(&serde_json::json!("import-42"))
        );
    }
}
