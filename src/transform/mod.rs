//! Coordinate transform construction and per-source caching.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use crate::crs::Crs;
use crate::error::Result;

#[cfg(feature = "proj")]
mod proj;
#[cfg(feature = "proj")]
pub use proj::ProjFactory;

/// A pure function mapping geometry coordinates from one reference system to
/// another.
pub trait CoordinateTransform: Send + Sync {
    /// Transform a shape, returning a new shape. Must not depend on any state
    /// besides the input coordinates.
    fn apply(&self, shape: &geo::Geometry<f64>) -> Result<geo::Geometry<f64>>;
}

impl Debug for dyn CoordinateTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn CoordinateTransform")
    }
}

/// Constructs [`CoordinateTransform`]s between reference-system pairs.
///
/// Construction fails with
/// [`TransformConstruction`](crate::GeoStreamError::TransformConstruction)
/// when no coordinate operation path exists between the two systems.
pub trait TransformFactory: Send + Sync {
    /// Build a transform reading `source` coordinates and producing `target`
    /// coordinates.
    fn create(&self, source: &Crs, target: &Crs) -> Result<Arc<dyn CoordinateTransform>>;
}

/// Caches one transform per distinct source CRS, for a fixed target CRS.
///
/// The cache grows monotonically and lives as long as the decorator that owns
/// it; collections are short-lived per-request objects, so there is no
/// eviction. The map is mutex-guarded so a decorator can be shared across
/// threads; two threads racing on the same first-seen source CRS may both
/// construct a transform, in which case the first one inserted wins and the
/// other is dropped. Transforms are pure, so the race is harmless.
pub struct TransformCache {
    factory: Arc<dyn TransformFactory>,
    target: Crs,
    transforms: Mutex<HashMap<Crs, Arc<dyn CoordinateTransform>>>,
}

impl TransformCache {
    /// A cache producing transforms into `target` via `factory`.
    pub fn new(factory: Arc<dyn TransformFactory>, target: Crs) -> Self {
        Self {
            factory,
            target,
            transforms: Mutex::new(HashMap::new()),
        }
    }

    /// The fixed target reference system.
    pub fn target(&self) -> &Crs {
        &self.target
    }

    /// The factory used for cache misses.
    pub fn factory(&self) -> &Arc<dyn TransformFactory> {
        &self.factory
    }

    /// Return the cached transform for `source`, constructing and caching it
    /// on first sight.
    pub fn get_or_create(&self, source: &Crs) -> Result<Arc<dyn CoordinateTransform>> {
        if let Some(transform) = self.lock().get(source) {
            return Ok(transform.clone());
        }
        let created = self.factory.create(source, &self.target)?;
        let transform = self
            .lock()
            .entry(source.clone())
            .or_insert(created)
            .clone();
        Ok(transform)
    }

    /// Number of distinct source systems seen so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no transform has been constructed yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Crs, Arc<dyn CoordinateTransform>>> {
        // Transforms are pure; a poisoned lock cannot leave the map invalid.
        self.transforms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Debug for TransformCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformCache")
            .field("target", &self.target)
            .field("cached", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::{CountingFactory, EpsgFactory};

    #[test]
    fn constructs_once_per_source_crs() {
        let factory = Arc::new(CountingFactory::new(EpsgFactory));
        let cache = TransformCache::new(factory.clone(), Crs::epsg(3857));

        for _ in 0..1000 {
            cache.get_or_create(&Crs::epsg(4326)).unwrap();
        }
        assert_eq!(factory.constructions(), 1);
        assert_eq!(cache.len(), 1);

        cache.get_or_create(&Crs::epsg(27700)).unwrap();
        assert_eq!(factory.constructions(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn construction_failure_propagates() {
        let factory = Arc::new(EpsgFactory);
        let cache = TransformCache::new(factory, Crs::epsg(3857));

        let err = cache.get_or_create(&Crs::new("ENGINEERING:LOCAL")).unwrap_err();
        assert!(matches!(
            err,
            crate::GeoStreamError::TransformConstruction { .. }
        ));
        assert!(cache.is_empty());
    }
}
