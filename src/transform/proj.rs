//! PROJ-backed transform construction.

use std::sync::{Arc, Mutex};

use proj::{Proj, Transform};

use super::{CoordinateTransform, TransformFactory};
use crate::crs::Crs;
use crate::error::{GeoStreamError, Result};

/// Builds transforms with [PROJ](https://proj.org) from `authority:code`
/// identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjFactory;

impl TransformFactory for ProjFactory {
    fn create(&self, source: &Crs, target: &Crs) -> Result<Arc<dyn CoordinateTransform>> {
        let proj = Proj::new_known_crs(source.code(), target.code(), None).map_err(|err| {
            GeoStreamError::TransformConstruction {
                source_crs: source.code().to_string(),
                target_crs: target.code().to_string(),
                message: err.to_string(),
            }
        })?;
        Ok(Arc::new(ProjTransform {
            proj: Mutex::new(proj),
        }))
    }
}

/// A single PROJ coordinate operation.
///
/// PROJ contexts are not thread safe, so the handle is mutex-guarded.
struct ProjTransform {
    proj: Mutex<Proj>,
}

impl CoordinateTransform for ProjTransform {
    fn apply(&self, shape: &geo::Geometry<f64>) -> Result<geo::Geometry<f64>> {
        let proj = self
            .proj
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut out = shape.clone();
        out.transform(&proj)
            .map_err(|err| GeoStreamError::TransformApplication(err.to_string()))?;
        Ok(out)
    }
}
