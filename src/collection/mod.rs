//! The feature collection contract: closeable streamed iteration, filtering,
//! bounds, sorting and materialization.

use std::sync::Arc;

use geo::Rect;

use crate::error::{GeoStreamError, Result};
use crate::feature::Feature;
use crate::filter::{Filter, SortBy};
use crate::schema::FeatureType;

mod composite;
mod memory;
pub(crate) mod registry;

pub use composite::CompositeFeatureCollection;
pub use memory::MemoryFeatureCollection;

/// A closeable stream of features.
///
/// Every opened reader must eventually be closed to release whatever the
/// producing collection holds (file handles, query cursors). `close` is
/// idempotent; after a close, `try_next` reports end of stream.
pub trait FeatureReader: Send {
    /// Pull the next feature, `None` at end of stream.
    fn try_next(&mut self) -> Result<Option<Feature>>;

    /// Release underlying resources. Safe to call more than once.
    fn close(&mut self) -> Result<()>;
}

/// A possibly-unbounded sequence of features sharing one schema.
///
/// Filtering, sorting, bounds and size are all defined by re-deriving from
/// the underlying sequence; no random access is assumed. Implementations are
/// immutable after construction apart from bookkeeping (transform caches,
/// open-reader tracking), so independent readers over one shared collection
/// are safe whenever the underlying producer supports them.
pub trait FeatureCollection: Send + Sync {
    /// The schema every yielded feature conforms to, fixed for the
    /// collection's lifetime.
    fn schema(&self) -> &Arc<FeatureType>;

    /// Open a fresh reader over the sequence.
    fn reader(&self) -> Result<Box<dyn FeatureReader>>;

    /// Derive the sub-collection of features matching `filter`.
    fn sub_collection(&self, filter: &Filter) -> Result<Arc<dyn FeatureCollection>>;

    /// Force-close readers this collection handed out that are still open.
    /// Per-reader close failures are logged and skipped.
    fn close(&self) {}

    /// Fold the bounds of every feature into a single envelope, an empty
    /// envelope for a collection yielding zero features. The reader is closed
    /// even when iteration fails mid-stream.
    fn bounds(&self) -> Result<Envelope> {
        let mut reader = self.reader().map_err(GeoStreamError::collection)?;
        let folded = fold_bounds(reader.as_mut());
        let closed = reader.close();
        let envelope = folded.map_err(GeoStreamError::collection)?;
        closed.map_err(GeoStreamError::collection)?;
        Ok(envelope)
    }

    /// Count features by iterating the sequence.
    fn size(&self) -> Result<usize> {
        let mut reader = self.reader().map_err(GeoStreamError::collection)?;
        let counted = count(reader.as_mut());
        let closed = reader.close();
        let size = counted.map_err(GeoStreamError::collection)?;
        closed.map_err(GeoStreamError::collection)?;
        Ok(size)
    }

    /// Materialize the whole sequence.
    fn to_vec(&self) -> Result<Vec<Feature>> {
        let mut reader = self.reader().map_err(GeoStreamError::collection)?;
        let collected = collect(reader.as_mut());
        let closed = reader.close();
        let features = collected.map_err(GeoStreamError::collection)?;
        closed.map_err(GeoStreamError::collection)?;
        Ok(features)
    }

    /// Sort by materializing into a memory collection.
    fn sort(&self, order: &SortBy) -> Result<MemoryFeatureCollection> {
        let memory = MemoryFeatureCollection::try_new(self.schema().clone(), self.to_vec()?)?;
        Ok(memory.sorted(order))
    }
}

fn fold_bounds(reader: &mut dyn FeatureReader) -> Result<Envelope> {
    let mut envelope = Envelope::empty();
    while let Some(feature) = reader.try_next()? {
        if let Some(rect) = feature.default_geometry().and_then(|g| g.bounding_rect()) {
            envelope.expand_to_include(&rect);
        }
    }
    Ok(envelope)
}

fn count(reader: &mut dyn FeatureReader) -> Result<usize> {
    let mut n = 0;
    while reader.try_next()?.is_some() {
        n += 1;
    }
    Ok(n)
}

fn collect(reader: &mut dyn FeatureReader) -> Result<Vec<Feature>> {
    let mut features = Vec::new();
    while let Some(feature) = reader.try_next()? {
        features.push(feature);
    }
    Ok(features)
}

/// A possibly-null bounding envelope.
///
/// The null envelope is the identity of
/// [`expand_to_include`](Envelope::expand_to_include) and is what `bounds`
/// returns for an empty collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope(Option<Rect<f64>>);

impl Envelope {
    /// The null envelope, containing nothing.
    pub fn empty() -> Self {
        Self(None)
    }

    /// An envelope covering exactly `rect`.
    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self(Some(rect))
    }

    /// Whether this is the null envelope.
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// The covered rectangle, `None` for the null envelope.
    pub fn rect(&self) -> Option<&Rect<f64>> {
        self.0.as_ref()
    }

    /// Grow to cover `rect` as well.
    pub fn expand_to_include(&mut self, rect: &Rect<f64>) {
        self.0 = Some(match self.0 {
            None => *rect,
            Some(current) => Rect::new(
                geo::Coord {
                    x: current.min().x.min(rect.min().x),
                    y: current.min().y.min(rect.min().y),
                },
                geo::Coord {
                    x: current.max().x.max(rect.max().x),
                    y: current.max().y.max(rect.max().y),
                },
            ),
        });
    }
}
