//! Finite, in-memory feature collections.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{GeoStreamError, Result};
use crate::feature::Feature;
use crate::filter::{Filter, SortBy};
use crate::schema::FeatureType;

use super::registry::ReaderRegistry;
use super::{FeatureCollection, FeatureReader};

/// A finite, in-memory ordered sequence of features.
///
/// Every held feature's type must be exactly the declared schema; this is
/// validated on construction and on every mutation.
pub struct MemoryFeatureCollection {
    schema: Arc<FeatureType>,
    features: Vec<Feature>,
    registry: ReaderRegistry,
}

impl MemoryFeatureCollection {
    /// An empty collection of the given type.
    pub fn new(schema: Arc<FeatureType>) -> Self {
        Self {
            schema,
            features: Vec::new(),
            registry: ReaderRegistry::new(),
        }
    }

    /// A collection pre-populated with `features`, each validated against
    /// `schema`.
    pub fn try_new(schema: Arc<FeatureType>, features: Vec<Feature>) -> Result<Self> {
        let mut collection = Self::new(schema);
        collection.add_all(features)?;
        Ok(collection)
    }

    /// Append one feature.
    pub fn add(&mut self, feature: Feature) -> Result<()> {
        if **feature.schema() != *self.schema {
            return Err(GeoStreamError::TypeMismatch(format!(
                "feature '{}' has type '{}', collection holds '{}'",
                feature.id(),
                feature.schema().name(),
                self.schema.name()
            )));
        }
        self.features.push(feature);
        Ok(())
    }

    /// Append every feature of a plain sequence.
    pub fn add_all(&mut self, features: impl IntoIterator<Item = Feature>) -> Result<()> {
        for feature in features {
            self.add(feature)?;
        }
        Ok(())
    }

    /// Append every feature of another collection, materializing it.
    pub fn add_all_from(&mut self, other: &dyn FeatureCollection) -> Result<()> {
        self.add_all(other.to_vec()?)
    }

    /// Remove the feature with the given id. Returns whether one was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.features.len();
        self.features.retain(|f| f.id() != id);
        self.features.len() != before
    }

    /// Remove every feature whose id appears in `other` (set difference).
    pub fn remove_all(&mut self, other: &dyn FeatureCollection) -> Result<()> {
        let ids = id_set(other)?;
        self.features.retain(|f| !ids.contains(f.id()));
        Ok(())
    }

    /// Keep only features whose id appears in `other` (set intersection).
    pub fn retain_all(&mut self, other: &dyn FeatureCollection) -> Result<()> {
        let ids = id_set(other)?;
        self.features.retain(|f| ids.contains(f.id()));
        Ok(())
    }

    /// Number of held features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether no features are held.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// The held features in order.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// A new collection holding the same features in stable sort order.
    /// Does not mutate `self`.
    pub fn sorted(&self, order: &SortBy) -> MemoryFeatureCollection {
        let mut features = self.features.clone();
        features.sort_by(|a, b| order.compare(a, b));
        Self {
            schema: self.schema.clone(),
            features,
            registry: ReaderRegistry::new(),
        }
    }
}

fn id_set(collection: &dyn FeatureCollection) -> Result<HashSet<String>> {
    Ok(collection
        .to_vec()?
        .into_iter()
        .map(|f| f.id().to_string())
        .collect())
}

impl std::fmt::Debug for MemoryFeatureCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFeatureCollection")
            .field("schema", &self.schema.name())
            .field("features", &self.features.len())
            .finish()
    }
}

impl FeatureCollection for MemoryFeatureCollection {
    fn schema(&self) -> &Arc<FeatureType> {
        &self.schema
    }

    fn reader(&self) -> Result<Box<dyn FeatureReader>> {
        let reader = MemoryReader {
            features: self.features.clone().into_iter(),
        };
        Ok(Box::new(self.registry.track(Box::new(reader))))
    }

    fn sub_collection(&self, filter: &Filter) -> Result<Arc<dyn FeatureCollection>> {
        let matches = self
            .features
            .iter()
            .filter(|f| filter.evaluate(f))
            .cloned()
            .collect();
        Ok(Arc::new(Self::try_new(self.schema.clone(), matches)?))
    }

    fn close(&self) {
        self.registry.close_all();
    }

    fn size(&self) -> Result<usize> {
        Ok(self.features.len())
    }

    fn to_vec(&self) -> Result<Vec<Feature>> {
        Ok(self.features.clone())
    }

    fn sort(&self, order: &SortBy) -> Result<MemoryFeatureCollection> {
        Ok(self.sorted(order))
    }
}

/// Reader over a snapshot of the collection's features.
struct MemoryReader {
    features: std::vec::IntoIter<Feature>,
}

impl FeatureReader for MemoryReader {
    fn try_next(&mut self) -> Result<Option<Feature>> {
        Ok(self.features.next())
    }

    fn close(&mut self) -> Result<()> {
        // Exhaust the snapshot so a revived handle sees end of stream.
        self.features.by_ref().for_each(drop);
        Ok(())
    }
}
