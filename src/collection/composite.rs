//! Concatenation of multiple collections sharing one schema.

use std::sync::Arc;

use crate::error::{GeoStreamError, Result};
use crate::feature::Feature;
use crate::filter::Filter;
use crate::schema::FeatureType;

use super::registry::ReaderRegistry;
use super::{FeatureCollection, FeatureReader};

/// Presents several collections with pairwise-equal schemas as one sequence,
/// iterated in member order.
///
/// Each member's reader is opened lazily and closed as soon as it is
/// exhausted, so at most one inner reader is open at a time.
pub struct CompositeFeatureCollection {
    schema: Arc<FeatureType>,
    members: Vec<Arc<dyn FeatureCollection>>,
    registry: ReaderRegistry,
}

impl CompositeFeatureCollection {
    /// Build from at least one member collection. Fails before any iteration
    /// if the member schemas are not pairwise equal.
    pub fn try_new(members: Vec<Arc<dyn FeatureCollection>>) -> Result<Self> {
        let Some(first) = members.first() else {
            return Err(GeoStreamError::SchemaMismatch(
                "a composite collection requires at least one member".to_string(),
            ));
        };
        let schema = first.schema().clone();
        for member in &members[1..] {
            if **member.schema() != *schema {
                return Err(GeoStreamError::SchemaMismatch(format!(
                    "member schema '{}' differs from '{}'",
                    member.schema().name(),
                    schema.name()
                )));
            }
        }
        Ok(Self {
            schema,
            members,
            registry: ReaderRegistry::new(),
        })
    }

    /// The member collections in iteration order.
    pub fn members(&self) -> &[Arc<dyn FeatureCollection>] {
        &self.members
    }
}

impl std::fmt::Debug for CompositeFeatureCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeFeatureCollection")
            .field("schema", &self.schema.name())
            .field("members", &self.members.len())
            .finish()
    }
}

impl FeatureCollection for CompositeFeatureCollection {
    fn schema(&self) -> &Arc<FeatureType> {
        &self.schema
    }

    fn reader(&self) -> Result<Box<dyn FeatureReader>> {
        let reader = CompositeReader {
            members: self.members.clone(),
            next_member: 0,
            current: None,
        };
        Ok(Box::new(self.registry.track(Box::new(reader))))
    }

    fn sub_collection(&self, filter: &Filter) -> Result<Arc<dyn FeatureCollection>> {
        let members = self
            .members
            .iter()
            .map(|member| member.sub_collection(filter))
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(Self::try_new(members)?))
    }

    fn close(&self) {
        self.registry.close_all();
    }
}

struct CompositeReader {
    members: Vec<Arc<dyn FeatureCollection>>,
    next_member: usize,
    current: Option<Box<dyn FeatureReader>>,
}

impl FeatureReader for CompositeReader {
    fn try_next(&mut self) -> Result<Option<Feature>> {
        loop {
            if let Some(reader) = self.current.as_mut() {
                if let Some(feature) = reader.try_next()? {
                    return Ok(Some(feature));
                }
                // Exhausted; release before moving on to the next member.
                if let Some(mut done) = self.current.take() {
                    done.close()?;
                }
            }
            match self.members.get(self.next_member) {
                Some(member) => {
                    self.current = Some(member.reader()?);
                    self.next_member += 1;
                }
                None => return Ok(None),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.next_member = self.members.len();
        match self.current.take() {
            Some(mut reader) => reader.close(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use geo::point;

    use super::*;
    use crate::collection::MemoryFeatureCollection;
    use crate::filter::SortBy;
    use crate::schema::{AttributeType, FeatureType};
    use crate::test::{lake, lakes_schema};

    fn member(features: Vec<Feature>) -> Arc<dyn FeatureCollection> {
        Arc::new(MemoryFeatureCollection::try_new(lakes_schema(), features).unwrap())
    }

    #[test]
    fn concatenates_in_member_order() {
        let composite = CompositeFeatureCollection::try_new(vec![
            member(vec![lake(1, "Mead", 532, point!(x: -114.4, y: 36.2))]),
            member(vec![
                lake(2, "Baikal", 1642, point!(x: 107.7, y: 53.5)),
                lake(3, "Victoria", 84, point!(x: 33.0, y: -1.0)),
            ]),
        ])
        .unwrap();

        let ids: Vec<_> = composite
            .to_vec()
            .unwrap()
            .into_iter()
            .map(|f| f.id().to_string())
            .collect();
        assert_eq!(ids, vec!["lakes.1", "lakes.2", "lakes.3"]);
        assert_eq!(composite.size().unwrap(), 3);
    }

    #[test]
    fn rejects_mismatched_schemas_before_iteration() {
        let rivers = Arc::new(
            FeatureType::builder("rivers")
                .attribute("name", AttributeType::String)
                .geometry("geom", None)
                .build()
                .unwrap(),
        );
        let other: Arc<dyn FeatureCollection> =
            Arc::new(MemoryFeatureCollection::new(rivers));

        let err = CompositeFeatureCollection::try_new(vec![
            member(vec![lake(1, "Mead", 532, point!(x: -114.4, y: 36.2))]),
            other,
        ])
        .unwrap_err();
        assert!(matches!(err, GeoStreamError::SchemaMismatch(_)));
    }

    #[test]
    fn rejects_zero_members() {
        let err = CompositeFeatureCollection::try_new(vec![]).unwrap_err();
        assert!(matches!(err, GeoStreamError::SchemaMismatch(_)));
    }

    #[test]
    fn sort_materializes_the_concatenation() {
        let composite = CompositeFeatureCollection::try_new(vec![
            member(vec![lake(2, "Baikal", 1642, point!(x: 107.7, y: 53.5))]),
            member(vec![lake(3, "Victoria", 84, point!(x: 33.0, y: -1.0))]),
            member(vec![lake(1, "Mead", 532, point!(x: -114.4, y: 36.2))]),
        ])
        .unwrap();

        let sorted = composite.sort(&SortBy::ascending("name")).unwrap();
        let names: Vec<_> = sorted.features().iter().map(|f| f.id()).collect();
        assert_eq!(names, vec!["lakes.2", "lakes.1", "lakes.3"]);
    }

    #[test]
    fn sub_collection_pushes_down_to_every_member() {
        let composite = CompositeFeatureCollection::try_new(vec![
            member(vec![lake(1, "Mead", 532, point!(x: -114.4, y: 36.2))]),
            member(vec![lake(2, "Baikal", 1642, point!(x: 107.7, y: 53.5))]),
        ])
        .unwrap();

        let sub = composite
            .sub_collection(&Filter::FeatureId(vec!["lakes.2".into()]))
            .unwrap();
        assert_eq!(sub.size().unwrap(), 1);
    }
}
