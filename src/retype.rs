//! Schema adaptation: presenting features of one type as another, related
//! type, for both read-side iteration and write-side translation.

use std::sync::Arc;

use crate::collection::registry::ReaderRegistry;
use crate::collection::{FeatureCollection, FeatureReader};
use crate::error::{GeoStreamError, Result};
use crate::feature::{AttributeValue, Feature};
use crate::filter::Filter;
use crate::schema::FeatureType;

/// Rewrites features into a different but related schema.
///
/// Attributes are matched by name; target attributes absent from the source
/// become null. When the type names differ, feature ids with the conventional
/// `"<typeName>."` prefix are rewritten to the target type's prefix.
#[derive(Debug)]
pub struct FeatureRetyper {
    source_schema: Arc<FeatureType>,
    target_schema: Arc<FeatureType>,
    /// Target attribute index to source attribute index, `None` for
    /// attributes the source does not have.
    mapping: Vec<Option<usize>>,
}

impl FeatureRetyper {
    /// Build a retyper between two schemas.
    ///
    /// Fails with [`SchemaTransform`](GeoStreamError::SchemaTransform) when a
    /// shared attribute name has different bindings in the two schemas; such
    /// a pair could never produce a conforming feature.
    pub fn try_new(source_schema: Arc<FeatureType>, target_schema: Arc<FeatureType>) -> Result<Self> {
        let mapping = target_schema
            .attributes()
            .map(|descriptor| {
                match source_schema.attribute(descriptor.name()) {
                    Some(source) if source.binding() != descriptor.binding() => {
                        Err(GeoStreamError::SchemaTransform(format!(
                            "attribute '{}' is {:?} in '{}' but {:?} in '{}'",
                            descriptor.name(),
                            source.binding(),
                            source_schema.name(),
                            descriptor.binding(),
                            target_schema.name()
                        )))
                    }
                    Some(_) => Ok(source_schema.index_of(descriptor.name())),
                    None => Ok(None),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            source_schema,
            target_schema,
            mapping,
        })
    }

    /// The schema retyped features conform to.
    pub fn target_schema(&self) -> &Arc<FeatureType> {
        &self.target_schema
    }

    /// Rewrite a feature id between the two type names. Ids that do not
    /// carry the source type's `"<name>."` prefix are left unchanged, as is
    /// everything when the type names are equal.
    pub fn rewrite_id(&self, id: &str) -> String {
        let source_name = self.source_schema.name();
        let target_name = self.target_schema.name();
        if source_name == target_name {
            return id.to_string();
        }
        match id.strip_prefix(source_name).and_then(|rest| rest.strip_prefix('.')) {
            Some(local) => format!("{target_name}.{local}"),
            None => id.to_string(),
        }
    }

    /// Derive the target-shaped rendition of `feature`.
    pub fn retype(&self, feature: &Feature) -> Result<Feature> {
        let values = self
            .mapping
            .iter()
            .map(|source_index| match source_index {
                Some(i) => feature
                    .attribute_at(*i)
                    .cloned()
                    .unwrap_or(AttributeValue::Null),
                None => AttributeValue::Null,
            })
            .collect();
        let mut out = Feature::try_new(
            self.target_schema.clone(),
            self.rewrite_id(feature.id()),
            values,
        )
        .map_err(|err| GeoStreamError::Retype(err.to_string()))?;
        out.set_user_data(feature.user_data().clone());
        Ok(out)
    }

    /// Write-side translation: fold an edited, target-shaped feature back
    /// into a copy of the original source feature, attribute-by-attribute by
    /// name. Source attributes the target schema does not carry keep their
    /// original values; the source id is kept.
    pub fn update_source(&self, edited: &Feature, original: &Feature) -> Result<Feature> {
        let mut updated = original.clone();
        for descriptor in self.target_schema.attributes() {
            if self.source_schema.attribute(descriptor.name()).is_none() {
                continue;
            }
            let value = edited
                .attribute(descriptor.name())
                .cloned()
                .unwrap_or(AttributeValue::Null);
            updated
                .set_attribute(descriptor.name(), value)
                .map_err(|err| GeoStreamError::Retype(err.to_string()))?;
        }
        Ok(updated)
    }
}

/// Decorator exposing a delegate collection under a different schema.
pub struct RetypedFeatureCollection {
    delegate: Arc<dyn FeatureCollection>,
    retyper: Arc<FeatureRetyper>,
    registry: ReaderRegistry,
}

impl RetypedFeatureCollection {
    /// Wrap `delegate`, presenting its features as `target_schema`.
    pub fn try_new(
        delegate: Arc<dyn FeatureCollection>,
        target_schema: Arc<FeatureType>,
    ) -> Result<Self> {
        let retyper = FeatureRetyper::try_new(delegate.schema().clone(), target_schema)?;
        Ok(Self {
            delegate,
            retyper: Arc::new(retyper),
            registry: ReaderRegistry::new(),
        })
    }

    /// The per-feature transform this collection applies.
    pub fn retyper(&self) -> &FeatureRetyper {
        &self.retyper
    }
}

impl FeatureCollection for RetypedFeatureCollection {
    fn schema(&self) -> &Arc<FeatureType> {
        self.retyper.target_schema()
    }

    fn reader(&self) -> Result<Box<dyn FeatureReader>> {
        let reader = RetypingReader {
            delegate: Some(self.delegate.reader()?),
            retyper: self.retyper.clone(),
        };
        Ok(Box::new(self.registry.track(Box::new(reader))))
    }

    fn sub_collection(&self, filter: &Filter) -> Result<Arc<dyn FeatureCollection>> {
        // Attribute names are shared between the two schemas, so the filter
        // pushes down as-is.
        let sub = self.delegate.sub_collection(filter)?;
        Ok(Arc::new(Self::try_new(
            sub,
            self.retyper.target_schema().clone(),
        )?))
    }

    fn close(&self) {
        self.registry.close_all();
    }
}

/// Reader applying the retyper to each feature pulled from the delegate.
struct RetypingReader {
    delegate: Option<Box<dyn FeatureReader>>,
    retyper: Arc<FeatureRetyper>,
}

impl FeatureReader for RetypingReader {
    fn try_next(&mut self) -> Result<Option<Feature>> {
        let Some(delegate) = self.delegate.as_mut() else {
            return Ok(None);
        };
        match delegate.try_next()? {
            Some(feature) => Ok(Some(self.retyper.retype(&feature)?)),
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
