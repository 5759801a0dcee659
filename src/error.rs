//! Defines [`GeoStreamError`], representing all errors returned by this crate.

use thiserror::Error;

/// Enum with all errors in this crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GeoStreamError {
    /// No coordinate operation path exists between two reference systems.
    #[error("No coordinate operation from '{source_crs}' to '{target_crs}': {message}")]
    TransformConstruction {
        /// The reference system the transform was to read from.
        source_crs: String,
        /// The reference system the transform was to produce.
        target_crs: String,
        /// Backend-specific description of the failure.
        message: String,
    },

    /// Applying a constructed transform to a geometry failed.
    #[error("Coordinate transform failed: {0}")]
    TransformApplication(String),

    /// Transforming a single geometry failed mid-iteration.
    #[error("Failed to reproject geometry '{wkt}' from '{crs}': {source}")]
    Reprojection {
        /// WKT rendering of the geometry that failed to transform.
        wkt: String,
        /// The effective source reference system of that geometry.
        crs: String,
        /// The underlying transform failure.
        source: Box<GeoStreamError>,
    },

    /// Building a retyped feature violated the target schema's constraints.
    #[error("Retype error: {0}")]
    Retype(String),

    /// A decorator could not derive its target schema from the delegate's.
    #[error("Schema transform error: {0}")]
    SchemaTransform(String),

    /// Member collections of a composite do not share one schema.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A feature value does not conform to its declared attribute type.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A bulk collection operation failed mid-stream.
    #[error("Collection access failed: {0}")]
    Collection(#[source] Box<GeoStreamError>),

    /// A filter could not be rewritten or evaluated.
    #[error("Filter error: {0}")]
    Filter(String),
}

impl GeoStreamError {
    /// Wrap an error raised inside a bulk operation (`bounds`, `size`, `to_vec`).
    pub(crate) fn collection(err: GeoStreamError) -> Self {
        match err {
            already @ GeoStreamError::Collection(_) => already,
            other => GeoStreamError::Collection(Box::new(other)),
        }
    }
}

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, GeoStreamError>;
