//! Coordinate reference system identifiers.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// An opaque identifier for a coordinate reference system.
///
/// The identifier is conventionally an `authority:code` string such as
/// `"EPSG:4326"`. A CRS may additionally carry a human-readable name; the name
/// is descriptive metadata only and is ignored by equality and hashing, so two
/// CRS values compare equal whenever they identify the same reference system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crs {
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl Crs {
    /// Construct from an `authority:code` string.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: None,
        }
    }

    /// Construct from an EPSG code.
    pub fn epsg(code: u32) -> Self {
        Self::new(format!("EPSG:{code}"))
    }

    /// Attach a human-readable name. Names are ignored by equality.
    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// The `authority:code` identifier.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The descriptive name, if one was attached.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Crs {}

impl Hash for Crs {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

impl From<&str> for Crs {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
