//! The feature value: an id, an optional geometry blob, string attributes and an
//! opaque tag.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque caller attachment carried by a feature. Never inspected by the engine.
pub type FeatureTag = Arc<dyn Any + Send + Sync>;

/// A geometry + attribute map + id triple.
///
/// A feature whose geometry is absent or empty is invalid and never appears in
/// a result set. Equality compares id, geometry bytes and the full column map;
/// the tag is ignored.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    id: String,
    #[serde(default, with = "geometry_blob")]
    geometry: Option<Vec<u8>>,
    #[serde(default)]
    columns: BTreeMap<String, String>,
    #[serde(skip)]
    tag: Option<FeatureTag>,
}

impl Feature {
    /// Create a feature from an id and a geometry blob.
    pub fn new(id: impl Into<String>, geometry: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            geometry: Some(geometry.into()),
            columns: BTreeMap::new(),
            tag: None,
        }
    }

    /// Create a feature without geometry. Such a feature is invalid until a
    /// geometry is attached.
    pub fn without_geometry(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.columns.insert(name.into(), value.into());
        self
    }

    pub fn with_columns<I, K, V>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in columns {
            self.columns.insert(k.into(), v.into());
        }
        self
    }

    pub fn with_tag(mut self, tag: FeatureTag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Same feature under a different id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Same feature with a replaced geometry.
    pub fn with_geometry(mut self, geometry: impl Into<Vec<u8>>) -> Self {
        self.geometry = Some(geometry.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Geometry blob, `None` when absent or empty.
    pub fn geometry(&self) -> Option<&[u8]> {
        match &self.geometry {
            Some(g) if !g.is_empty() => Some(g.as_slice()),
            _ => None,
        }
    }

    /// A feature is valid when it carries a non-empty geometry.
    pub fn is_valid(&self) -> bool {
        self.geometry().is_some()
    }

    pub fn columns(&self) -> &BTreeMap<String, String> {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&str> {
        self.columns.get(name).map(String::as_str)
    }

    pub fn tag(&self) -> Option<&FeatureTag> {
        self.tag.as_ref()
    }

    /// Insert a value unless the feature already carries one for `name`.
    /// Returns whether the value was inserted.
    pub(crate) fn set_column_if_absent(&mut self, name: &str, value: String) -> bool {
        if self.columns.contains_key(name) {
            return false;
        }
        self.columns.insert(name.to_string(), value);
        true
    }

    /// Keep only the named columns.
    pub(crate) fn retain_columns(&mut self, keep: &[String]) {
        self.columns.retain(|k, _| keep.iter().any(|n| n == k));
    }

    /// Copy of this feature restricted to the named columns.
    pub fn projected(&self, keep: &[String]) -> Self {
        let mut f = self.clone();
        f.retain_columns(keep);
        f
    }
}

impl PartialEq for Feature {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.geometry == other.geometry && self.columns == other.columns
    }
}

impl Eq for Feature {}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let geometry = self
            .geometry
            .as_deref()
            .map(|g| match std::str::from_utf8(g) {
                Ok(text) => text.to_string(),
                Err(_) => format!("<{} bytes>", g.len()),
            });
        f.debug_struct("Feature")
            .field("id", &self.id)
            .field("geometry", &geometry)
            .field("columns", &self.columns)
            .field("tagged", &self.tag.is_some())
            .finish()
    }
}

/// Serde representation of geometry blobs.
///
/// UTF-8 blobs (WKT) are written as plain strings so stored documents stay
/// readable. Any other bytes are written as `base64:<payload>`.
mod geometry_blob {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    const BINARY_PREFIX: &str = "base64:";

    pub fn serialize<S: Serializer>(blob: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match blob {
            None => s.serialize_none(),
            Some(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) if !text.starts_with(BINARY_PREFIX) => s.serialize_some(text),
                _ => s.serialize_some(&format!("{}{}", BINARY_PREFIX, STANDARD.encode(bytes))),
            },
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let text: Option<String> = Option::deserialize(d)?;
        match text {
            None => Ok(None),
            Some(t) => match t.strip_prefix(BINARY_PREFIX) {
                Some(encoded) => STANDARD.decode(encoded).map(Some).map_err(D::Error::custom),
                None => Ok(Some(t.into_bytes())),
            },
        }
    }
}
