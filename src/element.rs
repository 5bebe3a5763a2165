//! Canvas elements - the editable building blocks tracked by the history engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A canvas element with typed geometry and an open property map.
///
/// Identity is by `id`; equality for diffing is per-property. Extension
/// properties (fill, font, rotation, ...) live in the open `props` map so the
/// engine stays agnostic of element-type-specific semantics. The map is a
/// `BTreeMap` so serialization is independent of insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasElement {
    /// Unique identifier, stable across edits.
    pub id: String,
    /// Element type tag ("rect", "text", "image", ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// X position (pixels from left).
    pub x: f64,
    /// Y position (pixels from top).
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
    /// Open map of further properties, diffed key-by-key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, Value>,
}

impl CanvasElement {
    /// Create a new element with the given id and type tag.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            props: BTreeMap::new(),
        }
    }

    /// Set the position.
    #[must_use]
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the size.
    #[must_use]
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set an extension property.
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    /// Get an extension property by key.
    #[must_use]
    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }
}
