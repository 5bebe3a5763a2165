//! Canvas state - the complete editable document at one point in time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::CanvasElement;

/// Viewport pan and zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Pan offset X.
    pub x: f64,
    /// Pan offset Y.
    pub y: f64,
    /// Zoom level (1.0 = 100%).
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

/// Axis of an alignment guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuideAxis {
    /// A horizontal guide line.
    Horizontal,
    /// A vertical guide line.
    Vertical,
}

/// An alignment guide on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    /// Which axis the guide runs along.
    pub axis: GuideAxis,
    /// Position in canvas coordinates.
    pub position: f64,
}

/// The complete canvas state captured by a history entry.
///
/// Immutable once stored: the timeline only ever holds snapshots taken via
/// [`crate::codec::snapshot`], never live references into the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasState {
    /// All elements, in document (z) order.
    pub elements: Vec<CanvasElement>,
    /// Viewport pan/zoom.
    pub viewport: Viewport,
    /// IDs of currently selected elements.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub selection: BTreeSet<String>,
    /// Alignment guides.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guides: Vec<Guide>,
}

impl CanvasState {
    /// Create an empty state with the default viewport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state from a list of elements.
    #[must_use]
    pub fn with_elements(elements: Vec<CanvasElement>) -> Self {
        Self {
            elements,
            ..Self::default()
        }
    }

    /// Get an element by id.
    #[must_use]
    pub fn element(&self, id: &str) -> Option<&CanvasElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Get the number of elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Check if the state has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
