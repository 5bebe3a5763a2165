//! History entries, action classification, and branch metadata.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CanvasState, StateDelta};

/// The kind of edit that produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// An element was created.
    Create,
    /// An element's properties were updated.
    Update,
    /// An element was deleted.
    Delete,
    /// An element was moved.
    Move,
    /// An element was resized.
    Resize,
    /// Styling changed.
    Style,
    /// Elements were grouped.
    Group,
    /// A group was dissolved.
    Ungroup,
    /// An element was duplicated.
    Duplicate,
    /// Content was pasted.
    Paste,
    /// Content was imported.
    Import,
    /// A bulk edit touching many elements (including branch merges).
    Bulk,
    /// A manual named milestone.
    Checkpoint,
    /// A background autosave.
    Autosave,
}

/// One append-only unit of history.
///
/// Conceptually immutable once created; the only amendments are the
/// asynchronous `thumbnail_url` attachment and in-place autosave refreshes
/// (both via the store's idempotent upsert).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Globally unique entry identifier.
    pub id: Uuid,
    /// The project this entry belongs to.
    pub project_id: String,
    /// Strictly ascending per (project, branch), starting at 1.
    pub version_number: u64,
    /// Human-readable label ("Move rectangle", "Checkpoint: v2 review").
    pub action_label: String,
    /// Classification of the edit.
    pub action_type: ActionType,
    /// Independent snapshot of the full canvas state. Authoritative.
    pub canvas_state: CanvasState,
    /// Preview image URL, attached asynchronously after rendering.
    pub thumbnail_url: Option<String>,
    /// IDs of the elements touched by this edit.
    pub changed_elements: Vec<String>,
    /// Delta relative to the immediately preceding entry on the same branch.
    pub delta: Option<StateDelta>,
    /// The version this entry was pushed on top of. For a branch's first
    /// entry this references the *source* branch's fork-point version and is
    /// exempt from this branch's own contiguous numbering.
    pub parent_version: Option<u64>,
    /// The branch this entry belongs to.
    pub branch_name: String,
    /// Whether this entry is a manual named milestone.
    pub is_checkpoint: bool,
    /// Whether this entry is a background autosave (recovery side channel).
    pub is_autosave: bool,
    /// Creation time, Unix milliseconds.
    pub created_at: u64,
}

impl HistoryEntry {
    /// Create a new entry with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        branch_name: impl Into<String>,
        version_number: u64,
        action_label: impl Into<String>,
        action_type: ActionType,
        canvas_state: CanvasState,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            version_number,
            action_label: action_label.into(),
            action_type,
            canvas_state,
            thumbnail_url: None,
            changed_elements: Vec::new(),
            delta: None,
            parent_version: None,
            branch_name: branch_name.into(),
            is_checkpoint: action_type == ActionType::Checkpoint,
            is_autosave: action_type == ActionType::Autosave,
            created_at: now_ms(),
        }
    }

    /// Set the touched element IDs.
    #[must_use]
    pub fn with_changed_elements(mut self, ids: Vec<String>) -> Self {
        self.changed_elements = ids;
        self
    }

    /// Attach the delta against the preceding entry.
    #[must_use]
    pub fn with_delta(mut self, delta: StateDelta) -> Self {
        self.delta = Some(delta);
        self
    }

    /// Record the version this entry was pushed on top of.
    #[must_use]
    pub fn with_parent_version(mut self, version: u64) -> Self {
        self.parent_version = Some(version);
        self
    }
}

/// A named line of history within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name, unique per project. "main" always exists once a project
    /// has history.
    pub name: String,
    /// Highest version number observed on the branch.
    pub head_version: u64,
    /// When the branch was created, Unix milliseconds.
    pub created_at: u64,
    /// When the branch head last changed, Unix milliseconds.
    pub last_modified: u64,
}

/// Get the current Unix timestamp in milliseconds.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Timestamps won't exceed u64 for billions of years
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
