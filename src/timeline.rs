//! In-memory undo/redo timeline for the active branch.

use std::sync::{Arc, RwLock};

use crate::{
    compute_delta, ActionType, CanvasState, HistoryEntry, HistoryError, HistoryResult,
};

/// Maximum number of entries held in memory per branch. Older entries are
/// trimmed from the front and remain retrievable only via the persisted store.
pub const DEFAULT_CAPACITY: usize = 100;

/// Shared handle to a timeline, used by the engine and background tasks.
pub type SharedTimeline = Arc<RwLock<HistoryTimeline>>;

/// The ordered in-memory history of the active branch plus the cursor.
///
/// The cursor marks the currently displayed entry; `None` means the timeline
/// is empty. Undo and redo move the cursor without discarding entries; a push
/// after an undo truncates the redo tail irrecoverably (standard editor
/// semantics).
#[derive(Debug)]
pub struct HistoryTimeline {
    project_id: String,
    branch_name: String,
    entries: Vec<HistoryEntry>,
    cursor: Option<usize>,
    capacity: usize,
}

impl HistoryTimeline {
    /// Create an empty timeline for a project's branch.
    #[must_use]
    pub fn new(project_id: impl Into<String>, branch_name: impl Into<String>) -> Self {
        Self::with_capacity(project_id, branch_name, DEFAULT_CAPACITY)
    }

    /// Create an empty timeline with a custom in-memory capacity.
    #[must_use]
    pub fn with_capacity(
        project_id: impl Into<String>,
        branch_name: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            branch_name: branch_name.into(),
            entries: Vec::new(),
            cursor: None,
            capacity: capacity.max(1),
        }
    }

    /// Append a new entry at the cursor, discarding any redo tail.
    ///
    /// The new entry's version number continues from the entry under the
    /// cursor (1 for an empty timeline) and carries the delta against it.
    /// If the timeline exceeds its capacity the oldest entries are trimmed;
    /// version numbering stays contiguous because trimming only drops the
    /// front.
    pub fn push_state(
        &mut self,
        state: CanvasState,
        label: &str,
        action_type: ActionType,
        changed_ids: Vec<String>,
    ) -> HistoryEntry {
        // Everything after the cursor is redo history; a new edit makes it
        // unreachable.
        match self.cursor {
            Some(c) => self.entries.truncate(c + 1),
            None => self.entries.clear(),
        }

        let (version, delta, parent) = match self.entries.last() {
            Some(prev) => (
                prev.version_number + 1,
                Some(compute_delta(&prev.canvas_state, &state)),
                Some(prev.version_number),
            ),
            None => (1, None, None),
        };

        let mut entry = HistoryEntry::new(
            &self.project_id,
            &self.branch_name,
            version,
            label,
            action_type,
            state,
        )
        .with_changed_elements(changed_ids);
        if let Some(delta) = delta {
            entry = entry.with_delta(delta);
        }
        if let Some(parent) = parent {
            entry = entry.with_parent_version(parent);
        }

        self.entries.push(entry.clone());
        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.capacity;
            self.entries.drain(..excess);
        }
        self.cursor = Some(self.entries.len() - 1);

        tracing::debug!(
            branch = %self.branch_name,
            version = entry.version_number,
            "pushed history entry"
        );
        entry
    }

    /// Move the cursor one entry back and return the now-current entry.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NothingToUndo`] if the cursor is at the oldest
    /// in-memory entry or the timeline is empty.
    pub fn undo(&mut self) -> HistoryResult<HistoryEntry> {
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                Ok(self.entries[c - 1].clone())
            }
            _ => Err(HistoryError::NothingToUndo),
        }
    }

    /// Move the cursor one entry forward and return the now-current entry.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NothingToRedo`] if the cursor is already at
    /// the newest entry.
    pub fn redo(&mut self) -> HistoryResult<HistoryEntry> {
        match self.cursor {
            Some(c) if c + 1 < self.entries.len() => {
                self.cursor = Some(c + 1);
                Ok(self.entries[c + 1].clone())
            }
            _ => Err(HistoryError::NothingToRedo),
        }
    }

    /// Jump the cursor directly to the entry with the given version number.
    ///
    /// A seek, not an undo/redo sequence: nothing is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::VersionNotFound`] if no in-memory entry has
    /// that version number.
    pub fn go_to_version(&mut self, version: u64) -> HistoryResult<HistoryEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.version_number == version)
            .ok_or(HistoryError::VersionNotFound(version))?;
        self.cursor = Some(index);
        Ok(self.entries[index].clone())
    }

    /// Push a manual named milestone.
    pub fn create_checkpoint(&mut self, label: &str, state: CanvasState) -> HistoryEntry {
        self.push_state(state, label, ActionType::Checkpoint, Vec::new())
    }

    /// Atomically replace the timeline's contents for a branch switch.
    ///
    /// The cursor points at the last loaded entry (or `None` when empty).
    pub fn replace(&mut self, branch_name: impl Into<String>, entries: Vec<HistoryEntry>) {
        self.cursor = entries.len().checked_sub(1);
        self.entries = entries;
        self.branch_name = branch_name.into();
    }

    /// Attach a thumbnail URL to the entry with the given id, if still in
    /// memory. Returns the updated entry.
    pub fn attach_thumbnail(&mut self, entry_id: uuid::Uuid, url: &str) -> Option<HistoryEntry> {
        let entry = self.entries.iter_mut().find(|e| e.id == entry_id)?;
        entry.thumbnail_url = Some(url.to_string());
        Some(entry.clone())
    }

    /// The entry under the cursor.
    #[must_use]
    pub fn current_entry(&self) -> Option<&HistoryEntry> {
        self.cursor.map(|c| &self.entries[c])
    }

    /// All in-memory entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// The cursor index (`None` = empty timeline).
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    /// Whether an undo is possible.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    /// Whether a redo is possible.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.entries.len())
    }

    /// The checkpoint entries, a filtered view of the timeline.
    #[must_use]
    pub fn checkpoints(&self) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_checkpoint)
            .cloned()
            .collect()
    }

    /// The project this timeline belongs to.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// The active branch name.
    #[must_use]
    pub fn branch_name(&self) -> &str {
        &self.branch_name
    }

    /// Number of in-memory entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the timeline holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CanvasElement;

    fn state(ids: &[&str]) -> CanvasState {
        CanvasState::with_elements(ids.iter().map(|id| CanvasElement::new(*id, "rect")).collect())
    }

    fn push(timeline: &mut HistoryTimeline, label: &str, ids: &[&str]) -> HistoryEntry {
        timeline.push_state(state(ids), label, ActionType::Update, Vec::new())
    }

    #[test]
    fn test_empty_timeline() {
        let timeline = HistoryTimeline::new("p", "main");
        assert!(timeline.is_empty());
        assert!(timeline.current_index().is_none());
        assert!(!timeline.can_undo());
        assert!(!timeline.can_redo());
    }

    #[test]
    fn test_versions_ascend_from_one() {
        let mut timeline = HistoryTimeline::new("p", "main");
        assert_eq!(push(&mut timeline, "A", &["a"]).version_number, 1);
        assert_eq!(push(&mut timeline, "B", &["a", "b"]).version_number, 2);
        assert_eq!(push(&mut timeline, "C", &["a", "b", "c"]).version_number, 3);
        assert_eq!(timeline.current_index(), Some(2));
    }

    #[test]
    fn test_undo_redo_scenario() {
        let mut timeline = HistoryTimeline::new("p", "main");
        push(&mut timeline, "A", &["a"]);
        push(&mut timeline, "B", &["a", "b"]);
        push(&mut timeline, "C", &["a", "b", "c"]);

        let b = timeline.undo().expect("undo to B");
        assert_eq!(b.action_label, "B");
        let a = timeline.undo().expect("undo to A");
        assert_eq!(a.action_label, "A");
        assert!(matches!(timeline.undo(), Err(HistoryError::NothingToUndo)));

        let b = timeline.redo().expect("redo to B");
        assert_eq!(b.action_label, "B");
    }

    #[test]
    fn test_undo_redo_restores_identical_states() {
        let mut timeline = HistoryTimeline::new("p", "main");
        let states: Vec<CanvasState> = (0..4)
            .map(|i| state(&["a", "b", "c", "d"][..=i]))
            .collect();
        for (i, s) in states.iter().enumerate() {
            timeline.push_state(s.clone(), &format!("v{i}"), ActionType::Update, Vec::new());
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(timeline.undo().expect("undo").canvas_state);
        }
        assert_eq!(seen, vec![states[2].clone(), states[1].clone(), states[0].clone()]);

        let mut replayed = Vec::new();
        for _ in 0..3 {
            replayed.push(timeline.redo().expect("redo").canvas_state);
        }
        assert_eq!(
            replayed,
            vec![states[1].clone(), states[2].clone(), states[3].clone()]
        );
    }

    #[test]
    fn test_push_after_undo_discards_redo_tail() {
        let mut timeline = HistoryTimeline::new("p", "main");
        push(&mut timeline, "A", &["a"]);
        push(&mut timeline, "B", &["a", "b"]);
        push(&mut timeline, "C", &["a", "b", "c"]);

        timeline.undo().expect("undo to B");
        let d = push(&mut timeline, "D", &["a", "b", "d"]);

        let labels: Vec<_> = timeline.entries().iter().map(|e| e.action_label.clone()).collect();
        assert_eq!(labels, vec!["A", "B", "D"]);
        assert_eq!(d.version_number, 3);
        assert!(!timeline.can_redo());
        assert!(matches!(timeline.redo(), Err(HistoryError::NothingToRedo)));
    }

    #[test]
    fn test_capacity_trim_keeps_contiguous_versions() {
        let mut timeline = HistoryTimeline::with_capacity("p", "main", 3);
        for i in 1..=5 {
            push(&mut timeline, &format!("v{i}"), &["a"]);
        }

        assert_eq!(timeline.len(), 3);
        let versions: Vec<_> = timeline.entries().iter().map(|e| e.version_number).collect();
        assert_eq!(versions, vec![3, 4, 5]);
        assert_eq!(timeline.current_index(), Some(2));
        assert_eq!(timeline.current_entry().map(|e| e.version_number), Some(5));
    }

    #[test]
    fn test_go_to_version() {
        let mut timeline = HistoryTimeline::new("p", "main");
        push(&mut timeline, "A", &["a"]);
        push(&mut timeline, "B", &["a", "b"]);
        push(&mut timeline, "C", &["a", "b", "c"]);

        let entry = timeline.go_to_version(1).expect("seek");
        assert_eq!(entry.action_label, "A");
        assert_eq!(timeline.current_index(), Some(0));
        // A seek discards nothing.
        assert_eq!(timeline.len(), 3);
        assert!(timeline.can_redo());

        assert!(matches!(
            timeline.go_to_version(99),
            Err(HistoryError::VersionNotFound(99))
        ));
        // Failed seek leaves the cursor untouched.
        assert_eq!(timeline.current_index(), Some(0));
    }

    #[test]
    fn test_delta_links_consecutive_entries() {
        let mut timeline = HistoryTimeline::new("p", "main");
        let first = push(&mut timeline, "A", &["a"]);
        assert!(first.delta.is_none());
        assert!(first.parent_version.is_none());

        let second = push(&mut timeline, "B", &["a", "b"]);
        assert_eq!(second.parent_version, Some(1));
        let delta = second.delta.expect("delta");
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].id, "b");
    }

    #[test]
    fn test_checkpoints_are_filtered_view() {
        let mut timeline = HistoryTimeline::new("p", "main");
        push(&mut timeline, "A", &["a"]);
        timeline.create_checkpoint("Milestone", state(&["a"]));
        push(&mut timeline, "B", &["a", "b"]);

        let checkpoints = timeline.checkpoints();
        assert_eq!(checkpoints.len(), 1);
        assert_eq!(checkpoints[0].action_label, "Milestone");
        assert!(checkpoints[0].is_checkpoint);
        assert_eq!(timeline.len(), 3);
    }

    #[test]
    fn test_replace_swaps_contents_atomically() {
        let mut timeline = HistoryTimeline::new("p", "main");
        push(&mut timeline, "A", &["a"]);

        let mut other = HistoryTimeline::new("p", "feature");
        let e1 = push(&mut other, "F1", &["x"]);
        let e2 = push(&mut other, "F2", &["x", "y"]);

        timeline.replace("feature", vec![e1, e2]);
        assert_eq!(timeline.branch_name(), "feature");
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.current_index(), Some(1));
        assert_eq!(timeline.current_entry().map(|e| e.action_label.clone()), Some("F2".into()));
    }

    #[test]
    fn test_attach_thumbnail() {
        let mut timeline = HistoryTimeline::new("p", "main");
        let entry = push(&mut timeline, "A", &["a"]);
        assert!(entry.thumbnail_url.is_none());

        let updated = timeline
            .attach_thumbnail(entry.id, "https://thumbs/1.png")
            .expect("attach");
        assert_eq!(updated.thumbnail_url.as_deref(), Some("https://thumbs/1.png"));
        assert!(timeline.attach_thumbnail(uuid::Uuid::new_v4(), "x").is_none());
    }
}
