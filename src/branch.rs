//! Branch management - create, switch, merge, and list branches.
//!
//! Single-writer-per-branch: one session mutates a given (project, branch)
//! timeline at a time. Branch switches replace the in-memory timeline
//! atomically; the store is never observed in a partially loaded state
//! because the swap happens under one write lock after the load completes.

use std::sync::Arc;

use crate::{
    codec, ActionType, Branch, HistoryEntry, HistoryError, HistoryResult, PersistedHistoryStore,
    SharedTimeline, StateDelta,
};

/// Creates, switches, merges, and lists branches over the shared timeline
/// and the persisted store.
pub struct BranchManager {
    store: Arc<dyn PersistedHistoryStore>,
    timeline: SharedTimeline,
    capacity: usize,
}

impl BranchManager {
    /// Create a manager over a shared timeline and store.
    #[must_use]
    pub fn new(
        store: Arc<dyn PersistedHistoryStore>,
        timeline: SharedTimeline,
        capacity: usize,
    ) -> Self {
        Self {
            store,
            timeline,
            capacity,
        }
    }

    /// Fork a new branch from the active branch's current entry.
    ///
    /// Persists one entry as version 1 of `name`, with the canvas state
    /// copied from the current entry and `parent_version` recording the fork
    /// point. Does not switch the active branch.
    ///
    /// # Errors
    ///
    /// - [`HistoryError::NoCurrentEntry`] if the timeline is empty.
    /// - [`HistoryError::BranchAlreadyExists`] on a name collision.
    /// - [`HistoryError::Store`] if the fork entry cannot be persisted.
    pub async fn create_branch(&self, name: &str) -> HistoryResult<HistoryEntry> {
        let (project_id, active_branch, current) = {
            let timeline = self
                .timeline
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            (
                timeline.project_id().to_string(),
                timeline.branch_name().to_string(),
                timeline.current_entry().cloned(),
            )
        };
        let current = current.ok_or(HistoryError::NoCurrentEntry)?;

        if name == active_branch {
            return Err(HistoryError::BranchAlreadyExists(name.to_string()));
        }
        let heads = self.store.query_all_branch_heads(&project_id).await?;
        if heads.iter().any(|h| h.branch_name == name) {
            return Err(HistoryError::BranchAlreadyExists(name.to_string()));
        }

        let entry = HistoryEntry::new(
            &project_id,
            name,
            1,
            format!(
                "Branched from {active_branch} at v{}",
                current.version_number
            ),
            ActionType::Create,
            codec::snapshot(&current.canvas_state),
        )
        .with_parent_version(current.version_number);

        self.store.upsert(&entry).await?;
        tracing::info!(branch = name, fork_point = current.version_number, "created branch");
        Ok(entry)
    }

    /// Switch the active branch, atomically replacing the timeline contents.
    ///
    /// Loads up to the in-memory capacity of the branch's most recent
    /// regular entries (ascending by version number) and points the cursor
    /// at the last one. Returns the head entry so the caller can restore
    /// editor state.
    ///
    /// # Errors
    ///
    /// - [`HistoryError::BranchNotFound`] if the branch has no entries.
    /// - [`HistoryError::Store`] if the load fails.
    pub async fn switch_branch(&self, name: &str) -> HistoryResult<HistoryEntry> {
        let project_id = {
            let timeline = self
                .timeline
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            timeline.project_id().to_string()
        };

        let mut entries = self
            .store
            .query_branch(&project_id, name, self.capacity)
            .await?;
        entries.retain(|e| !e.is_autosave);
        let head = entries
            .last()
            .cloned()
            .ok_or_else(|| HistoryError::BranchNotFound(name.to_string()))?;

        {
            let mut timeline = self
                .timeline
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            timeline.replace(name, entries);
        }
        tracing::info!(branch = name, head = head.version_number, "switched branch");
        Ok(head)
    }

    /// Merge a source branch into the active branch.
    ///
    /// A deliberate "take-theirs" overwrite with no conflict detection: the
    /// source head's state is pushed onto the active branch as a new `bulk`
    /// entry whose changed elements come from the source head's delta.
    ///
    /// # Errors
    ///
    /// - [`HistoryError::MergeIntoSelf`] if `source` is the active branch.
    /// - [`HistoryError::BranchNotFound`] if the source has no entries.
    /// - [`HistoryError::Store`] if the source head cannot be loaded.
    pub async fn merge_branch(&self, source: &str) -> HistoryResult<HistoryEntry> {
        let (project_id, active_branch) = {
            let timeline = self
                .timeline
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            (
                timeline.project_id().to_string(),
                timeline.branch_name().to_string(),
            )
        };
        if source == active_branch {
            return Err(HistoryError::MergeIntoSelf(source.to_string()));
        }

        let mut entries = self
            .store
            .query_branch(&project_id, source, self.capacity)
            .await?;
        entries.retain(|e| !e.is_autosave);
        let head = entries
            .pop()
            .ok_or_else(|| HistoryError::BranchNotFound(source.to_string()))?;

        let changed = head
            .delta
            .as_ref()
            .map_or_else(|| head.changed_elements.clone(), StateDelta::changed_ids);

        let entry = {
            let mut timeline = self
                .timeline
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            timeline.push_state(
                codec::snapshot(&head.canvas_state),
                &format!("Merged branch '{source}'"),
                ActionType::Bulk,
                changed,
            )
        };
        tracing::info!(source, into = %active_branch, "merged branch");
        Ok(entry)
    }

    /// List all branches of the project, aggregated from the store's heads.
    ///
    /// `created_at` falls back to the head entry's timestamp when the fork
    /// entry is outside the store's aggregation.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Store`] if the aggregation query fails.
    pub async fn list_branches(&self) -> HistoryResult<Vec<Branch>> {
        let project_id = {
            let timeline = self
                .timeline
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            timeline.project_id().to_string()
        };
        let heads = self.store.query_all_branch_heads(&project_id).await?;
        Ok(heads
            .into_iter()
            .map(|h| Branch {
                name: h.branch_name,
                head_version: h.max_version_number,
                created_at: h.entry.created_at,
                last_modified: h.entry.created_at,
            })
            .collect())
    }
}
