//! Durable history storage.
//!
//! The engine consumes [`PersistedHistoryStore`] as an interface only; the
//! concrete backend (database, remote service) lives outside this crate.
//! [`MemoryHistoryStore`] is a thread-safe reference implementation for
//! tests and single-process embedding.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::HistoryEntry;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The internal lock was poisoned by a panicking thread.
    #[error("Lock poisoned")]
    LockPoisoned,
    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The backing store failed.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// The head of one branch as aggregated by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchHead {
    /// Branch name.
    pub branch_name: String,
    /// Highest version number on the branch.
    pub max_version_number: u64,
    /// The entry carrying that version.
    pub entry: HistoryEntry,
}

/// Durable store for history entries keyed by (project, branch, version).
///
/// Persistence is eventual: the engine calls `upsert` fire-and-forget from
/// its synchronous mutators and only awaits queries on branch operations.
#[async_trait]
pub trait PersistedHistoryStore: Send + Sync {
    /// Insert or replace an entry. Idempotent by entry id: re-upserting the
    /// same id amends the stored entry in place.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend rejects the write. The engine
    /// logs the failure and never rolls back the in-memory push.
    async fn upsert(&self, entry: &HistoryEntry) -> Result<(), StoreError>;

    /// The most recent `limit` entries of a branch, ascending by version
    /// number. Autosave entries are included; callers that rebuild a
    /// timeline filter them out.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend query fails.
    async fn query_branch(
        &self,
        project_id: &str,
        branch_name: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Per-branch heads for a project: for every branch name observed, the
    /// entry with the highest version number (preferring a regular entry
    /// over an autosave sharing the same version).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend query fails.
    async fn query_all_branch_heads(
        &self,
        project_id: &str,
    ) -> Result<Vec<BranchHead>, StoreError>;
}

/// Thread-safe in-memory history store.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryStore {
    entries: Arc<RwLock<HashMap<String, Vec<HistoryEntry>>>>,
}

impl MemoryHistoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored entries for a project.
    #[must_use]
    pub fn entry_count(&self, project_id: &str) -> usize {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.get(project_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl PersistedHistoryStore for MemoryHistoryStore {
    async fn upsert(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let project = entries.entry(entry.project_id.clone()).or_default();
        if let Some(existing) = project.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry.clone();
        } else {
            project.push(entry.clone());
        }
        Ok(())
    }

    async fn query_branch(
        &self,
        project_id: &str,
        branch_name: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut matched: Vec<HistoryEntry> = entries
            .get(project_id)
            .map(|project| {
                project
                    .iter()
                    .filter(|e| e.branch_name == branch_name)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matched.sort_by_key(|e| (e.version_number, e.is_autosave, e.created_at));
        if matched.len() > limit {
            matched.drain(..matched.len() - limit);
        }
        Ok(matched)
    }

    async fn query_all_branch_heads(
        &self,
        project_id: &str,
    ) -> Result<Vec<BranchHead>, StoreError> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut heads: HashMap<String, HistoryEntry> = HashMap::new();
        for entry in entries.get(project_id).into_iter().flatten() {
            let replace = heads.get(&entry.branch_name).is_none_or(|head| {
                entry.version_number > head.version_number
                    || (entry.version_number == head.version_number
                        && head.is_autosave
                        && !entry.is_autosave)
            });
            if replace {
                heads.insert(entry.branch_name.clone(), entry.clone());
            }
        }
        let mut result: Vec<BranchHead> = heads
            .into_iter()
            .map(|(branch_name, entry)| BranchHead {
                branch_name,
                max_version_number: entry.version_number,
                entry,
            })
            .collect();
        result.sort_by(|a, b| a.branch_name.cmp(&b.branch_name));
        Ok(result)
    }
}
