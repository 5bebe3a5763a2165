//! Error types for versioning operations.
//!
//! Every variant is locally recoverable: a failed operation leaves the
//! timeline exactly as it was, and store failures on the asynchronous
//! persistence path are logged rather than surfaced to mutators.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for versioning operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors that can occur in versioning operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The cursor is already at the oldest in-memory entry.
    #[error("Nothing to undo")]
    NothingToUndo,

    /// The cursor is already at the newest entry.
    #[error("Nothing to redo")]
    NothingToRedo,

    /// No in-memory entry carries the requested version number.
    #[error("Version not found: {0}")]
    VersionNotFound(u64),

    /// The requested branch has no persisted entries.
    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    /// A branch with this name already exists for the project.
    #[error("Branch already exists: {0}")]
    BranchAlreadyExists(String),

    /// The timeline is empty, so there is no entry to branch from.
    #[error("No current entry")]
    NoCurrentEntry,

    /// A branch cannot be merged into itself.
    #[error("Cannot merge branch into itself: {0}")]
    MergeIntoSelf(String),

    /// The engine has not been initialized with a project.
    #[error("Engine not initialized")]
    NotInitialized,

    /// The persisted store failed on the synchronous path (branch loads).
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
