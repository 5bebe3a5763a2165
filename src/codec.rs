//! State codec - deep snapshots, canonical JSON, and structural fingerprints.
//!
//! Stored history entries must never alias the editor's live state, and two
//! states that are value-equal must fingerprint identically regardless of
//! property insertion order. Order independence falls out of the data model:
//! open property maps and the selection set are B-tree collections, so
//! serialization is canonical by construction.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::CanvasState;

/// Take an independent deep copy of a state for storage.
///
/// Every collection in [`CanvasState`] owns its contents, so a clone shares
/// nothing with the live document.
#[must_use]
pub fn snapshot(state: &CanvasState) -> CanvasState {
    state.clone()
}

/// Compute a deterministic structural fingerprint of a state.
///
/// Value-equal states always hash equal; the hash is over the canonical JSON
/// encoding, so it is independent of how the state was assembled. Used by the
/// autosave scheduler to detect "nothing changed since the last flush".
#[must_use]
pub fn fingerprint(state: &CanvasState) -> u64 {
    match serde_json::to_string(state) {
        Ok(json) => {
            let mut hasher = DefaultHasher::new();
            json.hash(&mut hasher);
            hasher.finish()
        }
        Err(e) => {
            // CanvasState contains nothing unserializable; keep a fallback
            // that at least never aliases two different states on purpose.
            tracing::warn!("Failed to serialize state for fingerprinting: {e}");
            0
        }
    }
}

/// Serialize a state to JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json(state: &CanvasState) -> Result<String, serde_json::Error> {
    serde_json::to_string(state)
}

/// Deserialize a state from JSON.
///
/// # Errors
///
/// Returns an error if deserialization fails.
pub fn from_json(json: &str) -> Result<CanvasState, serde_json::Error> {
    serde_json::from_str(json)
}
