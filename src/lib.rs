//! # Canvas History
//!
//! Branched, delta-tracked undo/redo timeline for canvas editors: every edit
//! produces an immutable snapshot addressable by version number, snapshots
//! belong to named branches that can be forked, switched, and merged, and a
//! background scheduler autosaves without disturbing undo semantics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              VersioningEngine               │
//! ├─────────────────────────────────────────────┤
//! │  HistoryTimeline │  BranchManager           │
//! │  - undo/redo     │  - create/switch         │
//! │  - cursor        │  - merge (take-theirs)   │
//! │  - capacity trim │  - list heads            │
//! ├─────────────────────────────────────────────┤
//! │  DeltaComputer   │  AutosaveScheduler       │
//! │  - added/removed │  - fingerprint skip      │
//! │  - per-key diffs │  - final flush on close  │
//! └─────────────────────────────────────────────┘
//!          │                     │
//!   ThumbnailRenderer    PersistedHistoryStore
//!      (consumed)             (consumed)
//! ```
//!
//! Synchronous mutators never block on storage: persistence and thumbnail
//! rendering are fire-and-forget background tasks, and a failed write is
//! logged rather than rolled back.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod autosave;
pub mod branch;
pub mod codec;
pub mod delta;
pub mod element;
pub mod engine;
pub mod entry;
pub mod error;
pub mod state;
pub mod store;
pub mod thumbnail;
pub mod timeline;

pub use autosave::{AutosaveScheduler, DEFAULT_AUTOSAVE_INTERVAL};
pub use branch::BranchManager;
pub use delta::{compute_delta, ElementChange, StateDelta};
pub use element::CanvasElement;
pub use engine::{EngineConfig, HistoryChangeCallback, StateRestoreCallback, VersioningEngine};
pub use entry::{ActionType, Branch, HistoryEntry};
pub use error::{HistoryError, HistoryResult};
pub use state::{CanvasState, Guide, GuideAxis, Viewport};
pub use store::{BranchHead, MemoryHistoryStore, PersistedHistoryStore, StoreError};
pub use thumbnail::{ThumbnailError, ThumbnailRenderer};
pub use timeline::{HistoryTimeline, SharedTimeline, DEFAULT_CAPACITY};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
