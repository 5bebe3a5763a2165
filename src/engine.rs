//! The versioning engine facade composing timeline, branches, autosave,
//! persistence, and thumbnail rendering for the surrounding editor.
//!
//! One engine instance is constructed per open project/session; there is no
//! process-wide state, so multiple projects can be versioned concurrently.
//! Synchronous mutators (push/undo/redo/goto/checkpoint) return immediately
//! with the authoritative in-memory result; persistence and thumbnail
//! rendering run as fire-and-forget background tasks whose failures are
//! logged and never block the editing path.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::{
    codec, ActionType, AutosaveScheduler, Branch, BranchManager, CanvasState, HistoryEntry,
    HistoryError, HistoryResult, HistoryTimeline, PersistedHistoryStore, SharedTimeline,
    ThumbnailRenderer, DEFAULT_AUTOSAVE_INTERVAL, DEFAULT_CAPACITY,
};

/// Callback fired after every mutating call with the entries and cursor.
pub type HistoryChangeCallback = Box<dyn Fn(&[HistoryEntry], Option<usize>) + Send + Sync>;

/// Callback fired whenever undo/redo/goto/branch operations change the
/// current canvas state; the consumer re-renders from it.
pub type StateRestoreCallback = Box<dyn Fn(&CanvasState) + Send + Sync>;

/// Tunables for a versioning engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// In-memory entries kept per branch.
    pub capacity: usize,
    /// Autosave flush interval.
    pub autosave_interval: Duration,
    /// Thumbnail width in pixels.
    pub thumbnail_width: u32,
    /// Thumbnail height in pixels.
    pub thumbnail_height: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            thumbnail_width: 256,
            thumbnail_height: 144,
        }
    }
}

/// The versioning engine for one editing session.
pub struct VersioningEngine {
    config: EngineConfig,
    store: Arc<dyn PersistedHistoryStore>,
    renderer: Option<Arc<dyn ThumbnailRenderer>>,
    timeline: SharedTimeline,
    branches: BranchManager,
    autosave: Option<AutosaveScheduler>,
    project_id: Option<String>,
    on_history_change: Option<HistoryChangeCallback>,
    on_state_restore: Option<StateRestoreCallback>,
}

impl VersioningEngine {
    /// Create an engine over a persisted store with the given config.
    ///
    /// The engine is inert until [`initialize`](Self::initialize) is called.
    #[must_use]
    pub fn new(store: Arc<dyn PersistedHistoryStore>, config: EngineConfig) -> Self {
        let timeline: SharedTimeline = Arc::new(RwLock::new(HistoryTimeline::with_capacity(
            "",
            "main",
            config.capacity,
        )));
        let branches = BranchManager::new(Arc::clone(&store), Arc::clone(&timeline), config.capacity);
        Self {
            config,
            store,
            renderer: None,
            timeline,
            branches,
            autosave: None,
            project_id: None,
            on_history_change: None,
            on_state_restore: None,
        }
    }

    /// Attach a thumbnail renderer.
    #[must_use]
    pub fn with_thumbnail_renderer(mut self, renderer: Arc<dyn ThumbnailRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Register the history-change callback.
    pub fn set_on_history_change(
        &mut self,
        callback: impl Fn(&[HistoryEntry], Option<usize>) + Send + Sync + 'static,
    ) {
        self.on_history_change = Some(Box::new(callback));
    }

    /// Register the state-restore callback.
    pub fn set_on_state_restore(
        &mut self,
        callback: impl Fn(&CanvasState) + Send + Sync + 'static,
    ) {
        self.on_state_restore = Some(Box::new(callback));
    }

    /// Open a project: reset engine state and start the autosave scheduler.
    ///
    /// Re-initializing disposes the previous session's scheduler first.
    pub async fn initialize(&mut self, project_id: &str) {
        if let Some(scheduler) = self.autosave.take() {
            scheduler.dispose().await;
        }
        {
            let mut timeline = self.write_timeline();
            *timeline =
                HistoryTimeline::with_capacity(project_id, "main", self.config.capacity);
        }
        self.project_id = Some(project_id.to_string());
        self.autosave = Some(AutosaveScheduler::start(
            Arc::clone(&self.timeline),
            Arc::clone(&self.store),
            self.config.autosave_interval,
        ));
        tracing::info!(project = project_id, "versioning engine initialized");
    }

    /// Close the session: stop the scheduler (with its final flush) and
    /// detach callbacks. In-flight persistence writes complete in the
    /// background.
    pub async fn dispose(&mut self) {
        if let Some(scheduler) = self.autosave.take() {
            scheduler.dispose().await;
        }
        self.on_history_change = None;
        self.on_state_restore = None;
        self.project_id = None;
        tracing::info!("versioning engine disposed");
    }

    /// Record a new edit as the next history entry on the active branch.
    ///
    /// Discards any redo tail, snapshots `state`, and returns the new entry
    /// immediately; persistence and thumbnail rendering continue in the
    /// background.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] before `initialize`.
    pub fn push_state(
        &self,
        state: &CanvasState,
        label: &str,
        action_type: ActionType,
        changed_ids: Vec<String>,
    ) -> HistoryResult<HistoryEntry> {
        self.ensure_initialized()?;
        let entry = self.write_timeline().push_state(
            codec::snapshot(state),
            label,
            action_type,
            changed_ids,
        );
        self.persist_in_background(entry.clone());
        self.notify_history_change();
        Ok(entry)
    }

    /// Step one entry back and hand the restored state to the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] before `initialize`, or
    /// [`HistoryError::NothingToUndo`] at the oldest entry.
    pub fn undo(&self) -> HistoryResult<HistoryEntry> {
        self.ensure_initialized()?;
        let entry = self.write_timeline().undo()?;
        self.notify_state_restore(&entry.canvas_state);
        self.notify_history_change();
        Ok(entry)
    }

    /// Step one entry forward and hand the restored state to the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] before `initialize`, or
    /// [`HistoryError::NothingToRedo`] at the newest entry.
    pub fn redo(&self) -> HistoryResult<HistoryEntry> {
        self.ensure_initialized()?;
        let entry = self.write_timeline().redo()?;
        self.notify_state_restore(&entry.canvas_state);
        self.notify_history_change();
        Ok(entry)
    }

    /// Seek directly to a version on the active branch.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] before `initialize`, or
    /// [`HistoryError::VersionNotFound`] if the version is not in memory.
    pub fn go_to_version(&self, version: u64) -> HistoryResult<HistoryEntry> {
        self.ensure_initialized()?;
        let entry = self.write_timeline().go_to_version(version)?;
        self.notify_state_restore(&entry.canvas_state);
        self.notify_history_change();
        Ok(entry)
    }

    /// Record a manual named milestone.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NotInitialized`] before `initialize`.
    pub fn create_checkpoint(
        &self,
        label: &str,
        state: &CanvasState,
    ) -> HistoryResult<HistoryEntry> {
        self.push_state(state, label, ActionType::Checkpoint, Vec::new())
    }

    /// The checkpoint entries on the active branch, oldest first.
    #[must_use]
    pub fn get_checkpoints(&self) -> Vec<HistoryEntry> {
        self.read_timeline().checkpoints()
    }

    /// Fork a new branch from the current entry without switching to it.
    ///
    /// # Errors
    ///
    /// See [`BranchManager::create_branch`]; additionally
    /// [`HistoryError::NotInitialized`] before `initialize`.
    pub async fn create_branch(&self, name: &str) -> HistoryResult<HistoryEntry> {
        self.ensure_initialized()?;
        let entry = self.branches.create_branch(name).await?;
        self.notify_history_change();
        Ok(entry)
    }

    /// Switch the active branch and restore its head state.
    ///
    /// # Errors
    ///
    /// See [`BranchManager::switch_branch`]; additionally
    /// [`HistoryError::NotInitialized`] before `initialize`.
    pub async fn switch_branch(&self, name: &str) -> HistoryResult<HistoryEntry> {
        self.ensure_initialized()?;
        let head = self.branches.switch_branch(name).await?;
        self.notify_state_restore(&head.canvas_state);
        self.notify_history_change();
        Ok(head)
    }

    /// Merge a source branch's head onto the active branch (take-theirs).
    ///
    /// # Errors
    ///
    /// See [`BranchManager::merge_branch`]; additionally
    /// [`HistoryError::NotInitialized`] before `initialize`.
    pub async fn merge_branch(&self, source: &str) -> HistoryResult<HistoryEntry> {
        self.ensure_initialized()?;
        let entry = self.branches.merge_branch(source).await?;
        self.persist_in_background(entry.clone());
        self.notify_state_restore(&entry.canvas_state);
        self.notify_history_change();
        Ok(entry)
    }

    /// List all branches of the project.
    ///
    /// # Errors
    ///
    /// See [`BranchManager::list_branches`]; additionally
    /// [`HistoryError::NotInitialized`] before `initialize`.
    pub async fn list_branches(&self) -> HistoryResult<Vec<Branch>> {
        self.ensure_initialized()?;
        self.branches.list_branches().await
    }

    /// All in-memory entries of the active branch, oldest first.
    #[must_use]
    pub fn get_history(&self) -> Vec<HistoryEntry> {
        self.read_timeline().entries().to_vec()
    }

    /// The cursor index into the in-memory timeline (`None` = empty).
    #[must_use]
    pub fn get_current_index(&self) -> Option<usize> {
        self.read_timeline().current_index()
    }

    /// The state under the cursor, if any.
    #[must_use]
    pub fn current_state(&self) -> Option<CanvasState> {
        self.read_timeline()
            .current_entry()
            .map(|e| e.canvas_state.clone())
    }

    /// Whether an undo is possible.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.read_timeline().can_undo()
    }

    /// Whether a redo is possible.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.read_timeline().can_redo()
    }

    // -----------------------------------------------------------------------
    // Background persistence
    // -----------------------------------------------------------------------

    /// Persist an entry and render its thumbnail without blocking the caller.
    ///
    /// Failures are logged; the in-memory push is never rolled back. The
    /// thumbnail URL is attached to the in-memory entry (and re-upserted)
    /// once rendering completes.
    fn persist_in_background(&self, entry: HistoryEntry) {
        let store = Arc::clone(&self.store);
        let renderer = self.renderer.clone();
        let timeline = Arc::clone(&self.timeline);
        let (width, height) = (self.config.thumbnail_width, self.config.thumbnail_height);

        tokio::spawn(async move {
            if let Err(e) = store.upsert(&entry).await {
                tracing::warn!(version = entry.version_number, "failed to persist entry: {e}");
            }

            let Some(renderer) = renderer else {
                return;
            };
            match renderer.render(&entry.canvas_state, width, height).await {
                Ok(url) => {
                    let updated = {
                        let mut timeline =
                            timeline.write().unwrap_or_else(PoisonError::into_inner);
                        timeline.attach_thumbnail(entry.id, &url)
                    };
                    if let Some(updated) = updated {
                        if let Err(e) = store.upsert(&updated).await {
                            tracing::warn!("failed to persist thumbnail url: {e}");
                        }
                    }
                }
                Err(e) => {
                    // Entries stay valid without a thumbnail.
                    tracing::debug!(version = entry.version_number, "thumbnail render failed: {e}");
                }
            }
        });
    }

    fn ensure_initialized(&self) -> HistoryResult<()> {
        if self.project_id.is_some() {
            Ok(())
        } else {
            Err(HistoryError::NotInitialized)
        }
    }

    fn notify_history_change(&self) {
        if let Some(callback) = &self.on_history_change {
            // Clone out before invoking so a callback that reads the engine
            // back cannot deadlock on the timeline lock.
            let (entries, index) = {
                let timeline = self.read_timeline();
                (timeline.entries().to_vec(), timeline.current_index())
            };
            callback(&entries, index);
        }
    }

    fn notify_state_restore(&self, state: &CanvasState) {
        if let Some(callback) = &self.on_state_restore {
            callback(state);
        }
    }

    fn read_timeline(&self) -> std::sync::RwLockReadGuard<'_, HistoryTimeline> {
        self.timeline.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_timeline(&self) -> std::sync::RwLockWriteGuard<'_, HistoryTimeline> {
        self.timeline.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{CanvasElement, MemoryHistoryStore};

    fn state(ids: &[&str]) -> CanvasState {
        CanvasState::with_elements(ids.iter().map(|id| CanvasElement::new(*id, "rect")).collect())
    }

    async fn engine() -> (VersioningEngine, Arc<MemoryHistoryStore>) {
        let store = Arc::new(MemoryHistoryStore::new());
        let mut engine = VersioningEngine::new(store.clone(), EngineConfig::default());
        engine.initialize("project-1").await;
        (engine, store)
    }

    #[tokio::test]
    async fn test_not_initialized() {
        let store = Arc::new(MemoryHistoryStore::new());
        let engine = VersioningEngine::new(store, EngineConfig::default());
        assert!(matches!(
            engine.push_state(&state(&["a"]), "A", ActionType::Create, vec![]),
            Err(HistoryError::NotInitialized)
        ));
        assert!(matches!(engine.undo(), Err(HistoryError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_push_returns_immediately_with_in_memory_result() {
        let (engine, _store) = engine().await;
        let entry = engine
            .push_state(&state(&["a"]), "A", ActionType::Create, vec!["a".into()])
            .expect("push");
        assert_eq!(entry.version_number, 1);
        assert_eq!(engine.get_history().len(), 1);
        assert_eq!(engine.get_current_index(), Some(0));
    }

    #[tokio::test]
    async fn test_push_persists_in_background() {
        let (engine, store) = engine().await;
        engine
            .push_state(&state(&["a"]), "A", ActionType::Create, vec![])
            .expect("push");

        // Fire-and-forget: give the spawned task a chance to run.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.entry_count("project-1"), 1);
    }

    #[tokio::test]
    async fn test_callbacks_fire_on_mutation() {
        let (mut engine, _store) = engine().await;
        let history_calls = Arc::new(AtomicUsize::new(0));
        let restore_calls = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&history_calls);
        engine.set_on_history_change(move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let r = Arc::clone(&restore_calls);
        engine.set_on_state_restore(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });

        engine
            .push_state(&state(&["a"]), "A", ActionType::Create, vec![])
            .expect("push");
        engine
            .push_state(&state(&["a", "b"]), "B", ActionType::Create, vec![])
            .expect("push");
        assert_eq!(history_calls.load(Ordering::SeqCst), 2);
        assert_eq!(restore_calls.load(Ordering::SeqCst), 0);

        engine.undo().expect("undo");
        assert_eq!(history_calls.load(Ordering::SeqCst), 3);
        assert_eq!(restore_calls.load(Ordering::SeqCst), 1);

        engine.redo().expect("redo");
        assert_eq!(restore_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_operation_leaves_timeline_untouched() {
        let (engine, _store) = engine().await;
        engine
            .push_state(&state(&["a"]), "A", ActionType::Create, vec![])
            .expect("push");

        assert!(matches!(engine.redo(), Err(HistoryError::NothingToRedo)));
        assert!(matches!(engine.undo(), Err(HistoryError::NothingToUndo)));
        assert!(matches!(
            engine.go_to_version(42),
            Err(HistoryError::VersionNotFound(42))
        ));
        assert_eq!(engine.get_history().len(), 1);
        assert_eq!(engine.get_current_index(), Some(0));
    }

    #[tokio::test]
    async fn test_checkpoints() {
        let (engine, _store) = engine().await;
        engine
            .push_state(&state(&["a"]), "A", ActionType::Create, vec![])
            .expect("push");
        engine
            .create_checkpoint("Review milestone", &state(&["a"]))
            .expect("checkpoint");

        let checkpoints = engine.get_checkpoints();
        assert_eq!(checkpoints.len(), 1);
        assert_eq!(checkpoints[0].action_label, "Review milestone");
    }

    #[tokio::test]
    async fn test_reinitialize_resets_state() {
        let (mut engine, _store) = engine().await;
        engine
            .push_state(&state(&["a"]), "A", ActionType::Create, vec![])
            .expect("push");
        assert_eq!(engine.get_history().len(), 1);

        engine.initialize("project-2").await;
        assert!(engine.get_history().is_empty());
        assert_eq!(engine.get_current_index(), None);
    }

    #[tokio::test]
    async fn test_dispose_detaches_callbacks_and_blocks_mutators() {
        let (mut engine, _store) = engine().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        engine.set_on_history_change(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        engine
            .push_state(&state(&["a"]), "A", ActionType::Create, vec![])
            .expect("push");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        engine.dispose().await;
        assert!(matches!(
            engine.push_state(&state(&["b"]), "B", ActionType::Create, vec![]),
            Err(HistoryError::NotInitialized)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
