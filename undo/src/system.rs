//! Gesture-batched undo/redo coordinator.
//!
//! [`UndoSystem`] captures entity state *before* each mutation, groups the
//! captures of one user gesture into a [`Batch`], and keeps a linear
//! undo/redo history of batches. Pushing a new batch after undoing clears
//! the redo stack (standard editor behavior).

use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::batch::Batch;
use crate::config::UndoConfig;
use crate::entity::{Editable, Entity, Version};
use crate::scheduler::{GestureQueue, GestureScheduler, PendingCommit};
use crate::snapshot::{Snapshot, SnapshotBuilder};

/// Records entity snapshots per gesture and replays them on undo/redo.
///
/// Model code calls [`capture`](Self::capture) right before mutating an
/// entity. The first capture of a gesture bumps the [version](Self::version)
/// and asks the scheduler for a commit; later captures of the same entity
/// in that gesture are free, because the entity's version stamp already
/// matches. When the scheduler hands the [`PendingCommit`] back, the
/// gesture's snapshots become one undo step.
///
/// History is bounded by [`UndoConfig::max_undo`]; once full, the oldest
/// batch falls off the front of the undo stack.
///
/// # Example
///
/// ```ignore
/// let mut undo = UndoSystem::new(GestureQueue::new());
/// let mut scene = Scene::new();
///
/// // Capture before mutating
/// undo.capture(scene.node_mut(id), false);
/// scene.node_mut(id).position = new_position;
///
/// // Input cycle finished
/// undo.finish_gesture(&mut scene);
///
/// undo.undo(&mut scene);
/// undo.redo(&mut scene);
/// ```
pub struct UndoSystem<M: Editable, S: GestureScheduler = GestureQueue> {
    version: Version,
    undo_stack: VecDeque<Batch<M::Handle>>,
    redo_stack: Vec<Batch<M::Handle>>,
    /// Snapshots captured in the open gesture.
    open: Vec<Snapshot<M::Handle>>,
    /// Entities touched in the open gesture, in capture order. Notified on
    /// commit.
    changed: Vec<M::Handle>,
    /// Membership index over `changed`.
    touched: HashSet<M::Handle>,
    gesture_visual_only: bool,
    builder: SnapshotBuilder<M::Handle>,
    scheduler: S,
    commit_scheduled: bool,
    suspend_depth: u32,
    config: UndoConfig,
    /// Signed step count back to the saved state: positive means undos,
    /// negative means redos. `None` once the saved state can no longer be
    /// reached (trimmed away, or its redo branch was discarded). Visual-only
    /// batches do not count.
    save_distance: Option<i64>,
}

impl<M: Editable, S: GestureScheduler> UndoSystem<M, S> {
    /// Creates an undo system with default settings.
    pub fn new(scheduler: S) -> Self {
        Self::with_config(UndoConfig::default(), scheduler)
    }

    /// Creates an undo system with explicit settings.
    pub fn with_config(config: UndoConfig, scheduler: S) -> Self {
        Self {
            version: 0,
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            open: Vec::new(),
            changed: Vec::new(),
            touched: HashSet::new(),
            gesture_visual_only: true,
            builder: SnapshotBuilder::new(),
            scheduler,
            commit_scheduled: false,
            suspend_depth: 0,
            config,
            save_distance: Some(0),
        }
    }

    /// Current version. Strictly increases; never repeats.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Records the pre-change state of `target`. Call before mutating it.
    ///
    /// Only the first capture of an entity per gesture produces a snapshot.
    /// A gesture is visual-only when every capture in it was. A visual-only
    /// capture of an entity that the most recent undo step already holds is
    /// folded into that step (a drag right after an edit of the same
    /// entity), unless disabled via [`UndoConfig::coalesce_visual_only`].
    ///
    /// Capturing while a batch is being restored is impossible: restoring
    /// holds `&mut self` for the whole undo or redo.
    pub fn capture(&mut self, target: &mut dyn Entity<M::Handle>, visual_only: bool) {
        if self.changed.is_empty() {
            self.version += 1;
            self.schedule_commit();
        }
        self.gesture_visual_only &= visual_only;

        if target.version() == self.version {
            return;
        }

        let handle = target.handle();
        target.set_version(self.version);
        // Stamp went stale mid-gesture (see `record_change_without_capture`).
        if !self.touched.insert(handle) {
            return;
        }
        self.changed.push(handle);

        if visual_only
            && self.config.coalesce_visual_only
            && self.undo_stack.back().is_some_and(|b| b.contains(handle))
        {
            log::trace!("Coalesced visual-only capture of {handle:?} into previous undo step");
            return;
        }

        log::trace!("Captured {handle:?} at version {}", self.version);
        self.open.push(self.builder.snapshot_of(target));
    }

    /// Bumps the version without capturing anything.
    ///
    /// For callers that key their own caches on [`version`](Self::version).
    /// Entities already captured in the open gesture stay captured: a later
    /// capture only restamps them.
    pub fn record_change_without_capture(&mut self) {
        self.version += 1;
    }

    /// Returns `true` if `target` was captured in the open gesture.
    pub fn has_pending_change(&self, target: &dyn Entity<M::Handle>) -> bool {
        self.touched.contains(&target.handle())
    }

    /// Pauses commit scheduling. Captures keep accumulating.
    ///
    /// Calls nest; each must be matched by [`resume`](Self::resume).
    pub fn suspend(&mut self) {
        self.suspend_depth += 1;
    }

    /// Resumes commit scheduling after [`suspend`](Self::suspend).
    ///
    /// When the outermost suspension ends and captures are waiting, a commit
    /// is scheduled right away so they land as one undo step.
    pub fn resume(&mut self) {
        if self.suspend_depth == 0 {
            log::warn!("UndoSystem::resume called without a matching suspend");
            return;
        }
        self.suspend_depth -= 1;
        if !self.changed.is_empty() {
            self.schedule_commit();
        }
    }

    /// Returns `true` between [`suspend`](Self::suspend) and its matching
    /// [`resume`](Self::resume).
    pub fn is_suspended(&self) -> bool {
        self.suspend_depth > 0
    }

    fn schedule_commit(&mut self) {
        if self.is_suspended() || self.commit_scheduled {
            return;
        }
        self.commit_scheduled = true;
        self.scheduler
            .dispatch_on_gesture_finish(PendingCommit::new(self.version));
    }

    /// Closes the open gesture. Hosts call this with the token their
    /// scheduler received, once the interaction is over.
    ///
    /// Touched entities are notified whether or not anything was recorded.
    /// Returns `true` if a new undo step was pushed, which clears the redo
    /// stack.
    pub fn commit(&mut self, commit: PendingCommit, model: &mut M) -> bool {
        self.commit_scheduled = false;
        let visual_only = self.gesture_visual_only;
        self.gesture_visual_only = true;

        self.touched.clear();
        for handle in self.changed.drain(..) {
            match model.entity_mut(handle) {
                Some(entity) => entity.notify_changed(visual_only),
                None => log::warn!("Changed entity {handle:?} no longer exists"),
            }
        }

        if self.open.is_empty() {
            log::debug!(
                "Gesture scheduled at version {} recorded nothing",
                commit.version()
            );
            return false;
        }

        let batch = Batch::new(std::mem::take(&mut self.open), visual_only);
        log::debug!(
            "Committed {} snapshot(s) at version {} (visual_only = {visual_only})",
            batch.len(),
            self.version
        );

        // Redo branch is gone, and with it any save point that lived there.
        self.redo_stack.clear();
        match self.save_distance {
            Some(d) if d < 0 => self.save_distance = None,
            Some(d) if !visual_only => self.save_distance = Some(d + 1),
            _ => {}
        }

        self.push_undo(batch);
        true
    }

    fn push_undo(&mut self, batch: Batch<M::Handle>) {
        self.undo_stack.push_back(batch);
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.pop_front();
            // Saved state was older than every batch still held.
            if let Some(d) = self.save_distance
                && d > self.undo_stack.len() as i64
            {
                self.save_distance = None;
            }
        }
    }

    /// Undoes the most recent step.
    ///
    /// Does nothing (returns `false`) if there is nothing to undo or a
    /// gesture is still open; a half-captured gesture is never torn apart.
    /// A step whose entities have all been removed from `model` is dropped
    /// and also yields `false`.
    ///
    /// # Panics
    ///
    /// Panics if an entity cannot read back its own snapshot (see
    /// [`Batch::restore`]).
    pub fn undo(&mut self, model: &mut M) -> bool {
        if self.is_gesture_open() {
            log::debug!("Undo ignored: gesture in progress");
            return false;
        }
        let Some(batch) = self.undo_stack.pop_back() else {
            return false;
        };

        self.version += 1;
        let visual_only = batch.is_visual_only();
        let inverse = batch.restore(model, &mut self.builder, self.version);
        if inverse.is_empty() {
            log::warn!("Undo step touched no surviving entity; discarded");
            return false;
        }
        log::debug!(
            "Undid {} snapshot(s) at version {}",
            inverse.len(),
            self.version
        );
        self.redo_stack.push(inverse);

        if !visual_only && let Some(d) = &mut self.save_distance {
            *d -= 1;
        }
        true
    }

    /// Redoes the most recently undone step.
    ///
    /// Does nothing (returns `false`) if there is nothing to redo or a
    /// gesture is still open. Like [`undo`](Self::undo), a step with no
    /// surviving entities is dropped.
    ///
    /// # Panics
    ///
    /// Panics if an entity cannot read back its own snapshot (see
    /// [`Batch::restore`]).
    pub fn redo(&mut self, model: &mut M) -> bool {
        if self.is_gesture_open() {
            log::debug!("Redo ignored: gesture in progress");
            return false;
        }
        let Some(batch) = self.redo_stack.pop() else {
            return false;
        };

        self.version += 1;
        let visual_only = batch.is_visual_only();
        let inverse = batch.restore(model, &mut self.builder, self.version);
        if inverse.is_empty() {
            log::warn!("Redo step touched no surviving entity; discarded");
            return false;
        }
        log::debug!(
            "Redid {} snapshot(s) at version {}",
            inverse.len(),
            self.version
        );

        if !visual_only && let Some(d) = &mut self.save_distance {
            *d += 1;
        }
        self.push_undo(inverse);
        true
    }

    /// Returns `true` while captures are waiting for a commit.
    pub fn is_gesture_open(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Returns `true` if there are steps that can be undone.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns `true` if there are steps that can be redone.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of batches on the undo stack.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of batches on the redo stack.
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// The most recent undo step, if any.
    pub fn last_batch(&self) -> Option<&Batch<M::Handle>> {
        self.undo_stack.back()
    }

    /// Maximum number of batches kept on the undo stack.
    pub fn max_undo(&self) -> usize {
        self.config.max_undo
    }

    /// Settings this system was created with.
    pub fn config(&self) -> &UndoConfig {
        &self.config
    }

    /// The scheduler receiving commit requests.
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Mutable access to the scheduler, e.g. to drain it by hand.
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Marks the model's current state as persisted.
    ///
    /// Only batches with content changes move away from this point again;
    /// visual-only batches (drags, resizes) leave it in place.
    pub fn mark_saved(&mut self) {
        self.save_distance = Some(0);
    }

    /// Returns `true` when at least one content batch separates the model
    /// from the state passed to [`mark_saved`](Self::mark_saved), or when
    /// that state has been trimmed out of history.
    pub fn has_unsaved_changes(&self) -> bool {
        self.save_distance != Some(0)
    }

    /// Drops every committed batch. Captures of the open gesture survive and
    /// commit as usual.
    ///
    /// A model sitting at its save point stays saved; any other save point
    /// becomes unreachable.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        if self.save_distance != Some(0) {
            self.save_distance = None;
        }
    }
}

impl<M: Editable> UndoSystem<M, GestureQueue> {
    /// Commits every gesture queued since the last call.
    ///
    /// Call once per input cycle, after input handling. Returns `true` if an
    /// undo step was pushed.
    pub fn finish_gesture(&mut self, model: &mut M) -> bool {
        let mut pushed = false;
        for commit in self.scheduler.drain() {
            pushed |= self.commit(commit, model);
        }
        pushed
    }
}

impl<M: Editable, S: GestureScheduler> fmt::Debug for UndoSystem<M, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoSystem")
            .field("version", &self.version)
            .field("undo_count", &self.undo_stack.len())
            .field("redo_count", &self.redo_stack.len())
            .field("open_snapshots", &self.open.len())
            .field("changed", &self.changed.len())
            .field("commit_scheduled", &self.commit_scheduled)
            .field("suspend_depth", &self.suspend_depth)
            .field("save_distance", &self.save_distance)
            .finish()
    }
}
