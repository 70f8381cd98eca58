//! Deferred gesture commits.
//!
//! The undo system does not know when a user interaction ends; the input
//! loop does. On the first capture of a gesture the undo system hands a
//! [`PendingCommit`] to its [`GestureScheduler`], and the host passes that
//! token back to [`UndoSystem::commit`](crate::UndoSystem::commit) once the
//! interaction is over.
//!
//! [`GestureQueue`] is the frame-loop implementation: the editor drains it
//! at the end of each input cycle.

use std::fmt;

use crate::entity::Version;

/// One-shot token for committing the open gesture.
///
/// Not `Clone`: each dispatched commit can be handed back exactly once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending commit must be passed back to `UndoSystem::commit`"]
pub struct PendingCommit {
    version: Version,
}

impl PendingCommit {
    pub(crate) fn new(version: Version) -> Self {
        Self { version }
    }

    /// The undo system's version when the commit was scheduled.
    pub fn version(&self) -> Version {
        self.version
    }
}

/// Receives commit requests for the gesture in progress.
///
/// The undo system keeps at most one request outstanding. Implementations
/// must hand the token back to [`UndoSystem::commit`] exactly once, after
/// the current interaction completes and before any capture belonging to
/// the next interaction.
///
/// Closures taking a [`PendingCommit`] implement this trait, which is
/// convenient in tests.
///
/// [`UndoSystem::commit`]: crate::UndoSystem::commit
pub trait GestureScheduler {
    /// Holds on to `commit` until the current gesture ends.
    fn dispatch_on_gesture_finish(&mut self, commit: PendingCommit);
}

impl<F: FnMut(PendingCommit)> GestureScheduler for F {
    fn dispatch_on_gesture_finish(&mut self, commit: PendingCommit) {
        self(commit)
    }
}

/// Queue of commits waiting for the current input cycle to finish.
///
/// # Example
///
/// ```ignore
/// let mut undo = UndoSystem::new(GestureQueue::new());
///
/// // During input handling:
/// undo.capture(scene.node_mut(id), false);
/// scene.node_mut(id).position = new_position;
///
/// // After the input cycle:
/// undo.finish_gesture(&mut scene);
/// ```
#[derive(Default)]
pub struct GestureQueue {
    queue: Vec<PendingCommit>,
}

impl GestureQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self { queue: Vec::new() }
    }

    /// Drains all queued commits, returning them in dispatch order.
    pub fn drain(&mut self) -> Vec<PendingCommit> {
        std::mem::take(&mut self.queue)
    }

    /// Returns `true` if no commit is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of commits waiting to be drained.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl GestureScheduler for GestureQueue {
    fn dispatch_on_gesture_finish(&mut self, commit: PendingCommit) {
        self.queue.push(commit);
    }
}

impl fmt::Debug for GestureQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureQueue")
            .field("pending", &self.queue.len())
            .finish()
    }
}
