//! Atomic groups of snapshots.
//!
//! A [`Batch`] holds every snapshot captured during one gesture. Restoring it
//! is what undo and redo do; the restored batch comes back holding the
//! inverse snapshots, ready for the opposite stack.

use std::fmt;

use crate::entity::{Editable, Version};
use crate::snapshot::{Snapshot, SnapshotBuilder};

/// An ordered, reversible set of snapshots produced by one gesture.
pub struct Batch<H> {
    snapshots: Vec<Snapshot<H>>,
    visual_only: bool,
}

impl<H: Copy + Eq + fmt::Debug + 'static> Batch<H> {
    /// Wraps the snapshots of a finished gesture.
    pub fn new(snapshots: Vec<Snapshot<H>>, visual_only: bool) -> Self {
        Self {
            snapshots,
            visual_only,
        }
    }

    /// Whether every capture of the gesture was visual-only.
    pub fn is_visual_only(&self) -> bool {
        self.visual_only
    }

    /// Number of snapshots, one per captured entity.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns `true` if no snapshot survived (e.g. every target was removed).
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Returns `true` if the batch holds a snapshot of `target`.
    ///
    /// Compares handles only, never snapshot contents.
    pub fn contains(&self, target: H) -> bool {
        self.snapshots.iter().any(|s| s.target() == target)
    }

    /// Handles of the captured entities, in capture order.
    pub fn targets(&self) -> impl Iterator<Item = H> + '_ {
        self.snapshots.iter().map(Snapshot::target)
    }

    /// The snapshots in capture order.
    pub fn snapshots(&self) -> &[Snapshot<H>] {
        &self.snapshots
    }

    /// Restores every snapshot onto `model` and returns the inverse batch.
    ///
    /// Runs in capture order:
    ///
    /// 1. **swap**: capture each entity's current state as the inverse, read
    ///    the stored snapshot back and stamp `version`
    /// 2. **ownership**: point every owned reference read during the swap
    ///    back at its restoring entity. This waits for the whole swap so
    ///    that a child later in the batch is captured with its old owner.
    /// 3. **fixup**: [`Editable::after_restore`] for every entity, once all
    ///    raw state is back in place
    /// 4. **notify**: [`Entity::notify_changed`](crate::Entity::notify_changed)
    ///    with the batch's visual-only flag
    ///
    /// Snapshots whose target no longer resolves in `model` are dropped from
    /// the returned batch.
    ///
    /// # Panics
    ///
    /// Panics if an entity's [`read_snapshot`](crate::Entity::read_snapshot)
    /// fails. A failed read means the entity's read and write sides disagree,
    /// and carrying on would leave the model half-restored.
    pub fn restore<M>(
        self,
        model: &mut M,
        builder: &mut SnapshotBuilder<H>,
        version: Version,
    ) -> Self
    where
        M: Editable<Handle = H>,
    {
        let visual_only = self.visual_only;
        let mut inverses = Vec::with_capacity(self.snapshots.len());
        // (child, owner) pairs, applied once every inverse has been taken.
        let mut ownership = Vec::new();

        for snapshot in self.snapshots {
            let target = snapshot.target();
            let Some(entity) = model.entity_mut(target) else {
                log::warn!("Dropping snapshot of {target:?}: entity no longer exists");
                continue;
            };
            let (inverse, owned) = match snapshot.restore(entity, builder, version) {
                Ok(restored) => restored,
                Err(e) => panic!("snapshot contract violated while restoring {target:?}: {e}"),
            };
            ownership.extend(owned.into_iter().map(|child| (child, target)));
            inverses.push(inverse);
        }

        for (child, owner) in ownership {
            match model.entity_mut(child) {
                Some(child) if child.owner() != Some(owner) => child.set_owner(Some(owner)),
                Some(_) => {}
                None => log::warn!("Owned reference {child:?} of {owner:?} no longer exists"),
            }
        }

        for inverse in &inverses {
            model.after_restore(inverse.target());
        }

        for inverse in &inverses {
            if let Some(entity) = model.entity_mut(inverse.target()) {
                entity.notify_changed(visual_only);
            }
        }

        Self {
            snapshots: inverses,
            visual_only,
        }
    }
}

impl<H: fmt::Debug> fmt::Debug for Batch<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("len", &self.snapshots.len())
            .field("visual_only", &self.visual_only)
            .finish()
    }
}
