//! Undo-aware model entities and the models that own them.
//!
//! This module defines the two seams between the undo engine and an object
//! model:
//!
//! - [`Entity`] — capability trait implemented once per concrete entity kind
//! - [`Editable`] — the model (scene, document, world) that resolves
//!   [handles](Editable::Handle) to entities
//!
//! The engine never owns entities. Snapshots, batches and the working set
//! only store handles, which are resolved through [`Editable::entity_mut`]
//! whenever the engine needs to touch an entity again.

use std::fmt;
use std::hash::Hash;

use crate::snapshot::{SnapshotBuilder, SnapshotReader, SnapshotResult};

/// Monotonic stamp shared by the undo system and the entities it captures.
pub type Version = u64;

/// An entity that can record and restore its own state.
///
/// Implementations serialize their fields into a [`SnapshotBuilder`] and read
/// them back from a [`SnapshotReader`] in exactly the same order. Value
/// fields go through the byte channel, edges to other entities through the
/// reference channel as handles.
///
/// # Object Safety
///
/// The trait is dyn-compatible so that a model can hand out
/// `&mut dyn Entity<H>` for every entity kind it stores.
///
/// # Example
///
/// ```
/// use redlilium_undo::{Entity, SnapshotBuilder, SnapshotReader, SnapshotResult, Version};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// struct LightId(u32);
///
/// struct Light {
///     id: LightId,
///     intensity: f32,
///     version: Version,
/// }
///
/// impl Entity<LightId> for Light {
///     fn handle(&self) -> LightId {
///         self.id
///     }
///
///     fn version(&self) -> Version {
///         self.version
///     }
///
///     fn set_version(&mut self, version: Version) {
///         self.version = version;
///     }
///
///     fn write_snapshot(&self, builder: &mut SnapshotBuilder<LightId>) {
///         builder.write(self.intensity);
///     }
///
///     fn read_snapshot(&mut self, reader: &mut SnapshotReader<'_, LightId>) -> SnapshotResult {
///         self.intensity = reader.read()?;
///         Ok(())
///     }
/// }
/// ```
pub trait Entity<H>: 'static {
    /// Identity of this entity inside its model.
    fn handle(&self) -> H;

    /// The version stamp last assigned by the undo system.
    fn version(&self) -> Version;

    /// Stores a new version stamp. Only the undo system calls this.
    fn set_version(&mut self, version: Version);

    /// Back-reference to the owning entity, if any.
    fn owner(&self) -> Option<H> {
        None
    }

    /// Reassigns the owner back-reference.
    ///
    /// Called by the restore pass for every reference read through
    /// [`SnapshotReader::read_owned_reference`] whose owner differs from the
    /// restoring entity. Entities without owners can ignore it.
    fn set_owner(&mut self, _owner: Option<H>) {}

    /// Serializes the current field state.
    fn write_snapshot(&self, builder: &mut SnapshotBuilder<H>);

    /// Overwrites the current field state from a snapshot written by
    /// [`write_snapshot`](Self::write_snapshot).
    fn read_snapshot(&mut self, reader: &mut SnapshotReader<'_, H>) -> SnapshotResult;

    /// Fixes up derived state once every entity of a batch has been restored.
    fn after_restore(&mut self) {}

    /// Reacts to a committed, undone or redone change (cache invalidation,
    /// dirty flags, ...).
    fn notify_changed(&mut self, _visual_only: bool) {}
}

/// An object model whose entities take part in undo.
///
/// Implement this on the type that owns the entities: a scene graph, a
/// document, an ECS world. The undo system only holds [`Self::Handle`]s
/// and asks the model to resolve them.
pub trait Editable: 'static {
    /// Identity-comparable reference to one entity of the model.
    type Handle: Copy + Eq + Hash + fmt::Debug + 'static;

    /// Resolves a handle for reading.
    fn entity(&self, handle: Self::Handle) -> Option<&dyn Entity<Self::Handle>>;

    /// Resolves a handle for writing.
    fn entity_mut(&mut self, handle: Self::Handle) -> Option<&mut dyn Entity<Self::Handle>>;

    /// Runs the post-restore fixup for one entity.
    ///
    /// The default forwards to [`Entity::after_restore`]. Override it when the
    /// fixup needs to look at sibling entities, which an entity cannot reach
    /// on its own.
    fn after_restore(&mut self, handle: Self::Handle) {
        if let Some(entity) = self.entity_mut(handle) {
            entity.after_restore();
        }
    }
}
