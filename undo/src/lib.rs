//! # RedLilium Undo
//!
//! Snapshot-based undo/redo for mutable object models.
//!
//! Instead of recording one reversible command per edit, model code calls
//! [`UndoSystem::capture`] right before it mutates an entity. The undo
//! system stores a [`Snapshot`] of the entity's pre-change state, once per
//! entity per gesture, and commits all snapshots of a gesture as one
//! [`Batch`] when the host's [`GestureScheduler`] reports that the user
//! interaction has finished. Undoing a batch swaps every entity back to its
//! snapshot and keeps the overwritten state as the redo batch.
//!
//! - [`Entity`] — capability trait for entities that snapshot themselves
//! - [`Editable`] — the model that resolves entity handles
//! - [`Snapshot`] / [`SnapshotBuilder`] / [`SnapshotReader`] — two-channel
//!   (bytes + handles) state capture
//! - [`Batch`] — the snapshots of one gesture and the restore algorithm
//! - [`GestureScheduler`] / [`GestureQueue`] — deferred gesture commits
//! - [`UndoSystem`] — versioning, dedup, undo/redo stacks
//!
//! # Visual-only changes
//!
//! Captures flagged `visual_only` (dragging, resizing) mark their gesture as
//! visual-only if every capture in it was. A visual-only capture of an entity
//! that the most recent undo step already holds is folded into that step, so
//! a drag that continues a just-committed edit does not produce an extra
//! undo entry. Visual-only steps do not affect
//! [`UndoSystem::has_unsaved_changes`].

mod batch;
mod config;
mod entity;
mod scheduler;
mod snapshot;
mod system;


pub use batch::Batch;
pub use config::{ConfigError, DEFAULT_MAX_UNDO, UndoConfig};
pub use entity::{Editable, Entity, Version};
pub use scheduler::{GestureQueue, GestureScheduler, PendingCommit};
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotError, SnapshotReader, SnapshotResult};
pub use system::UndoSystem;
