//! Two-channel entity snapshots.
//!
//! A [`Snapshot`] is the immutable pre-change state of one entity. It keeps
//! value fields and graph edges apart:
//!
//! - the **payload** — raw bytes for `Pod` fields, written sequentially
//! - the **references** — an ordered list of handles to other entities
//!
//! Entities fill a [`SnapshotBuilder`] in [`Entity::write_snapshot`] and
//! replay the same sequence from a [`SnapshotReader`] in
//! [`Entity::read_snapshot`]. The format never leaves memory, so there is no
//! versioning or endianness handling.
//!
//! # Field order contract
//!
//! Nothing is tagged; reads must mirror writes exactly. The reader rejects
//! reads past either channel, and [`SnapshotReader::finish`] rejects
//! snapshots with unread data, so an out-of-sync entity fails loudly on its
//! first restore instead of silently corrupting history.

use std::fmt;

use bytemuck::{NoUninit, Pod};
use thiserror::Error;

use crate::entity::{Entity, Version};

/// Contract violations detected while reading a snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("payload exhausted: {needed} bytes requested at offset {offset}, {available} left")]
    PayloadExhausted {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("reference requested but the snapshot holds none")]
    NoReferences,
    #[error("reference #{index} requested but only {count} were written")]
    ReferencesExhausted { index: usize, count: usize },
    #[error("invalid bool byte {0:#04x}")]
    InvalidBool(u8),
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    #[error("{bytes} payload bytes and {references} references left unread")]
    TrailingData { bytes: usize, references: usize },
}

/// Result type for snapshot reads.
pub type SnapshotResult<T = ()> = Result<T, SnapshotError>;

/// Immutable capture of one entity's state.
///
/// Snapshots are identified by their [`target`](Self::target) handle; two
/// snapshots of the same entity are "the same" for containment checks no
/// matter what they hold.
pub struct Snapshot<H> {
    target: H,
    references: Option<Box<[H]>>,
    payload: Option<Box<[u8]>>,
}

impl<H: Copy + 'static> Snapshot<H> {
    /// The entity this snapshot restores.
    pub fn target(&self) -> H {
        self.target
    }

    /// The byte channel. Empty if nothing was written.
    pub fn payload(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or(&[])
    }

    /// The reference channel. Empty if nothing was written.
    pub fn references(&self) -> &[H] {
        self.references.as_deref().unwrap_or(&[])
    }

    /// Returns a reader positioned at the start of both channels.
    pub fn reader(&self) -> SnapshotReader<'_, H> {
        SnapshotReader::new(self.payload(), self.references())
    }

    /// Writes this snapshot back onto `entity`, consuming it.
    ///
    /// The entity's current state is captured first (with `builder`) and
    /// returned as the inverse snapshot, followed by the handles the entity
    /// read through [`SnapshotReader::read_owned_reference`]. On success the
    /// entity is stamped with `version`.
    pub fn restore(
        self,
        entity: &mut dyn Entity<H>,
        builder: &mut SnapshotBuilder<H>,
        version: Version,
    ) -> SnapshotResult<(Snapshot<H>, Vec<H>)> {
        let inverse = builder.snapshot_of(entity);
        let mut reader = self.reader();
        entity.read_snapshot(&mut reader)?;
        let owned = reader.finish()?;
        entity.set_version(version);
        Ok((inverse, owned))
    }
}

impl<H: fmt::Debug> fmt::Debug for Snapshot<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("target", &self.target)
            .field("payload_len", &self.payload.as_ref().map_or(0, |p| p.len()))
            .field("references", &self.references)
            .finish()
    }
}

/// Write cursor for building [`Snapshot`]s.
///
/// The buffer and reference list are reused across builds: [`build`]
/// copies out only what was written and clears both, keeping their
/// capacity for the next entity.
///
/// [`build`]: Self::build
pub struct SnapshotBuilder<H> {
    buffer: Vec<u8>,
    references: Vec<H>,
}

impl<H: Copy + 'static> SnapshotBuilder<H> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a builder with room for `bytes` payload bytes.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(bytes),
            references: Vec::new(),
        }
    }

    /// Appends a plain-old-data value to the payload.
    pub fn write<T: NoUninit>(&mut self, value: T) {
        self.buffer.extend_from_slice(bytemuck::bytes_of(&value));
    }

    /// Appends a bool as a single byte.
    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(value as u8);
    }

    /// Appends a length-prefixed byte string.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write(bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);
    }

    /// Appends a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Appends one handle to the reference channel.
    pub fn write_reference(&mut self, reference: H) {
        self.references.push(reference);
    }

    /// Appends a run of handles; the count goes into the payload.
    pub fn write_references(&mut self, references: &[H]) {
        self.write(references.len() as u64);
        self.references.extend_from_slice(references);
    }

    /// Appends an optional handle; presence goes into the payload.
    pub fn write_optional_reference(&mut self, reference: Option<H>) {
        self.write_bool(reference.is_some());
        if let Some(reference) = reference {
            self.write_reference(reference);
        }
    }

    /// Number of payload bytes written since the last build.
    pub fn written_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of references written since the last build.
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Freezes everything written so far into a snapshot of `target` and
    /// resets the builder.
    pub fn build(&mut self, target: H) -> Snapshot<H> {
        let payload = (!self.buffer.is_empty()).then(|| Box::<[u8]>::from(&self.buffer[..]));
        let references =
            (!self.references.is_empty()).then(|| Box::<[H]>::from(&self.references[..]));
        self.reset();
        Snapshot {
            target,
            references,
            payload,
        }
    }

    /// Discards anything written since the last build.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.references.clear();
    }

    /// Captures the current state of `entity`.
    pub fn snapshot_of(&mut self, entity: &dyn Entity<H>) -> Snapshot<H> {
        self.reset();
        entity.write_snapshot(self);
        self.build(entity.handle())
    }
}

impl<H: Copy + 'static> Default for SnapshotBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for SnapshotBuilder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotBuilder")
            .field("written", &self.buffer.len())
            .field("capacity", &self.buffer.capacity())
            .field("references", &self.references.len())
            .finish()
    }
}

/// Read cursor over a [`Snapshot`].
#[derive(Debug)]
pub struct SnapshotReader<'a, H> {
    payload: &'a [u8],
    position: usize,
    references: &'a [H],
    next_reference: usize,
    owned: Vec<H>,
}

impl<'a, H: Copy> SnapshotReader<'a, H> {
    /// Creates a reader over raw channels.
    pub fn new(payload: &'a [u8], references: &'a [H]) -> Self {
        Self {
            payload,
            position: 0,
            references,
            next_reference: 0,
            owned: Vec::new(),
        }
    }

    fn take(&mut self, len: usize) -> SnapshotResult<&'a [u8]> {
        let available = self.payload.len() - self.position;
        if len > available {
            return Err(SnapshotError::PayloadExhausted {
                offset: self.position,
                needed: len,
                available,
            });
        }
        let payload = self.payload;
        let bytes = &payload[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    /// Reads a plain-old-data value written by [`SnapshotBuilder::write`].
    pub fn read<T: Pod>(&mut self) -> SnapshotResult<T> {
        let bytes = self.take(std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Reads a bool written by [`SnapshotBuilder::write_bool`].
    pub fn read_bool(&mut self) -> SnapshotResult<bool> {
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SnapshotError::InvalidBool(other)),
        }
    }

    /// Reads a length-prefixed byte string, borrowing from the snapshot.
    pub fn read_bytes(&mut self) -> SnapshotResult<&'a [u8]> {
        let len = self.read::<u64>()?;
        self.take(usize::try_from(len).unwrap_or(usize::MAX))
    }

    /// Reads a length-prefixed UTF-8 string, borrowing from the snapshot.
    pub fn read_str(&mut self) -> SnapshotResult<&'a str> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes).map_err(|_| SnapshotError::InvalidUtf8)
    }

    /// Reads the next handle from the reference channel.
    ///
    /// Fails with [`SnapshotError::NoReferences`] if the snapshot was built
    /// without any references, which always means the entity's read and
    /// write sides disagree.
    pub fn read_reference(&mut self) -> SnapshotResult<H> {
        if self.references.is_empty() {
            return Err(SnapshotError::NoReferences);
        }
        let reference = self.references.get(self.next_reference).copied().ok_or(
            SnapshotError::ReferencesExhausted {
                index: self.next_reference,
                count: self.references.len(),
            },
        )?;
        self.next_reference += 1;
        Ok(reference)
    }

    /// Reads a run written by [`SnapshotBuilder::write_references`].
    pub fn read_references(&mut self) -> SnapshotResult<Vec<H>> {
        let count = self.read::<u64>()?;
        (0..count).map(|_| self.read_reference()).collect()
    }

    /// Reads a handle written by [`SnapshotBuilder::write_optional_reference`].
    pub fn read_optional_reference(&mut self) -> SnapshotResult<Option<H>> {
        if self.read_bool()? {
            self.read_reference().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Reads a handle to an entity owned by the one being restored.
    ///
    /// After the restoring entity finishes reading, the restore pass points
    /// the owner back-reference of every such handle at the restoring
    /// entity (if it currently points elsewhere). Moving a child between
    /// two containers therefore undoes cleanly as long as both containers
    /// are in the batch.
    pub fn read_owned_reference(&mut self) -> SnapshotResult<H> {
        let reference = self.read_reference()?;
        self.owned.push(reference);
        Ok(reference)
    }

    /// Payload bytes not read yet.
    pub fn remaining_bytes(&self) -> usize {
        self.payload.len() - self.position
    }

    /// References not read yet.
    pub fn remaining_references(&self) -> usize {
        self.references.len() - self.next_reference
    }

    /// Checks that both channels were consumed and returns the handles read
    /// through [`read_owned_reference`](Self::read_owned_reference).
    pub fn finish(self) -> SnapshotResult<Vec<H>> {
        let bytes = self.remaining_bytes();
        let references = self.remaining_references();
        if bytes != 0 || references != 0 {
            return Err(SnapshotError::TrailingData { bytes, references });
        }
        Ok(self.owned)
    }
}
