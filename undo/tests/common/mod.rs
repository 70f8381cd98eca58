//! Document model shared by the integration tests.
//!
//! Two entity kinds live in one arena: shapes (value fields only) and groups
//! (which own shapes through the reference channel). Group bounds are
//! derived from member shapes and rebuilt in the model-level
//! `after_restore`, which needs sibling access.

#![allow(dead_code)]

use redlilium_undo::{
    Editable, Entity, GestureQueue, GestureScheduler, SnapshotBuilder, SnapshotReader,
    SnapshotResult, UndoSystem, Version,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(pub u32);

#[derive(Debug, Default)]
pub struct Shape {
    pub id: u32,
    pub position: [f32; 2],
    pub size: [f32; 2],
    pub color: u32,
    pub label: String,
    pub owner: Option<ItemId>,
    pub version: Version,
    pub changes: Vec<bool>,
}

impl Entity<ItemId> for Shape {
    fn handle(&self) -> ItemId {
        ItemId(self.id)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn owner(&self) -> Option<ItemId> {
        self.owner
    }

    fn set_owner(&mut self, owner: Option<ItemId>) {
        self.owner = owner;
    }

    fn write_snapshot(&self, builder: &mut SnapshotBuilder<ItemId>) {
        builder.write(self.position);
        builder.write(self.size);
        builder.write(self.color);
        builder.write_str(&self.label);
        builder.write_optional_reference(self.owner);
    }

    fn read_snapshot(&mut self, reader: &mut SnapshotReader<'_, ItemId>) -> SnapshotResult {
        self.position = reader.read()?;
        self.size = reader.read()?;
        self.color = reader.read()?;
        self.label = reader.read_str()?.to_owned();
        self.owner = reader.read_optional_reference()?;
        Ok(())
    }

    fn notify_changed(&mut self, visual_only: bool) {
        self.changes.push(visual_only);
    }
}

#[derive(Debug, Default)]
pub struct Group {
    pub id: u32,
    pub name: String,
    pub members: Vec<ItemId>,
    /// `[min_x, min_y, max_x, max_y]`, derived from members.
    pub bounds: [f32; 4],
    pub version: Version,
    pub after_restore_calls: u32,
    pub changes: Vec<bool>,
}

impl Entity<ItemId> for Group {
    fn handle(&self) -> ItemId {
        ItemId(self.id)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn write_snapshot(&self, builder: &mut SnapshotBuilder<ItemId>) {
        builder.write_str(&self.name);
        builder.write(self.members.len() as u32);
        for &member in &self.members {
            builder.write_reference(member);
        }
    }

    fn read_snapshot(&mut self, reader: &mut SnapshotReader<'_, ItemId>) -> SnapshotResult {
        self.name = reader.read_str()?.to_owned();
        let count: u32 = reader.read()?;
        self.members.clear();
        for _ in 0..count {
            self.members.push(reader.read_owned_reference()?);
        }
        Ok(())
    }

    fn after_restore(&mut self) {
        self.after_restore_calls += 1;
    }

    fn notify_changed(&mut self, visual_only: bool) {
        self.changes.push(visual_only);
    }
}

#[derive(Debug)]
pub enum Item {
    Shape(Shape),
    Group(Group),
}

#[derive(Debug, Default)]
pub struct Document {
    items: Vec<Option<Item>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_shape(&mut self, label: &str, position: [f32; 2], size: [f32; 2]) -> ItemId {
        let id = self.items.len() as u32;
        self.items.push(Some(Item::Shape(Shape {
            id,
            position,
            size,
            label: label.to_owned(),
            ..Shape::default()
        })));
        ItemId(id)
    }

    pub fn add_group(&mut self, name: &str) -> ItemId {
        let id = self.items.len() as u32;
        self.items.push(Some(Item::Group(Group {
            id,
            name: name.to_owned(),
            ..Group::default()
        })));
        ItemId(id)
    }

    /// Deletes an item without recording it; its slot stays empty.
    pub fn remove(&mut self, id: ItemId) {
        self.items[id.0 as usize] = None;
    }

    pub fn shape(&self, id: ItemId) -> &Shape {
        match &self.items[id.0 as usize] {
            Some(Item::Shape(shape)) => shape,
            _ => panic!("{id:?} is not a shape"),
        }
    }

    pub fn shape_mut(&mut self, id: ItemId) -> &mut Shape {
        match &mut self.items[id.0 as usize] {
            Some(Item::Shape(shape)) => shape,
            _ => panic!("{id:?} is not a shape"),
        }
    }

    pub fn group(&self, id: ItemId) -> &Group {
        match &self.items[id.0 as usize] {
            Some(Item::Group(group)) => group,
            _ => panic!("{id:?} is not a group"),
        }
    }

    pub fn group_mut(&mut self, id: ItemId) -> &mut Group {
        match &mut self.items[id.0 as usize] {
            Some(Item::Group(group)) => group,
            _ => panic!("{id:?} is not a group"),
        }
    }

    pub fn move_shape<S: GestureScheduler>(
        &mut self,
        undo: &mut UndoSystem<Document, S>,
        id: ItemId,
        position: [f32; 2],
        visual_only: bool,
    ) {
        undo.capture(self.shape_mut(id), visual_only);
        self.shape_mut(id).position = position;
        if let Some(group) = self.shape(id).owner {
            self.refresh_bounds(group);
        }
    }

    pub fn recolor<S: GestureScheduler>(
        &mut self,
        undo: &mut UndoSystem<Document, S>,
        id: ItemId,
        color: u32,
    ) {
        undo.capture(self.shape_mut(id), false);
        self.shape_mut(id).color = color;
    }

    pub fn rename_group<S: GestureScheduler>(
        &mut self,
        undo: &mut UndoSystem<Document, S>,
        id: ItemId,
        name: &str,
    ) {
        undo.capture(self.group_mut(id), false);
        self.group_mut(id).name = name.to_owned();
    }

    /// Moves `shape` into `group`, out of whichever group held it before.
    pub fn add_to_group<S: GestureScheduler>(
        &mut self,
        undo: &mut UndoSystem<Document, S>,
        shape: ItemId,
        group: ItemId,
    ) {
        if let Some(old) = self.shape(shape).owner {
            undo.capture(self.group_mut(old), false);
            self.group_mut(old).members.retain(|&m| m != shape);
            self.refresh_bounds(old);
        }
        undo.capture(self.group_mut(group), false);
        undo.capture(self.shape_mut(shape), false);
        self.group_mut(group).members.push(shape);
        self.shape_mut(shape).owner = Some(group);
        self.refresh_bounds(group);
    }

    pub fn refresh_bounds(&mut self, group: ItemId) {
        let mut bounds = [f32::MAX, f32::MAX, f32::MIN, f32::MIN];
        let members = self.group(group).members.clone();
        if members.is_empty() {
            bounds = [0.0; 4];
        }
        for member in members {
            let shape = self.shape(member);
            bounds[0] = bounds[0].min(shape.position[0]);
            bounds[1] = bounds[1].min(shape.position[1]);
            bounds[2] = bounds[2].max(shape.position[0] + shape.size[0]);
            bounds[3] = bounds[3].max(shape.position[1] + shape.size[1]);
        }
        self.group_mut(group).bounds = bounds;
    }

    /// Current state of `id` in snapshot form, for byte-exact comparisons.
    pub fn state_of(&self, id: ItemId) -> (Vec<u8>, Vec<ItemId>) {
        let mut builder = SnapshotBuilder::new();
        let snapshot = builder.snapshot_of(self.entity(id).expect("item exists"));
        (snapshot.payload().to_vec(), snapshot.references().to_vec())
    }
}

impl Editable for Document {
    type Handle = ItemId;

    fn entity(&self, handle: ItemId) -> Option<&dyn Entity<ItemId>> {
        match self.items.get(handle.0 as usize)?.as_ref()? {
            Item::Shape(shape) => Some(shape as &dyn Entity<ItemId>),
            Item::Group(group) => Some(group as &dyn Entity<ItemId>),
        }
    }

    fn entity_mut(&mut self, handle: ItemId) -> Option<&mut dyn Entity<ItemId>> {
        match self.items.get_mut(handle.0 as usize)?.as_mut()? {
            Item::Shape(shape) => Some(shape as &mut dyn Entity<ItemId>),
            Item::Group(group) => Some(group as &mut dyn Entity<ItemId>),
        }
    }

    fn after_restore(&mut self, handle: ItemId) {
        if let Some(Some(Item::Group(group))) = self.items.get_mut(handle.0 as usize) {
            group.after_restore();
            self.refresh_bounds(handle);
        }
    }
}

pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

pub fn undo_system() -> UndoSystem<Document, GestureQueue> {
    init_logging();
    UndoSystem::new(GestureQueue::new())
}
