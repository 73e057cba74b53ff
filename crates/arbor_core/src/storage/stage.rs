//! # Staged Writers
//!
//! A [`Stage`] collects mutations against a shared `&World` without touching
//! committed data. Every table it writes to gets an overlay: a private
//! [`TableData`] with the table's column layout. [`World::merge`] folds the
//! overlays back into the committed tables at a safe point.
//!
//! ```text
//!   Table t3                         Stage s1
//!   main:    [e1, e2, e5]            overlay(t3): [e2*, e9]
//!                                    overlay(t7): [e5*]        (e5 moved)
//!
//!   Canonical view of t3:  [e1, e2, e5]
//!   s1 view of t3:         [e1] + [e2*, e9]
//! ```
//!
//! An entity written twice in one window keeps one slot per table; the slot
//! named by its latest record wins, older slots go stale and are skipped.

use std::collections::{HashMap, HashSet};
use std::fmt;

use bytemuck::Pod;

use super::component::Name;
use super::entity::{ComponentId, EntityId, Id};
use super::table::{copy_shared, Table, TableData, TableId};
use super::types::Type;
use super::world::{Location, World};
use crate::error::{ArborError, ArborResult};

/// Identifier of a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StageId(u32);

impl StageId {
    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Which view a read runs against.
///
/// Passed explicitly to every read; nothing is thread-local.
#[derive(Clone, Copy, Debug, Default)]
pub enum StageContext<'s> {
    /// Committed state only.
    #[default]
    Canonical,
    /// The stage's pending rows layered over committed state.
    Staged(&'s Stage),
}

impl<'s> StageContext<'s> {
    /// The stage behind a staged context.
    #[inline]
    #[must_use]
    pub fn stage(self) -> Option<&'s Stage> {
        match self {
            Self::Canonical => None,
            Self::Staged(stage) => Some(stage),
        }
    }

    /// True for a staged context.
    #[inline]
    #[must_use]
    pub fn is_staged(self) -> bool {
        matches!(self, Self::Staged(_))
    }
}

/// Where the stage last put an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StagedRecord {
    Row { table: TableId, row: usize },
    Deleted,
}

/// Pending mutations of one deferred writer.
pub struct Stage {
    id: StageId,
    overlays: HashMap<TableId, TableData>,
    overlay_order: Vec<TableId>,
    /// Tables for types the world had no table for when the stage needed them.
    tables: HashMap<TableId, Table>,
    table_order: Vec<TableId>,
    tables_by_type: HashMap<Type, TableId>,
    records: HashMap<EntityId, StagedRecord>,
    slots: HashMap<(TableId, EntityId), usize>,
    spawned: HashSet<EntityId>,
}

impl Stage {
    pub(crate) fn new(id: StageId) -> Self {
        Self {
            id,
            overlays: HashMap::new(),
            overlay_order: Vec::new(),
            tables: HashMap::new(),
            table_order: Vec::new(),
            tables_by_type: HashMap::new(),
            records: HashMap::new(),
            slots: HashMap::new(),
            spawned: HashSet::new(),
        }
    }

    /// Stage id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> StageId {
        self.id
    }

    /// True if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.tables.is_empty()
    }

    /// Number of tables with an overlay.
    #[must_use]
    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    /// Number of tables this stage created.
    #[must_use]
    pub fn created_table_count(&self) -> usize {
        self.tables.len()
    }

    /// Overlay of `table`, if this stage wrote to it.
    #[must_use]
    pub fn overlay(&self, table: TableId) -> Option<&TableData> {
        self.overlays.get(&table)
    }

    /// Table created by this stage and not merged yet.
    #[must_use]
    pub fn table(&self, table: TableId) -> Option<&Table> {
        self.tables.get(&table)
    }

    /// Overlays in creation order.
    pub fn overlays(&self) -> impl Iterator<Item = (TableId, &TableData)> + '_ {
        self.overlay_order
            .iter()
            .filter_map(|id| self.overlays.get(id).map(|data| (*id, data)))
    }

    /// Overlay of `table`, created on first use.
    ///
    /// Returns `None` if neither the world nor this stage knows the table.
    pub fn staged_write(&mut self, world: &World, table: TableId) -> Option<&mut TableData> {
        let table = world
            .table(StageContext::Canonical, table)
            .or_else(|| self.tables.get(&table))?;
        let id = table.id();
        Some(self.overlays.entry(id).or_insert_with(|| {
            tracing::trace!("Stage {} created overlay for table {}", self.id, id);
            self.overlay_order.push(id);
            table.new_data(world.config().initial_table_capacity)
        }))
    }

    // ------------------------------------------------------------------------
    // Reads used by the world and the hierarchy
    // ------------------------------------------------------------------------

    pub(crate) fn record(&self, entity: EntityId) -> Option<StagedRecord> {
        self.records.get(&entity).copied()
    }

    /// True if overlay slot `row` of `table` is the entity's current row.
    pub(crate) fn is_live_slot(&self, table: TableId, row: usize, entity: EntityId) -> bool {
        self.records.get(&entity) == Some(&StagedRecord::Row { table, row })
    }

    /// True if the stage has its own version of the entity, so its committed
    /// row is hidden from staged reads.
    pub(crate) fn shadows(&self, entity: EntityId) -> bool {
        self.records.contains_key(&entity)
    }

    pub(crate) fn was_spawned(&self, entity: EntityId) -> bool {
        self.spawned.contains(&entity)
    }

    pub(crate) fn deleted(&self) -> Vec<EntityId> {
        self.records
            .iter()
            .filter(|(_, record)| **record == StagedRecord::Deleted)
            .map(|(entity, _)| *entity)
            .collect()
    }

    pub(crate) fn take_tables(&mut self) -> Vec<Table> {
        self.tables_by_type.clear();
        let mut tables = std::mem::take(&mut self.tables);
        std::mem::take(&mut self.table_order)
            .into_iter()
            .filter_map(|id| tables.remove(&id))
            .collect()
    }

    pub(crate) fn take_overlays(&mut self) -> Vec<(TableId, TableData)> {
        let mut overlays = std::mem::take(&mut self.overlays);
        std::mem::take(&mut self.overlay_order)
            .into_iter()
            .filter_map(|id| overlays.remove(&id).map(|data| (id, data)))
            .collect()
    }

    /// Drops everything pending.
    pub fn clear(&mut self) {
        self.overlays.clear();
        self.overlay_order.clear();
        self.tables.clear();
        self.table_order.clear();
        self.tables_by_type.clear();
        self.records.clear();
        self.slots.clear();
        self.spawned.clear();
    }

    // ------------------------------------------------------------------------
    // Staged mutations
    // ------------------------------------------------------------------------

    /// Creates an entity with an empty type.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::UnknownTable`] if the world lost its empty table.
    pub fn spawn(&mut self, world: &World) -> ArborResult<EntityId> {
        let entity = world.alloc_entity();
        self.stage_row(world, entity, None, Type::default())?;
        self.spawned.insert(entity);
        Ok(entity)
    }

    /// Creates a named entity, optionally under `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::EntityNotFound`] if `parent` is not alive in this
    /// stage's view.
    pub fn spawn_named(
        &mut self,
        world: &World,
        name: &str,
        parent: Option<EntityId>,
    ) -> ArborResult<EntityId> {
        let parent = parent.unwrap_or(EntityId::NULL);
        self.check_parent(world, parent)?;
        let entity = world.alloc_entity();
        let ty = Type::new([Id::from(ComponentId::NAME)]).with_parent(parent);
        self.stage_row(world, entity, None, ty)?;
        self.spawned.insert(entity);
        self.write(world, entity, ComponentId::NAME, bytemuck::bytes_of(&world.names().intern(name)))?;
        Ok(entity)
    }

    /// Sets a component value, adding the component if needed.
    ///
    /// # Errors
    ///
    /// Fails if the entity is not alive in this stage's view, or if `T` does
    /// not match the component's registered layout.
    pub fn set_component<T: Pod>(
        &mut self,
        world: &World,
        entity: EntityId,
        component: ComponentId,
        value: T,
    ) -> ArborResult<()> {
        let layout = world.check_layout::<T>(component)?;
        let from = self.locate(world, entity)?;
        let ty = self.type_at(world, from.table)?.with(Id::component(component));
        self.stage_row(world, entity, Some(from), ty)?;
        if !layout.is_zero_sized() {
            self.write(world, entity, component, bytemuck::bytes_of(&value))?;
        }
        Ok(())
    }

    /// Adds a component (zeroed) or a child-of pair.
    ///
    /// # Errors
    ///
    /// Fails if the entity, or the parent of a pair, is not alive in this
    /// stage's view, or if the component is not registered.
    pub fn add_id(&mut self, world: &World, entity: EntityId, id: Id) -> ArborResult<()> {
        if let Some(parent) = id.parent() {
            return self.set_parent(world, entity, parent);
        }
        if let Some(component) = id.as_component() {
            world.check_registered(component)?;
        }
        let from = self.locate(world, entity)?;
        let ty = self.type_at(world, from.table)?;
        if ty.contains(id) {
            return Ok(());
        }
        let ty = ty.with(id);
        self.stage_row(world, entity, Some(from), ty)?;
        Ok(())
    }

    /// Removes a component or a child-of pair.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::EntityNotFound`] if the entity is not alive in
    /// this stage's view.
    pub fn remove_id(&mut self, world: &World, entity: EntityId, id: Id) -> ArborResult<()> {
        let from = self.locate(world, entity)?;
        let ty = self.type_at(world, from.table)?;
        if !ty.contains(id) {
            return Ok(());
        }
        let ty = ty.without(id);
        self.stage_row(world, entity, Some(from), ty)?;
        Ok(())
    }

    /// Names an entity.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::EntityNotFound`] if the entity is not alive in
    /// this stage's view.
    pub fn set_name(&mut self, world: &World, entity: EntityId, name: &str) -> ArborResult<()> {
        let symbol: Name = world.names().intern(name);
        self.set_component(world, entity, ComponentId::NAME, symbol)
    }

    /// Moves an entity under `parent`; null detaches it.
    ///
    /// # Errors
    ///
    /// Fails if either entity is not alive in this stage's view, or with
    /// [`ArborError::CycleDetected`] if `parent == entity`.
    pub fn set_parent(&mut self, world: &World, entity: EntityId, parent: EntityId) -> ArborResult<()> {
        if parent == entity {
            return Err(ArborError::CycleDetected(entity));
        }
        self.check_parent(world, parent)?;
        let from = self.locate(world, entity)?;
        let ty = self.type_at(world, from.table)?;
        if ty.parent() == parent {
            return Ok(());
        }
        let ty = ty.with_parent(parent);
        self.stage_row(world, entity, Some(from), ty)?;
        Ok(())
    }

    /// Deletes an entity when the stage is merged. Staged reads no longer see
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::EntityNotFound`] if the entity is not alive in
    /// this stage's view.
    pub fn delete(&mut self, world: &World, entity: EntityId) -> ArborResult<()> {
        self.locate(world, entity)?;
        self.records.insert(entity, StagedRecord::Deleted);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn locate(&self, world: &World, entity: EntityId) -> ArborResult<Location> {
        world
            .locate(StageContext::Staged(self), entity)
            .ok_or(ArborError::EntityNotFound(entity))
    }

    fn check_parent(&self, world: &World, parent: EntityId) -> ArborResult<()> {
        if parent.is_null() || world.is_alive(StageContext::Staged(self), parent) {
            Ok(())
        } else {
            Err(ArborError::EntityNotFound(parent))
        }
    }

    fn type_at(&self, world: &World, table: TableId) -> ArborResult<Type> {
        world
            .table(StageContext::Staged(self), table)
            .map(|table| table.ty().clone())
            .ok_or(ArborError::UnknownTable(table))
    }

    /// Table for `ty`: the world's, one this stage created, or a new shell.
    fn table_for(&mut self, world: &World, ty: Type) -> ArborResult<TableId> {
        if let Some(id) = world.find_table(&ty) {
            return Ok(id);
        }
        if let Some(id) = self.tables_by_type.get(&ty) {
            return Ok(*id);
        }
        let id = world.alloc_table_id();
        let table = Table::new(id, ty.clone(), world.components(), 0)?;
        tracing::debug!("Stage {} created table {} for {:?}", self.id, id, ty);
        self.tables.insert(id, table);
        self.table_order.push(id);
        self.tables_by_type.insert(ty, id);
        Ok(id)
    }

    /// The entity's slot in the overlay of `table`, appended on first use.
    fn slot(&mut self, world: &World, table: TableId, entity: EntityId) -> ArborResult<usize> {
        if let Some(row) = self.slots.get(&(table, entity)) {
            return Ok(*row);
        }
        let row = self
            .staged_write(world, table)
            .ok_or(ArborError::UnknownTable(table))?
            .append(entity);
        self.slots.insert((table, entity), row);
        Ok(row)
    }

    /// Writes the entity's current components into its slot for `ty` and
    /// makes that slot its record.
    fn stage_row(
        &mut self,
        world: &World,
        entity: EntityId,
        from: Option<Location>,
        ty: Type,
    ) -> ArborResult<()> {
        let table = self.table_for(world, ty)?;
        let reused = self.slots.contains_key(&(table, entity));
        let row = self.slot(world, table, entity)?;

        let in_place = from.is_some_and(|from| from.staged && from.table == table);
        if !in_place {
            // Taken out so the source overlay can be borrowed alongside it.
            let mut dst = self
                .overlays
                .remove(&table)
                .ok_or(ArborError::UnknownTable(table))?;
            if reused {
                dst.zero_row(row);
            }
            if let Some(from) = from {
                self.copy_into(world, from, table, &mut dst, row);
            }
            self.overlays.insert(table, dst);
        }

        self.records.insert(entity, StagedRecord::Row { table, row });
        Ok(())
    }

    fn copy_into(&self, world: &World, from: Location, table: TableId, dst: &mut TableData, row: usize) {
        let ctx = StageContext::Staged(self);
        let (Some(src_table), Some(dst_table)) = (world.table(ctx, from.table), world.table(ctx, table))
        else {
            return;
        };
        let src = if from.staged {
            self.overlays.get(&from.table)
        } else {
            Some(src_table.main())
        };
        if let Some(src) = src {
            copy_shared(src_table.column_ids(), src, from.row, dst_table.column_ids(), dst, row);
        }
    }

    /// Overwrites one component of the entity's staged row.
    fn write(&mut self, world: &World, entity: EntityId, component: ComponentId, bytes: &[u8]) -> ArborResult<()> {
        let Some(StagedRecord::Row { table, row }) = self.record(entity) else {
            return Err(ArborError::EntityNotFound(entity));
        };
        let column = world
            .table(StageContext::Staged(self), table)
            .and_then(|t| t.column_index(component))
            .ok_or(ArborError::UnknownComponent(component))?;
        let slot = self
            .overlays
            .get_mut(&table)
            .and_then(|data| data.column_mut(column))
            .ok_or(ArborError::UnknownTable(table))?
            .get_mut(row);
        slot.copy_from_slice(bytes);
        Ok(())
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("id", &self.id)
            .field("overlays", &self.overlays.len())
            .field("tables", &self.tables.len())
            .field("records", &self.records.len())
            .finish()
    }
}
