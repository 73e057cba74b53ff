//! # World
//!
//! Owns the committed tables, the entity index, the component registry, the
//! name interner and the hierarchy index.
//!
//! Canonical mutators take `&mut self` and apply immediately. Deferred
//! writers go through a [`Stage`] holding only `&World`; the pieces of shared
//! state they touch are the id counters (atomics) and the [`NameTable`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use bytemuck::Pod;

use super::component::{ComponentRegistry, Name, NameTable};
use super::entity::{ComponentId, EntityId, Id};
use super::stage::{Stage, StageContext, StageId, StagedRecord};
use super::table::{copy_shared, Table, TableArena, TableData, TableId};
use super::types::Type;
use crate::config::WorldConfig;
use crate::error::{ArborError, ArborResult};
use crate::hierarchy::HierarchyIndex;
use crate::memory::ElementLayout;

/// Committed position of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Record {
    pub(crate) table: TableId,
    pub(crate) row: usize,
}

/// Position of an entity in some view: a committed row, or an overlay slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Location {
    pub(crate) table: TableId,
    pub(crate) row: usize,
    pub(crate) staged: bool,
}

/// Entity storage.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new(WorldConfig::default());
/// let health = world.register_component::<f32>();
///
/// let unit = world.spawn_named("Unit", None)?;
/// world.set_component(unit, health, 100.0f32)?;
///
/// let mut stage = world.new_stage();
/// stage.set_component(&world, unit, health, 50.0f32)?;
/// world.merge(&mut stage);
/// ```
pub struct World {
    config: WorldConfig,
    components: ComponentRegistry,
    tables: TableArena,
    entities: HashMap<EntityId, Record>,
    hierarchy: HierarchyIndex,
    names: NameTable,
    empty_table: TableId,
    next_entity: AtomicU64,
    next_table: AtomicU32,
    next_stage: AtomicU32,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        let mut hierarchy = HierarchyIndex::new(config.index_capacity);
        let mut tables = TableArena::default();
        let empty_table = TableId::from_raw(0);
        tables.insert(Table::empty(empty_table, config.initial_table_capacity));
        hierarchy.register(EntityId::NULL, empty_table);

        Self {
            config,
            components: ComponentRegistry::new(),
            tables,
            entities: HashMap::new(),
            hierarchy,
            names: NameTable::new(),
            empty_table,
            next_entity: AtomicU64::new(1),
            next_table: AtomicU32::new(1),
            next_stage: AtomicU32::new(1),
        }
    }

    /// Configuration the world was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Component layouts.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Registers a component with the layout of `T`.
    pub fn register_component<T: Pod>(&mut self) -> ComponentId {
        self.components.register_type::<T>()
    }

    /// Registers a zero-sized tag.
    pub fn register_tag(&mut self) -> ComponentId {
        self.components.register_tag()
    }

    /// Name interner.
    #[inline]
    #[must_use]
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Parent to child-table index.
    #[inline]
    #[must_use]
    pub fn hierarchy(&self) -> &HierarchyIndex {
        &self.hierarchy
    }

    /// Parent to child-table index, mutably.
    #[inline]
    pub fn hierarchy_mut(&mut self) -> &mut HierarchyIndex {
        &mut self.hierarchy
    }

    /// Starts a new deferred writer.
    #[must_use]
    pub fn new_stage(&self) -> Stage {
        Stage::new(StageId::from_raw(self.next_stage.fetch_add(1, Ordering::Relaxed)))
    }

    /// Number of committed entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of committed tables.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Committed tables.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    /// `(allocated, used)` bytes across every committed table.
    #[must_use]
    pub fn memory(&self) -> (usize, usize) {
        self.tables
            .iter()
            .map(|table| table.main().memory())
            .fold((0, 0), |(a, u), (ta, tu)| (a + ta, u + tu))
    }

    /// Shrinks every committed table to its row count.
    pub fn reclaim(&mut self) {
        let (before, _) = self.memory();
        for table in self.tables.iter_mut() {
            table.main_mut().reclaim();
        }
        let (after, _) = self.memory();
        tracing::debug!("Reclaimed {} bytes across {} tables", before - after, self.tables.len());
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Table by handle. Staged contexts also see the stage's own tables.
    #[must_use]
    pub fn table<'a>(&'a self, ctx: StageContext<'a>, table: TableId) -> Option<&'a Table> {
        self.tables
            .get(table)
            .or_else(|| ctx.stage().and_then(|stage| stage.table(table)))
    }

    /// The data set reads of `table` go to: the stage's overlay if it has one,
    /// the committed data otherwise.
    #[must_use]
    pub fn staged_view<'a>(&'a self, ctx: StageContext<'a>, table: TableId) -> Option<&'a TableData> {
        if let Some(overlay) = ctx.stage().and_then(|stage| stage.overlay(table)) {
            return Some(overlay);
        }
        self.table(ctx, table).map(Table::main)
    }

    pub(crate) fn locate(&self, ctx: StageContext<'_>, entity: EntityId) -> Option<Location> {
        if let Some(stage) = ctx.stage() {
            match stage.record(entity) {
                Some(StagedRecord::Row { table, row }) => {
                    return Some(Location { table, row, staged: true });
                }
                Some(StagedRecord::Deleted) => return None,
                None => {}
            }
        }
        self.entities.get(&entity).map(|record| Location {
            table: record.table,
            row: record.row,
            staged: false,
        })
    }

    fn data_at<'a>(&'a self, ctx: StageContext<'a>, location: Location) -> Option<&'a TableData> {
        if location.staged {
            ctx.stage()?.overlay(location.table)
        } else {
            self.tables.get(location.table).map(Table::main)
        }
    }

    /// Checks if the entity exists in the view.
    #[must_use]
    pub fn is_alive(&self, ctx: StageContext<'_>, entity: EntityId) -> bool {
        self.locate(ctx, entity).is_some()
    }

    /// Type of the entity in the view.
    #[must_use]
    pub fn type_of<'a>(&'a self, ctx: StageContext<'a>, entity: EntityId) -> Option<&'a Type> {
        let location = self.locate(ctx, entity)?;
        self.table(ctx, location.table).map(Table::ty)
    }

    /// Checks if the entity has `id` in the view.
    #[must_use]
    pub fn has_id(&self, ctx: StageContext<'_>, entity: EntityId, id: Id) -> bool {
        self.type_of(ctx, entity).is_some_and(|ty| ty.contains(id))
    }

    /// Copy of a component value. `Ok(None)` if the entity lacks it.
    ///
    /// # Errors
    ///
    /// Fails if the entity is not alive in the view, or if `T` does not match
    /// the component's registered layout.
    pub fn get_component<T: Pod>(
        &self,
        ctx: StageContext<'_>,
        entity: EntityId,
        component: ComponentId,
    ) -> ArborResult<Option<T>> {
        let layout = self.check_layout::<T>(component)?;
        let location = self
            .locate(ctx, entity)
            .ok_or(ArborError::EntityNotFound(entity))?;
        let table = self
            .table(ctx, location.table)
            .ok_or(ArborError::UnknownTable(location.table))?;
        if layout.is_zero_sized() {
            return Ok(table.ty().has_component(component).then(<T as bytemuck::Zeroable>::zeroed));
        }
        let Some(column) = table.column_index(component) else {
            return Ok(None);
        };
        Ok(self
            .data_at(ctx, location)
            .and_then(|data| data.column(column))
            .and_then(|column| column.as_slice::<T>())
            .and_then(|values| values.get(location.row))
            .copied())
    }

    /// Name of the entity in the view.
    #[must_use]
    pub fn name(&self, ctx: StageContext<'_>, entity: EntityId) -> Option<Arc<str>> {
        let location = self.locate(ctx, entity)?;
        let table = self.table(ctx, location.table)?;
        let symbol = *table.names(self.data_at(ctx, location)?)?.get(location.row)?;
        self.names.resolve(symbol)
    }

    // ========================================================================
    // Shared with stages
    // ========================================================================

    pub(crate) fn alloc_entity(&self) -> EntityId {
        EntityId::from_raw(self.next_entity.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn alloc_table_id(&self) -> TableId {
        TableId::from_raw(self.next_table.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn find_table(&self, ty: &Type) -> Option<TableId> {
        self.tables.find(ty)
    }

    pub(crate) fn check_registered(&self, component: ComponentId) -> ArborResult<ElementLayout> {
        self.components
            .layout(component)
            .ok_or(ArborError::UnknownComponent(component))
    }

    pub(crate) fn check_layout<T: Pod>(&self, component: ComponentId) -> ArborResult<ElementLayout> {
        let registered = self.check_registered(component)?;
        let requested = ElementLayout::of::<T>();
        if registered == requested {
            Ok(registered)
        } else {
            Err(ArborError::ComponentMismatch {
                component,
                registered,
                requested,
            })
        }
    }

    // ========================================================================
    // Canonical mutations
    // ========================================================================

    /// Creates an entity with an empty type.
    pub fn spawn(&mut self) -> EntityId {
        let entity = self.alloc_entity();
        let appended = self.append(entity, self.empty_table);
        debug_assert!(appended.is_ok(), "empty table missing");
        entity
    }

    /// Creates a named entity, optionally under `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::EntityNotFound`] if `parent` is not alive.
    pub fn spawn_named(&mut self, name: &str, parent: Option<EntityId>) -> ArborResult<EntityId> {
        let parent = parent.unwrap_or(EntityId::NULL);
        self.check_parent(parent)?;
        let ty = Type::new([Id::from(ComponentId::NAME)]).with_parent(parent);
        let table = self.ensure_table(ty)?;
        let entity = self.alloc_entity();
        let record = self.append(entity, table)?;
        let symbol = self.names.intern(name);
        self.write(record, ComponentId::NAME, bytemuck::bytes_of(&symbol))?;
        Ok(entity)
    }

    /// Sets a component value, adding the component if needed.
    ///
    /// # Errors
    ///
    /// Fails if the entity is not alive, or if `T` does not match the
    /// component's registered layout.
    pub fn set_component<T: Pod>(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        value: T,
    ) -> ArborResult<()> {
        let layout = self.check_layout::<T>(component)?;
        let ty = self.committed_type(entity)?.with(Id::component(component));
        let record = self.move_entity(entity, ty)?;
        if !layout.is_zero_sized() {
            self.write(record, component, bytemuck::bytes_of(&value))?;
        }
        Ok(())
    }

    /// Adds a component (zeroed) or a child-of pair.
    ///
    /// # Errors
    ///
    /// Fails if the entity, or the parent of a pair, is not alive, or if the
    /// component is not registered.
    pub fn add_id(&mut self, entity: EntityId, id: Id) -> ArborResult<()> {
        if let Some(parent) = id.parent() {
            return self.set_parent(entity, parent);
        }
        if let Some(component) = id.as_component() {
            self.check_registered(component)?;
        }
        let ty = self.committed_type(entity)?.with(id);
        self.move_entity(entity, ty).map(drop)
    }

    /// Removes a component or a child-of pair.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::EntityNotFound`] if the entity is not alive.
    pub fn remove_id(&mut self, entity: EntityId, id: Id) -> ArborResult<()> {
        let ty = self.committed_type(entity)?.without(id);
        self.move_entity(entity, ty).map(drop)
    }

    /// Names an entity.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::EntityNotFound`] if the entity is not alive.
    pub fn set_name(&mut self, entity: EntityId, name: &str) -> ArborResult<()> {
        let symbol: Name = self.names.intern(name);
        self.set_component(entity, ComponentId::NAME, symbol)
    }

    /// Moves an entity under `parent`; null detaches it.
    ///
    /// # Errors
    ///
    /// Fails if either entity is not alive, or with
    /// [`ArborError::CycleDetected`] if `parent == entity`.
    pub fn set_parent(&mut self, entity: EntityId, parent: EntityId) -> ArborResult<()> {
        if parent == entity {
            return Err(ArborError::CycleDetected(entity));
        }
        self.check_parent(parent)?;
        let ty = self.committed_type(entity)?.with_parent(parent);
        self.move_entity(entity, ty).map(drop)
    }

    /// Deletes an entity. Its children keep their child-of pair.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::EntityNotFound`] if the entity is not alive.
    pub fn delete(&mut self, entity: EntityId) -> ArborResult<()> {
        let record = self
            .entities
            .remove(&entity)
            .ok_or(ArborError::EntityNotFound(entity))?;
        self.detach(record);
        Ok(())
    }

    /// Table for `ty`, created and registered in the hierarchy on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::UnknownComponent`] if `ty` names an unregistered
    /// component.
    pub fn ensure_table(&mut self, ty: Type) -> ArborResult<TableId> {
        if let Some(id) = self.tables.find(&ty) {
            return Ok(id);
        }
        let id = self.alloc_table_id();
        let table = Table::new(id, ty, &self.components, self.config.initial_table_capacity)?;
        let parent = table.parent();
        tracing::debug!("Created table {} {:?} under parent {}", id, table.ty(), parent);
        self.tables.insert(table);
        self.hierarchy.register(parent, id);
        Ok(id)
    }

    fn check_parent(&self, parent: EntityId) -> ArborResult<()> {
        if parent.is_null() || self.entities.contains_key(&parent) {
            Ok(())
        } else {
            Err(ArborError::EntityNotFound(parent))
        }
    }

    fn committed_type(&self, entity: EntityId) -> ArborResult<Type> {
        self.type_of(StageContext::Canonical, entity)
            .cloned()
            .ok_or(ArborError::EntityNotFound(entity))
    }

    /// Appends a zeroed row to `table` and records it.
    fn append(&mut self, entity: EntityId, table: TableId) -> ArborResult<Record> {
        let row = self
            .tables
            .get_mut(table)
            .ok_or(ArborError::UnknownTable(table))?
            .main_mut()
            .append(entity);
        let record = Record { table, row };
        self.entities.insert(entity, record);
        Ok(record)
    }

    /// Swap-removes a committed row and fixes the record of the row moved
    /// into its place.
    fn detach(&mut self, record: Record) {
        let moved = self
            .tables
            .get_mut(record.table)
            .and_then(|table| table.main_mut().remove_row(record.row));
        if let Some(moved) = moved.and_then(|moved| self.entities.get_mut(&moved)) {
            moved.row = record.row;
        }
    }

    /// Moves an entity into the table for `ty`, carrying shared components.
    fn move_entity(&mut self, entity: EntityId, ty: Type) -> ArborResult<Record> {
        let from = *self
            .entities
            .get(&entity)
            .ok_or(ArborError::EntityNotFound(entity))?;
        let dst = self.ensure_table(ty)?;
        if dst == from.table {
            return Ok(from);
        }

        let (src_table, dst_table) = self
            .tables
            .pair_mut(from.table, dst)
            .ok_or(ArborError::UnknownTable(dst))?;
        let (dst_ids, dst_data) = dst_table.split_main();
        let row = dst_data.append(entity);
        copy_shared(src_table.column_ids(), src_table.main(), from.row, dst_ids, dst_data, row);

        let record = Record { table: dst, row };
        self.detach(from);
        self.entities.insert(entity, record);
        Ok(record)
    }

    fn write(&mut self, record: Record, component: ComponentId, bytes: &[u8]) -> ArborResult<()> {
        let table = self
            .tables
            .get_mut(record.table)
            .ok_or(ArborError::UnknownTable(record.table))?;
        let column = table
            .column_index(component)
            .ok_or(ArborError::UnknownComponent(component))?;
        if let Some(column) = table.main_mut().column_mut(column) {
            column.get_mut(record.row).copy_from_slice(bytes);
        }
        Ok(())
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// Applies a stage's pending rows to the committed tables and empties the
    /// stage.
    ///
    /// Tables the stage created are adopted (or folded into a table of the
    /// same type created since) and registered in the hierarchy. Each staged
    /// entity lands at the slot its latest write named; stale slots are
    /// dropped. Staged deletes run last.
    pub fn merge(&mut self, stage: &mut Stage) {
        tracing::debug!(
            "Merging stage {}: {} overlays, {} new tables",
            stage.id(),
            stage.overlay_count(),
            stage.created_table_count()
        );

        let mut remap: HashMap<TableId, TableId> = HashMap::new();
        for table in stage.take_tables() {
            if let Some(existing) = self.tables.find(table.ty()) {
                tracing::debug!("Folding staged table {} into {}", table.id(), existing);
                remap.insert(table.id(), existing);
            } else {
                let (id, parent) = (table.id(), table.parent());
                tracing::debug!("Adopting staged table {} under parent {}", id, parent);
                self.tables.insert(table);
                self.hierarchy.register(parent, id);
            }
        }

        let mut committed = 0usize;
        for (staged_table, overlay) in stage.take_overlays() {
            let target = remap.get(&staged_table).copied().unwrap_or(staged_table);
            for (row, entity) in overlay.entities().iter().copied().enumerate() {
                if !stage.is_live_slot(staged_table, row, entity) {
                    continue;
                }
                // Deleted canonically after it was staged.
                if !self.entities.contains_key(&entity) && !stage.was_spawned(entity) {
                    continue;
                }
                if let Err(err) = self.commit_row(entity, target, &overlay, row) {
                    tracing::warn!("Stage {}: dropped staged row of {}: {}", stage.id(), entity, err);
                    continue;
                }
                committed += 1;
            }
        }

        for entity in stage.deleted() {
            if let Some(record) = self.entities.remove(&entity) {
                self.detach(record);
            }
        }

        tracing::debug!("Merged stage {}: {} rows committed", stage.id(), committed);
        stage.clear();
    }

    /// Writes overlay row `row` as the committed row of `entity` in `target`.
    fn commit_row(
        &mut self,
        entity: EntityId,
        target: TableId,
        overlay: &TableData,
        row: usize,
    ) -> ArborResult<()> {
        // Checked before detaching so a missing target leaves the entity as is.
        if self.tables.get(target).is_none() {
            return Err(ArborError::UnknownTable(target));
        }
        let record = match self.entities.get(&entity).copied() {
            Some(record) if record.table == target => record,
            Some(record) => {
                self.detach(record);
                self.append(entity, target)?
            }
            None => self.append(entity, target)?,
        };
        if let Some(table) = self.tables.get_mut(target) {
            table.main_mut().copy_row_from(record.row, overlay, row);
        }
        Ok(())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("tables", &self.tables.len())
            .field("components", &self.components.len())
            .field("names", &self.names.len())
            .finish()
    }
}
