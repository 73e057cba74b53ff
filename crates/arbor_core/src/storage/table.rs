//! # Archetype Tables
//!
//! One table per distinct [`Type`]. A table owns its committed data set; the
//! per-stage overlays live in the [`Stage`](super::Stage) that wrote them and
//! share the table's column layout.
//!
//! ```text
//! Table (Type [Name, Health, ChildOf(7)])
//!   entities: [e3, e9, e4]
//!   Name:     [n1, n2, n5]     <- one Column per sized component
//!   Health:   [h3, h9, h4]
//! ```

use std::collections::HashMap;
use std::fmt;

use bytemuck::{Pod, Zeroable};

use super::component::{ComponentRegistry, Name};
use super::entity::{ComponentId, EntityId};
use super::types::Type;
use crate::error::{ArborError, ArborResult};
use crate::memory::{Column, ElementLayout, TypedStore};

/// Handle of a table in a world's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct TableId(u32);

impl TableId {
    /// Wraps a raw table index.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Index into the table arena.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// One data set of a table: the entity column plus one [`Column`] per sized
/// component, all of equal length.
pub struct TableData {
    entities: TypedStore<EntityId>,
    columns: Box<[Column]>,
}

impl TableData {
    fn new(layouts: impl Iterator<Item = ElementLayout>, capacity: usize) -> Self {
        Self {
            entities: TypedStore::new(capacity),
            columns: layouts.map(|layout| Column::new(layout, capacity)).collect(),
        }
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.entities.len()
    }

    /// True if there are no rows.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity of every row.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        self.entities.as_slice()
    }

    /// Column at `index` (see [`Table::column_index`]).
    #[inline]
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Mutable column at `index`.
    #[inline]
    pub fn column_mut(&mut self, index: usize) -> Option<&mut Column> {
        self.columns.get_mut(index)
    }

    /// Every column, in type order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Appends a row for `entity` with every component zeroed. Returns the row.
    pub(crate) fn append(&mut self, entity: EntityId) -> usize {
        let row = self.entities.push(entity);
        for column in self.columns.iter_mut() {
            column.add();
        }
        debug_assert!(self.columns.iter().all(|c| c.len() == self.entities.len()));
        row
    }

    /// Swap-removes `row`. Returns the entity that now occupies `row`, if
    /// another row was moved into it.
    pub(crate) fn remove_row(&mut self, row: usize) -> Option<EntityId> {
        let remaining = self.entities.remove_index_swap_last(row);
        for column in self.columns.iter_mut() {
            column.remove_index_swap_last(row);
        }
        (row < remaining).then(|| *self.entities.get(row))
    }

    /// Copies every column of `src_row` in `src` into `dst_row`.
    /// Both data sets must belong to the same table.
    pub(crate) fn copy_row_from(&mut self, dst_row: usize, src: &TableData, src_row: usize) {
        debug_assert_eq!(self.columns.len(), src.columns.len());
        for (dst, src) in self.columns.iter_mut().zip(src.columns.iter()) {
            dst.get_mut(dst_row).copy_from_slice(src.get(src_row));
        }
    }

    /// Zeroes every component of `row`.
    pub(crate) fn zero_row(&mut self, row: usize) {
        for column in self.columns.iter_mut() {
            column.get_mut(row).fill(0);
        }
    }

    /// Shrinks every allocation to the row count.
    pub fn reclaim(&mut self) {
        self.entities.reclaim();
        for column in self.columns.iter_mut() {
            column.reclaim();
        }
    }

    /// `(allocated, used)` bytes across the entity column and every column.
    #[must_use]
    pub fn memory(&self) -> (usize, usize) {
        self.columns
            .iter()
            .map(Column::memory)
            .fold(self.entities.memory(), |(a, u), (ca, cu)| (a + ca, u + cu))
    }
}

impl fmt::Debug for TableData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableData")
            .field("entities", &self.entities)
            .field("columns", &self.columns.len())
            .finish()
    }
}

/// Storage for every entity of one [`Type`].
pub struct Table {
    id: TableId,
    ty: Type,
    /// Sized components, in type order. Parallel to the data set columns.
    column_ids: Box<[ComponentId]>,
    name_column: Option<usize>,
    main: TableData,
}

impl Table {
    /// Builds an empty table for `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::UnknownComponent`] if the type names a component
    /// the registry does not know.
    pub(crate) fn new(
        id: TableId,
        ty: Type,
        registry: &ComponentRegistry,
        capacity: usize,
    ) -> ArborResult<Self> {
        let mut column_ids = Vec::new();
        let mut layouts = Vec::new();
        for component in ty.components() {
            let layout = registry
                .layout(component)
                .ok_or(ArborError::UnknownComponent(component))?;
            if !layout.is_zero_sized() {
                column_ids.push(component);
                layouts.push(layout);
            }
        }
        let name_column = column_ids.binary_search(&ComponentId::NAME).ok();
        debug_assert!(name_column.iter().all(|&i| layouts[i] == ElementLayout::of::<Name>()));

        Ok(Self {
            id,
            ty,
            column_ids: column_ids.into_boxed_slice(),
            name_column,
            main: TableData::new(layouts.into_iter(), capacity),
        })
    }

    /// The table of entities with no ids at all.
    pub(crate) fn empty(id: TableId, capacity: usize) -> Self {
        Self {
            id,
            ty: Type::default(),
            column_ids: Box::default(),
            name_column: None,
            main: TableData::new(std::iter::empty(), capacity),
        }
    }

    /// Table handle.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Type shared by every row.
    #[inline]
    #[must_use]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Parent named by the type's child-of pair, or null for root tables.
    #[must_use]
    pub fn parent(&self) -> EntityId {
        self.ty.parent()
    }

    /// Sized components, in column order.
    #[must_use]
    pub fn column_ids(&self) -> &[ComponentId] {
        &self.column_ids
    }

    /// Column index of a sized component.
    #[must_use]
    pub fn column_index(&self, component: ComponentId) -> Option<usize> {
        self.column_ids.binary_search(&component).ok()
    }

    /// Checks if rows carry a name.
    #[inline]
    #[must_use]
    pub fn has_name(&self) -> bool {
        self.name_column.is_some()
    }

    /// Name column of a data set of this table.
    #[must_use]
    pub fn names<'d>(&self, data: &'d TableData) -> Option<&'d [Name]> {
        data.column(self.name_column?)?.as_slice::<Name>()
    }

    /// Committed data set.
    #[inline]
    #[must_use]
    pub fn main(&self) -> &TableData {
        &self.main
    }

    #[inline]
    pub(crate) fn main_mut(&mut self) -> &mut TableData {
        &mut self.main
    }

    /// Column ids and the committed data set, borrowed apart.
    pub(crate) fn split_main(&mut self) -> (&[ComponentId], &mut TableData) {
        (&self.column_ids, &mut self.main)
    }

    /// Committed row count.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.main.count()
    }

    /// A fresh, empty data set with this table's column layout.
    #[must_use]
    pub fn new_data(&self, capacity: usize) -> TableData {
        TableData::new(self.main.columns.iter().map(Column::layout), capacity)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("type", &self.ty)
            .field("count", &self.count())
            .finish()
    }
}

/// Copies the components shared by two tables from `src[src_row]` into
/// `dst[dst_row]`. Both column id lists are sorted, so one merge walk finds
/// every shared column.
pub(crate) fn copy_shared(
    src_ids: &[ComponentId],
    src: &TableData,
    src_row: usize,
    dst_ids: &[ComponentId],
    dst: &mut TableData,
    dst_row: usize,
) {
    let (mut i, mut j) = (0, 0);
    while i < src_ids.len() && j < dst_ids.len() {
        match src_ids[i].cmp(&dst_ids[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dst.columns[j]
                    .get_mut(dst_row)
                    .copy_from_slice(src.columns[i].get(src_row));
                i += 1;
                j += 1;
            }
        }
    }
}

/// Every table of a world, indexed by [`TableId`].
///
/// Slots can stay empty: ids are handed out before a table is adopted, and a
/// staged table folded into an existing one never takes its slot.
#[derive(Default)]
pub(crate) struct TableArena {
    tables: Vec<Option<Table>>,
    by_type: HashMap<Type, TableId>,
}

impl TableArena {
    pub(crate) fn get(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.index())?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.tables.get_mut(id.index())?.as_mut()
    }

    pub(crate) fn find(&self, ty: &Type) -> Option<TableId> {
        self.by_type.get(ty).copied()
    }

    pub(crate) fn insert(&mut self, table: Table) {
        let index = table.id().index();
        if self.tables.len() <= index {
            self.tables.resize_with(index + 1, || None);
        }
        debug_assert!(self.tables[index].is_none(), "table slot reused");
        self.by_type.insert(table.ty().clone(), table.id());
        self.tables[index] = Some(table);
    }

    /// Two distinct tables, mutably.
    pub(crate) fn pair_mut(&mut self, a: TableId, b: TableId) -> Option<(&mut Table, &mut Table)> {
        let (ai, bi) = (a.index(), b.index());
        if ai == bi || ai.max(bi) >= self.tables.len() {
            return None;
        }
        let (low, high) = self.tables.split_at_mut(ai.max(bi));
        let (first, second) = (low[ai.min(bi)].as_mut()?, high[0].as_mut()?);
        Some(if ai < bi { (first, second) } else { (second, first) })
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().flatten()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Table> {
        self.tables.iter_mut().flatten()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_type.len()
    }
}
