//! Forward-only traversal of a parent's child tables.

use std::iter::FusedIterator;

use crate::storage::{EntityId, StageContext, Table, TableId, World};

/// One non-empty child table of the parent being iterated.
#[derive(Clone, Copy, Debug)]
pub struct TreeBatch<'w> {
    /// The table.
    pub table: &'w Table,
    /// Committed entities of the table.
    pub entities: &'w [EntityId],
    /// Number of entities.
    pub count: usize,
}

/// Iterator over the tables registered under one parent.
///
/// The table list is fixed when the iterator is created. Tables are visited
/// in registration order; a table with no rows at visit time is skipped, and
/// a table registered more than once is yielded once.
#[derive(Debug)]
pub struct TreeIter<'w> {
    world: &'w World,
    tables: &'w [TableId],
    index: usize,
    seen: Vec<TableId>,
}

impl<'w> TreeIter<'w> {
    pub(crate) fn new(world: &'w World, parent: EntityId) -> Self {
        Self {
            world,
            tables: world.hierarchy().tables(parent),
            index: 0,
            seen: Vec::new(),
        }
    }
}

impl<'w> Iterator for TreeIter<'w> {
    type Item = TreeBatch<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&id) = self.tables.get(self.index) {
            self.index += 1;
            let Some(table) = self.world.table(StageContext::Canonical, id) else {
                continue;
            };
            let count = table.count();
            if count == 0 || self.seen.contains(&id) {
                continue;
            }
            self.seen.push(id);
            return Some(TreeBatch {
                table,
                entities: table.main().entities(),
                count,
            });
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.tables.len() - self.index))
    }
}

impl FusedIterator for TreeIter<'_> {}

impl World {
    /// Iterates the committed children of `parent`, one table at a time.
    #[must_use]
    pub fn tree_iter(&self, parent: EntityId) -> TreeIter<'_> {
        TreeIter::new(self, parent)
    }
}
