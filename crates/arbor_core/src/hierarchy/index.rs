//! Parent to child-table index.

use std::collections::HashMap;

use crate::memory::TypedStore;
use crate::storage::{EntityId, TableId};

/// Tables holding the children of each parent.
///
/// Entries are only ever appended. A table is registered when it is created,
/// and stays registered while it is empty, so readers check row counts.
#[derive(Debug)]
pub struct HierarchyIndex {
    child_tables: HashMap<EntityId, TypedStore<TableId>>,
    capacity: usize,
}

impl HierarchyIndex {
    /// Creates an empty index. Each parent's list starts with room for
    /// `capacity` tables.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            child_tables: HashMap::new(),
            capacity,
        }
    }

    /// Records that `table` holds children of `parent` (null for roots).
    ///
    /// Registering the same table twice is allowed; lookups are unaffected
    /// and [`TreeIter`](super::TreeIter) yields it once.
    pub fn register(&mut self, parent: EntityId, table: TableId) {
        let capacity = self.capacity;
        self.child_tables
            .entry(parent)
            .or_insert_with(|| TypedStore::new(capacity))
            .push(table);
    }

    /// Tables registered under `parent`, in registration order.
    #[must_use]
    pub fn tables(&self, parent: EntityId) -> &[TableId] {
        self.child_tables
            .get(&parent)
            .map_or(&[][..], TypedStore::as_slice)
    }

    /// Number of parents with at least one registered table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.child_tables.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.child_tables.is_empty()
    }
}

impl Default for HierarchyIndex {
    fn default() -> Self {
        Self::new(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_appends() {
        let mut index = HierarchyIndex::new(1);
        let parent = EntityId::from_raw(5);
        let (a, b) = (TableId::from_raw(1), TableId::from_raw(2));

        assert!(index.tables(parent).is_empty());
        index.register(parent, a);
        index.register(parent, b);
        index.register(parent, a);
        index.register(EntityId::NULL, b);

        assert_eq!(index.tables(parent), &[a, b, a]);
        assert_eq!(index.tables(EntityId::NULL), &[b]);
        assert_eq!(index.len(), 2);
    }
}
