//! # Archetype Types
//!
//! A type is the sorted, deduplicated id set shared by every entity in one
//! table. It is the table's identity and its column schema.

use std::fmt;
use std::sync::Arc;

use super::entity::{ComponentId, EntityId, Id};

/// Sorted, deduplicated set of [`Id`]s with at most one child-of pair.
///
/// Cheap to clone; the ids are shared.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Type {
    ids: Arc<[Id]>,
}

impl Type {
    /// Builds a type from ids in any order.
    ///
    /// If several child-of pairs are supplied, the last one supplied wins.
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = Id>) -> Self {
        let mut ids: Vec<Id> = ids.into_iter().collect();
        if let Some(last_pair) = ids.iter().rev().find(|id| id.is_child_of()).copied() {
            ids.retain(|id| !id.is_child_of() || *id == last_pair);
        }
        ids.sort_unstable();
        ids.dedup();
        Self { ids: ids.into() }
    }

    /// All ids, sorted.
    #[inline]
    #[must_use]
    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    /// Number of ids.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True for the empty type.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Position of `id` in the type.
    #[must_use]
    pub fn index_of(&self, id: Id) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    /// Checks if the type contains `id`.
    #[must_use]
    pub fn contains(&self, id: Id) -> bool {
        self.index_of(id).is_some()
    }

    /// Checks if the type contains a component.
    #[must_use]
    pub fn has_component(&self, component: ComponentId) -> bool {
        self.contains(Id::component(component))
    }

    /// Component elements in column order.
    pub fn components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.ids.iter().filter_map(|id| id.as_component())
    }

    /// Parent named by the child-of pair, or [`EntityId::NULL`].
    #[must_use]
    pub fn parent(&self) -> EntityId {
        // Pairs sort last.
        self.ids
            .last()
            .and_then(|id| id.parent())
            .unwrap_or(EntityId::NULL)
    }

    /// Returns the type with `id` added. A new child-of pair replaces the old one.
    #[must_use]
    pub fn with(&self, id: Id) -> Self {
        if self.contains(id) {
            return self.clone();
        }
        Self::new(self.ids.iter().copied().chain(std::iter::once(id)))
    }

    /// Returns the type with `id` removed.
    #[must_use]
    pub fn without(&self, id: Id) -> Self {
        if !self.contains(id) {
            return self.clone();
        }
        Self {
            ids: self.ids.iter().copied().filter(|x| *x != id).collect(),
        }
    }

    /// Returns the type re-parented under `parent`; null removes the pair.
    #[must_use]
    pub fn with_parent(&self, parent: EntityId) -> Self {
        let rest = self.ids.iter().copied().filter(|id| !id.is_child_of());
        if parent.is_null() {
            Self { ids: rest.collect() }
        } else {
            Self::new(rest.chain(std::iter::once(Id::child_of(parent))))
        }
    }
}

impl Default for Type {
    fn default() -> Self {
        Self {
            ids: Arc::from(Vec::new()),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for id in self.ids.iter() {
            let label = match (id.as_component(), id.parent()) {
                (Some(component), _) => format!("{component}"),
                (_, Some(parent)) => format!("ChildOf({parent})"),
                _ => format!("{id:?}"),
            };
            list.entry(&label);
        }
        list.finish()
    }
}
