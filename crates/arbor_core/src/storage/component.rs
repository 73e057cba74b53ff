//! # Component Registry and Names
//!
//! Components are plain old data. The registry only records the layout of
//! each component id, which is all a table needs to build its columns.
//! Size 0 marks a tag: present in the type, no column.

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use parking_lot::RwLock;

use super::entity::ComponentId;
use crate::memory::ElementLayout;

/// Layout of every registered component, indexed by [`ComponentId`].
#[derive(Clone, Debug)]
pub struct ComponentRegistry {
    layouts: Vec<ElementLayout>,
}

impl ComponentRegistry {
    /// Creates a registry holding only the built-in [`Name`] component.
    #[must_use]
    pub fn new() -> Self {
        Self {
            layouts: vec![ElementLayout::of::<Name>()],
        }
    }

    /// Registers a component by layout.
    ///
    /// # Panics
    ///
    /// Panics after `u32::MAX` registrations.
    pub fn register(&mut self, layout: ElementLayout) -> ComponentId {
        let raw = u32::try_from(self.layouts.len()).expect("component id space exhausted");
        self.layouts.push(layout);
        ComponentId::from_raw(raw)
    }

    /// Registers a component with the layout of `T`.
    pub fn register_type<T: Pod>(&mut self) -> ComponentId {
        self.register(ElementLayout::of::<T>())
    }

    /// Registers a zero-sized tag.
    pub fn register_tag(&mut self) -> ComponentId {
        self.register(ElementLayout::new(0, 1))
    }

    /// Layout of a component.
    #[must_use]
    pub fn layout(&self, component: ComponentId) -> Option<ElementLayout> {
        self.layouts.get(component.index()).copied()
    }

    /// Number of registered components, built-ins included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    /// Never true: the name component is always registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Value of the name component: an interned string symbol.
///
/// `Name::NONE` (zero, the value of a fresh row) means unnamed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// The unnamed symbol.
    pub const NONE: Self = Self(0);

    /// True for the unnamed symbol.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

#[derive(Default)]
struct Interner {
    by_text: HashMap<Arc<str>, Name>,
    texts: Vec<Arc<str>>,
}

/// World-wide string interner for names.
///
/// Staged writers intern through shared access, so the table sits behind a
/// read-write lock. Two symbols are equal iff their strings are.
#[derive(Default)]
pub struct NameTable {
    inner: RwLock<Interner>,
}

impl NameTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the symbol for `text`, interning it on first use.
    ///
    /// # Panics
    ///
    /// Panics after `u32::MAX - 1` distinct names.
    pub fn intern(&self, text: &str) -> Name {
        if let Some(name) = self.get(text) {
            return name;
        }
        let mut inner = self.inner.write();
        // Another writer may have interned it between the locks.
        if let Some(name) = inner.by_text.get(text) {
            return *name;
        }
        let raw = u32::try_from(inner.texts.len() + 1).expect("name space exhausted");
        let name = Name(raw);
        let text: Arc<str> = Arc::from(text);
        inner.texts.push(Arc::clone(&text));
        inner.by_text.insert(text, name);
        name
    }

    /// Symbol for `text` if it was ever interned.
    #[must_use]
    pub fn get(&self, text: &str) -> Option<Name> {
        self.inner.read().by_text.get(text).copied()
    }

    /// String behind a symbol.
    #[must_use]
    pub fn resolve(&self, name: Name) -> Option<Arc<str>> {
        let index = (name.0 as usize).checked_sub(1)?;
        self.inner.read().texts.get(index).cloned()
    }

    /// Number of interned names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().texts.len()
    }

    /// True if nothing was interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for NameTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameTable").field("len", &self.len()).finish()
    }
}
