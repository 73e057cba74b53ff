//! # Entity and Component Identifiers
//!
//! Entities are opaque 64-bit ids with `0` reserved for "no entity".
//! A type element ([`Id`]) is either a component id or a child-of pair; the
//! top bit tells them apart.

use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Unique identifier for an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// The "no entity" sentinel, returned by every lookup that finds nothing.
    pub const NULL: Self = Self(0);

    /// Largest id that still fits in a child-of pair.
    pub const MAX: Self = Self(Id::CHILD_OF - 1);

    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Checks if this is the null entity.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a registered component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct ComponentId(u32);

impl ComponentId {
    /// The built-in name component.
    pub const NAME: Self = Self(0);

    /// Wraps a raw component index.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Index into the component registry.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One element of a [`Type`](super::Type).
///
/// Components sort before child-of pairs, so column order follows component
/// id order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Id(u64);

impl Id {
    /// Role bit marking a child-of pair.
    const CHILD_OF: u64 = 1 << 63;

    /// A component element.
    #[inline]
    #[must_use]
    pub const fn component(component: ComponentId) -> Self {
        Self(component.0 as u64)
    }

    /// A child-of pair pointing at `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is null or collides with the role bit.
    #[inline]
    #[must_use]
    pub const fn child_of(parent: EntityId) -> Self {
        assert!(!parent.is_null(), "child-of pair needs a parent");
        assert!(parent.0 <= EntityId::MAX.0, "entity id collides with role bit");
        Self(Self::CHILD_OF | parent.0)
    }

    /// True for child-of pairs.
    #[inline]
    #[must_use]
    pub const fn is_child_of(self) -> bool {
        self.0 & Self::CHILD_OF != 0
    }

    /// The parent of a child-of pair.
    #[inline]
    #[must_use]
    pub const fn parent(self) -> Option<EntityId> {
        if self.is_child_of() {
            Some(EntityId(self.0 & !Self::CHILD_OF))
        } else {
            None
        }
    }

    /// The component of a component element.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn as_component(self) -> Option<ComponentId> {
        if self.is_child_of() {
            None
        } else {
            Some(ComponentId(self.0 as u32))
        }
    }
}

impl From<ComponentId> for Id {
    fn from(component: ComponentId) -> Self {
        Self::component(component)
    }
}
