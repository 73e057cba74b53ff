//! # Storage Error Types
//!
//! Recoverable failures only. Lookups that find nothing return
//! [`EntityId::NULL`](crate::EntityId::NULL) instead, and contract violations
//! on raw stores are assertions.

use thiserror::Error;

use crate::memory::ElementLayout;
use crate::storage::{ComponentId, EntityId, TableId};

/// Errors that can occur in the storage core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArborError {
    /// The entity is not alive in the view the operation ran against.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The component id was never registered.
    #[error("unknown component: {0}")]
    UnknownComponent(ComponentId),

    /// The table handle is not known to the world or the stage.
    #[error("unknown table: {0}")]
    UnknownTable(TableId),

    /// A typed accessor used a type whose layout differs from the registered one.
    #[error("component {component} has layout {registered:?}, accessed as {requested:?}")]
    ComponentMismatch {
        /// The component being accessed.
        component: ComponentId,
        /// Layout recorded at registration.
        registered: ElementLayout,
        /// Layout of the type used by the caller.
        requested: ElementLayout,
    },

    /// The child-of chain loops back on itself.
    #[error("cycle detected in hierarchy at entity {0}")]
    CycleDetected(EntityId),

    /// The child-of chain is deeper than the configured limit.
    #[error("hierarchy deeper than {limit} levels at entity {entity}")]
    DepthExceeded {
        /// The entity whose path was being built.
        entity: EntityId,
        /// Configured maximum depth.
        limit: usize,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for storage operations.
pub type ArborResult<T> = Result<T, ArborError>;
