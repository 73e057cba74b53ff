//! # ARBOR Core Storage
//!
//! Column-oriented entity storage with deferred writers and named hierarchies.
//!
//! ## Layers
//!
//! 1. **Memory** - [`ContiguousStore`], a single-allocation growable array that
//!    backs every column and every index list
//! 2. **Storage** - archetype [`Table`]s, one per distinct [`Type`], each with a
//!    committed data set and per-[`Stage`] overlays
//! 3. **Hierarchy** - the [`HierarchyIndex`] from parent to child tables, name
//!    and path lookup, and forward-only [`TreeIter`] traversal
//!
//! ## Staging
//!
//! ```text
//!   reader ──► World (committed tables) ◄── merge ── Stage (overlays)
//!                                                       ▲
//!                                         deferred writer (shared &World)
//! ```
//!
//! Every read takes a [`StageContext`]. `Canonical` sees committed state only;
//! `Staged(&stage)` sees the stage's pending rows layered over committed rows.
//!
//! ## Example
//!
//! ```rust,ignore
//! use arbor_core::{EntityId, StageContext, World, WorldConfig};
//!
//! let mut world = World::new(WorldConfig::default());
//! let parent = world.spawn_named("Parent", None)?;
//! let child = world.spawn_named("Child", Some(parent))?;
//!
//! let found = world.lookup_path(StageContext::Canonical, EntityId::NULL, "Parent.Child", ".", None);
//! assert_eq!(found, child);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod hierarchy;
pub mod memory;
pub mod storage;

pub use config::WorldConfig;
pub use error::{ArborError, ArborResult};
pub use hierarchy::{HierarchyIndex, TreeBatch, TreeIter};
pub use memory::{Column, ContiguousStore, ElementLayout, TypedStore};
pub use storage::{
    ComponentId, ComponentRegistry, EntityId, Id, Name, NameTable, Stage, StageContext, StageId,
    Table, TableData, TableId, Type, World,
};
