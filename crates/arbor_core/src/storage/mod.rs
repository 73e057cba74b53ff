//! # Table Storage
//!
//! Entities grouped by [`Type`] into column-oriented [`Table`]s, with
//! deferred writers isolated in [`Stage`] overlays.

mod component;
mod entity;
mod stage;
mod table;
mod types;
mod world;

pub use component::{ComponentRegistry, Name, NameTable};
pub use entity::{ComponentId, EntityId, Id};
pub use stage::{Stage, StageContext, StageId};
pub use table::{Table, TableData, TableId};
pub use types::Type;
pub use world::World;
