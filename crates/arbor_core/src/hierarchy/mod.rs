//! # Hierarchy
//!
//! Named parent/child trees over the table storage.
//!
//! ```text
//!   HierarchyIndex
//!     0      -> [t0, t1]        root tables
//!     e7     -> [t4, t9]        tables whose type holds ChildOf(e7)
//! ```
//!
//! Lookups walk the index, then the name column of each table through the
//! caller's [`StageContext`](crate::StageContext). Paths are resolved one
//! segment at a time and built by walking child-of pairs upward.

mod index;
mod iter;
mod lookup;
mod path;

pub use index::HierarchyIndex;
pub use iter::{TreeBatch, TreeIter};
