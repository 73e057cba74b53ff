//! # Memory Management
//!
//! The allocation primitive behind every column and index list.
//!
//! ## Design Philosophy
//!
//! - One heap block per store: header and elements share an allocation
//! - Amortized O(1) append through power-of-two growth
//! - O(1) removal by moving the last element into the hole
//! - Raw stores are untyped; owners carry the element layout

mod store;
mod typed;

pub use store::{ContiguousStore, ElementLayout};
pub use typed::{Column, TypedStore};
