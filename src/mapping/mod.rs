// src/mapping/mod.rs

//! RPM-to-tree mapping resolution and override diffing.
//!
//! The mapping core is pure: it operates on query results the caller has
//! already materialized (compose content and override rows) and produces
//! trees and action lists without touching the database itself.

pub mod diff;
pub mod resolver;
pub mod tree;

pub use diff::{Action, ActionKind, compute_changes};
pub use resolver::{BaseEntry, resolve, resolve_overrides_only, seed_tree, useless_overrides};
pub use tree::{PlainMapping, RpmMappingTree};
