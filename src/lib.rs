// src/lib.rs

//! Composedb
//!
//! Product metadata catalog tracking releases, composes, and their RPM
//! contents, with a layered override mechanism and change auditing.
//!
//! # Architecture
//!
//! - Database-first: all state in SQLite, no config files
//! - Composes: immutable dated snapshots of built content, linked to releases
//! - Mappings: computed projections of compose content per variant.arch tree,
//!   layered with include/exclude overrides scoped by release
//! - Diff engine: desired-state mapping updates become minimal override
//!   action lists, applied transactionally
//! - Changesets: every write request leaves an audit trail of old/new values

pub mod catalog;
pub mod compose;
pub mod db;
mod error;
pub mod mapping;
pub mod version;

pub use catalog::{MappingLookup, OlderCompose, TreeSpec};
pub use compose::ComposeType;
pub use compose::selector::TypeFilter;
pub use error::{Error, Result};
pub use mapping::{Action, ActionKind, PlainMapping, RpmMappingTree};
pub use version::{RpmVersion, VersionConstraint, VersionFilter};
