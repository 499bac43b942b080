// src/mapping/resolver.rs

//! Resolution of effective RPM mappings from compose content and overrides.
//!
//! The resolver seeds a tree from the RPMs a compose actually ships and then
//! layers the release's override rows on top. Releases without any compose
//! resolve from overrides alone, where only include rows can contribute.

use crate::db::models::OverrideRpm;
use crate::mapping::tree::RpmMappingTree;

/// One RPM actually shipped in a compose tree, scoped to variant and arch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseEntry {
    pub variant: String,
    pub arch: String,
    pub rpm_name: String,
    pub rpm_arch: String,
}

/// Build the compose-native tree from base entries
pub fn seed_tree(base_entries: &[BaseEntry]) -> RpmMappingTree {
    let mut tree = RpmMappingTree::new();
    for entry in base_entries {
        tree.add(&entry.variant, &entry.arch, &entry.rpm_name, &entry.rpm_arch);
    }
    tree
}

/// Compute the effective mapping for one package
///
/// Overrides are keyed by source package name, so one row can affect any
/// binary RPM built from that source. Application order does not matter:
/// add/remove are idempotent and at most one override row exists per
/// (variant, arch, rpm_name, rpm_arch) key.
pub fn resolve(
    base_entries: &[BaseEntry],
    overrides: &[OverrideRpm],
    disable_overrides: bool,
) -> RpmMappingTree {
    let mut tree = seed_tree(base_entries);
    if disable_overrides {
        return tree;
    }
    tree.merge_overrides(overrides);
    tree
}

/// Compute the mapping for a release without any compose
///
/// Only include overrides contribute; excludes on an empty base are no-ops.
pub fn resolve_overrides_only(overrides: &[OverrideRpm]) -> RpmMappingTree {
    resolve(&[], overrides, false)
}

/// Find override rows that have no effect on the resolved mapping
///
/// An include row whose tuple the compose already ships, or an exclude row
/// whose tuple the compose does not ship, changes nothing. Such rows are
/// reported to operators together with their `do_not_delete` flag; this
/// query never mutates anything, removal is a separate, explicit decision.
pub fn useless_overrides<'a>(
    base: &RpmMappingTree,
    overrides: &'a [OverrideRpm],
) -> Vec<&'a OverrideRpm> {
    overrides
        .iter()
        .filter(|o| {
            let shipped = base.contains(&o.variant, &o.arch, &o.rpm_name, &o.rpm_arch);
            o.include == shipped
        })
        .collect()
}
