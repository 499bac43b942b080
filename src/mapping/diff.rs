// src/mapping/diff.rs

//! Diff computation between a desired RPM mapping and the current one.
//!
//! Given the current effective tree, the tree a client wants, the
//! compose-native base tree, and the existing override rows, this module
//! computes the minimal ordered list of override actions that realizes the
//! desired state. The computation is a pure function; applying the actions
//! (and doing so atomically) is the persistence layer's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::db::models::OverrideRpm;
use crate::mapping::tree::RpmMappingTree;

/// What to do with an override row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Create or update-in-place the row for this key
    Create,
    /// Remove the row for this key (kept and flipped when guarded)
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Delete => "delete",
        }
    }
}

/// One override change, consumed transactionally by the persistence layer
///
/// `comment` and `do_not_delete` are optional: when absent, the stored
/// values of an existing row are preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action: ActionKind,
    pub release_id: String,
    pub variant: String,
    pub arch: String,
    pub srpm_name: String,
    pub rpm_name: String,
    pub rpm_arch: String,
    pub include: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub do_not_delete: Option<bool>,
}

type TupleKey = (String, String, String, String);

fn tuple_key(variant: &str, arch: &str, rpm_name: &str, rpm_arch: &str) -> TupleKey {
    (
        variant.to_string(),
        arch.to_string(),
        rpm_name.to_string(),
        rpm_arch.to_string(),
    )
}

/// Compute the override actions that turn `current` into `desired`
///
/// `base` is the compose-native tree (what the compose really ships) and
/// `overrides` the rows currently stored for this release and package.
/// Actions come back keyed by tuple, at most one per key, ordered by
/// (variant, arch) then rpm_name then rpm_arch.
///
/// Three kinds of change are produced:
/// - a tuple desired but not currently effective becomes an include row
///   (overwriting a conflicting exclude row in place),
/// - a tuple effective but no longer desired becomes an exclude row when the
///   compose ships it, otherwise its include row is deleted - unless the row
///   is guarded by `do_not_delete`, in which case it is flipped to an
///   explicit exclude instead of being removed,
/// - an include row made redundant by the compose (tuple shipped and still
///   desired) is deleted; guarded rows are left alone and only surfaced by
///   the useless-override query.
pub fn compute_changes(
    current: &RpmMappingTree,
    desired: &RpmMappingTree,
    base: &RpmMappingTree,
    overrides: &[OverrideRpm],
    release_id: &str,
    package: &str,
) -> Vec<Action> {
    let override_index: BTreeMap<TupleKey, &OverrideRpm> = overrides
        .iter()
        .map(|o| (tuple_key(&o.variant, &o.arch, &o.rpm_name, &o.rpm_arch), o))
        .collect();

    let mut actions: BTreeMap<TupleKey, Action> = BTreeMap::new();
    let stage =
        |actions: &mut BTreeMap<TupleKey, Action>, key: TupleKey, kind: ActionKind, include: bool| {
            actions.insert(
                key.clone(),
                Action {
                    action: kind,
                    release_id: release_id.to_string(),
                    variant: key.0,
                    arch: key.1,
                    srpm_name: package.to_string(),
                    rpm_name: key.2,
                    rpm_arch: key.3,
                    include,
                    comment: None,
                    do_not_delete: None,
                },
            );
        };

    // Tuples that need to become present
    for (variant, arch, rpm_name, rpm_arch) in desired.tuples() {
        if current.contains(variant, arch, rpm_name, rpm_arch) {
            continue;
        }
        // Whether or not a conflicting exclude row exists, a create with
        // include=true realizes presence: the persistence layer upserts by
        // key, flipping an exclude in place.
        stage(
            &mut actions,
            tuple_key(variant, arch, rpm_name, rpm_arch),
            ActionKind::Create,
            true,
        );
    }

    for (variant, arch, rpm_name, rpm_arch) in current.tuples() {
        let key = tuple_key(variant, arch, rpm_name, rpm_arch);
        let existing = override_index.get(&key).copied();
        let shipped = base.contains(variant, arch, rpm_name, rpm_arch);

        if desired.contains(variant, arch, rpm_name, rpm_arch) {
            // No state change needed, but an include row the compose makes
            // redundant can be cleaned up.
            if let Some(o) = existing {
                if o.include && shipped && !o.do_not_delete {
                    stage(&mut actions, key, ActionKind::Delete, true);
                }
            }
            continue;
        }

        // Tuple needs to become absent
        if shipped {
            // The compose really ships it: removal requires an explicit exclude
            stage(&mut actions, key, ActionKind::Create, false);
        } else if existing.is_some_and(|o| o.do_not_delete) {
            // Guarded include row: keep it, flip to an explicit exclude
            stage(&mut actions, key, ActionKind::Create, false);
        } else {
            // Present only through an include row: removing it reverts to
            // the compose-native absence
            let include = existing.map(|o| o.include).unwrap_or(true);
            stage(&mut actions, key, ActionKind::Delete, include);
        }
    }

    actions.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE: &str = "release-1.0";
    const PACKAGE: &str = "bash";

    fn tree(tuples: &[(&str, &str, &str, &str)]) -> RpmMappingTree {
        let mut t = RpmMappingTree::new();
        for (variant, arch, rpm_name, rpm_arch) in tuples {
            t.add(variant, arch, rpm_name, rpm_arch);
        }
        t
    }

    fn override_row(
        variant: &str,
        arch: &str,
        rpm_name: &str,
        rpm_arch: &str,
        include: bool,
        do_not_delete: bool,
    ) -> OverrideRpm {
        OverrideRpm {
            id: None,
            release_id: RELEASE.to_string(),
            variant: variant.to_string(),
            arch: arch.to_string(),
            srpm_name: PACKAGE.to_string(),
            rpm_name: rpm_name.to_string(),
            rpm_arch: rpm_arch.to_string(),
            include,
            comment: String::new(),
            do_not_delete,
        }
    }

    /// Apply an action list to a tree the way the persistence layer would,
    /// for round-trip assertions
    fn apply_to_tree(current: &RpmMappingTree, base: &RpmMappingTree, actions: &[Action]) -> RpmMappingTree {
        let mut result = current.clone();
        for action in actions {
            match action.action {
                ActionKind::Create => {
                    if action.include {
                        result.add(&action.variant, &action.arch, &action.rpm_name, &action.rpm_arch);
                    } else {
                        result.remove(&action.variant, &action.arch, &action.rpm_name, &action.rpm_arch);
                    }
                }
                ActionKind::Delete => {
                    // Removing an override reverts the tuple to whatever the
                    // compose natively ships
                    if base.contains(&action.variant, &action.arch, &action.rpm_name, &action.rpm_arch) {
                        result.add(&action.variant, &action.arch, &action.rpm_name, &action.rpm_arch);
                    } else {
                        result.remove(&action.variant, &action.arch, &action.rpm_name, &action.rpm_arch);
                    }
                }
            }
        }
        result
    }

    #[test]
    fn test_add_completely_new_mapping() {
        let base = tree(&[("Server", "x86_64", "bash", "x86_64")]);
        let current = base.clone();
        let desired = tree(&[
            ("Server", "x86_64", "bash", "x86_64"),
            ("Server", "x86_64", "bash", "src"),
        ]);

        let changes = compute_changes(&current, &desired, &base, &[], RELEASE, PACKAGE);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ActionKind::Create);
        assert!(changes[0].include);
        assert_eq!(changes[0].rpm_arch, "src");
        assert_eq!(changes[0].release_id, RELEASE);
        assert_eq!(changes[0].srpm_name, PACKAGE);
    }

    #[test]
    fn test_exclude_shipped_package() {
        // Desired empty, compose ships bash: one explicit exclude
        let base = tree(&[("Server", "x86_64", "bash", "x86_64")]);
        let current = base.clone();
        let desired = RpmMappingTree::new();

        let changes = compute_changes(&current, &desired, &base, &[], RELEASE, PACKAGE);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ActionKind::Create);
        assert!(!changes[0].include);
        assert_eq!(changes[0].variant, "Server");
        assert_eq!(changes[0].arch, "x86_64");
        assert_eq!(changes[0].rpm_name, "bash");
        assert_eq!(changes[0].rpm_arch, "x86_64");
    }

    #[test]
    fn test_remove_include_override() {
        // Tuple present only through an include row; dropping it deletes the row
        let base = RpmMappingTree::new();
        let overrides = [override_row("Server", "x86_64", "bash", "x86_64", true, false)];
        let current = tree(&[("Server", "x86_64", "bash", "x86_64")]);
        let desired = RpmMappingTree::new();

        let changes = compute_changes(&current, &desired, &base, &overrides, RELEASE, PACKAGE);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ActionKind::Delete);
        assert!(changes[0].include);
    }

    #[test]
    fn test_guarded_include_override_becomes_exclude() {
        // Same as above but the row is guarded: keep it, flip to exclude
        let base = RpmMappingTree::new();
        let overrides = [override_row("Server", "x86_64", "bash", "x86_64", true, true)];
        let current = tree(&[("Server", "x86_64", "bash", "x86_64")]);
        let desired = RpmMappingTree::new();

        let changes = compute_changes(&current, &desired, &base, &overrides, RELEASE, PACKAGE);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ActionKind::Create);
        assert!(!changes[0].include);
    }

    #[test]
    fn test_flip_conflicting_exclude() {
        // Compose ships bash but an exclude row hides it; wanting it back
        // yields a create that overwrites the exclude in place
        let base = tree(&[("Server", "x86_64", "bash", "x86_64")]);
        let overrides = [override_row("Server", "x86_64", "bash", "x86_64", false, false)];
        let current = resolve_current(&base, &overrides);
        assert!(current.is_empty());
        let desired = tree(&[("Server", "x86_64", "bash", "x86_64")]);

        let changes = compute_changes(&current, &desired, &base, &overrides, RELEASE, PACKAGE);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ActionKind::Create);
        assert!(changes[0].include);
    }

    #[test]
    fn test_redundant_include_override_is_deleted() {
        // Compose ships bash and an include row duplicates that; keeping the
        // mapping unchanged drops the redundant row
        let base = tree(&[("Server", "x86_64", "bash", "x86_64")]);
        let overrides = [override_row("Server", "x86_64", "bash", "x86_64", true, false)];
        let current = base.clone();
        let desired = base.clone();

        let changes = compute_changes(&current, &desired, &base, &overrides, RELEASE, PACKAGE);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ActionKind::Delete);
        assert!(changes[0].include);
    }

    #[test]
    fn test_redundant_guarded_include_override_is_kept() {
        let base = tree(&[("Server", "x86_64", "bash", "x86_64")]);
        let overrides = [override_row("Server", "x86_64", "bash", "x86_64", true, true)];
        let current = base.clone();
        let desired = base.clone();

        let changes = compute_changes(&current, &desired, &base, &overrides, RELEASE, PACKAGE);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_no_changes_for_equal_trees() {
        let base = tree(&[
            ("Server", "x86_64", "bash", "x86_64"),
            ("Client", "x86_64", "bash-doc", "noarch"),
        ]);
        let changes = compute_changes(&base, &base.clone(), &base, &[], RELEASE, PACKAGE);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_actions_are_ordered_and_unique() {
        let base = tree(&[
            ("Server", "x86_64", "bash", "x86_64"),
            ("Client", "ppc64", "bash", "ppc64"),
        ]);
        let current = base.clone();
        let desired = tree(&[("Workstation", "aarch64", "bash", "aarch64")]);

        let changes = compute_changes(&current, &desired, &base, &[], RELEASE, PACKAGE);
        let keys: Vec<_> = changes
            .iter()
            .map(|a| (a.variant.clone(), a.arch.clone(), a.rpm_name.clone(), a.rpm_arch.clone()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_diff_round_trip() {
        let base = tree(&[
            ("Server", "x86_64", "bash", "x86_64"),
            ("Server", "x86_64", "bash-doc", "noarch"),
        ]);
        let overrides = [override_row("Client", "x86_64", "bash", "i686", true, false)];
        let current = resolve_current(&base, &overrides);
        let desired = tree(&[
            ("Server", "x86_64", "bash", "x86_64"),
            ("Server", "x86_64", "bash", "src"),
            ("Client", "s390x", "bash", "s390x"),
        ]);

        let changes = compute_changes(&current, &desired, &base, &overrides, RELEASE, PACKAGE);
        let applied = apply_to_tree(&current, &base, &changes);
        assert_eq!(applied, desired);
    }

    #[test]
    fn test_diff_idempotence() {
        // After applying the first action list, a second diff is empty
        let base = tree(&[("Server", "x86_64", "bash", "x86_64")]);
        let current = base.clone();
        let desired = RpmMappingTree::new();

        let first = compute_changes(&current, &desired, &base, &[], RELEASE, PACKAGE);
        assert_eq!(first.len(), 1);

        // The create/exclude action materializes as an exclude row
        let new_overrides = [override_row("Server", "x86_64", "bash", "x86_64", false, false)];
        let new_current = apply_to_tree(&current, &base, &first);
        assert_eq!(new_current, desired);

        let second = compute_changes(&new_current, &desired, &base, &new_overrides, RELEASE, PACKAGE);
        assert!(second.is_empty());
    }

    fn resolve_current(base: &RpmMappingTree, overrides: &[OverrideRpm]) -> RpmMappingTree {
        let mut current = base.clone();
        current.merge_overrides(overrides);
        current
    }
}
