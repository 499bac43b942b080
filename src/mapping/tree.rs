// src/mapping/tree.rs

//! The nested RPM-to-tree mapping structure.
//!
//! An [`RpmMappingTree`] records which RPM architectures of which binary
//! packages are present in each variant/arch tree:
//! `variant_uid -> arch -> rpm_name -> {rpm_arch}`. It is a computed
//! projection over compose content and override rows, built fresh per query
//! and never persisted directly.

use std::collections::{BTreeMap, BTreeSet};

use crate::db::models::OverrideRpm;

/// Plain nested mapping as serialized to callers, with rpm_arch lists sorted
pub type PlainMapping = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>;

/// Nested mapping of variant -> arch -> rpm_name -> set of rpm arches
///
/// Empty containers are pruned on removal, so structural equality reflects
/// only meaningfully present content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpmMappingTree {
    data: BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeSet<String>>>>,
}

impl RpmMappingTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether nothing is present
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Record presence of one (variant, arch, rpm_name, rpm_arch) tuple
    ///
    /// Inserting the same tuple twice has no additional effect.
    pub fn add(&mut self, variant: &str, arch: &str, rpm_name: &str, rpm_arch: &str) {
        self.data
            .entry(variant.to_string())
            .or_default()
            .entry(arch.to_string())
            .or_default()
            .entry(rpm_name.to_string())
            .or_default()
            .insert(rpm_arch.to_string());
    }

    /// Remove one tuple, pruning any containers the removal empties
    ///
    /// Removing an absent tuple is a no-op.
    pub fn remove(&mut self, variant: &str, arch: &str, rpm_name: &str, rpm_arch: &str) {
        let Some(arches) = self.data.get_mut(variant) else {
            return;
        };
        let Some(rpms) = arches.get_mut(arch) else {
            return;
        };
        let Some(rpm_arches) = rpms.get_mut(rpm_name) else {
            return;
        };
        rpm_arches.remove(rpm_arch);
        if rpm_arches.is_empty() {
            rpms.remove(rpm_name);
        }
        if rpms.is_empty() {
            arches.remove(arch);
        }
        if arches.is_empty() {
            self.data.remove(variant);
        }
    }

    /// Check presence of one tuple
    pub fn contains(&self, variant: &str, arch: &str, rpm_name: &str, rpm_arch: &str) -> bool {
        self.data
            .get(variant)
            .and_then(|arches| arches.get(arch))
            .and_then(|rpms| rpms.get(rpm_name))
            .is_some_and(|rpm_arches| rpm_arches.contains(rpm_arch))
    }

    /// Iterate all present tuples in (variant, arch, rpm_name, rpm_arch) order
    pub fn tuples(&self) -> impl Iterator<Item = (&str, &str, &str, &str)> {
        self.data.iter().flat_map(|(variant, arches)| {
            arches.iter().flat_map(move |(arch, rpms)| {
                rpms.iter().flat_map(move |(rpm_name, rpm_arches)| {
                    rpm_arches.iter().map(move |rpm_arch| {
                        (
                            variant.as_str(),
                            arch.as_str(),
                            rpm_name.as_str(),
                            rpm_arch.as_str(),
                        )
                    })
                })
            })
        })
    }

    /// Apply override rows: include rows add their tuple, exclude rows remove it
    pub fn merge_overrides(&mut self, overrides: &[OverrideRpm]) {
        for override_rpm in overrides {
            if override_rpm.include {
                self.add(
                    &override_rpm.variant,
                    &override_rpm.arch,
                    &override_rpm.rpm_name,
                    &override_rpm.rpm_arch,
                );
            } else {
                self.remove(
                    &override_rpm.variant,
                    &override_rpm.arch,
                    &override_rpm.rpm_name,
                    &override_rpm.rpm_arch,
                );
            }
        }
    }

    /// Produce the plain nested mapping with sorted rpm_arch lists
    pub fn to_plain(&self) -> PlainMapping {
        self.data
            .iter()
            .map(|(variant, arches)| {
                let arches = arches
                    .iter()
                    .map(|(arch, rpms)| {
                        let rpms = rpms
                            .iter()
                            .map(|(rpm_name, rpm_arches)| {
                                (
                                    rpm_name.clone(),
                                    rpm_arches.iter().cloned().collect::<Vec<_>>(),
                                )
                            })
                            .collect();
                        (arch.clone(), rpms)
                    })
                    .collect();
                (variant.clone(), arches)
            })
            .collect()
    }

    /// Build a tree from a plain nested mapping, ignoring empty containers
    pub fn from_plain(plain: &PlainMapping) -> Self {
        let mut tree = Self::new();
        for (variant, arches) in plain {
            for (arch, rpms) in arches {
                for (rpm_name, rpm_arches) in rpms {
                    for rpm_arch in rpm_arches {
                        tree.add(variant, arch, rpm_name, rpm_arch);
                    }
                }
            }
        }
        tree
    }

    /// The set of (variant, arch) pairs the tree touches
    pub fn tree_locations(&self) -> BTreeSet<(String, String)> {
        self.data
            .iter()
            .flat_map(|(variant, arches)| {
                arches
                    .keys()
                    .map(move |arch| (variant.clone(), arch.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn override_row(
        variant: &str,
        arch: &str,
        rpm_name: &str,
        rpm_arch: &str,
        include: bool,
    ) -> OverrideRpm {
        OverrideRpm {
            id: None,
            release_id: "release-1.0".to_string(),
            variant: variant.to_string(),
            arch: arch.to_string(),
            srpm_name: "bash".to_string(),
            rpm_name: rpm_name.to_string(),
            rpm_arch: rpm_arch.to_string(),
            include,
            comment: String::new(),
            do_not_delete: false,
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut tree = RpmMappingTree::new();
        tree.add("Server", "x86_64", "bash", "x86_64");
        let once = tree.clone();
        tree.add("Server", "x86_64", "bash", "x86_64");
        assert_eq!(tree, once);
    }

    #[test]
    fn test_remove_prunes_empty_levels() {
        let mut tree = RpmMappingTree::new();
        tree.add("Server", "x86_64", "bash", "x86_64");
        tree.add("Server", "x86_64", "bash", "i686");
        tree.remove("Server", "x86_64", "bash", "i686");
        assert!(tree.contains("Server", "x86_64", "bash", "x86_64"));

        tree.remove("Server", "x86_64", "bash", "x86_64");
        assert!(tree.is_empty());
        assert!(tree.to_plain().is_empty());
    }

    #[test]
    fn test_no_empty_leaves_after_any_sequence() {
        let mut tree = RpmMappingTree::new();
        tree.add("Server", "x86_64", "bash", "x86_64");
        tree.add("Server", "ppc64", "bash", "ppc64");
        tree.add("Client", "x86_64", "bash-doc", "noarch");
        tree.remove("Server", "ppc64", "bash", "ppc64");
        tree.remove("Client", "x86_64", "bash-doc", "noarch");
        tree.remove("Client", "x86_64", "bash-doc", "noarch");

        let plain = tree.to_plain();
        for arches in plain.values() {
            assert!(!arches.is_empty());
            for rpms in arches.values() {
                assert!(!rpms.is_empty());
                for rpm_arches in rpms.values() {
                    assert!(!rpm_arches.is_empty());
                }
            }
        }
        assert_eq!(plain.len(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut tree = RpmMappingTree::new();
        tree.remove("Server", "x86_64", "bash", "x86_64");
        assert!(tree.is_empty());
    }

    #[test]
    fn test_to_plain_sorts_arches() {
        let mut tree = RpmMappingTree::new();
        tree.add("Server", "x86_64", "bash", "x86_64");
        tree.add("Server", "x86_64", "bash", "i686");
        let plain = tree.to_plain();
        assert_eq!(plain["Server"]["x86_64"]["bash"], vec!["i686", "x86_64"]);
    }

    #[test]
    fn test_merge_overrides() {
        let mut tree = RpmMappingTree::new();
        tree.add("Server", "x86_64", "bash", "x86_64");
        tree.merge_overrides(&[
            override_row("Server", "x86_64", "bash-doc", "noarch", true),
            override_row("Server", "x86_64", "bash", "x86_64", false),
            // Exclude of an absent tuple is a no-op
            override_row("Client", "x86_64", "bash", "x86_64", false),
        ]);

        assert!(tree.contains("Server", "x86_64", "bash-doc", "noarch"));
        assert!(!tree.contains("Server", "x86_64", "bash", "x86_64"));
    }

    #[test]
    fn test_from_plain_round_trip() {
        let mut tree = RpmMappingTree::new();
        tree.add("Server", "x86_64", "bash", "x86_64");
        tree.add("Server", "x86_64", "bash", "src");
        tree.add("Client", "s390x", "bash-doc", "noarch");

        let rebuilt = RpmMappingTree::from_plain(&tree.to_plain());
        assert_eq!(rebuilt, tree);
    }

    #[test]
    fn test_tuples_are_ordered() {
        let mut tree = RpmMappingTree::new();
        tree.add("Server", "x86_64", "bash", "x86_64");
        tree.add("Client", "x86_64", "bash", "i686");
        tree.add("Client", "ppc64", "bash", "ppc64");

        let tuples: Vec<_> = tree.tuples().collect();
        assert_eq!(
            tuples,
            vec![
                ("Client", "ppc64", "bash", "ppc64"),
                ("Client", "x86_64", "bash", "i686"),
                ("Server", "x86_64", "bash", "x86_64"),
            ]
        );
    }

    #[test]
    fn test_tree_locations() {
        let mut tree = RpmMappingTree::new();
        tree.add("Server", "x86_64", "bash", "x86_64");
        tree.add("Server", "ppc64", "bash", "ppc64");
        let locations = tree.tree_locations();
        assert!(locations.contains(&("Server".to_string(), "x86_64".to_string())));
        assert!(locations.contains(&("Server".to_string(), "ppc64".to_string())));
        assert_eq!(locations.len(), 2);
    }
}
