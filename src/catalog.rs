// src/catalog.rs

//! Request-level catalog operations.
//!
//! Each function here is one logical request: it loads everything it needs
//! in one transaction/snapshot, runs the pure mapping core over the loaded
//! rows, and (for writes) applies the resulting actions together with their
//! audit entries atomically.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::compose::manifest::{ComposeInfo, Nevra, RpmManifest};
use crate::compose::selector::{self, TypeFilter};
use crate::compose::ComposeType;
use crate::db;
use crate::db::models::{
    Changeset, Compose, ComposeRpm, OverrideRpm, Release, Rpm, Variant, VariantArch,
};
use crate::error::{Error, Result};
use crate::mapping::diff::{compute_changes, Action};
use crate::mapping::resolver::{self, BaseEntry};
use crate::mapping::tree::{PlainMapping, RpmMappingTree};
use crate::version::{RpmVersion, VersionConstraint, VersionFilter};

/// Declaration of one release variant and its arches
#[derive(Debug, Clone)]
pub struct TreeSpec {
    pub variant_uid: String,
    pub variant_name: String,
    pub variant_type: String,
    pub arches: Vec<String>,
}

/// Result of a mapping lookup
#[derive(Debug, Clone, Serialize)]
pub struct MappingLookup {
    /// Compose the mapping was computed from, absent for override-only results
    pub compose: Option<String>,
    pub mapping: PlainMapping,
}

/// Result of an older-compose search
#[derive(Debug, Clone, Serialize)]
pub struct OlderCompose {
    pub compose: String,
    pub packages: Vec<String>,
}

fn require_release(conn: &Connection, release_id: &str) -> Result<Release> {
    Release::find_by_release_id(conn, release_id)?
        .ok_or_else(|| Error::NotFoundError(format!("release {}", release_id)))
}

fn require_compose(conn: &Connection, compose_id: &str) -> Result<Compose> {
    Compose::find_by_compose_id(conn, compose_id)?
        .ok_or_else(|| Error::NotFoundError(format!("compose {}", compose_id)))
}

/// Everything one mapping request reads, loaded from a single snapshot
struct MappingState {
    compose: Option<Compose>,
    base_entries: Vec<BaseEntry>,
    overrides: Vec<OverrideRpm>,
    topology: BTreeSet<(String, String)>,
}

fn load_mapping_state(conn: &Connection, release: &Release, package: &str) -> Result<MappingState> {
    let topology = release.trees(conn)?;
    let composes = release.all_composes(conn)?;
    let compose = selector::latest(&composes).cloned();
    let base_entries = match &compose {
        Some(compose) => compose.base_entries(conn, package, &topology)?,
        None => Vec::new(),
    };
    let overrides = OverrideRpm::find_for_release_package(conn, &release.release_id, package)?;
    Ok(MappingState {
        compose,
        base_entries,
        overrides,
        topology,
    })
}

/// Create a release together with its variant.arch topology
pub fn create_release(
    conn: &mut Connection,
    release_id: &str,
    short: &str,
    version: &str,
    name: &str,
    trees: &[TreeSpec],
    author: Option<&str>,
) -> Result<Release> {
    db::transaction(conn, |tx| {
        if Release::find_by_release_id(tx, release_id)?.is_some() {
            return Err(Error::InitError(format!(
                "release {} already exists",
                release_id
            )));
        }

        let mut release = Release::new(
            release_id.to_string(),
            short.to_string(),
            version.to_string(),
            name.to_string(),
        );
        let id = release.insert(tx)?;
        for tree in trees {
            for arch in &tree.arches {
                release.add_tree(tx, &tree.variant_uid, &tree.variant_name, &tree.variant_type, arch)?;
            }
        }

        let mut changeset = Changeset::new(
            author.map(str::to_string),
            Some(format!("create release {}", release_id)),
        );
        changeset.add("release", id, Value::Null, serde_json::to_value(&release)?);
        changeset.commit(tx)?;

        info!("Created release {}", release_id);
        Ok(release)
    })
}

/// Resolve the effective RPM mapping for one package in a release
///
/// The mapping comes from the latest compose built for or linked to the
/// release; without any compose it is resolved from include overrides alone.
/// A structurally empty result means the package is not present at all and
/// is reported as not found.
pub fn get_rpm_mapping(
    conn: &Connection,
    release_id: &str,
    package: &str,
    disable_overrides: bool,
) -> Result<MappingLookup> {
    let release = require_release(conn, release_id)?;
    let state = load_mapping_state(conn, &release, package)?;
    let tree = resolver::resolve(&state.base_entries, &state.overrides, disable_overrides);

    if tree.is_empty() {
        return Err(Error::NotFoundError(format!(
            "package {} not present in release {}",
            package, release_id
        )));
    }

    Ok(MappingLookup {
        compose: state.compose.map(|c| c.compose_id),
        mapping: tree.to_plain(),
    })
}

fn apply_action_list(
    conn: &Connection,
    release_id: &str,
    actions: &[Action],
    author: Option<&str>,
    comment: String,
) -> Result<()> {
    let mut changeset = Changeset::new(author.map(str::to_string), Some(comment));
    for action in actions {
        if action.release_id != release_id {
            return Err(Error::ParseError(format!(
                "action for release {} cannot be applied to {}",
                action.release_id, release_id
            )));
        }
        if let Some((id, old_value, new_value)) = OverrideRpm::apply_action(conn, action)? {
            changeset.add("overriderpm", id, old_value, new_value);
        }
    }
    changeset.commit(conn)?;
    Ok(())
}

/// Compute (and optionally apply) the changes that realize a desired mapping
///
/// The desired tree must stay within the release's variant.arch topology.
/// With `perform` unset this is a dry-run: the action list is returned but
/// nothing is written, mirroring a preview-then-confirm workflow. With
/// `perform` set, reading, diffing and applying happen in one transaction.
pub fn update_rpm_mapping(
    conn: &mut Connection,
    release_id: &str,
    package: &str,
    desired_plain: &PlainMapping,
    perform: bool,
    author: Option<&str>,
) -> Result<Vec<Action>> {
    db::transaction(conn, |tx| {
        let release = require_release(tx, release_id)?;
        let state = load_mapping_state(tx, &release, package)?;

        let desired = RpmMappingTree::from_plain(desired_plain);
        for (variant, arch) in desired.tree_locations() {
            if !state.topology.contains(&(variant.clone(), arch.clone())) {
                return Err(Error::UnknownTreeLocation(format!(
                    "{}.{} not in release {}",
                    variant, arch, release_id
                )));
            }
        }

        let base = resolver::seed_tree(&state.base_entries);
        let current = resolver::resolve(&state.base_entries, &state.overrides, false);
        let actions = compute_changes(
            &current,
            &desired,
            &base,
            &state.overrides,
            release_id,
            package,
        );

        if perform && !actions.is_empty() {
            apply_action_list(
                tx,
                release_id,
                &actions,
                author,
                format!("update rpm mapping of {} in {}", package, release_id),
            )?;
            info!(
                "Applied {} mapping changes for {} in {}",
                actions.len(),
                package,
                release_id
            );
        }

        Ok(actions)
    })
}

/// Apply an explicit action list (the confirm step of a preview workflow)
pub fn apply_changes(
    conn: &mut Connection,
    release_id: &str,
    actions: &[Action],
    author: Option<&str>,
) -> Result<()> {
    db::transaction(conn, |tx| {
        require_release(tx, release_id)?;
        apply_action_list(
            tx,
            release_id,
            actions,
            author,
            format!("apply {} override changes in {}", actions.len(), release_id),
        )
    })
}

/// Report override rows that currently change nothing
///
/// These are include rows for tuples the latest compose already ships, and
/// exclude rows for tuples it does not ship. Rows guarded by do_not_delete
/// require operator confirmation before removal; nothing is deleted here.
pub fn useless_overrides(
    conn: &Connection,
    release_id: &str,
    package: &str,
) -> Result<Vec<OverrideRpm>> {
    let release = require_release(conn, release_id)?;
    let state = load_mapping_state(conn, &release, package)?;
    let base = resolver::seed_tree(&state.base_entries);
    let useless: Vec<OverrideRpm> = resolver::useless_overrides(&base, &state.overrides)
        .into_iter()
        .cloned()
        .collect();
    if !useless.is_empty() {
        warn!(
            "{} override(s) for {} in {} have no effect",
            useless.len(),
            package,
            release_id
        );
    }
    Ok(useless)
}

/// Delete all overrides of a release, keeping guarded rows unless forced
pub fn clear_overrides(
    conn: &mut Connection,
    release_id: &str,
    force: bool,
    author: Option<&str>,
) -> Result<Vec<OverrideRpm>> {
    db::transaction(conn, |tx| {
        require_release(tx, release_id)?;
        let deleted = OverrideRpm::clear_for_release(tx, release_id, force)?;

        let mut changeset = Changeset::new(
            author.map(str::to_string),
            Some(format!("clear overrides of {}", release_id)),
        );
        for row in &deleted {
            if let Some(id) = row.id {
                changeset.add("overriderpm", id, row.export(), Value::Null);
            }
        }
        changeset.commit(tx)?;

        info!("Cleared {} override(s) of {}", deleted.len(), release_id);
        Ok(deleted)
    })
}

/// Import a compose snapshot from composeinfo and RPM manifest documents
///
/// Import is idempotent: re-importing the same compose adds nothing twice.
/// RPM row ids are memoized in a per-import map keyed by NEVRA.
pub fn import_compose(
    conn: &mut Connection,
    release_id: &str,
    composeinfo_json: &str,
    rpm_manifest_json: &str,
    author: Option<&str>,
) -> Result<Compose> {
    db::transaction(conn, |tx| {
        let release = require_release(tx, release_id)?;
        let info = ComposeInfo::from_json(composeinfo_json)?;
        let manifest = RpmManifest::from_json(rpm_manifest_json)?;

        let compose_type = ComposeType::parse(&info.compose.compose_type)?;
        let compose_date = info.compose.parsed_date()?;
        let (compose, created) = Compose::get_or_create(
            tx,
            &release,
            &info.compose.id,
            compose_date,
            compose_type,
            info.compose.respin,
            info.compose.label.as_deref(),
        )?;

        let mut changeset = Changeset::new(
            author.map(str::to_string),
            Some(format!("import compose {}", info.compose.id)),
        );
        if created {
            changeset.add(
                "compose",
                compose.db_id()?,
                Value::Null,
                serde_json::to_value(&compose)?,
            );
        }

        let mut variant_arch_ids: BTreeMap<(String, String), i64> = BTreeMap::new();
        for variant in info.variants.values() {
            let variant_db_id = Variant::get_or_create(
                tx,
                compose.db_id()?,
                &variant.id,
                &variant.uid,
                &variant.name,
                &variant.variant_type,
            )?;
            for arch in &variant.arches {
                let variant_arch_id = VariantArch::get_or_create(tx, variant_db_id, arch)?;
                variant_arch_ids.insert((variant.uid.clone(), arch.clone()), variant_arch_id);
            }
        }

        let mut rpm_ids: HashMap<String, i64> = HashMap::new();
        let mut imported = 0usize;
        for (variant_uid, arches) in &manifest.rpms {
            for (arch, srpms) in arches {
                let Some(&variant_arch_id) =
                    variant_arch_ids.get(&(variant_uid.clone(), arch.clone()))
                else {
                    return Err(Error::ParseError(format!(
                        "rpm manifest references tree {}.{} missing from compose info",
                        variant_uid, arch
                    )));
                };
                for (srpm_nevra, rpms) in srpms {
                    let srpm = Nevra::parse(srpm_nevra)?;
                    for (rpm_nevra, entry) in rpms {
                        let rpm_id = match rpm_ids.get(rpm_nevra) {
                            Some(&id) => id,
                            None => {
                                let nevra = Nevra::parse(rpm_nevra)?;
                                // srpm_nevra is empty exactly for source RPMs
                                let srpm_nevra_field = if nevra.arch == "src" {
                                    None
                                } else {
                                    Some(srpm_nevra.as_str())
                                };
                                let filename = entry
                                    .path
                                    .rsplit('/')
                                    .next()
                                    .unwrap_or(entry.path.as_str());
                                let id = Rpm::get_or_create(
                                    tx,
                                    &nevra.name,
                                    nevra.epoch,
                                    &nevra.version,
                                    &nevra.release,
                                    &nevra.arch,
                                    &srpm.name,
                                    srpm_nevra_field,
                                    filename,
                                )?;
                                rpm_ids.insert(rpm_nevra.clone(), id);
                                id
                            }
                        };
                        ComposeRpm::insert_if_missing(
                            tx,
                            variant_arch_id,
                            rpm_id,
                            entry.sigkey.as_deref(),
                            &entry.path,
                        )?;
                        imported += 1;
                    }
                }
            }
        }

        changeset.commit(tx)?;
        info!(
            "Imported compose {} ({} rpm placements)",
            compose.compose_id, imported
        );
        Ok(compose)
    })
}

/// Find the newest compose older than the given one that ships a different
/// version of the named RPM
pub fn find_older_compose(
    conn: &Connection,
    compose_id: &str,
    rpm_name: &str,
    filter: &TypeFilter,
) -> Result<OlderCompose> {
    let compose = require_compose(conn, compose_id)?;
    let release = Release::find_by_db_id(conn, compose.release_id)?.ok_or_else(|| {
        Error::InitError(format!("compose {} has no release row", compose_id))
    })?;

    let current_keys: BTreeSet<RpmVersion> = compose
        .get_rpms(conn, rpm_name)?
        .iter()
        .map(Rpm::version_key)
        .collect();

    let mut candidates = Compose::candidates_with_rpm(
        conn,
        &release.short,
        rpm_name,
        compose.compose_date,
        compose.db_id()?,
    )?;
    candidates.retain(|c| filter.accepts(c.compose_type));
    candidates.sort_by_key(selector::sort_key);

    for candidate in candidates.iter().rev() {
        let rpms = candidate.get_rpms(conn, rpm_name)?;
        let keys: BTreeSet<RpmVersion> = rpms.iter().map(Rpm::version_key).collect();
        // Does the candidate ship a version the current compose does not?
        if keys.difference(&current_keys).next().is_some() {
            return Ok(OlderCompose {
                compose: candidate.compose_id.clone(),
                packages: rpms.iter().map(Rpm::nevra).collect(),
            });
        }
    }

    Err(Error::NotFoundError(format!(
        "no older compose with earlier version of {}",
        rpm_name
    )))
}

/// List RPM records matching version filter expressions
///
/// All expressions must target the same package name; several expressions
/// combine into a range that a record must satisfy as a whole.
pub fn find_rpms(conn: &Connection, exprs: &[String]) -> Result<Vec<Rpm>> {
    if exprs.is_empty() {
        return Err(Error::InvalidVersionExpression(
            "at least one filter expression is required".to_string(),
        ));
    }

    let mut filters = Vec::new();
    for expr in exprs {
        filters.push(VersionFilter::parse(expr)?);
    }
    let name = filters[0].name.clone();
    if filters.iter().any(|f| f.name != name) {
        return Err(Error::InvalidVersionExpression(
            "all filter expressions must target the same package name".to_string(),
        ));
    }

    let combined: Option<VersionConstraint> = filters
        .into_iter()
        .filter_map(|f| f.constraint)
        .reduce(VersionConstraint::and);

    let rpms = Rpm::find_by_name(conn, &name)?;
    Ok(rpms
        .into_iter()
        .filter(|rpm| match &combined {
            Some(constraint) => constraint.satisfies(&rpm.version_key()),
            None => true,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();
        let conn = db::init(&path).unwrap();
        (temp_file, conn)
    }

    fn server_tree() -> Vec<TreeSpec> {
        vec![TreeSpec {
            variant_uid: "Server".to_string(),
            variant_name: "Server".to_string(),
            variant_type: "variant".to_string(),
            arches: vec!["x86_64".to_string()],
        }]
    }

    #[test]
    fn test_mapping_for_missing_release_is_not_found() {
        let (_temp, conn) = create_test_db();
        let err = get_rpm_mapping(&conn, "release-1.0", "bash", false).unwrap_err();
        assert!(matches!(err, Error::NotFoundError(_)));
    }

    #[test]
    fn test_mapping_without_compose_or_overrides_is_not_found() {
        let (_temp, mut conn) = create_test_db();
        create_release(&mut conn, "release-1.0", "release", "1.0", "Test", &server_tree(), None)
            .unwrap();

        let err = get_rpm_mapping(&conn, "release-1.0", "bash", false).unwrap_err();
        assert!(matches!(err, Error::NotFoundError(_)));
    }

    #[test]
    fn test_overrides_only_mapping_without_compose() {
        let (_temp, mut conn) = create_test_db();
        create_release(&mut conn, "release-1.0", "release", "1.0", "Test", &server_tree(), None)
            .unwrap();

        let actions = vec![Action {
            action: crate::mapping::ActionKind::Create,
            release_id: "release-1.0".to_string(),
            variant: "Server".to_string(),
            arch: "x86_64".to_string(),
            srpm_name: "bash".to_string(),
            rpm_name: "bash".to_string(),
            rpm_arch: "x86_64".to_string(),
            include: true,
            comment: None,
            do_not_delete: None,
        }];
        apply_changes(&mut conn, "release-1.0", &actions, Some("tester")).unwrap();

        let lookup = get_rpm_mapping(&conn, "release-1.0", "bash", false).unwrap();
        assert!(lookup.compose.is_none());
        assert_eq!(lookup.mapping["Server"]["x86_64"]["bash"], vec!["x86_64"]);
    }

    #[test]
    fn test_update_rejects_unknown_tree_location() {
        let (_temp, mut conn) = create_test_db();
        create_release(&mut conn, "release-1.0", "release", "1.0", "Test", &server_tree(), None)
            .unwrap();

        let mut desired = PlainMapping::new();
        desired
            .entry("Workstation".to_string())
            .or_default()
            .entry("aarch64".to_string())
            .or_default()
            .insert("bash".to_string(), vec!["aarch64".to_string()]);

        let err = update_rpm_mapping(&mut conn, "release-1.0", "bash", &desired, false, None)
            .unwrap_err();
        match err {
            Error::UnknownTreeLocation(msg) => {
                assert!(msg.contains("Workstation.aarch64"));
            }
            other => panic!("expected UnknownTreeLocation, got {:?}", other),
        }
    }

    #[test]
    fn test_find_rpms_with_range() {
        let (_temp, conn) = create_test_db();
        for version in ["2.5.0", "2.7.0", "3.1.0"] {
            Rpm::get_or_create(
                &conn,
                "python",
                0,
                version,
                "1.el7",
                "x86_64",
                "python",
                Some("python-src.src"),
                "python.rpm",
            )
            .unwrap();
        }

        let rpms = find_rpms(
            &conn,
            &["python>=2.6.0".to_string(), "python<3.0.0".to_string()],
        )
        .unwrap();
        assert_eq!(rpms.len(), 1);
        assert_eq!(rpms[0].version, "2.7.0");

        let err = find_rpms(&conn, &["python>=2.6.0".to_string(), "bash<3.0".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidVersionExpression(_)));
    }
}
