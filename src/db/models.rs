// src/db/models.rs

//! Data models for catalog database entities
//!
//! This module defines Rust structs that correspond to database tables and
//! provides methods for creating, reading, updating, and deleting records,
//! plus the specialized queries the mapping core consumes.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::compose::ComposeType;
use crate::error::{Error, Result};
use crate::mapping::diff::{Action, ActionKind};
use crate::mapping::resolver::BaseEntry;
use crate::version::RpmVersion;

fn from_sql_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::fmt::Display,
{
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            err.to_string(),
        )),
    )
}

/// A release: the scope that overrides and mapping lookups attach to
#[derive(Debug, Clone, Serialize)]
pub struct Release {
    pub id: Option<i64>,
    pub release_id: String,
    pub short: String,
    pub version: String,
    pub name: String,
    pub active: bool,
}

impl Release {
    pub fn new(release_id: String, short: String, version: String, name: String) -> Self {
        Self {
            id: None,
            release_id,
            short,
            version,
            name,
            active: true,
        }
    }

    /// Insert this release into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO releases (release_id, short, version, name, active)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &self.release_id,
                &self.short,
                &self.version,
                &self.name,
                self.active,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_release_id(conn: &Connection, release_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, release_id, short, version, name, active
             FROM releases WHERE release_id = ?1",
        )?;

        let release = stmt.query_row([release_id], Self::from_row).optional()?;
        Ok(release)
    }

    pub fn find_by_db_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, release_id, short, version, name, active
             FROM releases WHERE id = ?1",
        )?;

        let release = stmt.query_row([id], Self::from_row).optional()?;
        Ok(release)
    }

    pub(crate) fn db_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InitError(format!("release {} has no row id", self.release_id)))
    }

    /// Declare one variant.arch tree for this release
    pub fn add_tree(
        &self,
        conn: &Connection,
        variant_uid: &str,
        variant_name: &str,
        variant_type: &str,
        arch: &str,
    ) -> Result<()> {
        let release_id = self.db_id()?;
        conn.execute(
            "INSERT OR IGNORE INTO release_variants (release_id, variant_uid, variant_name, variant_type)
             VALUES (?1, ?2, ?3, ?4)",
            params![release_id, variant_uid, variant_name, variant_type],
        )?;
        let variant_id: i64 = conn.query_row(
            "SELECT id FROM release_variants WHERE release_id = ?1 AND variant_uid = ?2",
            params![release_id, variant_uid],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO release_variant_arches (release_variant_id, arch)
             VALUES (?1, ?2)",
            params![variant_id, arch],
        )?;
        Ok(())
    }

    /// The set of (variant_uid, arch) pairs this release declares
    pub fn trees(&self, conn: &Connection) -> Result<BTreeSet<(String, String)>> {
        let mut stmt = conn.prepare(
            "SELECT rv.variant_uid, rva.arch
             FROM release_variants rv
             JOIN release_variant_arches rva ON rva.release_variant_id = rv.id
             WHERE rv.release_id = ?1",
        )?;

        let trees = stmt
            .query_map([self.db_id()?], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;

        Ok(trees)
    }

    /// All composes built for this release or linked to it
    pub fn all_composes(&self, conn: &Connection) -> Result<Vec<Compose>> {
        let release_id = self.db_id()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.release_id, c.compose_id, c.compose_date, c.compose_type,
                    c.compose_respin, c.compose_label
             FROM composes c WHERE c.release_id = ?1
             UNION
             SELECT c.id, c.release_id, c.compose_id, c.compose_date, c.compose_type,
                    c.compose_respin, c.compose_label
             FROM composes c
             JOIN compose_linked_releases l ON l.compose_id = c.id
             WHERE l.release_id = ?1",
        )?;

        let composes = stmt
            .query_map([release_id], Compose::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(composes)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            release_id: row.get(1)?,
            short: row.get(2)?,
            version: row.get(3)?,
            name: row.get(4)?,
            active: row.get(5)?,
        })
    }
}

/// An immutable, dated snapshot of a release's built content
#[derive(Debug, Clone, Serialize)]
pub struct Compose {
    pub id: Option<i64>,
    /// Row id of the release this compose was built for
    pub release_id: i64,
    pub compose_id: String,
    pub compose_date: NaiveDate,
    pub compose_type: ComposeType,
    pub compose_respin: u32,
    pub compose_label: Option<String>,
}

impl Compose {
    /// Insert the compose unless a row with the same compose_id exists
    #[allow(clippy::too_many_arguments)]
    pub fn get_or_create(
        conn: &Connection,
        release: &Release,
        compose_id: &str,
        compose_date: NaiveDate,
        compose_type: ComposeType,
        compose_respin: u32,
        compose_label: Option<&str>,
    ) -> Result<(Self, bool)> {
        if let Some(existing) = Self::find_by_compose_id(conn, compose_id)? {
            return Ok((existing, false));
        }

        conn.execute(
            "INSERT INTO composes (release_id, compose_id, compose_date, compose_type,
                                   compose_respin, compose_label)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                release.db_id()?,
                compose_id,
                compose_date.format("%Y-%m-%d").to_string(),
                compose_type.to_string(),
                compose_respin,
                compose_label,
            ],
        )?;

        let compose = Self {
            id: Some(conn.last_insert_rowid()),
            release_id: release.db_id()?,
            compose_id: compose_id.to_string(),
            compose_date,
            compose_type,
            compose_respin,
            compose_label: compose_label.map(str::to_string),
        };
        Ok((compose, true))
    }

    pub fn find_by_compose_id(conn: &Connection, compose_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, release_id, compose_id, compose_date, compose_type,
                    compose_respin, compose_label
             FROM composes WHERE compose_id = ?1",
        )?;

        let compose = stmt.query_row([compose_id], Self::from_row).optional()?;
        Ok(compose)
    }

    pub(crate) fn db_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InitError(format!("compose {} has no row id", self.compose_id)))
    }

    /// Link this compose to another release (release aliasing)
    pub fn link_release(&self, conn: &Connection, release: &Release) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO compose_linked_releases (compose_id, release_id)
             VALUES (?1, ?2)",
            params![self.db_id()?, release.db_id()?],
        )?;
        Ok(())
    }

    /// All (variant, arch, rpm_name, rpm_arch) tuples this compose ships for
    /// one source package, restricted to trees in the release topology
    ///
    /// Compose variants are a snapshot of compose content; the restriction
    /// drops trees the release no longer declares.
    pub fn base_entries(
        &self,
        conn: &Connection,
        package: &str,
        topology: &BTreeSet<(String, String)>,
    ) -> Result<Vec<BaseEntry>> {
        let mut stmt = conn.prepare(
            "SELECT v.variant_uid, va.arch, r.name, r.arch
             FROM compose_rpms cr
             JOIN variant_arches va ON cr.variant_arch_id = va.id
             JOIN variants v ON va.variant_id = v.id
             JOIN rpms r ON cr.rpm_id = r.id
             WHERE v.compose_id = ?1 AND r.srpm_name = ?2
             ORDER BY v.variant_uid, va.arch, r.name, r.arch",
        )?;

        let rows = stmt.query_map(params![self.db_id()?, package], |row| {
            Ok(BaseEntry {
                variant: row.get(0)?,
                arch: row.get(1)?,
                rpm_name: row.get(2)?,
                rpm_arch: row.get(3)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let entry = row?;
            if !topology.contains(&(entry.variant.clone(), entry.arch.clone())) {
                continue;
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    /// All distinct RPMs with the given name shipped by this compose
    pub fn get_rpms(&self, conn: &Connection, rpm_name: &str) -> Result<Vec<Rpm>> {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT r.id, r.name, r.epoch, r.version, r.release, r.arch,
                             r.srpm_name, r.srpm_nevra, r.filename
             FROM rpms r
             JOIN compose_rpms cr ON cr.rpm_id = r.id
             JOIN variant_arches va ON cr.variant_arch_id = va.id
             JOIN variants v ON va.variant_id = v.id
             WHERE v.compose_id = ?1 AND r.name = ?2
             ORDER BY r.name, r.epoch, r.version, r.release, r.arch",
        )?;

        let rpms = stmt
            .query_map(params![self.db_id()?, rpm_name], Rpm::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rpms)
    }

    /// Composes of the same product shipping the given RPM, no newer than
    /// `max_date`, excluding one compose row
    pub fn candidates_with_rpm(
        conn: &Connection,
        short: &str,
        rpm_name: &str,
        max_date: NaiveDate,
        exclude_id: i64,
    ) -> Result<Vec<Compose>> {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT c.id, c.release_id, c.compose_id, c.compose_date, c.compose_type,
                             c.compose_respin, c.compose_label
             FROM composes c
             JOIN releases rel ON c.release_id = rel.id
             JOIN variants v ON v.compose_id = c.id
             JOIN variant_arches va ON va.variant_id = v.id
             JOIN compose_rpms cr ON cr.variant_arch_id = va.id
             JOIN rpms r ON r.id = cr.rpm_id
             WHERE rel.short = ?1 AND r.name = ?2 AND c.compose_date <= ?3 AND c.id != ?4",
        )?;

        let composes = stmt
            .query_map(
                params![
                    short,
                    rpm_name,
                    max_date.format("%Y-%m-%d").to_string(),
                    exclude_id
                ],
                Self::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(composes)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let date_str: String = row.get(3)?;
        let compose_date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .map_err(|e| from_sql_error(3, e))?;
        let type_str: String = row.get(4)?;
        let compose_type = ComposeType::parse(&type_str).map_err(|e| from_sql_error(4, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            release_id: row.get(1)?,
            compose_id: row.get(2)?,
            compose_date,
            compose_type,
            compose_respin: row.get(5)?,
            compose_label: row.get(6)?,
        })
    }
}

/// A variant row of one compose snapshot
pub struct Variant;

impl Variant {
    /// Insert the variant if missing, returning its row id
    pub fn get_or_create(
        conn: &Connection,
        compose_db_id: i64,
        variant_id: &str,
        variant_uid: &str,
        variant_name: &str,
        variant_type: &str,
    ) -> Result<i64> {
        conn.execute(
            "INSERT OR IGNORE INTO variants (compose_id, variant_id, variant_uid, variant_name, variant_type)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![compose_db_id, variant_id, variant_uid, variant_name, variant_type],
        )?;
        let id = conn.query_row(
            "SELECT id FROM variants WHERE compose_id = ?1 AND variant_uid = ?2",
            params![compose_db_id, variant_uid],
            |row| row.get(0),
        )?;
        Ok(id)
    }
}

/// One architecture of a compose variant
pub struct VariantArch;

impl VariantArch {
    /// Insert the variant arch if missing, returning its row id
    pub fn get_or_create(conn: &Connection, variant_db_id: i64, arch: &str) -> Result<i64> {
        conn.execute(
            "INSERT OR IGNORE INTO variant_arches (variant_id, arch) VALUES (?1, ?2)",
            params![variant_db_id, arch],
        )?;
        let id = conn.query_row(
            "SELECT id FROM variant_arches WHERE variant_id = ?1 AND arch = ?2",
            params![variant_db_id, arch],
            |row| row.get(0),
        )?;
        Ok(id)
    }
}

/// An RPM record, unique per NEVRA
#[derive(Debug, Clone, Serialize)]
pub struct Rpm {
    pub id: Option<i64>,
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub srpm_name: String,
    pub srpm_nevra: Option<String>,
    pub filename: String,
}

impl Rpm {
    /// Insert the RPM if missing, returning its row id
    #[allow(clippy::too_many_arguments)]
    pub fn get_or_create(
        conn: &Connection,
        name: &str,
        epoch: u64,
        version: &str,
        release: &str,
        arch: &str,
        srpm_name: &str,
        srpm_nevra: Option<&str>,
        filename: &str,
    ) -> Result<i64> {
        conn.execute(
            "INSERT OR IGNORE INTO rpms (name, epoch, version, release, arch, srpm_name, srpm_nevra, filename)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                name,
                epoch as i64,
                version,
                release,
                arch,
                srpm_name,
                srpm_nevra,
                filename
            ],
        )?;
        let id = conn.query_row(
            "SELECT id FROM rpms WHERE name = ?1 AND epoch = ?2 AND version = ?3
             AND release = ?4 AND arch = ?5",
            params![name, epoch as i64, version, release, arch],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, epoch, version, release, arch, srpm_name, srpm_nevra, filename
             FROM rpms WHERE name = ?1
             ORDER BY epoch, version, release, arch",
        )?;

        let rpms = stmt
            .query_map([name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rpms)
    }

    /// The comparable (epoch, version, release) key of this record
    pub fn version_key(&self) -> RpmVersion {
        RpmVersion {
            epoch: self.epoch,
            version: self.version.clone(),
            release: Some(self.release.clone()),
        }
    }

    pub fn nevra(&self) -> String {
        format!(
            "{}-{}:{}-{}.{}",
            self.name, self.epoch, self.version, self.release, self.arch
        )
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let epoch: i64 = row.get(2)?;
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            epoch: epoch as u64,
            version: row.get(3)?,
            release: row.get(4)?,
            arch: row.get(5)?,
            srpm_name: row.get(6)?,
            srpm_nevra: row.get(7)?,
            filename: row.get(8)?,
        })
    }
}

/// Placement of one RPM in one compose tree
pub struct ComposeRpm;

impl ComposeRpm {
    /// Record the placement unless it is already known
    pub fn insert_if_missing(
        conn: &Connection,
        variant_arch_id: i64,
        rpm_id: i64,
        sigkey: Option<&str>,
        path: &str,
    ) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO compose_rpms (variant_arch_id, rpm_id, sigkey, path)
             VALUES (?1, ?2, ?3, ?4)",
            params![variant_arch_id, rpm_id, sigkey, path],
        )?;
        Ok(())
    }
}

/// An override row: force-include or force-exclude one RPM name+arch within
/// a variant+arch+release scope
///
/// At most one row exists per (release, variant, arch, rpm_name, rpm_arch).
/// `srpm_name` is carried for grouping with compose content but is not part
/// of the key. `do_not_delete` guards the row against automated cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideRpm {
    pub id: Option<i64>,
    pub release_id: String,
    pub variant: String,
    pub arch: String,
    pub srpm_name: String,
    pub rpm_name: String,
    pub rpm_arch: String,
    pub include: bool,
    pub comment: String,
    pub do_not_delete: bool,
}

impl OverrideRpm {
    /// Insert this override into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO override_rpms (release_id, variant, arch, srpm_name, rpm_name,
                                        rpm_arch, include, comment, do_not_delete)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &self.release_id,
                &self.variant,
                &self.arch,
                &self.srpm_name,
                &self.rpm_name,
                &self.rpm_arch,
                self.include,
                &self.comment,
                self.do_not_delete,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_key(
        conn: &Connection,
        release_id: &str,
        variant: &str,
        arch: &str,
        rpm_name: &str,
        rpm_arch: &str,
    ) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, release_id, variant, arch, srpm_name, rpm_name, rpm_arch,
                    include, comment, do_not_delete
             FROM override_rpms
             WHERE release_id = ?1 AND variant = ?2 AND arch = ?3
               AND rpm_name = ?4 AND rpm_arch = ?5",
        )?;

        let row = stmt
            .query_row(
                params![release_id, variant, arch, rpm_name, rpm_arch],
                Self::from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All overrides for one release and source package
    pub fn find_for_release_package(
        conn: &Connection,
        release_id: &str,
        srpm_name: &str,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, release_id, variant, arch, srpm_name, rpm_name, rpm_arch,
                    include, comment, do_not_delete
             FROM override_rpms
             WHERE release_id = ?1 AND srpm_name = ?2
             ORDER BY variant, arch, rpm_name, rpm_arch",
        )?;

        let rows = stmt
            .query_map(params![release_id, srpm_name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn list_for_release(conn: &Connection, release_id: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, release_id, variant, arch, srpm_name, rpm_name, rpm_arch,
                    include, comment, do_not_delete
             FROM override_rpms
             WHERE release_id = ?1
             ORDER BY variant, arch, rpm_name, rpm_arch",
        )?;

        let rows = stmt
            .query_map([release_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// The audit payload of this row, as recorded in change entries
    pub fn export(&self) -> Value {
        json!({
            "release_id": self.release_id,
            "variant": self.variant,
            "arch": self.arch,
            "srpm_name": self.srpm_name,
            "rpm_name": self.rpm_name,
            "rpm_arch": self.rpm_arch,
            "include": self.include,
            "comment": self.comment,
            "do_not_delete": self.do_not_delete,
        })
    }

    /// Apply one diff action to the override table
    ///
    /// `create` upserts by key: `include` is overwritten, while `comment`
    /// and `do_not_delete` are taken from the action only when supplied and
    /// otherwise preserved. `delete` removes the row, unless the row (or the
    /// action) is guarded by do_not_delete, in which case the row is kept
    /// and its include flag flipped to the negation of the action's value.
    ///
    /// Returns (row id, old value, new value) for the audit log, or None if
    /// there was nothing to do.
    pub fn apply_action(conn: &Connection, action: &Action) -> Result<Option<(i64, Value, Value)>> {
        let existing = Self::find_by_key(
            conn,
            &action.release_id,
            &action.variant,
            &action.arch,
            &action.rpm_name,
            &action.rpm_arch,
        )?;

        match action.action {
            ActionKind::Create => {
                if let Some(mut row) = existing {
                    let old = row.export();
                    row.include = action.include;
                    if let Some(comment) = &action.comment {
                        row.comment = comment.clone();
                    }
                    if let Some(do_not_delete) = action.do_not_delete {
                        row.do_not_delete = do_not_delete;
                    }
                    let id = row
                        .id
                        .ok_or_else(|| Error::InitError("override row without id".to_string()))?;
                    conn.execute(
                        "UPDATE override_rpms SET include = ?1, comment = ?2, do_not_delete = ?3
                         WHERE id = ?4",
                        params![row.include, &row.comment, row.do_not_delete, id],
                    )?;
                    Ok(Some((id, old, row.export())))
                } else {
                    let mut row = OverrideRpm {
                        id: None,
                        release_id: action.release_id.clone(),
                        variant: action.variant.clone(),
                        arch: action.arch.clone(),
                        srpm_name: action.srpm_name.clone(),
                        rpm_name: action.rpm_name.clone(),
                        rpm_arch: action.rpm_arch.clone(),
                        include: action.include,
                        comment: action.comment.clone().unwrap_or_default(),
                        do_not_delete: action.do_not_delete.unwrap_or(false),
                    };
                    let id = row.insert(conn)?;
                    Ok(Some((id, Value::Null, row.export())))
                }
            }
            ActionKind::Delete => {
                let Some(mut row) = existing else {
                    debug!(
                        "Delete action for missing override {}.{} {}.{}, nothing to do",
                        action.variant, action.arch, action.rpm_name, action.rpm_arch
                    );
                    return Ok(None);
                };
                let old = row.export();
                let id = row
                    .id
                    .ok_or_else(|| Error::InitError("override row without id".to_string()))?;
                let guarded = row.do_not_delete || action.do_not_delete == Some(true);
                if guarded {
                    row.include = !action.include;
                    row.do_not_delete = true;
                    if let Some(comment) = &action.comment {
                        row.comment = comment.clone();
                    }
                    conn.execute(
                        "UPDATE override_rpms SET include = ?1, comment = ?2, do_not_delete = 1
                         WHERE id = ?3",
                        params![row.include, &row.comment, id],
                    )?;
                    Ok(Some((id, old, row.export())))
                } else {
                    conn.execute("DELETE FROM override_rpms WHERE id = ?1", [id])?;
                    Ok(Some((id, old, Value::Null)))
                }
            }
        }
    }

    /// Delete all overrides of a release, returning the removed rows
    ///
    /// Guarded rows survive unless `force` is set.
    pub fn clear_for_release(conn: &Connection, release_id: &str, force: bool) -> Result<Vec<Self>> {
        let rows = Self::list_for_release(conn, release_id)?;
        let mut deleted = Vec::new();
        for row in rows {
            if row.do_not_delete && !force {
                continue;
            }
            if let Some(id) = row.id {
                conn.execute("DELETE FROM override_rpms WHERE id = ?1", [id])?;
            }
            deleted.push(row);
        }
        Ok(deleted)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            release_id: row.get(1)?,
            variant: row.get(2)?,
            arch: row.get(3)?,
            srpm_name: row.get(4)?,
            rpm_name: row.get(5)?,
            rpm_arch: row.get(6)?,
            include: row.get(7)?,
            comment: row.get(8)?,
            do_not_delete: row.get(9)?,
        })
    }
}

/// A changeset groups the audit entries of one write request
///
/// Changes added via `add` are buffered in memory; `commit` stores the
/// changeset and its entries, and stores nothing when no change survived
/// the no-op filter.
#[derive(Debug, Clone)]
pub struct Changeset {
    pub id: Option<i64>,
    pub author: Option<String>,
    pub comment: Option<String>,
    pub committed_at: Option<String>,
    pending: Vec<Change>,
}

impl Changeset {
    pub fn new(author: Option<String>, comment: Option<String>) -> Self {
        Self {
            id: None,
            author,
            comment,
            committed_at: None,
            pending: Vec::new(),
        }
    }

    /// Record one change; logging that nothing changed is useless, so equal
    /// old and new values are dropped
    pub fn add(&mut self, target_class: &str, target_id: i64, old_value: Value, new_value: Value) {
        if old_value == new_value {
            return;
        }
        self.pending.push(Change {
            id: None,
            changeset_id: None,
            target_class: target_class.to_string(),
            target_id,
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Store the changeset and its entries; returns the changeset id, or
    /// None when there was nothing to record
    pub fn commit(&mut self, conn: &Connection) -> Result<Option<i64>> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        conn.execute(
            "INSERT INTO changesets (author, comment) VALUES (?1, ?2)",
            params![&self.author, &self.comment],
        )?;
        let changeset_id = conn.last_insert_rowid();
        self.id = Some(changeset_id);

        for change in &mut self.pending {
            conn.execute(
                "INSERT INTO changes (changeset_id, target_class, target_id, old_value, new_value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    changeset_id,
                    &change.target_class,
                    change.target_id,
                    &change.old_value,
                    &change.new_value,
                ],
            )?;
            change.id = Some(conn.last_insert_rowid());
            change.changeset_id = Some(changeset_id);
        }

        debug!(
            "Committed changeset {} with {} changes",
            changeset_id,
            self.pending.len()
        );
        Ok(Some(changeset_id))
    }
}

/// One audited row mutation
#[derive(Debug, Clone, Serialize)]
pub struct Change {
    pub id: Option<i64>,
    pub changeset_id: Option<i64>,
    pub target_class: String,
    pub target_id: i64,
    pub old_value: String,
    pub new_value: String,
}

impl Change {
    pub fn list_for_changeset(conn: &Connection, changeset_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, changeset_id, target_class, target_id, old_value, new_value
             FROM changes WHERE changeset_id = ?1 ORDER BY id",
        )?;

        let changes = stmt
            .query_map([changeset_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(changes)
    }

    /// Check if a change is an insertion
    pub fn is_insert(&self) -> bool {
        self.old_value == "null" && self.new_value != "null"
    }

    /// Check if a change is a deletion
    pub fn is_delete(&self) -> bool {
        self.old_value != "null" && self.new_value == "null"
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            changeset_id: Some(row.get(1)?),
            target_class: row.get(2)?,
            target_id: row.get(3)?,
            old_value: row.get(4)?,
            new_value: row.get(5)?,
        })
    }
}
