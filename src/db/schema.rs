// src/db/schema.rs

//! Database schema definitions and migrations
//!
//! This module defines the SQLite schema for all catalog tables and provides
//! a migration system to evolve the schema over time.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        debug!("Schema is up to date");
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => panic!("Unknown migration version: {}", version),
    }
}

/// Initial schema - Version 1
///
/// Creates all catalog tables:
/// - releases + release topology (variant/arch pairs)
/// - composes: immutable snapshots, linked to releases
/// - rpms and per-tree compose content
/// - override_rpms: include/exclude rules layered over compose content
/// - changesets/changes: the audit log
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        -- Releases: the scope overrides and mappings attach to
        CREATE TABLE releases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            release_id TEXT NOT NULL UNIQUE,
            short TEXT NOT NULL,
            version TEXT NOT NULL,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE INDEX idx_releases_short ON releases(short);

        -- Release topology: the variant.arch trees a release declares
        CREATE TABLE release_variants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            release_id INTEGER NOT NULL,
            variant_uid TEXT NOT NULL,
            variant_name TEXT NOT NULL,
            variant_type TEXT NOT NULL,
            UNIQUE(release_id, variant_uid),
            FOREIGN KEY (release_id) REFERENCES releases(id) ON DELETE CASCADE
        );

        CREATE TABLE release_variant_arches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            release_variant_id INTEGER NOT NULL,
            arch TEXT NOT NULL,
            UNIQUE(release_variant_id, arch),
            FOREIGN KEY (release_variant_id) REFERENCES release_variants(id) ON DELETE CASCADE
        );

        -- Composes: immutable dated snapshots of built content
        CREATE TABLE composes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            release_id INTEGER NOT NULL,
            compose_id TEXT NOT NULL UNIQUE,
            compose_date TEXT NOT NULL,
            compose_type TEXT NOT NULL CHECK(compose_type IN ('test', 'nightly', 'production')),
            compose_respin INTEGER NOT NULL,
            compose_label TEXT,
            imported_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(release_id, compose_date, compose_type, compose_respin),
            FOREIGN KEY (release_id) REFERENCES releases(id)
        );

        CREATE INDEX idx_composes_release_id ON composes(release_id);

        -- Compose aliasing: composes visible from other releases
        CREATE TABLE compose_linked_releases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            compose_id INTEGER NOT NULL,
            release_id INTEGER NOT NULL,
            UNIQUE(compose_id, release_id),
            FOREIGN KEY (compose_id) REFERENCES composes(id) ON DELETE CASCADE,
            FOREIGN KEY (release_id) REFERENCES releases(id) ON DELETE CASCADE
        );

        -- Compose content layout: snapshot of the variants a compose shipped.
        -- Deliberately separate from release_variants; a compose may carry
        -- trees its release no longer lists.
        CREATE TABLE variants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            compose_id INTEGER NOT NULL,
            variant_id TEXT NOT NULL,
            variant_uid TEXT NOT NULL,
            variant_name TEXT NOT NULL,
            variant_type TEXT NOT NULL,
            UNIQUE(compose_id, variant_uid),
            FOREIGN KEY (compose_id) REFERENCES composes(id) ON DELETE CASCADE
        );

        CREATE TABLE variant_arches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            variant_id INTEGER NOT NULL,
            arch TEXT NOT NULL,
            UNIQUE(variant_id, arch),
            FOREIGN KEY (variant_id) REFERENCES variants(id) ON DELETE CASCADE
        );

        -- RPM records, unique per NEVRA
        CREATE TABLE rpms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            epoch INTEGER NOT NULL,
            version TEXT NOT NULL,
            release TEXT NOT NULL,
            arch TEXT NOT NULL,
            srpm_name TEXT NOT NULL,
            srpm_nevra TEXT,
            filename TEXT NOT NULL,
            UNIQUE(name, epoch, version, release, arch)
        );

        CREATE INDEX idx_rpms_name ON rpms(name);
        CREATE INDEX idx_rpms_srpm_name ON rpms(srpm_name);

        -- Which RPM sits in which compose tree
        CREATE TABLE compose_rpms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            variant_arch_id INTEGER NOT NULL,
            rpm_id INTEGER NOT NULL,
            sigkey TEXT,
            path TEXT NOT NULL,
            UNIQUE(variant_arch_id, rpm_id),
            FOREIGN KEY (variant_arch_id) REFERENCES variant_arches(id) ON DELETE CASCADE,
            FOREIGN KEY (rpm_id) REFERENCES rpms(id)
        );

        CREATE INDEX idx_compose_rpms_rpm_id ON compose_rpms(rpm_id);

        -- Override rows: one per (release, variant, arch, rpm_name, rpm_arch)
        CREATE TABLE override_rpms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            release_id TEXT NOT NULL,
            variant TEXT NOT NULL,
            arch TEXT NOT NULL,
            srpm_name TEXT NOT NULL,
            rpm_name TEXT NOT NULL,
            rpm_arch TEXT NOT NULL,
            include INTEGER NOT NULL DEFAULT 1,
            comment TEXT NOT NULL DEFAULT '',
            do_not_delete INTEGER NOT NULL DEFAULT 0,
            UNIQUE(release_id, variant, arch, rpm_name, rpm_arch),
            FOREIGN KEY (release_id) REFERENCES releases(release_id) ON DELETE CASCADE
        );

        CREATE INDEX idx_override_rpms_release_srpm ON override_rpms(release_id, srpm_name);

        -- Audit log: one changeset per write request, one change per row touched
        CREATE TABLE changesets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            author TEXT,
            comment TEXT,
            committed_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE changes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            changeset_id INTEGER NOT NULL,
            target_class TEXT NOT NULL,
            target_id INTEGER NOT NULL,
            old_value TEXT NOT NULL,
            new_value TEXT NOT NULL,
            FOREIGN KEY (changeset_id) REFERENCES changesets(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_changes_changeset_id ON changes(changeset_id);
        CREATE INDEX idx_changes_target ON changes(target_class, target_id);
        ",
    )?;

    Ok(())
}
