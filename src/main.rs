// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use composedb::catalog::{self, TreeSpec};
use composedb::compose::selector::TypeFilter;
use composedb::{Action, ComposeType, PlainMapping};
use std::fs;
use std::str::FromStr;
use tracing::info;

const DEFAULT_DB_PATH: &str = "/var/lib/composedb/composedb.db";

#[derive(Parser)]
#[command(name = "composedb")]
#[command(author, version, about = "Compose metadata catalog with RPM mapping overrides and change auditing", long_about = None)]
struct Cli {
    /// Database path
    #[arg(long, global = true, default_value = DEFAULT_DB_PATH)]
    db_path: String,

    /// Author recorded in the audit log for write operations
    #[arg(long, global = true)]
    author: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the catalog database
    Init,
    /// Create a release with its variant.arch topology
    CreateRelease {
        release_id: String,
        /// Product short name
        #[arg(long)]
        short: String,
        /// Release version
        #[arg(long)]
        version: String,
        /// Human readable name
        #[arg(long)]
        name: String,
        /// Tree declaration, e.g. "Server:x86_64,ppc64" (repeatable)
        #[arg(long = "tree")]
        trees: Vec<String>,
    },
    /// Import a compose from composeinfo and RPM manifest JSON files
    ImportCompose {
        release_id: String,
        composeinfo: String,
        rpm_manifest: String,
    },
    /// Show the effective RPM mapping of a package in a release
    Mapping {
        release_id: String,
        package: String,
        /// Show the raw compose mapping without applying overrides
        #[arg(long)]
        disable_overrides: bool,
    },
    /// Compute the override changes that realize a desired mapping
    SetMapping {
        release_id: String,
        package: String,
        /// JSON file with the desired mapping {variant: {arch: {name: [rpm_arch]}}}
        mapping_file: String,
        /// Apply the computed changes instead of only printing them
        #[arg(long)]
        perform: bool,
    },
    /// Apply an explicit action list produced by set-mapping
    ApplyChanges {
        release_id: String,
        /// JSON file with the action list
        actions_file: String,
    },
    /// List override rows of a release
    Overrides { release_id: String },
    /// Delete override rows of a release
    ClearOverrides {
        release_id: String,
        /// Also delete rows guarded by do_not_delete
        #[arg(long)]
        force: bool,
    },
    /// List override rows that currently change nothing
    UselessOverrides {
        release_id: String,
        package: String,
    },
    /// Find the newest older compose shipping a different version of an RPM
    OlderCompose {
        compose_id: String,
        rpm_name: String,
        /// Only consider composes of this type
        #[arg(long)]
        included_compose_type: Option<String>,
        /// Ignore composes of this type
        #[arg(long)]
        excluded_compose_type: Option<String>,
    },
    /// List RPM records matching version filter expressions
    Rpms {
        /// Filter expression name[op][epoch:]version[-release] (repeatable)
        #[arg(required = true)]
        filters: Vec<String>,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a "Server:x86_64,ppc64" tree declaration
fn parse_tree_spec(spec: &str) -> Result<TreeSpec> {
    let (variant_uid, arches) = spec
        .split_once(':')
        .with_context(|| format!("invalid tree spec '{}', expected VARIANT:ARCH[,ARCH...]", spec))?;
    let arches: Vec<String> = arches
        .split(',')
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    if variant_uid.is_empty() || arches.is_empty() {
        anyhow::bail!("invalid tree spec '{}', expected VARIANT:ARCH[,ARCH...]", spec);
    }
    Ok(TreeSpec {
        variant_uid: variant_uid.to_string(),
        variant_name: variant_uid.to_string(),
        variant_type: "variant".to_string(),
        arches,
    })
}

fn parse_type(value: Option<&str>) -> Result<Option<ComposeType>> {
    value
        .map(|s| {
            ComposeType::from_str(s).map_err(|_| anyhow::anyhow!("unknown compose type '{}'", s))
        })
        .transpose()
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let author = cli.author.as_deref();

    match cli.command {
        Commands::Init => {
            composedb::db::init(&cli.db_path)?;
            println!("Database initialized at: {}", cli.db_path);
        }
        Commands::CreateRelease {
            release_id,
            short,
            version,
            name,
            trees,
        } => {
            let specs = trees
                .iter()
                .map(|s| parse_tree_spec(s))
                .collect::<Result<Vec<_>>>()?;
            let mut conn = composedb::db::open(&cli.db_path)?;
            let release = catalog::create_release(
                &mut conn,
                &release_id,
                &short,
                &version,
                &name,
                &specs,
                author,
            )?;
            print_json(&release)?;
        }
        Commands::ImportCompose {
            release_id,
            composeinfo,
            rpm_manifest,
        } => {
            let composeinfo_data = fs::read_to_string(&composeinfo)
                .with_context(|| format!("reading {}", composeinfo))?;
            let manifest_data = fs::read_to_string(&rpm_manifest)
                .with_context(|| format!("reading {}", rpm_manifest))?;
            let mut conn = composedb::db::open(&cli.db_path)?;
            let compose = catalog::import_compose(
                &mut conn,
                &release_id,
                &composeinfo_data,
                &manifest_data,
                author,
            )?;
            info!("Imported compose {}", compose.compose_id);
            print_json(&compose)?;
        }
        Commands::Mapping {
            release_id,
            package,
            disable_overrides,
        } => {
            let conn = composedb::db::open(&cli.db_path)?;
            let lookup = catalog::get_rpm_mapping(&conn, &release_id, &package, disable_overrides)?;
            print_json(&lookup)?;
        }
        Commands::SetMapping {
            release_id,
            package,
            mapping_file,
            perform,
        } => {
            let data = fs::read_to_string(&mapping_file)
                .with_context(|| format!("reading {}", mapping_file))?;
            let desired: PlainMapping = serde_json::from_str(&data)
                .with_context(|| format!("parsing desired mapping from {}", mapping_file))?;
            let mut conn = composedb::db::open(&cli.db_path)?;
            let actions = catalog::update_rpm_mapping(
                &mut conn,
                &release_id,
                &package,
                &desired,
                perform,
                author,
            )?;
            print_json(&actions)?;
        }
        Commands::ApplyChanges {
            release_id,
            actions_file,
        } => {
            let data = fs::read_to_string(&actions_file)
                .with_context(|| format!("reading {}", actions_file))?;
            let actions: Vec<Action> = serde_json::from_str(&data)
                .with_context(|| format!("parsing action list from {}", actions_file))?;
            let mut conn = composedb::db::open(&cli.db_path)?;
            catalog::apply_changes(&mut conn, &release_id, &actions, author)?;
            println!("Applied {} change(s)", actions.len());
        }
        Commands::Overrides { release_id } => {
            let conn = composedb::db::open(&cli.db_path)?;
            let rows = composedb::db::models::OverrideRpm::list_for_release(&conn, &release_id)?;
            print_json(&rows)?;
        }
        Commands::ClearOverrides { release_id, force } => {
            let mut conn = composedb::db::open(&cli.db_path)?;
            let deleted = catalog::clear_overrides(&mut conn, &release_id, force, author)?;
            print_json(&deleted)?;
        }
        Commands::UselessOverrides {
            release_id,
            package,
        } => {
            let conn = composedb::db::open(&cli.db_path)?;
            let rows = catalog::useless_overrides(&conn, &release_id, &package)?;
            print_json(&rows)?;
        }
        Commands::OlderCompose {
            compose_id,
            rpm_name,
            included_compose_type,
            excluded_compose_type,
        } => {
            let filter = TypeFilter {
                included: parse_type(included_compose_type.as_deref())?,
                excluded: parse_type(excluded_compose_type.as_deref())?,
            };
            let conn = composedb::db::open(&cli.db_path)?;
            let older = catalog::find_older_compose(&conn, &compose_id, &rpm_name, &filter)?;
            print_json(&older)?;
        }
        Commands::Rpms { filters } => {
            let conn = composedb::db::open(&cli.db_path)?;
            let rpms = catalog::find_rpms(&conn, &filters)?;
            print_json(&rpms)?;
        }
    }

    Ok(())
}
