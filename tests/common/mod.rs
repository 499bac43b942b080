// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

use composedb::catalog::{self, TreeSpec};
use composedb::db;
use tempfile::TempDir;

/// Composeinfo for the older, production compose
pub const COMPOSEINFO_GA: &str = r#"{
    "compose": {
        "id": "awesome-1.0-20240401.0",
        "date": "20240401",
        "type": "production",
        "respin": 0
    },
    "variants": {
        "Server": {
            "id": "Server",
            "uid": "Server",
            "name": "Server",
            "type": "variant",
            "arches": ["x86_64"]
        },
        "Client": {
            "id": "Client",
            "uid": "Client",
            "name": "Client",
            "type": "variant",
            "arches": ["x86_64"]
        }
    }
}"#;

pub const RPM_MANIFEST_GA: &str = r#"{
    "rpms": {
        "Server": {
            "x86_64": {
                "bash-0:4.2.46-19.el7.src": {
                    "bash-0:4.2.46-19.el7.x86_64": {
                        "path": "Server/x86_64/os/Packages/bash-4.2.46-19.el7.x86_64.rpm",
                        "sigkey": "fd431d51",
                        "category": "binary"
                    },
                    "bash-doc-0:4.2.46-19.el7.noarch": {
                        "path": "Server/x86_64/os/Packages/bash-doc-4.2.46-19.el7.noarch.rpm",
                        "sigkey": "fd431d51",
                        "category": "binary"
                    }
                }
            }
        },
        "Client": {
            "x86_64": {
                "bash-0:4.2.46-19.el7.src": {
                    "bash-0:4.2.46-19.el7.x86_64": {
                        "path": "Client/x86_64/os/Packages/bash-4.2.46-19.el7.x86_64.rpm",
                        "sigkey": "fd431d51",
                        "category": "binary"
                    }
                }
            }
        }
    }
}"#;

/// Composeinfo for the newer, nightly compose
pub const COMPOSEINFO_NIGHTLY: &str = r#"{
    "compose": {
        "id": "awesome-1.0-20240501.n.0",
        "date": "20240501",
        "type": "nightly",
        "respin": 0
    },
    "variants": {
        "Server": {
            "id": "Server",
            "uid": "Server",
            "name": "Server",
            "type": "variant",
            "arches": ["x86_64"]
        },
        "Client": {
            "id": "Client",
            "uid": "Client",
            "name": "Client",
            "type": "variant",
            "arches": ["x86_64"]
        }
    }
}"#;

pub const RPM_MANIFEST_NIGHTLY: &str = r#"{
    "rpms": {
        "Server": {
            "x86_64": {
                "bash-0:4.2.46-20.el7.src": {
                    "bash-0:4.2.46-20.el7.x86_64": {
                        "path": "Server/x86_64/os/Packages/bash-4.2.46-20.el7.x86_64.rpm",
                        "sigkey": "fd431d51",
                        "category": "binary"
                    },
                    "bash-doc-0:4.2.46-20.el7.noarch": {
                        "path": "Server/x86_64/os/Packages/bash-doc-4.2.46-20.el7.noarch.rpm",
                        "sigkey": "fd431d51",
                        "category": "binary"
                    }
                }
            }
        },
        "Client": {
            "x86_64": {
                "bash-0:4.2.46-20.el7.src": {
                    "bash-0:4.2.46-20.el7.x86_64": {
                        "path": "Client/x86_64/os/Packages/bash-4.2.46-20.el7.x86_64.rpm",
                        "sigkey": "fd431d51",
                        "category": "binary"
                    }
                }
            }
        }
    }
}"#;

pub const RELEASE_ID: &str = "awesome-1.0";

/// Create a catalog database with one release and two imported composes.
///
/// Returns (TempDir, db_path) - keep the TempDir alive to prevent cleanup.
pub fn setup_catalog_db() -> (TempDir, String) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir
        .path()
        .join("catalog.db")
        .to_str()
        .unwrap()
        .to_string();

    db::init(&db_path).unwrap();
    let mut conn = db::open(&db_path).unwrap();

    let trees = vec![
        TreeSpec {
            variant_uid: "Server".to_string(),
            variant_name: "Server".to_string(),
            variant_type: "variant".to_string(),
            arches: vec!["x86_64".to_string()],
        },
        TreeSpec {
            variant_uid: "Client".to_string(),
            variant_name: "Client".to_string(),
            variant_type: "variant".to_string(),
            arches: vec!["x86_64".to_string()],
        },
    ];
    catalog::create_release(
        &mut conn,
        RELEASE_ID,
        "awesome",
        "1.0",
        "Awesome Release",
        &trees,
        Some("setup"),
    )
    .unwrap();

    catalog::import_compose(&mut conn, RELEASE_ID, COMPOSEINFO_GA, RPM_MANIFEST_GA, Some("setup"))
        .unwrap();
    catalog::import_compose(
        &mut conn,
        RELEASE_ID,
        COMPOSEINFO_NIGHTLY,
        RPM_MANIFEST_NIGHTLY,
        Some("setup"),
    )
    .unwrap();

    (temp_dir, db_path)
}
