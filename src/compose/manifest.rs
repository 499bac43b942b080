// src/compose/manifest.rs

//! Compose manifest documents.
//!
//! A compose is imported from two JSON documents: the compose info (identity
//! plus variant/arch layout) and the RPM manifest (every shipped RPM keyed
//! by variant, arch and source package NEVRA).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Top-level compose info document
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeInfo {
    pub compose: ComposeHeader,
    pub variants: BTreeMap<String, VariantInfo>,
}

/// Compose identity header
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeHeader {
    pub id: String,
    /// Compose date in YYYYMMDD form
    pub date: String,
    #[serde(rename = "type")]
    pub compose_type: String,
    pub respin: u32,
    #[serde(default)]
    pub label: Option<String>,
}

impl ComposeHeader {
    pub fn parsed_date(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y%m%d")
            .map_err(|_| Error::ParseError(format!("invalid compose date '{}'", self.date)))
    }
}

/// One variant in the compose info document
#[derive(Debug, Clone, Deserialize)]
pub struct VariantInfo {
    pub id: String,
    pub uid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub variant_type: String,
    pub arches: Vec<String>,
}

/// RPM manifest: variant -> arch -> srpm NEVRA -> rpm NEVRA -> entry
#[derive(Debug, Clone, Deserialize)]
pub struct RpmManifest {
    pub rpms: BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, RpmManifestEntry>>>>,
}

/// Per-RPM payload in the manifest
#[derive(Debug, Clone, Deserialize)]
pub struct RpmManifestEntry {
    pub path: String,
    #[serde(default)]
    pub sigkey: Option<String>,
    pub category: String,
}

impl ComposeInfo {
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

impl RpmManifest {
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

/// A parsed `name-epoch:version-release.arch` string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nevra {
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl Nevra {
    /// Parse a NEVRA string as found in RPM manifests
    ///
    /// The epoch may be omitted ("bash-4.2.46-19.el7.x86_64") and defaults
    /// to 0.
    pub fn parse(s: &str) -> Result<Self> {
        let malformed = || Error::ParseError(format!("malformed NEVRA '{}'", s));

        let (rest, arch) = s.rsplit_once('.').ok_or_else(malformed)?;
        let (rest, release) = rest.rsplit_once('-').ok_or_else(malformed)?;
        let (name, ev) = rest.rsplit_once('-').ok_or_else(malformed)?;
        if name.is_empty() || ev.is_empty() || release.is_empty() || arch.is_empty() {
            return Err(malformed());
        }

        let (epoch, version) = match ev.split_once(':') {
            Some((e, v)) => {
                let epoch = e.parse::<u64>().map_err(|_| malformed())?;
                (epoch, v)
            }
            None => (0, ev),
        };
        if version.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            name: name.to_string(),
            epoch,
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
        })
    }
}
