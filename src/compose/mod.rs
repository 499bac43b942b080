// src/compose/mod.rs

//! Compose domain types: compose classification, latest-compose selection,
//! and manifest parsing for compose import.

pub mod manifest;
pub mod selector;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Classification of a compose
///
/// The declaration order is the priority order used as the final tiebreak
/// when selecting the latest compose: test < nightly < production.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ComposeType {
    Test,
    Nightly,
    Production,
}

impl ComposeType {
    /// Parse a compose type name, reporting the offending value on failure
    pub fn parse(s: &str) -> crate::Result<Self> {
        Self::from_str(s).map_err(|_| {
            crate::Error::ParseError(format!("unknown compose type '{}'", s))
        })
    }
}
