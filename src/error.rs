// src/error.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Database access failed
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Initialization or state error (bad paths, missing ids, ...)
    #[error("{0}")]
    InitError(String),

    /// A version or dependency expression could not be parsed
    #[error("invalid version expression: {0}")]
    InvalidVersionExpression(String),

    /// A mapping referenced a variant.arch pair the release does not have
    #[error("unknown tree location: {0}")]
    UnknownTreeLocation(String),

    /// Entity lookup came back empty
    #[error("not found: {0}")]
    NotFoundError(String),

    /// Malformed input data (manifests, action lists, ...)
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
