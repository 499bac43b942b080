// src/version/mod.rs

//! Version handling and constraint matching for RPM records
//!
//! This module provides parsing and comparison for RPM-style versions in the
//! `[epoch:]version[-release]` format, and filter expressions of the form
//! `name[op][epoch:]version[-release]` used to narrow RPM queries by version.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// A parsed RPM version with epoch, version, and release components
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RpmVersion {
    pub epoch: u64,
    pub version: String,
    pub release: Option<String>,
}

impl RpmVersion {
    /// Parse an RPM version string
    ///
    /// Format: [epoch:]version[-release]
    /// Examples:
    /// - "1.2.3" → epoch=0, version="1.2.3", release=None
    /// - "2:1.2.3" → epoch=2, version="1.2.3", release=None
    /// - "1.2.3-4.el8" → epoch=0, version="1.2.3", release=Some("4.el8")
    /// - "1:2.3.4-5.el8" → epoch=1, version="2.3.4", release=Some("5.el8")
    pub fn parse(s: &str) -> Result<Self> {
        let (epoch_str, rest) = if let Some(colon_pos) = s.find(':') {
            let (e, r) = s.split_at(colon_pos);
            (e, &r[1..]) // Skip the colon
        } else {
            ("0", s)
        };

        let epoch = if epoch_str.is_empty() {
            0 // Empty epoch (e.g., ":1.0.0") defaults to 0
        } else {
            epoch_str.parse::<u64>().map_err(|_| {
                Error::InvalidVersionExpression(format!("invalid epoch in version '{}'", s))
            })?
        };

        // The release is everything after the last dash; version strings
        // themselves never contain dashes in well-formed NEVRs.
        let (version, release) = if let Some(dash_pos) = rest.rfind('-') {
            let (v, r) = rest.split_at(dash_pos);
            (v.to_string(), Some(r[1..].to_string()))
        } else {
            (rest.to_string(), None)
        };

        if version.is_empty() {
            return Err(Error::InvalidVersionExpression(format!(
                "empty version component in '{}'",
                s
            )));
        }

        Ok(Self {
            epoch,
            version,
            release,
        })
    }

    /// Compare two RPM versions
    ///
    /// Epoch dominates: a higher epoch outranks any version/release at a
    /// lower epoch. With equal epochs, `version` and then `release` are
    /// compared with RPM-style segment comparison (see [`compare_evr_part`]).
    pub fn compare(&self, other: &RpmVersion) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match compare_evr_part(&self.version, &other.version) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match (&self.release, &other.release) {
            (Some(a), Some(b)) => compare_evr_part(a, b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}

impl fmt::Display for RpmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

impl Ord for RpmVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for RpmVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One maximal run of digits or non-digits within a version segment
#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Num(&'a str),
    Alpha(&'a str),
}

/// Split a version segment into alternating digit and non-digit runs
fn tokenize(segment: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let bytes = segment.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        let is_digit = bytes[start].is_ascii_digit();
        let mut end = start + 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() == is_digit {
            end += 1;
        }
        let run = &segment[start..end];
        tokens.push(if is_digit {
            Token::Num(run)
        } else {
            Token::Alpha(run)
        });
        start = end;
    }
    tokens
}

/// Compare two digit runs as arbitrary-precision integers
fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.cmp(b),
        ord => ord,
    }
}

/// Compare one version or release string segment-by-segment
///
/// Segments are separated by dots. Within a segment, digit runs compare
/// numerically and non-digit runs byte-wise. A missing run or segment sorts
/// below both an alphabetic and a numeric one, so "1.2" < "1.2.0" and
/// "1.0" < "1.0a".
pub fn compare_evr_part(a: &str, b: &str) -> Ordering {
    let mut a_segments = a.split('.');
    let mut b_segments = b.split('.');
    loop {
        match (a_segments.next(), b_segments.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(sa), Some(sb)) => match compare_segment(sa, sb) {
                Ordering::Equal => {}
                ord => return ord,
            },
        }
    }
}

fn compare_segment(a: &str, b: &str) -> Ordering {
    let a_tokens = tokenize(a);
    let b_tokens = tokenize(b);
    let mut a_iter = a_tokens.iter();
    let mut b_iter = b_tokens.iter();
    loop {
        match (a_iter.next(), b_iter.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(ta), Some(tb)) => {
                let ord = match (ta, tb) {
                    (Token::Num(na), Token::Num(nb)) => compare_numeric(na, nb),
                    (Token::Alpha(aa), Token::Alpha(ab)) => aa.cmp(ab),
                    // Mixed runs at the same position: numeric outranks alphabetic
                    (Token::Num(_), Token::Alpha(_)) => Ordering::Greater,
                    (Token::Alpha(_), Token::Num(_)) => Ordering::Less,
                };
                match ord {
                    Ordering::Equal => {}
                    ord => return ord,
                }
            }
        }
    }
}

/// Version constraint operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Exact version match
    Exact(RpmVersion),
    /// Greater than
    GreaterThan(RpmVersion),
    /// Greater than or equal
    GreaterOrEqual(RpmVersion),
    /// Less than
    LessThan(RpmVersion),
    /// Less than or equal
    LessOrEqual(RpmVersion),
    /// Both constraints must be satisfied (for ranges like ">=1.0 with <2.0")
    And(Box<VersionConstraint>, Box<VersionConstraint>),
}

impl VersionConstraint {
    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &RpmVersion) -> bool {
        match self {
            VersionConstraint::Exact(v) => version == v,
            VersionConstraint::GreaterThan(v) => version > v,
            VersionConstraint::GreaterOrEqual(v) => version >= v,
            VersionConstraint::LessThan(v) => version < v,
            VersionConstraint::LessOrEqual(v) => version <= v,
            VersionConstraint::And(left, right) => {
                left.satisfies(version) && right.satisfies(version)
            }
        }
    }

    /// Combine two constraints into a range that requires both
    pub fn and(self, other: VersionConstraint) -> VersionConstraint {
        VersionConstraint::And(Box::new(self), Box::new(other))
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Exact(v) => write!(f, "={}", v),
            VersionConstraint::GreaterThan(v) => write!(f, ">{}", v),
            VersionConstraint::GreaterOrEqual(v) => write!(f, ">={}", v),
            VersionConstraint::LessThan(v) => write!(f, "<{}", v),
            VersionConstraint::LessOrEqual(v) => write!(f, "<={}", v),
            VersionConstraint::And(left, right) => write!(f, "{},{}", left, right),
        }
    }
}

/// A parsed `name[op][epoch:]version[-release]` filter expression
///
/// Examples:
/// - "bash" → name only, any version matches
/// - "bash>=4.2" → GreaterOrEqual(4.2)
/// - "bash=2:4.2.46-19.el7" → Exact with epoch and release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFilter {
    pub name: String,
    pub constraint: Option<VersionConstraint>,
}

impl VersionFilter {
    /// Parse a filter expression
    ///
    /// Any embedded whitespace makes the expression malformed.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidVersionExpression(
                "empty expression".to_string(),
            ));
        }
        if s.contains(char::is_whitespace) {
            return Err(Error::InvalidVersionExpression(format!(
                "whitespace in expression '{}'",
                s
            )));
        }

        let op_pos = match s.find(|c| c == '<' || c == '>' || c == '=') {
            Some(pos) => pos,
            None => {
                return Ok(Self {
                    name: s.to_string(),
                    constraint: None,
                });
            }
        };

        let name = &s[..op_pos];
        if name.is_empty() {
            return Err(Error::InvalidVersionExpression(format!(
                "missing package name in '{}'",
                s
            )));
        }

        let rest = &s[op_pos..];
        let (op, version_str) = if let Some(v) = rest.strip_prefix(">=") {
            (">=", v)
        } else if let Some(v) = rest.strip_prefix("<=") {
            ("<=", v)
        } else if let Some(v) = rest.strip_prefix('>') {
            (">", v)
        } else if let Some(v) = rest.strip_prefix('<') {
            ("<", v)
        } else if let Some(v) = rest.strip_prefix('=') {
            ("=", v)
        } else {
            return Err(Error::InvalidVersionExpression(format!(
                "unrecognized operator in '{}'",
                s
            )));
        };

        if version_str.is_empty() {
            return Err(Error::InvalidVersionExpression(format!(
                "missing version after operator in '{}'",
                s
            )));
        }

        let version = RpmVersion::parse(version_str)?;
        let constraint = match op {
            ">=" => VersionConstraint::GreaterOrEqual(version),
            "<=" => VersionConstraint::LessOrEqual(version),
            ">" => VersionConstraint::GreaterThan(version),
            "<" => VersionConstraint::LessThan(version),
            "=" => VersionConstraint::Exact(version),
            _ => unreachable!(),
        };

        Ok(Self {
            name: name.to_string(),
            constraint: Some(constraint),
        })
    }

    /// Check whether an RPM with the given name and version matches
    pub fn matches(&self, name: &str, version: &RpmVersion) -> bool {
        if self.name != name {
            return false;
        }
        match &self.constraint {
            Some(c) => c.satisfies(version),
            None => true,
        }
    }
}
