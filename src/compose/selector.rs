// src/compose/selector.rs

//! Latest-compose selection for mapping lookups.
//!
//! When a release has several composes (built for it or linked to it), the
//! mapping read path works against the latest one. Ordering is by compose
//! date, then respin, with the compose type priority as the final tiebreak.

use chrono::NaiveDate;
use tracing::debug;

use crate::compose::ComposeType;
use crate::db::models::Compose;

/// Restriction of compose candidates by type
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeFilter {
    pub included: Option<ComposeType>,
    pub excluded: Option<ComposeType>,
}

impl TypeFilter {
    pub fn accepts(&self, compose_type: ComposeType) -> bool {
        if let Some(included) = self.included {
            if compose_type != included {
                return false;
            }
        }
        if let Some(excluded) = self.excluded {
            if compose_type == excluded {
                return false;
            }
        }
        true
    }
}

/// The ordering key: date first, then respin, then type priority
pub fn sort_key(compose: &Compose) -> (NaiveDate, u32, ComposeType) {
    (
        compose.compose_date,
        compose.compose_respin,
        compose.compose_type,
    )
}

/// Pick the latest compose out of a candidate set
///
/// Returns `None` for an empty set, which callers take as the signal to
/// fall back to override-only resolution.
pub fn latest(composes: &[Compose]) -> Option<&Compose> {
    let selected = composes.iter().max_by_key(|c| sort_key(c));
    if let Some(compose) = selected {
        debug!(
            "Selected compose {} out of {} candidates",
            compose.compose_id,
            composes.len()
        );
    }
    selected
}

/// Pick the latest compose among candidates passing the type filter
pub fn latest_filtered<'a>(composes: &'a [Compose], filter: &TypeFilter) -> Option<&'a Compose> {
    composes
        .iter()
        .filter(|c| filter.accepts(c.compose_type))
        .max_by_key(|c| sort_key(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose(compose_id: &str, date: &str, respin: u32, compose_type: ComposeType) -> Compose {
        Compose {
            id: None,
            release_id: 1,
            compose_id: compose_id.to_string(),
            compose_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            compose_type,
            compose_respin: respin,
            compose_label: None,
        }
    }

    #[test]
    fn test_latest_empty_set() {
        assert!(latest(&[]).is_none());
    }

    #[test]
    fn test_latest_by_date() {
        let composes = [
            compose("compose-1", "2024-05-01", 0, ComposeType::Production),
            compose("compose-2", "2024-05-02", 0, ComposeType::Test),
        ];
        assert_eq!(latest(&composes).unwrap().compose_id, "compose-2");
    }

    #[test]
    fn test_latest_by_respin_on_equal_date() {
        let composes = [
            compose("compose-1", "2024-05-01", 0, ComposeType::Production),
            compose("compose-2", "2024-05-01", 1, ComposeType::Nightly),
        ];
        assert_eq!(latest(&composes).unwrap().compose_id, "compose-2");
    }

    #[test]
    fn test_latest_type_breaks_final_tie() {
        let composes = [
            compose("compose-1", "2024-05-01", 0, ComposeType::Nightly),
            compose("compose-2", "2024-05-01", 0, ComposeType::Production),
            compose("compose-3", "2024-05-01", 0, ComposeType::Test),
        ];
        assert_eq!(latest(&composes).unwrap().compose_id, "compose-2");
    }

    #[test]
    fn test_filtered_selection() {
        let composes = [
            compose("compose-1", "2024-05-01", 0, ComposeType::Production),
            compose("compose-2", "2024-05-02", 0, ComposeType::Nightly),
        ];
        let filter = TypeFilter {
            included: None,
            excluded: Some(ComposeType::Nightly),
        };
        assert_eq!(
            latest_filtered(&composes, &filter).unwrap().compose_id,
            "compose-1"
        );

        let only_test = TypeFilter {
            included: Some(ComposeType::Test),
            excluded: None,
        };
        assert!(latest_filtered(&composes, &only_test).is_none());
    }
}
