use std::{
    fmt,
    io::{Error, Result},
    str::FromStr,
};

use crate::activity::{Activity, ActivityKind};

pub const ALL_TYPES: &str = "all";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TypeFilter {
    #[default]
    All,
    Only(ActivityKind),
}

impl TypeFilter {
    pub fn matches(&self, kind: ActivityKind) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Only(only) => *only == kind,
        }
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeFilter::All => f.write_str(ALL_TYPES),
            TypeFilter::Only(kind) => kind.fmt(f),
        }
    }
}

impl FromStr for TypeFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case(ALL_TYPES) {
            return Ok(TypeFilter::All);
        }
        s.parse::<ActivityKind>().map(TypeFilter::Only)
    }
}

/// Case-insensitive substring match against the searchable fields.
/// `needle` must already be trimmed and lower-cased.
fn matches_search(activity: &Activity, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    [
        &activity.asset_name,
        &activity.user,
        &activity.details,
        &activity.tx_hash,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}

/// Returns the activities matching both the search text and the type
/// filter, in their original order.
pub fn filter(activities: &[Activity], search: &str, type_filter: TypeFilter) -> Vec<Activity> {
    let needle = search.trim().to_lowercase();
    activities
        .iter()
        .filter(|a| type_filter.matches(a.kind) && matches_search(a, &needle))
        .cloned()
        .collect()
}

/// Filter inputs of one feed session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filters {
    /// Raw search input, updated on every keystroke.
    pub search_query: String,
    /// Debounced search value the filter actually applies.
    pub settled_search: String,
    pub type_filter: TypeFilter,
}

impl Filters {
    pub fn has_active(&self) -> bool {
        !self.settled_search.trim().is_empty() || self.type_filter != TypeFilter::All
    }

    pub fn clear(&mut self) {
        *self = Filters::default();
    }

    pub fn apply(&self, activities: &[Activity]) -> Vec<Activity> {
        filter(activities, &self.settled_search, self.type_filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::sample;

    fn nova_and_orb() -> Vec<Activity> {
        let make = |id: &str, kind, asset: &str, user: &str, details: &str, tx: &str| Activity {
            id: id.to_owned(),
            kind,
            asset_name: asset.to_owned(),
            user: user.to_owned(),
            details: details.to_owned(),
            tx_hash: tx.to_owned(),
            timestamp: 0,
            block_number: 0,
            contract: String::new(),
        };
        vec![
            make("1", ActivityKind::Mint, "Nova", "0xabc", "minted", "0x1"),
            make("2", ActivityKind::Sale, "Orb", "0xdef", "sold", "0x2"),
        ]
    }

    #[test]
    fn matches_documented_examples() {
        let activities = nova_and_orb();
        assert_eq!(
            filter(&activities, "nova", TypeFilter::All),
            vec![activities[0].clone()]
        );
        assert_eq!(
            filter(&activities, "", "sale".parse().unwrap()),
            vec![activities[1].clone()]
        );
    }

    #[test]
    fn searches_every_field_case_insensitively() {
        let activities = nova_and_orb();
        assert_eq!(filter(&activities, "ORB", TypeFilter::All).len(), 1);
        assert_eq!(filter(&activities, "0xDEF", TypeFilter::All)[0].id, "2");
        assert_eq!(filter(&activities, "mint", TypeFilter::All)[0].id, "1");
        assert_eq!(filter(&activities, "0x1", TypeFilter::All)[0].id, "1");
        assert_eq!(filter(&activities, "  nova ", TypeFilter::All).len(), 1);
        assert!(filter(&activities, "nova", "sale".parse().unwrap()).is_empty());
        assert!(filter(&activities, "missing", TypeFilter::All).is_empty());
    }

    #[test]
    fn preserves_order_and_is_idempotent() {
        let activities = sample(30);
        let searches = ["", "asset #1", "0xabc", "event", "nothing"];
        let mut types = vec![TypeFilter::All];
        types.extend(ActivityKind::ALL.iter().map(|k| TypeFilter::Only(*k)));

        for search in searches {
            for type_filter in &types {
                let once = filter(&activities, search, *type_filter);
                let twice = filter(&once, search, *type_filter);
                assert_eq!(once, twice);

                // once must be a subsequence of activities
                let mut rest = activities.iter();
                for kept in &once {
                    assert!(rest.any(|a| a == kept));
                }
            }
        }
    }

    #[test]
    fn parses_type_filters() {
        assert_eq!("all".parse::<TypeFilter>().unwrap(), TypeFilter::All);
        assert_eq!(" ALL ".parse::<TypeFilter>().unwrap(), TypeFilter::All);
        assert_eq!(
            "offer".parse::<TypeFilter>().unwrap(),
            TypeFilter::Only(ActivityKind::Offer)
        );
        assert!("everything".parse::<TypeFilter>().is_err());
        assert_eq!(TypeFilter::All.to_string(), "all");
        assert_eq!(TypeFilter::Only(ActivityKind::Mint).to_string(), "mint");
    }

    #[test]
    fn active_filters_follow_settled_search_and_type() {
        let mut filters = Filters::default();
        assert!(!filters.has_active());

        filters.search_query = "typed but not settled".to_owned();
        assert!(!filters.has_active());

        filters.settled_search = "nova".to_owned();
        assert!(filters.has_active());

        filters.settled_search.clear();
        filters.type_filter = TypeFilter::Only(ActivityKind::Sale);
        assert!(filters.has_active());

        filters.settled_search = "nova".to_owned();
        filters.clear();
        assert!(!filters.has_active());
        assert_eq!(filters, Filters::default());
    }
}
