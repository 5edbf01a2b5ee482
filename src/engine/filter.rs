//! Category + free-text filtering with natural id ordering.
//!
//! A linear scan per query; catalogs hold at most a few hundred records.

use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::engine::records::Record;

lazy_static! {
    // Runs of ASCII digits or runs of anything else
    static ref CHUNK_PATTERN: Regex = Regex::new(r"[0-9]+|[^0-9]+").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter<C> {
    #[default]
    All,
    Only(C),
}

impl<C: PartialEq> CategoryFilter<C> {
    pub fn matches(&self, category: Option<&C>) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => category == Some(wanted),
        }
    }
}

impl<C: fmt::Display> fmt::Display for CategoryFilter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("ALL"),
            CategoryFilter::Only(c) => write!(f, "{}", c),
        }
    }
}

impl<C: FromStr> FromStr for CategoryFilter<C> {
    type Err = C::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

/// Records in the given category whose searchable fields contain `query`
/// (case-sensitive), sorted by id in natural order.
pub fn filter_records<'a, T: Record>(records: &'a [T], category: &CategoryFilter<T::Category>, query: &str) -> Vec<&'a T> {
    let mut matched: Vec<&T> = records
        .iter()
        .filter(|r| category.matches(r.category().as_ref()))
        .filter(|r| matches_query(*r, query))
        .collect();
    matched.sort_by(|a, b| natural_cmp(a.id(), b.id()));
    matched
}

pub fn matches_query<T: Record>(record: &T, query: &str) -> bool {
    query.is_empty() || record.search_fields().iter().any(|field| field.contains(query))
}

/// Natural string order: digit runs compare by numeric value, text runs
/// compare case-insensitively, digits sort before text.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = CHUNK_PATTERN.find_iter(a).map(|m| m.as_str());
    let mut right = CHUNK_PATTERN.find_iter(b).map(|m| m.as_str());

    loop {
        match (left.next(), right.next()) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = compare_chunks(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }

    // "01" vs "1" and "a" vs "A" still need a stable order
    a.cmp(b)
}

fn compare_chunks(x: &str, y: &str) -> Ordering {
    let x_digits = x.starts_with(|c: char| c.is_ascii_digit());
    let y_digits = y.starts_with(|c: char| c.is_ascii_digit());

    match (x_digits, y_digits) {
        (true, true) => {
            let x = x.trim_start_matches('0');
            let y = y.trim_start_matches('0');
            x.len().cmp(&y.len()).then_with(|| x.cmp(y))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.to_lowercase().cmp(&y.to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::records::{Fish, Item, ItemType, Rarity};

    fn fish(id: &str, name: &str, rarity: Rarity, depth: &str, tags: &[&str]) -> Fish {
        Fish {
            id: id.into(),
            name: name.into(),
            rarity,
            depth: depth.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Fish::default()
        }
    }

    fn catalog() -> Vec<Fish> {
        vec![
            fish("002", "Carp", Rarity::Common, "Pond", &["freshwater"]),
            fish("010", "Golden Pike", Rarity::Epic, "River bend", &["event"]),
            fish("001", "Trout", Rarity::Common, "Mountain stream", &["freshwater", "cold"]),
        ]
    }

    fn ids<T: Record>(records: &[&T]) -> Vec<String> {
        records.iter().map(|r| r.id().to_string()).collect()
    }

    #[test]
    fn numeric_runs_compare_by_value() {
        assert_eq!(natural_cmp("2", "10"), Ordering::Less);
        assert_eq!(natural_cmp("002", "010"), Ordering::Less);
        assert_eq!(natural_cmp("010", "100"), Ordering::Less);
        assert_eq!(natural_cmp("fish-9", "fish-12"), Ordering::Less);
        assert_eq!(natural_cmp("b", "A"), Ordering::Greater);
        assert_eq!(natural_cmp("9", "a"), Ordering::Less);
        assert_eq!(natural_cmp("abc", "abc"), Ordering::Equal);
    }

    #[test]
    fn only_ascii_digits_count_as_numbers() {
        // Full-width digits are text, so "1" is compared against "20"
        assert_eq!(natural_cmp("1１", "20"), Ordering::Less);
        assert_eq!(natural_cmp("２", "10"), Ordering::Greater);
    }

    #[test]
    fn leading_zeros_tie_break_deterministically() {
        assert_ne!(natural_cmp("01", "1"), Ordering::Equal);
        assert_eq!(natural_cmp("01", "1"), natural_cmp("01", "1"));
        assert_eq!(natural_cmp("1", "01"), natural_cmp("01", "1").reverse());
    }

    #[test]
    fn all_returns_everything_sorted() {
        let records = catalog();
        let view = filter_records(&records, &CategoryFilter::All, "");
        assert_eq!(ids(&view), vec!["001", "002", "010"]);
    }

    #[test]
    fn ids_sort_numerically_not_lexically() {
        let records = vec![fish("10", "a", Rarity::Common, "", &[]), fish("2", "b", Rarity::Common, "", &[])];
        assert_eq!(ids(&filter_records(&records, &CategoryFilter::All, "")), vec!["2", "10"]);
    }

    #[test]
    fn category_constrains_results() {
        let records = catalog();
        let view = filter_records(&records, &CategoryFilter::Only(Rarity::Common), "");
        assert_eq!(ids(&view), vec!["001", "002"]);
        assert!(filter_records(&records, &CategoryFilter::Only(Rarity::Legendary), "").is_empty());
    }

    #[test]
    fn query_matches_name_location_id_and_tags() {
        let records = catalog();
        assert_eq!(ids(&filter_records(&records, &CategoryFilter::All, "Pike")), vec!["010"]);
        assert_eq!(ids(&filter_records(&records, &CategoryFilter::All, "stream")), vec!["001"]);
        assert_eq!(ids(&filter_records(&records, &CategoryFilter::All, "02")), vec!["002"]);
        assert_eq!(ids(&filter_records(&records, &CategoryFilter::All, "cold")), vec!["001"]);
        assert_eq!(ids(&filter_records(&records, &CategoryFilter::All, "freshwater")), vec!["001", "002"]);
        assert!(filter_records(&records, &CategoryFilter::All, "Salmon").is_empty());
    }

    #[test]
    fn query_is_case_sensitive() {
        let records = catalog();
        assert!(filter_records(&records, &CategoryFilter::All, "carp").is_empty());
        assert_eq!(ids(&filter_records(&records, &CategoryFilter::All, "Carp")), vec!["002"]);
    }

    #[test]
    fn category_and_query_combine() {
        let records = catalog();
        let view = filter_records(&records, &CategoryFilter::Only(Rarity::Epic), "freshwater");
        assert!(view.is_empty());
    }

    #[test]
    fn filters_parse_from_text() {
        assert_eq!("ALL".parse::<CategoryFilter<ItemType>>().unwrap(), CategoryFilter::All);
        assert_eq!("tackle".parse::<CategoryFilter<ItemType>>().unwrap(), CategoryFilter::Only(ItemType::Tackle));
        assert!("boots".parse::<CategoryFilter<ItemType>>().is_err());
        assert_eq!(CategoryFilter::Only(ItemType::Bundle).to_string(), "BUNDLE");
    }

    #[test]
    fn items_filter_by_type() {
        let items = vec![
            Item { id: "t-1".into(), name: "Bamboo Rod".into(), item_type: ItemType::Tackle, category: "rod".into(), ..Item::default() },
            Item { id: "m-1".into(), name: "Scale".into(), item_type: ItemType::Material, category: "fish".into(), ..Item::default() },
        ];
        let view = filter_records(&items, &CategoryFilter::Only(ItemType::Tackle), "");
        assert_eq!(ids(&view), vec!["t-1"]);
        assert_eq!(ids(&filter_records(&items, &CategoryFilter::All, "rod")), vec!["t-1"]);
    }
}
