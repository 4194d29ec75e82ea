//! Results projector
//!
//! Turns one category's counts into the list shown in its results
//! container: highest count first, ties in catalog order, zero counts
//! omitted. Sessions missing from the catalog sort after all catalog
//! sessions, by id.

use std::cmp::Reverse;
use unconf_common::votes::CategoryTally;
use unconf_common::{Catalog, Projection, ResultRow};

pub fn project(catalog: &Catalog, counts: Option<&CategoryTally>) -> Projection {
    let Some(counts) = counts else {
        return Projection::NoVotesYet;
    };

    let mut rows: Vec<ResultRow> = counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(session, count)| ResultRow {
            session: session.clone(),
            name: catalog.display_name(session.as_str()).to_string(),
            count: *count,
        })
        .collect();

    if rows.is_empty() {
        return Projection::NoVotesYet;
    }

    rows.sort_by_key(|row| {
        (
            Reverse(row.count),
            catalog.position(row.session.as_str()).unwrap_or(usize::MAX),
        )
    });

    Projection::Ranked { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unconf_common::SessionId;

    fn counts(pairs: &[(&str, u64)]) -> CategoryTally {
        pairs
            .iter()
            .map(|(id, n)| (SessionId::from(*id), *n))
            .collect()
    }

    fn abc() -> Catalog {
        Catalog::from_pairs([("a", "A"), ("b", "B"), ("c", "C")]).unwrap()
    }

    #[test]
    fn test_orders_descending_and_drops_zero() {
        let projection = project(&abc(), Some(&counts(&[("a", 3), ("b", 0), ("c", 5)])));
        assert_eq!(projection.pairs(), vec![("c", 5), ("a", 3)]);
    }

    #[test]
    fn test_all_zero_is_placeholder() {
        let projection = project(&abc(), Some(&counts(&[("a", 0), ("b", 0), ("c", 0)])));
        assert_eq!(projection, Projection::NoVotesYet);
    }

    #[test]
    fn test_missing_category_is_placeholder() {
        assert!(project(&abc(), None).is_placeholder());
    }

    #[test]
    fn test_ties_follow_catalog_order() {
        let catalog = Catalog::from_pairs([("zeta", "Z"), ("alpha", "A"), ("mid", "M")]).unwrap();
        let projection = project(
            &catalog,
            Some(&counts(&[("alpha", 2), ("mid", 2), ("zeta", 2)])),
        );
        assert_eq!(projection.pairs(), vec![("zeta", 2), ("alpha", 2), ("mid", 2)]);
    }

    #[test]
    fn test_rows_carry_display_names() {
        let projection = project(&Catalog::unconference(), Some(&counts(&[("secure-cpp", 1)])));
        let row = &projection.rows()[0];
        assert_eq!(row.name, "Secure Coding Standards for C++");
        assert_eq!(row.votes_label(), "1 vote");
    }
}
