//! Vote model: aggregate tally, per-client selection, projected results
//!
//! Both `Tally` and `UserSelection` serialize to the same JSON shape used
//! for on-device records and remote store paths:
//!
//! ```text
//! tally:     {"scary": {"vibe-coding": 3, ...}, "work": {...}, ...}
//! selection: {"scary": "vibe-coding", "work": null, "engagement": null}
//! ```

use crate::catalog::{Catalog, Category, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Vote counts for one category
pub type CategoryTally = BTreeMap<SessionId, u64>;

/// Aggregate vote counts per category per session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tally(BTreeMap<Category, CategoryTally>);

impl Tally {
    /// Tally with every catalog session at zero in every category
    pub fn zeroed(catalog: &Catalog) -> Self {
        let per_category: CategoryTally = catalog.ids().map(|id| (id.clone(), 0)).collect();
        Self(
            Category::ALL
                .iter()
                .map(|c| (*c, per_category.clone()))
                .collect(),
        )
    }

    pub fn category(&self, category: Category) -> Option<&CategoryTally> {
        self.0.get(&category)
    }

    pub fn count(&self, category: Category, session: &str) -> u64 {
        self.0
            .get(&category)
            .and_then(|t| t.get(session))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all counts in a category
    pub fn total(&self, category: Category) -> u64 {
        self.0
            .get(&category)
            .map(|t| t.values().sum())
            .unwrap_or(0)
    }

    pub fn increment(&mut self, category: Category, session: &SessionId) {
        let count = self
            .0
            .entry(category)
            .or_default()
            .entry(session.clone())
            .or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Decrement a count, flooring at zero
    ///
    /// Returns `false` when the count was already zero, which only happens
    /// when a remote snapshot overwrote the count this client contributed.
    pub fn decrement(&mut self, category: Category, session: &SessionId) -> bool {
        let count = self
            .0
            .entry(category)
            .or_default()
            .entry(session.clone())
            .or_insert(0);
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Replace a whole category's counts
    pub fn replace_category(&mut self, category: Category, counts: CategoryTally) {
        self.0.insert(category, counts);
    }

    /// Categories present in this tally
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.keys().copied()
    }
}

/// The session this client voted for in each category, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserSelection(BTreeMap<Category, Option<SessionId>>);

impl Default for UserSelection {
    fn default() -> Self {
        Self(Category::ALL.iter().map(|c| (*c, None)).collect())
    }
}

impl UserSelection {
    pub fn get(&self, category: Category) -> Option<&SessionId> {
        self.0.get(&category).and_then(|s| s.as_ref())
    }

    /// Record a selection, returning the one it replaced
    pub fn set(&mut self, category: Category, session: SessionId) -> Option<SessionId> {
        self.0.insert(category, Some(session)).flatten()
    }

    pub fn clear(&mut self, category: Category) -> Option<SessionId> {
        self.0.insert(category, None).flatten()
    }

    /// Categories with a recorded vote, paired with the chosen session
    pub fn voted(&self) -> impl Iterator<Item = (Category, &SessionId)> + '_ {
        self.0
            .iter()
            .filter_map(|(c, s)| s.as_ref().map(|s| (*c, s)))
    }

    pub fn is_empty(&self) -> bool {
        self.voted().next().is_none()
    }
}

/// One rendered result line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub session: SessionId,
    pub name: String,
    pub count: u64,
}

impl ResultRow {
    /// "1 vote" / "N votes"
    pub fn votes_label(&self) -> String {
        if self.count == 1 {
            "1 vote".to_string()
        } else {
            format!("{} votes", self.count)
        }
    }
}

/// Display list for one category's results container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Projection {
    /// Sessions with at least one vote, highest count first
    Ranked { rows: Vec<ResultRow> },
    /// Placeholder rendered when nobody has voted in the category
    NoVotesYet,
}

impl Projection {
    pub const NO_VOTES_TEXT: &'static str = "No votes yet";

    pub fn rows(&self) -> &[ResultRow] {
        match self {
            Projection::Ranked { rows } => rows,
            Projection::NoVotesYet => &[],
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Projection::NoVotesYet)
    }

    /// `(session, count)` pairs in display order
    pub fn pairs(&self) -> Vec<(&str, u64)> {
        self.rows()
            .iter()
            .map(|r| (r.session.as_str(), r.count))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::from(s)
    }

    #[test]
    fn test_zeroed_covers_catalog() {
        let catalog = Catalog::unconference();
        let tally = Tally::zeroed(&catalog);
        for category in Category::ALL {
            let counts = tally.category(category).expect("category present");
            assert_eq!(counts.len(), catalog.len());
            assert!(counts.values().all(|c| *c == 0));
        }
    }

    #[test]
    fn test_decrement_floors_at_zero() {
        let mut tally = Tally::default();
        assert!(!tally.decrement(Category::Work, &sid("a")));
        assert_eq!(tally.count(Category::Work, "a"), 0);

        tally.increment(Category::Work, &sid("a"));
        assert!(tally.decrement(Category::Work, &sid("a")));
        assert_eq!(tally.count(Category::Work, "a"), 0);
    }

    #[test]
    fn test_tally_json_shape() {
        let mut tally = Tally::default();
        tally.increment(Category::Scary, &sid("vibe-coding"));
        let json = serde_json::to_value(&tally).unwrap();
        assert_eq!(json, serde_json::json!({"scary": {"vibe-coding": 1}}));

        let back: Tally = serde_json::from_value(json).unwrap();
        assert_eq!(back, tally);
    }

    #[test]
    fn test_selection_default_serializes_nulls() {
        let selection = UserSelection::default();
        let json = serde_json::to_value(&selection).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"scary": null, "work": null, "engagement": null})
        );
        assert!(selection.is_empty());
    }

    #[test]
    fn test_selection_set_returns_previous() {
        let mut selection = UserSelection::default();
        assert_eq!(selection.set(Category::Scary, sid("a")), None);
        assert_eq!(selection.set(Category::Scary, sid("b")), Some(sid("a")));
        assert_eq!(selection.get(Category::Scary), Some(&sid("b")));
        assert_eq!(selection.voted().count(), 1);
    }

    #[test]
    fn test_votes_label_pluralization() {
        let row = |count| ResultRow {
            session: sid("a"),
            name: "A".to_string(),
            count,
        };
        assert_eq!(row(1).votes_label(), "1 vote");
        assert_eq!(row(2).votes_label(), "2 votes");
    }

    #[test]
    fn test_projection_serializes_kind_tag() {
        let json = serde_json::to_value(Projection::NoVotesYet).unwrap();
        assert_eq!(json["kind"], "no_votes_yet");
    }
}
