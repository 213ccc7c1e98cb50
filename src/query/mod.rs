//! Conjunctive queries over the fact store.
//!
//! [`FactDb`] is the whole contract an embedding system gets: `query`,
//! `add_claim`, `register_capture` and `capture_matches`.

mod bindings;
pub mod capture;
mod matcher;

use tracing::trace;

use crate::claim::Claim;
use crate::error::ValidationError;
use crate::storage::FactStore;

pub use bindings::Match;
pub use capture::MissCapture;

/// A fact store together with its missing-fact capture state.
#[derive(Debug, Default, Clone)]
pub struct FactDb {
    store: FactStore,
    capture: MissCapture,
}

impl FactDb {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a ground fact; malformed facts are logged and dropped.
    pub fn add_claim(&mut self, claim: &Claim) -> bool {
        self.store.insert(claim)
    }

    /// Adds a ground fact, returning why it was rejected.
    pub fn try_add_claim(&mut self, claim: &Claim) -> Result<(), ValidationError> {
        self.store.try_insert(claim)
    }

    /// Evaluates an ordered conjunction of patterns.
    ///
    /// Patterns are joined left to right. Each pattern that finds nothing for
    /// some incoming context is offered to missing-fact capture; once the whole
    /// match set is empty the remaining patterns are not evaluated.
    pub fn query(&mut self, patterns: &[Claim]) -> Vec<Match> {
        let mut matches = vec![Match::new()];

        for pattern in patterns {
            let mut joined = Vec::new();
            for context in &matches {
                let found = matcher::match_one(&self.store, pattern, context);
                if found.is_empty() {
                    self.capture.on_query_miss(pattern, context);
                }
                joined.extend(found);
            }

            matches = joined;
            if matches.is_empty() {
                trace!(claim = %pattern, "query found no matches");
                return matches;
            }
        }

        matches
    }

    /// Registers a capture template for its claim name.
    pub fn register_capture(&mut self, pattern: Claim) -> Result<(), ValidationError> {
        self.capture.register(pattern)
    }

    /// Every capture recorded for `name` since this database was built.
    #[must_use]
    pub fn capture_matches(&self, name: &str) -> &[Match] {
        self.capture.matches_for(name)
    }

    #[must_use]
    pub const fn store(&self) -> &FactStore {
        &self.store
    }

    /// True when the ground claim is already stored.
    #[must_use]
    pub fn contains_claim(&self, claim: &Claim) -> bool {
        self.store.contains_claim(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{val, var};
    use crate::value::Value;

    const FATHER: &str = "@ is father of @";
    const GENDER: &str = "@ has gender @";
    const LIKES: &str = "@ likes person @";
    const HAS_KIDS: &str = "@ has @ kids";

    fn family_db() -> FactDb {
        let mut db = FactDb::new();
        db.add_claim(&Claim::fact(FATHER, ["Abe", "Homer"]));
        db.add_claim(&Claim::fact(FATHER, ["Homer", "Bart"]));
        db.add_claim(&Claim::fact(FATHER, ["Homer", "Lisa"]));

        db.add_claim(&Claim::fact(GENDER, ["Homer", "male"]));
        db.add_claim(&Claim::fact(GENDER, ["Bart", "male"]));
        db.add_claim(&Claim::fact(GENDER, ["Lisa", "female"]));
        db.add_claim(&Claim::fact(GENDER, ["Abe", "male"]));

        db.add_claim(&Claim::fact(LIKES, ["Homer", "Homer"]));
        db.add_claim(&Claim::fact(LIKES, ["Homer", "Lisa"]));
        db
    }

    fn m(pairs: &[(&str, &str)]) -> Match {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_simple_query() {
        let mut db = family_db();
        let result = db.query(&[Claim::new(FATHER, vec![val("Homer"), var("child")])]);
        assert_eq!(result, vec![m(&[("child", "Bart")]), m(&[("child", "Lisa")])]);
    }

    #[test]
    fn test_single_join_query() {
        let mut db = family_db();
        let result = db.query(&[
            Claim::new(FATHER, vec![var("x"), var("y")]),
            Claim::new(FATHER, vec![var("y"), var("z")]),
        ]);
        assert_eq!(
            result,
            vec![
                m(&[("x", "Abe"), ("y", "Homer"), ("z", "Bart")]),
                m(&[("x", "Abe"), ("y", "Homer"), ("z", "Lisa")]),
            ]
        );
    }

    #[test]
    fn test_double_join_query() {
        let mut db = family_db();
        let result = db.query(&[
            Claim::new(FATHER, vec![var("x"), var("y")]),
            Claim::new(FATHER, vec![var("y"), var("z")]),
            Claim::new(GENDER, vec![var("z"), val("female")]),
        ]);
        assert_eq!(result, vec![m(&[("x", "Abe"), ("y", "Homer"), ("z", "Lisa")])]);
    }

    #[test]
    fn test_query_with_equal_constraints() {
        let mut db = family_db();
        let result = db.query(&[Claim::new(LIKES, vec![var("x"), var("x")])]);
        assert_eq!(result, vec![m(&[("x", "Homer")])]);
    }

    #[test]
    fn test_query_with_two_constants() {
        let mut db = family_db();
        let result = db.query(&[Claim::new(LIKES, vec![val("Homer"), val("Lisa")])]);
        assert_eq!(result, vec![Match::new()]);
    }

    #[test]
    fn test_non_primitive_constants() {
        let mut db = family_db();
        let result = db.query(&[Claim::new(
            FATHER,
            vec![val(serde_json::json!({})), var("y")],
        )]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_empty_conjunction_is_unit() {
        let mut db = family_db();
        assert_eq!(db.query(&[]), vec![Match::new()]);
    }

    #[test]
    fn test_unknown_claim_name_is_empty() {
        let mut db = family_db();
        assert!(db.query(&[Claim::new("@ is mayor", vec![var("x")])]).is_empty());
    }

    #[test]
    fn test_duplicate_facts_multiply_matches() {
        let mut db = FactDb::new();
        let fact = Claim::fact("@ is cool", ["Bart"]);
        db.add_claim(&fact);
        db.add_claim(&fact);
        assert_eq!(db.query(&[fact]), vec![Match::new(), Match::new()]);
    }

    #[test]
    fn test_capture_missing_claims() {
        let mut db = family_db();
        db.register_capture(Claim::new(HAS_KIDS, vec![var("person"), var("?n")]))
            .unwrap();
        db.query(&[Claim::new(HAS_KIDS, vec![val("Homer"), var("count")])]);
        assert_eq!(db.capture_matches(HAS_KIDS), &[m(&[("person", "Homer")])]);
    }

    #[test]
    fn test_skipping_missing_claims_non_matching_constant() {
        let mut db = family_db();
        db.register_capture(Claim::new(HAS_KIDS, vec![val("Homer"), var("?n")]))
            .unwrap();
        db.query(&[Claim::new(HAS_KIDS, vec![val("Abe"), var("count")])]);
        assert!(db.capture_matches(HAS_KIDS).is_empty());
    }

    #[test]
    fn test_skipping_missing_claims_non_matching_variable() {
        let mut db = family_db();
        db.register_capture(Claim::new(HAS_KIDS, vec![var("person"), var("?n")]))
            .unwrap();
        db.query(&[Claim::new(HAS_KIDS, vec![var("person"), val(2)])]);
        assert!(db.capture_matches(HAS_KIDS).is_empty());
    }

    #[test]
    fn test_capture_per_failing_context_in_join() {
        let mut db = family_db();
        db.register_capture(Claim::new(HAS_KIDS, vec![var("person"), var("?n")]))
            .unwrap();
        db.query(&[
            Claim::new(GENDER, vec![var("p"), val("male")]),
            Claim::new(HAS_KIDS, vec![var("p"), var("count")]),
        ]);
        let captured: Vec<_> = db
            .capture_matches(HAS_KIDS)
            .iter()
            .filter_map(|c| c.get_str("person"))
            .collect();
        assert_eq!(captured, vec!["Homer", "Bart", "Abe"]);
    }

    #[test]
    fn test_no_capture_after_conjunction_dies() {
        let mut db = family_db();
        db.register_capture(Claim::new(HAS_KIDS, vec![var("person"), var("?n")]))
            .unwrap();
        db.query(&[
            Claim::new(GENDER, vec![var("p"), val("unknown")]),
            Claim::new(HAS_KIDS, vec![var("p"), var("count")]),
        ]);
        assert!(db.capture_matches(HAS_KIDS).is_empty());
    }

    #[test]
    fn test_try_add_claim_rejects_patterns() {
        let mut db = FactDb::new();
        assert!(db
            .try_add_claim(&Claim::new(FATHER, vec![var("x"), val("Bart")]))
            .is_err());
        assert!(db.store().is_empty());
        assert!(db.try_add_claim(&Claim::fact("@ is @", [Value::Null, Value::Bool(true)])).is_ok());
    }
}
