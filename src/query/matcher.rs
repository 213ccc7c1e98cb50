//! Single-pattern matching against the fact store.
//!
//! One pattern is matched under one incoming context with a single index
//! probe: the first constant (by position) selects the candidate bucket, the
//! remaining constants and the self-join constraints filter it.

use crate::claim::{Arg, Claim};
use crate::storage::{FactStore, Tuple};
use crate::value::Value;

use super::bindings::Match;

/// How the arguments of one pattern constrain candidate tuples.
#[derive(Debug, Default)]
struct ProbePlan<'a> {
    /// Literal constants and variables already bound in the context.
    constants: Vec<(usize, &'a Value)>,
    /// Unbound variables, first occurrence only.
    free: Vec<(usize, &'a str)>,
    /// Positions that must hold equal values (repeated unbound variable).
    equal: Vec<(usize, usize)>,
}

impl<'a> ProbePlan<'a> {
    fn new(pattern: &'a Claim, context: &'a Match) -> Self {
        let mut plan = Self::default();

        for (position, arg) in pattern.args.iter().enumerate() {
            match arg {
                Arg::Constant(value) => plan.constants.push((position, value)),
                Arg::Variable(name) => {
                    if let Some(value) = context.get(name) {
                        plan.constants.push((position, value));
                    } else if let Some(&(first, _)) =
                        plan.free.iter().find(|(_, seen)| *seen == name.as_str())
                    {
                        plan.equal.push((first, position));
                    } else {
                        plan.free.push((position, name));
                    }
                }
            }
        }

        plan
    }

    fn satisfies(&self, tuple: &[Value], constants: &[(usize, &Value)]) -> bool {
        constants.iter().all(|&(position, value)| tuple[position] == *value)
            && self.equal.iter().all(|&(a, b)| tuple[a] == tuple[b])
    }

    fn project(&self, tuple: &[Value], context: &Match) -> Match {
        let mut extended = context.clone();
        for &(position, name) in &self.free {
            extended.insert(name, tuple[position].clone());
        }
        extended
    }
}

/// Matches one pattern under `context`, returning every extended context.
pub(crate) fn match_one(store: &FactStore, pattern: &Claim, context: &Match) -> Vec<Match> {
    let plan = ProbePlan::new(pattern, context);
    let name = pattern.name.as_str();

    // The probed constant is guaranteed by the index bucket; the rest filter.
    let (candidates, filters): (&[Tuple], &[(usize, &Value)]) = match plan.constants.split_first() {
        None => (store.lookup_by_name(name), &[]),
        Some((&(position, value), rest)) if value.index_key().is_some() => {
            (store.lookup_by_index(name, position, value), rest)
        }
        // unindexable first constant: full scan, identity comparison
        Some(_) => (store.lookup_by_name(name), plan.constants.as_slice()),
    };

    let arity = pattern.args.len();
    candidates
        .iter()
        .filter(|tuple| tuple.len() == arity)
        .filter(|tuple| plan.satisfies(tuple, filters))
        .map(|tuple| plan.project(tuple, context))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{val, var};

    fn store() -> FactStore {
        let mut store = FactStore::new();
        store.insert(&Claim::fact("@ likes person @", ["Homer", "Homer"]));
        store.insert(&Claim::fact("@ likes person @", ["Homer", "Lisa"]));
        store.insert(&Claim::fact("@ likes person @", ["Bart", "Bart"]));
        store
    }

    #[test]
    fn test_plan_records_equality_instead_of_second_free_var() {
        let pattern = Claim::new("@ likes person @", vec![var("x"), var("x")]);
        let context = Match::new();
        let plan = ProbePlan::new(&pattern, &context);
        assert!(plan.constants.is_empty());
        assert_eq!(plan.free, vec![(0, "x")]);
        assert_eq!(plan.equal, vec![(0, 1)]);
    }

    #[test]
    fn test_plan_resolves_bound_variables_as_constants() {
        let pattern = Claim::new("@ likes person @", vec![var("x"), val("Lisa")]);
        let context: Match = [("x", "Homer")].into_iter().collect();
        let plan = ProbePlan::new(&pattern, &context);
        assert_eq!(plan.constants.len(), 2);
        assert_eq!(plan.constants[0].0, 0);
        assert!(plan.free.is_empty());
    }

    #[test]
    fn test_match_one_self_join() {
        let pattern = Claim::new("@ likes person @", vec![var("x"), var("x")]);
        let found = match_one(&store(), &pattern, &Match::new());
        let names: Vec<_> = found.iter().filter_map(|m| m.get_str("x")).collect();
        assert_eq!(names, vec!["Homer", "Bart"]);
    }

    #[test]
    fn test_match_one_keeps_context_bindings() {
        let pattern = Claim::new("@ likes person @", vec![val("Homer"), var("who")]);
        let context: Match = [("tick", 1)].into_iter().collect();
        let found = match_one(&store(), &pattern, &context);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|m| m.get("tick") == Some(&Value::Int(1))));
    }

    #[test]
    fn test_match_one_skips_tuples_of_other_arity() {
        let mut s = store();
        s.insert(&Claim::fact("@ likes person @", ["Moe"]));
        let pattern = Claim::new("@ likes person @", vec![var("a"), var("b")]);
        assert_eq!(match_one(&s, &pattern, &Match::new()).len(), 3);
    }

    #[test]
    fn test_match_one_structured_first_constant_scans_by_identity() {
        let mut s = FactStore::new();
        let points = Value::structured(serde_json::json!({"x": 1}));
        s.insert(&Claim::new(
            "@ is at @",
            vec![Arg::Constant(points.clone()), val("table")],
        ));

        let same = Claim::new("@ is at @", vec![Arg::Constant(points), var("where")]);
        let found = match_one(&s, &same, &Match::new());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("where"), Some("table"));

        let lookalike = Claim::new(
            "@ is at @",
            vec![val(serde_json::json!({"x": 1})), var("where")],
        );
        assert!(match_one(&s, &lookalike, &Match::new()).is_empty());
    }
}
