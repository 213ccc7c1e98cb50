//! Missing-fact capture.
//!
//! A capture template registered for a claim name is compared against every
//! pattern of that name that fails to match during a query. When the failed
//! pattern lines up with the template, the concrete values it carried are
//! recorded under the template's ordinary variable names, so an absence-driven
//! rule can synthesize the missing fact.
//!
//! The comparison is one-directional and non-backtracking. Alignment rules,
//! per argument position:
//!
//! | failed pattern arg      | template arg     | outcome            |
//! |-------------------------|------------------|--------------------|
//! | unbound variable        | capture slot     | ok                 |
//! | unbound variable        | anything else    | reject             |
//! | constant (or bound var) | equal constant   | ok                 |
//! | constant (or bound var) | other constant   | reject             |
//! | constant (or bound var) | capture slot     | reject             |
//! | constant (or bound var) | ordinary var     | ok, value captured |

use std::collections::HashMap;

use tracing::trace;

use crate::claim::{Arg, Claim};
use crate::error::ValidationError;

use super::bindings::Match;

/// Capture templates and the misses recorded against them.
#[derive(Debug, Default, Clone)]
pub struct MissCapture {
    templates: HashMap<String, Claim>,
    misses: HashMap<String, Vec<Match>>,
}

impl MissCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the template for its claim name; the last registration wins.
    pub fn register(&mut self, template: Claim) -> Result<(), ValidationError> {
        if !template.has_capture_slot() {
            return Err(ValidationError::MissingCaptureSlot {
                name: template.name,
            });
        }
        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    #[must_use]
    pub fn template(&self, name: &str) -> Option<&Claim> {
        self.templates.get(name)
    }

    /// Records a failed pattern if it lines up with the registered template.
    ///
    /// Returns whether a capture was recorded.
    pub fn on_query_miss(&mut self, pattern: &Claim, context: &Match) -> bool {
        let Some(template) = self.templates.get(&pattern.name) else {
            return false;
        };
        let Some(captured) = align(template, pattern, context) else {
            return false;
        };

        trace!(claim = %pattern.name, captured = %captured.to_json(), "captured missing claim");
        self.misses
            .entry(pattern.name.clone())
            .or_default()
            .push(captured);
        true
    }

    /// Every capture recorded for `name`, oldest first.
    #[must_use]
    pub fn matches_for(&self, name: &str) -> &[Match] {
        self.misses.get(name).map_or(&[], Vec::as_slice)
    }
}

fn align(template: &Claim, pattern: &Claim, context: &Match) -> Option<Match> {
    if template.args.len() != pattern.args.len() {
        return None;
    }

    let mut captured = Match::new();
    for (query_arg, template_arg) in pattern.args.iter().zip(&template.args) {
        let resolved = match query_arg {
            Arg::Constant(value) => Some(value),
            Arg::Variable(name) => context.get(name),
        };

        match (resolved, template_arg) {
            (None, slot) if slot.is_capture_slot() => {}
            (None, _) => return None,
            (Some(_), slot) if slot.is_capture_slot() => return None,
            (Some(value), Arg::Constant(expected)) => {
                if value != expected {
                    return None;
                }
            }
            (Some(value), Arg::Variable(name)) => captured.insert(name.clone(), value.clone()),
        }
    }

    Some(captured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{val, var};

    const HAS_KIDS: &str = "@ has @ kids";

    #[test]
    fn test_register_requires_capture_slot() {
        let mut capture = MissCapture::new();
        let err = capture
            .register(Claim::new(HAS_KIDS, vec![var("person"), var("n")]))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingCaptureSlot {
                name: HAS_KIDS.to_string()
            }
        );
        assert!(capture.template(HAS_KIDS).is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut capture = MissCapture::new();
        capture
            .register(Claim::new(HAS_KIDS, vec![val("Homer"), var("?n")]))
            .unwrap();
        capture
            .register(Claim::new(HAS_KIDS, vec![var("person"), var("?n")]))
            .unwrap();
        assert_eq!(capture.template(HAS_KIDS).unwrap().args[0], var("person"));
    }

    #[test]
    fn test_bound_variable_counts_as_constant() {
        let mut capture = MissCapture::new();
        capture
            .register(Claim::new(HAS_KIDS, vec![var("person"), var("?n")]))
            .unwrap();
        let context: Match = [("who", "Marge")].into_iter().collect();
        assert!(capture.on_query_miss(
            &Claim::new(HAS_KIDS, vec![var("who"), var("count")]),
            &context
        ));
        assert_eq!(capture.matches_for(HAS_KIDS)[0].get_str("person"), Some("Marge"));
    }

    #[test]
    fn test_equal_constants_align_without_capturing() {
        let mut capture = MissCapture::new();
        capture
            .register(Claim::new(HAS_KIDS, vec![val("Homer"), var("?n")]))
            .unwrap();
        assert!(capture.on_query_miss(
            &Claim::new(HAS_KIDS, vec![val("Homer"), var("count")]),
            &Match::new()
        ));
        assert!(capture.matches_for(HAS_KIDS)[0].is_empty());
    }

    #[test]
    fn test_constant_never_binds_capture_slot() {
        let mut capture = MissCapture::new();
        capture
            .register(Claim::new(HAS_KIDS, vec![var("person"), var("?n")]))
            .unwrap();
        assert!(!capture.on_query_miss(
            &Claim::new(HAS_KIDS, vec![val("Homer"), val(2)]),
            &Match::new()
        ));
        assert!(capture.matches_for(HAS_KIDS).is_empty());
    }

    #[test]
    fn test_arity_mismatch_never_captures() {
        let mut capture = MissCapture::new();
        capture
            .register(Claim::new(HAS_KIDS, vec![var("person"), var("?n")]))
            .unwrap();
        assert!(!capture.on_query_miss(
            &Claim::new(HAS_KIDS, vec![val("Homer")]),
            &Match::new()
        ));
    }

    #[test]
    fn test_unknown_name_is_ignored() {
        let mut capture = MissCapture::new();
        assert!(!capture.on_query_miss(
            &Claim::new(HAS_KIDS, vec![val("Homer"), var("n")]),
            &Match::new()
        ));
        assert!(capture.matches_for(HAS_KIDS).is_empty());
    }
}
