//! The fixpoint loop of one tick.
//!
//! Ordinary rules query the store until they match once, then retire for the
//! tick. What they claim only reaches the store on the next tick. Capture rules
//! react to misses recorded by those queries, and what they claim is inserted
//! into the live store at once so waiting rules can match in the next
//! iteration. The loop ends when an iteration adds no new fact.

use tracing::{trace, warn};

use crate::claim::ProgramId;
use crate::error::ExecutionError;
use crate::program::ProgramContext;
use crate::query::{FactDb, Match};
use crate::rule::{run_contained, Rule, RuleBody, RuleKind};
use crate::world::WorldState;

/// How a fixpoint run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FixpointOutcome {
    pub iterations: usize,
    pub settled: bool,
}

/// Evaluates `rules` against `db` until no capture rule produces a new fact.
pub(crate) fn run(
    db: &mut FactDb,
    world: &mut WorldState,
    rules: &mut [Rule],
    max_iterations: Option<usize>,
) -> FixpointOutcome {
    let mut retired = vec![false; rules.len()];
    let mut cursors = vec![0usize; rules.len()];
    let mut iterations = 0;

    loop {
        iterations += 1;
        let mut settled = true;

        for (i, rule) in rules.iter_mut().enumerate() {
            if retired[i] || rule.kind() == RuleKind::Capture {
                continue;
            }
            let matches = db.query(rule.body.patterns());
            if matches.is_empty() {
                continue;
            }
            trace!(rule = %rule.id, source = %rule.source, matches = matches.len(), "rule fired");
            rule.fired_count += matches.len();
            retired[i] = true;
            invoke(world, rule, &matches);
        }

        for (i, rule) in rules.iter_mut().enumerate() {
            if retired[i] || rule.kind() != RuleKind::Capture {
                continue;
            }
            let fresh: Vec<Match> = {
                let Some(pattern) = rule.body.patterns().first() else {
                    continue;
                };
                let captured = db.capture_matches(&pattern.name);
                if cursors[i] >= captured.len() {
                    continue;
                }
                let fresh = captured[cursors[i]..].to_vec();
                cursors[i] = captured.len();
                fresh
            };

            trace!(rule = %rule.id, source = %rule.source, captures = fresh.len(), "capture rule fired");
            rule.fired_count += fresh.len();
            let before = world.claims.len();
            if !invoke(world, rule, &fresh) {
                retired[i] = true;
            }

            for claim in &world.claims[before..] {
                let novel = !db.contains_claim(claim);
                if db.add_claim(claim) && novel {
                    settled = false;
                }
            }
        }

        if settled {
            return FixpointOutcome { iterations, settled };
        }
        if let Some(limit) = max_iterations {
            if iterations >= limit.max(1) {
                let err = ExecutionError::SettleLimitExceeded { limit };
                warn!(iterations, error = %err, "tick stopped before settling");
                world.report(ProgramId::core(), true, err.to_string(), None);
                return FixpointOutcome { iterations, settled };
            }
        }
    }
}

/// Invokes every grouped rule that never matched this tick with no matches.
pub(crate) fn finalize(world: &mut WorldState, rules: &[Rule]) {
    for rule in rules {
        if rule.kind() == RuleKind::Grouped && rule.fired_count == 0 {
            invoke(world, rule, &[]);
        }
    }
}

/// Runs a rule's callback over `matches`, returning false if it failed.
///
/// The first failure is reported against the rule's program at the rule's
/// registration site and skips the remaining matches.
fn invoke(world: &mut WorldState, rule: &Rule, matches: &[Match]) -> bool {
    let mut ctx = ProgramContext::new(world, rule.source.clone(), true);
    let result = match &rule.body {
        RuleBody::Each { callback, .. } | RuleBody::Capture { callback, .. } => matches
            .iter()
            .try_for_each(|m| run_contained(|| callback(&mut ctx, m))),
        RuleBody::Grouped { callback, .. } => run_contained(|| callback(&mut ctx, matches)),
    };

    match result {
        Ok(()) => true,
        Err(err) => {
            warn!(rule = %rule.id, source = %rule.source, location = %rule.location, error = %err, "rule failed");
            ctx.report_failure(err.to_string(), rule.location);
            false
        }
    }
}
