//! Programs and the callback surface they register through.
//!
//! A program is identified by its id and the BLAKE3 hash of its source text.
//! Its registrar runs once when the program starts (or its code changes) and
//! contributes static claims and rules; rule callbacks later contribute dynamic
//! ones through the same [`ProgramContext`].

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::base_facts::Placement;
use crate::claim::{Arg, Claim, ProgramId};
use crate::error::{ExecutionError, FactLogResult, ValidationError};
use crate::query::Match;
use crate::rule::{run_contained, Rule, RuleBody, RuleId, SourceLocation};
use crate::value::Value;
use crate::world::{LogEntry, WorldState};

/// Registration callback of a program.
pub type Registrar = Arc<dyn Fn(&mut ProgramContext<'_>) -> FactLogResult<()> + Send + Sync>;

/// BLAKE3 digest of a program's source text, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeHash(String);

impl CodeHash {
    #[must_use]
    pub fn of(source_text: &str) -> Self {
        Self(blake3::hash(source_text.as_bytes()).to_hex().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A program supplied to the scheduler.
#[derive(Clone)]
pub struct Program {
    pub id: ProgramId,
    pub code_hash: CodeHash,
    pub placement: Option<Placement>,
    pub debug_url: Option<String>,
    registrar: Registrar,
}

impl Program {
    /// Creates a program from its source text and registrar.
    pub fn new<F>(id: impl Into<ProgramId>, source_text: &str, registrar: F) -> Self
    where
        F: Fn(&mut ProgramContext<'_>) -> FactLogResult<()> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            code_hash: CodeHash::of(source_text),
            placement: None,
            debug_url: None,
            registrar: Arc::new(registrar),
        }
    }

    /// Sets the normalized placement reported by the camera.
    #[must_use]
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = Some(placement);
        self
    }

    #[must_use]
    pub fn with_debug_url(mut self, url: impl Into<String>) -> Self {
        self.debug_url = Some(url.into());
        self
    }

    /// Runs the registrar against `world`.
    ///
    /// A failure is recorded as a static error against the program and also
    /// returned to the caller.
    pub(crate) fn register(&self, world: &mut WorldState) -> Result<(), ExecutionError> {
        let mut ctx = ProgramContext::new(world, self.id.clone(), false);
        let registrar = &self.registrar;
        let Err(err) = run_contained(|| registrar(&mut ctx)) else {
            return Ok(());
        };

        let message = match err {
            ExecutionError::CallbackFailed { message } | ExecutionError::CallbackPanicked { message } => message,
            other => other.to_string(),
        };
        let err = ExecutionError::RegistrationFailed {
            program: self.id.clone(),
            message,
        };
        warn!(program = %self.id, error = %err, "program registration failed");
        world.report(self.id.clone(), false, err.to_string(), None);
        Err(err)
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.id)
            .field("code_hash", &self.code_hash)
            .field("placement", &self.placement)
            .field("debug_url", &self.debug_url)
            .finish_non_exhaustive()
    }
}

/// The surface handed to registrars and rule callbacks.
///
/// Everything created through a context is owned by its program; entries
/// created during registration are static, entries created inside a rule
/// callback are dynamic and last one tick.
pub struct ProgramContext<'w> {
    world: &'w mut WorldState,
    source: ProgramId,
    is_dynamic: bool,
}

impl<'w> ProgramContext<'w> {
    pub(crate) fn new(world: &'w mut WorldState, source: ProgramId, is_dynamic: bool) -> Self {
        Self {
            world,
            source,
            is_dynamic,
        }
    }

    #[must_use]
    pub const fn source(&self) -> &ProgramId {
        &self.source
    }

    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    /// Claims a ground fact.
    pub fn claim<V: Into<Value>>(&mut self, name: &str, values: impl IntoIterator<Item = V>) {
        self.assert(Claim::fact(name, values));
    }

    /// Adds a claim, stamping it with this program and persistence class.
    pub fn assert(&mut self, claim: Claim) {
        let claim = claim.with_source(self.source.clone()).dynamic(self.is_dynamic);
        self.world.claims.push(claim);
    }

    /// Claims `"@ wishes " + name` with this program as first argument.
    pub fn wish<V: Into<Value>>(&mut self, name: &str, values: impl IntoIterator<Item = V>) {
        let args = values.into_iter().map(Arg::constant).collect();
        let claim = Claim::wish(&self.source, name, args).dynamic(self.is_dynamic);
        self.world.claims.push(claim);
    }

    /// Registers a rule that fires once per match of `patterns`.
    #[track_caller]
    pub fn when<F>(&mut self, patterns: Vec<Claim>, callback: F) -> FactLogResult<RuleId>
    where
        F: Fn(&mut ProgramContext<'_>, &Match) -> FactLogResult<()> + Send + Sync + 'static,
    {
        let location = SourceLocation::caller();
        if patterns.is_empty() {
            return Err(ValidationError::EmptyRule.into());
        }
        Ok(self.push_rule(
            RuleBody::Each {
                patterns,
                callback: Arc::new(callback),
            },
            location,
        ))
    }

    /// Registers a rule that fires once per tick with every match, possibly none.
    #[track_caller]
    pub fn when_all<F>(&mut self, patterns: Vec<Claim>, callback: F) -> FactLogResult<RuleId>
    where
        F: Fn(&mut ProgramContext<'_>, &[Match]) -> FactLogResult<()> + Send + Sync + 'static,
    {
        let location = SourceLocation::caller();
        if patterns.is_empty() {
            return Err(ValidationError::EmptyRule.into());
        }
        Ok(self.push_rule(
            RuleBody::Grouped {
                patterns,
                callback: Arc::new(callback),
            },
            location,
        ))
    }

    /// Registers a capture rule: `callback` runs for every query of
    /// `pattern`'s name that found nothing and lines up with `pattern`.
    #[track_caller]
    pub fn to_know<F>(&mut self, pattern: Claim, callback: F) -> FactLogResult<RuleId>
    where
        F: Fn(&mut ProgramContext<'_>, &Match) -> FactLogResult<()> + Send + Sync + 'static,
    {
        let location = SourceLocation::caller();
        if !pattern.has_capture_slot() {
            return Err(ValidationError::MissingCaptureSlot { name: pattern.name }.into());
        }
        Ok(self.push_rule(
            RuleBody::Capture {
                pattern,
                callback: Arc::new(callback),
            },
            location,
        ))
    }

    /// Emits a structured log entry.
    pub fn log(&mut self, value: impl Into<serde_json::Value>) {
        self.world.logs.push(LogEntry {
            source: self.source.clone(),
            is_dynamic: self.is_dynamic,
            logged_at: Utc::now(),
            value: value.into(),
        });
    }

    /// Reports an error attributed to the calling line.
    #[track_caller]
    pub fn report_error(&mut self, message: impl fmt::Display) {
        let location = SourceLocation::caller();
        self.world
            .report(self.source.clone(), self.is_dynamic, message.to_string(), Some(location));
    }

    /// Records a contained rule failure at the rule's registration site.
    pub(crate) fn report_failure(&mut self, message: String, location: SourceLocation) {
        self.world
            .report(self.source.clone(), self.is_dynamic, message, Some(location));
    }

    fn push_rule(&mut self, body: RuleBody, location: SourceLocation) -> RuleId {
        let rule = Rule::new(body, self.source.clone(), self.is_dynamic, location);
        let id = rule.id;
        self.world.rules.push(rule);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::var;
    use crate::error::FactLogError;
    use crate::rule::RuleKind;

    #[test]
    fn test_code_hash_tracks_source_text() {
        assert_eq!(CodeHash::of("claim"), CodeHash::of("claim"));
        assert_ne!(CodeHash::of("claim a"), CodeHash::of("claim b"));
        assert_eq!(CodeHash::of("").as_str().len(), 64);
    }

    #[test]
    fn test_context_stamps_source_and_class() {
        let mut world = WorldState::new();
        let mut ctx = ProgramContext::new(&mut world, ProgramId::from("3"), true);
        ctx.claim("@ is red", ["ball"]);
        ctx.wish("@ is highlighted", ["ball"]);
        ctx.log("hi");

        assert!(world.claims().iter().all(|c| c.is_dynamic && c.source.as_str() == "3"));
        let wish = &world.claims()[1];
        assert_eq!(wish.name, "@ wishes @ is highlighted");
        assert_eq!(wish.args[0], Arg::constant("3"));
        assert_eq!(world.logs()[0].value, serde_json::json!("hi"));
    }

    #[test]
    fn test_assert_overrides_claim_source() {
        let mut world = WorldState::new();
        let mut ctx = ProgramContext::new(&mut world, ProgramId::from("3"), false);
        ctx.assert(Claim::fact("@ is red", ["ball"]).with_source("9").dynamic(true));
        assert_eq!(world.claims()[0].source.as_str(), "3");
        assert!(!world.claims()[0].is_dynamic);
    }

    #[test]
    fn test_rule_registration_records_kind_and_location() {
        let mut world = WorldState::new();
        let mut ctx = ProgramContext::new(&mut world, ProgramId::from("1"), false);
        let line = line!() + 1;
        ctx.when(vec![Claim::new("@ is red", vec![var("x")])], |_, _| Ok(()))
            .unwrap();
        ctx.when_all(vec![Claim::new("@ is red", vec![var("x")])], |_, _| Ok(()))
            .unwrap();
        ctx.to_know(Claim::new("@ is red", vec![var("?x")]), |_, _| Ok(()))
            .unwrap();

        let kinds: Vec<_> = world.rules().iter().map(Rule::kind).collect();
        assert_eq!(kinds, vec![RuleKind::Each, RuleKind::Grouped, RuleKind::Capture]);
        assert_eq!(world.rules()[0].location.line, line);
        assert!(world.rules()[0].location.file.ends_with("program.rs"));
    }

    #[test]
    fn test_rule_registration_validates_patterns() {
        let mut world = WorldState::new();
        let mut ctx = ProgramContext::new(&mut world, ProgramId::from("1"), false);
        let err = ctx.when(vec![], |_, _| Ok(())).unwrap_err();
        assert_eq!(err, FactLogError::Validation(ValidationError::EmptyRule));

        let err = ctx
            .to_know(Claim::new("@ is red", vec![var("x")]), |_, _| Ok(()))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(world.rules().is_empty());
    }

    #[test]
    fn test_report_error_points_at_caller() {
        let mut world = WorldState::new();
        let mut ctx = ProgramContext::new(&mut world, ProgramId::from("1"), true);
        let line = line!() + 1;
        ctx.report_error("oops");
        let entry = &world.errors()[0];
        assert_eq!(entry.message, "oops");
        assert!(entry.is_dynamic);
        assert_eq!(entry.location.map(|l| l.line), Some(line));
    }

    #[test]
    fn test_register_runs_registrar_statically() {
        let program = Program::new("5", "claim cool", |ctx| {
            ctx.claim("@ is cool", ["Bart"]);
            Ok(())
        });
        let mut world = WorldState::new();
        program.register(&mut world).unwrap();
        assert_eq!(world.claims().len(), 1);
        assert!(!world.claims()[0].is_dynamic);
    }

    #[test]
    fn test_register_contains_failures() {
        let failing = Program::new("6", "fail", |_| Err(FactLogError::callback("syntax error")));
        let panicking = Program::new("7", "panic", |_| panic!("undefined is not a function"));

        let mut world = WorldState::new();
        let err = failing.register(&mut world).unwrap_err();
        assert_eq!(
            err,
            ExecutionError::RegistrationFailed {
                program: ProgramId::from("6"),
                message: "syntax error".to_string()
            }
        );
        assert!(panicking.register(&mut world).is_err());

        assert_eq!(world.errors().len(), 2);
        assert!(world.errors().iter().all(|e| !e.is_dynamic));
        assert!(world.errors()[1].message.contains("undefined is not a function"));
    }
}
