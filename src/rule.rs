//! Rules registered by programs.
//!
//! A rule is one of three kinds, kept as a closed enum the scheduler matches on:
//! - `Each`: fires its callback once per match of a pattern conjunction;
//! - `Grouped`: fires once with every match as a batch;
//! - `Capture`: fires once per missing-fact capture recorded for its template.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::claim::{Claim, ProgramId};
use crate::error::{ExecutionError, FactLogError, FactLogResult};
use crate::program::ProgramContext;
use crate::query::Match;

/// Unique identifier for a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(Uuid);

impl RuleId {
    /// Creates a new random rule ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where in program code a rule was registered or an error was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// The location of the caller of the enclosing `#[track_caller]` function.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&'static Location<'static>> for SourceLocation {
    fn from(loc: &'static Location<'static>) -> Self {
        Self {
            file: loc.file(),
            line: loc.line(),
            column: loc.column(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Callback invoked with a single match.
pub type EachCallback =
    Arc<dyn Fn(&mut ProgramContext<'_>, &Match) -> FactLogResult<()> + Send + Sync>;

/// Callback invoked with every match at once.
pub type BatchCallback =
    Arc<dyn Fn(&mut ProgramContext<'_>, &[Match]) -> FactLogResult<()> + Send + Sync>;

/// Discriminant of [`RuleBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Each,
    Grouped,
    Capture,
}

/// What a rule matches and what it calls.
#[derive(Clone)]
pub enum RuleBody {
    Each {
        patterns: Vec<Claim>,
        callback: EachCallback,
    },
    Grouped {
        patterns: Vec<Claim>,
        callback: BatchCallback,
    },
    Capture {
        pattern: Claim,
        callback: EachCallback,
    },
}

impl RuleBody {
    #[must_use]
    pub const fn kind(&self) -> RuleKind {
        match self {
            Self::Each { .. } => RuleKind::Each,
            Self::Grouped { .. } => RuleKind::Grouped,
            Self::Capture { .. } => RuleKind::Capture,
        }
    }

    /// The patterns this rule queries; a capture rule has exactly one.
    #[must_use]
    pub fn patterns(&self) -> &[Claim] {
        match self {
            Self::Each { patterns, .. } | Self::Grouped { patterns, .. } => patterns,
            Self::Capture { pattern, .. } => std::slice::from_ref(pattern),
        }
    }
}

/// A registered rule.
#[derive(Clone)]
pub struct Rule {
    pub id: RuleId,
    pub body: RuleBody,
    pub source: ProgramId,
    pub is_dynamic: bool,
    pub location: SourceLocation,
    pub(crate) fired_count: usize,
}

impl Rule {
    #[must_use]
    pub fn new(body: RuleBody, source: ProgramId, is_dynamic: bool, location: SourceLocation) -> Self {
        Self {
            id: RuleId::new(),
            body,
            source,
            is_dynamic,
            location,
            fired_count: 0,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> RuleKind {
        self.body.kind()
    }

    /// Matches delivered to the callback during the current tick.
    #[must_use]
    pub const fn fired_count(&self) -> usize {
        self.fired_count
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("patterns", &self.body.patterns())
            .field("source", &self.source)
            .field("is_dynamic", &self.is_dynamic)
            .field("location", &self.location)
            .field("fired_count", &self.fired_count)
            .finish()
    }
}

/// Runs program code, turning error returns and panics into an `ExecutionError`.
pub(crate) fn run_contained<F>(f: F) -> Result<(), ExecutionError>
where
    F: FnOnce() -> FactLogResult<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(FactLogError::Execution(err))) => Err(err),
        Ok(Err(other)) => Err(ExecutionError::CallbackFailed {
            message: other.to_string(),
        }),
        Err(payload) => Err(ExecutionError::CallbackPanicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
