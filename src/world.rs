//! World state: everything programs have contributed.
//!
//! The scheduler owns exactly one `WorldState`. Registrars and rule callbacks
//! append to it through a [`ProgramContext`](crate::program::ProgramContext);
//! every entry carries its owning program and persistence class so program
//! removal and the per-tick partition are plain filters.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::claim::{Claim, ProgramId};
use crate::rule::{Rule, SourceLocation};

/// A runtime error attributed to a program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    pub source: ProgramId,
    pub is_dynamic: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

/// A structured log entry emitted by a program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub source: ProgramId,
    pub is_dynamic: bool,
    pub logged_at: DateTime<Utc>,
    pub value: serde_json::Value,
}

/// Registered claims, rules, errors and logs.
#[derive(Debug, Default, Clone)]
pub struct WorldState {
    pub(crate) claims: Vec<Claim>,
    pub(crate) rules: Vec<Rule>,
    pub(crate) errors: Vec<ErrorEntry>,
    pub(crate) logs: Vec<LogEntry>,
}

impl WorldState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    #[must_use]
    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Errors owned by `source`, static entries first in registration order.
    pub fn errors_for<'a>(&'a self, source: &'a ProgramId) -> impl Iterator<Item = &'a ErrorEntry> + 'a {
        self.errors.iter().filter(move |e| &e.source == source)
    }

    pub fn logs_for<'a>(&'a self, source: &'a ProgramId) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.logs.iter().filter(move |l| &l.source == source)
    }

    /// Removes every claim, rule, error and log owned by `source`.
    pub fn purge(&mut self, source: &ProgramId) {
        self.claims.retain(|c| &c.source != source);
        self.rules.retain(|r| &r.source != source);
        self.errors.retain(|e| &e.source != source);
        self.logs.retain(|l| &l.source != source);
    }

    /// Drops every dynamic entry; static entries carry forward.
    pub fn retain_static(&mut self) {
        self.claims.retain(|c| !c.is_dynamic);
        self.rules.retain(|r| !r.is_dynamic);
        self.errors.retain(|e| !e.is_dynamic);
        self.logs.retain(|l| !l.is_dynamic);
    }

    /// Records an error against `source`.
    pub fn report(
        &mut self,
        source: ProgramId,
        is_dynamic: bool,
        message: impl Into<String>,
        location: Option<SourceLocation>,
    ) {
        self.errors.push(ErrorEntry {
            source,
            is_dynamic,
            message: message.into(),
            location,
        });
    }
}
