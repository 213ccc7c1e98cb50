//! Per-program diagnostics and the sinks they are published to.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::claim::ProgramId;
use crate::error::{ExecutionError, FactLogResult};
use crate::rule::{Rule, RuleId, RuleKind, SourceLocation};
use crate::world::{ErrorEntry, LogEntry, WorldState};

/// How often one rule fired during a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleDiagnostics {
    pub rule_id: RuleId,
    pub kind: RuleKind,
    pub fired_count: usize,
    pub location: SourceLocation,
}

impl From<&Rule> for RuleDiagnostics {
    fn from(rule: &Rule) -> Self {
        Self {
            rule_id: rule.id,
            kind: rule.kind(),
            fired_count: rule.fired_count,
            location: rule.location,
        }
    }
}

/// Everything one program produced that a debugger wants to see.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgramDiagnostics {
    /// Where the program's own debugger listens, if it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_url: Option<String>,
    pub errors: Vec<ErrorEntry>,
    pub matches: Vec<RuleDiagnostics>,
    pub logs: Vec<LogEntry>,
}

/// Diagnostics of one tick, grouped by program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsReport {
    pub tick: u64,
    pub generated_at: DateTime<Utc>,
    pub programs: BTreeMap<ProgramId, ProgramDiagnostics>,
}

impl Default for DiagnosticsReport {
    fn default() -> Self {
        Self {
            tick: 0,
            generated_at: Utc::now(),
            programs: BTreeMap::new(),
        }
    }
}

impl DiagnosticsReport {
    /// Collects the report for `tick` from the world and the rules evaluated in it.
    ///
    /// Every program in `running` gets an entry even when it produced nothing;
    /// engine errors show up under `core`.
    #[must_use]
    pub fn collect<'a>(
        tick: u64,
        running: impl IntoIterator<Item = (&'a ProgramId, Option<&'a str>)>,
        world: &WorldState,
        rules: &[Rule],
    ) -> Self {
        let mut programs: BTreeMap<ProgramId, ProgramDiagnostics> = running
            .into_iter()
            .map(|(id, debug_url)| {
                let diagnostics = ProgramDiagnostics {
                    debug_url: debug_url.map(str::to_owned),
                    ..ProgramDiagnostics::default()
                };
                (id.clone(), diagnostics)
            })
            .collect();

        for error in world.errors() {
            programs.entry(error.source.clone()).or_default().errors.push(error.clone());
        }
        for rule in rules {
            programs.entry(rule.source.clone()).or_default().matches.push(rule.into());
        }
        for log in world.logs() {
            programs.entry(log.source.clone()).or_default().logs.push(log.clone());
        }

        Self {
            tick,
            generated_at: Utc::now(),
            programs,
        }
    }

    #[must_use]
    pub fn program(&self, id: &ProgramId) -> Option<&ProgramDiagnostics> {
        self.programs.get(id)
    }

    /// Programs that have a debug URL, for sinks that push to each program's debugger.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &ProgramId, &ProgramDiagnostics)> {
        self.programs
            .iter()
            .filter_map(|(id, diag)| diag.debug_url.as_deref().map(|url| (url, id, diag)))
    }

    /// Total error count across programs.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.programs.values().map(|p| p.errors.len()).sum()
    }
}

/// Destination of diagnostics reports.
pub trait DiagnosticsSink: Send {
    fn publish(&mut self, report: &DiagnosticsReport) -> FactLogResult<()>;
}

/// Writes each report as one line of JSON.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> DiagnosticsSink for JsonLinesSink<W> {
    fn publish(&mut self, report: &DiagnosticsReport) -> FactLogResult<()> {
        let io_err = |e: std::io::Error| ExecutionError::TelemetryUnavailable { message: e.to_string() };
        let line = serde_json::to_string(report).map_err(|e| ExecutionError::TelemetryUnavailable {
            message: e.to_string(),
        })?;
        writeln!(self.writer, "{line}").map_err(io_err)?;
        self.writer.flush().map_err(io_err)?;
        Ok(())
    }
}
