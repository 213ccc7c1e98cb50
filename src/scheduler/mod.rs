//! Tick-driven rule scheduler.
//!
//! One call to [`Scheduler::tick`] is one evaluation cycle:
//! program sync, store rebuild (registered claims plus base facts), fired-count
//! reset, capture registration, partition of the world (dynamic entries are
//! dropped, the rules snapshot is kept for evaluation), the fixpoint loop,
//! finalization of idle grouped rules, and diagnostics.
//!
//! Dynamic claims created during tick N are therefore exactly the ones that
//! reach the store of tick N+1.

mod config;
mod fixpoint;
mod sync;

use serde::Serialize;
use tracing::{debug, debug_span, warn};

use crate::base_facts::{BaseFactSource, CoreFacts};
use crate::claim::ProgramId;
use crate::diagnostics::DiagnosticsReport;
use crate::program::Program;
use crate::query::FactDb;
use crate::rule::{Rule, RuleBody};
use crate::telemetry::TelemetryPublisher;
use crate::world::WorldState;

pub use config::{SchedulerConfig, DEFAULT_MAX_SETTLE_ITERATIONS};
pub use sync::SyncSummary;

/// Summary of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    /// Fixpoint iterations run.
    pub iterations: usize,
    /// False when the iteration ceiling stopped the loop.
    pub settled: bool,
    /// Rules that matched at least once.
    pub rules_fired: usize,
    /// Facts in the store at the end of the tick.
    pub facts: usize,
    /// Errors in the world at the end of the tick, static ones included.
    pub errors: usize,
}

/// Owns the world and evaluates it one tick at a time.
pub struct Scheduler {
    config: SchedulerConfig,
    world: WorldState,
    programs: sync::ProgramSync,
    base_facts: Box<dyn BaseFactSource>,
    telemetry: Option<TelemetryPublisher>,
    tick: u64,
    db: FactDb,
    diagnostics: DiagnosticsReport,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        let base_facts = Box::new(CoreFacts::new(config.viewport));
        Self {
            config,
            world: WorldState::new(),
            programs: sync::ProgramSync::default(),
            base_facts,
            telemetry: None,
            tick: 0,
            db: FactDb::new(),
            diagnostics: DiagnosticsReport::default(),
        }
    }

    /// Replaces the default base facts.
    #[must_use]
    pub fn with_base_facts(mut self, source: impl BaseFactSource + 'static) -> Self {
        self.base_facts = Box::new(source);
        self
    }

    /// Offers every tick's diagnostics to `publisher`.
    #[must_use]
    pub fn with_telemetry(mut self, publisher: TelemetryPublisher) -> Self {
        self.telemetry = Some(publisher);
        self
    }

    /// Detaches the telemetry publisher, e.g. to shut it down.
    pub fn take_telemetry(&mut self) -> Option<TelemetryPublisher> {
        self.telemetry.take()
    }

    /// Runs one tick with `programs` as the set of programs that should be running.
    ///
    /// When an id appears more than once, the first program with that id is used.
    pub fn tick(&mut self, programs: &[Program]) -> TickReport {
        self.tick += 1;
        let tick = self.tick;
        let span = debug_span!("tick", tick);
        let _guard = span.enter();

        let programs = sync::first_by_id(programs);
        let summary = self.programs.sync(&programs, &mut self.world);
        if !summary.is_empty() {
            debug!(
                started = summary.started.len(),
                restarted = summary.restarted.len(),
                stopped = summary.stopped.len(),
                "programs synced"
            );
        }

        let mut db = FactDb::new();
        for claim in self.world.claims() {
            db.add_claim(claim);
        }
        let mut base = Vec::new();
        self.base_facts.base_facts(&programs, &mut base);
        for claim in &base {
            db.add_claim(claim);
        }

        let mut rules: Vec<Rule> = self.world.rules().to_vec();
        for rule in &mut rules {
            rule.fired_count = 0;
        }
        for rule in &rules {
            if let RuleBody::Capture { pattern, .. } = &rule.body {
                if let Err(err) = db.register_capture(pattern.clone()) {
                    warn!(rule = %rule.id, source = %rule.source, error = %err, "capture template rejected");
                }
            }
        }

        self.world.retain_static();

        let outcome = fixpoint::run(&mut db, &mut self.world, &mut rules, self.config.max_settle_iterations);
        fixpoint::finalize(&mut self.world, &rules);

        let report = TickReport {
            tick,
            iterations: outcome.iterations,
            settled: outcome.settled,
            rules_fired: rules.iter().filter(|r| r.fired_count > 0).count(),
            facts: db.store().len(),
            errors: self.world.errors().len(),
        };
        debug!(
            iterations = report.iterations,
            settled = report.settled,
            rules = rules.len(),
            rules_fired = report.rules_fired,
            facts = report.facts,
            errors = report.errors,
            "tick complete"
        );

        self.diagnostics = DiagnosticsReport::collect(tick, self.programs.running(), &self.world, &rules);
        if let Some(publisher) = &self.telemetry {
            publisher.offer(self.diagnostics.clone());
        }
        self.db = db;

        report
    }

    /// The store as it stood at the end of the last tick.
    #[must_use]
    pub const fn last_facts(&self) -> &FactDb {
        &self.db
    }

    /// Diagnostics of the last tick.
    #[must_use]
    pub const fn diagnostics(&self) -> &DiagnosticsReport {
        &self.diagnostics
    }

    #[must_use]
    pub const fn world(&self) -> &WorldState {
        &self.world
    }

    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of ticks run so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn running_programs(&self) -> impl Iterator<Item = &ProgramId> {
        self.programs.running().map(|(id, _)| id)
    }

    #[must_use]
    pub fn is_running(&self, id: &ProgramId) -> bool {
        self.programs.is_running(id)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
