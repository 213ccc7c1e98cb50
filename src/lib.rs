//! # FactLog - facts, queries and forward-chaining rules
//!
//! FactLog is an in-process fact database paired with a tick-driven rule
//! scheduler. Programs claim facts and register rules; every tick the
//! scheduler rebuilds the fact store and runs rules until nothing new is
//! learned.
//!
//! ## Core Concepts
//!
//! - **Claim**: a named tuple such as `"@ is father of @"` with ordered arguments
//! - **Match**: variable bindings produced by a conjunctive query
//! - **Capture**: a record of a query that found nothing, used by absence-driven rules
//! - **Tick**: one evaluation cycle of the [`Scheduler`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use factlog::{var, Claim, Program, Scheduler, SchedulerConfig};
//!
//! let program = Program::new("1", "highlight programs", |ctx| {
//!     ctx.when(vec![Claim::new("@ is a @", vec![var("p"), factlog::val("program")])], |ctx, m| {
//!         ctx.wish("@ is highlighted", [m.require("p")?.clone()]);
//!         Ok(())
//!     })?;
//!     Ok(())
//! });
//!
//! let mut scheduler = Scheduler::new(SchedulerConfig::default());
//! let report = scheduler.tick(&[program]);
//! assert!(report.settled);
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Data model
pub mod claim;
pub mod error;
pub mod value;

// Store and queries
pub mod query;
pub mod storage;

// Programs, rules and evaluation
pub mod base_facts;
pub mod core_programs;
pub mod program;
pub mod rule;
pub mod scheduler;
pub mod world;

// Diagnostics
pub mod diagnostics;
pub mod telemetry;

// Re-export primary types at crate root for convenience
pub use base_facts::{BaseFactSource, CoreFacts, CornerPoints, Placement, Point, Viewport};
pub use claim::{val, var, Arg, Claim, ProgramId};
pub use diagnostics::{
    DiagnosticsReport, DiagnosticsSink, JsonLinesSink, ProgramDiagnostics, RuleDiagnostics,
};
pub use error::{ExecutionError, FactLogError, FactLogResult, ValidationError};
pub use program::{CodeHash, Program, ProgramContext};
pub use query::{FactDb, Match};
pub use rule::{RuleId, RuleKind, SourceLocation};
pub use scheduler::{Scheduler, SchedulerConfig, TickReport};
pub use telemetry::{TelemetryConfig, TelemetryPublisher};
pub use value::Value;
pub use world::{ErrorEntry, LogEntry, WorldState};
