//! Scheduler configuration.

use serde::{Deserialize, Serialize};

use crate::base_facts::Viewport;
use crate::telemetry::TelemetryConfig;

/// Default ceiling on fixpoint iterations per tick.
pub const DEFAULT_MAX_SETTLE_ITERATIONS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Fixpoint iterations allowed per tick; `None` never gives up.
    pub max_settle_iterations: Option<usize>,
    /// Projection surface used by the default base facts.
    pub viewport: Viewport,
    /// Settings for a telemetry publisher built from this config.
    pub telemetry: TelemetryConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_settle_iterations: Some(DEFAULT_MAX_SETTLE_ITERATIONS),
            viewport: Viewport::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}
