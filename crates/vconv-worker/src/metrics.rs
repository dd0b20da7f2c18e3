//! Worker metrics.
//!
//! Counters are recorded through the `metrics` facade; without an
//! installed recorder they are no-ops.

use metrics::counter;
use vconv_models::TraceLevel;

/// Metric name constants for consistency.
pub mod names {
    /// Units processed, by outcome.
    pub const UNITS_TOTAL: &str = "vconv_units_total";

    /// Pipeline stage failures, by stage.
    pub const STAGE_FAILURES_TOTAL: &str = "vconv_stage_failures_total";

    /// Finished invocations, by final severity.
    pub const INVOCATIONS_TOTAL: &str = "vconv_invocations_total";
}

pub fn record_unit(completed: bool) {
    let outcome = if completed { "completed" } else { "failed" };
    counter!(names::UNITS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_stage_failure(stage: &'static str) {
    counter!(names::STAGE_FAILURES_TOTAL, "stage" => stage).increment(1);
}

pub fn record_invocation(level: TraceLevel) {
    counter!(names::INVOCATIONS_TOTAL, "level" => level.as_str()).increment(1);
}
