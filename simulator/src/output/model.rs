use compcore::processing::ReductionSummary;
use compcore::telemetry::Metrics;
use compcore::ErrorKind;
use serde::Serialize;

/// A unit of work that failed; the run carried on without it.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub input: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// End-of-run report written next to the products.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub metrics: Metrics,
    pub reductions: Vec<ReductionSummary>,
    pub failures: Vec<Failure>,
    pub skipped: Vec<String>,
    /// Set when the run was stopped before every request finished.
    pub interrupted: bool,
}
