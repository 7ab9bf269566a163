use std::sync::Arc;

use compcore::interface::{ObservationSource, ProductSink, ReduceRequest};
use compcore::processing::{reduce_observation, ReduceOptions, ReductionSummary};
use compcore::telemetry::MetricsRecorder;
use compcore::{ErrorKind, InstrumentContext, ReduceError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::output::model::{Failure, RunSummary};

pub type SharedSource = Arc<dyn ObservationSource + Send + Sync>;
pub type SharedSink = Arc<dyn ProductSink + Send + Sync>;

/// Result of one unit of work.
#[derive(Debug)]
pub enum Outcome {
    Reduced(ReductionSummary),
    Skipped(String),
    Failed(Failure),
}

/// Reduces requests against shared, read-only calibration.
#[derive(Clone)]
pub struct Runner {
    ctx: Arc<InstrumentContext>,
    options: Arc<ReduceOptions>,
    source: SharedSource,
    sink: SharedSink,
    metrics: Arc<MetricsRecorder>,
}

impl Runner {
    pub fn new(ctx: InstrumentContext, options: ReduceOptions, source: SharedSource, sink: SharedSink) -> Self {
        Self {
            ctx: Arc::new(ctx),
            options: Arc::new(options),
            source,
            sink,
            metrics: Arc::new(MetricsRecorder::new()),
        }
    }

    /// Reduce one request synchronously; failures are recorded, not raised.
    pub fn execute(&self, request: &ReduceRequest) -> Outcome {
        let result = reduce_observation(
            &self.ctx,
            request,
            &self.options,
            self.source.as_ref(),
            self.sink.as_ref(),
        );
        match result {
            Ok(Some(summary)) => {
                self.metrics.record_processed(summary.notes.warnings.len());
                Outcome::Reduced(summary)
            }
            Ok(None) => {
                self.metrics.record_skipped();
                Outcome::Skipped(request.input_name())
            }
            Err(err) => {
                self.metrics.record_failed();
                Outcome::Failed(failure(request, &err))
            }
        }
    }

    /// Reduce every request with at most `jobs` running at once. Each request
    /// runs on the blocking pool since the core is synchronous.
    pub async fn run_all(&self, requests: Vec<ReduceRequest>, jobs: usize) -> RunSummary {
        let permits = Arc::new(Semaphore::new(jobs.max(1)));
        let mut tasks = JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let runner = self.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let name = request.input_name();
                let outcome = tokio::task::spawn_blocking(move || runner.execute(&request))
                    .await
                    .unwrap_or_else(|err| {
                        Outcome::Failed(Failure {
                            input: name,
                            kind: ErrorKind::Output,
                            message: format!("reduction task aborted: {err}"),
                        })
                    });
                (index, outcome)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => outcomes.push(pair),
                Err(err) => log::error!("reduction task failed to join: {err}"),
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);

        let mut summary = RunSummary::default();
        for (_, outcome) in outcomes {
            match outcome {
                Outcome::Reduced(reduction) => summary.reductions.push(reduction),
                Outcome::Skipped(name) => summary.skipped.push(name),
                Outcome::Failed(failure) => summary.failures.push(failure),
            }
        }
        summary.metrics = self.metrics.snapshot();
        summary
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }
}

fn failure(request: &ReduceRequest, err: &ReduceError) -> Failure {
    Failure {
        input: request.input_name(),
        kind: err.kind(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::tests::{request, small_setup};
    use crate::generator::profile::SyntheticSource;
    use crate::output::writer::JsonProductSink;
    use compcore::context::WaveTable;
    use compcore::WaveType;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn runner(dir: &std::path::Path) -> (Runner, Arc<JsonProductSink>) {
        let (ctx, config) = small_setup();
        let source = Arc::new(SyntheticSource::new(ctx.clone(), config));
        let sink = Arc::new(JsonProductSink::new(dir).unwrap());
        (Runner::new(ctx, ReduceOptions::default(), source, sink.clone()), sink)
    }

    #[test]
    fn execute_reduces_and_writes() {
        let dir = tempdir().unwrap();
        let (runner, sink) = runner(dir.path());
        let request = request("20150624");
        match runner.execute(&request) {
            Outcome::Reduced(summary) => {
                assert_eq!(summary.extensions, 8);
                assert!(summary.velocity_pixels > 0);
                assert!(sink.dir().join(format!("{}.json", request.output_name())).exists());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(runner.metrics().snapshot().processed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_all_keeps_going_past_missing_and_failed_units() {
        let dir = tempdir().unwrap();
        let (ctx, mut config) = small_setup();
        config.missing_dates = vec!["20150625".into()];
        let source = Arc::new(SyntheticSource::new(ctx.clone(), config));
        let sink = Arc::new(JsonProductSink::new(dir.path()).unwrap());

        // A context without constants for 1083 fails that line only.
        let mut partial = ctx.clone();
        let mut entries = BTreeMap::new();
        entries.insert(WaveType::Fe1074, ctx.waves.lookup(WaveType::Fe1074).unwrap().clone());
        partial.waves = WaveTable::new(entries);
        let runner = Runner::new(partial, ReduceOptions::default(), source, sink);

        let mut bad = request("20150626");
        bad.wave_type = WaveType::He1083;
        let requests = vec![request("20150624"), request("20150625"), bad.clone()];

        let summary = runner.run_all(requests, 2).await;
        assert_eq!(summary.reductions.len(), 1);
        assert_eq!(summary.reductions[0].input, request("20150624").input_name());
        assert_eq!(summary.skipped, vec![request("20150625").input_name()]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].input, bad.input_name());
        assert_eq!(summary.failures[0].kind, ErrorKind::Configuration);
        assert_eq!(summary.metrics.processed, 1);
        assert_eq!(summary.metrics.skipped, 1);
        assert_eq!(summary.metrics.failed, 1);
    }
}
