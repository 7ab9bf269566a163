use std::sync::Mutex;

/// Run-level counters shared by concurrently reduced files.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

/// Snapshot of the counters at one point in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Metrics {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub warnings: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_processed(&self, warnings: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.processed += 1;
            metrics.warnings += warnings;
        }
    }

    pub fn record_failed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.failed += 1;
        }
    }

    pub fn record_skipped(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.skipped += 1;
        }
    }

    pub fn snapshot(&self) -> Metrics {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let recorder = MetricsRecorder::new();
        recorder.record_processed(2);
        recorder.record_processed(0);
        recorder.record_failed();
        recorder.record_skipped();
        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.processed, 2);
        assert_eq!(snapshot.warnings, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.skipped, 1);
    }
}
