//! Batch orchestration.
//!
//! Turns one invocation's notifications into conversion units, runs
//! every unit's pipeline concurrently and reports a single
//! [`InvocationReport`]. A unit failure is recorded and contained; only
//! errors in the batch's own control flow are batch-fatal, and even those
//! end up in the report. The trace is finalized exactly once per call.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};
use vconv_media::{FfmpegRunner, Transcoder};
use vconv_models::{InvocationReport, StorageEvent, TraceLevel};
use vconv_storage::{ObjectStore, S3Client};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::pipeline::{Pipeline, StageFailure, UnitOutcome};
use crate::trace::TraceContext;
use crate::unit::ConversionUnit;

/// An invocation whose report carries `error` severity.
///
/// The full report travels with the error.
#[derive(Debug, Error)]
#[error("conversion batch finished with severity error")]
pub struct InvocationFailed(pub InvocationReport);

impl InvocationFailed {
    pub fn report(&self) -> &InvocationReport {
        &self.0
    }
}

/// Outcome of one invocation; the report is present on both arms.
pub type InvocationResult = Result<InvocationReport, InvocationFailed>;

/// Counts recorded once every unit has settled.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub units: usize,
    pub completed: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<UnitFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub key: String,
    #[serde(flatten)]
    pub failure: StageFailure,
}

impl BatchSummary {
    fn from_outcomes(outcomes: &[UnitOutcome]) -> Self {
        let failures: Vec<UnitFailure> = outcomes
            .iter()
            .filter_map(|o| {
                o.failure.clone().map(|failure| UnitFailure {
                    key: o.unit.source_key.clone(),
                    failure,
                })
            })
            .collect();

        Self {
            units: outcomes.len(),
            completed: outcomes.iter().filter(|o| o.is_success()).count(),
            failed: failures.len(),
            failures,
        }
    }
}

/// Runs conversion batches against one store and one encoder.
#[derive(Clone)]
pub struct BatchProcessor {
    config: WorkerConfig,
    store: Arc<dyn ObjectStore>,
    transcoder: Arc<dyn Transcoder>,
}

impl BatchProcessor {
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn ObjectStore>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            config,
            store,
            transcoder,
        }
    }

    /// S3 storage from the environment and FFmpeg from config or PATH.
    pub async fn from_config(config: WorkerConfig) -> WorkerResult<Self> {
        let store = S3Client::from_env().await?;

        let runner = match &config.ffmpeg_path {
            Some(path) => FfmpegRunner::new().with_binary(path),
            None => FfmpegRunner::new(),
        };

        Ok(Self::new(config, Arc::new(store), Arc::new(runner)))
    }

    /// Process every eligible object in `event` and report.
    pub async fn handle(&self, event: &StorageEvent) -> InvocationResult {
        let span = info_span!("invocation", records = event.records.len());

        async {
            let trace = TraceContext::new();
            trace.init();

            match self.process(event, &trace).await {
                Ok(summary) => debug!(
                    "Batch settled: {} completed, {} failed",
                    summary.completed, summary.failed
                ),
                Err(e) => record_batch_error(&trace, &e),
            }

            finish(trace)
        }
        .instrument(span)
        .await
    }

    /// Eligible units for `event`, in notification order.
    ///
    /// Fails on the first source key that cannot be decoded.
    pub fn select_units(&self, event: &StorageEvent) -> WorkerResult<Vec<ConversionUnit>> {
        let mut units = Vec::new();

        for record in &event.records {
            match ConversionUnit::from_record(record, &self.config.profile, &self.config.scratch_dir)? {
                Some(unit) => units.push(unit),
                None => debug!("Skipping {}: not a source object", record.raw_key()),
            }
        }

        Ok(units)
    }

    async fn process(
        &self,
        event: &StorageEvent,
        trace: &TraceContext,
    ) -> WorkerResult<BatchSummary> {
        let event = trace.info("Notification records", event)?;
        let units = self.select_units(event)?;
        let units = trace.info("Objects to process", units)?;

        let pipeline = Pipeline::new(
            self.store.as_ref(),
            self.transcoder.as_ref(),
            &self.config.profile,
            trace,
        );
        let outcomes = join_all(units.into_iter().map(|unit| pipeline.run(unit))).await;

        let summary = BatchSummary::from_outcomes(&outcomes);
        trace.info("Batch complete", summary)
    }
}

/// Map an invocation onto the Lambda handler's result.
///
/// A failed batch becomes an error whose message is the serialized
/// report, so the caller receives the record on both paths.
pub fn into_lambda_result(
    result: InvocationResult,
) -> Result<InvocationReport, lambda_runtime::Error> {
    match result {
        Ok(report) => Ok(report),
        Err(failed) => {
            let body = serde_json::to_string(failed.report())
                .map_err(|e| lambda_runtime::Error::from(format!("failed to serialize report: {e}")))?;
            Err(lambda_runtime::Error::from(body))
        }
    }
}

fn record_batch_error(trace: &TraceContext, err: &WorkerError) {
    error!("Batch failed: {}", err);
    trace.record(
        TraceLevel::Error,
        err.name(),
        serde_json::to_value(err.details()).ok(),
    );
}

fn finish(trace: TraceContext) -> InvocationResult {
    let (level, report) = trace.finalize();
    emit_report(&report);
    metrics::record_invocation(level);

    if level.is_error() {
        Err(InvocationFailed(report))
    } else {
        Ok(report)
    }
}

/// Write the report as one JSON log line at its own level.
fn emit_report(report: &InvocationReport) {
    let json = report_line(report);

    match report.level {
        TraceLevel::Debug => debug!(target: "vconv::report", "{}", json),
        TraceLevel::Info => info!(target: "vconv::report", "{}", json),
        TraceLevel::Warn => warn!(target: "vconv::report", "{}", json),
        TraceLevel::Error => error!(target: "vconv::report", "{}", json),
    }
}

fn report_line(report: &InvocationReport) -> String {
    serde_json::to_string(report).unwrap_or_else(|e| report_error_line(&e.to_string()))
}

fn report_error_line(message: &str) -> String {
    serde_json::json!({ "level": "error", "report_error": message }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fake_store, FakeTranscoder};
    use std::path::Path;
    use vconv_models::EventRecord;

    fn processor(
        scratch: &Path,
        failing_upload: Option<&str>,
        transcoder: Arc<FakeTranscoder>,
    ) -> BatchProcessor {
        let config = WorkerConfig::default().with_scratch_dir(scratch);
        BatchProcessor::new(config, Arc::new(fake_store(failing_upload)), transcoder)
    }

    fn event(keys: &[&str]) -> StorageEvent {
        StorageEvent::new(keys.iter().map(|k| EventRecord::new("media", *k)).collect())
    }

    fn count(report: &InvocationReport, message: &str) -> usize {
        report.trace.iter().filter(|e| e.message == message).count()
    }

    fn traced_keys(report: &InvocationReport, message: &str) -> Vec<String> {
        let mut keys: Vec<String> = report
            .trace
            .iter()
            .filter(|e| e.message == message)
            .filter_map(|e| e.aux.as_ref()?["source_key"].as_str().map(str::to_string))
            .collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_filters_to_source_objects() {
        let dir = tempfile::tempdir().unwrap();
        let p = processor(dir.path(), None, Arc::new(FakeTranscoder::new()));

        let units = p.select_units(&event(&["clip.mov", "notes.txt"])).unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].source_key, "clip.mov");
        assert_eq!(units[0].target_key, "clip.mp4");
    }

    #[test]
    fn test_each_eligible_record_yields_one_unit() {
        let dir = tempfile::tempdir().unwrap();
        let p = processor(dir.path(), None, Arc::new(FakeTranscoder::new()));

        let units = p
            .select_units(&event(&[
                "a/one.mov",
                "two.MOV",
                "b/three.mov",
                "four.mov.bak",
                "five+six.mov",
            ]))
            .unwrap();

        let keys: Vec<_> = units.iter().map(|u| u.source_key.as_str()).collect();
        assert_eq!(keys, vec!["a/one.mov", "b/three.mov", "five six.mov"]);
    }

    #[tokio::test]
    async fn test_successful_batch_reports_info() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(FakeTranscoder::new());
        let p = processor(dir.path(), None, transcoder.clone());

        let report = p
            .handle(&event(&["clip.mov", "notes.txt"]))
            .await
            .expect("batch should succeed");

        assert_eq!(report.level, TraceLevel::Info);
        assert_eq!(report.trace[0].message, "Notification records");
        assert_eq!(report.trace[1].message, "Objects to process");
        assert_eq!(report.trace.last().unwrap().message, "Batch complete");
        assert_eq!(count(&report, "Object converted"), 1);
        assert_eq!(report.trace.len(), 8);

        let scratch = dir.path();
        assert_eq!(
            transcoder.calls(),
            vec![vec![
                "-i".to_string(),
                scratch.join("clip.mov").to_string_lossy().to_string(),
                "-c".to_string(),
                "copy".to_string(),
                "-y".to_string(),
                scratch.join("clip.mp4").to_string_lossy().to_string(),
            ]]
        );
        assert!(!scratch.join("clip.mov").exists());
        assert!(!scratch.join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn test_upload_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let p = processor(dir.path(), Some("two.mp4"), Arc::new(FakeTranscoder::new()));

        let failed = p
            .handle(&event(&["one.mov", "two.mov", "three.mov"]))
            .await
            .unwrap_err();
        let report = failed.report();

        assert_eq!(report.level, TraceLevel::Error);
        assert_eq!(
            report.trace.iter().filter(|e| e.level == TraceLevel::Error).count(),
            1
        );
        assert_eq!(count(&report, "StorageError"), 1);

        assert_eq!(
            traced_keys(report, "Uploading converted object"),
            vec!["one.mov", "three.mov", "two.mov"]
        );
        assert_eq!(
            traced_keys(report, "Object converted"),
            vec!["one.mov", "three.mov"]
        );
        // Cleanup ran for all three, including the failed unit
        assert_eq!(count(&report, "Removing object files"), 3);

        let summary = report.trace.last().unwrap().aux.as_ref().unwrap();
        assert_eq!(summary["completed"], 2);
        assert_eq!(summary["failed"], 1);
        assert_eq!(summary["failures"][0]["key"], "two.mov");
        assert_eq!(summary["failures"][0]["stage"], "upload");
    }

    #[tokio::test]
    async fn test_convert_failure_does_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(FakeTranscoder::new().failing_on("bad.mov"));
        let p = processor(dir.path(), None, transcoder.clone());

        let failed = p.handle(&event(&["bad.mov", "good.mov"])).await.unwrap_err();

        assert_eq!(transcoder.calls().len(), 2);
        assert_eq!(traced_keys(failed.report(), "Object converted"), vec!["good.mov"]);
        assert_eq!(count(failed.report(), "MediaError"), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_info() {
        let dir = tempfile::tempdir().unwrap();
        let p = processor(dir.path(), None, Arc::new(FakeTranscoder::new()));

        let report = p.handle(&StorageEvent::default()).await.unwrap();

        assert_eq!(report.level, TraceLevel::Info);
        let messages: Vec<_> = report.trace.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["Notification records", "Objects to process", "Batch complete"]
        );
    }

    #[tokio::test]
    async fn test_undecodable_source_key_fails_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(FakeTranscoder::new());
        let p = processor(dir.path(), None, transcoder.clone());

        let failed = p
            .handle(&event(&["bad%FF.mov", "ok.mov", "notes%FF.txt"]))
            .await
            .unwrap_err();
        let report = failed.report();

        assert_eq!(report.level, TraceLevel::Error);
        assert_eq!(count(report, "InvalidKeyError"), 1);
        assert_eq!(count(report, "Objects to process"), 0);
        assert_eq!(count(report, "Object converted"), 0);
        assert!(report.trace.iter().all(|e| e.level != TraceLevel::Warn));
        assert!(transcoder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_non_source_key_is_dropped_silently() {
        let dir = tempfile::tempdir().unwrap();
        let p = processor(dir.path(), None, Arc::new(FakeTranscoder::new()));

        let report = p.handle(&event(&["notes%FF.txt", "ok.mov"])).await.unwrap();

        assert_eq!(report.level, TraceLevel::Info);
        assert_eq!(traced_keys(&report, "Object converted"), vec!["ok.mov"]);
    }

    #[tokio::test]
    async fn test_failed_batch_maps_to_error_carrying_report() {
        let dir = tempfile::tempdir().unwrap();
        let p = processor(dir.path(), Some("clip.mp4"), Arc::new(FakeTranscoder::new()));

        let err = into_lambda_result(p.handle(&event(&["clip.mov"])).await).unwrap_err();
        let report: InvocationReport = serde_json::from_str(&err.to_string()).unwrap();

        assert_eq!(report.level, TraceLevel::Error);
        assert_eq!(count(&report, "StorageError"), 1);

        let ok = into_lambda_result(p.handle(&StorageEvent::default()).await).unwrap();
        assert_eq!(ok.level, TraceLevel::Info);
    }

    #[test]
    fn test_report_error_line_is_escaped_json() {
        let line = report_error_line("bad \"quote\" and \\ slash");
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["level"], "error");
        assert_eq!(value["report_error"], "bad \"quote\" and \\ slash");
    }

    #[test]
    fn test_batch_error_is_recorded_and_fails_invocation() {
        let trace = TraceContext::new();
        trace.init();
        trace.record(TraceLevel::Info, "Notification records", None);

        record_batch_error(&trace, &WorkerError::trace("snapshot refused"));
        let failed = finish(trace).unwrap_err();

        let report = failed.report();
        assert_eq!(report.level, TraceLevel::Error);
        let last = report.trace.last().unwrap();
        assert_eq!(last.message, "TraceError");
        assert_eq!(last.aux.as_ref().unwrap()["error"], "Trace error: snapshot refused");
    }
}
