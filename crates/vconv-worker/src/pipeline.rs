//! Per-unit conversion pipeline.
//!
//! A unit moves strictly forward through
//! `Pending → Downloaded → Converted → Uploaded → CleanedUp`, or ends in
//! `Failed` when a stage errors. Local files are removed on both paths.
//! Every stage is bracketed by trace entries carrying the unit.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use vconv_media::{FfmpegCommand, Transcoder};
use vconv_models::TraceLevel;
use vconv_storage::ObjectStore;

use crate::config::ConversionProfile;
use crate::error::{ErrorDetails, WorkerError, WorkerResult};
use crate::metrics;
use crate::trace::TraceContext;
use crate::unit::ConversionUnit;

/// Where a unit's pipeline stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStage {
    Pending,
    Downloaded,
    Converted,
    Uploaded,
    CleanedUp,
    Failed,
}

impl UnitStage {
    /// Name of the stage that runs after this one.
    pub fn next_step(&self) -> &'static str {
        match self {
            UnitStage::Pending => "download",
            UnitStage::Downloaded => "convert",
            UnitStage::Converted => "upload",
            UnitStage::Uploaded | UnitStage::CleanedUp | UnitStage::Failed => "cleanup",
        }
    }
}

/// Why a unit failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: &'static str,
    pub error: String,
}

/// Settled result of one unit's pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub unit: ConversionUnit,
    pub stage: UnitStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        self.stage == UnitStage::CleanedUp
    }
}

#[derive(Serialize)]
struct DownloadStart<'u> {
    object: &'u ConversionUnit,
    path: &'u Path,
}

#[derive(Serialize)]
struct FailureAux<'u> {
    stage: &'static str,
    object: &'u ConversionUnit,
    #[serde(flatten)]
    details: ErrorDetails,
}

/// Stages shared by every unit of a batch.
pub struct Pipeline<'a> {
    store: &'a dyn ObjectStore,
    transcoder: &'a dyn Transcoder,
    profile: &'a ConversionProfile,
    trace: &'a TraceContext,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        transcoder: &'a dyn Transcoder,
        profile: &'a ConversionProfile,
        trace: &'a TraceContext,
    ) -> Self {
        Self {
            store,
            transcoder,
            profile,
            trace,
        }
    }

    /// Fetch the source object into the unit's local source path.
    pub async fn download<'u>(&self, unit: &'u ConversionUnit) -> WorkerResult<&'u ConversionUnit> {
        self.store
            .download_to(&unit.bucket, &unit.source_key, &unit.local_source_path)
            .await?;
        Ok(unit)
    }

    /// Remux the local source into the local target.
    pub async fn convert<'u>(&self, unit: &'u ConversionUnit) -> WorkerResult<&'u ConversionUnit> {
        let cmd = FfmpegCommand::remux(&unit.local_source_path, &unit.local_target_path);
        self.transcoder.run(&cmd).await?;
        Ok(unit)
    }

    /// Publish the local target under the target key.
    pub async fn upload<'u>(&self, unit: &'u ConversionUnit) -> WorkerResult<&'u ConversionUnit> {
        self.store
            .upload_from(
                &unit.bucket,
                &unit.target_key,
                &unit.local_target_path,
                &self.profile.content_type,
            )
            .await?;
        Ok(unit)
    }

    /// Best-effort removal of both local files.
    pub async fn cleanup(&self, unit: &ConversionUnit) {
        if let Err(e) = self.trace.info("Removing object files", unit) {
            warn!("Failed to trace cleanup of {}: {}", unit.source_key, e);
        }

        for (path, e) in unit.cleanup().await {
            warn!("Failed to remove {}: {}", path.display(), e);
            self.trace.record(
                TraceLevel::Warn,
                "Failed to remove local file",
                Some(serde_json::json!({
                    "path": path.display().to_string(),
                    "error": e.to_string(),
                })),
            );
        }
    }

    /// Run every stage for `unit`, isolating its failure.
    pub async fn run(&self, unit: ConversionUnit) -> UnitOutcome {
        debug!("Processing s3://{}/{}", unit.bucket, unit.source_key);

        let mut reached = UnitStage::Pending;
        let failure = match self.run_stages(&unit, &mut reached).await {
            Ok(()) => None,
            Err(e) => Some(self.record_failure(&unit, reached.next_step(), &e)),
        };

        self.cleanup(&unit).await;

        let stage = if failure.is_some() {
            UnitStage::Failed
        } else {
            info!("Converted s3://{}/{} to {}", unit.bucket, unit.source_key, unit.target_key);
            self.trace.record(
                TraceLevel::Info,
                "Object converted",
                serde_json::to_value(&unit).ok(),
            );
            UnitStage::CleanedUp
        };

        metrics::record_unit(failure.is_none());
        UnitOutcome {
            unit,
            stage,
            failure,
        }
    }

    async fn run_stages(&self, unit: &ConversionUnit, reached: &mut UnitStage) -> WorkerResult<()> {
        let start = DownloadStart {
            object: unit,
            path: &unit.local_source_path,
        };
        let unit = self
            .trace
            .record_with(TraceLevel::Info, "Starting download", &start, unit)?;
        let unit = self.download(unit).await?;
        *reached = UnitStage::Downloaded;

        let unit = self.trace.info("Converting object", unit)?;
        let unit = self.convert(unit).await?;
        *reached = UnitStage::Converted;

        let unit = self.trace.info("Uploading converted object", unit)?;
        self.upload(unit).await?;
        *reached = UnitStage::Uploaded;

        Ok(())
    }

    fn record_failure(
        &self,
        unit: &ConversionUnit,
        stage: &'static str,
        err: &WorkerError,
    ) -> StageFailure {
        error!(
            bucket = %unit.bucket,
            key = %unit.source_key,
            stage,
            "Conversion failed: {}", err
        );
        metrics::record_stage_failure(stage);

        let details = err.details();
        let aux = FailureAux {
            stage,
            object: unit,
            details: details.clone(),
        };
        // The error entry is recorded even if the snapshot cannot be taken
        self.trace
            .record(TraceLevel::Error, err.name(), serde_json::to_value(&aux).ok());

        StageFailure {
            stage,
            error: details.error,
        }
    }
}
