//! Pipeline orchestration: upload → extract → parse → score.
//!
//! [`DocumentPipeline`] resolves its collaborators once, from an
//! [`IntakeConfig`], and can then process any number of documents. Each
//! invocation is a single sequence with no internal parallelism; two
//! concurrent invocations share nothing mutable.
//!
//! Failure policy:
//!
//! * Storage failures are absorbed by the uploader (simulated fallback).
//! * A simulated upload or a missing inference backend is
//!   [`IntakeError::NotConfigured`]. No data is ever invented.
//! * Inference and parse failures become
//!   [`IntakeError::ProcessingFailed`]; the cause is logged at `error`.
//! * Nothing is retried.

use crate::config::IntakeConfig;
use crate::document::{validate_document, UploadedDocument};
use crate::error::{IntakeError, StageError};
use crate::output::ExtractionResult;
use crate::pipeline::extract::{self, ExtractionClient};
use crate::pipeline::upload::FallbackUploader;
use crate::pipeline::{parse, score};
use crate::progress::{PipelineStage, ProgressCallback, ProgressReporter, UploadBand};
use std::future::Future;
use std::path::Path;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound of the upload band in pipeline progress.
const UPLOAD_CEILING: u8 = 50;
/// Emitted when the document is handed to the extraction client.
const EXTRACTION_HANDOFF: u8 = 50;
/// Emitted when the inference service has answered.
const EXTRACTION_RETURNED: u8 = 75;

/// A configured intake pipeline.
///
/// # Example
///
/// ```rust,no_run
/// use matter_intake::{AwsCredentials, DocumentPipeline, InferenceConfig, IntakeConfig,
///                     StorageConfig, UploadedDocument};
///
/// # async fn run() -> Result<(), matter_intake::IntakeError> {
/// let creds = AwsCredentials::new("AKID…", "secret…");
/// let config = IntakeConfig::builder()
///     .storage(StorageConfig::new("firm-documents", creds.clone()))
///     .inference(InferenceConfig::new(creds))
///     .build()?;
///
/// let pipeline = DocumentPipeline::new(&config)?;
/// let document = UploadedDocument::from_path("brief.pdf").await?;
/// let result = pipeline
///     .process_document(&document, Some(&|e: matter_intake::ProgressEvent| {
///         eprintln!("{}%", e.percentage)
///     }))
///     .await?;
/// println!("{} ({}%)", result.extracted_data.client_name.unwrap_or_default(), result.confidence);
/// # Ok(())
/// # }
/// ```
pub struct DocumentPipeline {
    uploader: FallbackUploader,
    /// The extraction client, or a hint explaining why none is available.
    extractor: Result<ExtractionClient, String>,
}

impl DocumentPipeline {
    /// Resolve the upload strategy and inference backend for `config`.
    ///
    /// A missing inference backend does not fail construction; every
    /// invocation then fails with [`IntakeError::NotConfigured`].
    pub fn new(config: &IntakeConfig) -> Result<Self, IntakeError> {
        config.validate()?;

        let uploader = FallbackUploader::from_config(config);
        let extractor = extract::resolve_service(config)
            .map(|service| ExtractionClient::new(service, config));
        match extractor {
            Ok(ref client) => info!(
                "Pipeline ready: upload via {}, extraction via {}",
                uploader.strategy(),
                client.backend()
            ),
            Err(ref hint) => warn!(
                "Pipeline ready without inference backend (upload via {}): {}",
                uploader.strategy(),
                hint
            ),
        }

        Ok(Self {
            uploader,
            extractor,
        })
    }

    /// Name of the upload strategy tried first ("s3", "simulated", …).
    pub fn upload_strategy(&self) -> &str {
        self.uploader.strategy()
    }

    /// Name of the inference backend, if one resolved.
    pub fn inference_backend(&self) -> Option<&str> {
        self.extractor.as_ref().ok().map(|c| c.backend())
    }

    /// Run one document through the pipeline.
    ///
    /// # Errors
    /// - [`IntakeError::NotConfigured`]: no inference backend, or the upload
    ///   was simulated
    /// - [`IntakeError::ProcessingFailed`]: inference or parsing failed
    pub async fn process_document(
        &self,
        document: &UploadedDocument,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<ExtractionResult, IntakeError> {
        self.process_document_cancellable(document, progress, &CancellationToken::new())
            .await
    }

    /// [`process_document`](Self::process_document) that stops at the next
    /// suspension point once `cancel` fires, returning
    /// [`IntakeError::Cancelled`].
    pub async fn process_document_cancellable(
        &self,
        document: &UploadedDocument,
        progress: Option<&dyn ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ExtractionResult, IntakeError> {
        let start = Instant::now();
        let reporter = ProgressReporter::new(progress);
        info!(
            "Processing '{}' ({} bytes, {})",
            document.original_name(),
            document.size_bytes(),
            document.mime_type()
        );

        // ── Step 1: Upload ───────────────────────────────────────────────────
        reporter.on_stage(PipelineStage::Uploading);
        reporter.milestone(0);

        // No backend means nothing will read the object, so do not store it.
        let client = match self.extractor {
            Ok(ref client) => client,
            Err(ref hint) => {
                return Err(fail(
                    &reporter,
                    PipelineStage::Uploading,
                    StageError::Configuration { hint: hint.clone() },
                ))
            }
        };
        let band = UploadBand {
            reporter: &reporter,
            ceiling: UPLOAD_CEILING,
        };
        let reference = until_cancelled(cancel, &reporter, self.uploader.upload(document, &band)).await?;
        debug!("Stored as {}", reference);

        // ── Step 2: Extract ──────────────────────────────────────────────────
        reporter.on_stage(PipelineStage::Extracting);
        reporter.milestone(EXTRACTION_HANDOFF);

        if reference.is_simulated() {
            return Err(fail(
                &reporter,
                PipelineStage::Extracting,
                StageError::Configuration {
                    hint: "Document storage is not configured or could not be reached, so the \
                           upload was only simulated. Configure the storage bucket and \
                           credentials to enable extraction."
                        .to_string(),
                },
            ));
        }

        let raw = until_cancelled(cancel, &reporter, client.extract(document))
            .await?
            .map_err(|e| fail(&reporter, PipelineStage::Extracting, e))?;
        reporter.milestone(EXTRACTION_RETURNED);

        // ── Step 3: Parse ────────────────────────────────────────────────────
        if cancel.is_cancelled() {
            return Err(cancelled(&reporter));
        }
        reporter.on_stage(PipelineStage::Parsing);
        let parsed =
            parse::parse_response(&raw).map_err(|e| fail(&reporter, PipelineStage::Parsing, e))?;

        // ── Step 4: Score ────────────────────────────────────────────────────
        reporter.on_stage(PipelineStage::Scoring);
        let confidence = score::score(&parsed.fields);

        let processing_time = start.elapsed().as_millis() as u64;
        reporter.milestone(100);
        reporter.on_stage(PipelineStage::Complete);
        info!(
            "Processed '{}' in {}ms (confidence {}%)",
            document.original_name(),
            processing_time,
            confidence
        );

        Ok(ExtractionResult {
            file_url: reference,
            extracted_text: parsed.extracted_text,
            extracted_data: parsed.fields,
            confidence,
            processing_time,
        })
    }

    /// Load, validate, and process a local file.
    pub async fn process_file(
        &self,
        path: impl AsRef<Path>,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<ExtractionResult, IntakeError> {
        let document = UploadedDocument::from_path(path).await?;
        validate_document(&document)?;
        self.process_document(&document, progress).await
    }
}

/// Build a pipeline for `config` and process one document.
///
/// Convenience for one-off calls; reuse a [`DocumentPipeline`] when
/// processing several documents.
pub async fn process_document(
    document: &UploadedDocument,
    config: &IntakeConfig,
    progress: Option<&dyn ProgressCallback>,
) -> Result<ExtractionResult, IntakeError> {
    DocumentPipeline::new(config)?
        .process_document(document, progress)
        .await
}

// ── Internal helpers ─────────────────────────────────────────────────────────

async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    reporter: &ProgressReporter<'_>,
    fut: F,
) -> Result<F::Output, IntakeError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled(reporter)),
        out = fut => Ok(out),
    }
}

fn cancelled(reporter: &ProgressReporter<'_>) -> IntakeError {
    info!("Document processing cancelled");
    reporter.on_stage(PipelineStage::Failed);
    IntakeError::Cancelled
}

fn fail(reporter: &ProgressReporter<'_>, stage: PipelineStage, cause: StageError) -> IntakeError {
    error!("Document processing failed while {}: {}", stage, cause);
    reporter.on_stage(PipelineStage::Failed);
    match cause {
        StageError::Configuration { hint } => IntakeError::NotConfigured { hint },
        _ => IntakeError::ProcessingFailed { stage },
    }
}
