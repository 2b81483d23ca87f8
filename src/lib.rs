//! # matter-intake
//!
//! Turn an uploaded legal document into a pre-filled matter record.
//!
//! ## Why this crate?
//!
//! Opening a matter from an attorney's brief means retyping the client's
//! name, contact details, the case number and a description. This crate
//! stores the document, asks a document-understanding model for those fields
//! as JSON, scores how complete the answer is, and merges it into a form
//! without clobbering anything the user already typed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! UploadedDocument
//!  │
//!  ├─ 1. Upload    S3 PUT (SigV4), or a simulated upload when storage is unset
//!  ├─ 2. Extract   Bedrock InvokeModel (PDF, images) or Converse (Word),
//!  │               or any edgequake-llm provider (images)
//!  ├─ 3. Parse     first balanced {…} in the response, lenient field mapping
//!  ├─ 4. Score     weighted completeness, 0–100
//!  └─ 5. Result    ExtractionResult { fileUrl, extractedData, confidence, … }
//!
//!  reconcile(result.extracted_data, form)  ← caller-driven, non-destructive
//! ```
//!
//! Progress is reported through [`ProgressCallback`] at fixed milestones
//! (0, upload band to 50, 50, 75, 100) and never goes backwards.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use matter_intake::{AwsCredentials, DocumentPipeline, InferenceConfig, IntakeConfig,
//!                     StorageConfig, UploadedDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let creds = AwsCredentials::new("AKID…", "secret…");
//!     let config = IntakeConfig::builder()
//!         .storage(StorageConfig::new("firm-documents", creds.clone()).region("af-south-1"))
//!         .inference(InferenceConfig::new(creds))
//!         .build()?;
//!
//!     let pipeline = DocumentPipeline::new(&config)?;
//!     let document = UploadedDocument::from_path("brief.pdf").await?;
//!     let result = pipeline.process_document(&document, None).await?;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Failure policy
//!
//! Storage problems degrade to a simulated upload. Everything after that is
//! strict: a simulated upload, a missing inference backend, a failed model
//! call, or a response without JSON all end the invocation with an error.
//! The pipeline never substitutes invented or pattern-matched data.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `matter-intake` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! matter-intake = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod aws;
pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use aws::AwsCredentials;
pub use config::{InferenceConfig, IntakeConfig, IntakeConfigBuilder, StorageConfig};
pub use document::{
    validate_document, StorageReference, UploadedDocument, MAX_FILE_SIZE_MB,
    SUPPORTED_EXTENSIONS,
};
pub use error::{IntakeError, StageError, ValidationError};
pub use output::{ExtractedEntity, ExtractedFields, ExtractionResult, Urgency};
pub use pipeline::extract::{ExtractionRequest, InferenceService};
pub use pipeline::reconcile::{reconcile, FormField, KeyConvention, MatterForm};
pub use pipeline::score::score;
pub use pipeline::upload::BlobUploader;
pub use process::{process_document, DocumentPipeline};
pub use progress::{NoopProgressCallback, PipelineStage, ProgressCallback, ProgressEvent};

/// Re-exported so callers can cancel without depending on `tokio-util`.
pub use tokio_util::sync::CancellationToken;
