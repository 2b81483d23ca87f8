//! Error types for the matter-intake library.
//!
//! Three error types reflect three audiences:
//!
//! * [`IntakeError`]: **Caller-facing**: returned from the pipeline entry
//!   points. Extraction and parsing failures collapse into a single
//!   [`IntakeError::ProcessingFailed`] with a user-readable message; the
//!   underlying cause is logged, not exposed.
//!
//! * [`StageError`]: **Stage-level**: what an individual stage (uploader,
//!   inference backend, parser) reports. Storage errors never leave the
//!   uploader; the others are converted by [`crate::process`].
//!
//! * [`ValidationError`]: **Pre-flight**: type/size policy enforced by the
//!   uploader collaborator before the pipeline is invoked.

use crate::progress::PipelineStage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the matter-intake library.
#[derive(Debug, Error)]
pub enum IntakeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Reading the file failed for another reason.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document was rejected by the type/size policy.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Extraction cannot run: no inference backend, or the upload was only
    /// simulated.
    #[error("Document extraction is not configured.\n{hint}")]
    NotConfigured { hint: String },

    /// Inference or parsing failed. The cause is logged at `error` level.
    #[error("Failed to process document. Please try again.")]
    ProcessingFailed { stage: PipelineStage },

    /// The caller cancelled the invocation.
    #[error("Document processing was cancelled")]
    Cancelled,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure reported by a single pipeline stage.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StageError {
    /// Object storage rejected or failed the write.
    #[error("storage error: {detail}")]
    Storage { detail: String },

    /// A collaborator needed by this stage is missing.
    #[error("configuration error: {hint}")]
    Configuration { hint: String },

    /// Transport or service failure talking to the inference endpoint.
    #[error("inference error ({backend}): {message}")]
    Inference { backend: String, message: String },

    /// The backend has no request shape for this document type.
    #[error("{backend} cannot read '{media_type}' documents")]
    UnsupportedMedia { backend: String, media_type: String },

    /// The model response did not contain a usable JSON object.
    #[error("parse error: {detail}")]
    Parse { detail: String },
}

/// Type/size policy violations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("'{name}' has unsupported type '{extension}' (supported: {supported})")]
    UnsupportedType {
        name: String,
        extension: String,
        supported: String,
    },

    #[error("'{name}' is {size_bytes} bytes; the limit is {max_mb} MB")]
    TooLarge {
        name: String,
        size_bytes: u64,
        max_mb: u64,
    },

    #[error("'{name}' is empty")]
    Empty { name: String },

    #[error("'{name}' has a .pdf extension but is not a PDF (first bytes: {magic:?})")]
    NotAPdf { name: String, magic: Vec<u8> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_failed_hides_cause() {
        let e = IntakeError::ProcessingFailed {
            stage: PipelineStage::Parsing,
        };
        assert_eq!(e.to_string(), "Failed to process document. Please try again.");
    }

    #[test]
    fn not_configured_carries_hint() {
        let e = IntakeError::NotConfigured {
            hint: "Set an inference backend".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("not configured"), "got: {msg}");
        assert!(msg.contains("Set an inference backend"));
    }

    #[test]
    fn validation_error_is_transparent() {
        let e: IntakeError = ValidationError::TooLarge {
            name: "brief.pdf".into(),
            size_bytes: 12_000_000,
            max_mb: 10,
        }
        .into();
        assert!(e.to_string().contains("10 MB"));
    }

    #[test]
    fn inference_error_names_backend() {
        let e = StageError::Inference {
            backend: "bedrock".into(),
            message: "HTTP 403".into(),
        };
        assert!(e.to_string().contains("bedrock"));
        assert!(e.to_string().contains("HTTP 403"));
    }
}
