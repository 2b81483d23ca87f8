//! The document handed to the pipeline, and the locator it gets back.
//!
//! Type and size validation belongs to the uploader collaborator (the UI, or
//! the CLI in this crate), not to the pipeline. The policy lives here as
//! advisory constants plus [`validate_document`] so every collaborator
//! enforces the same rules.

use crate::error::{IntakeError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions the uploader collaborator should accept.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx"];

/// Maximum accepted document size, in megabytes.
pub const MAX_FILE_SIZE_MB: u64 = 10;

/// Marker embedded in URIs produced by the simulated uploader.
pub const SIMULATED_URI_SENTINEL: &str = "mock-bucket";

/// A user-supplied document. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    bytes: Vec<u8>,
    mime_type: String,
    original_name: String,
}

impl UploadedDocument {
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        mime_type: impl Into<String>,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            original_name: original_name.into(),
        }
    }

    /// Read a local file, inferring the MIME type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, IntakeError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| read_error(path, e))?;
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let mime_type = mime_type_for(&original_name).to_string();
        debug!(
            "Loaded '{}' ({} bytes, {})",
            original_name,
            bytes.len(),
            mime_type
        );
        Ok(Self {
            bytes,
            mime_type,
            original_name,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lower-cased extension including the dot, e.g. `".pdf"`.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.original_name)
    }
}

impl fmt::Debug for UploadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedDocument")
            .field("original_name", &self.original_name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// Durable locator returned by the uploader. Serialises as a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageReference {
    uri: String,
}

impl StorageReference {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// True when the upload was simulated rather than written to storage.
    pub fn is_simulated(&self) -> bool {
        self.uri.contains(SIMULATED_URI_SENTINEL)
    }
}

impl fmt::Display for StorageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Apply the advisory type/size policy.
pub fn validate_document(document: &UploadedDocument) -> Result<(), ValidationError> {
    let name = document.original_name().to_string();

    let extension = document.extension().unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ValidationError::UnsupportedType {
            name,
            extension,
            supported: SUPPORTED_EXTENSIONS.join(", "),
        });
    }

    if document.bytes().is_empty() {
        return Err(ValidationError::Empty { name });
    }

    if document.size_bytes() > MAX_FILE_SIZE_MB * 1024 * 1024 {
        return Err(ValidationError::TooLarge {
            name,
            size_bytes: document.size_bytes(),
            max_mb: MAX_FILE_SIZE_MB,
        });
    }

    if extension == ".pdf" && !document.bytes().starts_with(b"%PDF") {
        return Err(ValidationError::NotAPdf {
            name,
            magic: document.bytes().iter().take(4).copied().collect(),
        });
    }

    Ok(())
}

/// MIME type for a file name, by extension.
pub fn mime_type_for(name: &str) -> &'static str {
    match extension_of(name).as_deref() {
        Some(".pdf") => "application/pdf",
        Some(".doc") => "application/msword",
        Some(".docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some(".txt") => "text/plain",
        Some(".png") => "image/png",
        Some(".jpg") | Some(".jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

fn read_error(path: &Path, e: std::io::Error) -> IntakeError {
    let path: PathBuf = path.to_path_buf();
    match e.kind() {
        std::io::ErrorKind::NotFound => IntakeError::FileNotFound { path },
        std::io::ErrorKind::PermissionDenied => IntakeError::PermissionDenied { path },
        _ => IntakeError::ReadFailed { path, source: e },
    }
}
