//! Blob upload: persist the raw document and return its locator.
//!
//! Two strategies implement [`BlobUploader`]:
//!
//! * [`S3Uploader`]: a SigV4-signed `PUT` to S3 (or any S3-compatible
//!   endpoint), streaming the body in chunks so progress follows the bytes
//!   actually consumed by the HTTP client.
//! * [`SimulatedUploader`]: no I/O; emits evenly spaced synthetic progress
//!   and returns a URI containing [`SIMULATED_URI_SENTINEL`].
//!
//! [`FallbackUploader`] selects between them from configuration and turns
//! any storage failure into a simulated upload. The upload stage therefore
//! never fails; the sentinel tells the pipeline not to trust the result for
//! extraction.

use crate::aws::{self, AwsCredentials, CanonicalRequest, SigningParams};
use crate::config::{IntakeConfig, StorageConfig};
use crate::document::{StorageReference, UploadedDocument, SIMULATED_URI_SENTINEL};
use crate::error::StageError;
use crate::progress::{ProgressCallback, ProgressEvent};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Chunk size for streamed uploads.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Persists a document. Progress events are upload-local (0–100).
#[async_trait]
pub trait BlobUploader: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    async fn upload(
        &self,
        document: &UploadedDocument,
        progress: &dyn ProgressCallback,
    ) -> Result<StorageReference, StageError>;
}

/// `documents/{unix-millis}-{name}`, with path separators and whitespace
/// in the name replaced so the key stays a single segment.
pub fn object_key(original_name: &str, now: DateTime<Utc>) -> String {
    let sanitised: String = original_name
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_whitespace() => '-',
            c => c,
        })
        .collect();
    let sanitised = if sanitised.is_empty() {
        "document".to_string()
    } else {
        sanitised
    };
    format!("documents/{}-{}", now.timestamp_millis(), sanitised)
}

// ── Real upload ─────────────────────────────────────────────────────────────

/// Signed `PUT` to S3.
pub struct S3Uploader {
    client: reqwest::Client,
    config: StorageConfig,
}

impl S3Uploader {
    pub fn new(config: StorageConfig, timeout_secs: u64) -> Result<Self, StageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StageError::Storage {
                detail: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    /// Public locator for `key`.
    pub fn object_uri(&self, key: &str) -> String {
        let encoded = aws::uri_encode(key, true);
        match self.config.endpoint {
            Some(ref endpoint) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.config.bucket,
                encoded
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.config.bucket, self.config.region, encoded
            ),
        }
    }

    fn signed_headers(
        &self,
        url: &reqwest::Url,
        document: &UploadedDocument,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let credentials: &AwsCredentials = &self.config.credentials;
        let mut headers = vec![
            ("host".to_string(), host_header(url)),
            ("content-type".to_string(), document.mime_type().to_string()),
            ("x-amz-content-sha256".to_string(), payload_hash.to_string()),
            ("x-amz-date".to_string(), aws::amz_date(now)),
            (
                "x-amz-meta-original-name".to_string(),
                aws::uri_encode(document.original_name(), false),
            ),
            ("x-amz-meta-upload-timestamp".to_string(), now.to_rfc3339()),
        ];
        if let Some(ref token) = credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        let authorization = aws::authorization_header(
            &SigningParams {
                credentials,
                region: &self.config.region,
                service: "s3",
                timestamp: now,
            },
            &CanonicalRequest {
                method: "PUT",
                canonical_uri: url.path(),
                canonical_query: "",
                headers: &headers,
                payload_hash,
            },
        );
        headers.push(("authorization".to_string(), authorization));
        headers
    }
}

#[async_trait]
impl BlobUploader for S3Uploader {
    fn name(&self) -> &str {
        "s3"
    }

    async fn upload(
        &self,
        document: &UploadedDocument,
        progress: &dyn ProgressCallback,
    ) -> Result<StorageReference, StageError> {
        let now = Utc::now();
        let key = object_key(document.original_name(), now);
        let uri = self.object_uri(&key);
        let url = reqwest::Url::parse(&uri).map_err(|e| StageError::Storage {
            detail: format!("invalid object URL '{uri}': {e}"),
        })?;

        let body = Bytes::copy_from_slice(document.bytes());
        let total = body.len() as u64;
        let payload_hash = aws::sha256_hex(&body);
        let headers = self.signed_headers(&url, document, &payload_hash, now);

        info!("Uploading '{}' ({} bytes) to {}", document.original_name(), total, uri);
        progress.on_progress(ProgressEvent::new(0, total));

        // The body stream reports each chunk as reqwest pulls it; the select
        // loop below forwards those counts to the callback on this task.
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let chunks: Vec<Bytes> = (0..body.len())
            .step_by(UPLOAD_CHUNK_BYTES)
            .map(|start| body.slice(start..(start + UPLOAD_CHUNK_BYTES).min(body.len())))
            .collect();
        let body_stream = stream::iter(chunks.into_iter().map(move |chunk| {
            let _ = tx.send(chunk.len() as u64);
            Ok::<Bytes, std::io::Error>(chunk)
        }));

        let mut request = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(body_stream));
        for (name, value) in headers.iter().filter(|(n, _)| n != "host") {
            request = request.header(name.as_str(), value.as_str());
        }

        let send = request.send();
        tokio::pin!(send);
        let mut loaded = 0u64;
        let response = loop {
            tokio::select! {
                Some(n) = rx.recv() => {
                    loaded += n;
                    progress.on_progress(ProgressEvent::new(loaded, total));
                }
                result = &mut send => break result,
            }
        };

        let response = response.map_err(|e| StageError::Storage {
            detail: format!("PUT {uri} failed: {e}"),
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::Storage {
                detail: format!("PUT {uri} returned HTTP {status}: {}", truncate(&body, 300)),
            });
        }

        progress.on_progress(ProgressEvent::new(total, total));
        debug!("Stored object {}", key);
        Ok(StorageReference::new(uri))
    }
}

fn host_header(url: &reqwest::Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

// ── Simulated upload ────────────────────────────────────────────────────────

/// Stand-in used when storage is unconfigured or unreachable.
#[derive(Debug, Clone)]
pub struct SimulatedUploader {
    steps: u32,
    interval: Duration,
}

impl SimulatedUploader {
    pub fn new(steps: u32, interval: Duration) -> Self {
        Self {
            steps: steps.max(1),
            interval,
        }
    }

    pub fn uri_for(key: &str) -> String {
        format!(
            "https://{SIMULATED_URI_SENTINEL}.s3.amazonaws.com/{}",
            aws::uri_encode(key, true)
        )
    }
}

impl Default for SimulatedUploader {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(200))
    }
}

#[async_trait]
impl BlobUploader for SimulatedUploader {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn upload(
        &self,
        document: &UploadedDocument,
        progress: &dyn ProgressCallback,
    ) -> Result<StorageReference, StageError> {
        let total = document.size_bytes();
        for step in 1..=self.steps as u64 {
            tokio::time::sleep(self.interval).await;
            let loaded = total * step / self.steps as u64;
            progress.on_progress(ProgressEvent {
                loaded,
                total,
                percentage: (step * 100 / self.steps as u64) as u8,
            });
        }
        let key = object_key(document.original_name(), Utc::now());
        Ok(StorageReference::new(Self::uri_for(&key)))
    }
}

// ── Strategy selection ──────────────────────────────────────────────────────

/// Uploader that always yields a reference.
///
/// Uses the primary strategy when one is configured, and the simulated one
/// when it is not or when the primary fails.
pub struct FallbackUploader {
    primary: Option<Arc<dyn BlobUploader>>,
    simulated: SimulatedUploader,
}

impl FallbackUploader {
    pub fn new(primary: Option<Arc<dyn BlobUploader>>, simulated: SimulatedUploader) -> Self {
        Self { primary, simulated }
    }

    /// Select the strategy for `config`.
    pub fn from_config(config: &IntakeConfig) -> Self {
        let simulated = SimulatedUploader::new(
            config.simulated_upload_steps,
            Duration::from_millis(config.simulated_upload_interval_ms),
        );

        if let Some(ref uploader) = config.uploader {
            return Self::new(Some(Arc::clone(uploader)), simulated);
        }

        let primary: Option<Arc<dyn BlobUploader>> = match config.usable_storage() {
            Some(storage) => match S3Uploader::new(storage.clone(), config.upload_timeout_secs) {
                Ok(s3) => Some(Arc::new(s3)),
                Err(e) => {
                    warn!("{}; uploads will be simulated", e);
                    None
                }
            },
            None => {
                warn!("Document storage not configured; uploads will be simulated");
                None
            }
        };
        Self::new(primary, simulated)
    }

    /// Name of the strategy tried first.
    pub fn strategy(&self) -> &str {
        self.primary
            .as_ref()
            .map(|p| p.name())
            .unwrap_or_else(|| self.simulated.name())
    }

    /// Upload, downgrading any storage error to a simulated upload.
    pub async fn upload(
        &self,
        document: &UploadedDocument,
        progress: &dyn ProgressCallback,
    ) -> StorageReference {
        if let Some(ref primary) = self.primary {
            match primary.upload(document, progress).await {
                Ok(reference) if !reference.uri().is_empty() => return reference,
                Ok(_) => warn!("{} uploader returned an empty URI; simulating", primary.name()),
                Err(e) => warn!("{} upload failed ({}); simulating", primary.name(), e),
            }
        }
        match self.simulated.upload(document, progress).await {
            Ok(reference) => reference,
            // The simulated uploader performs no I/O.
            Err(_) => StorageReference::new(SimulatedUploader::uri_for(&object_key(
                document.original_name(),
                Utc::now(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl ProgressCallback for Recorder {
        fn on_progress(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    struct FailingUploader;

    #[async_trait]
    impl BlobUploader for FailingUploader {
        fn name(&self) -> &str {
            "failing"
        }

        async fn upload(
            &self,
            _document: &UploadedDocument,
            _progress: &dyn ProgressCallback,
        ) -> Result<StorageReference, StageError> {
            Err(StageError::Storage {
                detail: "access denied".into(),
            })
        }
    }

    fn doc() -> UploadedDocument {
        UploadedDocument::new(vec![0u8; 1000], "application/pdf", "Smith brief.pdf")
    }

    fn fast_simulation() -> SimulatedUploader {
        SimulatedUploader::new(5, Duration::from_millis(1))
    }

    #[test]
    fn key_is_timestamped_and_sanitised() {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap();
        assert_eq!(
            object_key("Smith brief.pdf", now),
            format!("documents/{}-Smith-brief.pdf", now.timestamp_millis())
        );
        assert!(object_key("../etc/passwd", now).ends_with("-.._etc_passwd"));
    }

    #[test]
    fn object_uri_uses_bucket_and_region() {
        let config = StorageConfig::new("firm-docs", AwsCredentials::new("AKID", "secret"))
            .region("af-south-1");
        let s3 = S3Uploader::new(config, 30).unwrap();
        assert_eq!(
            s3.object_uri("documents/1-a b.pdf"),
            "https://firm-docs.s3.af-south-1.amazonaws.com/documents/1-a%20b.pdf"
        );
    }

    #[test]
    fn object_uri_with_endpoint_is_path_style() {
        let config = StorageConfig::new("firm-docs", AwsCredentials::new("AKID", "secret"))
            .endpoint("http://localhost:9000/");
        let s3 = S3Uploader::new(config, 30).unwrap();
        assert_eq!(
            s3.object_uri("documents/1-a.pdf"),
            "http://localhost:9000/firm-docs/documents/1-a.pdf"
        );
    }

    #[tokio::test]
    async fn simulated_upload_reaches_100_with_sentinel() {
        let recorder = Recorder(Mutex::new(Vec::new()));
        let reference = fast_simulation().upload(&doc(), &recorder).await.unwrap();

        assert!(reference.is_simulated());
        assert!(reference.uri().contains("Smith-brief.pdf"));
        let events = recorder.0.lock().unwrap();
        let percentages: Vec<u8> = events.iter().map(|e| e.percentage).collect();
        assert_eq!(percentages, vec![20, 40, 60, 80, 100]);
        assert_eq!(events.last().map(|e| e.loaded), Some(1000));
    }

    #[tokio::test]
    async fn unconfigured_storage_selects_simulation() {
        let config = IntakeConfig::builder()
            .simulated_upload_interval_ms(1)
            .build()
            .unwrap();
        let uploader = FallbackUploader::from_config(&config);
        assert_eq!(uploader.strategy(), "simulated");

        let recorder = Recorder(Mutex::new(Vec::new()));
        let reference = uploader.upload(&doc(), &recorder).await;
        assert!(reference.is_simulated());
        assert_eq!(
            recorder.0.lock().unwrap().last().map(|e| e.percentage),
            Some(100)
        );
    }

    #[tokio::test]
    async fn storage_failure_falls_back_to_simulation() {
        let uploader = FallbackUploader::new(Some(Arc::new(FailingUploader)), fast_simulation());
        assert_eq!(uploader.strategy(), "failing");

        let recorder = Recorder(Mutex::new(Vec::new()));
        let reference = uploader.upload(&doc(), &recorder).await;
        assert!(reference.is_simulated());
        assert!(!recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn complete_storage_selects_s3() {
        let config = IntakeConfig::builder()
            .storage(StorageConfig::new("firm-docs", AwsCredentials::new("AKID", "secret")))
            .build()
            .unwrap();
        assert_eq!(FallbackUploader::from_config(&config).strategy(), "s3");
    }
}
