//! Extraction: send the document and the instruction to an inference
//! service and return the model's raw text.
//!
//! The instruction lives in [`crate::prompts`] and JSON recovery in
//! [`crate::pipeline::parse`]. The only decoding done here is unwrapping the
//! service's response envelope.
//!
//! Two backends implement [`InferenceService`]:
//!
//! * [`BedrockInference`]: AWS Bedrock, signed with SigV4. PDFs and images
//!   go to `InvokeModel` with an Anthropic messages body, Word files to
//!   `Converse`.
//! * [`ProviderInference`]: any [`edgequake_llm::LLMProvider`] (OpenAI,
//!   Anthropic, Gemini, Ollama …), images only.
//!
//! There is no retry here. A transport or service failure is returned as
//! [`StageError::Inference`] and ends the invocation.

use crate::aws::{self, CanonicalRequest, SigningParams};
use crate::config::{InferenceConfig, IntakeConfig};
use crate::document::UploadedDocument;
use crate::error::StageError;
use crate::prompts::DEFAULT_EXTRACTION_PROMPT;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Anthropic messages API version accepted by Bedrock.
pub const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// One extraction call. Built fresh per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub document_base64: String,
    pub media_type: String,
    pub file_name: String,
    pub instruction: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl ExtractionRequest {
    pub fn new(
        document: &UploadedDocument,
        instruction: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Self {
        Self {
            document_base64: STANDARD.encode(document.bytes()),
            media_type: document.mime_type().to_string(),
            file_name: document.original_name().to_string(),
            instruction: instruction.to_string(),
            temperature,
            max_tokens,
        }
    }

    fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// A document-understanding backend.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Return the model's raw text for `request`.
    async fn invoke(&self, request: &ExtractionRequest) -> Result<String, StageError>;
}

/// Builds requests and drives one [`InferenceService`].
#[derive(Clone)]
pub struct ExtractionClient {
    service: Arc<dyn InferenceService>,
    instruction: String,
    temperature: f32,
    max_tokens: usize,
}

impl ExtractionClient {
    pub fn new(service: Arc<dyn InferenceService>, config: &IntakeConfig) -> Self {
        Self {
            service,
            instruction: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTRACTION_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn backend(&self) -> &str {
        self.service.name()
    }

    pub fn build_request(&self, document: &UploadedDocument) -> ExtractionRequest {
        ExtractionRequest::new(document, &self.instruction, self.temperature, self.max_tokens)
    }

    /// Send `document` and return the raw response text.
    pub async fn extract(&self, document: &UploadedDocument) -> Result<String, StageError> {
        let request = self.build_request(document);
        let start = Instant::now();
        debug!(
            "Sending '{}' to {} ({} base64 bytes)",
            request.file_name,
            self.service.name(),
            request.document_base64.len()
        );
        let text = self.service.invoke(&request).await?;
        info!(
            "{} responded with {} chars in {:?}",
            self.service.name(),
            text.len(),
            start.elapsed()
        );
        Ok(text)
    }
}

/// Resolve the inference backend, from most-specific to least-specific.
///
/// 1. **Pre-built service** (`config.inference_service`).
/// 2. **edgequake-llm provider** (`config.provider`).
/// 3. **Named provider + model** (`config.provider_name`) through
///    [`ProviderFactory::create_llm_provider`].
/// 4. **Bedrock** (`config.inference`).
///
/// `Err` carries a hint telling the user what to configure.
pub fn resolve_service(config: &IntakeConfig) -> Result<Arc<dyn InferenceService>, String> {
    if let Some(ref service) = config.inference_service {
        return Ok(Arc::clone(service));
    }

    if let Some(ref provider) = config.provider {
        return Ok(Arc::new(ProviderInference::new(Arc::clone(provider), "provider")));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return ProviderFactory::create_llm_provider(name, model)
            .map(|p| Arc::new(ProviderInference::new(p, name)) as Arc<dyn InferenceService>)
            .map_err(|e| format!("LLM provider '{name}' could not be created: {e}"));
    }

    if let Some(ref inference) = config.inference {
        if !inference.credentials.is_complete() {
            return Err(
                "Bedrock credentials are incomplete. Set an access key ID and secret access key."
                    .to_string(),
            );
        }
        return BedrockInference::new(inference.clone(), config.api_timeout_secs)
            .map(|b| Arc::new(b) as Arc<dyn InferenceService>)
            .map_err(|e| e.to_string());
    }

    Err("No inference backend is configured. Provide Bedrock credentials \
         (region, model ID, access keys) or an LLM provider to enable extraction."
        .to_string())
}

// ── Bedrock ─────────────────────────────────────────────────────────────────

/// How a document reaches Bedrock.
///
/// The Anthropic messages body only carries images and PDFs. Word files go
/// through the Converse API, whose `document` block names a format instead
/// of a MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedrockRoute {
    /// `InvokeModel` with an Anthropic messages body.
    Invoke,
    /// `Converse` with a document block of the given format.
    Converse(&'static str),
}

impl BedrockRoute {
    pub fn for_media_type(media_type: &str) -> Result<Self, StageError> {
        match media_type {
            "application/pdf" => Ok(Self::Invoke),
            "image/png" | "image/jpeg" | "image/gif" | "image/webp" => Ok(Self::Invoke),
            "application/msword" => Ok(Self::Converse("doc")),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Ok(Self::Converse("docx"))
            }
            other => Err(StageError::UnsupportedMedia {
                backend: "bedrock".into(),
                media_type: other.to_string(),
            }),
        }
    }
}

/// AWS Bedrock runtime: `InvokeModel` for PDFs and images, `Converse` for
/// Word documents.
pub struct BedrockInference {
    client: reqwest::Client,
    config: InferenceConfig,
}

#[derive(Debug, Deserialize)]
struct BedrockEnvelope {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConverseEnvelope {
    output: ConverseOutput,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: ConverseMessage,
}

#[derive(Debug, Deserialize)]
struct ConverseMessage {
    #[serde(default)]
    content: Vec<ConverseBlock>,
}

#[derive(Debug, Deserialize)]
struct ConverseBlock {
    #[serde(default)]
    text: Option<String>,
}

impl BedrockInference {
    pub fn new(config: InferenceConfig, timeout_secs: u64) -> Result<Self, StageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StageError::Inference {
                backend: "bedrock".into(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    /// `…/model/{model-id}/invoke`, with the model ID encoded once.
    pub fn invoke_url(&self) -> String {
        self.model_url("invoke")
    }

    /// `…/model/{model-id}/converse`.
    pub fn converse_url(&self) -> String {
        self.model_url("converse")
    }

    fn model_url(&self, action: &str) -> String {
        let base = match self.config.endpoint {
            Some(ref endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.config.region),
        };
        format!(
            "{}/model/{}/{}",
            base,
            aws::uri_encode(&self.config.model_id, false),
            action
        )
    }

    /// Anthropic messages body for an image or PDF `request`.
    pub fn request_body(request: &ExtractionRequest) -> serde_json::Value {
        let block_type = if request.is_image() { "image" } else { "document" };
        json!({
            "anthropic_version": BEDROCK_ANTHROPIC_VERSION,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": block_type,
                        "source": {
                            "type": "base64",
                            "media_type": request.media_type,
                            "data": request.document_base64,
                        }
                    },
                    { "type": "text", "text": request.instruction }
                ]
            }]
        })
    }

    /// Converse body carrying `request` as a `format` document block.
    pub fn converse_body(request: &ExtractionRequest, format: &str) -> serde_json::Value {
        json!({
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "document": {
                            "format": format,
                            "name": converse_document_name(&request.file_name),
                            "source": { "bytes": request.document_base64 }
                        }
                    },
                    { "text": request.instruction }
                ]
            }],
            "inferenceConfig": {
                "maxTokens": request.max_tokens,
                "temperature": request.temperature,
            }
        })
    }

    /// Concatenate the text blocks of an `InvokeModel` response.
    pub fn decode_envelope(body: &[u8]) -> Result<String, StageError> {
        let envelope: BedrockEnvelope =
            serde_json::from_slice(body).map_err(|e| StageError::Inference {
                backend: "bedrock".into(),
                message: format!("unreadable response envelope: {e}"),
            })?;
        let text: String = envelope
            .content
            .into_iter()
            .filter(|b| b.kind.as_deref().map_or(true, |k| k == "text"))
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");
        non_empty(text)
    }

    /// Concatenate the text blocks of a `Converse` response.
    pub fn decode_converse(body: &[u8]) -> Result<String, StageError> {
        let envelope: ConverseEnvelope =
            serde_json::from_slice(body).map_err(|e| StageError::Inference {
                backend: "bedrock".into(),
                message: format!("unreadable converse response: {e}"),
            })?;
        let text: String = envelope
            .output
            .message
            .content
            .into_iter()
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");
        non_empty(text)
    }

    fn error(&self, message: String) -> StageError {
        StageError::Inference {
            backend: "bedrock".into(),
            message,
        }
    }

    /// SigV4-signed JSON `POST`; returns the body of a 2xx response.
    async fn post_signed(&self, uri: &str, body: Vec<u8>) -> Result<Vec<u8>, StageError> {
        let url = reqwest::Url::parse(uri).map_err(|e| self.error(format!("invalid URL '{uri}': {e}")))?;

        let now = Utc::now();
        let payload_hash = aws::sha256_hex(&body);
        let host = match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
            None => url.host_str().unwrap_or_default().to_string(),
        };
        let mut headers = vec![
            ("host".to_string(), host),
            ("content-type".to_string(), "application/json".to_string()),
            ("accept".to_string(), "application/json".to_string()),
            ("x-amz-date".to_string(), aws::amz_date(now)),
        ];
        if let Some(ref token) = self.config.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        // Non-S3 services sign the path encoded a second time.
        let canonical_uri = aws::uri_encode(url.path(), true);
        let authorization = aws::authorization_header(
            &SigningParams {
                credentials: &self.config.credentials,
                region: &self.config.region,
                service: "bedrock",
                timestamp: now,
            },
            &CanonicalRequest {
                method: "POST",
                canonical_uri: &canonical_uri,
                canonical_query: "",
                headers: &headers,
                payload_hash: &payload_hash,
            },
        );

        let mut builder = self.client.post(url).body(body);
        for (name, value) in headers.iter().filter(|(n, _)| n != "host") {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = builder.header("authorization", authorization);

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                self.error(format!("request to {uri} timed out"))
            } else {
                self.error(format!("request to {uri} failed: {e}"))
            }
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.error(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            let snippet: String = String::from_utf8_lossy(&bytes).chars().take(300).collect();
            return Err(self.error(format!("HTTP {status}: {snippet}")));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl InferenceService for BedrockInference {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn invoke(&self, request: &ExtractionRequest) -> Result<String, StageError> {
        match BedrockRoute::for_media_type(&request.media_type)? {
            BedrockRoute::Invoke => {
                let body = serde_json::to_vec(&Self::request_body(request))
                    .map_err(|e| self.error(format!("failed to encode request: {e}")))?;
                let bytes = self.post_signed(&self.invoke_url(), body).await?;
                Self::decode_envelope(&bytes)
            }
            BedrockRoute::Converse(format) => {
                debug!("Sending '{}' through Converse as {}", request.file_name, format);
                let body = serde_json::to_vec(&Self::converse_body(request, format))
                    .map_err(|e| self.error(format!("failed to encode request: {e}")))?;
                let bytes = self.post_signed(&self.converse_url(), body).await?;
                Self::decode_converse(&bytes)
            }
        }
    }
}

fn non_empty(text: String) -> Result<String, StageError> {
    if text.trim().is_empty() {
        return Err(StageError::Inference {
            backend: "bedrock".into(),
            message: "no content in response".into(),
        });
    }
    Ok(text)
}

/// Converse document names allow alphanumerics, single spaces, hyphens,
/// parentheses and square brackets.
fn converse_document_name(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _)| stem);
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '(' | ')' | '[' | ']') {
                c
            } else {
                ' '
            }
        })
        .collect();
    let name = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        "document".to_string()
    } else {
        name
    }
}

// ── edgequake-llm providers ─────────────────────────────────────────────────

/// Adapter from [`LLMProvider`] to [`InferenceService`].
///
/// The document travels as an image attachment on a single user message
/// whose text is the instruction. Anything other than an image is refused
/// before the provider is called.
pub struct ProviderInference {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderInference {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl InferenceService for ProviderInference {
    fn name(&self) -> &str {
        &self.label
    }

    async fn invoke(&self, request: &ExtractionRequest) -> Result<String, StageError> {
        // Chat providers only forward attachments as image blocks.
        if !request.is_image() {
            return Err(StageError::Configuration {
                hint: format!(
                    "The '{}' backend reads images only and '{}' is {}. \
                     Configure Bedrock to extract from PDF and Word documents.",
                    self.label, request.file_name, request.media_type
                ),
            });
        }
        let attachment = ImageData::new(request.document_base64.clone(), request.media_type.as_str());
        let messages = vec![ChatMessage::user_with_images(
            request.instruction.as_str(),
            vec![attachment],
        )];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| StageError::Inference {
                backend: self.label.clone(),
                message: e.to_string(),
            })?;
        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::AwsCredentials;
    use std::sync::Mutex;

    struct CannedService {
        reply: Result<String, StageError>,
        seen: Mutex<Vec<ExtractionRequest>>,
    }

    #[async_trait]
    impl InferenceService for CannedService {
        fn name(&self) -> &str {
            "canned"
        }

        async fn invoke(&self, request: &ExtractionRequest) -> Result<String, StageError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    fn doc() -> UploadedDocument {
        UploadedDocument::new(b"%PDF-1.4".to_vec(), "application/pdf", "brief.pdf")
    }

    fn bedrock(endpoint: Option<&str>) -> BedrockInference {
        let mut config = InferenceConfig::new(AwsCredentials::new("AKID", "secret"));
        if let Some(e) = endpoint {
            config = config.endpoint(e);
        }
        BedrockInference::new(config, 30).unwrap()
    }

    #[test]
    fn request_carries_document_prompt_and_temperature() {
        let config = IntakeConfig::default();
        let service = Arc::new(CannedService {
            reply: Ok(String::new()),
            seen: Mutex::new(Vec::new()),
        });
        let client = ExtractionClient::new(service, &config);
        let request = client.build_request(&doc());

        assert_eq!(request.document_base64, STANDARD.encode(b"%PDF-1.4"));
        assert_eq!(request.media_type, "application/pdf");
        assert_eq!(request.instruction, DEFAULT_EXTRACTION_PROMPT);
        assert_eq!(request.temperature, 0.1);
    }

    #[test]
    fn custom_prompt_overrides_default() {
        let config = IntakeConfig::builder()
            .system_prompt("Only the case number, as JSON.")
            .build()
            .unwrap();
        let service = Arc::new(CannedService {
            reply: Ok(String::new()),
            seen: Mutex::new(Vec::new()),
        });
        let request = ExtractionClient::new(service, &config).build_request(&doc());
        assert_eq!(request.instruction, "Only the case number, as JSON.");
    }

    #[tokio::test]
    async fn extract_returns_raw_text_unparsed() {
        let service = Arc::new(CannedService {
            reply: Ok("prose {\"clientName\":\"X\"} prose".into()),
            seen: Mutex::new(Vec::new()),
        });
        let client = ExtractionClient::new(service.clone(), &IntakeConfig::default());
        let text = client.extract(&doc()).await.unwrap();
        assert_eq!(text, "prose {\"clientName\":\"X\"} prose");
        assert_eq!(service.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn extract_propagates_inference_errors_without_retry() {
        let service = Arc::new(CannedService {
            reply: Err(StageError::Inference {
                backend: "canned".into(),
                message: "HTTP 500".into(),
            }),
            seen: Mutex::new(Vec::new()),
        });
        let client = ExtractionClient::new(service.clone(), &IntakeConfig::default());
        assert!(matches!(
            client.extract(&doc()).await,
            Err(StageError::Inference { .. })
        ));
        assert_eq!(service.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn bedrock_url_encodes_model_id() {
        assert_eq!(
            bedrock(None).invoke_url(),
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-3-5-sonnet-20241022-v2%3A0/invoke"
        );
        assert_eq!(
            bedrock(Some("http://127.0.0.1:4566/")).invoke_url(),
            "http://127.0.0.1:4566/model/anthropic.claude-3-5-sonnet-20241022-v2%3A0/invoke"
        );
    }

    #[test]
    fn bedrock_body_shape() {
        let request = ExtractionRequest::new(&doc(), "Extract.", 0.1, 4096);
        let body = BedrockInference::request_body(&request);
        assert_eq!(body["anthropic_version"], BEDROCK_ANTHROPIC_VERSION);
        assert_eq!(body["max_tokens"], 4096);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "document");
        assert_eq!(content[0]["source"]["media_type"], "application/pdf");
        assert_eq!(content[1]["text"], "Extract.");

        let png = UploadedDocument::new(vec![1, 2, 3], "image/png", "scan.png");
        let body = BedrockInference::request_body(&ExtractionRequest::new(&png, "x", 0.1, 10));
        assert_eq!(body["messages"][0]["content"][0]["type"], "image");
    }

    #[test]
    fn envelope_decoding() {
        let text = BedrockInference::decode_envelope(
            br#"{"content":[{"type":"text","text":"part one, "},{"type":"text","text":"part two"}]}"#,
        )
        .unwrap();
        assert_eq!(text, "part one, part two");

        assert!(matches!(
            BedrockInference::decode_envelope(br#"{"content":[]}"#),
            Err(StageError::Inference { .. })
        ));
        assert!(BedrockInference::decode_envelope(b"not json").is_err());
    }

    #[test]
    fn resolution_order() {
        let canned: Arc<dyn InferenceService> = Arc::new(CannedService {
            reply: Ok(String::new()),
            seen: Mutex::new(Vec::new()),
        });
        let config = IntakeConfig::builder()
            .inference(InferenceConfig::new(AwsCredentials::new("AKID", "secret")))
            .inference_service(canned)
            .build()
            .unwrap();
        assert_eq!(resolve_service(&config).map(|s| s.name().to_string()), Ok("canned".into()));

        let config = IntakeConfig::builder()
            .inference(InferenceConfig::new(AwsCredentials::new("AKID", "secret")))
            .build()
            .unwrap();
        assert_eq!(resolve_service(&config).map(|s| s.name().to_string()), Ok("bedrock".into()));
    }

    #[test]
    fn missing_backend_is_an_error_with_hint() {
        let hint = resolve_service(&IntakeConfig::default()).err().unwrap_or_default();
        assert!(hint.contains("No inference backend"), "got: {hint}");

        let config = IntakeConfig::builder()
            .inference(InferenceConfig::new(AwsCredentials::new("", "")))
            .build()
            .unwrap();
        assert!(resolve_service(&config).is_err());
    }

    fn docx() -> UploadedDocument {
        UploadedDocument::new(
            b"PK\x03\x04".to_vec(),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "Smith v. Jones (draft) 2025.docx",
        )
    }

    #[test]
    fn bedrock_routes_by_media_type() {
        assert_eq!(BedrockRoute::for_media_type("application/pdf"), Ok(BedrockRoute::Invoke));
        assert_eq!(BedrockRoute::for_media_type("image/jpeg"), Ok(BedrockRoute::Invoke));
        assert_eq!(
            BedrockRoute::for_media_type("application/msword"),
            Ok(BedrockRoute::Converse("doc"))
        );
        assert_eq!(
            BedrockRoute::for_media_type(docx().mime_type()),
            Ok(BedrockRoute::Converse("docx"))
        );
        assert_eq!(
            BedrockRoute::for_media_type("application/octet-stream"),
            Err(StageError::UnsupportedMedia {
                backend: "bedrock".into(),
                media_type: "application/octet-stream".into(),
            })
        );
    }

    #[test]
    fn word_documents_use_a_converse_document_block() {
        let request = ExtractionRequest::new(&docx(), "Extract.", 0.1, 4096);
        let body = BedrockInference::converse_body(&request, "docx");

        let document = &body["messages"][0]["content"][0]["document"];
        assert_eq!(document["format"], "docx");
        assert_eq!(document["name"], "Smith v Jones (draft) 2025");
        assert_eq!(document["source"]["bytes"], STANDARD.encode(b"PK\x03\x04"));
        assert_eq!(body["messages"][0]["content"][1]["text"], "Extract.");
        assert_eq!(body["inferenceConfig"]["maxTokens"], 4096);
        assert!(body.get("anthropic_version").is_none());
        assert!(!body.to_string().contains("wordprocessingml"));

        assert_eq!(
            bedrock(None).converse_url(),
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-3-5-sonnet-20241022-v2%3A0/converse"
        );
    }

    #[test]
    fn converse_document_names_are_sanitised() {
        assert_eq!(converse_document_name("brief.doc"), "brief");
        assert_eq!(converse_document_name("a__b  c.v2.docx"), "a b c v2");
        assert_eq!(converse_document_name("...docx"), "document");
    }

    #[test]
    fn converse_decoding() {
        let text = BedrockInference::decode_converse(
            br#"{"output":{"message":{"role":"assistant","content":[{"text":"{\"a\":"},{"text":"1}"}]}},"stopReason":"end_turn"}"#,
        )
        .unwrap();
        assert_eq!(text, r#"{"a":1}"#);

        assert!(matches!(
            BedrockInference::decode_converse(br#"{"output":{"message":{"content":[]}}}"#),
            Err(StageError::Inference { .. })
        ));
    }

    #[tokio::test]
    async fn bedrock_refuses_unknown_types_before_sending() {
        // Unroutable endpoint: reaching the network would surface as Inference.
        let service = bedrock(Some("http://127.0.0.1:9"));
        let blob = UploadedDocument::new(vec![0u8; 4], "application/octet-stream", "blob.bin");
        let request = ExtractionRequest::new(&blob, "x", 0.1, 10);
        assert!(matches!(
            service.invoke(&request).await,
            Err(StageError::UnsupportedMedia { .. })
        ));
    }

    #[tokio::test]
    async fn provider_backends_refuse_pdfs_without_calling_the_model() {
        let mock = Arc::new(edgequake_llm::MockProvider::new());
        mock.add_response("should stay queued").await;
        let service = ProviderInference::new(mock.clone(), "mock");

        let err = service
            .invoke(&ExtractionRequest::new(&doc(), "Extract.", 0.1, 10))
            .await
            .unwrap_err();
        match err {
            StageError::Configuration { hint } => {
                assert!(hint.contains("images only"), "got: {hint}");
                assert!(hint.contains("application/pdf"), "got: {hint}");
            }
            other => panic!("expected a configuration error, got {other:?}"),
        }

        let scan = UploadedDocument::new(vec![1, 2, 3], "image/png", "scan.png");
        let text = service
            .invoke(&ExtractionRequest::new(&scan, "Extract.", 0.1, 10))
            .await
            .unwrap();
        assert_eq!(text, "should stay queued");
    }
}
