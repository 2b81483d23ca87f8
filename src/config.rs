//! Configuration types for the document intake pipeline.
//!
//! All pipeline behaviour is controlled through [`IntakeConfig`], built via
//! its [`IntakeConfigBuilder`]. The configuration is an explicit value handed
//! to [`crate::process::DocumentPipeline::new`]; the library itself never
//! reads environment variables, so tests can build any configuration without
//! mutating process state.
//!
//! # Storage and inference are independent
//!
//! * No [`StorageConfig`] (or an incomplete one) selects the simulated
//!   uploader. Processing still runs, but extraction refuses a simulated
//!   upload and fails with [`crate::IntakeError::NotConfigured`].
//! * No inference backend is a hard failure at invocation time, never a
//!   fallback to invented data.

use crate::aws::AwsCredentials;
use crate::error::IntakeError;
use crate::pipeline::extract::InferenceService;
use crate::pipeline::upload::BlobUploader;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default AWS region for both storage and Bedrock.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default Bedrock model identifier.
pub const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-5-sonnet-20241022-v2:0";

/// Durable object storage (S3 or an S3-compatible endpoint).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub credentials: AwsCredentials,
    /// Path-style endpoint override, e.g. `http://localhost:9000`.
    /// When `None`, the virtual-hosted AWS endpoint for `region` is used.
    pub endpoint: Option<String>,
}

impl StorageConfig {
    pub fn new(bucket: impl Into<String>, credentials: AwsCredentials) -> Self {
        Self {
            bucket: bucket.into(),
            region: DEFAULT_REGION.to_string(),
            credentials,
            endpoint: None,
        }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// A bucket and both credential parts are present.
    pub fn is_complete(&self) -> bool {
        !self.bucket.trim().is_empty() && self.credentials.is_complete()
    }
}

/// Bedrock runtime access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceConfig {
    pub region: String,
    pub model_id: String,
    pub credentials: AwsCredentials,
    /// Endpoint override, e.g. a VPC endpoint or a local stub.
    pub endpoint: Option<String>,
}

impl InferenceConfig {
    pub fn new(credentials: AwsCredentials) -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            credentials,
            endpoint: None,
        }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// Configuration for a [`crate::process::DocumentPipeline`].
///
/// Built via [`IntakeConfig::builder()`] or using [`IntakeConfig::default()`].
///
/// # Example
/// ```rust
/// use matter_intake::{AwsCredentials, InferenceConfig, IntakeConfig, StorageConfig};
///
/// let creds = AwsCredentials::new("AKIDEXAMPLE", "secret");
/// let config = IntakeConfig::builder()
///     .storage(StorageConfig::new("firm-documents", creds.clone()).region("af-south-1"))
///     .inference(InferenceConfig::new(creds))
///     .temperature(0.1)
///     .build()
///     .unwrap();
/// assert!(config.storage.is_some());
/// ```
#[derive(Clone)]
pub struct IntakeConfig {
    /// Object storage. `None` selects the simulated uploader.
    pub storage: Option<StorageConfig>,

    /// Bedrock access. Used when no other inference backend is set.
    pub inference: Option<InferenceConfig>,

    /// Pre-constructed inference backend. Takes precedence over everything.
    pub inference_service: Option<Arc<dyn InferenceService>>,

    /// Pre-constructed edgequake-llm provider.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// edgequake-llm provider name (e.g. "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Model for `provider_name`. Ignored by Bedrock, which uses
    /// [`InferenceConfig::model_id`].
    pub model: Option<String>,

    /// Custom uploader replacing the storage strategy selection.
    pub uploader: Option<Arc<dyn BlobUploader>>,

    /// Custom extraction instruction. If None, uses the built-in template.
    pub system_prompt: Option<String>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Low temperature biases the model toward reproducing the requested
    /// JSON shape rather than paraphrasing it.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    pub max_tokens: usize,

    /// Per-request timeout for the inference call, in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Per-request timeout for the storage write, in seconds. Default: 120.
    pub upload_timeout_secs: u64,

    /// Number of synthetic progress events a simulated upload emits. Default: 5.
    pub simulated_upload_steps: u32,

    /// Delay between synthetic progress events, in milliseconds. Default: 200.
    pub simulated_upload_interval_ms: u64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            storage: None,
            inference: None,
            inference_service: None,
            provider: None,
            provider_name: None,
            model: None,
            uploader: None,
            system_prompt: None,
            temperature: 0.1,
            max_tokens: 4096,
            api_timeout_secs: 120,
            upload_timeout_secs: 120,
            simulated_upload_steps: 5,
            simulated_upload_interval_ms: 200,
        }
    }
}

impl fmt::Debug for IntakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeConfig")
            .field("storage", &self.storage)
            .field("inference", &self.inference)
            .field(
                "inference_service",
                &self.inference_service.as_ref().map(|s| s.name().to_string()),
            )
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("uploader", &self.uploader.as_ref().map(|u| u.name().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("simulated_upload_steps", &self.simulated_upload_steps)
            .field("simulated_upload_interval_ms", &self.simulated_upload_interval_ms)
            .finish()
    }
}

impl IntakeConfig {
    /// Create a new builder for `IntakeConfig`.
    pub fn builder() -> IntakeConfigBuilder {
        IntakeConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the constraints the builder enforces. Fields are public, so the
    /// pipeline re-checks on construction.
    pub fn validate(&self) -> Result<(), IntakeError> {
        if self.max_tokens == 0 {
            return Err(IntakeError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(IntakeError::InvalidConfig(format!(
                "temperature must be within 0.0–1.0, got {}",
                self.temperature
            )));
        }
        if self.api_timeout_secs == 0 || self.upload_timeout_secs == 0 {
            return Err(IntakeError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        if let Some(ref inference) = self.inference {
            if inference.model_id.trim().is_empty() {
                return Err(IntakeError::InvalidConfig(
                    "inference model_id must not be empty".into(),
                ));
            }
        }
        Ok(())
    }

    /// Storage settings, only when complete enough to attempt a real write.
    pub fn usable_storage(&self) -> Option<&StorageConfig> {
        self.storage.as_ref().filter(|s| s.is_complete())
    }
}

/// Builder for [`IntakeConfig`].
#[derive(Debug)]
pub struct IntakeConfigBuilder {
    config: IntakeConfig,
}

impl IntakeConfigBuilder {
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = Some(storage);
        self
    }

    pub fn inference(mut self, inference: InferenceConfig) -> Self {
        self.config.inference = Some(inference);
        self
    }

    pub fn inference_service(mut self, service: Arc<dyn InferenceService>) -> Self {
        self.config.inference_service = Some(service);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn uploader(mut self, uploader: Arc<dyn BlobUploader>) -> Self {
        self.config.uploader = Some(uploader);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 1.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs;
        self
    }

    pub fn simulated_upload_steps(mut self, steps: u32) -> Self {
        self.config.simulated_upload_steps = steps.max(1);
        self
    }

    pub fn simulated_upload_interval_ms(mut self, ms: u64) -> Self {
        self.config.simulated_upload_interval_ms = ms;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IntakeConfig, IntakeError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
