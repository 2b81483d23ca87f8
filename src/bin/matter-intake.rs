//! CLI binary for matter-intake.
//!
//! A thin shim over the library crate: it plays the uploader collaborator
//! (type/size validation), maps flags to `IntakeConfig`, and prints the
//! result or the reconciled form.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use matter_intake::pipeline::heuristics;
use matter_intake::{
    reconcile, validate_document, AwsCredentials, CancellationToken, DocumentPipeline,
    ExtractedFields, ExtractionResult, InferenceConfig, IntakeConfig, MatterForm, PipelineStage,
    ProgressCallback, ProgressEvent, StorageConfig, UploadedDocument,
};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders pipeline percentages on a 0–100 bar and stage names as its prefix.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold:>10}  [{bar:42.green/238}] {pos:>3}%  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressCallback for CliProgress {
    fn on_progress(&self, event: ProgressEvent) {
        self.bar.set_position(event.percentage as u64);
    }

    fn on_stage(&self, stage: PipelineStage) {
        match stage {
            PipelineStage::Complete | PipelineStage::Failed => self.bar.finish_and_clear(),
            other => self.bar.set_prefix(capitalise(&other.to_string())),
        }
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract fields from a brief (S3 + Bedrock from the environment)
  matter-intake brief.pdf

  # JSON output
  matter-intake --json brief.pdf > result.json

  # Merge into an existing form and print both key spellings
  matter-intake --form matter.json brief.pdf

  # Use an edgequake-llm provider instead of Bedrock
  matter-intake --provider openai --model gpt-4.1 brief.pdf

  # Pattern scan of a plain-text file, no storage or model involved
  matter-intake --heuristic-only brief.txt

ENVIRONMENT VARIABLES:
  MATTER_INTAKE_BUCKET            S3 bucket for uploaded documents
  MATTER_INTAKE_STORAGE_REGION    S3 region (default us-east-1)
  MATTER_INTAKE_STORAGE_ENDPOINT  S3-compatible endpoint (path-style)
  AWS_ACCESS_KEY_ID               AWS access key (storage and Bedrock)
  AWS_SECRET_ACCESS_KEY           AWS secret key
  AWS_SESSION_TOKEN               Temporary-credential session token
  MATTER_INTAKE_BEDROCK_REGION    Bedrock region (default us-east-1)
  MATTER_INTAKE_MODEL_ID          Bedrock model ID
  MATTER_INTAKE_BEDROCK_ENDPOINT  Bedrock endpoint override
  EDGEQUAKE_PROVIDER              edgequake-llm provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL                 Model for EDGEQUAKE_PROVIDER
  RUST_LOG                        Log filter override

Without a bucket, uploads are simulated and extraction is refused.
"#;

/// Extract matter details from legal documents.
#[derive(Parser, Debug)]
#[command(
    name = "matter-intake",
    version,
    about = "Extract matter details from legal documents",
    long_about = "Upload a legal document, extract client and case details with a \
document-understanding model (AWS Bedrock or any edgequake-llm provider), score the \
extraction's completeness, and optionally merge it into an existing matter form.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document to process (.pdf, .doc, .docx; text file with --heuristic-only).
    input: PathBuf,

    /// Existing form state (JSON object, either key spelling) to merge into.
    #[arg(long)]
    form: Option<PathBuf>,

    /// Output the ExtractionResult as JSON.
    #[arg(long, env = "MATTER_INTAKE_JSON")]
    json: bool,

    /// Run the regex scan over a plain-text file instead of the pipeline.
    #[arg(long)]
    heuristic_only: bool,

    /// S3 bucket for uploaded documents.
    #[arg(long, env = "MATTER_INTAKE_BUCKET")]
    bucket: Option<String>,

    /// S3 region.
    #[arg(long, env = "MATTER_INTAKE_STORAGE_REGION", default_value = "us-east-1")]
    storage_region: String,

    /// S3-compatible endpoint, addressed path-style.
    #[arg(long, env = "MATTER_INTAKE_STORAGE_ENDPOINT")]
    storage_endpoint: Option<String>,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    access_key_id: Option<String>,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_access_key: Option<String>,

    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    session_token: Option<String>,

    /// Bedrock region.
    #[arg(long, env = "MATTER_INTAKE_BEDROCK_REGION", default_value = "us-east-1")]
    bedrock_region: String,

    /// Bedrock model ID.
    #[arg(long, env = "MATTER_INTAKE_MODEL_ID")]
    model_id: Option<String>,

    /// Bedrock endpoint override.
    #[arg(long, env = "MATTER_INTAKE_BEDROCK_ENDPOINT")]
    bedrock_endpoint: Option<String>,

    /// edgequake-llm provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Model for --provider.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Path to a text file containing a custom extraction instruction.
    #[arg(long, env = "MATTER_INTAKE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Model temperature (0.0–1.0).
    #[arg(long, env = "MATTER_INTAKE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max model output tokens.
    #[arg(long, env = "MATTER_INTAKE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Inference request timeout in seconds.
    #[arg(long, env = "MATTER_INTAKE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Storage upload timeout in seconds.
    #[arg(long, env = "MATTER_INTAKE_UPLOAD_TIMEOUT", default_value_t = 120)]
    upload_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "MATTER_INTAKE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MATTER_INTAKE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MATTER_INTAKE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs; verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.heuristic_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let form = match cli.form {
        Some(ref path) => Some(read_form(path).await?),
        None => None,
    };

    // ── Heuristic-only mode ──────────────────────────────────────────────
    if cli.heuristic_only {
        let text = tokio::fs::read_to_string(&cli.input)
            .await
            .with_context(|| format!("Failed to read {:?} as text", cli.input))?;
        let fields = heuristics::scan_text(&text);
        let confidence = matter_intake::score(&fields);
        if !cli.quiet {
            eprintln!(
                "{}",
                yellow("Pattern scan only: results are unverified guesses, not model output.")
            );
        }
        return emit(&cli, &fields, confidence, None, form.as_ref());
    }

    // ── Load and validate ────────────────────────────────────────────────
    let document = UploadedDocument::from_path(&cli.input)
        .await
        .context("Failed to load document")?;
    validate_document(&document).context("Document rejected")?;

    // ── Build pipeline ───────────────────────────────────────────────────
    let config = build_config(&cli).await?;
    let pipeline = DocumentPipeline::new(&config).context("Invalid configuration")?;

    // Ctrl-C cancels the in-flight invocation.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    // ── Run pipeline ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgress::new);
    let result = pipeline
        .process_document_cancellable(
            &document,
            progress.as_ref().map(|p| p as &dyn ProgressCallback),
            &cancel,
        )
        .await;
    if let Some(ref p) = progress {
        p.bar.finish_and_clear();
    }
    let result = result.context("Extraction failed")?;

    emit(
        &cli,
        &result.extracted_data,
        result.confidence,
        Some(&result),
        form.as_ref(),
    )
}

/// Print the extraction (or reconciled form) to stdout.
fn emit(
    cli: &Cli,
    fields: &ExtractedFields,
    confidence: u8,
    result: Option<&ExtractionResult>,
    form: Option<&MatterForm>,
) -> Result<()> {
    if let Some(form) = form {
        let merged = reconcile(fields, form);
        let record = Value::Object(merged.to_dual_record());
        println!(
            "{}",
            serde_json::to_string_pretty(&record).context("Failed to serialise form")?
        );
        return Ok(());
    }

    if cli.json {
        let json = match result {
            Some(r) => serde_json::to_string_pretty(r),
            None => serde_json::to_string_pretty(fields),
        }
        .context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    print_summary(fields);
    if !cli.quiet {
        eprintln!();
        eprintln!("{} confidence {}%", green("✔"), bold(&confidence.to_string()));
        if let Some(r) = result {
            eprintln!("   {}  {}ms", dim(r.file_url.uri()), r.processing_time);
        }
    }
    Ok(())
}

fn print_summary(fields: &ExtractedFields) {
    let rows: [(&str, Option<String>); 10] = [
        ("Client", fields.client_name.clone()),
        ("Email", fields.client_email.clone()),
        ("Phone", fields.client_phone.clone()),
        ("Address", fields.client_address.clone()),
        ("Law firm", fields.law_firm.clone()),
        ("Case", fields.case_title.clone()),
        ("Case number", fields.case_number.clone()),
        ("Date", fields.date_of_incident.clone()),
        ("Urgency", fields.urgency.map(|u| u.to_string())),
        ("Amount", fields.estimated_amount.map(|a| format!("R {a:.2}"))),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            println!("{:<13} {}", format!("{label}:"), value);
        }
    }
    if let Some(ref description) = fields.description {
        println!("{:<13} {}", "Description:", description);
    }
    for (label, list) in [("Parties", &fields.parties), ("Deadlines", &fields.deadlines)] {
        if let Some(items) = list {
            println!("{label}:");
            for item in items {
                println!("  - {item}");
            }
        }
    }
}

async fn read_form(path: &Path) -> Result<MatterForm> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read form from {:?}", path))?;
    let value: Value =
        serde_json::from_str(&raw).with_context(|| format!("{:?} is not valid JSON", path))?;
    match value {
        Value::Object(record) => Ok(MatterForm::from_record(&record)),
        _ => bail!("{:?} must contain a JSON object", path),
    }
}

/// Map CLI args to `IntakeConfig`.
async fn build_config(cli: &Cli) -> Result<IntakeConfig> {
    let system_prompt = match cli.system_prompt {
        Some(ref path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        ),
        None => None,
    };

    let credentials = match (&cli.access_key_id, &cli.secret_access_key) {
        (Some(id), Some(secret)) => {
            let creds = AwsCredentials::new(id.as_str(), secret.as_str());
            Some(match cli.session_token {
                Some(ref token) => creds.with_session_token(token.as_str()),
                None => creds,
            })
        }
        _ => None,
    };

    let mut builder = IntakeConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .upload_timeout_secs(cli.upload_timeout);

    if let Some(ref creds) = credentials {
        if let Some(ref bucket) = cli.bucket {
            let mut storage =
                StorageConfig::new(bucket.as_str(), creds.clone()).region(cli.storage_region.as_str());
            if let Some(ref endpoint) = cli.storage_endpoint {
                storage = storage.endpoint(endpoint.as_str());
            }
            builder = builder.storage(storage);
        }

        let mut inference = InferenceConfig::new(creds.clone()).region(cli.bedrock_region.as_str());
        if let Some(ref model_id) = cli.model_id {
            inference = inference.model_id(model_id.as_str());
        }
        if let Some(ref endpoint) = cli.bedrock_endpoint {
            inference = inference.endpoint(endpoint.as_str());
        }
        builder = builder.inference(inference);
    }

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}
