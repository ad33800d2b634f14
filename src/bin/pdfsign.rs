//! CLI binary for edgequake-pdfsign.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `SigningConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_pdfsign::{
    inspect, load, DocumentSigner, FieldOutcome, FormDataMap, FormField, ProgressCallback,
    RepositoryClient, SignatureData, SigningConfig, SigningProgressCallback, SigningState,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner showing the current stage plus one
/// log line per field issue.
struct CliProgressCallback {
    spinner: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        spinner.set_style(style);
        spinner.set_prefix("Signing");
        spinner.set_message("opening PDF…");
        spinner.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { spinner })
    }
}

impl SigningProgressCallback for CliProgressCallback {
    fn on_stage(&self, _document_id: &str, state: SigningState) {
        let next = match state {
            SigningState::Loaded => "filling form…",
            SigningState::Filled => "drawing signature…",
            SigningState::Embedded => "flattening…",
            SigningState::Flattened => "writing PDF…",
            SigningState::Serialized => "uploading…",
            _ => "",
        };
        self.spinner.set_message(next);
    }

    fn on_field_issue(&self, _document_id: &str, outcome: &FieldOutcome) {
        let line = match outcome {
            FieldOutcome::FieldNotFound { name } => format!("no field named '{name}'"),
            FieldOutcome::Unsupported { name, field_type } => {
                format!("'{name}' is a {field_type} field, not filled")
            }
            FieldOutcome::Failed { name, detail } => format!("'{name}' failed: {detail}"),
            other => format!("{other:?}"),
        };
        self.spinner.println(format!("  {} {}", yellow("⚠"), line));
    }

    fn on_signing_failed(&self, document_id: &str, stage: SigningState, _error: &str) {
        // The error itself is reported once, by main.
        self.spinner.finish_and_clear();
        eprintln!("{}", failure_line(document_id, stage));
    }

    fn on_signing_complete(&self, document_id: &str, signed_bytes: usize) {
        self.spinner.finish_and_clear();
        eprintln!(
            "{} {} submitted  {}",
            green("✔"),
            bold(document_id),
            dim(&format!("{signed_bytes} bytes")),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Fetch, sign and submit a document from the service
  pdfsign doc-42 --base-url https://docs.example.com/api \
      --name "Jane Doe" --email jane@example.com \
      --field fullName="Jane Doe" --field agree=true

  # Sign a local file and submit it as doc-42
  pdfsign doc-42 --input lease.pdf --name "Jane Doe" --email jane@example.com

  # Sign locally without submitting
  pdfsign doc-42 --input lease.pdf --name "Jane Doe" --email jane@example.com -o signed.pdf

  # List the form fields of a document
  pdfsign doc-42 --input lease.pdf --inspect

ENVIRONMENT VARIABLES:
  PDFSIGN_BASE_URL        Document service root URL
  PDFSIGN_SIGNER_NAME     Default signer name
  PDFSIGN_SIGNER_EMAIL    Default signer email
  RUST_LOG                Override log filter (e.g. edgequake_pdfsign=debug)
"#;

/// Fill, sign, flatten and submit PDF forms.
#[derive(Parser, Debug)]
#[command(
    name = "pdfsign",
    version,
    about = "Fill, sign, flatten and submit PDF forms",
    long_about = "Fill a PDF's form fields, draw a 'Signed by / Email / Date' block on its \
first page, flatten the form so it can no longer be edited, and upload the result to the \
document service. The signature is a visual audit marker, not a cryptographic signature.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document ID on the document service.
    document_id: String,

    /// Read the PDF from this file instead of fetching it.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Document service root URL.
    #[arg(long, env = "PDFSIGN_BASE_URL")]
    base_url: Option<String>,

    /// Signer name.
    #[arg(long, env = "PDFSIGN_SIGNER_NAME")]
    name: Option<String>,

    /// Signer email.
    #[arg(long, env = "PDFSIGN_SIGNER_EMAIL")]
    email: Option<String>,

    /// Anonymous signer ID (shared signing links).
    #[arg(long)]
    anonymous_user_id: Option<String>,

    /// Form value as NAME=VALUE. Repeatable.
    #[arg(short, long = "field", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// JSON file with an object of form values.
    #[arg(long)]
    fields_json: Option<PathBuf>,

    /// Write the signed PDF here instead of submitting it.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print document facts and form fields, then exit.
    #[arg(long)]
    inspect: bool,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    /// Upload timeout in seconds (default: none).
    #[arg(long, env = "PDFSIGN_SUBMIT_TIMEOUT")]
    submit_timeout: Option<u64>,

    /// Download timeout in seconds.
    #[arg(long, env = "PDFSIGN_FETCH_TIMEOUT", default_value_t = 60)]
    fetch_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect;
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

    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn SigningProgressCallback>);
    let config = build_config(&cli, progress_cb)?;

    // ── Inspect mode ─────────────────────────────────────────────────────
    if cli.inspect {
        let bytes = read_input(&cli, &config).await?;
        return print_inspection(&cli, &bytes);
    }

    // ── Gather signer and form data ──────────────────────────────────────
    let (Some(name), Some(email)) = (cli.name.clone(), cli.email.clone()) else {
        bail!("--name and --email are required to sign (or set PDFSIGN_SIGNER_NAME / PDFSIGN_SIGNER_EMAIL)");
    };
    let mut signature = SignatureData::new(name, email);
    if let Some(ref id) = cli.anonymous_user_id {
        signature = signature.with_anonymous_user_id(id.clone());
    }
    let form_data = build_form_data(&cli).await?;

    let signer = DocumentSigner::new(config.clone()).context("Invalid configuration")?;

    // ── Local output ─────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let bytes = read_input(&cli, &config).await?;
        let saved = signer
            .prepare_to_file(&cli.document_id, bytes, &signature, &form_data, output_path)
            .await
            .context("Signing failed")?;
        if let Some(ref cb) = cli_progress {
            cb.spinner.finish_and_clear();
        }

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&saved).context("Failed to serialise result")?
            );
        } else if !cli.quiet {
            eprintln!(
                "{}  {} bytes  →  {}",
                green("✔"),
                saved.signed_bytes,
                bold(&output_path.display().to_string()),
            );
            report_issues(saved.fill_report.issues().count(), show_progress);
        }
        return Ok(());
    }

    // ── Sign and submit ──────────────────────────────────────────────────
    let outcome = match cli.input {
        Some(ref path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            signer
                .sign(&cli.document_id, bytes, signature, form_data)
                .await
        }
        None => {
            signer
                .sign_remote(&cli.document_id, signature, form_data)
                .await
        }
    }
    .context("Signing failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialise result")?
        );
    } else if !cli.quiet {
        if !show_progress {
            eprintln!(
                "Submitted '{}' ({} bytes) in {}ms: HTTP {}",
                outcome.document_id, outcome.signed_bytes, outcome.duration_ms, outcome.ack.status
            );
        }
        report_issues(outcome.fill_report.issues().count(), show_progress);
    }
    Ok(())
}

/// Map CLI args to `SigningConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<SigningConfig> {
    let mut builder = SigningConfig::builder().fetch_timeout_secs(cli.fetch_timeout);
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(secs) = cli.submit_timeout {
        builder = builder.submit_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

async fn build_form_data(cli: &Cli) -> Result<FormDataMap> {
    let mut form = FormDataMap::new();
    if let Some(ref path) = cli.fields_json {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let values: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw)
            .with_context(|| format!("{} must contain a JSON object", path.display()))?;
        for (name, value) in values {
            let text = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            form.insert(name, text);
        }
    }
    // Flags win over the JSON file.
    for (name, value) in &cli.fields {
        form.insert(name.clone(), value.clone());
    }
    Ok(form)
}

async fn read_input(cli: &Cli, config: &SigningConfig) -> Result<Vec<u8>> {
    if let Some(ref path) = cli.input {
        return tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    let repository = RepositoryClient::from_config(config)
        .context("--input or --base-url is required")?;
    repository
        .pdf(&cli.document_id)
        .await
        .with_context(|| format!("Failed to fetch document '{}'", cli.document_id))
}

fn print_inspection(cli: &Cli, bytes: &[u8]) -> Result<()> {
    let summary = inspect(bytes).context("Failed to inspect PDF")?;
    let fields = load(bytes).context("Failed to load PDF")?.fields();

    if cli.json {
        let fields: Vec<serde_json::Value> = fields
            .iter()
            .map(|f| serde_json::json!({ "name": f.name(), "kind": f.kind(), "value": field_value(f) }))
            .collect();
        let doc = serde_json::json!({ "summary": summary, "fields": fields });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).context("Failed to serialise inspection")?
        );
        return Ok(());
    }

    println!("Document:     {}", cli.document_id);
    if let Some(ref t) = summary.title {
        println!("Title:        {}", t);
    }
    if let Some(ref a) = summary.author {
        println!("Author:       {}", a);
    }
    if let Some(ref p) = summary.producer {
        println!("Producer:     {}", p);
    }
    println!("Pages:        {}", summary.page_count);
    println!("PDF Version:  {}", summary.pdf_version);
    println!("Form fields:  {}", summary.field_count);
    for field in &fields {
        println!(
            "  {:<32} {:<12} {}",
            field.name(),
            field.kind(),
            dim(&field_value(field).unwrap_or_default())
        );
    }
    Ok(())
}

fn field_value(field: &FormField) -> Option<String> {
    match field {
        FormField::TextField(t) => t.value().map(str::to_string),
        FormField::CheckBox(c) => Some(if c.is_checked() { "on" } else { "off" }.to_string()),
        FormField::Unsupported(u) => Some(format!("({})", u.field_type())),
    }
}

fn failure_line(document_id: &str, stage: SigningState) -> String {
    format!("{} {} stopped after '{}'", red("✘"), bold(document_id), stage)
}

fn report_issues(count: usize, already_printed: bool) {
    if count > 0 && !already_printed {
        eprintln!(
            "{} {} form entries were not applied (run with -v for details)",
            yellow("⚠"),
            count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_field_pairs() {
        assert_eq!(
            parse_field("fullName=Jane Doe").unwrap(),
            ("fullName".to_string(), "Jane Doe".to_string())
        );
        assert_eq!(
            parse_field("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_field("=x").is_err());
        assert!(parse_field("novalue").is_err());
    }

    #[test]
    fn failure_line_names_stage_only() {
        let line = failure_line("doc-9", SigningState::Serialized);
        assert!(line.contains("doc-9"));
        assert!(line.contains("stopped after 'serialized'"));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
