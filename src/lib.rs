//! # edgequake-pdfsign
//!
//! Fill, visually sign, flatten and submit PDF forms.
//!
//! A signer opens a document, types values into its form, and confirms with
//! their name and email. This crate turns that into one immutable PDF: the
//! values are written into the AcroForm, a `Signed by / Email / Date` block
//! is drawn on the first page, the form is flattened so nothing stays
//! editable, and the bytes are uploaded to the document service in a single
//! multipart request.
//!
//! The signature is a visual audit marker, not a cryptographic one.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Load       parse into an editable object graph (lopdf)
//!  ├─ 2. Fill       write form values, collect per-field outcomes
//!  ├─ 3. Embed      draw the signature block on page 1
//!  ├─ 4. Flatten    burn field appearances into the pages, drop the form
//!  ├─ 5. Serialize  write the final bytes (spawn_blocking for 1–5)
//!  └─ 6. Submit     multipart POST /documents/{id}/submit
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfsign::{DocumentSigner, FormDataMap, SignatureData, SigningConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SigningConfig::builder()
//!         .base_url("https://docs.example.com/api")
//!         .build()?;
//!     let signer = DocumentSigner::new(config)?;
//!
//!     let bytes = std::fs::read("lease.pdf")?;
//!     let mut form = FormDataMap::new();
//!     form.insert("fullName".into(), "Jane Doe".into());
//!     form.insert("agree".into(), "true".into());
//!
//!     let outcome = signer
//!         .sign("doc-42", bytes, SignatureData::new("Jane Doe", "jane@example.com"), form)
//!         .await?;
//!     for issue in outcome.fill_report.issues() {
//!         eprintln!("field issue: {issue:?}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfsign` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-pdfsign = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod sign;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{SignatureLayout, SigningConfig, SigningConfigBuilder};
pub use document::{FormDataMap, SignatureData, SignedDocumentBytes};
pub use error::{CodecError, EmbedError, FetchError, FlattenError, SigningError, SubmitError};
pub use output::{
    DocumentMetadata, FieldOutcome, FillReport, PdfSummary, SavedDocument, SigningOutcome,
    SubmitAck,
};
pub use pipeline::codec::{load, DocumentHandle};
pub use pipeline::embed::embed_signature;
pub use pipeline::fetch::RepositoryClient;
pub use pipeline::fields::FormField;
pub use pipeline::fill::fill;
pub use pipeline::flatten::flatten;
pub use pipeline::sanitize::sanitize;
pub use pipeline::submit::SubmissionClient;
pub use progress::{NoopProgressCallback, ProgressCallback, SigningProgressCallback};
pub use sign::{
    inspect, prepare_document, DocumentSigner, PreparedDocument, SigningRequest, SigningState,
};
