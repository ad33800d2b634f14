//! Signing orchestrator.
//!
//! [`DocumentSigner`] drives one document through the pipeline:
//!
//! ```text
//! Idle ─load─▶ Loaded ─fill─▶ Filled ─embed─▶ Embedded ─flatten─▶ Flattened
//!      ─serialize─▶ Serialized ─submit─▶ Submitted
//! ```
//!
//! Any stage may fail, which moves the operation to `Failed`. Transitions
//! only go forward: there is no partial recovery, a failed operation is
//! started again from `Idle` with fresh bytes.
//!
//! The PDF stages are synchronous CPU work and run on the blocking pool.
//! Every operation owns its own [`DocumentHandle`](crate::pipeline::codec::DocumentHandle),
//! so independent documents can be signed concurrently
//! ([`DocumentSigner::sign_batch`]).

use crate::config::SigningConfig;
use crate::document::{FormDataMap, SignatureData, SignedDocumentBytes};
use crate::error::SigningError;
use crate::output::{FillReport, PdfSummary, SavedDocument, SigningOutcome};
use crate::pipeline::fetch::RepositoryClient;
use crate::pipeline::submit::SubmissionClient;
use crate::pipeline::{codec, embed, fill, flatten};
use crate::progress::ProgressCallback;
use chrono::{DateTime, Local};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

// ── State machine ────────────────────────────────────────────────────────

/// Where a signing operation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningState {
    Idle,
    Loaded,
    Filled,
    Embedded,
    Flattened,
    Serialized,
    Submitted,
    Failed,
}

impl SigningState {
    /// The state a successful step leads to. `None` for terminal states.
    pub fn next(self) -> Option<SigningState> {
        use SigningState::*;
        match self {
            Idle => Some(Loaded),
            Loaded => Some(Filled),
            Filled => Some(Embedded),
            Embedded => Some(Flattened),
            Flattened => Some(Serialized),
            Serialized => Some(Submitted),
            Submitted | Failed => None,
        }
    }

    /// `true` for the one forward step, or a failure from any live state.
    pub fn can_transition_to(self, to: SigningState) -> bool {
        match to {
            SigningState::Failed => !self.is_terminal(),
            _ => self.next() == Some(to),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SigningState::Submitted | SigningState::Failed)
    }
}

impl fmt::Display for SigningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SigningState::Idle => "idle",
            SigningState::Loaded => "loaded",
            SigningState::Filled => "filled",
            SigningState::Embedded => "embedded",
            SigningState::Flattened => "flattened",
            SigningState::Serialized => "serialized",
            SigningState::Submitted => "submitted",
            SigningState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Tracks one operation's state and reports transitions.
struct Session {
    document_id: String,
    state: SigningState,
    callback: Option<ProgressCallback>,
}

impl Session {
    fn new(document_id: &str, callback: Option<ProgressCallback>) -> Self {
        Self {
            document_id: document_id.to_string(),
            state: SigningState::Idle,
            callback,
        }
    }

    fn advance(&mut self, to: SigningState) -> Result<(), SigningError> {
        if !self.state.can_transition_to(to) {
            return Err(SigningError::Internal(format!(
                "invalid transition {} -> {}",
                self.state, to
            )));
        }
        debug!("'{}': {} -> {}", self.document_id, self.state, to);
        self.state = to;
        if let Some(cb) = &self.callback {
            cb.on_stage(&self.document_id, to);
        }
        Ok(())
    }

    /// Record the failure and hand the error back.
    fn fail(&mut self, error: SigningError) -> SigningError {
        let reached = self.state;
        warn!(
            "Signing '{}' failed after reaching '{}': {}",
            self.document_id, reached, error
        );
        self.state = SigningState::Failed;
        if let Some(cb) = &self.callback {
            cb.on_signing_failed(&self.document_id, reached, &error.to_string());
        }
        error
    }
}

// ── Offline preparation ──────────────────────────────────────────────────

/// A filled, signed and flattened document ready for upload.
#[derive(Debug)]
pub struct PreparedDocument {
    pub bytes: SignedDocumentBytes,
    pub fill_report: FillReport,
    /// Wall-clock time written into the signature block.
    pub signed_at: DateTime<Local>,
    pub page_count: usize,
}

/// Run load → fill → embed → flatten → serialize on `bytes`.
///
/// Synchronous and CPU-bound. From async code use
/// [`DocumentSigner::prepare`] or [`DocumentSigner::sign`], which offload
/// this to the blocking pool.
pub fn prepare_document(
    bytes: &[u8],
    signature: &SignatureData,
    form_data: &FormDataMap,
    config: &SigningConfig,
) -> Result<PreparedDocument, SigningError> {
    let mut session = Session::new("local", config.progress_callback.clone());
    run_prepare(&mut session, bytes, signature, form_data, config).map_err(|e| session.fail(e))
}

fn run_prepare(
    session: &mut Session,
    bytes: &[u8],
    signature: &SignatureData,
    form_data: &FormDataMap,
    config: &SigningConfig,
) -> Result<PreparedDocument, SigningError> {
    // ── Step 1: Load ─────────────────────────────────────────────────────
    let mut handle = codec::load(bytes)?;
    let page_count = handle.page_count();
    session.advance(SigningState::Loaded)?;

    // ── Step 2: Fill form fields ─────────────────────────────────────────
    let fill_report = fill::fill(&mut handle, form_data);
    if let Some(cb) = &session.callback {
        for issue in fill_report.issues() {
            cb.on_field_issue(&session.document_id, issue);
        }
    }
    session.advance(SigningState::Filled)?;

    // ── Step 3: Draw the signature block ─────────────────────────────────
    let signed_at = Local::now();
    embed::embed_signature(&mut handle, signature, &config.layout, signed_at)?;
    session.advance(SigningState::Embedded)?;

    // ── Step 4: Flatten ──────────────────────────────────────────────────
    flatten::flatten(&mut handle)?;
    session.advance(SigningState::Flattened)?;

    // ── Step 5: Serialize ────────────────────────────────────────────────
    let bytes = handle.serialize_with_limit(config.max_signed_bytes)?;
    session.advance(SigningState::Serialized)?;
    info!(
        "'{}' prepared: {} pages, {} bytes, {} field issues",
        session.document_id,
        page_count,
        bytes.len(),
        fill_report.issues().count()
    );

    Ok(PreparedDocument {
        bytes: SignedDocumentBytes::new(bytes),
        fill_report,
        signed_at,
        page_count,
    })
}

/// Document facts without signing anything.
pub fn inspect(bytes: &[u8]) -> Result<PdfSummary, SigningError> {
    Ok(codec::load(bytes)?.summary())
}

// ── Orchestrator ─────────────────────────────────────────────────────────

/// One entry of a [`DocumentSigner::sign_batch`] call.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    pub document_id: String,
    /// Original PDF. `None` fetches it from the repository first.
    pub bytes: Option<Vec<u8>>,
    pub signature: SignatureData,
    pub form_data: FormDataMap,
}

/// Signs documents and submits them to the document service.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdfsign::{DocumentSigner, FormDataMap, SignatureData, SigningConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SigningConfig::builder()
///     .base_url("https://docs.example.com/api")
///     .build()?;
/// let signer = DocumentSigner::new(config)?;
///
/// let mut form = FormDataMap::new();
/// form.insert("fullName".into(), "Jane Doe".into());
/// let outcome = signer
///     .sign_remote("doc-42", SignatureData::new("Jane Doe", "jane@example.com"), form)
///     .await?;
/// println!("server answered {}", outcome.ack.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DocumentSigner {
    config: SigningConfig,
    repository: Option<RepositoryClient>,
    submitter: Option<SubmissionClient>,
}

impl DocumentSigner {
    /// Create a signer. Network clients are only built when
    /// `config.base_url` is set; without it only offline preparation works.
    pub fn new(config: SigningConfig) -> Result<Self, SigningError> {
        let (repository, submitter) = if config.base_url.is_some() {
            (
                Some(RepositoryClient::from_config(&config)?),
                Some(SubmissionClient::from_config(&config)?),
            )
        } else {
            (None, None)
        };
        Ok(Self {
            config,
            repository,
            submitter,
        })
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Fill, sign, flatten and serialize without uploading.
    pub async fn prepare(
        &self,
        document_id: &str,
        bytes: Vec<u8>,
        signature: &SignatureData,
        form_data: &FormDataMap,
    ) -> Result<PreparedDocument, SigningError> {
        let session = Session::new(document_id, self.config.progress_callback.clone());
        let (_, prepared) = self.prepare_blocking(session, bytes, signature, form_data).await?;
        Ok(prepared)
    }

    /// Sign `bytes` and submit the result as `document_id`.
    ///
    /// # Errors
    /// Any [`SigningError`]; [`SigningError::stage`] tells how far the
    /// operation got. Field-level problems are not errors, see
    /// [`SigningOutcome::fill_report`].
    pub async fn sign(
        &self,
        document_id: &str,
        bytes: Vec<u8>,
        signature: SignatureData,
        form_data: FormDataMap,
    ) -> Result<SigningOutcome, SigningError> {
        let start = Instant::now();
        let session = Session::new(document_id, self.config.progress_callback.clone());
        self.sign_session(session, bytes, signature, form_data, start)
            .await
    }

    /// Fetch `document_id` from the repository, then [`sign`](Self::sign) it.
    pub async fn sign_remote(
        &self,
        document_id: &str,
        signature: SignatureData,
        form_data: FormDataMap,
    ) -> Result<SigningOutcome, SigningError> {
        let start = Instant::now();
        let mut session = Session::new(document_id, self.config.progress_callback.clone());
        let repository = self.repository().map_err(|e| session.fail(e))?;
        let bytes = repository
            .pdf(document_id)
            .await
            .map_err(|e| session.fail(e.into()))?;
        self.sign_session(session, bytes, signature, form_data, start)
            .await
    }

    /// Sign several independent documents, at most `concurrency` at a time.
    ///
    /// Results come back in request order. One failure never affects the
    /// other documents.
    pub async fn sign_batch(
        &self,
        requests: Vec<SigningRequest>,
        concurrency: usize,
    ) -> Vec<(String, Result<SigningOutcome, SigningError>)> {
        let total = requests.len();
        info!("Signing batch of {} documents", total);

        let mut results: Vec<(usize, String, Result<SigningOutcome, SigningError>)> =
            stream::iter(requests.into_iter().enumerate().map(|(idx, req)| async move {
                let result = match req.bytes {
                    Some(bytes) => {
                        self.sign(&req.document_id, bytes, req.signature, req.form_data)
                            .await
                    }
                    None => {
                        self.sign_remote(&req.document_id, req.signature, req.form_data)
                            .await
                    }
                };
                (idx, req.document_id, result)
            }))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        results.sort_by_key(|(idx, _, _)| *idx);

        let failed = results.iter().filter(|(_, _, r)| r.is_err()).count();
        info!("Batch complete: {} signed, {} failed", total - failed, failed);
        results
            .into_iter()
            .map(|(_, id, result)| (id, result))
            .collect()
    }

    /// Prepare the signed PDF and write it to `output_path` instead of
    /// submitting it.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub async fn prepare_to_file(
        &self,
        document_id: &str,
        bytes: Vec<u8>,
        signature: &SignatureData,
        form_data: &FormDataMap,
        output_path: impl AsRef<Path>,
    ) -> Result<SavedDocument, SigningError> {
        let path = output_path.as_ref();
        let session = Session::new(document_id, self.config.progress_callback.clone());
        let (mut session, prepared) = self
            .prepare_blocking(session, bytes, signature, form_data)
            .await?;

        let write_failed = |e: std::io::Error| SigningError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| session.fail(write_failed(e)))?;
        }
        let signed_bytes = prepared.bytes.len();
        let tmp_path = path.with_extension("pdf.tmp");
        tokio::fs::write(&tmp_path, prepared.bytes.as_bytes())
            .await
            .map_err(|e| session.fail(write_failed(e)))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| session.fail(write_failed(e)))?;

        info!("Signed PDF written to {}", path.display());
        Ok(SavedDocument {
            document_id: document_id.to_string(),
            path: path.to_path_buf(),
            fill_report: prepared.fill_report,
            signed_at: prepared.signed_at,
            signed_bytes,
        })
    }

    async fn sign_session(
        &self,
        session: Session,
        bytes: Vec<u8>,
        signature: SignatureData,
        form_data: FormDataMap,
        start: Instant,
    ) -> Result<SigningOutcome, SigningError> {
        let mut session = session;
        let submitter = self.submitter().map_err(|e| session.fail(e))?;
        info!("Signing '{}' ({} bytes)", session.document_id, bytes.len());

        let (mut session, prepared) = self
            .prepare_blocking(session, bytes, &signature, &form_data)
            .await?;

        // ── Step 6: Submit ───────────────────────────────────────────────
        let signed_bytes = prepared.bytes.len();
        let ack = submitter
            .submit(&session.document_id, prepared.bytes, &signature)
            .await
            .map_err(|e| session.fail(e.into()))?;
        session.advance(SigningState::Submitted)?;
        if let Some(cb) = &session.callback {
            cb.on_signing_complete(&session.document_id, signed_bytes);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "'{}' signed and submitted in {}ms (HTTP {})",
            session.document_id, duration_ms, ack.status
        );
        Ok(SigningOutcome {
            document_id: session.document_id,
            ack,
            fill_report: prepared.fill_report,
            signed_at: prepared.signed_at,
            signed_bytes,
            duration_ms,
        })
    }

    /// Run the synchronous stages on the blocking pool. On failure the
    /// session has already been marked failed.
    async fn prepare_blocking(
        &self,
        mut session: Session,
        bytes: Vec<u8>,
        signature: &SignatureData,
        form_data: &FormDataMap,
    ) -> Result<(Session, PreparedDocument), SigningError> {
        let config = self.config.clone();
        let signature = signature.clone();
        let form_data = form_data.clone();
        let callback = session.callback.clone();
        let document_id = session.document_id.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let result = run_prepare(&mut session, &bytes, &signature, &form_data, &config);
            (session, result)
        })
        .await;

        match joined {
            Ok((mut session, Err(e))) => Err(session.fail(e)),
            Ok((session, Ok(prepared))) => Ok((session, prepared)),
            Err(e) => {
                // The session moved into the panicked task; report from a fresh one.
                let mut orphan = Session::new(&document_id, callback);
                Err(orphan.fail(SigningError::Internal(format!("signing task failed: {e}"))))
            }
        }
    }

    fn submitter(&self) -> Result<&SubmissionClient, SigningError> {
        self.submitter.as_ref().ok_or_else(|| {
            SigningError::InvalidConfig("base_url is required to submit documents".into())
        })
    }

    fn repository(&self) -> Result<&RepositoryClient, SigningError> {
        self.repository.as_ref().ok_or_else(|| {
            SigningError::InvalidConfig("base_url is required to fetch documents".into())
        })
    }
}
