//! Submission client: upload the signed PDF with its signer metadata.
//!
//! One multipart `POST {base}/documents/{id}/submit` per signing operation:
//!
//! | part | content |
//! |------|---------|
//! | `signedPdf` | the PDF bytes, `application/pdf`, filename `<id>.pdf` |
//! | `signerName` | signer name as entered |
//! | `signerEmail` | signer email as entered |
//! | `anonymousUserId` | only for anonymous signers |
//!
//! The request is never retried here. A failed upload surfaces as
//! [`SubmitError`] and the caller decides whether to start over.

use crate::config::SigningConfig;
use crate::document::{SignatureData, SignedDocumentBytes};
use crate::error::{SigningError, SubmitError};
use crate::output::SubmitAck;
use crate::pipeline::{endpoint, rejection_message};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Uploads signed documents to the document service.
#[derive(Debug, Clone)]
pub struct SubmissionClient {
    client: Client,
    base_url: Url,
    timeout: Option<Duration>,
}

impl SubmissionClient {
    /// Wrap an existing `reqwest::Client`.
    pub fn new(client: Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            timeout: None,
        }
    }

    /// Build a client from the signer configuration.
    ///
    /// # Errors
    /// [`SigningError::InvalidConfig`] when `base_url` is missing or invalid,
    /// or the HTTP client cannot be constructed.
    pub fn from_config(config: &SigningConfig) -> Result<Self, SigningError> {
        let base_url = parse_base_url(config)?;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| SigningError::InvalidConfig(format!("HTTP client: {e}")))?;
        let mut submitter = Self::new(client, base_url);
        submitter.timeout = config.submit_timeout_secs.map(Duration::from_secs);
        Ok(submitter)
    }

    /// Limit how long a single upload may take.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Upload `bytes` for `document_id`, consuming the buffer.
    ///
    /// # Errors
    /// * [`SubmitError::Rejected`] — non-2xx answer; carries the server's
    ///   `error` message when it sent one.
    /// * [`SubmitError::Transport`] — no response (connection, TLS, timeout).
    pub async fn submit(
        &self,
        document_id: &str,
        bytes: SignedDocumentBytes,
        signature: &SignatureData,
    ) -> Result<SubmitAck, SubmitError> {
        let url = endpoint(&self.base_url, &["documents", document_id, "submit"]);
        let size = bytes.len();

        let pdf = Part::bytes(bytes.into_inner())
            .file_name(format!("{document_id}.pdf"))
            .mime_str("application/pdf")
            .map_err(SubmitError::Transport)?;
        let mut form = Form::new()
            .part("signedPdf", pdf)
            .text("signerName", signature.signer_name.clone())
            .text("signerEmail", signature.signer_email.clone());
        if let Some(anonymous) = &signature.anonymous_user_id {
            form = form.text("anonymousUserId", anonymous.clone());
        }

        info!("Submitting '{}' ({} bytes) to {}", document_id, size, url);
        let mut request = self.client.post(url).multipart(form);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await.map_err(SubmitError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(SubmitError::Transport)?;
        if !status.is_success() {
            let message = rejection_message(status, &body);
            warn!("Submission of '{}' rejected ({}): {}", document_id, status, message);
            return Err(SubmitError::Rejected(message));
        }

        debug!("Submission of '{}' accepted: {}", document_id, status);
        let body = match serde_json::from_str(&body) {
            Ok(json) => json,
            Err(_) => serde_json::Value::String(body),
        };
        Ok(SubmitAck {
            status: status.as_u16(),
            body,
        })
    }
}

pub(crate) fn parse_base_url(config: &SigningConfig) -> Result<Url, SigningError> {
    let raw = config
        .base_url
        .as_deref()
        .ok_or_else(|| SigningError::InvalidConfig("base_url is required for remote calls".into()))?;
    Url::parse(raw).map_err(|e| SigningError::InvalidConfig(format!("base_url '{raw}': {e}")))
}
