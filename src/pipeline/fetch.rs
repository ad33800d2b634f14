//! Repository client: read document metadata and original PDF bytes.
//!
//! `GET {base}/documents/{id}` returns the metadata record and
//! `GET {base}/documents/{id}/pdf` the file itself. Downloaded bytes must
//! carry a `%PDF-` header under the same rule [`codec::load`] applies;
//! anything else (an HTML error page served with 200, a mislabelled upload)
//! is rejected before it reaches the codec.

use crate::config::SigningConfig;
use crate::error::{FetchError, SigningError};
use crate::output::DocumentMetadata;
use crate::pipeline::codec;
use crate::pipeline::submit::parse_base_url;
use crate::pipeline::{endpoint, rejection_message};
use reqwest::{Client, Response, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info};

/// Read-only client for the document repository.
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    client: Client,
    base_url: Url,
}

impl RepositoryClient {
    /// Wrap an existing `reqwest::Client`.
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Build a client from the signer configuration.
    pub fn from_config(config: &SigningConfig) -> Result<Self, SigningError> {
        let base_url = parse_base_url(config)?;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| SigningError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self::new(client, base_url))
    }

    /// Fetch the metadata record of `document_id`.
    pub async fn metadata(&self, document_id: &str) -> Result<DocumentMetadata, FetchError> {
        let url = endpoint(&self.base_url, &["documents", document_id]);
        debug!("Fetching metadata: {}", url);
        let response = self.get(url, document_id).await?;
        let body = response.text().await.map_err(FetchError::Transport)?;
        serde_json::from_str(&body).map_err(|e| FetchError::Rejected {
            document_id: document_id.to_string(),
            message: format!("invalid metadata: {e}"),
        })
    }

    /// Download the original PDF of `document_id`.
    pub async fn pdf(&self, document_id: &str) -> Result<Vec<u8>, FetchError> {
        let url = endpoint(&self.base_url, &["documents", document_id, "pdf"]);
        info!("Downloading PDF: {}", url);
        let response = self.get(url, document_id).await?;
        let bytes = response.bytes().await.map_err(FetchError::Transport)?;

        if !codec::has_pdf_header(&bytes) {
            return Err(FetchError::NotAPdf {
                document_id: document_id.to_string(),
                magic: bytes.iter().take(4).copied().collect(),
            });
        }
        debug!("Downloaded '{}': {} bytes", document_id, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn get(&self, url: Url, document_id: &str) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::Transport)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                document_id: document_id.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Rejected {
                document_id: document_id.to_string(),
                message: rejection_message(status, &body),
            });
        }
        Ok(response)
    }
}
