//! Error types for the edgequake-pdfsign library.
//!
//! Every pipeline stage owns a small error enum so each stage can be used
//! and tested on its own:
//!
//! * [`CodecError`] — the bytes are not a PDF we can edit, or could not be
//!   written back out.
//! * [`EmbedError`] — the signature block could not be drawn.
//! * [`FlattenError`] — the form could not be turned into page content.
//! * [`SubmitError`] / [`FetchError`] — the remote document store refused
//!   the request or could not be reached.
//!
//! [`SigningError`] wraps all of them for the orchestrator and remembers
//! which stage failed. Field-level problems are **not** errors: they are
//! collected in [`crate::output::FillReport`] so a single odd field never
//! blocks a signature.

use crate::sign::SigningState;
use thiserror::Error;

/// The PDF container could not be loaded or written.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Bad header, truncated cross-reference table, unsupported encryption.
    #[error("PDF is malformed: {detail}")]
    Malformed { detail: String },

    /// Writing the document failed or the result exceeded the byte ceiling.
    #[error("PDF could not be written: {detail}")]
    IoLimit { detail: String },
}

/// The signature block could not be drawn onto the document.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// A zero-page PDF has nowhere to carry a signature.
    #[error("document has no pages to sign")]
    NoPages,

    /// The page tree or its resources could not be edited.
    #[error("first page could not be edited: {detail}")]
    Malformed { detail: String },
}

/// The interactive form could not be flattened.
///
/// Documents produced by this pipeline never trigger this; seeing it means
/// the loaded file carried a structurally broken form.
#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("form could not be flattened: {detail}")]
    Malformed { detail: String },
}

/// Uploading the signed document failed.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The server answered with a non-success status. The message is the
    /// server's own error text.
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// The request never produced a response (DNS, TLS, connection reset,
    /// timeout).
    #[error("submission transport failure: {0}")]
    Transport(#[source] reqwest::Error),
}

/// Reading a document from the repository failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("document '{document_id}' not found")]
    NotFound { document_id: String },

    #[error("repository rejected request for '{document_id}': {message}")]
    Rejected { document_id: String, message: String },

    #[error("document '{document_id}' is not a PDF (first bytes: {magic:?})")]
    NotAPdf { document_id: String, magic: Vec<u8> },

    #[error("repository transport failure: {0}")]
    Transport(#[source] reqwest::Error),
}

/// All fatal errors returned by the signing orchestrator.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Flatten(#[from] FlattenError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not write the signed PDF to the local file system.
    #[error("Failed to write signed PDF to '{path}': {source}")]
    OutputWriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error (e.g. the blocking worker panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SigningError {
    /// The last state the signing operation reached before failing.
    ///
    /// A failed operation cannot be resumed from here; the caller has to
    /// start again from [`SigningState::Idle`] with freshly fetched bytes.
    pub fn stage(&self) -> SigningState {
        match self {
            SigningError::Fetch(_) | SigningError::Codec(CodecError::Malformed { .. }) => {
                SigningState::Idle
            }
            SigningError::Embed(_) => SigningState::Filled,
            SigningError::Flatten(_) => SigningState::Embedded,
            SigningError::Codec(CodecError::IoLimit { .. }) => SigningState::Flattened,
            SigningError::Submit(_) | SigningError::OutputWriteFailed { .. } => {
                SigningState::Serialized
            }
            SigningError::InvalidConfig(_) | SigningError::Internal(_) => SigningState::Idle,
        }
    }

    /// `true` when retrying the whole operation may succeed without any
    /// change to the input (network trouble, server-side failures).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SigningError::Submit(_) | SigningError::Fetch(FetchError::Transport(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display_carries_server_message() {
        let e = SubmitError::Rejected("disk full".into());
        assert!(e.to_string().contains("disk full"), "got: {e}");
    }

    #[test]
    fn no_pages_maps_to_filled_stage() {
        let e = SigningError::from(EmbedError::NoPages);
        assert_eq!(e.stage(), SigningState::Filled);
        assert!(!e.is_retryable());
    }

    #[test]
    fn malformed_input_fails_before_loading() {
        let e = SigningError::from(CodecError::Malformed {
            detail: "missing %PDF header".into(),
        });
        assert_eq!(e.stage(), SigningState::Idle);
        assert!(e.to_string().contains("missing %PDF header"));
    }

    #[test]
    fn submit_errors_are_retryable() {
        let e = SigningError::from(SubmitError::Rejected("busy".into()));
        assert!(e.is_retryable());
        assert_eq!(e.stage(), SigningState::Serialized);
    }
}
