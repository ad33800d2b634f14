//! Progress-callback trait for signing events.
//!
//! Inject an [`Arc<dyn SigningProgressCallback>`] via
//! [`crate::config::SigningConfigBuilder::progress_callback`] to observe each
//! stage of a signing operation as it happens.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfsign::{SigningConfig, SigningProgressCallback, SigningState};
//! use std::sync::Arc;
//!
//! struct StageLogger;
//!
//! impl SigningProgressCallback for StageLogger {
//!     fn on_stage(&self, document_id: &str, state: SigningState) {
//!         eprintln!("{document_id}: {state}");
//!     }
//! }
//!
//! let config = SigningConfig::builder()
//!     .progress_callback(Arc::new(StageLogger) as Arc<dyn SigningProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::FieldOutcome;
use crate::sign::SigningState;
use std::sync::Arc;

/// Called by the signing pipeline as a document moves through its stages.
///
/// Implementations must be `Send + Sync`: stages run on the blocking pool
/// and batches sign several documents concurrently. All methods have
/// default no-op implementations.
pub trait SigningProgressCallback: Send + Sync {
    /// The document reached `state`.
    fn on_stage(&self, document_id: &str, state: SigningState) {
        let _ = (document_id, state);
    }

    /// A form-data entry could not be applied. Signing continues.
    fn on_field_issue(&self, document_id: &str, outcome: &FieldOutcome) {
        let _ = (document_id, outcome);
    }

    /// The operation failed; `stage` is the last state it reached.
    fn on_signing_failed(&self, document_id: &str, stage: SigningState, error: &str) {
        let _ = (document_id, stage, error);
    }

    /// The signed document was accepted by the server.
    ///
    /// # Arguments
    /// * `signed_bytes` — size of the uploaded PDF
    fn on_signing_complete(&self, document_id: &str, signed_bytes: usize) {
        let _ = (document_id, signed_bytes);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl SigningProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SigningConfig`].
pub type ProgressCallback = Arc<dyn SigningProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        stages: Mutex<Vec<SigningState>>,
        issues: AtomicUsize,
        failures: AtomicUsize,
        completed_bytes: AtomicUsize,
    }

    impl SigningProgressCallback for TrackingCallback {
        fn on_stage(&self, _document_id: &str, state: SigningState) {
            self.stages.lock().unwrap().push(state);
        }

        fn on_field_issue(&self, _document_id: &str, _outcome: &FieldOutcome) {
            self.issues.fetch_add(1, Ordering::SeqCst);
        }

        fn on_signing_failed(&self, _document_id: &str, _stage: SigningState, _error: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }

        fn on_signing_complete(&self, _document_id: &str, signed_bytes: usize) {
            self.completed_bytes.store(signed_bytes, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage("doc-1", SigningState::Loaded);
        cb.on_field_issue(
            "doc-1",
            &FieldOutcome::FieldNotFound {
                name: "x".into(),
            },
        );
        cb.on_signing_failed("doc-1", SigningState::Serialized, "boom");
        cb.on_signing_complete("doc-1", 1024);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_stage("doc-1", SigningState::Loaded);
        tracker.on_stage("doc-1", SigningState::Filled);
        tracker.on_field_issue(
            "doc-1",
            &FieldOutcome::FieldNotFound {
                name: "nickname".into(),
            },
        );
        tracker.on_signing_complete("doc-1", 2048);

        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![SigningState::Loaded, SigningState::Filled]
        );
        assert_eq!(tracker.issues.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.completed_bytes.load(Ordering::SeqCst), 2048);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn SigningProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_stage("doc-9", SigningState::Submitted);
        cb.on_signing_complete("doc-9", 1);
    }
}
