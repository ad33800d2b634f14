//! Caller-supplied inputs and the signed byte buffer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field name → value. Names are fully qualified (`parent.child`).
pub type FormDataMap = BTreeMap<String, String>;

/// Who is signing. Consumed once per signing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureData {
    pub signer_name: String,
    pub signer_email: String,
    /// Set when the signer is not logged in (shared signing links).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous_user_id: Option<String>,
}

impl SignatureData {
    pub fn new(signer_name: impl Into<String>, signer_email: impl Into<String>) -> Self {
        Self {
            signer_name: signer_name.into(),
            signer_email: signer_email.into(),
            anonymous_user_id: None,
        }
    }

    pub fn with_anonymous_user_id(mut self, id: impl Into<String>) -> Self {
        self.anonymous_user_id = Some(id.into());
        self
    }
}

/// The final serialized PDF.
///
/// Only the pipeline creates these (see [`prepare_document`](crate::prepare_document)).
/// Not `Clone`: the buffer moves into the submission client and is never
/// re-serialized or reused by the orchestrator.
#[derive(PartialEq, Eq)]
pub struct SignedDocumentBytes(Vec<u8>);

impl SignedDocumentBytes {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for SignedDocumentBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedDocumentBytes({} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_data_uses_wire_field_names() {
        let sig = SignatureData::new("Jane Doe", "jane@example.com").with_anonymous_user_id("anon-7");
        let json = serde_json::to_value(&sig).unwrap();
        assert_eq!(json["signerName"], "Jane Doe");
        assert_eq!(json["signerEmail"], "jane@example.com");
        assert_eq!(json["anonymousUserId"], "anon-7");

        let plain = serde_json::to_value(SignatureData::new("A", "a@x.com")).unwrap();
        assert!(plain.get("anonymousUserId").is_none());
    }

    #[test]
    fn signed_bytes_debug_hides_payload() {
        let bytes = SignedDocumentBytes::new(b"%PDF-1.7 ...".to_vec());
        assert_eq!(format!("{bytes:?}"), "SignedDocumentBytes(12 bytes)");
        assert!(!bytes.is_empty());
    }
}
