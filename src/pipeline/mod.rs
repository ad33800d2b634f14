//! Pipeline stages for document signing.
//!
//! Each submodule implements exactly one step and can be used on its own.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ codec::load ──▶ fill ──▶ embed ──▶ flatten ──▶ codec::serialize ──▶ submit
//! (HTTP)     (lopdf)       (fields) (block)   (burn-in)     (bytes)              (HTTP)
//! ```
//!
//! 1. [`fetch`]    — read document metadata and bytes from the repository
//! 2. [`codec`]    — parse bytes into an editable [`codec::DocumentHandle`]
//! 3. [`fill`]     — write caller values into AcroForm fields
//! 4. [`embed`]    — draw the `Signed by / Email / Date` block on page 1
//! 5. [`flatten`]  — burn field appearances into the pages, drop the form
//! 6. [`submit`]   — upload the signed bytes as one multipart POST
//!
//! Steps 2–5 are synchronous CPU work; the orchestrator in [`crate::sign`]
//! runs them in `spawn_blocking`. Only [`fetch`] and [`submit`] do I/O.
//! [`sanitize`] is shared by every stage that writes text into the PDF.

pub mod codec;
pub mod embed;
pub mod fetch;
pub mod fields;
pub mod fill;
pub mod flatten;
pub mod sanitize;
pub mod submit;

#[cfg(test)]
pub(crate) mod fixtures;

use reqwest::{StatusCode, Url};

/// `base` with `segments` appended as percent-encoded path segments.
///
/// A trailing slash on `base` is ignored, so `https://h/api` and
/// `https://h/api/` produce the same URLs.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Human-readable reason for a non-success response: the `error` field of a
/// JSON body, else the raw body, else the status line.
pub(crate) fn rejection_message(status: StatusCode, body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(serde_json::Value::String(error)) = map.get("error") {
            return error.clone();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_encoded_segments() {
        let base = Url::parse("https://docs.example.com/api/").unwrap();
        let url = endpoint(&base, &["documents", "a/b c", "submit"]);
        assert_eq!(
            url.as_str(),
            "https://docs.example.com/api/documents/a%2Fb%20c/submit"
        );

        let bare = Url::parse("https://docs.example.com").unwrap();
        assert_eq!(
            endpoint(&bare, &["documents", "42"]).as_str(),
            "https://docs.example.com/documents/42"
        );
    }

    #[test]
    fn rejection_prefers_json_error_field() {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        assert_eq!(rejection_message(status, r#"{"error":"disk full"}"#), "disk full");
        assert_eq!(rejection_message(status, "upstream down\n"), "upstream down");
        assert_eq!(
            rejection_message(status, r#"{"detail":"nope"}"#),
            r#"{"detail":"nope"}"#
        );
        assert_eq!(rejection_message(status, ""), "HTTP 500 Internal Server Error");
    }
}
