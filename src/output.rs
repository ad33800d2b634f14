//! Result types returned by the signing pipeline.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happened to one entry of the caller's form data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FieldOutcome {
    /// Text field set to the (sanitised, possibly truncated) value.
    Filled { name: String, value: String },
    /// Check box set on or off.
    Checked { name: String, checked: bool },
    /// No field with this name exists in the form.
    FieldNotFound { name: String },
    /// The field exists but its type is not written to.
    Unsupported { name: String, field_type: String },
    /// Writing the field failed; the rest of the form was still filled.
    Failed { name: String, detail: String },
}

impl FieldOutcome {
    pub fn name(&self) -> &str {
        match self {
            FieldOutcome::Filled { name, .. }
            | FieldOutcome::Checked { name, .. }
            | FieldOutcome::FieldNotFound { name }
            | FieldOutcome::Unsupported { name, .. }
            | FieldOutcome::Failed { name, .. } => name,
        }
    }

    /// `true` for outcomes a caller may want to warn the user about.
    pub fn is_issue(&self) -> bool {
        matches!(
            self,
            FieldOutcome::FieldNotFound { .. }
                | FieldOutcome::Unsupported { .. }
                | FieldOutcome::Failed { .. }
        )
    }
}

/// Per-field outcomes of a fill pass. Never an error by itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReport {
    pub outcomes: Vec<FieldOutcome>,
}

impl FillReport {
    pub fn push(&mut self, outcome: FieldOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn issues(&self) -> impl Iterator<Item = &FieldOutcome> {
        self.outcomes.iter().filter(|o| o.is_issue())
    }

    pub fn has_issues(&self) -> bool {
        self.issues().next().is_some()
    }

    /// Number of fields that were written.
    pub fn applied(&self) -> usize {
        self.outcomes.len() - self.issues().count()
    }

    /// Names from the form data that matched no field.
    pub fn not_found(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                FieldOutcome::FieldNotFound { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Server acknowledgement of a submitted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAck {
    /// HTTP status code (2xx).
    pub status: u16,
    /// Response body. A non-JSON body is kept as a JSON string.
    pub body: serde_json::Value,
}

/// Document record held by the remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(alias = "mime_type", default = "default_mime_type")]
    pub mime_type: String,
}

fn default_mime_type() -> String {
    "application/pdf".to_string()
}

/// Facts about a loaded PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfSummary {
    pub title: Option<String>,
    pub author: Option<String>,
    pub producer: Option<String>,
    pub pdf_version: String,
    pub page_count: usize,
    pub field_count: usize,
}

/// Result of a completed signing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningOutcome {
    pub document_id: String,
    pub ack: SubmitAck,
    pub fill_report: FillReport,
    /// Wall-clock time written into the signature block.
    pub signed_at: DateTime<Local>,
    /// Size of the uploaded PDF.
    pub signed_bytes: usize,
    pub duration_ms: u64,
}

/// A signed PDF written to disk instead of being submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedDocument {
    pub document_id: String,
    pub path: PathBuf,
    pub fill_report: FillReport,
    pub signed_at: DateTime<Local>,
    pub signed_bytes: usize,
}
