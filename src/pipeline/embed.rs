//! Signature embedder: draw the visual signature block on the first page.
//!
//! The block is three lines of Helvetica in the bottom-left corner:
//!
//! ```text
//! Signed by: Jane Doe          (name size)
//! Email: jane@example.com      (detail size)
//! Date: 10/18/2026, 3:04:05 PM (detail size)
//! ```
//!
//! It is a visual marker only. No cryptographic signature is created.

use crate::config::SignatureLayout;
use crate::document::SignatureData;
use crate::error::EmbedError;
use crate::pipeline::codec::{self, DocumentHandle};
use crate::pipeline::sanitize::sanitize;
use chrono::{DateTime, Local};
use lopdf::content::Operation;
use std::fmt::Write;
use tracing::{debug, info};

/// One line of the signature block, in page-relative coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureLine {
    pub text: String,
    /// Baseline offset from the bottom of the visible page area.
    pub y: f32,
    pub size: f32,
}

/// The three lines that [`embed_signature`] draws, already sanitised.
pub fn signature_lines(
    signature: &SignatureData,
    layout: &SignatureLayout,
    signed_at: &DateTime<Local>,
) -> [SignatureLine; 3] {
    [
        SignatureLine {
            text: format!("Signed by: {}", sanitize(&signature.signer_name)),
            y: layout.name_y,
            size: layout.name_size,
        },
        SignatureLine {
            text: format!("Email: {}", sanitize(&signature.signer_email)),
            y: layout.email_y,
            size: layout.detail_size,
        },
        SignatureLine {
            text: format!(
                "Date: {}",
                sanitize(&format_timestamp(signed_at, &layout.timestamp_format))
            ),
            y: layout.timestamp_y,
            size: layout.detail_size,
        },
    ]
}

/// Draw the signature block onto the first page.
///
/// # Errors
/// * [`EmbedError::NoPages`] — the document has no pages.
/// * [`EmbedError::Malformed`] — the first page's content or resources
///   could not be edited.
pub fn embed_signature(
    handle: &mut DocumentHandle,
    signature: &SignatureData,
    layout: &SignatureLayout,
    signed_at: DateTime<Local>,
) -> Result<(), EmbedError> {
    let page = handle.first_page().ok_or(EmbedError::NoPages)?;
    let [left, bottom, _, _] = handle.page_box(page);
    let font = handle.add_standard_font(page, "Helvetica")?;

    let mut ops = vec![Operation::new("g", vec![0.into()])];
    for line in signature_lines(signature, layout, &signed_at) {
        debug!("Signature line at y={}: {}", line.y, line.text);
        ops.extend(codec::show_text(
            &font,
            line.size,
            left + layout.left,
            bottom + line.y,
            &line.text,
        ));
    }
    handle.append_page_content(page, ops)?;

    info!("Signature block embedded on page 1");
    Ok(())
}

/// Render `at` with a strftime pattern. Falls back to RFC 2822 when the
/// pattern contains an unknown specifier.
fn format_timestamp(at: &DateTime<Local>, pattern: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", at.format(pattern)).is_err() {
        return at.to_rfc2822();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fixtures;
    use chrono::TimeZone;
    use lopdf::content::Content;
    use lopdf::Object;

    fn signer() -> SignatureData {
        SignatureData::new("Jane Doe", "jane@example.com")
    }

    fn at() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 10, 18, 15, 4, 5)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn lines_follow_default_layout() {
        let lines = signature_lines(&signer(), &SignatureLayout::default(), &at());
        assert_eq!(lines[0].text, "Signed by: Jane Doe");
        assert_eq!((lines[0].y, lines[0].size), (50.0, 10.0));
        assert_eq!(lines[1].text, "Email: jane@example.com");
        assert_eq!((lines[1].y, lines[1].size), (35.0, 8.0));
        assert_eq!(lines[2].text, "Date: 10/18/2026, 3:04:05 PM");
        assert_eq!((lines[2].y, lines[2].size), (20.0, 8.0));
    }

    #[test]
    fn signer_identity_is_sanitised() {
        let sig = SignatureData::new("María Ñoño", "m\u{200B}@x.com");
        let lines = signature_lines(&sig, &SignatureLayout::default(), &at());
        assert_eq!(lines[0].text, "Signed by: Mara oo");
        assert_eq!(lines[1].text, "Email: m @x.com");
    }

    #[test]
    fn invalid_pattern_falls_back_to_rfc2822() {
        let rendered = format_timestamp(&at(), "%Q");
        assert_eq!(rendered, at().to_rfc2822());
    }

    #[test]
    fn draws_block_on_first_page_only() {
        let mut handle = codec::load(&fixtures::blank_pdf(2)).expect("load");
        embed_signature(&mut handle, &signer(), &SignatureLayout::default(), at()).expect("embed");

        assert_eq!(
            handle.page_text(1).unwrap(),
            vec![
                "Page 1",
                "Signed by: Jane Doe",
                "Email: jane@example.com",
                "Date: 10/18/2026, 3:04:05 PM"
            ]
        );
        assert_eq!(handle.page_text(2).unwrap(), vec!["Page 2"]);
    }

    #[test]
    fn zero_page_document_is_rejected() {
        let mut handle = codec::load(&fixtures::zero_page_pdf()).expect("load");
        let err = embed_signature(&mut handle, &signer(), &SignatureLayout::default(), at())
            .unwrap_err();
        assert!(matches!(err, EmbedError::NoPages));
    }

    #[test]
    fn offsets_are_relative_to_the_visible_area() {
        let mut handle = codec::load(&fixtures::blank_pdf(1)).expect("load");
        let page = handle.first_page().unwrap();
        handle.document_mut().get_dictionary_mut(page).unwrap().set(
            "CropBox",
            Object::Array(vec![100.into(), 200.into(), 500.into(), 700.into()]),
        );
        embed_signature(&mut handle, &signer(), &SignatureLayout::default(), at()).expect("embed");

        let raw = handle.document().get_page_content(page).unwrap();
        let content = Content::decode(&raw).unwrap();
        let positions: Vec<(f32, f32)> = content
            .operations
            .iter()
            .filter(|op| op.operator == "Td")
            .map(|op| {
                (
                    codec::number(&op.operands[0]).unwrap(),
                    codec::number(&op.operands[1]).unwrap(),
                )
            })
            .collect();
        // The fixture's own text sits at 72,720; the block follows it.
        assert_eq!(
            &positions[1..],
            &[(150.0, 250.0), (150.0, 235.0), (150.0, 220.0)]
        );
    }
}
