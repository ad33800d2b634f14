//! Form field mutator: write caller-supplied values into AcroForm fields.
//!
//! Every entry of the [`FormDataMap`] produces exactly one [`FieldOutcome`].
//! Nothing here is fatal: an unknown name, an unsupported field type or a
//! field whose dictionary cannot be edited is recorded in the
//! [`FillReport`] and the remaining entries are still applied.

use crate::document::FormDataMap;
use crate::output::{FieldOutcome, FillReport};
use crate::pipeline::codec::{DocumentHandle, EditError};
use crate::pipeline::fields::{self, CheckBox, FormField, TextField};
use crate::pipeline::sanitize::sanitize;
use lopdf::{Document, Object};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Apply `form_data` to the document's fields.
///
/// Text fields receive the sanitised value (truncated to `/MaxLen`). Check
/// boxes are turned on when the value is `"true"` (any case) and off for
/// anything else.
pub fn fill(handle: &mut DocumentHandle, form_data: &FormDataMap) -> FillReport {
    let mut by_name: HashMap<String, FormField> = HashMap::new();
    for field in handle.fields() {
        by_name.entry(field.name().to_string()).or_insert(field);
    }

    let mut report = FillReport::default();
    let mut text_written = false;

    for (name, value) in form_data {
        let outcome = match by_name.get(name) {
            None => FieldOutcome::FieldNotFound { name: name.clone() },
            Some(FormField::TextField(field)) => {
                match set_text(handle.document_mut(), field, value) {
                    Ok(written) => {
                        text_written = true;
                        FieldOutcome::Filled {
                            name: name.clone(),
                            value: written,
                        }
                    }
                    Err(e) => FieldOutcome::Failed {
                        name: name.clone(),
                        detail: e.to_string(),
                    },
                }
            }
            Some(FormField::CheckBox(field)) => {
                let checked = value.eq_ignore_ascii_case("true");
                match set_checked(handle.document_mut(), field, checked) {
                    Ok(()) => FieldOutcome::Checked {
                        name: name.clone(),
                        checked,
                    },
                    Err(e) => FieldOutcome::Failed {
                        name: name.clone(),
                        detail: e.to_string(),
                    },
                }
            }
            Some(FormField::Unsupported(field)) => FieldOutcome::Unsupported {
                name: name.clone(),
                field_type: field.field_type().to_string(),
            },
        };

        match &outcome {
            FieldOutcome::FieldNotFound { name } => warn!("Form field '{}' not found", name),
            FieldOutcome::Unsupported { name, field_type } => {
                warn!("Form field '{}' has unsupported type {}", name, field_type)
            }
            FieldOutcome::Failed { name, detail } => {
                warn!("Form field '{}' could not be set: {}", name, detail)
            }
            other => debug!("Form field set: {:?}", other),
        }
        report.push(outcome);
    }

    // Viewers regenerate appearances for fields whose /AP was dropped.
    if text_written {
        if let Some(form) = fields::acro_form_mut(handle.document_mut()) {
            form.set("NeedAppearances", true);
        }
    }

    info!(
        "Form filled: {} of {} entries applied",
        report.applied(),
        report.outcomes.len()
    );
    report
}

fn set_text(doc: &mut Document, field: &TextField, value: &str) -> Result<String, EditError> {
    let mut text = sanitize(value);
    if let Some(max) = field.max_len() {
        // Sanitised text is ASCII, so byte and char boundaries coincide.
        text.truncate(max);
    }

    doc.get_dictionary_mut(field.id)?
        .set("V", Object::string_literal(text.clone()));
    for widget in &field.widgets {
        doc.get_dictionary_mut(*widget)?.remove(b"AP");
    }
    Ok(text)
}

fn set_checked(doc: &mut Document, field: &CheckBox, checked: bool) -> Result<(), EditError> {
    let state = if checked { field.on_state() } else { "Off" };
    let name = Object::Name(state.as_bytes().to_vec());

    doc.get_dictionary_mut(field.id)?.set("V", name.clone());
    for widget in &field.widgets {
        doc.get_dictionary_mut(*widget)?.set("AS", name.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{codec, fixtures};

    fn form() -> DocumentHandle {
        codec::load(&fixtures::form_pdf()).expect("fixture loads")
    }

    fn data(pairs: &[(&str, &str)]) -> FormDataMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn fills_text_field() {
        let mut handle = form();
        let report = fill(&mut handle, &data(&[("fullName", "Jane Doe")]));
        assert!(!report.has_issues());
        assert_eq!(handle.text_value("fullName").as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn fills_nested_field_by_qualified_name() {
        let mut handle = form();
        fill(&mut handle, &data(&[("address.city", "Lyon")]));
        assert_eq!(handle.text_value("address.city").as_deref(), Some("Lyon"));
    }

    #[test]
    fn checkbox_accepts_true_in_any_case() {
        for (value, expected) in [("true", true), ("TRUE", true), ("True", true), ("yes", false), ("1", false), ("", false)] {
            let mut handle = form();
            let report = fill(&mut handle, &data(&[("agree", value)]));
            assert_eq!(handle.is_checked("agree"), Some(expected), "value {value:?}");
            assert_eq!(
                report.outcomes,
                vec![FieldOutcome::Checked {
                    name: "agree".into(),
                    checked: expected
                }]
            );
        }
    }

    #[test]
    fn checkbox_uses_its_on_state_name() {
        let mut handle = form();
        fill(&mut handle, &data(&[("agree", "true")]));
        let doc = handle.document();
        let agree = handle.field("agree").expect("agree");
        let widget = doc.get_dictionary(agree.widgets()[0]).unwrap();
        assert_eq!(widget.get(b"AS").unwrap().as_name().unwrap(), b"Yes");
    }

    #[test]
    fn unknown_field_is_reported_not_fatal() {
        let mut handle = form();
        let report = fill(
            &mut handle,
            &data(&[("fullName", "Jane"), ("nickname", "JJ")]),
        );
        assert_eq!(report.not_found(), vec!["nickname"]);
        assert_eq!(report.applied(), 1);
        assert_eq!(handle.text_value("fullName").as_deref(), Some("Jane"));
    }

    #[test]
    fn choice_field_is_unsupported() {
        let mut handle = form();
        let report = fill(&mut handle, &data(&[("country", "CA")]));
        assert_eq!(
            report.outcomes,
            vec![FieldOutcome::Unsupported {
                name: "country".into(),
                field_type: "Ch".into()
            }]
        );
    }

    #[test]
    fn value_is_sanitised_and_truncated_to_max_len() {
        let mut handle = form();
        let report = fill(&mut handle, &data(&[("zip", "69\u{200B}0012345")]));
        assert_eq!(handle.text_value("zip").as_deref(), Some("69 00"));
        assert_eq!(
            report.outcomes,
            vec![FieldOutcome::Filled {
                name: "zip".into(),
                value: "69 00".into()
            }]
        );
    }

    #[test]
    fn text_fill_requests_fresh_appearances() {
        let mut handle = form();
        fill(&mut handle, &data(&[("fullName", "Jane Doe")]));
        let form = fields::acro_form(handle.document()).expect("acroform");
        assert_eq!(form.get(b"NeedAppearances").unwrap(), &Object::Boolean(true));
    }

    #[test]
    fn empty_form_data_changes_nothing() {
        let mut handle = form();
        let report = fill(&mut handle, &FormDataMap::new());
        assert!(report.outcomes.is_empty());
        assert_eq!(handle.text_value("internalRef").as_deref(), Some("secret"));
    }
}
