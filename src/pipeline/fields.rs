//! AcroForm field model.
//!
//! A PDF form is a tree rooted at `/AcroForm /Fields`. Intermediate nodes
//! only contribute a name segment and inheritable attributes (`/FT`, `/Ff`);
//! terminal nodes carry the value and own one or more widget annotations
//! (either merged into the field dictionary or listed as `/Kids` without a
//! `/T`). This module walks that tree once and hands back a closed
//! [`FormField`] enum so callers dispatch on field type with `match` rather
//! than string comparisons.
//!
//! Object ids stay inside the crate: the public accessors only expose names
//! and values.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;

/// Field flag: radio button group (`/Ff` bit 16).
const FF_RADIO: i64 = 1 << 15;
/// Field flag: push button (`/Ff` bit 17).
const FF_PUSHBUTTON: i64 = 1 << 16;
/// Field trees deeper than this are treated as corrupt.
const MAX_DEPTH: usize = 32;

/// An interactive form field, keyed by its fully qualified name.
#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    TextField(TextField),
    CheckBox(CheckBox),
    /// Radio groups, push buttons, choice lists, signature fields, …
    Unsupported(UnsupportedField),
}

impl FormField {
    /// Fully qualified name (`parent.child`).
    pub fn name(&self) -> &str {
        match self {
            FormField::TextField(f) => &f.name,
            FormField::CheckBox(f) => &f.name,
            FormField::Unsupported(f) => &f.name,
        }
    }

    /// Short label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            FormField::TextField(_) => "text",
            FormField::CheckBox(_) => "checkbox",
            FormField::Unsupported(_) => "unsupported",
        }
    }

    pub(crate) fn id(&self) -> ObjectId {
        match self {
            FormField::TextField(f) => f.id,
            FormField::CheckBox(f) => f.id,
            FormField::Unsupported(f) => f.id,
        }
    }

    pub(crate) fn widgets(&self) -> &[ObjectId] {
        match self {
            FormField::TextField(f) => &f.widgets,
            FormField::CheckBox(f) => &f.widgets,
            FormField::Unsupported(f) => &f.widgets,
        }
    }
}

/// A single-line or multi-line text field (`/FT /Tx`).
#[derive(Debug, Clone, PartialEq)]
pub struct TextField {
    pub(crate) id: ObjectId,
    pub(crate) widgets: Vec<ObjectId>,
    name: String,
    value: Option<String>,
    max_len: Option<usize>,
}

impl TextField {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current `/V`, if any.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// `/MaxLen`, if the form restricts the value length.
    pub fn max_len(&self) -> Option<usize> {
        self.max_len
    }
}

/// A check box (`/FT /Btn` without the radio or push-button flags).
#[derive(Debug, Clone, PartialEq)]
pub struct CheckBox {
    pub(crate) id: ObjectId,
    pub(crate) widgets: Vec<ObjectId>,
    name: String,
    checked: bool,
    on_state: String,
}

impl CheckBox {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    /// Appearance state name used when the box is checked (usually `Yes`).
    pub fn on_state(&self) -> &str {
        &self.on_state
    }
}

/// Any field type the mutator does not write to.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsupportedField {
    pub(crate) id: ObjectId,
    pub(crate) widgets: Vec<ObjectId>,
    name: String,
    field_type: String,
}

impl UnsupportedField {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable field type, e.g. `Ch` or `Btn (radio)`.
    pub fn field_type(&self) -> &str {
        &self.field_type
    }
}

/// Attributes a child field inherits from its ancestors.
#[derive(Default)]
struct Inherited {
    name: Option<String>,
    field_type: Option<Vec<u8>>,
    flags: i64,
}

/// Collect every terminal field of the document's AcroForm, in tree order.
pub(crate) fn collect(doc: &Document) -> Vec<FormField> {
    let Some(acro_form) = acro_form(doc) else {
        return Vec::new();
    };
    let roots: Vec<ObjectId> = acro_form
        .get(b"Fields")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .map(|items| items.iter().filter_map(|o| o.as_reference().ok()).collect())
        .unwrap_or_default();

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for root in roots {
        walk(doc, root, &Inherited::default(), 0, &mut seen, &mut out);
    }
    out
}

fn walk(
    doc: &Document,
    id: ObjectId,
    inherited: &Inherited,
    depth: usize,
    seen: &mut HashSet<ObjectId>,
    out: &mut Vec<FormField>,
) {
    if depth > MAX_DEPTH || !seen.insert(id) {
        return;
    }
    let Ok(dict) = doc.get_dictionary(id) else {
        return;
    };

    let partial = dict.get(b"T").ok().and_then(|o| text_string(doc, o));
    let name = match (&inherited.name, partial) {
        (Some(parent), Some(t)) => Some(format!("{parent}.{t}")),
        (None, Some(t)) => Some(t),
        (parent, None) => parent.clone(),
    };
    let field_type = dict
        .get(b"FT")
        .ok()
        .and_then(|o| o.as_name().ok())
        .map(<[u8]>::to_vec)
        .or_else(|| inherited.field_type.clone());
    let flags = dict
        .get(b"Ff")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(inherited.flags);

    let kids: Vec<ObjectId> = dict
        .get(b"Kids")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .map(|items| items.iter().filter_map(|o| o.as_reference().ok()).collect())
        .unwrap_or_default();
    let (field_kids, widget_kids): (Vec<ObjectId>, Vec<ObjectId>) =
        kids.into_iter().partition(|kid| {
            doc.get_dictionary(*kid)
                .map(|d| d.has(b"T"))
                .unwrap_or(false)
        });

    let here = Inherited {
        name,
        field_type,
        flags,
    };
    if !field_kids.is_empty() {
        for kid in field_kids {
            walk(doc, kid, &here, depth + 1, seen, out);
        }
        return;
    }

    let Some(name) = here.name else {
        return;
    };
    let widgets = if widget_kids.is_empty() {
        vec![id]
    } else {
        widget_kids
    };
    out.push(classify(doc, id, dict, name, here.field_type.as_deref(), here.flags, widgets));
}

fn classify(
    doc: &Document,
    id: ObjectId,
    dict: &Dictionary,
    name: String,
    field_type: Option<&[u8]>,
    flags: i64,
    widgets: Vec<ObjectId>,
) -> FormField {
    let unsupported = |field_type: String, widgets: Vec<ObjectId>| {
        FormField::Unsupported(UnsupportedField {
            id,
            widgets,
            name: name.clone(),
            field_type,
        })
    };

    match field_type {
        Some(b"Tx") => FormField::TextField(TextField {
            id,
            name: name.clone(),
            value: dict.get(b"V").ok().and_then(|o| text_string(doc, o)),
            max_len: dict
                .get(b"MaxLen")
                .ok()
                .and_then(|o| o.as_i64().ok())
                .and_then(|n| usize::try_from(n).ok()),
            widgets,
        }),
        Some(b"Btn") if flags & FF_PUSHBUTTON != 0 => {
            unsupported("Btn (push button)".into(), widgets)
        }
        Some(b"Btn") if flags & FF_RADIO != 0 => unsupported("Btn (radio)".into(), widgets),
        Some(b"Btn") => {
            let state = dict
                .get(b"V")
                .ok()
                .and_then(|o| o.as_name().ok())
                .or_else(|| {
                    widgets
                        .first()
                        .and_then(|w| doc.get_dictionary(*w).ok())
                        .and_then(|w| w.get(b"AS").ok())
                        .and_then(|o| o.as_name().ok())
                });
            FormField::CheckBox(CheckBox {
                id,
                name: name.clone(),
                checked: state.is_some_and(|s| s != b"Off"),
                on_state: on_state(doc, &widgets),
                widgets,
            })
        }
        Some(other) => unsupported(String::from_utf8_lossy(other).into_owned(), widgets),
        None => unsupported("untyped".into(), widgets),
    }
}

/// First non-`Off` key of the widgets' normal appearance dictionary.
fn on_state(doc: &Document, widgets: &[ObjectId]) -> String {
    widgets
        .iter()
        .filter_map(|w| doc.get_dictionary(*w).ok())
        .filter_map(|w| w.get(b"AP").ok().and_then(|o| resolve(doc, o)))
        .filter_map(|ap| ap.as_dict().ok())
        .filter_map(|ap| ap.get(b"N").ok().and_then(|o| resolve(doc, o)))
        .filter_map(|n| n.as_dict().ok())
        .flat_map(|states| states.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>())
        .find(|k| k.as_slice() != b"Off")
        .map(|k| String::from_utf8_lossy(&k).into_owned())
        .unwrap_or_else(|| "Yes".to_string())
}

/// Follow one level of indirection.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// The catalog's `/AcroForm` dictionary, direct or indirect.
pub(crate) fn acro_form(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc.catalog().ok()?;
    resolve(doc, catalog.get(b"AcroForm").ok()?)?.as_dict().ok()
}

/// Mutable access to the `/AcroForm` dictionary wherever it lives.
pub(crate) fn acro_form_mut(doc: &mut Document) -> Option<&mut Dictionary> {
    let root_id = doc.trailer.get(b"Root").ok()?.as_reference().ok()?;
    let indirect = match doc.get_dictionary(root_id).ok()?.get(b"AcroForm").ok()? {
        Object::Reference(id) => Some(*id),
        _ => None,
    };
    match indirect {
        Some(id) => doc.get_dictionary_mut(id).ok(),
        None => doc
            .get_dictionary_mut(root_id)
            .ok()?
            .get_mut(b"AcroForm")
            .ok()?
            .as_dict_mut()
            .ok(),
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, else PDFDocEncoding).
pub(crate) fn text_string(doc: &Document, obj: &Object) -> Option<String> {
    match resolve(doc, obj)? {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

pub(crate) fn decode_text(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    // PDFDocEncoding matches Latin-1 for everything a form name or value
    // realistically contains.
    bytes.iter().map(|&b| b as char).collect()
}
