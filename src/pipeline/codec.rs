//! PDF codec: bytes ⇄ an editable in-memory object graph.
//!
//! ## Why lopdf?
//!
//! Signing mutates the document (field values, page content, resources) and
//! writes it back out. lopdf exposes the raw object graph in pure Rust, so the
//! whole pipeline runs in-process on a byte buffer with no native library and
//! no temp files.
//!
//! [`DocumentHandle`] owns the [`lopdf::Document`] for one signing operation.
//! Indirect object ids never leave the crate; callers see pages, field names
//! and values only. [`DocumentHandle::serialize`] consumes the handle so a
//! document cannot be edited after its bytes were produced.

use crate::error::{CodecError, EmbedError, FlattenError};
use crate::output::PdfSummary;
use crate::pipeline::fields::{self, FormField};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// How far into the buffer the `%PDF-` marker may appear.
const HEADER_SCAN_BYTES: usize = 1024;

/// Failure while editing a loaded document.
///
/// Stage-specific errors ([`EmbedError`], [`FlattenError`]) are built from
/// this so page-editing helpers can be shared between stages.
#[derive(Debug)]
pub(crate) struct EditError(pub(crate) String);

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<lopdf::Error> for EditError {
    fn from(e: lopdf::Error) -> Self {
        EditError(e.to_string())
    }
}

impl From<EditError> for EmbedError {
    fn from(e: EditError) -> Self {
        EmbedError::Malformed { detail: e.0 }
    }
}

impl From<EditError> for FlattenError {
    fn from(e: EditError) -> Self {
        FlattenError::Malformed { detail: e.0 }
    }
}

/// A loaded PDF, exclusively owned by one signing operation.
pub struct DocumentHandle {
    doc: Document,
    /// Standard 14 font objects already added to this document, by base font.
    standard_fonts: HashMap<String, ObjectId>,
}

impl fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("version", &self.doc.version)
            .field("objects", &self.doc.objects.len())
            .finish()
    }
}

/// Parse `bytes` into an editable document.
///
/// # Errors
/// [`CodecError::Malformed`] when the buffer has no `%PDF-` header, the
/// container cannot be parsed, it has no catalog, or it stays encrypted.
pub fn load(bytes: &[u8]) -> Result<DocumentHandle, CodecError> {
    if !has_pdf_header(bytes) {
        return Err(CodecError::Malformed {
            detail: "missing %PDF header".into(),
        });
    }

    let doc = Document::load_mem(bytes).map_err(|e| CodecError::Malformed {
        detail: e.to_string(),
    })?;
    if doc.is_encrypted() {
        return Err(CodecError::Malformed {
            detail: "encrypted documents are not supported".into(),
        });
    }
    doc.catalog().map_err(|e| CodecError::Malformed {
        detail: format!("no document catalog: {e}"),
    })?;

    info!(
        "PDF loaded: {} bytes, version {}, {} objects",
        bytes.len(),
        doc.version,
        doc.objects.len()
    );
    Ok(DocumentHandle {
        doc,
        standard_fonts: HashMap::new(),
    })
}

/// `true` when `%PDF-` occurs within the first [`HEADER_SCAN_BYTES`] bytes.
pub(crate) fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SCAN_BYTES)];
    window.windows(5).any(|w| w == b"%PDF-")
}

impl DocumentHandle {
    // ── Inspection ───────────────────────────────────────────────────────

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// All terminal form fields, in form-tree order.
    pub fn fields(&self) -> Vec<FormField> {
        fields::collect(&self.doc)
    }

    /// Look up a field by its fully qualified name.
    pub fn field(&self, name: &str) -> Option<FormField> {
        self.fields().into_iter().find(|f| f.name() == name)
    }

    /// Number of interactive fields. Zero once the form was flattened.
    pub fn field_count(&self) -> usize {
        self.fields().len()
    }

    /// Current value of a text field.
    pub fn text_value(&self, name: &str) -> Option<String> {
        match self.field(name)? {
            FormField::TextField(t) => t.value().map(str::to_string),
            _ => None,
        }
    }

    /// Whether a check box is on. `None` if `name` is not a check box.
    pub fn is_checked(&self, name: &str) -> Option<bool> {
        match self.field(name)? {
            FormField::CheckBox(c) => Some(c.is_checked()),
            _ => None,
        }
    }

    pub fn has_acro_form(&self) -> bool {
        fields::acro_form(&self.doc).is_some()
    }

    /// Strings shown by text operators directly in a page's content streams
    /// (1-indexed page number). Text inside form XObjects is not included.
    pub fn page_text(&self, page_number: u32) -> Result<Vec<String>, CodecError> {
        let Some(page_id) = self.doc.get_pages().get(&page_number).copied() else {
            return Ok(Vec::new());
        };
        let malformed = |e: lopdf::Error| CodecError::Malformed {
            detail: format!("page {page_number} content: {e}"),
        };
        let raw = self.doc.get_page_content(page_id).map_err(malformed)?;
        let content = Content::decode(&raw).map_err(malformed)?;

        let mut out = Vec::new();
        for op in &content.operations {
            match op.operator.as_str() {
                "Tj" | "'" | "\"" => {
                    if let Some(Object::String(bytes, _)) = op.operands.last() {
                        out.push(fields::decode_text(bytes));
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = op.operands.first() {
                        let joined: String = items
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => Some(fields::decode_text(bytes)),
                                _ => None,
                            })
                            .collect();
                        out.push(joined);
                    }
                }
                _ => {}
            }
        }
        Ok(out)
    }

    /// Document-level facts for logging and the CLI `--inspect` mode.
    pub fn summary(&self) -> PdfSummary {
        let info = self
            .doc
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|o| fields::resolve(&self.doc, o))
            .and_then(|o| o.as_dict().ok());
        let get = |key: &[u8]| {
            info.and_then(|d| d.get(key).ok())
                .and_then(|o| fields::text_string(&self.doc, o))
                .filter(|s| !s.is_empty())
        };
        PdfSummary {
            title: get(b"Title"),
            author: get(b"Author"),
            producer: get(b"Producer"),
            pdf_version: self.doc.version.clone(),
            page_count: self.page_count(),
            field_count: self.field_count(),
        }
    }

    // ── Serialisation ────────────────────────────────────────────────────

    /// Write the document out, consuming the handle.
    pub fn serialize(self) -> Result<Vec<u8>, CodecError> {
        self.serialize_with_limit(usize::MAX)
    }

    /// Write the document out, failing if it exceeds `max_bytes`.
    pub fn serialize_with_limit(mut self, max_bytes: usize) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| CodecError::IoLimit {
                detail: e.to_string(),
            })?;
        if buf.len() > max_bytes {
            return Err(CodecError::IoLimit {
                detail: format!("serialized PDF is {} bytes, limit is {max_bytes}", buf.len()),
            });
        }
        debug!("Serialized PDF: {} bytes", buf.len());
        Ok(buf)
    }

    // ── Page editing (crate-internal) ────────────────────────────────────

    pub(crate) fn document(&self) -> &Document {
        &self.doc
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub(crate) fn first_page(&self) -> Option<ObjectId> {
        self.doc.get_pages().values().next().copied()
    }

    pub(crate) fn page_ids(&self) -> Vec<ObjectId> {
        self.doc.get_pages().values().copied().collect()
    }

    /// Lower-left and upper-right corners of the visible page area
    /// (`/CropBox`, else `/MediaBox`, both inheritable). Defaults to US Letter.
    pub(crate) fn page_box(&self, page_id: ObjectId) -> [f32; 4] {
        [b"CropBox".as_slice(), b"MediaBox".as_slice()]
            .iter()
            .find_map(|key| {
                inherited_attribute(&self.doc, page_id, key)
                    .and_then(|o| fields::resolve(&self.doc, o))
                    .and_then(rect_of)
            })
            .unwrap_or([0.0, 0.0, 612.0, 792.0])
    }

    /// Map every annotation id to the page whose `/Annots` lists it.
    pub(crate) fn annotation_pages(&self) -> HashMap<ObjectId, ObjectId> {
        let mut map = HashMap::new();
        for page_id in self.page_ids() {
            for annot in self.annotations(page_id) {
                if let Object::Reference(id) = annot {
                    map.insert(id, page_id);
                }
            }
        }
        map
    }

    /// A page's `/Annots` entries with the array itself dereferenced.
    pub(crate) fn annotations(&self, page_id: ObjectId) -> Vec<Object> {
        self.doc
            .get_dictionary(page_id)
            .ok()
            .and_then(|page| page.get(b"Annots").ok())
            .and_then(|o| fields::resolve(&self.doc, o))
            .and_then(|o| o.as_array().ok())
            .cloned()
            .unwrap_or_default()
    }

    /// Register a standard 14 font on the page and return its resource name.
    pub(crate) fn add_standard_font(
        &mut self,
        page_id: ObjectId,
        base_font: &str,
    ) -> Result<String, EditError> {
        let font_id = match self.standard_fonts.get(base_font) {
            Some(id) => *id,
            None => {
                let mut font = dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
                };
                // Symbolic fonts use their built-in encoding.
                if base_font != "ZapfDingbats" && base_font != "Symbol" {
                    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
                }
                let id = self.doc.add_object(font);
                self.standard_fonts.insert(base_font.to_string(), id);
                id
            }
        };
        self.register_resource(page_id, b"Font", "PSF", font_id)
    }

    /// Register a form XObject on the page and return its resource name.
    pub(crate) fn add_xobject(
        &mut self,
        page_id: ObjectId,
        xobject_id: ObjectId,
    ) -> Result<String, EditError> {
        self.register_resource(page_id, b"XObject", "PSX", xobject_id)
    }

    /// Append `operations` to the page, isolated from the existing content by
    /// a `q … Q` pair wrapped around everything that was already there.
    pub(crate) fn append_page_content(
        &mut self,
        page_id: ObjectId,
        operations: Vec<Operation>,
    ) -> Result<(), EditError> {
        let body = Content { operations }.encode()?;
        // Streams are concatenated without separators, hence the leading newline.
        let mut closing = b"\nQ\n".to_vec();
        closing.extend_from_slice(&body);

        let existing: Vec<Object> = match self.doc.get_dictionary(page_id)?.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.doc.get_object(*id)? {
                Object::Array(items) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        let open_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let close_id = self.doc.add_object(Stream::new(Dictionary::new(), closing));

        let mut contents = Vec::with_capacity(existing.len() + 2);
        contents.push(Object::Reference(open_id));
        contents.extend(existing);
        contents.push(Object::Reference(close_id));
        self.doc
            .get_dictionary_mut(page_id)?
            .set("Contents", Object::Array(contents));
        Ok(())
    }

    fn register_resource(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
        prefix: &str,
        target: ObjectId,
    ) -> Result<String, EditError> {
        let entries = self.resource_category_mut(page_id, category)?;
        let existing = entries.iter().find_map(|(name, value)| match value {
            Object::Reference(id) if *id == target => Some(String::from_utf8_lossy(name).into_owned()),
            _ => None,
        });
        if let Some(name) = existing {
            return Ok(name);
        }
        let name = unique_name(entries, prefix);
        entries.set(name.clone(), Object::Reference(target));
        Ok(name)
    }

    /// The page's `/Resources /<category>` dictionary as a direct, page-owned
    /// dictionary. Inherited or shared resources are copied onto the page
    /// first so other pages are never affected.
    fn resource_category_mut(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
    ) -> Result<&mut Dictionary, EditError> {
        self.materialise_resources(page_id)?;

        let replacement = {
            let resources = self
                .doc
                .get_dictionary(page_id)?
                .get(b"Resources")?
                .as_dict()?;
            match resources.get(category) {
                Ok(Object::Dictionary(_)) => None,
                Ok(Object::Reference(id)) => Some(self.doc.get_dictionary(*id)?.clone()),
                _ => Some(Dictionary::new()),
            }
        };

        let resources = self
            .doc
            .get_dictionary_mut(page_id)?
            .get_mut(b"Resources")?
            .as_dict_mut()?;
        if let Some(dict) = replacement {
            resources.set(category.to_vec(), Object::Dictionary(dict));
        }
        Ok(resources.get_mut(category)?.as_dict_mut()?)
    }

    fn materialise_resources(&mut self, page_id: ObjectId) -> Result<(), EditError> {
        let replacement = match self.doc.get_dictionary(page_id)?.get(b"Resources") {
            Ok(Object::Dictionary(_)) => return Ok(()),
            Ok(Object::Reference(id)) => self.doc.get_dictionary(*id)?.clone(),
            _ => inherited_attribute(&self.doc, page_id, b"Resources")
                .and_then(|o| fields::resolve(&self.doc, o))
                .and_then(|o| o.as_dict().ok())
                .cloned()
                .unwrap_or_default(),
        };
        self.doc
            .get_dictionary_mut(page_id)?
            .set("Resources", Object::Dictionary(replacement));
        Ok(())
    }
}

/// Look up an inheritable page attribute, walking `/Parent` links.
pub(crate) fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    for _ in 0..64 {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok());
    }
    None
}

fn unique_name(dict: &Dictionary, prefix: &str) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{prefix}{n}");
        if !dict.has(candidate.as_bytes()) {
            return candidate;
        }
        n += 1;
    }
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// A normalised `[llx, lly, urx, ury]` rectangle.
pub(crate) fn rect_of(obj: &Object) -> Option<[f32; 4]> {
    let items = obj.as_array().ok()?;
    if items.len() != 4 {
        return None;
    }
    let v: Vec<f32> = items.iter().filter_map(number).collect();
    if v.len() != 4 {
        return None;
    }
    Some([v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])])
}

/// `BT /font size Tf x y Td (text) Tj ET`.
pub(crate) fn show_text(font: &str, size: f32, x: f32, y: f32, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font.as_bytes().to_vec()), Object::Real(size)],
        ),
        Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}
