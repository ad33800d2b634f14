//! Form flattening: burn widget appearances into page content.
//!
//! After flattening the document has no interactive form left. What each
//! visible widget showed is drawn directly onto its page:
//!
//! | widget | drawn as |
//! |--------|----------|
//! | text field with a value | fresh Helvetica text, clipped to the widget |
//! | anything with a normal appearance | that appearance, placed as a form XObject |
//! | checked box without an appearance | a ZapfDingbats check mark |
//! | choice field without an appearance | its value as text |
//!
//! Text fields are always regenerated because [`crate::pipeline::fill`]
//! drops their stale `/AP`. Then every widget annotation is removed from the
//! pages, `/AcroForm` is removed from the catalog and the orphaned field and
//! widget objects are pruned.
//!
//! Flattening a document that has no form is a no-op, so running it twice
//! is the same as running it once.

use crate::error::FlattenError;
use crate::pipeline::codec::{self, DocumentHandle, EditError};
use crate::pipeline::fields::{self, FormField};
use crate::pipeline::sanitize::sanitize;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// Annotation flag: hidden (`/F` bit 2).
const F_HIDDEN: i64 = 1 << 1;
/// Annotation flag: not shown on screen (`/F` bit 6).
const F_NOVIEW: i64 = 1 << 5;
/// Field flag: multi-line text (`/Ff` bit 13).
const FF_MULTILINE: i64 = 1 << 12;

const PADDING: f32 = 2.0;
const LINE_HEIGHT: f32 = 1.15;
const AUTO_MAX_SIZE: f32 = 12.0;
const AUTO_MIN_SIZE: f32 = 4.0;
/// Helvetica ascender and descender, in text space units.
const ASCENT: f32 = 0.718;
const DESCENT: f32 = 0.207;
/// ZapfDingbats `4` (heavy check mark) advance width.
const CHECK_GLYPH_WIDTH: f32 = 0.846;

/// Flatten the interactive form into static page content.
///
/// # Errors
/// [`FlattenError::Malformed`] when a page touched by a widget cannot be
/// edited.
pub fn flatten(handle: &mut DocumentHandle) -> Result<(), FlattenError> {
    let form_fields = handle.fields();
    let annot_pages = handle.annotation_pages();

    let mut orphans: Vec<(ObjectId, ObjectId)> = {
        let doc = handle.document();
        let owned: HashSet<ObjectId> = form_fields.iter().flat_map(|f| f.widgets().iter().copied()).collect();
        annot_pages
            .iter()
            .filter(|(id, _)| !owned.contains(*id) && is_widget(doc, **id))
            .map(|(id, page)| (*id, *page))
            .collect()
    };
    orphans.sort();

    if !handle.has_acro_form() && form_fields.is_empty() && orphans.is_empty() {
        debug!("No interactive form, nothing to flatten");
        return Ok(());
    }

    let default_da = fields::acro_form(handle.document())
        .and_then(|form| form.get(b"DA").ok())
        .and_then(|o| fields::text_string(handle.document(), o));

    let mut pending: BTreeMap<ObjectId, Vec<Operation>> = BTreeMap::new();
    let mut widgets: HashSet<ObjectId> = HashSet::new();
    let mut drawn = 0usize;

    for field in &form_fields {
        for &widget in field.widgets() {
            widgets.insert(widget);
            let Some(page) = page_of(handle, &annot_pages, widget) else {
                debug!("Widget of '{}' is on no page, dropping it", field.name());
                continue;
            };
            let ops = widget_operations(handle, Some(field), widget, page, default_da.as_deref())?;
            if !ops.is_empty() {
                drawn += 1;
                pending.entry(page).or_default().extend(ops);
            }
        }
    }
    for (widget, page) in orphans {
        widgets.insert(widget);
        let ops = widget_operations(handle, None, widget, page, default_da.as_deref())?;
        if !ops.is_empty() {
            drawn += 1;
            pending.entry(page).or_default().extend(ops);
        }
    }

    for (page, ops) in pending {
        handle.append_page_content(page, ops)?;
    }
    let removed = strip_widgets(handle, &widgets)?;
    remove_acro_form(handle.document_mut());
    let pruned = handle.document_mut().prune_objects();

    info!(
        "Form flattened: {} fields, {} widgets drawn, {} annotations removed, {} objects pruned",
        form_fields.len(),
        drawn,
        removed,
        pruned.len()
    );
    Ok(())
}

// ── Per-widget drawing ───────────────────────────────────────────────────

fn widget_operations(
    handle: &mut DocumentHandle,
    field: Option<&FormField>,
    widget: ObjectId,
    page: ObjectId,
    default_da: Option<&str>,
) -> Result<Vec<Operation>, EditError> {
    let doc = handle.document();
    let dict = doc.get_dictionary(widget)?;
    let flags = dict.get(b"F").ok().and_then(|o| o.as_i64().ok()).unwrap_or(0);
    if flags & (F_HIDDEN | F_NOVIEW) != 0 {
        return Ok(Vec::new());
    }
    let Some(rect) = dict
        .get(b"Rect")
        .ok()
        .and_then(|o| fields::resolve(doc, o))
        .and_then(codec::rect_of)
    else {
        return Ok(Vec::new());
    };
    if rect[2] - rect[0] <= 0.0 || rect[3] - rect[1] <= 0.0 {
        return Ok(Vec::new());
    }

    match field {
        Some(FormField::TextField(text)) => {
            // An existing appearance already shows the value; only fields
            // written by `fill` (which drops /AP) need a generated one.
            let ops = place_appearance(handle, widget, page, rect)?;
            if !ops.is_empty() {
                return Ok(ops);
            }
            let value = text.value().map(sanitize).unwrap_or_default();
            if value.trim().is_empty() {
                return Ok(ops);
            }
            let style = TextStyle::for_widget(handle.document(), widget, default_da);
            text_operations(handle, page, rect, &style, &value)
        }
        Some(FormField::CheckBox(check)) => {
            let ops = place_appearance(handle, widget, page, rect)?;
            if ops.is_empty() && check.is_checked() {
                check_mark(handle, page, rect)
            } else {
                Ok(ops)
            }
        }
        Some(FormField::Unsupported(other)) => {
            let ops = place_appearance(handle, widget, page, rect)?;
            if !ops.is_empty() || other.field_type() != "Ch" {
                return Ok(ops);
            }
            let value = choice_value(handle.document(), widget);
            if value.trim().is_empty() {
                return Ok(ops);
            }
            let style = TextStyle::for_widget(handle.document(), widget, default_da);
            text_operations(handle, page, rect, &style, &value)
        }
        None => place_appearance(handle, widget, page, rect),
    }
}

/// Place the widget's normal appearance stream, scaled into `rect`.
fn place_appearance(
    handle: &mut DocumentHandle,
    widget: ObjectId,
    page: ObjectId,
    rect: [f32; 4],
) -> Result<Vec<Operation>, EditError> {
    let Some(stream_id) = normal_appearance(handle.document(), widget) else {
        return Ok(Vec::new());
    };
    let (bbox, matrix) = {
        let doc = handle.document();
        let stream = doc.get_object(stream_id)?.as_stream()?;
        let bbox = stream
            .dict
            .get(b"BBox")
            .ok()
            .and_then(|o| fields::resolve(doc, o))
            .and_then(codec::rect_of);
        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| fields::resolve(doc, o))
            .and_then(matrix_of)
            .unwrap_or([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        (bbox, matrix)
    };
    let Some(bbox) = bbox else {
        return Ok(Vec::new());
    };
    let [bx0, by0, bx1, by1] = transformed_bbox(bbox, matrix);
    if bx1 - bx0 <= 0.0 || by1 - by0 <= 0.0 {
        return Ok(Vec::new());
    }

    if let Object::Stream(stream) = handle.document_mut().get_object_mut(stream_id)? {
        if !stream.dict.has(b"Subtype") {
            stream.dict.set("Type", Object::Name(b"XObject".to_vec()));
            stream.dict.set("Subtype", Object::Name(b"Form".to_vec()));
        }
    }
    let name = handle.add_xobject(page, stream_id)?;

    let [x0, y0, x1, y1] = rect;
    let sx = (x1 - x0) / (bx1 - bx0);
    let sy = (y1 - y0) / (by1 - by0);
    Ok(vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Real(sx),
                0.into(),
                0.into(),
                Object::Real(sy),
                Object::Real(x0 - bx0 * sx),
                Object::Real(y0 - by0 * sy),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.into_bytes())]),
        Operation::new("Q", vec![]),
    ])
}

/// The widget's `/AP /N` stream, picking the `/AS` state when `/N` is a
/// dictionary of states.
fn normal_appearance(doc: &Document, widget: ObjectId) -> Option<ObjectId> {
    let dict = doc.get_dictionary(widget).ok()?;
    let ap = fields::resolve(doc, dict.get(b"AP").ok()?)?.as_dict().ok()?;
    let pick = |states: &lopdf::Dictionary| {
        let state = dict.get(b"AS").ok()?.as_name().ok()?;
        states.get(state).ok()?.as_reference().ok()
    };
    match ap.get(b"N").ok()? {
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Stream(_) => Some(*id),
            Object::Dictionary(states) => pick(states),
            _ => None,
        },
        Object::Dictionary(states) => pick(states),
        _ => None,
    }
}

fn check_mark(
    handle: &mut DocumentHandle,
    page: ObjectId,
    rect: [f32; 4],
) -> Result<Vec<Operation>, EditError> {
    let font = handle.add_standard_font(page, "ZapfDingbats")?;
    let [x0, y0, x1, y1] = rect;
    let (w, h) = (x1 - x0, y1 - y0);
    let size = w.min(h) * 0.8;
    let x = x0 + (w - CHECK_GLYPH_WIDTH * size) / 2.0;
    let y = y0 + (h - ASCENT * size) / 2.0;

    let mut ops = vec![Operation::new("q", vec![]), Operation::new("g", vec![0.into()])];
    ops.extend(codec::show_text(&font, size, x, y, "4"));
    ops.push(Operation::new("Q", vec![]));
    Ok(ops)
}

// ── Text appearances ─────────────────────────────────────────────────────

/// How a text widget wants its value drawn, from `/DA`, `/Q` and `/Ff`.
#[derive(Debug, Clone)]
struct TextStyle {
    /// Font size; `0` means fit to the widget.
    size: f32,
    color: Option<Operation>,
    /// 0 left, 1 centred, 2 right.
    quadding: i64,
    multiline: bool,
}

impl TextStyle {
    fn for_widget(doc: &Document, widget: ObjectId, default_da: Option<&str>) -> Self {
        let da = codec::inherited_attribute(doc, widget, b"DA")
            .and_then(|o| fields::text_string(doc, o))
            .or_else(|| default_da.map(str::to_string))
            .unwrap_or_default();
        let quadding = codec::inherited_attribute(doc, widget, b"Q")
            .or_else(|| fields::acro_form(doc).and_then(|form| form.get(b"Q").ok()))
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);
        let flags = codec::inherited_attribute(doc, widget, b"Ff")
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);

        let mut style = Self::parse_da(&da);
        style.quadding = quadding;
        style.multiline = flags & FF_MULTILINE != 0;
        style
    }

    /// Pull font size and fill colour out of a default appearance string
    /// such as `/Helv 12 Tf 0 g`. The named font is ignored: values are
    /// always drawn in Helvetica.
    fn parse_da(da: &str) -> Self {
        let mut style = TextStyle {
            size: 0.0,
            color: None,
            quadding: 0,
            multiline: false,
        };
        let Ok(content) = Content::decode(da.as_bytes()) else {
            return style;
        };
        for op in content.operations {
            match (op.operator.as_str(), op.operands.len()) {
                ("Tf", 2) => {
                    style.size = codec::number(&op.operands[1]).unwrap_or(0.0).max(0.0);
                }
                ("g", 1) | ("rg", 3) | ("k", 4) => style.color = Some(op),
                _ => {}
            }
        }
        style
    }
}

fn text_operations(
    handle: &mut DocumentHandle,
    page: ObjectId,
    rect: [f32; 4],
    style: &TextStyle,
    text: &str,
) -> Result<Vec<Operation>, EditError> {
    let font = handle.add_standard_font(page, "Helvetica")?;
    let [x0, y0, x1, y1] = rect;
    let (w, h) = (x1 - x0, y1 - y0);
    let available = (w - 2.0 * PADDING).max(1.0);

    let (size, lines) = if style.multiline {
        let size = if style.size > 0.0 { style.size } else { AUTO_MAX_SIZE };
        (size, wrap(text, available, size))
    } else {
        let size = if style.size > 0.0 {
            style.size
        } else {
            auto_size(text, w, h)
        };
        (size, vec![text.to_string()])
    };

    let first_baseline = if style.multiline {
        y1 - PADDING - ASCENT * size
    } else {
        y0 + (h - (ASCENT + DESCENT) * size) / 2.0 + DESCENT * size
    };

    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "re",
            vec![Object::Real(x0), Object::Real(y0), Object::Real(w), Object::Real(h)],
        ),
        Operation::new("W", vec![]),
        Operation::new("n", vec![]),
        style
            .color
            .clone()
            .unwrap_or_else(|| Operation::new("g", vec![0.into()])),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font.into_bytes()), Object::Real(size)],
        ),
    ];

    // Td is relative to the start of the previous line.
    let (mut cx, mut cy) = (0.0f32, 0.0f32);
    for (i, line) in lines.iter().enumerate() {
        let width = text_width(line, size);
        let x = match style.quadding {
            1 => x0 + (w - width) / 2.0,
            2 => x1 - PADDING - width,
            _ => x0 + PADDING,
        };
        let y = first_baseline - i as f32 * size * LINE_HEIGHT;
        ops.push(Operation::new(
            "Td",
            vec![Object::Real(x - cx), Object::Real(y - cy)],
        ));
        ops.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
        (cx, cy) = (x, y);
    }
    ops.push(Operation::new("ET", vec![]));
    ops.push(Operation::new("Q", vec![]));
    Ok(ops)
}

/// Largest size up to [`AUTO_MAX_SIZE`] at which one line of `text` fits.
fn auto_size(text: &str, w: f32, h: f32) -> f32 {
    let by_height = (h - 2.0 * PADDING) / LINE_HEIGHT;
    let units = text_width(text, 1.0);
    let by_width = if units > 0.0 {
        (w - 2.0 * PADDING) / units
    } else {
        AUTO_MAX_SIZE
    };
    by_height.min(by_width).min(AUTO_MAX_SIZE).max(AUTO_MIN_SIZE)
}

/// Greedy word wrap. Words wider than the box get a line of their own and
/// are clipped.
fn wrap(text: &str, available: f32, size: f32) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if text_width(&candidate, size) <= available {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Rendered width of `text` in Helvetica at `size`.
fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text.bytes().map(helvetica_width).sum();
    units as f32 * size / 1000.0
}

fn helvetica_width(byte: u8) -> u32 {
    // Advance widths for 0x20..=0x7E from the Helvetica AFM.
    const WIDTHS: [u16; 95] = [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
        1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
        667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
        333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
        556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70
    ];
    match byte {
        0x20..=0x7E => u32::from(WIDTHS[usize::from(byte - 0x20)]),
        _ => 556,
    }
}

// ── Geometry ─────────────────────────────────────────────────────────────

fn matrix_of(obj: &Object) -> Option<[f32; 6]> {
    let items = obj.as_array().ok()?;
    let v: Vec<f32> = items.iter().filter_map(codec::number).collect();
    <[f32; 6]>::try_from(v).ok()
}

/// Bounding box of `bbox` after applying the form matrix.
fn transformed_bbox(bbox: [f32; 4], m: [f32; 6]) -> [f32; 4] {
    let [a, b, c, d, e, f] = m;
    let corners = [
        (bbox[0], bbox[1]),
        (bbox[2], bbox[1]),
        (bbox[0], bbox[3]),
        (bbox[2], bbox[3]),
    ];
    let mut out = [f32::MAX, f32::MAX, f32::MIN, f32::MIN];
    for (x, y) in corners {
        let tx = a * x + c * y + e;
        let ty = b * x + d * y + f;
        out[0] = out[0].min(tx);
        out[1] = out[1].min(ty);
        out[2] = out[2].max(tx);
        out[3] = out[3].max(ty);
    }
    out
}

// ── Form removal ─────────────────────────────────────────────────────────

fn page_of(
    handle: &DocumentHandle,
    annot_pages: &HashMap<ObjectId, ObjectId>,
    widget: ObjectId,
) -> Option<ObjectId> {
    if let Some(page) = annot_pages.get(&widget) {
        return Some(*page);
    }
    let page = handle
        .document()
        .get_dictionary(widget)
        .ok()?
        .get(b"P")
        .ok()?
        .as_reference()
        .ok()?;
    handle.page_ids().contains(&page).then_some(page)
}

fn is_widget(doc: &Document, id: ObjectId) -> bool {
    doc.get_dictionary(id)
        .ok()
        .and_then(|d| d.get(b"Subtype").ok())
        .and_then(|o| o.as_name().ok())
        == Some(b"Widget".as_slice())
}

fn choice_value(doc: &Document, widget: ObjectId) -> String {
    let raw = match codec::inherited_attribute(doc, widget, b"V").and_then(|o| fields::resolve(doc, o)) {
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|o| fields::text_string(doc, o))
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => fields::text_string(doc, other).unwrap_or_default(),
        None => String::new(),
    };
    sanitize(&raw)
}

/// Drop widget annotations from every page. Returns how many were removed.
fn strip_widgets(handle: &mut DocumentHandle, widgets: &HashSet<ObjectId>) -> Result<usize, EditError> {
    let mut removed = 0;
    for page in handle.page_ids() {
        let annots = handle.annotations(page);
        if annots.is_empty() {
            continue;
        }
        let keep: Vec<Object> = {
            let doc = handle.document();
            annots
                .iter()
                .filter(|annot| match annot {
                    Object::Reference(id) => !widgets.contains(id) && !is_widget(doc, *id),
                    Object::Dictionary(d) => {
                        d.get(b"Subtype").ok().and_then(|o| o.as_name().ok()) != Some(b"Widget".as_slice())
                    }
                    _ => true,
                })
                .cloned()
                .collect()
        };
        if keep.len() == annots.len() {
            continue;
        }
        removed += annots.len() - keep.len();
        let page_dict = handle.document_mut().get_dictionary_mut(page)?;
        if keep.is_empty() {
            page_dict.remove(b"Annots");
        } else {
            page_dict.set("Annots", Object::Array(keep));
        }
    }
    Ok(removed)
}

fn remove_acro_form(doc: &mut Document) {
    let Some(root) = doc.trailer.get(b"Root").ok().and_then(|o| o.as_reference().ok()) else {
        return;
    };
    if let Ok(catalog) = doc.get_dictionary_mut(root) {
        catalog.remove(b"AcroForm");
    }
}
