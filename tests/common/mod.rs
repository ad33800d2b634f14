//! PDF fixtures built in memory with lopdf.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Object {
    Object::Array(vec![x0.into(), y0.into(), x1.into(), y1.into()])
}

fn body(text: &str) -> Vec<u8> {
    Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    }
    .encode()
    .expect("encode content")
}

fn save(mut doc: Document, pages_id: ObjectId, kids: Vec<ObjectId>, acro_form: Option<Object>) -> Vec<u8> {
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => count,
        }),
    );
    let mut catalog = dictionary! { "Type" => "Catalog", "Pages" => pages_id };
    if let Some(form) = acro_form {
        catalog.set("AcroForm", form);
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);
    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save");
    buf
}

fn page(doc: &mut Document, pages_id: ObjectId, text: &str) -> ObjectId {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content_id = doc.add_object(Stream::new(dictionary! {}, body(text)));
    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => rect(0, 0, 612, 792),
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        "Contents" => content_id,
    })
}

/// `pages` letter pages without any form.
pub fn blank_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let kids = (1..=pages)
        .map(|n| page(&mut doc, pages_id, &format!("Page {n}")))
        .collect();
    save(doc, pages_id, kids, None)
}

/// A page tree with no kids.
pub fn zero_page_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    save(doc, pages_id, Vec::new(), None)
}

/// One page with a `fullName` text field and an `agree` check box.
pub fn form_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_id = page(&mut doc, pages_id, "Lease agreement");

    let full_name = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal("fullName"),
        "Rect" => rect(100, 600, 300, 620),
        "P" => page_id,
        "DA" => Object::string_literal("/Helv 12 Tf 0 g"),
    });
    let on = doc.add_object(Stream::new(
        dictionary! { "Type" => "XObject", "Subtype" => "Form", "BBox" => rect(0, 0, 12, 12) },
        b"0 g 1 1 10 10 re f".to_vec(),
    ));
    let off = doc.add_object(Stream::new(
        dictionary! { "Type" => "XObject", "Subtype" => "Form", "BBox" => rect(0, 0, 12, 12) },
        Vec::new(),
    ));
    let agree = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Btn",
        "T" => Object::string_literal("agree"),
        "V" => "Off",
        "AS" => "Off",
        "Rect" => rect(100, 570, 112, 582),
        "P" => page_id,
        "AP" => dictionary! { "N" => dictionary! { "Yes" => on, "Off" => off } },
    });

    if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
        dict.set("Annots", vec![Object::Reference(full_name), Object::Reference(agree)]);
    }
    let form = dictionary! {
        "Fields" => vec![Object::Reference(full_name), Object::Reference(agree)],
        "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
    };
    save(doc, pages_id, vec![page_id], Some(Object::Dictionary(form)))
}
