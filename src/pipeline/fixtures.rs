//! In-memory PDF fixtures for unit tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

fn text_content(text: &str) -> Vec<u8> {
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
    .expect("encode fixture content")
}

fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Object {
    Object::Array(vec![x0.into(), y0.into(), x1.into(), y1.into()])
}

fn finish(mut doc: Document, pages_id: ObjectId, kids: Vec<ObjectId>, acro_form: Option<Object>) -> Vec<u8> {
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => count,
        }),
    );
    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if let Some(form) = acro_form {
        catalog.set("AcroForm", form);
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save fixture");
    buf
}

/// `pages` letter-sized pages, each showing `Page N` with a shared Helvetica
/// resource inherited from the page tree.
pub(crate) fn blank_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids = (1..=pages)
        .map(|n| {
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, text_content(&format!("Page {n}"))));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => rect(0, 0, 612, 792),
                "Resources" => resources_id,
                "Contents" => content_id,
            })
        })
        .collect();
    finish(doc, pages_id, kids, None)
}

/// A page tree with no kids.
pub(crate) fn zero_page_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    finish(doc, pages_id, Vec::new(), None)
}

/// One page carrying six fields:
///
/// | name | type | notes |
/// |------|------|-------|
/// | `fullName` | Tx | merged widget, empty |
/// | `agree` | Btn | check box, `Yes`/`Off` appearances, off |
/// | `country` | Ch | value `US`, no appearance |
/// | `address.city` | Tx | separate widget kid |
/// | `zip` | Tx | `MaxLen 5`, centred |
/// | `internalRef` | Tx | hidden widget with a value |
pub(crate) fn form_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content_id =
        doc.add_object(Stream::new(dictionary! {}, text_content("Application form")));

    let full_name = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal("fullName"),
        "Rect" => rect(100, 600, 300, 620),
        "P" => page_id,
        "DA" => Object::string_literal("/Helv 12 Tf 0 g"),
    });

    let yes_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => rect(0, 0, 12, 12),
        },
        b"0 g 1 1 10 10 re f".to_vec(),
    ));
    let off_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => rect(0, 0, 12, 12),
        },
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
        "AP" => dictionary! {
            "N" => dictionary! { "Yes" => yes_id, "Off" => off_id },
        },
    });

    let country = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Ch",
        "T" => Object::string_literal("country"),
        "V" => Object::string_literal("US"),
        "Opt" => vec![Object::string_literal("US"), Object::string_literal("CA")],
        "Rect" => rect(100, 540, 200, 556),
        "P" => page_id,
    });

    let address = doc.new_object_id();
    let city = doc.new_object_id();
    let city_widget = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "Parent" => city,
        "Rect" => rect(100, 510, 300, 526),
        "P" => page_id,
    });
    doc.objects.insert(
        city,
        Object::Dictionary(dictionary! {
            "FT" => "Tx",
            "T" => Object::string_literal("city"),
            "Parent" => address,
            "Kids" => vec![Object::Reference(city_widget)],
        }),
    );
    doc.objects.insert(
        address,
        Object::Dictionary(dictionary! {
            "T" => Object::string_literal("address"),
            "Kids" => vec![Object::Reference(city)],
        }),
    );

    let zip = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal("zip"),
        "MaxLen" => 5,
        "Q" => 1,
        "Rect" => rect(100, 480, 160, 496),
        "P" => page_id,
    });

    let internal = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal("internalRef"),
        "V" => Object::string_literal("secret"),
        "F" => 2,
        "Rect" => rect(400, 20, 500, 36),
        "P" => page_id,
    });

    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => rect(0, 0, 612, 792),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
            "Contents" => content_id,
            "Annots" => vec![
                Object::Reference(full_name),
                Object::Reference(agree),
                Object::Reference(country),
                Object::Reference(city_widget),
                Object::Reference(zip),
                Object::Reference(internal),
            ],
        }),
    );

    let acro_form = dictionary! {
        "Fields" => vec![
            Object::Reference(full_name),
            Object::Reference(agree),
            Object::Reference(country),
            Object::Reference(address),
            Object::Reference(zip),
            Object::Reference(internal),
        ],
        "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
        "DR" => dictionary! {
            "Font" => dictionary! { "Helv" => font_id },
        },
    };
    finish(doc, pages_id, vec![page_id], Some(Object::Dictionary(acro_form)))
}
