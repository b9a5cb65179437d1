use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};

const PAGE_HEIGHT: f32 = 792.0;
const FONT_SIZE: f32 = 10.0;

/// Text line whose box starts at `(x, top)` in top-left page coordinates.
pub struct FixtureText<'a> {
    pub text: &'a str,
    pub x: f32,
    pub top: f32,
}

/// JPEG-tagged image placed at `[x0, y0, x1, y1]` in top-left page coordinates.
pub struct FixtureImage<'a> {
    pub bytes: &'a [u8],
    pub rect: [f32; 4],
}

#[derive(Default)]
pub struct FixturePage<'a> {
    pub texts: Vec<FixtureText<'a>>,
    pub images: Vec<FixtureImage<'a>>,
}

pub fn text(text: &str, x: f32, top: f32) -> FixtureText<'_> {
    FixtureText { text, x, top }
}

pub fn image(bytes: &[u8], rect: [f32; 4]) -> FixtureImage<'_> {
    FixtureImage { bytes, rect }
}

pub fn create_catalog_pdf(
    path: &Path,
    pages: &[FixturePage<'_>],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut page_ids = Vec::new();
    for page in pages {
        let mut operations = Vec::new();
        let mut xobjects = Dictionary::new();

        for (index, placed) in page.images.iter().enumerate() {
            let name = format!("Im{index}");
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => 8,
                    "Height" => 8,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                placed.bytes.to_vec(),
            ));
            xobjects.set(name.as_str(), image_id);

            let [x0, y0, x1, y1] = placed.rect;
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                vec![
                    (x1 - x0).into(),
                    0.into(),
                    0.into(),
                    (y1 - y0).into(),
                    x0.into(),
                    (PAGE_HEIGHT - y1).into(),
                ],
            ));
            operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
            operations.push(Operation::new("Q", vec![]));
        }

        for line in &page.texts {
            let baseline = PAGE_HEIGHT - line.top - 0.8 * FONT_SIZE;
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]));
            operations.push(Operation::new("Td", vec![line.x.into(), baseline.into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(line.text)]));
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => xobjects,
            },
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| (*id).into()).collect::<Vec<_>>(),
            "Count" => i64::try_from(page_ids.len())?,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(path)?;
    Ok(())
}
