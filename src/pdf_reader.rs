use std::collections::BTreeMap;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::ExtractError;
use crate::font::FontInfo;
use crate::hash::content_hash;
use crate::inline_image::{ContentSegment, InlineImage, split_inline_images};
use crate::model::{ImageRecord, PageContent, Rect, TextLine};

const ASCENT: f32 = 0.8;
const DESCENT: f32 = 0.2;
/// `TJ` adjustments (thousandths of an em) below this read as a word gap.
const WORD_GAP_ADJUSTMENT: f32 = -200.0;
const BASELINE_TOLERANCE_EMS: f32 = 0.2;
const MAX_JOIN_GAP_EMS: f32 = 1.0;
const MAX_JOIN_OVERLAP_EMS: f32 = 0.5;
const SPACE_GAP_EMS: f32 = 0.15;
const MAX_FORM_DEPTH: usize = 8;
const MAX_PAGE_TREE_DEPTH: usize = 32;
const LETTER_MEDIA_BOX: Rect = Rect::new(0.0, 0.0, 612.0, 792.0);

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

pub(crate) fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translate(tx: f32, ty: f32) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let values = operands
            .iter()
            .take(6)
            .map(number)
            .collect::<Option<Vec<_>>>()?;
        let [a, b, c, d, e, f] = values.as_slice() else {
            return None;
        };
        Some(Self {
            a: *a,
            b: *b,
            c: *c,
            d: *d,
            e: *e,
            f: *f,
        })
    }

    /// `self × other`: apply `self` first, then `other`.
    fn then(self, other: Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn vertical_scale(self) -> f32 {
        self.c.hypot(self.d)
    }
}

pub(crate) fn stream_bytes(stream: &Stream) -> Result<Vec<u8>, lopdf::Error> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content()
    } else {
        Ok(stream.content.clone())
    }
}

/// Finds `key` on the page or the nearest ancestor in the page tree.
fn inherited_attribute<'a>(
    document: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = document.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(document, value);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = document.get_dictionary(parent).ok()?;
    }
    None
}

fn media_box(document: &Document, page_id: ObjectId) -> Rect {
    let corners = inherited_attribute(document, page_id, b"MediaBox")
        .and_then(|object| object.as_array().ok())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| resolve(document, item).and_then(number))
                .collect::<Vec<_>>()
        });

    match corners.as_deref() {
        Some([x0, y0, x1, y1]) => Rect::new(x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)),
        _ => LETTER_MEDIA_BOX,
    }
}

/// Clockwise page rotation normalized to 0, 90, 180 or 270.
fn page_rotation(document: &Document, page_id: ObjectId) -> u16 {
    let degrees = inherited_attribute(document, page_id, b"Rotate")
        .and_then(|object| object.as_i64().ok())
        .unwrap_or(0);
    match degrees.rem_euclid(360) {
        90 => 90,
        180 => 180,
        270 => 270,
        _ => 0,
    }
}

/// Maps an unrotated top-left box onto the page as displayed after a
/// clockwise `/Rotate`.
fn displayed_rect(rect: Rect, media_box: Rect, rotation: u16) -> Rect {
    let width = media_box.x1 - media_box.x0;
    let height = media_box.y1 - media_box.y0;
    let turn = |x: f32, y: f32| match rotation {
        90 => (height - y, x),
        180 => (width - x, height - y),
        270 => (y, width - x),
        _ => (x, y),
    };
    let (ax, ay) = turn(rect.x0, rect.y0);
    let (bx, by) = turn(rect.x1, rect.y1);
    Rect::new(ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
}

/// Encoding from the last filter in the chain, e.g. `jpeg` for `DCTDecode`.
fn declared_format(dict: &Dictionary) -> String {
    let filter = match dict.get(b"Filter") {
        Ok(Object::Name(name)) => Some(name.as_slice()),
        Ok(Object::Array(filters)) => filters.iter().rev().find_map(|item| item.as_name().ok()),
        _ => None,
    };

    match filter {
        None => "raw".to_string(),
        Some(b"DCTDecode") => "jpeg".to_string(),
        Some(b"JPXDecode") => "jpx".to_string(),
        Some(name) => String::from_utf8_lossy(name)
            .trim_end_matches("Decode")
            .to_ascii_lowercase(),
    }
}

struct Resources<'a> {
    document: &'a Document,
    dict: Option<&'a Dictionary>,
    fonts: BTreeMap<Vec<u8>, FontInfo<'a>>,
    missing_font: FontInfo<'a>,
}

impl<'a> Resources<'a> {
    fn new(document: &'a Document, dict: Option<&'a Dictionary>) -> Self {
        let fonts = dict
            .and_then(|dict| dict.get(b"Font").ok())
            .and_then(|fonts| resolve(document, fonts))
            .and_then(|fonts| fonts.as_dict().ok())
            .map(|fonts| {
                fonts
                    .iter()
                    .filter_map(|(name, font)| {
                        let font = resolve(document, font)?.as_dict().ok()?;
                        Some((name.clone(), FontInfo::from_dict(document, font)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            document,
            dict,
            fonts,
            missing_font: FontInfo::default(),
        }
    }

    fn xobject(&self, name: &[u8]) -> Option<&'a Stream> {
        let xobjects = self.dict?.get(b"XObject").ok()?;
        let xobjects = resolve(self.document, xobjects)?.as_dict().ok()?;
        resolve(self.document, xobjects.get(name).ok()?)?
            .as_stream()
            .ok()
    }

    fn font(&self, name: Option<&[u8]>) -> &FontInfo<'a> {
        name.and_then(|name| self.fonts.get(name))
            .unwrap_or(&self.missing_font)
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TextCursor {
    matrix: Matrix,
    line_matrix: Matrix,
}

impl Default for TextCursor {
    fn default() -> Self {
        Self {
            matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
        }
    }
}

impl TextCursor {
    fn set(&mut self, matrix: Matrix) {
        self.matrix = matrix;
        self.line_matrix = matrix;
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.set(Matrix::translate(tx, ty).then(self.line_matrix));
    }

    fn advance(&mut self, tx: f32) {
        self.matrix = Matrix::translate(tx, 0.0).then(self.matrix);
    }
}

/// Interpreter state for one content stream, carried across the operator
/// runs that surround inline images.
struct StreamState {
    graphics: GraphicsState,
    saved: Vec<GraphicsState>,
    cursor: TextCursor,
}

#[derive(Debug)]
struct Fragment {
    text: String,
    bbox: Rect,
    baseline: f32,
    em: f32,
}

struct PageScanner<'a> {
    document: &'a Document,
    media_box: Rect,
    rotation: u16,
    fragments: Vec<Fragment>,
    images: Vec<ImageRecord>,
}

impl<'a> PageScanner<'a> {
    fn new(document: &'a Document, media_box: Rect, rotation: u16) -> Self {
        Self {
            document,
            media_box,
            rotation,
            fragments: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Converts a user-space box to top-left page coordinates.
    fn page_rect(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> Rect {
        let left = self.media_box.x0;
        let top = self.media_box.y1;
        Rect::new(x0 - left, top - y1, x1 - left, top - y0)
    }

    fn scan(
        &mut self,
        content: &[u8],
        resources: &Resources<'a>,
        base_ctm: Matrix,
        depth: usize,
    ) -> Result<(), ExtractError> {
        let mut state = StreamState {
            graphics: GraphicsState::new(base_ctm),
            saved: Vec::new(),
            cursor: TextCursor::default(),
        };

        for segment in split_inline_images(content)? {
            match segment {
                ContentSegment::Operators(operators) if operators.iter().all(u8::is_ascii_whitespace) => {}
                ContentSegment::Operators(operators) => {
                    for operation in &Content::decode(operators)?.operations {
                        self.apply(operation, &mut state, resources, depth)?;
                    }
                }
                ContentSegment::InlineImage(image) => {
                    let record = self.inline_image_record(&image, state.graphics.ctm);
                    self.images.push(record);
                }
            }
        }

        Ok(())
    }

    fn apply(
        &mut self,
        operation: &Operation,
        state: &mut StreamState,
        resources: &Resources<'a>,
        depth: usize,
    ) -> Result<(), ExtractError> {
        let StreamState {
            graphics,
            saved,
            cursor,
        } = state;
        let operands = operation.operands.as_slice();
        let first_number = operands.first().and_then(number);
        match operation.operator.as_str() {
            "q" => saved.push(graphics.clone()),
            "Q" => {
                if let Some(restored) = saved.pop() {
                    *graphics = restored;
                }
            }
            "cm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    graphics.ctm = matrix.then(graphics.ctm);
                }
            }
            "BT" => *cursor = TextCursor::default(),
            "Tf" => {
                graphics.font = operands
                    .first()
                    .and_then(|operand| operand.as_name().ok())
                    .map(<[u8]>::to_vec);
                if let Some(size) = operands.get(1).and_then(number) {
                    graphics.font_size = size;
                }
            }
            "Tc" => graphics.char_spacing = first_number.unwrap_or(graphics.char_spacing),
            "Tw" => graphics.word_spacing = first_number.unwrap_or(graphics.word_spacing),
            "Tz" => {
                if let Some(scale) = first_number {
                    graphics.horizontal_scale = scale / 100.0;
                }
            }
            "TL" => graphics.leading = first_number.unwrap_or(graphics.leading),
            "Tm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    cursor.set(matrix);
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (first_number, operands.get(1).and_then(number)) {
                    if operation.operator == "TD" {
                        graphics.leading = -ty;
                    }
                    cursor.next_line(tx, ty);
                }
            }
            "T*" => cursor.next_line(0.0, -graphics.leading),
            "Tj" => self.show_text(graphics, cursor, resources, operands),
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show_text(graphics, cursor, resources, items);
                }
            }
            "'" => {
                cursor.next_line(0.0, -graphics.leading);
                self.show_text(graphics, cursor, resources, operands);
            }
            "\"" => {
                if let [word_spacing, char_spacing, text] = operands {
                    graphics.word_spacing = number(word_spacing).unwrap_or(graphics.word_spacing);
                    graphics.char_spacing = number(char_spacing).unwrap_or(graphics.char_spacing);
                    cursor.next_line(0.0, -graphics.leading);
                    self.show_text(graphics, cursor, resources, std::slice::from_ref(text));
                }
            }
            "Do" => {
                if let Some(name) = operands.first().and_then(|operand| operand.as_name().ok()) {
                    self.draw_xobject(name, graphics, resources, depth)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn show_text(
        &mut self,
        state: &GraphicsState,
        cursor: &mut TextCursor,
        resources: &Resources<'a>,
        items: &[Object],
    ) {
        let font = resources.font(state.font.as_deref());
        let size = state.font_size;
        let scale = state.horizontal_scale;

        let mut text = String::new();
        let mut advance = 0.0_f32;
        for item in items {
            if let Object::String(bytes, _) = item {
                let decoded = font.decode(bytes);
                for glyph in &decoded.codes {
                    let spacing = if glyph.is_word_space() {
                        state.word_spacing
                    } else {
                        0.0
                    };
                    advance += (font.glyph_width(glyph.code) / 1000.0 * size
                        + state.char_spacing
                        + spacing)
                        * scale;
                }
                text.push_str(&decoded.text);
            } else if let Some(adjustment) = number(item) {
                advance -= adjustment / 1000.0 * size * scale;
                if adjustment < WORD_GAP_ADJUSTMENT && !text.is_empty() && !text.ends_with(' ') {
                    text.push(' ');
                }
            }
        }

        let rendering = cursor.matrix.then(state.ctm);
        let start = rendering.apply(0.0, 0.0);
        let end = rendering.apply(advance, 0.0);
        let em = size * rendering.vertical_scale();
        cursor.advance(advance);

        if !text.trim().is_empty() {
            self.push_fragment(text, start, end, em);
        }
    }

    fn push_fragment(&mut self, text: String, start: (f32, f32), end: (f32, f32), em: f32) {
        let baseline = start.1;
        let bbox = self.page_rect(
            start.0.min(end.0),
            baseline - DESCENT * em,
            start.0.max(end.0),
            baseline + ASCENT * em,
        );

        if let Some(last) = self.fragments.last_mut() {
            let gap = bbox.x0 - last.bbox.x1;
            let em_ref = em.max(last.em);
            let same_baseline = (last.baseline - baseline).abs() <= BASELINE_TOLERANCE_EMS * em_ref;
            if same_baseline
                && gap >= -MAX_JOIN_OVERLAP_EMS * em_ref
                && gap <= MAX_JOIN_GAP_EMS * em_ref
            {
                if gap > SPACE_GAP_EMS * em_ref && !last.text.ends_with(' ') && !text.starts_with(' ')
                {
                    last.text.push(' ');
                }
                last.text.push_str(&text);
                last.bbox = last.bbox.union(&bbox);
                return;
            }
        }

        self.fragments.push(Fragment {
            text,
            bbox,
            baseline,
            em,
        });
    }

    fn draw_xobject(
        &mut self,
        name: &[u8],
        state: &GraphicsState,
        resources: &Resources<'a>,
        depth: usize,
    ) -> Result<(), ExtractError> {
        let Some(stream) = resources.xobject(name) else {
            debug!(name = %String::from_utf8_lossy(name), "XObject not found in resources");
            return Ok(());
        };

        match stream.dict.get(b"Subtype").and_then(Object::as_name).ok() {
            Some(b"Image") => {
                let image = self.image_record(stream.content.clone(), &stream.dict, state.ctm);
                self.images.push(image);
            }
            Some(b"Form") if depth < MAX_FORM_DEPTH => {
                self.scan_form(stream, state.ctm, resources, depth + 1)?;
            }
            Some(b"Form") => debug!("form XObjects nested too deeply; skipping"),
            _ => {}
        }
        Ok(())
    }

    fn scan_form(
        &mut self,
        stream: &'a Stream,
        ctm: Matrix,
        parent: &Resources<'a>,
        depth: usize,
    ) -> Result<(), ExtractError> {
        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|matrix| resolve(self.document, matrix))
            .and_then(|matrix| matrix.as_array().ok())
            .and_then(|values| Matrix::from_operands(values))
            .unwrap_or(Matrix::IDENTITY);
        let content = stream_bytes(stream)?;
        let own_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|resources| resolve(self.document, resources))
            .and_then(|resources| resources.as_dict().ok());

        let form_ctm = form_matrix.then(ctm);
        match own_resources {
            Some(dict) => {
                let resources = Resources::new(self.document, Some(dict));
                self.scan(&content, &resources, form_ctm, depth)
            }
            None => self.scan(&content, parent, form_ctm, depth),
        }
    }

    fn inline_image_record(&self, image: &InlineImage<'_>, ctm: Matrix) -> ImageRecord {
        debug!(size_bytes = image.data.len(), "inline image");
        self.image_record(image.data.to_vec(), &image.dict, ctm)
    }

    /// Places the unit square of image space through `ctm`.
    fn image_record(&self, bytes: Vec<u8>, dict: &Dictionary, ctm: Matrix) -> ImageRecord {
        let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)].map(|(x, y)| ctm.apply(x, y));
        let (mut x0, mut y0) = corners[0];
        let (mut x1, mut y1) = corners[0];
        for (x, y) in corners {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }

        ImageRecord {
            bbox: self.page_rect(x0, y0, x1, y1),
            format: declared_format(dict),
            content_hash: content_hash(&bytes),
            size_bytes: bytes.len(),
            bytes,
        }
    }

    fn finish(self, page_number: u32) -> PageContent {
        let (media_box, rotation) = (self.media_box, self.rotation);
        let mut lines = self
            .fragments
            .into_iter()
            .filter_map(|fragment| {
                let text = fragment.text.trim();
                (!text.is_empty()).then(|| TextLine {
                    text: text.to_string(),
                    bbox: displayed_rect(fragment.bbox, media_box, rotation),
                })
            })
            .collect::<Vec<_>>();
        lines.sort_by(|left, right| left.bbox.y0.total_cmp(&right.bbox.y0));

        let images = self
            .images
            .into_iter()
            .map(|image| ImageRecord {
                bbox: displayed_rect(image.bbox, media_box, rotation),
                ..image
            })
            .collect();

        PageContent {
            page_number,
            lines,
            images,
        }
    }
}

pub fn open_document(path: &Path) -> Result<Document, ExtractError> {
    Ok(Document::load(path)?)
}

/// Reads the text lines and placed raster images of one page, both inline
/// and XObject images. Boxes are in top-left coordinates of the page as
/// displayed, after `/Rotate`. Image bytes are returned exactly as stored in
/// the PDF.
pub fn read_page(
    document: &Document,
    page_number: u32,
    page_id: ObjectId,
) -> Result<PageContent, ExtractError> {
    let resources = Resources::new(
        document,
        inherited_attribute(document, page_id, b"Resources").and_then(|object| object.as_dict().ok()),
    );
    let content = document.get_page_content(page_id)?;

    let mut scanner = PageScanner::new(
        document,
        media_box(document, page_id),
        page_rotation(document, page_id),
    );
    scanner.scan(&content, &resources, Matrix::IDENTITY, 0)?;
    Ok(scanner.finish(page_number))
}

#[cfg(test)]
mod tests {
    use lopdf::content::{Content, Operation};
    use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
    use pretty_assertions::assert_eq;

    use super::{Matrix, read_page};
    use crate::model::Rect;

    fn build_document(operations: Vec<Operation>, xobjects: Vec<(&str, Object)>) -> (Document, ObjectId) {
        let content = Content { operations }.encode().expect("content should encode");
        build_document_from_bytes(content, xobjects)
    }

    fn build_document_from_bytes(content: Vec<u8>, xobjects: Vec<(&str, Object)>) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut xobject_dict = Dictionary::new();
        for (name, object) in xobjects {
            let id = doc.add_object(object);
            xobject_dict.set(name, id);
        }

        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => xobject_dict,
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        (doc, page_id)
    }

    fn jpeg_xobject(bytes: &[u8]) -> Object {
        Object::Stream(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 4,
                "Height" => 1,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            bytes.to_vec(),
        ))
    }

    fn ops(listing: &[(&str, Vec<Object>)]) -> Vec<Operation> {
        listing
            .iter()
            .map(|(operator, operands)| Operation::new(operator, operands.clone()))
            .collect()
    }

    fn text_at(x: i64, baseline: i64, text: &str) -> Vec<Operation> {
        ops(&[
            ("BT", vec![]),
            ("Tf", vec!["F1".into(), 10.into()]),
            ("Td", vec![x.into(), baseline.into()]),
            ("Tj", vec![Object::string_literal(text)]),
            ("ET", vec![]),
        ])
    }

    #[test]
    fn matrix_concatenation_applies_left_first() {
        let scale = Matrix {
            a: 2.0,
            d: 3.0,
            ..Matrix::IDENTITY
        };
        let moved = scale.then(Matrix::translate(10.0, 20.0));
        assert_eq!(moved.apply(1.0, 1.0), (12.0, 23.0));
    }

    #[test]
    fn reads_image_placement_and_text_line_boxes() {
        let mut operations = ops(&[
            ("q", vec![]),
            (
                "cm",
                vec![200.into(), 0.into(), 0.into(), 50.into(), 100.into(), 542.into()],
            ),
            ("Do", vec!["Im0".into()]),
            ("Q", vec![]),
        ]);
        operations.extend(text_at(110, 524, "M102595496"));
        let (doc, page_id) = build_document(operations, vec![("Im0", jpeg_xobject(b"jpeg-bytes"))]);

        let page = read_page(&doc, 1, page_id).expect("page should be read");

        assert_eq!(page.images.len(), 1);
        let image = &page.images[0];
        assert_eq!(image.bbox, Rect::new(100.0, 200.0, 300.0, 250.0));
        assert_eq!(image.format, "jpeg");
        assert_eq!(image.bytes, b"jpeg-bytes");
        assert_eq!(image.size_bytes, 10);

        assert_eq!(page.lines.len(), 1);
        assert_eq!(page.lines[0].text, "M102595496");
        assert_eq!(page.lines[0].bbox, Rect::new(110.0, 260.0, 160.0, 270.0));
    }

    #[test]
    fn joins_fragments_on_one_baseline() {
        let operations = ops(&[
            ("BT", vec![]),
            ("Tf", vec!["F1".into(), 10.into()]),
            ("Td", vec![110.into(), 524.into()]),
            (
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("M1025"),
                    (-50).into(),
                    Object::string_literal("95496"),
                ])],
            ),
            ("Td", vec![55.into(), 0.into()]),
            ("Tj", vec![Object::string_literal("Fleece")]),
            ("ET", vec![]),
        ]);
        let (doc, page_id) = build_document(operations, vec![]);

        let page = read_page(&doc, 1, page_id).expect("page should be read");

        assert_eq!(page.lines.len(), 1);
        assert_eq!(page.lines[0].text, "M102595496 Fleece");
    }

    #[test]
    fn sorts_lines_top_to_bottom() {
        let mut operations = text_at(50, 100, "bottom line");
        operations.extend(text_at(50, 700, "top line"));
        let (doc, page_id) = build_document(operations, vec![]);

        let page = read_page(&doc, 1, page_id).expect("page should be read");

        let texts = page.lines.iter().map(|line| line.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["top line", "bottom line"]);
    }

    #[test]
    fn descends_into_form_xobjects() {
        let form_content = Content {
            operations: ops(&[
                ("q", vec![]),
                (
                    "cm",
                    vec![100.into(), 0.into(), 0.into(), 100.into(), 0.into(), 0.into()],
                ),
                ("Do", vec!["Im7".into()]),
                ("Q", vec![]),
            ]),
        }
        .encode()
        .expect("form content should encode");
        let form = Object::Stream(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im7" => jpeg_xobject(b"inside-form") },
                },
            },
            form_content,
        ));
        let page_ops = ops(&[
            ("q", vec![]),
            (
                "cm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), 50.into(), 0.into()],
            ),
            ("Do", vec!["Fm0".into()]),
            ("Q", vec![]),
        ]);
        let (doc, page_id) = build_document(page_ops, vec![("Fm0", form)]);

        let page = read_page(&doc, 1, page_id).expect("page should be read");

        assert_eq!(page.images.len(), 1);
        assert_eq!(page.images[0].bbox, Rect::new(50.0, 692.0, 150.0, 792.0));
        assert_eq!(page.images[0].bytes, b"inside-form");
    }

    fn add_page_font(doc: &mut Document, page_id: ObjectId, name: &str, font_id: ObjectId) {
        doc.get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .and_then(|page| page.get_mut(b"Resources"))
            .and_then(Object::as_dict_mut)
            .and_then(|resources| resources.get_mut(b"Font"))
            .and_then(Object::as_dict_mut)
            .expect("page should have a font dictionary")
            .set(name, font_id);
    }

    #[test]
    fn decodes_identity_h_text_with_to_unicode_and_widths() {
        let cmap = b"/CIDInit /ProcSet findresource begin
begincmap
1 begincodespacerange <0000> <FFFF> endcodespacerange
1 beginbfchar <0001> <004D> endbfchar
1 beginbfrange <0002> <000B> <0030> endbfrange
endcmap end";
        // CIDs for "M102595496": M is 1, digit d is d + 2.
        let glyphs = vec![0, 1, 0, 3, 0, 2, 0, 4, 0, 7, 0, 11, 0, 7, 0, 6, 0, 11, 0, 8];
        let operations = ops(&[
            ("BT", vec![]),
            ("Tf", vec!["F2".into(), 10.into()]),
            ("Td", vec![110.into(), 524.into()]),
            ("Tj", vec![Object::String(glyphs, StringFormat::Hexadecimal)]),
            ("ET", vec![]),
        ]);
        let (mut doc, page_id) = build_document(operations, vec![]);
        let cmap_id = doc.add_object(Stream::new(dictionary! {}, cmap.to_vec()));
        let descendant_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "CatalogSans",
            "W" => vec![1.into(), Object::Array(vec![750.into()]), 2.into(), 11.into(), 500.into()],
        });
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "CatalogSans",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![descendant_id.into()],
            "ToUnicode" => cmap_id,
        });
        add_page_font(&mut doc, page_id, "F2", font_id);

        let page = read_page(&doc, 1, page_id).expect("page should be read");

        assert_eq!(page.lines.len(), 1);
        assert_eq!(page.lines[0].text, "M102595496");
        assert_eq!(page.lines[0].bbox, Rect::new(110.0, 260.0, 162.5, 270.0));
    }

    #[test]
    fn reads_inline_images_and_text_after_them() {
        let mut content = Content {
            operations: text_at(110, 700, "M11111111 Before"),
        }
        .encode()
        .expect("content should encode");
        content.extend_from_slice(
            b"\nq 200 0 0 50 100 542 cm\nBI /W 4 /H 1 /BPC 8 /CS /RGB /F /DCT\nID \xff\xd8\xff\xe0EI-ish\xff\xd9\nEI\nQ\n",
        );
        content.extend(
            Content {
                operations: text_at(110, 524, "M102595496"),
            }
            .encode()
            .expect("content should encode"),
        );
        let (doc, page_id) = build_document_from_bytes(content, vec![]);

        let page = read_page(&doc, 1, page_id).expect("page should be read");

        assert_eq!(page.images.len(), 1);
        let image = &page.images[0];
        assert_eq!(image.bbox, Rect::new(100.0, 200.0, 300.0, 250.0));
        assert_eq!(image.format, "jpeg");
        assert_eq!(image.bytes, b"\xff\xd8\xff\xe0EI-ish\xff\xd9");
        let texts = page.lines.iter().map(|line| line.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["M11111111 Before", "M102595496"]);
    }

    #[test]
    fn maps_boxes_through_page_rotation() {
        let mut operations = ops(&[
            ("q", vec![]),
            (
                "cm",
                vec![200.into(), 0.into(), 0.into(), 50.into(), 100.into(), 542.into()],
            ),
            ("Do", vec!["Im0".into()]),
            ("Q", vec![]),
        ]);
        operations.extend(text_at(110, 524, "M102595496"));
        let (mut doc, page_id) = build_document(operations, vec![("Im0", jpeg_xobject(b"jpeg-bytes"))]);
        doc.get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .expect("page dictionary")
            .set("Rotate", 90);

        let page = read_page(&doc, 1, page_id).expect("page should be read");

        assert_eq!(page.images[0].bbox, Rect::new(542.0, 100.0, 592.0, 300.0));
        assert_eq!(page.lines[0].bbox, Rect::new(522.0, 110.0, 532.0, 160.0));
    }
}
