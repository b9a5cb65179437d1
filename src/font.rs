use std::collections::BTreeMap;

use encoding_rs::UTF_16BE;
use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use crate::pdf_reader::{number, resolve, stream_bytes};

/// Width in thousandths of an em used when a simple font has no `/Widths`.
const DEFAULT_SIMPLE_WIDTH: f32 = 500.0;
const DEFAULT_CID_WIDTH: f32 = 1000.0;
const MAX_RANGE_SPAN: u32 = 0xFFFF;

fn looks_decoding_broken(text: &str) -> bool {
    if text.contains("?Identity-H Unimplemented?") {
        return true;
    }
    let total = text.chars().count();
    let replacement = text.matches('\u{FFFD}').count();
    total > 0 && replacement * 8 > total
}

fn decode_utf16(bytes: &[u8]) -> Option<String> {
    let (text, had_errors) = UTF_16BE.decode_without_bom_handling(bytes);
    (!had_errors && !text.is_empty()).then(|| text.into_owned())
}

pub(crate) fn decode_pdf_bytes(encoding: Option<&str>, bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF])
        && let Some(text) = decode_utf16(rest)
    {
        return text;
    }

    let decoded = Document::decode_text(encoding, bytes);
    if !looks_decoding_broken(&decoded) {
        return decoded;
    }

    let wide_encoding = encoding.is_some_and(|name| {
        let lower = name.to_ascii_lowercase();
        ["utf16", "ucs2", "identity-h", "unicode"]
            .iter()
            .any(|hint| lower.contains(hint))
    });
    if wide_encoding && let Some(text) = decode_utf16(bytes) {
        return text;
    }

    String::from_utf8_lossy(bytes).into_owned()
}

fn big_endian(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .rev()
        .take(4)
        .rev()
        .fold(0, |value, &byte| (value << 8) | u32::from(byte))
}

#[derive(Debug, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    Keyword(String),
    ArrayStart,
    ArrayEnd,
    Other,
}

fn is_cmap_regular(byte: u8) -> bool {
    !byte.is_ascii_whitespace() && !b"()<>[]{}/%".contains(&byte) && byte != 0
}

#[allow(clippy::cast_possible_truncation)]
fn hex_bytes(digits: &[u8]) -> Vec<u8> {
    let nibbles = digits
        .iter()
        .filter_map(|&digit| char::from(digit).to_digit(16))
        .map(|nibble| nibble as u8)
        .collect::<Vec<_>>();
    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn tokenize_cmap(data: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        match data[pos] {
            b'%' => {
                while pos < data.len() && data[pos] != b'\n' && data[pos] != b'\r' {
                    pos += 1;
                }
            }
            b'<' if data.get(pos + 1) == Some(&b'<') => {
                tokens.push(CMapToken::Other);
                pos += 2;
            }
            b'>' if data.get(pos + 1) == Some(&b'>') => {
                tokens.push(CMapToken::Other);
                pos += 2;
            }
            b'<' => {
                let end = data[pos + 1..]
                    .iter()
                    .position(|&byte| byte == b'>')
                    .map_or(data.len(), |offset| pos + 1 + offset);
                tokens.push(CMapToken::Hex(hex_bytes(&data[pos + 1..end])));
                pos = end + 1;
            }
            b'[' => {
                tokens.push(CMapToken::ArrayStart);
                pos += 1;
            }
            b']' => {
                tokens.push(CMapToken::ArrayEnd);
                pos += 1;
            }
            b'(' => {
                let mut depth = 0_usize;
                while pos < data.len() {
                    match data[pos] {
                        b'\\' => pos += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    pos += 1;
                }
                tokens.push(CMapToken::Other);
                pos += 1;
            }
            b'/' => {
                pos += 1;
                while pos < data.len() && is_cmap_regular(data[pos]) {
                    pos += 1;
                }
                tokens.push(CMapToken::Other);
            }
            byte if is_cmap_regular(byte) => {
                let start = pos;
                while pos < data.len() && is_cmap_regular(data[pos]) {
                    pos += 1;
                }
                tokens.push(CMapToken::Keyword(
                    String::from_utf8_lossy(&data[start..pos]).into_owned(),
                ));
            }
            _ => pos += 1,
        }
    }
    tokens
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CodeRange {
    len: usize,
    low: u32,
    high: u32,
}

/// Code-to-text table read from a font's `/ToUnicode` CMap.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ToUnicodeMap {
    code_ranges: Vec<CodeRange>,
    mappings: BTreeMap<u32, String>,
}

impl ToUnicodeMap {
    pub(crate) fn parse(data: &[u8]) -> Self {
        let tokens = tokenize_cmap(data);
        let mut map = Self::default();
        let mut index = 0;
        while index < tokens.len() {
            index = match &tokens[index] {
                CMapToken::Keyword(keyword) if keyword == "begincodespacerange" => {
                    map.read_code_ranges(&tokens, index + 1)
                }
                CMapToken::Keyword(keyword) if keyword == "beginbfchar" => {
                    map.read_bfchar(&tokens, index + 1)
                }
                CMapToken::Keyword(keyword) if keyword == "beginbfrange" => {
                    map.read_bfrange(&tokens, index + 1)
                }
                _ => index + 1,
            };
        }
        map
    }

    fn read_code_ranges(&mut self, tokens: &[CMapToken], mut index: usize) -> usize {
        while let [CMapToken::Hex(low), CMapToken::Hex(high), ..] =
            &tokens[index.min(tokens.len())..]
        {
            self.code_ranges.push(CodeRange {
                len: low.len().max(1),
                low: big_endian(low),
                high: big_endian(high),
            });
            index += 2;
        }
        index
    }

    fn read_bfchar(&mut self, tokens: &[CMapToken], mut index: usize) -> usize {
        while let [CMapToken::Hex(source), CMapToken::Hex(target), ..] =
            &tokens[index.min(tokens.len())..]
        {
            self.mappings.insert(big_endian(source), utf16_text(target));
            index += 2;
        }
        index
    }

    fn read_bfrange(&mut self, tokens: &[CMapToken], mut index: usize) -> usize {
        loop {
            match &tokens[index.min(tokens.len())..] {
                [CMapToken::Hex(low), CMapToken::Hex(high), CMapToken::Hex(target), ..] => {
                    let (low, high) = (big_endian(low), big_endian(high));
                    let mut units = utf16_units(target);
                    for code in low..=high.min(low.saturating_add(MAX_RANGE_SPAN)) {
                        self.mappings.insert(code, String::from_utf16_lossy(&units));
                        if let Some(last) = units.last_mut() {
                            *last = last.wrapping_add(1);
                        }
                    }
                    index += 3;
                }
                [CMapToken::Hex(low), CMapToken::Hex(_), CMapToken::ArrayStart, rest @ ..] => {
                    let mut code = big_endian(low);
                    index += 3;
                    for token in rest {
                        index += 1;
                        match token {
                            CMapToken::Hex(target) => {
                                self.mappings.insert(code, utf16_text(target));
                                code = code.saturating_add(1);
                            }
                            CMapToken::ArrayEnd => break,
                            _ => {}
                        }
                    }
                }
                _ => return index,
            }
        }
    }

    fn code_length(&self, rest: &[u8]) -> Option<usize> {
        self.code_ranges
            .iter()
            .find(|range| {
                rest.len() >= range.len && {
                    let code = big_endian(&rest[..range.len]);
                    (range.low..=range.high).contains(&code)
                }
            })
            .map(|range| range.len)
    }

    fn split_codes(&self, bytes: &[u8], default_len: usize) -> Vec<GlyphCode> {
        let mut codes = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let rest = &bytes[pos..];
            let len = self
                .code_length(rest)
                .unwrap_or(default_len)
                .clamp(1, rest.len());
            codes.push(GlyphCode {
                code: big_endian(&rest[..len]),
                len,
            });
            pos += len;
        }
        codes
    }

    pub(crate) fn get(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(String::as_str)
    }
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
        .collect()
}

fn utf16_text(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GlyphCode {
    pub(crate) code: u32,
    pub(crate) len: usize,
}

impl GlyphCode {
    /// Word spacing applies only to the single-byte code 32.
    pub(crate) fn is_word_space(self) -> bool {
        self.len == 1 && self.code == 32
    }
}

/// Text decoded from a PDF string with the codes needed for width lookup.
#[derive(Debug)]
pub(crate) struct DecodedText {
    pub(crate) text: String,
    pub(crate) codes: Vec<GlyphCode>,
}

#[derive(Debug, Default)]
enum GlyphWidths {
    Simple {
        first_char: u32,
        widths: Vec<f32>,
    },
    Cid {
        default: f32,
        widths: BTreeMap<u32, f32>,
    },
    #[default]
    Unknown,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
impl GlyphWidths {
    fn simple(document: &Document, font: &Dictionary) -> Self {
        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|widths| resolve(document, widths))
            .and_then(|widths| widths.as_array().ok());
        let Some(widths) = widths else {
            return Self::Unknown;
        };
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(number)
            .map_or(0, |first| first.max(0.0) as u32);

        Self::Simple {
            first_char,
            widths: widths
                .iter()
                .map(|width| resolve(document, width).and_then(number).unwrap_or(0.0))
                .collect(),
        }
    }

    /// Reads `/DW` and `/W` from the descendant CIDFont.
    fn cid(document: &Document, descendant: Option<&Dictionary>) -> Self {
        let Some(descendant) = descendant else {
            return Self::Cid {
                default: DEFAULT_CID_WIDTH,
                widths: BTreeMap::new(),
            };
        };
        let default = descendant
            .get(b"DW")
            .ok()
            .and_then(number)
            .unwrap_or(DEFAULT_CID_WIDTH);
        let entries = descendant
            .get(b"W")
            .ok()
            .and_then(|w| resolve(document, w))
            .and_then(|w| w.as_array().ok())
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut widths = BTreeMap::new();
        let mut index = 0;
        while index < entries.len() {
            let Some(first) = resolve(document, &entries[index]).and_then(number) else {
                break;
            };
            let first = first.max(0.0) as u32;
            match entries.get(index + 1).and_then(|next| resolve(document, next)) {
                Some(Object::Array(list)) => {
                    for (offset, width) in list.iter().enumerate() {
                        if let Some(width) = resolve(document, width).and_then(number) {
                            widths.insert(first + offset as u32, width);
                        }
                    }
                    index += 2;
                }
                Some(last) => {
                    let last = number(last).map_or(first, |last| last.max(0.0) as u32);
                    let width = entries
                        .get(index + 2)
                        .and_then(|width| resolve(document, width))
                        .and_then(number)
                        .unwrap_or(default);
                    for code in first..=last.min(first.saturating_add(MAX_RANGE_SPAN)) {
                        widths.insert(code, width);
                    }
                    index += 3;
                }
                None => break,
            }
        }

        Self::Cid { default, widths }
    }

    fn get(&self, code: u32) -> f32 {
        match self {
            Self::Simple { first_char, widths } => code
                .checked_sub(*first_char)
                .and_then(|offset| widths.get(offset as usize))
                .copied()
                .filter(|width| *width > 0.0)
                .unwrap_or(DEFAULT_SIMPLE_WIDTH),
            Self::Cid { default, widths } => widths.get(&code).copied().unwrap_or(*default),
            Self::Unknown => DEFAULT_SIMPLE_WIDTH,
        }
    }
}

/// What the text interpreter needs from a font resource.
#[derive(Debug, Default)]
pub(crate) struct FontInfo<'a> {
    encoding: Option<&'a str>,
    to_unicode: Option<ToUnicodeMap>,
    composite: bool,
    widths: GlyphWidths,
}

#[allow(clippy::cast_possible_truncation)]
impl<'a> FontInfo<'a> {
    pub(crate) fn from_dict(document: &'a Document, font: &'a Dictionary) -> Self {
        let composite = font
            .get(b"Subtype")
            .and_then(Object::as_name)
            .is_ok_and(|subtype| subtype == b"Type0");

        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|cmap| resolve(document, cmap))
            .and_then(|cmap| cmap.as_stream().ok())
            .and_then(|stream| match stream_bytes(stream) {
                Ok(bytes) => Some(ToUnicodeMap::parse(&bytes)),
                Err(error) => {
                    debug!(%error, "unreadable ToUnicode CMap; ignoring");
                    None
                }
            });

        let widths = if composite {
            let descendant = font
                .get(b"DescendantFonts")
                .ok()
                .and_then(|fonts| resolve(document, fonts))
                .and_then(|fonts| fonts.as_array().ok())
                .and_then(|fonts| fonts.first())
                .and_then(|first| resolve(document, first))
                .and_then(|first| first.as_dict().ok());
            GlyphWidths::cid(document, descendant)
        } else {
            GlyphWidths::simple(document, font)
        };

        Self {
            encoding: Some(font.get_font_encoding()),
            to_unicode,
            composite,
            widths,
        }
    }

    pub(crate) fn decode(&self, bytes: &[u8]) -> DecodedText {
        let default_len = if self.composite { 2 } else { 1 };
        match &self.to_unicode {
            Some(map) => {
                let codes = map.split_codes(bytes, default_len);
                let mut text = String::new();
                for glyph in &codes {
                    match map.get(glyph.code) {
                        Some(mapped) => text.push_str(mapped),
                        None if !self.composite => {
                            text.push_str(&decode_pdf_bytes(self.encoding, &[glyph.code as u8]));
                        }
                        None => {}
                    }
                }
                DecodedText { text, codes }
            }
            None => DecodedText {
                text: decode_pdf_bytes(self.encoding, bytes),
                codes: ToUnicodeMap::default().split_codes(bytes, default_len),
            },
        }
    }

    /// Advance of `code` in thousandths of an em.
    pub(crate) fn glyph_width(&self, code: u32) -> f32 {
        self.widths.get(code)
    }
}
