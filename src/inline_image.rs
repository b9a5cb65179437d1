use lopdf::{Dictionary, Object};

use crate::error::ExtractError;

/// A run of a content stream: plain operators or one `BI … ID … EI` image.
#[derive(Debug)]
pub(crate) enum ContentSegment<'a> {
    Operators(&'a [u8]),
    InlineImage(InlineImage<'a>),
}

#[derive(Debug)]
pub(crate) struct InlineImage<'a> {
    /// Image parameters with abbreviated filter names expanded.
    pub(crate) dict: Dictionary,
    pub(crate) data: &'a [u8],
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Keyword(&'a [u8], usize),
    Name(&'a [u8]),
    ArrayStart,
    ArrayEnd,
    Other,
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n' | b'\x0c' | b'\0')
}

fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(byte: u8) -> bool {
    !is_whitespace(byte) && !is_delimiter(byte)
}

struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn skip_while(&mut self, keep: impl Fn(u8) -> bool) {
        while self.pos < self.data.len() && keep(self.data[self.pos]) {
            self.pos += 1;
        }
    }

    fn skip_literal_string(&mut self) {
        let mut depth = 0_usize;
        while self.pos < self.data.len() {
            match self.data[self.pos] {
                b'\\' => self.pos += 1,
                b'(' => depth += 1,
                b')' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.pos += 1;
                        return;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    /// Next token, skipping strings and comments; `None` at the end.
    fn next_token(&mut self) -> Option<Token<'a>> {
        loop {
            self.skip_while(is_whitespace);
            let start = self.pos;
            let byte = *self.data.get(start)?;
            match byte {
                b'%' => self.skip_while(|byte| byte != b'\n' && byte != b'\r'),
                b'(' => {
                    self.skip_literal_string();
                    return Some(Token::Other);
                }
                b'<' | b'>' if self.data.get(start + 1) == Some(&byte) => {
                    self.pos += 2;
                    return Some(Token::Other);
                }
                b'<' => {
                    self.skip_while(|byte| byte != b'>');
                    self.pos += 1;
                    return Some(Token::Other);
                }
                b'[' => {
                    self.pos += 1;
                    return Some(Token::ArrayStart);
                }
                b']' => {
                    self.pos += 1;
                    return Some(Token::ArrayEnd);
                }
                b'/' => {
                    self.pos += 1;
                    self.skip_while(is_regular);
                    return Some(Token::Name(&self.data[start + 1..self.pos]));
                }
                _ if is_delimiter(byte) => {
                    self.pos += 1;
                    return Some(Token::Other);
                }
                _ => {
                    self.skip_while(is_regular);
                    return Some(Token::Keyword(&self.data[start..self.pos], start));
                }
            }
        }
    }
}

/// Splits a content stream around inline images so the operator parts can
/// be handed to lopdf, which stops at the binary image data.
pub(crate) fn split_inline_images(content: &[u8]) -> Result<Vec<ContentSegment<'_>>, ExtractError> {
    let mut segments = Vec::new();
    let mut lexer = Lexer::new(content);
    let mut segment_start = 0;

    while let Some(token) = lexer.next_token() {
        let Token::Keyword(b"BI", begin) = token else {
            continue;
        };
        segments.push(ContentSegment::Operators(&content[segment_start..begin]));

        let dict_start = lexer.pos;
        let dict_end = loop {
            match lexer.next_token() {
                Some(Token::Keyword(b"ID", start)) => break start,
                Some(_) => {}
                None => {
                    return Err(ExtractError::MalformedContent(
                        "inline image has no ID marker".to_string(),
                    ));
                }
            }
        };
        let dict = parse_image_dict(&content[dict_start..dict_end]);

        let data_start = (lexer.pos + 1).min(content.len());
        let search_from = declared_length(&dict)
            .map_or(data_start, |length| data_start.saturating_add(length).min(content.len()));
        let (data_end, after) = find_end_marker(content, data_start, search_from).ok_or_else(|| {
            ExtractError::MalformedContent("inline image has no EI marker".to_string())
        })?;

        segments.push(ContentSegment::InlineImage(InlineImage {
            dict,
            data: &content[data_start..data_end],
        }));
        lexer.pos = after;
        segment_start = after;
    }

    segments.push(ContentSegment::Operators(&content[segment_start..]));
    Ok(segments)
}

/// Returns the end of the image data and the offset just past `EI`.
fn find_end_marker(content: &[u8], data_start: usize, search_from: usize) -> Option<(usize, usize)> {
    (search_from..content.len().saturating_sub(1)).find_map(|at| {
        let preceded = at == data_start || is_whitespace(content[at - 1]);
        let followed = content.get(at + 2).is_none_or(|&byte| !is_regular(byte));
        (&content[at..at + 2] == b"EI" && preceded && followed).then(|| {
            let data_end = if at > data_start && is_whitespace(content[at - 1]) {
                at - 1
            } else {
                at
            };
            (data_end.max(data_start), at + 2)
        })
    })
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn declared_length(dict: &Dictionary) -> Option<usize> {
    [b"L".as_slice(), b"Length"]
        .iter()
        .find_map(|key| dict.get(key).ok()?.as_i64().ok())
        .filter(|length| *length >= 0)
        .map(|length| length as usize)
}

fn expand_filter(name: &[u8]) -> Vec<u8> {
    let full: &[u8] = match name {
        b"AHx" => b"ASCIIHexDecode",
        b"A85" => b"ASCII85Decode",
        b"LZW" => b"LZWDecode",
        b"Fl" => b"FlateDecode",
        b"RL" => b"RunLengthDecode",
        b"CCF" => b"CCITTFaxDecode",
        b"DCT" => b"DCTDecode",
        other => other,
    };
    full.to_vec()
}

fn scalar(keyword: &[u8]) -> Object {
    let text = String::from_utf8_lossy(keyword);
    match text.as_ref() {
        "true" => Object::Boolean(true),
        "false" => Object::Boolean(false),
        _ => text
            .parse::<i64>()
            .map(Object::Integer)
            .or_else(|_| text.parse::<f32>().map(Object::from))
            .unwrap_or_else(|_| Object::Name(keyword.to_vec())),
    }
}

fn parse_image_dict(bytes: &[u8]) -> Dictionary {
    let mut lexer = Lexer::new(bytes);
    let mut dict = Dictionary::new();
    let mut key: Option<Vec<u8>> = None;

    while let Some(token) = lexer.next_token() {
        let value = match token {
            Token::Name(name) if key.is_none() => {
                key = Some(name.to_vec());
                continue;
            }
            Token::Name(name) => Object::Name(name.to_vec()),
            Token::Keyword(keyword, _) => scalar(keyword),
            Token::ArrayStart => {
                let mut items = Vec::new();
                while let Some(item) = lexer.next_token() {
                    match item {
                        Token::ArrayEnd => break,
                        Token::Name(name) => items.push(Object::Name(name.to_vec())),
                        Token::Keyword(keyword, _) => items.push(scalar(keyword)),
                        _ => {}
                    }
                }
                Object::Array(items)
            }
            Token::ArrayEnd | Token::Other => Object::Null,
        };
        let Some(name) = key.take() else {
            continue;
        };

        if name == b"F" || name == b"Filter" {
            let value = match value {
                Object::Name(filter) => Object::Name(expand_filter(&filter)),
                Object::Array(filters) => Object::Array(
                    filters
                        .into_iter()
                        .map(|filter| match filter {
                            Object::Name(filter) => Object::Name(expand_filter(&filter)),
                            other => other,
                        })
                        .collect(),
                ),
                other => other,
            };
            dict.set("Filter", value);
        } else {
            dict.set(name, value);
        }
    }

    dict
}
