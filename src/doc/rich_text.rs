//! Rich text: plain text plus mark intervals, and the inline markup codec.
//!
//! Markup is the persisted form of a text region (`Hello <b>world</b>`). The
//! encoder is canonical (minimal nesting, fixed tag order), so decoding and
//! re-encoding canonical markup gives back the same string. The decoder only
//! understands the engine's own tag vocabulary plus a few aliases; any other
//! tag is dropped and its text kept.

use crate::core::mark::{Mark, MarkKind, MarkSet};
use crate::core::{
    grapheme_len, grapheme_offset_to_byte, grapheme_slice, graphemes_before,
    next_grapheme_boundary,
};
use std::ops::Range;

/// Class attribute the engine puts on links it created itself.
pub const LINK_CLASS: &str = "bw-link";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RichText {
    text: String,
    marks: MarkSet,
}

impl RichText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: MarkSet::new(),
        }
    }

    pub fn from_parts(text: impl Into<String>, mut marks: MarkSet) -> Self {
        let text = text.into();
        marks.clamp(grapheme_len(&text));
        Self { text, marks }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn marks(&self) -> &MarkSet {
        &self.marks
    }

    pub fn marks_mut(&mut self) -> &mut MarkSet {
        &mut self.marks
    }

    /// Length in graphemes.
    pub fn len(&self) -> usize {
        grapheme_len(&self.text)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Inserts plain text at a grapheme offset (clamped to the end). The new
    /// text inherits the marks wrapping the insertion point. Returns the
    /// number of graphemes added; leading combining marks fuse with the
    /// grapheme before the insertion point and add none.
    pub fn insert(&mut self, at: usize, text: &str) -> usize {
        let at = at.min(self.len());
        let byte = grapheme_offset_to_byte(&self.text, at).unwrap_or(self.text.len());
        self.text.insert_str(byte, text);
        let start = graphemes_before(&self.text, byte);
        let end = graphemes_before(&self.text, byte + text.len());
        let added = end - start;
        self.marks.insert_at(start, added);
        added
    }

    pub fn delete(&mut self, range: Range<usize>) {
        let len = self.len();
        let start = range.start.min(len);
        let end = range.end.clamp(start, len);
        if start == end {
            return;
        }
        let from = grapheme_offset_to_byte(&self.text, start).unwrap_or(self.text.len());
        let to = grapheme_offset_to_byte(&self.text, end).unwrap_or(self.text.len());
        self.text.replace_range(from..to, "");
        self.marks.delete_range(start..end);
    }

    pub fn slice(&self, range: Range<usize>) -> RichText {
        let len = self.len();
        let start = range.start.min(len);
        let end = range.end.clamp(start, len);
        RichText {
            text: grapheme_slice(&self.text, start..end).to_string(),
            marks: self.marks.slice(start..end),
        }
    }

    /// Splits at a grapheme offset, keeping the head and returning the tail.
    pub fn split_off(&mut self, at: usize) -> RichText {
        let len = self.len();
        let at = at.min(len);
        let tail = self.slice(at..len);
        self.delete(at..len);
        tail
    }

    /// Appends another rich text, keeping its formatting. Graphemes of
    /// `other` that fuse with the last grapheme here take that grapheme's
    /// marks.
    pub fn append(&mut self, other: &RichText) {
        let joint = self.text.len();
        self.text.push_str(&other.text);
        let boundary = next_grapheme_boundary(&self.text, joint);
        let absorbed = graphemes_before(&other.text, boundary - joint);
        let offset = graphemes_before(&self.text, boundary);
        let marks = other.marks.slice(absorbed..usize::MAX);
        self.marks.append_shifted(&marks, offset);
        let len = self.len();
        self.marks.clamp(len);
    }

    pub fn to_markup(&self) -> String {
        let len = self.len();
        let marks: Vec<&Mark> = self.marks.iter().collect();
        let mut out = String::with_capacity(self.text.len());
        let mut open: Vec<usize> = Vec::new();

        for span in self.marks.render_spans(len) {
            if let Some(pos) = open.iter().position(|index| !span.marks.contains(index)) {
                for index in open.drain(pos..).rev() {
                    out.push_str(close_tag(marks[index].kind));
                }
            }
            let mut to_open: Vec<usize> = span
                .marks
                .iter()
                .filter(|index| !open.contains(index))
                .copied()
                .collect();
            to_open.sort_by(|a, b| {
                marks[*b]
                    .end
                    .cmp(&marks[*a].end)
                    .then_with(|| marks[*a].kind.cmp(&marks[*b].kind))
                    .then_with(|| marks[*a].value.cmp(&marks[*b].value))
            });
            for index in to_open {
                out.push_str(&open_tag(marks[index]));
                open.push(index);
            }
            escape_text_into(grapheme_slice(&self.text, span.start..span.end), &mut out);
        }
        for index in open.into_iter().rev() {
            out.push_str(close_tag(marks[index].kind));
        }
        out
    }

    pub fn from_markup(markup: &str) -> RichText {
        let mut text = String::with_capacity(markup.len());
        let mut marks = MarkSet::new();
        let mut stack: Vec<OpenElement> = Vec::new();

        for (_, token) in Tokens::new(markup) {
            match token {
                Token::Char(ch) => text.push(ch),
                Token::Break => text.push('\n'),
                Token::Open { name, attrs } => {
                    let start = grapheme_len(&text);
                    stack.push(OpenElement {
                        styles: element_marks(&name, attrs),
                        name,
                        start,
                    });
                }
                Token::Close(name) => {
                    let Some(pos) = stack.iter().rposition(|element| element.name == name) else {
                        continue;
                    };
                    let end = grapheme_len(&text);
                    for element in stack.drain(pos..).rev() {
                        element.close_into(end, &mut marks);
                    }
                }
            }
        }
        let end = grapheme_len(&text);
        for element in stack.drain(..).rev() {
            element.close_into(end, &mut marks);
        }
        RichText::from_parts(text, marks)
    }
}

/// Maps a byte offset inside region markup to a visible grapheme offset.
/// Offsets inside a tag count the graphemes before the tag.
pub fn visible_offset(markup: &str, markup_offset: usize) -> usize {
    let mut text = String::new();
    for (range, token) in Tokens::new(markup) {
        if range.start >= markup_offset {
            break;
        }
        match token {
            Token::Char(ch) => text.push(ch),
            Token::Break => text.push('\n'),
            _ => {}
        }
    }
    grapheme_len(&text)
}

/// Maps a visible grapheme offset to the markup byte offset of that
/// grapheme, i.e. inside any element that opens right before it. The end of
/// the text maps to just after the last visible character.
pub fn markup_offset(markup: &str, visible: usize) -> usize {
    let mut text = String::new();
    let mut starts: Vec<(usize, usize)> = Vec::new();
    let mut last_end = 0;
    for (range, token) in Tokens::new(markup) {
        match token {
            Token::Char(ch) => {
                starts.push((text.len(), range.start));
                text.push(ch);
                last_end = range.end;
            }
            Token::Break => {
                starts.push((text.len(), range.start));
                text.push('\n');
                last_end = range.end;
            }
            _ => {}
        }
    }
    let Some(text_byte) = grapheme_offset_to_byte(&text, visible) else {
        return last_end;
    };
    starts
        .iter()
        .find(|(byte, _)| *byte == text_byte)
        .map_or(last_end, |(_, markup_byte)| *markup_byte)
}

struct OpenElement {
    name: String,
    styles: Vec<Mark>,
    start: usize,
}

impl OpenElement {
    /// Closes the element. Inner elements close first, so a valued style
    /// only fills the parts an inner element of the same kind left uncovered.
    fn close_into(self, end: usize, marks: &mut MarkSet) {
        for mark in self.styles {
            let mut pieces = vec![self.start..end];
            if mark.kind.is_valued() {
                for existing in marks.iter().filter(|existing| existing.kind == mark.kind) {
                    pieces = pieces
                        .into_iter()
                        .flat_map(|piece| {
                            let left = piece.start..piece.end.min(existing.start);
                            let right = piece.start.max(existing.end)..piece.end;
                            [left, right]
                        })
                        .filter(|piece| piece.start < piece.end)
                        .collect();
                }
            }
            for piece in pieces {
                let mut placed = mark.clone();
                placed.start = piece.start;
                placed.end = piece.end;
                marks.add(placed);
            }
        }
    }
}

fn element_marks(name: &str, attrs: &str) -> Vec<Mark> {
    let simple = |kind| vec![Mark::new(kind, 0..0)];
    match name {
        "b" | "strong" => simple(MarkKind::Bold),
        "i" | "em" => simple(MarkKind::Italic),
        "u" => simple(MarkKind::Underline),
        "s" | "strike" | "del" => simple(MarkKind::Strikethrough),
        "code" => simple(MarkKind::Code),
        "a" => {
            let attrs = parse_attrs(attrs);
            let href = attrs
                .iter()
                .find(|(key, _)| key == "href")
                .map(|(_, value)| value.trim().to_string())
                .filter(|href| !href.is_empty());
            let tagged = attrs.iter().any(|(key, value)| {
                key == "class" && value.split_whitespace().any(|class| class == LINK_CLASS)
            });
            href.map(|href| {
                let mut mark = Mark::valued(MarkKind::Link, href, 0..0);
                mark.tagged = tagged;
                vec![mark]
            })
            .unwrap_or_default()
        }
        "span" | "mark" | "font" => {
            let mut out = Vec::new();
            let attrs = parse_attrs(attrs);
            if let Some((_, style)) = attrs.iter().find(|(key, _)| key == "style") {
                for (property, value) in parse_style(style) {
                    let kind = match property.as_str() {
                        "color" => MarkKind::TextColor,
                        "background-color" | "background" => MarkKind::Highlight,
                        "font-family" => MarkKind::FontFamily,
                        "font-size" => MarkKind::FontSize,
                        _ => continue,
                    };
                    out.push(Mark::valued(kind, value, 0..0));
                }
            }
            if name == "mark" && !out.iter().any(|mark| mark.kind == MarkKind::Highlight) {
                out.push(Mark::valued(MarkKind::Highlight, "yellow", 0..0));
            }
            out
        }
        _ => Vec::new(),
    }
}

fn open_tag(mark: &Mark) -> String {
    let value = mark.value.as_deref().unwrap_or_default();
    match mark.kind {
        MarkKind::Bold => "<b>".into(),
        MarkKind::Italic => "<i>".into(),
        MarkKind::Underline => "<u>".into(),
        MarkKind::Strikethrough => "<s>".into(),
        MarkKind::Code => "<code>".into(),
        MarkKind::Link if mark.tagged => {
            format!("<a href=\"{}\" class=\"{LINK_CLASS}\">", escape_attr(value))
        }
        MarkKind::Link => format!("<a href=\"{}\">", escape_attr(value)),
        MarkKind::TextColor => format!("<span style=\"color: {}\">", escape_attr(value)),
        MarkKind::Highlight => {
            format!("<span style=\"background-color: {}\">", escape_attr(value))
        }
        MarkKind::FontFamily => format!("<span style=\"font-family: {}\">", escape_attr(value)),
        MarkKind::FontSize => format!("<span style=\"font-size: {}\">", escape_attr(value)),
    }
}

fn close_tag(kind: MarkKind) -> &'static str {
    match kind {
        MarkKind::Bold => "</b>",
        MarkKind::Italic => "</i>",
        MarkKind::Underline => "</u>",
        MarkKind::Strikethrough => "</s>",
        MarkKind::Code => "</code>",
        MarkKind::Link => "</a>",
        MarkKind::TextColor | MarkKind::Highlight | MarkKind::FontFamily | MarkKind::FontSize => {
            "</span>"
        }
    }
}

fn escape_text_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\n' => out.push_str("<br>"),
            other => out.push(other),
        }
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn decode_entities(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match decode_entity(rest) {
            Some((ch, used)) => {
                out.push(ch);
                rest = &rest[used..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decodes an entity at the start of `src` (which begins with `&`),
/// returning the character and the number of bytes consumed.
fn decode_entity(src: &str) -> Option<(char, usize)> {
    let end = src.char_indices().take(12).find(|(_, ch)| *ch == ';')?.0;
    let name = &src[1..end];
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" | "#39" => '\'',
        "nbsp" => '\u{a0}',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)?
        }
    };
    Some((ch, end + 1))
}

fn parse_attrs(src: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut rest = src.trim();
    while !rest.is_empty() {
        let key_end = rest
            .find(|ch: char| ch == '=' || ch.is_whitespace())
            .unwrap_or(rest.len());
        let key = rest[..key_end].to_ascii_lowercase();
        rest = rest[key_end..].trim_start();
        let mut value = String::new();
        if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let quote = after_eq.chars().next().filter(|ch| *ch == '"' || *ch == '\'');
            if let Some(quote) = quote {
                let body = &after_eq[1..];
                let close = body.find(quote).unwrap_or(body.len());
                value = decode_entities(&body[..close]);
                rest = body.get(close + 1..).unwrap_or_default();
            } else {
                let close = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                value = decode_entities(&after_eq[..close]);
                rest = &after_eq[close..];
            }
        }
        if !key.is_empty() {
            attrs.push((key, value));
        }
        rest = rest.trim_start();
    }
    attrs
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let value = value.trim();
            (!value.is_empty()).then(|| (property.trim().to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

enum Token<'a> {
    Char(char),
    Break,
    Open { name: String, attrs: &'a str },
    Close(String),
}

/// Markup tokenizer yielding each token with the byte range it covers.
struct Tokens<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = (Range<usize>, Token<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let start = self.pos;
            let rest = self.src.get(start..)?;
            let ch = rest.chars().next()?;

            if ch == '<'
                && let Some(close) = rest.find('>')
            {
                self.pos = start + close + 1;
                let inner = rest[1..close].trim();
                if let Some(name) = inner.strip_prefix('/') {
                    return Some((start..self.pos, Token::Close(name.trim().to_ascii_lowercase())));
                }
                let self_closing = inner.ends_with('/');
                let inner = inner.trim_end_matches('/').trim_end();
                let name_end = inner.find(char::is_whitespace).unwrap_or(inner.len());
                let name = inner[..name_end].to_ascii_lowercase();
                if name == "br" {
                    return Some((start..self.pos, Token::Break));
                }
                if self_closing || name.is_empty() || name.starts_with('!') {
                    continue;
                }
                return Some((
                    start..self.pos,
                    Token::Open {
                        name,
                        attrs: &inner[name_end..],
                    },
                ));
            }

            if ch == '&'
                && let Some((decoded, used)) = decode_entity(rest)
            {
                self.pos = start + used;
                return Some((start..self.pos, Token::Char(decoded)));
            }

            self.pos = start + ch.len_utf8();
            return Some((start..self.pos, Token::Char(ch)));
        }
    }
}
