//! Core building blocks shared by every layer of the editor.
//!
//! - [`BlockId`], [`ItemId`], [`RowId`] - stable identifiers, never reused
//! - grapheme helpers - every offset in the engine counts grapheme clusters,
//!   the unit a user sees as one character
//! - [`mark`] - inline formatting intervals over those offsets
//! - [`tree`] - the arena that holds nested list items

use std::ops::Range;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

pub mod mark;
pub mod tree;

pub type BlockId = Uuid;
pub type ItemId = Uuid;
pub type RowId = Uuid;

/// Generates a fresh identifier for a block, list item or table row.
pub fn fresh_id() -> Uuid {
    Uuid::new_v4()
}

/// Parses a stored identifier, returning `None` for anything that is not a
/// well-formed UUID (including the nil UUID).
pub fn parse_id(value: &str) -> Option<Uuid> {
    Uuid::parse_str(value.trim()).ok().filter(|id| !id.is_nil())
}

pub fn grapheme_len(text: &str) -> usize {
    text.graphemes(true).count()
}

pub fn grapheme_offset_to_byte(text: &str, grapheme_offset: usize) -> Option<usize> {
    if grapheme_offset == 0 {
        return Some(0);
    }

    let mut count = 0;
    for (byte_index, _) in text.grapheme_indices(true) {
        if count == grapheme_offset {
            return Some(byte_index);
        }
        count += 1;
    }
    if count == grapheme_offset {
        Some(text.len())
    } else {
        None
    }
}

pub fn is_grapheme_boundary(text: &str, byte_offset: usize) -> bool {
    if byte_offset == 0 || byte_offset == text.len() {
        return true;
    }
    text.grapheme_indices(true)
        .any(|(index, _)| index == byte_offset)
}

/// Number of graphemes that start before `byte_offset`.
pub fn graphemes_before(text: &str, byte_offset: usize) -> usize {
    text.grapheme_indices(true)
        .take_while(|(index, _)| *index < byte_offset)
        .count()
}

/// First grapheme boundary at or after `byte_offset`.
pub fn next_grapheme_boundary(text: &str, byte_offset: usize) -> usize {
    text.grapheme_indices(true)
        .map(|(index, _)| index)
        .find(|index| *index >= byte_offset)
        .unwrap_or(text.len())
}

/// Returns the substring covering the grapheme range, clamped to the text.
pub fn grapheme_slice(text: &str, range: Range<usize>) -> &str {
    let len = grapheme_len(text);
    let start = range.start.min(len);
    let end = range.end.clamp(start, len);
    let from = grapheme_offset_to_byte(text, start).unwrap_or(text.len());
    let to = grapheme_offset_to_byte(text, end).unwrap_or(text.len());
    &text[from..to]
}

/// Orders a pair of offsets into a half-open range.
pub fn ordered(a: usize, b: usize) -> Range<usize> {
    if a <= b { a..b } else { b..a }
}
