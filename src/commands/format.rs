//! Inline formatting and block styling.

use super::Commands;
use crate::core::mark::{InlineFormat, MarkKind};
use crate::doc::rich_text::RichText;
use crate::doc::{Alignment, BlockKind, Region};
use crate::selection::{CursorPoint, SelectionDescriptor};
use std::ops::Range;
use tracing::warn;

const MAX_FONT_SIZE_PX: f64 = 400.0;

impl Commands<'_> {
    /// Adds `format` to the selection, or removes it when the whole
    /// selection already carries it. Collapsed selections, selections across
    /// regions and blocks without inline formatting are left alone.
    pub fn toggle_inline_format(
        &mut self,
        selection: &SelectionDescriptor,
        format: InlineFormat,
    ) -> Option<SelectionDescriptor> {
        let range = selection.region_range().filter(|range| !range.is_empty())?;
        let text = self.formattable_text(&selection.anchor)?;
        let range = clamp(range, text.len())?;
        let kind = format.kind();
        let marks = text.marks_mut();
        if marks.covers(kind, range.clone()) {
            marks.remove(kind, range);
        } else {
            marks.add(crate::core::mark::Mark::new(kind, range));
        }
        Some(selection.clone())
    }

    /// Whether `format` applies at the selection: the whole range for a
    /// range, the grapheme before the caret for a caret.
    pub fn is_format_active(&self, selection: &SelectionDescriptor, format: InlineFormat) -> bool {
        self.active_marks(selection).contains(&format.kind())
    }

    /// Mark kinds wrapping the selection, outermost first.
    pub fn active_marks(&self, selection: &SelectionDescriptor) -> Vec<MarkKind> {
        let Some(range) = selection.region_range() else {
            return Vec::new();
        };
        let anchor = &selection.anchor;
        let Some(text) = self
            .doc
            .get(anchor.block)
            .and_then(|block| block.text(&anchor.region))
        else {
            return Vec::new();
        };
        let probe = if range.is_empty() {
            match range.start.checked_sub(1) {
                Some(before) => before..range.start,
                None => return Vec::new(),
            }
        } else {
            range
        };
        text.marks()
            .marks_at(probe.start)
            .into_iter()
            .filter(|mark| text.marks().covers(mark.kind, probe.clone()))
            .map(|mark| mark.kind)
            .collect()
    }

    /// Aligns a table cell when the point is in one, otherwise the block.
    pub fn set_alignment(&mut self, at: &CursorPoint, alignment: Alignment) -> bool {
        let Some(block) = self.doc.get_mut(at.block) else {
            return false;
        };
        let target = match (&mut block.kind, &at.region) {
            (BlockKind::Table(table), Region::Cell { row, col }) => match table.cell_mut(*row, *col) {
                Some(cell) => {
                    let changed = cell.align != Some(alignment);
                    cell.align = Some(alignment);
                    return changed;
                }
                None => return false,
            },
            (BlockKind::Paragraph { alignment, .. }, _)
            | (BlockKind::Heading { alignment, .. }, _)
            | (BlockKind::Quote { alignment, .. }, _) => alignment,
            _ => return false,
        };
        let changed = *target != alignment;
        *target = alignment;
        changed
    }

    pub fn set_text_color(&mut self, selection: &SelectionDescriptor, color: Option<&str>) -> bool {
        self.set_style(selection, MarkKind::TextColor, color, normalize_color)
    }

    pub fn set_highlight(&mut self, selection: &SelectionDescriptor, color: Option<&str>) -> bool {
        self.set_style(selection, MarkKind::Highlight, color, normalize_color)
    }

    pub fn set_font_family(
        &mut self,
        selection: &SelectionDescriptor,
        family: Option<&str>,
    ) -> bool {
        self.set_style(selection, MarkKind::FontFamily, family, normalize_font_family)
    }

    /// Wraps the selection in an explicit size; any CSS length from 1 to
    /// 400px works, bare numbers are pixels.
    pub fn set_font_size(&mut self, selection: &SelectionDescriptor, size: Option<&str>) -> bool {
        self.set_style(selection, MarkKind::FontSize, size, normalize_font_size)
    }

    fn set_style(
        &mut self,
        selection: &SelectionDescriptor,
        kind: MarkKind,
        value: Option<&str>,
        normalize: fn(&str) -> Option<String>,
    ) -> bool {
        let value = match value {
            Some(raw) => match normalize(raw) {
                Some(value) => Some(value),
                None => {
                    warn!(?kind, value = raw, "rejected style value");
                    return false;
                }
            },
            None => None,
        };
        let Some(range) = selection.region_range().filter(|range| !range.is_empty()) else {
            return false;
        };
        let Some(text) = self.formattable_text(&selection.anchor) else {
            return false;
        };
        let Some(range) = clamp(range, text.len()) else {
            return false;
        };
        let before = text.marks().clone();
        text.marks_mut().set_valued(kind, value, range);
        *text.marks() != before
    }

    fn formattable_text(&mut self, at: &CursorPoint) -> Option<&mut RichText> {
        let block = self.doc.get(at.block)?;
        let meta = self.registry.meta(&block.block_type())?;
        if !meta.inline_formatting {
            return None;
        }
        self.doc.get_mut(at.block)?.text_mut(&at.region)
    }
}

fn clamp(range: Range<usize>, len: usize) -> Option<Range<usize>> {
    let end = range.end.min(len);
    let start = range.start.min(end);
    (start < end).then_some(start..end)
}

/// Accepts hex colors, functional notations and plain color names.
pub fn normalize_color(raw: &str) -> Option<String> {
    let value = raw.trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        let valid = matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|ch| ch.is_ascii_hexdigit());
        return valid.then_some(value);
    }
    for function in ["rgba(", "rgb(", "hsla(", "hsl("] {
        if let Some(args) = value.strip_prefix(function) {
            let args = args.strip_suffix(')')?;
            let valid = !args.trim().is_empty()
                && args
                    .chars()
                    .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | ',' | '%' | ' ' | '/'));
            return valid.then_some(value);
        }
    }
    let named = !value.is_empty() && value.len() <= 32 && value.chars().all(|ch| ch.is_ascii_alphabetic());
    named.then_some(value)
}

pub fn normalize_font_family(raw: &str) -> Option<String> {
    let value = raw.trim();
    let valid = !value.is_empty()
        && value.len() <= 128
        && value
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, ' ' | ',' | '-' | '"' | '\'' | '_'));
    valid.then(|| value.to_string())
}

pub fn normalize_font_size(raw: &str) -> Option<String> {
    let value = raw.trim().to_ascii_lowercase();
    let split = value
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let amount: f64 = number.parse().ok()?;
    let px = match unit {
        "" | "px" => amount,
        "pt" => amount * 4.0 / 3.0,
        "em" | "rem" => amount * 16.0,
        "%" => amount * 16.0 / 100.0,
        _ => return None,
    };
    if !(1.0..=MAX_FONT_SIZE_PX).contains(&px) {
        return None;
    }
    let unit = if unit.is_empty() { "px" } else { unit };
    Some(format!("{number}{unit}"))
}
