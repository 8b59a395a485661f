//! Cursor and selection tracking.
//!
//! The rendering layer reports selections in its own coordinates: a block
//! id, a region and a byte offset into that region's markup. Descriptors
//! store visible grapheme offsets instead, so they stay valid when
//! formatting wraps or unwraps the same text in new elements.

use crate::core::BlockId;
use crate::core::mark::{Mark, MarkKind};
use crate::doc::rich_text::{markup_offset, visible_offset, RichText};
use crate::doc::{Block, Document, Region};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::Range;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPoint {
    pub block: BlockId,
    pub region: Region,
    /// Visible grapheme offset inside the region.
    pub offset: usize,
    /// Block position when the point was taken; restore falls back to it
    /// when the block is gone.
    pub index_hint: usize,
}

impl CursorPoint {
    pub fn new(block: BlockId, region: Region, offset: usize) -> Self {
        Self {
            block,
            region,
            offset,
            index_hint: 0,
        }
    }

    pub fn with_hint(mut self, doc: &Document) -> Self {
        if let Some(index) = doc.position(self.block) {
            self.index_hint = index;
        }
        self
    }

    /// Document order: block position, then region order, then offset.
    pub fn cmp_in(&self, other: &CursorPoint, doc: &Document) -> Ordering {
        let block_index = |point: &CursorPoint| doc.position(point.block).unwrap_or(point.index_hint);
        let region_index = |point: &CursorPoint| {
            doc.get(point.block)
                .and_then(|block| block.regions().iter().position(|region| *region == point.region))
                .unwrap_or(0)
        };
        block_index(self)
            .cmp(&block_index(other))
            .then_with(|| region_index(self).cmp(&region_index(other)))
            .then_with(|| self.offset.cmp(&other.offset))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDescriptor {
    pub anchor: CursorPoint,
    pub focus: CursorPoint,
}

impl SelectionDescriptor {
    pub fn collapsed(point: CursorPoint) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn range(anchor: CursorPoint, focus: CursorPoint) -> Self {
        Self { anchor, focus }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor.block == self.focus.block
            && self.anchor.region == self.focus.region
            && self.anchor.offset == self.focus.offset
    }

    pub fn is_multi_block(&self) -> bool {
        self.anchor.block != self.focus.block
    }

    /// Offsets as an ordered range when both ends sit in the same region.
    pub fn region_range(&self) -> Option<Range<usize>> {
        (self.anchor.block == self.focus.block && self.anchor.region == self.focus.region)
            .then(|| crate::core::ordered(self.anchor.offset, self.focus.offset))
    }

    /// `(start, end)` in document order.
    pub fn bounds(&self, doc: &Document) -> (CursorPoint, CursorPoint) {
        match self.anchor.cmp_in(&self.focus, doc) {
            Ordering::Greater => (self.focus.clone(), self.anchor.clone()),
            _ => (self.anchor.clone(), self.focus.clone()),
        }
    }
}

/// A point in the rendering layer's coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPoint {
    /// Enclosing block, if the point is inside one.
    pub block: Option<BlockId>,
    pub region: Region,
    /// Byte offset into the region's markup.
    pub markup_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSelection {
    pub anchor: HostPoint,
    pub focus: HostPoint,
}

/// The rendering layer's live selection.
pub trait SelectionHost {
    fn live_selection(&self) -> Option<HostSelection>;

    fn apply_selection(&mut self, selection: Option<HostSelection>);

    /// The platform's own "create link" primitive. Works on a copy of the
    /// region text and returns the result, or `None` when unsupported. It may
    /// move or collapse the live selection.
    fn native_create_link(
        &mut self,
        _text: &RichText,
        _range: Range<usize>,
        _href: &str,
    ) -> Option<RichText> {
        None
    }
}

/// In-memory host for tests and embedding without a UI.
#[derive(Debug, Default, Clone)]
pub struct HeadlessHost {
    selection: Option<HostSelection>,
    native_links: bool,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host whose `native_create_link` is available.
    pub fn with_native_links() -> Self {
        Self {
            selection: None,
            native_links: true,
        }
    }

    pub fn current(&self) -> Option<&HostSelection> {
        self.selection.as_ref()
    }

    /// Places the live selection at visible offsets of `doc`, as a user
    /// clicking or dragging would.
    pub fn select(&mut self, doc: &Document, anchor: &CursorPoint, focus: &CursorPoint) {
        self.selection = Some(HostSelection {
            anchor: to_host_point(doc, anchor),
            focus: to_host_point(doc, focus),
        });
    }

    pub fn place(&mut self, doc: &Document, point: &CursorPoint) {
        self.select(doc, point, point);
    }

    pub fn blur(&mut self) {
        self.selection = None;
    }
}

impl SelectionHost for HeadlessHost {
    fn live_selection(&self) -> Option<HostSelection> {
        self.selection.clone()
    }

    fn apply_selection(&mut self, selection: Option<HostSelection>) {
        self.selection = selection;
    }

    fn native_create_link(
        &mut self,
        text: &RichText,
        range: Range<usize>,
        href: &str,
    ) -> Option<RichText> {
        if !self.native_links {
            return None;
        }
        let mut linked = text.clone();
        let end = range.end.min(linked.len());
        let start = range.start.min(end);
        if start == end {
            return Some(linked);
        }
        let marks = linked.marks_mut();
        marks.remove(MarkKind::Link, start..end);
        marks.add(Mark {
            tagged: false,
            ..Mark::valued(MarkKind::Link, href, start..end)
        });
        // the platform collapses the selection to the end of the new link
        if let Some(selection) = self.selection.as_mut() {
            selection.anchor = selection.focus.clone();
        }
        Some(linked)
    }
}

/// Captures, saves and restores selections against a host.
#[derive(Debug, Default, Clone)]
pub struct Selection {
    saved: Option<SelectionDescriptor>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the live selection. `None` when nothing is focused or the
    /// selection is outside any block.
    pub fn capture<H: SelectionHost + ?Sized>(
        &self,
        host: &H,
        doc: &Document,
    ) -> Option<SelectionDescriptor> {
        let live = host.live_selection()?;
        let anchor = from_host_point(doc, &live.anchor)?;
        let focus = from_host_point(doc, &live.focus).unwrap_or_else(|| anchor.clone());
        Some(SelectionDescriptor { anchor, focus })
    }

    /// Captures and keeps an independent copy.
    pub fn save<H: SelectionHost + ?Sized>(
        &mut self,
        host: &H,
        doc: &Document,
    ) -> Option<SelectionDescriptor> {
        self.saved = self.capture(host, doc);
        self.saved.clone()
    }

    pub fn saved(&self) -> Option<&SelectionDescriptor> {
        self.saved.as_ref()
    }

    pub fn clear_saved(&mut self) {
        self.saved = None;
    }

    /// Re-applies a descriptor (the saved one when `None` is passed),
    /// clamping to the closest valid position. A point whose block is gone
    /// lands in the block now at its old position, or at the document end.
    /// Returns what was applied.
    pub fn restore<H: SelectionHost + ?Sized>(
        &self,
        host: &mut H,
        doc: &Document,
        descriptor: Option<&SelectionDescriptor>,
    ) -> Option<SelectionDescriptor> {
        let Some(descriptor) = descriptor.or(self.saved.as_ref()) else {
            host.apply_selection(None);
            return None;
        };
        let Some(anchor) = resolve(doc, &descriptor.anchor) else {
            host.apply_selection(None);
            return None;
        };
        let focus = resolve(doc, &descriptor.focus).unwrap_or_else(|| anchor.clone());
        let resolved = SelectionDescriptor { anchor, focus };
        apply(host, doc, &resolved);
        Some(resolved)
    }

    pub fn move_to_start<H: SelectionHost + ?Sized>(
        &self,
        host: &mut H,
        doc: &Document,
        block: BlockId,
    ) -> Option<SelectionDescriptor> {
        let point = start_of(doc, block)?;
        let descriptor = SelectionDescriptor::collapsed(point);
        apply(host, doc, &descriptor);
        Some(descriptor)
    }

    pub fn move_to_end<H: SelectionHost + ?Sized>(
        &self,
        host: &mut H,
        doc: &Document,
        block: BlockId,
    ) -> Option<SelectionDescriptor> {
        let point = end_of(doc, block)?;
        let descriptor = SelectionDescriptor::collapsed(point);
        apply(host, doc, &descriptor);
        Some(descriptor)
    }

    pub fn is_multi_block_selection<H: SelectionHost + ?Sized>(
        &self,
        host: &H,
        doc: &Document,
    ) -> bool {
        self.capture(host, doc)
            .is_some_and(|selection| selection.is_multi_block())
    }
}

/// Collapsed point at the start of a block's first region.
pub fn start_of(doc: &Document, block: BlockId) -> Option<CursorPoint> {
    let found = doc.get(block)?;
    let region = found.regions().into_iter().next().unwrap_or(Region::Main);
    Some(CursorPoint::new(block, region, 0).with_hint(doc))
}

/// Collapsed point at the end of a block's last region.
pub fn end_of(doc: &Document, block: BlockId) -> Option<CursorPoint> {
    let found = doc.get(block)?;
    let region = found.regions().into_iter().last().unwrap_or(Region::Main);
    let offset = found.text(&region).map_or(0, RichText::len);
    Some(CursorPoint::new(block, region, offset).with_hint(doc))
}

fn region_len(block: &Block, region: &Region) -> Option<usize> {
    block.text(region).map(RichText::len)
}

/// Maps a descriptor point onto the current document.
fn resolve(doc: &Document, point: &CursorPoint) -> Option<CursorPoint> {
    if let Some(block) = doc.get(point.block) {
        return Some(match region_len(block, &point.region) {
            Some(len) => CursorPoint {
                offset: point.offset.min(len),
                ..point.clone()
            }
            .with_hint(doc),
            None => start_of(doc, point.block)?,
        });
    }
    debug!(block = %point.block, hint = point.index_hint, "cursor block gone, falling back");
    match doc.block_at(point.index_hint) {
        Some(block) => start_of(doc, block.id),
        None => end_of(doc, doc.last()?.id),
    }
}

fn from_host_point(doc: &Document, point: &HostPoint) -> Option<CursorPoint> {
    let block = doc.get(point.block?)?;
    let (region, offset) = match block.text(&point.region) {
        Some(text) => (
            point.region.clone(),
            visible_offset(&text.to_markup(), point.markup_offset),
        ),
        None => match block.regions().into_iter().next() {
            Some(region) => (region, 0),
            None => (Region::Main, 0),
        },
    };
    Some(CursorPoint::new(block.id, region, offset).with_hint(doc))
}

fn to_host_point(doc: &Document, point: &CursorPoint) -> HostPoint {
    let markup = doc
        .get(point.block)
        .and_then(|block| block.text(&point.region))
        .map(RichText::to_markup)
        .unwrap_or_default();
    HostPoint {
        block: Some(point.block),
        region: point.region.clone(),
        markup_offset: markup_offset(&markup, point.offset),
    }
}

fn apply<H: SelectionHost + ?Sized>(host: &mut H, doc: &Document, descriptor: &SelectionDescriptor) {
    host.apply_selection(Some(HostSelection {
        anchor: to_host_point(doc, &descriptor.anchor),
        focus: to_host_point(doc, &descriptor.focus),
    }));
}
