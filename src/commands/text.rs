//! Typing, deletion and Enter inside list items.

use super::Commands;
use crate::core::{fresh_id, BlockId, ItemId};
use crate::doc::rich_text::RichText;
use crate::doc::{Block, BlockKind, EditError, ListItem, ListStyle, Region};
use crate::selection::{CursorPoint, SelectionDescriptor};
use std::ops::Range;
use tracing::debug;

impl Commands<'_> {
    /// Checks that `point` names a text region of a block in the document
    /// and an offset inside it. Returns the region length.
    pub fn locate(&self, point: &CursorPoint) -> Result<usize, EditError> {
        let block = self
            .doc
            .get(point.block)
            .ok_or(EditError::BlockNotFound(point.block))?;
        let len = block
            .text(&point.region)
            .ok_or(EditError::RegionNotFound(point.block))?
            .len();
        if point.offset > len {
            return Err(EditError::InvalidOffset {
                block: point.block,
                offset: point.offset,
                len,
            });
        }
        Ok(len)
    }

    /// Types `text` at the selection. A range inside one region is replaced;
    /// a range spanning regions or blocks is deleted first. The new text
    /// takes the marks wrapping the insertion point.
    pub fn insert_text(
        &mut self,
        selection: &SelectionDescriptor,
        text: &str,
    ) -> Option<CursorPoint> {
        let at = match selection.region_range() {
            Some(range) => {
                let point = &selection.anchor;
                let region_text = self.doc.get_mut(point.block)?.text_mut(&point.region)?;
                let end = range.end.min(region_text.len());
                let start = range.start.min(end);
                region_text.delete(start..end);
                CursorPoint {
                    offset: start,
                    ..point.clone()
                }
            }
            None => self.delete_selection(selection)?,
        };
        let Some(region_text) = self
            .doc
            .get_mut(at.block)
            .and_then(|block| block.text_mut(&at.region))
        else {
            return Some(at);
        };
        let offset = at.offset.min(region_text.len());
        let added = region_text.insert(offset, text);
        Some(
            CursorPoint {
                offset: offset + added,
                ..at
            }
            .with_hint(self.doc),
        )
    }

    /// Backspace at a caret. Inside text it removes the previous grapheme.
    /// At the start of a nested list item it outdents the item; at the start
    /// of a top-level item it joins the item onto the one before it. At the
    /// start of a block it merges the block into the previous one, or drops
    /// it when it is empty and cannot merge.
    pub fn delete_backward(&mut self, at: &CursorPoint) -> Option<CursorPoint> {
        let len = self.doc.get(at.block)?.text(&at.region)?.len();
        let offset = at.offset.min(len);
        if offset > 0 {
            let text = self.doc.get_mut(at.block)?.text_mut(&at.region)?;
            text.delete(offset - 1..offset);
            return Some(
                CursorPoint {
                    offset: offset - 1,
                    ..at.clone()
                }
                .with_hint(self.doc),
            );
        }
        match at.region {
            Region::Item { id } => self.join_item_backward(at.block, id),
            Region::Main => self.join_block_backward(at.block),
            _ => {
                let block = self.doc.get(at.block)?;
                let regions = block.regions();
                let index = regions.iter().position(|region| *region == at.region)?;
                let previous = regions.get(index.checked_sub(1)?)?.clone();
                let len = block.text(&previous)?.len();
                Some(CursorPoint::new(at.block, previous, len).with_hint(self.doc))
            }
        }
    }

    /// Deletes a range selection. Within a block, regions strictly inside
    /// the range are cleared (list items without children are removed) and
    /// list items at both ends are joined. Across blocks, the first block
    /// keeps its text up to the start, the last block keeps its text from
    /// the end, the blocks in between go, and the remainder of the last
    /// block is merged into the first when the block types allow it.
    pub fn delete_selection(&mut self, selection: &SelectionDescriptor) -> Option<CursorPoint> {
        if selection.is_collapsed() {
            return None;
        }
        let (start, end) = selection.bounds(self.doc);
        if start.block == end.block {
            let block = self.doc.get_mut(start.block)?;
            if start.region == end.region {
                cut_region(block, &start.region, start.offset..end.offset);
            } else {
                let regions = block.regions();
                let first = regions.iter().position(|region| *region == start.region)?;
                let last = regions.iter().position(|region| *region == end.region)?;
                cut_region(block, &start.region, start.offset..usize::MAX);
                cut_region(block, &end.region, 0..end.offset);
                clear_regions(block, &regions[first + 1..last]);
                join_items(block, &start.region, &end.region);
            }
            return Some(start.with_hint(self.doc));
        }

        let start_index = self.doc.position(start.block)?;
        let end_index = self.doc.position(end.block)?;
        let between: Vec<BlockId> = self.doc.blocks()[start_index + 1..end_index]
            .iter()
            .map(|block| block.id)
            .collect();
        for id in &between {
            self.doc.remove(*id);
        }
        let start_kept = self
            .doc
            .get_mut(start.block)
            .is_some_and(|block| cut_after(block, &start));
        let end_kept = self
            .doc
            .get_mut(end.block)
            .is_some_and(|block| cut_before(block, &end));
        if !end_kept {
            self.doc.remove(end.block);
        }
        if !start_kept {
            self.doc.remove(start.block);
        }
        debug!(removed = between.len(), start_kept, end_kept, "deleted selection across blocks");

        if start_kept {
            let start_is_last = self
                .doc
                .get(start.block)
                .and_then(|block| block.regions().last().cloned())
                .as_ref()
                == Some(&start.region);
            if end_kept
                && start_is_last
                && let Some(point) =
                    self.merge_into(end.block, start.block, Some(start.region.clone()))
            {
                return Some(point);
            }
            return Some(start.with_hint(self.doc));
        }
        if end_kept {
            return Some(self.focus_start(end.block));
        }
        let landing = match self.doc.block_at(start_index) {
            Some(block) => block.id,
            None if self.doc.is_empty() => {
                let block = self.registry.construct(self.registry.default_type(), None);
                self.insert_unique(0, block)
            }
            None => self.doc.last()?.id,
        };
        Some(self.focus_start(landing))
    }

    /// Enter inside a list item. The text after the caret moves into a new
    /// item right after the current one. An empty item leaves its level
    /// instead: a nested one is outdented, the last top-level one is replaced
    /// by a paragraph after the list, and the only item turns the whole list
    /// into a paragraph.
    pub fn split_list_item(&mut self, at: &CursorPoint) -> Option<CursorPoint> {
        let Region::Item { id } = at.region else {
            return None;
        };
        let block_id = at.block;
        let (style, items) = match &mut self.doc.get_mut(block_id)?.kind {
            BlockKind::List { style, items, .. } => (*style, items),
            _ => return None,
        };
        if items.value(id)?.content.is_empty() {
            if items.parent(id).is_some() {
                items.outdent(id);
                return Some(CursorPoint::new(block_id, at.region.clone(), 0).with_hint(self.doc));
            }
            if items.len() == 1 {
                let default = self.registry.default_type().clone();
                return self.transform_block(block_id, &default);
            }
            if items.next_sibling(id).is_none() && items.children(id).is_empty() {
                items.remove(id);
                let index = self.doc.position(block_id)?;
                let block = self.registry.construct(self.registry.default_type(), None);
                let new_id = self.insert_unique(index + 1, block);
                debug!(block = %block_id, "left list from empty last item");
                return Some(self.focus_start(new_id));
            }
        }
        let tail = items.value_mut(id)?.content.split_off(at.offset);
        let new_id = fresh_id();
        let item = ListItem {
            content: tail,
            checked: (style == ListStyle::Check).then_some(false),
        };
        items.insert_after(id, new_id, item).ok()?;
        Some(CursorPoint::new(block_id, Region::Item { id: new_id }, 0).with_hint(self.doc))
    }

    fn join_item_backward(&mut self, block: BlockId, id: ItemId) -> Option<CursorPoint> {
        let items = self.list_items(block).ok()?;
        if items.parent(id).is_some() {
            items.outdent(id);
            return Some(CursorPoint::new(block, Region::Item { id }, 0).with_hint(self.doc));
        }
        let order = items.depth_first();
        let index = order.iter().position(|(item, _)| *item == id)?;
        match index.checked_sub(1).map(|previous| order[previous].0) {
            Some(previous) if items.children(id).is_empty() => {
                let removed = items.remove(id)?;
                let target = &mut items.value_mut(previous)?.content;
                let boundary = target.len();
                target.append(&removed.content);
                debug!(%block, item = %id, "joined list item into previous");
                Some(
                    CursorPoint::new(block, Region::Item { id: previous }, boundary)
                        .with_hint(self.doc),
                )
            }
            None if items.len() == 1 && items.value(id)?.content.is_empty() => {
                let default = self.registry.default_type().clone();
                self.transform_block(block, &default)
            }
            _ => None,
        }
    }

    fn join_block_backward(&mut self, id: BlockId) -> Option<CursorPoint> {
        let index = self.doc.position(id)?;
        let previous = self.doc.block_at(index.checked_sub(1)?)?.id;
        if let Some(point) = self.merge_blocks(id, previous) {
            return Some(point);
        }
        let block = self.doc.get(id)?;
        let empty = block
            .regions()
            .iter()
            .all(|region| block.text(region).is_none_or(RichText::is_empty));
        if !empty {
            return None;
        }
        self.doc.remove(id);
        debug!(block = %id, "removed empty block on backspace");
        Some(self.focus_end(previous))
    }
}

fn cut_region(block: &mut Block, region: &Region, range: Range<usize>) {
    if let Some(text) = block.text_mut(region) {
        text.delete(range);
    }
}

/// Keeps everything up to `point`. `false` when the block has no text.
fn cut_after(block: &mut Block, point: &CursorPoint) -> bool {
    let regions = block.regions();
    let Some(index) = regions.iter().position(|region| *region == point.region) else {
        return !regions.is_empty();
    };
    cut_region(block, &point.region, point.offset..usize::MAX);
    clear_regions(block, &regions[index + 1..]);
    true
}

/// Keeps everything from `point` on. `false` when the block has no text.
fn cut_before(block: &mut Block, point: &CursorPoint) -> bool {
    let regions = block.regions();
    let Some(index) = regions.iter().position(|region| *region == point.region) else {
        return !regions.is_empty();
    };
    cut_region(block, &point.region, 0..point.offset);
    clear_regions(block, &regions[..index]);
    true
}

fn clear_regions(block: &mut Block, regions: &[Region]) {
    for region in regions {
        if let (BlockKind::List { items, .. }, Region::Item { id }) = (&mut block.kind, region)
            && items.children(*id).is_empty()
            && items.len() > 1
        {
            items.remove(*id);
            continue;
        }
        cut_region(block, region, 0..usize::MAX);
    }
}

fn join_items(block: &mut Block, first: &Region, second: &Region) {
    let (BlockKind::List { items, .. }, Region::Item { id: keep }, Region::Item { id: drop }) =
        (&mut block.kind, first, second)
    else {
        return;
    };
    if !items.children(*drop).is_empty() {
        return;
    }
    if let Some(removed) = items.remove(*drop)
        && let Some(target) = items.value_mut(*keep)
    {
        target.content.append(&removed.content);
    }
}
