//! Editing commands.
//!
//! Every command is synchronous and either applies completely or leaves the
//! document untouched. User-level edge cases (nothing selected, boundary
//! moves, unregistered types) come back as `None`/`false`; only calls that
//! name blocks outside the document return [`EditError`].

use crate::config::EditorConfig;
use crate::core::tree::ItemTree;
use crate::core::{fresh_id, BlockId, ItemId, RowId};
use crate::doc::rich_text::RichText;
use crate::doc::{
    Block, BlockError, BlockKind, BlockType, Document, EditError, ListItem, ListStyle, Region,
};
use crate::registry::{convert, BlockRegistry};
use crate::selection::{end_of, start_of, CursorPoint};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub mod format;
pub mod link;
pub mod text;

/// Where a new block goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Before(BlockId),
    After(BlockId),
    End,
}

/// A finished upload, handed over by the upload collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub url: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("upload failed: {message}")]
pub struct UploadError {
    pub message: String,
}

pub struct Commands<'a> {
    doc: &'a mut Document,
    registry: &'a BlockRegistry,
    config: &'a EditorConfig,
}

impl<'a> Commands<'a> {
    pub fn new(
        doc: &'a mut Document,
        registry: &'a BlockRegistry,
        config: &'a EditorConfig,
    ) -> Self {
        Self {
            doc,
            registry,
            config,
        }
    }

    pub fn document(&self) -> &Document {
        self.doc
    }

    /// Constructs a block and splices it in. An unknown reference block
    /// appends. Focus goes to the start of the new block.
    pub fn insert_block(
        &mut self,
        ty: &BlockType,
        data: Option<&Value>,
        placement: Placement,
    ) -> CursorPoint {
        let block = self.registry.construct(ty, data);
        let id = block.id;
        let index = match placement {
            Placement::Before(reference) => self.doc.position(reference),
            Placement::After(reference) => self.doc.position(reference).map(|index| index + 1),
            Placement::End => None,
        }
        .unwrap_or(self.doc.len());
        self.insert_unique(index, block);
        debug!(block = %id, block_type = %ty, index, "inserted block");
        self.focus_start(id)
    }

    /// Removes a block. Focus moves to the next block, else the previous
    /// one. Removing the only block leaves a fresh default block behind.
    pub fn delete_block(&mut self, id: BlockId) -> Result<CursorPoint, EditError> {
        let (index, _) = self.doc.remove(id).ok_or(EditError::BlockNotFound(id))?;
        if self.doc.is_empty() {
            let block = self.registry.construct(self.registry.default_type(), None);
            let replacement = block.id;
            self.insert_unique(0, block);
            return Ok(self.focus_start(replacement));
        }
        Ok(match self.doc.block_at(index).map(|block| block.id) {
            Some(next) => self.focus_start(next),
            None => {
                let previous = self.doc.block_at(index - 1).map(|block| block.id);
                self.focus_end(previous.unwrap_or(id))
            }
        })
    }

    pub fn move_block_up(&mut self, id: BlockId) -> bool {
        match self.doc.position(id) {
            Some(index) if index > 0 => {
                self.doc.swap(index, index - 1);
                true
            }
            _ => false,
        }
    }

    pub fn move_block_down(&mut self, id: BlockId) -> bool {
        match self.doc.position(id) {
            Some(index) if index + 1 < self.doc.len() => {
                self.doc.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }

    /// Deep copy under a new id, placed right after the original.
    pub fn duplicate_block(&mut self, id: BlockId) -> Option<CursorPoint> {
        let index = self.doc.position(id)?;
        let copy = self.doc.get(id)?.duplicate();
        let copy_id = self.insert_unique(index + 1, copy);
        Some(self.focus_start(copy_id))
    }

    /// Replaces a block with its conversion to `ty`. `None` when the type is
    /// unregistered or the block is unknown.
    pub fn transform_block(&mut self, id: BlockId, ty: &BlockType) -> Option<CursorPoint> {
        let block = self.doc.get(id)?;
        let converted = self.registry.transform(block, ty)?;
        if converted == *block {
            return Some(self.focus_start(id));
        }
        let new_id = converted.id;
        if self.doc.replace(id, converted).is_err() {
            warn!(block = %new_id, "converted block id collides, keeping original");
            return None;
        }
        Some(self.focus_start(new_id))
    }

    /// Converts every listed block; blocks that cannot convert are skipped.
    pub fn transform_blocks(&mut self, ids: &[BlockId], ty: &BlockType) -> Option<CursorPoint> {
        let mut first = None;
        for id in ids {
            if let Some(point) = self.transform_block(*id, ty) {
                first.get_or_insert(point);
            }
        }
        first
    }

    /// Appends `source`'s content to `target` and removes `source`. Text goes
    /// into the region [`Commands::split_block`] splits; a second text region
    /// on the source (caption, body) joins the target's second region, and
    /// the merge is refused when the target has nowhere to put it. The cursor
    /// lands where the receiving region's original content ended.
    pub fn merge_blocks(&mut self, source: BlockId, target: BlockId) -> Option<CursorPoint> {
        self.merge_into(source, target, None)
    }

    /// [`Commands::merge_blocks`] with the receiving text region pinned.
    pub(crate) fn merge_into(
        &mut self,
        source: BlockId,
        target: BlockId,
        region: Option<Region>,
    ) -> Option<CursorPoint> {
        if source == target {
            return None;
        }
        let source_block = self.doc.get(source)?;
        let target_block = self.doc.get(target)?;
        let source_meta = self.registry.meta(&source_block.block_type())?;
        let target_meta = self.registry.meta(&target_block.block_type())?;
        if !source_meta.text_regions
            || !target_meta.allowed_children.contains(&source_meta.category)
        {
            return None;
        }

        let source_kind = source_block.kind.clone();
        let carried = convert::carry(&source_kind);
        let secondary = carried
            .secondary
            .clone()
            .filter(|text| !text.is_empty());
        let target_regions = target_block.regions();
        if secondary.is_some() && !target_regions.contains(&Region::Secondary) {
            return None;
        }
        let check_target = matches!(
            target_block.kind,
            BlockKind::List {
                style: ListStyle::Check,
                ..
            }
        );
        let plain_target = matches!(target_block.kind, BlockKind::Code { .. });
        let receiving = match region {
            Some(region) if target_regions.contains(&region) => region,
            Some(_) => return None,
            None if target_regions.contains(&Region::Main) => Region::Main,
            None => target_regions.last()?.clone(),
        };

        let target_block = self.doc.get_mut(target)?;
        let point = if let BlockKind::List { items, .. } = &mut target_block.kind {
            let (last, boundary) = last_item_end(items)?;
            match &source_kind {
                BlockKind::List {
                    items: incoming, ..
                } => graft_items(items, incoming, check_target),
                _ => {
                    let appended = carried.joined_text();
                    items.value_mut(last)?.content.append(&appended);
                }
            }
            CursorPoint::new(target, Region::Item { id: last }, boundary)
        } else {
            let text = target_block.text_mut(&receiving)?;
            let boundary = text.len();
            let appended = carried.joined_text();
            if plain_target {
                text.append(&RichText::plain(appended.text()));
            } else {
                text.append(&appended);
            }
            if let Some(secondary) = &secondary {
                target_block.text_mut(&Region::Secondary)?.append(secondary);
            }
            CursorPoint::new(target, receiving, boundary)
        };
        self.doc.remove(source);
        debug!(%source, %target, "merged blocks");
        Some(point.with_hint(self.doc))
    }

    /// Moves the text after the cursor into a new block of the same type
    /// inserted after the current one. Inside a list item this splits the
    /// item instead.
    pub fn split_block(&mut self, at: &CursorPoint) -> Option<CursorPoint> {
        if matches!(at.region, Region::Item { .. }) {
            return self.split_list_item(at);
        }
        if at.region != Region::Main {
            return None;
        }
        let index = self.doc.position(at.block)?;
        let block = self.doc.get_mut(at.block)?;
        let tail = block.text_mut(&Region::Main)?.split_off(at.offset);
        let kind = match &block.kind {
            BlockKind::Paragraph { alignment, .. } => BlockKind::Paragraph {
                content: tail,
                alignment: *alignment,
            },
            BlockKind::Heading {
                level, alignment, ..
            } => BlockKind::Heading {
                level: *level,
                content: tail,
                alignment: *alignment,
                anchor: None,
            },
            BlockKind::Quote { alignment, .. } => BlockKind::Quote {
                content: tail,
                caption: RichText::new(),
                alignment: *alignment,
            },
            BlockKind::Callout { icon, variant, .. } => BlockKind::Callout {
                content: tail,
                icon: icon.clone(),
                variant: variant.clone(),
            },
            BlockKind::Code { language, .. } => BlockKind::Code {
                content: tail,
                language: language.clone(),
            },
            BlockKind::Accordion { .. } => BlockKind::Accordion {
                title: tail,
                body: RichText::new(),
                open: false,
            },
            _ => return None,
        };
        let new_id = self.insert_unique(index + 1, Block::new(kind));
        Some(self.focus_start(new_id))
    }

    /// Nests the item under its preceding sibling. `false` when there is
    /// none.
    pub fn indent_list_item(&mut self, block: BlockId, item: ItemId) -> Result<bool, EditError> {
        let items = self.list_items(block)?;
        if !items.contains(item) {
            return Err(EditError::ItemNotFound(item));
        }
        Ok(items.indent(item))
    }

    /// Moves a nested item into its grandparent list, right after its former
    /// parent. `false` for top-level items.
    pub fn outdent_list_item(&mut self, block: BlockId, item: ItemId) -> Result<bool, EditError> {
        let items = self.list_items(block)?;
        if !items.contains(item) {
            return Err(EditError::ItemNotFound(item));
        }
        Ok(items.outdent(item))
    }

    pub fn set_checked(&mut self, block: BlockId, item: ItemId, checked: bool) -> bool {
        let Ok(items) = self.list_items(block) else {
            return false;
        };
        match items.value_mut(item) {
            Some(value) if value.checked.is_some() => {
                let changed = value.checked != Some(checked);
                value.checked = Some(checked);
                changed
            }
            _ => false,
        }
    }

    /// Partial data update through the registry.
    pub fn update_block(&mut self, id: BlockId, partial: &Value) -> bool {
        let registry = self.registry;
        let Some(block) = self.doc.get_mut(id) else {
            return false;
        };
        let before = block.clone();
        registry.patch(block, partial);
        *block != before
    }

    pub fn insert_table_row(&mut self, block: BlockId, at: Option<usize>) -> Option<RowId> {
        Some(self.table(block)?.insert_row(at))
    }

    pub fn delete_table_row(&mut self, block: BlockId, index: usize) -> bool {
        self.table(block).is_some_and(|table| table.delete_row(index))
    }

    pub fn insert_table_column(&mut self, block: BlockId, at: Option<usize>) -> bool {
        match self.table(block) {
            Some(table) => {
                table.insert_column(at);
                true
            }
            None => false,
        }
    }

    pub fn delete_table_column(&mut self, block: BlockId, index: usize) -> bool {
        self.table(block).is_some_and(|table| table.delete_column(index))
    }

    /// Stores a finished upload on an image or video block. A failed upload
    /// or a URL with a disallowed protocol marks the block instead.
    pub fn attach_upload(&mut self, id: BlockId, result: Result<UploadResult, UploadError>) -> bool {
        let config = self.config;
        let protocols = &config.embed_protocols;
        let Some(block) = self.doc.get_mut(id) else {
            return false;
        };
        let (url, caption) = match &mut block.kind {
            BlockKind::Image(image) => (&mut image.url, &mut image.caption),
            BlockKind::Video(video) => (&mut video.url, &mut video.caption),
            _ => return false,
        };
        match result {
            Ok(upload) if link::is_allowed_url(&upload.url, protocols) => {
                *url = upload.url;
                if let Some(text) = upload.metadata.get("caption").and_then(Value::as_str)
                    && caption.is_empty()
                {
                    *caption = text.to_string();
                }
                if let BlockKind::Image(image) = &mut block.kind
                    && let Some(width) = upload.metadata.get("width").and_then(Value::as_u64)
                {
                    image.width = u32::try_from(width).ok();
                }
                block.error = None;
            }
            Ok(upload) => {
                warn!(url = %upload.url, "uploaded file url rejected");
                block.error = Some(BlockError::InvalidUrl { value: upload.url });
            }
            Err(err) => {
                warn!(%err, block = %id, "upload failed");
                block.error = Some(BlockError::UploadFailed {
                    message: err.message,
                });
            }
        }
        true
    }

    fn list_items(&mut self, block: BlockId) -> Result<&mut ItemTree<ListItem>, EditError> {
        match self.doc.get_mut(block) {
            Some(Block {
                kind: BlockKind::List { items, .. },
                ..
            }) => Ok(items),
            Some(_) => Err(EditError::WrongBlockType(block, "list")),
            None => Err(EditError::BlockNotFound(block)),
        }
    }

    fn table(&mut self, block: BlockId) -> Option<&mut crate::doc::table::Table> {
        match &mut self.doc.get_mut(block)?.kind {
            BlockKind::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Inserts, regenerating the id in the unlikely case it is taken.
    fn insert_unique(&mut self, index: usize, mut block: Block) -> BlockId {
        while self.doc.contains(block.id) {
            warn!(block = %block.id, "block id collision, regenerating");
            block.id = fresh_id();
        }
        let id = block.id;
        // cannot fail: the id is unused
        let _ = self.doc.insert(index, block);
        id
    }

    fn focus_start(&self, id: BlockId) -> CursorPoint {
        start_of(self.doc, id).unwrap_or_else(|| CursorPoint::new(id, Region::Main, 0))
    }

    fn focus_end(&self, id: BlockId) -> CursorPoint {
        end_of(self.doc, id).unwrap_or_else(|| CursorPoint::new(id, Region::Main, 0))
    }
}

/// Last item in reading order and the length of its text.
fn last_item_end(items: &ItemTree<ListItem>) -> Option<(ItemId, usize)> {
    let (last, _) = items.depth_first().last().copied()?;
    Some((last, items.value(last)?.content.len()))
}

/// Appends `incoming`'s items (with their nesting) after `items`' top-level
/// items. Ids are kept unless already taken.
fn graft_items(items: &mut ItemTree<ListItem>, incoming: &ItemTree<ListItem>, check: bool) {
    let mut mapped = std::collections::BTreeMap::new();
    for (id, _) in incoming.depth_first() {
        let Some(value) = incoming.value(id) else {
            continue;
        };
        let value = ListItem {
            content: value.content.clone(),
            checked: check.then(|| value.checked.unwrap_or(false)),
        };
        let new_id = if items.contains(id) { fresh_id() } else { id };
        let attached = match incoming.parent(id).and_then(|parent| mapped.get(&parent)) {
            Some(parent) => items.push_child(*parent, new_id, value),
            None => items.push_root(new_id, value),
        };
        if attached.is_ok() {
            mapped.insert(id, new_id);
        }
    }
}
