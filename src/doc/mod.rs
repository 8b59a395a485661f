//! Block document model.
//!
//! A [`Document`] is a flat, ordered sequence of [`Block`]s. Each block has a
//! stable id, a typed payload ([`BlockKind`]) and an optional block-local
//! error marker. Text-bearing parts of a block are addressed as [`Region`]s.

use crate::core::tree::ItemTree;
use crate::core::{fresh_id, BlockId, ItemId, RowId};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod anchors;
pub mod rich_text;
pub mod schema;
pub mod table;

use rich_text::RichText;
use schema::{DateData, ImageData, LinkPreviewData, VideoData};
use table::Table;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListStyle {
    Bullet,
    Numbered,
    Check,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub content: RichText,
    /// Only check lists carry a checked state.
    pub checked: Option<bool>,
}

/// Block type tags. Built-in kinds are a closed set; anything else is a
/// custom type resolved through the registry's extension table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockType {
    Paragraph,
    Heading,
    BulletList,
    NumberedList,
    CheckList,
    Quote,
    Code,
    Image,
    Video,
    Divider,
    Callout,
    Accordion,
    Table,
    LinkPreview,
    Date,
    Custom(String),
}

impl BlockType {
    pub const BUILT_IN: [BlockType; 15] = [
        BlockType::Paragraph,
        BlockType::Heading,
        BlockType::BulletList,
        BlockType::NumberedList,
        BlockType::CheckList,
        BlockType::Quote,
        BlockType::Code,
        BlockType::Image,
        BlockType::Video,
        BlockType::Divider,
        BlockType::Callout,
        BlockType::Accordion,
        BlockType::Table,
        BlockType::LinkPreview,
        BlockType::Date,
    ];

    pub fn tag(&self) -> &str {
        match self {
            BlockType::Paragraph => "paragraph",
            BlockType::Heading => "heading",
            BlockType::BulletList => "bulletList",
            BlockType::NumberedList => "numberedList",
            BlockType::CheckList => "checkList",
            BlockType::Quote => "quote",
            BlockType::Code => "code",
            BlockType::Image => "image",
            BlockType::Video => "video",
            BlockType::Divider => "divider",
            BlockType::Callout => "callout",
            BlockType::Accordion => "accordion",
            BlockType::Table => "table",
            BlockType::LinkPreview => "linkPreview",
            BlockType::Date => "date",
            BlockType::Custom(name) => name,
        }
    }

    pub fn from_tag(tag: &str) -> BlockType {
        Self::BUILT_IN
            .iter()
            .find(|ty| ty.tag() == tag)
            .cloned()
            .unwrap_or_else(|| BlockType::Custom(tag.to_string()))
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, BlockType::Custom(_))
    }

    pub fn list_style(&self) -> Option<ListStyle> {
        match self {
            BlockType::BulletList => Some(ListStyle::Bullet),
            BlockType::NumberedList => Some(ListStyle::Numbered),
            BlockType::CheckList => Some(ListStyle::Check),
            _ => None,
        }
    }
}

impl From<String> for BlockType {
    fn from(tag: String) -> Self {
        BlockType::from_tag(&tag)
    }
}

impl From<BlockType> for String {
    fn from(ty: BlockType) -> Self {
        ty.tag().to_string()
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph {
        content: RichText,
        alignment: Alignment,
    },
    Heading {
        level: u8,
        content: RichText,
        alignment: Alignment,
        anchor: Option<String>,
    },
    List {
        style: ListStyle,
        items: ItemTree<ListItem>,
        start: u32,
    },
    Quote {
        content: RichText,
        caption: RichText,
        alignment: Alignment,
    },
    Code {
        content: RichText,
        language: Option<String>,
    },
    Image(ImageData),
    Video(VideoData),
    Divider,
    Callout {
        content: RichText,
        icon: String,
        variant: String,
    },
    Accordion {
        title: RichText,
        body: RichText,
        open: bool,
    },
    Table(Table),
    LinkPreview(LinkPreviewData),
    Date(DateData),
    Custom {
        type_name: String,
        data: serde_json::Value,
    },
}

impl BlockKind {
    pub fn block_type(&self) -> BlockType {
        match self {
            BlockKind::Paragraph { .. } => BlockType::Paragraph,
            BlockKind::Heading { .. } => BlockType::Heading,
            BlockKind::List { style, .. } => match style {
                ListStyle::Bullet => BlockType::BulletList,
                ListStyle::Numbered => BlockType::NumberedList,
                ListStyle::Check => BlockType::CheckList,
            },
            BlockKind::Quote { .. } => BlockType::Quote,
            BlockKind::Code { .. } => BlockType::Code,
            BlockKind::Image(_) => BlockType::Image,
            BlockKind::Video(_) => BlockType::Video,
            BlockKind::Divider => BlockType::Divider,
            BlockKind::Callout { .. } => BlockType::Callout,
            BlockKind::Accordion { .. } => BlockType::Accordion,
            BlockKind::Table(_) => BlockType::Table,
            BlockKind::LinkPreview(_) => BlockType::LinkPreview,
            BlockKind::Date(_) => BlockType::Date,
            BlockKind::Custom { type_name, .. } => BlockType::Custom(type_name.clone()),
        }
    }
}

/// An editable text region inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Region {
    Main,
    Secondary,
    Item { id: ItemId },
    Cell { row: RowId, col: usize },
}

/// Block-local error marker. Surfaced by the block's own rendering; the rest
/// of the document stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "camelCase")]
pub enum BlockError {
    #[serde(rename_all = "camelCase")]
    PayloadTooLarge {
        field: String,
        bytes: usize,
        limit: usize,
    },
    UploadFailed {
        message: String,
    },
    InvalidUrl {
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("block {0} not found")]
    BlockNotFound(BlockId),
    #[error("block id {0} is already in the document")]
    DuplicateBlockId(BlockId),
    #[error("list item {0} not found")]
    ItemNotFound(ItemId),
    #[error("block {0} has no such text region")]
    RegionNotFound(BlockId),
    #[error("offset {offset} is past the end of a {len}-character region in block {block}")]
    InvalidOffset {
        block: BlockId,
        offset: usize,
        len: usize,
    },
    #[error("block {0} is not a {1} block")]
    WrongBlockType(BlockId, &'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub error: Option<BlockError>,
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Self::with_id(fresh_id(), kind)
    }

    pub fn with_id(id: BlockId, kind: BlockKind) -> Self {
        Self {
            id,
            kind,
            error: None,
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.kind.block_type()
    }

    pub fn text(&self, region: &Region) -> Option<&RichText> {
        match (&self.kind, region) {
            (BlockKind::Paragraph { content, .. }, Region::Main)
            | (BlockKind::Heading { content, .. }, Region::Main)
            | (BlockKind::Quote { content, .. }, Region::Main)
            | (BlockKind::Code { content, .. }, Region::Main)
            | (BlockKind::Callout { content, .. }, Region::Main)
            | (BlockKind::Accordion { title: content, .. }, Region::Main)
            | (BlockKind::Quote { caption: content, .. }, Region::Secondary)
            | (BlockKind::Accordion { body: content, .. }, Region::Secondary) => Some(content),
            (BlockKind::List { items, .. }, Region::Item { id }) => {
                items.value(*id).map(|item| &item.content)
            }
            (BlockKind::Table(table), Region::Cell { row, col }) => {
                table.cell(*row, *col).map(|cell| &cell.content)
            }
            _ => None,
        }
    }

    pub fn text_mut(&mut self, region: &Region) -> Option<&mut RichText> {
        match (&mut self.kind, region) {
            (BlockKind::Paragraph { content, .. }, Region::Main)
            | (BlockKind::Heading { content, .. }, Region::Main)
            | (BlockKind::Quote { content, .. }, Region::Main)
            | (BlockKind::Code { content, .. }, Region::Main)
            | (BlockKind::Callout { content, .. }, Region::Main)
            | (BlockKind::Accordion { title: content, .. }, Region::Main)
            | (BlockKind::Quote { caption: content, .. }, Region::Secondary)
            | (BlockKind::Accordion { body: content, .. }, Region::Secondary) => Some(content),
            (BlockKind::List { items, .. }, Region::Item { id }) => {
                items.value_mut(*id).map(|item| &mut item.content)
            }
            (BlockKind::Table(table), Region::Cell { row, col }) => {
                table.cell_mut(*row, *col).map(|cell| &mut cell.content)
            }
            _ => None,
        }
    }

    /// Editable regions in reading order.
    pub fn regions(&self) -> Vec<Region> {
        match &self.kind {
            BlockKind::Paragraph { .. }
            | BlockKind::Heading { .. }
            | BlockKind::Code { .. }
            | BlockKind::Callout { .. } => vec![Region::Main],
            BlockKind::Quote { .. } | BlockKind::Accordion { .. } => {
                vec![Region::Main, Region::Secondary]
            }
            BlockKind::List { items, .. } => items
                .depth_first()
                .into_iter()
                .map(|(id, _)| Region::Item { id })
                .collect(),
            BlockKind::Table(table) => table
                .rows()
                .iter()
                .flat_map(|row| {
                    (0..row.cells.len()).map(move |col| Region::Cell { row: row.id, col })
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Deep copy under a fresh id; nested list items and table rows get
    /// fresh ids too, so the copy shares no id with the original.
    pub fn duplicate(&self) -> Block {
        let kind = match &self.kind {
            BlockKind::List {
                style,
                items,
                start,
            } => BlockKind::List {
                style: *style,
                items: items.with_fresh_ids(fresh_id),
                start: *start,
            },
            BlockKind::Table(table) => BlockKind::Table(table.with_fresh_ids()),
            BlockKind::Heading {
                level,
                content,
                alignment,
                ..
            } => BlockKind::Heading {
                level: *level,
                content: content.clone(),
                alignment: *alignment,
                anchor: None,
            },
            other => other.clone(),
        };
        Block {
            id: fresh_id(),
            kind,
            error: self.error.clone(),
        }
    }

    pub fn plain_text(&self) -> String {
        match &self.kind {
            BlockKind::List { items, style, .. } => items
                .depth_first()
                .into_iter()
                .filter_map(|(id, depth)| {
                    let item = items.value(id)?;
                    let marker = match (style, item.checked) {
                        (ListStyle::Check, Some(true)) => "[x] ",
                        (ListStyle::Check, _) => "[ ] ",
                        (ListStyle::Numbered, _) => "# ",
                        (ListStyle::Bullet, _) => "- ",
                    };
                    Some(format!("{}{marker}{}", "  ".repeat(depth), item.content.text()))
                })
                .collect::<Vec<_>>()
                .join("\n"),
            BlockKind::Table(table) => table
                .row_lines()
                .iter()
                .map(|line| line.text().to_string())
                .collect::<Vec<_>>()
                .join("\n"),
            BlockKind::Image(image) => image.caption.clone(),
            BlockKind::Video(video) => video.caption.clone(),
            BlockKind::LinkPreview(preview) => preview.url.clone(),
            BlockKind::Date(date) => date.value.clone(),
            BlockKind::Divider => "---".to_string(),
            BlockKind::Custom { .. } => String::new(),
            _ => self
                .regions()
                .iter()
                .filter_map(|region| self.text(region))
                .map(|text| text.text().to_string())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Document {
    blocks: Vec<Block>,
}

impl Document {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, EditError> {
        let mut doc = Document::new();
        for block in blocks {
            let index = doc.len();
            doc.insert(index, block)?;
        }
        Ok(doc)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|block| block.id == id)
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == id)
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|block| block.id == id)
    }

    pub fn block_at(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn first(&self) -> Option<&Block> {
        self.blocks.first()
    }

    pub fn last(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Inserts at `index` (clamped to the end). Ids must stay unique.
    pub fn insert(&mut self, index: usize, block: Block) -> Result<(), EditError> {
        if self.contains(block.id) {
            return Err(EditError::DuplicateBlockId(block.id));
        }
        let index = index.min(self.blocks.len());
        self.blocks.insert(index, block);
        Ok(())
    }

    /// Removes a block; it is no longer addressable afterwards.
    pub fn remove(&mut self, id: BlockId) -> Option<(usize, Block)> {
        let index = self.position(id)?;
        Some((index, self.blocks.remove(index)))
    }

    /// Puts `block` where `id` was and returns the old block.
    pub fn replace(&mut self, id: BlockId, block: Block) -> Result<Block, EditError> {
        let index = self.position(id).ok_or(EditError::BlockNotFound(id))?;
        if block.id != id && self.contains(block.id) {
            return Err(EditError::DuplicateBlockId(block.id));
        }
        Ok(std::mem::replace(&mut self.blocks[index], block))
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        if a < self.blocks.len() && b < self.blocks.len() {
            self.blocks.swap(a, b);
        }
    }

    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::plain_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(text: &str) -> Block {
        Block::new(BlockKind::Paragraph {
            content: RichText::plain(text),
            alignment: Alignment::Left,
        })
    }

    #[test]
    fn test_block_ids_are_unique() {
        let a = paragraph("A");
        let b = paragraph("B");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_block_type_tags_round_trip() {
        for ty in BlockType::BUILT_IN {
            assert_eq!(BlockType::from_tag(ty.tag()), ty);
        }
        assert_eq!(
            BlockType::from_tag("sketch"),
            BlockType::Custom("sketch".into())
        );
        let json = serde_json::to_string(&BlockType::CheckList).unwrap();
        assert_eq!(json, "\"checkList\"");
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut doc = Document::new();
        let block = paragraph("x");
        doc.insert(0, block.clone()).unwrap();
        assert_eq!(
            doc.insert(1, block.clone()),
            Err(EditError::DuplicateBlockId(block.id))
        );
    }

    #[test]
    fn test_removed_block_not_addressable() {
        let a = paragraph("a");
        let id = a.id;
        let mut doc = Document::from_blocks(vec![a, paragraph("b")]).unwrap();
        assert_eq!(doc.remove(id).map(|(index, _)| index), Some(0));
        assert!(doc.get(id).is_none());
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_text_regions() {
        let mut quote = Block::new(BlockKind::Quote {
            content: RichText::plain("words"),
            caption: RichText::plain("author"),
            alignment: Alignment::Left,
        });
        assert_eq!(quote.regions(), vec![Region::Main, Region::Secondary]);
        assert_eq!(quote.text(&Region::Secondary).unwrap().text(), "author");
        quote.text_mut(&Region::Main).unwrap().insert(0, "Wise ");
        assert_eq!(quote.text(&Region::Main).unwrap().text(), "Wise words");
        assert!(quote.text(&Region::Item { id: fresh_id() }).is_none());
    }

    #[test]
    fn test_duplicate_refreshes_nested_ids() {
        let mut items = ItemTree::new();
        let item = fresh_id();
        items.push_root(item, ListItem::default()).unwrap();
        let list = Block::new(BlockKind::List {
            style: ListStyle::Bullet,
            items,
            start: 1,
        });
        let copy = list.duplicate();
        assert_ne!(copy.id, list.id);
        let BlockKind::List { items, .. } = &copy.kind else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 1);
        assert!(!items.contains(item));
    }

    #[test]
    fn test_block_error_serializes_with_code() {
        let error = BlockError::PayloadTooLarge {
            field: "elements".into(),
            bytes: 10,
            limit: 5,
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["code"], "payloadTooLarge");
        assert_eq!(json["bytes"], 10);
    }
}
