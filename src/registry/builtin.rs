//! Construct/extract for the built-in block kinds.

use crate::commands::link::is_allowed_url;
use crate::core::tree::ItemTree;
use crate::core::{fresh_id, parse_id, ItemId, RowId};
use crate::doc::rich_text::RichText;
use crate::doc::schema::{
    lenient, AccordionData, CalloutData, CodeData, DateData, HeadingData, ImageData,
    LinkPreviewData, ListData, ListItemData, ParagraphData, QuoteData, TableCellData, TableData,
    TableRowData, VideoData,
};
use crate::doc::table::{Table, TableCell, TableRow};
use crate::doc::{BlockError, BlockKind, BlockType, ListItem, ListStyle};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Builds the live form of a built-in block. Returns `None` for custom
/// types. URL fields failing the embed rule are cleared and reported.
pub(crate) fn construct(
    ty: &BlockType,
    data: Option<&Value>,
    embed_protocols: &[String],
) -> Option<(BlockKind, Option<BlockError>)> {
    let mut error = None;
    let kind = match ty {
        BlockType::Paragraph => {
            let data: ParagraphData = lenient(data);
            BlockKind::Paragraph {
                content: RichText::from_markup(&data.content),
                alignment: data.alignment,
            }
        }
        BlockType::Heading => {
            let data: HeadingData = lenient(data);
            BlockKind::Heading {
                level: data.level.clamp(1, 6),
                content: RichText::from_markup(&data.content),
                alignment: data.alignment,
                anchor: data.anchor.filter(|anchor| !anchor.is_empty()),
            }
        }
        BlockType::BulletList | BlockType::NumberedList | BlockType::CheckList => {
            let style = ty.list_style()?;
            let data: ListData = lenient(data);
            BlockKind::List {
                style,
                items: build_items(&data.items, style == ListStyle::Check),
                start: data.start.unwrap_or(1).max(1),
            }
        }
        BlockType::Quote => {
            let data: QuoteData = lenient(data);
            BlockKind::Quote {
                content: RichText::from_markup(&data.content),
                caption: RichText::from_markup(&data.caption),
                alignment: data.alignment,
            }
        }
        BlockType::Code => {
            let data: CodeData = lenient(data);
            BlockKind::Code {
                content: RichText::plain(data.code),
                language: data.language.filter(|language| !language.is_empty()),
            }
        }
        BlockType::Image => {
            let mut data: ImageData = lenient(data);
            error = screen_url(&mut data.url, embed_protocols);
            BlockKind::Image(data)
        }
        BlockType::Video => {
            let mut data: VideoData = lenient(data);
            error = screen_url(&mut data.url, embed_protocols);
            BlockKind::Video(data)
        }
        BlockType::Divider => BlockKind::Divider,
        BlockType::Callout => {
            let data: CalloutData = lenient(data);
            BlockKind::Callout {
                content: RichText::from_markup(&data.content),
                icon: data.icon,
                variant: data.variant,
            }
        }
        BlockType::Accordion => {
            let data: AccordionData = lenient(data);
            BlockKind::Accordion {
                title: RichText::from_markup(&data.title),
                body: RichText::from_markup(&data.body),
                open: data.open,
            }
        }
        BlockType::Table => {
            let data: TableData = lenient(data);
            BlockKind::Table(build_table(data))
        }
        BlockType::LinkPreview => {
            let mut data: LinkPreviewData = lenient(data);
            error = screen_url(&mut data.url, embed_protocols);
            BlockKind::LinkPreview(data)
        }
        BlockType::Date => BlockKind::Date(lenient::<DateData>(data)),
        BlockType::Custom(_) => return None,
    };
    Some((kind, error))
}

/// Serializes a built-in block back to its schema. `None` for custom blocks.
pub(crate) fn extract(kind: &BlockKind) -> Option<Value> {
    let value = match kind {
        BlockKind::Paragraph { content, alignment } => to_value(ParagraphData {
            content: content.to_markup(),
            alignment: *alignment,
        }),
        BlockKind::Heading {
            level,
            content,
            alignment,
            anchor,
        } => to_value(HeadingData {
            content: content.to_markup(),
            level: *level,
            alignment: *alignment,
            anchor: anchor.clone(),
        }),
        BlockKind::List {
            style,
            items,
            start,
        } => to_value(ListData {
            items: items
                .roots()
                .iter()
                .filter_map(|id| extract_item(items, *id))
                .collect(),
            start: (*style == ListStyle::Numbered).then_some(*start),
        }),
        BlockKind::Quote {
            content,
            caption,
            alignment,
        } => to_value(QuoteData {
            content: content.to_markup(),
            caption: caption.to_markup(),
            alignment: *alignment,
        }),
        BlockKind::Code { content, language } => to_value(CodeData {
            code: content.text().to_string(),
            language: language.clone(),
        }),
        BlockKind::Image(data) => to_value(data),
        BlockKind::Video(data) => to_value(data),
        BlockKind::Divider => Value::Object(serde_json::Map::new()),
        BlockKind::Callout {
            content,
            icon,
            variant,
        } => to_value(CalloutData {
            content: content.to_markup(),
            icon: icon.clone(),
            variant: variant.clone(),
        }),
        BlockKind::Accordion { title, body, open } => to_value(AccordionData {
            title: title.to_markup(),
            body: body.to_markup(),
            open: *open,
        }),
        BlockKind::Table(table) => to_value(TableData {
            with_headings: table.with_headings,
            rows: table
                .rows()
                .iter()
                .map(|row| TableRowData {
                    id: Some(row.id.to_string()),
                    cells: row
                        .cells
                        .iter()
                        .map(|cell| TableCellData {
                            content: cell.content.to_markup(),
                            align: cell.align,
                            col_span: cell.col_span,
                            row_span: cell.row_span,
                        })
                        .collect(),
                })
                .collect(),
        }),
        BlockKind::LinkPreview(data) => to_value(data),
        BlockKind::Date(data) => to_value(data),
        BlockKind::Custom { .. } => return None,
    };
    Some(value)
}

fn to_value(data: impl Serialize) -> Value {
    serde_json::to_value(data).unwrap_or(Value::Null)
}

fn screen_url(url: &mut String, protocols: &[String]) -> Option<BlockError> {
    if url.is_empty() || is_allowed_url(url, protocols) {
        return None;
    }
    warn!(url = %url, "dropping embed url with a disallowed protocol");
    let value = std::mem::take(url);
    Some(BlockError::InvalidUrl { value })
}

fn item_id(raw: Option<&str>, taken: &mut BTreeSet<ItemId>) -> ItemId {
    let parsed = raw.and_then(parse_id).filter(|id| !taken.contains(id));
    let id = parsed.unwrap_or_else(|| {
        debug!(raw = ?raw, "regenerating missing or duplicate id");
        fresh_id()
    });
    taken.insert(id);
    id
}

/// Builds the item arena. An empty item list becomes one empty item so the
/// list stays editable.
pub(crate) fn build_items(items: &[ListItemData], check: bool) -> ItemTree<ListItem> {
    let mut tree = ItemTree::new();
    let mut taken = BTreeSet::new();
    let mut pending: Vec<(Option<ItemId>, &ListItemData)> =
        items.iter().rev().map(|item| (None, item)).collect();
    while let Some((parent, data)) = pending.pop() {
        let id = item_id(data.id.as_deref(), &mut taken);
        let value = ListItem {
            content: RichText::from_markup(&data.content),
            checked: check.then(|| data.checked.unwrap_or(false)),
        };
        let attached = match parent {
            Some(parent) => tree.push_child(parent, id, value),
            None => tree.push_root(id, value),
        };
        if attached.is_ok() {
            pending.extend(data.children.iter().rev().map(|child| (Some(id), child)));
        }
    }
    if tree.is_empty() {
        let value = ListItem {
            content: RichText::new(),
            checked: check.then_some(false),
        };
        let _ = tree.push_root(fresh_id(), value);
    }
    tree
}

fn extract_item(items: &ItemTree<ListItem>, id: ItemId) -> Option<ListItemData> {
    let item = items.value(id)?;
    Some(ListItemData {
        id: Some(id.to_string()),
        content: item.content.to_markup(),
        checked: item.checked,
        children: items
            .children(id)
            .iter()
            .filter_map(|child| extract_item(items, *child))
            .collect(),
    })
}

fn build_table(data: TableData) -> Table {
    let mut taken: BTreeSet<RowId> = BTreeSet::new();
    let rows = data
        .rows
        .into_iter()
        .map(|row| TableRow {
            id: item_id(row.id.as_deref(), &mut taken),
            cells: row
                .cells
                .into_iter()
                .map(|cell| TableCell {
                    content: RichText::from_markup(&cell.content),
                    align: cell.align,
                    col_span: cell.col_span.filter(|span| *span > 1),
                    row_span: cell.row_span.filter(|span| *span > 1),
                })
                .collect(),
        })
        .collect();
    Table::from_rows(data.with_headings, rows)
}
