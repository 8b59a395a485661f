//! Block type conversion.
//!
//! Every source block is reduced to a [`Carried`] bundle of the fields that
//! have a meaning outside their own type, and every target type picks from
//! that bundle what it can hold. Anything else is dropped.

use crate::commands::link::is_allowed_url;
use crate::core::tree::ItemTree;
use crate::core::fresh_id;
use crate::doc::rich_text::RichText;
use crate::doc::schema::{DateData, ImageData, LinkPreviewData, VideoData};
use crate::doc::table::{Table, TableRow};
use crate::doc::{Alignment, BlockKind, BlockType, ListItem, ListStyle};
use serde_json::Value;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Carried {
    pub text: Option<RichText>,
    pub secondary: Option<RichText>,
    pub lines: Vec<RichText>,
    pub url: Option<String>,
    pub level: Option<u8>,
    pub alignment: Option<Alignment>,
}

impl Carried {
    /// `text`, or else the carried lines joined by newlines.
    pub fn joined_text(&self) -> RichText {
        if let Some(text) = self.text.as_ref().filter(|text| !text.is_empty()) {
            return text.clone();
        }
        join_lines(&self.lines)
    }

    /// `lines`, or else `text` split at newlines.
    pub fn line_list(&self) -> Vec<RichText> {
        if !self.lines.is_empty() {
            return self.lines.clone();
        }
        match &self.text {
            Some(text) if !text.is_empty() => split_lines(text),
            _ => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_ref().is_none_or(RichText::is_empty)
            && self.secondary.as_ref().is_none_or(RichText::is_empty)
            && self.lines.iter().all(RichText::is_empty)
            && self.url.is_none()
    }
}

pub fn join_lines(lines: &[RichText]) -> RichText {
    let mut out = RichText::new();
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            out.append(&RichText::plain("\n"));
        }
        out.append(line);
    }
    out
}

pub fn split_lines(text: &RichText) -> Vec<RichText> {
    let mut lines = Vec::new();
    let mut rest = text.clone();
    while let Some(byte) = rest.text().find('\n') {
        let at = crate::core::grapheme_len(&rest.text()[..byte]);
        let mut tail = rest.split_off(at);
        tail.delete(0..1);
        lines.push(rest);
        rest = tail;
    }
    lines.push(rest);
    lines
}

/// Reduces a block to the fields other types can take over.
pub fn carry(kind: &BlockKind) -> Carried {
    let mut carried = Carried::default();
    match kind {
        BlockKind::Paragraph { content, alignment } => {
            carried.text = Some(content.clone());
            carried.alignment = Some(*alignment);
        }
        BlockKind::Heading {
            level,
            content,
            alignment,
            ..
        } => {
            carried.text = Some(content.clone());
            carried.level = Some(*level);
            carried.alignment = Some(*alignment);
        }
        BlockKind::Quote {
            content,
            caption,
            alignment,
        } => {
            carried.text = Some(content.clone());
            carried.secondary = Some(caption.clone());
            carried.alignment = Some(*alignment);
        }
        BlockKind::Callout { content, .. } => carried.text = Some(content.clone()),
        BlockKind::Accordion { title, body, .. } => {
            carried.text = Some(title.clone());
            carried.secondary = Some(body.clone());
        }
        BlockKind::Code { content, .. } => carried.text = Some(RichText::plain(content.text())),
        BlockKind::List { items, .. } => {
            carried.lines = items
                .depth_first()
                .into_iter()
                .filter_map(|(id, _)| items.value(id).map(|item| item.content.clone()))
                .collect();
        }
        BlockKind::Table(table) => carried.lines = table.row_lines(),
        BlockKind::Image(ImageData { url, caption, .. })
        | BlockKind::Video(VideoData { url, caption, .. }) => {
            carried.url = Some(url.clone()).filter(|url| !url.is_empty());
            carried.text = Some(RichText::from_markup(caption));
        }
        BlockKind::LinkPreview(preview) => {
            carried.url = Some(preview.url.clone()).filter(|url| !url.is_empty());
            carried.text = preview.title.as_deref().map(RichText::plain);
        }
        BlockKind::Date(date) => carried.text = Some(RichText::plain(date.value.clone())),
        BlockKind::Divider => {}
        BlockKind::Custom { data, .. } => {
            carried.text = data
                .get("content")
                .and_then(Value::as_str)
                .map(RichText::from_markup);
        }
    }
    carried
}

/// Builds a built-in target from carried fields. `None` for custom targets,
/// which go through their handler.
pub fn land(ty: &BlockType, carried: &Carried, embed_protocols: &[String]) -> Option<BlockKind> {
    let alignment = carried.alignment.unwrap_or_default();
    let kind = match ty {
        BlockType::Paragraph => BlockKind::Paragraph {
            content: carried.joined_text(),
            alignment,
        },
        BlockType::Heading => BlockKind::Heading {
            level: carried.level.unwrap_or(2).clamp(1, 6),
            content: carried.joined_text(),
            alignment,
            anchor: None,
        },
        BlockType::Quote => BlockKind::Quote {
            content: carried.joined_text(),
            caption: carried.secondary.clone().unwrap_or_default(),
            alignment,
        },
        BlockType::Callout => {
            let defaults = crate::doc::schema::CalloutData::default();
            BlockKind::Callout {
                content: carried.joined_text(),
                icon: defaults.icon,
                variant: defaults.variant,
            }
        }
        BlockType::Accordion => BlockKind::Accordion {
            title: carried.joined_text(),
            body: carried.secondary.clone().unwrap_or_default(),
            open: false,
        },
        BlockType::Code => BlockKind::Code {
            content: RichText::plain(carried.joined_text().text()),
            language: None,
        },
        BlockType::BulletList | BlockType::NumberedList | BlockType::CheckList => {
            let style = ty.list_style()?;
            let mut items = ItemTree::new();
            let mut lines = carried.line_list();
            if lines.is_empty() {
                lines.push(RichText::new());
            }
            for content in lines {
                let checked = (style == ListStyle::Check).then_some(false);
                let _ = items.push_root(fresh_id(), ListItem { content, checked });
            }
            BlockKind::List {
                style,
                items,
                start: 1,
            }
        }
        BlockType::Table => {
            let lines = carried.line_list();
            if lines.iter().all(RichText::is_empty) {
                BlockKind::Table(Table::default())
            } else {
                let rows = lines
                    .into_iter()
                    .map(|content| {
                        let mut row = TableRow::with_width(1);
                        row.cells[0].content = content;
                        row
                    })
                    .collect();
                BlockKind::Table(Table::from_rows(false, rows))
            }
        }
        BlockType::Image => BlockKind::Image(ImageData {
            url: embed_url(carried, embed_protocols),
            caption: carried.joined_text().to_markup(),
            ..ImageData::default()
        }),
        BlockType::Video => BlockKind::Video(VideoData {
            url: embed_url(carried, embed_protocols),
            caption: carried.joined_text().to_markup(),
            ..VideoData::default()
        }),
        BlockType::LinkPreview => BlockKind::LinkPreview(LinkPreviewData {
            url: embed_url(carried, embed_protocols),
            title: Some(carried.joined_text().text().to_string()).filter(|title| !title.is_empty()),
            ..LinkPreviewData::default()
        }),
        BlockType::Date => {
            let text = carried.joined_text();
            let value = text.text().trim();
            BlockKind::Date(DateData {
                value: if looks_like_date(value) {
                    value.to_string()
                } else {
                    String::new()
                },
                ..DateData::default()
            })
        }
        BlockType::Divider => BlockKind::Divider,
        BlockType::Custom(_) => return None,
    };
    Some(kind)
}

/// Converts between list styles in place, keeping item ids.
pub fn restyle_list(kind: &mut BlockKind, target: ListStyle) -> bool {
    let BlockKind::List { style, items, .. } = kind else {
        return false;
    };
    *style = target;
    let ids: Vec<_> = items.depth_first().into_iter().map(|(id, _)| id).collect();
    for id in ids {
        if let Some(item) = items.value_mut(id) {
            item.checked = match target {
                ListStyle::Check => Some(item.checked.unwrap_or(false)),
                _ => None,
            };
        }
    }
    true
}

fn embed_url(carried: &Carried, protocols: &[String]) -> String {
    carried
        .url
        .clone()
        .filter(|url| is_allowed_url(url, protocols))
        .unwrap_or_default()
}

/// `YYYY-MM-DD`, optionally followed by a time part.
fn looks_like_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
        && (bytes.len() == 10 || bytes[10] == b'T' || bytes[10] == b' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embeds() -> Vec<String> {
        vec!["http".into(), "https".into()]
    }

    #[test]
    fn test_split_and_join_lines_keep_marks() {
        let text = RichText::from_markup("a<b>b\nc</b>d\n");
        let lines = split_lines(&text);
        let markup: Vec<_> = lines.iter().map(RichText::to_markup).collect();
        assert_eq!(markup, vec!["a<b>b</b>", "<b>c</b>d", ""]);
        assert_eq!(join_lines(&lines).text(), text.text());
    }

    #[test]
    fn test_heading_to_paragraph_keeps_text_and_alignment() {
        let heading = BlockKind::Heading {
            level: 3,
            content: RichText::from_markup("<i>Hi</i>"),
            alignment: Alignment::Center,
            anchor: Some("hi".into()),
        };
        let carried = carry(&heading);
        let paragraph = land(&BlockType::Paragraph, &carried, &embeds()).unwrap();
        assert_eq!(
            paragraph,
            BlockKind::Paragraph {
                content: RichText::from_markup("<i>Hi</i>"),
                alignment: Alignment::Center,
            }
        );
        let back = land(&BlockType::Heading, &carry(&paragraph), &embeds()).unwrap();
        assert!(matches!(back, BlockKind::Heading { level: 2, .. }));
    }

    #[test]
    fn test_paragraph_lines_become_list_items() {
        let paragraph = BlockKind::Paragraph {
            content: RichText::plain("one\ntwo"),
            alignment: Alignment::Left,
        };
        let list = land(&BlockType::CheckList, &carry(&paragraph), &embeds()).unwrap();
        let BlockKind::List { items, style, .. } = list else {
            panic!("expected list");
        };
        assert_eq!(style, ListStyle::Check);
        let texts: Vec<_> = items
            .roots()
            .iter()
            .map(|id| items.value(*id).unwrap().content.text().to_string())
            .collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn test_table_to_quote_joins_rows() {
        let mut table = Table::new(2, 2);
        let first = table.rows()[0].id;
        table.cell_mut(first, 0).unwrap().content = RichText::plain("a");
        table.cell_mut(first, 1).unwrap().content = RichText::plain("b");
        let quote = land(&BlockType::Quote, &carry(&BlockKind::Table(table)), &embeds()).unwrap();
        let BlockKind::Quote { content, caption, .. } = quote else {
            panic!("expected quote");
        };
        assert_eq!(content.text(), "a\tb\n\t");
        assert!(caption.is_empty());
    }

    #[test]
    fn test_empty_source_to_table_is_default_grid() {
        let carried = carry(&BlockKind::Divider);
        assert!(carried.is_empty());
        let BlockKind::Table(table) = land(&BlockType::Table, &carried, &embeds()).unwrap() else {
            panic!("expected table");
        };
        assert_eq!((table.row_count(), table.column_count()), (3, 3));
    }

    #[test]
    fn test_media_url_must_pass_embed_rule() {
        let preview = BlockKind::LinkPreview(LinkPreviewData {
            url: "ftp://files.test/a.png".into(),
            title: Some("A".into()),
            ..LinkPreviewData::default()
        });
        let BlockKind::Image(image) = land(&BlockType::Image, &carry(&preview), &embeds()).unwrap()
        else {
            panic!("expected image");
        };
        assert_eq!(image.url, "");
        assert_eq!(image.caption, "A");
    }

    #[test]
    fn test_date_target_only_takes_dates() {
        let text = |value: &str| BlockKind::Paragraph {
            content: RichText::plain(value),
            alignment: Alignment::Left,
        };
        let BlockKind::Date(date) = land(&BlockType::Date, &carry(&text("2024-05-01")), &embeds())
            .unwrap()
        else {
            panic!("expected date");
        };
        assert_eq!(date.value, "2024-05-01");
        let BlockKind::Date(date) =
            land(&BlockType::Date, &carry(&text("tomorrow")), &embeds()).unwrap()
        else {
            panic!("expected date");
        };
        assert_eq!(date.value, "");
    }

    #[test]
    fn test_restyle_list_keeps_item_ids() {
        let mut items = ItemTree::new();
        let id = fresh_id();
        items.push_root(id, ListItem::default()).unwrap();
        let mut list = BlockKind::List {
            style: ListStyle::Bullet,
            items,
            start: 1,
        };
        assert!(restyle_list(&mut list, ListStyle::Check));
        let BlockKind::List { items, style, .. } = &list else {
            panic!("expected list");
        };
        assert_eq!(*style, ListStyle::Check);
        assert_eq!(items.value(id).unwrap().checked, Some(false));
    }
}
