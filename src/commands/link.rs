//! Links: URL normalization, protocol allow-lists, insert and remove.

use super::Commands;
use crate::core::mark::MarkKind;
use crate::selection::{CursorPoint, SelectionDescriptor, SelectionHost};
use tracing::{debug, warn};
use url::Url;

/// True when `url` parses and its scheme is in `protocols`.
pub fn is_allowed_url(url: &str, protocols: &[String]) -> bool {
    Url::parse(url.trim()).is_ok_and(|parsed| {
        protocols
            .iter()
            .any(|protocol| protocol.eq_ignore_ascii_case(parsed.scheme()))
    })
}

/// Trims the input, prepends `default_scheme` when no scheme is present and
/// checks the result against `protocols`. `None` means rejected.
pub fn normalize_url(raw: &str, default_scheme: &str, protocols: &[String]) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
        return None;
    }
    let candidate = if has_scheme(trimmed) {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("{default_scheme}://{rest}")
    } else {
        format!("{default_scheme}://{trimmed}")
    };
    let parsed = Url::parse(&candidate).ok()?;
    if !protocols
        .iter()
        .any(|protocol| protocol.eq_ignore_ascii_case(parsed.scheme()))
    {
        return None;
    }
    if matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_none_or(str::is_empty) {
        return None;
    }
    Some(candidate)
}

/// `scheme:` prefix per RFC 3986. `localhost:8080` style host-port pairs
/// count as schemeless.
fn has_scheme(value: &str) -> bool {
    let Some((scheme, rest)) = value.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|ch| ch.is_ascii_alphabetic())
        && chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'));
    valid && !rest.chars().next().is_some_and(|ch| ch.is_ascii_digit())
}

impl Commands<'_> {
    /// Links the selection to `url`.
    ///
    /// A selection inside an existing link updates that link. With `text`,
    /// the selection (or the caret position) is replaced by `text` first. A
    /// selection that no longer fits the region text is handed to the host's
    /// native link primitive, and the links it produces are re-tagged.
    /// Returns the selection covering the linked text.
    pub fn insert_link<H: SelectionHost + ?Sized>(
        &mut self,
        host: &mut H,
        selection: &SelectionDescriptor,
        url: &str,
        text: Option<&str>,
    ) -> Option<SelectionDescriptor> {
        let Some(href) =
            normalize_url(url, &self.config.default_link_scheme, &self.config.link_protocols)
        else {
            warn!(url, "rejected link url");
            return None;
        };
        let range = selection.region_range()?;
        let anchor = &selection.anchor;
        let region_text = self.doc.get_mut(anchor.block)?.text_mut(&anchor.region)?;

        if range.end > region_text.len() {
            let linked = host.native_create_link(region_text, range.clone(), &href)?;
            *region_text = linked;
            let retagged = region_text.marks_mut().retag_links();
            debug!(retagged, "re-tagged links from native primitive");
            let end = range.end.min(region_text.len());
            let start = range.start.min(end);
            return Some(span(anchor, start, end));
        }

        let range = match text.filter(|text| !text.is_empty()) {
            Some(text) => {
                region_text.delete(range.clone());
                let added = region_text.insert(range.start, text);
                range.start..range.start + added
            }
            None if range.is_empty() => {
                let existing = region_text
                    .marks()
                    .enclosing(MarkKind::Link, range.clone())
                    .map(|mark| mark.range());
                if let Some(existing) = existing {
                    let marks = region_text.marks_mut();
                    marks.set_valued(MarkKind::Link, Some(href), existing.clone());
                    return Some(span(anchor, existing.start, existing.end));
                }
                let added = region_text.insert(range.start, &href);
                range.start..range.start + added
            }
            None => range,
        };

        let marks = region_text.marks_mut();
        let existing = marks
            .enclosing(MarkKind::Link, range.clone())
            .map(|mark| mark.range());
        let target = existing.unwrap_or(range);
        marks.set_valued(MarkKind::Link, Some(href), target.clone());
        Some(span(anchor, target.start, target.end))
    }

    /// Unlinks the selection. A caret or selection inside a link removes
    /// the whole link; otherwise links are cut back to outside the range.
    pub fn remove_link(&mut self, selection: &SelectionDescriptor) -> bool {
        let Some(range) = selection.region_range() else {
            return false;
        };
        let anchor = &selection.anchor;
        let Some(text) = self
            .doc
            .get_mut(anchor.block)
            .and_then(|block| block.text_mut(&anchor.region))
        else {
            return false;
        };
        let marks = text.marks_mut();
        let target = marks
            .enclosing(MarkKind::Link, range.clone())
            .map(|mark| mark.range())
            .unwrap_or(range);
        marks.remove(MarkKind::Link, target)
    }

    /// The href of the link under the selection, if any.
    pub fn link_at(&self, selection: &SelectionDescriptor) -> Option<String> {
        let range = selection.region_range()?;
        let anchor = &selection.anchor;
        self.doc
            .get(anchor.block)?
            .text(&anchor.region)?
            .marks()
            .enclosing(MarkKind::Link, range)?
            .value
            .clone()
    }
}

fn span(at: &CursorPoint, start: usize, end: usize) -> SelectionDescriptor {
    SelectionDescriptor::range(
        CursorPoint {
            offset: start,
            ..at.clone()
        },
        CursorPoint {
            offset: end,
            ..at.clone()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::doc::rich_text::RichText;
    use crate::doc::{Alignment, Block, BlockKind, Document, Region};
    use crate::registry::BlockRegistry;
    use crate::selection::HeadlessHost;

    fn protocols() -> Vec<String> {
        EditorConfig::default().link_protocols
    }

    #[test]
    fn test_normalize_prepends_scheme() {
        assert_eq!(
            normalize_url("example.com", "https", &protocols()).as_deref(),
            Some("https://example.com")
        );
        assert_eq!(
            normalize_url("  //cdn.test/x ", "https", &protocols()).as_deref(),
            Some("https://cdn.test/x")
        );
        assert_eq!(
            normalize_url("localhost:8080/a", "http", &protocols()).as_deref(),
            Some("http://localhost:8080/a")
        );
        assert_eq!(
            normalize_url("mailto:me@example.com", "https", &protocols()).as_deref(),
            Some("mailto:me@example.com")
        );
    }

    #[test]
    fn test_normalize_rejects() {
        for bad in ["", "   ", "javascript:alert(1)", "data:text/html,x", "ftp://x.test", "a\u{7}b"] {
            assert_eq!(normalize_url(bad, "https", &protocols()), None, "{bad:?}");
        }
    }

    #[test]
    fn test_allowed_url() {
        let embeds = EditorConfig::default().embed_protocols;
        assert!(is_allowed_url("https://x.test/v.mp4", &embeds));
        assert!(!is_allowed_url("tel:123", &embeds));
        assert!(!is_allowed_url("not a url", &embeds));
    }

    struct Fixture {
        doc: Document,
        registry: BlockRegistry,
        config: EditorConfig,
        id: crate::core::BlockId,
    }

    impl Fixture {
        fn new(markup: &str) -> Self {
            let block = Block::new(BlockKind::Paragraph {
                content: RichText::from_markup(markup),
                alignment: Alignment::Left,
            });
            let id = block.id;
            Self {
                doc: Document::from_blocks(vec![block]).unwrap(),
                registry: BlockRegistry::default(),
                config: EditorConfig::default(),
                id,
            }
        }

        fn select(&self, start: usize, end: usize) -> SelectionDescriptor {
            SelectionDescriptor::range(
                CursorPoint::new(self.id, Region::Main, start),
                CursorPoint::new(self.id, Region::Main, end),
            )
        }

        fn markup(&self) -> String {
            self.doc.blocks()[0].text(&Region::Main).unwrap().to_markup()
        }

        fn commands(&mut self) -> Commands<'_> {
            Commands::new(&mut self.doc, &self.registry, &self.config)
        }
    }

    #[test]
    fn test_link_keeps_inner_formatting() {
        let mut fx = Fixture::new("see <b>bold</b> text");
        let selection = fx.select(4, 13);
        let mut host = HeadlessHost::new();
        let linked = fx
            .commands()
            .insert_link(&mut host, &selection, "example.com", None)
            .unwrap();
        assert_eq!(linked.region_range(), Some(4..13));
        assert_eq!(
            fx.markup(),
            "see <a href=\"https://example.com\" class=\"bw-link\"><b>bold</b> text</a>"
        );
    }

    #[test]
    fn test_rejected_url_leaves_text_unchanged() {
        let mut fx = Fixture::new("click");
        let selection = fx.select(0, 5);
        let mut host = HeadlessHost::new();
        assert!(fx
            .commands()
            .insert_link(&mut host, &selection, "javascript:alert(1)", None)
            .is_none());
        assert_eq!(fx.markup(), "click");
    }

    #[test]
    fn test_caret_inside_link_updates_href() {
        let mut fx = Fixture::new("<a href=\"https://old.test\" class=\"bw-link\">here</a>!");
        let selection = fx.select(2, 2);
        let mut host = HeadlessHost::new();
        let linked = fx
            .commands()
            .insert_link(&mut host, &selection, "https://new.test", None)
            .unwrap();
        assert_eq!(linked.region_range(), Some(0..4));
        assert_eq!(
            fx.commands().link_at(&selection).as_deref(),
            Some("https://new.test")
        );
    }

    #[test]
    fn test_link_with_text_replaces_selection() {
        let mut fx = Fixture::new("go ");
        let selection = fx.select(3, 3);
        let mut host = HeadlessHost::new();
        fx.commands()
            .insert_link(&mut host, &selection, "x.test", Some("there"))
            .unwrap();
        assert_eq!(
            fx.markup(),
            "go <a href=\"https://x.test\" class=\"bw-link\">there</a>"
        );
    }

    #[test]
    fn test_stale_selection_uses_native_primitive_then_retags() {
        let mut fx = Fixture::new("short");
        let selection = fx.select(1, 40);
        let mut plain_host = HeadlessHost::new();
        assert!(fx
            .commands()
            .insert_link(&mut plain_host, &selection, "x.test", None)
            .is_none());

        let mut host = HeadlessHost::with_native_links();
        let linked = fx
            .commands()
            .insert_link(&mut host, &selection, "x.test", None)
            .unwrap();
        assert_eq!(linked.region_range(), Some(1..5));
        assert_eq!(
            fx.markup(),
            "s<a href=\"https://x.test\" class=\"bw-link\">hort</a>"
        );
    }

    #[test]
    fn test_remove_link() {
        let mut fx = Fixture::new("<a href=\"https://x.test\" class=\"bw-link\">abc</a>d");
        let selection = fx.select(1, 1);
        assert!(fx.commands().remove_link(&selection));
        assert_eq!(fx.markup(), "abcd");
        assert!(!fx.commands().remove_link(&selection));
    }
}
