//! Heading anchors: url-safe slugs with a per-session collision counter.

use super::{BlockKind, Document};
use crate::core::BlockId;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct HeadingAnchors {
    used: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub block: BlockId,
    pub level: u8,
    pub text: String,
    pub anchor: String,
}

impl HeadingAnchors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every anchor handed out so far.
    pub fn reset(&mut self) {
        self.used.clear();
    }

    /// Returns a unique anchor for `text`: `intro`, then `intro-1`, ...
    pub fn anchor_for(&mut self, text: &str) -> String {
        let base = slug(text);
        let base = if base.is_empty() {
            "section".to_string()
        } else {
            base
        };
        let mut count = self.used.get(&base).copied().unwrap_or(0);
        let mut candidate = if count == 0 {
            base.clone()
        } else {
            format!("{base}-{count}")
        };
        while self.used.contains_key(&candidate) {
            count += 1;
            candidate = format!("{base}-{count}");
        }
        self.used.insert(base, count + 1);
        self.used.entry(candidate.clone()).or_insert(1);
        candidate
    }

    /// Records an anchor that already exists (e.g. loaded from a payload).
    pub fn claim(&mut self, anchor: &str) -> bool {
        if self.used.contains_key(anchor) {
            return false;
        }
        self.used.insert(anchor.to_string(), 1);
        true
    }

    /// Heading outline in document order. Headings without a stored anchor
    /// get a generated one.
    pub fn outline(&mut self, doc: &Document) -> Vec<OutlineEntry> {
        doc.iter()
            .filter_map(|block| match &block.kind {
                BlockKind::Heading {
                    level,
                    content,
                    anchor,
                    ..
                } => Some((block.id, *level, content.text().to_string(), anchor.clone())),
                _ => None,
            })
            .map(|(block, level, text, anchor)| {
                let anchor = match anchor {
                    Some(anchor) if self.claim(&anchor) => anchor,
                    _ => self.anchor_for(&text),
                };
                OutlineEntry {
                    block,
                    level,
                    text,
                    anchor,
                }
            })
            .collect()
    }
}

/// Lowercase, alphanumerics kept, runs of anything else become one `-`.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

impl Document {
    pub fn heading_outline(&self) -> Vec<OutlineEntry> {
        HeadingAnchors::new().outline(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slug("Hello, World!"), "hello-world");
        assert_eq!(slug("  Über  uns "), "über-uns");
        assert_eq!(slug("!!!"), "");
    }

    #[test]
    fn test_collisions_count_up() {
        let mut anchors = HeadingAnchors::new();
        assert_eq!(anchors.anchor_for("Intro"), "intro");
        assert_eq!(anchors.anchor_for("Intro"), "intro-1");
        assert_eq!(anchors.anchor_for("intro"), "intro-2");
        assert_eq!(anchors.anchor_for("???"), "section");
    }

    #[test]
    fn test_generated_name_does_not_shadow_literal() {
        let mut anchors = HeadingAnchors::new();
        assert_eq!(anchors.anchor_for("a 1"), "a-1");
        assert_eq!(anchors.anchor_for("a"), "a");
        assert_eq!(anchors.anchor_for("a"), "a-2");
    }

    #[test]
    fn test_reset_starts_fresh_namespace() {
        let mut anchors = HeadingAnchors::new();
        anchors.anchor_for("Intro");
        anchors.reset();
        assert_eq!(anchors.anchor_for("Intro"), "intro");
    }
}
