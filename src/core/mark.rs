//! Inline formatting marks.
//!
//! A mark is a half-open interval over the grapheme offsets of a single text
//! region. Marks never store markup bytes, so toggling formatting never moves
//! an offset: the markup wraps and unwraps around the same visible text.

use std::ops::Range;

/// Kinds of inline marks. Declaration order is the canonical nesting order
/// used when two marks open at the same offset and close together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkKind {
    Link,
    FontFamily,
    FontSize,
    TextColor,
    Highlight,
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
}

impl MarkKind {
    /// Kinds that carry a value and at most one value may cover a grapheme.
    pub fn is_valued(self) -> bool {
        matches!(
            self,
            MarkKind::Link
                | MarkKind::FontFamily
                | MarkKind::FontSize
                | MarkKind::TextColor
                | MarkKind::Highlight
        )
    }

    /// Whether typing at the end of the mark extends it.
    pub fn extends_on_insert(self) -> bool {
        !matches!(self, MarkKind::Link | MarkKind::Code)
    }
}

/// The toggleable subset of marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InlineFormat {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
}

impl InlineFormat {
    pub fn kind(self) -> MarkKind {
        match self {
            InlineFormat::Bold => MarkKind::Bold,
            InlineFormat::Italic => MarkKind::Italic,
            InlineFormat::Underline => MarkKind::Underline,
            InlineFormat::Strikethrough => MarkKind::Strikethrough,
            InlineFormat::Code => MarkKind::Code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub kind: MarkKind,
    pub value: Option<String>,
    pub start: usize,
    pub end: usize,
    /// Set on links created by the engine itself; links produced by a host's
    /// native primitive arrive untagged until re-tagged.
    pub tagged: bool,
}

impl Mark {
    pub fn new(kind: MarkKind, range: Range<usize>) -> Self {
        Self {
            kind,
            value: None,
            start: range.start,
            end: range.end,
            tagged: false,
        }
    }

    pub fn valued(kind: MarkKind, value: impl Into<String>, range: Range<usize>) -> Self {
        Self {
            kind,
            value: Some(value.into()),
            start: range.start,
            end: range.end,
            tagged: kind == MarkKind::Link,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn same_style(&self, other: &Mark) -> bool {
        self.kind == other.kind && self.value == other.value && self.tagged == other.tagged
    }

    fn intersects(&self, range: &Range<usize>) -> bool {
        self.start < range.end && range.start < self.end
    }
}

/// A run of text carrying one fixed set of marks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    /// Indices into [`MarkSet::iter`] order.
    pub marks: Vec<usize>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MarkSet {
    marks: Vec<Mark>,
}

impl MarkSet {
    pub fn new() -> Self {
        Self { marks: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    /// Marks in canonical order: by start, longer first, then by kind.
    pub fn iter(&self) -> impl Iterator<Item = &Mark> {
        self.marks.iter()
    }

    pub fn add(&mut self, mark: Mark) {
        self.marks.push(mark);
        self.normalize();
    }

    /// Removes `kind` from the range, splitting marks that stick out on either
    /// side. Returns whether anything changed.
    pub fn remove(&mut self, kind: MarkKind, range: Range<usize>) -> bool {
        self.remove_matching(range, |mark| mark.kind == kind)
    }

    pub fn remove_matching(
        &mut self,
        range: Range<usize>,
        matches: impl Fn(&Mark) -> bool,
    ) -> bool {
        if range.start >= range.end {
            return false;
        }
        let mut changed = false;
        let mut kept = Vec::with_capacity(self.marks.len());
        for mark in self.marks.drain(..) {
            if !matches(&mark) || !mark.intersects(&range) {
                kept.push(mark);
                continue;
            }
            changed = true;
            if mark.start < range.start {
                let mut left = mark.clone();
                left.end = range.start;
                kept.push(left);
            }
            if range.end < mark.end {
                let mut right = mark;
                right.start = range.end;
                kept.push(right);
            }
        }
        self.marks = kept;
        self.normalize();
        changed
    }

    /// Replaces whatever value of `kind` covers the range. `None` clears it.
    pub fn set_valued(&mut self, kind: MarkKind, value: Option<String>, range: Range<usize>) {
        self.remove(kind, range.clone());
        if let Some(value) = value
            && range.start < range.end
        {
            self.add(Mark::valued(kind, value, range));
        }
    }

    /// True when every grapheme in the non-empty range carries `kind`.
    pub fn covers(&self, kind: MarkKind, range: Range<usize>) -> bool {
        if range.start >= range.end {
            return false;
        }
        let mut pos = range.start;
        for mark in self.marks.iter().filter(|mark| mark.kind == kind) {
            if mark.start <= pos && mark.end > pos {
                pos = mark.end;
                if pos >= range.end {
                    return true;
                }
            }
        }
        false
    }

    /// The chain of marks wrapping the grapheme at `offset`, outermost first.
    pub fn marks_at(&self, offset: usize) -> Vec<&Mark> {
        self.marks
            .iter()
            .filter(|mark| mark.start <= offset && offset < mark.end)
            .collect()
    }

    /// The mark of `kind` enclosing the range. A collapsed range at `offset`
    /// is enclosed when the mark covers the grapheme at `offset`.
    pub fn enclosing(&self, kind: MarkKind, range: Range<usize>) -> Option<&Mark> {
        self.marks.iter().find(|mark| {
            mark.kind == kind
                && if range.start == range.end {
                    mark.start <= range.start && range.start < mark.end
                } else {
                    mark.start <= range.start && range.end <= mark.end
                }
        })
    }

    /// Shifts marks for `len` graphemes inserted at `at`. Marks strictly
    /// containing the point grow; marks ending at the point grow when their
    /// kind extends on insert.
    pub fn insert_at(&mut self, at: usize, len: usize) {
        if len == 0 {
            return;
        }
        for mark in &mut self.marks {
            if at <= mark.start {
                mark.start += len;
                mark.end += len;
            } else if at < mark.end || (at == mark.end && mark.kind.extends_on_insert()) {
                mark.end += len;
            }
        }
        self.normalize();
    }

    /// Collapses the deleted range out of every mark.
    pub fn delete_range(&mut self, range: Range<usize>) {
        if range.start >= range.end {
            return;
        }
        let removed = range.end - range.start;
        let map = |offset: usize| {
            if offset <= range.start {
                offset
            } else if offset >= range.end {
                offset - removed
            } else {
                range.start
            }
        };
        for mark in &mut self.marks {
            mark.start = map(mark.start);
            mark.end = map(mark.end);
        }
        self.normalize();
    }

    /// Marks restricted to the range, rebased to start at zero.
    pub fn slice(&self, range: Range<usize>) -> MarkSet {
        let mut out = MarkSet::new();
        for mark in self.marks.iter().filter(|mark| mark.intersects(&range)) {
            let mut piece = mark.clone();
            piece.start = mark.start.max(range.start) - range.start;
            piece.end = mark.end.min(range.end) - range.start;
            out.marks.push(piece);
        }
        out.normalize();
        out
    }

    /// Appends another set whose offsets start at `by`.
    pub fn append_shifted(&mut self, other: &MarkSet, by: usize) {
        for mark in &other.marks {
            let mut moved = mark.clone();
            moved.start += by;
            moved.end += by;
            self.marks.push(moved);
        }
        self.normalize();
    }

    /// Tags every untagged link. Returns how many links were re-tagged.
    pub fn retag_links(&mut self) -> usize {
        let mut count = 0;
        for mark in &mut self.marks {
            if mark.kind == MarkKind::Link && !mark.tagged {
                mark.tagged = true;
                count += 1;
            }
        }
        if count > 0 {
            self.normalize();
        }
        count
    }

    pub fn clamp(&mut self, len: usize) {
        for mark in &mut self.marks {
            mark.start = mark.start.min(len);
            mark.end = mark.end.min(len);
        }
        self.normalize();
    }

    pub fn render_spans(&self, visible_len: usize) -> Vec<Span> {
        let mut boundaries = vec![0, visible_len];
        for mark in &self.marks {
            boundaries.push(mark.start.min(visible_len));
            boundaries.push(mark.end.min(visible_len));
        }
        boundaries.sort_unstable();
        boundaries.dedup();

        let mut spans = Vec::with_capacity(boundaries.len());
        for pair in boundaries.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            let marks = self
                .marks
                .iter()
                .enumerate()
                .filter(|(_, mark)| mark.start <= start && end <= mark.end)
                .map(|(index, _)| index)
                .collect();
            spans.push(Span { start, end, marks });
        }
        spans
    }

    fn normalize(&mut self) {
        self.marks.retain(|mark| mark.start < mark.end);
        self.marks.sort_by(|a, b| {
            (a.kind, &a.value, a.tagged, a.start, a.end).cmp(&(
                b.kind, &b.value, b.tagged, b.start, b.end,
            ))
        });

        let mut merged: Vec<Mark> = Vec::with_capacity(self.marks.len());
        for mark in self.marks.drain(..) {
            if let Some(last) = merged.last_mut()
                && last.same_style(&mark)
                && mark.start <= last.end
            {
                last.end = last.end.max(mark.end);
                continue;
            }
            merged.push(mark);
        }

        merged.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| b.end.cmp(&a.end))
                .then_with(|| a.kind.cmp(&b.kind))
                .then_with(|| a.value.cmp(&b.value))
        });
        self.marks = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold(range: Range<usize>) -> Mark {
        Mark::new(MarkKind::Bold, range)
    }

    #[test]
    fn test_adjacent_marks_merge() {
        let mut set = MarkSet::new();
        set.add(bold(0..2));
        set.add(bold(2..5));
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().range(), 0..5);
    }

    #[test]
    fn test_links_with_different_targets_do_not_merge() {
        let mut set = MarkSet::new();
        set.add(Mark::valued(MarkKind::Link, "https://a.test", 0..2));
        set.add(Mark::valued(MarkKind::Link, "https://b.test", 2..4));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_remove_splits_interval() {
        let mut set = MarkSet::new();
        set.add(bold(0..10));
        assert!(set.remove(MarkKind::Bold, 3..5));
        let ranges: Vec<_> = set.iter().map(Mark::range).collect();
        assert_eq!(ranges, vec![0..3, 5..10]);
    }

    #[test]
    fn test_remove_full_interval() {
        let mut set = MarkSet::new();
        set.add(bold(2..4));
        assert!(set.remove(MarkKind::Bold, 0..10));
        assert!(set.is_empty());
        assert!(!set.remove(MarkKind::Bold, 0..10));
    }

    #[test]
    fn test_covers_across_pieces() {
        let mut set = MarkSet::new();
        set.add(Mark::valued(MarkKind::Link, "https://a.test", 0..2));
        set.add(Mark::valued(MarkKind::Link, "https://b.test", 2..4));
        assert!(set.covers(MarkKind::Link, 0..4));
        assert!(!set.covers(MarkKind::Link, 0..5));
        assert!(!set.covers(MarkKind::Bold, 0..1));
        assert!(!set.covers(MarkKind::Link, 1..1));
    }

    #[test]
    fn test_insert_inside_and_at_end_extends() {
        let mut set = MarkSet::new();
        set.add(bold(2..4));
        set.insert_at(3, 2);
        assert_eq!(set.iter().next().unwrap().range(), 2..6);
        set.insert_at(6, 1);
        assert_eq!(set.iter().next().unwrap().range(), 2..7);
        set.insert_at(2, 1);
        assert_eq!(set.iter().next().unwrap().range(), 3..8);
    }

    #[test]
    fn test_insert_at_link_end_does_not_extend() {
        let mut set = MarkSet::new();
        set.add(Mark::valued(MarkKind::Link, "https://a.test", 0..3));
        set.insert_at(3, 2);
        assert_eq!(set.iter().next().unwrap().range(), 0..3);
    }

    #[test]
    fn test_delete_range_collapses_marks() {
        let mut set = MarkSet::new();
        set.add(bold(2..6));
        set.add(Mark::new(MarkKind::Italic, 3..4));
        set.delete_range(3..5);
        let kinds: Vec<_> = set.iter().map(|m| (m.kind, m.range())).collect();
        assert_eq!(kinds, vec![(MarkKind::Bold, 2..4)]);
    }

    #[test]
    fn test_slice_and_append_round_trip() {
        let mut set = MarkSet::new();
        set.add(bold(1..5));
        let left = set.slice(0..3);
        let right = set.slice(3..6);
        let mut joined = left.clone();
        joined.append_shifted(&right, 3);
        assert_eq!(joined, set);
    }

    #[test]
    fn test_marks_at_outermost_first() {
        let mut set = MarkSet::new();
        set.add(Mark::new(MarkKind::Italic, 2..3));
        set.add(bold(0..5));
        let chain: Vec<_> = set.marks_at(2).iter().map(|m| m.kind).collect();
        assert_eq!(chain, vec![MarkKind::Bold, MarkKind::Italic]);
        assert!(set.marks_at(5).is_empty());
    }

    #[test]
    fn test_set_valued_replaces_color() {
        let mut set = MarkSet::new();
        set.set_valued(MarkKind::TextColor, Some("red".into()), 0..4);
        set.set_valued(MarkKind::TextColor, Some("blue".into()), 2..4);
        let values: Vec<_> = set
            .iter()
            .map(|m| (m.value.clone().unwrap(), m.range()))
            .collect();
        assert_eq!(
            values,
            vec![("red".to_string(), 0..2), ("blue".to_string(), 2..4)]
        );
        set.set_valued(MarkKind::TextColor, None, 0..4);
        assert!(set.is_empty());
    }

    #[test]
    fn test_render_spans() {
        let mut set = MarkSet::new();
        set.add(bold(0..2));
        set.add(Mark::new(MarkKind::Italic, 1..3));
        let spans = set.render_spans(4);
        let shape: Vec<_> = spans.iter().map(|s| (s.start, s.end, s.marks.len())).collect();
        assert_eq!(shape, vec![(0, 1, 1), (1, 2, 2), (2, 3, 1), (3, 4, 0)]);
    }

    #[test]
    fn test_retag_links() {
        let mut set = MarkSet::new();
        let mut native = Mark::valued(MarkKind::Link, "https://a.test", 0..2);
        native.tagged = false;
        set.add(native);
        assert_eq!(set.retag_links(), 1);
        assert!(set.iter().all(|m| m.tagged));
        assert_eq!(set.retag_links(), 0);
    }
}
