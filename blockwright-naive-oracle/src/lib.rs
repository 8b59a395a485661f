//! A naive, simple oracle implementation for differential testing.
//!
//! Blocks are plain strings in a `Vec`, history is a pair of `Vec`s of whole
//! copies, formatting is one set of mark kinds per character. Offsets count
//! `char`s, so callers feed it single-codepoint text.
use blockwright::core::BlockId;

#[derive(Debug, Clone, PartialEq, Eq)]
struct NaiveBlock {
    id: BlockId,
    text: Vec<char>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BlockSequence {
    blocks: Vec<NaiveBlock>,
}

impl BlockSequence {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    pub fn from_texts<S: AsRef<str>>(blocks: &[(BlockId, S)]) -> Self {
        Self {
            blocks: blocks
                .iter()
                .map(|(id, text)| NaiveBlock {
                    id: *id,
                    text: text.as_ref().chars().collect(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|block| block.id).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.blocks
            .iter()
            .map(|block| block.text.iter().collect())
            .collect()
    }

    fn index(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|block| block.id == id)
    }

    /// Unknown or missing reference appends.
    pub fn insert_after(&mut self, reference: Option<BlockId>, id: BlockId, text: &str) {
        let index = reference
            .and_then(|reference| self.index(reference))
            .map_or(self.blocks.len(), |index| index + 1);
        self.blocks.insert(
            index,
            NaiveBlock {
                id,
                text: text.chars().collect(),
            },
        );
    }

    pub fn insert_before(&mut self, reference: BlockId, id: BlockId, text: &str) {
        let index = self.index(reference).unwrap_or(self.blocks.len());
        self.blocks.insert(
            index,
            NaiveBlock {
                id,
                text: text.chars().collect(),
            },
        );
    }

    /// Removing the last block leaves an empty block with `replacement` id.
    pub fn delete(&mut self, id: BlockId, replacement: BlockId) -> bool {
        let Some(index) = self.index(id) else {
            return false;
        };
        self.blocks.remove(index);
        if self.blocks.is_empty() {
            self.blocks.push(NaiveBlock {
                id: replacement,
                text: Vec::new(),
            });
        }
        true
    }

    pub fn move_up(&mut self, id: BlockId) -> bool {
        match self.index(id) {
            Some(index) if index > 0 => {
                self.blocks.swap(index, index - 1);
                true
            }
            _ => false,
        }
    }

    pub fn move_down(&mut self, id: BlockId) -> bool {
        match self.index(id) {
            Some(index) if index + 1 < self.blocks.len() => {
                self.blocks.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }

    pub fn duplicate(&mut self, id: BlockId, new_id: BlockId) -> bool {
        let Some(index) = self.index(id) else {
            return false;
        };
        let copy = NaiveBlock {
            id: new_id,
            text: self.blocks[index].text.clone(),
        };
        self.blocks.insert(index + 1, copy);
        true
    }

    pub fn split(&mut self, id: BlockId, offset: usize, new_id: BlockId) -> bool {
        let Some(index) = self.index(id) else {
            return false;
        };
        let at = offset.min(self.blocks[index].text.len());
        let tail = self.blocks[index].text.split_off(at);
        self.blocks.insert(
            index + 1,
            NaiveBlock {
                id: new_id,
                text: tail,
            },
        );
        true
    }

    pub fn merge(&mut self, source: BlockId, target: BlockId) -> bool {
        if source == target {
            return false;
        }
        let (Some(source_index), Some(_)) = (self.index(source), self.index(target)) else {
            return false;
        };
        let moved = self.blocks.remove(source_index);
        if let Some(index) = self.index(target) {
            self.blocks[index].text.extend(moved.text);
        }
        true
    }

    pub fn type_at(&mut self, id: BlockId, offset: usize, text: &str) -> bool {
        let Some(index) = self.index(id) else {
            return false;
        };
        let block = &mut self.blocks[index].text;
        let at = offset.min(block.len());
        block.splice(at..at, text.chars());
        true
    }

    pub fn delete_char_before(&mut self, id: BlockId, offset: usize) -> bool {
        let Some(index) = self.index(id) else {
            return false;
        };
        let block = &mut self.blocks[index].text;
        let at = offset.min(block.len());
        if at == 0 {
            return false;
        }
        block.remove(at - 1);
        true
    }
}

/// Unbounded-then-truncated undo/redo over whole copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaiveHistory<T> {
    past: Vec<T>,
    future: Vec<T>,
    depth: usize,
}

impl<T: Clone> NaiveHistory<T> {
    pub fn new(depth: usize) -> Self {
        Self {
            past: Vec::new(),
            future: Vec::new(),
            depth: depth.max(1),
        }
    }

    pub fn record(&mut self, state: T) {
        self.future.clear();
        self.past.push(state);
        if self.past.len() > self.depth {
            let excess = self.past.len() - self.depth;
            self.past.drain(..excess);
        }
    }

    pub fn undo(&mut self, current: T) -> Option<T> {
        let previous = self.past.pop()?;
        self.future.push(current);
        Some(previous)
    }

    pub fn redo(&mut self, current: T) -> Option<T> {
        let next = self.future.pop()?;
        self.past.push(current);
        Some(next)
    }

    pub fn undo_len(&self) -> usize {
        self.past.len()
    }
}

pub mod mark {
    use blockwright::core::mark::MarkKind;
    use std::collections::BTreeSet;
    use std::ops::Range;

    /// One set of mark kinds per character.
    #[derive(Debug, Default, Clone, PartialEq, Eq)]
    pub struct NaiveFormatting {
        cells: Vec<BTreeSet<MarkKind>>,
    }

    impl NaiveFormatting {
        pub fn new(len: usize) -> Self {
            Self {
                cells: vec![BTreeSet::new(); len],
            }
        }

        pub fn len(&self) -> usize {
            self.cells.len()
        }

        pub fn is_empty(&self) -> bool {
            self.cells.is_empty()
        }

        pub fn kinds_at(&self, offset: usize) -> BTreeSet<MarkKind> {
            self.cells.get(offset).cloned().unwrap_or_default()
        }

        /// Removes `kind` when every character in the range has it, adds it
        /// everywhere otherwise.
        pub fn toggle(&mut self, kind: MarkKind, range: Range<usize>) {
            let end = range.end.min(self.cells.len());
            let start = range.start.min(end);
            if start == end {
                return;
            }
            let covered = self.cells[start..end].iter().all(|cell| cell.contains(&kind));
            for cell in &mut self.cells[start..end] {
                if covered {
                    cell.remove(&kind);
                } else {
                    cell.insert(kind);
                }
            }
        }

        /// New characters take every kind on the character before them that
        /// either continues after them or extends at its end.
        pub fn insert(&mut self, at: usize, len: usize) {
            let at = at.min(self.cells.len());
            let inherited: BTreeSet<MarkKind> = match at.checked_sub(1) {
                Some(before) => self.cells[before]
                    .iter()
                    .copied()
                    .filter(|kind| {
                        kind.extends_on_insert()
                            || self.cells.get(at).is_some_and(|cell| cell.contains(kind))
                    })
                    .collect(),
                None => BTreeSet::new(),
            };
            self.cells
                .splice(at..at, std::iter::repeat_n(inherited, len));
        }

        pub fn delete(&mut self, range: Range<usize>) {
            let end = range.end.min(self.cells.len());
            let start = range.start.min(end);
            self.cells.drain(start..end);
        }
    }
}
