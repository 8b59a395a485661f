//! Arena of nested list items.
//!
//! Items are addressed by id and linked through explicit `parent` and
//! `children` fields instead of a recursive object graph, so the tree shape
//! can be checked mechanically with [`ItemTree::check`].

use super::ItemId;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("item {0} already exists")]
    DuplicateItem(ItemId),
    #[error("item {0} not found")]
    ItemNotFound(ItemId),
    #[error("item {0} is part of a cycle or listed twice")]
    Cycle(ItemId),
    #[error("item {0} is not reachable from the top-level list")]
    Orphan(ItemId),
    #[error("item {0} disagrees with its parent link")]
    ParentMismatch(ItemId),
    #[error("child {0} has no node")]
    DanglingChild(ItemId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemNode<T> {
    pub id: ItemId,
    pub value: T,
    parent: Option<ItemId>,
    children: Vec<ItemId>,
}

impl<T> ItemNode<T> {
    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    pub fn children(&self) -> &[ItemId] {
        &self.children
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTree<T> {
    nodes: BTreeMap<ItemId, ItemNode<T>>,
    roots: Vec<ItemId>,
}

impl<T> Default for ItemTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ItemTree<T> {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            roots: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn roots(&self) -> &[ItemId] {
        &self.roots
    }

    pub fn node(&self, id: ItemId) -> Option<&ItemNode<T>> {
        self.nodes.get(&id)
    }

    pub fn value(&self, id: ItemId) -> Option<&T> {
        self.nodes.get(&id).map(|node| &node.value)
    }

    pub fn value_mut(&mut self, id: ItemId) -> Option<&mut T> {
        self.nodes.get_mut(&id).map(|node| &mut node.value)
    }

    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: ItemId) -> &[ItemId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn push_root(&mut self, id: ItemId, value: T) -> Result<(), TreeError> {
        self.attach(None, None, id, value)
    }

    pub fn push_child(&mut self, parent: ItemId, id: ItemId, value: T) -> Result<(), TreeError> {
        if !self.contains(parent) {
            return Err(TreeError::ItemNotFound(parent));
        }
        self.attach(Some(parent), None, id, value)
    }

    /// Inserts a new item directly after `sibling`, in the same list.
    pub fn insert_after(&mut self, sibling: ItemId, id: ItemId, value: T) -> Result<(), TreeError> {
        let Some(node) = self.nodes.get(&sibling) else {
            return Err(TreeError::ItemNotFound(sibling));
        };
        let parent = node.parent;
        let index = self
            .siblings(sibling)
            .iter()
            .position(|candidate| *candidate == sibling)
            .map(|index| index + 1);
        self.attach(parent, index, id, value)
    }

    /// The list `id` lives in: the top-level list or its parent's children.
    pub fn siblings(&self, id: ItemId) -> &[ItemId] {
        match self.parent(id) {
            Some(parent) => self.children(parent),
            None => &self.roots,
        }
    }

    pub fn prev_sibling(&self, id: ItemId) -> Option<ItemId> {
        let siblings = self.siblings(id);
        let index = siblings.iter().position(|candidate| *candidate == id)?;
        index.checked_sub(1).map(|prev| siblings[prev])
    }

    pub fn next_sibling(&self, id: ItemId) -> Option<ItemId> {
        let siblings = self.siblings(id);
        let index = siblings.iter().position(|candidate| *candidate == id)?;
        siblings.get(index + 1).copied()
    }

    /// Moves the item (with its subtree) to the end of its preceding
    /// sibling's nested list. No preceding sibling means nothing happens.
    pub fn indent(&mut self, id: ItemId) -> bool {
        let Some(prev) = self.prev_sibling(id) else {
            return false;
        };
        self.detach(id);
        if let Some(node) = self.nodes.get_mut(&prev) {
            node.children.push(id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = Some(prev);
        }
        true
    }

    /// Moves the item into its grandparent list, right after its former
    /// parent. Top-level items stay put.
    pub fn outdent(&mut self, id: ItemId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        let grandparent = self.parent(parent);
        self.detach(id);
        let list = self.list_mut(grandparent);
        let index = list
            .iter()
            .position(|candidate| *candidate == parent)
            .map_or(list.len(), |index| index + 1);
        list.insert(index, id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = grandparent;
        }
        true
    }

    /// Removes the item and its whole subtree, returning the item's value.
    pub fn remove(&mut self, id: ItemId) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        self.detach(id);
        let mut stack = vec![id];
        let mut removed = None;
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.iter().copied());
                if current == id {
                    removed = Some(node.value);
                }
            }
        }
        removed
    }

    /// Items in document order with their nesting depth (0 = top level).
    pub fn depth_first(&self) -> Vec<(ItemId, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(ItemId, usize)> =
            self.roots.iter().rev().map(|id| (*id, 0)).collect();
        let mut seen = BTreeSet::new();
        while let Some((id, depth)) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            out.push((id, depth));
            for child in self.children(id).iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }

    /// Verifies the tree: every node reachable exactly once from the roots,
    /// parent links agree with child lists, no dangling children.
    pub fn check(&self) -> Result<(), TreeError> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<(ItemId, Option<ItemId>)> =
            self.roots.iter().map(|id| (*id, None)).collect();
        while let Some((id, expected_parent)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                return Err(TreeError::DanglingChild(id));
            };
            if !seen.insert(id) {
                return Err(TreeError::Cycle(id));
            }
            if node.parent != expected_parent {
                return Err(TreeError::ParentMismatch(id));
            }
            stack.extend(node.children.iter().map(|child| (*child, Some(id))));
        }
        if let Some(orphan) = self.nodes.keys().find(|id| !seen.contains(*id)) {
            return Err(TreeError::Orphan(*orphan));
        }
        Ok(())
    }

    /// Rebuilds the tree with every id replaced by `fresh()`, keeping shape
    /// and values. Used when a list block is duplicated.
    pub fn with_fresh_ids(&self, mut fresh: impl FnMut() -> ItemId) -> Self
    where
        T: Clone,
    {
        let mapping: BTreeMap<ItemId, ItemId> =
            self.nodes.keys().map(|id| (*id, fresh())).collect();
        let remap = |id: &ItemId| mapping.get(id).copied().unwrap_or(*id);
        let nodes = self
            .nodes
            .values()
            .map(|node| {
                let id = remap(&node.id);
                (
                    id,
                    ItemNode {
                        id,
                        value: node.value.clone(),
                        parent: node.parent.as_ref().map(remap),
                        children: node.children.iter().map(remap).collect(),
                    },
                )
            })
            .collect();
        Self {
            nodes,
            roots: self.roots.iter().map(remap).collect(),
        }
    }

    fn attach(
        &mut self,
        parent: Option<ItemId>,
        index: Option<usize>,
        id: ItemId,
        value: T,
    ) -> Result<(), TreeError> {
        if self.contains(id) {
            return Err(TreeError::DuplicateItem(id));
        }
        self.nodes.insert(
            id,
            ItemNode {
                id,
                value,
                parent,
                children: Vec::new(),
            },
        );
        let list = self.list_mut(parent);
        let index = index.unwrap_or(list.len()).min(list.len());
        list.insert(index, id);
        Ok(())
    }

    fn detach(&mut self, id: ItemId) {
        let parent = self.parent(id);
        self.list_mut(parent).retain(|candidate| *candidate != id);
    }

    fn list_mut(&mut self, parent: Option<ItemId>) -> &mut Vec<ItemId> {
        match parent {
            Some(parent) => match self.nodes.get_mut(&parent) {
                Some(node) => &mut node.children,
                None => &mut self.roots,
            },
            None => &mut self.roots,
        }
    }
}
