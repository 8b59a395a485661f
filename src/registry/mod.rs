//! Block type registry.
//!
//! Built-in kinds are dispatched through the closed [`BlockKind`] enum; custom
//! kinds go through [`BlockHandler`] implementations registered once with a
//! [`RegistryBuilder`]. A built [`BlockRegistry`] is immutable.

use crate::config::{EditorConfig, PayloadLimits};
use crate::core::{fresh_id, parse_id, BlockId};
use crate::doc::schema::{DocumentPayload, SerializedBlock, PAYLOAD_VERSION};
use crate::doc::{Block, BlockError, BlockKind, BlockType, Document};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

mod builtin;
pub mod convert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentCategory {
    Text,
    List,
    Media,
    Structural,
    Embed,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMeta {
    pub category: ContentCategory,
    /// Categories whose content may be merged into this block.
    pub allowed_children: Vec<ContentCategory>,
    /// Whether inline formatting commands apply to the block's text.
    pub inline_formatting: bool,
    pub text_regions: bool,
}

impl BlockMeta {
    pub fn opaque(category: ContentCategory) -> Self {
        Self {
            category,
            allowed_children: Vec::new(),
            inline_formatting: false,
            text_regions: false,
        }
    }

    fn text(category: ContentCategory) -> Self {
        Self {
            category,
            allowed_children: vec![ContentCategory::Text, ContentCategory::List],
            inline_formatting: true,
            text_regions: true,
        }
    }
}

/// Capability triple for a custom block type. Data is kept as JSON.
pub trait BlockHandler: Send + Sync {
    fn type_name(&self) -> &str;

    /// Normalized data for a new block; `data` may be absent or partial.
    fn construct(&self, data: Option<&Value>) -> Value;

    fn extract(&self, data: &Value) -> Value {
        data.clone()
    }

    fn patch(&self, data: &mut Value, partial: &Value) {
        merge_json(data, partial);
    }

    fn meta(&self) -> BlockMeta {
        BlockMeta::opaque(ContentCategory::Custom)
    }

    /// Field measured against the auxiliary size cap.
    fn auxiliary_field(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("`{0}` is a built-in block type")]
    Reserved(String),
    #[error("block type `{0}` is already registered")]
    Duplicate(String),
    #[error("block type name must not be empty")]
    EmptyName,
}

pub struct RegistryBuilder {
    handlers: BTreeMap<String, Arc<dyn BlockHandler>>,
    default_type: BlockType,
    limits: PayloadLimits,
    embed_protocols: Vec<String>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            handlers: BTreeMap::new(),
            default_type: BlockType::Paragraph,
            limits: config.limits.clone(),
            embed_protocols: config.embed_protocols.clone(),
        }
    }

    pub fn register(
        &mut self,
        handler: impl BlockHandler + 'static,
    ) -> Result<&mut Self, RegistryError> {
        let name = handler.type_name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if !BlockType::from_tag(&name).is_custom() {
            return Err(RegistryError::Reserved(name));
        }
        if self.handlers.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        debug!(block_type = %name, "registered custom block type");
        self.handlers.insert(name, Arc::new(handler));
        Ok(self)
    }

    /// Type used when a requested type is not registered. Ignored unless the
    /// type is registered by the time [`build`](Self::build) runs.
    pub fn default_type(&mut self, ty: BlockType) -> &mut Self {
        self.default_type = ty;
        self
    }

    pub fn build(&self) -> BlockRegistry {
        let mut registry = BlockRegistry {
            handlers: self.handlers.clone(),
            default_type: BlockType::Paragraph,
            limits: self.limits.clone(),
            embed_protocols: self.embed_protocols.clone(),
        };
        if registry.is_registered(&self.default_type) {
            registry.default_type = self.default_type.clone();
        }
        registry
    }
}

#[derive(Clone)]
pub struct BlockRegistry {
    handlers: BTreeMap<String, Arc<dyn BlockHandler>>,
    default_type: BlockType,
    limits: PayloadLimits,
    embed_protocols: Vec<String>,
}

impl fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockRegistry")
            .field("custom", &self.handlers.keys().collect::<Vec<_>>())
            .field("default_type", &self.default_type)
            .field("limits", &self.limits)
            .finish()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        RegistryBuilder::new().build()
    }
}

impl BlockRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn default_type(&self) -> &BlockType {
        &self.default_type
    }

    pub fn limits(&self) -> &PayloadLimits {
        &self.limits
    }

    pub fn embed_protocols(&self) -> &[String] {
        &self.embed_protocols
    }

    pub fn is_registered(&self, ty: &BlockType) -> bool {
        match ty {
            BlockType::Custom(name) => self.handlers.contains_key(name),
            _ => true,
        }
    }

    /// Built-in types followed by registered custom types.
    pub fn types(&self) -> Vec<BlockType> {
        BlockType::BUILT_IN
            .iter()
            .cloned()
            .chain(self.handlers.keys().map(|name| BlockType::Custom(name.clone())))
            .collect()
    }

    pub fn meta(&self, ty: &BlockType) -> Option<BlockMeta> {
        let meta = match ty {
            BlockType::Paragraph
            | BlockType::Heading
            | BlockType::Quote
            | BlockType::Callout
            | BlockType::Accordion => BlockMeta::text(ContentCategory::Text),
            BlockType::BulletList | BlockType::NumberedList | BlockType::CheckList => {
                BlockMeta::text(ContentCategory::List)
            }
            BlockType::Code => BlockMeta {
                category: ContentCategory::Text,
                allowed_children: vec![ContentCategory::Text, ContentCategory::List],
                inline_formatting: false,
                text_regions: true,
            },
            BlockType::Table => BlockMeta {
                category: ContentCategory::Structural,
                allowed_children: Vec::new(),
                inline_formatting: true,
                text_regions: true,
            },
            BlockType::Image | BlockType::Video => BlockMeta::opaque(ContentCategory::Media),
            BlockType::Divider | BlockType::Date => BlockMeta::opaque(ContentCategory::Structural),
            BlockType::LinkPreview => BlockMeta::opaque(ContentCategory::Embed),
            BlockType::Custom(name) => self.handlers.get(name)?.meta(),
        };
        Some(meta)
    }

    /// Builds a new block with a fresh id. Unregistered types fall back to
    /// the default type.
    pub fn construct(&self, ty: &BlockType, data: Option<&Value>) -> Block {
        self.construct_with_id(fresh_id(), ty, data)
    }

    pub fn construct_with_id(&self, id: BlockId, ty: &BlockType, data: Option<&Value>) -> Block {
        let ty = if self.is_registered(ty) {
            ty
        } else {
            warn!(block_type = %ty, fallback = %self.default_type, "unregistered block type");
            &self.default_type
        };

        let mut capped = None;
        let mut data = data.cloned();
        if let BlockType::Custom(name) = ty
            && let Some(handler) = self.handlers.get(name)
            && let Some(field) = handler.auxiliary_field()
            && let Some(Value::Object(map)) = data.as_mut()
            && let Some(bytes) = map.get(field).map(json_size)
            && bytes > self.limits.max_auxiliary_bytes
        {
            warn!(block_type = %ty, field, bytes, "auxiliary payload over cap, dropped");
            map.remove(field);
            capped = Some(BlockError::PayloadTooLarge {
                field: field.to_string(),
                bytes,
                limit: self.limits.max_auxiliary_bytes,
            });
        }
        if let Some(bytes) = data.as_ref().map(json_size)
            && bytes > self.limits.max_structural_bytes
        {
            warn!(block_type = %ty, bytes, "block data over cap, using defaults");
            data = None;
            capped = Some(BlockError::PayloadTooLarge {
                field: "data".to_string(),
                bytes,
                limit: self.limits.max_structural_bytes,
            });
        }

        let (kind, error) = match builtin::construct(ty, data.as_ref(), &self.embed_protocols) {
            Some(built) => built,
            None => (self.construct_custom(ty, data.as_ref()), None),
        };
        Block {
            id,
            kind,
            error: capped.or(error),
        }
    }

    fn construct_custom(&self, ty: &BlockType, data: Option<&Value>) -> BlockKind {
        let name = ty.tag().to_string();
        let data = match self.handlers.get(&name) {
            Some(handler) => handler.construct(data),
            None => data.cloned().unwrap_or(Value::Null),
        };
        BlockKind::Custom {
            type_name: name,
            data,
        }
    }

    pub fn extract(&self, block: &Block) -> Value {
        if let Some(value) = builtin::extract(&block.kind) {
            return value;
        }
        match &block.kind {
            BlockKind::Custom { type_name, data } => match self.handlers.get(type_name) {
                Some(handler) => handler.extract(data),
                None => data.clone(),
            },
            _ => Value::Null,
        }
    }

    /// Merges `partial` into the block's data. Fields not named in `partial`
    /// keep their values; ids and the error marker are kept.
    pub fn patch(&self, block: &mut Block, partial: &Value) {
        if let BlockKind::Custom { type_name, data } = &mut block.kind {
            match self.handlers.get(type_name.as_str()) {
                Some(handler) => handler.patch(data, partial),
                None => merge_json(data, partial),
            }
            return;
        }
        let mut data = self.extract(block);
        merge_json(&mut data, partial);
        let ty = block.block_type();
        let rebuilt = self.construct_with_id(block.id, &ty, Some(&data));
        block.kind = rebuilt.kind;
        if rebuilt.error.is_some() {
            block.error = rebuilt.error;
        }
    }

    /// Converts a block to `new_type`. `None` when the type is unregistered;
    /// the same type gives an unchanged copy. List types convert among each
    /// other in place, keeping block and item ids; any other conversion
    /// builds a new block.
    pub fn transform(&self, block: &Block, new_type: &BlockType) -> Option<Block> {
        if !self.is_registered(new_type) {
            warn!(block_type = %new_type, "transform to unregistered block type ignored");
            return None;
        }
        let old_type = block.block_type();
        if &old_type == new_type {
            return Some(block.clone());
        }
        if let (Some(_), Some(style)) = (old_type.list_style(), new_type.list_style()) {
            let mut converted = block.clone();
            convert::restyle_list(&mut converted.kind, style);
            return Some(converted);
        }
        let carried = convert::carry(&block.kind);
        let kind = match convert::land(new_type, &carried, &self.embed_protocols) {
            Some(kind) => kind,
            None => {
                let content = carried.joined_text().to_markup();
                let data = serde_json::json!({ "content": content });
                self.construct_custom(new_type, Some(&data))
            }
        };
        Some(Block::new(kind))
    }

    pub fn serialize(&self, doc: &Document) -> DocumentPayload {
        DocumentPayload {
            version: PAYLOAD_VERSION,
            blocks: doc
                .iter()
                .map(|block| SerializedBlock {
                    id: Some(block.id.to_string()),
                    block_type: block.block_type().tag().to_string(),
                    data: self.extract(block),
                    error: block.error.clone(),
                })
                .collect(),
        }
    }

    /// Rebuilds a document. Missing, invalid or duplicate block ids are
    /// regenerated; bad entries never fail the whole load.
    pub fn deserialize(&self, payload: &DocumentPayload) -> Document {
        let mut seen = BTreeSet::new();
        let mut blocks = Vec::with_capacity(payload.blocks.len());
        for entry in &payload.blocks {
            let id = entry
                .id
                .as_deref()
                .and_then(parse_id)
                .filter(|id| !seen.contains(id))
                .unwrap_or_else(|| {
                    debug!(id = ?entry.id, "regenerating block id");
                    fresh_id()
                });
            seen.insert(id);
            let ty = BlockType::from_tag(&entry.block_type);
            let data = Some(&entry.data).filter(|data| !data.is_null());
            let mut block = self.construct_with_id(id, &ty, data);
            if block.error.is_none() {
                block.error = entry.error.clone();
            }
            blocks.push(block);
        }
        let mut doc = Document::new();
        for block in blocks {
            let index = doc.len();
            // ids were deduplicated above
            let _ = doc.insert(index, block);
        }
        doc
    }
}

/// JSON merge: objects merge key by key, everything else replaces.
pub fn merge_json(target: &mut Value, partial: &Value) {
    match (target, partial) {
        (Value::Object(target), Value::Object(partial)) => {
            for (key, value) in partial {
                match target.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_json(existing, value)
                    }
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, partial) => *target = partial.clone(),
    }
}

fn json_size(value: &Value) -> usize {
    serde_json::to_vec(value).map_or(0, |bytes| bytes.len())
}
