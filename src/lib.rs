//! blockwright: the editing core of a block-structured rich-text editor.
//!
//! A document is an ordered sequence of typed blocks (paragraphs, headings,
//! lists, tables, media, ...). This crate owns the model and the verbs of
//! editing; painting and input handling belong to a rendering layer that
//! talks to the core through the [`SelectionHost`] seam.
//!
//! - **Registry** - block types, their data schemas and conversions
//! - **Selection** - cursor descriptors that survive markup changes
//! - **Commands** - block, text, formatting and link verbs
//! - **History** - bounded undo/redo with typing groups
//! - **Session** - wires it all together behind one mutation surface
//!
//! # Quick Start
//!
//! ```rust
//! use blockwright::{BlockRegistry, BlockType, EditorConfig, EditorSession, HeadlessHost, Placement};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(BlockRegistry::default());
//! let mut session = EditorSession::new(registry, EditorConfig::default(), HeadlessHost::new());
//! session.insert_block(&BlockType::Heading, None, Placement::End);
//! assert_eq!(session.document().len(), 2);
//!
//! let json = session.serialize().to_json().unwrap();
//! assert!(json.contains("\"heading\""));
//! ```

// Identifiers, grapheme helpers, marks and the list-item arena
pub mod core;

// Block model, rich text, payload schemas
pub mod doc;

// Block type registry and conversions
pub mod registry;

// Cursor descriptors and the rendering-layer seam
pub mod selection;

// Editing verbs
pub mod commands;

// Undo/redo
pub mod history;

// Deferred session tasks
pub mod scheduler;

pub mod config;

pub mod session;

// Re-export core types
pub use crate::core::mark::{InlineFormat, Mark, MarkKind, MarkSet, Span};
pub use crate::core::tree::{ItemTree, TreeError};
pub use crate::core::{BlockId, ItemId, RowId};

// Re-export doc types
pub use doc::anchors::{HeadingAnchors, OutlineEntry};
pub use doc::rich_text::RichText;
pub use doc::schema::{DocumentPayload, PayloadError, SerializedBlock};
pub use doc::table::Table;
pub use doc::{
    Alignment, Block, BlockError, BlockKind, BlockType, Document, EditError, ListItem, ListStyle,
    Region,
};

// Re-export the rest of the editing surface
pub use commands::{Commands, Placement, UploadError, UploadResult};
pub use config::{ConfigError, EditorConfig, PayloadLimits};
pub use history::{History, HistoryEntry};
pub use registry::{BlockHandler, BlockMeta, BlockRegistry, ContentCategory, RegistryBuilder, RegistryError};
pub use scheduler::{Scheduler, Task, TaskKey};
pub use selection::{
    CursorPoint, HeadlessHost, HostPoint, HostSelection, Selection, SelectionDescriptor,
    SelectionHost,
};
pub use session::EditorSession;
