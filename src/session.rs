//! The editing session: one document, its history and its host.
//!
//! Every mutating verb goes through [`EditorSession::mutate`], which captures
//! the live selection, snapshots the document, runs the command and records
//! an undo entry only if the document actually changed. Focus placement after
//! a command is applied right away or, with a non-zero `focus_delay_ms`,
//! deferred through the scheduler.

use crate::commands::{Commands, Placement, UploadError, UploadResult};
use crate::config::EditorConfig;
use crate::core::mark::InlineFormat;
use crate::core::{BlockId, ItemId, RowId};
use crate::doc::anchors::{HeadingAnchors, OutlineEntry};
use crate::doc::schema::{DocumentPayload, PayloadError};
use crate::doc::{Alignment, BlockKind, BlockType, Document, EditError};
use crate::history::{History, HistoryEntry};
use crate::registry::BlockRegistry;
use crate::scheduler::{Scheduler, Task, TaskKey};
use crate::selection::{CursorPoint, Selection, SelectionDescriptor, SelectionHost};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How a command's change is grouped in the undo history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grouping {
    /// Its own undo entry.
    Single,
    /// Joins the open typing group.
    Typing,
}

pub struct EditorSession<H: SelectionHost> {
    doc: Document,
    registry: Arc<BlockRegistry>,
    config: EditorConfig,
    history: History,
    scheduler: Scheduler,
    anchors: HeadingAnchors,
    selection: Selection,
    host: H,
    now: Duration,
}

impl<H: SelectionHost> EditorSession<H> {
    /// A session over a document holding one default block.
    pub fn new(registry: Arc<BlockRegistry>, config: EditorConfig, host: H) -> Self {
        let mut doc = Document::new();
        let block = registry.construct(registry.default_type(), None);
        // a fresh document has no ids to collide with
        let _ = doc.insert(0, block);
        Self::with_document(registry, config, host, doc)
    }

    pub fn with_document(
        registry: Arc<BlockRegistry>,
        config: EditorConfig,
        host: H,
        doc: Document,
    ) -> Self {
        let mut session = Self {
            doc,
            history: History::with_depth(config.history_depth),
            registry,
            config,
            scheduler: Scheduler::new(),
            anchors: HeadingAnchors::new(),
            selection: Selection::new(),
            host,
            now: Duration::ZERO,
        };
        session.ensure_not_empty();
        session.stamp_anchors();
        session
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Replaces the document with a decoded payload. History, pending tasks,
    /// the saved selection and the heading anchor namespace start over.
    pub fn load(&mut self, payload: &DocumentPayload) {
        self.doc = self.registry.deserialize(payload);
        self.history.clear();
        let cancelled = self.scheduler.cancel_all();
        self.anchors.reset();
        self.selection.clear_saved();
        self.host.apply_selection(None);
        self.ensure_not_empty();
        self.claim_anchors();
        self.stamp_anchors();
        info!(blocks = self.doc.len(), cancelled, "loaded document");
    }

    pub fn load_json(&mut self, input: &str) -> Result<(), PayloadError> {
        let payload = DocumentPayload::from_json(input)?;
        self.load(&payload);
        Ok(())
    }

    pub fn serialize(&self) -> DocumentPayload {
        self.registry.serialize(&self.doc)
    }

    pub fn outline(&self) -> Vec<OutlineEntry> {
        self.doc.heading_outline()
    }

    // Selection

    pub fn capture_selection(&self) -> Option<SelectionDescriptor> {
        self.selection.capture(&self.host, &self.doc)
    }

    pub fn save_selection(&mut self) -> Option<SelectionDescriptor> {
        self.selection.save(&self.host, &self.doc)
    }

    /// Re-applies the saved selection, clamped to the current document.
    pub fn restore_selection(&mut self) -> Option<SelectionDescriptor> {
        self.selection.restore(&mut self.host, &self.doc, None)
    }

    pub fn is_multi_block_selection(&self) -> bool {
        self.selection.is_multi_block_selection(&self.host, &self.doc)
    }

    pub fn move_to_start(&mut self, block: BlockId) -> Option<SelectionDescriptor> {
        self.selection.move_to_start(&mut self.host, &self.doc, block)
    }

    pub fn move_to_end(&mut self, block: BlockId) -> Option<SelectionDescriptor> {
        self.selection.move_to_end(&mut self.host, &self.doc, block)
    }

    // Block verbs

    pub fn insert_block(
        &mut self,
        ty: &BlockType,
        data: Option<&Value>,
        placement: Placement,
    ) -> CursorPoint {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.insert_block(ty, data, placement),
            |point| Some(point.clone()),
        )
    }

    pub fn delete_block(&mut self, id: BlockId) -> Result<CursorPoint, EditError> {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.delete_block(id),
            |result| result.as_ref().ok().cloned(),
        )
    }

    pub fn move_block_up(&mut self, id: BlockId) -> bool {
        self.mutate(Grouping::Single, |commands, _| commands.move_block_up(id), |_| None)
    }

    pub fn move_block_down(&mut self, id: BlockId) -> bool {
        self.mutate(Grouping::Single, |commands, _| commands.move_block_down(id), |_| None)
    }

    pub fn duplicate_block(&mut self, id: BlockId) -> Option<CursorPoint> {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.duplicate_block(id),
            Option::clone,
        )
    }

    pub fn transform_block(&mut self, id: BlockId, ty: &BlockType) -> Option<CursorPoint> {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.transform_block(id, ty),
            Option::clone,
        )
    }

    /// Transforms the block under the caret, or every block the selection
    /// touches when it spans several.
    pub fn transform_selection(&mut self, ty: &BlockType) -> Option<CursorPoint> {
        let selection = self.capture_selection()?;
        let (start, end) = selection.bounds(&self.doc);
        let first = self.doc.position(start.block)?;
        let last = self.doc.position(end.block)?;
        let ids: Vec<BlockId> = self.doc.blocks()[first..=last]
            .iter()
            .map(|block| block.id)
            .collect();
        self.mutate(
            Grouping::Single,
            |commands, _| commands.transform_blocks(&ids, ty),
            Option::clone,
        )
    }

    pub fn merge_blocks(&mut self, source: BlockId, target: BlockId) -> Option<CursorPoint> {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.merge_blocks(source, target),
            Option::clone,
        )
    }

    /// Enter at the live selection. A range is deleted first.
    pub fn split_block(&mut self) -> Option<CursorPoint> {
        let selection = self.capture_selection()?;
        self.mutate(
            Grouping::Single,
            |commands, _| {
                let at = if selection.is_collapsed() {
                    selection.anchor.clone()
                } else {
                    commands.delete_selection(&selection)?
                };
                commands.split_block(&at)
            },
            Option::clone,
        )
    }

    pub fn indent_list_item(&mut self, block: BlockId, item: ItemId) -> Result<bool, EditError> {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.indent_list_item(block, item),
            |_| None,
        )
    }

    pub fn outdent_list_item(&mut self, block: BlockId, item: ItemId) -> Result<bool, EditError> {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.outdent_list_item(block, item),
            |_| None,
        )
    }

    pub fn set_checked(&mut self, block: BlockId, item: ItemId, checked: bool) -> bool {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.set_checked(block, item, checked),
            |_| None,
        )
    }

    pub fn update_block(&mut self, id: BlockId, partial: &Value) -> bool {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.update_block(id, partial),
            |_| None,
        )
    }

    pub fn insert_table_row(&mut self, block: BlockId, at: Option<usize>) -> Option<RowId> {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.insert_table_row(block, at),
            |_| None,
        )
    }

    pub fn delete_table_row(&mut self, block: BlockId, index: usize) -> bool {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.delete_table_row(block, index),
            |_| None,
        )
    }

    pub fn insert_table_column(&mut self, block: BlockId, at: Option<usize>) -> bool {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.insert_table_column(block, at),
            |_| None,
        )
    }

    pub fn delete_table_column(&mut self, block: BlockId, index: usize) -> bool {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.delete_table_column(block, index),
            |_| None,
        )
    }

    pub fn attach_upload(
        &mut self,
        block: BlockId,
        result: Result<UploadResult, UploadError>,
    ) -> bool {
        self.mutate(
            Grouping::Single,
            |commands, _| commands.attach_upload(block, result),
            |_| None,
        )
    }

    // Text verbs at the live selection. Without a selection they do nothing.

    pub fn type_text(&mut self, text: &str) -> Option<CursorPoint> {
        let selection = self.capture_selection()?;
        self.mutate(
            Grouping::Typing,
            |commands, _| commands.insert_text(&selection, text),
            Option::clone,
        )
    }

    /// Backspace: deletes the selection, or steps back from the caret.
    pub fn delete_backward(&mut self) -> Option<CursorPoint> {
        let selection = self.capture_selection()?;
        if !selection.is_collapsed() {
            return self.delete_selection();
        }
        self.mutate(
            Grouping::Typing,
            |commands, _| commands.delete_backward(&selection.anchor),
            Option::clone,
        )
    }

    pub fn delete_selection(&mut self) -> Option<CursorPoint> {
        let selection = self.capture_selection()?;
        self.mutate(
            Grouping::Single,
            |commands, _| commands.delete_selection(&selection),
            Option::clone,
        )
    }

    /// Toggles an inline format over the live selection and puts the same
    /// selection back afterwards.
    pub fn toggle_inline_format(&mut self, format: InlineFormat) -> bool {
        let Some(selection) = self.capture_selection() else {
            return false;
        };
        let kept = self.mutate(
            Grouping::Single,
            |commands, _| commands.toggle_inline_format(&selection, format),
            |_| None,
        );
        match kept {
            Some(kept) => {
                self.place(kept);
                true
            }
            None => false,
        }
    }

    pub fn is_format_active(&self, format: InlineFormat) -> bool {
        self.capture_selection().is_some_and(|selection| {
            self.read_commands(|commands| commands.is_format_active(&selection, format))
        })
    }

    pub fn insert_link(&mut self, url: &str, text: Option<&str>) -> bool {
        let Some(selection) = self.capture_selection() else {
            return false;
        };
        let linked = self.mutate(
            Grouping::Single,
            |commands, host| commands.insert_link(host, &selection, url, text),
            |_| None,
        );
        match linked {
            Some(range) => {
                self.place(range);
                true
            }
            None => false,
        }
    }

    pub fn remove_link(&mut self) -> bool {
        let Some(selection) = self.capture_selection() else {
            return false;
        };
        self.mutate(
            Grouping::Single,
            |commands, _| commands.remove_link(&selection),
            |_| None,
        )
    }

    pub fn set_alignment(&mut self, alignment: Alignment) -> bool {
        let Some(selection) = self.capture_selection() else {
            return false;
        };
        self.mutate(
            Grouping::Single,
            |commands, _| commands.set_alignment(&selection.anchor, alignment),
            |_| None,
        )
    }

    pub fn set_text_color(&mut self, color: Option<&str>) -> bool {
        self.style(|commands, selection| commands.set_text_color(selection, color))
    }

    pub fn set_highlight(&mut self, color: Option<&str>) -> bool {
        self.style(|commands, selection| commands.set_highlight(selection, color))
    }

    pub fn set_font_family(&mut self, family: Option<&str>) -> bool {
        self.style(|commands, selection| commands.set_font_family(selection, family))
    }

    pub fn set_font_size(&mut self, size: Option<&str>) -> bool {
        self.style(|commands, selection| commands.set_font_size(selection, size))
    }

    // History

    pub fn undo(&mut self) -> bool {
        self.scheduler.cancel(TaskKey::SealTypingGroup);
        let current = HistoryEntry::new(self.doc.clone(), self.capture_selection());
        let Some(entry) = self.history.undo(current) else {
            debug!("nothing to undo");
            return false;
        };
        self.reinstate(entry);
        true
    }

    pub fn redo(&mut self) -> bool {
        self.scheduler.cancel(TaskKey::SealTypingGroup);
        let current = HistoryEntry::new(self.doc.clone(), self.capture_selection());
        let Some(entry) = self.history.redo(current) else {
            debug!("nothing to redo");
            return false;
        };
        self.reinstate(entry);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // Time

    /// Advances the virtual clock and runs every task that came due.
    /// Returns how many ran.
    pub fn tick(&mut self, now: Duration) -> usize {
        self.now = self.now.max(now);
        let tasks = self.scheduler.take_due(self.now);
        let count = tasks.len();
        for task in tasks {
            match task {
                Task::SealTypingGroup => self.history.seal_typing(),
                Task::DeferredFocus(target) => {
                    self.selection
                        .restore(&mut self.host, &self.doc, Some(&target));
                }
            }
        }
        count
    }

    /// Cancels everything still pending. The session stays usable.
    pub fn shutdown(&mut self) {
        let cancelled = self.scheduler.cancel_all();
        self.history.seal_typing();
        debug!(cancelled, "session shut down");
    }

    fn mutate<T>(
        &mut self,
        grouping: Grouping,
        edit: impl FnOnce(&mut Commands<'_>, &mut H) -> T,
        focus: impl FnOnce(&T) -> Option<CursorPoint>,
    ) -> T {
        let cursor = self.capture_selection();
        let snapshot = self.doc.clone();
        let result = {
            let mut commands = Commands::new(&mut self.doc, &self.registry, &self.config);
            edit(&mut commands, &mut self.host)
        };
        self.stamp_anchors();
        if self.doc != snapshot {
            match grouping {
                Grouping::Typing => {
                    if self.history.begin_typing() {
                        self.history.record(snapshot, cursor);
                    }
                    let due = self.now + self.config.coalesce_window();
                    self.scheduler.schedule(Task::SealTypingGroup, due);
                }
                Grouping::Single => {
                    self.history.seal_typing();
                    self.scheduler.cancel(TaskKey::SealTypingGroup);
                    self.history.record(snapshot, cursor);
                }
            }
        }
        if let Some(point) = focus(&result) {
            self.place(SelectionDescriptor::collapsed(point));
        }
        result
    }

    fn style(
        &mut self,
        edit: impl FnOnce(&mut Commands<'_>, &SelectionDescriptor) -> bool,
    ) -> bool {
        let Some(selection) = self.capture_selection() else {
            return false;
        };
        let changed = self.mutate(
            Grouping::Single,
            |commands, _| edit(commands, &selection),
            |_| None,
        );
        if changed {
            self.place(selection);
        }
        changed
    }

    fn read_commands<T>(&self, read: impl FnOnce(&Commands<'_>) -> T) -> T {
        let mut doc = self.doc.clone();
        let commands = Commands::new(&mut doc, &self.registry, &self.config);
        read(&commands)
    }

    fn place(&mut self, target: SelectionDescriptor) {
        let delay = self.config.focus_delay();
        if delay.is_zero() {
            self.selection
                .restore(&mut self.host, &self.doc, Some(&target));
        } else {
            self.scheduler
                .schedule(Task::DeferredFocus(target), self.now + delay);
        }
    }

    fn reinstate(&mut self, entry: HistoryEntry) {
        self.doc = entry.snapshot;
        self.scheduler.cancel(TaskKey::DeferredFocus);
        match entry.cursor {
            Some(cursor) => {
                self.selection
                    .restore(&mut self.host, &self.doc, Some(&cursor));
            }
            None => {
                if let Some(first) = self.doc.first().map(|block| block.id) {
                    self.selection
                        .move_to_start(&mut self.host, &self.doc, first);
                }
            }
        }
    }

    fn ensure_not_empty(&mut self) {
        if self.doc.is_empty() {
            let block = self
                .registry
                .construct(self.registry.default_type(), None);
            let _ = self.doc.insert(0, block);
        }
    }

    fn claim_anchors(&mut self) {
        for block in self.doc.iter() {
            if let BlockKind::Heading {
                anchor: Some(anchor),
                ..
            } = &block.kind
            {
                self.anchors.claim(anchor);
            }
        }
    }

    /// Gives every heading without an anchor a unique one.
    fn stamp_anchors(&mut self) {
        let missing: Vec<BlockId> = self
            .doc
            .iter()
            .filter(|block| {
                matches!(
                    block.kind,
                    BlockKind::Heading { anchor: None, .. }
                )
            })
            .map(|block| block.id)
            .collect();
        for id in missing {
            if let Some(block) = self.doc.get_mut(id)
                && let BlockKind::Heading {
                    content, anchor, ..
                } = &mut block.kind
            {
                *anchor = Some(self.anchors.anchor_for(content.text()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::Region;
    use crate::selection::HeadlessHost;
    use serde_json::json;

    fn session() -> EditorSession<HeadlessHost> {
        EditorSession::new(
            Arc::new(BlockRegistry::default()),
            EditorConfig::default(),
            HeadlessHost::new(),
        )
    }

    fn caret_in_first(session: &mut EditorSession<HeadlessHost>, offset: usize) -> BlockId {
        let id = session.document().blocks()[0].id;
        let point = CursorPoint::new(id, Region::Main, offset);
        let doc = session.document().clone();
        session.host_mut().place(&doc, &point);
        id
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_new_session_has_one_default_block() {
        let session = session();
        assert_eq!(session.document().len(), 1);
        assert_eq!(
            session.document().blocks()[0].block_type(),
            BlockType::Paragraph
        );
        assert!(!session.can_undo());
    }

    #[test]
    fn test_typing_burst_is_one_undo_entry() {
        let mut session = session();
        caret_in_first(&mut session, 0);
        for ch in ["a", "b", "c"] {
            session.type_text(ch).unwrap();
        }
        assert_eq!(session.document().plain_text(), "abc");
        assert_eq!(session.history().undo_len(), 1);

        session.tick(ms(600));
        session.type_text("d").unwrap();
        assert_eq!(session.history().undo_len(), 2);

        assert!(session.undo());
        assert_eq!(session.document().plain_text(), "abc");
        assert!(session.undo());
        assert_eq!(session.document().plain_text(), "");
        assert!(!session.undo());
    }

    #[test]
    fn test_keystroke_pushes_debounce_out() {
        let mut session = session();
        caret_in_first(&mut session, 0);
        session.type_text("a").unwrap();
        session.tick(ms(400));
        session.type_text("b").unwrap();
        assert_eq!(session.tick(ms(800)), 0);
        assert!(session.history().is_typing());
        assert_eq!(session.tick(ms(900)), 1);
        assert!(!session.history().is_typing());
    }

    #[test]
    fn test_unchanged_document_records_nothing() {
        let mut session = session();
        let id = caret_in_first(&mut session, 0);
        assert!(!session.move_block_up(id));
        assert!(!session.set_font_size(Some("9000px")));
        assert!(!session.can_undo());
    }

    #[test]
    fn test_undo_restores_cursor_and_redo_replays() {
        let mut session = session();
        let id = caret_in_first(&mut session, 0);
        session.type_text("hello").unwrap();
        session.tick(ms(1000));
        let before = session.document().clone();
        let point = session
            .insert_block(&BlockType::Heading, Some(&json!({"content": "Title"})), Placement::After(id));
        assert_eq!(session.capture_selection().unwrap().anchor.block, point.block);

        assert!(session.undo());
        assert_eq!(session.document(), &before);
        assert_eq!(session.capture_selection().unwrap().anchor.block, id);

        assert!(session.redo());
        assert_eq!(session.document().len(), 2);
        assert!(!session.redo());
    }

    #[test]
    fn test_headings_get_unique_anchors() {
        let mut session = session();
        let data = json!({"content": "Intro"});
        let first = session.insert_block(&BlockType::Heading, Some(&data), Placement::End);
        let second = session.insert_block(&BlockType::Heading, Some(&data), Placement::End);
        let anchors: Vec<String> = session
            .outline()
            .into_iter()
            .map(|entry| entry.anchor)
            .collect();
        assert_eq!(anchors, vec!["intro", "intro-1"]);
        let anchor_of = |id| match &session.document().get(id).unwrap().kind {
            BlockKind::Heading { anchor, .. } => anchor.clone(),
            _ => None,
        };
        assert_eq!(anchor_of(first.block).as_deref(), Some("intro"));
        assert_eq!(anchor_of(second.block).as_deref(), Some("intro-1"));
    }

    #[test]
    fn test_load_resets_history_and_anchors() {
        let mut session = session();
        caret_in_first(&mut session, 0);
        session.type_text("x").unwrap();
        let payload = json!({
            "version": 1,
            "blocks": [
                {"type": "heading", "data": {"content": "Intro", "anchor": "intro"}},
                {"type": "heading", "data": {"content": "Intro"}}
            ]
        });
        session.load_json(&payload.to_string()).unwrap();
        assert!(!session.can_undo());
        assert!(session.host().current().is_none());
        let anchors: Vec<String> = session
            .outline()
            .into_iter()
            .map(|entry| entry.anchor)
            .collect();
        assert_eq!(anchors, vec!["intro", "intro-1"]);

        session.load_json("[]").unwrap();
        assert_eq!(session.document().len(), 1);
        assert!(session.load_json("not json").is_err());
    }

    #[test]
    fn test_deferred_focus_and_shutdown() {
        let config = EditorConfig {
            focus_delay_ms: 50,
            ..EditorConfig::default()
        };
        let mut session = EditorSession::new(
            Arc::new(BlockRegistry::default()),
            config,
            HeadlessHost::new(),
        );
        let id = caret_in_first(&mut session, 0);
        let point = session.insert_block(&BlockType::Quote, None, Placement::After(id));
        assert_eq!(session.capture_selection().unwrap().anchor.block, id);
        assert_eq!(session.tick(ms(50)), 1);
        assert_eq!(session.capture_selection().unwrap().anchor.block, point.block);

        session.insert_block(&BlockType::Code, None, Placement::End);
        session.shutdown();
        assert!(session.scheduler().is_empty());
        assert_eq!(session.tick(ms(500)), 0);
    }

    #[test]
    fn test_format_keeps_selection() {
        let mut session = session();
        let id = caret_in_first(&mut session, 0);
        session.type_text("bold").unwrap();
        let doc = session.document().clone();
        session.host_mut().select(
            &doc,
            &CursorPoint::new(id, Region::Main, 0),
            &CursorPoint::new(id, Region::Main, 4),
        );
        assert!(session.toggle_inline_format(InlineFormat::Bold));
        assert!(session.is_format_active(InlineFormat::Bold));
        let selection = session.capture_selection().unwrap();
        assert_eq!(selection.region_range(), Some(0..4));
        assert!(session.insert_link("example.com", None));
        assert_eq!(
            session.serialize().blocks[0].data["content"],
            json!("<a href=\"https://example.com\" class=\"bw-link\"><b>bold</b></a>")
        );
    }

    #[test]
    fn test_commands_without_selection_do_nothing() {
        let mut session = session();
        assert!(session.type_text("x").is_none());
        assert!(!session.toggle_inline_format(InlineFormat::Italic));
        assert!(!session.insert_link("example.com", None));
        assert!(session.split_block().is_none());
        assert!(!session.can_undo());
    }
}
