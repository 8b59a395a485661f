use blockwright::{
    Block, BlockId, BlockKind, BlockRegistry, BlockType, Commands, CursorPoint, Document,
    EditorConfig, ListStyle, Placement, Region, SelectionDescriptor,
};
use blockwright_naive_oracle::BlockSequence;
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;

struct Fixture {
    doc: Document,
    registry: BlockRegistry,
    config: EditorConfig,
}

impl Fixture {
    fn with(blocks: Vec<Block>) -> Self {
        Self {
            doc: Document::from_blocks(blocks).unwrap(),
            registry: BlockRegistry::default(),
            config: EditorConfig::default(),
        }
    }

    fn paragraphs(texts: &[&str]) -> Self {
        let registry = BlockRegistry::default();
        let blocks = texts
            .iter()
            .map(|text| registry.construct(&BlockType::Paragraph, Some(&json!({ "content": text }))))
            .collect();
        Self::with(blocks)
    }

    fn commands(&mut self) -> Commands<'_> {
        Commands::new(&mut self.doc, &self.registry, &self.config)
    }

    fn ids(&self) -> Vec<BlockId> {
        self.doc.iter().map(|block| block.id).collect()
    }

    fn texts(&self) -> Vec<String> {
        self.doc.iter().map(Block::plain_text).collect()
    }
}

#[test]
fn test_heading_to_paragraph_keeps_text() {
    let registry = BlockRegistry::default();
    let heading = registry.construct(
        &BlockType::Heading,
        Some(&json!({ "content": "Hi", "level": 1 })),
    );
    let old_id = heading.id;
    let mut fixture = Fixture::with(vec![heading]);

    let point = fixture
        .commands()
        .transform_block(old_id, &BlockType::Paragraph)
        .unwrap();
    let block = &fixture.doc.blocks()[0];
    assert_eq!(block.block_type(), BlockType::Paragraph);
    assert_eq!(block.plain_text(), "Hi");
    assert_ne!(block.id, old_id);
    assert_eq!(point.block, block.id);
}

#[test]
fn test_list_restyle_keeps_ids() {
    let registry = BlockRegistry::default();
    let list = registry.construct(
        &BlockType::BulletList,
        Some(&json!({ "items": [{ "content": "a" }, { "content": "b" }] })),
    );
    let id = list.id;
    let mut fixture = Fixture::with(vec![list]);
    fixture
        .commands()
        .transform_block(id, &BlockType::CheckList)
        .unwrap();

    let block = fixture.doc.get(id).unwrap();
    match &block.kind {
        BlockKind::List { style, items, .. } => {
            assert_eq!(*style, ListStyle::Check);
            assert_eq!(items.len(), 2);
        }
        other => panic!("expected a list, got {other:?}"),
    }
    assert_eq!(block.plain_text(), "[ ] a\n[ ] b");
}

#[test]
fn test_unregistered_transform_is_refused() {
    let mut fixture = Fixture::paragraphs(&["x"]);
    let id = fixture.ids()[0];
    assert!(
        fixture
            .commands()
            .transform_block(id, &BlockType::from_tag("sketch"))
            .is_none()
    );
    assert_eq!(fixture.ids(), vec![id]);
}

#[test]
fn test_delete_only_block_leaves_default() {
    let mut fixture = Fixture::paragraphs(&["only"]);
    let id = fixture.ids()[0];
    let point = fixture.commands().delete_block(id).unwrap();
    assert_eq!(fixture.doc.len(), 1);
    assert_ne!(point.block, id);
    assert_eq!(fixture.texts(), vec![""]);
}

#[test]
fn test_delete_focuses_neighbour() {
    let mut fixture = Fixture::paragraphs(&["a", "b", "c"]);
    let ids = fixture.ids();
    let point = fixture.commands().delete_block(ids[1]).unwrap();
    assert_eq!(point.block, ids[2]);
    let point = fixture.commands().delete_block(ids[2]).unwrap();
    assert_eq!(point, CursorPoint::new(ids[0], Region::Main, 1).with_hint(&fixture.doc));
}

#[test]
fn test_move_at_edges_is_noop() {
    let mut fixture = Fixture::paragraphs(&["a", "b"]);
    let ids = fixture.ids();
    assert!(!fixture.commands().move_block_up(ids[0]));
    assert!(!fixture.commands().move_block_down(ids[1]));
    assert!(fixture.commands().move_block_down(ids[0]));
    assert_eq!(fixture.texts(), vec!["b", "a"]);
}

#[test]
fn test_merge_refuses_opaque_source() {
    let registry = BlockRegistry::default();
    let divider = registry.construct(&BlockType::Divider, None);
    let paragraph = registry.construct(&BlockType::Paragraph, Some(&json!({ "content": "p" })));
    let (divider_id, paragraph_id) = (divider.id, paragraph.id);
    let mut fixture = Fixture::with(vec![paragraph, divider]);
    assert!(fixture.commands().merge_blocks(divider_id, paragraph_id).is_none());
    assert!(fixture.commands().merge_blocks(paragraph_id, divider_id).is_none());
    assert_eq!(fixture.doc.len(), 2);
}

#[test]
fn test_merge_paragraph_into_list_joins_last_item() {
    let registry = BlockRegistry::default();
    let list = registry.construct(
        &BlockType::BulletList,
        Some(&json!({ "items": [{ "content": "one" }, { "content": "two" }] })),
    );
    let paragraph = registry.construct(&BlockType::Paragraph, Some(&json!({ "content": "!" })));
    let (list_id, paragraph_id) = (list.id, paragraph.id);
    let mut fixture = Fixture::with(vec![list, paragraph]);

    let point = fixture.commands().merge_blocks(paragraph_id, list_id).unwrap();
    assert_eq!(fixture.texts(), vec!["- one\n- two!"]);
    assert_eq!(point.offset, 3);
    assert!(matches!(point.region, Region::Item { .. }));
}

#[test]
fn test_split_then_merge_restores_text() {
    let mut fixture = Fixture::paragraphs(&["hello"]);
    let id = fixture.ids()[0];
    let point = fixture
        .commands()
        .split_block(&CursorPoint::new(id, Region::Main, 2))
        .unwrap();
    assert_eq!(fixture.texts(), vec!["he", "llo"]);

    let merged = fixture.commands().merge_blocks(point.block, id).unwrap();
    assert_eq!(fixture.texts(), vec!["hello"]);
    assert_eq!(merged.offset, 2);
}

#[test]
fn test_backspace_keeps_quote_caption() {
    let registry = BlockRegistry::default();
    let paragraph = registry.construct(&BlockType::Paragraph, Some(&json!({ "content": "a" })));
    let quote = registry.construct(
        &BlockType::Quote,
        Some(&json!({ "content": "body", "caption": "Ada Lovelace" })),
    );
    let quote_id = quote.id;
    let mut fixture = Fixture::with(vec![paragraph, quote]);

    fixture
        .commands()
        .delete_backward(&CursorPoint::new(quote_id, Region::Main, 0));
    assert_eq!(fixture.texts(), vec!["a", "body\nAda Lovelace"]);
}

/// A splittable block: its type and data.
fn splittable_strategy() -> impl Strategy<Value = (BlockType, serde_json::Value)> {
    let plain = "[a-z]{0,6}";
    let rich = (plain, plain, plain)
        .prop_map(|(head, bold, tail)| format!("{head}<b>{bold}</b>{tail}"));
    prop_oneof![
        rich.clone()
            .prop_map(|content| (BlockType::Paragraph, json!({ "content": content }))),
        (rich.clone(), 1u8..=6).prop_map(|(content, level)| {
            (BlockType::Heading, json!({ "content": content, "level": level }))
        }),
        (rich.clone(), plain).prop_map(|(content, caption)| {
            (BlockType::Quote, json!({ "content": content, "caption": caption }))
        }),
        rich.clone()
            .prop_map(|content| (BlockType::Callout, json!({ "content": content }))),
        (plain, plain).prop_map(|(head, tail)| {
            (BlockType::Code, json!({ "code": format!("{head} {tail}"), "language": "rust" }))
        }),
        (rich, plain, any::<bool>()).prop_map(|(title, body, open)| {
            (BlockType::Accordion, json!({ "title": title, "body": body, "open": open }))
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(proptest_config::cases()))]
    #[test]
    fn test_split_then_merge_is_identity(
        (ty, data) in splittable_strategy(),
        offset in any::<usize>(),
    ) {
        let registry = BlockRegistry::default();
        let block = registry.construct(&ty, Some(&data));
        let original = block.clone();
        let id = block.id;
        let len = block.text(&Region::Main).unwrap().len();
        let offset = offset % (len + 1);
        let mut fixture = Fixture::with(vec![block]);

        let point = fixture
            .commands()
            .split_block(&CursorPoint::new(id, Region::Main, offset))
            .unwrap();
        prop_assert_eq!(fixture.doc.len(), 2);
        let merged = fixture.commands().merge_blocks(point.block, id).unwrap();
        prop_assert_eq!((merged.region, merged.offset), (Region::Main, offset));
        prop_assert_eq!(fixture.doc.blocks(), &[original][..]);
    }

    #[test]
    fn test_split_item_then_backspace_is_identity(
        texts in proptest::collection::vec("[a-z]{1,6}", 1..5),
        pick_item in any::<usize>(),
        offset in any::<usize>(),
    ) {
        let registry = BlockRegistry::default();
        let items: Vec<_> = texts.iter().map(|text| json!({ "content": text })).collect();
        let list = registry.construct(&BlockType::BulletList, Some(&json!({ "items": items })));
        let original = list.clone();
        let id = list.id;
        let item = match &list.kind {
            BlockKind::List { items, .. } => items.roots()[pick_item % items.roots().len()],
            _ => unreachable!(),
        };
        let region = Region::Item { id: item };
        let len = list.text(&region).unwrap().len();
        let offset = offset % (len + 1);
        let mut fixture = Fixture::with(vec![list]);

        let point = fixture
            .commands()
            .split_block(&CursorPoint::new(id, region.clone(), offset))
            .unwrap();
        prop_assert_ne!(&point.region, &region);
        let joined = fixture.commands().delete_backward(&point).unwrap();
        prop_assert_eq!((joined.region, joined.offset), (region, offset));
        prop_assert_eq!(fixture.doc.blocks(), &[original][..]);
    }
}

#[test]
fn test_indent_then_outdent_restores_list() {
    let registry = BlockRegistry::default();
    let list = registry.construct(
        &BlockType::NumberedList,
        Some(&json!({ "items": [{ "content": "a" }, { "content": "b" }, { "content": "c" }] })),
    );
    let original = list.clone();
    let id = list.id;
    let items = match &list.kind {
        BlockKind::List { items, .. } => items.roots().to_vec(),
        _ => unreachable!(),
    };
    let mut fixture = Fixture::with(vec![list]);

    assert!(!fixture.commands().indent_list_item(id, items[0]).unwrap());
    assert!(fixture.commands().indent_list_item(id, items[1]).unwrap());
    assert_eq!(fixture.texts(), vec!["# a\n  # b\n# c"]);
    assert!(fixture.commands().outdent_list_item(id, items[1]).unwrap());
    assert!(!fixture.commands().outdent_list_item(id, items[1]).unwrap());
    assert_eq!(fixture.doc.get(id), Some(&original));

    let stranger = blockwright::core::fresh_id();
    assert!(fixture.commands().indent_list_item(id, stranger).is_err());
}

#[test]
fn test_table_bounds() {
    let registry = BlockRegistry::default();
    let table = registry.construct(&BlockType::Table, None);
    let id = table.id;
    let mut fixture = Fixture::with(vec![table]);

    assert!(!fixture.commands().delete_table_row(id, 3));
    assert!(!fixture.commands().delete_table_column(id, 7));
    assert!(fixture.commands().insert_table_column(id, Some(99)));
    assert!(fixture.commands().insert_table_row(id, None).is_some());
    for _ in 0..3 {
        assert!(fixture.commands().delete_table_row(id, 0));
    }
    // the last row stays
    assert!(!fixture.commands().delete_table_row(id, 0));

    match &fixture.doc.get(id).unwrap().kind {
        BlockKind::Table(table) => {
            assert_eq!(table.row_count(), 1);
            assert_eq!(table.column_count(), 4);
        }
        other => panic!("expected a table, got {other:?}"),
    }
}

#[test]
fn test_update_block_merges_partial_data() {
    let registry = BlockRegistry::default();
    let heading = registry.construct(
        &BlockType::Heading,
        Some(&json!({ "content": "Title", "level": 1 })),
    );
    let id = heading.id;
    let mut fixture = Fixture::with(vec![heading]);
    assert!(fixture.commands().update_block(id, &json!({ "level": 3 })));
    match &fixture.doc.get(id).unwrap().kind {
        BlockKind::Heading { level, content, .. } => {
            assert_eq!(*level, 3);
            assert_eq!(content.text(), "Title");
        }
        other => panic!("expected a heading, got {other:?}"),
    }
    assert!(!fixture.commands().update_block(id, &json!({ "level": 3 })));
}

#[derive(Debug, Clone)]
enum Op {
    Insert(usize, String),
    Delete(usize),
    MoveUp(usize),
    MoveDown(usize),
    Duplicate(usize),
    Split(usize, usize),
    Merge(usize, usize),
    Type(usize, usize, String),
    Backspace(usize, usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let text = "[a-z]{0,6}";
    prop_oneof![
        (any::<usize>(), text).prop_map(|(at, text)| Op::Insert(at, text)),
        any::<usize>().prop_map(Op::Delete),
        any::<usize>().prop_map(Op::MoveUp),
        any::<usize>().prop_map(Op::MoveDown),
        any::<usize>().prop_map(Op::Duplicate),
        (any::<usize>(), 0usize..8).prop_map(|(at, offset)| Op::Split(at, offset)),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Merge(a, b)),
        (any::<usize>(), 0usize..8, "[a-z]{1,3}").prop_map(|(at, offset, text)| Op::Type(at, offset, text)),
        (any::<usize>(), 1usize..8).prop_map(|(at, offset)| Op::Backspace(at, offset)),
    ]
}

fn pick(ids: &[BlockId], index: usize) -> BlockId {
    ids[index % ids.len()]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(proptest_config::cases()))]
    #[test]
    fn test_block_commands_match_naive_sequence(
        ops in proptest::collection::vec(op_strategy(), 1..40),
    ) {
        let mut fixture = Fixture::paragraphs(&["seed"]);
        let mut oracle = BlockSequence::from_texts(&[(fixture.ids()[0], "seed")]);

        for op in ops {
            let ids = fixture.ids();
            match op {
                Op::Insert(at, text) => {
                    let reference = pick(&ids, at);
                    let data = json!({ "content": text });
                    let point = fixture.commands().insert_block(
                        &BlockType::Paragraph,
                        Some(&data),
                        Placement::After(reference),
                    );
                    oracle.insert_after(Some(reference), point.block, &text);
                }
                Op::Delete(at) => {
                    let id = pick(&ids, at);
                    let point = fixture.commands().delete_block(id).unwrap();
                    oracle.delete(id, point.block);
                }
                Op::MoveUp(at) => {
                    let id = pick(&ids, at);
                    prop_assert_eq!(fixture.commands().move_block_up(id), oracle.move_up(id));
                }
                Op::MoveDown(at) => {
                    let id = pick(&ids, at);
                    prop_assert_eq!(fixture.commands().move_block_down(id), oracle.move_down(id));
                }
                Op::Duplicate(at) => {
                    let id = pick(&ids, at);
                    let point = fixture.commands().duplicate_block(id).unwrap();
                    oracle.duplicate(id, point.block);
                }
                Op::Split(at, offset) => {
                    let id = pick(&ids, at);
                    let len = fixture.doc.get(id).unwrap().plain_text().chars().count();
                    let point = fixture
                        .commands()
                        .split_block(&CursorPoint::new(id, Region::Main, offset.min(len)))
                        .unwrap();
                    oracle.split(id, offset, point.block);
                }
                Op::Merge(a, b) => {
                    let (source, target) = (pick(&ids, a), pick(&ids, b));
                    let merged = fixture.commands().merge_blocks(source, target).is_some();
                    prop_assert_eq!(merged, oracle.merge(source, target));
                }
                Op::Type(at, offset, text) => {
                    let id = pick(&ids, at);
                    let len = fixture.doc.get(id).unwrap().plain_text().chars().count();
                    let caret = SelectionDescriptor::collapsed(
                        CursorPoint::new(id, Region::Main, offset.min(len)),
                    );
                    fixture.commands().insert_text(&caret, &text).unwrap();
                    oracle.type_at(id, offset, &text);
                }
                Op::Backspace(at, offset) => {
                    let id = pick(&ids, at);
                    let len = fixture.doc.get(id).unwrap().plain_text().chars().count();
                    if len == 0 {
                        continue;
                    }
                    fixture
                        .commands()
                        .delete_backward(&CursorPoint::new(id, Region::Main, offset.min(len)))
                        .unwrap();
                    oracle.delete_char_before(id, offset);
                }
            }

            let ids = fixture.ids();
            prop_assert!(!ids.is_empty());
            prop_assert_eq!(ids.iter().collect::<BTreeSet<_>>().len(), ids.len());
            prop_assert_eq!(&ids, &oracle.ids());
            prop_assert_eq!(fixture.texts(), oracle.texts());
        }
    }
}
