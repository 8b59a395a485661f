#![no_main]

use blockwright::{
    BlockRegistry, BlockType, Commands, CursorPoint, Document, EditorConfig, InlineFormat,
    Placement, Region, SelectionDescriptor,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let registry = BlockRegistry::default();
    let config = EditorConfig::default();
    let mut doc = Document::new();
    let _ = doc.insert(0, registry.construct(&BlockType::Paragraph, None));
    let types = BlockType::BUILT_IN;

    for chunk in data.chunks(3) {
        let [op, a, b] = [chunk[0], *chunk.get(1).unwrap_or(&0), *chunk.get(2).unwrap_or(&0)];
        let target = doc.blocks()[usize::from(a) % doc.len()].id;
        let point = CursorPoint::new(target, Region::Main, usize::from(b % 8));
        let mut commands = Commands::new(&mut doc, &registry, &config);
        match op % 8 {
            0 => {
                let ty = &types[usize::from(b) % types.len()];
                commands.insert_block(ty, None, Placement::After(target));
            }
            1 => {
                let _ = commands.delete_block(target);
            }
            2 => {
                commands.insert_text(&SelectionDescriptor::collapsed(point), "ab");
            }
            3 => {
                commands.split_block(&point);
            }
            4 => {
                commands.delete_backward(&point);
            }
            5 => {
                let ty = &types[usize::from(b) % types.len()];
                commands.transform_block(target, ty);
            }
            6 => {
                let range = SelectionDescriptor::range(
                    CursorPoint::new(target, Region::Main, 0),
                    point,
                );
                commands.toggle_inline_format(&range, InlineFormat::Bold);
            }
            _ => {
                commands.duplicate_block(target);
            }
        }
        assert!(!doc.is_empty());
    }
});
