#![no_main]

use blockwright::RichText;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let text = RichText::from_markup(&input);
    let markup = text.to_markup();
    assert_eq!(RichText::from_markup(&markup), text);
});
