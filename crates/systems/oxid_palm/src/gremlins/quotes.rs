// crates/systems/oxid_palm/src/gremlins/quotes.rs
//! Canned text typed into focused fields.
//!
//! Quotes are raw device bytes. The Japanese pool is Shift-JIS, so a naive
//! byte cut can land inside a character.

use super::ui::Language;

pub const ENGLISH_QUOTES: &[&[u8]] = &[
    b"A journey of a thousand miles begins with a single step.",
    b"Brevity is the soul of wit.",
    b"The quick brown fox jumps over the lazy dog.",
    b"All that glitters is not gold.",
    b"Fortune favors the bold.",
    b"Knowledge is power.",
    b"Well begun is half done.",
    b"Haste makes waste.",
    b"Actions speak louder than words.",
    b"When in Rome, do as the Romans do.",
];

pub const JAPANESE_QUOTES: &[&[u8]] = &[
    // konnichiwa
    b"\x82\xB1\x82\xF1\x82\xC9\x82\xBF\x82\xCD",
    // arigatou
    b"\x82\xA0\x82\xE8\x82\xAA\x82\xC6\x82\xA4",
    // sayounara
    b"\x82\xB3\x82\xE6\x82\xA4\x82\xC8\x82\xE7",
    // ohayougozaimasu
    b"\x82\xA8\x82\xCD\x82\xE6\x82\xA4\x82\xB2\x82\xB4\x82\xA2\x82\xDC\x82\xB7\x81\x42",
    // iroha nihoheto, with an ASCII tail
    b"\x82\xA2\x82\xEB\x82\xCD\x82\xC9\x82\xD9\x82\xD6\x82\xC6 Palm OS",
];

pub fn pool(language: Language) -> &'static [&'static [u8]] {
    match language {
        Language::English => ENGLISH_QUOTES,
        Language::Japanese => JAPANESE_QUOTES,
    }
}
