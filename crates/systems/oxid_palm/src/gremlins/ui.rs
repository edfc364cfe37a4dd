// crates/systems/oxid_palm/src/gremlins/ui.rs
//! What a Gremlin needs from the running OS.
//!
//! The engine never reads emulated memory itself. The host snapshots the
//! active form into a [`UiState`], answers text-encoding questions through
//! [`TextServices`] and receives the generated input through [`EventSink`].

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Japanese,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i16,
    pub y: i16,
    pub width: i16,
    pub height: i16,
}

impl Rect {
    pub const fn new(x: i16, y: i16, width: i16, height: i16) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, x: i16, y: i16) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

/// Form object kinds, as the OS enumerates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormObjectKind {
    Field,
    Control,
    List,
    Table,
    Bitmap,
    Line,
    Frame,
    Rectangle,
    Label,
    Title,
    Popup,
    GraffitiState,
    Gadget,
    ScrollBar,
}

impl FormObjectKind {
    /// Kinds that do nothing when tapped.
    pub fn is_decorative(self) -> bool {
        matches!(
            self,
            Self::Bitmap | Self::Line | Self::Frame | Self::Rectangle | Self::Label | Self::Title | Self::GraffitiState
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormObject {
    pub kind: FormObjectKind,
    pub bounds: Rect,
}

/// Editable field holding the focus.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FocusedField {
    pub text: Vec<u8>,
    pub max_chars: usize,
}

impl FocusedField {
    pub fn remaining(&self) -> usize {
        self.max_chars.saturating_sub(self.text.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    pub screen_width: i16,
    pub screen_height: i16,
    pub silkscreen_buttons: Vec<Rect>,
    pub objects: Vec<FormObject>,
    pub focus: Option<FocusedField>,
    pub language: Language,
}

impl Default for UiState {
    fn default() -> Self {
        // 160x160 display over the 60 pixel silkscreen strip
        Self {
            screen_width: 160,
            screen_height: 220,
            silkscreen_buttons: vec![
                Rect::new(0, 160, 27, 30),
                Rect::new(0, 190, 27, 30),
                Rect::new(133, 160, 27, 30),
                Rect::new(133, 190, 27, 30),
            ],
            objects: Vec::new(),
            focus: None,
            language: Language::English,
        }
    }
}

// ============================================================================
//  TEXT SERVICES
// ============================================================================

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ByteAttr: u8 {
        const SINGLE = 0x01;
        const FIRST  = 0x02;
        const LAST   = 0x04;
        const MIDDLE = 0x08;
    }
}

pub trait TextServices {
    /// False on ROMs without the international text manager.
    fn has_intl_manager(&self) -> bool;

    /// Character starting at `offset` and its width in bytes.
    fn next_char(&self, text: &[u8], offset: usize) -> (u16, usize);

    /// Byte range of the character containing `offset`.
    fn char_bounds(&self, text: &[u8], offset: usize) -> (usize, usize);

    fn byte_attr(&self, byte: u8) -> ByteAttr;
}

/// One byte, one character. Used whenever the OS has no text manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleByteText;

impl TextServices for SingleByteText {
    fn has_intl_manager(&self) -> bool {
        false
    }

    fn next_char(&self, text: &[u8], offset: usize) -> (u16, usize) {
        match text.get(offset) {
            Some(&b) => (b as u16, 1),
            None => (0, 0),
        }
    }

    fn char_bounds(&self, text: &[u8], offset: usize) -> (usize, usize) {
        let start = offset.min(text.len());
        (start, (start + 1).min(text.len()))
    }

    fn byte_attr(&self, _byte: u8) -> ByteAttr {
        ByteAttr::SINGLE
    }
}

/// Japanese ROM text manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftJisText;

impl ShiftJisText {
    fn is_lead(b: u8) -> bool {
        matches!(b, 0x81..=0x9F | 0xE0..=0xFC)
    }

    fn width_at(text: &[u8], offset: usize) -> usize {
        if Self::is_lead(text[offset]) && offset + 1 < text.len() {
            2
        } else {
            1
        }
    }
}

impl TextServices for ShiftJisText {
    fn has_intl_manager(&self) -> bool {
        true
    }

    fn next_char(&self, text: &[u8], offset: usize) -> (u16, usize) {
        if offset >= text.len() {
            return (0, 0);
        }
        match Self::width_at(text, offset) {
            2 => (u16::from_be_bytes([text[offset], text[offset + 1]]), 2),
            _ => (text[offset] as u16, 1),
        }
    }

    fn char_bounds(&self, text: &[u8], offset: usize) -> (usize, usize) {
        let mut start = 0;
        while start < text.len() {
            let end = start + Self::width_at(text, start);
            if offset < end {
                return (start, end);
            }
            start = end;
        }
        (text.len(), text.len())
    }

    fn byte_attr(&self, byte: u8) -> ByteAttr {
        let mut attr = ByteAttr::empty();
        if matches!(byte, 0x00..=0x7F | 0xA1..=0xDF) {
            attr |= ByteAttr::SINGLE;
        }
        if Self::is_lead(byte) {
            attr |= ByteAttr::FIRST;
        }
        if matches!(byte, 0x40..=0x7E | 0x80..=0xFC) {
            attr |= ByteAttr::LAST;
        }
        attr
    }
}

// ============================================================================
//  EVENT SINK
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GremlinEvent {
    Key { chr: u16, key_code: u16, modifiers: u16 },
    Pen { x: i16, y: i16, down: bool },
}

/// Receives synthesized input; the host posts it to the OS event queue.
pub trait EventSink {
    fn key_down(&mut self, chr: u16, key_code: u16, modifiers: u16);
    fn pen(&mut self, x: i16, y: i16, down: bool);
    fn reset_auto_off_timer(&mut self) {}
    fn gremlins_finished(&mut self) {}
}

/// Keeps everything it is sent.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub events: Vec<GremlinEvent>,
    pub timer_resets: u32,
    pub finished: u32,
}

impl EventSink for RecordingSink {
    fn key_down(&mut self, chr: u16, key_code: u16, modifiers: u16) {
        self.events.push(GremlinEvent::Key { chr, key_code, modifiers });
    }

    fn pen(&mut self, x: i16, y: i16, down: bool) {
        self.events.push(GremlinEvent::Pen { x, y, down });
    }

    fn reset_auto_off_timer(&mut self) {
        self.timer_resets += 1;
    }

    fn gremlins_finished(&mut self) {
        self.finished += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // konnichiwa in Shift-JIS
    const KONNICHIWA: &[u8] = b"\x82\xB1\x82\xF1\x82\xC9\x82\xBF\x82\xCD";

    #[test]
    fn shift_jis_never_splits_a_character() {
        let sjis = ShiftJisText;
        assert_eq!(sjis.next_char(KONNICHIWA, 0), (0x82B1, 2));
        assert_eq!(sjis.char_bounds(KONNICHIWA, 3), (2, 4));
        assert_eq!(sjis.char_bounds(KONNICHIWA, 4), (4, 6));
        assert_eq!(sjis.char_bounds(b"a\x82\xA0b", 2), (1, 3));
        assert_eq!(sjis.char_bounds(KONNICHIWA, 99), (10, 10));
    }

    #[test]
    fn lead_bytes_are_not_single() {
        let sjis = ShiftJisText;
        assert!(!sjis.byte_attr(0x82).contains(ByteAttr::SINGLE));
        assert!(sjis.byte_attr(0xB1).contains(ByteAttr::SINGLE));
        assert!(!sjis.byte_attr(0x80).contains(ByteAttr::SINGLE));
        assert!(SingleByteText.byte_attr(0x82).contains(ByteAttr::SINGLE));
    }

    #[test]
    fn decorative_objects() {
        assert!(FormObjectKind::Label.is_decorative());
        assert!(!FormObjectKind::Control.is_decorative());
        let field = FocusedField { text: b"abc".to_vec(), max_chars: 5 };
        assert_eq!(field.remaining(), 2);
    }
}
