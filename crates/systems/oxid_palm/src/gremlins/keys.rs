// crates/systems/oxid_palm/src/gremlins/keys.rs
//! Key weights and Palm OS virtual characters.

// ============================================================================
//  VIRTUAL CHARACTERS (Palm OS Chars.h)
// ============================================================================

pub const CHR_BACKSPACE: u16 = 0x0008;
pub const CHR_TAB: u16 = 0x0009;
pub const CHR_LINEFEED: u16 = 0x000A;
pub const CHR_PAGE_UP: u16 = 0x000B;
pub const CHR_PAGE_DOWN: u16 = 0x000C;
pub const CHR_LEFT_ARROW: u16 = 0x001C;
pub const CHR_RIGHT_ARROW: u16 = 0x001D;
pub const CHR_UP_ARROW: u16 = 0x001E;
pub const CHR_DOWN_ARROW: u16 = 0x001F;
pub const CHR_SPACE: u16 = 0x0020;

pub const VCHR_LOW_BATTERY: u16 = 0x0101;
pub const VCHR_NEXT_FIELD: u16 = 0x0103;
pub const VCHR_MENU: u16 = 0x0105;
pub const VCHR_LAUNCH: u16 = 0x0108;
pub const VCHR_KEYBOARD: u16 = 0x0109;
pub const VCHR_FIND: u16 = 0x010A;
pub const VCHR_PREV_FIELD: u16 = 0x010C;
pub const VCHR_HARD1: u16 = 0x0204;
pub const VCHR_HARD_POWER: u16 = 0x0208;

/// Modifier carried by every virtual character.
pub const COMMAND_KEY_MASK: u16 = 0x0008;

pub const KEY_TABLE_LEN: usize = 0x110;

pub fn is_virtual(chr: u16) -> bool {
    chr >= 0x0100
}

// ============================================================================
//  CUMULATIVE THRESHOLDS (percent)
// ============================================================================

pub const KEY_DOWN_WITHOUT_FOCUS_CHANCE: u32 = 10;
pub const KEY_DOWN_WITH_FOCUS_CHANCE: u32 = KEY_DOWN_WITHOUT_FOCUS_CHANCE + 30;
pub const PEN_DOWN_CHANCE: u32 = KEY_DOWN_WITH_FOCUS_CHANCE + 40;
pub const MENU_CHANCE: u32 = PEN_DOWN_CHANCE + 4;
pub const FIND_CHANCE: u32 = MENU_CHANCE + 2;
pub const KEYBOARD_CHANCE: u32 = FIND_CHANCE + 1;
pub const LOW_BATTERY_CHANCE: u32 = KEYBOARD_CHANCE + 2;
pub const APP_SWITCH_CHANCE: u32 = LOW_BATTERY_CHANCE + 4;
pub const POWER_OFF_CHANCE: u32 = APP_SWITCH_CHANCE + 1;

/// Percent chance that a keystroke into a focused field types a quote.
pub const TYPE_QUOTE_CHANCE: u32 = 10;

/// Pen target split: below the first, anywhere; below the second, silkscreen.
pub const PEN_ANYWHERE_CHANCE: u32 = 5;
pub const PEN_SILKSCREEN_CHANCE: u32 = PEN_ANYWHERE_CHANCE + 5;

// ============================================================================
//  KEY WEIGHTS
// ============================================================================

const fn weight_of(code: usize) -> u8 {
    let c = code as u16;
    match c {
        CHR_BACKSPACE | CHR_TAB | CHR_LINEFEED | CHR_SPACE => 10,
        CHR_PAGE_UP | CHR_PAGE_DOWN => 1,
        CHR_LEFT_ARROW..=CHR_DOWN_ARROW => 2,
        0x41..=0x5A | 0x61..=0x7A => 4,
        0x30..=0x39 => 2,
        0x21..=0x7E => 1,
        0x80..=0xFF => 1,
        VCHR_NEXT_FIELD | VCHR_MENU | VCHR_KEYBOARD | VCHR_PREV_FIELD => 1,
        _ => 0,
    }
}

const fn build_weights() -> [u8; KEY_TABLE_LEN] {
    let mut table = [0u8; KEY_TABLE_LEN];
    let mut i = 0;
    while i < KEY_TABLE_LEN {
        table[i] = weight_of(i);
        i += 1;
    }
    table
}

/// One weight per key code `0x000..0x110`.
pub static KEY_WEIGHTS: [u8; KEY_TABLE_LEN] = build_weights();

/// High-half bytes only count when the encoding can use them on their own.
pub fn needs_single_byte_check(code: u16) -> bool {
    (0x80..=0xFF).contains(&code)
}
