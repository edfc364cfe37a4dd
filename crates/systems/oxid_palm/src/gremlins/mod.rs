// crates/systems/oxid_palm/src/gremlins/mod.rs
//! Gremlins: seeded, reproducible UI fuzzing.
//!
//! Each call to [`Gremlins::get_fake_event`] is one idle tick. The tick
//! either does nothing or hands exactly one synthetic key or pen event to the
//! host's [`EventSink`]. Every random decision comes from [`GremlinRng`], so
//! a run is fully determined by its seed, the UI snapshots it is shown and
//! the text services it is given.

pub mod info;
pub mod keys;
pub mod quotes;
pub mod rng;
pub mod ui;

pub use info::{DatabaseInfo, GremlinInfo};
pub use rng::GremlinRng;
pub use ui::{
    ByteAttr, EventSink, FocusedField, FormObject, FormObjectKind, GremlinEvent, Language, Rect, RecordingSink,
    ShiftJisText, SingleByteText, TextServices, UiState,
};

use crate::error::StreamError;
use crate::stream::{StreamReader, StreamResult, StreamWriter};
use keys::*;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Highest seed `set_seed` accepts.
pub const MAX_SEED_VALUE: u32 = 1000;

/// Version of the record written by [`Gremlins::save`].
pub const GREMLINS_RECORD_VERSION: u32 = 2;

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not initialized, or stopped.
    Inactive,
    /// Step limit passed on this tick.
    Finished,
    /// Tick spent letting the event loop drain.
    CatchUp,
    Event(GremlinEvent),
    /// Nothing generated; the host posts a null event.
    Idle,
}

impl Tick {
    pub fn is_finished(&self) -> bool {
        matches!(self, Tick::Finished)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gremlins {
    inited: bool,
    running: bool,
    stepping: bool,
    number: u16,
    counter: u32,
    until: u32,
    save_until: u32,
    catch_up: bool,
    need_pen_up: bool,
    last_pen_x: i16,
    last_pen_y: i16,
    last_pen_down: bool,
    chars_to_type: Vec<u8>,
    key_prob_sum: u32,
    start_millis: u64,
    stop_millis: u64,
    rng: GremlinRng,
    info: GremlinInfo,
}

impl Default for Gremlins {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The ROM's text manager when it has one, single-byte rules otherwise.
fn active_text(text: &dyn TextServices) -> &dyn TextServices {
    if text.has_intl_manager() {
        text
    } else {
        &SingleByteText
    }
}

impl Gremlins {
    pub fn new() -> Self {
        Self {
            inited: false,
            running: false,
            stepping: false,
            number: 0,
            counter: 0,
            until: 0,
            save_until: 0,
            catch_up: false,
            need_pen_up: false,
            last_pen_x: -1,
            last_pen_y: -1,
            last_pen_down: false,
            chars_to_type: Vec::new(),
            key_prob_sum: 0,
            start_millis: 0,
            stop_millis: 0,
            rng: GremlinRng::default(),
            info: GremlinInfo::default(),
        }
    }

    // ========================================================================
    //  LIFECYCLE
    // ========================================================================

    /// Starts Gremlin `info.number`, running steps `0..=info.steps`.
    pub fn initialize(&mut self, info: GremlinInfo) {
        *self = Self {
            inited: true,
            running: true,
            number: info.number,
            until: info.steps,
            save_until: info.steps,
            rng: GremlinRng::new(info.number as u32),
            start_millis: now_millis(),
            info,
            ..Self::new()
        };
        info!("Gremlin #{} started, {} steps", self.number, self.until);
    }

    /// Reseeds the generator. Seeds above [`MAX_SEED_VALUE`] are refused.
    pub fn set_seed(&mut self, seed: u32) -> bool {
        if seed > MAX_SEED_VALUE {
            return false;
        }
        self.rng.seed(seed);
        true
    }

    /// Allows exactly one more tick, then pauses and restores the limit.
    pub fn step(&mut self) {
        if !self.inited {
            return;
        }
        if !self.stepping {
            self.save_until = self.until;
        }
        self.until = self.counter;
        self.stepping = true;
        self.running = true;
    }

    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.stop_millis = now_millis();
            info!("Gremlin #{} stopped at step {}", self.number, self.counter);
        }
    }

    /// Picks up where `stop` left off; counters are kept.
    pub fn resume(&mut self) {
        if self.inited {
            self.running = true;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Skip the next tick so the OS can drain its event queue.
    pub fn request_catch_up(&mut self) {
        self.catch_up = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.inited
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn until(&self) -> u32 {
        self.until
    }

    pub fn info(&self) -> &GremlinInfo {
        &self.info
    }

    pub fn last_pen(&self) -> (i16, i16, bool) {
        (self.last_pen_x, self.last_pen_y, self.last_pen_down)
    }

    pub fn chars_to_type(&self) -> &[u8] {
        &self.chars_to_type
    }

    pub fn key_prob_sum(&self) -> u32 {
        self.key_prob_sum
    }

    pub fn start_millis(&self) -> u64 {
        self.start_millis
    }

    pub fn stop_millis(&self) -> u64 {
        self.stop_millis
    }

    // ========================================================================
    //  TICK
    // ========================================================================

    pub fn get_fake_event(&mut self, ui: &UiState, text: &dyn TextServices, sink: &mut dyn EventSink) -> Tick {
        if !self.inited || !self.running {
            return Tick::Inactive;
        }
        if self.counter > self.until {
            return self.limit_reached(sink);
        }

        sink.reset_auto_off_timer();
        self.counter += 1;

        if std::mem::take(&mut self.catch_up) {
            return Tick::CatchUp;
        }
        if self.need_pen_up {
            self.need_pen_up = false;
            return self.post_pen(sink, -1, -1, false);
        }

        let text = active_text(text);
        if !self.chars_to_type.is_empty() {
            return self.send_chars_to_type(text, sink);
        }

        let chance = self.rng.below(100);
        let focus = ui.focus.as_ref();

        if chance < KEY_DOWN_WITHOUT_FOCUS_CHANCE || (chance < KEY_DOWN_WITH_FOCUS_CHANCE && focus.is_some()) {
            if let Some(field) = focus {
                if self.rng.below(100) < TYPE_QUOTE_CHANCE && self.queue_quote(ui.language, field, text) {
                    return self.send_chars_to_type(text, sink);
                }
            }
            return self.fake_key(text, sink);
        }

        if chance < PEN_DOWN_CHANCE {
            let (x, y) = self.pen_target(ui);
            self.need_pen_up = true;
            return self.post_pen(sink, x, y, true);
        }

        let chr = if chance < MENU_CHANCE {
            VCHR_MENU
        } else if chance < FIND_CHANCE {
            VCHR_FIND
        } else if chance < KEYBOARD_CHANCE {
            VCHR_KEYBOARD
        } else if chance < LOW_BATTERY_CHANCE {
            VCHR_LOW_BATTERY
        } else if chance < APP_SWITCH_CHANCE {
            self.app_switch_key()
        } else if chance < POWER_OFF_CHANCE {
            VCHR_HARD_POWER
        } else {
            return Tick::Idle;
        };
        self.post_key(sink, chr)
    }

    fn limit_reached(&mut self, sink: &mut dyn EventSink) -> Tick {
        self.running = false;
        if self.stepping {
            self.stepping = false;
            self.until = self.save_until;
            debug!("Gremlin #{} paused after step {}", self.number, self.counter);
        } else {
            self.stop_millis = now_millis();
            info!(
                "Gremlin #{} finished after {} steps ({} ms)",
                self.number,
                self.counter,
                self.stop_millis.saturating_sub(self.start_millis)
            );
            sink.gremlins_finished();
        }
        Tick::Finished
    }

    /// Types the next pending character, whole.
    pub fn send_chars_to_type(&mut self, text: &dyn TextServices, sink: &mut dyn EventSink) -> Tick {
        let (chr, width) = text.next_char(&self.chars_to_type, 0);
        if width == 0 {
            self.chars_to_type.clear();
            return Tick::Idle;
        }
        self.chars_to_type.drain(..width.min(self.chars_to_type.len()));
        self.post_key(sink, chr)
    }

    fn post_key(&mut self, sink: &mut dyn EventSink, chr: u16) -> Tick {
        let modifiers = if is_virtual(chr) { COMMAND_KEY_MASK } else { 0 };
        sink.key_down(chr, 0, modifiers);
        Tick::Event(GremlinEvent::Key {
            chr,
            key_code: 0,
            modifiers,
        })
    }

    fn post_pen(&mut self, sink: &mut dyn EventSink, x: i16, y: i16, down: bool) -> Tick {
        self.last_pen_x = x;
        self.last_pen_y = y;
        self.last_pen_down = down;
        sink.pen(x, y, down);
        Tick::Event(GremlinEvent::Pen { x, y, down })
    }

    // ========================================================================
    //  KEYS
    // ========================================================================

    fn key_usable(text: &dyn TextServices, code: u16) -> bool {
        !needs_single_byte_check(code) || text.byte_attr(code as u8).contains(ByteAttr::SINGLE)
    }

    fn fake_key(&mut self, text: &dyn TextServices, sink: &mut dyn EventSink) -> Tick {
        if self.key_prob_sum == 0 {
            self.key_prob_sum = (0..KEY_TABLE_LEN as u16)
                .filter(|&code| Self::key_usable(text, code))
                .map(|code| KEY_WEIGHTS[code as usize] as u32)
                .sum();
        }
        if self.key_prob_sum == 0 {
            return Tick::Idle;
        }

        let roll = self.rng.below(self.key_prob_sum);
        let mut acc = 0u32;
        for code in 0..KEY_TABLE_LEN as u16 {
            if !Self::key_usable(text, code) {
                continue;
            }
            acc += KEY_WEIGHTS[code as usize] as u32;
            if acc > roll {
                return self.post_key(sink, code);
            }
        }
        Tick::Idle
    }

    fn app_switch_key(&mut self) -> u16 {
        match self.rng.below(5) {
            4 => VCHR_LAUNCH,
            n => VCHR_HARD1 + n as u16,
        }
    }

    // ========================================================================
    //  QUOTES
    // ========================================================================

    /// Queues a quote cut to the room left in `field`. False if nothing fits.
    fn queue_quote(&mut self, language: Language, field: &FocusedField, text: &dyn TextServices) -> bool {
        let pool = quotes::pool(language);
        if pool.is_empty() {
            return false;
        }
        let quote = pool[self.rng.below(pool.len() as u32) as usize];
        let room = field.remaining();
        let cut = if quote.len() <= room {
            quote.len()
        } else {
            self.truncation_point(quote, room, text)
        };
        self.chars_to_type = quote[..cut].to_vec();
        !self.chars_to_type.is_empty()
    }

    /// Starts at the first character boundary at or after `room`, then
    /// backs off one character per non-zero 1-in-3 roll.
    fn truncation_point(&mut self, quote: &[u8], room: usize, text: &dyn TextServices) -> usize {
        let (start, end) = text.char_bounds(quote, room);
        let mut cut = if start == room { room } else { end };
        while cut > 0 && self.rng.below(3) != 0 {
            cut = text.char_bounds(quote, cut - 1).0;
        }
        cut
    }

    // ========================================================================
    //  PEN
    // ========================================================================

    fn pen_target(&mut self, ui: &UiState) -> (i16, i16) {
        let r = self.rng.below(100);
        if r < PEN_ANYWHERE_CHANCE {
            return self.anywhere(ui);
        }
        if r < PEN_SILKSCREEN_CHANCE && !ui.silkscreen_buttons.is_empty() {
            let i = self.rng.below(ui.silkscreen_buttons.len() as u32) as usize;
            return self.point_in(&ui.silkscreen_buttons[i]);
        }
        let targets: Vec<&FormObject> = ui.objects.iter().filter(|o| !o.kind.is_decorative()).collect();
        if targets.is_empty() {
            return self.anywhere(ui);
        }
        let i = self.rng.below(targets.len() as u32) as usize;
        self.point_in(&targets[i].bounds)
    }

    fn anywhere(&mut self, ui: &UiState) -> (i16, i16) {
        let screen = Rect::new(0, 0, ui.screen_width, ui.screen_height);
        self.point_in(&screen)
    }

    fn point_in(&mut self, r: &Rect) -> (i16, i16) {
        let x = r.x + self.rng.below(r.width.max(1) as u32) as i16;
        let y = r.y + self.rng.below(r.height.max(1) as u32) as i16;
        (x, y)
    }

    // ========================================================================
    //  PERSISTENCE
    // ========================================================================

    pub fn save(&self, w: &mut StreamWriter) {
        w.u32(GREMLINS_RECORD_VERSION)
            .bool(self.inited)
            .u16(self.number)
            .u32(self.counter)
            .u32(self.until)
            .u32(self.save_until)
            .bool(self.catch_up)
            .bool(self.need_pen_up)
            .i16(self.last_pen_x)
            .i16(self.last_pen_y)
            .bool(self.last_pen_down)
            .u16(self.chars_to_type.len() as u16)
            .raw(&self.chars_to_type)
            .u32(self.key_prob_sum)
            .u64(self.start_millis)
            .u64(self.stop_millis)
            .u32(self.rng.state());
        self.info.write(w);
    }

    /// Restores a record written by `save`. Version 1 records carry no
    /// timestamps. The key weight total is always recomputed.
    pub fn load(&mut self, r: &mut StreamReader<'_>) -> StreamResult<()> {
        let version = r.u32()?;
        if version == 0 || version > GREMLINS_RECORD_VERSION {
            return Err(StreamError::UnsupportedVersion {
                record: "gremlins",
                found: version,
                max: GREMLINS_RECORD_VERSION,
            });
        }

        let inited = r.bool()?;
        let number = r.u16()?;
        let counter = r.u32()?;
        let until = r.u32()?;
        let save_until = r.u32()?;
        let catch_up = r.bool()?;
        let need_pen_up = r.bool()?;
        let last_pen_x = r.i16()?;
        let last_pen_y = r.i16()?;
        let last_pen_down = r.bool()?;
        let pending = r.u16()? as usize;
        let chars_to_type = r.take(pending)?.to_vec();
        // Depends on the text services of whoever saved it.
        let _stale_prob_sum = r.u32()?;
        let (start_millis, stop_millis) = if version >= 2 { (r.u64()?, r.u64()?) } else { (0, 0) };
        let rng = GremlinRng::new(r.u32()?);
        let info = GremlinInfo::read(r)?;

        *self = Self {
            inited,
            running: inited && counter <= until,
            stepping: until != save_until,
            number,
            counter,
            until,
            save_until,
            catch_up,
            need_pen_up,
            last_pen_x,
            last_pen_y,
            last_pen_down,
            chars_to_type,
            key_prob_sum: 0,
            start_millis,
            stop_millis,
            rng,
            info,
        };
        debug!("Gremlin #{} restored at step {} (record v{version})", number, counter);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KONNICHIWA: &[u8] = b"\x82\xB1\x82\xF1\x82\xC9\x82\xBF\x82\xCD";

    fn running(number: u16, steps: u32) -> Gremlins {
        let mut g = Gremlins::new();
        g.initialize(GremlinInfo::new(number, steps));
        g
    }

    fn tick(g: &mut Gremlins, sink: &mut RecordingSink) -> Tick {
        g.get_fake_event(&UiState::default(), &SingleByteText, sink)
    }

    #[test]
    fn seed_limit() {
        let mut g = Gremlins::new();
        assert!(g.set_seed(MAX_SEED_VALUE));
        assert!(!g.set_seed(MAX_SEED_VALUE + 1));
    }

    #[test]
    fn uninitialized_engine_does_nothing() {
        let mut g = Gremlins::new();
        let mut sink = RecordingSink::default();
        assert_eq!(tick(&mut g, &mut sink), Tick::Inactive);
        assert_eq!(sink.timer_resets, 0);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn limit_is_inclusive() {
        let mut g = running(4, 5);
        let mut sink = RecordingSink::default();
        for _ in 0..6 {
            assert!(!tick(&mut g, &mut sink).is_finished());
        }
        assert_eq!(tick(&mut g, &mut sink), Tick::Finished);
        assert_eq!(sink.finished, 1);
        assert_eq!(sink.timer_resets, 6);
        assert_eq!(tick(&mut g, &mut sink), Tick::Inactive);
        assert_eq!(sink.finished, 1);
    }

    #[test]
    fn step_allows_one_tick_then_pauses() {
        let mut g = running(9, 100);
        let mut sink = RecordingSink::default();
        for _ in 0..3 {
            tick(&mut g, &mut sink);
        }
        g.step();
        assert!(!tick(&mut g, &mut sink).is_finished());
        assert_eq!(tick(&mut g, &mut sink), Tick::Finished);
        assert_eq!(sink.finished, 0);
        assert_eq!(g.until(), 100);
        assert!(!g.is_running());

        g.resume();
        assert!(!tick(&mut g, &mut sink).is_finished());
        assert_eq!(g.counter(), 5);
    }

    #[test]
    fn stop_and_resume_keep_the_counter() {
        let mut g = running(2, 50);
        let mut sink = RecordingSink::default();
        tick(&mut g, &mut sink);
        g.stop();
        assert_eq!(tick(&mut g, &mut sink), Tick::Inactive);
        g.resume();
        tick(&mut g, &mut sink);
        assert_eq!(g.counter(), 2);
        g.reset();
        assert!(!g.is_initialized());
    }

    #[test]
    fn catch_up_spends_a_tick() {
        let mut g = running(1, 10);
        let mut sink = RecordingSink::default();
        g.request_catch_up();
        assert_eq!(tick(&mut g, &mut sink), Tick::CatchUp);
        assert_eq!(g.counter(), 1);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn pen_down_is_followed_by_pen_up() {
        let mut g = running(17, 1000);
        let mut sink = RecordingSink::default();
        let mut seen = false;
        for _ in 0..200 {
            if let Tick::Event(GremlinEvent::Pen { down: true, .. }) = tick(&mut g, &mut sink) {
                assert_eq!(
                    tick(&mut g, &mut sink),
                    Tick::Event(GremlinEvent::Pen { x: -1, y: -1, down: false })
                );
                assert_eq!(g.last_pen(), (-1, -1, false));
                seen = true;
                break;
            }
        }
        assert!(seen);
    }

    #[test]
    fn same_seed_same_run() {
        let run = |seed| {
            let mut g = running(seed, 400);
            let mut sink = RecordingSink::default();
            while !tick(&mut g, &mut sink).is_finished() {}
            sink.events
        };
        assert_eq!(run(33), run(33));
        assert_ne!(run(33), run(34));
    }

    #[test]
    fn virtual_keys_carry_the_command_modifier() {
        let mut g = running(5, 2000);
        let mut sink = RecordingSink::default();
        while !tick(&mut g, &mut sink).is_finished() {}
        for ev in &sink.events {
            if let GremlinEvent::Key { chr, modifiers, .. } = *ev {
                assert_eq!(modifiers != 0, is_virtual(chr));
            }
        }
    }

    #[test]
    fn key_weight_total_follows_the_encoding() {
        let mut g = running(1, 10);
        let mut sink = RecordingSink::default();
        g.fake_key(&SingleByteText, &mut sink);
        assert_eq!(g.key_prob_sum(), 442);

        let mut g = running(1, 10);
        let mut sink = RecordingSink::default();
        g.fake_key(&ShiftJisText, &mut sink);
        // 0xA1..=0xDF stand alone, the other 65 high bytes do not
        assert_eq!(g.key_prob_sum(), 442 - 65);
        for ev in &sink.events {
            if let GremlinEvent::Key { chr, .. } = *ev {
                assert!(!(0x81..=0x9F).contains(&chr));
            }
        }
    }

    #[test]
    fn pending_text_is_typed_one_character_at_a_time() {
        let mut g = running(1, 10);
        g.chars_to_type = KONNICHIWA.to_vec();
        let mut sink = RecordingSink::default();
        let t = g.get_fake_event(&UiState::default(), &ShiftJisText, &mut sink);
        assert_eq!(
            t,
            Tick::Event(GremlinEvent::Key { chr: 0x82B1, key_code: 0, modifiers: 0 })
        );
        assert_eq!(g.chars_to_type(), &KONNICHIWA[2..]);
    }

    #[test]
    fn truncation_lands_on_a_boundary() {
        for seed in 0..50 {
            let mut g = running(seed, 10);
            for room in 0..KONNICHIWA.len() {
                let cut = g.truncation_point(KONNICHIWA, room, &ShiftJisText);
                assert_eq!(cut % 2, 0);
                assert!(cut <= room + 1);
            }
        }
    }

    #[test]
    fn quote_fits_the_field() {
        let mut g = running(8, 10);
        let field = FocusedField { text: vec![b'x'; 20], max_chars: 25 };
        assert!(g.queue_quote(Language::English, &field, &SingleByteText));
        assert!(g.chars_to_type().len() <= 5);

        let full = FocusedField { text: vec![b'x'; 25], max_chars: 25 };
        assert!(!g.queue_quote(Language::English, &full, &SingleByteText));
    }

    #[test]
    fn save_then_load_restores_everything_but_the_weight_cache() {
        let mut g = running(12, 300);
        g.info.app_list.push(DatabaseInfo::app(u32::from_be_bytes(*b"memo"), "Memo Pad"));
        let mut sink = RecordingSink::default();
        for _ in 0..40 {
            tick(&mut g, &mut sink);
        }
        g.fake_key(&SingleByteText, &mut sink);
        g.chars_to_type = b"tail".to_vec();
        assert_ne!(g.key_prob_sum(), 0);

        let mut w = StreamWriter::new();
        g.save(&mut w);
        let bytes = w.into_bytes();

        let mut loaded = Gremlins::new();
        loaded.load(&mut StreamReader::new(&bytes)).unwrap();
        assert_eq!(loaded.key_prob_sum(), 0);
        g.key_prob_sum = 0;
        assert_eq!(loaded, g);
    }

    #[test]
    fn newer_records_are_rejected() {
        let mut w = StreamWriter::new();
        w.u32(GREMLINS_RECORD_VERSION + 1);
        let bytes = w.into_bytes();
        let err = Gremlins::new().load(&mut StreamReader::new(&bytes)).unwrap_err();
        assert!(matches!(err, StreamError::UnsupportedVersion { found: 3, .. }));
    }

    #[test]
    fn version_one_records_have_no_timestamps() {
        let mut w = StreamWriter::new();
        w.u32(1)
            .bool(true)
            .u16(7)
            .u32(3)
            .u32(10)
            .u32(10)
            .bool(false)
            .bool(true)
            .i16(5)
            .i16(6)
            .bool(true)
            .u16(0)
            .u32(999)
            .u32(0xDEAD_BEEF);
        GremlinInfo::new(7, 10).write(&mut w);
        let bytes = w.into_bytes();

        let mut g = Gremlins::new();
        g.load(&mut StreamReader::new(&bytes)).unwrap();
        assert_eq!(g.number(), 7);
        assert_eq!(g.counter(), 3);
        assert_eq!(g.last_pen(), (5, 6, true));
        assert_eq!(g.start_millis(), 0);
        assert_eq!(g.key_prob_sum(), 0);
        assert!(g.is_running());
    }

    mod truncation {
        use super::*;
        use proptest::prelude::*;

        fn boundaries(quote: &[u8], text: &dyn TextServices) -> Vec<usize> {
            let mut out = vec![0];
            let mut at = 0;
            while at < quote.len() {
                at += text.next_char(quote, at).1;
                out.push(at);
            }
            out
        }

        fn check(seed: u16, quote: &[u8], room: usize, text: &dyn TextServices) -> Result<(), TestCaseError> {
            let mut g = running(seed, 10);
            let cut = g.truncation_point(quote, room, text);
            let marks = boundaries(quote, text);
            let first_fit = marks.iter().copied().find(|&b| b >= room).unwrap_or(quote.len());
            prop_assert!(marks.contains(&cut), "cut {} splits a character", cut);
            prop_assert!(cut <= first_fit);
            Ok(())
        }

        proptest! {
            #[test]
            fn shift_jis_cuts_never_split_a_character(
                seed in 0u16..=1000,
                q in 0usize..quotes::JAPANESE_QUOTES.len(),
                room in 0usize..40,
            ) {
                let quote = quotes::JAPANESE_QUOTES[q];
                check(seed, quote, room % quote.len(), &ShiftJisText)?;
            }

            #[test]
            fn single_byte_cuts_stay_within_room(
                seed in 0u16..=1000,
                q in 0usize..quotes::ENGLISH_QUOTES.len(),
                room in 0usize..60,
            ) {
                let quote = quotes::ENGLISH_QUOTES[q];
                check(seed, quote, room % quote.len(), &SingleByteText)?;
            }
        }
    }
}
