use oxid_palm::gremlins::keys::{VCHR_MENU, COMMAND_KEY_MASK};
use oxid_palm::gremlins::{
    DatabaseInfo, FocusedField, FormObject, FormObjectKind, GremlinEvent, GremlinRng, Language, RecordingSink, Rect,
    ShiftJisText, SingleByteText, TextServices, UiState, MAX_SEED_VALUE,
};
use oxid_palm::stream::{StreamReader, StreamWriter};
use oxid_palm::{GremlinInfo, Gremlins, Tick};
use proptest::prelude::*;

fn started(number: u16, steps: u32) -> Gremlins {
    let mut g = Gremlins::new();
    g.initialize(GremlinInfo::new(number, steps));
    g
}

/// A memo-style form: a focused field, two buttons and a decorative label.
fn memo_form(language: Language) -> UiState {
    UiState {
        objects: vec![
            FormObject { kind: FormObjectKind::Field, bounds: Rect::new(0, 16, 160, 120) },
            FormObject { kind: FormObjectKind::Control, bounds: Rect::new(1, 147, 36, 12) },
            FormObject { kind: FormObjectKind::Control, bounds: Rect::new(42, 147, 36, 12) },
            FormObject { kind: FormObjectKind::Label, bounds: Rect::new(0, 0, 80, 12) },
        ],
        focus: Some(FocusedField { text: b"note: ".to_vec(), max_chars: 40 }),
        language,
        ..UiState::default()
    }
}

fn run_ticks(g: &mut Gremlins, ui: &UiState, text: &dyn TextServices, n: usize, sink: &mut RecordingSink) {
    for _ in 0..n {
        g.get_fake_event(ui, text, sink);
    }
}

fn snapshot(g: &Gremlins) -> Vec<u8> {
    let mut w = StreamWriter::new();
    g.save(&mut w);
    w.into_bytes()
}

fn restored(bytes: &[u8]) -> Gremlins {
    let mut g = Gremlins::new();
    g.load(&mut StreamReader::new(bytes)).unwrap();
    g
}

// ============================================================================
//  GOLDEN RUN
// ============================================================================

#[test]
fn gremlin_one_on_an_empty_form() {
    let mut g = started(1, 1000);
    let mut sink = RecordingSink::default();
    run_ticks(&mut g, &UiState::default(), &SingleByteText, 12, &mut sink);

    let pen = |x, y, down| GremlinEvent::Pen { x, y, down };
    let up = pen(-1, -1, false);
    assert_eq!(
        sink.events,
        vec![
            pen(94, 100, true),
            up,
            pen(118, 98, true),
            up,
            pen(105, 205, true),
            up,
            GremlinEvent::Key { chr: VCHR_MENU, key_code: 0, modifiers: COMMAND_KEY_MASK },
            pen(11, 135, true),
            up,
            pen(156, 51, true),
            up,
            GremlinEvent::Key { chr: 0xB8, key_code: 0, modifiers: 0 },
        ]
    );
    assert_eq!(sink.timer_resets, 12);
}

#[test]
fn generator_is_the_c_runtime_lcg() {
    let mut rng = GremlinRng::new(MAX_SEED_VALUE);
    let mut state = MAX_SEED_VALUE;
    for _ in 0..1000 {
        state = state.wrapping_mul(214_013).wrapping_add(2_531_011);
        assert_eq!(rng.next(), ((state >> 16) & 0x7FFF) as u16);
    }
}

// ============================================================================
//  LIFECYCLE
// ============================================================================

#[test]
fn finished_run_signals_once_and_goes_quiet() {
    let mut g = started(21, 30);
    let mut sink = RecordingSink::default();
    let mut ticks = 0;
    while !g.get_fake_event(&UiState::default(), &SingleByteText, &mut sink).is_finished() {
        ticks += 1;
    }
    assert_eq!(ticks, 31);
    assert_eq!(g.counter(), 31);
    assert_eq!(sink.finished, 1);
    assert!(!g.is_running());
    assert!(g.stop_millis() >= g.start_millis());
    assert_eq!(g.get_fake_event(&UiState::default(), &SingleByteText, &mut sink), Tick::Inactive);
}

#[test]
fn stepping_pauses_without_finishing() {
    let mut g = started(2, 10);
    let mut sink = RecordingSink::default();
    g.step();
    assert!(matches!(
        g.get_fake_event(&UiState::default(), &SingleByteText, &mut sink),
        Tick::Event(_) | Tick::Idle
    ));
    assert!(g.get_fake_event(&UiState::default(), &SingleByteText, &mut sink).is_finished());
    assert_eq!(sink.finished, 0);
    assert_eq!((g.counter(), g.until()), (1, 10));
}

#[test]
fn aimed_taps_skip_decorative_objects() {
    let button = Rect::new(100, 100, 10, 10);
    let label = Rect::new(0, 0, 50, 50);
    let ui = UiState {
        silkscreen_buttons: Vec::new(),
        objects: vec![
            FormObject { kind: FormObjectKind::Label, bounds: label },
            FormObject { kind: FormObjectKind::Control, bounds: button },
        ],
        ..UiState::default()
    };
    let mut g = started(44, 3000);
    let mut sink = RecordingSink::default();
    while !g.get_fake_event(&ui, &SingleByteText, &mut sink).is_finished() {}

    let taps: Vec<(i16, i16)> = sink
        .events
        .iter()
        .filter_map(|ev| match *ev {
            GremlinEvent::Pen { x, y, down: true } => Some((x, y)),
            _ => None,
        })
        .collect();
    assert!(taps.len() > 100);
    for &(x, y) in &taps {
        assert!(x >= 0 && x < ui.screen_width && y >= 0 && y < ui.screen_height);
    }
    // Only the rare anywhere-taps miss the button.
    let on_button = taps.iter().filter(|&&(x, y)| button.contains(x, y)).count();
    let on_label = taps.iter().filter(|&&(x, y)| label.contains(x, y)).count();
    assert!(on_button * 10 >= taps.len() * 8, "{on_button} of {}", taps.len());
    assert!(on_label * 10 < taps.len());
}

#[test]
fn quotes_are_typed_into_a_focused_field() {
    let ui = memo_form(Language::English);
    let mut g = started(3, 4000);
    let mut sink = RecordingSink::default();
    while !g.get_fake_event(&ui, &SingleByteText, &mut sink).is_finished() {}

    let typed: Vec<u8> = sink
        .events
        .iter()
        .filter_map(|ev| match *ev {
            GremlinEvent::Key { chr, modifiers: 0, .. } => Some(chr as u8),
            _ => None,
        })
        .collect();
    let text = String::from_utf8_lossy(&typed);
    // One word from each quote.
    assert!(
        ["journey", "Brevity", "quick", "glitters", "Fortune", "Knowledge", "begun", "Haste", "Actions", "Rome"]
            .iter()
            .any(|w| text.contains(&w[..4])),
        "no quote typed in {} keys",
        typed.len()
    );
}

#[test]
fn japanese_runs_only_type_whole_characters() {
    let ui = memo_form(Language::Japanese);
    let mut g = started(9, 4000);
    let mut sink = RecordingSink::default();
    while !g.get_fake_event(&ui, &ShiftJisText, &mut sink).is_finished() {}
    for ev in &sink.events {
        if let GremlinEvent::Key { chr, .. } = *ev {
            // A lone lead byte would be half a character.
            assert!(!(0x81..=0x9F).contains(&chr) && !(0xE0..=0xFC).contains(&chr), "{chr:#X}");
        }
    }
}

// ============================================================================
//  PERSISTENCE
// ============================================================================

#[test]
fn restored_run_continues_event_for_event() {
    let ui = memo_form(Language::English);

    let mut whole = started(77, 500);
    let mut expected = RecordingSink::default();
    run_ticks(&mut whole, &ui, &SingleByteText, 100, &mut expected);

    let mut first = started(77, 500);
    let mut got = RecordingSink::default();
    run_ticks(&mut first, &ui, &SingleByteText, 50, &mut got);
    let mut second = restored(&snapshot(&first));
    run_ticks(&mut second, &ui, &SingleByteText, 50, &mut got);

    assert_eq!(got.events, expected.events);
    assert_eq!(second.counter(), whole.counter());
}

#[test]
fn app_list_survives_the_record() {
    let mut info = GremlinInfo::new(5, 100);
    info.app_list = vec![
        DatabaseInfo::app(u32::from_be_bytes(*b"addr"), "Address"),
        DatabaseInfo::app(u32::from_be_bytes(*b"date"), "Date Book"),
    ];
    info.save_frequency = 25;
    let mut g = Gremlins::new();
    g.initialize(info.clone());

    let back = restored(&snapshot(&g));
    assert_eq!(back.info(), &info);
    assert_eq!(back.info().app_list[1].name(), b"Date Book");
}

/// Byte offset of the cached key weight total in a gremlins record.
fn prob_sum_offset(bytes: &[u8]) -> usize {
    let pending = u16::from_be_bytes([bytes[26], bytes[27]]) as usize;
    28 + pending
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn steps_are_inclusive(seed in 0u16..=1000, steps in 0u32..150) {
        let mut g = started(seed, steps);
        let mut sink = RecordingSink::default();
        let mut ticks = 0u32;
        while !g.get_fake_event(&UiState::default(), &SingleByteText, &mut sink).is_finished() {
            ticks += 1;
        }
        prop_assert_eq!(ticks, steps + 1);
        prop_assert_eq!(sink.timer_resets, steps + 1);
        prop_assert_eq!(sink.finished, 1);
    }

    #[test]
    fn save_load_save_is_stable(seed in 0u16..=1000, ticks in 0usize..120, japanese in any::<bool>()) {
        let ui = memo_form(if japanese { Language::Japanese } else { Language::English });
        let text: &dyn TextServices = if japanese { &ShiftJisText } else { &SingleByteText };
        let mut g = started(seed, 200);
        let mut sink = RecordingSink::default();
        run_ticks(&mut g, &ui, text, ticks, &mut sink);

        let first = snapshot(&g);
        let back = restored(&first);
        let second = snapshot(&back);
        prop_assert_eq!(first.len(), second.len());

        // Only the cached weight total differs; it is rebuilt lazily.
        let at = prob_sum_offset(&first);
        prop_assert_eq!(&second[at..at + 4], &[0u8; 4][..]);
        prop_assert_eq!(&first[..at], &second[..at]);
        prop_assert_eq!(&first[at + 4..], &second[at + 4..]);
        prop_assert_eq!(back.key_prob_sum(), 0);
        prop_assert_eq!(back.chars_to_type(), g.chars_to_type());
    }
}
