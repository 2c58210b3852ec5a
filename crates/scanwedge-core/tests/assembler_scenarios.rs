//! Integration tests for keystroke assembly through the public API.
//!
//! Each test drives the assembler with the key stream a real scanner (or a
//! human at the same keyboard) would produce and checks what comes out the
//! other end, including the JSON envelope a subscriber would receive.
//!
//! ```text
//! KeyEvent ──► Assembler::push ──► Payload ──► Envelope::barcode ──► Frame
//! ```

use scanwedge_core::{
    Assembler, AssemblerConfig, BarcodeType, Envelope, KeyEvent, KeyMapper, Payload,
    PayloadStatus,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Appends `text` to `events` starting at `*t`, one key every `gap_ms`.
fn type_text(events: &mut Vec<KeyEvent>, t: &mut u64, text: &str, gap_ms: u64) {
    for ch in text.chars() {
        let vk = KeyMapper::char_to_vk(ch).expect("scanner alphabet");
        events.push(KeyEvent::new(vk, *t));
        *t += gap_ms;
    }
}

fn press_enter(events: &mut Vec<KeyEvent>, t: &mut u64) {
    events.push(KeyEvent::new(KeyMapper::terminator_vk(), *t));
}

fn assemble(events: Vec<KeyEvent>) -> Vec<Payload> {
    Assembler::new(AssemblerConfig::default()).push_all(events)
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn test_scenario_ean13_scan_produces_one_barcode() {
    // Arrange
    let mut events = Vec::new();
    let mut t = 10_000;
    type_text(&mut events, &mut t, "1234567890123", 50);
    press_enter(&mut events, &mut t);

    // Act
    let payloads = assemble(events);

    // Assert
    assert_eq!(payloads.len(), 1);
    let p = &payloads[0];
    assert_eq!(p.content(), "1234567890123");
    assert_eq!(p.len(), 13);
    assert_eq!(p.barcode_type(), BarcodeType::Ean13);
    assert_eq!(p.status(), PayloadStatus::Success);
}

#[test]
fn test_scenario_product_code_scan() {
    let mut events = Vec::new();
    let mut t = 0;
    type_text(&mut events, &mut t, "PRD99", 10);
    press_enter(&mut events, &mut t);

    let payloads = assemble(events);

    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].barcode_type(), BarcodeType::Product);
}

#[test]
fn test_scenario_two_characters_produce_nothing() {
    let mut events = Vec::new();
    let mut t = 0;
    type_text(&mut events, &mut t, "AB", 10);
    press_enter(&mut events, &mut t);

    assert!(assemble(events).is_empty());
}

#[test]
fn test_scenario_pause_splits_input() {
    // Arrange: "123", then a 500 ms pause, then "456" and Enter
    let mut events = Vec::new();
    let mut t = 0;
    type_text(&mut events, &mut t, "123", 20);
    t += 500;
    type_text(&mut events, &mut t, "456", 20);
    press_enter(&mut events, &mut t);

    // Act
    let payloads = assemble(events);

    // Assert
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].content(), "456");
}

#[test]
fn test_human_typing_between_scans_is_discarded() {
    // A human types "hello" slowly, then a scan arrives.
    let mut events = Vec::new();
    let mut t = 0;
    type_text(&mut events, &mut t, "HELLO", 250);
    type_text(&mut events, &mut t, "LOT7781", 8);
    press_enter(&mut events, &mut t);

    let payloads = assemble(events);

    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].content(), "LOT7781");
    assert_eq!(payloads[0].barcode_type(), BarcodeType::Lot);
}

#[test]
fn test_numpad_digits_assemble_like_digit_row() {
    // VK_NUMPAD0..9 = 0x60..0x69
    let mut events: Vec<KeyEvent> = "96385074"
        .bytes()
        .enumerate()
        .map(|(i, b)| KeyEvent::new(0x60 + u32::from(b - b'0'), i as u64 * 5))
        .collect();
    events.push(KeyEvent::new(KeyMapper::terminator_vk(), 40));

    let payloads = assemble(events);

    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].content(), "96385074");
    assert_eq!(payloads[0].barcode_type(), BarcodeType::Ean8);
}

#[test]
fn test_assembled_payload_reaches_envelope_unchanged() {
    let mut events = Vec::new();
    let mut t = 0;
    type_text(&mut events, &mut t, "SN-0042", 5);
    press_enter(&mut events, &mut t);

    let payload = assemble(events).pop().expect("one payload");
    let frame = Envelope::barcode(payload).to_frame().expect("encode");
    let json: serde_json::Value = serde_json::from_str(&frame).expect("json");

    assert_eq!(json["type"], "barcode");
    assert_eq!(json["data"]["content"], "SN-0042");
    assert_eq!(json["data"]["type"], "Serial Number");
}
