//! Barcode assembler: key events in, completed payloads out.
//!
//! The capture layer reports *every* keystroke on the machine, and there is
//! no out-of-band signal that a scan has begun.  The only usable heuristic is
//! speed: a scanner emits its characters a few milliseconds apart, a human
//! types an order of magnitude slower.  The assembler therefore keeps a
//! buffer of characters that arrived within `char_timeout_ms` of each other
//! and flushes it when it sees the terminator (Enter).
//!
//! # State machine
//!
//! ```text
//!            printable key (gap ≤ timeout)
//!               ┌──────────┐
//!               ▼          │
//!   ┌──────────────────────────┐   Enter, min ≤ len ≤ max   ┌────────────┐
//!   │  Idle / Accumulating     │ ─────────────────────────► │ Completing │
//!   └──────────────────────────┘ ◄───────────────────────── └────────────┘
//!      ▲        │ gap > timeout: discard buffer     Payload emitted,
//!      └────────┘                                   buffer emptied
//! ```
//!
//! The assembler is owned by exactly one consumer and has no interior
//! mutability; feeding it is `&mut self`.

use tracing::debug;

use super::payload::Payload;
use crate::keymap::{KeyEvent, KeyMapper, ScanKey};

/// Tunables for the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// Maximum gap between consecutive keys of one scan, in milliseconds.
    pub char_timeout_ms: u64,
    /// Shortest accepted payload, in characters.
    pub min_length: usize,
    /// Longest accepted payload, in characters.
    pub max_length: usize,
}

impl Default for AssemblerConfig {
    /// | Field            | Default |
    /// |------------------|---------|
    /// | char_timeout_ms  | 100     |
    /// | min_length       | 3       |
    /// | max_length       | 50      |
    fn default() -> Self {
        Self {
            char_timeout_ms: 100,
            min_length: 3,
            max_length: 50,
        }
    }
}

/// Running counters, useful for status reporting and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub completed: u64,
    pub rejected_too_short: u64,
    pub rejected_too_long: u64,
    /// Non-empty buffers discarded because of an inter-key gap.
    pub timeout_resets: u64,
}

/// Reconstructs scanned payloads from a live key event stream.
#[derive(Debug)]
pub struct Assembler {
    config: AssemblerConfig,
    buffer: String,
    /// Length of `buffer` in characters (all scanner chars are ASCII, but
    /// keep the count explicit rather than relying on that).
    buffered_chars: usize,
    last_key_ms: Option<u64>,
    stats: AssemblerStats,
}

impl Assembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            config,
            buffer: String::with_capacity(config.max_length + 1),
            buffered_chars: 0,
            last_key_ms: None,
            stats: AssemblerStats::default(),
        }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    /// The characters accumulated so far for the current candidate.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Discards the buffer and the timing state.
    pub fn reset(&mut self) {
        self.clear_buffer();
        self.last_key_ms = None;
    }

    /// Processes one key event.
    ///
    /// Returns a [`Payload`] when `event` is the terminator and the buffered
    /// candidate is within the configured length bounds.  Unknown keys are
    /// ignored; out-of-bounds candidates are discarded without output.
    pub fn push(&mut self, event: KeyEvent) -> Option<Payload> {
        if let Some(last) = self.last_key_ms {
            // Timestamps that go backwards count as no gap.
            let gap = event.timestamp_ms.saturating_sub(last);
            if gap > self.config.char_timeout_ms && !self.buffer.is_empty() {
                debug!(
                    gap_ms = gap,
                    discarded = self.buffered_chars,
                    "inter-key gap exceeded timeout; discarding partial scan"
                );
                self.stats.timeout_resets += 1;
                self.clear_buffer();
            }
        }
        self.last_key_ms = Some(event.timestamp_ms);

        match KeyMapper::scan_key(event.vk_code) {
            ScanKey::Char(ch) => {
                // Anything past max_length + 1 is rejected at the terminator
                // regardless of what follows.
                if self.buffered_chars <= self.config.max_length {
                    self.buffer.push(ch);
                    self.buffered_chars += 1;
                }
                None
            }
            ScanKey::Terminator => self.complete(),
            ScanKey::Ignored => None,
        }
    }

    /// Feeds every event in `events` and collects the payloads produced.
    pub fn push_all<I>(&mut self, events: I) -> Vec<Payload>
    where
        I: IntoIterator<Item = KeyEvent>,
    {
        events.into_iter().filter_map(|e| self.push(e)).collect()
    }

    fn complete(&mut self) -> Option<Payload> {
        let len = self.buffered_chars;
        let content = std::mem::take(&mut self.buffer);
        self.buffered_chars = 0;

        if len < self.config.min_length {
            if len > 0 {
                debug!(len, min = self.config.min_length, "candidate too short; discarded");
            }
            self.stats.rejected_too_short += 1;
            return None;
        }
        if len > self.config.max_length {
            debug!(len, max = self.config.max_length, "candidate too long; discarded");
            self.stats.rejected_too_long += 1;
            return None;
        }

        self.stats.completed += 1;
        Some(Payload::completed(content))
    }

    fn clear_buffer(&mut self) {
        self.buffer.clear();
        self.buffered_chars = 0;
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new(AssemblerConfig::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payload::{BarcodeType, PayloadStatus};
    use crate::keymap::KeyMapper;

    /// Builds key events for `text` starting at `start_ms`, `gap_ms` apart.
    /// Returns the events and the timestamp of the last one.
    fn keys(text: &str, start_ms: u64, gap_ms: u64) -> (Vec<KeyEvent>, u64) {
        let mut t = start_ms;
        let mut out = Vec::new();
        for (i, ch) in text.chars().enumerate() {
            if i > 0 {
                t += gap_ms;
            }
            let vk = KeyMapper::char_to_vk(ch).expect("test text must be in the scanner alphabet");
            out.push(KeyEvent::new(vk, t));
        }
        (out, t)
    }

    fn enter(at_ms: u64) -> KeyEvent {
        KeyEvent::new(KeyMapper::terminator_vk(), at_ms)
    }

    #[test]
    fn test_ean13_scan_completes() {
        // Arrange
        let mut asm = Assembler::default();
        let (mut events, last) = keys("1234567890123", 1_000, 50);
        events.push(enter(last + 50));

        // Act
        let payloads = asm.push_all(events);

        // Assert
        assert_eq!(payloads.len(), 1);
        let p = &payloads[0];
        assert_eq!(p.content(), "1234567890123");
        assert_eq!(p.barcode_type(), BarcodeType::Ean13);
        assert_eq!(p.status(), PayloadStatus::Success);
        assert_eq!(asm.stats().completed, 1);
    }

    #[test]
    fn test_product_code_scan() {
        let mut asm = Assembler::default();
        let (mut events, last) = keys("PRD99", 0, 10);
        events.push(enter(last + 10));

        let payloads = asm.push_all(events);

        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].content(), "PRD99");
        assert_eq!(payloads[0].barcode_type(), BarcodeType::Product);
    }

    #[test]
    fn test_too_short_candidate_is_dropped() {
        let mut asm = Assembler::default();
        let (mut events, last) = keys("AB", 0, 10);
        events.push(enter(last + 10));

        let payloads = asm.push_all(events);

        assert!(payloads.is_empty());
        assert_eq!(asm.stats().rejected_too_short, 1);
        assert_eq!(asm.pending(), "");
    }

    #[test]
    fn test_too_long_candidate_is_dropped() {
        let mut asm = Assembler::new(AssemblerConfig {
            max_length: 5,
            ..AssemblerConfig::default()
        });
        let (mut events, last) = keys("ABCDEFGHIJ", 0, 5);
        events.push(enter(last + 5));

        let payloads = asm.push_all(events);

        assert!(payloads.is_empty());
        assert_eq!(asm.stats().rejected_too_long, 1);
    }

    #[test]
    fn test_max_length_candidate_is_accepted() {
        let mut asm = Assembler::new(AssemblerConfig {
            max_length: 5,
            ..AssemblerConfig::default()
        });
        let (mut events, last) = keys("ABCDE", 0, 5);
        events.push(enter(last + 5));

        let payloads = asm.push_all(events);

        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].len(), 5);
    }

    #[test]
    fn test_gap_over_timeout_discards_earlier_characters() {
        // Arrange: "123", 500 ms pause, "456", Enter
        let mut asm = Assembler::default();
        let (mut events, last) = keys("123", 0, 20);
        let (second, last2) = keys("456", last + 500, 20);
        events.extend(second);
        events.push(enter(last2 + 20));

        // Act
        let payloads = asm.push_all(events);

        // Assert
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].content(), "456");
        assert_eq!(asm.stats().timeout_resets, 1);
    }

    #[test]
    fn test_gap_equal_to_timeout_keeps_buffer() {
        let mut asm = Assembler::default();
        let (mut events, last) = keys("12", 0, 100);
        let (second, last2) = keys("3", last + 100, 0);
        events.extend(second);
        events.push(enter(last2 + 100));

        let payloads = asm.push_all(events);

        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].content(), "123");
    }

    #[test]
    fn test_slow_terminator_discards_buffer() {
        // Enter itself arrives after the timeout: the buffer is stale, so
        // the terminator sees an empty candidate.
        let mut asm = Assembler::default();
        let (mut events, last) = keys("ABCDEF", 0, 10);
        events.push(enter(last + 101));

        let payloads = asm.push_all(events);

        assert!(payloads.is_empty());
        assert_eq!(asm.stats().timeout_resets, 1);
    }

    #[test]
    fn test_ignored_keys_do_not_touch_buffer() {
        let mut asm = Assembler::default();
        asm.push(KeyEvent::new(0x41, 0));
        asm.push(KeyEvent::new(0xA0, 5)); // VK_LSHIFT
        asm.push(KeyEvent::new(0x42, 10));
        asm.push(KeyEvent::new(0x11, 15)); // VK_CONTROL
        asm.push(KeyEvent::new(0x43, 20));

        assert_eq!(asm.pending(), "ABC");
        let p = asm.push(enter(25)).expect("payload");
        assert_eq!(p.content(), "ABC");
    }

    #[test]
    fn test_buffer_is_empty_after_completion() {
        let mut asm = Assembler::default();
        let (mut events, last) = keys("ABC", 0, 10);
        events.push(enter(last + 10));
        // A second terminator right away must not re-emit anything.
        events.push(enter(last + 20));

        let payloads = asm.push_all(events);

        assert_eq!(payloads.len(), 1);
        assert_eq!(asm.pending(), "");
    }

    #[test]
    fn test_consecutive_scans_are_independent() {
        let mut asm = Assembler::default();
        let (mut events, last) = keys("LOT123", 0, 10);
        events.push(enter(last + 10));
        let (second, last2) = keys("SN456", last + 20, 10);
        events.extend(second);
        events.push(enter(last2 + 10));

        let payloads = asm.push_all(events);

        let contents: Vec<&str> = payloads.iter().map(|p| p.content()).collect();
        assert_eq!(contents, vec!["LOT123", "SN456"]);
    }

    #[test]
    fn test_backwards_timestamp_counts_as_no_gap() {
        let mut asm = Assembler::default();
        asm.push(KeyEvent::new(0x41, 1_000));
        asm.push(KeyEvent::new(0x42, 900));
        asm.push(KeyEvent::new(0x43, 950));

        assert_eq!(asm.pending(), "ABC");
        assert_eq!(asm.stats().timeout_resets, 0);
    }

    #[test]
    fn test_reset_clears_pending_and_timing() {
        let mut asm = Assembler::default();
        asm.push(KeyEvent::new(0x41, 0));
        asm.reset();

        assert_eq!(asm.pending(), "");
        // With timing cleared, a late key is not counted as a timeout reset.
        asm.push(KeyEvent::new(0x42, 10_000));
        assert_eq!(asm.stats().timeout_resets, 0);
    }

    #[test]
    fn test_every_payload_respects_length_bounds() {
        // Arrange: a mix of candidate lengths 0..=12 with bounds [3, 8]
        let config = AssemblerConfig {
            char_timeout_ms: 100,
            min_length: 3,
            max_length: 8,
        };
        let mut asm = Assembler::new(config);
        let mut t = 0;
        let mut events = Vec::new();
        for len in 0..=12 {
            let text = "7".repeat(len);
            if !text.is_empty() {
                let (ev, last) = keys(&text, t, 10);
                events.extend(ev);
                t = last;
            }
            t += 10;
            events.push(enter(t));
            t += 10;
        }

        // Act
        let payloads = asm.push_all(events);

        // Assert
        assert_eq!(payloads.len(), 6); // lengths 3..=8
        for p in &payloads {
            assert!((config.min_length..=config.max_length).contains(&p.len()));
        }
    }
}
