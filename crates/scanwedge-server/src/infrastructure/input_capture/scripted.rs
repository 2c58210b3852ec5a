//! Scripted key event source for tests and replay files.
//!
//! Builds a key stream the way a scanner would type it: characters a few
//! milliseconds apart, then Enter.  Timestamps are synthetic and only their
//! differences matter to the assembler.
//!
//! ```rust
//! use scanwedge_server::infrastructure::input_capture::ScriptedKeySource;
//!
//! // "123", a 500 ms pause, then "456" + Enter
//! let source = ScriptedKeySource::new(0)
//!     .keys("123", 20)
//!     .pause(500)
//!     .scan("456", 20);
//! assert_eq!(source.remaining(), 7);
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use scanwedge_core::{KeyEvent, KeyMapper};
use tracing::debug;

use super::KeyEventSource;

/// Replays a prepared sequence of [`KeyEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeySource {
    events: VecDeque<KeyEvent>,
    /// Timestamp the next appended event will get.
    cursor_ms: u64,
    /// Sleep for the gap between events while replaying.
    paced: bool,
    last_emitted_ms: Option<u64>,
    stopped: bool,
}

impl ScriptedKeySource {
    /// An empty script whose first event will be stamped `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            cursor_ms: start_ms,
            ..Self::default()
        }
    }

    /// One scan: `text` typed `gap_ms` apart from `start_ms`, then Enter.
    pub fn from_text(text: &str, start_ms: u64, gap_ms: u64) -> Self {
        Self::new(start_ms).scan(text, gap_ms)
    }

    /// One scan per non-blank line, with `pause_ms` of silence between scans.
    pub fn from_lines<I, S>(lines: I, gap_ms: u64, pause_ms: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .filter(|line| !line.as_ref().trim().is_empty())
            .fold(Self::new(0), |source, line| {
                source.scan(line.as_ref().trim(), gap_ms).pause(pause_ms)
            })
    }

    /// Appends `text` without a terminator.
    ///
    /// Characters outside the scanner alphabet have no key and are skipped.
    pub fn keys(mut self, text: &str, gap_ms: u64) -> Self {
        for ch in text.chars() {
            match KeyMapper::char_to_vk(ch) {
                Some(vk) => self.push(vk, gap_ms),
                None => debug!(?ch, "no key for character; skipped"),
            }
        }
        self
    }

    /// Appends the terminator.
    pub fn enter(mut self, gap_ms: u64) -> Self {
        self.push(KeyMapper::terminator_vk(), gap_ms);
        self
    }

    /// Appends `text` followed by the terminator.
    pub fn scan(self, text: &str, gap_ms: u64) -> Self {
        self.keys(text, gap_ms).enter(gap_ms)
    }

    /// Appends a raw key code (a modifier, an arrow key...).
    pub fn key(mut self, vk_code: u32, gap_ms: u64) -> Self {
        self.push(vk_code, gap_ms);
        self
    }

    /// Inserts `ms` of silence before the next event.
    pub fn pause(mut self, ms: u64) -> Self {
        self.cursor_ms += ms;
        self
    }

    /// Sleeps for the recorded gap before handing out each event.
    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }

    /// Events not yet handed out.
    pub fn remaining(&self) -> usize {
        self.events.len()
    }

    fn push(&mut self, vk_code: u32, gap_ms: u64) {
        self.events.push_back(KeyEvent::new(vk_code, self.cursor_ms));
        self.cursor_ms += gap_ms;
    }
}

#[async_trait]
impl KeyEventSource for ScriptedKeySource {
    async fn next_event(&mut self) -> Option<KeyEvent> {
        if self.stopped {
            return None;
        }
        let event = self.events.pop_front()?;
        if self.paced {
            if let Some(last) = self.last_emitted_ms {
                let gap = event.timestamp_ms.saturating_sub(last);
                tokio::time::sleep(Duration::from_millis(gap)).await;
            }
        }
        self.last_emitted_ms = Some(event.timestamp_ms);
        Some(event)
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.events.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
