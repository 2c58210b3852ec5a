//! Key event vocabulary and key code translation for the assembler.
//!
//! Scanners in keyboard-wedge mode only ever emit a small alphabet: digits,
//! upper-case letters, a handful of punctuation keys, and Enter.  Everything
//! else the capture layer reports (modifiers, arrows, function keys) is noise
//! as far as the assembler is concerned.

pub mod windows_vk;

/// One key-down sample delivered by a key event source.
///
/// `vk_code` is the opaque platform code (a Windows virtual-key code for the
/// hook source).  `timestamp_ms` is monotonic and millisecond-resolution; only
/// differences between consecutive events are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub vk_code: u32,
    pub timestamp_ms: u64,
}

impl KeyEvent {
    pub fn new(vk_code: u32, timestamp_ms: u64) -> Self {
        Self {
            vk_code,
            timestamp_ms,
        }
    }
}

/// What a single key means to the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKey {
    /// A printable character that becomes part of the payload.
    Char(char),
    /// End of record (carriage return).
    Terminator,
    /// Anything else; has no effect on the buffer.
    Ignored,
}

/// Unified key mapper for the assembler and for scripted event sources.
pub struct KeyMapper;

impl KeyMapper {
    /// Classifies a Windows virtual-key code.
    ///
    /// Codes outside the 0x00–0xFF range are always [`ScanKey::Ignored`].
    pub fn scan_key(vk_code: u32) -> ScanKey {
        match u8::try_from(vk_code) {
            Ok(vk) => windows_vk::vk_to_scan_key(vk),
            Err(_) => ScanKey::Ignored,
        }
    }

    /// Returns the virtual-key code that produces `ch`, if the scanner
    /// alphabet contains it.
    ///
    /// Lower-case letters map to the same key as their upper-case form, since
    /// the assembler never sees shift state.
    pub fn char_to_vk(ch: char) -> Option<u32> {
        windows_vk::char_to_vk(ch).map(u32::from)
    }

    /// The virtual-key code of the terminator key.
    pub const fn terminator_vk() -> u32 {
        windows_vk::VK_RETURN as u32
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
