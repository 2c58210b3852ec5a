//! Windows Virtual Key (VK) code to scanner character translation table.
//!
//! Reference: Windows Virtual-Key Codes (winuser.h).
//!
//! # What is a Windows Virtual Key (VK) code? (for beginners)
//!
//! Windows assigns each keyboard key a number called a "Virtual Key code".
//! They are "virtual" because they name *logical* keys rather than physical
//! scan codes: the letter A is always `0x41`, whatever the layout.  A scanner
//! in keyboard-wedge mode is indistinguishable from a keyboard, so the hook
//! only ever sees VK codes.
//!
//! # How this table works
//!
//! `VK_TO_SCAN_KEY_TABLE` is a compile-time array of 256 [`ScanKey`] values
//! indexed by VK code.  Every key the hook reports goes through this table,
//! so the lookup is a single array index.

use super::ScanKey;

/// `VK_RETURN`: the terminator appended by virtually every scanner.
pub const VK_RETURN: u8 = 0x0D;

/// Translates a Windows Virtual Key code to its meaning for assembly.
///
/// # Panics
///
/// This function never panics; all u8 inputs are handled.
pub fn vk_to_scan_key(vk: u8) -> ScanKey {
    VK_TO_SCAN_KEY_TABLE[vk as usize]
}

/// Returns the main-row VK code that produces `ch`.
///
/// Numeric keypad codes are never returned; the main digit row is preferred.
pub fn char_to_vk(ch: char) -> Option<u8> {
    let upper = ch.to_ascii_uppercase();
    match upper {
        '0'..='9' | 'A'..='Z' => Some(upper as u8),
        _ => PUNCTUATION
            .iter()
            .find(|(_, c)| *c == upper)
            .map(|(vk, _)| *vk),
    }
}

/// OEM punctuation keys a scanner can emit without shift.
const PUNCTUATION: [(u8, char); 10] = [
    (0xBD, '-'),  // VK_OEM_MINUS
    (0xBB, '='),  // VK_OEM_PLUS (unshifted)
    (0xDB, '['),  // VK_OEM_4
    (0xDD, ']'),  // VK_OEM_6
    (0xDC, '\\'), // VK_OEM_5
    (0xBA, ';'),  // VK_OEM_1
    (0xDE, '\''), // VK_OEM_7
    (0xBC, ','),  // VK_OEM_COMMA
    (0xBE, '.'),  // VK_OEM_PERIOD
    (0xBF, '/'),  // VK_OEM_2
];

/// Complete VK → ScanKey table indexed by VK code (0x00–0xFF).
///
/// Entries are `ScanKey::Ignored` when the key is not part of the scanner
/// alphabet.
const VK_TO_SCAN_KEY_TABLE: [ScanKey; 256] = {
    let mut t = [ScanKey::Ignored; 256];

    // ── Digit row (VK_0=0x30 … VK_9=0x39) ───────────────────────────────────
    let mut vk = 0x30;
    while vk <= 0x39 {
        t[vk] = ScanKey::Char(vk as u8 as char);
        vk += 1;
    }

    // ── Alphabet keys (VK_A=0x41 … VK_Z=0x5A) ────────────────────────────────
    let mut vk = 0x41;
    while vk <= 0x5A {
        t[vk] = ScanKey::Char(vk as u8 as char);
        vk += 1;
    }

    // ── Numeric keypad (VK_NUMPAD0=0x60 … VK_NUMPAD9=0x69) ──────────────────
    // Some scanners are configured to emit digits through the keypad.
    let mut vk = 0x60;
    while vk <= 0x69 {
        t[vk] = ScanKey::Char((b'0' + (vk - 0x60) as u8) as char);
        vk += 1;
    }

    // ── OEM punctuation ──────────────────────────────────────────────────────
    let mut i = 0;
    while i < PUNCTUATION.len() {
        let (code, ch) = PUNCTUATION[i];
        t[code as usize] = ScanKey::Char(ch);
        i += 1;
    }

    t[VK_RETURN as usize] = ScanKey::Terminator;

    t
};

// ── Tests ─────────────────────────────────────────────────────────────────────
