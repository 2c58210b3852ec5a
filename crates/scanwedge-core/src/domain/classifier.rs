//! Payload classifier: content → barcode type + status message.
//!
//! Classification is a pure, total function.  Rules are tried in a fixed
//! order and the first match wins:
//!
//! | # | Rule                                   | Type            |
//! |---|----------------------------------------|-----------------|
//! | 1 | prefix `PRD`                           | Product         |
//! | 2 | prefix `LOT`                           | Lot             |
//! | 3 | prefix `SN`                            | Serial Number   |
//! | 4 | all digits, length 8                   | EAN-8           |
//! | 5 | all digits, length 12                  | UPC-A           |
//! | 6 | all digits, length 13                  | EAN-13          |
//! | 7 | all digits, length 14                  | ITF-14          |
//! | 8 | only `0-9 A-Z a-z - .`                 | Code 128        |
//! | 9 | anything else                          | Other           |
//!
//! Prefix rules shadow the numeric rules, so `"PRD1234567890"` is a product
//! code even though it is 13 characters long.

use serde::Serialize;
use thiserror::Error;

use super::payload::{BarcodeType, PayloadStatus};

/// Result of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub barcode_type: BarcodeType,
    /// Fixed human-readable status message for the type.
    pub message: &'static str,
}

/// Classifies `content` according to the rule table above.
pub fn classify(content: &str) -> Classification {
    let barcode_type = barcode_type_of(content);
    Classification {
        barcode_type,
        message: status_message(barcode_type),
    }
}

fn barcode_type_of(content: &str) -> BarcodeType {
    if content.starts_with("PRD") {
        return BarcodeType::Product;
    }
    if content.starts_with("LOT") {
        return BarcodeType::Lot;
    }
    if content.starts_with("SN") {
        return BarcodeType::SerialNumber;
    }
    if is_all_digits(content) {
        match content.len() {
            8 => return BarcodeType::Ean8,
            12 => return BarcodeType::UpcA,
            13 => return BarcodeType::Ean13,
            14 => return BarcodeType::Itf14,
            _ => {}
        }
    }
    if is_alphanumeric(content) {
        BarcodeType::Code128
    } else {
        BarcodeType::Other
    }
}

fn status_message(barcode_type: BarcodeType) -> &'static str {
    match barcode_type {
        BarcodeType::Product => "recognized as product barcode, looking up product...",
        BarcodeType::Lot => "recognized as lot barcode, looking up batch...",
        BarcodeType::SerialNumber => "recognized as serial number barcode, validating serial...",
        BarcodeType::Ean8 => "recognized as EAN-8 barcode, processing...",
        BarcodeType::UpcA => "recognized as UPC-A barcode, processing...",
        BarcodeType::Ean13 => "recognized as EAN-13 barcode, validating...",
        BarcodeType::Itf14 => "recognized as ITF-14 barcode, processing...",
        BarcodeType::Code128 | BarcodeType::Other => "generic barcode, recording...",
    }
}

/// Non-empty and every character an ASCII digit.
fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Non-empty and every character in `0-9 A-Z a-z - .`.
fn is_alphanumeric(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

// ── Enrichment ────────────────────────────────────────────────────────────────

/// Type-specific detail derived from the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeDetail {
    /// Coarse country of origin from an EAN-13 prefix.
    Country(&'static str),
    /// First six digits of a UPC-A code.
    ManufacturerCode(String),
    ProductId(String),
    LotNumber(String),
    SerialNumber(String),
}

/// Detailed description of a piece of content, independent of the live stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarcodeInfo {
    pub content: String,
    pub length: usize,
    #[serde(rename = "type")]
    pub barcode_type: BarcodeType,
    pub is_numeric: bool,
    pub is_alphanumeric: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<BarcodeDetail>,
}

/// Classifies `content` and attaches type-specific detail where available.
pub fn describe(content: &str) -> BarcodeInfo {
    let barcode_type = barcode_type_of(content);
    let detail = match barcode_type {
        BarcodeType::Ean13 => Some(BarcodeDetail::Country(ean13_country(content))),
        BarcodeType::UpcA => Some(BarcodeDetail::ManufacturerCode(content[..6].to_string())),
        BarcodeType::Product => Some(BarcodeDetail::ProductId(content["PRD".len()..].to_string())),
        BarcodeType::Lot => Some(BarcodeDetail::LotNumber(content["LOT".len()..].to_string())),
        BarcodeType::SerialNumber => {
            Some(BarcodeDetail::SerialNumber(content["SN".len()..].to_string()))
        }
        _ => None,
    };

    BarcodeInfo {
        content: content.to_string(),
        length: content.chars().count(),
        barcode_type,
        is_numeric: is_all_digits(content),
        is_alphanumeric: is_alphanumeric(content),
        detail,
    }
}

/// GS1 prefix ranges, checked in order.  Bounds are inclusive.
const EAN13_COUNTRY_RANGES: &[(u16, u16, &str)] = &[
    (690, 699, "China"),
    (0, 19, "USA/Canada"),
    (20, 29, "In-store use"),
    (30, 39, "USA drugs"),
    (400, 440, "Germany"),
    (450, 459, "Japan"),
    (460, 469, "Russia"),
    (471, 471, "Taiwan"),
    (480, 489, "Philippines"),
];

/// Maps the three-digit prefix of an EAN-13 code to a coarse country label.
///
/// Returns `"Unknown"` when `content` is not a 13-digit string.
pub fn ean13_country(content: &str) -> &'static str {
    if content.len() != 13 || !is_all_digits(content) {
        return "Unknown";
    }
    let Ok(prefix) = content[..3].parse::<u16>() else {
        return "Unknown";
    };
    EAN13_COUNTRY_RANGES
        .iter()
        .find(|(lo, hi, _)| (*lo..=*hi).contains(&prefix))
        .map(|(_, _, label)| *label)
        .unwrap_or("Other")
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Reasons a candidate is refused by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("barcode is empty")]
    Empty,
    #[error("barcode too short: {len} < {min}")]
    TooShort { len: usize, min: usize },
    #[error("barcode too long: {len} > {max}")]
    TooLong { len: usize, max: usize },
    #[error("barcode contains illegal character {0:?}")]
    IllegalCharacter(char),
}

impl ValidationError {
    /// The payload status a recorded rejection should carry, if the
    /// rejection is a length rejection.
    pub fn status(&self) -> Option<PayloadStatus> {
        match self {
            ValidationError::Empty | ValidationError::TooShort { .. } => {
                Some(PayloadStatus::RejectedTooShort)
            }
            ValidationError::TooLong { .. } => Some(PayloadStatus::RejectedTooLong),
            ValidationError::IllegalCharacter(_) => None,
        }
    }
}

/// Checks length bounds and the accepted character set.
///
/// Accepted characters: `0-9 A-Z a-z - . _ / \ : ; [ ] ( ) + =` and space.
pub fn validate(content: &str, min_length: usize, max_length: usize) -> Result<(), ValidationError> {
    let len = content.chars().count();
    if len == 0 {
        return Err(ValidationError::Empty);
    }
    if len < min_length {
        return Err(ValidationError::TooShort { len, min: min_length });
    }
    if len > max_length {
        return Err(ValidationError::TooLong { len, max: max_length });
    }
    if let Some(bad) = content.chars().find(|c| !is_accepted_char(*c)) {
        return Err(ValidationError::IllegalCharacter(bad));
    }
    Ok(())
}

fn is_accepted_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '-' | '.' | '_' | '/' | '\\' | ':' | ';' | '[' | ']' | '(' | ')' | '+' | '=' | ' '
        )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
