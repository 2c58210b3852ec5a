//! The completed, classified scan result.
//!
//! A [`Payload`] is built once by the assembler when it sees a terminator and
//! is never mutated afterwards.  Downstream consumers (the broadcast hub, a
//! persistence service) read it through accessors.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classifier::Classification;

/// Semantic barcode type assigned by the classifier.
///
/// Serialised as its human-readable label (e.g. `"EAN-13"`), which is also
/// what [`fmt::Display`] prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarcodeType {
    /// Internal product code, `PRD` prefix.
    #[serde(rename = "Product")]
    Product,
    /// Lot / batch code, `LOT` prefix.
    #[serde(rename = "Lot")]
    Lot,
    /// Serial number, `SN` prefix.
    #[serde(rename = "Serial Number")]
    SerialNumber,
    #[serde(rename = "EAN-8")]
    Ean8,
    #[serde(rename = "UPC-A")]
    UpcA,
    #[serde(rename = "EAN-13")]
    Ean13,
    #[serde(rename = "ITF-14")]
    Itf14,
    /// Generic alphanumeric content (Code 128 class).
    #[serde(rename = "Code 128")]
    Code128,
    #[serde(rename = "Other")]
    Other,
}

impl BarcodeType {
    /// The label used on the wire and in logs.
    pub fn label(self) -> &'static str {
        match self {
            BarcodeType::Product => "Product",
            BarcodeType::Lot => "Lot",
            BarcodeType::SerialNumber => "Serial Number",
            BarcodeType::Ean8 => "EAN-8",
            BarcodeType::UpcA => "UPC-A",
            BarcodeType::Ean13 => "EAN-13",
            BarcodeType::Itf14 => "ITF-14",
            BarcodeType::Code128 => "Code 128",
            BarcodeType::Other => "Other",
        }
    }
}

impl fmt::Display for BarcodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome recorded on a payload.
///
/// The live assembler only ever emits `Success`; the rejected variants exist
/// for collaborators that record candidates refused by
/// [`validate`](super::classifier::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadStatus {
    Success,
    RejectedTooShort,
    RejectedTooLong,
}

/// A fully assembled, classified scan result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    content: String,
    length: usize,
    #[serde(rename = "type")]
    barcode_type: BarcodeType,
    timestamp: DateTime<Utc>,
    status: PayloadStatus,
    message: String,
}

impl Payload {
    /// Builds a successful payload from `content`, classifying it on the spot.
    ///
    /// The completion timestamp is taken from the wall clock.
    pub fn completed(content: String) -> Self {
        Self::completed_at(content, Utc::now())
    }

    /// Like [`Payload::completed`] with an explicit completion time.
    pub fn completed_at(content: String, timestamp: DateTime<Utc>) -> Self {
        let Classification {
            barcode_type,
            message,
        } = super::classifier::classify(&content);
        Self {
            length: content.chars().count(),
            content,
            barcode_type,
            timestamp,
            status: PayloadStatus::Success,
            message: message.to_string(),
        }
    }

    /// Builds a payload that records a rejected candidate.
    pub fn rejected(content: String, status: PayloadStatus, message: impl Into<String>) -> Self {
        let barcode_type = super::classifier::classify(&content).barcode_type;
        Self {
            length: content.chars().count(),
            content,
            barcode_type,
            timestamp: Utc::now(),
            status,
            message: message.into(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of characters in the content.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn barcode_type(&self) -> BarcodeType {
        self.barcode_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn status(&self) -> PayloadStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
