//! JSON envelope types for the subscriber-facing WebSocket protocol.
//!
//! Every frame pushed to a subscriber is a single JSON object with a `"type"`
//! discriminant and a `"time"` field stamped when the envelope was built:
//!
//! ```json
//! {"type":"welcome","message":"connected, waiting for scan data...","time":"2026-10-15T08:00:00Z"}
//! {"type":"barcode","data":{"content":"PRD99","length":5,"type":"Product", ...},"time":"..."}
//! ```
//!
//! # Serialise once, share everywhere
//!
//! A broadcast reaches every subscriber, so the envelope is encoded exactly
//! once into a [`Frame`] (`Arc<str>`) and the same allocation is cloned into
//! each subscriber queue.  Frames are never mutated after encoding.
//!
//! Subscribers never send application messages; there is deliberately no
//! inbound message type.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::payload::Payload;

/// Greeting carried by the welcome envelope.
pub const WELCOME_MESSAGE: &str = "connected, waiting for scan data...";

/// An encoded envelope, shared read-only between subscriber queues.
pub type Frame = Arc<str>;

/// The variant-specific part of an envelope.
///
/// `tag = "type"` puts the discriminant next to the variant's fields, and
/// `rename_all = "lowercase"` gives the `"welcome"` / `"barcode"` tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EnvelopeBody {
    /// Sent to a subscriber exactly once, right after it registers.
    Welcome { message: String },

    /// A completed scan.
    Barcode { data: Payload },
}

/// One message from the hub to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub body: EnvelopeBody,
    /// When the envelope was built (RFC 3339, UTC).
    pub time: DateTime<Utc>,
}

impl Envelope {
    /// The greeting sent on registration.
    pub fn welcome() -> Self {
        Self {
            body: EnvelopeBody::Welcome {
                message: WELCOME_MESSAGE.to_string(),
            },
            time: Utc::now(),
        }
    }

    /// Wraps a completed payload for broadcast.
    pub fn barcode(payload: Payload) -> Self {
        Self {
            body: EnvelopeBody::Barcode { data: payload },
            time: Utc::now(),
        }
    }

    /// Encodes the envelope as a JSON text frame.
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::from)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
