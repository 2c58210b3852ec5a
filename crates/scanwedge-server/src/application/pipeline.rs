//! ScanPipeline: key events in, published payloads out.
//!
//! ```text
//! KeyEventSource::next_event ──► Assembler::push ──► PayloadSink::publish
//! ```
//!
//! The pipeline owns the only [`Assembler`] and processes one event at a
//! time, so the assembler needs no locking.  A sink failure (hub saturated or
//! gone) is logged and the scan is lost; capture carries on regardless.

use std::sync::Arc;

use scanwedge_core::{Assembler, AssemblerConfig, AssemblerStats, Payload};
use thiserror::Error;
use tracing::{info, warn};

use crate::infrastructure::input_capture::KeyEventSource;

/// Error type for publishing a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("subscriber fan-out is saturated; payload dropped")]
    Saturated,
    #[error("payload sink is closed")]
    Closed,
    #[error("failed to encode payload: {0}")]
    Encode(String),
}

/// Destination for completed payloads.
///
/// The infrastructure implementation is the broadcast hub; tests use the
/// generated `MockPayloadSink`.
#[cfg_attr(test, mockall::automock)]
pub trait PayloadSink: Send + Sync {
    /// Submits a payload without blocking.
    fn publish(&self, payload: &Payload) -> Result<(), PublishError>;
}

/// Totals for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Key events consumed from the source.
    pub events: u64,
    /// Payloads accepted by the sink.
    pub published: u64,
    /// Payloads the sink refused.
    pub publish_failures: u64,
    pub assembler: AssemblerStats,
}

/// Drives an [`Assembler`] from a [`KeyEventSource`].
pub struct ScanPipeline {
    assembler: Assembler,
    sink: Arc<dyn PayloadSink>,
}

impl ScanPipeline {
    pub fn new(config: AssemblerConfig, sink: Arc<dyn PayloadSink>) -> Self {
        Self {
            assembler: Assembler::new(config),
            sink,
        }
    }

    /// Consumes `source` until it is exhausted and reports what happened.
    pub async fn run(mut self, source: &mut dyn KeyEventSource) -> PipelineReport {
        let mut report = PipelineReport::default();
        info!(
            timeout_ms = self.assembler.config().char_timeout_ms,
            min_length = self.assembler.config().min_length,
            max_length = self.assembler.config().max_length,
            "scan pipeline started"
        );

        while let Some(event) = source.next_event().await {
            report.events += 1;
            let Some(payload) = self.assembler.push(event) else {
                continue;
            };

            info!(
                content = payload.content(),
                barcode_type = %payload.barcode_type(),
                length = payload.len(),
                "barcode scanned"
            );
            match self.sink.publish(&payload) {
                Ok(()) => report.published += 1,
                Err(e) => {
                    warn!(content = payload.content(), "payload not published: {e}");
                    report.publish_failures += 1;
                }
            }
        }

        report.assembler = self.assembler.stats();
        info!(
            events = report.events,
            published = report.published,
            failures = report.publish_failures,
            "scan pipeline finished"
        );
        report
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
