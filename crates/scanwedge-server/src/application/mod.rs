//! Application layer use cases.
//!
//! - **`pipeline`** – Drains a key event source through the assembler and
//!   hands every completed payload to a sink.  The source and the sink are
//!   injected as traits, so the whole flow runs in tests without a keyboard
//!   hook or a socket.

pub mod pipeline;

pub use pipeline::{PayloadSink, PipelineReport, PublishError, ScanPipeline};
