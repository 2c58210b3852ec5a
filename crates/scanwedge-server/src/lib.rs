//! scanwedge-server library crate.
//!
//! Captures keyboard-wedge barcode scans and pushes each completed scan to
//! every connected WebSocket subscriber.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! keyboard hook / replay file
//!         │ KeyEvent
//!         ▼
//! [application::pipeline]  Assembler (scanwedge-core) → Payload
//!         │ PayloadSink::publish
//!         ▼
//! [infrastructure::hub]    one control task, bounded per-subscriber queues
//!         │ Frame (Arc<str>)
//!         ▼
//! [infrastructure::session] outbound + inbound loop per WebSocket
//! ```
//!
//! # Layer rules
//!
//! - `domain` holds plain runtime settings and has no I/O.
//! - `application` depends on `domain` and `scanwedge-core` only; the event
//!   source and the payload sink are injected as traits.
//! - `infrastructure` depends on all other layers plus `tokio`,
//!   `tokio-tungstenite` and the Windows API.

/// Domain layer: runtime settings (no I/O).
pub mod domain;

/// Application layer: the scan pipeline.
pub mod application;

/// Infrastructure layer: key capture, hub, sessions, WebSocket server, config files.
pub mod infrastructure;
