//! # scanwedge-core
//!
//! Shared library for ScanWedge containing the keystroke-to-barcode assembler,
//! the payload classifier, and the JSON envelope broadcast to subscribers.
//!
//! This crate has zero dependencies on OS APIs, async runtimes, or network
//! sockets.  Everything in it can be driven deterministically from a test.
//!
//! # Architecture overview (for beginners)
//!
//! A barcode scanner in "keyboard wedge" mode pretends to be a keyboard: every
//! scan arrives as a burst of very fast key presses followed by Enter.  The
//! operating system cannot tell those key presses apart from a human typing,
//! so ScanWedge watches *how fast* they arrive to decide what is a scan.
//!
//! - **`keymap`** – Translates Windows virtual-key codes into the characters a
//!   scanner can emit, plus the terminator (Enter).
//!
//! - **`domain`** – The assembler state machine that turns key events into
//!   finished [`Payload`]s, and the pure classifier that labels a payload as
//!   EAN-13, UPC-A, a product code, and so on.
//!
//! - **`protocol`** – The JSON envelope pushed to every WebSocket subscriber.

pub mod domain;
pub mod keymap;
pub mod protocol;

pub use domain::assembler::{Assembler, AssemblerConfig, AssemblerStats};
pub use domain::classifier::{classify, describe, validate, Classification, ValidationError};
pub use domain::payload::{BarcodeType, Payload, PayloadStatus};
pub use keymap::{KeyEvent, KeyMapper, ScanKey};
pub use protocol::messages::{Envelope, EnvelopeBody, Frame};
