//! Domain layer: scan assembly and classification.
//!
//! Nothing in here performs I/O or depends on an async runtime.  The
//! assembler is a plain state machine fed one [`KeyEvent`] at a time, and the
//! classifier is a pure function of the payload content.
//!
//! [`KeyEvent`]: crate::keymap::KeyEvent

pub mod assembler;
pub mod classifier;
pub mod payload;

pub use assembler::{Assembler, AssemblerConfig, AssemblerStats};
pub use classifier::{classify, describe, validate, BarcodeDetail, BarcodeInfo, Classification};
pub use payload::{BarcodeType, Payload, PayloadStatus};
