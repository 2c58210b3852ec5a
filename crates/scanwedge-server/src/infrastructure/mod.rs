//! Infrastructure layer for scanwedge-server.
//!
//! Contains OS-facing adapters: the keyboard hook, the broadcast hub and its
//! WebSocket sessions, the accept loop, and config-file persistence.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `scanwedge_core`, but MUST NOT be imported by the domain layer.

pub mod hub;
pub mod input_capture;
pub mod session;
pub mod storage;
pub mod ws_server;

pub use hub::{Hub, HubError, HubHandle};
pub use ws_server::{bind, serve};
