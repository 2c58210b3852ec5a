//! Domain layer for scanwedge-server.
//!
//! Only plain configuration values live here.  They are populated by the
//! infrastructure layer (TOML file + CLI) and handed to the hub, the
//! sessions and the pipeline at startup.

pub mod config;

pub use config::{ConfigValidationError, HubSettings, ServiceConfig, SessionSettings};
