//! Storage infrastructure: configuration file persistence.
//!
//! Reads the TOML file from the platform config directory (or an explicit
//! path), supplies defaults on first run, and converts the file schema into
//! the runtime [`ServiceConfig`](crate::domain::ServiceConfig).

pub mod config;
