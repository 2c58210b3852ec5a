//! Runtime configuration types.
//!
//! [`ServiceConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup from the TOML file and CLI overrides (see
//! `infrastructure::storage::config` and `main.rs`) or from defaults in tests.
//!
//! Keeping configuration as plain structs (no global state, no environment
//! reads in here) lets the hub and sessions be constructed directly in tests
//! with tiny capacities and millisecond timers.

use std::net::SocketAddr;
use std::time::Duration;

use scanwedge_core::AssemblerConfig;
use thiserror::Error;

/// A configuration value that would make the service misbehave.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("min_length must be at least 1")]
    ZeroMinLength,

    #[error("min_length ({min}) must not exceed max_length ({max})")]
    MinAboveMax { min: usize, max: usize },

    #[error("{name} must be at least 1")]
    ZeroCapacity { name: &'static str },

    #[error("ping period ({ping:?}) must be shorter than pong wait ({pong:?})")]
    PingNotBeforePong { ping: Duration, pong: Duration },

    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },
}

/// Sizing of the broadcast hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubSettings {
    /// Frames buffered per subscriber before it is dropped as too slow.
    pub queue_capacity: usize,
    /// Commands (register, unregister, broadcast) buffered ahead of the
    /// control loop before new broadcasts are dropped.
    pub inbound_capacity: usize,
}

impl Default for HubSettings {
    /// | Field            | Default |
    /// |------------------|---------|
    /// | queue_capacity   | 256     |
    /// | inbound_capacity | 256     |
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            inbound_capacity: 256,
        }
    }
}

/// Liveness and write timing for one subscriber session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Interval between outbound pings.
    pub ping_period: Duration,
    /// How long the inbound side waits for a pong before giving up.
    pub pong_wait: Duration,
    /// Upper bound on a single frame write.
    pub write_wait: Duration,
}

impl Default for SessionSettings {
    /// | Field       | Default |
    /// |-------------|---------|
    /// | ping_period | 54 s    |
    /// | pong_wait   | 60 s    |
    /// | write_wait  | 10 s    |
    fn default() -> Self {
        Self {
            ping_period: Duration::from_secs(54),
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
        }
    }
}

/// All runtime configuration for the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: SocketAddr,
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Install the OS keyboard hook (Windows only).
    pub enable_hook: bool,
    pub assembler: AssemblerConfig,
    pub hub: HubSettings,
    pub session: SessionSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            enable_hook: true,
            assembler: AssemblerConfig::default(),
            hub: HubSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Checks the cross-field constraints that serde defaults cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let AssemblerConfig {
            char_timeout_ms,
            min_length,
            max_length,
        } = self.assembler;

        if min_length == 0 {
            return Err(ConfigValidationError::ZeroMinLength);
        }
        if min_length > max_length {
            return Err(ConfigValidationError::MinAboveMax {
                min: min_length,
                max: max_length,
            });
        }
        if char_timeout_ms == 0 {
            return Err(ConfigValidationError::ZeroDuration {
                name: "timeout_ms",
            });
        }
        if self.hub.queue_capacity == 0 {
            return Err(ConfigValidationError::ZeroCapacity {
                name: "queue_capacity",
            });
        }
        if self.hub.inbound_capacity == 0 {
            return Err(ConfigValidationError::ZeroCapacity {
                name: "broadcast_capacity",
            });
        }

        let SessionSettings {
            ping_period,
            pong_wait,
            write_wait,
        } = self.session;
        if ping_period.is_zero() {
            return Err(ConfigValidationError::ZeroDuration {
                name: "ping_period",
            });
        }
        if write_wait.is_zero() {
            return Err(ConfigValidationError::ZeroDuration {
                name: "write_wait",
            });
        }
        if ping_period >= pong_wait {
            return Err(ConfigValidationError::PingNotBeforePong {
                ping: ping_period,
                pong: pong_wait,
            });
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bind_port_is_8080() {
        // Arrange / Act
        let cfg = ServiceConfig::default();
        // Assert
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert!(cfg.bind_addr.ip().is_unspecified());
    }

    #[test]
    fn test_default_session_timers() {
        let s = SessionSettings::default();
        assert_eq!(s.ping_period, Duration::from_secs(54));
        assert_eq!(s.pong_wait, Duration::from_secs(60));
        assert_eq!(s.write_wait, Duration::from_secs(10));
    }

    #[test]
    fn test_default_hub_capacities() {
        let h = HubSettings::default();
        assert_eq!(h.queue_capacity, 256);
        assert_eq!(h.inbound_capacity, 256);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(ServiceConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_zero_min_length_is_rejected() {
        let mut cfg = ServiceConfig::default();
        cfg.assembler.min_length = 0;
        assert_eq!(cfg.validate(), Err(ConfigValidationError::ZeroMinLength));
    }

    #[test]
    fn test_min_above_max_is_rejected() {
        let mut cfg = ServiceConfig::default();
        cfg.assembler.min_length = 20;
        cfg.assembler.max_length = 10;
        assert_eq!(
            cfg.validate(),
            Err(ConfigValidationError::MinAboveMax { min: 20, max: 10 })
        );
    }

    #[test]
    fn test_equal_min_and_max_is_allowed() {
        let mut cfg = ServiceConfig::default();
        cfg.assembler.min_length = 13;
        cfg.assembler.max_length = 13;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_queue_capacity_is_rejected() {
        let mut cfg = ServiceConfig::default();
        cfg.hub.queue_capacity = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigValidationError::ZeroCapacity { name: "queue_capacity" })
        ));
    }

    #[test]
    fn test_ping_period_must_be_shorter_than_pong_wait() {
        let mut cfg = ServiceConfig::default();
        cfg.session.ping_period = Duration::from_secs(60);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigValidationError::PingNotBeforePong { .. })
        ));
    }
}
