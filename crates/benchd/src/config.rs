//! Server configuration.
//!
//! Defaults are overridden first by the environment (`PORT`,
//! `BENCH_HOST`), then by command-line flags in the `benchd` binary.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::registry::DEFAULT_MAX_SUBSCRIBERS;

/// Default listening port
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address (all interfaces)
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Default telemetry period
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);

/// Environment variable holding the listening port
pub const PORT_ENV: &str = "PORT";

/// Environment variable holding the bind address
pub const HOST_ENV: &str = "BENCH_HOST";

/// Runtime configuration for [`crate::server::BenchServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub tick_interval: Duration,
    pub max_subscribers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
        }
    }
}

impl ServerConfig {
    /// Builds a configuration from defaults plus the process environment.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` if `PORT` or `BENCH_HOST` is set but
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration using `lookup` to read variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(PORT_ENV) {
            config.port = parse_var(PORT_ENV, &raw)?;
        }
        if let Some(raw) = lookup(HOST_ENV) {
            config.host = parse_var(HOST_ENV, &raw)?;
        }

        Ok(config)
    }

    /// Loopback configuration on an OS-assigned port.
    pub fn ephemeral() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Self::default()
        }
    }

    /// Returns the socket address to bind.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Checks values that cannot be expressed in the types.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` for a zero tick interval or zero capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "tick_interval",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_subscribers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_subscribers",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_var<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Errors that can occur while building configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {key}={value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}
