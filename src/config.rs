use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::core::{EngineConfig, ForecastError};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_USAGE_LOG_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    /// JSON file with `EngineConfig` overrides.
    pub engine_config_path: Option<PathBuf>,
    pub usage_log_capacity: usize,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let host = lookup("HOST")
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let engine_config_path = lookup("PENSION_CONFIG")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let usage_log_capacity = lookup("USAGE_LOG_CAPACITY")
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|&capacity| capacity > 0)
            .unwrap_or(DEFAULT_USAGE_LOG_CAPACITY);

        Self {
            host,
            port,
            log_level,
            engine_config_path,
            usage_log_capacity,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Defaults when `path` is `None`, otherwise the file's overrides on top of them.
pub fn load_engine_config(path: Option<&std::path::Path>) -> Result<EngineConfig, ConfigLoadError> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(EngineConfig::from_json_str(&raw)?)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Invalid(#[from] ForecastError),
}
