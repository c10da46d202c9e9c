//! Engine, server and process configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::adds::AddsConfig;
use crate::domain::Coordinate;

/// Default search radius around the current position (statute miles).
pub const DEFAULT_RADIAL_DISTANCE_SM: u32 = 85;

/// Default corridor width along the route (statute miles).
pub const DEFAULT_CORRIDOR_SM: u32 = 85;

/// Errors parsing configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid number: {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} is not a valid socket address: {value:?}")]
    InvalidAddress { name: &'static str, value: String },

    #[error("{name} is not a valid coordinate list: {value:?}")]
    InvalidCoordinate { name: &'static str, value: String },

    #[error("{name} is not a valid boolean: {value:?}")]
    InvalidBool { name: &'static str, value: String },
}

/// Timing and query parameters for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay before the first background update.
    pub warmup: Duration,

    /// Interval between background updates.
    pub update_interval: Duration,

    /// Interval between expiry sweeps.
    pub sweep_interval: Duration,

    /// Radius of the query around the current position (statute miles).
    pub radial_distance_sm: u32,

    /// Width of the query corridor along the route (statute miles).
    pub corridor_sm: u32,

    /// Where to persist the registry, if anywhere.
    pub snapshot_path: Option<PathBuf>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_radial_distance(mut self, sm: u32) -> Self {
        self.radial_distance_sm = sm;
        self
    }

    pub fn with_corridor(mut self, sm: u32) -> Self {
        self.corridor_sm = sm;
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            warmup: Duration::from_secs(1),
            update_interval: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(10 * 60),
            radial_distance_sm: DEFAULT_RADIAL_DISTANCE_SM,
            corridor_sm: DEFAULT_CORRIDOR_SM,
            snapshot_path: None,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// Initial values for the engine's external inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitialInputs {
    pub consent: bool,
    pub position: Option<Coordinate>,
    pub route: Vec<Coordinate>,
}

/// Everything the binary needs, read from `WX_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub adds: AddsConfig,
    pub engine: EngineConfig,
    pub server: ServerConfig,
    pub inputs: InitialInputs,
    /// Serve canned responses from this directory instead of the network.
    pub mock_dir: Option<PathBuf>,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary lookup. Unset variables keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(url) = get("WX_BASE_URL") {
            settings.adds = settings.adds.with_base_url(url);
        }
        if let Some(v) = get("WX_TIMEOUT_SECS") {
            settings.adds = settings.adds.with_timeout(parse_number("WX_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("WX_BIND_ADDR") {
            settings.server.bind_addr =
                v.trim().parse().map_err(|_| ConfigError::InvalidAddress {
                    name: "WX_BIND_ADDR",
                    value: v.clone(),
                })?;
        }
        if let Some(path) = get("WX_SNAPSHOT_PATH") {
            settings.engine = settings.engine.with_snapshot_path(path);
        }
        if let Some(v) = get("WX_UPDATE_INTERVAL_SECS") {
            let secs = parse_number("WX_UPDATE_INTERVAL_SECS", &v)?;
            settings.engine = settings.engine.with_update_interval(Duration::from_secs(secs));
        }
        if let Some(v) = get("WX_SWEEP_INTERVAL_SECS") {
            let secs = parse_number("WX_SWEEP_INTERVAL_SECS", &v)?;
            settings.engine = settings.engine.with_sweep_interval(Duration::from_secs(secs));
        }
        if let Some(v) = get("WX_ACCEPT_TERMS") {
            settings.inputs.consent = parse_bool("WX_ACCEPT_TERMS", &v)?;
        }
        if let Some(v) = get("WX_POSITION") {
            let position = Coordinate::parse_pair(&v).ok_or_else(|| ConfigError::InvalidCoordinate {
                name: "WX_POSITION",
                value: v.clone(),
            })?;
            settings.inputs.position = Some(position);
        }
        if let Some(v) = get("WX_ROUTE") {
            settings.inputs.route = parse_route("WX_ROUTE", &v)?;
        }
        if let Some(dir) = get("WX_MOCK_DIR") {
            settings.mock_dir = Some(PathBuf::from(dir));
        }

        Ok(settings)
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: value.to_string(),
    })
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: value.to_string(),
        }),
    }
}

/// Parse `lat,lon;lat,lon;...`.
fn parse_route(name: &'static str, value: &str) -> Result<Vec<Coordinate>, ConfigError> {
    value
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            Coordinate::parse_pair(p).ok_or_else(|| ConfigError::InvalidCoordinate {
                name,
                value: value.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.warmup, Duration::from_secs(1));
        assert_eq!(config.update_interval, Duration::from_secs(1800));
        assert_eq!(config.sweep_interval, Duration::from_secs(600));
        assert_eq!(config.radial_distance_sm, 85);
        assert_eq!(config.corridor_sm, 85);
        assert!(config.snapshot_path.is_none());

        let s = settings(&[]).unwrap();
        assert!(!s.inputs.consent);
        assert!(s.inputs.position.is_none());
        assert!(s.inputs.route.is_empty());
        assert_eq!(s.server.bind_addr.port(), 3000);
    }

    #[test]
    fn reads_environment() {
        let s = settings(&[
            ("WX_BASE_URL", "http://localhost:9000/adds"),
            ("WX_TIMEOUT_SECS", "5"),
            ("WX_BIND_ADDR", "0.0.0.0:8080"),
            ("WX_SNAPSHOT_PATH", "/tmp/wx.snap"),
            ("WX_ACCEPT_TERMS", "yes"),
            ("WX_POSITION", "50.03, 8.55"),
            ("WX_ROUTE", "50.03,8.55; 48.35,11.79"),
            ("WX_UPDATE_INTERVAL_SECS", "60"),
            ("WX_SWEEP_INTERVAL_SECS", "30"),
        ])
        .unwrap();

        assert_eq!(s.adds.base_url, "http://localhost:9000/adds");
        assert_eq!(s.adds.timeout_secs, 5);
        assert_eq!(s.server.bind_addr.port(), 8080);
        assert_eq!(s.engine.snapshot_path, Some(PathBuf::from("/tmp/wx.snap")));
        assert!(s.inputs.consent);
        assert_eq!(s.inputs.position, Some(Coordinate::new(50.03, 8.55).unwrap()));
        assert_eq!(s.inputs.route.len(), 2);
        assert_eq!(s.engine.update_interval, Duration::from_secs(60));
        assert_eq!(s.engine.sweep_interval, Duration::from_secs(30));
    }

    #[test]
    fn blank_values_are_ignored() {
        let s = settings(&[("WX_POSITION", "  "), ("WX_TIMEOUT_SECS", "")]).unwrap();
        assert!(s.inputs.position.is_none());
        assert_eq!(s.adds.timeout_secs, AddsConfig::default().timeout_secs);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(matches!(
            settings(&[("WX_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::InvalidNumber { name: "WX_TIMEOUT_SECS", .. })
        ));
        assert!(matches!(
            settings(&[("WX_BIND_ADDR", "localhost")]),
            Err(ConfigError::InvalidAddress { .. })
        ));
        assert!(matches!(
            settings(&[("WX_ACCEPT_TERMS", "maybe")]),
            Err(ConfigError::InvalidBool { .. })
        ));
        assert!(matches!(
            settings(&[("WX_ROUTE", "50,8;91,0")]),
            Err(ConfigError::InvalidCoordinate { name: "WX_ROUTE", .. })
        ));
    }
}
