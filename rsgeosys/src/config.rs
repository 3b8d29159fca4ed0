//! Settings file handling for ~/.rsgeosys/config.ini.
//!
//! A missing file yields defaults; values present in the file override
//! them one by one.

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use crate::collect::bridge::identity::Credentials;
use crate::collect::global_variables::{server_url, BRIDGE_URLS, IDENTITY_URLS};
use crate::collect::http::ProxyConfig;
use crate::download::zones::LayerFormat;
use crate::products::catalog::REGIONS;

pub const DEFAULT_REGION: &str = "na";
pub const DEFAULT_N_PLANNED: f64 = 1.0;
pub const DEFAULT_ZONE_COUNT: u32 = 5;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeSettings {
    pub region: String,
    pub use_testing_service: bool,
    pub credentials: Credentials,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            use_testing_service: false,
            credentials: Credentials::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    /// Directory receiving zone and hotspot layers
    pub directory: PathBuf,
    pub layer_format: LayerFormat,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: config_directory().join("layers"),
            layer_format: LayerFormat::default(),
        }
    }
}

/// Caller-side defaults for optional request parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultSettings {
    pub n_planned: f64,
    pub zone_count: u32,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            n_planned: DEFAULT_N_PLANNED,
            zone_count: DEFAULT_ZONE_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub bridge: BridgeSettings,
    pub proxy: ProxyConfig,
    pub output: OutputSettings,
    pub defaults: DefaultSettings,
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(invalid(section, key, value, "must be true or false")),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Settings {
    /// Load settings from the default path (~/.rsgeosys/config.ini).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load settings from a specific path, defaults when it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    /// Overlays the values found in `ini` on the defaults.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();

        // [bridge] section
        if let Some(section) = ini.section(Some("bridge")) {
            if let Some(v) = section.get("region") {
                let v = v.trim().to_lowercase();
                if !REGIONS.iter().any(|(key, _)| *key == v) {
                    return Err(invalid("bridge", "region", &v, "must be one of: na, eu"));
                }
                settings.bridge.region = v;
            }
            if let Some(v) = section.get("use_testing_service") {
                settings.bridge.use_testing_service =
                    parse_bool("bridge", "use_testing_service", v)?;
            }
            let credentials = &mut settings.bridge.credentials;
            for (key, field) in [
                ("username", &mut credentials.username),
                ("password", &mut credentials.password),
                ("client_id", &mut credentials.client_id),
                ("client_secret", &mut credentials.client_secret),
            ] {
                if let Some(v) = section.get(key) {
                    *field = v.trim().to_string();
                }
            }
        }

        // [proxy] section
        if let Some(section) = ini.section(Some("proxy")) {
            if let Some(v) = section.get("port") {
                let v = v.trim();
                if !v.is_empty() && v.parse::<u16>().is_err() {
                    return Err(invalid("proxy", "port", v, "must be a port number"));
                }
            }
            let proxy = &mut settings.proxy;
            for (key, field) in [
                ("host", &mut proxy.host),
                ("port", &mut proxy.port),
                ("user", &mut proxy.user),
                ("password", &mut proxy.password),
            ] {
                if let Some(v) = section.get(key) {
                    *field = v.trim().to_string();
                }
            }
        }

        // [output] section
        if let Some(section) = ini.section(Some("output")) {
            if let Some(v) = section.get("directory") {
                let v = v.trim();
                if !v.is_empty() {
                    settings.output.directory = expand_tilde(v);
                }
            }
            if let Some(v) = section.get("layer_format") {
                settings.output.layer_format = v
                    .parse()
                    .map_err(|_| invalid("output", "layer_format", v, "must be geojson or shapefile"))?;
            }
        }

        // [defaults] section
        if let Some(section) = ini.section(Some("defaults")) {
            if let Some(v) = section.get("n_planned") {
                settings.defaults.n_planned = v
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite() && *n >= 0.0)
                    .ok_or_else(|| {
                        invalid("defaults", "n_planned", v, "must be a non-negative number")
                    })?;
            }
            if let Some(v) = section.get("zone_count") {
                settings.defaults.zone_count = v
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        invalid("defaults", "zone_count", v, "must be a positive integer")
                    })?;
            }
        }

        Ok(settings)
    }

    /// Identity and bridge server origins for the configured region.
    pub fn session_urls(&self) -> Result<(&'static str, &'static str), ConfigError> {
        let region = self.bridge.region.as_str();
        let testing = self.bridge.use_testing_service;
        match (
            server_url(&IDENTITY_URLS, region, testing),
            server_url(&BRIDGE_URLS, region, testing),
        ) {
            (Some(identity), Some(bridge)) => Ok((identity, bridge)),
            _ => Err(invalid("bridge", "region", region, "must be one of: na, eu")),
        }
    }
}

/// Get the path to the config directory (~/.rsgeosys).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rsgeosys")
}

/// Get the path to the config file (~/.rsgeosys/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
