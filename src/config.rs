use crate::domain::Coordinate;
use crate::error::{LocatorError, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub geocoding: GeocodingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub default_radius_km: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingConfig {
    /// Per-provider call budget. One slow provider must not stall the chain
    /// beyond this bound.
    pub timeout_seconds: u64,
    /// TTL for the normalized-query cache. Zero disables caching.
    pub cache_ttl_seconds: u64,
    /// Fallback coordinate recorded when no provider produces a match.
    pub default_lat: f64,
    pub default_lng: f64,
    pub nominatim_url: String,
    pub opencage_url: String,
    pub user_agent: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            LocatorError::Config(format!("Failed to read config file '{config_path}': {e}"))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        config.geocoding.default_coordinate()?;
        Ok(config)
    }
}

impl GeocodingConfig {
    pub fn default_coordinate(&self) -> Result<Coordinate> {
        Coordinate::new(self.default_lat, self.default_lng).ok_or_else(|| {
            LocatorError::Config(format!(
                "default coordinate ({}, {}) is out of range",
                self.default_lat, self.default_lng
            ))
        })
    }
}
