use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Coordinates as `(lat, lng)`, serialized as a two-element array.
pub type LatLong = (f64, f64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Human-readable name for the route.
    pub name: String,
    pub start_latlong: LatLong,
    pub end_latlong: LatLong,
    /// Waypoints of the free-flow baseline route, empty until populated.
    #[serde(default)]
    pub free_flow_route: Vec<LatLong>,
    /// Current-to-free-flow travel time ratio above which the route counts
    /// as congested. Must be greater than 1.0.
    #[serde(default = "default_congestion_threshold")]
    pub congestion_threshold: f64,
}

fn default_congestion_threshold() -> f64 {
    1.5
}

impl RouteConfig {
    fn validate(&self, key: &str) -> Result<(), Error> {
        if self.congestion_threshold <= 1.0 {
            return Err(Error::Config(format!(
                "route '{key}': congestion_threshold must be greater than 1.0, got {}",
                self.congestion_threshold
            )));
        }
        for latlong in [self.start_latlong, self.end_latlong]
            .iter()
            .chain(self.free_flow_route.iter())
        {
            validate_latlong(key, *latlong)?;
        }
        Ok(())
    }
}

fn validate_latlong(key: &str, (lat, lng): LatLong) -> Result<(), Error> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(Error::Config(format!(
            "route '{key}': latitude must be between -90 and 90, got {lat}"
        )));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(Error::Config(format!(
            "route '{key}': longitude must be between -180 and 180, got {lng}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// CLI tool to run for notifications.
    pub tool: String,
    /// Arguments for the tool. `<VAR>` entries are replaced with the value
    /// of that environment variable and `_NOTIFICATION_MESSAGE_` with the
    /// alert text at send time.
    pub cli_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Routing API provider: "mapbox", "google" or "mock".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Provider API key, falls back to the provider's environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Minimum fractional improvement an alternative must offer before a
    /// notification fires, e.g. 0.15 for 15%.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_improvement: Option<f64>,
    #[serde(default)]
    pub route: BTreeMap<String, RouteConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationConfig>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;

        let config: Config = match extension(path).as_deref() {
            Some("toml") => toml::from_str(&content)?,
            Some("yml" | "yaml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => parse_any(&content)
                .ok_or_else(|| Error::UnknownConfigFormat(path.to_path_buf()))?,
        };

        for (key, route) in &config.route {
            route.validate(key)?;
        }
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let content = match extension(path).as_deref() {
            Some("yml" | "yaml") => serde_yaml::to_string(self)?,
            Some("json") => serde_json::to_string_pretty(self)?,
            // TOML is the default format
            _ => toml::to_string_pretty(self)?,
        };
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get_route(&self, name: &str) -> Result<&RouteConfig, Error> {
        self.route
            .get(name)
            .ok_or_else(|| Error::RouteNotFound(name.to_string()))
    }

    pub fn get_route_mut(&mut self, name: &str) -> Result<&mut RouteConfig, Error> {
        self.route
            .get_mut(name)
            .ok_or_else(|| Error::RouteNotFound(name.to_string()))
    }

    /// Resolves the config file path: the CLI flag if given, otherwise the
    /// platform config directory.
    pub fn resolve_path(cli_path: Option<PathBuf>) -> Result<PathBuf, Error> {
        if let Some(path) = cli_path {
            return Ok(path);
        }
        dirs::config_dir()
            .map(|dir| dir.join("route-watch").join("config.toml"))
            .ok_or_else(|| {
                Error::Config(
                    "no --config-file given and no default config directory available".to_string(),
                )
            })
    }

    /// Provider API key: explicit config value, then the environment.
    pub fn resolve_api_key(&self, env_var: &str) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| dotenvy::var(env_var).ok())
            .filter(|key| !key.is_empty())
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Format auto-detection for unknown extensions, in the order the original
/// formats are most likely to appear.
fn parse_any(content: &str) -> Option<Config> {
    toml::from_str(content)
        .ok()
        .or_else(|| serde_yaml::from_str(content).ok())
        .or_else(|| serde_json::from_str(content).ok())
}
