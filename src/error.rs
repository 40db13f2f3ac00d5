use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),
    #[error("unable to parse configuration file: {0}")]
    UnknownConfigFormat(PathBuf),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("route '{0}' not found in configuration")]
    RouteNotFound(String),
    #[error("{provider} API key not found in config or {env_var} environment variable")]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },
    #[error("route '{0}' has no free-flow baseline, run populate-free-flow first")]
    MissingFreeFlow(String),
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("environment variable {0} is not set")]
    MissingEnvVar(String),
    #[error("notification command '{tool}' failed: {status}")]
    NotificationFailed {
        tool: String,
        status: std::process::ExitStatus,
    },
    #[error("notification command '{0}' timed out")]
    NotificationTimeout(String),
    #[error("{0} route check(s) failed")]
    ChecksFailed(usize),
}
