use std::path::PathBuf;
use thiserror::Error;

/// Notebooklets error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    ConfigValidation(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Failed to load unit definition {path}: {message}")]
    UnitLoad { path: PathBuf, message: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Required data provider(s) {} not loaded{}", .providers.join(", "), unit_suffix(.unit))]
    ProviderUnavailable {
        providers: Vec<String>,
        unit: Option<String>,
    },

    #[error("Data provider {0} not found")]
    ProviderNotFound(String),

    #[error("Configuration conflict: {0}")]
    ConfigurationConflict(String),

    #[error("Unknown property {0}")]
    UnknownProperty(String),

    #[error("Invalid timespan: {0}")]
    InvalidTimespan(String),

    #[error("Setting error: {0}")]
    Setting(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("{0}")]
    Other(String),
}

fn unit_suffix(unit: &Option<String>) -> String {
    match unit {
        Some(name) => format!(" (class {})", name),
        None => String::new(),
    }
}

/// Result type alias for notebooklet operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a config validation error
    pub fn config_validation(msg: impl Into<String>) -> Self {
        Error::ConfigValidation(msg.into())
    }

    /// Create a unit load error
    pub fn unit_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::UnitLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a missing parameter error
    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Error::MissingParameter(name.into())
    }

    /// Create a provider unavailable error, optionally naming the unit class
    pub fn provider_unavailable<I, S>(providers: I, unit: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Error::ProviderUnavailable {
            providers: providers.into_iter().map(Into::into).collect(),
            unit: unit.map(str::to_string),
        }
    }

    /// Create a configuration conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::ConfigurationConflict(msg.into())
    }

    /// Create a query error
    pub fn query(msg: impl Into<String>) -> Self {
        Error::Query(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}
