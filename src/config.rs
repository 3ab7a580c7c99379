use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Generative AI provider settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AiConfig {
    /// Provider URL requests are forwarded to
    pub endpoint: Option<String>,
    /// Bearer token sent to the provider
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model used when a request does not name one
    pub model: Option<String>,
}

impl AiConfig {
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite document store
    pub database_path: ConfigValue<PathBuf>,
    /// Port the server listens on
    pub port: ConfigValue<u16>,
    /// Uid the CLI acts as
    pub uid: ConfigValue<String>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Generative AI settings
    pub ai: AiConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    port: Option<u16>,
    uid: Option<String>,
    ai: Option<AiConfig>,
}

/// Resolve relative paths against the config file's directory
fn resolve(config_path: &std::path::Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        config_path
            .parent()
            .map(|p| p.join(&path))
            .unwrap_or(path)
    } else {
        path
    }
}

impl Config {
    pub const DEFAULT_PORT: u16 = 8080;

    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    fn load_with_env(
        config_path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let data_dir = Self::default_data_dir();

        // Start with defaults
        let mut database_path =
            ConfigValue::new(data_dir.join("quizdeck.db"), ConfigSource::Default);
        let mut port = ConfigValue::new(Self::DEFAULT_PORT, ConfigSource::Default);
        let mut uid = ConfigValue::new("default".to_string(), ConfigSource::Default);
        let mut config_file = None;
        let mut ai = AiConfig::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                database_path = ConfigValue::new(resolve(&path, db_path), ConfigSource::File);
            }
            if let Some(p) = file_config.port {
                port = ConfigValue::new(p, ConfigSource::File);
            }
            if let Some(u) = file_config.uid {
                uid = ConfigValue::new(u, ConfigSource::File);
            }
            if let Some(ai_config) = file_config.ai {
                ai = ai_config;
            }
        }

        // Apply environment variable overrides
        if let Some(db_path) = env("QUIZDECK_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Some(p) = env("QUIZDECK_PORT") {
            let parsed = p
                .parse()
                .map_err(|_| ConfigError::InvalidValue("QUIZDECK_PORT", p.clone()))?;
            port = ConfigValue::new(parsed, ConfigSource::Environment);
        }
        if let Some(u) = env("QUIZDECK_UID") {
            uid = ConfigValue::new(u, ConfigSource::Environment);
        }
        if let Some(endpoint) = env("QUIZDECK_AI_ENDPOINT") {
            ai.endpoint = Some(endpoint);
        }
        if let Some(key) = env("QUIZDECK_AI_API_KEY") {
            ai.api_key = Some(key);
        }
        if let Some(model) = env("QUIZDECK_AI_MODEL") {
            ai.model = Some(model);
        }

        Ok(Self {
            database_path,
            port,
            uid,
            config_file,
            ai,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/quizdeck/
    /// - macOS: ~/Library/Application Support/quizdeck/
    /// - Windows: %APPDATA%/quizdeck/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quizdeck")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/quizdeck/
    /// - macOS: ~/Library/Application Support/quizdeck/
    /// - Windows: %APPDATA%/quizdeck/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quizdeck")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(key, value) => {
                write!(f, "Invalid value '{}' for {}", value, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
