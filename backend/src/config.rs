//! Application configuration.
//!
//! Settings come from environment variables ([`AppConfig::from_env`]) or from
//! a TOML file ([`AppConfig::from_file`]):
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! cors_origins = ["http://localhost:3000"]
//!
//! [auth]
//! secret_key = "change-me"
//! access_token_expire_minutes = 30
//!
//! [prediction]
//! model_path = "data/crowd_model.json"
//! history_days = 7
//! ```
//!
//! Every field is optional and falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Signing key used when `SECRET_KEY` is not set. Only suitable for development.
pub const DEFAULT_SECRET_KEY: &str = "development-secret-key-change-in-production";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TOKEN_EXPIRE_MINUTES: i64 = 30;
pub const DEFAULT_HISTORY_DAYS: i64 = 7;
/// Upper bound on the history window (ten years).
pub const MAX_HISTORY_DAYS: i64 = 3650;

/// Errors raised while loading configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime settings for the HTTP server, authentication and prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub secret_key: String,
    pub access_token_expire_minutes: i64,
    /// Allowed CORS origins; empty means any origin.
    pub cors_origins: Vec<String>,
    /// Where the trained model is persisted. `None` keeps it in memory only.
    pub model_path: Option<PathBuf>,
    /// Days of report history fed to the predictor.
    pub history_days: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            access_token_expire_minutes: DEFAULT_TOKEN_EXPIRE_MINUTES,
            cors_origins: Vec::new(),
            model_path: None,
            history_days: DEFAULT_HISTORY_DAYS,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a comma separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl AppConfig {
    /// Build configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `HOST` (default `0.0.0.0`), `PORT` (default 8080)
    /// - `SECRET_KEY` (default: development key, logged as a warning)
    /// - `ACCESS_TOKEN_EXPIRE_MINUTES` (default 30)
    /// - `CORS_ORIGINS`: comma separated (default: any origin)
    /// - `MODEL_PATH`: model persistence file (default: none)
    /// - `HISTORY_DAYS` (default 7, at most [`MAX_HISTORY_DAYS`])
    ///
    /// Unparseable or out-of-range numbers fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            host: env_non_empty("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT").unwrap_or(defaults.port),
            secret_key: env_non_empty("SECRET_KEY").unwrap_or(defaults.secret_key),
            access_token_expire_minutes: env_parse("ACCESS_TOKEN_EXPIRE_MINUTES")
                .filter(|m: &i64| *m > 0)
                .unwrap_or(defaults.access_token_expire_minutes),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_default(),
            model_path: env_non_empty("MODEL_PATH").map(PathBuf::from),
            history_days: env_parse("HISTORY_DAYS")
                .filter(|d: &i64| (1..=MAX_HISTORY_DAYS).contains(d))
                .unwrap_or(defaults.history_days),
        };
        config.warn_on_default_secret();
        config
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        config.warn_on_default_secret();
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        let config = Self {
            host: file.server.host,
            port: file.server.port,
            secret_key: file.auth.secret_key,
            access_token_expire_minutes: file.auth.access_token_expire_minutes,
            cors_origins: file.server.cors_origins,
            model_path: file.prediction.model_path,
            history_days: file.prediction.history_days,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.secret_key must not be empty".into()));
        }
        if self.access_token_expire_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "auth.access_token_expire_minutes must be positive".into(),
            ));
        }
        if !(1..=MAX_HISTORY_DAYS).contains(&self.history_days) {
            return Err(ConfigError::Invalid(format!(
                "prediction.history_days must be between 1 and {}",
                MAX_HISTORY_DAYS
            )));
        }
        Ok(())
    }

    /// `host:port` string for binding the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }

    fn warn_on_default_secret(&self) {
        if self.uses_default_secret() {
            log::warn!("SECRET_KEY is not set; using the development signing key");
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerSection,
    auth: AuthSection,
    prediction: PredictionSection,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct ServerSection {
    host: String,
    port: u16,
    cors_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct AuthSection {
    secret_key: String,
    access_token_expire_minutes: i64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            access_token_expire_minutes: DEFAULT_TOKEN_EXPIRE_MINUTES,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct PredictionSection {
    model_path: Option<PathBuf>,
    history_days: i64,
}

impl Default for PredictionSection {
    fn default() -> Self {
        Self {
            model_path: None,
            history_days: DEFAULT_HISTORY_DAYS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.uses_default_secret());
    }

    #[test]
    fn test_partial_file() {
        let config = AppConfig::from_toml(
            r#"
[server]
port = 9000
cors_origins = ["http://localhost:3000"]

[prediction]
model_path = "/tmp/model.json"
"#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.model_path, Some(PathBuf::from("/tmp/model.json")));
        assert_eq!(config.history_days, 7);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AppConfig::from_toml("[auth]\naccess_token_expire_minutes = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(matches!(
            AppConfig::from_toml("[server]\nport = \"abc\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_history_days_bounds() {
        for value in ["0", "3651", "200000000000"] {
            let toml = format!("[prediction]\nhistory_days = {}\n", value);
            let err = AppConfig::from_toml(&toml).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{}", value);
        }
        let config = AppConfig::from_toml("[prediction]\nhistory_days = 3650\n").unwrap();
        assert_eq!(config.history_days, MAX_HISTORY_DAYS);
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" http://a.test , ,http://b.test"),
            vec!["http://a.test", "http://b.test"]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
