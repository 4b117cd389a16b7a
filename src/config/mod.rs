//! Configuration management
//!
//! Configuration is read from `config.yml` and can be overridden with
//! `CHUB_*` environment variables. Missing values fall back to defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Token signing configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin of the web client
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Trust `X-Forwarded-For` / `X-Real-IP` for the login IP limit.
    /// Only enable behind a reverse proxy that overwrites them.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            trust_proxy_headers: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/curriculum_hub.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Access token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign access tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Token lifetime in hours
    #[serde(default = "default_token_expiration_hours")]
    pub token_expiration_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_expiration_hours: default_token_expiration_hours(),
        }
    }
}

/// Placeholder secret, only suitable for local development.
pub const DEV_JWT_SECRET: &str = "change-me-in-production";

fn default_jwt_secret() -> String {
    DEV_JWT_SECRET.to_string()
}

fn default_token_expiration_hours() -> i64 {
    5
}

impl AuthConfig {
    /// True when the signing secret was never configured
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

/// LLM provider configuration (OpenAI compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    /// Bearer API key
    #[serde(default)]
    pub api_key: String,
    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Request timeout for curriculum generation in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
    /// Request timeout for feedback generation in seconds
    #[serde(default = "default_feedback_timeout")]
    pub feedback_timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: String::new(),
            model: default_llm_model(),
            timeout_seconds: default_llm_timeout(),
            feedback_timeout_seconds: default_feedback_timeout(),
        }
    }
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_feedback_timeout() -> u64 {
    10
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration.
    /// Invalid YAML is reported with its line and column.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Recognised variables:
    /// - CHUB_SERVER_HOST, CHUB_SERVER_PORT, CHUB_SERVER_CORS_ORIGIN,
    ///   CHUB_SERVER_TRUST_PROXY_HEADERS
    /// - CHUB_DATABASE_DRIVER, CHUB_DATABASE_URL
    /// - CHUB_CACHE_TTL_SECONDS, CHUB_CACHE_MAX_CAPACITY
    /// - CHUB_AUTH_JWT_SECRET, CHUB_AUTH_TOKEN_EXPIRATION_HOURS
    /// - CHUB_LLM_ENDPOINT, CHUB_LLM_API_KEY, CHUB_LLM_MODEL, CHUB_LLM_TIMEOUT_SECONDS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("CHUB_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("CHUB_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("CHUB_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(trust) = std::env::var("CHUB_SERVER_TRUST_PROXY_HEADERS") {
            if let Ok(trust) = trust.parse::<bool>() {
                self.server.trust_proxy_headers = trust;
            }
        }

        // Database configuration
        if let Ok(driver) = std::env::var("CHUB_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("CHUB_DATABASE_URL") {
            self.database.url = url;
        }

        // Cache configuration
        if let Ok(ttl) = std::env::var("CHUB_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }
        if let Ok(capacity) = std::env::var("CHUB_CACHE_MAX_CAPACITY") {
            if let Ok(capacity) = capacity.parse::<u64>() {
                self.cache.max_capacity = capacity;
            }
        }

        // Auth configuration
        if let Ok(secret) = std::env::var("CHUB_AUTH_JWT_SECRET") {
            if !secret.is_empty() {
                self.auth.jwt_secret = secret;
            }
        }
        if let Ok(hours) = std::env::var("CHUB_AUTH_TOKEN_EXPIRATION_HOURS") {
            if let Ok(hours) = hours.parse::<i64>() {
                if hours > 0 {
                    self.auth.token_expiration_hours = hours;
                }
            }
        }

        // LLM configuration
        if let Ok(endpoint) = std::env::var("CHUB_LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Ok(api_key) = std::env::var("CHUB_LLM_API_KEY") {
            self.llm.api_key = api_key;
        }
        if let Ok(model) = std::env::var("CHUB_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(timeout) = std::env::var("CHUB_LLM_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.llm.timeout_seconds = timeout;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches process environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "CHUB_SERVER_HOST",
    "CHUB_SERVER_PORT",
    "CHUB_SERVER_CORS_ORIGIN",
    "CHUB_SERVER_TRUST_PROXY_HEADERS",
    "CHUB_DATABASE_DRIVER",
    "CHUB_DATABASE_URL",
    "CHUB_CACHE_TTL_SECONDS",
    "CHUB_CACHE_MAX_CAPACITY",
    "CHUB_AUTH_JWT_SECRET",
    "CHUB_AUTH_TOKEN_EXPIRATION_HOURS",
    "CHUB_LLM_ENDPOINT",
    "CHUB_LLM_API_KEY",
    "CHUB_LLM_MODEL",
    "CHUB_LLM_TIMEOUT_SECONDS",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn valid_host_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u8..=255, 0u8..=255, 0u8..=255, 0u8..=255)
                .prop_map(|(a, b, c, d)| format!("{}.{}.{}.{}", a, b, c, d)),
            Just("localhost".to_string()),
            "[a-z][a-z0-9]{0,10}",
        ]
    }

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            valid_host_strategy(),
            1u16..=65535,
            prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)],
            1u64..=86400,
            "[a-zA-Z0-9]{8,32}",
            1i64..=72,
        )
            .prop_map(|(host, port, driver, ttl_seconds, secret, hours)| Config {
                server: ServerConfig {
                    host,
                    port,
                    cors_origin: default_cors_origin(),
                    trust_proxy_headers: false,
                },
                database: DatabaseConfig {
                    driver,
                    url: default_database_url(),
                },
                cache: CacheConfig {
                    ttl_seconds,
                    max_capacity: default_max_capacity(),
                },
                auth: AuthConfig {
                    jwt_secret: secret,
                    token_expiration_hours: hours,
                },
                llm: LlmConfig::default(),
            })
    }

    fn malformed_yaml_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("server:\n  port: not_a_number".to_string()),
            Just("server:\n  port: [1, 2, 3]".to_string()),
            Just("server:\n  port: 99999999999999999999".to_string()),
            Just("cache:\n  ttl_seconds: -100".to_string()),
            Just("database:\n  driver: postgres".to_string()),
            Just("auth:\n  token_expiration_hours: soon".to_string()),
            Just("llm: [not, a, map]".to_string()),
            Just("server: 12345".to_string()),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn config_yaml_roundtrip(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).expect("Failed to serialize config");
            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            let parsed = Config::load(file.path()).expect("Failed to parse config");

            prop_assert_eq!(config.server.host, parsed.server.host);
            prop_assert_eq!(config.server.port, parsed.server.port);
            prop_assert_eq!(config.database.driver, parsed.database.driver);
            prop_assert_eq!(config.cache.ttl_seconds, parsed.cache.ttl_seconds);
            prop_assert_eq!(config.auth.jwt_secret, parsed.auth.jwt_secret);
            prop_assert_eq!(config.auth.token_expiration_hours, parsed.auth.token_expiration_hours);
        }

        #[test]
        fn malformed_config_is_rejected(yaml in malformed_yaml_strategy()) {
            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            prop_assert!(Config::load(file.path()).is_err());
        }

        #[test]
        fn env_port_takes_precedence_over_file(file_port in 1u16..=65535, env_port in 1u16..=65535) {
            let _guard = lock_env();
            super::clear_env();

            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "server:\n  port: {}\n", file_port).expect("Failed to write config");
            std::env::set_var("CHUB_SERVER_PORT", env_port.to_string());

            let config = Config::load_with_env(file.path()).expect("Failed to load config");
            super::clear_env();

            prop_assert_eq!(config.server.port, env_port);
        }
    }
}
