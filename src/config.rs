//! Application configuration.
//!
//! Values are resolved with priority: config.toml > environment (.env) > default.
//! The only value without a default is the gateway API key; startup fails
//! with [`ConfigError::MissingCredential`] when it is absent.

use serde::Deserialize;
use std::time::Duration;

use crate::error::ConfigError;

// ==================== Defaults ====================

/// Server address to bind to
pub const SERVER_ADDR: &str = "0.0.0.0";

/// Server port
pub const SERVER_PORT: u16 = 3000;

/// Gemini REST endpoint (v1beta generateContent)
pub const GATEWAY_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for classroom conversation
pub const CHAT_MODEL: &str = "gemini-3-flash-preview";

/// Model used for exam generation
pub const EXAM_MODEL: &str = "gemini-3-pro-preview";

/// Per-request timeout for gateway calls
pub const GATEWAY_TIMEOUT_SECS: u64 = 90;

/// How often a locked timetable is compared against the wall clock
pub const SCHEDULER_TICK_SECS: u64 = 60;

/// Exam length: 20 minutes
pub const EXAM_DURATION_SECS: u32 = 1200;

/// Largest accepted lesson image upload request (all files together)
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Environment variable holding the gateway credential
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Legacy name for the credential, still honoured
pub const API_KEY_ENV_FALLBACK: &str = "API_KEY";

/// Default config file location
pub const CONFIG_FILE: &str = "config.toml";

// ==================== Resolved configuration ====================

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub exam_model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub server_addr: String,
    pub server_port: u16,
    pub scheduler_tick: Duration,
    pub exam_duration_secs: u32,
}

impl Config {
    /// Load from `config.toml` (if present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| CONFIG_FILE.to_string());
        let contents = std::fs::read_to_string(&path).ok();
        if contents.is_some() {
            tracing::info!("Using configuration from {}", path);
        }

        Self::from_sources(contents.as_deref(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from an optional TOML document and an env lookup.
    pub fn from_sources(
        toml_contents: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file: FileConfig = match toml_contents {
            Some(contents) => toml::from_str(contents)
                .map_err(|e| ConfigError::Invalid(format!("config.toml: {}", e)))?,
            None => FileConfig::default(),
        };
        let gateway_file = file.gateway.unwrap_or_default();
        let server_file = file.server.unwrap_or_default();
        let schedule_file = file.schedule.unwrap_or_default();
        let exam_file = file.exam.unwrap_or_default();

        let api_key = gateway_file
            .api_key
            .or_else(|| env(API_KEY_ENV))
            .or_else(|| env(API_KEY_ENV_FALLBACK))
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingCredential(API_KEY_ENV))?;

        let base_url = gateway_file
            .base_url
            .or_else(|| env("GEMINI_BASE_URL"))
            .unwrap_or_else(|| GATEWAY_BASE_URL.to_string());

        let server_port = match server_file.port {
            Some(port) => port,
            None => parse_env(&env, "PORT")?.unwrap_or(SERVER_PORT),
        };

        let tick_secs = match schedule_file.tick_secs {
            Some(secs) => secs,
            None => parse_env(&env, "SCHEDULER_TICK_SECS")?.unwrap_or(SCHEDULER_TICK_SECS),
        };
        if tick_secs == 0 {
            return Err(ConfigError::Invalid("scheduler tick must be at least 1 second".into()));
        }

        let exam_duration_secs = match exam_file.duration_secs {
            Some(secs) => secs,
            None => parse_env(&env, "EXAM_DURATION_SECS")?.unwrap_or(EXAM_DURATION_SECS),
        };
        if exam_duration_secs == 0 {
            return Err(ConfigError::Invalid("exam duration must be at least 1 second".into()));
        }

        Ok(Self {
            gateway: GatewayConfig {
                api_key,
                base_url: base_url.trim_end_matches('/').to_string(),
                chat_model: gateway_file.chat_model.unwrap_or_else(|| CHAT_MODEL.to_string()),
                exam_model: gateway_file.exam_model.unwrap_or_else(|| EXAM_MODEL.to_string()),
                timeout: Duration::from_secs(
                    gateway_file.timeout_secs.unwrap_or(GATEWAY_TIMEOUT_SECS),
                ),
            },
            server_addr: server_file
                .addr
                .or_else(|| env("SERVER_ADDR"))
                .unwrap_or_else(|| SERVER_ADDR.to_string()),
            server_port,
            scheduler_tick: Duration::from_secs(tick_secs),
            exam_duration_secs,
        })
    }

    /// Get the full server bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_addr, self.server_port)
    }
}

fn parse_env<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid(format!("{}={} is not a valid number", key, raw)))
        })
        .transpose()
}

// ==================== config.toml structure ====================

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    gateway: Option<GatewayFile>,
    server: Option<ServerFile>,
    schedule: Option<ScheduleFile>,
    exam: Option<ExamFile>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayFile {
    api_key: Option<String>,
    base_url: Option<String>,
    chat_model: Option<String>,
    exam_model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerFile {
    addr: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct ScheduleFile {
    tick_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ExamFile {
    duration_secs: Option<u32>,
}
