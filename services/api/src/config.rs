use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported completion-service providers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    OpenRouter,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub auth_token: String,
    pub provider: ProviderKind,
    pub openai_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub referer: String,
    pub title: String,
    pub log_level: Level,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let auth_token = std::env::var("AUTH_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("AUTH_TOKEN".to_string()))?;

        let provider_str =
            std::env::var("AI_PROVIDER").unwrap_or_else(|_| "openrouter".to_string());
        let provider = match provider_str.trim().to_lowercase().as_str() {
            "openai" => ProviderKind::OpenAi,
            _ => ProviderKind::OpenRouter,
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let openrouter_api_key = std::env::var("OPENROUTER_API_KEY").ok();

        match provider {
            ProviderKind::OpenAi => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            ProviderKind::OpenRouter => {
                if openrouter_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENROUTER_API_KEY must be set for 'openrouter' provider".to_string(),
                    ));
                }
            }
        }

        let default_model = match provider {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::OpenRouter => "meta-llama/llama-3-8b-instruct",
        };
        let model = std::env::var("AI_MODEL")
            .ok()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_model.to_string());

        let temperature = parse_var("AI_TEMPERATURE", 0.1f32)?;
        let max_tokens = parse_var("AI_MAX_TOKENS", 1500u32)?;
        let timeout = Duration::from_secs(parse_var("AI_TIMEOUT_SECS", 25u64)?);

        let referer =
            std::env::var("APP_REFERER").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let title = std::env::var("APP_TITLE").unwrap_or_else(|_| "Assistant".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            auth_token,
            provider,
            openai_api_key,
            openrouter_api_key,
            model,
            temperature,
            max_tokens,
            timeout,
            referer,
            title,
            log_level,
        })
    }
}
