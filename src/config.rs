//! Configuration management for NeuroNest.
//!
//! Loads configuration from environment variables (and `.env` when present)
//! once at startup. The resulting `Config` is immutable; services receive
//! the sections they need as explicit constructor arguments.

use std::env;
use std::sync::OnceLock;
use std::time::Duration;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub augmentation: AugmentationConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for uploaded files; attachments live under `attachments/`.
    pub uploads_path: String,
    pub max_attachment_size: usize,
    pub max_request_body: usize,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 secret used to verify access tokens.
    pub jwt_secret: String,
}

/// Wire format spoken by the augmentation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Yandex,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "yandex" | "yandexgpt" => Ok(Self::Yandex),
            _ => Err(format!("Unknown augmentation provider: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AugmentationConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Yandex folder (catalog) id; ignored by OpenAI-compatible providers.
    pub catalog_id: Option<String>,
    pub embedding_model: String,
    pub summary_model: String,
    pub timeout: Duration,
}

impl AugmentationConfig {
    /// Build a config for `provider` with its default endpoint and models.
    pub fn with_defaults(provider: ProviderKind) -> Self {
        Self {
            provider,
            base_url: default_endpoint(provider).to_string(),
            api_key: None,
            catalog_id: None,
            embedding_model: default_embedding_model(provider).to_string(),
            summary_model: default_summary_model(provider).to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Get default endpoint for a provider
pub fn default_endpoint(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::OpenAi => "https://api.openai.com/v1",
        ProviderKind::Yandex => "https://llm.api.cloud.yandex.net/foundationModels/v1",
    }
}

/// Get default embedding model for a provider
pub fn default_embedding_model(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::OpenAi => "text-embedding-3-small",
        ProviderKind::Yandex => "text-search-query",
    }
}

/// Get default completion model for a provider
pub fn default_summary_model(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::OpenAi => "gpt-4o-mini",
        ProviderKind::Yandex => "yandexgpt",
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: env_or("PORT", "8080").parse().unwrap_or(8080),
                public_url: env_or("PUBLIC_URL", "http://localhost:8080"),
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/neuronest.db"),
            },
            storage: StorageConfig {
                uploads_path: env_or("UPLOADS_PATH", "./uploads"),
                max_attachment_size: env_or("MAX_ATTACHMENT_SIZE", "10485760")
                    .parse()
                    .unwrap_or(10 * 1024 * 1024), // 10MB
                max_request_body: env_or("MAX_REQUEST_BODY", "52428800")
                    .parse()
                    .unwrap_or(50 * 1024 * 1024), // 50MB
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| {
                    tracing::warn!("JWT_SECRET not set, generated a random secret");
                    nanoid::nanoid!(32)
                }),
            },
            augmentation: Self::parse_augmentation_config(),
        }
    }

    /// Parse the augmentation provider settings.
    ///
    /// `IAM_TOKEN` is accepted as an alias for `AUGMENTATION_API_KEY` so
    /// existing Yandex Cloud deployments keep working.
    fn parse_augmentation_config() -> AugmentationConfig {
        let provider = env::var("AUGMENTATION_PROVIDER")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(ProviderKind::OpenAi);

        let defaults = AugmentationConfig::with_defaults(provider);

        AugmentationConfig {
            provider,
            base_url: env::var("AUGMENTATION_BASE_URL").unwrap_or(defaults.base_url),
            api_key: env::var("AUGMENTATION_API_KEY")
                .or_else(|_| env::var("IAM_TOKEN"))
                .ok()
                .filter(|k| !k.is_empty()),
            catalog_id: env::var("CATALOG_ID").ok().filter(|c| !c.is_empty()),
            embedding_model: env::var("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            summary_model: env::var("SUMMARY_MODEL").unwrap_or(defaults.summary_model),
            timeout: Duration::from_secs(
                env_or("AUGMENTATION_TIMEOUT_SECS", "30").parse().unwrap_or(30),
            ),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("YANDEX".parse::<ProviderKind>().unwrap(), ProviderKind::Yandex);
        assert_eq!("yandexgpt".parse::<ProviderKind>().unwrap(), ProviderKind::Yandex);
        assert!("gemini".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_defaults_follow_provider() {
        let cfg = AugmentationConfig::with_defaults(ProviderKind::Yandex);
        assert!(cfg.base_url.contains("yandex"));
        assert_eq!(cfg.summary_model, "yandexgpt");
        assert_eq!(cfg.timeout, Duration::from_secs(30));
    }
}
