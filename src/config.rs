//! Configuration management for the Bookworm client

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Backend origin, e.g. `http://127.0.0.1:8000` (paths start with `/api/`)
    pub base_url: String,
    /// Whole-request timeout applied by the transport
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub page_size: usize,
    /// Minimum search length before suggestions are requested
    pub suggest_min_chars: usize,
    pub suggest_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationsConfig {
    pub page_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UsersConfig {
    pub page_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub reservations: ReservationsConfig,
    #[serde(default)]
    pub users: UsersConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Environment variables with prefix BOOKWORM_, e.g. BOOKWORM_API__BASE_URL
            .add_source(
                Environment::with_prefix("BOOKWORM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("api.base_url", env::var("BOOKWORM_API_URL").ok())?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            page_size: 12,
            suggest_min_chars: 3,
            suggest_limit: 5,
        }
    }
}

impl Default for ReservationsConfig {
    fn default() -> Self {
        Self { page_size: 15 }
    }
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_screen_page_sizes() {
        let config = AppConfig::default();
        assert_eq!(config.catalog.page_size, 12);
        assert_eq!(config.reservations.page_size, 15);
        assert_eq!(config.users.page_size, 10);
    }
}
