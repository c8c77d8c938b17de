use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

const DEFAULT_STEP_DELAY_MS: u64 = 500;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct CourseConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub database: DatabaseConfig,
    pub generation: GenerationConfig,
    pub providers: ProvidersConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Pause between two generation steps.
    pub step_delay: Duration,
}

/// Endpoint and model for one provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub request_timeout: Duration,
    pub gemini: ProviderSettings,
    pub claude: ProviderSettings,
    pub openai: ProviderSettings,
    pub deepseek: ProviderSettings,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            gemini: ProviderSettings {
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.0-flash".to_string(),
            },
            claude: ProviderSettings {
                base_url: "https://api.anthropic.com".to_string(),
                model: "claude-3-haiku-20240307".to_string(),
            },
            openai: ProviderSettings {
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-3.5-turbo".to_string(),
            },
            deepseek: ProviderSettings {
                base_url: "https://api.deepseek.com/v1".to_string(),
                model: "deepseek-chat".to_string(),
            },
        }
    }
}

impl ProvidersConfig {
    /// Point every provider at the same base URL, e.g. a local mock server.
    pub fn with_base_url(base_url: &str) -> Self {
        let mut config = Self::default();
        for settings in [
            &mut config.gemini,
            &mut config.claude,
            &mut config.openai,
            &mut config.deepseek,
        ] {
            settings.base_url = base_url.to_string();
        }
        config
    }
}

impl CourseConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";
        let defaults = ProvidersConfig::default();

        Ok(CourseConfig {
            common: common_config,
            database: DatabaseConfig {
                url: Secret::new(get_env("DATABASE_URL", None, is_prod)?),
                max_connections: get_parsed("DATABASE_MAX_CONNECTIONS", 10, is_prod)?,
                min_connections: get_parsed("DATABASE_MIN_CONNECTIONS", 1, is_prod)?,
            },
            generation: GenerationConfig {
                step_delay: Duration::from_millis(get_parsed(
                    "GENERATION_STEP_DELAY_MS",
                    DEFAULT_STEP_DELAY_MS,
                    is_prod,
                )?),
            },
            providers: ProvidersConfig {
                request_timeout: Duration::from_secs(get_parsed(
                    "PROVIDER_TIMEOUT_SECS",
                    DEFAULT_PROVIDER_TIMEOUT_SECS,
                    is_prod,
                )?),
                gemini: provider_settings("GEMINI", &defaults.gemini, is_prod)?,
                claude: provider_settings("CLAUDE", &defaults.claude, is_prod)?,
                openai: provider_settings("OPENAI", &defaults.openai, is_prod)?,
                deepseek: provider_settings("DEEPSEEK", &defaults.deepseek, is_prod)?,
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
        })
    }
}

fn provider_settings(
    prefix: &str,
    defaults: &ProviderSettings,
    is_prod: bool,
) -> Result<ProviderSettings, AppError> {
    Ok(ProviderSettings {
        base_url: get_env(
            &format!("{}_BASE_URL", prefix),
            Some(&defaults.base_url),
            is_prod,
        )?,
        model: get_env(&format!("{}_MODEL", prefix), Some(&defaults.model), is_prod)?,
    })
}

fn get_parsed<T>(key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr + ToString,
{
    let raw = get_env(key, Some(&default.to_string()), is_prod)?;
    raw.parse().map_err(|_| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, raw))
    })
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deepseek_reuses_openai_shape_on_its_own_endpoint() {
        let config = ProvidersConfig::default();
        assert_eq!(config.deepseek.base_url, "https://api.deepseek.com/v1");
        assert_eq!(config.deepseek.model, "deepseek-chat");
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn with_base_url_overrides_every_provider() {
        let config = ProvidersConfig::with_base_url("http://127.0.0.1:9999");
        assert!([
            &config.gemini,
            &config.claude,
            &config.openai,
            &config.deepseek
        ]
        .iter()
        .all(|s| s.base_url == "http://127.0.0.1:9999"));
        assert_eq!(config.claude.model, "claude-3-haiku-20240307");
    }

    #[test]
    fn missing_required_value_outside_prod_is_an_error() {
        let result = get_env("COURSE_SERVICE_TEST_SURELY_UNSET", None, false);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn default_used_outside_prod() {
        let value = get_env("COURSE_SERVICE_TEST_SURELY_UNSET", Some("fallback"), false).unwrap();
        assert_eq!(value, "fallback");
    }

    #[test]
    fn prod_requires_every_value() {
        let result = get_env("COURSE_SERVICE_TEST_SURELY_UNSET", Some("fallback"), true);
        assert!(result.is_err());
    }
}
