use std::path::Path;

use reqwest::Url;

use crate::config::schema::ClientConfig;
use crate::error::ConfigError;

/// Selects development or production.
pub const ENV_ENVIRONMENT: &str = "BARTLEBY_ENV";
pub const ENV_BACKEND_URL_DEV: &str = "BARTLEBY_BACKEND_URL_DEV";
pub const ENV_BACKEND_URL: &str = "BARTLEBY_BACKEND_URL";
pub const ENV_ORIGIN: &str = "BARTLEBY_ORIGIN";
pub const ENV_BLOB_URL: &str = "BARTLEBY_BLOB_URL";
pub const ENV_GOOGLE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Builds a configuration from defaults plus process environment variables.
pub fn config_from_env() -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config)?;
    Ok(config)
}

/// Applies environment overrides read through `lookup`. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut ClientConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(env) = get(ENV_ENVIRONMENT) {
        config.environment = env.parse()?;
    }
    if let Some(url) = get(ENV_BACKEND_URL_DEV) {
        config.environments.development.api_url = url;
    }
    if let Some(url) = get(ENV_BACKEND_URL) {
        config.environments.production.api_url = url;
    }
    if let Some(origin) = get(ENV_ORIGIN) {
        config.origin = Some(origin);
    }
    if let Some(url) = get(ENV_BLOB_URL) {
        config.blob.base_url = url;
    }
    if let Some(client_id) = get(ENV_GOOGLE_CLIENT_ID) {
        config.google_client_id = Some(client_id);
    }

    Ok(())
}

fn validate_config(config: &ClientConfig) -> Result<(), ConfigError> {
    validate_url("environments.development.api_url", &config.environments.development.api_url)?;
    validate_url("environments.production.api_url", &config.environments.production.api_url)?;
    validate_url("blob.base_url", &config.blob.base_url)?;

    let poll = &config.poll;
    if poll.initial_interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "poll.initial_interval_ms must be greater than zero".to_string(),
        });
    }
    if !(poll.multiplier >= 1.0 && poll.multiplier.is_finite()) {
        return Err(ConfigError::Validation {
            message: format!("poll.multiplier must be at least 1.0, got {}", poll.multiplier),
        });
    }
    if poll.max_interval_ms < poll.initial_interval_ms {
        return Err(ConfigError::Validation {
            message: "poll.max_interval_ms must not be below poll.initial_interval_ms".to_string(),
        });
    }
    if poll.max_attempts == Some(0) {
        return Err(ConfigError::Validation {
            message: "poll.max_attempts must be greater than zero".to_string(),
        });
    }

    Ok(())
}

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::Validation {
        message: format!("{} is not a valid URL ('{}'): {}", field, value, e),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation {
            message: format!("{} must use http or https, got '{}'", field, url.scheme()),
        });
    }
    Ok(())
}
