use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_DEVELOPMENT_URL: &str = "http://localhost:10000";
pub const DEFAULT_PRODUCTION_URL: &str = "https://instantory.onrender.com";
pub const DEFAULT_BLOB_URL: &str = "https://blob.vercel-storage.com";
pub const DEFAULT_BLOB_TOKEN_ENV: &str = "BLOB_READ_WRITE_TOKEN";

/// Client configuration. Built once at start-up and shared read-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub environments: EnvironmentsConfig,
    /// Value of the `Origin` header sent with API requests.
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub blob: BlobConfig,
    #[serde(default)]
    pub google_client_id: Option<String>,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// Where the signed-in user is remembered. Defaults to the platform config dir.
    #[serde(default)]
    pub user_store: Option<PathBuf>,
}

impl ClientConfig {
    /// Base URL of the catalog API for the selected environment.
    pub fn api_url(&self) -> &str {
        match self.environment {
            Environment::Development => &self.environments.development.api_url,
            Environment::Production => &self.environments.production.api_url,
        }
    }

    pub fn user_store_path(&self) -> Option<PathBuf> {
        self.user_store
            .clone()
            .or_else(|| dirs::config_dir().map(|d| d.join("bartleby").join("user.json")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentsConfig {
    #[serde(default = "default_development")]
    pub development: EndpointConfig,
    #[serde(default = "default_production")]
    pub production: EndpointConfig,
}

impl Default for EnvironmentsConfig {
    fn default() -> Self {
        Self {
            development: default_development(),
            production: default_production(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub api_url: String,
}

fn default_development() -> EndpointConfig {
    EndpointConfig {
        api_url: DEFAULT_DEVELOPMENT_URL.to_string(),
    }
}

fn default_production() -> EndpointConfig {
    EndpointConfig {
        api_url: DEFAULT_PRODUCTION_URL.to_string(),
    }
}

/// Object storage settings. The token itself is resolved through [`crate::secrets`].
#[derive(Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    #[serde(default = "default_blob_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default = "default_blob_token_env")]
    pub token_env: Option<String>,
}

impl fmt::Debug for BlobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("token_file", &self.token_file)
            .field("token_env", &self.token_env)
            .finish()
    }
}

fn default_blob_url() -> String {
    DEFAULT_BLOB_URL.to_string()
}

fn default_blob_token_env() -> Option<String> {
    Some(DEFAULT_BLOB_TOKEN_ENV.to_string())
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            base_url: default_blob_url(),
            token: None,
            token_file: None,
            token_env: default_blob_token_env(),
        }
    }
}

/// Status polling cadence and ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: Option<u64>,
}

fn default_initial_interval_ms() -> u64 {
    2_000
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_max_interval_ms() -> u64 {
    10_000
}

fn default_max_duration_secs() -> Option<u64> {
    Some(30 * 60)
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            multiplier: default_multiplier(),
            max_interval_ms: default_max_interval_ms(),
            max_attempts: None,
            max_duration_secs: default_max_duration_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Blob uploads carry up to 25 MiB each and get a longer budget.
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_upload_timeout_secs() -> u64 {
    300
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            upload_timeout_secs: default_upload_timeout_secs(),
        }
    }
}
