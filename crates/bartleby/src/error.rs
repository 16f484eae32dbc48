use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum BartlebyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Polling error: {0}")]
    Poll(#[from] PollError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("Files are already being processed")]
    Busy,
}

impl BartlebyError {
    /// The message shown to the user, without the category prefix.
    pub fn user_message(&self) -> String {
        match self {
            BartlebyError::Config(e) => e.to_string(),
            BartlebyError::Validation(e) => e.to_string(),
            BartlebyError::Upload(e) => e.to_string(),
            BartlebyError::Submission(e) => e.to_string(),
            BartlebyError::Poll(e) => e.to_string(),
            BartlebyError::Api(e) => e.to_string(),
            BartlebyError::Auth(e) => e.to_string(),
            BartlebyError::Secret(e) => e.to_string(),
            BartlebyError::Busy => self.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Unknown environment '{0}' (expected 'development' or 'production')")]
    UnknownEnvironment(String),
}

/// Client-side rejections raised before any network activity.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Maximum {max} files allowed at once")]
    TooManyFiles { count: usize, max: usize },

    #[error("Invalid file type(s): {}", .files.join(", "))]
    InvalidType { files: Vec<String> },

    #[error("Files exceeding {max_mib}MB: {}", .files.join(", "))]
    FileTooLarge { files: Vec<String>, max_mib: u64 },

    #[error("Failed to read file '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Please select files to process.")]
    NoFilesSelected,

    #[error("Files are still being processed. Please wait before selecting new ones.")]
    RunInProgress,

    #[error("Please enter a search query.")]
    EmptyQuery,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Please enter a valid table name")]
    InvalidTableName,
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to read '{name}' for upload: {source}")]
    ReadFile {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload of '{name}' failed: {message}")]
    Request { name: String, message: String },

    #[error("Blob storage rejected '{name}' ({status}): {body}")]
    Rejected {
        name: String,
        status: u16,
        body: String,
    },

    #[error("Blob storage returned no URL for '{name}'")]
    MissingUrl { name: String },

    #[error("Failed to create blob storage client: {0}")]
    Client(String),
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("{0}")]
    Rejected(String),

    #[error("Network error while submitting files: {0}")]
    Transport(String),

    #[error("The server accepted the files but returned no task id")]
    MissingTaskId,
}

#[derive(Error, Debug)]
pub enum PollError {
    #[error("An error occurred during processing.")]
    JobFailed {
        task_id: String,
        message: Option<String>,
    },

    #[error("An error occurred while getting processing status.")]
    Query { task_id: String, message: String },

    #[error("Processing did not finish after {attempts} status checks ({elapsed:?})")]
    Timeout {
        task_id: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("Status polling was cancelled")]
    Cancelled { task_id: String },
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{endpoint} returned {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Status {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },

    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("Invalid API URL '{0}'")]
    InvalidUrl(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl ApiError {
    /// Message reported by the backend in an error body, if any.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Failed to access user file '{path}': {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode user: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BartlebyError>;
