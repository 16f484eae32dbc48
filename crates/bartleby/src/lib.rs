pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod upload;

pub use api::{ApiClient, AuthApi, CatalogApi, JobApi};
pub use auth::{AuthSession, UserStore};
pub use catalog::{CatalogSnapshot, CatalogStore, ConfirmPrompt, ExportFile, ResetOutcome};
pub use config::{config_from_env, load_config, ClientConfig, Environment};
pub use error::{
    ApiError, AuthError, BartlebyError, ConfigError, PollError, Result, SubmissionError,
    UploadError, ValidationError,
};
pub use logging::{init_tracing, LogFormat};
pub use pipeline::{
    BroadcastProgress, PollGuard, PollPolicy, ProgressEvent, ProgressReporter, StatusPoller,
    UploadPipeline, ViewState,
};
pub use secrets::{resolve_secret, SecretError};
pub use upload::{
    validate_batch, BatchSummary, BlobUploader, HttpBlobStore, SelectedFile, UploadedFileRef,
};
