//! Backend API: wire types, trait seams and the reqwest client.

pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::ApiError;

pub use client::ApiClient;
pub use types::{
    Document, ExportFormat, ExportKind, FileEntry, FileTypes, InventoryItem, JobStatus,
    JobStatusResponse, LoginResponse, ProcessFilesRequest, ProcessFilesResponse, SearchRequest,
    SearchResult, User, UserExport,
};

/// Processing job endpoints.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// `POST /process-files`. Non-2xx responses with a JSON body are returned as the
    /// decoded body so the caller can read `error`/`message`.
    async fn submit_job(
        &self,
        request: &ProcessFilesRequest,
    ) -> Result<ProcessFilesResponse, ApiError>;

    /// `GET /processing-status/{task_id}`.
    async fn job_status(&self, task_id: &str) -> Result<JobStatusResponse, ApiError>;
}

/// Catalog listing, reset, search and download endpoints.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn fetch_inventory(&self) -> Result<Vec<InventoryItem>, ApiError>;

    async fn fetch_documents(&self) -> Result<Vec<Document>, ApiError>;

    async fn reset_inventory(&self, table_name: Option<&str>) -> Result<(), ApiError>;

    async fn reset_documents(&self) -> Result<(), ApiError>;

    async fn search_documents(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<SearchResult>, ApiError>;

    async fn download_document(&self, id: i64) -> Result<Vec<u8>, ApiError>;

    async fn export(&self, kind: ExportKind, format: ExportFormat) -> Result<Vec<u8>, ApiError>;
}

/// Sign-in endpoints.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login_email(&self, email: &str) -> Result<LoginResponse, ApiError>;

    async fn login_google(&self, token: &str) -> Result<LoginResponse, ApiError>;

    async fn user_exports(&self, user_id: &str) -> Result<Vec<UserExport>, ApiError>;
}
