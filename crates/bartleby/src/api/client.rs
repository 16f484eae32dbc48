//! reqwest client for the catalog backend.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::types::{
    Document, EmailLoginRequest, ExportFormat, ExportKind, GoogleLoginRequest, InventoryItem,
    JobStatusResponse, LoginResponse, ProcessFilesRequest, ProcessFilesResponse, ResetRequest,
    SearchRequest, SearchResponse, SearchResult, UserExport,
};
use crate::api::{AuthApi, CatalogApi, JobApi};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::sanitize;

const INVENTORY: &str = "api/inventory";
const INVENTORY_RESET: &str = "api/inventory/reset";
const DOCUMENTS: &str = "api/documents";
const DOCUMENTS_RESET: &str = "api/documents/reset";
const DOCUMENTS_SEARCH: &str = "api/documents/search";
const AUTH_LOGIN: &str = "api/auth/login";
const AUTH_GOOGLE: &str = "api/auth/google";
const USER_EXPORTS: &str = "api/user/exports";
const PROCESS_FILES: &str = "process-files";
const PROCESSING_STATUS: &str = "processing-status";

/// HTTP client for every backend endpoint.
///
/// Cookies set by the backend are kept for the lifetime of the client, so a
/// session established by a login call is sent with later requests.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Client for the API URL of the configured environment.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::with_base_url(config.api_url(), config)
    }

    pub fn with_base_url(base_url: &str, config: &ClientConfig) -> Result<Self, ApiError> {
        let mut url =
            Url::parse(base_url).map_err(|_| ApiError::InvalidUrl(base_url.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(origin) = &config.origin {
            let value = HeaderValue::from_str(origin)
                .map_err(|e| ApiError::Client(format!("invalid origin '{}': {}", origin, e)))?;
            headers.insert(ORIGIN, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .connect_timeout(config.http.connect_timeout())
            .timeout(config.http.request_timeout())
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|_| ApiError::InvalidUrl(format!("{}{}", self.base_url, path)))
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        debug!(endpoint, "Calling backend");
        let response = request.send().await.map_err(|e| ApiError::Transport {
            endpoint: endpoint.to_string(),
            message: e.without_url().to_string(),
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        warn!(
            endpoint,
            status,
            body = %sanitize::truncate_body(&body),
            "Backend returned an error"
        );
        Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status,
            message: backend_message(&body),
        })
    }

    async fn get_value(&self, endpoint: &str) -> Result<Value, ApiError> {
        let url = self.endpoint(endpoint)?;
        let response = self.send(endpoint, self.client.get(url)).await?;
        decode(endpoint, response).await
    }

    async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(endpoint)?;
        let response = self.send(endpoint, self.client.post(url).json(body)).await?;
        let value = decode(endpoint, response).await?;
        from_value(endpoint, value)
    }

    async fn get_bytes(&self, endpoint: &str, url: Url) -> Result<Vec<u8>, ApiError> {
        let response = self.send(endpoint, self.client.get(url)).await?;
        let bytes = response.bytes().await.map_err(|e| ApiError::Transport {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    async fn listing<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>, ApiError> {
        let value = self.get_value(endpoint).await?;
        normalise_listing(endpoint, value)
    }
}

/// Pulls a human-readable message out of an error body: `error` first, then `message`.
pub(crate) fn backend_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "message"].iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    })
}

/// Arrays are used as-is, a single object becomes a one-element list, anything else
/// is an empty list.
fn normalise_listing<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<Vec<T>, ApiError> {
    match value {
        Value::Array(_) => from_value(endpoint, value),
        Value::Object(_) => Ok(vec![from_value(endpoint, value)?]),
        _ => Ok(Vec::new()),
    }
}

async fn decode(endpoint: &str, response: Response) -> Result<Value, ApiError> {
    let text = response.text().await.map_err(|e| ApiError::Transport {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

fn from_value<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl JobApi for ApiClient {
    async fn submit_job(
        &self,
        request: &ProcessFilesRequest,
    ) -> Result<ProcessFilesResponse, ApiError> {
        let url = self.endpoint(PROCESS_FILES)?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                endpoint: PROCESS_FILES.to_string(),
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                body = %sanitize::truncate_body(&body),
                "Job submission failed"
            );
            // Rejections carry `error` or `message`; a `status` field is ignored here.
            return Err(ApiError::Status {
                endpoint: PROCESS_FILES.to_string(),
                status: status.as_u16(),
                message: backend_message(&body),
            });
        }

        serde_json::from_str::<ProcessFilesResponse>(&body).map_err(|e| ApiError::Decode {
            endpoint: PROCESS_FILES.to_string(),
            message: e.to_string(),
        })
    }

    async fn job_status(&self, task_id: &str) -> Result<JobStatusResponse, ApiError> {
        let mut url = self.endpoint(PROCESSING_STATUS)?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(PROCESSING_STATUS.to_string()))?
            .push(task_id);
        let response = self.send(PROCESSING_STATUS, self.client.get(url)).await?;
        let value = decode(PROCESSING_STATUS, response).await?;
        from_value(PROCESSING_STATUS, value)
    }
}

#[async_trait]
impl CatalogApi for ApiClient {
    async fn fetch_inventory(&self) -> Result<Vec<InventoryItem>, ApiError> {
        self.listing(INVENTORY).await
    }

    async fn fetch_documents(&self) -> Result<Vec<Document>, ApiError> {
        self.listing(DOCUMENTS).await
    }

    async fn reset_inventory(&self, table_name: Option<&str>) -> Result<(), ApiError> {
        let _: Value = self
            .post_json(INVENTORY_RESET, &ResetRequest { table_name })
            .await?;
        Ok(())
    }

    async fn reset_documents(&self) -> Result<(), ApiError> {
        let _: Value = self
            .post_json(DOCUMENTS_RESET, &ResetRequest::default())
            .await?;
        Ok(())
    }

    async fn search_documents(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let response: SearchResponse = self.post_json(DOCUMENTS_SEARCH, request).await?;
        Ok(response.results.unwrap_or_default())
    }

    async fn download_document(&self, id: i64) -> Result<Vec<u8>, ApiError> {
        let mut url = self.endpoint(DOCUMENTS)?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(DOCUMENTS.to_string()))?
            .push(&id.to_string())
            .push("file");
        self.get_bytes(DOCUMENTS, url).await
    }

    async fn export(&self, kind: ExportKind, format: ExportFormat) -> Result<Vec<u8>, ApiError> {
        let endpoint = kind.endpoint();
        let mut url = self.endpoint(endpoint)?;
        url.query_pairs_mut()
            .append_pair("format", &format.to_string());
        self.get_bytes(endpoint, url).await
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login_email(&self, email: &str) -> Result<LoginResponse, ApiError> {
        self.post_json(AUTH_LOGIN, &EmailLoginRequest { email }).await
    }

    async fn login_google(&self, token: &str) -> Result<LoginResponse, ApiError> {
        self.post_json(AUTH_GOOGLE, &GoogleLoginRequest { token })
            .await
    }

    async fn user_exports(&self, user_id: &str) -> Result<Vec<UserExport>, ApiError> {
        let mut url = self.endpoint(USER_EXPORTS)?;
        url.query_pairs_mut().append_pair("user_id", user_id);
        let response = self.send(USER_EXPORTS, self.client.get(url)).await?;
        let value = decode(USER_EXPORTS, response).await?;
        normalise_listing(USER_EXPORTS, value)
    }
}
