//! Concurrent upload of a validated batch to object storage.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, Instrument};

use crate::config::ClientConfig;
use crate::error::UploadError;
use crate::sanitize;
use crate::upload::validator::{FileKind, SelectedFile};

/// A file that made it into object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileRef {
    pub original_name: String,
    pub blob_url: String,
    pub file_type: FileKind,
}

/// Object storage response for a stored blob.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredBlob {
    pub url: String,
    #[serde(default)]
    pub pathname: Option<String>,
}

/// Object storage seam.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `pathname` with public-read access.
    async fn put(
        &self,
        pathname: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredBlob, UploadError>;
}

/// Blob store speaking the bearer-token PUT protocol of the hosted blob service.
pub struct HttpBlobStore {
    client: Client,
    base_url: Url,
    token: SecretString,
}

impl HttpBlobStore {
    pub fn new(
        base_url: &str,
        token: SecretString,
        config: &ClientConfig,
    ) -> Result<Self, UploadError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| UploadError::Client(format!("invalid blob URL '{}': {}", base_url, e)))?;
        let client = Client::builder()
            .connect_timeout(config.http.connect_timeout())
            .timeout(config.http.upload_timeout())
            .build()
            .map_err(|e| UploadError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Builds the store from configuration, resolving the token through the secret sources.
    pub fn from_config(config: &ClientConfig) -> crate::error::Result<Self> {
        let blob = &config.blob;
        let token = crate::secrets::resolve_secret(
            blob.token.as_deref(),
            blob.token_file.as_deref(),
            blob.token_env.as_deref(),
        )?;
        Ok(Self::new(&blob.base_url, token, config)?)
    }

    fn object_url(&self, pathname: &str) -> Result<Url, UploadError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UploadError::Client(format!("'{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push(pathname);
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(
        &self,
        pathname: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredBlob, UploadError> {
        let url = self.object_url(pathname)?;
        debug!(url = %sanitize::redact_url(url.as_str()), size = bytes.len(), "Uploading blob");

        let response = self
            .client
            .put(url)
            .bearer_auth(self.token.expose_secret())
            .header("x-content-type", mime_type)
            .header("x-access", "public")
            .body(bytes)
            .send()
            .await
            .map_err(|e| UploadError::Request {
                name: pathname.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                name: pathname.to_string(),
                status,
                body: sanitize::truncate_body(&body),
            });
        }

        response
            .json::<StoredBlob>()
            .await
            .map_err(|e| UploadError::Request {
                name: pathname.to_string(),
                message: format!("invalid blob response: {}", e),
            })
    }
}

/// Uploads every file of a batch concurrently. All or nothing.
#[derive(Clone)]
pub struct BlobUploader {
    store: Arc<dyn BlobStore>,
}

impl BlobUploader {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Returns one reference per input file, in input order.
    ///
    /// The first failure cancels the remaining uploads and fails the batch; URLs of
    /// files that were already stored are discarded.
    pub async fn upload_all(
        &self,
        files: &[SelectedFile],
    ) -> Result<Vec<UploadedFileRef>, UploadError> {
        info!(count = files.len(), "Uploading batch");
        let uploads = files.iter().map(|file| {
            let span = info_span!("upload_file", name = %file.name, size = file.size_bytes);
            self.upload_one(file).instrument(span)
        });
        let refs = try_join_all(uploads).await?;
        info!(count = refs.len(), "Batch uploaded");
        Ok(refs)
    }

    async fn upload_one(&self, file: &SelectedFile) -> Result<UploadedFileRef, UploadError> {
        let bytes = file
            .read_bytes()
            .await
            .map_err(|e| UploadError::ReadFile {
                name: file.name.clone(),
                source: e,
            })?;

        let stored = self.store.put(&file.name, &file.mime_type, bytes).await?;
        if stored.url.trim().is_empty() {
            return Err(UploadError::MissingUrl {
                name: file.name.clone(),
            });
        }

        Ok(UploadedFileRef {
            original_name: file.name.clone(),
            blob_url: stored.url,
            file_type: file.kind(),
        })
    }
}
