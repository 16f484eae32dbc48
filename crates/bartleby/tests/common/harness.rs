//! Test harness for running the client against a mock backend.
//!
//! One `MockServer` plays both the catalog API and blob storage (under `/blob`).

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bartleby::pipeline::PollPolicy;
use bartleby::{ApiClient, CatalogStore, ClientConfig, HttpBlobStore, UploadPipeline};

use super::builders::ConfigBuilder;

pub struct TestHarness {
    pub server: MockServer,
    pub config: ClientConfig,
    pub api: Arc<ApiClient>,
    pub catalog: Arc<CatalogStore>,
}

impl TestHarness {
    /// Starts a mock backend polled every 20ms.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let config = ConfigBuilder::new(&server.uri())
            .poll_interval(Duration::from_millis(20))
            .build();
        Self::with_config(server, config)
    }

    pub fn with_config(server: MockServer, config: ClientConfig) -> Self {
        let api = Arc::new(ApiClient::new(&config).expect("api client"));
        let catalog = Arc::new(CatalogStore::new(api.clone()));
        Self {
            server,
            config,
            api,
            catalog,
        }
    }

    pub fn pipeline(&self) -> UploadPipeline {
        let blob_store = HttpBlobStore::from_config(&self.config).expect("blob store");
        UploadPipeline::from_parts(
            Arc::new(blob_store),
            self.api.clone(),
            self.catalog.clone(),
            PollPolicy::from_config(&self.config.poll),
        )
    }

    /// Blob storage answering every PUT with a URL derived from the path.
    pub async fn mount_blob_storage(&self) {
        Mock::given(method("PUT"))
            .and(path_regex(r"^/blob/.+"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "url": "https://store.test/object",
                "pathname": "object"
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_submission(&self, task_id: &str) {
        Mock::given(method("POST"))
            .and(path("/process-files"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success", "task_id": task_id})),
            )
            .mount(&self.server)
            .await;
    }

    /// Serves `body` for the next status request only.
    pub async fn mount_status_once(&self, task_id: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/processing-status/{}", task_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_listings(&self, inventory: Value, documents: Value) {
        Mock::given(method("GET"))
            .and(path("/api/inventory"))
            .respond_with(ResponseTemplate::new(200).set_body_json(inventory))
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(documents))
            .mount(&self.server)
            .await;
    }

    /// Number of requests the backend has seen for `url_path`.
    pub async fn requests_to(&self, url_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == url_path)
            .count()
    }

    pub async fn total_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .len()
    }
}
