//! Builders for test data.

#![allow(dead_code)]

use std::time::Duration;

use bartleby::config::{ClientConfig, Environment, PollConfig};
use bartleby::upload::FileSource;
use bartleby::SelectedFile;

/// Builder for `ClientConfig` pointed at a mock backend.
pub struct ConfigBuilder {
    config: ClientConfig,
}

impl ConfigBuilder {
    pub fn new(server_uri: &str) -> Self {
        let mut config = ClientConfig::default();
        config.environment = Environment::Development;
        config.environments.development.api_url = server_uri.to_string();
        config.blob.base_url = format!("{}/blob", server_uri);
        config.blob.token = Some("test-blob-token".to_string());
        config.blob.token_env = None;
        config.origin = Some("https://bartleby.test".to_string());
        Self { config }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll = PollConfig {
            initial_interval_ms: interval.as_millis() as u64,
            multiplier: 1.0,
            max_interval_ms: interval.as_millis() as u64,
            max_attempts: None,
            max_duration_secs: Some(30),
        };
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.poll.max_attempts = Some(attempts);
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// An in-memory file of the given type and size.
pub fn file(name: &str, mime_type: &str, size: usize) -> SelectedFile {
    SelectedFile::from_bytes(name, mime_type, vec![0u8; size])
}

/// A file whose declared size is `size` bytes but whose contents are never read.
pub fn declared_file(name: &str, mime_type: &str, size: u64) -> SelectedFile {
    SelectedFile::new(name, mime_type, size, FileSource::Path(name.into()))
}

/// `count` small PNG images.
pub fn images(count: usize) -> Vec<SelectedFile> {
    (0..count)
        .map(|i| file(&format!("photo-{}.png", i), "image/png", 16))
        .collect()
}

/// One image and one document.
pub fn mixed_batch() -> Vec<SelectedFile> {
    vec![
        file("teapot.jpg", "image/jpeg", 64),
        file("appraisal.pdf", "application/pdf", 128),
    ]
}
