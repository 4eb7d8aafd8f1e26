use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::Client;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::domain::event::{HecEvent, Payload};
use crate::error::StorageError;
use crate::storage::StorageBackend;

/// Wire client for one object write; injectable so tests run without a real
/// object store.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError>;
}

pub struct HttpObjectClient {
    client: Client,
    base_url: String,
}

impl HttpObjectClient {
    pub fn connect(conf: &StorageConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(conf.request_timeout_ms))
            .build()
            .map_err(|e| {
                StorageError::RequestFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(HttpObjectClient {
            client,
            base_url: conf.url.trim_end_matches('/').to_string(),
        })
    }

    fn classify_reqwest_error(error: reqwest::Error) -> StorageError {
        if error.is_timeout() {
            warn!("Storage request timeout: {}", error);
            return StorageError::Timeout;
        }

        warn!("Storage request error: {}", error);
        StorageError::RequestFailed(error.to_string())
    }
}

#[async_trait]
impl ObjectClient for HttpObjectClient {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let response = self
            .client
            .put(format!("{}/{}", self.base_url, key))
            .header("Content-Type", "application/gzip")
            .body(body)
            .send()
            .await
            .map_err(Self::classify_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response body".to_string());

        Err(StorageError::HttpStatusError {
            status: status.as_u16(),
            body,
        })
    }
}

/// Object-storage backend: each call writes the gzip-compressed,
/// newline-joined payloads of one batch under a UTC-partitioned key with a
/// random unique suffix, so concurrent invocations never collide.
pub struct ObjectStorage {
    client: Arc<dyn ObjectClient>,
    key_prefix: String,
}

impl ObjectStorage {
    pub fn connect(conf: &StorageConfig) -> Result<Self, StorageError> {
        let client = Arc::new(HttpObjectClient::connect(conf)?);
        Ok(Self::with_client(client, conf.key_prefix.clone()))
    }

    // DI-friendly constructor for tests or alternative object stores
    pub fn with_client(client: Arc<dyn ObjectClient>, key_prefix: String) -> Self {
        ObjectStorage {
            client,
            key_prefix: key_prefix.trim_matches('/').to_string(),
        }
    }

    /// Payloads are written verbatim for text, JSON-encoded for structured
    /// values, one per line, gzipped as a whole.
    fn encode_batch(batch: &[HecEvent]) -> Result<Vec<u8>, StorageError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());

        for event in batch {
            match &event.payload {
                Payload::Text(text) => encoder
                    .write_all(text.as_bytes())
                    .map_err(|e| StorageError::SerializationFailed(e.to_string()))?,
                Payload::Json(value) => {
                    let encoded = serde_json::to_vec(value)
                        .map_err(|e| StorageError::SerializationFailed(e.to_string()))?;
                    encoder
                        .write_all(&encoded)
                        .map_err(|e| StorageError::SerializationFailed(e.to_string()))?;
                }
            }
            encoder
                .write_all(b"\n")
                .map_err(|e| StorageError::SerializationFailed(e.to_string()))?;
        }

        encoder
            .finish()
            .map_err(|e| StorageError::SerializationFailed(e.to_string()))
    }

    /// `<prefix>/<year>/<month>/<day>/<hour>/<timestamp>-<uuid>.json.gz`
    fn object_key(&self, now: DateTime<Utc>) -> String {
        format!(
            "{}/{}/{:02}/{:02}/{:02}/{}-{}.json.gz",
            self.key_prefix,
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            Uuid::new_v4()
        )
    }
}

#[async_trait]
impl StorageBackend for ObjectStorage {
    async fn store(&self, batch: &[HecEvent]) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }

        let body = Self::encode_batch(batch)?;
        let key = self.object_key(Utc::now());

        debug!("Writing {} events ({} bytes compressed) to {}", batch.len(), body.len(), key);

        self.client.put_object(&key, body).await?;

        info!("Successfully stored {} events to {}", batch.len(), key);
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
