use std::time::Duration;

use async_trait::async_trait;
use bytes::BufMut;
use reqwest::Client;
use serde::Serialize;
use tracing::warn;

use crate::config::HecConfig;
use crate::domain::event::{HecEvent, Payload};
use crate::error::HecError;

/// Routing fields a destination stamps onto every frame it sends.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingFields {
    pub index: String,
    pub source: String,
    pub sourcetype: String,
}

/// One collector frame. `time` is epoch seconds with millisecond precision,
/// `event` carries the payload verbatim.
#[derive(Serialize)]
struct HecFrame<'a> {
    time: f64,
    host: &'a str,
    source: &'a str,
    sourcetype: &'a str,
    index: &'a str,
    event: &'a Payload,
}

/// Encode a batch into one request body: newline-joined JSON frames.
///
/// Host and time come from each event; index/source/sourcetype come from the
/// destination the batch was routed to. The input events are not mutated.
pub fn encode_batch(events: &[HecEvent], routing: &RoutingFields) -> Result<Vec<u8>, HecError> {
    let mut body: Vec<u8> = Vec::new();

    for event in events {
        let frame = HecFrame {
            time: event.time.timestamp_millis() as f64 / 1000.0,
            host: &event.host,
            source: &routing.source,
            sourcetype: &routing.sourcetype,
            index: &routing.index,
            event: &event.payload,
        };

        serde_json::to_writer(&mut body, &frame)
            .map_err(|e| HecError::SerializationFailed(e.to_string()))?;
        body.put_slice(b"\n");
    }

    Ok(body)
}

/// Outbound side of one destination: event delivery plus the liveness probe.
#[async_trait]
pub trait HecTransport: Send + Sync {
    async fn post_events(&self, body: Vec<u8>) -> Result<(), HecError>;
    async fn check_health(&self) -> Result<(), HecError>;
}

pub struct ReqwestHecTransport {
    client: Client,
    collector_url: String,
    health_url: String,
    token: String,
    channel_id: String,
}

impl ReqwestHecTransport {
    /// Build the per-destination client: TLS-verify toggle, optional proxy,
    /// request timeout equal to the configured batch timeout.
    pub fn connect(endpoint: &str, channel_id: &str, conf: &HecConfig) -> Result<Self, HecError> {
        let mut builder = Client::builder()
            .danger_accept_invalid_certs(conf.tls_skip_verify)
            .timeout(Duration::from_millis(conf.batch_timeout_ms));

        if let Some(proxy) = &conf.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| HecError::InvalidProxy(format!("{}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| HecError::RequestFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(ReqwestHecTransport {
            client,
            collector_url: endpoint.to_string(),
            health_url: format!("{}/health", endpoint),
            token: conf.token.clone(),
            channel_id: channel_id.to_string(),
        })
    }

    fn classify_reqwest_error(error: reqwest::Error) -> HecError {
        if error.is_timeout() {
            warn!("Request timeout: {}", error);
            return HecError::Timeout;
        }

        if error.is_connect() {
            warn!("Connection failed: {}", error);
            return HecError::ConnectionFailed(error.to_string());
        }

        warn!("Request error: {}", error);
        HecError::RequestFailed(error.to_string())
    }
}

#[async_trait]
impl HecTransport for ReqwestHecTransport {
    async fn post_events(&self, body: Vec<u8>) -> Result<(), HecError> {
        let response = self
            .client
            .post(&self.collector_url)
            .header("Authorization", format!("Splunk {}", self.token))
            .header("X-Splunk-Request-Channel", &self.channel_id)
            .header("Content-Type", "application/json")
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

        Err(HecError::HttpStatusError {
            status: status.as_u16(),
            body,
        })
    }

    async fn check_health(&self) -> Result<(), HecError> {
        let response = self
            .client
            .get(&self.health_url)
            .header("Authorization", format!("Splunk {}", self.token))
            .send()
            .await
            .map_err(Self::classify_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        Err(HecError::HttpStatusError {
            status: status.as_u16(),
            body: String::new(),
        })
    }
}
