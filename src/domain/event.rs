use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cloud of origin for a trigger payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderType {
    Aws,
    Azure,
    Gcp,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Aws => "aws",
            ProviderType::Azure => "azure",
            ProviderType::Gcp => "gcp",
        }
    }
}

/// Event body forwarded opaquely to the collector: either a raw text blob or
/// an already-structured value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
}

/// Canonical event record the delivery runtime operates on.
///
/// Immutable once constructed; routing fields are filled from configured
/// defaults at conversion time and the destination stamps its own
/// index/source/sourcetype onto the wire frames at send time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HecEvent {
    pub time: DateTime<Utc>,
    pub host: String,
    pub source: String,
    pub sourcetype: String,
    pub index: String,
    pub payload: Payload,
}

impl HecEvent {
    pub fn new(payload: Payload, host: String, source: String, sourcetype: String, index: String) -> Self {
        HecEvent {
            time: Utc::now(),
            host,
            source,
            sourcetype,
            index,
            payload,
        }
    }
}

/// Provider-agnostic normalization of one trigger payload.
///
/// `raw_data` is always populated; adapters drop inputs they cannot decode
/// instead of emitting an empty event. The remaining fields are only set when
/// an adapter extracts structured sub-events.
#[derive(Clone, Debug, PartialEq)]
pub struct CloudEvent {
    pub provider_type: ProviderType,
    pub timestamp: Option<i64>,
    pub log_group: Option<String>,
    pub log_stream: Option<String>,
    pub message: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    pub raw_data: Vec<u8>,
}

impl CloudEvent {
    /// Event carrying only the decoded payload bytes.
    pub fn raw(provider_type: ProviderType, raw_data: Vec<u8>) -> Self {
        CloudEvent {
            provider_type,
            timestamp: None,
            log_group: None,
            log_stream: None,
            message: None,
            metadata: None,
            raw_data,
        }
    }
}
