use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Settings;
use crate::domain::event::{CloudEvent, HecEvent, Payload, ProviderType};
use crate::error::Result;
use crate::hec::HecClient;
use crate::provider::{CloudProvider, provider_for};
use crate::storage::{ObjectStorage, StorageBackend};

/// Routing defaults applied when a cloud event is converted to a canonical
/// event; consumed from configuration, overridable per deployment.
#[derive(Debug, Clone)]
pub struct EventDefaults {
    pub host: String,
    pub source: String,
    pub sourcetype: String,
    pub index: String,
}

/// Inbound boundary: one provider adapter wired to the delivery runtime.
/// Each cloud-function invocation hands its decoded trigger payload to
/// `handle`.
pub struct Forwarder {
    provider: Box<dyn CloudProvider>,
    client: HecClient,
    defaults: EventDefaults,
    batch_size: usize,
}

impl Forwarder {
    /// Assemble adapter, storage backends, and HEC client from settings.
    pub async fn connect(provider_type: ProviderType, settings: &Settings) -> Result<Self> {
        let failure_storage: Option<Arc<dyn StorageBackend>> = match &settings.failure_storage {
            Some(conf) => Some(Arc::new(ObjectStorage::connect(conf)?)),
            None => {
                info!("No failure storage configured; batches are lost when every destination is down");
                None
            }
        };

        let cold_storage: Option<Arc<dyn StorageBackend>> = match &settings.cold_storage {
            Some(conf) => Some(Arc::new(ObjectStorage::connect(conf)?)),
            None => None,
        };

        let client = HecClient::connect(&settings.hec, failure_storage, cold_storage).await?;

        let defaults = EventDefaults {
            host: settings.hec.host.clone(),
            source: settings.hec.source.clone(),
            sourcetype: settings.hec.sourcetype.clone(),
            index: settings.hec.index.clone(),
        };

        Ok(Self::new(
            provider_for(provider_type, settings.hec.extract_log_events),
            client,
            defaults,
            settings.hec.batch_size,
        ))
    }

    pub fn new(
        provider: Box<dyn CloudProvider>,
        client: HecClient,
        defaults: EventDefaults,
        batch_size: usize,
    ) -> Self {
        Forwarder {
            provider,
            client,
            defaults,
            batch_size,
        }
    }

    /// Process one invocation: parse the trigger payload, convert to
    /// canonical events, and deliver in batch_size-capped chunks. Returns the
    /// number of events handed to the delivery runtime.
    pub async fn handle(&self, raw: Value) -> Result<usize> {
        let cloud_events = self.provider.parse_batch(&raw)?;
        if cloud_events.is_empty() {
            debug!("{} payload produced no events", self.provider.name());
            return Ok(0);
        }

        let batch: Vec<HecEvent> = cloud_events
            .into_iter()
            .map(|event| to_hec_event(event, &self.defaults))
            .collect();
        let total = batch.len();

        // batch_size is a cap, not a hard invariant
        if self.batch_size == 0 {
            self.client.send_events(&batch).await?;
        } else {
            for chunk in batch.chunks(self.batch_size) {
                self.client.send_events(chunk).await?;
            }
        }

        info!("Successfully processed {} {} events", total, self.provider.name());
        Ok(total)
    }

    pub async fn close(&mut self) -> Result<()> {
        self.client.close().await
    }
}

/// Event time comes from the source when the adapter extracted one, else
/// processing time; the payload is opaque-forwarded as text.
fn to_hec_event(event: CloudEvent, defaults: &EventDefaults) -> HecEvent {
    let time = event
        .timestamp
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .unwrap_or_else(Utc::now);

    HecEvent {
        time,
        host: defaults.host.clone(),
        source: defaults.source.clone(),
        sourcetype: defaults.sourcetype.clone(),
        index: defaults.index.clone(),
        payload: Payload::Text(String::from_utf8_lossy(&event.raw_data).into_owned()),
    }
}
