use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::HecConfig;
use crate::domain::event::HecEvent;
use crate::error::{AppError, HecError};
use crate::hec::wire::{HecTransport, ReqwestHecTransport, RoutingFields, encode_batch};

/// The collector's fixed ingestion path, appended to endpoints that do not
/// already carry it.
pub const COLLECTOR_PATH: &str = "/services/collector";

/// One configured collector endpoint with its client and health flag.
///
/// Everything but `healthy` is immutable after construction; `healthy` is
/// written by health updates only and read lock-free on the selection path.
pub struct Destination {
    endpoint: String,
    channel_id: String,
    routing: RoutingFields,
    transport: Arc<dyn HecTransport>,
    healthy: AtomicBool,
}

impl Destination {
    /// Build the destination's client and establish initial health with one
    /// synchronous-in-flow probe.
    pub async fn connect(endpoint: &str, conf: &HecConfig) -> Result<Arc<Self>, HecError> {
        let endpoint = normalize_endpoint(endpoint);
        let channel_id = resolve_channel_id(conf.channel_id.as_deref());
        let transport = Arc::new(ReqwestHecTransport::connect(&endpoint, &channel_id, conf)?);

        let destination = Arc::new(Destination {
            endpoint,
            channel_id,
            routing: RoutingFields {
                index: conf.index.clone(),
                source: conf.source.clone(),
                sourcetype: conf.sourcetype.clone(),
            },
            transport,
            healthy: AtomicBool::new(false),
        });

        destination.update_health().await;
        Ok(destination)
    }

    // DI-friendly constructor for tests or alternative transports
    pub fn with_transport(
        endpoint: &str,
        routing: RoutingFields,
        transport: Arc<dyn HecTransport>,
    ) -> Arc<Self> {
        Arc::new(Destination {
            endpoint: normalize_endpoint(endpoint),
            channel_id: resolve_channel_id(None),
            routing,
            transport,
            healthy: AtomicBool::new(false),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub(crate) fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    /// Probe the collector and record the outcome. Probe failure only flips
    /// the flag; it never removes the destination from the pool.
    pub async fn update_health(&self) {
        let healthy = match self.transport.check_health().await {
            Ok(()) => true,
            Err(e) => {
                debug!("Health probe failed for {}: {}", self.endpoint, e);
                false
            }
        };

        self.healthy.store(healthy, Ordering::Relaxed);
    }

    /// Encode and deliver one batch, stamping this destination's routing
    /// fields onto the frames. The batch itself is never mutated.
    pub async fn send(&self, batch: &[HecEvent]) -> Result<(), HecError> {
        let body = encode_batch(batch, &self.routing)?;
        self.transport.post_events(body).await
    }
}

/// Append the ingestion path unless the endpoint already targets it.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.ends_with(COLLECTOR_PATH) {
        endpoint.to_string()
    } else {
        format!("{}{}", endpoint, COLLECTOR_PATH)
    }
}

/// Use the configured channel identifier when it is a syntactically valid
/// UUID; otherwise generate a fresh one, stable for the process lifetime.
pub fn resolve_channel_id(configured: Option<&str>) -> String {
    match configured {
        Some(id) if Uuid::parse_str(id).is_ok() => id.to_string(),
        Some(id) => {
            warn!("Configured channel_id '{}' is not a valid UUID, generating a new one", id);
            Uuid::new_v4().to_string()
        }
        None => Uuid::new_v4().to_string(),
    }
}

/// Ordered set of destinations; order is significant for the sticky and
/// round-robin strategies.
pub struct DestinationPool {
    destinations: Vec<Arc<Destination>>,
}

impl DestinationPool {
    /// Create one destination per configured endpoint. Endpoints whose client
    /// cannot be built are skipped with a warning; an empty pool is a fatal
    /// configuration error.
    pub async fn connect(conf: &HecConfig) -> Result<Self, AppError> {
        let mut destinations = Vec::with_capacity(conf.endpoints.len());

        for endpoint in &conf.endpoints {
            match Destination::connect(endpoint, conf).await {
                Ok(destination) => destinations.push(destination),
                Err(e) => warn!("Failed to create HEC connection to {}: {}", endpoint, e),
            }
        }

        if destinations.is_empty() {
            return Err(AppError::Config(
                "no valid HEC endpoints configured".to_string(),
            ));
        }

        info!("Created HEC destination pool with {} endpoints", destinations.len());

        Ok(DestinationPool { destinations })
    }

    pub fn with_destinations(destinations: Vec<Arc<Destination>>) -> Self {
        DestinationPool { destinations }
    }

    pub fn destinations(&self) -> &[Arc<Destination>] {
        &self.destinations
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Start one background probe task per destination. Tasks tick on a fixed
    /// interval for the lifetime of the process and stop when `shutdown`
    /// fires; they are independent of any single invocation's deadline.
    pub fn spawn_health_monitors(
        &self,
        probe_interval: Duration,
        shutdown: Arc<Notify>,
    ) -> Vec<JoinHandle<()>> {
        self.destinations
            .iter()
            .map(|destination| {
                let destination = Arc::clone(destination);
                let shutdown = Arc::clone(&shutdown);

                tokio::spawn(async move {
                    let mut ticker = interval(probe_interval);
                    ticker.tick().await; // Skip the immediate first tick

                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {
                                destination.update_health().await;
                            }
                            _ = shutdown.notified() => {
                                debug!("Health monitor for {} received shutdown signal", destination.endpoint());
                                break;
                            }
                        }
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct StaticHealthTransport {
        healthy: bool,
    }

    #[async_trait]
    impl HecTransport for StaticHealthTransport {
        async fn post_events(&self, _body: Vec<u8>) -> Result<(), HecError> {
            Ok(())
        }

        async fn check_health(&self) -> Result<(), HecError> {
            if self.healthy {
                Ok(())
            } else {
                Err(HecError::ConnectionFailed("probe refused".to_string()))
            }
        }
    }

    fn routing() -> RoutingFields {
        RoutingFields {
            index: "main".to_string(),
            source: "s".to_string(),
            sourcetype: "st".to_string(),
        }
    }

    #[test]
    fn test_normalize_endpoint_appends_collector_path() {
        assert_eq!(
            normalize_endpoint("https://hec.example.com:8088"),
            "https://hec.example.com:8088/services/collector"
        );
    }

    #[test]
    fn test_normalize_endpoint_keeps_existing_path() {
        assert_eq!(
            normalize_endpoint("https://hec.example.com:8088/services/collector"),
            "https://hec.example.com:8088/services/collector"
        );
    }

    #[test]
    fn test_normalize_endpoint_strips_trailing_slash() {
        assert_eq!(
            normalize_endpoint("https://hec.example.com:8088/"),
            "https://hec.example.com:8088/services/collector"
        );
    }

    #[test]
    fn test_resolve_channel_id_keeps_valid_uuid() {
        let id = "2f5b82cd-90b3-4b03-bf7a-4f0a2e6e4f5d";
        assert_eq!(resolve_channel_id(Some(id)), id);
    }

    #[test]
    fn test_resolve_channel_id_replaces_invalid_value() {
        let resolved = resolve_channel_id(Some("not-a-uuid"));
        assert_ne!(resolved, "not-a-uuid");
        assert!(Uuid::parse_str(&resolved).is_ok());
    }

    #[test]
    fn test_resolve_channel_id_generates_when_unset() {
        let resolved = resolve_channel_id(None);
        assert!(Uuid::parse_str(&resolved).is_ok());
    }

    #[tokio::test]
    async fn test_update_health_records_probe_outcome() {
        let destination = Destination::with_transport(
            "https://hec.example.com",
            routing(),
            Arc::new(StaticHealthTransport { healthy: true }),
        );
        assert!(!destination.is_healthy());

        destination.update_health().await;
        assert!(destination.is_healthy());
    }

    #[tokio::test]
    async fn test_update_health_marks_unhealthy_on_probe_failure() {
        let destination = Destination::with_transport(
            "https://hec.example.com",
            routing(),
            Arc::new(StaticHealthTransport { healthy: false }),
        );
        destination.set_healthy(true);

        destination.update_health().await;
        assert!(!destination.is_healthy());
    }

    #[tokio::test]
    async fn test_health_monitor_updates_flag_and_stops_on_shutdown() {
        let destination = Destination::with_transport(
            "https://hec.example.com",
            routing(),
            Arc::new(StaticHealthTransport { healthy: true }),
        );
        let pool = DestinationPool::with_destinations(vec![Arc::clone(&destination)]);

        let shutdown = Arc::new(Notify::new());
        let handles = pool.spawn_health_monitors(Duration::from_millis(10), shutdown.clone());

        // Give the monitor a few ticks to flip the flag.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(destination.is_healthy());

        shutdown.notify_waiters();
        for handle in handles {
            tokio::time::timeout(Duration::from_millis(200), handle)
                .await
                .expect("monitor should stop on shutdown")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_send_encodes_and_posts() {
        use crate::domain::event::{HecEvent, Payload};

        let destination = Destination::with_transport(
            "https://hec.example.com",
            routing(),
            Arc::new(StaticHealthTransport { healthy: true }),
        );

        let batch = vec![HecEvent::new(
            Payload::Text("line".to_string()),
            "h".to_string(),
            "s".to_string(),
            "st".to_string(),
            "main".to_string(),
        )];

        destination.send(&batch).await.unwrap();
    }
}
