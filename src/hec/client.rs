use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::HecConfig;
use crate::domain::event::HecEvent;
use crate::error::{AppError, Result};
use crate::hec::destination::DestinationPool;
use crate::hec::selector::{BalanceStrategy, DestinationSelector};
use crate::storage::StorageBackend;

/// Delivery orchestrator: mirrors each batch to cold storage, routes it to a
/// selected destination, and falls back to failure storage when no
/// destination is available.
pub struct HecClient {
    pool: DestinationPool,
    selector: DestinationSelector,
    failure_storage: Option<Arc<dyn StorageBackend>>,
    cold_storage: Option<Arc<dyn StorageBackend>>,
    shutdown: Arc<Notify>,
    monitor_handles: Vec<JoinHandle<()>>,
}

impl HecClient {
    /// Build the destination pool, start the background health monitors, and
    /// wire the optional storage backends.
    pub async fn connect(
        conf: &HecConfig,
        failure_storage: Option<Arc<dyn StorageBackend>>,
        cold_storage: Option<Arc<dyn StorageBackend>>,
    ) -> Result<Self> {
        let pool = DestinationPool::connect(conf).await?;
        let selector = DestinationSelector::new(
            BalanceStrategy::parse(&conf.balance_strategy),
            Duration::from_millis(conf.sticky_ttl_ms),
        );

        let shutdown = Arc::new(Notify::new());
        let monitor_handles = pool.spawn_health_monitors(
            Duration::from_millis(conf.health_interval_ms),
            Arc::clone(&shutdown),
        );

        Ok(HecClient {
            pool,
            selector,
            failure_storage,
            cold_storage,
            shutdown,
            monitor_handles,
        })
    }

    // DI-friendly constructor for tests: no background monitors, the caller
    // controls pool health directly.
    pub fn with_pool(
        pool: DestinationPool,
        selector: DestinationSelector,
        failure_storage: Option<Arc<dyn StorageBackend>>,
        cold_storage: Option<Arc<dyn StorageBackend>>,
    ) -> Self {
        HecClient {
            pool,
            selector,
            failure_storage,
            cold_storage,
            shutdown: Arc::new(Notify::new()),
            monitor_handles: Vec::new(),
        }
    }

    pub fn pool(&self) -> &DestinationPool {
        &self.pool
    }

    /// Deliver one batch. In order: best-effort cold-storage mirror, then
    /// destination selection, then the send. When no destination is available
    /// the batch goes to failure storage (its result is returned verbatim);
    /// without failure storage this is the no-destination error.
    ///
    /// A transport error from a selected destination is returned as-is: the
    /// runtime does not retry another destination and does not divert the
    /// batch to failure storage on a failed send. Fallback triggers only on
    /// "no healthy destination".
    pub async fn send_events(&self, batch: &[HecEvent]) -> Result<()> {
        if let Some(cold_storage) = &self.cold_storage {
            if let Err(e) = cold_storage.store(batch).await {
                warn!("Failed to mirror {} events to cold storage: {}", batch.len(), e);
            }
        }

        match self.selector.select(&self.pool) {
            Some(destination) => {
                destination.send(batch).await?;
                Ok(())
            }
            None => match &self.failure_storage {
                Some(failure_storage) => {
                    warn!(
                        "No healthy HEC destination available, sending {} events to failure storage",
                        batch.len()
                    );
                    failure_storage.store(batch).await?;
                    Ok(())
                }
                None => Err(AppError::NoDestination),
            },
        }
    }

    /// Stop the health monitors and close the storage backends.
    pub async fn close(&mut self) -> Result<()> {
        self.shutdown.notify_waiters();

        for handle in self.monitor_handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Health monitor join error: {}", e);
            }
        }

        for storage in [&self.cold_storage, &self.failure_storage].into_iter().flatten() {
            if let Err(e) = storage.close().await {
                warn!("Failed to close storage backend: {}", e);
            }
        }

        info!("HEC client shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::domain::event::{HecEvent, Payload};
    use crate::error::{HecError, StorageError};
    use std::result::Result;
    use crate::hec::destination::Destination;
    use crate::hec::wire::{HecTransport, RoutingFields};

    use super::*;

    struct CountingTransport {
        posts: AtomicUsize,
        fail_sends: bool,
    }

    impl CountingTransport {
        fn new(fail_sends: bool) -> Arc<Self> {
            Arc::new(CountingTransport {
                posts: AtomicUsize::new(0),
                fail_sends,
            })
        }
    }

    #[async_trait]
    impl HecTransport for CountingTransport {
        async fn post_events(&self, _body: Vec<u8>) -> Result<(), HecError> {
            self.posts.fetch_add(1, Ordering::SeqCst);
            if self.fail_sends {
                Err(HecError::ConnectionFailed("connection reset".to_string()))
            } else {
                Ok(())
            }
        }

        async fn check_health(&self) -> Result<(), HecError> {
            Ok(())
        }
    }

    struct RecordingStorage {
        batches: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl RecordingStorage {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(RecordingStorage {
                batches: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn stored_batches(&self) -> usize {
            self.batches.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl StorageBackend for RecordingStorage {
        async fn store(&self, batch: &[HecEvent]) -> Result<(), StorageError> {
            self.batches.lock().unwrap().push(batch.len());
            if self.fail {
                Err(StorageError::RequestFailed("disk on fire".to_string()))
            } else {
                Ok(())
            }
        }

        async fn close(&self) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn routing() -> RoutingFields {
        RoutingFields {
            index: "main".to_string(),
            source: "s".to_string(),
            sourcetype: "st".to_string(),
        }
    }

    fn destination_with(transport: Arc<CountingTransport>, healthy: bool) -> Arc<Destination> {
        let dest = Destination::with_transport("https://hec.example.com", routing(), transport);
        dest.set_healthy(healthy);
        dest
    }

    fn selector() -> DestinationSelector {
        DestinationSelector::new(BalanceStrategy::FirstAvailable, Duration::from_secs(300))
    }

    fn batch(n: usize) -> Vec<HecEvent> {
        (0..n)
            .map(|i| {
                HecEvent::new(
                    Payload::Text(format!("line {}", i)),
                    "h".to_string(),
                    "s".to_string(),
                    "st".to_string(),
                    "main".to_string(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_send_events_delivers_to_healthy_destination() {
        let transport = CountingTransport::new(false);
        let pool =
            DestinationPool::with_destinations(vec![destination_with(transport.clone(), true)]);
        let client = HecClient::with_pool(pool, selector(), None, None);

        client.send_events(&batch(3)).await.unwrap();

        assert_eq!(transport.posts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_unhealthy_with_failure_storage_stores_and_skips_send() {
        let transport = CountingTransport::new(false);
        let pool =
            DestinationPool::with_destinations(vec![destination_with(transport.clone(), false)]);
        let failure_storage = RecordingStorage::new(false);
        let client =
            HecClient::with_pool(pool, selector(), Some(failure_storage.clone()), None);

        client.send_events(&batch(2)).await.unwrap();

        // Zero destination-send attempts, one fallback write.
        assert_eq!(transport.posts.load(Ordering::SeqCst), 0);
        assert_eq!(failure_storage.stored_batches(), 1);
    }

    #[tokio::test]
    async fn test_all_unhealthy_failure_storage_error_propagates() {
        let transport = CountingTransport::new(false);
        let pool = DestinationPool::with_destinations(vec![destination_with(transport, false)]);
        let failure_storage = RecordingStorage::new(true);
        let client = HecClient::with_pool(pool, selector(), Some(failure_storage), None);

        let err = client.send_events(&batch(1)).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test]
    async fn test_all_unhealthy_without_failure_storage_errors() {
        let transport = CountingTransport::new(false);
        let pool = DestinationPool::with_destinations(vec![destination_with(transport, false)]);
        let client = HecClient::with_pool(pool, selector(), None, None);

        let err = client.send_events(&batch(1)).await.unwrap_err();
        assert!(matches!(err, AppError::NoDestination));
    }

    #[tokio::test]
    async fn test_cold_storage_mirror_runs_before_send() {
        let transport = CountingTransport::new(false);
        let pool =
            DestinationPool::with_destinations(vec![destination_with(transport.clone(), true)]);
        let cold_storage = RecordingStorage::new(false);
        let client = HecClient::with_pool(pool, selector(), None, Some(cold_storage.clone()));

        client.send_events(&batch(2)).await.unwrap();

        assert_eq!(cold_storage.stored_batches(), 1);
        assert_eq!(transport.posts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cold_storage_failure_never_blocks_delivery() {
        let transport = CountingTransport::new(false);
        let pool =
            DestinationPool::with_destinations(vec![destination_with(transport.clone(), true)]);
        let cold_storage = RecordingStorage::new(true);
        let client = HecClient::with_pool(pool, selector(), None, Some(cold_storage));

        client.send_events(&batch(2)).await.unwrap();

        assert_eq!(transport.posts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_error_returned_verbatim_without_fallback() {
        // Fallback only triggers on "no healthy destination": a transport
        // error from a selected destination must not divert the batch to
        // failure storage.
        let transport = CountingTransport::new(true);
        let pool =
            DestinationPool::with_destinations(vec![destination_with(transport.clone(), true)]);
        let failure_storage = RecordingStorage::new(false);
        let client =
            HecClient::with_pool(pool, selector(), Some(failure_storage.clone()), None);

        let err = client.send_events(&batch(1)).await.unwrap_err();

        assert!(matches!(err, AppError::Hec(HecError::ConnectionFailed(_))));
        assert_eq!(transport.posts.load(Ordering::SeqCst), 1);
        assert_eq!(failure_storage.stored_batches(), 0);
    }

    #[tokio::test]
    async fn test_cold_mirror_still_written_when_all_unhealthy() {
        let transport = CountingTransport::new(false);
        let pool = DestinationPool::with_destinations(vec![destination_with(transport, false)]);
        let cold_storage = RecordingStorage::new(false);
        let failure_storage = RecordingStorage::new(false);
        let client = HecClient::with_pool(
            pool,
            selector(),
            Some(failure_storage.clone()),
            Some(cold_storage.clone()),
        );

        client.send_events(&batch(4)).await.unwrap();

        assert_eq!(cold_storage.stored_batches(), 1);
        assert_eq!(failure_storage.stored_batches(), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_without_monitors() {
        let transport = CountingTransport::new(false);
        let pool = DestinationPool::with_destinations(vec![destination_with(transport, true)]);
        let mut client = HecClient::with_pool(pool, selector(), None, None);

        client.close().await.unwrap();
        client.close().await.unwrap();
    }
}
