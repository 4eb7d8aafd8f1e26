pub mod object;

use async_trait::async_trait;

use crate::domain::event::HecEvent;
use crate::error::StorageError;

pub use object::{HttpObjectClient, ObjectClient, ObjectStorage};

/// Durable sink used for cold-storage mirroring and for the failure fallback
/// path. One `store` call writes the whole batch or fails; batches are never
/// split across objects.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn store(&self, batch: &[HecEvent]) -> Result<(), StorageError>;

    async fn close(&self) -> Result<(), StorageError>;
}
