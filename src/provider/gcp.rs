use serde_json::Value;

use crate::domain::event::{CloudEvent, ProviderType};
use crate::error::ParseError;
use crate::provider::CloudProvider;

/// GCP Cloud Logging adapter; same shape as Azure, one re-serialized event
/// per invocation.
pub struct GcpProvider;

impl GcpProvider {
    pub fn new() -> Self {
        GcpProvider
    }
}

impl Default for GcpProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudProvider for GcpProvider {
    fn name(&self) -> &'static str {
        "gcp"
    }

    fn parse_batch(&self, raw: &Value) -> Result<Vec<CloudEvent>, ParseError> {
        let raw_data =
            serde_json::to_vec(raw).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

        Ok(vec![CloudEvent::raw(ProviderType::Gcp, raw_data)])
    }
}
