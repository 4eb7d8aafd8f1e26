use serde_json::Value;

use crate::domain::event::{CloudEvent, ProviderType};
use crate::error::ParseError;
use crate::provider::CloudProvider;

/// Azure Monitor adapter. The trigger payload arrives as plain JSON (no
/// base64/gzip layer); the whole records array is re-serialized into one
/// event per invocation.
pub struct AzureProvider;

impl AzureProvider {
    pub fn new() -> Self {
        AzureProvider
    }
}

impl Default for AzureProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudProvider for AzureProvider {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn parse_batch(&self, raw: &Value) -> Result<Vec<CloudEvent>, ParseError> {
        let raw_data =
            serde_json::to_vec(raw).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

        Ok(vec![CloudEvent::raw(ProviderType::Azure, raw_data)])
    }
}
