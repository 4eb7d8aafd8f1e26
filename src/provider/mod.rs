pub mod aws;
pub mod azure;
pub mod gcp;

use serde_json::Value;

use crate::domain::event::{CloudEvent, ProviderType};
use crate::error::ParseError;

/// Decodes one provider's raw trigger payload into canonical cloud events.
///
/// A record that cannot be decoded inside an otherwise valid envelope is
/// skipped with a warning; an unparseable envelope fails the whole invocation.
pub trait CloudProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse_batch(&self, raw: &Value) -> Result<Vec<CloudEvent>, ParseError>;
}

/// Static dispatch from configuration; providers are fixed per deployment,
/// never loaded at runtime.
pub fn provider_for(provider_type: ProviderType, extract_log_events: bool) -> Box<dyn CloudProvider> {
    match provider_type {
        ProviderType::Aws => Box::new(aws::AwsProvider::new(extract_log_events)),
        ProviderType::Azure => Box::new(azure::AzureProvider::new()),
        ProviderType::Gcp => Box::new(gcp::GcpProvider::new()),
    }
}
