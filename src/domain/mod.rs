pub mod event;

pub use event::{CloudEvent, HecEvent, Payload, ProviderType};
