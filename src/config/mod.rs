pub mod settings;

pub use settings::{HecConfig, LoggingConfig, Settings, StorageConfig};
