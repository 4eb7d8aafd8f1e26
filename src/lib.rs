// #![deny(warnings)]
#![forbid(unsafe_code)]

//! Forwards cloud log-trigger payloads (AWS CloudWatch Logs/Kinesis, Azure
//! Monitor, GCP Cloud Logging) to HEC-style collector endpoints, with
//! health-aware destination selection and object-storage fallback when no
//! destination is reachable.

pub mod config;
pub mod domain;
pub mod error;
pub mod forwarder;
pub mod hec;
pub mod logging;
pub mod provider;
pub mod storage;


pub use config::Settings;
pub use domain::event::{CloudEvent, HecEvent, Payload, ProviderType};
pub use error::{AppError, HecError, ParseError, Result, StorageError};
pub use forwarder::{EventDefaults, Forwarder};
pub use hec::HecClient;
pub use storage::StorageBackend;
