use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("HEC error: {0}")]
    Hec(#[from] HecError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("no healthy HEC destination available and no failure storage configured")]
    NoDestination,

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid base64 data: {0}")]
    InvalidBase64(String),

    #[error("invalid gzip data: {0}")]
    InvalidGzip(String),
}

#[derive(Error, Debug, Clone)]
pub enum HecError {
    #[error("HEC request failed: {0}")]
    RequestFailed(String),

    #[error("HEC request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid proxy URL: {0}")]
    InvalidProxy(String),

    #[error("HTTP {status} error: {body}")]
    HttpStatusError { status: u16, body: String },

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    RequestFailed(String),

    #[error("storage request timed out")]
    Timeout,

    #[error("HTTP {status} error: {body}")]
    HttpStatusError { status: u16, body: String },

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        AppError::TaskJoin(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
