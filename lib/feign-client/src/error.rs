use feign_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid request url: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Unsupported body type: {0}")]
    UnsupportedBodyType(String),

    #[error("Failed to encode request body: {0}")]
    Encode(String),

    #[error("Failed to decode response body: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ClientError {
    /// Whether the failure came from an app without any usable endpoint
    pub fn is_no_available_endpoint(&self) -> bool {
        matches!(self, ClientError::Core(CoreError::NoAvailableEndpoint(_)))
    }
}
