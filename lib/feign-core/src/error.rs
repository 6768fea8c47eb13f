use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("No available endpoint for app: {0}")]
    NoAvailableEndpoint(String),

    #[error("Discovery error: {0}")]
    Discovery(String),
}
