use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Error, Debug)]
pub enum ProviderError {
    /// Unknown interface/version, or unknown method on a known service
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    /// Failure raised by a handler or middleware
    #[error("Invocation failed: {0:#}")]
    InvocationFailed(anyhow::Error),

    #[error("Invalid service definition: {0}")]
    InvalidService(String),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::ServiceNotFound(_))
    }
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        ProviderError::InvocationFailed(err)
    }
}
