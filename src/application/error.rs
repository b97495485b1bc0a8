use thiserror::Error;

use crate::application::mutation::MutationError;
use crate::cache::InvalidKeyError;
use crate::config::LoadError;
use crate::infra::error::InfraError;
use crate::infra::fetcher::FetchError;

/// Top-level error of the admin binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Key(#[from] InvalidKeyError),
    #[error("failed to write output: {0}")]
    Output(String),
}

impl AppError {
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output(message.into())
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Key(_) => 2,
            Self::Fetch(FetchError::Unauthorized) => 3,
            Self::Fetch(error) if error.is_forbidden() => 3,
            Self::Fetch(_) => 4,
            Self::Infra(_) | Self::Output(_) => 1,
        }
    }
}

impl From<MutationError> for AppError {
    fn from(error: MutationError) -> Self {
        Self::Fetch(error.error)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::output(error.to_string())
    }
}
