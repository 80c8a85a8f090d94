//! Remote adapter error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("environment variable {0} is not set")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("API error: {0}")]
    Api(#[from] converge_core::ApiError),
}

pub type Result<T> = std::result::Result<T, RemoteError>;
