use std::io;

use common::env::ProvisionError;
use thiserror::Error;

/// Anything that prevents the service from reaching the point where it
/// accepts connections.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("cannot locate program directory: {0}")]
    ProgramRoot(#[source] io::Error),
    #[error("directory provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

impl From<anyhow::Error> for StartupError {
    fn from(e: anyhow::Error) -> Self {
        StartupError::InvalidConfig(format!("{e:#}"))
    }
}
