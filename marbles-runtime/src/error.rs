use marbles::MarblesError;
use marbles_client::ClientError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Could not read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Ledger client error: {0}")]
    Client(#[from] ClientError),

    #[error("Batch run error: {0}")]
    Marbles(#[from] MarblesError),

    #[error("Batch queue closed unexpectedly.")]
    ChannelClosed,

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}
