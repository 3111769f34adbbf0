use marbles_client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarblesError {
    #[error("Ledger call failed: {0}")]
    Client(#[from] ClientError),

    #[error("Error (de)serializing JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Owner pool needs at least two owners, got {0}")]
    OwnerPoolTooSmall(usize),

    #[error("Could not establish owner {owner}: {source}")]
    OwnerBootstrap {
        owner: String,
        #[source]
        source: Box<MarblesError>,
    },
}
