use crate::peer::PeerFilter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::PoisonError;
use thiserror::Error;

/// Origin of a failure code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusGroup {
    /// Network-level failure talking to a replica.
    Transport,
    /// The client could not perform the call itself.
    Client,
    /// Status reported by the ledger for the procedure call.
    Ledger,
}

/// Failure code carried by retryable errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Status {
    pub group: StatusGroup,
    pub code: i32,
}

impl Status {
    pub const fn new(group: StatusGroup, code: i32) -> Self {
        Self { group, code }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.group, self.code)
    }
}

pub mod codes {
    pub const CONNECTION_FAILED: i32 = 1;
    pub const TIMEOUT: i32 = 2;
    pub const UNAVAILABLE: i32 = 3;

    pub const NO_PEERS_FOUND: i32 = 21;

    pub const OK: i32 = 200;
    pub const BAD_REQUEST: i32 = 400;
    pub const PRECONDITION_FAILED: i32 = 412;
    pub const INTERNAL_SERVER_ERROR: i32 = 500;
    pub const NOT_IMPLEMENTED: i32 = 501;
    pub const BAD_GATEWAY: i32 = 502;
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Discovery failed for channel {channel}: {message}")]
    Discovery { channel: String, message: String },

    #[error("No peers available on channel {channel}{}", filter_suffix(.filter))]
    NoPeersAvailable {
        channel: String,
        /// Set when a mandatory filter matched none of the replicas.
        filter: Option<PeerFilter>,
    },

    #[error("Transport failure talking to {peer}: {message}")]
    Transport {
        peer: String,
        code: i32,
        message: String,
    },

    #[error("Unexpected reply from {peer}: HTTP {status}")]
    Protocol { peer: String, status: u16 },

    #[error("Ledger rejected the call with status {status}: {message}")]
    LedgerRejected { status: i32, message: String },

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<ClientError>,
    },

    #[error("Event subscription failed: {0}")]
    Subscription(String),

    #[error("Timed out waiting for {expected} {event_id} events, got {received}")]
    EventTimeout {
        event_id: String,
        expected: usize,
        received: usize,
    },

    #[error("Error (de)serializing JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid hex payload: {0}")]
    Encoding(#[from] hex::FromHexError),

    #[error("Error in parsing URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Client cache lock is poisoned")]
    PoisonData,
}

impl ClientError {
    /// Failure code used by retry policies; `None` means the error is never retried.
    pub fn status(&self) -> Option<Status> {
        match self {
            ClientError::Transport { code, .. } => Some(Status::new(StatusGroup::Transport, *code)),
            ClientError::NoPeersAvailable { filter: None, .. } => Some(Status::new(
                StatusGroup::Client,
                codes::NO_PEERS_FOUND,
            )),
            ClientError::LedgerRejected { status, .. } => {
                Some(Status::new(StatusGroup::Ledger, *status))
            }
            ClientError::Exhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Strips the retry wrapper, if any.
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::Exhausted { last, .. } => last.root(),
            err => err,
        }
    }
}

impl<T> From<PoisonError<T>> for ClientError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::PoisonData
    }
}

fn filter_suffix(filter: &Option<PeerFilter>) -> String {
    match filter {
        Some(filter) => format!(" matching mandatory filter {filter}"),
        None => String::new(),
    }
}
