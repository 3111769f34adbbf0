//! Resilient client for the marbles ledger.
//!
//! [`LedgerClient`] composes a [`RetryPolicy`], a [`PeerSelector`] and a
//! [`ChannelClientPool`] on top of a [`LedgerTransport`]. [`HttpTransport`] speaks
//! the ledger's HTTP/WebSocket protocol; tests and the mock ledger plug in their own.
mod channel;
mod client;
mod config;
mod discovery;
mod error;
mod events;
mod http;
mod memo;
mod peer;
mod pool;
mod retry;
mod selection;
mod transport;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::ChannelClient;
pub use client::{LedgerClient, LedgerReply};
pub use config::ClientConfig;
pub use discovery::{Discovery, StaticDiscovery};
pub use error::{codes, ClientError, Status, StatusGroup};
pub use events::{EventListener, ListenerState};
pub use http::HttpTransport;
pub use memo::MemoMap;
pub use peer::{Peer, PeerFilter};
pub use pool::ChannelClientPool;
pub use retry::{with_retry, RetryPolicy};
pub use selection::{PeerSelector, SelectionService};
pub use transport::{
    Call, CallKind, EventSubscription, LedgerEvent, LedgerResponse, LedgerTransport, Request,
    TransientMap,
};
