use serde::{Deserialize, Serialize};
use std::fmt;

/// One replica of the ledger service.
#[derive(Hash, PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    /// Base URL of the replica's API.
    pub url: String,
    /// Replica group (organization) the replica belongs to.
    pub group: String,
}

impl Peer {
    pub fn new(url: &str, group: &str) -> Self {
        Self {
            url: url.to_string(),
            group: group.to_string(),
        }
    }
}

/// Targeting predicate applied by [`PeerSelector`](crate::PeerSelector).
#[derive(Hash, PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub enum PeerFilter {
    ByGroup(String),
    ByUrl(String),
}

impl PeerFilter {
    pub fn accept(&self, peer: &Peer) -> bool {
        match self {
            PeerFilter::ByGroup(group) => peer.group == *group,
            PeerFilter::ByUrl(url) => peer.url == *url,
        }
    }
}

impl fmt::Display for PeerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerFilter::ByGroup(group) => write!(f, "group={group}"),
            PeerFilter::ByUrl(url) => write!(f, "url={url}"),
        }
    }
}
