use crate::{error::ClientError, peer::Peer};
use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::Arc;

/// Source of the current replica set of a channel.
pub trait Discovery: Send + Sync {
    fn peers(&self, channel_id: &str) -> Result<Vec<Peer>, ClientError>;
}

/// Discovery over a configured peer list.
///
/// Every configured peer serves every configured channel. The replica set can be
/// swapped at runtime; readers always observe a complete set.
pub struct StaticDiscovery {
    channels: HashSet<String>,
    peers: ArcSwap<Vec<Peer>>,
}

impl StaticDiscovery {
    pub fn new<I, S>(channels: I, peers: Vec<Peer>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
            peers: ArcSwap::new(Arc::new(peers)),
        }
    }

    pub fn set_peers(&self, peers: Vec<Peer>) {
        self.peers.store(Arc::new(peers));
    }
}

impl Discovery for StaticDiscovery {
    fn peers(&self, channel_id: &str) -> Result<Vec<Peer>, ClientError> {
        if !self.channels.contains(channel_id) {
            return Err(ClientError::Discovery {
                channel: channel_id.to_string(),
                message: "channel is not served by any configured peer".to_string(),
            });
        }
        Ok(self.peers.load().as_ref().clone())
    }
}
