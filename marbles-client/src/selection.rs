use crate::{
    discovery::Discovery,
    error::ClientError,
    memo::MemoMap,
    peer::{Peer, PeerFilter},
};
use rand::seq::{IteratorRandom, SliceRandom};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Strategy choosing which replicas a call goes to. Picked once per pool and
/// held for its lifetime.
pub enum PeerSelector {
    /// One replica uniformly at random, optionally narrowed by a per-call filter.
    ///
    /// When the filter matches nothing, a `mandatory` selector fails with
    /// [`ClientError::NoPeersAvailable`]; otherwise it falls back to the whole set.
    RandomAny { mandatory: bool },
    /// Discovery-driven endorsement set, one [`SelectionService`] per channel.
    Dynamic(MemoMap<SelectionService>),
}

impl PeerSelector {
    pub fn random_any(mandatory: bool) -> Self {
        PeerSelector::RandomAny { mandatory }
    }

    pub fn dynamic() -> Self {
        PeerSelector::Dynamic(MemoMap::new())
    }

    /// Replicas to send the next call to; the first one is the submitting target.
    ///
    /// Dynamic selection ignores `filter`.
    pub fn select(
        &self,
        channel_id: &str,
        discovery: &Arc<dyn Discovery>,
        filter: Option<&PeerFilter>,
    ) -> Result<Vec<Peer>, ClientError> {
        match self {
            PeerSelector::RandomAny { mandatory } => {
                let peers = discovery.peers(channel_id)?;
                let peer = random_peer(channel_id, peers, filter, *mandatory)?;
                trace!("Selected {} on {channel_id}", peer.url);
                Ok(vec![peer])
            }
            PeerSelector::Dynamic(services) => {
                let service = self.selection_service(services, channel_id, discovery)?;
                service.endorsers()
            }
        }
    }

    fn selection_service(
        &self,
        services: &MemoMap<SelectionService>,
        channel_id: &str,
        discovery: &Arc<dyn Discovery>,
    ) -> Result<Arc<SelectionService>, ClientError> {
        services.get_or_try_init(channel_id, || {
            SelectionService::new(channel_id, discovery.clone())
        })
    }

    /// Drops every cached selection service.
    pub fn reset(&self) -> Result<(), ClientError> {
        match self {
            PeerSelector::RandomAny { .. } => Ok(()),
            PeerSelector::Dynamic(services) => services.clear(),
        }
    }
}

/// Picks one replica of `peers`, applying `filter` with the fallback rules of
/// [`PeerSelector::RandomAny`].
pub(crate) fn random_peer(
    channel_id: &str,
    peers: Vec<Peer>,
    filter: Option<&PeerFilter>,
    mandatory: bool,
) -> Result<Peer, ClientError> {
    let mut rng = rand::thread_rng();

    if let Some(filter) = filter {
        let matching = peers.iter().filter(|peer| filter.accept(peer)).choose(&mut rng);
        match matching {
            Some(peer) => return Ok(peer.clone()),
            None if mandatory => {
                return Err(ClientError::NoPeersAvailable {
                    channel: channel_id.to_string(),
                    filter: Some(filter.clone()),
                })
            }
            None => debug!("No peer matches {filter} on {channel_id}, using any peer"),
        }
    }

    peers
        .into_iter()
        .choose(&mut rng)
        .ok_or_else(|| ClientError::NoPeersAvailable {
            channel: channel_id.to_string(),
            filter: None,
        })
}

/// Per-channel endorsement selection backed by discovery.
pub struct SelectionService {
    channel_id: String,
    discovery: Arc<dyn Discovery>,
}

impl SelectionService {
    pub fn new(channel_id: &str, discovery: Arc<dyn Discovery>) -> Result<Self, ClientError> {
        // Unknown channels fail here rather than on the first call.
        discovery.peers(channel_id)?;
        debug!("Created selection service for {channel_id}");
        Ok(Self {
            channel_id: channel_id.to_string(),
            discovery,
        })
    }

    /// One random replica per replica group, in random order.
    pub fn endorsers(&self) -> Result<Vec<Peer>, ClientError> {
        let mut rng = rand::thread_rng();

        let mut groups: BTreeMap<String, Vec<Peer>> = BTreeMap::new();
        for peer in self.discovery.peers(&self.channel_id)? {
            groups.entry(peer.group.clone()).or_default().push(peer);
        }

        let mut endorsers: Vec<Peer> = groups
            .into_values()
            .filter_map(|peers| peers.into_iter().choose(&mut rng))
            .collect();

        if endorsers.is_empty() {
            return Err(ClientError::NoPeersAvailable {
                channel: self.channel_id.clone(),
                filter: None,
            });
        }

        endorsers.shuffle(&mut rng);
        Ok(endorsers)
    }
}
