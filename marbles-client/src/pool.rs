use crate::{
    channel::ChannelClient, discovery::Discovery, error::ClientError, memo::MemoMap,
    selection::PeerSelector, transport::LedgerTransport,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// Lazily built, shared [`ChannelClient`]s, one per channel id.
pub struct ChannelClientPool<T> {
    transport: Arc<T>,
    discovery: Arc<dyn Discovery>,
    selector: Arc<PeerSelector>,
    clients: MemoMap<ChannelClient<T>>,
    constructed: AtomicUsize,
}

impl<T: LedgerTransport> ChannelClientPool<T> {
    pub fn new(transport: Arc<T>, discovery: Arc<dyn Discovery>, selector: PeerSelector) -> Self {
        Self {
            transport,
            discovery,
            selector: Arc::new(selector),
            clients: MemoMap::new(),
            constructed: AtomicUsize::new(0),
        }
    }

    /// Handle for `channel_id`, built on first use. Construction failures are
    /// returned as is and never retried.
    pub fn get(&self, channel_id: &str) -> Result<Arc<ChannelClient<T>>, ClientError> {
        self.clients.get_or_try_init(channel_id, || {
            let client = ChannelClient::new(
                channel_id,
                self.transport.clone(),
                self.discovery.clone(),
                self.selector.clone(),
            )?;
            self.constructed.fetch_add(1, Ordering::Relaxed);
            info!("Created channel client for {channel_id}");
            Ok(client)
        })
    }

    /// Handles are shared, so closing one does nothing; see [`Self::shutdown`].
    pub fn close(&self, _client: &ChannelClient<T>) {}

    /// Releases every pooled handle and cached selection service.
    pub fn shutdown(&self) -> Result<(), ClientError> {
        self.clients.clear()?;
        self.selector.reset()
    }

    /// Number of handles built over the pool's lifetime.
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::Relaxed)
    }
}
