use crate::{
    discovery::Discovery,
    error::ClientError,
    peer::PeerFilter,
    retry::{with_retry, RetryPolicy},
    selection::{random_peer, PeerSelector},
    transport::{Call, CallKind, EventSubscription, LedgerResponse, LedgerTransport, Request},
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Handle scoped to one channel. Shared by every caller of that channel through
/// [`ChannelClientPool`](crate::ChannelClientPool).
pub struct ChannelClient<T> {
    channel_id: String,
    transport: Arc<T>,
    discovery: Arc<dyn Discovery>,
    selector: Arc<PeerSelector>,
}

impl<T: LedgerTransport> ChannelClient<T> {
    /// Fails when discovery does not know the channel.
    pub fn new(
        channel_id: &str,
        transport: Arc<T>,
        discovery: Arc<dyn Discovery>,
        selector: Arc<PeerSelector>,
    ) -> Result<Self, ClientError> {
        discovery.peers(channel_id)?;
        Ok(Self {
            channel_id: channel_id.to_string(),
            transport,
            discovery,
            selector,
        })
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Submits a state-changing call.
    pub async fn execute(
        &self,
        request: &Request,
        policy: &RetryPolicy,
    ) -> Result<LedgerResponse, ClientError> {
        self.call(CallKind::Invoke, request, policy, None).await
    }

    /// Evaluates a read-only call, optionally targeted through `filter`.
    pub async fn query(
        &self,
        request: &Request,
        policy: &RetryPolicy,
        filter: Option<&PeerFilter>,
    ) -> Result<LedgerResponse, ClientError> {
        self.call(CallKind::Query, request, policy, filter).await
    }

    #[instrument(skip_all, fields(channel = %self.channel_id, function = %request.function))]
    async fn call(
        &self,
        kind: CallKind,
        request: &Request,
        policy: &RetryPolicy,
        filter: Option<&PeerFilter>,
    ) -> Result<LedgerResponse, ClientError> {
        with_retry(policy, |attempt| async move {
            // Peers are selected again on every attempt.
            let targets = self
                .selector
                .select(&self.channel_id, &self.discovery, filter)?;
            let call = Call {
                kind,
                channel_id: self.channel_id.clone(),
                targets,
                request: request.clone(),
            };

            let res = self.transport.execute(&call).await?;
            if res.status != crate::codes::OK {
                debug!("Attempt {attempt} rejected with {}: {}", res.status, res.message);
                return Err(ClientError::LedgerRejected {
                    status: res.status,
                    message: res.message,
                });
            }
            Ok(res)
        })
        .await
    }

    /// Opens an event stream on a random replica of the channel.
    pub async fn register_event(
        &self,
        procedure_id: &str,
        event_id: &str,
    ) -> Result<EventSubscription, ClientError> {
        let peers = self.discovery.peers(&self.channel_id)?;
        let peer = random_peer(&self.channel_id, peers, None, false)?;
        self.transport
            .subscribe(&peer, &self.channel_id, procedure_id, event_id)
            .await
    }
}
