use crate::{
    channel::ChannelClient,
    config::ClientConfig,
    discovery::{Discovery, StaticDiscovery},
    error::ClientError,
    http::HttpTransport,
    peer::PeerFilter,
    pool::ChannelClientPool,
    retry::RetryPolicy,
    selection::PeerSelector,
    transport::{LedgerTransport, Request, TransientMap},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Normalized answer of a successful call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerReply {
    pub payload: Vec<u8>,
    pub tx_id: String,
}

/// Invoke/query entry point of the marbles ledger.
///
/// Invocations go through a pool using dynamic (endorsement) selection; queries
/// through a pool picking one random replica, which can be narrowed per call.
pub struct LedgerClient<T> {
    config: ClientConfig,
    invoke_pool: ChannelClientPool<T>,
    query_pool: ChannelClientPool<T>,
    invoke_policy: RetryPolicy,
    query_policy: RetryPolicy,
}

impl LedgerClient<HttpTransport> {
    /// Client over HTTP against the configured peers.
    pub fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(HttpTransport::new(config.request_timeout)?);
        let discovery = Arc::new(StaticDiscovery::new(
            config.served_channels(),
            config.peers.clone(),
        ));
        Self::new(config, transport, discovery)
    }
}

impl<T: LedgerTransport> LedgerClient<T> {
    pub fn new(
        config: ClientConfig,
        transport: Arc<T>,
        discovery: Arc<dyn Discovery>,
    ) -> Result<Self, ClientError> {
        config.validate()?;

        let invoke_policy = config.invoke_policy();
        let query_policy = config.query_policy();
        info!(
            "Invoke retry policy: {}",
            serde_json::to_string(&invoke_policy)?
        );

        Ok(Self {
            invoke_pool: ChannelClientPool::new(
                transport.clone(),
                discovery.clone(),
                PeerSelector::dynamic(),
            ),
            query_pool: ChannelClientPool::new(
                transport,
                discovery,
                PeerSelector::random_any(false),
            ),
            invoke_policy,
            query_policy,
            config,
        })
    }

    /// Submits `args[0]` with the remaining arguments to `procedure_id`.
    pub async fn invoke(
        &self,
        channel_id: &str,
        procedure_id: &str,
        args: &[&str],
        transient: Option<TransientMap>,
    ) -> Result<LedgerReply, ClientError> {
        let request = build_request(procedure_id, args, transient)?;
        let client = self.invoke_pool.get(channel_id)?;
        let res = client.execute(&request, &self.invoke_policy).await?;
        debug!("{} committed as {}", request.function, res.tx_id);

        Ok(LedgerReply {
            payload: res.payload,
            tx_id: res.tx_id,
        })
    }

    /// Evaluates `args[0]` read-only.
    ///
    /// `max_attempts` can raise the query policy's attempt budget for this call
    /// but never lowers it. `target` pins the call to a replica or replica group
    /// when one matches.
    pub async fn query(
        &self,
        max_attempts: u32,
        channel_id: &str,
        procedure_id: &str,
        args: &[&str],
        transient: Option<TransientMap>,
        target: Option<PeerFilter>,
    ) -> Result<LedgerReply, ClientError> {
        let request = build_request(procedure_id, args, transient)?;
        let client = self.query_pool.get(channel_id)?;
        let policy = self.query_policy.with_min_attempts(max_attempts);
        let res = client.query(&request, &policy, target.as_ref()).await?;

        Ok(LedgerReply {
            payload: res.payload,
            tx_id: res.tx_id,
        })
    }

    /// [`Self::query`] pinned to the replica at `url`.
    pub async fn query_at_peer(
        &self,
        max_attempts: u32,
        url: &str,
        channel_id: &str,
        procedure_id: &str,
        args: &[&str],
        transient: Option<TransientMap>,
    ) -> Result<LedgerReply, ClientError> {
        let target = PeerFilter::ByUrl(url.to_string());
        self.query(
            max_attempts,
            channel_id,
            procedure_id,
            args,
            transient,
            Some(target),
        )
        .await
    }

    /// [`Self::query`] pinned to a replica of `group`.
    pub async fn query_at_group(
        &self,
        max_attempts: u32,
        group: &str,
        channel_id: &str,
        procedure_id: &str,
        args: &[&str],
        transient: Option<TransientMap>,
    ) -> Result<LedgerReply, ClientError> {
        let target = PeerFilter::ByGroup(group.to_string());
        self.query(
            max_attempts,
            channel_id,
            procedure_id,
            args,
            transient,
            Some(target),
        )
        .await
    }

    pub async fn query_at_own_group(
        &self,
        max_attempts: u32,
        channel_id: &str,
        procedure_id: &str,
        args: &[&str],
        transient: Option<TransientMap>,
    ) -> Result<LedgerReply, ClientError> {
        let group = &self.config.organization;
        self.query_at_group(
            max_attempts,
            group,
            channel_id,
            procedure_id,
            args,
            transient,
        )
        .await
    }

    /// Shared handle of `channel_id`, built on first use.
    pub fn channel_client(&self, channel_id: &str) -> Result<Arc<ChannelClient<T>>, ClientError> {
        self.invoke_pool.get(channel_id)
    }

    /// No-op: channel handles stay open until [`Self::close`].
    pub fn close_channel_client(&self, client: &ChannelClient<T>) {
        self.invoke_pool.close(client);
    }

    /// Process teardown. Drops every pooled handle.
    pub fn close(&self) -> Result<(), ClientError> {
        info!("Closing ledger client");
        self.invoke_pool.shutdown()?;
        self.query_pool.shutdown()
    }

    pub fn consortium_channel_id(&self) -> &str {
        &self.config.consortium_channel_id
    }

    pub fn org_channel_id(&self) -> Option<&str> {
        self.config.org_channel_id.as_deref()
    }

    pub fn organization(&self) -> &str {
        &self.config.organization
    }

    pub fn event_timeout(&self) -> Duration {
        self.config.event_timeout
    }

    pub fn notification_delay(&self) -> Duration {
        self.config.notification_delay
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

fn build_request(
    procedure_id: &str,
    args: &[&str],
    transient: Option<TransientMap>,
) -> Result<Request, ClientError> {
    let Some((function, rest)) = args.split_first() else {
        return Err(ClientError::MalformedRequest(
            "no function name given".to_string(),
        ));
    };
    if procedure_id.is_empty() {
        return Err(ClientError::MalformedRequest(
            "no procedure id given".to_string(),
        ));
    }

    Ok(Request {
        procedure_id: procedure_id.to_string(),
        function: function.to_string(),
        args: rest.iter().map(|arg| arg.as_bytes().to_vec()).collect(),
        transient: transient.unwrap_or_default(),
    })
}
