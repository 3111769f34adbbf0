use crate::{
    error::ClientError,
    peer::Peer,
    retry::{
        RetryPolicy, DEFAULT_BACKOFF_FACTOR, DEFAULT_INITIAL_BACKOFF, DEFAULT_INVOKE_MAX_ATTEMPTS,
        DEFAULT_MAX_BACKOFF, DEFAULT_QUERY_MAX_ATTEMPTS,
    },
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use std::collections::BTreeSet;
use std::time::Duration;

/// Settings of a [`LedgerClient`](crate::LedgerClient).
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClientConfig {
    /// Identity the client acts as.
    #[serde(default)]
    pub user_id: String,
    /// Replica group the client belongs to.
    #[serde(default)]
    pub organization: String,

    #[serde(default)]
    pub query_max_attempts: u32,
    #[serde(default)]
    pub invoke_max_attempts: u32,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "initial_backoff_ms", default = "default_initial_backoff")]
    pub initial_backoff: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "max_backoff_ms", default = "default_max_backoff")]
    pub max_backoff: Duration,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "request_timeout_seconds", default = "default_request_timeout")]
    pub request_timeout: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "event_timeout_seconds", default = "default_event_timeout")]
    pub event_timeout: Duration,
    /// Settle delay applied by multi-message event waits.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "notification_delay_ms", default)]
    pub notification_delay: Duration,

    #[serde(default = "default_consortium")]
    pub consortium_channel_id: String,
    #[serde(default)]
    pub org_channel_id: Option<String>,
    /// Channels served by `peers`. Defaults to the consortium channel.
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub peers: Vec<Peer>,
}

fn default_initial_backoff() -> Duration {
    DEFAULT_INITIAL_BACKOFF
}

fn default_max_backoff() -> Duration {
    DEFAULT_MAX_BACKOFF
}

fn default_backoff_factor() -> f64 {
    DEFAULT_BACKOFF_FACTOR
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_event_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_consortium() -> String {
    "consortium".to_string()
}

impl ClientConfig {
    pub fn new(user_id: &str, organization: &str, peers: Vec<Peer>) -> Self {
        Self {
            user_id: user_id.to_string(),
            organization: organization.to_string(),
            query_max_attempts: 0,
            invoke_max_attempts: 0,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            request_timeout: default_request_timeout(),
            event_timeout: default_event_timeout(),
            notification_delay: Duration::ZERO,
            consortium_channel_id: default_consortium(),
            org_channel_id: None,
            channels: vec![],
            peers,
        }
    }

    pub fn backoff(mut self, initial: Duration, max: Duration, factor: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_factor = factor;
        self
    }

    pub fn notification_delay(mut self, delay: Duration) -> Self {
        self.notification_delay = delay;
        self
    }

    pub fn event_timeout(mut self, timeout: Duration) -> Self {
        self.event_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.user_id.trim().is_empty() {
            return Err(ClientError::Configuration(
                "missing client credentials (user_id)".to_string(),
            ));
        }
        if self.organization.trim().is_empty() {
            return Err(ClientError::Configuration(
                "missing client organization".to_string(),
            ));
        }
        if self.peers.is_empty() {
            return Err(ClientError::Configuration("no peers configured".to_string()));
        }
        if !self.peers.iter().any(|p| p.group == self.organization) {
            return Err(ClientError::Configuration(format!(
                "organization {} has no configured peer",
                self.organization
            )));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ClientError::Configuration(format!(
                "backoff factor must be at least 1.0, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }

    /// Channels the configured peers serve, consortium and org channel included.
    pub fn served_channels(&self) -> BTreeSet<String> {
        let mut channels: BTreeSet<String> = self.channels.iter().cloned().collect();
        channels.insert(self.consortium_channel_id.clone());
        if let Some(org) = &self.org_channel_id {
            channels.insert(org.clone());
        }
        channels
    }

    pub fn invoke_policy(&self) -> RetryPolicy {
        self.policy(self.invoke_max_attempts, DEFAULT_INVOKE_MAX_ATTEMPTS)
    }

    pub fn query_policy(&self) -> RetryPolicy {
        self.policy(self.query_max_attempts, DEFAULT_QUERY_MAX_ATTEMPTS)
    }

    fn policy(&self, configured: u32, default: u32) -> RetryPolicy {
        let attempts = if configured == 0 { default } else { configured };
        RetryPolicy::with_extra_codes(attempts).backoff(
            self.initial_backoff,
            self.max_backoff,
            self.backoff_factor,
        )
    }
}
