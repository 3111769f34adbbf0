use crate::{
    client::LedgerClient,
    error::ClientError,
    transport::{EventSubscription, LedgerTransport},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerState {
    Unregistered,
    Registered,
    Waiting,
    Fired,
    TimedOut,
    Closed,
}

/// Single-use waiter for events emitted by one procedure on one channel.
pub struct EventListener<T> {
    client: Arc<LedgerClient<T>>,
    channel_id: String,
    procedure_id: String,
    event_id: Option<String>,
    subscription: Option<EventSubscription>,
    state: ListenerState,
}

impl<T: LedgerTransport> EventListener<T> {
    pub fn new(client: Arc<LedgerClient<T>>, channel_id: &str, procedure_id: &str) -> Self {
        Self {
            client,
            channel_id: channel_id.to_string(),
            procedure_id: procedure_id.to_string(),
            event_id: None,
            subscription: None,
            state: ListenerState::Unregistered,
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Subscribes to `event_id`. Fails if the channel client cannot be obtained.
    pub async fn register(&mut self, event_id: &str) -> Result<(), ClientError> {
        if self.state != ListenerState::Unregistered {
            return Err(ClientError::Subscription(format!(
                "listener is {:?}, cannot register {event_id}",
                self.state
            )));
        }

        let channel = self.client.channel_client(&self.channel_id)?;
        let subscription = channel.register_event(&self.procedure_id, event_id).await?;
        debug!("Registered for {}/{event_id}", self.procedure_id);

        self.subscription = Some(subscription);
        self.event_id = Some(event_id.to_string());
        self.state = ListenerState::Registered;
        Ok(())
    }

    /// Waits for `num_messages` events, at most `timeout` (the client's event
    /// timeout when `None` or zero). The subscription is dropped on return either way.
    ///
    /// A single-message wait returns the URL of the replica the event came from,
    /// right away. A multi-message wait returns `None` after sleeping the
    /// client's notification delay, so that replicas can catch up before
    /// follow-up reads.
    pub async fn block_wait(
        &mut self,
        timeout: Option<Duration>,
        num_messages: usize,
    ) -> Result<Option<String>, ClientError> {
        let num_messages = num_messages.max(1);
        let event_id = self.event_id.clone().unwrap_or_default();
        let Some(mut subscription) = self.subscription.take() else {
            return Err(ClientError::Subscription(format!(
                "listener is {:?}, nothing to wait for",
                self.state
            )));
        };
        self.state = ListenerState::Waiting;

        let timeout = timeout
            .filter(|t| !t.is_zero())
            .unwrap_or_else(|| self.client.event_timeout());
        let deadline = Instant::now() + timeout;
        let mut received = 0;
        let mut source = None;

        while received < num_messages {
            match timeout_at(deadline, subscription.recv()).await {
                Ok(Some(event)) => {
                    received += 1;
                    source.get_or_insert(event.source_url);
                }
                Ok(None) => {
                    subscription.cancel();
                    self.state = ListenerState::Closed;
                    return Err(ClientError::Subscription(format!(
                        "{event_id} stream closed after {received} events"
                    )));
                }
                Err(_) => {
                    subscription.cancel();
                    self.state = ListenerState::TimedOut;
                    warn!("Timed out waiting for {event_id}: {received}/{num_messages}");
                    return Err(ClientError::EventTimeout {
                        event_id,
                        expected: num_messages,
                        received,
                    });
                }
            }
        }

        subscription.cancel();
        self.state = ListenerState::Fired;

        if num_messages == 1 {
            return Ok(source);
        }

        let settle = self.client.notification_delay();
        if !settle.is_zero() {
            debug!("Got {received} {event_id} events, settling for {settle:?}");
            tokio::time::sleep(settle).await;
        }
        Ok(None)
    }

    /// Unregisters if still registered. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.state = ListenerState::Closed;
    }
}

impl<T> Drop for EventListener<T> {
    fn drop(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }
}
