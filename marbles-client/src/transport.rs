use crate::{error::ClientError, peer::Peer};
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type TransientMap = HashMap<String, Vec<u8>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
    Invoke,
    Query,
}

/// A procedure call, independent of where it is sent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Request {
    pub procedure_id: String,
    pub function: String,
    pub args: Vec<Vec<u8>>,
    pub transient: TransientMap,
}

/// A request addressed to a set of replicas. `targets[0]` receives the call; the
/// full list is forwarded as the endorsement set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub kind: CallKind,
    pub channel_id: String,
    pub targets: Vec<Peer>,
    pub request: Request,
}

impl Call {
    pub fn target(&self) -> Result<&Peer, ClientError> {
        self.targets
            .first()
            .ok_or_else(|| ClientError::NoPeersAvailable {
                channel: self.channel_id.clone(),
                filter: None,
            })
    }
}

/// What the ledger answered to a call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerResponse {
    pub status: i32,
    pub payload: Vec<u8>,
    pub message: String,
    pub tx_id: String,
}

/// An event emitted by a procedure, stamped with the replica it was received from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEvent {
    pub tx_id: String,
    pub procedure_id: String,
    pub event_id: String,
    pub source_url: String,
    pub payload: Vec<u8>,
}

/// Cancellable stream of events. Dropping it cancels the subscription.
pub struct EventSubscription {
    events: mpsc::Receiver<LedgerEvent>,
    task: Option<JoinHandle<()>>,
}

impl EventSubscription {
    /// Subscription fed by `events`; `task` is the forwarding task, aborted on cancel.
    pub fn new(events: mpsc::Receiver<LedgerEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { events, task }
    }

    /// Next event, or `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<LedgerEvent> {
        self.events.recv().await
    }

    pub fn cancel(&mut self) {
        self.events.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The ledger's request/response and event primitives.
pub trait LedgerTransport: Send + Sync + 'static {
    /// Sends `call` to its first target and returns the ledger's answer, whatever
    /// its status. Only failures to get an answer are errors.
    fn execute(
        &self,
        call: &Call,
    ) -> impl Future<Output = Result<LedgerResponse, ClientError>> + Send;

    /// Subscribes to `event_id` events of `procedure_id` on `channel_id` at `peer`.
    fn subscribe(
        &self,
        peer: &Peer,
        channel_id: &str,
        procedure_id: &str,
        event_id: &str,
    ) -> impl Future<Output = Result<EventSubscription, ClientError>> + Send;
}
