use crate::MockLedger;
use marbles_client::{
    codes, Call, ClientError, EventSubscription, LedgerEvent, LedgerResponse, LedgerTransport,
    Peer,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::trace;

/// In-process transport: every replica is served by the same [`MockLedger`].
#[derive(Clone)]
pub struct LocalTransport {
    ledger: Arc<MockLedger>,
    unreachable: Arc<Mutex<HashSet<String>>>,
}

impl LocalTransport {
    pub fn new(ledger: Arc<MockLedger>) -> Self {
        Self {
            ledger,
            unreachable: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn ledger(&self) -> &Arc<MockLedger> {
        &self.ledger
    }

    /// Calls sent to `url` fail with a connection error until it is reachable again.
    pub fn set_reachable(&self, url: &str, reachable: bool) {
        let mut unreachable = self
            .unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if reachable {
            unreachable.remove(url);
        } else {
            unreachable.insert(url.to_string());
        }
    }

    fn is_reachable(&self, url: &str) -> bool {
        !self
            .unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }
}

impl LedgerTransport for LocalTransport {
    async fn execute(&self, call: &Call) -> Result<LedgerResponse, ClientError> {
        let peer = call.target()?;
        if !self.is_reachable(&peer.url) {
            return Err(ClientError::Transport {
                peer: peer.url.clone(),
                code: codes::CONNECTION_FAILED,
                message: "connection refused".to_string(),
            });
        }

        trace!("{:?} {} at {}", call.kind, call.request.function, peer.url);
        Ok(self.ledger.handle(call.kind, &call.request).await)
    }

    async fn subscribe(
        &self,
        peer: &Peer,
        _channel_id: &str,
        procedure_id: &str,
        event_id: &str,
    ) -> Result<EventSubscription, ClientError> {
        let mut events = self.ledger.subscribe();
        let (tx, rx) = mpsc::channel(64);
        let source_url = peer.url.clone();
        let procedure_id = procedure_id.to_string();
        let event_id = event_id.to_string();

        let task = tokio::spawn(async move {
            loop {
                let wire = match events.recv().await {
                    Ok(wire) => wire,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                };
                if wire.procedure_id != procedure_id || wire.event_id != event_id {
                    continue;
                }

                let event: LedgerEvent = match wire.into_event(&source_url) {
                    Ok(event) => event,
                    Err(_) => continue,
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(EventSubscription::new(rx, Some(task)))
    }
}
