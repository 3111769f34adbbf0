use crate::{
    error::ClientError,
    peer::Peer,
    transport::{Call, EventSubscription, LedgerEvent, LedgerResponse, LedgerTransport},
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};

pub(crate) enum Scripted {
    Status(i32, &'static str),
    Transport(i32),
}

/// Transport answering from a per-function script, then with 200 and the
/// function's canned payload.
pub(crate) struct FakeTransport {
    script: Mutex<HashMap<String, VecDeque<Scripted>>>,
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<Call>>,
    events: broadcast::Sender<(String, Vec<u8>)>,
}

impl FakeTransport {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            script: Mutex::new(HashMap::new()),
            payloads: Mutex::new(HashMap::new()),
            calls: Mutex::new(vec![]),
            events,
        }
    }

    pub fn script(&self, function: &str, steps: Vec<Scripted>) {
        self.script
            .lock()
            .unwrap()
            .insert(function.to_string(), steps.into());
    }

    pub fn payload(&self, function: &str, payload: &[u8]) {
        self.payloads
            .lock()
            .unwrap()
            .insert(function.to_string(), payload.to_vec());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn emit(&self, event_id: &str) {
        let _ = self.events.send((event_id.to_string(), vec![]));
    }
}

impl LedgerTransport for FakeTransport {
    async fn execute(&self, call: &Call) -> Result<LedgerResponse, ClientError> {
        self.calls.lock().unwrap().push(call.clone());
        let peer = call.target()?.url.clone();

        let function = &call.request.function;
        let step = self
            .script
            .lock()
            .unwrap()
            .get_mut(function)
            .and_then(|steps| steps.pop_front());

        match step {
            Some(Scripted::Status(status, message)) => Ok(LedgerResponse {
                status,
                message: message.to_string(),
                tx_id: format!("tx-{}", self.calls.lock().unwrap().len()),
                ..Default::default()
            }),
            Some(Scripted::Transport(code)) => Err(ClientError::Transport {
                peer,
                code,
                message: "scripted".to_string(),
            }),
            None => Ok(LedgerResponse {
                status: 200,
                payload: self
                    .payloads
                    .lock()
                    .unwrap()
                    .get(function)
                    .cloned()
                    .unwrap_or_default(),
                message: String::new(),
                tx_id: format!("tx-{}", self.calls.lock().unwrap().len()),
            }),
        }
    }

    async fn subscribe(
        &self,
        peer: &Peer,
        _channel_id: &str,
        procedure_id: &str,
        event_id: &str,
    ) -> Result<EventSubscription, ClientError> {
        let mut events = self.events.subscribe();
        let (tx, rx) = mpsc::channel(64);
        let source_url = peer.url.clone();
        let procedure_id = procedure_id.to_string();
        let event_id = event_id.to_string();

        let task = tokio::spawn(async move {
            while let Ok((id, payload)) = events.recv().await {
                if id != event_id {
                    continue;
                }
                let event = LedgerEvent {
                    tx_id: String::new(),
                    procedure_id: procedure_id.clone(),
                    event_id: id,
                    source_url: source_url.clone(),
                    payload,
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(EventSubscription::new(rx, Some(task)))
    }
}
