use crate::{
    error::{codes, ClientError},
    peer::Peer,
    transport::{Call, CallKind, EventSubscription, LedgerResponse, LedgerTransport},
    wire::{WireEvent, WireRequest, WireResponse},
};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tracing::{debug, error, trace, warn};
use tungstenite::protocol::Message as TMessage;
use url::Url;

const EVENT_BUFFER: usize = 64;

/// Transport speaking the ledger's HTTP/JSON protocol, with events over WebSocket.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| ClientError::Configuration(format!("HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

fn call_url(peer: &Peer, channel_id: &str, kind: CallKind) -> Result<Url, ClientError> {
    let action = match kind {
        CallKind::Invoke => "invoke",
        CallKind::Query => "query",
    };
    Ok(Url::parse(&format!(
        "{}/channels/{channel_id}/{action}",
        peer.url.trim_end_matches('/')
    ))?)
}

fn events_url(
    peer: &Peer,
    channel_id: &str,
    procedure_id: &str,
    event_id: &str,
) -> Result<Url, ClientError> {
    let mut url = Url::parse(&format!(
        "{}/channels/{channel_id}/events/{procedure_id}/{event_id}",
        peer.url.trim_end_matches('/')
    ))?;

    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme).map_err(|_| {
        ClientError::Subscription(format!("Cannot derive a WebSocket URL from {}", peer.url))
    })?;
    Ok(url)
}

fn transport_error(peer: &Peer, err: reqwest::Error) -> ClientError {
    let code = if err.is_timeout() {
        codes::TIMEOUT
    } else if err.is_connect() {
        codes::CONNECTION_FAILED
    } else {
        codes::UNAVAILABLE
    };
    ClientError::Transport {
        peer: peer.url.clone(),
        code,
        message: err.to_string(),
    }
}

impl LedgerTransport for HttpTransport {
    async fn execute(&self, call: &Call) -> Result<LedgerResponse, ClientError> {
        let peer = call.target()?;
        let url = call_url(peer, &call.channel_id, call.kind)?;
        let endorsers = call.targets.iter().map(|p| p.url.clone()).collect();
        let body = WireRequest::new(&call.request, endorsers);

        trace!("{:?} {} at {url}", call.kind, call.request.function);
        let res = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error(peer, err))?;

        let status = res.status();
        if status.is_server_error() {
            return Err(ClientError::Transport {
                peer: peer.url.clone(),
                code: codes::UNAVAILABLE,
                message: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(ClientError::Protocol {
                peer: peer.url.clone(),
                status: status.as_u16(),
            });
        }

        let bytes = res.bytes().await.map_err(|err| transport_error(peer, err))?;
        let wire: WireResponse = serde_json::from_slice(&bytes)?;
        LedgerResponse::try_from(wire)
    }

    async fn subscribe(
        &self,
        peer: &Peer,
        channel_id: &str,
        procedure_id: &str,
        event_id: &str,
    ) -> Result<EventSubscription, ClientError> {
        let url = events_url(peer, channel_id, procedure_id, event_id)?;
        let (mut stream, _) = connect_async(url.as_str())
            .await
            .map_err(|err| ClientError::Subscription(format!("{url}: {err}")))?;
        debug!("Subscribed to {procedure_id}/{event_id} at {url}");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let source_url = peer.url.clone();
        let task = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let text = match message {
                    Ok(TMessage::Text(text)) => text,
                    Ok(TMessage::Close(_)) => break,
                    Ok(_) => continue,
                    Err(err) => {
                        warn!("Event stream from {source_url} failed: {err}");
                        break;
                    }
                };

                let event = serde_json::from_str::<WireEvent>(&text)
                    .map_err(ClientError::from)
                    .and_then(|wire| wire.into_event(&source_url));
                match event {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => error!("Dropping malformed event from {source_url}: {err}"),
                }
            }
        });

        Ok(EventSubscription::new(rx, Some(task)))
    }
}
