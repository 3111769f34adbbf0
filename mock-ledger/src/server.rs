use crate::MockLedger;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use marbles_client::{
    wire::{WireRequest, WireResponse},
    CallKind,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub async fn run(addr: SocketAddr, ledger: Arc<MockLedger>) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    serve(listener, ledger).await
}

pub async fn serve(listener: TcpListener, ledger: Arc<MockLedger>) -> std::io::Result<()> {
    info!("Mock ledger listening on {}", listener.local_addr()?);
    axum::serve(listener, router(ledger)).await
}

pub fn router(ledger: Arc<MockLedger>) -> Router {
    Router::new()
        .route("/channels/:channel/invoke", post(invoke))
        .route("/channels/:channel/query", post(query))
        .route("/channels/:channel/events/:procedure/:event", get(events))
        .layer(TraceLayer::new_for_http())
        .with_state(ledger)
}

async fn invoke(
    State(ledger): State<Arc<MockLedger>>,
    Path(channel): Path<String>,
    Json(body): Json<WireRequest>,
) -> Response {
    handle(ledger, channel, CallKind::Invoke, body).await
}

async fn query(
    State(ledger): State<Arc<MockLedger>>,
    Path(channel): Path<String>,
    Json(body): Json<WireRequest>,
) -> Response {
    handle(ledger, channel, CallKind::Query, body).await
}

async fn handle(
    ledger: Arc<MockLedger>,
    channel: String,
    kind: CallKind,
    body: WireRequest,
) -> Response {
    let request = match body.decode() {
        Ok(request) => request,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    debug!("{kind:?} {} on {channel}", request.function);
    let res = ledger.handle(kind, &request).await;
    Json(WireResponse::from(&res)).into_response()
}

async fn events(
    ws: WebSocketUpgrade,
    State(ledger): State<Arc<MockLedger>>,
    Path((channel, procedure, event)): Path<(String, String, String)>,
) -> Response {
    debug!("Event subscription to {procedure}/{event} on {channel}");
    ws.on_upgrade(move |socket| forward_events(socket, ledger, procedure, event))
}

async fn forward_events(
    mut socket: WebSocket,
    ledger: Arc<MockLedger>,
    procedure: String,
    event: String,
) {
    let mut events = ledger.subscribe();
    loop {
        let wire = match events.recv().await {
            Ok(wire) => wire,
            Err(RecvError::Lagged(n)) => {
                warn!("Event subscriber lagged by {n} events");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if wire.procedure_id != procedure || wire.event_id != event {
            continue;
        }

        let text = match serde_json::to_string(&wire) {
            Ok(text) => text,
            Err(err) => {
                warn!("Cannot encode event: {err}");
                continue;
            }
        };
        if socket.send(Message::Text(text)).await.is_err() {
            debug!("Event subscriber went away");
            break;
        }
    }
}
