use crate::{error::RuntimeError, runtime::BatchJob};
use async_channel::Sender;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use marbles::{random, Marbles, MarblesError};
use marbles_client::LedgerTransport;
use marbles_core::{
    BatchConfig, BatchResult, ClearMarblesResponse, InitBatchResponse, Marble, Owner,
    Response as LedgerResponse, Transfer,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument};

pub struct ServerState<T> {
    pub marbles: Marbles<T>,
    pub batches: Sender<BatchJob>,
}

pub fn router<T: LedgerTransport>(state: ServerState<T>) -> Router {
    Router::new()
        .route("/hello", get(hello))
        .route("/owner", post(create_owner::<T>))
        .route("/owner/:id", get(get_owner::<T>))
        .route("/marble", post(create_marble::<T>))
        .route(
            "/marble/:id",
            get(get_marble::<T>).delete(delete_marble::<T>),
        )
        .route("/transfer", post(transfer::<T>))
        .route("/clear_marbles", post(clear_marbles::<T>))
        .route("/batch_run", post(start_batch::<T>))
        .route("/batch_run/:id", get(batch_result::<T>))
        .with_state(Arc::new(state))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

pub(crate) async fn server_task(listener: TcpListener, app: Router) -> Result<(), RuntimeError> {
    let addr: SocketAddr = listener.local_addr()?;
    info!("Listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Error, Debug)]
pub(crate) enum HandlerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Result of batch {0} not yet available")]
    NotYetAvailable(String),

    #[error("{0}")]
    Marbles(#[from] MarblesError),

    #[error("Batch queue closed (batch task has likely fallen over)")]
    Queue(#[from] async_channel::SendError<BatchJob>),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        use HandlerError::*;
        let status = match &self {
            NotFound(_) | NotYetAvailable(_) => StatusCode::NOT_FOUND,
            Marbles(_) | Queue(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("{self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

type Shared<T> = State<Arc<ServerState<T>>>;

async fn hello() -> &'static str {
    "Hello World\n"
}

#[instrument(skip(state))]
async fn create_owner<T: LedgerTransport>(
    State(state): Shared<T>,
    Json(owner): Json<Owner>,
) -> Result<Json<LedgerResponse>, HandlerError> {
    Ok(Json(state.marbles.create_owner(&owner).await?))
}

#[instrument(skip(state))]
async fn get_owner<T: LedgerTransport>(
    State(state): Shared<T>,
    Path(id): Path<String>,
) -> Result<Json<Owner>, HandlerError> {
    match state.marbles.get_owner(&id).await? {
        Some(owner) => Ok(Json(owner)),
        None => Err(HandlerError::NotFound(format!("Owner {id}"))),
    }
}

#[instrument(skip(state))]
async fn create_marble<T: LedgerTransport>(
    State(state): Shared<T>,
    Json(marble): Json<Marble>,
) -> Result<Json<LedgerResponse>, HandlerError> {
    Ok(Json(state.marbles.create_marble(&marble).await?))
}

#[instrument(skip(state))]
async fn get_marble<T: LedgerTransport>(
    State(state): Shared<T>,
    Path(id): Path<String>,
) -> Result<Json<Marble>, HandlerError> {
    match state.marbles.get_marble(&id).await? {
        Some(marble) => Ok(Json(marble)),
        None => Err(HandlerError::NotFound(format!("Marble {id}"))),
    }
}

/// Deletes a marble on behalf of its current owner.
#[instrument(skip(state))]
async fn delete_marble<T: LedgerTransport>(
    State(state): Shared<T>,
    Path(id): Path<String>,
) -> Result<Json<LedgerResponse>, HandlerError> {
    let Some(marble) = state.marbles.get_marble(&id).await? else {
        return Err(HandlerError::NotFound(format!("Marble {id}")));
    };
    let res = state
        .marbles
        .delete_marble(&id, &marble.owner.company)
        .await?;
    Ok(Json(res))
}

#[instrument(skip(state))]
async fn transfer<T: LedgerTransport>(
    State(state): Shared<T>,
    Json(transfer): Json<Transfer>,
) -> Result<Json<LedgerResponse>, HandlerError> {
    Ok(Json(state.marbles.transfer(&transfer).await?))
}

#[instrument(skip(state))]
async fn clear_marbles<T: LedgerTransport>(
    State(state): Shared<T>,
) -> Result<Json<ClearMarblesResponse>, HandlerError> {
    Ok(Json(state.marbles.clear_marbles().await?))
}

#[instrument(skip(state))]
async fn start_batch<T: LedgerTransport>(
    State(state): Shared<T>,
    Json(request): Json<BatchConfig>,
) -> Result<Json<InitBatchResponse>, HandlerError> {
    let batch_id = random::batch_id();
    debug!("Queueing batch {batch_id}");
    state
        .batches
        .send(BatchJob {
            batch_id: batch_id.clone(),
            request,
        })
        .await?;
    Ok(Json(InitBatchResponse { batch_id }))
}

#[instrument(skip(state))]
async fn batch_result<T: LedgerTransport>(
    State(state): Shared<T>,
    Path(id): Path<String>,
) -> Result<Json<BatchResult>, HandlerError> {
    match state.marbles.fetch_batch_result(&id).await? {
        Some(result) => Ok(Json(result)),
        None => Err(HandlerError::NotYetAvailable(id)),
    }
}
