//! Service runtime
//!
//! Serves the marbles HTTP API and runs queued batch loads against the ledger,
//! each batch on its own task.
use crate::{
    config::ServiceConfig,
    error::RuntimeError,
    server::{router, server_task, ServerState},
};
use async_channel::{bounded, Receiver};
use marbles::{LoadGenerator, Marbles};
use marbles_client::{LedgerClient, LedgerTransport};
use marbles_core::BatchConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, instrument, Instrument};

/// A batch accepted by `/batch_run`, waiting for the batch task.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub batch_id: String,
    pub request: BatchConfig,
}

/// # Example
///
/// ```ignore
/// let config = ServiceConfig::load(Path::new("marbles.toml"))?;
/// MarblesRuntime::new(config).run().await?;
/// ```
pub struct MarblesRuntime {
    config: ServiceConfig,
}

impl MarblesRuntime {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    /// Overrides `[http] listen`.
    pub fn listen(mut self, addr: SocketAddr) -> Self {
        self.config.http.listen = addr;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Connects to the configured peers over HTTP and serves until the server
    /// or the batch task fails.
    #[instrument(name = "marbles", skip_all, fields(listen = %self.config.http.listen))]
    pub async fn run(self) -> Result<(), RuntimeError> {
        let client = LedgerClient::connect(self.config.client.clone())?;
        self.run_with(Arc::new(client)).await
    }

    pub async fn run_with<T: LedgerTransport>(
        self,
        client: Arc<LedgerClient<T>>,
    ) -> Result<(), RuntimeError> {
        let marbles = Marbles::with_ids(
            client,
            self.config.channel_id(),
            &self.config.ledger.procedure_id,
        );
        let (tx, rx) = bounded(self.config.batch.queue_size);

        let app = router(ServerState {
            marbles: marbles.clone(),
            batches: tx,
        });
        let listener = TcpListener::bind(self.config.http.listen).await?;

        tokio::try_join!(
            server_task(listener, app),
            batch_task(rx, marbles, self.config.batch.create_marble_attempts),
        )?;
        Ok(())
    }
}

/// Starts every queued batch on its own task. Returns once the queue closes.
pub(crate) async fn batch_task<T: LedgerTransport>(
    rx: Receiver<BatchJob>,
    marbles: Marbles<T>,
    create_attempts: usize,
) -> Result<(), RuntimeError> {
    while let Ok(job) = rx.recv().await {
        info!("Dequeued batch {}", job.batch_id);
        let generator = LoadGenerator::new(&job.batch_id, job.request, marbles.clone())
            .create_attempts(create_attempts);

        tokio::spawn(
            async move {
                if let Err(err) = generator.run().await {
                    error!("Batch {} failed: {err}", job.batch_id);
                }
            }
            .in_current_span(),
        );
    }
    Err(RuntimeError::ChannelClosed)
}
