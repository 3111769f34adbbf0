use crate::{
    aggregate::{aggregate, LatencySummary},
    error::MarblesError,
    ops::Marbles,
    owners::{bootstrap_owners, OwnerPool},
    worker::Worker,
};
use marbles_client::LedgerTransport;
use marbles_core::{
    BatchConfig, BatchResult, BatchStatus, Owner, WorkerMetrics, CREATE_MARBLE_MAX_ATTEMPTS,
};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchState {
    Initializing,
    Running,
    Completed,
    Aborted,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            BatchState::Initializing => "initializing",
            BatchState::Running => "running",
            BatchState::Completed => "completed",
            BatchState::Aborted => "aborted",
        };
        f.write_str(state)
    }
}

/// Drives one batch run: bootstraps owners, fans out `concurrency` workers,
/// joins all of them and persists the aggregated [`BatchResult`].
///
/// A started run cannot be cancelled. Callers observe it by polling the
/// stored result under the batch id.
pub struct LoadGenerator<T> {
    batch_id: String,
    request: BatchConfig,
    marbles: Marbles<T>,
    owners: Vec<Owner>,
    create_attempts: usize,
    state: BatchState,
}

impl<T: LedgerTransport> LoadGenerator<T> {
    pub fn new(batch_id: &str, request: BatchConfig, marbles: Marbles<T>) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            request,
            marbles,
            owners: bootstrap_owners(),
            create_attempts: CREATE_MARBLE_MAX_ATTEMPTS,
            state: BatchState::Initializing,
        }
    }

    /// Caps marble creation attempts per worker.
    pub fn create_attempts(mut self, attempts: usize) -> Self {
        self.create_attempts = attempts.max(1);
        self
    }

    /// Replaces the bootstrap owner set.
    pub fn owners(mut self, owners: Vec<Owner>) -> Self {
        self.owners = owners;
        self
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Runs the batch to completion and stores its result.
    ///
    /// Failing to establish the owners aborts the run: an
    /// `owner_create_failed` result is stored and returned. An error is only
    /// returned when the result itself could not be stored.
    #[instrument(name = "batch", skip_all, fields(id = %self.batch_id))]
    pub async fn run(mut self) -> Result<BatchResult, MarblesError> {
        info!("Starting batch {} with {}", self.batch_id, self.request);
        let start = Instant::now();

        let owners = match OwnerPool::establish(&self.marbles, self.owners.clone()).await {
            Ok(owners) => Arc::new(owners),
            Err(err) => {
                error!("Owner bootstrap failed: {err}");
                return self.abort(BatchStatus::OwnerCreateFailed).await;
            }
        };

        if self.request.clear_marbles {
            match self.marbles.clear_marbles().await {
                Ok(res) => info!(
                    "Cleared marbles: found {}, deleted {} ({})",
                    res.found, res.deleted, res.tx_id
                ),
                Err(err) => warn!("Clearing marbles failed, continuing: {err}"),
            }
        }

        self.transition(BatchState::Running);
        let workers = self.run_workers(owners).await;

        let result = aggregate(self.request.clone(), &workers);
        self.transition(BatchState::Completed);
        info!(
            "Batch {} finished in {:?}: {result}",
            self.batch_id,
            start.elapsed()
        );
        info!("Transfer latency: {}", LatencySummary::new(&workers));

        self.marbles
            .store_batch_result(&self.batch_id, &result)
            .await?;
        Ok(result)
    }

    async fn run_workers(&self, owners: Arc<OwnerPool>) -> Vec<WorkerMetrics> {
        let handles: Vec<_> = (1..=self.request.concurrency)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    &self.request,
                    self.create_attempts,
                    owners.clone(),
                    self.marbles.clone(),
                );
                tokio::spawn(worker.run())
            })
            .collect();

        let mut workers = Vec::with_capacity(handles.len());
        for (idx, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(metrics) => {
                    info!(
                        "Worker {} done: {} successes, {} failures, {}",
                        idx + 1,
                        metrics.successes,
                        metrics.failures,
                        metrics.status
                    );
                    workers.push(metrics);
                }
                Err(err) => {
                    error!("Worker {} did not complete: {err}", idx + 1);
                    workers.push(WorkerMetrics::terminated(
                        self.request.iterations,
                        BatchStatus::WorkerFailed,
                    ));
                }
            }
        }
        workers
    }

    async fn abort(mut self, status: BatchStatus) -> Result<BatchResult, MarblesError> {
        self.transition(BatchState::Aborted);
        let result = BatchResult::aborted(self.request.clone(), status);
        self.marbles
            .store_batch_result(&self.batch_id, &result)
            .await?;
        Ok(result)
    }

    fn transition(&mut self, next: BatchState) {
        info!("Batch {}: {} -> {next}", self.batch_id, self.state);
        self.state = next;
    }
}
