use crate::BatchConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Status code of a worker or of a whole batch run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    /// The owner bootstrap set could not be established; the run was aborted.
    OwnerCreateFailed,
    /// A worker exhausted its create attempts.
    MarbleCreateFailed,
    /// A worker created its marble but none of its transfers went through.
    NoSuccessfulTransfers,
    /// A worker task panicked before reporting its metrics.
    WorkerFailed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Success => "success",
            BatchStatus::OwnerCreateFailed => "owner_create_failed",
            BatchStatus::MarbleCreateFailed => "marble_create_failed",
            BatchStatus::NoSuccessfulTransfers => "no_successful_transfers",
            BatchStatus::WorkerFailed => "worker_failed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-worker measurements.
///
/// `transfer_times` has one slot per iteration; a slot stays at
/// [`Duration::ZERO`] when that iteration's transfer failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerMetrics {
    pub transfer_times: Vec<Duration>,
    pub successes: usize,
    pub failures: usize,
    pub status: BatchStatus,
}

impl WorkerMetrics {
    pub fn new(iterations: usize) -> Self {
        Self {
            transfer_times: vec![Duration::ZERO; iterations],
            successes: 0,
            failures: 0,
            status: BatchStatus::Success,
        }
    }

    /// Metrics of a worker that stopped before running any transfer.
    pub fn terminated(iterations: usize, status: BatchStatus) -> Self {
        Self {
            status,
            ..Self::new(iterations)
        }
    }

    pub fn successful_times(&self) -> impl Iterator<Item = Duration> + '_ {
        self.transfer_times
            .iter()
            .copied()
            .filter(|dur| !dur.is_zero())
    }
}

/// Outcome of one batch run, persisted on the ledger once the run completes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub request: BatchConfig,
    pub status: BatchStatus,
    pub total_successes: usize,
    pub total_failures: usize,
    pub total_success_seconds: u64,
    pub average_transfer_seconds: f64,
    pub min_transfer_seconds: f64,
    pub max_transfer_seconds: f64,
}

impl BatchResult {
    /// Result stored for a run that never got to start its workers.
    pub fn aborted(request: BatchConfig, status: BatchStatus) -> Self {
        Self {
            request,
            status,
            total_successes: 0,
            total_failures: 0,
            total_success_seconds: 0,
            average_transfer_seconds: 0.,
            min_transfer_seconds: 0.,
            max_transfer_seconds: 0.,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BatchStatus::Success
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status={}, transfers={}, failures={}, successSeconds={}, avg={:.3}s, min={:.3}s, max={:.3}s",
            self.status,
            self.total_successes,
            self.total_failures,
            self.total_success_seconds,
            self.average_transfer_seconds,
            self.min_transfer_seconds,
            self.max_transfer_seconds,
        )
    }
}
