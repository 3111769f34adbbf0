use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::fmt;
use std::time::Duration;

/// Parameters of one batch run.
///
/// Immutable for the lifetime of the run; it is echoed back verbatim inside the
/// persisted [`BatchResult`](crate::BatchResult).
#[serde_as]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfig {
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// Number of ownership transfers each worker performs.
    pub iterations: usize,
    /// Pause before every transfer.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "delaySeconds", default)]
    pub delay: Duration,
    /// Remove every marble from the ledger before the run starts.
    #[serde(rename = "clearMarbles", default)]
    pub clear_marbles: bool,
    /// Length of the random payload attached to each marble.
    #[serde(default)]
    pub extra_data_length: usize,
}

impl BatchConfig {
    pub fn new(concurrency: usize, iterations: usize) -> Self {
        Self {
            concurrency,
            iterations,
            ..Default::default()
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn clear_marbles(mut self, clear: bool) -> Self {
        self.clear_marbles = clear;
        self
    }

    pub fn extra_data_length(mut self, len: usize) -> Self {
        self.extra_data_length = len;
        self
    }

    /// Number of transfers the run performs when every worker creates its marble.
    pub fn planned_transfers(&self) -> usize {
        self.concurrency * self.iterations
    }
}

impl fmt::Display for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "concurrency={}, iterations={}, delay={}, clearMarbles={}, extraDataLength={}",
            self.concurrency,
            self.iterations,
            humantime::format_duration(self.delay),
            self.clear_marbles,
            self.extra_data_length,
        )
    }
}

/// Reply to a batch start request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitBatchResponse {
    pub batch_id: String,
}
