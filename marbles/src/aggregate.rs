use marbles_core::{BatchConfig, BatchResult, BatchStatus, WorkerMetrics};
use pdatastructs::tdigest::{TDigest, K1};
use std::fmt;
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Reduces the metrics of every joined worker into the result of the run.
///
/// Only successful transfers count towards latency figures, rounded to the
/// millisecond. The run succeeds when every worker transferred at least once;
/// otherwise it takes the status of a worker that did not. When several such
/// workers report different statuses, the last one in `workers` wins.
pub fn aggregate(request: BatchConfig, workers: &[WorkerMetrics]) -> BatchResult {
    let mut status = BatchStatus::Success;
    let mut total_successes = 0;
    let mut total_failures = 0;
    let mut total = Duration::ZERO;
    let mut min: Option<Duration> = None;
    let mut max: Option<Duration> = None;

    for worker in workers {
        if worker.successes == 0 {
            status = worker.status;
        }
        total_successes += worker.successes;
        total_failures += worker.failures;

        for dur in worker.successful_times() {
            total += dur;
            min = Some(min.map_or(dur, |m| m.min(dur)));
            max = Some(max.map_or(dur, |m| m.max(dur)));
        }
    }

    let average = if total_successes == 0 {
        0.
    } else {
        total.as_secs_f64() / total_successes as f64
    };

    BatchResult {
        request,
        status,
        total_successes,
        total_failures,
        total_success_seconds: total.as_secs(),
        average_transfer_seconds: round_millis(average),
        min_transfer_seconds: round_millis(min.unwrap_or_default().as_secs_f64()),
        max_transfer_seconds: round_millis(max.unwrap_or_default().as_secs_f64()),
    }
}

fn round_millis(secs: f64) -> f64 {
    (secs * 1000.).round() / 1000.
}

/// Transfer latency distribution of a run, for the completion log.
pub struct LatencySummary {
    digest: TDigest<K1>,
    samples: usize,
}

impl LatencySummary {
    pub fn new(workers: &[WorkerMetrics]) -> Self {
        let mut digest = TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE);
        let mut samples = 0;
        for dur in workers.iter().flat_map(|w| w.successful_times()) {
            digest.insert(dur.as_secs_f64());
            samples += 1;
        }
        Self { digest, samples }
    }

    pub fn latency(&self, quantile: f64) -> Duration {
        if self.samples == 0 {
            return Duration::ZERO;
        }

        let secs = self.digest.quantile(quantile);
        // TDigest can hand back NaN on sparse input.
        let secs = if secs.is_finite() && secs >= 0. {
            secs
        } else {
            error!("Non-finite latency estimate for quantile {quantile}");
            0.
        };
        Duration::from_secs_f64(secs)
    }
}

impl fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p50={:?}, p90={:?}, p99={:?}",
            self.latency(0.5),
            self.latency(0.9),
            self.latency(0.99),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(times_ms: &[u64], failures: usize, status: BatchStatus) -> WorkerMetrics {
        let transfer_times: Vec<Duration> =
            times_ms.iter().map(|ms| Duration::from_millis(*ms)).collect();
        let successes = transfer_times.iter().filter(|t| !t.is_zero()).count();
        WorkerMetrics {
            transfer_times,
            successes,
            failures,
            status,
        }
    }

    #[test]
    fn averages_over_successes_only() {
        let workers = [
            worker(&[100, 0, 300], 1, BatchStatus::Success),
            worker(&[1500, 400, 1200], 0, BatchStatus::Success),
        ];
        let result = aggregate(BatchConfig::new(2, 3), &workers);

        assert_eq!(result.status, BatchStatus::Success);
        assert_eq!(result.total_successes, 5);
        assert_eq!(result.total_failures, 1);
        assert_eq!(result.total_success_seconds, 3);
        assert_eq!(result.average_transfer_seconds, 0.7);
        assert_eq!(result.min_transfer_seconds, 0.1);
        assert_eq!(result.max_transfer_seconds, 1.5);
        assert_eq!(
            result.total_successes + result.total_failures,
            result.request.planned_transfers()
        );
    }

    #[test]
    fn rounds_to_millis() {
        let workers = [WorkerMetrics {
            transfer_times: vec![Duration::from_micros(1_234_567)],
            successes: 1,
            failures: 0,
            status: BatchStatus::Success,
        }];
        let result = aggregate(BatchConfig::new(1, 1), &workers);
        assert_eq!(result.average_transfer_seconds, 1.235);
        assert_eq!(result.total_success_seconds, 1);
    }

    #[test]
    fn zero_success_worker_sets_status() {
        let workers = [
            worker(&[100], 0, BatchStatus::Success),
            WorkerMetrics::terminated(1, BatchStatus::MarbleCreateFailed),
        ];
        let result = aggregate(BatchConfig::new(2, 1), &workers);

        assert_eq!(result.status, BatchStatus::MarbleCreateFailed);
        assert_eq!(result.total_successes, 1);
        assert_eq!(result.total_failures, 0);
    }

    #[test]
    fn last_failing_worker_wins() {
        let workers = [
            WorkerMetrics::terminated(1, BatchStatus::WorkerFailed),
            worker(&[100], 0, BatchStatus::Success),
            WorkerMetrics::terminated(1, BatchStatus::MarbleCreateFailed),
        ];
        assert_eq!(
            aggregate(BatchConfig::new(3, 1), &workers).status,
            BatchStatus::MarbleCreateFailed
        );

        let reversed: Vec<_> = workers.iter().rev().cloned().collect();
        assert_eq!(
            aggregate(BatchConfig::new(3, 1), &reversed).status,
            BatchStatus::WorkerFailed
        );
    }

    #[test]
    fn no_successes_reports_zeros() {
        let workers = [worker(&[0, 0], 2, BatchStatus::NoSuccessfulTransfers)];
        let result = aggregate(BatchConfig::new(1, 2), &workers);

        assert_eq!(result.status, BatchStatus::NoSuccessfulTransfers);
        assert_eq!(result.average_transfer_seconds, 0.);
        assert_eq!(result.min_transfer_seconds, 0.);
        assert_eq!(result.max_transfer_seconds, 0.);
        assert_eq!(LatencySummary::new(&workers).latency(0.5), Duration::ZERO);
    }

    #[test]
    fn percentiles_are_ordered() {
        let times: Vec<u64> = (1..=200).collect();
        let workers = [worker(&times, 0, BatchStatus::Success)];
        let summary = LatencySummary::new(&workers);

        let p50 = summary.latency(0.5);
        let p99 = summary.latency(0.99);
        assert!(p50 <= p99);
        assert!(summary.to_string().starts_with("p50="));
    }
}
