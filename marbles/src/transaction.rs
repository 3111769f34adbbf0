use marbles_core::TransactionLabels;
use std::future::Future;
use std::time::{Duration, Instant};

/// Runs `func`, recording its latency and outcome under `labels`.
///
/// The returned duration is never zero, so a recorded success can always be
/// told apart from an empty slot.
pub async fn timed_transaction<F, R, E>(
    labels: TransactionLabels,
    func: F,
) -> (Result<R, E>, Duration)
where
    F: Future<Output = Result<R, E>>,
{
    let start = Instant::now();
    let res = func.await;
    let elapsed = start.elapsed().max(Duration::from_nanos(1));

    #[cfg(feature = "metrics")]
    {
        metrics::histogram!(labels.latency).record(elapsed.as_secs_f64());
        if res.is_ok() {
            metrics::counter!(labels.success).increment(1);
        } else {
            metrics::counter!(labels.error).increment(1);
        }
    }
    #[cfg(not(feature = "metrics"))]
    let _ = labels;

    (res, elapsed)
}

/// Registers descriptions of the harness metrics with the installed recorder.
#[cfg(feature = "metrics")]
pub fn describe_metrics() {
    use marbles_core::{CREATE_MARBLE_LABELS, TRANSFER_LABELS};

    for labels in [CREATE_MARBLE_LABELS, TRANSFER_LABELS] {
        metrics::describe_histogram!(labels.latency, metrics::Unit::Seconds, "Ledger call latency");
        metrics::describe_counter!(labels.success, "Successful ledger calls");
        metrics::describe_counter!(labels.error, "Failed ledger calls");
    }
}
