use crate::error::{codes, ClientError, Status, StatusGroup};
use serde::Serialize;
use serde_with::{serde_as, DurationMilliSeconds};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_INVOKE_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_QUERY_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Attempt budget and retryable failure codes of one kind of call.
///
/// Configured once at startup and shared read-only afterwards.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "initialBackoffMs")]
    pub initial_backoff: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "maxBackoffMs")]
    pub max_backoff: Duration,
    pub backoff_factor: f64,
    pub retryable_codes: BTreeMap<StatusGroup, BTreeSet<i32>>,
}

impl RetryPolicy {
    /// Policy with the default code set: transport failures plus the default
    /// ledger status.
    pub fn new(max_attempts: u32) -> Self {
        let mut retryable_codes = BTreeMap::new();
        retryable_codes.insert(
            StatusGroup::Transport,
            BTreeSet::from([codes::CONNECTION_FAILED, codes::TIMEOUT, codes::UNAVAILABLE]),
        );
        retryable_codes.insert(StatusGroup::Ledger, BTreeSet::from([codes::BAD_REQUEST]));

        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retryable_codes,
        }
    }

    /// Default policy extended with the extra codes the marbles client retries on.
    pub fn with_extra_codes(max_attempts: u32) -> Self {
        Self::new(max_attempts)
            .retry_on(StatusGroup::Client, codes::NO_PEERS_FOUND)
            .retry_on(StatusGroup::Ledger, codes::PRECONDITION_FAILED)
            .retry_on(StatusGroup::Ledger, codes::INTERNAL_SERVER_ERROR)
            .retry_on(StatusGroup::Ledger, codes::NOT_IMPLEMENTED)
            .retry_on(StatusGroup::Ledger, codes::BAD_GATEWAY)
    }

    pub fn retry_on(mut self, group: StatusGroup, code: i32) -> Self {
        self.retryable_codes.entry(group).or_default().insert(code);
        self
    }

    pub fn backoff(mut self, initial: Duration, max: Duration, factor: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_factor = factor;
        self
    }

    /// Copy whose attempt budget is raised to `max_attempts`. Never lowers it.
    pub fn with_min_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts: self.max_attempts.max(max_attempts),
            ..self.clone()
        }
    }

    pub fn is_retryable(&self, status: Status) -> bool {
        self.retryable_codes
            .get(&status.group)
            .map(|codes| codes.contains(&status.code))
            .unwrap_or(false)
    }

    /// Pause before attempt `attempt + 1`, where `attempt` counts from 1.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_factor.powi(exp);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs.max(0.))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_extra_codes(DEFAULT_INVOKE_MAX_ATTEMPTS)
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempt budget is spent. `op` receives the attempt number.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ClientError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 1;
    loop {
        let err = match op(attempt).await {
            Ok(res) => return Ok(res),
            Err(err) => err,
        };

        let retryable = err.status().map_or(false, |s| policy.is_retryable(s));
        if !retryable {
            return Err(err);
        }

        if attempt >= policy.max_attempts {
            warn!("Giving up after {attempt} attempts: {err}");
            return Err(ClientError::Exhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }

        let pause = policy.backoff_after(attempt);
        debug!("Attempt {attempt} failed ({err}), retrying in {pause:?}");
        tokio::time::sleep(pause).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::with_extra_codes(max_attempts).backoff(Duration::ZERO, Duration::ZERO, 2.0)
    }

    fn rejected(status: i32) -> ClientError {
        ClientError::LedgerRejected {
            status,
            message: "nope".to_string(),
        }
    }

    #[test]
    fn code_groups() {
        let policy = RetryPolicy::with_extra_codes(4);
        assert!(policy.is_retryable(Status::new(StatusGroup::Transport, codes::TIMEOUT)));
        assert!(policy.is_retryable(Status::new(StatusGroup::Client, codes::NO_PEERS_FOUND)));
        assert!(policy.is_retryable(Status::new(StatusGroup::Ledger, 412)));
        assert!(policy.is_retryable(Status::new(StatusGroup::Ledger, 400)));
        assert!(!policy.is_retryable(Status::new(StatusGroup::Ledger, 404)));
        assert!(!policy.is_retryable(Status::new(StatusGroup::Client, 412)));

        let plain = RetryPolicy::new(4);
        assert!(!plain.is_retryable(Status::new(StatusGroup::Ledger, 500)));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::new(10).backoff(
            Duration::from_millis(500),
            Duration::from_secs(3),
            2.0,
        );
        assert_eq!(policy.backoff_after(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff_after(4), Duration::from_secs(3));
        assert_eq!(policy.backoff_after(60), Duration::from_secs(3));
    }

    #[test]
    fn min_attempts_never_lowers() {
        let policy = RetryPolicy::new(5);
        assert_eq!(policy.with_min_attempts(2).max_attempts, 5);
        assert_eq!(policy.with_min_attempts(9).max_attempts, 9);
    }

    #[test]
    fn policy_logs_as_json() {
        let json = serde_json::to_value(RetryPolicy::default()).unwrap();
        assert_eq!(json["maxAttempts"], 4);
        assert_eq!(json["initialBackoffMs"], 500);
        assert_eq!(json["retryableCodes"]["client"][0], codes::NO_PEERS_FOUND);
    }

    #[tokio::test]
    async fn exhausts_budget() {
        let calls = AtomicU32::new(0);
        let res: Result<(), _> = with_retry(&fast(4), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(rejected(500)) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match res {
            Err(ClientError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(*last, ClientError::LedgerRejected { status: 500, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn stops_on_non_retryable() {
        let calls = AtomicU32::new(0);
        let res: Result<(), _> = with_retry(&fast(4), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(rejected(409)) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(res, Err(ClientError::LedgerRejected { status: 409, .. })));
    }

    #[tokio::test]
    async fn recovers() {
        let res = with_retry(&fast(4), |attempt| async move {
            if attempt < 3 {
                Err(ClientError::Transport {
                    peer: "http://p0".to_string(),
                    code: codes::UNAVAILABLE,
                    message: "down".to_string(),
                })
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(res.unwrap(), 3);
    }
}
