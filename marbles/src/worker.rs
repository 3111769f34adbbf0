use crate::{ops::Marbles, owners::OwnerPool, random, transaction::timed_transaction};
use marbles_client::LedgerTransport;
use marbles_core::{
    BatchConfig, BatchStatus, Marble, Transfer, WorkerMetrics, CREATE_MARBLE_LABELS,
    MARBLE_ID_PREFIX, TRANSFER_LABELS, WORKER_MARBLE_ID_LENGTH,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// One logical client of a batch run: creates a marble, then passes it from
/// owner to owner `iterations` times.
pub(crate) struct Worker<T> {
    pub id: usize,
    pub iterations: usize,
    pub delay: Duration,
    pub extra_data_length: usize,
    pub create_attempts: usize,
    pub owners: Arc<OwnerPool>,
    pub marbles: Marbles<T>,
}

impl<T: LedgerTransport> Worker<T> {
    pub fn new(
        id: usize,
        request: &BatchConfig,
        create_attempts: usize,
        owners: Arc<OwnerPool>,
        marbles: Marbles<T>,
    ) -> Self {
        Self {
            id,
            iterations: request.iterations,
            delay: request.delay,
            extra_data_length: request.extra_data_length,
            create_attempts,
            owners,
            marbles,
        }
    }

    pub async fn run(self) -> WorkerMetrics {
        let mut rng = SmallRng::from_entropy();
        let mut metrics = WorkerMetrics::new(self.iterations);

        let mut current = self.owners.pick(&mut rng);
        let extra = random::hex_value(&mut rng, self.extra_data_length);
        let marble = Marble {
            id: format!(
                "{MARBLE_ID_PREFIX}{}",
                random::hex_value(&mut rng, WORKER_MARBLE_ID_LENGTH)
            ),
            color: random::color(&mut rng).to_string(),
            size: random::size(&mut rng),
            owner: self.owners[current].clone(),
            additional_data: Some(extra).filter(|e| !e.is_empty()),
        };

        if !self.create_marble(&marble).await {
            metrics.status = BatchStatus::MarbleCreateFailed;
            return metrics;
        }
        info!(
            "Worker {}: marble {} created for {}",
            self.id, marble.id, marble.owner.username
        );

        for iteration in 0..self.iterations {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let next = self.owners.pick_other(&mut rng, current);
            let from = &self.owners[current];
            let to = &self.owners[next];
            let transfer = Transfer {
                marble_id: marble.id.clone(),
                to_owner_id: to.id.clone(),
                auth_company: from.company.clone(),
            };

            let (res, elapsed) =
                timed_transaction(TRANSFER_LABELS, self.marbles.transfer(&transfer)).await;
            match res {
                Ok(_) => {
                    metrics.transfer_times[iteration] = elapsed;
                    metrics.successes += 1;
                    debug!(
                        "Worker {}, iteration {}: {} moved from {} to {}",
                        self.id,
                        iteration + 1,
                        marble.id,
                        from.username,
                        to.username
                    );
                    current = next;
                }
                Err(err) => {
                    metrics.failures += 1;
                    debug!(
                        "Worker {}, iteration {}: transfer of {} from {} to {} failed: {err}",
                        self.id,
                        iteration + 1,
                        marble.id,
                        from.username,
                        to.username
                    );
                }
            }
        }

        if metrics.successes == 0 {
            metrics.status = BatchStatus::NoSuccessfulTransfers;
        }
        metrics
    }

    async fn create_marble(&self, marble: &Marble) -> bool {
        let mut last_err = None;
        for attempt in 1..=self.create_attempts {
            let (res, _) =
                timed_transaction(CREATE_MARBLE_LABELS, self.marbles.create_marble(marble)).await;
            match res {
                Ok(_) => return true,
                Err(err) => {
                    info!(
                        "Worker {}: creating marble failed, attempt {attempt}: {err}",
                        self.id
                    );
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) => error!(
                "Worker {}: giving up on marble {} for {}: {err}",
                self.id, marble.id, marble.owner.username
            ),
            None => error!("Worker {}: no attempt to create a marble", self.id),
        }
        false
    }
}
