use crate::{error::MarblesError, ops::Marbles};
use marbles_client::LedgerTransport;
use marbles_core::Owner;
use rand::Rng;
use std::ops::Index;
use tracing::{debug, info, warn};

/// Fixed set of owners every batch run transfers marbles between.
pub fn bootstrap_owners() -> Vec<Owner> {
    vec![
        Owner::new("o1", "user1", "United Marbles"),
        Owner::new("o2", "user2", "Spherical Arts"),
        Owner::new("o3", "user3", "Round Rollers"),
        Owner::new("o4", "user4", "Alley Baba."),
        Owner::new("o5", "user5", "ACME Inc."),
    ]
}

/// Read-only pool of owners shared by all workers of a run. Owners are
/// referred to by index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerPool {
    owners: Vec<Owner>,
}

impl OwnerPool {
    pub fn new(owners: Vec<Owner>) -> Result<Self, MarblesError> {
        if owners.len() < 2 {
            return Err(MarblesError::OwnerPoolTooSmall(owners.len()));
        }
        Ok(Self { owners })
    }

    /// Makes sure every owner of `owners` exists on the ledger, creating the
    /// missing ones. Owners already on the ledger are taken as stored.
    pub async fn establish<T: LedgerTransport>(
        marbles: &Marbles<T>,
        owners: Vec<Owner>,
    ) -> Result<Self, MarblesError> {
        let mut established = Vec::with_capacity(owners.len());

        for owner in owners {
            match marbles.get_owner(&owner.id).await {
                Ok(Some(existing)) => {
                    debug!("Owner {} already exists", existing.id);
                    established.push(existing);
                    continue;
                }
                Ok(None) => {}
                Err(err) => warn!("Could not look up owner {}: {err}", owner.id),
            }

            if let Err(err) = marbles.create_owner(&owner).await {
                return Err(MarblesError::OwnerBootstrap {
                    owner: owner.id,
                    source: Box::new(err),
                });
            }
            info!("Created owner {} ({})", owner.id, owner.company);
            established.push(owner);
        }

        Self::new(established)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn pick<R: Rng>(&self, rng: &mut R) -> usize {
        rng.gen_range(0..self.owners.len())
    }

    /// A random owner other than `current`.
    pub fn pick_other<R: Rng>(&self, rng: &mut R, current: usize) -> usize {
        // Draw from the other n-1 slots and skip over `current`.
        let idx = rng.gen_range(0..self.owners.len() - 1);
        if idx >= current {
            idx + 1
        } else {
            idx
        }
    }
}

impl Index<usize> for OwnerPool {
    type Output = Owner;

    fn index(&self, idx: usize) -> &Owner {
        &self.owners[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;
    use mock_ledger::status;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn pick_other_never_repeats() {
        let pool = OwnerPool::new(bootstrap_owners()).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut seen = vec![0; pool.len()];

        for current in (0..pool.len()).cycle().take(5_000) {
            let next = pool.pick_other(&mut rng, current);
            assert_ne!(next, current);
            assert!(next < pool.len());
            seen[next] += 1;
        }
        assert!(seen.iter().all(|n| *n > 0));
    }

    #[test]
    fn needs_two_owners() {
        let res = OwnerPool::new(vec![Owner::new("o1", "user1", "ACME")]);
        assert!(matches!(res, Err(MarblesError::OwnerPoolTooSmall(1))));
    }

    #[tokio::test]
    async fn establish_is_idempotent() {
        let (ledger, marbles) = harness();

        let first = OwnerPool::establish(&marbles, bootstrap_owners()).await.unwrap();
        let second = OwnerPool::establish(&marbles, bootstrap_owners()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.calls("init_owner"), 5);
        assert_eq!(ledger.owner("o4").unwrap().company, "Alley Baba.");
    }

    #[tokio::test]
    async fn establish_keeps_stored_owner() {
        let (_, marbles) = harness();
        marbles
            .create_owner(&Owner::new("o1", "renamed", "United Marbles"))
            .await
            .unwrap();

        let pool = OwnerPool::establish(&marbles, bootstrap_owners()).await.unwrap();
        assert_eq!(pool[0].username, "renamed");
    }

    #[tokio::test]
    async fn establish_fails_when_creation_fails() {
        let (ledger, marbles) = harness();
        ledger.fail_calls("init_owner", [3], status::FORBIDDEN);

        let err = OwnerPool::establish(&marbles, bootstrap_owners())
            .await
            .unwrap_err();
        assert!(matches!(err, MarblesError::OwnerBootstrap { ref owner, .. } if owner == "o3"));
    }
}
