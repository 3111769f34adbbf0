#![doc = include_str!("../README.md")]

pub mod aggregate;
pub mod generator;
pub mod ops;
pub mod owners;
pub mod random;
#[doc(hidden)]
pub mod transaction;

mod error;
pub(crate) mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{aggregate, LatencySummary};
pub use error::MarblesError;
pub use generator::{BatchState, LoadGenerator};
pub use ops::{batch_result_key, Marbles};
pub use owners::{bootstrap_owners, OwnerPool};
#[cfg(feature = "metrics")]
pub use transaction::describe_metrics;

pub mod prelude {
    pub use crate::{LoadGenerator, Marbles, MarblesError};
    pub use marbles_client::{ClientConfig, HttpTransport, LedgerClient, LedgerTransport};
    pub use marbles_core::{BatchConfig, BatchResult, BatchStatus, Marble, Owner, Transfer};
}
