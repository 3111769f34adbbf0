//! In-memory marbles ledger used as the service under test.
mod ledger;
mod server;
mod transport;

pub use ledger::{status, MockLedger, TransferAttempt};
pub use server::{router, run, serve};
pub use transport::LocalTransport;
