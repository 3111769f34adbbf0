use std::ops::RangeInclusive;

/// Channel every marble lives on.
pub const CONSORTIUM_CHANNEL_ID: &str = "consortium";

/// Procedure set implementing the marble operations.
pub const MARBLES_PROCEDURE_ID: &str = "marblescc";

/// Suffix appended to a batch id to form the ledger key of its result.
pub const LEDGER_KEY_BATCH_RESULTS: &str = "BRR";

/// How many times a worker tries to create its marble before giving up.
pub const CREATE_MARBLE_MAX_ATTEMPTS: usize = 3000;

pub const MARBLE_COLORS: [&str; 7] = [
    "red", "orange", "yellow", "green", "blue", "indigo", "violet",
];

pub const MARBLE_SIZES: RangeInclusive<u32> = 1..=10;

pub const MARBLE_ID_PREFIX: &str = "m";
pub const OWNER_ID_PREFIX: &str = "o";
pub const BATCH_ID_PREFIX: &str = "b";

pub const GENERATED_ID_LENGTH: usize = 31;
pub const BATCH_ID_LENGTH: usize = 24;
pub const WORKER_MARBLE_ID_LENGTH: usize = 16;
