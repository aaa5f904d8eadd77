pub mod bank;
#[cfg(any(test, feature = "dev-context-only-utils"))]
pub mod bank_dev_utils;
pub mod blockhash_queue;
pub mod errors;
pub mod fee;
pub mod genesis_utils;
pub mod status_cache;
pub mod sysvars;
pub mod transaction_results;
pub mod transaction_simulation;

pub use bank::Bank;

/// Fee per signature the test genesis configs are created with
pub const LAMPORTS_PER_SIGNATURE: u64 = 5000;
