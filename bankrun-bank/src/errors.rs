use bankrun_config::errors::ConfigError;
use solana_sdk::clock::Slot;
use thiserror::Error;

pub type BankResult<T> = std::result::Result<T, BankError>;

#[derive(Debug, Error)]
pub enum BankError {
    #[error("Cannot warp to slot {target}, the bank is at slot {current}")]
    InvalidWarpSlot { current: Slot, target: Slot },

    #[error("Account data length {0} exceeds the maximum of {1} bytes")]
    AccountDataTooLarge(usize, u64),

    #[error("Invalid rent: {0}")]
    InvalidRent(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to serialize sysvar: {0}")]
    SysvarSerialization(#[from] bincode::Error),
}
