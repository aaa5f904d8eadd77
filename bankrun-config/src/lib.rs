use std::{env, fmt, fs, path::Path, str::FromStr};

use errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

pub mod errors;
mod helpers;

pub const DEFAULT_COMPUTE_MAX_UNITS: u32 = 1_400_000;
pub const DEFAULT_TRANSACTION_ACCOUNT_LOCK_LIMIT: usize = 64;
pub const DEFAULT_MAX_BLOCKHASH_AGE: u64 = 300;
pub const DEFAULT_TRANSACTION_STATUS_RETENTION: usize = 10_000;

/// Parameters a bank is constructed with. Every field has a default so an
/// empty TOML document yields a usable config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct BankConfig {
    /// Compute unit limit of transactions that don't request one and the
    /// upper bound for those that do
    #[serde(default = "default_compute_max_units")]
    pub compute_max_units: u32,

    #[serde(default = "default_transaction_account_lock_limit")]
    pub transaction_account_lock_limit: usize,

    /// Overrides the fee the genesis fee rate governor derives
    #[serde(default)]
    pub lamports_per_signature: Option<u64>,

    /// Number of blocks a blockhash stays valid for
    #[serde(default = "default_max_blockhash_age")]
    pub max_blockhash_age: u64,

    /// Number of transaction statuses kept before the oldest are evicted
    #[serde(default = "default_transaction_status_retention")]
    pub transaction_status_retention: usize,

    /// By default the bank will verify transaction signatures.
    /// This can be disabled by setting [Self::sigverify] to `false`.
    #[serde(default = "default_sigverify")]
    pub sigverify: bool,

    /// Slots a confirmed read lags behind the working slot
    #[serde(default)]
    pub confirmation_depth: u64,

    /// Slots a finalized read lags behind the working slot
    #[serde(default)]
    pub finalization_depth: u64,

    #[serde(default)]
    pub worker_threads: Option<usize>,

    #[serde(
        default,
        deserialize_with = "helpers::option_pubkey_deserialize",
        serialize_with = "helpers::option_pubkey_serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub collector_id: Option<Pubkey>,
}

fn default_compute_max_units() -> u32 {
    DEFAULT_COMPUTE_MAX_UNITS
}

fn default_transaction_account_lock_limit() -> usize {
    DEFAULT_TRANSACTION_ACCOUNT_LOCK_LIMIT
}

fn default_max_blockhash_age() -> u64 {
    DEFAULT_MAX_BLOCKHASH_AGE
}

fn default_transaction_status_retention() -> usize {
    DEFAULT_TRANSACTION_STATUS_RETENTION
}

fn default_sigverify() -> bool {
    true
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            compute_max_units: default_compute_max_units(),
            transaction_account_lock_limit:
                default_transaction_account_lock_limit(),
            lamports_per_signature: None,
            max_blockhash_age: default_max_blockhash_age(),
            transaction_status_retention: default_transaction_status_retention(
            ),
            sigverify: default_sigverify(),
            confirmation_depth: 0,
            finalization_depth: 0,
            worker_threads: None,
            collector_id: None,
        }
    }
}

impl BankConfig {
    pub fn try_load_from_file(path: &str) -> ConfigResult<Self> {
        let toml = fs::read_to_string(Path::new(path))?;
        Self::try_load_from_toml(&toml)
    }

    pub fn try_load_from_toml(toml: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.compute_max_units == 0 {
            return Err(ConfigError::InvalidValue(
                "compute-max-units",
                "must be positive".to_string(),
            ));
        }
        if self.transaction_account_lock_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "transaction-account-lock-limit",
                "must be positive".to_string(),
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(ConfigError::InvalidValue(
                "worker-threads",
                "must be positive".to_string(),
            ));
        }
        if self.finalization_depth < self.confirmation_depth {
            return Err(ConfigError::InvalidCommitmentDepths {
                confirmation: self.confirmation_depth,
                finalization: self.finalization_depth,
            });
        }
        Ok(())
    }

    pub fn override_from_envs(&self) -> ConfigResult<BankConfig> {
        let mut config = self.clone();

        // -----------------
        // Compute
        // -----------------
        if let Some(max_units) = parse_env::<u32>("BANKRUN_COMPUTE_MAX_UNITS")? {
            config.compute_max_units = max_units;
        }

        // -----------------
        // Transactions
        // -----------------
        if let Some(limit) =
            parse_env::<usize>("BANKRUN_TRANSACTION_ACCOUNT_LOCK_LIMIT")?
        {
            config.transaction_account_lock_limit = limit;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T>(name: &'static str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| ConfigError::InvalidValue(name, err.to_string())),
        Err(_) => Ok(None),
    }
}

impl fmt::Display for BankConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let toml = toml::to_string_pretty(self)
            .unwrap_or("Invalid Config".to_string());
        write!(f, "{}", toml)
    }
}
