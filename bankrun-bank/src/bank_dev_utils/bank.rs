use std::sync::Arc;

use bankrun_config::BankConfig;
use solana_sdk::genesis_config::GenesisConfig;

use crate::{bank::Bank, errors::BankResult};

impl Bank {
    pub fn new_for_tests(genesis_config: &GenesisConfig) -> BankResult<Bank> {
        Self::new_with_config_for_tests(genesis_config, BankConfig::default())
    }

    /// Bank that also knows the test programs
    pub fn new_with_config_for_tests(
        genesis_config: &GenesisConfig,
        config: BankConfig,
    ) -> BankResult<Bank> {
        let bank = Self::new(genesis_config, &config)?;
        super::programs::add_test_programs(&bank);
        Ok(bank)
    }

    pub fn new_shared_for_tests(
        genesis_config: &GenesisConfig,
    ) -> BankResult<Arc<Bank>> {
        Self::new_for_tests(genesis_config).map(Arc::new)
    }
}
