use std::time::UNIX_EPOCH;

use solana_sdk::{
    account::{Account, AccountSharedData},
    clock::UnixTimestamp,
    fee_calculator::FeeRateGovernor,
    genesis_config::{ClusterType, GenesisConfig},
    pubkey::Pubkey,
    rent::Rent,
    signature::{Keypair, Signer},
    system_program,
};

use crate::LAMPORTS_PER_SIGNATURE;

// Default amount received by the validator
const VALIDATOR_LAMPORTS: u64 = 42;

pub struct GenesisConfigInfo {
    pub genesis_config: GenesisConfig,
    pub mint_keypair: Keypair,
    pub validator_pubkey: Pubkey,
}

/// Genesis with fees and rent as a real cluster charges them
pub fn create_genesis_config(mint_lamports: u64) -> GenesisConfigInfo {
    create_genesis_config_with_leader_and_fees(
        mint_lamports,
        &Pubkey::new_unique(),
    )
}

pub fn create_genesis_config_with_leader(
    mint_lamports: u64,
    validator_pubkey: &Pubkey,
) -> GenesisConfigInfo {
    let mint_keypair = Keypair::new();

    let genesis_config = create_genesis_config_with_leader_ex(
        mint_lamports,
        &mint_keypair.pubkey(),
        validator_pubkey,
        VALIDATOR_LAMPORTS,
        FeeRateGovernor::new(0, 0),
        Rent::free(),
        vec![],
    );

    GenesisConfigInfo {
        genesis_config,
        mint_keypair,
        validator_pubkey: *validator_pubkey,
    }
}

pub fn create_genesis_config_with_leader_and_fees(
    mint_lamports: u64,
    validator_pubkey: &Pubkey,
) -> GenesisConfigInfo {
    let mut genesis_config_info =
        create_genesis_config_with_leader(mint_lamports, validator_pubkey);
    genesis_config_info.genesis_config.fee_rate_governor =
        FeeRateGovernor::new(LAMPORTS_PER_SIGNATURE, 0);
    genesis_config_info.genesis_config.rent = Rent::default();
    genesis_config_info
}

pub fn create_genesis_config_with_leader_ex(
    mint_lamports: u64,
    mint_pubkey: &Pubkey,
    validator_pubkey: &Pubkey,
    validator_lamports: u64,
    fee_rate_governor: FeeRateGovernor,
    rent: Rent,
    mut initial_accounts: Vec<(Pubkey, AccountSharedData)>,
) -> GenesisConfig {
    initial_accounts.push((
        *mint_pubkey,
        AccountSharedData::new(mint_lamports, 0, &system_program::id()),
    ));
    initial_accounts.push((
        *validator_pubkey,
        AccountSharedData::new(validator_lamports, 0, &system_program::id()),
    ));

    GenesisConfig {
        accounts: initial_accounts
            .into_iter()
            .map(|(key, account)| (key, Account::from(account)))
            .collect(),
        fee_rate_governor,
        rent,
        cluster_type: ClusterType::Development,
        creation_time: UNIX_EPOCH
            .elapsed()
            .map(|elapsed| elapsed.as_secs() as UnixTimestamp)
            .unwrap_or_default(),
        ..GenesisConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_accounts() {
        let validator = Pubkey::new_unique();
        let info =
            create_genesis_config_with_leader_and_fees(1_000, &validator);
        let genesis = &info.genesis_config;
        assert_eq!(
            genesis.accounts[&info.mint_keypair.pubkey()].lamports,
            1_000
        );
        assert_eq!(genesis.accounts[&validator].lamports, VALIDATOR_LAMPORTS);
        assert_eq!(
            genesis.fee_rate_governor.lamports_per_signature,
            LAMPORTS_PER_SIGNATURE
        );
        assert!(genesis.creation_time > 0);
    }
}
