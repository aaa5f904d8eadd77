use solana_sdk::{
    transaction::Result,
    transaction_context::{TransactionAccount, TransactionReturnData},
};

use crate::transaction_results::BanksTransactionMeta;

/// Outcome of a transaction that ran against a throwaway copy of the bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSimulationResult {
    pub result: Result<()>,
    pub logs: Vec<String>,
    pub post_simulation_accounts: Vec<TransactionAccount>,
    pub units_consumed: u64,
    pub return_data: Option<TransactionReturnData>,
}

impl TransactionSimulationResult {
    pub fn meta(&self) -> BanksTransactionMeta {
        BanksTransactionMeta {
            log_messages: self.logs.clone(),
            return_data: self.return_data.clone(),
            compute_units_consumed: self.units_consumed,
        }
    }
}
