use std::sync::Arc;

use bankrun_accounts_db::TransactionAccounts;
use log::*;
use solana_sdk::{
    account::ReadableAccount,
    transaction::TransactionError,
    transaction_context::TransactionReturnData,
};

use crate::{
    compute_budget::ComputeBudgetLimits,
    invoke_context::{InstructionAccount, InvokeContext},
    program::ProgramRegistry,
    runtime_transaction::RuntimeTransaction,
    sysvar_cache::SysvarCache,
};

// -----------------
// ExecutionOutcome
// -----------------
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub result: Result<(), TransactionError>,
    /// The accounts as they were left by execution. Only meaningful to
    /// commit if [Self::result] is `Ok`
    pub accounts: TransactionAccounts,
    pub log_messages: Vec<String>,
    pub return_data: Option<TransactionReturnData>,
    pub compute_units_consumed: u64,
}

impl ExecutionOutcome {
    fn not_executed(
        err: TransactionError,
        accounts: TransactionAccounts,
    ) -> Self {
        Self {
            result: Err(err),
            accounts,
            log_messages: Vec::new(),
            return_data: None,
            compute_units_consumed: 0,
        }
    }

    pub fn was_successful(&self) -> bool {
        self.result.is_ok()
    }
}

// -----------------
// TransactionProcessor
// -----------------
/// Executes the instructions of a transaction against its loaded accounts.
#[derive(Debug, Clone)]
pub struct TransactionProcessor {
    programs: Arc<ProgramRegistry>,
}

impl TransactionProcessor {
    pub fn new(programs: Arc<ProgramRegistry>) -> Self {
        Self { programs }
    }

    pub fn programs(&self) -> &Arc<ProgramRegistry> {
        &self.programs
    }

    /// Runs all instructions in order sharing one compute meter.
    /// Execution stops at the first failing instruction, the returned
    /// accounts then must not be committed.
    pub fn execute(
        &self,
        transaction: &RuntimeTransaction,
        accounts: TransactionAccounts,
        sysvars: Arc<SysvarCache>,
        compute_budget: &ComputeBudgetLimits,
    ) -> ExecutionOutcome {
        if let Err(err) = validate_program_accounts(transaction, &accounts) {
            debug!(
                "Transaction {} not executed: {err:?}",
                transaction.signature()
            );
            return ExecutionOutcome::not_executed(err, accounts);
        }

        let compute_unit_limit = u64::from(compute_budget.compute_unit_limit);
        let mut invoke_context = InvokeContext::new(
            accounts,
            self.programs.clone(),
            sysvars,
            compute_unit_limit,
        );

        let message = transaction.message();
        let mut result = Ok(());
        for (instruction_index, instruction) in
            message.instructions.iter().enumerate()
        {
            let program_id =
                message.account_keys[instruction.program_id_index as usize];
            let instruction_accounts = instruction
                .accounts
                .iter()
                .map(|index| {
                    let index_in_transaction = *index as usize;
                    InstructionAccount {
                        index_in_transaction,
                        is_signer: transaction.is_signer(index_in_transaction),
                        is_writable: transaction
                            .is_writable(index_in_transaction),
                    }
                })
                .collect();
            if let Err(err) = invoke_context.process_instruction(
                program_id,
                instruction_accounts,
                instruction.data.clone(),
            ) {
                result = Err(TransactionError::InstructionError(
                    instruction_index as u8,
                    err,
                ));
                break;
            }
        }

        let remaining = invoke_context.get_remaining();
        let (accounts, log_messages, return_data) =
            invoke_context.into_parts();
        trace!(
            "Executed {}: {:?}, {} log messages",
            transaction.signature(),
            result,
            log_messages.len()
        );
        ExecutionOutcome {
            result,
            accounts,
            log_messages,
            return_data: (!return_data.data.is_empty()).then_some(return_data),
            compute_units_consumed: compute_unit_limit.saturating_sub(remaining),
        }
    }
}

/// Every invoked program has to exist and be executable
fn validate_program_accounts(
    transaction: &RuntimeTransaction,
    accounts: &TransactionAccounts,
) -> Result<(), TransactionError> {
    for instruction in &transaction.message().instructions {
        let loaded = accounts
            .get(instruction.program_id_index as usize)
            .filter(|loaded| loaded.existed)
            .ok_or(TransactionError::ProgramAccountNotFound)?;
        if !loaded.account.executable() {
            return Err(TransactionError::InvalidProgramForExecution);
        }
    }
    Ok(())
}
