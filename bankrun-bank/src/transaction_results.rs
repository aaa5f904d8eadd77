use bankrun_svm::ExecutionOutcome;
use solana_sdk::{
    clock::Slot,
    signature::Signature,
    transaction::{self, TransactionError},
    transaction_context::TransactionReturnData,
};
use thiserror::Error;

/// What a transaction left behind besides its account changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanksTransactionMeta {
    pub log_messages: Vec<String>,
    pub return_data: Option<TransactionReturnData>,
    pub compute_units_consumed: u64,
}

impl From<&ExecutionOutcome> for BanksTransactionMeta {
    fn from(outcome: &ExecutionOutcome) -> Self {
        Self {
            log_messages: outcome.log_messages.clone(),
            return_data: outcome.return_data.clone(),
            compute_units_consumed: outcome.compute_units_consumed,
        }
    }
}

/// Outcome of a transaction returned as a value.
/// `metadata` is `None` if the transaction was rejected before it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanksTransactionResultWithMeta {
    pub result: transaction::Result<()>,
    pub metadata: Option<BanksTransactionMeta>,
}

// -----------------
// Error Classification
// -----------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// The transaction was refused and never ran
    Admission,
    /// The transaction ran, or was about to, and failed
    Execution,
}

impl From<&TransactionError> for TransactionErrorKind {
    fn from(err: &TransactionError) -> Self {
        use TransactionError::*;
        match err {
            BlockhashNotFound
            | AccountInUse
            | InsufficientFundsForFee
            | AccountNotFound
            | InvalidAccountForFee
            | AlreadyProcessed
            | SignatureFailure
            | SanitizeFailure => Self::Admission,
            _ => Self::Execution,
        }
    }
}

/// A failed transaction together with whatever metadata it produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Transaction failed: {err}")]
pub struct ProcessTransactionError {
    pub err: TransactionError,
    pub metadata: Option<BanksTransactionMeta>,
}

impl ProcessTransactionError {
    pub fn kind(&self) -> TransactionErrorKind {
        TransactionErrorKind::from(&self.err)
    }
}

// -----------------
// TransactionOutcome
// -----------------
/// Result of one pass of a transaction through the bank, both the
/// `process_*` and `try_process_*` flavors are derived from it
#[derive(Debug, Clone)]
pub(crate) struct TransactionOutcome {
    pub signature: Signature,
    pub slot: Slot,
    pub result: transaction::Result<()>,
    pub metadata: Option<BanksTransactionMeta>,
}

impl TransactionOutcome {
    pub fn rejected(
        signature: Signature,
        slot: Slot,
        err: TransactionError,
    ) -> Self {
        Self {
            signature,
            slot,
            result: Err(err),
            metadata: None,
        }
    }

    pub fn into_result(
        self,
    ) -> Result<BanksTransactionMeta, ProcessTransactionError> {
        match self.result {
            Ok(()) => Ok(self.metadata.unwrap_or_default()),
            Err(err) => Err(ProcessTransactionError {
                err,
                metadata: self.metadata,
            }),
        }
    }

    pub fn into_result_with_meta(self) -> BanksTransactionResultWithMeta {
        BanksTransactionResultWithMeta {
            result: self.result,
            metadata: self.metadata,
        }
    }
}
