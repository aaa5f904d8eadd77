//! Rules an instruction has to obey when modifying accounts.
//!
//! Programs get mutable access to every account of their instruction, the
//! changes are verified against the state the account had before the
//! instruction ran once the program returns.
use solana_sdk::{
    account::{AccountSharedData, ReadableAccount},
    instruction::InstructionError,
    pubkey::Pubkey,
};

/// Account state captured before a program runs.
#[derive(Debug, Clone)]
pub struct PreAccount {
    pub index_in_transaction: usize,
    pub is_writable: bool,
    pub account: AccountSharedData,
}

impl PreAccount {
    pub fn new(
        index_in_transaction: usize,
        is_writable: bool,
        account: AccountSharedData,
    ) -> Self {
        Self {
            index_in_transaction,
            is_writable,
            account,
        }
    }

    /// Verifies that `program_id` was allowed to turn this account into
    /// `post`.
    pub fn verify(
        &self,
        program_id: &Pubkey,
        post: &AccountSharedData,
    ) -> Result<(), InstructionError> {
        let pre = &self.account;
        let is_owner = pre.owner() == program_id;

        // Only the owner may assign a new owner, only if the account is
        // writable, not executable and its data is zero-initialized
        if pre.owner() != post.owner()
            && (!self.is_writable
                || pre.executable()
                || !is_owner
                || !is_zeroed(post.data()))
        {
            return Err(InstructionError::ModifiedProgramId);
        }

        let lamports_changed = pre.lamports() != post.lamports();
        if lamports_changed {
            if !self.is_writable {
                return Err(InstructionError::ReadonlyLamportChange);
            }
            if !is_owner && post.lamports() < pre.lamports() {
                return Err(InstructionError::ExternalAccountLamportSpend);
            }
            if pre.executable() {
                return Err(InstructionError::ExecutableLamportChange);
            }
        }

        if pre.data().len() != post.data().len() && !is_owner {
            return Err(InstructionError::AccountDataSizeChanged);
        }

        if pre.data() != post.data() {
            if !self.is_writable {
                return Err(InstructionError::ReadonlyDataModified);
            }
            if pre.executable() {
                return Err(InstructionError::ExecutableDataModified);
            }
            if !is_owner {
                return Err(InstructionError::ExternalAccountDataModified);
            }
        }

        if pre.executable() != post.executable() {
            return Err(InstructionError::ExecutableModified);
        }

        if pre.rent_epoch() != post.rent_epoch() {
            return Err(InstructionError::RentEpochModified);
        }

        Ok(())
    }
}

fn is_zeroed(buf: &[u8]) -> bool {
    buf.iter().all(|byte| *byte == 0)
}

/// Lamports may move between the accounts of an instruction but neither be
/// created nor destroyed.
pub fn verify_lamports_balance<'a>(
    pre: impl Iterator<Item = &'a AccountSharedData>,
    post: impl Iterator<Item = &'a AccountSharedData>,
) -> Result<(), InstructionError> {
    let pre_lamports: u128 =
        pre.map(|account| account.lamports() as u128).sum();
    let post_lamports: u128 =
        post.map(|account| account.lamports() as u128).sum();
    if pre_lamports != post_lamports {
        return Err(InstructionError::UnbalancedInstruction);
    }
    Ok(())
}
