use solana_sdk::{
    hash::Hash,
    instruction::CompiledInstruction,
    message::Message,
    native_loader,
    pubkey::Pubkey,
    sanitize::Sanitize,
    signature::Signature,
    sysvar,
    transaction::{Transaction, TransactionError},
};

/// Sysvars that can never be write-locked by a transaction
const SYSVAR_IDS: &[Pubkey] = &[
    sysvar::ID,
    sysvar::clock::ID,
    sysvar::epoch_rewards::ID,
    sysvar::epoch_schedule::ID,
    sysvar::instructions::ID,
    sysvar::last_restart_slot::ID,
    sysvar::rent::ID,
    sysvar::slot_hashes::ID,
    sysvar::slot_history::ID,
    sysvar::stake_history::ID,
];

// -----------------
// RuntimeTransaction
// -----------------
/// A sanitized transaction together with the account access it requests.
///
/// Write intent comes from the message header, but accounts invoked as
/// programs, sysvars and the native loader are always demoted to read-only.
#[derive(Debug, Clone)]
pub struct RuntimeTransaction {
    transaction: Transaction,
    signature: Signature,
    writable: Vec<bool>,
}

impl RuntimeTransaction {
    /// Sanitizes the transaction and optionally verifies its signatures.
    pub fn try_new(
        transaction: Transaction,
        verify_signatures: bool,
    ) -> Result<Self, TransactionError> {
        transaction
            .sanitize()
            .map_err(|_| TransactionError::SanitizeFailure)?;
        if verify_signatures {
            transaction.verify()?;
        }
        let signature = *transaction
            .signatures
            .first()
            .ok_or(TransactionError::SanitizeFailure)?;

        let message = &transaction.message;
        let writable = message
            .account_keys
            .iter()
            .enumerate()
            .map(|(idx, key)| {
                message.is_maybe_writable(idx, None)
                    && !message.is_key_called_as_program(idx)
                    && !is_readonly_reserved(key)
            })
            .collect();

        Ok(Self {
            transaction,
            signature,
            writable,
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn message(&self) -> &Message {
        &self.transaction.message
    }

    pub fn recent_blockhash(&self) -> &Hash {
        &self.transaction.message.recent_blockhash
    }

    pub fn account_keys(&self) -> &[Pubkey] {
        &self.transaction.message.account_keys
    }

    pub fn is_writable(&self, idx: usize) -> bool {
        self.writable.get(idx).copied().unwrap_or_default()
    }

    pub fn is_signer(&self, idx: usize) -> bool {
        self.transaction.message.is_signer(idx)
    }

    /// Account keys paired with their write intent, in message order
    pub fn lock_keys(&self) -> Vec<(Pubkey, bool)> {
        self.account_keys()
            .iter()
            .enumerate()
            .map(|(idx, key)| (*key, self.is_writable(idx)))
            .collect()
    }

    pub fn program_instructions_iter(
        &self,
    ) -> impl Iterator<Item = (&Pubkey, &CompiledInstruction)> + Clone {
        program_instructions_iter(&self.transaction.message)
    }
}

/// Instructions paired with the program they invoke. Instructions whose
/// program index is out of bounds are skipped, a sanitized message has
/// none of those.
pub fn program_instructions_iter(
    message: &Message,
) -> impl Iterator<Item = (&Pubkey, &CompiledInstruction)> + Clone {
    message.instructions.iter().filter_map(|instruction| {
        message
            .account_keys
            .get(usize::from(instruction.program_id_index))
            .map(|program_id| (program_id, instruction))
    })
}

fn is_readonly_reserved(key: &Pubkey) -> bool {
    native_loader::check_id(key) || SYSVAR_IDS.contains(key)
}
