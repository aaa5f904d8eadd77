//! Extracts the compute budget a transaction requested.
use solana_sdk::{
    borsh1::try_from_slice_unchecked,
    compute_budget::{self, ComputeBudgetInstruction},
    entrypoint::HEAP_LENGTH as MIN_HEAP_FRAME_BYTES,
    instruction::{CompiledInstruction, InstructionError},
    pubkey::Pubkey,
    transaction::TransactionError,
};

/// Compute units a transaction may request at most unless the bank was
/// configured with a higher limit
pub const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

/// Compute units a transaction receives when it doesn't request a limit
/// and the bank was not configured otherwise
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = MAX_COMPUTE_UNIT_LIMIT;

const MAX_HEAP_FRAME_BYTES: u32 = 256 * 1024;

const MICRO_LAMPORTS_PER_LAMPORT: u128 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeBudgetLimits {
    pub compute_unit_limit: u32,
    /// Price per compute unit in micro-lamports
    pub compute_unit_price: u64,
}

impl Default for ComputeBudgetLimits {
    fn default() -> Self {
        Self {
            compute_unit_limit: DEFAULT_COMPUTE_UNIT_LIMIT,
            compute_unit_price: 0,
        }
    }
}

impl ComputeBudgetLimits {
    /// Fee paid on top of the signature fee, rounded up to full lamports.
    pub fn prioritization_fee(&self) -> u64 {
        let micro_lamports = (self.compute_unit_price as u128)
            .saturating_mul(self.compute_unit_limit as u128);
        let fee = micro_lamports
            .saturating_add(MICRO_LAMPORTS_PER_LAMPORT - 1)
            .saturating_div(MICRO_LAMPORTS_PER_LAMPORT);
        u64::try_from(fee).unwrap_or(u64::MAX)
    }
}

/// Sanitizes the compute budget instructions of a transaction.
///
/// - `default_compute_unit_limit`: used when no limit is requested
/// - `max_compute_unit_limit`: requested limits are capped to this
pub fn process_compute_budget_instructions<'a>(
    instructions: impl Iterator<Item = (&'a Pubkey, &'a CompiledInstruction)>,
    default_compute_unit_limit: u32,
    max_compute_unit_limit: u32,
) -> Result<ComputeBudgetLimits, TransactionError> {
    let mut updated_compute_unit_limit = None;
    let mut updated_compute_unit_price = None;
    let mut requested_heap_size = None;
    let mut updated_loaded_accounts_data_size_limit = None;

    for (i, (program_id, instruction)) in instructions.enumerate() {
        if !compute_budget::check_id(program_id) {
            continue;
        }
        let invalid_instruction_data_error = TransactionError::InstructionError(
            i as u8,
            InstructionError::InvalidInstructionData,
        );
        let duplicate_instruction_error =
            TransactionError::DuplicateInstruction(i as u8);

        match try_from_slice_unchecked(&instruction.data) {
            Ok(ComputeBudgetInstruction::RequestHeapFrame(bytes)) => {
                if requested_heap_size.is_some() {
                    return Err(duplicate_instruction_error);
                }
                if !sanitize_requested_heap_size(bytes) {
                    return Err(invalid_instruction_data_error);
                }
                requested_heap_size = Some(bytes);
            }
            Ok(ComputeBudgetInstruction::SetComputeUnitLimit(units)) => {
                if updated_compute_unit_limit.is_some() {
                    return Err(duplicate_instruction_error);
                }
                updated_compute_unit_limit = Some(units);
            }
            Ok(ComputeBudgetInstruction::SetComputeUnitPrice(
                micro_lamports,
            )) => {
                if updated_compute_unit_price.is_some() {
                    return Err(duplicate_instruction_error);
                }
                updated_compute_unit_price = Some(micro_lamports);
            }
            Ok(ComputeBudgetInstruction::SetLoadedAccountsDataSizeLimit(
                bytes,
            )) => {
                if updated_loaded_accounts_data_size_limit.is_some() {
                    return Err(duplicate_instruction_error);
                }
                updated_loaded_accounts_data_size_limit = Some(bytes);
            }
            _ => return Err(invalid_instruction_data_error),
        }
    }

    let compute_unit_limit = updated_compute_unit_limit
        .unwrap_or(default_compute_unit_limit)
        .min(max_compute_unit_limit);

    Ok(ComputeBudgetLimits {
        compute_unit_limit,
        compute_unit_price: updated_compute_unit_price.unwrap_or_default(),
    })
}

fn sanitize_requested_heap_size(bytes: u32) -> bool {
    (u32::try_from(MIN_HEAP_FRAME_BYTES).unwrap_or(u32::MAX)
        ..=MAX_HEAP_FRAME_BYTES)
        .contains(&bytes)
        && bytes % 1024 == 0
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use solana_sdk::{
        hash::Hash, instruction::Instruction, message::Message,
        system_instruction,
    };
    use test_case::test_case;

    use super::*;
    use crate::runtime_transaction::program_instructions_iter;

    fn process(
        instructions: &[Instruction],
    ) -> Result<ComputeBudgetLimits, TransactionError> {
        let payer = Pubkey::new_unique();
        let message = Message::new_with_blockhash(
            instructions,
            Some(&payer),
            &Hash::default(),
        );
        process_compute_budget_instructions(
            program_instructions_iter(&message),
            DEFAULT_COMPUTE_UNIT_LIMIT,
            MAX_COMPUTE_UNIT_LIMIT,
        )
    }

    fn transfer() -> Instruction {
        system_instruction::transfer(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            1,
        )
    }

    #[test]
    fn test_defaults_without_budget_instructions() {
        assert_eq!(process(&[transfer()]), Ok(ComputeBudgetLimits::default()));
    }

    #[test]
    fn test_limit_and_price() {
        let limits = process(&[
            ComputeBudgetInstruction::set_compute_unit_limit(10_000),
            ComputeBudgetInstruction::set_compute_unit_price(5),
            transfer(),
        ])
        .unwrap();
        assert_eq!(limits.compute_unit_limit, 10_000);
        assert_eq!(limits.compute_unit_price, 5);
    }

    #[test]
    fn test_limit_is_capped() {
        let limits = process(&[
            ComputeBudgetInstruction::set_compute_unit_limit(u32::MAX),
        ])
        .unwrap();
        assert_eq!(limits.compute_unit_limit, MAX_COMPUTE_UNIT_LIMIT);
    }

    #[test]
    fn test_duplicate_instruction() {
        assert_matches!(
            process(&[
                transfer(),
                ComputeBudgetInstruction::set_compute_unit_limit(1),
                ComputeBudgetInstruction::set_compute_unit_limit(2),
            ]),
            Err(TransactionError::DuplicateInstruction(2))
        );
    }

    #[test]
    fn test_invalid_instruction_data() {
        let mut instruction =
            ComputeBudgetInstruction::set_compute_unit_price(1);
        instruction.data.truncate(3);
        assert_matches!(
            process(&[instruction]),
            Err(TransactionError::InstructionError(
                0,
                InstructionError::InvalidInstructionData
            ))
        );
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let mut instruction =
            ComputeBudgetInstruction::set_compute_unit_limit(10_000);
        instruction.data.push(0);
        let limits = process(&[instruction]).unwrap();
        assert_eq!(limits.compute_unit_limit, 10_000);
    }

    #[test_case(32 * 1024, true ; "minimum")]
    #[test_case(256 * 1024, true ; "maximum")]
    #[test_case(16 * 1024, false ; "too small")]
    #[test_case(512 * 1024, false ; "too large")]
    #[test_case(33 * 1024 + 1, false ; "not a multiple of 1024")]
    fn test_request_heap_frame(bytes: u32, valid: bool) {
        let result =
            process(&[ComputeBudgetInstruction::request_heap_frame(bytes)]);
        if valid {
            assert!(result.is_ok());
        } else {
            assert_matches!(
                result,
                Err(TransactionError::InstructionError(
                    0,
                    InstructionError::InvalidInstructionData
                ))
            );
        }
    }

    #[test_case(0, 200_000, 0 ; "free")]
    #[test_case(1, 1_000_000, 1 ; "exact lamport")]
    #[test_case(1, 1, 1 ; "rounds up")]
    #[test_case(3, 1_000_001, 4 ; "rounds up above")]
    fn test_prioritization_fee(price: u64, limit: u32, expected: u64) {
        let limits = ComputeBudgetLimits {
            compute_unit_limit: limit,
            compute_unit_price: price,
        };
        assert_eq!(limits.prioritization_fee(), expected);
    }
}
