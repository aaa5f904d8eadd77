use solana_sdk::instruction::InstructionError;

use crate::{
    invoke_context::InvokeContext, program::Program,
    DEFAULT_BUILTIN_COMPUTE_UNITS,
};

/// Compute budget instructions are consumed before execution, running them
/// only costs the builtin fee.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComputeBudgetProgram;

impl Program for ComputeBudgetProgram {
    fn process_instruction(
        &self,
        _invoke_context: &mut InvokeContext,
    ) -> Result<(), InstructionError> {
        Ok(())
    }

    fn base_compute_units(&self) -> u64 {
        DEFAULT_BUILTIN_COMPUTE_UNITS
    }
}
