use log::*;
use solana_sdk::{
    account::{ReadableAccount, WritableAccount},
    instruction::InstructionError,
    pubkey::Pubkey,
    system_instruction::{SystemError, SystemInstruction},
    system_program,
};

use crate::{
    ic_msg, invoke_context::InvokeContext, program::Program,
    DEFAULT_BUILTIN_COMPUTE_UNITS, MAX_PERMITTED_DATA_LENGTH,
};

fn system_error(err: SystemError) -> InstructionError {
    InstructionError::Custom(err as u32)
}

/// Creates accounts, assigns owners and moves lamports between accounts
/// owned by the system program.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProgram;

impl Program for SystemProgram {
    fn process_instruction(
        &self,
        invoke_context: &mut InvokeContext,
    ) -> Result<(), InstructionError> {
        let instruction = bincode::deserialize::<SystemInstruction>(
            invoke_context.get_instruction_data(),
        )
        .map_err(|_| InstructionError::InvalidInstructionData)?;
        trace!("process_instruction: {:?}", instruction);

        match instruction {
            SystemInstruction::CreateAccount {
                lamports,
                space,
                owner,
            } => {
                invoke_context.check_number_of_instruction_accounts(2)?;
                create_account(invoke_context, 0, 1, lamports, space, &owner)
            }
            SystemInstruction::Assign { owner } => {
                invoke_context.check_number_of_instruction_accounts(1)?;
                assign(invoke_context, 0, &owner)
            }
            SystemInstruction::Transfer { lamports } => {
                invoke_context.check_number_of_instruction_accounts(2)?;
                transfer(invoke_context, 0, 1, lamports)
            }
            SystemInstruction::Allocate { space } => {
                invoke_context.check_number_of_instruction_accounts(1)?;
                allocate(invoke_context, 0, space)
            }
            instruction => {
                ic_msg!(
                    invoke_context,
                    "Unsupported system instruction: {:?}",
                    instruction
                );
                Err(InstructionError::InvalidInstructionData)
            }
        }
    }

    fn base_compute_units(&self) -> u64 {
        DEFAULT_BUILTIN_COMPUTE_UNITS
    }
}

fn allocate(
    invoke_context: &mut InvokeContext,
    index: usize,
    space: u64,
) -> Result<(), InstructionError> {
    let address = *invoke_context.get_key(index)?;
    if !invoke_context.is_signer(index)? {
        ic_msg!(
            invoke_context,
            "Allocate: 'to' account {} must sign",
            address
        );
        return Err(InstructionError::MissingRequiredSignature);
    }

    // if it looks like the account is already in use, bail
    let account = invoke_context.get_account(index)?;
    if !account.data().is_empty()
        || !system_program::check_id(account.owner())
    {
        ic_msg!(
            invoke_context,
            "Allocate: account {} already in use",
            address
        );
        return Err(system_error(SystemError::AccountAlreadyInUse));
    }

    if space > MAX_PERMITTED_DATA_LENGTH {
        ic_msg!(
            invoke_context,
            "Allocate: requested {}, max allowed {}",
            space,
            MAX_PERMITTED_DATA_LENGTH
        );
        return Err(system_error(SystemError::InvalidAccountDataLength));
    }

    invoke_context
        .get_account_mut(index)?
        .set_data_from_slice(&vec![0; space as usize]);
    Ok(())
}

fn assign(
    invoke_context: &mut InvokeContext,
    index: usize,
    owner: &Pubkey,
) -> Result<(), InstructionError> {
    // no work to do, just return
    if invoke_context.get_account(index)?.owner() == owner {
        return Ok(());
    }

    let address = *invoke_context.get_key(index)?;
    if !invoke_context.is_signer(index)? {
        ic_msg!(invoke_context, "Assign: account {} must sign", address);
        return Err(InstructionError::MissingRequiredSignature);
    }

    invoke_context.get_account_mut(index)?.set_owner(*owner);
    Ok(())
}

fn create_account(
    invoke_context: &mut InvokeContext,
    from_index: usize,
    to_index: usize,
    lamports: u64,
    space: u64,
    owner: &Pubkey,
) -> Result<(), InstructionError> {
    // if it looks like the `to` account is already in use, bail
    if invoke_context.get_account(to_index)?.lamports() > 0 {
        let address = *invoke_context.get_key(to_index)?;
        ic_msg!(
            invoke_context,
            "Create Account: account {} already in use",
            address
        );
        return Err(system_error(SystemError::AccountAlreadyInUse));
    }

    allocate(invoke_context, to_index, space)?;
    assign(invoke_context, to_index, owner)?;
    transfer(invoke_context, from_index, to_index, lamports)
}

fn transfer(
    invoke_context: &mut InvokeContext,
    from_index: usize,
    to_index: usize,
    lamports: u64,
) -> Result<(), InstructionError> {
    let from_address = *invoke_context.get_key(from_index)?;
    if !invoke_context.is_signer(from_index)? {
        ic_msg!(
            invoke_context,
            "Transfer: `from` account {} must sign",
            from_address
        );
        return Err(InstructionError::MissingRequiredSignature);
    }

    let (carries_data, from_lamports) = {
        let from = invoke_context.get_account(from_index)?;
        (!from.data().is_empty(), from.lamports())
    };
    if carries_data {
        ic_msg!(invoke_context, "Transfer: `from` must not carry data");
        return Err(InstructionError::InvalidArgument);
    }
    if lamports > from_lamports {
        ic_msg!(
            invoke_context,
            "Transfer: insufficient lamports {}, need {}",
            from_lamports,
            lamports
        );
        return Err(system_error(SystemError::ResultWithNegativeLamports));
    }

    invoke_context
        .get_account_mut(from_index)?
        .set_lamports(from_lamports - lamports);
    let to = invoke_context.get_account_mut(to_index)?;
    let to_lamports = to
        .lamports()
        .checked_add(lamports)
        .ok_or(InstructionError::ArithmeticOverflow)?;
    to.set_lamports(to_lamports);
    Ok(())
}
