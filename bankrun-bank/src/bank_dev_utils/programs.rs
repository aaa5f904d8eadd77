use std::sync::Arc;

use bankrun_svm::InvokeContext;
use solana_sdk::{
    account::{ReadableAccount, WritableAccount},
    instruction::{AccountMeta, Instruction, InstructionError},
    pubkey,
    pubkey::Pubkey,
    system_instruction,
};

use crate::bank::Bank;

pub const NOOP_PROGRAM_ID: Pubkey =
    pubkey!("Noop111111111111111111111111111111111111111");
pub const COMPUTE_BURNER_PROGRAM_ID: Pubkey =
    pubkey!("ComputeBurner111111111111111111111111111111");
pub const LOGGER_PROGRAM_ID: Pubkey =
    pubkey!("Logger1111111111111111111111111111111111111");
pub const FAILING_PROGRAM_ID: Pubkey =
    pubkey!("Fai1ing111111111111111111111111111111111111");
pub const CLOCK_COUNTER_PROGRAM_ID: Pubkey =
    pubkey!("C1ockCounter1111111111111111111111111111111");
pub const CPI_TRANSFER_PROGRAM_ID: Pubkey =
    pubkey!("CpiTransfer11111111111111111111111111111111");

/// Size of the accounts the clock counter writes to:
/// invocation count followed by the slot of the last invocation
pub const CLOCK_COUNTER_ACCOUNT_SIZE: usize = 16;

pub fn add_test_programs(bank: &Bank) {
    bank.add_builtin(NOOP_PROGRAM_ID, "noop", Arc::new(process_noop));
    bank.add_builtin(
        COMPUTE_BURNER_PROGRAM_ID,
        "compute_burner",
        Arc::new(process_compute_burner),
    );
    bank.add_builtin(LOGGER_PROGRAM_ID, "logger", Arc::new(process_logger));
    bank.add_builtin(FAILING_PROGRAM_ID, "failing", Arc::new(process_failing));
    bank.add_builtin(
        CLOCK_COUNTER_PROGRAM_ID,
        "clock_counter",
        Arc::new(process_clock_counter),
    );
    bank.add_builtin(
        CPI_TRANSFER_PROGRAM_ID,
        "cpi_transfer",
        Arc::new(process_cpi_transfer),
    );
}

fn read_u64(data: &[u8]) -> Result<u64, InstructionError> {
    data.get(..8)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or(InstructionError::InvalidInstructionData)
}

fn process_noop(_: &mut InvokeContext) -> Result<(), InstructionError> {
    Ok(())
}

/// Consumes the number of units given as little endian u64
fn process_compute_burner(
    invoke_context: &mut InvokeContext,
) -> Result<(), InstructionError> {
    let units = read_u64(invoke_context.get_instruction_data())?;
    invoke_context.log(&format!("Burning {units} compute units"));
    invoke_context.consume_checked(units)
}

/// Logs the instruction data as text and returns it
fn process_logger(
    invoke_context: &mut InvokeContext,
) -> Result<(), InstructionError> {
    let data = invoke_context.get_instruction_data().to_vec();
    let message = String::from_utf8_lossy(&data).to_string();
    invoke_context.log(&message);
    invoke_context.log_data(&[&data]);
    invoke_context.set_return_data(data)
}

/// Fails with the custom error code given as first byte
fn process_failing(
    invoke_context: &mut InvokeContext,
) -> Result<(), InstructionError> {
    let code = invoke_context
        .get_instruction_data()
        .first()
        .copied()
        .unwrap_or_default();
    invoke_context.log("About to fail");
    Err(InstructionError::Custom(u32::from(code)))
}

/// Counts its invocations and records the slot it saw in the clock
fn process_clock_counter(
    invoke_context: &mut InvokeContext,
) -> Result<(), InstructionError> {
    let slot = invoke_context.get_clock().slot;
    let account = invoke_context.get_account(0)?;
    if account.data().len() < CLOCK_COUNTER_ACCOUNT_SIZE {
        return Err(InstructionError::InvalidAccountData);
    }
    let count = read_u64(account.data())?
        .checked_add(1)
        .ok_or(InstructionError::ArithmeticOverflow)?;

    let data = invoke_context.get_account_mut(0)?.data_as_mut_slice();
    data[..8].copy_from_slice(&count.to_le_bytes());
    data[8..16].copy_from_slice(&slot.to_le_bytes());
    invoke_context.log(&format!("Count {count} at slot {slot}"));
    Ok(())
}

/// Transfers the lamports given as little endian u64 from account 0 to
/// account 1 by invoking the system program
fn process_cpi_transfer(
    invoke_context: &mut InvokeContext,
) -> Result<(), InstructionError> {
    let lamports = read_u64(invoke_context.get_instruction_data())?;
    let from = *invoke_context.get_key(0)?;
    let to = *invoke_context.get_key(1)?;
    invoke_context.invoke(system_instruction::transfer(&from, &to, lamports))
}

pub fn clock_counter_instruction(counter: &Pubkey) -> Instruction {
    Instruction::new_with_bytes(
        CLOCK_COUNTER_PROGRAM_ID,
        &[],
        vec![AccountMeta::new(*counter, false)],
    )
}

/// Reads count and slot back from a clock counter account
pub fn read_clock_counter(data: &[u8]) -> Option<(u64, u64)> {
    let count = read_u64(data).ok()?;
    let slot = read_u64(data.get(8..)?).ok()?;
    Some((count, slot))
}
