use itertools::Itertools;
use rayon::prelude::{IntoParallelIterator, ParallelIterator};
use solana_sdk::{
    account::{Account, AccountSharedData},
    clock::Epoch,
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    rent::Rent,
    signature::Keypair,
    signer::Signer,
    system_instruction, system_program, system_transaction,
    transaction::Transaction,
};

use super::programs::{
    clock_counter_instruction, CLOCK_COUNTER_ACCOUNT_SIZE,
    CLOCK_COUNTER_PROGRAM_ID, COMPUTE_BURNER_PROGRAM_ID,
    CPI_TRANSFER_PROGRAM_ID, FAILING_PROGRAM_ID, LOGGER_PROGRAM_ID,
    NOOP_PROGRAM_ID,
};
use crate::{bank::Bank, LAMPORTS_PER_SIGNATURE};

// -----------------
// Account Initialization
// -----------------
pub fn create_accounts(num: usize) -> Vec<Keypair> {
    (0..num).into_par_iter().map(|_| Keypair::new()).collect()
}

fn system_account(lamports: u64) -> AccountSharedData {
    Account {
        lamports,
        data: vec![],
        owner: system_program::id(),
        executable: false,
        rent_epoch: Epoch::MAX,
    }
    .into()
}

pub fn create_funded_account(bank: &Bank, lamports: Option<u64>) -> Keypair {
    let account = Keypair::new();
    let lamports = lamports.unwrap_or_else(|| {
        let rent_exempt_reserve = Rent::default().minimum_balance(0);
        rent_exempt_reserve + LAMPORTS_PER_SIGNATURE
    });
    bank.set_account(&account.pubkey(), system_account(lamports))
        .expect("failed to fund test account");
    account
}

pub fn create_funded_accounts(
    bank: &Bank,
    num: usize,
    lamports: Option<u64>,
) -> Vec<Keypair> {
    let accounts = create_accounts(num);
    let lamports = lamports.unwrap_or_else(|| {
        let rent_exempt_reserve = Rent::default().minimum_balance(0);
        rent_exempt_reserve + (num as u64 * LAMPORTS_PER_SIGNATURE)
    });
    for account in &accounts {
        bank.set_account(&account.pubkey(), system_account(lamports))
            .expect("failed to fund test account");
    }
    accounts
}

// -----------------
// System Program
// -----------------
pub fn create_system_transfer_transaction(
    bank: &Bank,
    fund_lamports: u64,
    send_lamports: u64,
) -> (Transaction, Pubkey, Pubkey) {
    let from = create_funded_account(bank, Some(fund_lamports));
    let to = Pubkey::new_unique();
    let tx = system_transaction::transfer(
        &from,
        &to,
        send_lamports,
        bank.last_blockhash(),
    );
    (tx, from.pubkey(), to)
}

/// Transfers of one lamport between pairs of freshly funded accounts
pub fn create_system_transfer_transactions(
    bank: &Bank,
    num: usize,
) -> Vec<Transaction> {
    let funded_accounts = create_funded_accounts(bank, 2 * num, None);
    funded_accounts
        .iter()
        .tuples()
        .map(|(from, to)| {
            system_transaction::transfer(
                from,
                &to.pubkey(),
                1,
                bank.last_blockhash(),
            )
        })
        .collect()
}

// -----------------
// Test Programs
// -----------------
fn signed_by_payer(
    instructions: &[Instruction],
    payer: &Keypair,
    recent_blockhash: Hash,
) -> Transaction {
    Transaction::new_signed_with_payer(
        instructions,
        Some(&payer.pubkey()),
        &[payer],
        recent_blockhash,
    )
}

pub fn create_noop_transaction(
    bank: &Bank,
    recent_blockhash: Hash,
) -> Transaction {
    let payer = create_funded_account(bank, None);
    let instruction = Instruction::new_with_bytes(
        NOOP_PROGRAM_ID,
        &[],
        vec![AccountMeta::new(payer.pubkey(), true)],
    );
    signed_by_payer(&[instruction], &payer, recent_blockhash)
}

/// Burns `units` with an optional compute unit limit requested up front
pub fn create_compute_burn_transaction(
    bank: &Bank,
    payer: &Keypair,
    units: u64,
    compute_unit_limit: Option<u32>,
) -> Transaction {
    let mut instructions = compute_unit_limit
        .map(ComputeBudgetInstruction::set_compute_unit_limit)
        .into_iter()
        .collect::<Vec<_>>();
    instructions.push(Instruction::new_with_bytes(
        COMPUTE_BURNER_PROGRAM_ID,
        &units.to_le_bytes(),
        vec![],
    ));
    signed_by_payer(&instructions, payer, bank.last_blockhash())
}

pub fn create_logger_transaction(
    bank: &Bank,
    payer: &Keypair,
    message: &str,
) -> Transaction {
    let instruction = Instruction::new_with_bytes(
        LOGGER_PROGRAM_ID,
        message.as_bytes(),
        vec![],
    );
    signed_by_payer(&[instruction], payer, bank.last_blockhash())
}

/// Transfers `lamports` to `to` first and then fails with `code`
pub fn create_failing_transaction(
    bank: &Bank,
    payer: &Keypair,
    to: &Pubkey,
    lamports: u64,
    code: u8,
) -> Transaction {
    let instructions = [
        system_instruction::transfer(&payer.pubkey(), to, lamports),
        Instruction::new_with_bytes(FAILING_PROGRAM_ID, &[code], vec![]),
    ];
    signed_by_payer(&instructions, payer, bank.last_blockhash())
}

/// Creates an account the clock counter program can write to
pub fn create_clock_counter_account(bank: &Bank) -> Pubkey {
    let counter = Pubkey::new_unique();
    let lamports =
        bank.get_minimum_balance_for_rent_exemption(CLOCK_COUNTER_ACCOUNT_SIZE);
    bank.set_account(
        &counter,
        AccountSharedData::new(
            lamports,
            CLOCK_COUNTER_ACCOUNT_SIZE,
            &CLOCK_COUNTER_PROGRAM_ID,
        ),
    )
    .expect("failed to create clock counter account");
    counter
}

pub fn create_clock_counter_transaction(
    bank: &Bank,
    payer: &Keypair,
    counter: &Pubkey,
) -> Transaction {
    signed_by_payer(
        &[clock_counter_instruction(counter)],
        payer,
        bank.last_blockhash(),
    )
}

pub fn create_cpi_transfer_transaction(
    bank: &Bank,
    payer: &Keypair,
    to: &Pubkey,
    lamports: u64,
) -> Transaction {
    let instruction = Instruction::new_with_bytes(
        CPI_TRANSFER_PROGRAM_ID,
        &lamports.to_le_bytes(),
        vec![
            AccountMeta::new(payer.pubkey(), true),
            AccountMeta::new(*to, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    );
    signed_by_payer(&[instruction], payer, bank.last_blockhash())
}
