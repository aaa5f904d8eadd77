#![cfg(feature = "dev-context-only-utils")]

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use assert_matches::assert_matches;
use bankrun_bank::{
    bank::Bank,
    bank_dev_utils::{
        programs::read_clock_counter,
        transactions::{
            create_clock_counter_account, create_clock_counter_transaction,
            create_funded_accounts, create_system_transfer_transactions,
        },
    },
    genesis_utils::create_genesis_config,
    LAMPORTS_PER_SIGNATURE,
};
use bankrun_config::BankConfig;
use bankrun_svm::invoke_context::InvokeContext;
use solana_sdk::{
    account::{AccountSharedData, ReadableAccount},
    commitment_config::CommitmentLevel,
    hash::Hash,
    instruction::{AccountMeta, Instruction, InstructionError},
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    system_program, system_transaction,
    transaction::{Transaction, TransactionError},
};
use test_tools_core::init_logger;

const PROCESSED: CommitmentLevel = CommitmentLevel::Processed;

fn shared_bank() -> Arc<Bank> {
    let genesis_config_info = create_genesis_config(LAMPORTS_PER_SOL);
    let bank = Bank::new_with_config_for_tests(
        &genesis_config_info.genesis_config,
        BankConfig {
            worker_threads: Some(4),
            ..BankConfig::default()
        },
    )
    .unwrap();
    Arc::new(bank)
}

fn counter_value(bank: &Bank, counter: &Pubkey) -> u64 {
    let account = bank.get_account(counter, PROCESSED).unwrap();
    read_clock_counter(account.data()).unwrap().0
}

#[test]
fn test_process_transactions_in_parallel() {
    init_logger!();

    let bank = shared_bank();
    let txs = create_system_transfer_transactions(&bank, 32);
    let signatures = txs.iter().map(|tx| tx.signatures[0]).collect::<Vec<_>>();

    let results = bank.process_transactions(txs);
    assert_eq!(results.len(), 32);
    for result in &results {
        assert_matches!(result.result, Ok(()));
        assert!(result.metadata.is_some());
    }
    assert_eq!(bank.transaction_count(), 32);
    assert_eq!(bank.collected_fees(), 32 * LAMPORTS_PER_SIGNATURE);
    assert!(bank
        .get_transaction_statuses(&signatures)
        .iter()
        .all(|status| status.is_some()));
}

#[test]
fn test_conflicting_transactions_keep_submission_order() {
    init_logger!();

    let bank = shared_bank();
    let counter = create_clock_counter_account(&bank);
    let payers = create_funded_accounts(&bank, 20, Some(1_000_000));
    let txs = payers
        .iter()
        .map(|payer| create_clock_counter_transaction(&bank, payer, &counter))
        .collect::<Vec<_>>();

    let results = bank.process_transactions(txs);
    for (idx, result) in results.into_iter().enumerate() {
        assert_matches!(result.result, Ok(()));
        let expected_log = format!("Program log: Count {} at slot 0", idx + 1);
        assert!(result.metadata.unwrap().log_messages.contains(&expected_log));
    }
    assert_eq!(counter_value(&bank, &counter), 20);
}

#[test]
fn test_disjoint_transactions_commute() {
    init_logger!();

    let genesis_config_info = create_genesis_config(LAMPORTS_PER_SOL);
    let genesis_config = &genesis_config_info.genesis_config;
    let bank_a = Bank::new_for_tests(genesis_config).unwrap();
    let bank_b = Bank::new_for_tests(genesis_config).unwrap();
    assert_eq!(bank_a.last_blockhash(), bank_b.last_blockhash());

    let senders = [Keypair::new(), Keypair::new()];
    let recipients = [Pubkey::new_unique(), Pubkey::new_unique()];
    for bank in [&bank_a, &bank_b] {
        for sender in &senders {
            bank.set_account(
                &sender.pubkey(),
                AccountSharedData::new(1_000_000, 0, &system_program::id()),
            )
            .unwrap();
        }
    }
    let txs = senders
        .iter()
        .zip(recipients.iter())
        .enumerate()
        .map(|(idx, (sender, recipient))| {
            system_transaction::transfer(
                sender,
                recipient,
                1_000 * (idx as u64 + 1),
                bank_a.last_blockhash(),
            )
        })
        .collect::<Vec<_>>();

    bank_a.process_transaction(txs[0].clone()).unwrap();
    bank_a.process_transaction(txs[1].clone()).unwrap();
    bank_b.process_transaction(txs[1].clone()).unwrap();
    bank_b.process_transaction(txs[0].clone()).unwrap();

    for pubkey in senders
        .iter()
        .map(|sender| sender.pubkey())
        .chain(recipients)
    {
        assert_eq!(
            bank_a.get_account(&pubkey, PROCESSED),
            bank_b.get_account(&pubkey, PROCESSED)
        );
    }
    assert_eq!(bank_a.get_balance(&recipients[1], PROCESSED), 2_000);
}

#[test]
fn test_concurrent_writers_from_many_threads() {
    init_logger!();

    let bank = shared_bank();
    let counter = create_clock_counter_account(&bank);
    let handles = (0..8)
        .map(|_| {
            let bank = Arc::clone(&bank);
            let payers = create_funded_accounts(&bank, 10, Some(1_000_000));
            thread::spawn(move || {
                for payer in payers {
                    let tx = create_clock_counter_transaction(
                        &bank, &payer, &counter,
                    );
                    bank.process_transaction(tx).unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter_value(&bank, &counter), 80);
    assert_eq!(bank.transaction_count(), 80);
}

#[test]
fn test_advance_slot_while_processing() {
    init_logger!();

    let bank = shared_bank();
    let counter = create_clock_counter_account(&bank);
    let payers = create_funded_accounts(&bank, 50, Some(1_000_000));

    let processor = {
        let bank = Arc::clone(&bank);
        thread::spawn(move || {
            for payer in payers {
                let tx =
                    create_clock_counter_transaction(&bank, &payer, &counter);
                bank.process_transaction(tx).unwrap();
            }
        })
    };
    for _ in 0..20 {
        bank.advance_slot().unwrap();
    }
    processor.join().unwrap();

    assert_eq!(bank.slot(), 20);
    assert_eq!(counter_value(&bank, &counter), 50);
}

#[test]
fn test_send_transaction_and_poll_status() {
    init_logger!();

    let bank = shared_bank();
    let payer = create_funded_accounts(&bank, 1, Some(1_000_000)).remove(0);
    let to = Pubkey::new_unique();
    let tx: Transaction =
        system_transaction::transfer(&payer, &to, 500, bank.last_blockhash());
    let signature = tx.signatures[0];

    bank.send_transaction(tx);

    let deadline = Instant::now() + Duration::from_secs(5);
    let status = loop {
        if let Some(status) = bank.get_transaction_status(&signature) {
            break status;
        }
        assert!(Instant::now() < deadline, "transaction was never processed");
        thread::sleep(Duration::from_millis(10));
    };
    assert_matches!(status.status, Ok(()));
    assert_eq!(bank.get_balance(&to, PROCESSED), 500);
}

#[test]
fn test_send_rejected_transaction_leaves_no_status() {
    init_logger!();

    let bank = shared_bank();
    let unknown = Keypair::new();
    let tx = system_transaction::transfer(
        &unknown,
        &Pubkey::new_unique(),
        1,
        Hash::new_unique(),
    );
    let signature = tx.signatures[0];

    let results = bank.process_transactions(vec![tx.clone()]);
    assert!(results[0].metadata.is_none());
    bank.send_transaction(tx);
    thread::sleep(Duration::from_millis(50));
    assert!(bank.get_transaction_status(&signature).is_none());
}

#[test]
fn test_panicking_program_fails_only_its_transaction() {
    init_logger!();

    let bank = shared_bank();
    let program_id = Pubkey::new_unique();
    bank.add_builtin(
        program_id,
        "panicker",
        Arc::new(
            |_ic: &mut InvokeContext| -> Result<(), InstructionError> {
                panic!("builtin blew up")
            },
        ),
    );
    let payer = create_funded_accounts(&bank, 1, Some(1_000_000)).remove(0);
    let panicking = Transaction::new_signed_with_payer(
        &[Instruction::new_with_bytes(
            program_id,
            &[],
            vec![AccountMeta::new(payer.pubkey(), true)],
        )],
        Some(&payer.pubkey()),
        &[&payer],
        bank.last_blockhash(),
    );
    let mut txs = create_system_transfer_transactions(&bank, 2);
    txs.insert(1, panicking);

    let results = bank.process_transactions(txs);
    assert_matches!(results[0].result, Ok(()));
    assert_matches!(
        results[1].result,
        Err(TransactionError::InstructionError(
            0,
            InstructionError::ProgramFailedToComplete
        ))
    );
    assert!(results[1].metadata.is_none());
    assert_matches!(results[2].result, Ok(()));

    // the accounts of the panicked transaction were released
    let results = bank.process_transactions(vec![system_transaction::transfer(
        &payer,
        &Pubkey::new_unique(),
        1,
        bank.last_blockhash(),
    )]);
    assert_matches!(results[0].result, Ok(()));
    assert_eq!(
        bank.get_balance(&payer.pubkey(), PROCESSED),
        1_000_000 - 1 - LAMPORTS_PER_SIGNATURE
    );
}
