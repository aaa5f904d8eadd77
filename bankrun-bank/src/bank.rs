use std::{
    collections::BTreeMap,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use bankrun_accounts_db::{
    validate_account_locks, AccountLocks, AccountsDb, LockTicket,
    TransactionAccounts, DEFAULT_MAX_RETAINED_SLOTS,
};
use bankrun_config::BankConfig;
use bankrun_svm::{
    compute_budget::{
        process_compute_budget_instructions, ComputeBudgetLimits,
    },
    program::create_loadable_account,
    runtime_transaction::program_instructions_iter,
    ExecutionOutcome, Program, ProgramRegistry, RuntimeTransaction,
    SysvarCache, TransactionProcessor, MAX_PERMITTED_DATA_LENGTH,
};
use crossbeam_channel::Receiver;
use log::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use solana_sdk::{
    account::{AccountSharedData, ReadableAccount, WritableAccount},
    clock::{Clock, Epoch, Slot, SlotIndex, UnixTimestamp},
    commitment_config::CommitmentLevel,
    epoch_info::EpochInfo,
    epoch_schedule::EpochSchedule,
    fee_calculator::FeeRateGovernor,
    genesis_config::GenesisConfig,
    hash::{Hash, Hasher},
    instruction::InstructionError,
    message::Message,
    pubkey::Pubkey,
    rent::Rent,
    sanitize::Sanitize,
    signature::Signature,
    system_program, sysvar,
    transaction::{self, Transaction, TransactionError},
};
use solana_transaction_status::{
    TransactionConfirmationStatus, TransactionStatus,
};

use crate::{
    blockhash_queue::BlockhashQueue,
    errors::{BankError, BankResult},
    fee::{calculate_fee_details, derive_fee_rate_governor},
    status_cache::{ProcessedSignatures, StatusCache},
    sysvars::{create_sysvar_account, SysvarRegistry},
    transaction_results::{
        BanksTransactionMeta, BanksTransactionResultWithMeta,
        ProcessTransactionError, TransactionOutcome,
    },
    transaction_simulation::TransactionSimulationResult,
};

pub type BankStatusCache = StatusCache<transaction::Result<()>>;

/// Block produced for a slot
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct SlotInfo {
    block_height: u64,
    blockhash: Hash,
}

/// Inflation rates in effect for the current epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochInflation {
    pub total: f64,
    pub validator: f64,
    pub foundation: f64,
}

// -----------------
// Bank
// -----------------
/// An in-process bank that executes transactions against its own account
/// state and moves time forward only when asked to.
///
/// Transactions that don't share writable accounts run concurrently on the
/// bank's worker pool, conflicting ones are applied in the order they were
/// submitted.
#[derive(Debug)]
pub struct Bank {
    adb: AccountsDb,

    account_locks: Arc<AccountLocks>,

    sysvars: SysvarRegistry,

    /// Replaced as a whole when a program is added
    transaction_processor: RwLock<TransactionProcessor>,

    blockhash_queue: RwLock<BlockhashQueue>,

    status_cache: RwLock<BankStatusCache>,

    /// Rejects replays for as long as the referenced blockhash is valid
    processed_signatures: RwLock<ProcessedSignatures>,

    /// Block produced by each retained slot
    slot_history: RwLock<BTreeMap<Slot, SlotInfo>>,

    block_height: AtomicU64,

    /// Number of transactions that committed successfully
    transaction_count: AtomicU64,

    /// Fees of the current slot, distributed when the slot ends
    collector_fees: AtomicU64,

    /// Fees collected since genesis
    collected_fees: AtomicU64,

    burned_fees: AtomicU64,

    collector_id: Pubkey,

    /// Held for reading while a transaction executes and commits, for
    /// writing while the bank moves to another slot
    freeze_lock: RwLock<()>,

    /// Keeps lock tickets and worker pool jobs in the same order
    submission_lock: Mutex<()>,

    thread_pool: ThreadPool,

    genesis_config: GenesisConfig,

    config: BankConfig,
}

impl Bank {
    pub fn new(
        genesis_config: &GenesisConfig,
        config: &BankConfig,
    ) -> BankResult<Self> {
        config.validate()?;

        let fee_rate_governor = derive_fee_rate_governor(
            &genesis_config.fee_rate_governor,
            config.lamports_per_signature,
        );
        let epoch_schedule = genesis_config.epoch_schedule.clone();
        let clock = Clock {
            slot: 0,
            epoch_start_timestamp: genesis_config.creation_time,
            epoch: 0,
            leader_schedule_epoch: epoch_schedule.get_leader_schedule_epoch(0),
            unix_timestamp: genesis_config.creation_time,
        };

        let genesis_hash = genesis_config.hash();
        debug!("set blockhash {:?}", genesis_hash);
        let blockhash_queue = BlockhashQueue::new(
            genesis_hash,
            fee_rate_governor.lamports_per_signature,
            config.max_blockhash_age,
        );
        let slot_history = BTreeMap::from([(
            0,
            SlotInfo {
                block_height: 0,
                blockhash: genesis_hash,
            },
        )]);

        let mut pool_builder = ThreadPoolBuilder::new()
            .thread_name(|idx| format!("bankrunWorker{idx:02}"))
            .panic_handler(|panic| {
                error!("Transaction worker panicked: {:?}", panic);
            });
        if let Some(worker_threads) = config.worker_threads {
            pool_builder = pool_builder.num_threads(worker_threads);
        }

        let bank = Self {
            adb: AccountsDb::new(DEFAULT_MAX_RETAINED_SLOTS),
            account_locks: Arc::default(),
            sysvars: SysvarRegistry::new(SysvarCache::new(
                clock,
                genesis_config.rent.clone(),
                epoch_schedule,
                fee_rate_governor,
            )),
            transaction_processor: RwLock::new(TransactionProcessor::new(
                Arc::new(ProgramRegistry::with_builtins()),
            )),
            blockhash_queue: RwLock::new(blockhash_queue),
            status_cache: RwLock::new(StatusCache::new(
                config.transaction_status_retention,
            )),
            processed_signatures: RwLock::default(),
            slot_history: RwLock::new(slot_history),
            block_height: AtomicU64::default(),
            transaction_count: AtomicU64::default(),
            collector_fees: AtomicU64::default(),
            collected_fees: AtomicU64::default(),
            burned_fees: AtomicU64::default(),
            collector_id: config
                .collector_id
                .unwrap_or_else(Pubkey::new_unique),
            freeze_lock: RwLock::default(),
            submission_lock: Mutex::default(),
            thread_pool: pool_builder.build()?,
            genesis_config: genesis_config.clone(),
            config: config.clone(),
        };
        bank.process_genesis_config()?;

        info!(
            "Created bank at slot 0 with {} accounts, {} lamports per signature",
            bank.adb.account_count(),
            bank.fee_rate_governor().lamports_per_signature
        );
        Ok(bank)
    }

    fn process_genesis_config(&self) -> BankResult<()> {
        let genesis_config = &self.genesis_config;
        for (pubkey, account) in genesis_config
            .accounts
            .iter()
            .chain(genesis_config.rewards_pools.iter())
        {
            self.adb.insert_account(*pubkey, account.clone().into());
        }

        let rent = self.get_rent();
        let builtins = self
            .transaction_processor()
            .programs()
            .iter()
            .map(|(program_id, registered)| {
                (*program_id, registered.name.clone())
            })
            .collect::<Vec<_>>();
        for (program_id, name) in builtins {
            if !self.adb.contains_account(&program_id) {
                self.adb.insert_account(
                    program_id,
                    create_loadable_account(&name, &rent),
                );
            }
        }

        // Genesis can only name programs we have an implementation for
        for (name, program_id) in &genesis_config.native_instruction_processors
        {
            if self.transaction_processor().programs().contains(program_id) {
                self.adb.insert_account(
                    *program_id,
                    create_loadable_account(name, &rent),
                );
            } else {
                warn!(
                    "Genesis program {} ({}) has no registered implementation",
                    name, program_id
                );
            }
        }

        self.update_sysvar_account(&sysvar::clock::id(), &self.get_clock())?;
        self.update_sysvar_account(&sysvar::rent::id(), &rent)?;
        self.update_sysvar_account(
            &sysvar::epoch_schedule::id(),
            &self.epoch_schedule(),
        )
    }

    // -----------------
    // Transaction Processing
    // -----------------
    /// Processes the transaction on the calling thread.
    /// A failed transaction is returned as error together with the
    /// metadata it produced, if it ran at all.
    pub fn process_transaction(
        &self,
        tx: Transaction,
    ) -> Result<BanksTransactionMeta, ProcessTransactionError> {
        self.execute_transaction(tx).into_result()
    }

    /// Same as [Self::process_transaction], but a failure is part of the
    /// returned value.
    pub fn try_process_transaction(
        &self,
        tx: Transaction,
    ) -> BanksTransactionResultWithMeta {
        self.execute_transaction(tx).into_result_with_meta()
    }

    /// Queues the transaction on the worker pool and returns right away.
    /// Its outcome can be polled via [Self::get_transaction_status].
    pub fn send_transaction(self: &Arc<Self>, tx: Transaction) {
        self.submit(tx);
    }

    /// Runs the transactions on the worker pool. Conflicting ones are
    /// applied in the order they appear in `txs`.
    pub fn process_transactions(
        self: &Arc<Self>,
        txs: Vec<Transaction>,
    ) -> Vec<BanksTransactionResultWithMeta> {
        let receivers = txs
            .into_iter()
            .map(|tx| self.submit(tx))
            .collect::<Vec<_>>();
        receivers
            .into_iter()
            .map(|receiver| {
                receiver.recv().map_or_else(
                    |_| BanksTransactionResultWithMeta {
                        result: Err(worker_failure()),
                        metadata: None,
                    },
                    TransactionOutcome::into_result_with_meta,
                )
            })
            .collect()
    }

    fn execute_transaction(&self, tx: Transaction) -> TransactionOutcome {
        let tx = match self.admit(tx) {
            Ok(tx) => tx,
            Err(outcome) => return outcome,
        };
        let ticket = {
            let _submission = self.submission_lock();
            self.account_locks.enqueue(&tx.lock_keys())
        };
        self.execute_admitted(tx, ticket)
    }

    fn submit(
        self: &Arc<Self>,
        tx: Transaction,
    ) -> Receiver<TransactionOutcome> {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        match self.admit(tx) {
            Ok(tx) => {
                // Workers only block on tickets enqueued before their own,
                // those jobs were spawned earlier, thus are already running
                let _submission = self.submission_lock();
                let ticket = self.account_locks.enqueue_shared(&tx.lock_keys());
                let bank = Arc::clone(self);
                self.thread_pool.spawn(move || {
                    let _ = sender.send(bank.execute_unwinding(tx, ticket));
                });
            }
            Err(outcome) => {
                let _ = sender.send(outcome);
            }
        }
        receiver
    }

    /// Runs [Self::execute_admitted] on a worker, a panic fails the
    /// transaction instead of taking its outcome down with it
    fn execute_unwinding(
        &self,
        tx: RuntimeTransaction,
        ticket: LockTicket<'_>,
    ) -> TransactionOutcome {
        let signature = *tx.signature();
        let slot = self.slot();
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.execute_admitted(tx, ticket)
        }))
        .unwrap_or_else(|payload| {
            error!("Transaction {signature} panicked: {:?}", payload);
            TransactionOutcome::rejected(signature, slot, worker_failure())
        })
    }

    /// Checks that don't need the accounts of the transaction
    fn admit(
        &self,
        tx: Transaction,
    ) -> Result<RuntimeTransaction, TransactionOutcome> {
        let signature = tx.signatures.first().copied().unwrap_or_default();
        let slot = self.slot();
        let reject = |err: TransactionError| {
            debug!("Rejected transaction {signature}: {err}");
            TransactionOutcome::rejected(signature, slot, err)
        };

        let tx = RuntimeTransaction::try_new(tx, self.config.sigverify)
            .map_err(reject)?;
        if !self.is_blockhash_valid(tx.recent_blockhash()) {
            return Err(reject(TransactionError::BlockhashNotFound));
        }
        validate_account_locks(
            tx.account_keys().iter(),
            self.config.transaction_account_lock_limit,
        )
        .map_err(reject)?;
        Ok(tx)
    }

    fn execute_admitted(
        &self,
        tx: RuntimeTransaction,
        ticket: LockTicket<'_>,
    ) -> TransactionOutcome {
        let _locks = ticket.wait();
        let _freeze = self
            .freeze_lock
            .read()
            .expect("RwLock of freeze lock poisoned");

        let signature = *tx.signature();
        let slot = self.slot();
        let reject = |err: TransactionError| {
            debug!("Rejected transaction {signature}: {err}");
            TransactionOutcome::rejected(signature, slot, err)
        };

        if self
            .processed_signatures()
            .contains(tx.recent_blockhash(), &signature)
        {
            return reject(TransactionError::AlreadyProcessed);
        }
        let compute_budget = match self.compute_budget(&tx) {
            Ok(compute_budget) => compute_budget,
            Err(err) => return reject(err),
        };
        // The blockhash may have expired while waiting for the locks
        let Some(lamports_per_signature) = self
            .blockhash_queue()
            .get_lamports_per_signature(tx.recent_blockhash())
        else {
            return reject(TransactionError::BlockhashNotFound);
        };
        let fee = calculate_fee_details(
            tx.message(),
            lamports_per_signature,
            &compute_budget,
        )
        .total_fee();

        let mut accounts = AccountsDb::begin_transaction_view(
            &self.adb.snapshot(),
            &tx.lock_keys(),
        );
        if let Err(err) = charge_fee_payer(&mut accounts, fee) {
            return reject(err);
        }

        let outcome = self.transaction_processor().execute(
            &tx,
            accounts,
            self.sysvars.snapshot(),
            &compute_budget,
        );
        match &outcome.result {
            Ok(()) => {
                let stored = self.adb.commit(&outcome.accounts);
                self.collector_fees.fetch_add(fee, Ordering::AcqRel);
                self.collected_fees.fetch_add(fee, Ordering::AcqRel);
                self.transaction_count.fetch_add(1, Ordering::AcqRel);
                trace!(
                    "Committed transaction {signature}, stored {stored} accounts"
                );
            }
            Err(err) => {
                debug!("Transaction {signature} failed: {err}");
            }
        }

        self.processed_signatures_mut()
            .insert(*tx.recent_blockhash(), signature);
        self.status_cache_mut().insert_transaction_status(
            slot,
            &signature,
            outcome.result.clone(),
        );

        TransactionOutcome {
            signature,
            slot,
            metadata: Some(BanksTransactionMeta::from(&outcome)),
            result: outcome.result,
        }
    }

    /// Runs the transaction against the state at `commitment` and discards
    /// the result. Neither the blockhash nor earlier processing of the
    /// transaction are checked.
    pub fn simulate_transaction(
        &self,
        tx: Transaction,
        commitment: CommitmentLevel,
    ) -> TransactionSimulationResult {
        let not_executed = |err: TransactionError| TransactionSimulationResult {
            result: Err(err),
            logs: Vec::new(),
            post_simulation_accounts: Vec::new(),
            units_consumed: 0,
            return_data: None,
        };

        let tx = match RuntimeTransaction::try_new(tx, self.config.sigverify)
        {
            Ok(tx) => tx,
            Err(err) => return not_executed(err),
        };
        if let Err(err) = validate_account_locks(
            tx.account_keys().iter(),
            self.config.transaction_account_lock_limit,
        ) {
            return not_executed(err);
        }
        let compute_budget = match self.compute_budget(&tx) {
            Ok(compute_budget) => compute_budget,
            Err(err) => return not_executed(err),
        };
        let lamports_per_signature = self
            .blockhash_queue()
            .get_lamports_per_signature(tx.recent_blockhash())
            .unwrap_or_else(|| self.fee_rate_governor().lamports_per_signature);
        let fee = calculate_fee_details(
            tx.message(),
            lamports_per_signature,
            &compute_budget,
        )
        .total_fee();

        let snapshot = self.adb.snapshot_at(self.commitment_slot(commitment));
        let mut accounts =
            AccountsDb::begin_transaction_view(&snapshot, &tx.lock_keys());
        if let Err(err) = charge_fee_payer(&mut accounts, fee) {
            return not_executed(err);
        }

        let ExecutionOutcome {
            result,
            accounts,
            log_messages,
            return_data,
            compute_units_consumed,
        } = self.transaction_processor().execute(
            &tx,
            accounts,
            self.sysvars.snapshot(),
            &compute_budget,
        );
        TransactionSimulationResult {
            result,
            logs: log_messages,
            post_simulation_accounts: accounts.into_accounts(),
            units_consumed: compute_units_consumed,
            return_data,
        }
    }

    fn compute_budget(
        &self,
        tx: &RuntimeTransaction,
    ) -> transaction::Result<ComputeBudgetLimits> {
        process_compute_budget_instructions(
            tx.program_instructions_iter(),
            self.config.compute_max_units,
            self.config.compute_max_units,
        )
    }

    pub fn is_transaction_already_processed(
        &self,
        signature: &Signature,
    ) -> bool {
        self.processed_signatures().contains_signature(signature)
    }

    // -----------------
    // Transaction Status
    // -----------------
    pub fn get_transaction_status(
        &self,
        signature: &Signature,
    ) -> Option<TransactionStatus> {
        let (slot, status) = self
            .status_cache()
            .get_recent_transaction_status(signature)?;

        let current_slot = self.slot();
        let confirmations = current_slot.saturating_sub(slot) as usize;
        let (confirmations, confirmation_status) =
            if slot <= self.commitment_slot(CommitmentLevel::Finalized) {
                (None, TransactionConfirmationStatus::Finalized)
            } else if slot <= self.commitment_slot(CommitmentLevel::Confirmed)
            {
                (Some(confirmations), TransactionConfirmationStatus::Confirmed)
            } else {
                (Some(confirmations), TransactionConfirmationStatus::Processed)
            };

        Some(TransactionStatus {
            slot,
            confirmations,
            err: status.clone().err(),
            status,
            confirmation_status: Some(confirmation_status),
        })
    }

    pub fn get_transaction_statuses(
        &self,
        signatures: &[Signature],
    ) -> Vec<Option<TransactionStatus>> {
        signatures
            .iter()
            .map(|signature| self.get_transaction_status(signature))
            .collect()
    }

    // -----------------
    // Accounts
    // -----------------
    pub fn get_account(
        &self,
        pubkey: &Pubkey,
        commitment: CommitmentLevel,
    ) -> Option<AccountSharedData> {
        let slot = self.commitment_slot(commitment);
        if slot == self.slot() {
            self.adb.get_account(pubkey)
        } else {
            self.adb.snapshot_at(slot).get(pubkey).cloned()
        }
    }

    pub fn get_balance(
        &self,
        pubkey: &Pubkey,
        commitment: CommitmentLevel,
    ) -> u64 {
        self.get_account(pubkey, commitment)
            .map(|account| account.lamports())
            .unwrap_or_default()
    }

    pub fn get_program_accounts(
        &self,
        owner: &Pubkey,
    ) -> Vec<(Pubkey, AccountSharedData)> {
        self.adb.get_program_accounts(owner)
    }

    /// Overwrites the account, bypassing execution and account locks
    pub fn set_account(
        &self,
        pubkey: &Pubkey,
        account: AccountSharedData,
    ) -> BankResult<()> {
        if account.data().len() as u64 > MAX_PERMITTED_DATA_LENGTH {
            return Err(BankError::AccountDataTooLarge(
                account.data().len(),
                MAX_PERMITTED_DATA_LENGTH,
            ));
        }
        self.adb.insert_account(*pubkey, account);
        Ok(())
    }

    /// Makes `program` invocable at `program_id` for transactions that
    /// start after this returns
    pub fn add_builtin(
        &self,
        program_id: Pubkey,
        name: &str,
        program: Arc<dyn Program>,
    ) {
        {
            let mut processor = self
                .transaction_processor
                .write()
                .expect("RwLock of transaction processor poisoned");
            let mut programs = ProgramRegistry::clone(processor.programs());
            programs.add_program(program_id, name, program);
            *processor = TransactionProcessor::new(Arc::new(programs));
        }
        self.adb.insert_account(
            program_id,
            create_loadable_account(name, &self.get_rent()),
        );
        debug!("Added builtin {name} at {program_id}");
    }

    fn transaction_processor(&self) -> TransactionProcessor {
        self.transaction_processor
            .read()
            .expect("RwLock of transaction processor poisoned")
            .clone()
    }

    // -----------------
    // Slots and Epochs
    // -----------------
    pub fn slot(&self) -> Slot {
        self.adb.slot()
    }

    pub fn get_slot(&self, commitment: CommitmentLevel) -> Slot {
        self.commitment_slot(commitment)
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch_schedule().get_epoch(self.slot())
    }

    /// The number of blocks beneath the current block.
    /// The first block after the genesis block has height one.
    pub fn block_height(&self) -> u64 {
        self.block_height.load(Ordering::Acquire)
    }

    pub fn get_block_height(&self, commitment: CommitmentLevel) -> u64 {
        self.slot_info(self.commitment_slot(commitment)).block_height
    }

    /// Slot whose state a read at `commitment` observes
    fn commitment_slot(&self, commitment: CommitmentLevel) -> Slot {
        let slot = self.slot();
        match commitment {
            CommitmentLevel::Processed => slot,
            CommitmentLevel::Confirmed => {
                slot.saturating_sub(self.config.confirmation_depth)
            }
            CommitmentLevel::Finalized => {
                slot.saturating_sub(self.config.finalization_depth)
            }
        }
    }

    fn slot_info(&self, slot: Slot) -> SlotInfo {
        let slot_history = self
            .slot_history
            .read()
            .expect("RwLock of slot history poisoned");
        slot_history
            .range(..=slot)
            .next_back()
            .or_else(|| slot_history.iter().next())
            .map(|(_, info)| *info)
            .unwrap_or_default()
    }

    /// given a slot, return the epoch and offset into the epoch this slot falls
    pub fn get_epoch_and_slot_index(&self, slot: Slot) -> (Epoch, SlotIndex) {
        self.epoch_schedule().get_epoch_and_slot_index(slot)
    }

    pub fn get_epoch_info(&self) -> EpochInfo {
        let absolute_slot = self.slot();
        let (epoch, slot_index) = self.get_epoch_and_slot_index(absolute_slot);
        EpochInfo {
            epoch,
            slot_index,
            slots_in_epoch: self.epoch_schedule().get_slots_in_epoch(epoch),
            absolute_slot,
            block_height: self.block_height(),
            transaction_count: Some(self.transaction_count()),
        }
    }

    pub fn epoch_inflation(&self) -> EpochInflation {
        let first_slot = self
            .epoch_schedule()
            .get_first_slot_in_epoch(self.epoch());
        let year = first_slot as f64 / self.genesis_config.slots_per_year();
        let inflation = &self.genesis_config.inflation;
        EpochInflation {
            total: inflation.total(year),
            validator: inflation.validator(year),
            foundation: inflation.foundation(year),
        }
    }

    /// Ends the current slot and produces a block for the next one
    pub fn advance_slot(&self) -> BankResult<Slot> {
        let _freeze = self.freeze_lock_mut();
        let next_slot = self.slot() + 1;
        self.set_next_slot(next_slot)?;
        Ok(next_slot)
    }

    /// Jumps forward to `slot`, the slots in between produce no blocks
    pub fn warp_to_slot(&self, slot: Slot) -> BankResult<()> {
        let _freeze = self.freeze_lock_mut();
        let current = self.slot();
        if slot <= current {
            return Err(BankError::InvalidWarpSlot {
                current,
                target: slot,
            });
        }
        self.set_next_slot(slot)
    }

    /// Jumps forward to the first slot of `epoch`
    pub fn warp_to_epoch(&self, epoch: Epoch) -> BankResult<()> {
        let slot = self.epoch_schedule().get_first_slot_in_epoch(epoch);
        self.warp_to_slot(slot)
    }

    /// Needs the freeze lock to be held for writing
    fn set_next_slot(&self, next_slot: Slot) -> BankResult<()> {
        let prev_slot = self.slot();
        self.distribute_collector_fees();
        self.adb.freeze_slot(prev_slot, next_slot);

        let block_height = self.block_height.fetch_add(1, Ordering::AcqRel) + 1;
        // We don't produce real blocks, any new hash derived from the
        // previous one will do
        let blockhash = {
            let mut hasher = Hasher::default();
            hasher.hash(self.last_blockhash().as_ref());
            hasher.hash(&next_slot.to_le_bytes());
            hasher.result()
        };
        {
            let mut blockhash_queue = self.blockhash_queue_mut();
            blockhash_queue.register_hash(
                blockhash,
                self.fee_rate_governor().lamports_per_signature,
            );
            self.processed_signatures_mut()
                .purge_blockhashes(|hash| blockhash_queue.is_hash_valid(hash));
        }
        {
            let mut slot_history = self
                .slot_history
                .write()
                .expect("RwLock of slot history poisoned");
            slot_history.insert(
                next_slot,
                SlotInfo {
                    block_height,
                    blockhash,
                },
            );
            while slot_history.len() > DEFAULT_MAX_RETAINED_SLOTS + 1 {
                slot_history.pop_first();
            }
        }

        self.update_clock(next_slot)?;
        debug!(
            "Advanced from slot {prev_slot} to {next_slot}, \
             block height {block_height}"
        );
        Ok(())
    }

    fn update_clock(&self, slot: Slot) -> BankResult<()> {
        let epoch_schedule = self.epoch_schedule();
        let prev_clock = self.get_clock();

        // Never moves backwards even if the clock was set to a later time
        let estimate = estimate_timestamp(
            self.genesis_config.creation_time,
            slot,
            self.genesis_config.ns_per_slot(),
        );
        let unix_timestamp = prev_clock.unix_timestamp.max(estimate);

        let epoch = epoch_schedule.get_epoch(slot);
        let epoch_start_timestamp = if epoch != prev_clock.epoch {
            unix_timestamp
        } else {
            prev_clock.epoch_start_timestamp
        };
        let clock = Clock {
            slot,
            epoch_start_timestamp,
            epoch,
            leader_schedule_epoch: epoch_schedule
                .get_leader_schedule_epoch(slot),
            unix_timestamp,
        };
        self.set_clock(clock)
    }

    /// Pays the fees of the ending slot to the collector, the governor's
    /// burn share is removed from circulation
    fn distribute_collector_fees(&self) {
        let fees = self.collector_fees.swap(0, Ordering::AcqRel);
        if fees == 0 {
            return;
        }
        let (deposit, burn) = self.fee_rate_governor().burn(fees);
        if deposit > 0 {
            let mut collector = self
                .adb
                .get_account(&self.collector_id)
                .unwrap_or_else(|| {
                    AccountSharedData::new(0, 0, &system_program::id())
                });
            collector.saturating_add_lamports(deposit);
            self.adb.insert_account(self.collector_id, collector);
        }
        self.burned_fees.fetch_add(burn, Ordering::AcqRel);
        trace!("Distributed {deposit} fee lamports, burned {burn}");
    }

    // -----------------
    // Blockhash and Fees
    // -----------------
    pub fn last_blockhash(&self) -> Hash {
        self.blockhash_queue().last_hash()
    }

    pub fn is_blockhash_valid(&self, hash: &Hash) -> bool {
        self.blockhash_queue().is_hash_valid(hash)
    }

    /// Last block height at which a transaction using `hash` is accepted
    pub fn get_blockhash_last_valid_block_height(
        &self,
        hash: &Hash,
    ) -> Option<u64> {
        let blockhash_queue = self.blockhash_queue();
        let age = blockhash_queue
            .get_hash_age(hash)
            .filter(|age| *age <= blockhash_queue.max_age())?;
        Some(self.block_height() + blockhash_queue.max_age() - age)
    }

    /// Blockhash of the block at `commitment` with its last valid block
    /// height, `None` if it already expired
    pub fn get_latest_blockhash(
        &self,
        commitment: CommitmentLevel,
    ) -> Option<(Hash, u64)> {
        let blockhash =
            self.slot_info(self.commitment_slot(commitment)).blockhash;
        let last_valid_block_height =
            self.get_blockhash_last_valid_block_height(&blockhash)?;
        Some((blockhash, last_valid_block_height))
    }

    /// Fee a transaction with this message would be charged.
    /// `None` if the message is malformed, if its blockhash is unknown or
    /// not yet produced at `commitment`, or if its compute budget
    /// instructions are invalid.
    pub fn get_fee_for_message(
        &self,
        message: &Message,
        commitment: CommitmentLevel,
    ) -> Option<u64> {
        message.sanitize().ok()?;
        let committed_height = self.get_block_height(commitment);
        let lamports_per_signature = {
            let blockhash_queue = self.blockhash_queue();
            let age = blockhash_queue.get_hash_age(&message.recent_blockhash)?;
            if age > blockhash_queue.max_age()
                || blockhash_queue.hash_height() - age > committed_height
            {
                return None;
            }
            blockhash_queue
                .get_lamports_per_signature(&message.recent_blockhash)?
        };
        let compute_budget = process_compute_budget_instructions(
            program_instructions_iter(message),
            self.config.compute_max_units,
            self.config.compute_max_units,
        )
        .ok()?;
        Some(
            calculate_fee_details(
                message,
                lamports_per_signature,
                &compute_budget,
            )
            .total_fee(),
        )
    }

    pub fn fee_rate_governor(&self) -> FeeRateGovernor {
        self.sysvars.get()
    }

    pub fn collector_id(&self) -> &Pubkey {
        &self.collector_id
    }

    /// Fees charged since genesis
    pub fn collected_fees(&self) -> u64 {
        self.collected_fees.load(Ordering::Acquire)
    }

    pub fn burned_fees(&self) -> u64 {
        self.burned_fees.load(Ordering::Acquire)
    }

    pub fn transaction_count(&self) -> u64 {
        self.transaction_count.load(Ordering::Acquire)
    }

    // -----------------
    // Sysvars
    // -----------------
    pub fn get_clock(&self) -> Clock {
        self.sysvars.get()
    }

    pub fn get_rent(&self) -> Rent {
        self.sysvars.get()
    }

    pub fn epoch_schedule(&self) -> EpochSchedule {
        self.sysvars.get()
    }

    pub fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> u64 {
        self.get_rent().minimum_balance(data_len).max(1)
    }

    /// Overrides the clock, the bank's slot stays as it is
    pub fn set_clock(&self, clock: Clock) -> BankResult<()> {
        self.update_sysvar_account(&sysvar::clock::id(), &clock)?;
        self.sysvars.set(clock);
        Ok(())
    }

    pub fn set_rent(&self, rent: Rent) -> BankResult<()> {
        if rent.burn_percent > 100 {
            return Err(BankError::InvalidRent(format!(
                "burn percent {} exceeds 100",
                rent.burn_percent
            )));
        }
        if !rent.exemption_threshold.is_finite()
            || rent.exemption_threshold < 0.0
        {
            return Err(BankError::InvalidRent(format!(
                "invalid exemption threshold {}",
                rent.exemption_threshold
            )));
        }
        self.sysvars.set(rent.clone());
        self.update_sysvar_account(&sysvar::rent::id(), &rent)
    }

    fn update_sysvar_account<S: Serialize>(
        &self,
        pubkey: &Pubkey,
        value: &S,
    ) -> BankResult<()> {
        let old_account = self.adb.get_account(pubkey);
        let account = create_sysvar_account(
            value,
            old_account.as_ref(),
            &self.get_rent(),
        )?;
        self.adb.insert_account(*pubkey, account);
        Ok(())
    }

    // -----------------
    // Misc
    // -----------------
    pub fn genesis_config(&self) -> &GenesisConfig {
        &self.genesis_config
    }

    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    fn blockhash_queue(&self) -> RwLockReadGuard<'_, BlockhashQueue> {
        self.blockhash_queue
            .read()
            .expect("RwLock of blockhash queue poisoned")
    }

    fn blockhash_queue_mut(&self) -> RwLockWriteGuard<'_, BlockhashQueue> {
        self.blockhash_queue
            .write()
            .expect("RwLock of blockhash queue poisoned")
    }

    fn status_cache(&self) -> RwLockReadGuard<'_, BankStatusCache> {
        self.status_cache
            .read()
            .expect("RwLock of status cache poisoned")
    }

    fn status_cache_mut(&self) -> RwLockWriteGuard<'_, BankStatusCache> {
        self.status_cache
            .write()
            .expect("RwLock of status cache poisoned")
    }

    fn processed_signatures(
        &self,
    ) -> RwLockReadGuard<'_, ProcessedSignatures> {
        self.processed_signatures
            .read()
            .expect("RwLock of processed signatures poisoned")
    }

    fn processed_signatures_mut(
        &self,
    ) -> RwLockWriteGuard<'_, ProcessedSignatures> {
        self.processed_signatures
            .write()
            .expect("RwLock of processed signatures poisoned")
    }

    fn freeze_lock_mut(&self) -> RwLockWriteGuard<'_, ()> {
        self.freeze_lock
            .write()
            .expect("RwLock of freeze lock poisoned")
    }

    fn submission_lock(&self) -> MutexGuard<'_, ()> {
        self.submission_lock
            .lock()
            .expect("Mutex of transaction submission poisoned")
    }
}

/// Error of a transaction whose worker failed to produce an outcome
fn worker_failure() -> TransactionError {
    TransactionError::InstructionError(
        0,
        InstructionError::ProgramFailedToComplete,
    )
}

/// Wall clock time of `slot` estimated from the genesis creation time
fn estimate_timestamp(
    creation_time: UnixTimestamp,
    slot: Slot,
    ns_per_slot: u128,
) -> UnixTimestamp {
    let elapsed_secs =
        u128::from(slot).saturating_mul(ns_per_slot) / 1_000_000_000;
    creation_time.saturating_add(
        UnixTimestamp::try_from(elapsed_secs).unwrap_or(UnixTimestamp::MAX),
    )
}

/// Validates the fee payer and debits the fee inside the transaction view
fn charge_fee_payer(
    accounts: &mut TransactionAccounts,
    fee: u64,
) -> transaction::Result<()> {
    let payer = accounts
        .get(0)
        .filter(|payer| payer.existed)
        .ok_or(TransactionError::AccountNotFound)?;
    if !payer.is_writable
        || !system_program::check_id(payer.account.owner())
        || !payer.account.data().is_empty()
    {
        return Err(TransactionError::InvalidAccountForFee);
    }
    let lamports = payer
        .account
        .lamports()
        .checked_sub(fee)
        .ok_or(TransactionError::InsufficientFundsForFee)?;
    if let Some(payer) = accounts.get_mut(0) {
        payer.account.set_lamports(lamports);
    }
    Ok(())
}
