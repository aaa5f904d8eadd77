use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
};

use log::*;
use solana_sdk::{
    account::{AccountSharedData, ReadableAccount},
    clock::Slot,
    pubkey::Pubkey,
};

use crate::{
    transaction_accounts::{LoadedAccount, TransactionAccounts},
    DEFAULT_MAX_RETAINED_SLOTS,
};

/// Persistent account map, cloning it is cheap since structure is shared
/// between versions.
pub type AccountsSnapshot = im::HashMap<Pubkey, AccountSharedData>;

// -----------------
// AccountsDb
// -----------------
/// In memory account store.
///
/// The working map holds every committed account of the current slot.
/// When a slot ends the working map is frozen as that slot's state which
/// allows reads at lower commitment levels. Readers only ever clone a
/// persistent map and never wait on transaction execution.
#[derive(Debug)]
pub struct AccountsDb {
    working: RwLock<AccountsSnapshot>,
    frozen: RwLock<BTreeMap<Slot, AccountsSnapshot>>,
    slot: AtomicU64,
    max_retained_slots: usize,
}

impl Default for AccountsDb {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETAINED_SLOTS)
    }
}

impl AccountsDb {
    pub fn new(max_retained_slots: usize) -> Self {
        Self {
            working: RwLock::default(),
            frozen: RwLock::default(),
            slot: AtomicU64::default(),
            max_retained_slots: max_retained_slots.max(1),
        }
    }

    /// Slot the working map belongs to
    pub fn slot(&self) -> Slot {
        self.slot.load(Ordering::Acquire)
    }

    pub fn set_slot(&self, slot: Slot) {
        self.slot.store(slot, Ordering::Release);
    }

    // -----------------
    // Query Operations
    // -----------------
    pub fn get_account(&self, pubkey: &Pubkey) -> Option<AccountSharedData> {
        self.working
            .read()
            .expect("RwLock of working accounts poisoned")
            .get(pubkey)
            .cloned()
    }

    pub fn contains_account(&self, pubkey: &Pubkey) -> bool {
        self.working
            .read()
            .expect("RwLock of working accounts poisoned")
            .contains_key(pubkey)
    }

    pub fn account_count(&self) -> usize {
        self.working
            .read()
            .expect("RwLock of working accounts poisoned")
            .len()
    }

    pub fn get_program_accounts(
        &self,
        owner: &Pubkey,
    ) -> Vec<(Pubkey, AccountSharedData)> {
        let snapshot = self.snapshot();
        let mut accounts = snapshot
            .iter()
            .filter(|(_, account)| account.owner() == owner)
            .map(|(pubkey, account)| (*pubkey, account.clone()))
            .collect::<Vec<_>>();
        accounts.sort_by_key(|(pubkey, _)| *pubkey);
        accounts
    }

    /// Latest committed state
    pub fn snapshot(&self) -> AccountsSnapshot {
        self.working
            .read()
            .expect("RwLock of working accounts poisoned")
            .clone()
    }

    /// State as of the end of `slot`.
    /// Falls back to the closest older frozen slot and if none is retained
    /// to the oldest one we still have. The working state is returned for
    /// the current slot or if nothing was frozen yet.
    pub fn snapshot_at(&self, slot: Slot) -> AccountsSnapshot {
        if slot >= self.slot() {
            return self.snapshot();
        }
        let retained = {
            let frozen = self
                .frozen
                .read()
                .expect("RwLock of frozen accounts poisoned");
            frozen
                .range(..=slot)
                .next_back()
                .or_else(|| frozen.iter().next())
                .map(|(_, snapshot)| snapshot.clone())
        };
        retained.unwrap_or_else(|| self.snapshot())
    }

    // -----------------
    // Store Operations
    // -----------------
    /// Inserts the account, bypassing transaction execution.
    /// Zero lamport accounts are stored as is.
    pub fn insert_account(&self, pubkey: Pubkey, account: AccountSharedData) {
        trace!("Inserting account {pubkey}");
        self.working
            .write()
            .expect("RwLock of working accounts poisoned")
            .insert(pubkey, account);
    }

    /// Loads exactly the requested accounts from the snapshot. Accounts
    /// that do not exist are loaded as empty system accounts.
    pub fn begin_transaction_view(
        snapshot: &AccountsSnapshot,
        keys: &[(Pubkey, bool)],
    ) -> TransactionAccounts {
        let accounts = keys
            .iter()
            .map(|(key, is_writable)| {
                let existing = snapshot.get(key);
                LoadedAccount {
                    key: *key,
                    existed: existing.is_some(),
                    account: existing.cloned().unwrap_or_default(),
                    is_writable: *is_writable,
                    touched: false,
                }
            })
            .collect();
        TransactionAccounts::new(accounts)
    }

    /// Commits the writable accounts that changed during execution. All
    /// entries become visible at once. Accounts left without lamports are
    /// removed.
    /// Returns the number of accounts that were stored.
    pub fn commit(&self, view: &TransactionAccounts) -> usize {
        let mut working = self
            .working
            .write()
            .expect("RwLock of working accounts poisoned");
        let mut stored = 0;
        for loaded in view.modified() {
            if loaded.account.lamports() == 0 {
                if working.remove(&loaded.key).is_some() {
                    trace!("Purged zero lamport account {}", loaded.key);
                }
                continue;
            }
            let unchanged = working
                .get(&loaded.key)
                .map_or(false, |current| current == &loaded.account);
            if !unchanged {
                working.insert(loaded.key, loaded.account.clone());
                stored += 1;
            }
        }
        stored
    }

    /// Freezes the working map as the state at the end of `slot` and moves
    /// the working map on to `next_slot`.
    pub fn freeze_slot(&self, slot: Slot, next_slot: Slot) {
        let snapshot = self.snapshot();
        let mut frozen = self
            .frozen
            .write()
            .expect("RwLock of frozen accounts poisoned");
        frozen.insert(slot, snapshot);
        while frozen.len() > self.max_retained_slots {
            if let Some((pruned, _)) = frozen.pop_first() {
                trace!("Pruned frozen accounts of slot {pruned}");
            }
        }
        self.set_slot(next_slot);
        debug!("Froze accounts of slot {slot}, now at slot {next_slot}");
    }
}
