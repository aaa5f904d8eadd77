use std::{
    collections::{hash_map, BTreeMap, HashMap, HashSet},
    ops::Deref,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use log::trace;
use solana_sdk::{pubkey::Pubkey, transaction::TransactionError};

/// An account key together with the requested write intent.
pub type LockKey = (Pubkey, bool);

// -----------------
// LockTable
// -----------------
#[derive(Debug, Default)]
struct LockTable {
    write_locks: HashSet<Pubkey>,
    readonly_locks: HashMap<Pubkey, u64>,
}

impl LockTable {
    fn is_locked_readonly(&self, key: &Pubkey) -> bool {
        self.readonly_locks
            .get(key)
            .map_or(false, |count| *count > 0)
    }

    fn is_locked_write(&self, key: &Pubkey) -> bool {
        self.write_locks.contains(key)
    }

    fn can_lock(&self, keys: &[LockKey]) -> bool {
        keys.iter().all(|(key, writable)| {
            if *writable {
                !self.is_locked_readonly(key) && !self.is_locked_write(key)
            } else {
                !self.is_locked_write(key)
            }
        })
    }

    fn lock(&mut self, keys: &[LockKey]) {
        for (key, writable) in keys {
            if *writable {
                self.write_locks.insert(*key);
            } else {
                *self.readonly_locks.entry(*key).or_default() += 1;
            }
        }
    }

    fn unlock(&mut self, keys: &[LockKey]) {
        for (key, writable) in keys {
            if *writable {
                let removed = self.write_locks.remove(key);
                debug_assert!(
                    removed,
                    "Attempted to remove a write-lock for a key that wasn't write-locked"
                );
            } else if let hash_map::Entry::Occupied(mut occupied_entry) =
                self.readonly_locks.entry(*key)
            {
                let count = occupied_entry.get_mut();
                *count -= 1;
                if *count == 0 {
                    occupied_entry.remove_entry();
                }
            } else {
                debug_assert!(
                    false,
                    "Attempted to remove a read-lock for a key that wasn't read-locked"
                );
            }
        }
    }
}

fn conflicts(a: &[LockKey], b: &[LockKey]) -> bool {
    a.iter().any(|(key_a, writable_a)| {
        b.iter().any(|(key_b, writable_b)| {
            key_a == key_b && (*writable_a || *writable_b)
        })
    })
}

#[derive(Debug, Default)]
struct LockState {
    table: LockTable,
    /// Requests that were enqueued but not granted yet, by ticket
    waiting: BTreeMap<u64, Vec<LockKey>>,
    next_ticket: u64,
}

impl LockState {
    /// A request is grantable when its locks are free and no request that
    /// was enqueued before it and is still waiting wants a conflicting lock.
    fn can_grant(&self, ticket: Option<u64>, keys: &[LockKey]) -> bool {
        if !self.table.can_lock(keys) {
            return false;
        }
        let earlier = match ticket {
            Some(ticket) => self.waiting.range(..ticket),
            None => self.waiting.range(..),
        };
        !earlier
            .into_iter()
            .any(|(_, waiting_keys)| conflicts(waiting_keys, keys))
    }
}

/// Tickets and guards either borrow the locks or share ownership of them,
/// the latter allows handing them to other threads.
#[derive(Debug, Clone)]
enum LocksRef<'a> {
    Borrowed(&'a AccountLocks),
    Shared(Arc<AccountLocks>),
}

impl Deref for LocksRef<'_> {
    type Target = AccountLocks;

    fn deref(&self) -> &AccountLocks {
        match self {
            LocksRef::Borrowed(locks) => locks,
            LocksRef::Shared(locks) => locks,
        }
    }
}

// -----------------
// AccountLocks
// -----------------
/// Tracks per account read/write locks of in-flight transactions.
///
/// Overlapping requests are granted in the order they were enqueued while
/// requests with disjoint account sets never wait on each other.
/// Locks are only ever released by dropping the [AccountLocksGuard] that
/// granted them.
#[derive(Debug, Default)]
pub struct AccountLocks {
    state: Mutex<LockState>,
    released: Condvar,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        // The lock state stays consistent even if a holder panicked, and
        // releasing must keep working on unwinding paths.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the account keys for a transaction without waiting.
    /// Fails with [TransactionError::AccountInUse] if any key is locked in a
    /// conflicting way or an earlier waiting request claims it.
    pub fn try_lock_accounts(
        &self,
        keys: &[LockKey],
    ) -> Result<AccountLocksGuard<'_>, TransactionError> {
        let mut state = self.state();
        if !state.can_grant(None, keys) {
            return Err(TransactionError::AccountInUse);
        }
        state.table.lock(keys);
        Ok(AccountLocksGuard {
            locks: LocksRef::Borrowed(self),
            keys: keys.to_vec(),
        })
    }

    /// Registers a lock request in admission order.
    /// The returned ticket needs to be [LockTicket::wait]ed on to obtain
    /// the locks.
    pub fn enqueue(&self, keys: &[LockKey]) -> LockTicket<'_> {
        let ticket = self.register(keys);
        LockTicket {
            locks: LocksRef::Borrowed(self),
            ticket,
            keys: Some(keys.to_vec()),
        }
    }

    /// Same as [Self::enqueue], but the ticket owns a reference to the
    /// locks so it can be waited on from another thread.
    pub fn enqueue_shared(
        self: &Arc<Self>,
        keys: &[LockKey],
    ) -> LockTicket<'static> {
        let ticket = self.register(keys);
        LockTicket {
            locks: LocksRef::Shared(self.clone()),
            ticket,
            keys: Some(keys.to_vec()),
        }
    }

    fn register(&self, keys: &[LockKey]) -> u64 {
        let mut state = self.state();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiting.insert(ticket, keys.to_vec());
        trace!("Enqueued lock request {ticket} for {} keys", keys.len());
        ticket
    }

    /// Lock the account keys, blocking until every conflicting transaction
    /// admitted before has released its locks.
    pub fn lock_accounts(&self, keys: &[LockKey]) -> AccountLocksGuard<'_> {
        self.enqueue(keys).wait()
    }

    pub fn is_locked_write(&self, key: &Pubkey) -> bool {
        self.state().table.is_locked_write(key)
    }

    pub fn is_locked_readonly(&self, key: &Pubkey) -> bool {
        self.state().table.is_locked_readonly(key)
    }

    pub fn waiting_count(&self) -> usize {
        self.state().waiting.len()
    }

    fn unlock(&self, keys: &[LockKey]) {
        self.state().table.unlock(keys);
        self.released.notify_all();
    }

    fn withdraw(&self, ticket: u64) {
        self.state().waiting.remove(&ticket);
        self.released.notify_all();
    }
}

// -----------------
// LockTicket
// -----------------
/// A pending lock request. Dropping it without waiting withdraws it.
#[derive(Debug)]
pub struct LockTicket<'a> {
    locks: LocksRef<'a>,
    ticket: u64,
    keys: Option<Vec<LockKey>>,
}

impl<'a> LockTicket<'a> {
    pub fn wait(mut self) -> AccountLocksGuard<'a> {
        let keys = self.keys.take().unwrap_or_default();
        let locks = self.locks.clone();
        let mut state = locks.state();
        while !state.can_grant(Some(self.ticket), &keys) {
            state = locks
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.waiting.remove(&self.ticket);
        state.table.lock(&keys);
        drop(state);
        trace!("Granted lock request {}", self.ticket);
        AccountLocksGuard { locks, keys }
    }
}

impl Drop for LockTicket<'_> {
    fn drop(&mut self) {
        if self.keys.is_some() {
            self.locks.withdraw(self.ticket);
        }
    }
}

// -----------------
// AccountLocksGuard
// -----------------
/// Holds the locks of one transaction, they are released when dropped.
#[derive(Debug)]
pub struct AccountLocksGuard<'a> {
    locks: LocksRef<'a>,
    keys: Vec<LockKey>,
}

impl AccountLocksGuard<'_> {
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }
}

impl Drop for AccountLocksGuard<'_> {
    fn drop(&mut self) {
        self.locks.unlock(&self.keys);
    }
}

/// Validate account locks before locking.
pub fn validate_account_locks<'a>(
    keys: impl ExactSizeIterator<Item = &'a Pubkey>,
    tx_account_lock_limit: usize,
) -> Result<(), TransactionError> {
    if keys.len() > tx_account_lock_limit {
        return Err(TransactionError::TooManyAccountLocks);
    }
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(TransactionError::AccountLoadedTwice);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{mpsc, Arc},
        thread,
        time::Duration,
    };

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_try_lock_conflicts() {
        let locks = AccountLocks::new();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();

        let guard = locks.try_lock_accounts(&[(a, true), (b, false)]).unwrap();
        assert!(locks.is_locked_write(&a));
        assert!(locks.is_locked_readonly(&b));

        // write wanted on a write-locked account
        assert_matches!(
            locks.try_lock_accounts(&[(a, false)]),
            Err(TransactionError::AccountInUse)
        );
        // write wanted on a read-locked account
        assert_matches!(
            locks.try_lock_accounts(&[(b, true)]),
            Err(TransactionError::AccountInUse)
        );
        // read locks are shared
        let shared = locks.try_lock_accounts(&[(b, false)]).unwrap();

        drop(guard);
        drop(shared);
        assert!(!locks.is_locked_write(&a));
        assert!(!locks.is_locked_readonly(&b));
        assert!(locks.try_lock_accounts(&[(a, true), (b, true)]).is_ok());
    }

    #[test]
    fn test_disjoint_requests_do_not_wait() {
        let locks = AccountLocks::new();
        let first = locks.enqueue(&[(Pubkey::new_unique(), true)]);
        // granted although the first ticket was never waited on
        let _second = locks.lock_accounts(&[(Pubkey::new_unique(), true)]);
        let _first = first.wait();
    }

    #[test]
    fn test_dropped_ticket_is_withdrawn() {
        let locks = AccountLocks::new();
        let key = Pubkey::new_unique();
        let ticket = locks.enqueue(&[(key, true)]);
        assert_eq!(locks.waiting_count(), 1);
        assert_matches!(
            locks.try_lock_accounts(&[(key, true)]),
            Err(TransactionError::AccountInUse)
        );
        drop(ticket);
        assert_eq!(locks.waiting_count(), 0);
        assert!(locks.try_lock_accounts(&[(key, true)]).is_ok());
    }

    #[test]
    fn test_overlapping_requests_granted_in_enqueue_order() {
        let locks = Arc::new(AccountLocks::new());
        let key = Pubkey::new_unique();
        let holder = locks.try_lock_accounts(&[(key, true)]).unwrap();

        let (tx, rx) = mpsc::channel();
        let mut handles = vec![];
        for idx in 0..4 {
            let locks = locks.clone();
            let tx = tx.clone();
            // enqueue on this thread to fix the admission order
            let (ready_tx, ready_rx) = mpsc::channel();
            handles.push(thread::spawn(move || {
                let ticket = locks.enqueue(&[(key, true)]);
                ready_tx.send(()).unwrap();
                let _guard = ticket.wait();
                tx.send(idx).unwrap();
                thread::sleep(Duration::from_millis(5));
            }));
            ready_rx.recv().unwrap();
        }
        drop(holder);
        for handle in handles {
            handle.join().unwrap();
        }
        let order = rx.try_iter().collect::<Vec<_>>();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_shared_ticket_waited_on_other_thread() {
        let locks = Arc::new(AccountLocks::new());
        let key = Pubkey::new_unique();
        let holder = locks.try_lock_accounts(&[(key, true)]).unwrap();

        let ticket = locks.enqueue_shared(&[(key, true)]);
        let waiter = thread::spawn(move || {
            let guard = ticket.wait();
            guard.keys().to_vec()
        });
        drop(holder);
        assert_eq!(waiter.join().unwrap(), vec![(key, true)]);
        assert!(!locks.is_locked_write(&key));
        assert_eq!(locks.waiting_count(), 0);
    }

    #[test]
    fn test_guard_released_on_panic() {
        let locks = Arc::new(AccountLocks::new());
        let key = Pubkey::new_unique();
        let panicking = {
            let locks = locks.clone();
            thread::spawn(move || {
                let _guard = locks.lock_accounts(&[(key, true)]);
                panic!("execution blew up");
            })
        };
        assert!(panicking.join().is_err());
        assert!(!locks.is_locked_write(&key));
        assert!(locks.try_lock_accounts(&[(key, true)]).is_ok());
    }

    #[test]
    fn test_validate_account_locks() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        assert!(validate_account_locks([a, b].iter(), 2).is_ok());
        assert_matches!(
            validate_account_locks([a, b].iter(), 1),
            Err(TransactionError::TooManyAccountLocks)
        );
        assert_matches!(
            validate_account_locks([a, b, a].iter(), 64),
            Err(TransactionError::AccountLoadedTwice)
        );
    }
}
