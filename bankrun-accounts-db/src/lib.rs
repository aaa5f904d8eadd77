pub mod account_locks;
pub mod accounts_db;
pub mod transaction_accounts;

pub use account_locks::{
    validate_account_locks, AccountLocks, AccountLocksGuard, LockTicket,
};
pub use accounts_db::{AccountsDb, AccountsSnapshot};
pub use transaction_accounts::{LoadedAccount, TransactionAccounts};

/// Number of frozen slots kept around when nothing else is configured.
pub const DEFAULT_MAX_RETAINED_SLOTS: usize = 32;
