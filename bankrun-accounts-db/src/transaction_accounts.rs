use solana_sdk::{
    account::{AccountSharedData, ReadableAccount},
    pubkey::Pubkey,
};

/// One account as loaded for a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAccount {
    pub key: Pubkey,
    pub account: AccountSharedData,
    pub is_writable: bool,
    /// The account was present in the store when the view was created
    pub existed: bool,
    /// Set whenever the account was borrowed mutably
    pub touched: bool,
}

/// Isolated copy of exactly the accounts a transaction references, indexed
/// in message order. Changes in here are invisible to everyone else until
/// the view is committed to the [crate::AccountsDb].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionAccounts {
    accounts: Vec<LoadedAccount>,
}

impl TransactionAccounts {
    pub fn new(accounts: Vec<LoadedAccount>) -> Self {
        Self { accounts }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&LoadedAccount> {
        self.accounts.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut LoadedAccount> {
        let loaded = self.accounts.get_mut(idx)?;
        loaded.touched = true;
        Some(loaded)
    }

    pub fn key(&self, idx: usize) -> Option<&Pubkey> {
        self.accounts.get(idx).map(|loaded| &loaded.key)
    }

    pub fn account(&self, idx: usize) -> Option<&AccountSharedData> {
        self.accounts.get(idx).map(|loaded| &loaded.account)
    }

    pub fn index_of(&self, key: &Pubkey) -> Option<usize> {
        self.accounts.iter().position(|loaded| &loaded.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Pubkey> {
        self.accounts.iter().map(|loaded| &loaded.key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadedAccount> {
        self.accounts.iter()
    }

    pub fn lamports_sum(&self) -> u128 {
        self.accounts
            .iter()
            .map(|loaded| loaded.account.lamports() as u128)
            .sum()
    }

    /// Writable accounts whose contents were touched during execution.
    pub fn modified(&self) -> impl Iterator<Item = &LoadedAccount> {
        self.accounts
            .iter()
            .filter(|loaded| loaded.is_writable && loaded.touched)
    }

    /// Accounts as `(key, account)` pairs in message order.
    pub fn into_accounts(self) -> Vec<(Pubkey, AccountSharedData)> {
        self.accounts
            .into_iter()
            .map(|loaded| (loaded.key, loaded.account))
            .collect()
    }
}
