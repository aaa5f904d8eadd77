use std::sync::{Arc, RwLock};

use bankrun_svm::SysvarCache;
use serde::Serialize;
use solana_sdk::{
    account::{Account, AccountSharedData, ReadableAccount},
    clock::Clock,
    epoch_schedule::EpochSchedule,
    fee_calculator::FeeRateGovernor,
    rent::Rent,
    sysvar,
};

use crate::errors::BankResult;

// -----------------
// BankSysvar
// -----------------
/// A value kept in the [SysvarRegistry]
pub trait BankSysvar: Clone {
    fn get(cache: &SysvarCache) -> &Self;
    fn set(self, cache: &mut SysvarCache);
}

impl BankSysvar for Clock {
    fn get(cache: &SysvarCache) -> &Self {
        cache.get_clock()
    }
    fn set(self, cache: &mut SysvarCache) {
        cache.set_clock(self)
    }
}

impl BankSysvar for Rent {
    fn get(cache: &SysvarCache) -> &Self {
        cache.get_rent()
    }
    fn set(self, cache: &mut SysvarCache) {
        cache.set_rent(self)
    }
}

impl BankSysvar for EpochSchedule {
    fn get(cache: &SysvarCache) -> &Self {
        cache.get_epoch_schedule()
    }
    fn set(self, cache: &mut SysvarCache) {
        cache.set_epoch_schedule(self)
    }
}

impl BankSysvar for FeeRateGovernor {
    fn get(cache: &SysvarCache) -> &Self {
        cache.get_fee_rate_governor()
    }
    fn set(self, cache: &mut SysvarCache) {
        cache.set_fee_rate_governor(self)
    }
}

// -----------------
// SysvarRegistry
// -----------------
/// Current sysvar values of a bank.
///
/// Transactions take a [SysvarRegistry::snapshot] when they start, thus an
/// update only applies to transactions that start after it returned.
#[derive(Debug, Default)]
pub struct SysvarRegistry {
    cache: RwLock<Arc<SysvarCache>>,
}

impl SysvarRegistry {
    pub fn new(cache: SysvarCache) -> Self {
        Self {
            cache: RwLock::new(Arc::new(cache)),
        }
    }

    pub fn get<T: BankSysvar>(&self) -> T {
        T::get(&self.snapshot()).clone()
    }

    pub fn set<T: BankSysvar>(&self, value: T) {
        let mut cache = self
            .cache
            .write()
            .expect("RwLock of sysvar cache poisoned");
        value.set(Arc::make_mut(&mut cache));
    }

    pub fn snapshot(&self) -> Arc<SysvarCache> {
        self.cache
            .read()
            .expect("RwLock of sysvar cache poisoned")
            .clone()
    }
}

/// Sysvar account holding the serialized value.
/// The balance of an existing account is kept unless it no longer covers
/// rent exemption for the data.
pub fn create_sysvar_account<S: Serialize>(
    value: &S,
    old_account: Option<&AccountSharedData>,
    rent: &Rent,
) -> BankResult<AccountSharedData> {
    let data = bincode::serialize(value)?;
    let lamports = rent
        .minimum_balance(data.len())
        .max(1)
        .max(old_account.map_or(0, |account| account.lamports()));
    Ok(AccountSharedData::from(Account {
        lamports,
        data,
        owner: sysvar::id(),
        executable: false,
        rent_epoch: old_account.map_or(0, |account| account.rent_epoch()),
    }))
}
