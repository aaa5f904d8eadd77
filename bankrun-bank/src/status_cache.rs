use std::collections::{HashMap, HashSet, VecDeque};

use log::*;
use solana_sdk::{clock::Slot, hash::Hash, signature::Signature};

/// Statuses of processed transactions keyed by their first signature.
///
/// Only the latest `max_entries` statuses are kept, once full the status
/// recorded first is evicted.
#[derive(Debug, Clone)]
pub struct StatusCache<T: Clone> {
    statuses: HashMap<Signature, (Slot, T)>,
    insertion_order: VecDeque<Signature>,
    max_entries: usize,
}

impl<T: Clone> StatusCache<T> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            statuses: HashMap::default(),
            insertion_order: VecDeque::default(),
            max_entries: max_entries.max(1),
        }
    }

    // -----------------
    // Queries
    // -----------------
    pub fn get_recent_transaction_status(
        &self,
        signature: &Signature,
    ) -> Option<(Slot, T)> {
        let status = self.statuses.get(signature).cloned();
        if status.is_none() {
            trace!("Missed tx status from cache for '{signature}'");
        }
        status
    }

    pub fn contains(&self, signature: &Signature) -> bool {
        self.statuses.contains_key(signature)
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    // -----------------
    // Mutators
    // -----------------
    /// Records the status, replacing an earlier one of the same signature
    pub fn insert_transaction_status(
        &mut self,
        slot: Slot,
        signature: &Signature,
        status: T,
    ) {
        if self.statuses.insert(*signature, (slot, status)).is_none() {
            self.insertion_order.push_back(*signature);
        }
        while self.statuses.len() > self.max_entries {
            let Some(evicted) = self.insertion_order.pop_front() else {
                break;
            };
            self.statuses.remove(&evicted);
            trace!("Evicted tx status of '{evicted}'");
        }
    }
}

// -----------------
// ProcessedSignatures
// -----------------
/// Signatures of processed transactions grouped by the blockhash they
/// reference.
///
/// A signature has to stay here for as long as its blockhash is accepted,
/// independent of how many statuses the [StatusCache] retains.
#[derive(Debug, Default, Clone)]
pub struct ProcessedSignatures {
    by_blockhash: HashMap<Hash, HashSet<Signature>>,
}

impl ProcessedSignatures {
    pub fn contains(&self, blockhash: &Hash, signature: &Signature) -> bool {
        self.by_blockhash
            .get(blockhash)
            .map_or(false, |signatures| signatures.contains(signature))
    }

    pub fn contains_signature(&self, signature: &Signature) -> bool {
        self.by_blockhash
            .values()
            .any(|signatures| signatures.contains(signature))
    }

    /// Returns false if the signature was already recorded for `blockhash`
    pub fn insert(&mut self, blockhash: Hash, signature: Signature) -> bool {
        self.by_blockhash
            .entry(blockhash)
            .or_default()
            .insert(signature)
    }

    /// Drops the signatures of every blockhash `keep` rejects
    pub fn purge_blockhashes(&mut self, keep: impl Fn(&Hash) -> bool) {
        self.by_blockhash.retain(|blockhash, signatures| {
            let retained = keep(blockhash);
            if !retained {
                trace!(
                    "Purged {} signatures of blockhash {blockhash}",
                    signatures.len()
                );
            }
            retained
        });
    }

    pub fn blockhash_count(&self) -> usize {
        self.by_blockhash.len()
    }
}
