use std::collections::HashMap;

use log::*;
use solana_sdk::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
struct HashAge {
    lamports_per_signature: u64,
    hash_height: u64,
}

/// Recent blockhashes together with the height they were registered at.
///
/// The genesis hash is registered at height 0 and every produced block
/// registers exactly one hash, so the hash height tracks the block height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockhashQueue {
    /// updated whenever a hash is registered
    hash_height: u64,

    last_hash: Hash,

    ages: HashMap<Hash, HashAge>,

    /// hashes older than `max_age` are dropped from the queue
    max_age: u64,
}

impl BlockhashQueue {
    pub fn new(
        genesis_hash: Hash,
        lamports_per_signature: u64,
        max_age: u64,
    ) -> Self {
        let mut ages = HashMap::new();
        ages.insert(
            genesis_hash,
            HashAge {
                lamports_per_signature,
                hash_height: 0,
            },
        );
        Self {
            hash_height: 0,
            last_hash: genesis_hash,
            ages,
            max_age,
        }
    }

    pub fn hash_height(&self) -> u64 {
        self.hash_height
    }

    pub fn max_age(&self) -> u64 {
        self.max_age
    }

    pub fn last_hash(&self) -> Hash {
        self.last_hash
    }

    pub fn get_lamports_per_signature(&self, hash: &Hash) -> Option<u64> {
        self.ages.get(hash).map(|age| age.lamports_per_signature)
    }

    /// Number of hashes registered after `hash`
    pub fn get_hash_age(&self, hash: &Hash) -> Option<u64> {
        self.ages
            .get(hash)
            .map(|age| self.hash_height - age.hash_height)
    }

    /// Returns false for unknown hashes and hashes older than `max_age`
    pub fn is_hash_valid_for_age(&self, hash: &Hash, max_age: u64) -> bool {
        self.get_hash_age(hash).map_or(false, |age| age <= max_age)
    }

    pub fn is_hash_valid(&self, hash: &Hash) -> bool {
        self.is_hash_valid_for_age(hash, self.max_age)
    }

    pub fn register_hash(&mut self, hash: Hash, lamports_per_signature: u64) {
        self.hash_height += 1;
        let hash_height = self.hash_height;

        // expired entries are only pruned once the queue is full, validity
        // checks look at the age anyway
        let max_age = self.max_age;
        if self.ages.len() as u64 > max_age {
            self.ages
                .retain(|_, age| hash_height - age.hash_height <= max_age);
        }
        self.ages.insert(
            hash,
            HashAge {
                lamports_per_signature,
                hash_height,
            },
        );
        self.last_hash = hash;
        trace!("Registered blockhash {hash} at height {hash_height}");
    }

    pub fn len(&self) -> usize {
        self.ages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ages.is_empty()
    }
}
