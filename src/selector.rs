//! Selector hashing (spec §4.6) and the VM-wide selector intern table
//! (spec §4.7, §5 "shared resources").
//!
//! The hashing scheme itself is lifted straight from the teacher's
//! `hasher.rs`: a seeded `ahash::AHasher`, fed the selector's bytes, folded
//! down to a fixed-width integer.

use ahash::AHasher;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::{Hash, Hasher as HasherTrait};
use std::sync::OnceLock;

/// Computes selector hashes with a process-wide random seed, mirroring the
/// teacher's `Hasher` (`src/hasher.rs`), generalised from "hash a runtime
/// value" to "hash a selector name".
#[derive(Clone)]
pub struct Hasher {
    hasher: AHasher,
    key0: u64,
    key1: u64,
}

impl Hasher {
    pub fn new(key0: u64, key1: u64) -> Self {
        Hasher {
            hasher: AHasher::new_with_keys(key0, key1),
            key0,
            key1,
        }
    }

    pub fn write_str(&mut self, value: &str) {
        value.hash(&mut self.hasher);
    }

    pub fn finish(&self) -> u64 {
        self.hasher.finish()
    }

    pub fn reset(&mut self) {
        self.hasher = AHasher::new_with_keys(self.key0, self.key1);
    }
}

fn seed_keys() -> (u64, u64) {
    use rand::RngCore;
    let mut rng = rand::thread_rng();
    (rng.next_u64(), rng.next_u64())
}

fn hash_name_with(name: &str, key0: u64, key1: u64) -> u64 {
    let mut hasher = Hasher::new(key0, key1);
    hasher.write_str(name);
    hasher.finish()
}

static SEED: OnceLock<(u64, u64)> = OnceLock::new();

fn process_seed() -> (u64, u64) {
    *SEED.get_or_init(seed_keys)
}

/// Hashes a canonical selector name. Deterministic within one process run
/// (spec §8 "Round-trips / idempotence": `hash(name) == hash(name)`).
pub fn hash_name(name: &str) -> u64 {
    let (k0, k1) = process_seed();
    hash_name_with(name, k0, k1)
}

/// Returns `true` for selectors of the form `foo:` — i.e. selectors that
/// both send a message named `foo:` *and* identify a data slot `foo` to
/// write when used as an assignment target. Keyword messages with more than
/// one keyword (`at:put:`) are not assignment selectors.
fn is_assignment_selector(selector: &str) -> bool {
    if !selector.ends_with(':') {
        return false;
    }
    selector[..selector.len() - 1].find(':').is_none()
}

/// Both hashes needed to resolve a selector against a map (spec §4.6):
/// the hash of the selector itself, and — for assignment selectors like
/// `foo:` — the hash of the underlying data-slot name `foo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorHash {
    pub regular: u64,
    pub assign_target: Option<u64>,
}

impl SelectorHash {
    pub fn of(selector: &str) -> SelectorHash {
        let regular = hash_name(selector);
        let assign_target = if is_assignment_selector(selector) {
            Some(hash_name(&selector[..selector.len() - 1]))
        } else {
            None
        };

        SelectorHash { regular, assign_target }
    }

    pub fn is_assignment(&self) -> bool {
        self.assign_target.is_some()
    }
}

/// The well-known `parent` selector (spec §4.6).
pub const PARENT_SELECTOR: &str = "parent";

pub fn parent_hash() -> u64 {
    hash_name(PARENT_SELECTOR)
}

/// VM-wide selector interning. Single-writer during boot, append-only under
/// a lock afterwards (spec §5 "shared resources" (b)) — the same shape as
/// the teacher's `string_pool` (`src/state.rs`).
pub struct SelectorTable {
    entries: Mutex<HashMap<String, u64>>,
}

impl SelectorTable {
    pub fn new() -> SelectorTable {
        SelectorTable { entries: Mutex::new(HashMap::new()) }
    }

    /// Interns `selector`, returning its regular hash. Re-interning the same
    /// name always returns the same hash (selectors hash deterministically).
    pub fn intern(&self, selector: &str) -> u64 {
        let mut entries = self.entries.lock();
        if let Some(hash) = entries.get(selector) {
            return *hash;
        }
        let hash = hash_name(selector);
        entries.insert(selector.to_owned(), hash);
        hash
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self::new()
    }
}
