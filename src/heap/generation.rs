//! One generation's object table (spec §4.1): a bump-style allocation
//! space with a byte budget, plus — for the young generation — a per-object
//! survivor age used to decide promotion.
//!
//! Mirrors the shape of the teacher's per-age `Bucket` array
//! (`heap/local_allocator.rs`'s `young_generation: [Bucket; YOUNG_MAX_AGE +
//! 1]`), simplified to the two-space copying model spec.md §4.1 calls for
//! explicitly, rather than the teacher's Immix block/line allocator.

use crate::object::Object;

/// Survive this many young collections and an object is promoted to the
/// old generation, mirroring the teacher's `YOUNG_MAX_AGE` constant
/// (`heap/local_allocator.rs`).
pub const YOUNG_MAX_AGE: u8 = 2;

pub struct Generation {
    pub objects: Vec<Object>,
    /// Parallel to `objects`; meaningless (and left at 0) for the old
    /// generation, which does not promote further.
    pub ages: Vec<u8>,
    pub is_young: bool,
    pub byte_limit: usize,
    pub bytes_used: usize,
}

impl Generation {
    pub fn young(byte_limit: usize) -> Generation {
        Generation { objects: Vec::new(), ages: Vec::new(), is_young: true, byte_limit, bytes_used: 0 }
    }

    pub fn old(byte_limit: usize) -> Generation {
        Generation { objects: Vec::new(), ages: Vec::new(), is_young: false, byte_limit, bytes_used: 0 }
    }

    pub fn has_capacity(&self, bytes: usize) -> bool {
        self.bytes_used + bytes <= self.byte_limit
    }

    /// Inserts an already-constructed object, returning its index. Used by
    /// `AllocationToken::allocate` and by the collector when copying
    /// survivors.
    pub fn push(&mut self, object: Object) -> usize {
        let size = object.size_in_memory();
        self.bytes_used += size;
        self.objects.push(object);
        if self.is_young {
            self.ages.push(0);
        }
        self.objects.len() - 1
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drops the current contents and replaces them wholesale — used after
    /// a scavenge has built the survivor set in a fresh `Generation`.
    pub fn replace_with(&mut self, other: Generation) {
        self.objects = other.objects;
        self.ages = other.ages;
        self.bytes_used = other.bytes_used;
    }
}
