//! Allocation tokens (spec §3.6, §4.1, §5 "Allocation tokens as scoped
//! resources").
//!
//! A token exclusively reserves a byte budget from one generation. While it
//! is alive, no collection runs on that generation — in this single-actor-
//! per-evaluator-thread model that invariant holds simply because nothing
//! re-enters `Heap::reserve`/`Heap::collect` for the same heap while a
//! token is still on the evaluator's stack; there is no background
//! collector thread that could race it.

use crate::header::Reachability;
use crate::object::{Object, ObjectBody, ObjectPtr, Space};

pub struct AllocationToken {
    pub(crate) space: Space,
    pub(crate) actor_id: u32,
    budget: usize,
    used: usize,
}

impl AllocationToken {
    pub(crate) fn new(space: Space, actor_id: u32, budget: usize) -> AllocationToken {
        AllocationToken { space, actor_id, budget, used: 0 }
    }

    /// Carves `bytes` worth of budget for one object and hands back its
    /// heap address. Must target the same generation the token reserved
    /// (`heap` is expected to be the heap this token was issued for).
    ///
    /// Over-spending the reserved budget is a programmer error: debug
    /// builds catch it with an assertion (spec §4.1).
    pub fn allocate(
        &mut self,
        heap: &mut super::Heap,
        body: ObjectBody,
        reachability: Reachability,
        map: crate::value::Value,
    ) -> ObjectPtr {
        let object = Object::new(body, self.actor_id, reachability, map);
        let size = object.size_in_memory();
        self.used += size;
        debug_assert!(
            self.used <= self.budget,
            "allocation token over-spent its reserved budget ({} > {})",
            self.used,
            self.budget
        );

        let generation = heap.generation_mut(self.space);
        let index = generation.push(object);
        ObjectPtr { space: self.space, index }
    }

    pub fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.used)
    }
}
