//! Tracked handles (spec §3.6): roots that survive garbage collection by
//! being rewritten to point at the copied object.

use crate::value::Value;

/// A registered root. `Tracked` itself is just an index into the owning
/// `Heap`'s root table — resolve it with `Heap::get_tracked`, and release it
/// with `Heap::release_tracked` once the evaluator no longer needs to keep
/// the value alive across collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracked {
    pub(crate) index: usize,
}

pub(crate) struct RootTable {
    slots: Vec<Option<Value>>,
    free: Vec<usize>,
}

impl RootTable {
    pub fn new() -> RootTable {
        RootTable { slots: Vec::new(), free: Vec::new() }
    }

    pub fn track(&mut self, value: Value) -> Tracked {
        if let Some(index) = self.free.pop() {
            self.slots[index] = Some(value);
            Tracked { index }
        } else {
            self.slots.push(Some(value));
            Tracked { index: self.slots.len() - 1 }
        }
    }

    pub fn get(&self, tracked: Tracked) -> Value {
        self.slots[tracked.index].expect("tracked handle was released")
    }

    pub fn release(&mut self, tracked: Tracked) {
        self.slots[tracked.index] = None;
        self.free.push(tracked.index);
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.slots.iter_mut().filter_map(|slot| slot.as_mut())
    }
}
