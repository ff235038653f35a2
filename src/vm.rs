//! The virtual machine (spec §5): owns the permanent space, one `Heap` per
//! actor, the VM-wide selector table, and the well-known traits objects
//! every bare value (`Integer`, `ByteArray`, ...) is looked up against.
//!
//! Mirrors the teacher's `State` (`src/state.rs`), which plays the same
//! role for jlight's VM: a single struct bundling the string-intern pool
//! and the handful of globally-shared prototype objects.

use std::collections::HashMap;

use crate::header::Reachability;
use crate::heap::permanent::Permanent;
use crate::heap::Heap;
use crate::map::{Map, SlotDescriptor, SlotKind};
use crate::object::{MapBody, Object, ObjectBody, ObjectPtr, Space};
use crate::scheduler::Scheduler;
use crate::selector::SelectorTable;
use crate::value::Value;

/// The well-known prototype objects every value's lookup chain eventually
/// bottoms out at (spec §4.6 "implicit trait parents"). Modelled on the
/// teacher's cluster of `*_prototype` fields in `src/state.rs`.
#[derive(Debug, Clone, Copy)]
pub struct Traits {
    pub object_proto: ObjectPtr,
    pub integer_proto: ObjectPtr,
    pub float_proto: ObjectPtr,
    pub byte_array_proto: ObjectPtr,
    pub array_proto: ObjectPtr,
    pub block_proto: ObjectPtr,
    pub boolean_proto: ObjectPtr,
    pub nil: ObjectPtr,
    pub true_obj: ObjectPtr,
    pub false_obj: ObjectPtr,
}

pub struct VirtualMachine {
    pub permanent: Permanent,
    pub heaps: HashMap<u32, Heap>,
    pub selectors: SelectorTable,
    pub traits: Traits,
    pub scheduler: Scheduler,
    next_actor_id: u32,
}

fn parent_slot(parent_index: usize) -> SlotDescriptor {
    SlotDescriptor {
        name: crate::selector::PARENT_SELECTOR.to_owned(),
        hash: crate::selector::parent_hash(),
        kind: SlotKind::ParentConstant,
        index: parent_index,
    }
}

impl VirtualMachine {
    /// Boots a fresh VM: the map-of-maps, every traits prototype, and actor
    /// 0 (the VM's own "main" actor) with a ready-to-use heap (spec §5 "the
    /// VM starts with one actor").
    pub fn boot() -> VirtualMachine {
        let mut permanent = Permanent::new();

        // The map-of-maps: self-referential once allocated (spec §3.4).
        let map_of_maps_map =
            permanent.allocate(ObjectBody::Map(MapBody(Map::empty())), Value::object_marker());
        permanent.set_map(map_of_maps_map.index, Value::from_object_ptr(map_of_maps_map));

        let mut empty_map = || permanent.allocate(ObjectBody::Map(MapBody(Map::empty())), Value::from_object_ptr(map_of_maps_map));

        let object_map = empty_map();
        let object_proto = permanent.allocate(
            ObjectBody::Slots(crate::object::SlotsBody { slots: vec![] }),
            Value::from_object_ptr(object_map),
        );

        let mut with_object_parent = || {
            let map = permanent.allocate(
                ObjectBody::Map(MapBody(Map::with_slots(vec![parent_slot(0)]))),
                Value::from_object_ptr(map_of_maps_map),
            );
            permanent.allocate(
                ObjectBody::Slots(crate::object::SlotsBody { slots: vec![Value::from_object_ptr(object_proto)] }),
                Value::from_object_ptr(map),
            )
        };

        let integer_proto = with_object_parent();
        let float_proto = with_object_parent();
        let byte_array_proto = with_object_parent();
        let array_proto = with_object_parent();
        let block_proto = with_object_parent();
        let boolean_proto = with_object_parent();
        let nil = with_object_parent();
        let true_obj = with_object_parent();
        let false_obj = with_object_parent();

        let traits = Traits {
            object_proto,
            integer_proto,
            float_proto,
            byte_array_proto,
            array_proto,
            block_proto,
            boolean_proto,
            nil,
            true_obj,
            false_obj,
        };

        let mut vm = VirtualMachine {
            permanent,
            heaps: HashMap::new(),
            selectors: SelectorTable::new(),
            traits,
            scheduler: Scheduler::new(),
            next_actor_id: 0,
        };
        vm.spawn_actor();
        vm
    }

    /// Pops the next actor with mail waiting and hands its id to `f` (spec
    /// §5's cooperative scheduling model: one actor's mailbox is drained to
    /// completion before another is polled). Answers `false` once the run
    /// queue is empty.
    pub fn run_ready(&mut self, mut f: impl FnMut(&mut VirtualMachine, u32)) -> bool {
        match self.scheduler.next_ready() {
            Some(actor_id) => {
                f(self, actor_id);
                true
            }
            None => false,
        }
    }

    pub fn spawn_actor(&mut self) -> u32 {
        let id = self.next_actor_id;
        self.next_actor_id += 1;
        self.heaps.insert(id, Heap::new(id));
        id
    }

    pub fn heap(&self, actor_id: u32) -> &Heap {
        self.heaps.get(&actor_id).expect("unknown actor id")
    }

    pub fn heap_mut(&mut self, actor_id: u32) -> &mut Heap {
        self.heaps.get_mut(&actor_id).expect("unknown actor id")
    }

    /// Resolves an `ObjectPtr` no matter which space it names (spec §4.1:
    /// Young/Old are per-actor, Permanent is VM-wide).
    pub fn resolve(&self, actor_id: u32, ptr: ObjectPtr) -> &Object {
        match ptr.space {
            Space::Permanent => self.permanent.get(ptr.index),
            Space::Young | Space::Old => self.heap(actor_id).resolve(ptr, &self.permanent),
        }
    }

    pub fn resolve_mut(&mut self, actor_id: u32, ptr: ObjectPtr) -> &mut Object {
        match ptr.space {
            Space::Permanent => self.permanent.get_mut(ptr.index),
            Space::Young | Space::Old => {
                let VirtualMachine { heaps, permanent, .. } = self;
                heaps.get_mut(&actor_id).expect("unknown actor id").resolve_mut(ptr, permanent)
            }
        }
    }

    /// Allocates a fresh object in `actor_id`'s young generation, running a
    /// collection first if needed (spec §4.1).
    pub fn allocate(
        &mut self,
        actor_id: u32,
        body: ObjectBody,
        reachability: Reachability,
        map: Value,
    ) -> Result<ObjectPtr, crate::error::HeapError> {
        let bytes = 16 + body.payload_size();
        let VirtualMachine { heaps, permanent, .. } = self;
        let heap = heaps.get_mut(&actor_id).expect("unknown actor id");
        let mut token = heap.reserve(Space::Young, bytes, permanent)?;
        Ok(token.allocate(heap, body, reachability, map))
    }

    /// Which object a bare value's lookup chain starts at: the value's own
    /// `ObjectPtr` if it's a reference, or the relevant traits prototype for
    /// an immediate Integer/Float (spec §4.6 "implicit trait parents").
    pub fn lookup_start(&self, value: Value) -> ObjectPtr {
        if let Some(ptr) = value.as_object_ptr() {
            return ptr;
        }
        if value.is_integer() {
            return self.traits.integer_proto;
        }
        if value.is_float() {
            return self.traits.float_proto;
        }
        unreachable!("object marker words never appear as ordinary Values")
    }

    pub fn boolean_value(&self, b: bool) -> Value {
        Value::from_object_ptr(if b { self.traits.true_obj } else { self.traits.false_obj })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_wires_every_traits_prototype_to_object() {
        let vm = VirtualMachine::boot();
        let integer_proto = vm.permanent.get(vm.traits.integer_proto.index);
        if let ObjectBody::Slots(s) = &integer_proto.body {
            assert_eq!(s.slots[0], Value::from_object_ptr(vm.traits.object_proto));
        } else {
            panic!("expected a Slots body");
        }
    }

    #[test]
    fn boot_creates_actor_zero_with_an_empty_heap() {
        let vm = VirtualMachine::boot();
        assert_eq!(vm.heap(0).young_len(), 0);
    }

    #[test]
    fn lookup_start_routes_integers_to_the_integer_trait() {
        let vm = VirtualMachine::boot();
        assert_eq!(vm.lookup_start(Value::from_integer(5)), vm.traits.integer_proto);
    }
}
