//! Message lookup (spec §4.6): given a receiver and a selector, find the
//! slot that answers it by searching the receiver's own map, then its
//! parent slots in declaration order, with cycle detection so a malformed
//! (or deliberately cyclic) parent graph can't loop the VM forever.

use crate::heap::permanent::Permanent;
use crate::heap::Heap;
use crate::map::Map;
use crate::object::{Object, ObjectBody, ObjectPtr};
use crate::selector::SelectorHash;
use crate::value::Value;

/// What lookup found, or didn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    /// No slot in `receiver`'s parent graph answers this selector.
    NotFound,
    /// A data slot answered it: holder object, its index in the holder's
    /// slot array, and whether it admits assignment.
    Data { holder: ObjectPtr, index: usize, assignable: bool },
    /// A slot whose *value* is itself a `Method`/`Block` object answered
    /// it — the caller should activate it rather than just read it.
    Method { holder: ObjectPtr, index: usize },
}

/// Looks up `hash` starting at `receiver`, searching the receiver's own map
/// first and then its parents in declaration order (spec §4.6 "parent-slot
/// declaration order fixes lookup order"). `visited` accumulates every
/// holder already searched on this call's stack, so a cycle among parent
/// slots (spec §8 "cycle tolerance") terminates that branch as `NotFound`
/// instead of recursing forever.
pub fn lookup(
    heap: &Heap,
    permanent: &Permanent,
    receiver: ObjectPtr,
    selector: &SelectorHash,
    visited: &mut Vec<ObjectPtr>,
) -> LookupResult {
    if visited.contains(&receiver) {
        return LookupResult::NotFound;
    }
    visited.push(receiver);

    let object = heap.resolve(receiver, permanent);
    let result = lookup_own_slots(heap, permanent, object, receiver, selector);
    if !matches!(result, LookupResult::NotFound) {
        visited.pop();
        return result;
    }

    let map = match object_map(heap, permanent, object) {
        Some(m) => m,
        None => {
            visited.pop();
            return LookupResult::NotFound;
        }
    };

    for parent_slot in map.parents() {
        let parent_value = match slot_value(object, parent_slot.index) {
            Some(v) => v,
            None => continue,
        };
        let parent_ptr = match parent_value.as_object_ptr() {
            Some(p) => p,
            None => continue,
        };

        let result = lookup(heap, permanent, parent_ptr, selector, visited);
        if !matches!(result, LookupResult::NotFound) {
            visited.pop();
            return result;
        }
    }

    visited.pop();
    LookupResult::NotFound
}

fn lookup_own_slots(
    heap: &Heap,
    permanent: &Permanent,
    object: &Object,
    holder: ObjectPtr,
    selector: &SelectorHash,
) -> LookupResult {
    let map = match object_map(heap, permanent, object) {
        Some(m) => m,
        None => return LookupResult::NotFound,
    };

    // Spec §4.6 step 4 ("a slot whose hash equals H.regular") is consulted
    // before step 5 ("H.assign_target"): an explicit `foo:` method slot
    // shadows the implicit setter for a data slot `foo`.
    if let Some(slot) = map.find_slot(selector.regular) {
        return match slot_value(object, slot.index) {
            Some(v) if is_invocable(heap, permanent, v) => LookupResult::Method { holder, index: slot.index },
            _ => LookupResult::Data { holder, index: slot.index, assignable: slot.kind.is_assignable() },
        };
    }

    if let Some(hash) = selector.assign_target {
        if let Some(slot) = map.find_slot(hash) {
            if slot.kind.is_assignable() {
                return LookupResult::Data { holder, index: slot.index, assignable: true };
            }
        }
    }

    LookupResult::NotFound
}

fn object_map<'a>(heap: &'a Heap, permanent: &'a Permanent, object: &Object) -> Option<&'a Map> {
    let map_ptr = object.header.map.as_object_ptr()?;
    let map_object = heap.resolve(map_ptr, permanent);
    match &map_object.body {
        ObjectBody::Map(m) => Some(&m.0),
        _ => None,
    }
}

fn slot_value(object: &Object, index: usize) -> Option<Value> {
    match &object.body {
        ObjectBody::Slots(s) => s.slots.get(index).copied(),
        _ => None,
    }
}

fn is_invocable(heap: &Heap, permanent: &Permanent, value: Value) -> bool {
    match value.as_object_ptr() {
        Some(ptr) => {
            let object = heap.resolve(ptr, permanent);
            matches!(object.body, ObjectBody::Method(_) | ObjectBody::Block(_))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::CodeBlock;
    use crate::map::{SlotDescriptor, SlotKind};
    use crate::object::{MapBody, MethodBody, SlotsBody};

    fn selector_hash(name: &str) -> SelectorHash {
        SelectorHash::of(name)
    }

    #[test]
    fn not_found_on_an_empty_receiver() {
        let mut permanent = Permanent::new();
        let map_ptr = permanent.allocate(ObjectBody::Map(MapBody(Map::empty())), Value::object_marker());
        let receiver_ptr =
            permanent.allocate(ObjectBody::Slots(SlotsBody { slots: vec![] }), Value::from_object_ptr(map_ptr));

        let heap = Heap::new(0);
        let mut visited = Vec::new();
        let result = lookup(&heap, &permanent, receiver_ptr, &selector_hash("foo"), &mut visited);
        assert_eq!(result, LookupResult::NotFound);
        assert!(visited.is_empty());
    }

    #[test]
    fn finds_a_data_slot_on_the_receiver_itself() {
        let mut permanent = Permanent::new();
        let slots = vec![SlotDescriptor {
            name: "x".into(),
            hash: selector_hash("x").regular,
            kind: SlotKind::DataMutable,
            index: 0,
        }];
        let map_ptr = permanent.allocate(ObjectBody::Map(MapBody(Map::with_slots(slots))), Value::object_marker());
        let receiver_ptr = permanent.allocate(
            ObjectBody::Slots(SlotsBody { slots: vec![Value::from_integer(42)] }),
            Value::from_object_ptr(map_ptr),
        );

        let heap = Heap::new(0);
        let mut visited = Vec::new();
        let result = lookup(&heap, &permanent, receiver_ptr, &selector_hash("x"), &mut visited);
        assert_eq!(result, LookupResult::Data { holder: receiver_ptr, index: 0, assignable: true });
    }

    /// Spec §4.6 step 4 precedes step 5: a receiver with both an explicit
    /// `foo:` method slot and a mutable data slot `foo` answers the method,
    /// not an assignment against `foo`.
    #[test]
    fn an_explicit_setter_method_slot_shadows_the_assignment_target() {
        let mut permanent = Permanent::new();

        let method_ptr = permanent.allocate(
            ObjectBody::Method(MethodBody {
                code: CodeBlock::Primitive("noop"),
                arg_count: 1,
                local_count: 0,
                enclosing_scope: None,
            }),
            Value::object_marker(),
        );
        let map_ptr = permanent.allocate(
            ObjectBody::Map(MapBody(Map::with_slots(vec![
                SlotDescriptor { name: "foo:".into(), hash: selector_hash("foo:").regular, kind: SlotKind::DataConstant, index: 0 },
                SlotDescriptor { name: "foo".into(), hash: selector_hash("foo").regular, kind: SlotKind::DataMutable, index: 1 },
            ]))),
            Value::object_marker(),
        );
        let receiver_ptr = permanent.allocate(
            ObjectBody::Slots(SlotsBody { slots: vec![Value::from_object_ptr(method_ptr), Value::from_integer(7)] }),
            Value::from_object_ptr(map_ptr),
        );

        let heap = Heap::new(0);
        let mut visited = Vec::new();
        let result = lookup(&heap, &permanent, receiver_ptr, &selector_hash("foo:"), &mut visited);
        assert_eq!(result, LookupResult::Method { holder: receiver_ptr, index: 0 });
    }

    #[test]
    fn falls_through_to_a_parent_slot() {
        let mut permanent = Permanent::new();

        let parent_map_ptr = permanent.allocate(
            ObjectBody::Map(MapBody(Map::with_slots(vec![SlotDescriptor {
                name: "greeting".into(),
                hash: selector_hash("greeting").regular,
                kind: SlotKind::DataConstant,
                index: 0,
            }]))),
            Value::object_marker(),
        );
        let parent_ptr = permanent.allocate(
            ObjectBody::Slots(SlotsBody { slots: vec![Value::from_integer(7)] }),
            Value::from_object_ptr(parent_map_ptr),
        );

        let child_map_ptr = permanent.allocate(
            ObjectBody::Map(MapBody(Map::with_slots(vec![SlotDescriptor {
                name: "parent".into(),
                hash: crate::selector::parent_hash(),
                kind: SlotKind::ParentConstant,
                index: 0,
            }]))),
            Value::object_marker(),
        );
        let child_ptr = permanent.allocate(
            ObjectBody::Slots(SlotsBody { slots: vec![Value::from_object_ptr(parent_ptr)] }),
            Value::from_object_ptr(child_map_ptr),
        );

        let heap = Heap::new(0);
        let mut visited = Vec::new();
        let result = lookup(&heap, &permanent, child_ptr, &selector_hash("greeting"), &mut visited);
        assert_eq!(result, LookupResult::Data { holder: parent_ptr, index: 0, assignable: false });
    }

    #[test]
    fn a_cyclic_parent_graph_terminates_as_not_found() {
        let mut permanent = Permanent::new();

        let map_ptr = permanent.allocate(
            ObjectBody::Map(MapBody(Map::with_slots(vec![SlotDescriptor {
                name: "parent".into(),
                hash: crate::selector::parent_hash(),
                kind: SlotKind::ParentConstant,
                index: 0,
            }]))),
            Value::object_marker(),
        );
        // index reserved ahead of time so the object can name itself as its
        // own parent (permanent-space indices are stable, unlike Young/Old).
        let self_ptr = permanent.allocate(
            ObjectBody::Slots(SlotsBody { slots: vec![Value::object_marker()] }),
            Value::from_object_ptr(map_ptr),
        );
        if let ObjectBody::Slots(s) = &mut permanent.get_mut(self_ptr.index).body {
            s.slots[0] = Value::from_object_ptr(self_ptr);
        }

        let heap = Heap::new(0);
        let mut visited = Vec::new();
        let result = lookup(&heap, &permanent, self_ptr, &selector_hash("never-there"), &mut visited);
        assert_eq!(result, LookupResult::NotFound);
        assert!(visited.is_empty());
    }
}
