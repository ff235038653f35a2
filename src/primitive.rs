//! Primitive methods (spec §8's boundary primitives, plus a few arithmetic
//! ones needed to exercise the evaluator end-to-end).
//!
//! A primitive is named by the string carried in `CodeBlock::Primitive`
//! (spec §4.5) and dispatched here rather than through `lookup` a second
//! time — mirrors the teacher's primitive table in spirit
//! (`object_value.rs`'s per-variant inherent methods), generalised to a
//! name-indexed dispatch since this core's primitives are plain functions
//! rather than `ObjectValue` methods.

use crate::completion::Completion;
use crate::header::Reachability;
use crate::object::{ByteArrayBody, ManagedBody, ObjectBody};
use crate::value::Value;
use crate::vm::VirtualMachine;
use num_bigint::BigInt;
use std::convert::TryFrom;

/// Runs the named primitive. `receiver` and `args` are already-evaluated
/// Values; the primitive is responsible for any type checking it needs,
/// reporting a mismatch as `Completion::runtime_error` (spec §7) rather
/// than panicking.
pub fn dispatch(vm: &mut VirtualMachine, actor_id: u32, name: &str, receiver: Value, args: &[Value]) -> Completion {
    match name {
        "_StringPrint" => string_print(vm, actor_id, receiver),
        "_ByteAt:" => byte_at(vm, actor_id, receiver, args),
        "_ByteAt:Put:" => byte_at_put(vm, actor_id, receiver, args),
        "_ByteVectorCopySize:" => byte_vector_copy_size(vm, actor_id, receiver, args),
        "+" => integer_add(vm, actor_id, receiver, args),
        "_Error:" => raise_error(vm, actor_id, args),
        other => Completion::runtime_error(format!("no primitive named {:?}", other)),
    }
}

/// `_Error:` (spec §8 test harness: `_Error: 'boom'`): unconditionally
/// raises a runtime error, with the message taken from the ByteArray
/// argument when given one.
fn raise_error(vm: &mut VirtualMachine, actor_id: u32, args: &[Value]) -> Completion {
    match args.first().and_then(|v| as_byte_array(vm, actor_id, *v)) {
        Some(bytes) => Completion::runtime_error(String::from_utf8_lossy(&bytes.bytes).into_owned()),
        None => Completion::runtime_error("_Error: raised"),
    }
}

fn as_byte_array(vm: &VirtualMachine, actor_id: u32, receiver: Value) -> Option<&ByteArrayBody> {
    let ptr = receiver.as_object_ptr()?;
    match &vm.resolve(actor_id, ptr).body {
        ObjectBody::ByteArray(b) => Some(b),
        _ => None,
    }
}

/// `_StringPrint` (spec §8): writes the ByteArray's bytes to stdout as
/// UTF-8, falling back to a lossy decode for non-UTF-8 payloads, and
/// answers the receiver (the Self convention for a printing primitive).
fn string_print(vm: &mut VirtualMachine, actor_id: u32, receiver: Value) -> Completion {
    let Some(bytes) = as_byte_array(vm, actor_id, receiver) else {
        return Completion::runtime_error("_StringPrint sent to a non-ByteArray receiver");
    };
    println!("{}", String::from_utf8_lossy(&bytes.bytes));
    Completion::Normal(receiver)
}

/// `_ByteAt:` (spec §8): 0-based byte read, bounds-checked.
fn byte_at(vm: &mut VirtualMachine, actor_id: u32, receiver: Value, args: &[Value]) -> Completion {
    let Some(bytes) = as_byte_array(vm, actor_id, receiver) else {
        return Completion::runtime_error("_ByteAt: sent to a non-ByteArray receiver");
    };
    let Some(index) = args.first().and_then(|v| v.as_integer()) else {
        return Completion::runtime_error("_ByteAt: expects an Integer index");
    };
    match usize::try_from(index).ok().and_then(|i| bytes.bytes.get(i)) {
        Some(byte) => Completion::Normal(Value::from_integer(*byte as i64)),
        None => Completion::runtime_error(format!("_ByteAt: index {} out of bounds", index)),
    }
}

/// `_ByteAt:Put:` (spec §8): 0-based byte write, bounds-checked, answers
/// the receiver.
fn byte_at_put(vm: &mut VirtualMachine, actor_id: u32, receiver: Value, args: &[Value]) -> Completion {
    let (Some(index), Some(byte)) =
        (args.first().and_then(|v| v.as_integer()), args.get(1).and_then(|v| v.as_integer()))
    else {
        return Completion::runtime_error("_ByteAt:Put: expects (Integer, Integer)");
    };
    if !(0..=255).contains(&byte) {
        return Completion::runtime_error(format!("_ByteAt:Put: value {} does not fit in a byte", byte));
    }
    let Some(ptr) = receiver.as_object_ptr() else {
        return Completion::runtime_error("_ByteAt:Put: sent to a non-ByteArray receiver");
    };

    let object = vm.resolve_mut(actor_id, ptr);
    match &mut object.body {
        ObjectBody::ByteArray(b) => match usize::try_from(index).ok().filter(|&i| i < b.bytes.len()) {
            Some(i) => {
                b.bytes[i] = byte as u8;
                Completion::Normal(receiver)
            }
            None => Completion::runtime_error(format!("_ByteAt:Put: index {} out of bounds", index)),
        },
        _ => Completion::runtime_error("_ByteAt:Put: sent to a non-ByteArray receiver"),
    }
}

/// `_ByteVectorCopySize:` (spec §8): allocates a fresh ByteArray holding the
/// first `new_size` bytes of the receiver. `new_size` must be strictly less
/// than the receiver's length (spec §8: "size = length-1 succeeds; with
/// length errors") — this is a bounded copy, not a resizing primitive.
fn byte_vector_copy_size(vm: &mut VirtualMachine, actor_id: u32, receiver: Value, args: &[Value]) -> Completion {
    let Some(new_size) = args.first().and_then(|v| v.as_integer()).and_then(|n| usize::try_from(n).ok()) else {
        return Completion::runtime_error("_ByteVectorCopySize: expects a non-negative Integer");
    };
    let Some(source) = as_byte_array(vm, actor_id, receiver) else {
        return Completion::runtime_error("_ByteVectorCopySize: sent to a non-ByteArray receiver");
    };
    if new_size >= source.bytes.len() {
        return Completion::runtime_error(format!(
            "_ByteVectorCopySize: size {} out of bounds for a {}-byte receiver",
            new_size,
            source.bytes.len()
        ));
    }
    let bytes = source.bytes[..new_size].to_vec();

    let map = vm.resolve(actor_id, receiver.as_object_ptr().unwrap()).header.map;
    match vm.allocate(actor_id, ObjectBody::ByteArray(ByteArrayBody { bytes }), crate::header::Reachability::Local, map) {
        Ok(ptr) => Completion::Normal(Value::from_object_ptr(ptr)),
        Err(e) => Completion::runtime_error(e.to_string()),
    }
}

/// `+` on two tagged Integers. A sum that no longer fits the 62-bit tagged
/// range is boxed rather than rejected (spec §9 "Integer tag width": "an
/// implementer should treat integer overflow as undefined behaviour unless a
/// test pins it" — this core pins it to the bignum escape hatch described in
/// SPEC_FULL.md §B rather than leaving it undefined).
fn integer_add(vm: &mut VirtualMachine, actor_id: u32, receiver: Value, args: &[Value]) -> Completion {
    let (Some(a), Some(b)) = (receiver.as_integer(), args.first().and_then(|v| v.as_integer())) else {
        return Completion::runtime_error("+ expects two Integer operands");
    };
    match a.checked_add(b) {
        Some(sum) if (crate::value::MIN_INTEGER..=crate::value::MAX_INTEGER).contains(&sum) => {
            Completion::Normal(Value::from_integer(sum))
        }
        _ => promote_to_bigint(vm, actor_id, BigInt::from(a) + BigInt::from(b)),
    }
}

/// Boxes `value` as an opaque `Managed` handle (spec §3.3's Managed variant:
/// "an opaque host-extension payload"), mirroring the teacher's
/// `ObjectValue::BigInt` escape hatch (`object_value.rs`) without this core
/// otherwise interpreting arbitrary-precision arithmetic itself.
fn promote_to_bigint(vm: &mut VirtualMachine, actor_id: u32, value: BigInt) -> Completion {
    let body = ObjectBody::Managed(ManagedBody { handle: Box::new(value), finalizer: None });
    match vm.allocate(actor_id, body, Reachability::Local, Value::object_marker()) {
        Ok(ptr) => Completion::Normal(Value::from_object_ptr(ptr)),
        Err(e) => Completion::runtime_error(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Reachability;
    use crate::vm::VirtualMachine;

    fn byte_array(vm: &mut VirtualMachine, bytes: Vec<u8>) -> Value {
        let map = vm.resolve(0, vm.traits.byte_array_proto).header.map;
        let ptr = vm.allocate(0, ObjectBody::ByteArray(ByteArrayBody { bytes }), Reachability::Local, map).unwrap();
        Value::from_object_ptr(ptr)
    }

    /// Spec §8: `_ByteAt:` with index = length-1 succeeds; with length or -1 errors.
    #[test]
    fn byte_at_boundary_behaviour() {
        let mut vm = VirtualMachine::boot();
        let receiver = byte_array(&mut vm, vec![10, 20, 30]);

        let ok = dispatch(&mut vm, 0, "_ByteAt:", receiver, &[Value::from_integer(2)]);
        assert_eq!(ok.as_value(), Some(Value::from_integer(30)));

        let at_length = dispatch(&mut vm, 0, "_ByteAt:", receiver, &[Value::from_integer(3)]);
        assert!(matches!(at_length, Completion::RuntimeError { .. }));

        let negative = dispatch(&mut vm, 0, "_ByteAt:", receiver, &[Value::from_integer(-1)]);
        assert!(matches!(negative, Completion::RuntimeError { .. }));
    }

    /// Spec §8: `_ByteAt:Put:` with new-value 0 and 255 succeed; -1 and 256 error.
    #[test]
    fn byte_at_put_boundary_behaviour() {
        let mut vm = VirtualMachine::boot();
        let receiver = byte_array(&mut vm, vec![0, 0]);

        let low = dispatch(&mut vm, 0, "_ByteAt:Put:", receiver, &[Value::from_integer(0), Value::from_integer(0)]);
        assert!(low.is_normal());
        let high = dispatch(&mut vm, 0, "_ByteAt:Put:", receiver, &[Value::from_integer(1), Value::from_integer(255)]);
        assert!(high.is_normal());

        let below = dispatch(&mut vm, 0, "_ByteAt:Put:", receiver, &[Value::from_integer(0), Value::from_integer(-1)]);
        assert!(matches!(below, Completion::RuntimeError { .. }));
        let above = dispatch(&mut vm, 0, "_ByteAt:Put:", receiver, &[Value::from_integer(0), Value::from_integer(256)]);
        assert!(matches!(above, Completion::RuntimeError { .. }));

        let after = dispatch(&mut vm, 0, "_ByteAt:", receiver, &[Value::from_integer(1)]);
        assert_eq!(after.as_value(), Some(Value::from_integer(255)));
    }

    /// Spec §8: `_ByteVectorCopySize:` with size = length-1 succeeds; with length errors.
    #[test]
    fn byte_vector_copy_size_boundary_behaviour() {
        let mut vm = VirtualMachine::boot();
        let receiver = byte_array(&mut vm, vec![1, 2, 3]);

        let smaller = dispatch(&mut vm, 0, "_ByteVectorCopySize:", receiver, &[Value::from_integer(2)]);
        let smaller_ptr = smaller.as_value().unwrap().as_object_ptr().unwrap();
        match &vm.resolve(0, smaller_ptr).body {
            ObjectBody::ByteArray(b) => assert_eq!(b.bytes, vec![1, 2]),
            other => panic!("expected ByteArray, got {:?}", other),
        }

        let at_length = dispatch(&mut vm, 0, "_ByteVectorCopySize:", receiver, &[Value::from_integer(3)]);
        assert!(matches!(at_length, Completion::RuntimeError { .. }));

        let negative = dispatch(&mut vm, 0, "_ByteVectorCopySize:", receiver, &[Value::from_integer(-1)]);
        assert!(matches!(negative, Completion::RuntimeError { .. }));
    }

    /// Spec §8: allocation of a byte array of size 0 succeeds and yields
    /// `getLength() == 0`.
    #[test]
    fn empty_byte_array_allocation_succeeds() {
        let mut vm = VirtualMachine::boot();
        let receiver = byte_array(&mut vm, vec![]);
        let ptr = receiver.as_object_ptr().unwrap();
        match &vm.resolve(0, ptr).body {
            ObjectBody::ByteArray(b) => assert_eq!(b.bytes.len(), 0),
            other => panic!("expected ByteArray, got {:?}", other),
        }
    }

    #[test]
    fn string_print_writes_utf8_and_answers_the_receiver() {
        let mut vm = VirtualMachine::boot();
        let receiver = byte_array(&mut vm, b"hi".to_vec());
        let completion = dispatch(&mut vm, 0, "_StringPrint", receiver, &[]);
        assert_eq!(completion.as_value(), Some(receiver));
    }

    /// Spec §9 "Integer tag width": a `+` that overflows the tagged range
    /// boxes the exact sum as a `Managed` `BigInt` rather than wrapping or
    /// panicking.
    #[test]
    fn integer_addition_overflow_promotes_to_a_boxed_bigint() {
        use num_traits::ToPrimitive;

        let mut vm = VirtualMachine::boot();
        let completion = dispatch(&mut vm, 0, "+", Value::from_integer(crate::value::MAX_INTEGER), &[
            Value::from_integer(crate::value::MAX_INTEGER),
        ]);
        let ptr = completion.as_value().unwrap().as_object_ptr().unwrap();
        match &vm.resolve(0, ptr).body {
            ObjectBody::Managed(m) => {
                let boxed = m.handle.downcast_ref::<BigInt>().expect("expected a boxed BigInt");
                let expected = BigInt::from(crate::value::MAX_INTEGER) * BigInt::from(2);
                assert_eq!(boxed.to_i128(), expected.to_i128());
            }
            other => panic!("expected Managed, got {:?}", other),
        }
    }
}
