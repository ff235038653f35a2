//! A minimal tree-walking evaluator over `ast::Expr` (SPEC_FULL.md §C.3):
//! just enough message-send/assignment/activation machinery to drive the
//! lookup engine and heap end-to-end for the scenarios spec §8 describes
//! (hello world, lookup through parents, cycle tolerance, assignment via
//! setter, a collection forced mid-run, and the `expectToFail:`/
//! `expectToNotFail:` test harness). A real Self-syntax parser/compiler
//! stays out of scope (spec §1, §6.2).

use crate::ast::{Expr, Literal};
use crate::completion::Completion;
use crate::header::Reachability;
use crate::lookup::{lookup, LookupResult};
use crate::code::CodeBlock;
use crate::object::{ActivationBody, BlockBody, ByteArrayBody, MethodBody, ObjectBody, ObjectPtr};
use crate::selector::SelectorHash;
use crate::value::Value;
use crate::vm::VirtualMachine;

/// One frame of evaluator state: the receiver `self` is bound to, the
/// message arguments in scope, and the activation non-local returns should
/// target.
struct Frame<'a> {
    self_value: Value,
    args: &'a [Value],
    home_activation: ObjectPtr,
}

pub fn eval(vm: &mut VirtualMachine, actor_id: u32, expr: &Expr, frame_self: Value, frame_args: &[Value], home: ObjectPtr) -> Completion {
    let frame = Frame { self_value: frame_self, args: frame_args, home_activation: home };
    eval_inner(vm, actor_id, expr, &frame)
}

fn eval_inner(vm: &mut VirtualMachine, actor_id: u32, expr: &Expr, frame: &Frame) -> Completion {
    match expr {
        Expr::Literal(lit) => Completion::Normal(literal_value(vm, actor_id, lit)),
        Expr::SelfRef => Completion::Normal(frame.self_value),
        Expr::Argument(i) => match frame.args.get(*i) {
            Some(v) => Completion::Normal(*v),
            None => Completion::runtime_error(format!("argument index {} out of range", i)),
        },
        Expr::Sequence(exprs) => {
            let mut last = Completion::Normal(Value::from_object_ptr(vm.traits.nil));
            for e in exprs {
                last = eval_inner(vm, actor_id, e, frame);
                if !last.is_normal() {
                    return last;
                }
            }
            last
        }
        Expr::Return(inner) => match eval_inner(vm, actor_id, inner, frame) {
            Completion::Normal(v) => Completion::NonLocalReturn { activation: frame.home_activation, value: v },
            other => other,
        },
        Expr::Send { receiver, selector, args } => {
            let receiver_completion = eval_inner(vm, actor_id, receiver, frame);
            let receiver_value = match receiver_completion {
                Completion::Normal(v) => v,
                other => return other,
            };

            let mut arg_values = Vec::with_capacity(args.len());
            for a in args {
                match eval_inner(vm, actor_id, a, frame) {
                    Completion::Normal(v) => arg_values.push(v),
                    other => return other,
                }
            }

            send(vm, actor_id, receiver_value, selector, &arg_values)
        }
    }
}

fn literal_value(vm: &mut VirtualMachine, actor_id: u32, lit: &Literal) -> Value {
    match lit {
        Literal::Integer(i) => Value::from_integer(*i),
        Literal::Float(f) => Value::from_float(*f),
        Literal::String(s) => {
            let bytes = s.as_bytes().to_vec();
            let map = vm.resolve(actor_id, vm.traits.byte_array_proto).header.map;
            match vm.allocate(actor_id, ObjectBody::ByteArray(ByteArrayBody { bytes }), Reachability::Local, map) {
                Ok(ptr) => Value::from_object_ptr(ptr),
                Err(e) => panic!("string literal allocation failed: {}", e),
            }
        }
    }
}

/// Sends `selector` to `receiver` with `args`: look it up, then either
/// perform the data-slot read/assignment, or activate the method/block the
/// lookup found (spec §4.6, §4.5). `expectToFail:`/`expectToNotFail:` are
/// intercepted here rather than looked up — they are evaluator-level test
/// hooks (SPEC_FULL.md §C.3), not ordinary slots.
pub fn send(vm: &mut VirtualMachine, actor_id: u32, receiver: Value, selector: &str, args: &[Value]) -> Completion {
    if (selector == "expectToFail:" || selector == "expectToNotFail:") && args.len() == 1 {
        return run_expectation(vm, actor_id, selector, args[0]);
    }

    if selector.starts_with("value") && is_block(vm, actor_id, receiver) {
        return invoke_block(vm, actor_id, receiver, args);
    }

    let selector_hash = SelectorHash::of(selector);
    let start = vm.lookup_start(receiver);
    let mut visited = Vec::new();
    let result = lookup(vm.heap(actor_id), &vm.permanent, start, &selector_hash, &mut visited);

    match result {
        LookupResult::NotFound => {
            Completion::runtime_error(format!("message {:?} not understood by receiver", selector))
        }
        LookupResult::Data { holder, index, assignable } => {
            if selector_hash.is_assignment() {
                if !assignable {
                    return Completion::runtime_error(format!("slot for {:?} is not assignable", selector));
                }
                let Some(new_value) = args.first().copied() else {
                    return Completion::runtime_error("assignment selector sent with no argument");
                };
                let object = vm.resolve_mut(actor_id, holder);
                match &mut object.body {
                    ObjectBody::Slots(s) => {
                        s.slots[index] = new_value;
                        Completion::Normal(receiver)
                    }
                    _ => Completion::runtime_error("assignment target is not a Slots object"),
                }
            } else {
                match &vm.resolve(actor_id, holder).body {
                    ObjectBody::Slots(s) => Completion::Normal(s.slots[index]),
                    _ => Completion::runtime_error("data slot holder is not a Slots object"),
                }
            }
        }
        LookupResult::Method { holder, index } => {
            let method_value = match &vm.resolve(actor_id, holder).body {
                ObjectBody::Slots(s) => s.slots[index],
                _ => return Completion::runtime_error("method slot holder is not a Slots object"),
            };
            invoke_method(vm, actor_id, method_value, receiver, args)
        }
    }
}

fn is_block(vm: &VirtualMachine, actor_id: u32, value: Value) -> bool {
    match value.as_object_ptr() {
        Some(ptr) => matches!(vm.resolve(actor_id, ptr).body, ObjectBody::Block(_)),
        None => false,
    }
}

fn invoke_method(vm: &mut VirtualMachine, actor_id: u32, method_value: Value, receiver: Value, args: &[Value]) -> Completion {
    let Some(method_ptr) = method_value.as_object_ptr() else {
        return Completion::runtime_error("method slot did not hold a Method/Block object");
    };

    let (code, arg_count, local_count) = match &vm.resolve(actor_id, method_ptr).body {
        ObjectBody::Method(MethodBody { code, arg_count, local_count, .. }) => {
            (code.clone(), *arg_count, *local_count)
        }
        ObjectBody::Block(BlockBody { code, arg_count, local_count, .. }) => {
            (code.clone(), *arg_count, *local_count)
        }
        _ => return Completion::runtime_error("method slot did not hold a Method/Block object"),
    };

    if args.len() != arg_count {
        return Completion::runtime_error(format!("expected {} argument(s), got {}", arg_count, args.len()));
    }

    let activation_ptr = match vm.allocate(
        actor_id,
        ObjectBody::Activation(ActivationBody {
            receiver,
            sender: None,
            locals: vec![Value::from_object_ptr(vm.traits.nil); local_count],
            program_counter: 0,
        }),
        Reachability::Local,
        Value::object_marker(),
    ) {
        Ok(ptr) => ptr,
        Err(e) => return Completion::runtime_error(e.to_string()),
    };

    let body = match code {
        CodeBlock::Primitive(name) => return crate::primitive::dispatch(vm, actor_id, name, receiver, args),
        CodeBlock::Body(expr) => expr,
    };

    match eval(vm, actor_id, &body, receiver, args, activation_ptr) {
        Completion::NonLocalReturn { activation, value } if activation == activation_ptr => Completion::Normal(value),
        other => other,
    }
}

fn invoke_block(vm: &mut VirtualMachine, actor_id: u32, receiver: Value, args: &[Value]) -> Completion {
    let ptr = receiver.as_object_ptr().expect("is_block already checked this is a reference");
    let (code, arg_count, captured_activation) = match &vm.resolve(actor_id, ptr).body {
        ObjectBody::Block(b) => (b.code.clone(), b.arg_count, b.captured_activation),
        _ => return Completion::runtime_error("invoke_block called on a non-Block"),
    };
    if args.len() != arg_count {
        return Completion::runtime_error(format!("block expects {} argument(s), got {}", arg_count, args.len()));
    }

    let home = captured_activation.unwrap_or(ptr);
    match code {
        CodeBlock::Primitive(name) => crate::primitive::dispatch(vm, actor_id, name, receiver, args),
        CodeBlock::Body(expr) => eval(vm, actor_id, &expr, receiver, args, home),
    }
}

/// Runs `block` (a zero-argument Block value) and answers `vm`'s boolean
/// `true`/`false` singleton according to whether it matches the
/// expectation named by `selector` (spec §8's test harness). A crash that
/// reaches `RuntimeError` counts as "failed"; anything else, including a
/// non-local return, counts as "did not fail".
fn run_expectation(vm: &mut VirtualMachine, actor_id: u32, selector: &str, block: Value) -> Completion {
    if !is_block(vm, actor_id, block) {
        return Completion::runtime_error(format!("{} expects a zero-argument Block", selector));
    }
    let outcome = invoke_block(vm, actor_id, block, &[]);
    let failed = matches!(outcome, Completion::RuntimeError { .. });
    let expected_to_fail = selector == "expectToFail:";
    Completion::Normal(vm.boolean_value(failed == expected_to_fail))
}

/// Convenience used by `main.rs`: runs a top-level expression against a
/// fresh receiver (the object traits prototype) on actor 0, with no
/// enclosing activation. A `NonLocalReturn` reaching here means a `^`
/// escaped every activation on the stack, which is only possible for a
/// malformed program (spec §7) — reported as a runtime error rather than
/// silently discarded.
pub fn run_entrypoint(vm: &mut VirtualMachine, expr: &Expr) -> Completion {
    let receiver = Value::from_object_ptr(vm.traits.object_proto);
    let home = vm.traits.object_proto;
    match eval(vm, 0, expr, receiver, &[], home) {
        Completion::NonLocalReturn { .. } => {
            Completion::runtime_error("a non-local return escaped every activation")
        }
        other => other,
    }
}
