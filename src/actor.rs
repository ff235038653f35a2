//! Actor mailboxes and cross-actor message delivery (spec §5).
//!
//! Each actor owns its own heap domain (`VirtualMachine::heaps`); the only
//! way to reach into another actor's object graph is through an
//! `ActorProxy`, which can enqueue a message but never hands back a
//! dereferenceable pointer into the remote heap. Modelled on the teacher's
//! `Mailbox` (`src/process.rs`), simplified to a single FIFO queue per
//! actor — messages from any one sender still arrive in the order they
//! were sent, which is all spec §5 requires ("FIFO per sender-receiver
//! pair"); this core does not yet distinguish mailboxes per sender.

use crate::header::Reachability;
use crate::object::{ActorBody, ActorProxyBody, ObjectBody, ObjectPtr};
use crate::value::Value;
use crate::vm::VirtualMachine;

/// Allocates a new `Actor` object in its own fresh heap domain, and answers
/// an `ActorProxy` pointing at it that the caller's actor can hold and send
/// through.
pub fn spawn(vm: &mut VirtualMachine, requesting_actor: u32) -> Result<(ObjectPtr, Value), crate::error::HeapError> {
    let new_actor_id = vm.spawn_actor();
    let map = vm.resolve(requesting_actor, vm.traits.object_proto).header.map;
    let actor_ptr = vm.allocate(
        new_actor_id,
        ObjectBody::Actor(ActorBody { mailbox: Default::default(), current_activation: None, isolation_domain: new_actor_id }),
        Reachability::Global,
        map,
    )?;

    let proxy_ptr = vm.allocate(
        requesting_actor,
        ObjectBody::ActorProxy(ActorProxyBody { target_actor: new_actor_id, target_object: actor_ptr }),
        Reachability::Local,
        map,
    )?;
    Ok((proxy_ptr, Value::from_object_ptr(proxy_ptr)))
}

/// Enqueues `message` on the actor an `ActorProxy` (owned by `sender_actor`)
/// points at (spec §5 invariant: "cross-actor references only through
/// ActorProxy"). `sender_actor` is needed because `proxy`'s `ObjectPtr`,
/// like every Young/Old pointer, only makes sense relative to the heap that
/// allocated it (spec §3.6) — the proxy lives in the sender's heap even
/// though it names an object in the receiver's.
pub fn send_message(vm: &mut VirtualMachine, sender_actor: u32, proxy: Value, message: Value) -> Option<()> {
    let proxy_ptr = proxy.as_object_ptr()?;
    let (target_actor, target_object) = match &vm.resolve(sender_actor, proxy_ptr).body {
        ObjectBody::ActorProxy(p) => (p.target_actor, p.target_object),
        _ => return None,
    };

    let delivered = {
        let object = vm.resolve_mut(target_actor, target_object);
        match &mut object.body {
            ObjectBody::Actor(a) => {
                a.mailbox.push_back(message);
                true
            }
            _ => false,
        }
    };
    if delivered {
        vm.scheduler.notify_ready(target_actor);
        Some(())
    } else {
        None
    }
}

/// Pops the oldest undelivered message for `actor_id`'s own `Actor` object,
/// if any.
pub fn receive(vm: &mut VirtualMachine, actor_id: u32, actor_object: ObjectPtr) -> Option<Value> {
    let object = vm.resolve_mut(actor_id, actor_object);
    match &mut object.body {
        ObjectBody::Actor(a) => a.mailbox.pop_front(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawning_an_actor_creates_a_proxy_pointing_at_a_fresh_heap() {
        let mut vm = VirtualMachine::boot();
        let (proxy_ptr, proxy_value) = spawn(&mut vm, 0).unwrap();
        assert!(proxy_value.is_object_reference());
        match &vm.resolve(0, proxy_ptr).body {
            ObjectBody::ActorProxy(p) => assert_ne!(p.target_actor, 0),
            _ => panic!("expected an ActorProxy"),
        }
    }

    #[test]
    fn messages_sent_through_a_proxy_arrive_fifo() {
        let mut vm = VirtualMachine::boot();
        let (_, proxy_value) = spawn(&mut vm, 0).unwrap();
        let target_actor = match &vm.resolve(0, proxy_value.as_object_ptr().unwrap()).body {
            ObjectBody::ActorProxy(p) => p.target_actor,
            _ => unreachable!(),
        };
        let target_object = match &vm.resolve(0, proxy_value.as_object_ptr().unwrap()).body {
            ObjectBody::ActorProxy(p) => p.target_object,
            _ => unreachable!(),
        };

        send_message(&mut vm, 0, proxy_value, Value::from_integer(1)).unwrap();
        send_message(&mut vm, 0, proxy_value, Value::from_integer(2)).unwrap();

        assert_eq!(receive(&mut vm, target_actor, target_object), Some(Value::from_integer(1)));
        assert_eq!(receive(&mut vm, target_actor, target_object), Some(Value::from_integer(2)));
        assert_eq!(receive(&mut vm, target_actor, target_object), None);
    }

    /// Spec §5's run-queue: delivering a message marks the receiving actor
    /// ready, and `VirtualMachine::run_ready` drains exactly that actor.
    #[test]
    fn delivering_a_message_marks_the_receiver_ready() {
        let mut vm = VirtualMachine::boot();
        let (_, proxy_value) = spawn(&mut vm, 0).unwrap();
        let target_object = match &vm.resolve(0, proxy_value.as_object_ptr().unwrap()).body {
            ObjectBody::ActorProxy(p) => p.target_object,
            _ => unreachable!(),
        };

        assert_eq!(vm.scheduler.next_ready(), None);
        send_message(&mut vm, 0, proxy_value, Value::from_integer(42)).unwrap();

        let mut observed = None;
        let ran = vm.run_ready(|vm, actor_id| {
            observed = receive(vm, actor_id, target_object);
        });
        assert!(ran);
        assert_eq!(observed, Some(Value::from_integer(42)));
        assert!(!vm.run_ready(|_, _| {}));
    }
}
