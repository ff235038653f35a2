//! The object variant registry (spec §3.3) and the header+body object
//! representation (spec §4.2).
//!
//! spec.md §9 notes that either raw-pointer casts over a shared memory
//! prefix, or "a sealed enum with a match on every call", are acceptable
//! ways to implement the closed variant registry. This core takes the
//! latter: `Object` pairs the two-word `ObjectHeader` with an `ObjectBody`
//! enum, and every polymorphic operation (`size_in_memory`, `can_finalize`,
//! `finalize`, `clone`, `each_pointer`) is an exhaustive match over it. The
//! `ForwardedObject` arm is handled defensively everywhere, as required.

use crate::code::CodeBlock;
use crate::header::{ObjectHeader, Reachability};
use crate::map::Map;
use crate::value::Value;
use std::collections::VecDeque;

/// Which heap space an `ObjectPtr` indexes into. Encoded in the low bits of
/// a tagged `ObjectReference` Value (spec §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Space {
    Young = 0,
    Old = 1,
    Permanent = 2,
}

impl Space {
    pub fn from_bits(bits: u8) -> Space {
        match bits {
            0 => Space::Young,
            1 => Space::Old,
            2 => Space::Permanent,
            other => panic!("invalid space tag {}", other),
        }
    }
}

/// A reference to a managed object: which space, and its index within that
/// space's current object table. Stable only until the next collection of
/// that space — untracked pointers held across a potential allocation are a
/// bug (spec §3.6); use `Tracked` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectPtr {
    pub space: Space,
    pub index: usize,
}

/// The closed object-type registry (spec §3.3). Values double as the
/// header's cached `object-type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectType {
    Slots = 0,
    Method = 1,
    Block = 2,
    Activation = 3,
    Array = 4,
    ByteArray = 5,
    Managed = 6,
    Actor = 7,
    ActorProxy = 8,
    Map = 9,
    AddrInfo = 10,
    ForwardedObject = 11,
}

impl ObjectType {
    pub fn from_u8(v: u8) -> ObjectType {
        match v {
            0 => ObjectType::Slots,
            1 => ObjectType::Method,
            2 => ObjectType::Block,
            3 => ObjectType::Activation,
            4 => ObjectType::Array,
            5 => ObjectType::ByteArray,
            6 => ObjectType::Managed,
            7 => ObjectType::Actor,
            8 => ObjectType::ActorProxy,
            9 => ObjectType::Map,
            10 => ObjectType::AddrInfo,
            11 => ObjectType::ForwardedObject,
            other => panic!("unknown object-type tag {} (registry is closed)", other),
        }
    }
}

/// An ordinary Self object: header plus inline slot values, in the order
/// the map prescribes (spec §4.4).
#[derive(Debug, Clone)]
pub struct SlotsBody {
    pub slots: Vec<Value>,
}

/// A named method (spec §4.5).
#[derive(Clone)]
pub struct MethodBody {
    pub code: CodeBlock,
    pub arg_count: usize,
    pub local_count: usize,
    pub enclosing_scope: Option<ObjectPtr>,
}

/// A closure: code plus the activation it was created in (spec §4.5).
#[derive(Clone)]
pub struct BlockBody {
    pub code: CodeBlock,
    pub arg_count: usize,
    pub local_count: usize,
    pub captured_activation: Option<ObjectPtr>,
}

/// A running method/block invocation frame (spec §4.5).
#[derive(Debug, Clone)]
pub struct ActivationBody {
    pub receiver: Value,
    pub sender: Option<ObjectPtr>,
    pub locals: Vec<Value>,
    pub program_counter: usize,
}

/// A fixed-size sequence of Values (spec §4.4).
#[derive(Debug, Clone)]
pub struct ArrayBody {
    pub values: Vec<Value>,
}

/// A length-prefixed raw byte payload (spec §4.4).
#[derive(Debug, Clone)]
pub struct ByteArrayBody {
    pub bytes: Vec<u8>,
}

/// An opaque handle with a finalizer hook (spec §3.3). The only variant for
/// which `can_finalize()` is true (spec §4.1).
pub struct ManagedBody {
    pub handle: Box<dyn std::any::Any + Send>,
    pub finalizer: Option<Box<dyn FnMut(&mut (dyn std::any::Any + Send)) + Send>>,
}

impl std::fmt::Debug for ManagedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedBody").finish_non_exhaustive()
    }
}

/// An actor: mailbox, current activation, isolation domain id (spec §3.3,
/// §5). Modelled on the teacher's `Mailbox` (`src/process.rs`).
#[derive(Debug, Clone)]
pub struct ActorBody {
    pub mailbox: VecDeque<Value>,
    pub current_activation: Option<ObjectPtr>,
    pub isolation_domain: u32,
}

/// A reference from one actor's heap into another actor's object. The only
/// operation it admits is enqueueing a message for the remote actor (spec
/// §5); it never exposes the remote object for direct dereference.
#[derive(Debug, Clone, Copy)]
pub struct ActorProxyBody {
    pub target_actor: u32,
    pub target_object: ObjectPtr,
}

/// A shape (spec §3.4, §4.3) wrapped as a heap object, since the
/// map-of-maps is itself a Map instance.
#[derive(Debug, Clone)]
pub struct MapBody(pub Map);

/// Intrinsic wrapper around a host address-info record (spec §3.3).
/// Platform socket specifics are an out-of-scope external collaborator
/// (spec §1); this variant only carries the resolved fields.
#[derive(Debug, Clone)]
pub struct AddrInfoBody {
    pub host: String,
    pub port: u16,
}

/// The GC tombstone left in from-space once an object has been copied (spec
/// §3.5). Carries no payload of its own — the forwarding address lives in
/// `ObjectHeader::map`.
#[derive(Debug, Clone, Copy)]
pub struct ForwardedBody;

#[derive(Debug, Clone)]
pub enum ObjectBody {
    Slots(SlotsBody),
    Method(MethodBody),
    Block(BlockBody),
    Activation(ActivationBody),
    Array(ArrayBody),
    ByteArray(ByteArrayBody),
    Managed(ManagedBody),
    Actor(ActorBody),
    ActorProxy(ActorProxyBody),
    Map(MapBody),
    AddrInfo(AddrInfoBody),
    Forwarded(ForwardedBody),
}

// `ManagedBody` has no sensible clone (mirrors the teacher's
// `ObjectValue::File`, which panics on copy in `heap/copy_object.rs`).
impl Clone for ManagedBody {
    fn clone(&self) -> Self {
        panic!("ManagedBody cannot be cloned (no sensible copy of an opaque handle)")
    }
}

impl std::fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodBody")
            .field("arg_count", &self.arg_count)
            .field("local_count", &self.local_count)
            .finish()
    }
}

impl std::fmt::Debug for BlockBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockBody")
            .field("arg_count", &self.arg_count)
            .field("local_count", &self.local_count)
            .finish()
    }
}

impl ObjectBody {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBody::Slots(_) => ObjectType::Slots,
            ObjectBody::Method(_) => ObjectType::Method,
            ObjectBody::Block(_) => ObjectType::Block,
            ObjectBody::Activation(_) => ObjectType::Activation,
            ObjectBody::Array(_) => ObjectType::Array,
            ObjectBody::ByteArray(_) => ObjectType::ByteArray,
            ObjectBody::Managed(_) => ObjectType::Managed,
            ObjectBody::Actor(_) => ObjectType::Actor,
            ObjectBody::ActorProxy(_) => ObjectType::ActorProxy,
            ObjectBody::Map(_) => ObjectType::Map,
            ObjectBody::AddrInfo(_) => ObjectType::AddrInfo,
            ObjectBody::Forwarded(_) => ObjectType::ForwardedObject,
        }
    }

    /// The accounting size used by `AllocationToken`/`Heap::reserve`,
    /// computed before the object actually exists so callers know how much
    /// budget to reserve (spec §4.1).
    pub fn payload_size(&self) -> usize {
        match self {
            ObjectBody::Slots(s) => s.slots.len() * std::mem::size_of::<Value>(),
            ObjectBody::Method(_) => std::mem::size_of::<MethodBody>(),
            ObjectBody::Block(_) => std::mem::size_of::<BlockBody>(),
            ObjectBody::Activation(a) => a.locals.len() * std::mem::size_of::<Value>(),
            ObjectBody::Array(a) => a.values.len() * std::mem::size_of::<Value>(),
            ObjectBody::ByteArray(b) => b.bytes.len(),
            ObjectBody::Managed(_) => std::mem::size_of::<usize>(),
            ObjectBody::Actor(a) => a.mailbox.len() * std::mem::size_of::<Value>(),
            ObjectBody::ActorProxy(_) => std::mem::size_of::<ActorProxyBody>(),
            ObjectBody::Map(m) => std::mem::size_of_val(m.0.slots()),
            ObjectBody::AddrInfo(a) => a.host.len() + std::mem::size_of::<u16>(),
            ObjectBody::Forwarded(_) => 0,
        }
    }
}

/// A managed object: the fixed header, plus its variant body.
#[derive(Debug, Clone)]
pub struct Object {
    pub header: ObjectHeader,
    pub body: ObjectBody,
}

/// Bare `ObjectPtr` fields (not wrapped in a `Value`) are rewritten by
/// round-tripping them through the same Value-rewriting closure `each_value_mut`
/// callers pass in, so a moved enclosing scope / captured activation /
/// sender / current activation doesn't dangle once from-space is dropped.
fn rewrite_ptr_field<F: FnMut(&mut Value)>(opt: &mut Option<ObjectPtr>, f: &mut F) {
    if let Some(ptr) = *opt {
        let mut v = Value::from_object_ptr(ptr);
        f(&mut v);
        *opt = v.as_object_ptr();
    }
}

impl Object {
    pub fn new(body: ObjectBody, actor_id: u32, reachability: Reachability, map: Value) -> Object {
        let object_type = body.object_type() as u8;
        Object { header: ObjectHeader::new(object_type, actor_id, reachability, map), body }
    }

    pub fn is_forwarded(&self) -> bool {
        matches!(self.body, ObjectBody::Forwarded(_))
    }

    /// Forwards this object: spec §3.5 — the header's `object-type` becomes
    /// `ForwardedObject` and `map` is reinterpreted as the new address.
    /// One-shot: calling this on an already-forwarded object is rejected
    /// (spec §8 "Forwarding is one-shot").
    pub fn forward_to(&mut self, new_location: ObjectPtr) {
        assert!(!self.is_forwarded(), "object has already been forwarded");
        self.body = ObjectBody::Forwarded(ForwardedBody);
        self.header.info.set_object_type(ObjectType::ForwardedObject as u8);
        self.header.map = Value::from_object_ptr(new_location);
    }

    pub fn forward_address(&self) -> Option<ObjectPtr> {
        if self.is_forwarded() {
            self.header.map.as_object_ptr()
        } else {
            None
        }
    }

    /// A rough size used only for `AllocationToken` bookkeeping (spec
    /// §4.1). Since this core represents objects as Rust values rather than
    /// a raw byte arena (see DESIGN.md — licensed by spec §9's "sealed
    /// enum" alternative), this is an accounting figure, not a pointer
    /// offset.
    pub fn size_in_memory(&self) -> usize {
        let header_words = 2 * std::mem::size_of::<u64>();
        header_words + self.body.payload_size()
    }

    /// Only `Managed` objects need finalization (spec §4.1).
    pub fn can_finalize(&self) -> bool {
        matches!(self.body, ObjectBody::Managed(_))
    }

    pub fn finalize(&mut self) {
        if let ObjectBody::Managed(m) = &mut self.body {
            if let Some(finalizer) = &mut m.finalizer {
                finalizer(&mut *m.handle);
            }
        }
    }

    /// Visits every outgoing `Value` this object holds that might be an
    /// `ObjectReference`, letting the GC trace (spec §4.1) and, via
    /// mutation, rewrite pointers after copying (spec §3.5).
    pub fn each_value_mut<F: FnMut(&mut Value)>(&mut self, mut f: F) {
        f(&mut self.header.map);
        match &mut self.body {
            ObjectBody::Slots(s) => s.slots.iter_mut().for_each(&mut f),
            ObjectBody::Method(m) => rewrite_ptr_field(&mut m.enclosing_scope, &mut f),
            ObjectBody::Block(b) => rewrite_ptr_field(&mut b.captured_activation, &mut f),
            ObjectBody::Activation(a) => {
                f(&mut a.receiver);
                a.locals.iter_mut().for_each(&mut f);
                rewrite_ptr_field(&mut a.sender, &mut f);
            }
            ObjectBody::Array(a) => a.values.iter_mut().for_each(&mut f),
            ObjectBody::ByteArray(_) => {}
            ObjectBody::Managed(_) => {}
            ObjectBody::Actor(a) => {
                a.mailbox.iter_mut().for_each(&mut f);
                rewrite_ptr_field(&mut a.current_activation, &mut f);
            }
            ObjectBody::ActorProxy(_) => {}
            ObjectBody::Map(_) => {}
            ObjectBody::AddrInfo(_) => {}
            ObjectBody::Forwarded(_) => {}
        }
    }

    /// Visits the `ObjectPtr`s reachable directly from this object —
    /// everything `each_value_mut` would touch, pre-resolved. Used by the
    /// collector's trace step.
    pub fn each_pointer<F: FnMut(ObjectPtr)>(&self, mut f: F) {
        if let Some(ptr) = self.header.map.as_object_ptr() {
            f(ptr);
        }
        match &self.body {
            ObjectBody::Slots(s) => {
                for v in &s.slots {
                    if let Some(ptr) = v.as_object_ptr() {
                        f(ptr);
                    }
                }
            }
            ObjectBody::Method(m) => {
                if let Some(p) = m.enclosing_scope {
                    f(p);
                }
            }
            ObjectBody::Block(b) => {
                if let Some(p) = b.captured_activation {
                    f(p);
                }
            }
            ObjectBody::Activation(a) => {
                if let Some(ptr) = a.receiver.as_object_ptr() {
                    f(ptr);
                }
                if let Some(p) = a.sender {
                    f(p);
                }
                for v in &a.locals {
                    if let Some(ptr) = v.as_object_ptr() {
                        f(ptr);
                    }
                }
            }
            ObjectBody::Array(a) => {
                for v in &a.values {
                    if let Some(ptr) = v.as_object_ptr() {
                        f(ptr);
                    }
                }
            }
            ObjectBody::ByteArray(_) => {}
            ObjectBody::Managed(_) => {}
            ObjectBody::Actor(a) => {
                for v in &a.mailbox {
                    if let Some(ptr) = v.as_object_ptr() {
                        f(ptr);
                    }
                }
                if let Some(p) = a.current_activation {
                    f(p);
                }
            }
            ObjectBody::ActorProxy(_) => {}
            ObjectBody::Map(_) => {}
            ObjectBody::AddrInfo(_) => {}
            ObjectBody::Forwarded(_) => {}
        }
    }

    /// Delegates to the variant-specific clone: copies the object and its
    /// payload into a fresh value, preserving the map, and stamping the
    /// requesting actor-id (spec §4.2). This is a *shallow* clone — object
    /// references inside (array elements, slot values) are copied by value,
    /// not recursively duplicated; see `heap::Heap::deep_copy` for the
    /// GC-style deep copy used when moving an object across actor heaps.
    pub fn shallow_clone(&self, actor_id: u32) -> Object {
        assert!(!self.is_forwarded(), "cannot clone a forwarded object; chase the forward first");
        let reachability = self.header.info.reachability();
        Object::new(self.body.clone(), actor_id, reachability, self.header.map)
    }
}
