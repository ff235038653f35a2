//! The permanent space: well-known traits objects and other globals,
//! allocated once at VM boot and never collected (spec §4.1 "Finalizable
//! objects", §5 "Shared resources" (a): "immutable after VM init").
//!
//! Mirrors the teacher's `PermanentAllocator` (`heap/permament.rs`), minus
//! the Immix bucket plumbing: this core only ever appends.

use crate::header::Reachability;
use crate::object::{Object, ObjectBody, ObjectPtr, Space};
use crate::value::Value;

pub struct Permanent {
    objects: Vec<Object>,
}

impl Permanent {
    pub fn new() -> Permanent {
        Permanent { objects: Vec::new() }
    }

    /// Permanent objects are always globally reachable (spec §3.2
    /// "reachability ∈ {Local, Global}").
    pub fn allocate(&mut self, body: ObjectBody, map: Value) -> ObjectPtr {
        let object = Object::new(body, 0, Reachability::Global, map);
        self.objects.push(object);
        ObjectPtr { space: Space::Permanent, index: self.objects.len() - 1 }
    }

    pub fn get(&self, index: usize) -> &Object {
        &self.objects[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Object {
        &mut self.objects[index]
    }

    /// Patches the map field in place — used only once, to close the
    /// self-referential map-of-maps loop at boot (spec §3.4).
    pub fn set_map(&mut self, index: usize, map: Value) {
        self.objects[index].header.map = map;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter()
    }
}

impl Default for Permanent {
    fn default() -> Self {
        Self::new()
    }
}
