//! The object header (spec §3.2): two 64-bit words present at the start of
//! every managed object — the object-information bitfield, and the `map`
//! reference.

use crate::value::{Value, ValueTag};

/// Cross-actor visibility of an object (spec §3.2, §5 invariant 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Local,
    Global,
}

impl Reachability {
    fn from_bit(bit: u64) -> Reachability {
        if bit == 0 {
            Reachability::Local
        } else {
            Reachability::Global
        }
    }

    fn to_bit(self) -> u64 {
        match self {
            Reachability::Local => 0,
            Reachability::Global => 1,
        }
    }
}

// Bitfield layout: { marker:2, object-type:6, extra:8, actor-id:31,
// reachability:1, reserved:16 } — 64 bits total, lowest bit first.
const MARKER_BITS: u64 = 0b11;

const TYPE_SHIFT: u32 = 2;
const TYPE_MASK: u64 = 0b11_1111;

const EXTRA_SHIFT: u32 = 8;
const EXTRA_MASK: u64 = 0xFF;

const ACTOR_SHIFT: u32 = 16;
const ACTOR_MASK: u64 = 0x7FFF_FFFF;

const REACH_SHIFT: u32 = 47;
const REACH_MASK: u64 = 0b1;

/// The object-information word. Its low two bits are always the
/// `ObjectMarker` tag (spec §3.1) so the GC can recognise a header when it
/// encounters one during a scan.
#[derive(Clone, Copy)]
pub struct ObjectInfo(u64);

impl std::fmt::Debug for ObjectInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectInfo")
            .field("object_type", &self.object_type())
            .field("actor_id", &self.actor_id())
            .field("reachability", &self.reachability())
            .finish()
    }
}

impl ObjectInfo {
    pub fn new(object_type: u8, actor_id: u32, reachability: Reachability) -> ObjectInfo {
        debug_assert!(u64::from(object_type) <= TYPE_MASK);
        debug_assert!(u64::from(actor_id) <= ACTOR_MASK);

        let mut bits = ValueTag::ObjectMarker as u64;
        bits |= (object_type as u64 & TYPE_MASK) << TYPE_SHIFT;
        bits |= (actor_id as u64 & ACTOR_MASK) << ACTOR_SHIFT;
        bits |= reachability.to_bit() << REACH_SHIFT;

        ObjectInfo(bits)
    }

    /// `true` iff the low two bits are the `ObjectMarker` tag — i.e. this
    /// word really is a header, not a stray `Value` being misread as one.
    pub fn has_valid_marker(self) -> bool {
        (self.0 & MARKER_BITS) == ValueTag::ObjectMarker as u64
    }

    pub fn object_type(self) -> u8 {
        ((self.0 >> TYPE_SHIFT) & TYPE_MASK) as u8
    }

    pub fn set_object_type(&mut self, object_type: u8) {
        debug_assert!(u64::from(object_type) <= TYPE_MASK);
        self.0 = (self.0 & !(TYPE_MASK << TYPE_SHIFT)) | ((object_type as u64) << TYPE_SHIFT);
    }

    pub fn extra(self) -> u8 {
        ((self.0 >> EXTRA_SHIFT) & EXTRA_MASK) as u8
    }

    pub fn set_extra(&mut self, extra: u8) {
        self.0 = (self.0 & !(EXTRA_MASK << EXTRA_SHIFT)) | ((extra as u64) << EXTRA_SHIFT);
    }

    pub fn actor_id(self) -> u32 {
        ((self.0 >> ACTOR_SHIFT) & ACTOR_MASK) as u32
    }

    pub fn reachability(self) -> Reachability {
        Reachability::from_bit((self.0 >> REACH_SHIFT) & REACH_MASK)
    }

    pub fn set_reachability(&mut self, reachability: Reachability) {
        self.0 = (self.0 & !(REACH_MASK << REACH_SHIFT)) | (reachability.to_bit() << REACH_SHIFT);
    }

    #[cfg(test)]
    pub(crate) fn from_raw(bits: u64) -> ObjectInfo {
        ObjectInfo(bits)
    }
}

/// The fixed two-word prefix of every managed object.
#[derive(Debug, Clone, Copy)]
pub struct ObjectHeader {
    pub info: ObjectInfo,
    /// A Value holding an `ObjectReference` to this object's Map, or — once
    /// the object has been forwarded — a reinterpreted reference to its new
    /// location (spec §3.5).
    pub map: Value,
}

impl ObjectHeader {
    pub fn new(object_type: u8, actor_id: u32, reachability: Reachability, map: Value) -> ObjectHeader {
        ObjectHeader {
            info: ObjectInfo::new(object_type, actor_id, reachability),
            map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_is_always_valid_for_constructed_headers() {
        let info = ObjectInfo::new(5, 12, Reachability::Local);
        assert!(info.has_valid_marker());
        assert_eq!(info.object_type(), 5);
        assert_eq!(info.actor_id(), 12);
        assert_eq!(info.reachability(), Reachability::Local);
    }

    #[test]
    fn invalid_marker_is_detected() {
        // A plain Value (tag Integer) misread as a header word.
        let info = ObjectInfo::from_raw(0b00);
        assert!(!info.has_valid_marker());
    }

    #[test]
    fn extra_byte_round_trips_without_disturbing_other_fields() {
        let mut info = ObjectInfo::new(9, 100, Reachability::Global);
        info.set_extra(200);
        assert_eq!(info.extra(), 200);
        assert_eq!(info.object_type(), 9);
        assert_eq!(info.actor_id(), 100);
        assert_eq!(info.reachability(), Reachability::Global);
    }
}
