//! The Map (shape) system (spec §3.4, §4.3).
//!
//! A Map describes the slots shared by every instance that points at it: an
//! ordered table of slot descriptors, each naming a slot, its selector hash,
//! its kind, and its index into the host object's inline slot area.

/// What a slot contributes to lookup (spec §3.4, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// An ordinary read/write data slot.
    DataMutable,
    /// A data slot that cannot be assigned to.
    DataConstant,
    /// A parent slot (the `*` suffix in Self syntax) whose value
    /// contributes to the lookup chain, and which may be reassigned.
    ParentMutable,
    /// A parent slot that cannot be reassigned.
    ParentConstant,
    /// A method argument — present in a Method/Block's map, not reachable
    /// through ordinary lookup.
    Argument,
}

impl SlotKind {
    pub fn is_parent(self) -> bool {
        matches!(self, SlotKind::ParentMutable | SlotKind::ParentConstant)
    }

    pub fn is_assignable(self) -> bool {
        matches!(self, SlotKind::DataMutable | SlotKind::ParentMutable)
    }
}

/// One entry in a Map's slot table.
#[derive(Debug, Clone)]
pub struct SlotDescriptor {
    /// The slot's canonical name, as a ByteArray reference (spec §3.4). Kept
    /// as an owned `String` at this layer for simplicity; the evaluator is
    /// free to additionally intern it as a heap ByteArray for `name`
    /// messages sent back to Self code.
    pub name: String,
    pub hash: u64,
    pub kind: SlotKind,
    pub index: usize,
}

/// A shape: the slot layout shared by every instance that points at it
/// (spec §3.4, §4.3). Maps are not deduplicated — two objects with
/// structurally identical slot sets may hold distinct Map instances (spec §9
/// Open Question "Map identity"; kept as the non-interning behaviour the
/// source exhibits).
#[derive(Debug, Clone)]
pub struct Map {
    slots: Vec<SlotDescriptor>,
    /// How many inline slot words an instance of this map occupies.
    pub instance_slot_count: usize,
}

impl Map {
    pub fn empty() -> Map {
        Map { slots: Vec::new(), instance_slot_count: 0 }
    }

    pub fn with_slots(slots: Vec<SlotDescriptor>) -> Map {
        let instance_slot_count = slots
            .iter()
            .filter(|s| !matches!(s.kind, SlotKind::Argument))
            .map(|s| s.index + 1)
            .max()
            .unwrap_or(0);

        Map { slots, instance_slot_count }
    }

    pub fn slots(&self) -> &[SlotDescriptor] {
        &self.slots
    }

    /// Linear search over the slot table (spec §4.3: "small (< 32 slots
    /// typical); hashing overhead dominates for larger", so this stays a
    /// linear scan rather than a secondary hash index).
    pub fn find_slot(&self, hash: u64) -> Option<&SlotDescriptor> {
        self.slots.iter().find(|s| s.hash == hash)
    }

    pub fn is_assignable(&self, index: usize) -> bool {
        self.slots
            .iter()
            .find(|s| s.index == index)
            .map(|s| s.kind.is_assignable())
            .unwrap_or(false)
    }

    /// Parent slots in declaration order — this order fixes lookup order
    /// (spec §4.6 "Ordering note").
    pub fn parents(&self) -> impl Iterator<Item = &SlotDescriptor> {
        self.slots.iter().filter(|s| s.kind.is_parent())
    }

    /// Builds the new map for a shape transition: copy the descriptor table
    /// and append one slot (spec §4.3 "Shape transitions"). The common case
    /// — assignment to an existing mutable slot — never calls this; it
    /// reuses the current map.
    pub fn extended_with(&self, name: impl Into<String>, kind: SlotKind) -> Map {
        let name = name.into();
        let hash = crate::selector::hash_name(&name);
        let index = self
            .slots
            .iter()
            .filter(|s| !matches!(s.kind, SlotKind::Argument))
            .map(|s| s.index + 1)
            .max()
            .unwrap_or(0);

        let mut slots = self.slots.clone();
        slots.push(SlotDescriptor { name, hash, kind, index });

        Map::with_slots(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str, kind: SlotKind, index: usize) -> SlotDescriptor {
        SlotDescriptor { name: name.to_owned(), hash: crate::selector::hash_name(name), kind, index }
    }

    #[test]
    fn find_slot_matches_by_hash() {
        let map = Map::with_slots(vec![slot("x", SlotKind::DataMutable, 0)]);
        let hash = crate::selector::hash_name("x");
        assert!(map.find_slot(hash).is_some());
        assert!(map.find_slot(hash.wrapping_add(1)).is_none());
    }

    #[test]
    fn parents_are_yielded_in_declaration_order() {
        let map = Map::with_slots(vec![
            slot("a", SlotKind::ParentMutable, 0),
            slot("b", SlotKind::DataMutable, 1),
            slot("c", SlotKind::ParentConstant, 2),
        ]);
        let names: Vec<_> = map.parents().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn extending_a_map_preserves_existing_slots() {
        let map = Map::with_slots(vec![slot("x", SlotKind::DataMutable, 0)]);
        let extended = map.extended_with("y", SlotKind::DataConstant);
        assert_eq!(extended.slots().len(), 2);
        assert!(extended.find_slot(crate::selector::hash_name("x")).is_some());
        assert!(extended.find_slot(crate::selector::hash_name("y")).is_some());
    }

    #[test]
    fn is_assignable_distinguishes_constants_from_mutables() {
        let map = Map::with_slots(vec![
            slot("x", SlotKind::DataMutable, 0),
            slot("y", SlotKind::DataConstant, 1),
        ]);
        assert!(map.is_assignable(0));
        assert!(!map.is_assignable(1));
    }
}
