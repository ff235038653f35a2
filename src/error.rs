//! Fatal core error conditions (spec §7).
//!
//! Primitive-level failures (`TypeMismatch`, `IndexOutOfBounds`) stay as
//! `Result<T, String>` at the primitive boundary, matching the teacher's own
//! idiom (`object_value.rs`'s `as_array`/`as_string`/... family) — they are
//! meant to become a runtime-error `Completion`, not to propagate as a Rust
//! error type. The handful of conditions that are unrecoverable for the
//! *heap* itself get a real enum here, grounded in the one GC crate in the
//! retrieval pack that types these the same way
//! (`examples/Luvion1-Fax/faxc/crates/fgc/src/error.rs`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeapError {
    /// The heap could not satisfy a reservation even after a collection
    /// (spec §4.1, §7).
    #[error("out of memory: could not reserve {requested} bytes in {generation:?} after collection")]
    OutOfMemory { generation: crate::object::Space, requested: usize },
}

/// Marker-mismatch, a forwarded object reached in dispatch, or an unknown
/// object type — spec §7 classifies these as fatal (`InvariantViolation`):
/// a diagnostic panic in debug builds, undefined behaviour tolerated at
/// unchecked casts in release builds without safety. This core never takes
/// the unchecked-cast path (see DESIGN.md), so `InvariantViolation` always
/// panics; the type exists so callers that want to report it as a
/// `Completion` rather than aborting the process still can.
#[derive(Debug, Error)]
pub enum InvariantViolation {
    #[error("object header at {0:?} does not carry a valid ObjectMarker tag")]
    BadMarker(crate::object::ObjectPtr),
    #[error("dispatch reached a ForwardedObject tombstone at {0:?}; caller should have chased the forward")]
    UnchasedForward(crate::object::ObjectPtr),
}
