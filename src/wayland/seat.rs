//! Seat identity
//!
//! Input handling is outside of this crate. The input subsystem only hands over the
//! identity of the seat a grab, move or resize request was issued on, together with the
//! serial of the input event that triggered it, so the compositor can validate it.

use std::fmt;

/// Identifier of a seat, assigned by the input subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeatId(pub u32);

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seat#{}", self.0)
    }
}
