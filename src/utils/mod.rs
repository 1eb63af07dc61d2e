//! Various utilities functions and types

mod alive_tracker;
mod geometry;
pub(crate) mod ids;
mod serial;

pub use self::alive_tracker::{AliveTracker, IsAlive};
pub use self::geometry::{Coordinate, Logical, Point, Rectangle, Size};
pub use self::serial::{Serial, SerialCounter};

/// This resource has been destroyed and can no longer be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("This resource has been destroyed and can no longer be used.")]
pub struct DeadResource;
