//! Utilities to track object's life cycle

use std::sync::atomic::{AtomicBool, Ordering};

/// Util to track the life time of surfaces, roles and outputs
#[derive(Debug)]
pub struct AliveTracker {
    is_alive: AtomicBool,
}

impl Default for AliveTracker {
    fn default() -> Self {
        Self {
            is_alive: AtomicBool::new(true),
        }
    }
}

impl AliveTracker {
    /// Notify the tracker that object is dead
    ///
    /// Returns `true` if the object was alive before this call.
    pub fn destroy_notify(&self) -> bool {
        self.is_alive.swap(false, Ordering::AcqRel)
    }

    /// Check if object is alive
    #[inline]
    pub fn alive(&self) -> bool {
        self.is_alive.load(Ordering::Acquire)
    }
}

/// Trait implemented by every object whose lifetime is driven by a client or the compositor
pub trait IsAlive {
    /// Check if object is alive
    fn alive(&self) -> bool;
}

impl<T: IsAlive> IsAlive for &T {
    #[inline]
    fn alive(&self) -> bool {
        IsAlive::alive(*self)
    }
}
