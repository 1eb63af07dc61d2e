//! Offset propagation from a parent role to its child popups
//!
//! Popups are placed relative to their parent. When the parent's effective offset moves
//! (its window geometry origin, or the margin-derived offset of a layer surface), the
//! anchor rectangle of each child popup has to move along with it. [`PopupChain`] keeps
//! weak references to the children of one parent for that purpose only; it never keeps
//! a popup alive.
//!
//! Destroyed popups are not removed eagerly. They are skipped and pruned the next time
//! the chain is mutated.

use tracing::trace;

use crate::utils::{Logical, Point};

use super::xdg::{PopupSurface, WeakPopupSurface};

/// Weak list of the child popups of one parent
#[derive(Debug, Default)]
pub struct PopupChain {
    popups: Vec<WeakPopupSurface>,
    offset: Point<i32, Logical>,
}

/// An offset change that still has to be applied to the child popups
///
/// Returned by [`PopupChain::set_offset`], so the caller can release the lock guarding
/// the parent before the children are repositioned.
#[must_use = "the offset shift must be applied to reach the child popups"]
#[derive(Debug)]
pub struct OffsetShift {
    delta: Point<i32, Logical>,
    popups: Vec<PopupSurface>,
}

impl OffsetShift {
    /// The offset delta
    pub fn delta(&self) -> Point<i32, Logical> {
        self.delta
    }

    /// Shift the anchor rectangle of every child popup by the delta
    pub fn apply(self) {
        for popup in self.popups {
            popup.shift_anchor(self.delta);
        }
    }
}

impl PopupChain {
    /// Current effective offset of the parent
    pub fn offset(&self) -> Point<i32, Logical> {
        self.offset
    }

    /// Register a new child popup
    pub fn push(&mut self, popup: &PopupSurface) {
        self.prune();
        self.popups.push(popup.downgrade());
    }

    /// Update the parent's effective offset
    ///
    /// Returns the shift to apply to the live children if the offset changed.
    pub fn set_offset(&mut self, offset: Point<i32, Logical>) -> Option<OffsetShift> {
        let delta = offset.saturating_sub(self.offset);
        self.offset = offset;
        self.prune();
        if delta.is_zero() {
            return None;
        }

        trace!(?delta, popups = self.popups.len(), "Propagating parent offset");
        Some(OffsetShift {
            delta,
            popups: self.live_popups(),
        })
    }

    /// Child popups that are still alive
    pub fn live_popups(&self) -> Vec<PopupSurface> {
        self.popups.iter().filter_map(|popup| popup.upgrade().ok()).collect()
    }

    /// Number of entries, including dead ones not yet pruned
    pub fn len(&self) -> usize {
        self.popups.len()
    }

    /// Whether the chain holds no entry at all
    pub fn is_empty(&self) -> bool {
        self.popups.is_empty()
    }

    fn prune(&mut self) {
        self.popups.retain(|popup| popup.upgrade().is_ok());
    }
}
