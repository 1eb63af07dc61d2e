// Double-buffering decouples the moment a client sets a property from the moment
// the property takes effect.
//
// The way this is modelled here is through the `DoubleBuffered` type, a container
// holding an optional pending value and the committed value for a particular type.
// Every role bundles all of its client-settable properties into one struct and keeps
// it in a single `DoubleBuffered`, so one `commit` sweeps the whole set at once and
// nothing outside a commit boundary ever observes a mix of pending and committed
// values.
//
// The logic is as follows:
//
// - The protocol handlers mutably access the pending state (`pending_mut`) or replace
//   it (`set_pending`) according to the client requests. Writes before the next commit
//   overwrite each other.
// - On `wl_surface.commit`, `commit` moves the pending value into the committed slot
//   and reports whether the committed value changed, which is what drives geometry
//   recomputation and configure emission in the role implementations.
//
// The same container is reused for the server side of the handshake: acknowledging a
// configure writes the acknowledged proposal into the pending slot, and the next commit
// makes it current.

/// A pending/committed pair of values
#[derive(Debug, Clone, Default)]
pub struct DoubleBuffered<T> {
    pending: Option<T>,
    committed: T,
}

impl<T: Clone + PartialEq> DoubleBuffered<T> {
    /// Create a new container whose committed value is `initial`, with nothing pending
    pub fn new(initial: T) -> Self {
        DoubleBuffered {
            pending: None,
            committed: initial,
        }
    }

    /// Replace the pending value
    pub fn set_pending(&mut self, value: T) {
        self.pending = Some(value);
    }

    /// The pending value if one was set since the last commit, the committed one otherwise
    pub fn pending(&self) -> &T {
        self.pending.as_ref().unwrap_or(&self.committed)
    }

    /// Mutable access to the pending value
    ///
    /// If nothing is pending yet, the pending value starts out as a copy of the
    /// committed one.
    pub fn pending_mut(&mut self) -> &mut T {
        let committed = &self.committed;
        self.pending.get_or_insert_with(|| committed.clone())
    }

    /// Whether a value was set since the last commit
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The last committed value
    pub fn committed(&self) -> &T {
        &self.committed
    }

    /// Move the pending value into the committed slot
    ///
    /// Returns whether the committed value changed. Without a pending value this is a
    /// no-op returning `false`.
    pub fn commit(&mut self) -> bool {
        match self.pending.take() {
            Some(value) if value != self.committed => {
                self.committed = value;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DoubleBuffered;
    use proptest::prelude::*;

    #[test]
    fn pending_falls_back_to_committed() {
        let mut value = DoubleBuffered::new(3u32);
        assert_eq!(*value.pending(), 3);
        assert!(!value.has_pending());

        value.set_pending(5);
        assert_eq!(*value.pending(), 5);
        assert_eq!(*value.committed(), 3);
    }

    #[test]
    fn commit_reports_changes_only() {
        let mut value = DoubleBuffered::new(3u32);
        value.set_pending(3);
        assert!(!value.commit());
        assert!(!value.has_pending());

        *value.pending_mut() = 8;
        assert!(value.commit());
        assert_eq!(*value.committed(), 8);
    }

    #[test]
    fn pending_mut_starts_from_committed() {
        let mut value = DoubleBuffered::new((1, 2));
        value.pending_mut().1 = 7;
        assert_eq!(*value.committed(), (1, 2));
        assert!(value.commit());
        assert_eq!(*value.committed(), (1, 7));
    }

    proptest! {
        #[test]
        fn last_write_wins(initial in any::<i32>(), writes in prop::collection::vec(any::<i32>(), 1..16)) {
            let mut value = DoubleBuffered::new(initial);
            for write in &writes {
                value.set_pending(*write);
            }
            let last = *writes.last().unwrap();
            prop_assert_eq!(value.commit(), last != initial);
            prop_assert_eq!(*value.committed(), last);

            // a second commit without new writes changes nothing
            prop_assert!(!value.commit());
            prop_assert_eq!(*value.committed(), last);
            prop_assert_eq!(*value.pending(), last);
        }
    }
}
