use std::{
    cmp::Ordering,
    fmt,
    sync::atomic::{self, AtomicU32},
};

/// Configure serial
///
/// Serials correlate configure events with the client's `ack_configure` requests. They
/// are only meaningful within the connection that produced them.
///
/// Ordering is wrap-aware: a serial is considered older than another one if it lies at
/// most half the `u32` range behind it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Serial(pub(crate) u32);

impl PartialOrd for Serial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.0.abs_diff(other.0) < u32::MAX / 2 {
            Some(self.0.cmp(&other.0))
        } else {
            // one of them wrapped around
            Some(other.0.cmp(&self.0))
        }
    }
}

impl From<u32> for Serial {
    #[inline]
    fn from(value: u32) -> Self {
        Serial(value)
    }
}

impl From<Serial> for u32 {
    #[inline]
    fn from(serial: Serial) -> u32 {
        serial.0
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serial {
    /// Whether this serial was handed out at the same time as or after `other`
    pub fn is_no_older_than(&self, other: &Serial) -> bool {
        other <= self
    }
}

/// Per-connection source of serials
///
/// Every [`Client`](crate::wayland::Client) owns exactly one counter, so serials increase
/// monotonically per connection.
///
/// Counting starts at `1` and wraps around on overflow, `0` is never handed out.
#[derive(Debug)]
pub struct SerialCounter {
    next: AtomicU32,
}

impl Default for SerialCounter {
    fn default() -> Self {
        SerialCounter::new()
    }
}

impl SerialCounter {
    /// Create a counter whose first serial is `1`
    pub fn new() -> Self {
        SerialCounter::starting_at(1)
    }

    fn starting_at(value: u32) -> Self {
        SerialCounter {
            next: AtomicU32::new(value),
        }
    }

    /// Hand out the next serial
    pub fn next_serial(&self) -> Serial {
        let mut serial = self.next.fetch_add(1, atomic::Ordering::AcqRel);
        if serial == 0 {
            serial = self.next.fetch_add(1, atomic::Ordering::AcqRel);
        }
        Serial(serial)
    }
}
