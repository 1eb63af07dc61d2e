//! Configure/ack correlation
//!
//! Every role negotiates its geometry with the client through configure events tagged
//! with a serial. Clients may receive several configures before acknowledging the first
//! one, for example during an interactive resize. [`ConfigureQueue`] keeps the offers
//! still in flight, oldest first, and resolves acknowledgements against them:
//! acknowledging serial `S` discards every offer up to and including `S`, and only the
//! offer carrying `S` itself is handed back to be applied. Older offers were already
//! superseded from the client's point of view.

use std::collections::VecDeque;

use crate::utils::Serial;

/// A configure that was sent to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureRecord<S> {
    /// Serial of the configure
    pub serial: Serial,
    /// State proposed by the configure
    pub state: S,
}

/// State of the handshake of one role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureState {
    /// No configure is awaiting acknowledgement
    Idle,
    /// At least one configure is awaiting acknowledgement
    ConfigureSent,
}

/// The client acknowledged a serial that is not in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown configure serial {0}")]
pub struct UnknownSerial(pub Serial);

/// Queue of in-flight configures of one role
#[derive(Debug, Clone)]
pub struct ConfigureQueue<S> {
    in_flight: VecDeque<ConfigureRecord<S>>,
    last_acked: Option<ConfigureRecord<S>>,
    initial_configure_sent: bool,
}

impl<S> Default for ConfigureQueue<S> {
    fn default() -> Self {
        ConfigureQueue {
            in_flight: VecDeque::new(),
            last_acked: None,
            initial_configure_sent: false,
        }
    }
}

impl<S: Clone + PartialEq> ConfigureQueue<S> {
    /// Current state of the handshake
    pub fn state(&self) -> ConfigureState {
        if self.in_flight.is_empty() {
            ConfigureState::Idle
        } else {
            ConfigureState::ConfigureSent
        }
    }

    /// Whether a configure was ever sent
    pub fn initial_configure_sent(&self) -> bool {
        self.initial_configure_sent
    }

    /// Whether the client ever acknowledged a configure
    pub fn is_configured(&self) -> bool {
        self.last_acked.is_some()
    }

    /// The last acknowledged configure
    pub fn last_acked(&self) -> Option<&ConfigureRecord<S>> {
        self.last_acked.as_ref()
    }

    /// Number of configures awaiting acknowledgement
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Serials of the configures awaiting acknowledgement, oldest first
    pub fn in_flight_serials(&self) -> impl Iterator<Item = Serial> + '_ {
        self.in_flight.iter().map(|record| record.serial)
    }

    /// The newest state the client was told about
    ///
    /// This is the newest in-flight offer, or the last acknowledged one when nothing is
    /// in flight.
    pub fn last_sent_state(&self) -> Option<&S> {
        self.in_flight
            .back()
            .or(self.last_acked.as_ref())
            .map(|record| &record.state)
    }

    /// Whether offering `state` would tell the client anything new
    pub fn needs_configure(&self, state: &S) -> bool {
        !self.initial_configure_sent || self.last_sent_state() != Some(state)
    }

    /// Record a configure that is being sent
    ///
    /// # Panics
    ///
    /// Panics if `serial` is not newer than every serial already in flight. Serials come
    /// from the per-connection counter, so this can only be an internal bug.
    pub fn push(&mut self, serial: Serial, state: S) {
        if let Some(newest) = self.in_flight.back() {
            assert!(
                newest.serial < serial,
                "configure serial {} is not newer than the in-flight serial {}",
                serial,
                newest.serial
            );
        }
        self.initial_configure_sent = true;
        self.in_flight.push_back(ConfigureRecord { serial, state });
    }

    /// Resolve an acknowledgement
    ///
    /// Every in-flight configure up to and including `serial` is discarded, and the one
    /// carrying `serial` is returned so its state can be applied.
    pub fn ack(&mut self, serial: Serial) -> Result<ConfigureRecord<S>, UnknownSerial> {
        let position = self
            .in_flight
            .iter()
            .position(|record| record.serial == serial)
            .ok_or(UnknownSerial(serial))?;

        let acked = self
            .in_flight
            .drain(..=position)
            .last()
            .ok_or(UnknownSerial(serial))?;
        self.last_acked = Some(acked.clone());
        Ok(acked)
    }

    /// Forget every in-flight configure
    pub fn reset(&mut self) {
        self.in_flight.clear();
        self.last_acked = None;
        self.initial_configure_sent = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::SerialCounter;

    #[test]
    fn acking_discards_older_offers() {
        let counter = SerialCounter::new();
        let mut queue = ConfigureQueue::default();
        assert_eq!(queue.state(), ConfigureState::Idle);

        let s1 = counter.next_serial();
        let s2 = counter.next_serial();
        let s3 = counter.next_serial();
        queue.push(s1, "first");
        queue.push(s2, "second");
        queue.push(s3, "third");
        assert_eq!(queue.state(), ConfigureState::ConfigureSent);

        let acked = queue.ack(s2).unwrap();
        assert_eq!(acked, ConfigureRecord { serial: s2, state: "second" });
        assert_eq!(queue.in_flight_serials().collect::<Vec<_>>(), vec![s3]);
        assert_eq!(queue.state(), ConfigureState::ConfigureSent);

        assert_eq!(queue.ack(s1), Err(UnknownSerial(s1)));

        queue.ack(s3).unwrap();
        assert_eq!(queue.state(), ConfigureState::Idle);
        assert_eq!(queue.last_acked().map(|r| r.state), Some("third"));
    }

    #[test]
    fn unknown_serial_leaves_the_queue_untouched() {
        let mut queue = ConfigureQueue::default();
        queue.push(Serial::from(4), 1u32);
        assert_eq!(queue.ack(Serial::from(9)), Err(UnknownSerial(Serial::from(9))));
        assert_eq!(queue.in_flight(), 1);
        assert!(!queue.is_configured());
    }

    #[test]
    fn needs_configure_compares_against_the_newest_offer() {
        let mut queue = ConfigureQueue::default();
        assert!(queue.needs_configure(&10u32));

        queue.push(Serial::from(1), 10u32);
        assert!(!queue.needs_configure(&10));
        assert!(queue.needs_configure(&11));

        queue.ack(Serial::from(1)).unwrap();
        assert!(!queue.needs_configure(&10));
    }

    #[test]
    #[should_panic]
    fn serials_must_increase() {
        let mut queue = ConfigureQueue::default();
        queue.push(Serial::from(5), ());
        queue.push(Serial::from(5), ());
    }
}
