//! Client connections
//!
//! A [`Client`] owns everything that is scoped to one connection: the serial counter
//! used for configure/ack correlation, the queue of outgoing events and the fatal
//! protocol error, if one was posted.

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use tracing::{debug, trace};

use crate::utils::{ids::id_gen, AliveTracker, IsAlive, Serial, SerialCounter};

use super::{error::ProtocolError, event::Event};

id_gen!(client_ids);

/// Unique identifier of a client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

#[derive(Debug)]
struct ClientInner {
    id: ClientId,
    serials: SerialCounter,
    events: Mutex<Vec<Event>>,
    error: Mutex<Option<ProtocolError>>,
    alive: AliveTracker,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        client_ids::remove(self.id.0);
    }
}

/// Handle to a client connection
///
/// Cloning the handle is cheap; all clones refer to the same connection.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Client {}

impl IsAlive for Client {
    #[inline]
    fn alive(&self) -> bool {
        self.inner.alive.alive()
    }
}

impl Default for Client {
    fn default() -> Self {
        Client::new()
    }
}

impl Client {
    /// Register a new client connection
    pub fn new() -> Client {
        let id = ClientId(client_ids::next());
        debug!(client = %id, "New client");
        Client {
            inner: Arc::new(ClientInner {
                id,
                serials: SerialCounter::new(),
                events: Mutex::new(Vec::new()),
                error: Mutex::new(None),
                alive: AliveTracker::default(),
            }),
        }
    }

    /// Identifier of this connection
    pub fn id(&self) -> ClientId {
        self.inner.id
    }

    /// Retrieve the next serial of this connection
    pub fn next_serial(&self) -> Serial {
        self.inner.serials.next_serial()
    }

    /// Queue an event for this client
    ///
    /// Events addressed to a dead connection are dropped.
    pub(crate) fn send_event(&self, event: Event) {
        if !self.alive() {
            trace!(client = %self.inner.id, ?event, "Dropping event for dead client");
            return;
        }
        trace!(client = %self.inner.id, ?event, "Sending event");
        self.inner.events.lock().unwrap().push(event);
    }

    /// Take all events queued for this client, oldest first
    pub fn drain_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.inner.events.lock().unwrap())
    }

    /// Post a fatal protocol error
    ///
    /// The connection is marked dead, queued events are discarded and any further request
    /// of this client is ignored. Only the first error is retained.
    pub fn post_error(&self, error: ProtocolError) {
        debug!(
            client = %self.inner.id,
            interface = %error.interface(),
            code = error.code(),
            "Protocol error: {}",
            error
        );
        let mut slot = self.inner.error.lock().unwrap();
        if slot.is_none() {
            *slot = Some(error);
        }
        self.inner.alive.destroy_notify();
        self.inner.events.lock().unwrap().clear();
    }

    /// The protocol error that killed this connection, if any
    pub fn protocol_error(&self) -> Option<ProtocolError> {
        self.inner.error.lock().unwrap().clone()
    }

    /// Tear down the connection without error
    pub fn disconnect(&self) {
        if self.inner.alive.destroy_notify() {
            debug!(client = %self.inner.id, "Client disconnected");
        }
    }
}
