//! Utilities for handling the `ext-session-lock` protocol
//!
//! ## How to use it
//!
//! ### Initialization
//!
//! To initialize this implementation create the [`SessionLockState`] and
//! implement the [`SessionLockHandler`], as shown in this example:
//!
//! ```
//! use shellwright::wayland::output::Output;
//! use shellwright::wayland::session_lock::{LockSurface, SessionLockHandler, SessionLockState, SessionLocker};
//!
//! # struct State { session_lock_state: SessionLockState, pending: Option<SessionLocker> }
//! // Implement the necessary trait.
//! impl SessionLockHandler for State {
//!     fn session_lock_state(&mut self) -> &mut SessionLockState {
//!         &mut self.session_lock_state
//!     }
//!
//!     fn lock(&mut self, confirmation: SessionLocker) {
//!         // Lock and clear the screen.
//!
//!         // Call `SessionLocker::lock` after the cleared frame was presented.
//!         self.pending = Some(confirmation);
//!     }
//!
//!     fn unlock(&mut self) {
//!         // Remove session lock.
//!     }
//!
//!     fn new_surface(&mut self, _surface: LockSurface, _output: Output) {
//!         // Display `LockSurface` on `Output`.
//!     }
//! }
//! ```
//!
//! ### Requests
//!
//! A lock is requested with [`lock`]. Lock surfaces are created with
//! [`get_lock_surface`], the requests of the lock object and of the lock surfaces are
//! fed to [`handle_session_lock_request`] and [`handle_lock_surface_request`].
//!
//! Only one lock can be active at a time. A lock requested while another live client
//! holds one is refused with a `finished` event.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::debug;

use crate::utils::{AliveTracker, IsAlive};
use crate::wayland::{
    compositor::Surface,
    event::Event,
    output::Output,
    shell::ShellHandler,
    Client,
};

mod lock;
mod surface;

pub use self::lock::{get_lock_surface, handle_session_lock_request, SessionLockRequest};
pub use self::surface::{
    handle_lock_surface_request, LockSurface, LockSurfaceConfigure, LockSurfaceRequest, LockSurfaceState,
};

/// State of the session lock manager
#[derive(Debug, Default)]
pub struct SessionLockState {
    current: Option<SessionLock>,
    lock_surfaces: Vec<LockSurface>,
}

impl SessionLockState {
    /// Create a new session lock manager state
    pub fn new() -> SessionLockState {
        SessionLockState::default()
    }

    /// The lock currently requested or held, if any
    pub fn current_lock(&self) -> Option<&SessionLock> {
        self.current.as_ref().filter(|lock| lock.is_active())
    }

    /// Whether the session is locked
    pub fn is_locked(&self) -> bool {
        self.current_lock().map(SessionLock::is_locked).unwrap_or(false)
    }

    /// All lock surfaces still alive
    pub fn lock_surfaces(&self) -> &[LockSurface] {
        &self.lock_surfaces
    }

    pub(crate) fn add_surface(&mut self, surface: LockSurface) {
        self.lock_surfaces.push(surface);
    }

    pub(crate) fn clear_lock(&mut self, lock: &SessionLock) {
        if self.current.as_ref() == Some(lock) {
            self.current = None;
        }
    }

    pub(crate) fn cleanup(&mut self) {
        self.lock_surfaces.retain(|surface| surface.alive());
    }
}

/// Handler trait for ext-session-lock.
pub trait SessionLockHandler {
    /// Session lock state.
    fn session_lock_state(&mut self) -> &mut SessionLockState;

    /// Handle compositor locking requests.
    ///
    /// The [`SessionLocker`] parameter is used to confirm once the session was
    /// locked and no more client data is accessible using the
    /// [`SessionLocker::lock`] method.
    ///
    /// If locking was not possible, dropping the [`SessionLocker`] will
    /// automatically notify the requesting client about the failure.
    fn lock(&mut self, confirmation: SessionLocker);

    /// Handle compositor lock removal.
    fn unlock(&mut self);

    /// Add a new lock surface for an output.
    fn new_surface(&mut self, surface: LockSurface, output: Output);

    /// A surface has acknowledged a configure serial.
    fn ack_configure(&mut self, surface: Surface, configure: LockSurfaceConfigure) {
        let _ = (surface, configure);
    }
}

#[derive(Debug)]
struct SessionLockData {
    client: Client,
    alive: AliveTracker,
    locked: AtomicBool,
    finished: AtomicBool,
}

/// Handle to a session lock object (`ext_session_lock_v1`)
#[derive(Debug, Clone)]
pub struct SessionLock {
    inner: Arc<SessionLockData>,
}

impl PartialEq for SessionLock {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for SessionLock {}

impl IsAlive for SessionLock {
    #[inline]
    fn alive(&self) -> bool {
        self.inner.alive.alive()
    }
}

impl SessionLock {
    fn new(client: &Client) -> SessionLock {
        SessionLock {
            inner: Arc::new(SessionLockData {
                client: client.clone(),
                alive: AliveTracker::default(),
                locked: AtomicBool::new(false),
                finished: AtomicBool::new(false),
            }),
        }
    }

    /// The client owning the lock
    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// Whether the compositor confirmed the lock
    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::Acquire)
    }

    /// Whether the compositor refused the lock
    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::Acquire)
    }

    // A lock blocks new ones as long as its client may still unlock it.
    fn is_active(&self) -> bool {
        self.alive() && self.inner.client.alive() && !self.is_finished()
    }

    fn confirm(&self) {
        if !self.alive() || self.is_finished() {
            return;
        }
        if !self.inner.locked.swap(true, Ordering::AcqRel) {
            debug!(client = %self.inner.client.id(), "Session locked");
            self.inner.client.send_event(Event::Locked);
        }
    }

    fn finish(&self) {
        if !self.alive() || self.is_locked() {
            return;
        }
        if !self.inner.finished.swap(true, Ordering::AcqRel) {
            debug!(client = %self.inner.client.id(), "Session lock refused");
            self.inner.client.send_event(Event::LockFinished);
        }
    }

    fn destroy(&self) {
        self.inner.alive.destroy_notify();
    }
}

/// Manage session locking.
///
/// See [`SessionLockHandler::lock`] for more detail.
#[derive(Debug)]
pub struct SessionLocker {
    lock: Option<SessionLock>,
}

impl Drop for SessionLocker {
    fn drop(&mut self) {
        // If the session wasn't locked, we notify clients about the failure.
        if let Some(lock) = self.lock.take() {
            lock.finish();
        }
    }
}

impl SessionLocker {
    fn new(lock: SessionLock) -> Self {
        Self { lock: Some(lock) }
    }

    /// The lock this confirmation is for
    pub fn session_lock(&self) -> Option<&SessionLock> {
        self.lock.as_ref()
    }

    /// Notify the client that the session lock was successful.
    pub fn lock(mut self) {
        if let Some(lock) = self.lock.take() {
            lock.confirm();
        }
    }
}

/// Request a session lock for a client (`ext_session_lock_manager_v1.lock`)
///
/// The compositor is asked to lock through [`SessionLockHandler::lock`]. If another live
/// client holds a lock, the request is refused right away with a `finished` event and
/// `None` is returned.
pub fn lock<D: ShellHandler>(state: &mut D, client: &Client) -> Option<SessionLock> {
    if !client.alive() {
        return None;
    }

    if state.session_lock_state().current_lock().is_some() {
        debug!(client = %client.id(), "Session already locked, refusing");
        client.send_event(Event::LockFinished);
        return None;
    }

    let lock = SessionLock::new(client);
    state.session_lock_state().current = Some(lock.clone());
    debug!(client = %client.id(), "Session lock requested");
    state.lock(SessionLocker::new(lock.clone()));
    Some(lock)
}
