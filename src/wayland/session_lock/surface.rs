//! ext-session-lock surface.

use std::sync::{Arc, Mutex};

use tracing::{debug, trace, trace_span};

use crate::utils::{AliveTracker, DeadResource, IsAlive, Logical, Serial, Size};
use crate::wayland::{
    compositor::{detach_role, DoubleBuffered, RoleKind, RoleSurface, Surface, WeakSurface},
    error::{Interface, ProtocolError},
    event::Event,
    output::{Output, WeakOutput},
    shell::{ConfigureQueue, ShellHandler, UnknownSerial},
    Client,
};

use super::{SessionLock, SessionLockHandler};

/// Requests of the `ext_session_lock_surface_v1` interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockSurfaceRequest {
    /// `ack_configure`
    AckConfigure(Serial),
    /// `destroy`
    Destroy,
}

/// State of an ext-session-lock surface.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct LockSurfaceState {
    /// The suggested size of the surface.
    pub size: Option<Size<i32, Logical>>,
}

/// A configure message for ext-session-lock surfaces.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LockSurfaceConfigure {
    /// The state associated with this configure.
    pub state: LockSurfaceState,

    /// A serial number to track acknowledgment from the client.
    pub serial: Serial,
}

#[derive(Debug)]
struct LockSurfaceData {
    surface: WeakSurface,
    client: Client,
    lock: SessionLock,
    output: WeakOutput,
    alive: AliveTracker,
    attributes: Mutex<LockSurfaceAttributes>,
}

#[derive(Debug, Default)]
struct LockSurfaceAttributes {
    /// Holds the pending state as set by the server.
    server_pending: Option<LockSurfaceState>,
    configures: ConfigureQueue<LockSurfaceState>,
    current: DoubleBuffered<LockSurfaceState>,
    closed: bool,
}

/// Handle for a ext-session-lock surface.
#[derive(Clone, Debug)]
pub struct LockSurface {
    inner: Arc<LockSurfaceData>,
}

impl PartialEq for LockSurface {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for LockSurface {}

impl IsAlive for LockSurface {
    #[inline]
    fn alive(&self) -> bool {
        self.inner.alive.alive()
    }
}

impl LockSurface {
    pub(crate) fn new(surface: &Surface, lock: &SessionLock, output: &Output) -> Self {
        LockSurface {
            inner: Arc::new(LockSurfaceData {
                surface: surface.downgrade(),
                client: surface.client().clone(),
                lock: lock.clone(),
                output: output.downgrade(),
                alive: AliveTracker::default(),
                attributes: Mutex::new(LockSurfaceAttributes::default()),
            }),
        }
    }

    /// Retrieve the client owning this surface
    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// The lock this surface was created for
    pub fn session_lock(&self) -> &SessionLock {
        &self.inner.lock
    }

    /// The output covered by this surface, if it still exists
    pub fn output(&self) -> Option<Output> {
        self.inner.output.upgrade().ok()
    }

    /// Manipulate this surface's pending state.
    pub fn with_pending_state<F, T>(&self, f: F) -> Result<T, DeadResource>
    where
        F: FnOnce(&mut LockSurfaceState) -> T,
    {
        if !self.alive() {
            return Err(DeadResource);
        }
        let mut attributes = self.inner.attributes.lock().unwrap();

        // Ensure pending state is initialized.
        let last = attributes
            .configures
            .last_sent_state()
            .copied()
            .unwrap_or_else(|| *attributes.current.committed());
        let server_pending = attributes.server_pending.get_or_insert(last);
        Ok(f(server_pending))
    }

    /// Send a configure to the surface.
    ///
    /// You can manipulate the client's state using [`LockSurface::with_pending_state`].
    /// Nothing is sent if the state did not change since the last configure, or once
    /// the output is gone. Returns the serial of the configure, if one was sent.
    pub fn send_configure(&self) -> Option<Serial> {
        if !self.alive() {
            return None;
        }
        let surface = self.wl_surface()?;

        let (serial, state) = {
            let mut attributes = self.inner.attributes.lock().unwrap();
            if attributes.closed {
                return None;
            }
            let pending = attributes.server_pending.take()?;
            if !attributes.configures.needs_configure(&pending) {
                return None;
            }
            let serial = self.inner.client.next_serial();
            attributes.configures.push(serial, pending);
            (serial, pending)
        };

        trace!(surface = %surface.id(), %serial, ?state, "Sending lock surface configure");
        self.inner.client.send_event(Event::LockConfigure {
            surface: surface.id(),
            serial,
            size: state.size.unwrap_or_default(),
        });
        Some(serial)
    }

    /// The state the client last acknowledged and committed
    pub fn current_state(&self) -> LockSurfaceState {
        *self.inner.attributes.lock().unwrap().current.committed()
    }

    /// Whether the client acknowledged at least one configure
    pub fn is_configured(&self) -> bool {
        self.inner.attributes.lock().unwrap().configures.is_configured()
    }

    /// Serials of the configures still awaiting acknowledgement
    pub fn pending_configures(&self) -> Vec<Serial> {
        self.inner
            .attributes
            .lock()
            .unwrap()
            .configures
            .in_flight_serials()
            .collect()
    }

    /// Whether the surface will never be shown again
    pub fn is_closed(&self) -> bool {
        self.inner.attributes.lock().unwrap().closed
    }

    pub(crate) fn ack_configure(&self, serial: Serial) -> Result<LockSurfaceConfigure, UnknownSerial> {
        let mut attributes = self.inner.attributes.lock().unwrap();
        let record = attributes.configures.ack(serial)?;
        attributes.current.set_pending(record.state);
        Ok(LockSurfaceConfigure {
            state: record.state,
            serial: record.serial,
        })
    }

    // The output is gone, tell the client the surface is useless now.
    pub(crate) fn output_destroyed(&self) {
        let Some(surface) = self.wl_surface() else {
            return;
        };
        {
            let mut attributes = self.inner.attributes.lock().unwrap();
            if attributes.closed {
                return;
            }
            attributes.closed = true;
        }
        debug!(surface = %surface.id(), "Output of lock surface destroyed");
        self.inner
            .client
            .send_event(Event::LockSurfaceClosed { surface: surface.id() });
    }

    pub(crate) fn surface_destroyed(&self) {
        self.inner.attributes.lock().unwrap().closed = true;
        if let Some(output) = self.output() {
            output.release_lock_surface(self);
        }
    }

    pub(crate) fn destroy(&self) {
        self.inner.alive.destroy_notify();
        if let Some(output) = self.output() {
            output.release_lock_surface(self);
        }
    }
}

impl RoleSurface for LockSurface {
    fn kind(&self) -> RoleKind {
        RoleKind::LockSurface
    }

    fn wl_surface(&self) -> Option<Surface> {
        self.inner.surface.upgrade().ok()
    }

    fn handle_commit<D: ShellHandler>(&self, _state: &mut D) -> Result<(), ProtocolError> {
        let _span = trace_span!("session-lock-surface pre-commit", surface = %self.inner.surface.id()).entered();

        let mut attributes = self.inner.attributes.lock().unwrap();
        if !attributes.configures.is_configured() {
            return Err(ProtocolError::NotConstructed {
                interface: Interface::LockSurface,
            });
        }
        attributes.current.commit();
        Ok(())
    }

    fn handle_resize(&self, size: Size<i32, Logical>) {
        if self.with_pending_state(|state| state.size = Some(size)).is_ok() {
            self.send_configure();
        }
    }

    // Lock surfaces go away with the lock, not on the compositor's request.
    fn handle_close_request(&self) {}
}

/// Process a request of a lock surface
pub fn handle_lock_surface_request<D: ShellHandler>(state: &mut D, surface: &LockSurface, request: LockSurfaceRequest) {
    let client = surface.client().clone();
    if !client.alive() || !surface.alive() {
        return;
    }
    trace!(?request, "ext_session_lock_surface_v1 request");

    match request {
        LockSurfaceRequest::AckConfigure(serial) => match surface.ack_configure(serial) {
            Ok(configure) => {
                if let Some(wl_surface) = surface.wl_surface() {
                    SessionLockHandler::ack_configure(state, wl_surface, configure);
                }
            }
            Err(UnknownSerial(serial)) => client.post_error(ProtocolError::UnknownSerial {
                interface: Interface::LockSurface,
                serial,
            }),
        },
        LockSurfaceRequest::Destroy => {
            surface.destroy();
            if let Some(wl_surface) = surface.wl_surface() {
                detach_role(&wl_surface);
            }
            state.session_lock_state().cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Rectangle;
    use crate::wayland::{
        compositor::{handle_surface_request, lookup, SurfaceRequest},
        test_utils::TestState,
    };

    fn lock_surface(state: &mut TestState) -> (Surface, LockSurface) {
        let surface = state.create_surface();
        let lock_surface = state
            .make_role(RoleKind::LockSurface, &surface)
            .lock_surface()
            .cloned()
            .unwrap();
        (surface, lock_surface)
    }

    #[test]
    fn commit_before_the_first_ack_is_fatal() {
        let mut state = TestState::new();
        let (surface, _) = lock_surface(&mut state);

        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        let err = surface.client().protocol_error().unwrap();
        assert_eq!(
            err,
            ProtocolError::NotConstructed {
                interface: Interface::LockSurface
            }
        );
        assert_eq!(err.code(), 0);
    }

    #[test]
    fn acked_size_applies_on_commit() {
        let mut state = TestState::new();
        let (surface, lock_surface) = lock_surface(&mut state);
        let serial = lock_surface.pending_configures()[0];

        handle_lock_surface_request(&mut state, &lock_surface, LockSurfaceRequest::AckConfigure(serial));
        assert_eq!(lock_surface.current_state().size, None);
        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        assert_eq!(lock_surface.current_state().size, Some((1920, 1080).into()));
        assert!(surface.client().protocol_error().is_none());
    }

    #[test]
    fn unknown_serial_is_fatal() {
        let mut state = TestState::new();
        let (surface, lock_surface) = lock_surface(&mut state);

        handle_lock_surface_request(
            &mut state,
            &lock_surface,
            LockSurfaceRequest::AckConfigure(Serial::from(4242)),
        );
        assert!(matches!(
            surface.client().protocol_error(),
            Some(ProtocolError::UnknownSerial {
                interface: Interface::LockSurface,
                ..
            })
        ));
    }

    #[test]
    fn output_resize_reconfigures() {
        let mut state = TestState::new();
        let (surface, lock_surface) = lock_surface(&mut state);
        let output = lock_surface.output().unwrap();
        surface.client().drain_events();

        output.set_geometry(Rectangle::from_loc_and_size((0, 0), (2560, 1440)));
        assert!(matches!(
            surface.client().drain_events().as_slice(),
            [Event::LockConfigure { size, .. }] if *size == (2560, 1440).into()
        ));
    }

    #[test]
    fn destroyed_output_closes_the_surface() {
        let mut state = TestState::new();
        let (surface, lock_surface) = lock_surface(&mut state);
        let output = lock_surface.output().unwrap();
        surface.client().drain_events();

        output.destroy();
        assert!(lock_surface.is_closed());
        assert_eq!(
            surface.client().drain_events(),
            vec![Event::LockSurfaceClosed { surface: surface.id() }]
        );
        assert!(lock_surface.with_pending_state(|state| state.size = Some((10, 10).into())).is_ok());
        assert_eq!(lock_surface.send_configure(), None);
    }

    #[test]
    fn destroy_frees_the_output() {
        let mut state = TestState::new();
        let (surface, lock_surface) = lock_surface(&mut state);
        let output = lock_surface.output().unwrap();

        handle_lock_surface_request(&mut state, &lock_surface, LockSurfaceRequest::Destroy);
        assert!(lookup(&surface).is_none());
        assert_eq!(output.lock_surface(), None);
        assert!(state.session_lock_state.lock_surfaces().is_empty());
    }
}
