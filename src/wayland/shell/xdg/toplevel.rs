use std::sync::{Arc, Mutex, Weak};

use tracing::{trace, trace_span};

use crate::utils::{AliveTracker, DeadResource, IsAlive, Logical, Rectangle, Serial, Size};
use crate::wayland::{
    compositor::{DoubleBuffered, RoleKind, RoleSurface, Surface, WeakSurface},
    error::{Interface, ProtocolError},
    event::Event,
    shell::{ConfigureQueue, PopupChain, ShellHandler, UnknownSerial, WindowState},
    Client,
};

use super::{
    PopupSurface, State, SurfaceCachedState, ToplevelConfigure, ToplevelState, WmCapabilities,
};

#[derive(Debug)]
struct ToplevelData {
    surface: WeakSurface,
    client: Client,
    capabilities: WmCapabilities,
    alive: AliveTracker,
    attributes: Mutex<ToplevelAttributes>,
}

#[derive(Debug)]
struct ToplevelAttributes {
    /// State the compositor wants to offer with the next configure
    server_pending: Option<ToplevelState>,
    configures: ConfigureQueue<ToplevelState>,
    /// Acknowledged state, made current by the next commit
    current: DoubleBuffered<ToplevelState>,
    cached: DoubleBuffered<SurfaceCachedState>,
    capabilities_sent: bool,
    title: Option<String>,
    app_id: Option<String>,
    parent: Option<WeakToplevelSurface>,
    popups: PopupChain,
}

impl ToplevelAttributes {
    // The newest state the client knows about, falling back to the current one.
    fn last_server_state(&self) -> ToplevelState {
        self.configures
            .last_sent_state()
            .cloned()
            .unwrap_or_else(|| self.current.committed().clone())
    }

    fn server_pending_mut(&mut self) -> &mut ToplevelState {
        if self.server_pending.is_none() {
            self.server_pending = Some(self.last_server_state());
        }
        self.server_pending.get_or_insert_with(ToplevelState::default)
    }
}

/// A handle to a toplevel surface
#[derive(Debug, Clone)]
pub struct ToplevelSurface {
    inner: Arc<ToplevelData>,
}

impl PartialEq for ToplevelSurface {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ToplevelSurface {}

impl IsAlive for ToplevelSurface {
    #[inline]
    fn alive(&self) -> bool {
        self.inner.alive.alive()
    }
}

impl ToplevelSurface {
    pub(crate) fn new(surface: &Surface, capabilities: WmCapabilities) -> ToplevelSurface {
        ToplevelSurface {
            inner: Arc::new(ToplevelData {
                surface: surface.downgrade(),
                client: surface.client().clone(),
                capabilities,
                alive: AliveTracker::default(),
                attributes: Mutex::new(ToplevelAttributes {
                    server_pending: None,
                    configures: ConfigureQueue::default(),
                    current: DoubleBuffered::default(),
                    cached: DoubleBuffered::default(),
                    capabilities_sent: false,
                    title: None,
                    app_id: None,
                    parent: None,
                    popups: PopupChain::default(),
                }),
            }),
        }
    }

    /// Retrieve the client owning this toplevel
    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// Create a weak reference to this toplevel
    pub fn downgrade(&self) -> WeakToplevelSurface {
        WeakToplevelSurface {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Allows the pending state of this toplevel to
    /// be manipulated.
    ///
    /// This should be used to inform the client about size and state changes,
    /// for example after a resize request from the client.
    ///
    /// The state will be sent to the client when calling [`send_configure`](#method.send_configure).
    pub fn with_pending_state<F, T>(&self, f: F) -> Result<T, DeadResource>
    where
        F: FnOnce(&mut ToplevelState) -> T,
    {
        if !self.alive() {
            return Err(DeadResource);
        }
        let mut attributes = self.inner.attributes.lock().unwrap();
        Ok(f(attributes.server_pending_mut()))
    }

    /// Send a configure event to this toplevel surface to suggest it a new configuration
    ///
    /// The serial of this configure will be tracked waiting for the client to ACK it.
    /// Nothing is sent if the pending state equals the state the client was last told
    /// about. Returns the serial of the configure, if one was sent.
    pub fn send_configure(&self) -> Option<Serial> {
        self.send_configure_internal(false)
    }

    // Window state transitions are always announced, even without a visible change.
    // Before the initial configure they are carried by it instead.
    pub(crate) fn send_configure_forced(&self) -> Option<Serial> {
        if !self.is_initial_configure_sent() {
            return None;
        }
        self.send_configure_internal(true)
    }

    fn send_configure_internal(&self, force: bool) -> Option<Serial> {
        if !self.alive() {
            return None;
        }
        let surface = self.wl_surface()?;

        let (serial, state, announce) = {
            let mut attributes = self.inner.attributes.lock().unwrap();
            let pending = match attributes.server_pending.take() {
                Some(pending) => pending,
                None => attributes.last_server_state(),
            };
            if !force && !attributes.configures.needs_configure(&pending) {
                return None;
            }

            let serial = self.inner.client.next_serial();
            attributes.configures.push(serial, pending.clone());
            let announce = !attributes.capabilities_sent;
            attributes.capabilities_sent = true;
            (serial, pending, announce)
        };

        if announce {
            self.inner.client.send_event(Event::WmCapabilities {
                surface: surface.id(),
                capabilities: self.inner.capabilities,
            });
        }
        trace!(surface = %surface.id(), %serial, ?state, "Sending toplevel configure");
        self.inner.client.send_event(Event::ToplevelConfigure {
            surface: surface.id(),
            serial,
            size: state.size.unwrap_or_default(),
            states: state.states,
        });
        Some(serial)
    }

    pub(crate) fn ack_configure(&self, serial: Serial) -> Result<ToplevelConfigure, UnknownSerial> {
        let mut attributes = self.inner.attributes.lock().unwrap();
        let record = attributes.configures.ack(serial)?;
        attributes.current.set_pending(record.state.clone());
        Ok(ToplevelConfigure {
            state: record.state,
            serial: record.serial,
        })
    }

    /// Whether the initial configure was sent
    pub fn is_initial_configure_sent(&self) -> bool {
        self.inner
            .attributes
            .lock()
            .unwrap()
            .configures
            .initial_configure_sent()
    }

    /// Whether the client acknowledged at least one configure
    pub fn is_configured(&self) -> bool {
        self.inner.attributes.lock().unwrap().configures.is_configured()
    }

    /// Serials of the configures the client did not acknowledge yet
    pub fn pending_configures(&self) -> Vec<Serial> {
        self.inner
            .attributes
            .lock()
            .unwrap()
            .configures
            .in_flight_serials()
            .collect()
    }

    /// The state the client acknowledged and committed
    pub fn current_state(&self) -> ToplevelState {
        self.inner.attributes.lock().unwrap().current.committed().clone()
    }

    /// The committed window geometry, min and max size
    pub fn cached_state(&self) -> SurfaceCachedState {
        *self.inner.attributes.lock().unwrap().cached.committed()
    }

    /// The committed window geometry
    pub fn window_geometry(&self) -> Option<Rectangle<i32, Logical>> {
        self.cached_state().geometry
    }

    /// Title set by the client
    pub fn title(&self) -> Option<String> {
        self.inner.attributes.lock().unwrap().title.clone()
    }

    /// Application id set by the client
    pub fn app_id(&self) -> Option<String> {
        self.inner.attributes.lock().unwrap().app_id.clone()
    }

    /// The parent of this toplevel, if it is a dialog or similar
    pub fn parent(&self) -> Option<ToplevelSurface> {
        self.inner
            .attributes
            .lock()
            .unwrap()
            .parent
            .as_ref()
            .and_then(|parent| parent.upgrade().ok())
    }

    /// The live popups of this toplevel
    pub fn popups(&self) -> Vec<PopupSurface> {
        self.inner.attributes.lock().unwrap().popups.live_popups()
    }

    /// Change the activated state and announce it
    pub fn set_activated(&self, activated: bool) -> Option<Serial> {
        let changed = self
            .with_pending_state(|state| {
                if activated {
                    state.states.set(State::Activated)
                } else {
                    state.states.unset(State::Activated)
                }
            })
            .ok()?;
        trace!(activated, changed, "Toplevel activation");
        self.send_configure()
    }

    /// Leave the minimized state, going back to the state the toplevel had before
    pub fn restore(&self) -> Option<Serial> {
        self.with_pending_state(|state| state.states.unset(State::Minimized))
            .ok()?;
        self.send_configure_forced()
    }

    /// Send a "close" event to the client
    pub fn send_close(&self) {
        if let Some(surface) = self.wl_surface().filter(|_| self.alive()) {
            self.inner
                .client
                .send_event(Event::ToplevelClose { surface: surface.id() });
        }
    }

    pub(crate) fn add_popup(&self, popup: &PopupSurface) {
        self.inner.attributes.lock().unwrap().popups.push(popup);
    }

    pub(crate) fn set_title(&self, title: String) {
        self.inner.attributes.lock().unwrap().title = Some(title);
    }

    pub(crate) fn set_app_id(&self, app_id: String) {
        self.inner.attributes.lock().unwrap().app_id = Some(app_id);
    }

    pub(crate) fn set_parent(&self, parent: Option<&ToplevelSurface>) -> Result<(), ProtocolError> {
        if let Some(parent) = parent {
            // walk up from the new parent, we must not meet ourselves
            let mut ancestor = Some(parent.clone());
            while let Some(current) = ancestor {
                if current == *self {
                    return Err(ProtocolError::InvalidParent);
                }
                ancestor = current.parent();
            }
        }
        self.inner.attributes.lock().unwrap().parent = parent.map(ToplevelSurface::downgrade);
        Ok(())
    }

    pub(crate) fn set_window_geometry(&self, geometry: Rectangle<i32, Logical>) {
        self.inner.attributes.lock().unwrap().cached.pending_mut().geometry = Some(geometry);
    }

    pub(crate) fn set_min_size(&self, size: Size<i32, Logical>) {
        self.inner.attributes.lock().unwrap().cached.pending_mut().min_size = size;
    }

    pub(crate) fn set_max_size(&self, size: Size<i32, Logical>) {
        self.inner.attributes.lock().unwrap().cached.pending_mut().max_size = size;
    }

    pub(crate) fn destroy(&self) {
        self.inner.alive.destroy_notify();
    }
}

impl RoleSurface for ToplevelSurface {
    fn kind(&self) -> RoleKind {
        RoleKind::Toplevel
    }

    fn wl_surface(&self) -> Option<Surface> {
        self.inner.surface.upgrade().ok()
    }

    fn handle_commit<D: ShellHandler>(&self, _state: &mut D) -> Result<(), ProtocolError> {
        let _span = trace_span!("xdg_toplevel commit", surface = %self.inner.surface.id()).entered();

        let (initial, shift) = {
            let mut attributes = self.inner.attributes.lock().unwrap();
            if attributes.cached.pending().min_exceeds_max() {
                return Err(ProtocolError::InvalidSize {
                    interface: Interface::XdgToplevel,
                    message: "minimum size is larger than maximum size".into(),
                });
            }

            attributes.current.commit();
            attributes.cached.commit();
            let origin = attributes
                .cached
                .committed()
                .geometry
                .map(|geometry| geometry.loc)
                .unwrap_or_default();
            let shift = attributes.popups.set_offset(origin);
            (!attributes.configures.initial_configure_sent(), shift)
        };

        if let Some(shift) = shift {
            shift.apply();
        }
        if initial {
            self.send_configure_internal(true);
        }
        Ok(())
    }

    fn handle_resize(&self, size: Size<i32, Logical>) {
        if self.with_pending_state(|state| state.size = Some(size)).is_ok() {
            self.send_configure();
        }
    }

    fn handle_close_request(&self) {
        self.send_close();
    }

    fn handle_state_change(&self, window_state: WindowState) {
        let applied = self.with_pending_state(|state| {
            let states = &mut state.states;
            match window_state {
                WindowState::Restored => {
                    states.unset(State::Maximized);
                    states.unset(State::Fullscreen);
                    states.unset(State::Minimized);
                    state.fullscreen_output = None;
                }
                WindowState::Maximized => {
                    states.set(State::Maximized);
                    states.unset(State::Fullscreen);
                    states.unset(State::Minimized);
                    state.fullscreen_output = None;
                }
                WindowState::Fullscreen => {
                    states.set(State::Fullscreen);
                    states.unset(State::Minimized);
                }
                // the other states are kept to restore them later
                WindowState::Minimized => {
                    states.set(State::Minimized);
                }
            }
        });
        if applied.is_ok() {
            self.send_configure_forced();
        }
    }
}

/// Weak reference to a [`ToplevelSurface`]
#[derive(Debug, Clone)]
pub struct WeakToplevelSurface {
    inner: Weak<ToplevelData>,
}

impl WeakToplevelSurface {
    /// Try to get the toplevel back
    pub fn upgrade(&self) -> Result<ToplevelSurface, DeadResource> {
        self.inner
            .upgrade()
            .filter(|inner| inner.alive.alive())
            .map(|inner| ToplevelSurface { inner })
            .ok_or(DeadResource)
    }
}

impl PartialEq for WeakToplevelSurface {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wayland::{
        compositor::{handle_surface_request, SurfaceRequest},
        shell::xdg::{handle_toplevel_request, ToplevelRequest},
        test_utils::TestState,
    };

    fn toplevel_configures(events: &[Event]) -> Vec<(Serial, Size<i32, Logical>, Vec<State>)> {
        events
            .iter()
            .filter_map(|event| match event {
                Event::ToplevelConfigure {
                    serial, size, states, ..
                } => Some((*serial, *size, states.iter().collect())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn initial_configure_follows_the_first_commit() {
        let mut state = TestState::new();
        let surface = state.create_surface();
        let toplevel = state.toplevel(&surface);
        assert!(surface.client().drain_events().is_empty());

        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        let events = surface.client().drain_events();
        assert!(matches!(events[0], Event::WmCapabilities { .. }));
        let configures = toplevel_configures(&events);
        assert_eq!(configures.len(), 1);
        assert_eq!(configures[0].1, Size::from((0, 0)));
        assert!(toplevel.is_initial_configure_sent());
        assert!(!toplevel.is_configured());

        // capabilities are announced only once
        toplevel.handle_resize((640, 480).into());
        let events = surface.client().drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(toplevel_configures(&events)[0].1, Size::from((640, 480)));
    }

    #[test]
    fn acked_state_becomes_current_on_commit() {
        let mut state = TestState::new();
        let toplevel = state.mapped_toplevel();
        let surface = toplevel.wl_surface().unwrap();

        toplevel.handle_resize((300, 200).into());
        let first = toplevel.pending_configures()[0];
        toplevel.handle_resize((400, 300).into());
        let second = toplevel.pending_configures()[1];
        assert!(first < second);

        handle_toplevel_request(&mut state, &toplevel, ToplevelRequest::AckConfigure(first));
        assert_eq!(toplevel.pending_configures(), vec![second]);
        // not current before the commit
        assert_ne!(toplevel.current_state().size, Some((300, 200).into()));

        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        assert_eq!(toplevel.current_state().size, Some((300, 200).into()));

        handle_toplevel_request(&mut state, &toplevel, ToplevelRequest::AckConfigure(first));
        assert_eq!(
            surface.client().protocol_error(),
            Some(ProtocolError::UnknownSerial {
                interface: Interface::XdgSurface,
                serial: first,
            })
        );
    }

    #[test]
    fn unchanged_state_is_not_configured_twice() {
        let mut state = TestState::new();
        let toplevel = state.mapped_toplevel();
        let client = toplevel.client().clone();
        client.drain_events();

        assert!(toplevel.set_activated(true).is_some());
        assert!(toplevel.set_activated(true).is_none());
        assert!(toplevel.send_configure().is_none());
        assert_eq!(client.drain_events().len(), 1);
    }

    #[test]
    fn state_changes_are_immediate_and_always_configured() {
        let mut state = TestState::new();
        let toplevel = state.mapped_toplevel();
        let client = toplevel.client().clone();
        client.drain_events();

        toplevel.handle_state_change(WindowState::Maximized);
        toplevel.handle_state_change(WindowState::Minimized);
        toplevel.handle_state_change(WindowState::Minimized);
        let configures = toplevel_configures(&client.drain_events());
        assert_eq!(configures.len(), 3);
        assert_eq!(configures[0].2, vec![State::Maximized]);
        assert!(configures[1].2.contains(&State::Maximized));
        assert!(configures[1].2.contains(&State::Minimized));

        toplevel.restore();
        let configures = toplevel_configures(&client.drain_events());
        assert_eq!(configures[0].2, vec![State::Maximized]);

        toplevel.handle_state_change(WindowState::Fullscreen);
        toplevel.handle_state_change(WindowState::Restored);
        let configures = toplevel_configures(&client.drain_events());
        assert!(configures[1].2.is_empty());
    }

    #[test]
    fn parent_loops_are_refused() {
        let mut state = TestState::new();
        let first = state.mapped_toplevel();
        let second = state.mapped_toplevel();

        assert!(second.set_parent(Some(&first)).is_ok());
        assert_eq!(second.parent(), Some(first.clone()));
        assert_eq!(first.set_parent(Some(&second)), Err(ProtocolError::InvalidParent));
        assert_eq!(first.set_parent(Some(&first)), Err(ProtocolError::InvalidParent));
        assert!(second.set_parent(None).is_ok());
        assert_eq!(second.parent(), None);
    }

    #[test]
    fn inconsistent_min_and_max_sizes_fail_the_commit() {
        let mut state = TestState::new();
        let toplevel = state.mapped_toplevel();
        let surface = toplevel.wl_surface().unwrap();

        handle_toplevel_request(
            &mut state,
            &toplevel,
            ToplevelRequest::SetMinSize { width: 500, height: 0 },
        );
        handle_toplevel_request(
            &mut state,
            &toplevel,
            ToplevelRequest::SetMaxSize { width: 400, height: 0 },
        );
        assert!(surface.client().alive());
        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        assert!(matches!(
            surface.client().protocol_error(),
            Some(ProtocolError::InvalidSize {
                interface: Interface::XdgToplevel,
                ..
            })
        ));
    }
}
