use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, trace, trace_span};

use crate::utils::{AliveTracker, DeadResource, IsAlive, Logical, Point, Rectangle, Serial, Size};
use crate::wayland::{
    compositor::{DoubleBuffered, RoleKind, RoleSurface, Surface, WeakSurface},
    error::ProtocolError,
    event::Event,
    seat::SeatId,
    shell::{
        wlr_layer::{LayerSurface, WeakLayerSurface},
        ConfigureQueue, PopupChain, ShellHandler, UnknownSerial,
    },
    Client,
};

use super::{PopupConfigure, PopupState, PositionerState, SurfaceCachedState, ToplevelSurface, WeakToplevelSurface};

/// Represents the possible errors that
/// can be returned from [`PopupSurface::send_configure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PopupConfigureError {
    /// The popup is not allowed to be re-configured,
    /// the positioner is not reactive
    #[error("The popup positioner is not reactive")]
    NotReactive,
    /// The popup was dismissed
    #[error("The popup was dismissed")]
    Dismissed,
}

/// The parent of a popup
#[derive(Debug, Clone, PartialEq)]
pub enum PopupParent {
    /// An xdg toplevel
    Toplevel(ToplevelSurface),
    /// Another xdg popup
    Popup(PopupSurface),
    /// A layer surface, assigned through `zwlr_layer_surface_v1.get_popup`
    LayerSurface(LayerSurface),
}

impl PopupParent {
    /// The surface of the parent
    pub fn wl_surface(&self) -> Option<Surface> {
        match self {
            PopupParent::Toplevel(toplevel) => toplevel.wl_surface(),
            PopupParent::Popup(popup) => popup.wl_surface(),
            PopupParent::LayerSurface(layer) => layer.wl_surface(),
        }
    }

    fn add_popup(&self, popup: &PopupSurface) {
        match self {
            PopupParent::Toplevel(toplevel) => toplevel.add_popup(popup),
            PopupParent::Popup(parent) => parent.add_popup(popup),
            PopupParent::LayerSurface(layer) => layer.add_popup(popup),
        }
    }

    fn downgrade(&self) -> WeakPopupParent {
        match self {
            PopupParent::Toplevel(toplevel) => WeakPopupParent::Toplevel(toplevel.downgrade()),
            PopupParent::Popup(popup) => WeakPopupParent::Popup(popup.downgrade()),
            PopupParent::LayerSurface(layer) => WeakPopupParent::LayerSurface(layer.downgrade()),
        }
    }
}

impl From<ToplevelSurface> for PopupParent {
    fn from(toplevel: ToplevelSurface) -> Self {
        PopupParent::Toplevel(toplevel)
    }
}

impl From<PopupSurface> for PopupParent {
    fn from(popup: PopupSurface) -> Self {
        PopupParent::Popup(popup)
    }
}

impl From<LayerSurface> for PopupParent {
    fn from(layer: LayerSurface) -> Self {
        PopupParent::LayerSurface(layer)
    }
}

impl IsAlive for PopupParent {
    fn alive(&self) -> bool {
        match self {
            PopupParent::Toplevel(toplevel) => toplevel.alive(),
            PopupParent::Popup(popup) => popup.alive(),
            PopupParent::LayerSurface(layer) => layer.alive(),
        }
    }
}

#[derive(Debug, Clone)]
enum WeakPopupParent {
    Toplevel(WeakToplevelSurface),
    Popup(WeakPopupSurface),
    LayerSurface(WeakLayerSurface),
}

impl WeakPopupParent {
    fn upgrade(&self) -> Result<PopupParent, DeadResource> {
        Ok(match self {
            WeakPopupParent::Toplevel(toplevel) => PopupParent::Toplevel(toplevel.upgrade()?),
            WeakPopupParent::Popup(popup) => PopupParent::Popup(popup.upgrade()?),
            WeakPopupParent::LayerSurface(layer) => PopupParent::LayerSurface(layer.upgrade()?),
        })
    }
}

// What a configure offered, the token tells the client which reposition it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PopupOffer {
    state: PopupState,
    token: Option<u32>,
}

#[derive(Debug)]
struct PopupData {
    surface: WeakSurface,
    client: Client,
    alive: AliveTracker,
    attributes: Mutex<PopupAttributes>,
}

#[derive(Debug)]
struct PopupAttributes {
    parent: Option<WeakPopupParent>,
    /// Placement blueprint as given by the client
    positioner: PositionerState,
    /// How far the parent moved since the positioner was given
    anchor_offset: Point<i32, Logical>,
    constraint_target: Option<Rectangle<i32, Logical>>,
    server_pending: Option<PopupState>,
    configures: ConfigureQueue<PopupOffer>,
    current: DoubleBuffered<PopupState>,
    cached: DoubleBuffered<SurfaceCachedState>,
    popups: PopupChain,
    committed: bool,
    grab: Option<(SeatId, Serial)>,
    /// Reposition requested before the initial configure, answered by it
    reposition_token: Option<u32>,
    dismissed: bool,
}

impl PopupAttributes {
    fn effective_positioner(&self) -> PositionerState {
        self.positioner.with_anchor_offset(self.anchor_offset)
    }

    fn compute_geometry(&self) -> Rectangle<i32, Logical> {
        let positioner = self.effective_positioner();
        match self.constraint_target {
            Some(target) => positioner.get_unconstrained_geometry(target),
            None => positioner.get_geometry(),
        }
    }

    fn last_server_state(&self) -> PopupState {
        self.configures
            .last_sent_state()
            .map(|offer| offer.state)
            .unwrap_or_else(|| *self.current.committed())
    }

    // Configures are only sent after the initial commit and before dismissal.
    fn can_reconfigure(&self) -> bool {
        self.configures.initial_configure_sent() && !self.dismissed
    }
}

/// A handle to a popup surface
#[derive(Debug, Clone)]
pub struct PopupSurface {
    inner: Arc<PopupData>,
}

impl PartialEq for PopupSurface {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for PopupSurface {}

impl IsAlive for PopupSurface {
    #[inline]
    fn alive(&self) -> bool {
        self.inner.alive.alive()
    }
}

impl PopupSurface {
    pub(crate) fn new(surface: &Surface, parent: Option<&PopupParent>, positioner: PositionerState) -> PopupSurface {
        let popup = PopupSurface {
            inner: Arc::new(PopupData {
                surface: surface.downgrade(),
                client: surface.client().clone(),
                alive: AliveTracker::default(),
                attributes: Mutex::new(PopupAttributes {
                    parent: parent.map(PopupParent::downgrade),
                    positioner,
                    anchor_offset: Point::default(),
                    constraint_target: None,
                    server_pending: None,
                    configures: ConfigureQueue::default(),
                    current: DoubleBuffered::new(PopupState {
                        geometry: positioner.get_geometry(),
                    }),
                    cached: DoubleBuffered::default(),
                    popups: PopupChain::default(),
                    committed: false,
                    grab: None,
                    reposition_token: None,
                    dismissed: false,
                }),
            }),
        };
        if let Some(parent) = parent {
            parent.add_popup(&popup);
        }
        popup
    }

    /// Retrieve the client owning this popup
    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// Create a weak reference to this popup
    pub fn downgrade(&self) -> WeakPopupSurface {
        WeakPopupSurface {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The parent of this popup, if it is still alive
    pub fn parent(&self) -> Option<PopupParent> {
        self.inner
            .attributes
            .lock()
            .unwrap()
            .parent
            .as_ref()
            .and_then(|parent| parent.upgrade().ok())
    }

    /// Gets a reference of the parent surface of this popup.
    pub fn get_parent_surface(&self) -> Option<Surface> {
        self.parent().and_then(|parent| parent.wl_surface())
    }

    pub(crate) fn set_parent(&self, parent: &PopupParent) -> Result<(), ProtocolError> {
        {
            let mut attributes = self.inner.attributes.lock().unwrap();
            if attributes.parent.is_some() || attributes.committed {
                return Err(ProtocolError::InvalidPopupParent);
            }
            attributes.parent = Some(parent.downgrade());
        }
        parent.add_popup(self);
        Ok(())
    }

    /// The placement blueprint, with the anchor rectangle following the parent
    pub fn positioner(&self) -> PositionerState {
        self.inner.attributes.lock().unwrap().effective_positioner()
    }

    /// The anchor rectangle, relative to the parent's window geometry
    pub fn anchor_rect(&self) -> Rectangle<i32, Logical> {
        self.positioner().anchor_rect
    }

    /// The area the popup is fitted into, relative to the parent's window geometry
    pub fn constraint_target(&self) -> Option<Rectangle<i32, Logical>> {
        self.inner.attributes.lock().unwrap().constraint_target
    }

    /// Set the area the popup must be fitted into
    ///
    /// The rectangle is relative to the parent's window geometry, usually the usable
    /// area of the output translated into that space. Without a constraint target the
    /// raw placement is used.
    ///
    /// A reactive popup that was already configured is reconstrained and configured
    /// again right away.
    ///
    /// Nothing calls this on its own: when the usable area of an output changes, for
    /// example after [`LayerMap::arrange`](crate::desktop::LayerMap::arrange), the
    /// compositor has to hand the new target to the popups it wants reconstrained,
    /// including popups of layer surfaces.
    pub fn set_constraint_target(&self, target: Rectangle<i32, Logical>) {
        {
            let mut attributes = self.inner.attributes.lock().unwrap();
            attributes.constraint_target = Some(target);
            if !attributes.positioner.reactive || !attributes.can_reconfigure() {
                return;
            }
            attributes.server_pending = Some(PopupState {
                geometry: attributes.compute_geometry(),
            });
        }
        self.send_configure_internal(None, false);
    }

    /// Compute the placement of this popup with its current blueprint and constraint target
    pub fn unconstrained_geometry(&self) -> Rectangle<i32, Logical> {
        self.inner.attributes.lock().unwrap().compute_geometry()
    }

    /// Allows the pending state of this popup to be manipulated.
    ///
    /// This should be used to inform the client about size and position changes,
    /// for example after a move of the parent toplevel.
    ///
    /// The state will be sent to the client when calling [`send_configure`](#method.send_configure).
    pub fn with_pending_state<F, T>(&self, f: F) -> Result<T, DeadResource>
    where
        F: FnOnce(&mut PopupState) -> T,
    {
        if !self.alive() {
            return Err(DeadResource);
        }
        let mut attributes = self.inner.attributes.lock().unwrap();
        let mut pending = match attributes.server_pending {
            Some(pending) => pending,
            None => attributes.last_server_state(),
        };
        let result = f(&mut pending);
        attributes.server_pending = Some(pending);
        Ok(result)
    }

    /// Send a configure event to this popup surface to suggest it a new configuration
    ///
    /// The serial of this configure will be tracked waiting for the client to ACK it.
    ///
    /// Returns [`Err(PopupConfigureError)`] if the initial configure has already been sent and
    /// the current [`PositionerState`] is not reactive, or if the popup was dismissed.
    pub fn send_configure(&self) -> Result<Option<Serial>, PopupConfigureError> {
        {
            let attributes = self.inner.attributes.lock().unwrap();
            if attributes.dismissed {
                return Err(PopupConfigureError::Dismissed);
            }
            if attributes.configures.initial_configure_sent() && !attributes.positioner.reactive {
                return Err(PopupConfigureError::NotReactive);
            }
        }
        Ok(self.send_configure_internal(None, false))
    }

    /// Send a configure event, including the `repositioned` event to the client
    /// in response to a `reposition` request.
    pub fn send_repositioned(&self, token: u32) -> Option<Serial> {
        let surface = self.wl_surface().filter(|_| self.alive())?;
        self.inner.client.send_event(Event::PopupRepositioned {
            surface: surface.id(),
            token,
        });
        self.send_configure_internal(Some(token), true)
    }

    fn send_configure_internal(&self, token: Option<u32>, force: bool) -> Option<Serial> {
        if !self.alive() {
            return None;
        }
        let surface = self.wl_surface()?;

        let (serial, offer) = {
            let mut attributes = self.inner.attributes.lock().unwrap();
            if attributes.dismissed {
                return None;
            }
            let state = match attributes.server_pending.take() {
                Some(state) => state,
                None => attributes.last_server_state(),
            };
            let offer = PopupOffer { state, token };
            // Configures not answering a reposition carry no token, only the placement counts.
            let unchanged = attributes.configures.initial_configure_sent()
                && attributes.configures.last_sent_state().map(|last| last.state) == Some(state);
            if !force && unchanged {
                return None;
            }
            let serial = self.inner.client.next_serial();
            attributes.configures.push(serial, offer);
            (serial, offer)
        };

        trace!(surface = %surface.id(), %serial, ?offer, "Sending popup configure");
        self.inner.client.send_event(Event::PopupConfigure {
            surface: surface.id(),
            serial,
            geometry: offer.state.geometry,
            token: offer.token,
        });
        Some(serial)
    }

    pub(crate) fn ack_configure(&self, serial: Serial) -> Result<PopupConfigure, UnknownSerial> {
        let mut attributes = self.inner.attributes.lock().unwrap();
        let record = attributes.configures.ack(serial)?;
        attributes.current.set_pending(record.state.state);
        Ok(PopupConfigure {
            state: record.state.state,
            serial: record.serial,
            reposition_token: record.state.token,
        })
    }

    // The parent's effective offset moved, the anchor rectangle follows it.
    pub(crate) fn shift_anchor(&self, delta: Point<i32, Logical>) {
        {
            let mut attributes = self.inner.attributes.lock().unwrap();
            attributes.anchor_offset = attributes.anchor_offset.saturating_add(delta);
            trace!(?delta, offset = ?attributes.anchor_offset, "Popup anchor shifted");
            if !attributes.positioner.reactive || !attributes.can_reconfigure() {
                return;
            }
            attributes.server_pending = Some(PopupState {
                geometry: attributes.compute_geometry(),
            });
        }
        // unsolicited, there is no reposition request to answer
        self.send_configure_internal(None, false);
    }

    pub(crate) fn reposition(&self, positioner: PositionerState, token: u32) {
        {
            let mut attributes = self.inner.attributes.lock().unwrap();
            attributes.positioner = positioner;
            attributes.anchor_offset = Point::default();
            attributes.server_pending = Some(PopupState {
                geometry: attributes.compute_geometry(),
            });
            // before the initial configure, the new placement is carried by it
            if !attributes.can_reconfigure() {
                attributes.reposition_token = Some(token);
                return;
            }
        }
        self.send_repositioned(token);
    }

    /// Send a `popup_done` event to the popup surface, dismissing it and its children
    ///
    /// It means that the use has dismissed the popup surface, or that
    /// the pointer has left the area of popup grab if there was a grab.
    pub fn send_popup_done(&self) {
        let children = {
            let mut attributes = self.inner.attributes.lock().unwrap();
            if attributes.dismissed {
                return;
            }
            attributes.dismissed = true;
            attributes.popups.live_popups()
        };
        for child in children {
            child.send_popup_done();
        }
        if let Some(surface) = self.wl_surface().filter(|_| self.alive()) {
            debug!(surface = %surface.id(), "Popup dismissed");
            self.inner
                .client
                .send_event(Event::PopupDone { surface: surface.id() });
        }
    }

    /// Whether the popup was dismissed
    pub fn is_dismissed(&self) -> bool {
        self.inner.attributes.lock().unwrap().dismissed
    }

    /// The seat and serial of the grab requested by the client, if any
    pub fn grab(&self) -> Option<(SeatId, Serial)> {
        self.inner.attributes.lock().unwrap().grab
    }

    pub(crate) fn set_grab(&self, seat: SeatId, serial: Serial) -> Result<(), ProtocolError> {
        let mut attributes = self.inner.attributes.lock().unwrap();
        if attributes.committed {
            return Err(ProtocolError::InvalidGrab);
        }
        attributes.grab = Some((seat, serial));
        Ok(())
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
    pub fn current_state(&self) -> PopupState {
        *self.inner.attributes.lock().unwrap().current.committed()
    }

    /// The committed window geometry
    pub fn window_geometry(&self) -> Option<Rectangle<i32, Logical>> {
        self.inner.attributes.lock().unwrap().cached.committed().geometry
    }

    /// The live child popups of this popup
    pub fn popups(&self) -> Vec<PopupSurface> {
        self.inner.attributes.lock().unwrap().popups.live_popups()
    }

    pub(crate) fn add_popup(&self, popup: &PopupSurface) {
        self.inner.attributes.lock().unwrap().popups.push(popup);
    }

    pub(crate) fn set_window_geometry(&self, geometry: Rectangle<i32, Logical>) {
        self.inner.attributes.lock().unwrap().cached.pending_mut().geometry = Some(geometry);
    }

    pub(crate) fn destroy(&self) {
        self.inner.alive.destroy_notify();
    }
}

impl RoleSurface for PopupSurface {
    fn kind(&self) -> RoleKind {
        RoleKind::Popup
    }

    fn wl_surface(&self) -> Option<Surface> {
        self.inner.surface.upgrade().ok()
    }

    fn handle_commit<D: ShellHandler>(&self, _state: &mut D) -> Result<(), ProtocolError> {
        let _span = trace_span!("xdg_popup commit", surface = %self.inner.surface.id()).entered();

        let (initial, shift) = {
            let mut attributes = self.inner.attributes.lock().unwrap();
            if attributes.parent.is_none() {
                return Err(ProtocolError::InvalidPopupParent);
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

            let initial = !attributes.configures.initial_configure_sent();
            if initial {
                attributes.server_pending = Some(PopupState {
                    geometry: attributes.compute_geometry(),
                });
            }
            attributes.committed = true;
            (initial, shift)
        };

        if let Some(shift) = shift {
            shift.apply();
        }
        if initial {
            let token = self.inner.attributes.lock().unwrap().reposition_token.take();
            self.send_configure_internal(token, true);
        }
        Ok(())
    }

    fn handle_resize(&self, size: Size<i32, Logical>) {
        if self.with_pending_state(|state| state.geometry.size = size).is_ok() {
            if let Err(err) = self.send_configure() {
                trace!(%err, "Popup resize not configured");
            }
        }
    }

    fn handle_close_request(&self) {
        self.send_popup_done();
    }
}

/// Weak reference to a [`PopupSurface`]
#[derive(Debug, Clone)]
pub struct WeakPopupSurface {
    inner: Weak<PopupData>,
}

impl WeakPopupSurface {
    /// Try to get the popup back
    pub fn upgrade(&self) -> Result<PopupSurface, DeadResource> {
        self.inner
            .upgrade()
            .filter(|inner| inner.alive.alive())
            .map(|inner| PopupSurface { inner })
            .ok_or(DeadResource)
    }
}

impl PartialEq for WeakPopupSurface {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}
