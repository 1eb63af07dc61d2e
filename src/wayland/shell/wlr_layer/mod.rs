//! Utilities for handling shell surfaces with the `wlr_layer_shell` protocol
//!
//! This interface should be suitable for the implementation of many desktop shell components,
//! and a broad number of other applications that interact with the desktop.
//!
//! ### How it works
//!
//! A layer surface is bound to an [`Output`]. On its first commit it is arranged on the
//! output together with every other layer surface there, which yields its geometry and
//! the size it is offered in the initial configure. Later commits changing its size,
//! anchors, margins or exclusive zone rearrange the output; every surface whose
//! placement changed gets a new configure. Changing the layer alone does not.
//!
//! Arrangement itself lives in [`LayerMap`](crate::desktop::LayerMap), the per-output
//! placement state. The compositor is informed of every new placement through
//! [`WlrLayerShellHandler::layer_placed`].
//!
//! Requests decoded by the transport are fed to [`get_layer_surface`] and
//! [`handle_layer_surface_request`].

use std::{
    hash::{Hash, Hasher},
    sync::{Arc, Mutex, Weak},
};

use tracing::{debug, trace, trace_span};

use crate::desktop::LayerPlacement;
use crate::utils::{AliveTracker, DeadResource, IsAlive, Logical, Rectangle, Serial, Size};
use crate::wayland::{
    compositor::{DoubleBuffered, RoleKind, RoleSurface, Surface, WeakSurface},
    error::ProtocolError,
    event::Event,
    output::{Output, WeakOutput},
    shell::{ConfigureQueue, PopupChain, ShellHandler, UnknownSerial},
    Client,
};

use super::xdg::PopupSurface;

mod geometry;
mod handlers;
mod types;

pub use self::geometry::{compute, exclusion, shrink_zone, validate_size, LayerGeometry};
pub use self::handlers::{get_layer_surface, handle_layer_surface_request, LayerSurfaceRequest};
pub use self::types::{Anchor, ExclusiveZone, KeyboardInteractivity, Layer, Margins};

/// State of a layer surface, as negotiated with configures
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LayerSurfaceState {
    /// The suggested size of the surface
    pub size: Option<Size<i32, Logical>>,
}

/// Represents the client pending state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LayerSurfaceCachedState {
    /// The size requested by the client, 0 lets the compositor choose
    pub size: Size<i32, Logical>,
    /// Anchor bitflags, describing how the layers surface should be positioned and sized
    pub anchor: Anchor,
    /// Descripton of exclusive zone
    pub exclusive_zone: ExclusiveZone,
    /// Edge the exclusive zone is carved from, disambiguating corner anchoring
    pub exclusive_edge: Option<Anchor>,
    /// Describes distance from the anchor point of the output
    pub margin: Margins,
    /// Describes how keyboard events are delivered to this surface
    pub keyboard_interactivity: KeyboardInteractivity,
    /// The layer that the surface is rendered on
    pub layer: Layer,
}

impl LayerSurfaceCachedState {
    // Everything but the layer and keyboard interactivity influences the placement.
    fn placement_eq(&self, other: &Self) -> bool {
        self.size == other.size
            && self.anchor == other.anchor
            && self.exclusive_zone == other.exclusive_zone
            && self.exclusive_edge == other.exclusive_edge
            && self.margin == other.margin
    }
}

/// A configure message for layer surfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSurfaceConfigure {
    /// The state associated with this configure
    pub state: LayerSurfaceState,

    /// A serial number to track ACK from the client
    ///
    /// This should be an ever increasing number, as the ACK-ing
    /// from a client for a serial will validate all pending lower
    /// serials.
    pub serial: Serial,
}

#[derive(Debug)]
struct LayerSurfaceData {
    surface: WeakSurface,
    client: Client,
    namespace: String,
    output: Option<WeakOutput>,
    alive: AliveTracker,
    attributes: Mutex<LayerSurfaceAttributes>,
}

#[derive(Debug)]
struct LayerSurfaceAttributes {
    server_pending: Option<LayerSurfaceState>,
    configures: ConfigureQueue<LayerSurfaceState>,
    current: DoubleBuffered<LayerSurfaceState>,
    cached: DoubleBuffered<LayerSurfaceCachedState>,
    /// Set by the first commit, until then the surface is not arranged
    committed: bool,
    placement: Option<LayerGeometry>,
    popups: PopupChain,
    closed: bool,
}

impl LayerSurfaceAttributes {
    fn last_server_state(&self) -> LayerSurfaceState {
        self.configures
            .last_sent_state()
            .cloned()
            .unwrap_or_else(|| self.current.committed().clone())
    }
}

/// A handle to a layer surface
#[derive(Debug, Clone)]
pub struct LayerSurface {
    inner: Arc<LayerSurfaceData>,
}

impl PartialEq for LayerSurface {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for LayerSurface {}

impl Hash for LayerSurface {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.inner) as usize).hash(state);
    }
}

impl IsAlive for LayerSurface {
    #[inline]
    fn alive(&self) -> bool {
        self.inner.alive.alive()
    }
}

impl LayerSurface {
    pub(crate) fn new(surface: &Surface, output: Option<&Output>, layer: Layer, namespace: String) -> LayerSurface {
        LayerSurface {
            inner: Arc::new(LayerSurfaceData {
                surface: surface.downgrade(),
                client: surface.client().clone(),
                namespace,
                output: output.map(Output::downgrade),
                alive: AliveTracker::default(),
                attributes: Mutex::new(LayerSurfaceAttributes {
                    server_pending: None,
                    configures: ConfigureQueue::default(),
                    current: DoubleBuffered::default(),
                    cached: DoubleBuffered::new(LayerSurfaceCachedState {
                        layer,
                        ..Default::default()
                    }),
                    committed: false,
                    placement: None,
                    popups: PopupChain::default(),
                    closed: false,
                }),
            }),
        }
    }

    /// Retrieve the client owning this layer surface
    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// Create a weak reference to this layer surface
    pub fn downgrade(&self) -> WeakLayerSurface {
        WeakLayerSurface {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Namespace chosen by the client, describing the purpose of the surface
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// The output this surface is displayed on, if it still exists
    pub fn output(&self) -> Option<Output> {
        self.inner.output.as_ref().and_then(|output| output.upgrade().ok())
    }

    /// The layer the surface is rendered on
    pub fn layer(&self) -> Layer {
        self.cached_state().layer
    }

    /// The last committed client state
    pub fn cached_state(&self) -> LayerSurfaceCachedState {
        *self.inner.attributes.lock().unwrap().cached.committed()
    }

    /// The last committed server state
    pub fn current_state(&self) -> LayerSurfaceState {
        self.inner.attributes.lock().unwrap().current.committed().clone()
    }

    /// The placement computed by the last arrangement of the output
    pub fn placement(&self) -> Option<LayerGeometry> {
        self.inner.attributes.lock().unwrap().placement
    }

    /// Geometry of the surface in output coordinates
    pub fn geometry(&self) -> Option<Rectangle<i32, Logical>> {
        self.placement().map(|placement| placement.geometry)
    }

    /// Child popups that are still alive
    pub fn popups(&self) -> Vec<PopupSurface> {
        self.inner.attributes.lock().unwrap().popups.live_popups()
    }

    /// Allows the pending state of this layer to
    /// be manipulated.
    ///
    /// This should be used to inform the client about size and state changes,
    /// for example after a resize request from the client.
    ///
    /// The state will be sent to the client when calling [`send_configure`](#method.send_configure).
    pub fn with_pending_state<F, T>(&self, f: F) -> Result<T, DeadResource>
    where
        F: FnOnce(&mut LayerSurfaceState) -> T,
    {
        if !self.alive() {
            return Err(DeadResource);
        }
        let mut attributes = self.inner.attributes.lock().unwrap();
        if attributes.server_pending.is_none() {
            attributes.server_pending = Some(attributes.last_server_state());
        }
        let pending = attributes.server_pending.get_or_insert_with(Default::default);
        Ok(f(pending))
    }

    /// Send a configure event to this layer surface to suggest it a new configuration
    ///
    /// The serial of this configure will be tracked waiting for the client to ACK it.
    /// Nothing is sent if the pending state does not differ from the last one sent, or
    /// once the surface was closed. Returns the serial of the configure, if one was sent.
    pub fn send_configure(&self) -> Option<Serial> {
        self.send_configure_internal(false)
    }

    fn send_configure_internal(&self, force: bool) -> Option<Serial> {
        if !self.alive() {
            return None;
        }
        let surface = self.wl_surface()?;

        let (serial, state) = {
            let mut attributes = self.inner.attributes.lock().unwrap();
            if attributes.closed {
                return None;
            }
            let pending = match attributes.server_pending.take() {
                Some(pending) => pending,
                None => attributes.last_server_state(),
            };
            if !force && !attributes.configures.needs_configure(&pending) {
                return None;
            }
            let serial = self.inner.client.next_serial();
            attributes.configures.push(serial, pending.clone());
            (serial, pending)
        };

        trace!(surface = %surface.id(), %serial, ?state, "Sending layer surface configure");
        self.inner.client.send_event(Event::LayerConfigure {
            surface: surface.id(),
            serial,
            size: state.size.unwrap_or_default(),
        });
        Some(serial)
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

    /// Send a "close" event to the client
    ///
    /// The surface will not be configured anymore.
    pub fn send_close(&self) {
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
        debug!(surface = %surface.id(), "Closing layer surface");
        self.inner.client.send_event(Event::LayerClosed { surface: surface.id() });
    }

    /// Whether the surface was closed
    pub fn is_closed(&self) -> bool {
        self.inner.attributes.lock().unwrap().closed
    }

    // The committed state used for arrangement, `None` while the surface must not be
    // placed.
    pub(crate) fn arrangeable_state(&self) -> Option<LayerSurfaceCachedState> {
        if !self.alive() || self.wl_surface().is_none() {
            return None;
        }
        let attributes = self.inner.attributes.lock().unwrap();
        (attributes.committed && !attributes.closed).then(|| *attributes.cached.committed())
    }

    // Record a new placement, configuring the client if it tells it anything new.
    // Returns whether the placement changed.
    pub(crate) fn apply_placement(&self, placement: LayerGeometry) -> bool {
        let force = {
            let mut attributes = self.inner.attributes.lock().unwrap();
            let previous = attributes.placement.replace(placement);
            if previous == Some(placement) && attributes.configures.initial_configure_sent() {
                return false;
            }
            attributes.server_pending = Some(LayerSurfaceState {
                size: Some(placement.offered_size),
            });
            previous.map(|previous| previous.exclusion != placement.exclusion) == Some(true)
        };
        trace!(?placement, "Layer surface placed");
        self.send_configure_internal(force);
        true
    }

    pub(crate) fn add_popup(&self, popup: &PopupSurface) {
        self.inner.attributes.lock().unwrap().popups.push(popup);
    }

    pub(crate) fn ack_configure(&self, serial: Serial) -> Result<LayerSurfaceConfigure, UnknownSerial> {
        let mut attributes = self.inner.attributes.lock().unwrap();
        let record = attributes.configures.ack(serial)?;
        attributes.current.set_pending(record.state.clone());
        Ok(LayerSurfaceConfigure {
            state: record.state,
            serial: record.serial,
        })
    }

    pub(crate) fn with_cached_pending<F>(&self, f: F)
    where
        F: FnOnce(&mut LayerSurfaceCachedState),
    {
        f(self.inner.attributes.lock().unwrap().cached.pending_mut());
    }

    // The surface went away before the role object. The role is kept but it must not
    // occupy any space on its output anymore.
    pub(crate) fn surface_destroyed(&self) {
        {
            let mut attributes = self.inner.attributes.lock().unwrap();
            attributes.closed = true;
            attributes.placement = None;
        }
        if let Some(output) = self.output() {
            output.unmap_layer(self);
        }
    }

    // Returns the placements of the other surfaces that changed as a consequence.
    pub(crate) fn destroy(&self) -> Vec<LayerPlacement> {
        self.inner.alive.destroy_notify();
        match self.output() {
            Some(output) => output.unmap_layer(self),
            None => Vec::new(),
        }
    }
}

impl RoleSurface for LayerSurface {
    fn kind(&self) -> RoleKind {
        RoleKind::LayerSurface
    }

    fn wl_surface(&self) -> Option<Surface> {
        self.inner.surface.upgrade().ok()
    }

    fn handle_commit<D: ShellHandler>(&self, state: &mut D) -> Result<(), ProtocolError> {
        let _span = trace_span!("layer-surface commit", surface = %self.inner.surface.id()).entered();

        let (rearrange, shift) = {
            let mut attributes = self.inner.attributes.lock().unwrap();
            let pending = *attributes.cached.pending();
            geometry::validate_size(&pending)?;
            geometry::validate_exclusive_edge(&pending)?;

            let placement_changed = !pending.placement_eq(attributes.cached.committed());
            attributes.cached.commit();
            attributes.current.commit();
            let offset = geometry::anchor_offset(attributes.cached.committed());
            let shift = attributes.popups.set_offset(offset);

            let initial = !attributes.committed;
            attributes.committed = true;
            (!attributes.closed && (initial || placement_changed), shift)
        };

        if let Some(shift) = shift {
            shift.apply();
        }

        if rearrange {
            if let Some(output) = self.output() {
                for placement in output.arrange() {
                    state.layer_placed(placement.layer, placement.geometry);
                }
            }
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
}

/// Weak reference to a [`LayerSurface`]
#[derive(Debug, Clone)]
pub struct WeakLayerSurface {
    inner: Weak<LayerSurfaceData>,
}

impl WeakLayerSurface {
    /// Try to get the layer surface back
    pub fn upgrade(&self) -> Result<LayerSurface, DeadResource> {
        self.inner
            .upgrade()
            .filter(|inner| inner.alive.alive())
            .map(|inner| LayerSurface { inner })
            .ok_or(DeadResource)
    }
}

impl PartialEq for WeakLayerSurface {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

/// Shell global state
///
/// This state allows you to retrieve a list of surfaces
/// currently known to the shell global.
#[derive(Debug, Default)]
pub struct WlrLayerShellState {
    known_layers: Vec<LayerSurface>,
}

impl WlrLayerShellState {
    /// Create a new, empty, layer shell state
    pub fn new() -> WlrLayerShellState {
        WlrLayerShellState::default()
    }

    /// Access all the shell surfaces known by this handler
    pub fn layer_surfaces(&self) -> &[LayerSurface] {
        &self.known_layers[..]
    }

    /// The layer surface of a given surface, if any
    pub fn layer_for(&self, surface: &Surface) -> Option<&LayerSurface> {
        self.known_layers
            .iter()
            .find(|layer| layer.wl_surface().as_ref() == Some(surface))
    }

    pub(crate) fn add(&mut self, layer: LayerSurface) {
        self.known_layers.push(layer);
    }

    pub(crate) fn cleanup(&mut self) {
        self.known_layers.retain(|layer| layer.alive());
    }
}

/// Handler for the layer shell
pub trait WlrLayerShellHandler {
    /// [`WlrLayerShellState`] getter
    fn shell_state(&mut self) -> &mut WlrLayerShellState;

    /// A new layer surface was created
    ///
    /// `output` is the output the surface is placed on, `None` if the client did not
    /// choose one and [`preferred_output`](Self::preferred_output) did not either. Such
    /// a surface is closed right away.
    fn new_layer_surface(&mut self, surface: LayerSurface, output: Option<Output>, layer: Layer, namespace: String);

    /// Output for layer surfaces created without one
    ///
    /// Generally this is the one the user most recently interacted with.
    fn preferred_output(&mut self) -> Option<Output> {
        None
    }

    /// A popup was given a layer surface as parent
    fn new_layer_popup(&mut self, parent: LayerSurface, popup: PopupSurface) {
        let _ = (parent, popup);
    }

    /// A layer surface acknowledged a configure
    fn ack_configure(&mut self, surface: Surface, configure: LayerSurfaceConfigure) {
        let _ = (surface, configure);
    }

    /// A layer surface was given a new placement on its output
    fn layer_placed(&mut self, surface: LayerSurface, placement: LayerGeometry) {
        let _ = (surface, placement);
    }

    /// A layer surface was destroyed
    fn layer_destroyed(&mut self, surface: LayerSurface) {
        let _ = surface;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wayland::{
        compositor::{handle_surface_request, SurfaceRequest},
        test_utils::TestState,
    };

    fn layer_configures(events: &[Event]) -> Vec<(Serial, Size<i32, Logical>)> {
        events
            .iter()
            .filter_map(|event| match event {
                Event::LayerConfigure { serial, size, .. } => Some((*serial, *size)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn first_commit_arranges_and_configures() {
        let mut state = TestState::new();
        let surface = state.create_surface();
        let layer = state.layer_surface(&surface);

        for request in [
            LayerSurfaceRequest::SetAnchor((Anchor::TOP | Anchor::BOTTOM).bits()),
            LayerSurfaceRequest::SetSize { width: 200, height: 0 },
            LayerSurfaceRequest::SetMargin {
                top: 10,
                right: 0,
                bottom: 5,
                left: 0,
            },
        ] {
            handle_layer_surface_request(&mut state, &layer, request);
        }
        assert!(surface.client().drain_events().is_empty());

        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        let configures = layer_configures(&surface.client().drain_events());
        assert_eq!(configures.len(), 1);
        assert_eq!(configures[0].1, (200, 1065).into());
        assert_eq!(state.placements.len(), 1);
    }

    #[test]
    fn top_anchored_without_height_fails_the_commit() {
        let mut state = TestState::new();
        let surface = state.create_surface();
        let layer = state.layer_surface(&surface);
        handle_layer_surface_request(&mut state, &layer, LayerSurfaceRequest::SetAnchor(Anchor::TOP.bits()));
        handle_layer_surface_request(
            &mut state,
            &layer,
            LayerSurfaceRequest::SetSize { width: 100, height: 0 },
        );

        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        assert!(matches!(
            surface.client().protocol_error(),
            Some(ProtocolError::InvalidSize { .. })
        ));
    }

    #[test]
    fn changing_the_layer_does_not_reconfigure() {
        let mut state = TestState::new();
        let (surface, layer) = state.mapped_layer(Anchor::TOP | Anchor::LEFT | Anchor::RIGHT, (0, 30));
        let client = surface.client().clone();

        handle_layer_surface_request(&mut state, &layer, LayerSurfaceRequest::SetLayer(3));
        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        assert!(client.drain_events().is_empty());
        assert_eq!(layer.layer(), Layer::Overlay);

        handle_layer_surface_request(&mut state, &layer, LayerSurfaceRequest::SetExclusiveZone(30));
        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        // same offered size, but the exclusion changed
        assert_eq!(layer_configures(&client.drain_events()).len(), 1);
        assert_eq!(
            layer.placement().and_then(|placement| placement.exclusion),
            Some(Rectangle::from_loc_and_size((0, 0), (1920, 30)))
        );
    }

    #[test]
    fn exclusive_zones_push_later_layers() {
        let mut state = TestState::new();
        let (panel_surface, panel) = state.mapped_layer(Anchor::TOP | Anchor::LEFT | Anchor::RIGHT, (0, 30));
        handle_layer_surface_request(&mut state, &panel, LayerSurfaceRequest::SetExclusiveZone(30));
        handle_surface_request(&mut state, &panel_surface, SurfaceRequest::Commit);

        let (_, dock) = state.mapped_layer(Anchor::TOP, (100, 50));
        assert_eq!(dock.geometry().map(|geometry| geometry.loc), Some((910, 30).into()));

        let (_, overlay) = {
            let surface = state.create_surface();
            let layer = state.layer_surface(&surface);
            handle_layer_surface_request(&mut state, &layer, LayerSurfaceRequest::SetAnchor(Anchor::TOP.bits()));
            handle_layer_surface_request(
                &mut state,
                &layer,
                LayerSurfaceRequest::SetSize { width: 100, height: 50 },
            );
            handle_layer_surface_request(&mut state, &layer, LayerSurfaceRequest::SetExclusiveZone(-1));
            handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
            (surface, layer)
        };
        assert_eq!(
            overlay.geometry().map(|geometry| geometry.loc),
            Some((910, 0).into())
        );
    }

    #[test]
    fn acked_size_becomes_current_on_commit() {
        let mut state = TestState::new();
        let (surface, layer) = state.mapped_layer(Anchor::all(), (0, 0));
        let serial = layer.pending_configures()[0];

        handle_layer_surface_request(&mut state, &layer, LayerSurfaceRequest::AckConfigure(serial));
        assert_eq!(layer.current_state().size, None);
        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        assert_eq!(layer.current_state().size, Some((1920, 1080).into()));
        assert!(layer.is_configured());
    }
}
