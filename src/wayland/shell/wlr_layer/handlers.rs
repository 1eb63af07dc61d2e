use std::convert::TryFrom;

use tracing::{debug, trace};

use crate::utils::{IsAlive, Serial};
use crate::wayland::{
    compositor::{assign_role, detach_role, Role, RoleSurface, Surface},
    error::{Interface, ProtocolError},
    output::Output,
    shell::{xdg::PopupParent, xdg::PopupSurface, ShellHandler, UnknownSerial},
};

use super::{Anchor, KeyboardInteractivity, Layer, LayerSurface, Margins, WlrLayerShellHandler};

/// Requests of the `zwlr_layer_surface_v1` interface
#[derive(Debug, Clone, PartialEq)]
pub enum LayerSurfaceRequest {
    /// `set_size`
    SetSize {
        /// requested width, 0 to let the compositor decide
        width: u32,
        /// requested height, 0 to let the compositor decide
        height: u32,
    },
    /// `set_anchor`
    SetAnchor(u32),
    /// `set_exclusive_zone`
    SetExclusiveZone(i32),
    /// `set_margin`
    SetMargin {
        /// top margin
        top: i32,
        /// right margin
        right: i32,
        /// bottom margin
        bottom: i32,
        /// left margin
        left: i32,
    },
    /// `set_keyboard_interactivity`
    SetKeyboardInteractivity(u32),
    /// `get_popup`
    GetPopup(PopupSurface),
    /// `set_layer`
    SetLayer(u32),
    /// `set_exclusive_edge`, 0 to clear it
    SetExclusiveEdge(u32),
    /// `ack_configure`
    AckConfigure(Serial),
    /// `destroy`
    Destroy,
}

/// Give the layer surface role to a surface (`zwlr_layer_shell_v1.get_layer_surface`)
///
/// Without an output, [`WlrLayerShellHandler::preferred_output`] is asked for one. A
/// surface ending up without a live output is closed right away.
///
/// Returns `None` if a protocol error was posted to the client.
pub fn get_layer_surface<D: ShellHandler>(
    state: &mut D,
    surface: &Surface,
    output: Option<Output>,
    layer: u32,
    namespace: String,
) -> Option<LayerSurface> {
    let client = surface.client().clone();
    if !client.alive() || !surface.alive() {
        return None;
    }

    let layer = match Layer::try_from(layer) {
        Ok(layer) => layer,
        Err(err) => {
            client.post_error(err);
            return None;
        }
    };

    let output = output.or_else(|| state.preferred_output());
    let handle = LayerSurface::new(surface, output.as_ref(), layer, namespace.clone());
    if let Err(err) = assign_role(surface, Role::LayerSurface(handle.clone())) {
        client.post_error(err.into_protocol_error(Interface::LayerShell));
        return None;
    }

    debug!(surface = %surface.id(), ?layer, %namespace, "New layer surface");
    state.shell_state().add(handle.clone());
    match output.as_ref().filter(|output| output.alive()) {
        Some(output) => output.map_layer(&handle),
        None => {
            debug!(surface = %surface.id(), "Layer surface has no output");
            handle.send_close();
        }
    }
    state.new_layer_surface(handle.clone(), output, layer, namespace);
    Some(handle)
}

/// Process a request of a layer surface
pub fn handle_layer_surface_request<D: ShellHandler>(state: &mut D, layer: &LayerSurface, request: LayerSurfaceRequest) {
    let client = layer.client().clone();
    if !client.alive() || !layer.alive() {
        return;
    }
    trace!(?request, "zwlr_layer_surface_v1 request");

    if let Err(err) = layer_surface_request(state, layer, request) {
        client.post_error(err);
    }
}

fn layer_surface_request<D: ShellHandler>(
    state: &mut D,
    layer: &LayerSurface,
    request: LayerSurfaceRequest,
) -> Result<(), ProtocolError> {
    match request {
        LayerSurfaceRequest::SetSize { width, height } => {
            let size = (clamp(width), clamp(height)).into();
            layer.with_cached_pending(|pending| pending.size = size);
        }
        LayerSurfaceRequest::SetAnchor(anchor) => {
            let anchor = Anchor::from_raw(anchor)?;
            layer.with_cached_pending(|pending| pending.anchor = anchor);
        }
        LayerSurfaceRequest::SetExclusiveZone(zone) => {
            layer.with_cached_pending(|pending| pending.exclusive_zone = zone.into());
        }
        LayerSurfaceRequest::SetMargin {
            top,
            right,
            bottom,
            left,
        } => {
            layer.with_cached_pending(|pending| {
                pending.margin = Margins {
                    top,
                    right,
                    bottom,
                    left,
                }
            });
        }
        LayerSurfaceRequest::SetKeyboardInteractivity(value) => {
            let keyboard_interactivity = KeyboardInteractivity::try_from(value)?;
            layer.with_cached_pending(|pending| pending.keyboard_interactivity = keyboard_interactivity);
        }
        LayerSurfaceRequest::SetLayer(value) => {
            let new_layer = Layer::try_from(value)?;
            layer.with_cached_pending(|pending| pending.layer = new_layer);
        }
        LayerSurfaceRequest::SetExclusiveEdge(edge) => {
            let edge = match Anchor::from_bits(edge) {
                Some(edge) if edge.is_empty() => None,
                Some(edge) if edge.is_single_edge() => Some(edge),
                _ => return Err(ProtocolError::InvalidExclusiveEdge),
            };
            layer.with_cached_pending(|pending| pending.exclusive_edge = edge);
        }
        LayerSurfaceRequest::GetPopup(popup) => {
            popup.set_parent(&PopupParent::LayerSurface(layer.clone()))?;
            state.new_layer_popup(layer.clone(), popup);
        }
        LayerSurfaceRequest::AckConfigure(serial) => {
            let configure = layer
                .ack_configure(serial)
                .map_err(|UnknownSerial(serial)| ProtocolError::UnknownSerial {
                    interface: Interface::LayerSurface,
                    serial,
                })?;
            if let Some(surface) = layer.wl_surface() {
                WlrLayerShellHandler::ack_configure(state, surface, configure);
            }
        }
        LayerSurfaceRequest::Destroy => {
            let placements = layer.destroy();
            if let Some(surface) = layer.wl_surface() {
                detach_role(&surface);
            }
            debug!("Layer surface destroyed");
            state.shell_state().cleanup();
            for placement in placements {
                state.layer_placed(placement.layer, placement.geometry);
            }
            state.layer_destroyed(layer.clone());
        }
    }
    Ok(())
}

fn clamp(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Rectangle;
    use crate::wayland::{
        compositor::{handle_surface_request, lookup, SurfaceRequest},
        event::Event,
        shell::xdg::{get_popup, Positioner},
        test_utils::TestState,
    };

    #[test]
    fn invalid_enum_values_are_fatal() {
        let mut state = TestState::new();
        let surface = state.create_surface();
        assert!(get_layer_surface(&mut state, &surface, None, 7, "panel".into()).is_none());
        let err = surface.client().protocol_error().unwrap();
        assert_eq!(err, ProtocolError::InvalidLayer(7));
        assert_eq!(err.interface(), Interface::LayerShell);

        let mut state = TestState::new();
        let surface = state.create_surface();
        let layer = state.layer_surface(&surface);
        handle_layer_surface_request(&mut state, &layer, LayerSurfaceRequest::SetExclusiveEdge(5));
        assert_eq!(
            surface.client().protocol_error(),
            Some(ProtocolError::InvalidExclusiveEdge)
        );
    }

    #[test]
    fn surfaces_without_output_are_closed() {
        let mut state = TestState::new();
        let output = state.output.clone();
        output.destroy();

        let surface = state.create_surface();
        let layer = get_layer_surface(&mut state, &surface, Some(output), 2, "osk".into()).unwrap();
        assert!(layer.is_closed());
        assert_eq!(
            surface.client().drain_events(),
            vec![Event::LayerClosed { surface: surface.id() }]
        );
        assert!(surface.client().alive());
    }

    #[test]
    fn exclusive_edge_is_checked_against_committed_anchors() {
        let mut state = TestState::new();
        let surface = state.create_surface();
        let layer = state.layer_surface(&surface);
        handle_layer_surface_request(
            &mut state,
            &layer,
            LayerSurfaceRequest::SetAnchor((Anchor::TOP | Anchor::LEFT).bits()),
        );
        handle_layer_surface_request(
            &mut state,
            &layer,
            LayerSurfaceRequest::SetSize {
                width: 10,
                height: 10,
            },
        );
        handle_layer_surface_request(
            &mut state,
            &layer,
            LayerSurfaceRequest::SetExclusiveEdge(Anchor::BOTTOM.bits()),
        );
        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        assert_eq!(
            surface.client().protocol_error(),
            Some(ProtocolError::InvalidExclusiveEdge)
        );
    }

    #[test]
    fn popups_follow_the_margin_offset() {
        let mut state = TestState::new();
        let (surface, layer) = state.mapped_layer(Anchor::TOP | Anchor::LEFT, (200, 40));

        let popup_surface = state.create_surface();
        let mut positioner = Positioner::new();
        positioner.set_size(50, 50).unwrap();
        positioner.set_anchor_rect(10, 10, 5, 5).unwrap();
        let popup = get_popup(&mut state, &popup_surface, None, &positioner).unwrap();
        handle_layer_surface_request(&mut state, &layer, LayerSurfaceRequest::GetPopup(popup.clone()));
        assert_eq!(popup.get_parent_surface(), Some(surface.clone()));

        handle_layer_surface_request(
            &mut state,
            &layer,
            LayerSurfaceRequest::SetMargin {
                top: 4,
                right: 0,
                bottom: 0,
                left: 6,
            },
        );
        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        assert_eq!(popup.anchor_rect().loc, (16, 14).into());

        // a popup can only be given a parent once
        handle_layer_surface_request(&mut state, &layer, LayerSurfaceRequest::GetPopup(popup));
        assert_eq!(
            surface.client().protocol_error(),
            Some(ProtocolError::InvalidPopupParent)
        );
    }

    #[test]
    fn extreme_zone_and_margins_stay_within_the_output() {
        let mut state = TestState::new();
        let (surface, panel) = state.mapped_layer(Anchor::TOP, (100, 30));
        handle_layer_surface_request(&mut state, &panel, LayerSurfaceRequest::SetExclusiveZone(i32::MAX));
        handle_layer_surface_request(
            &mut state,
            &panel,
            LayerSurfaceRequest::SetMargin {
                top: 10,
                right: i32::MAX,
                bottom: i32::MAX,
                left: i32::MAX,
            },
        );
        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        assert!(surface.client().alive());
        assert_eq!(
            panel.placement().unwrap().exclusion,
            Some(Rectangle::from_loc_and_size((0, 0), (1920, 1080)))
        );

        // the layer map is still usable for everyone else
        let output = state.output.clone();
        assert_eq!(
            output.non_exclusive_zone(),
            Rectangle::from_loc_and_size((0, 1080), (1920, 0))
        );
        let (_, window_area) = state.mapped_layer(Anchor::all(), (0, 0));
        assert_eq!(window_area.placement().unwrap().offered_size, (1920, 0).into());
    }

    #[test]
    fn destroying_a_layer_frees_its_zone() {
        let mut state = TestState::new();
        let (panel_surface, panel) = state.mapped_layer(Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT, (0, 40));
        handle_layer_surface_request(&mut state, &panel, LayerSurfaceRequest::SetExclusiveZone(40));
        handle_surface_request(&mut state, &panel_surface, SurfaceRequest::Commit);
        let (_, window_area) = state.mapped_layer(Anchor::all(), (0, 0));
        assert_eq!(window_area.placement().unwrap().offered_size, (1920, 1040).into());

        state.placements.clear();
        handle_layer_surface_request(&mut state, &panel, LayerSurfaceRequest::Destroy);
        assert!(lookup(&panel_surface).is_none());
        assert_eq!(window_area.placement().unwrap().offered_size, (1920, 1080).into());
        assert_eq!(state.placements.len(), 1);
        assert!(state.layer_shell_state.layer_surfaces().iter().all(|l| l != &panel));
    }
}
