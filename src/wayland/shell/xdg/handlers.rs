//! Entry points for the requests of the `xdg_shell` interfaces
//!
//! The transport decodes the wire requests and hands them over to the functions of this
//! module. Protocol violations are posted to the offending client, they never reach the
//! caller.

use tracing::{debug, trace};

use crate::utils::{IsAlive, Logical, Point, Rectangle, Serial};
use crate::wayland::{
    compositor::{assign_role, detach_role, ensure_no_role, Role, RoleSurface, Surface},
    error::{Interface, ProtocolError},
    output::Output,
    seat::SeatId,
    shell::{ShellHandler, UnknownSerial},
    Client,
};

use super::{
    Configure, PopupParent, PopupSurface, Positioner, ResizeEdge, State, ToplevelState, ToplevelSurface,
    XdgShellHandler,
};

/// Requests of the `xdg_positioner` interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionerRequest {
    /// `set_size`
    SetSize {
        /// width of the popup
        width: i32,
        /// height of the popup
        height: i32,
    },
    /// `set_anchor_rect`
    SetAnchorRect {
        /// x of the anchor rectangle
        x: i32,
        /// y of the anchor rectangle
        y: i32,
        /// width of the anchor rectangle
        width: i32,
        /// height of the anchor rectangle
        height: i32,
    },
    /// `set_anchor`
    SetAnchor(u32),
    /// `set_gravity`
    SetGravity(u32),
    /// `set_constraint_adjustment`
    SetConstraintAdjustment(u32),
    /// `set_offset`
    SetOffset {
        /// horizontal offset
        x: i32,
        /// vertical offset
        y: i32,
    },
    /// `set_reactive`
    SetReactive,
    /// `set_parent_size`
    SetParentSize {
        /// width of the parent
        width: i32,
        /// height of the parent
        height: i32,
    },
    /// `set_parent_configure`
    SetParentConfigure(Serial),
}

/// Requests of an `xdg_toplevel` and its `xdg_surface`
#[derive(Debug, Clone, PartialEq)]
pub enum ToplevelRequest {
    /// `xdg_surface.ack_configure`
    AckConfigure(Serial),
    /// `xdg_surface.set_window_geometry`
    SetWindowGeometry {
        /// x of the geometry
        x: i32,
        /// y of the geometry
        y: i32,
        /// width of the geometry
        width: i32,
        /// height of the geometry
        height: i32,
    },
    /// `set_parent`
    SetParent(Option<ToplevelSurface>),
    /// `set_title`
    SetTitle(String),
    /// `set_app_id`
    SetAppId(String),
    /// `show_window_menu`
    ShowWindowMenu {
        /// seat of the triggering input event
        seat: SeatId,
        /// serial of the triggering input event
        serial: Serial,
        /// location of the menu, relative to the window geometry
        location: Point<i32, Logical>,
    },
    /// `move`
    Move {
        /// seat of the triggering input event
        seat: SeatId,
        /// serial of the triggering input event
        serial: Serial,
    },
    /// `resize`
    Resize {
        /// seat of the triggering input event
        seat: SeatId,
        /// serial of the triggering input event
        serial: Serial,
        /// raw edge value
        edges: u32,
    },
    /// `set_max_size`
    SetMaxSize {
        /// maximum width, 0 for none
        width: i32,
        /// maximum height, 0 for none
        height: i32,
    },
    /// `set_min_size`
    SetMinSize {
        /// minimum width, 0 for none
        width: i32,
        /// minimum height, 0 for none
        height: i32,
    },
    /// `set_maximized`
    SetMaximized,
    /// `unset_maximized`
    UnsetMaximized,
    /// `set_fullscreen`
    SetFullscreen(Option<Output>),
    /// `unset_fullscreen`
    UnsetFullscreen,
    /// `set_minimized`
    SetMinimized,
    /// `destroy`
    Destroy,
}

/// Requests of an `xdg_popup` and its `xdg_surface`
#[derive(Debug, Clone, PartialEq)]
pub enum PopupRequest {
    /// `xdg_surface.ack_configure`
    AckConfigure(Serial),
    /// `xdg_surface.set_window_geometry`
    SetWindowGeometry {
        /// x of the geometry
        x: i32,
        /// y of the geometry
        y: i32,
        /// width of the geometry
        width: i32,
        /// height of the geometry
        height: i32,
    },
    /// `grab`
    Grab {
        /// seat of the triggering input event
        seat: SeatId,
        /// serial of the triggering input event
        serial: Serial,
    },
    /// `reposition`
    Reposition {
        /// the new placement blueprint
        positioner: Positioner,
        /// token echoed in the `repositioned` event
        token: u32,
    },
    /// `destroy`
    Destroy,
}

/// Process a positioner request
pub fn handle_positioner_request(client: &Client, positioner: &mut Positioner, request: PositionerRequest) {
    if !client.alive() {
        return;
    }

    let result = match request {
        PositionerRequest::SetSize { width, height } => positioner.set_size(width, height),
        PositionerRequest::SetAnchorRect { x, y, width, height } => {
            positioner.set_anchor_rect(x, y, width, height)
        }
        PositionerRequest::SetAnchor(anchor) => positioner.set_anchor(anchor),
        PositionerRequest::SetGravity(gravity) => positioner.set_gravity(gravity),
        PositionerRequest::SetConstraintAdjustment(adjustment) => {
            positioner.set_constraint_adjustment(adjustment);
            Ok(())
        }
        PositionerRequest::SetOffset { x, y } => {
            positioner.set_offset(x, y);
            Ok(())
        }
        PositionerRequest::SetReactive => {
            positioner.set_reactive();
            Ok(())
        }
        PositionerRequest::SetParentSize { width, height } => positioner.set_parent_size(width, height),
        PositionerRequest::SetParentConfigure(serial) => {
            positioner.set_parent_configure(serial);
            Ok(())
        }
    };

    if let Err(err) = result {
        client.post_error(err);
    }
}

/// Give the toplevel role to a surface (`xdg_wm_base.get_xdg_surface` + `xdg_surface.get_toplevel`)
///
/// Returns `None` if a protocol error was posted to the client.
pub fn get_toplevel<D: ShellHandler>(state: &mut D, surface: &Surface) -> Option<ToplevelSurface> {
    let client = surface.client().clone();
    if !client.alive() || !surface.alive() {
        return None;
    }

    let capabilities = state.xdg_shell_state().capabilities();
    let toplevel = ToplevelSurface::new(surface, capabilities);
    if let Err(err) = assign_role(surface, Role::Toplevel(toplevel.clone())) {
        client.post_error(err.into_protocol_error(Interface::XdgWmBase));
        return None;
    }

    debug!(surface = %surface.id(), "New xdg toplevel");
    state.xdg_shell_state().add_toplevel(toplevel.clone());
    state.new_toplevel(toplevel.clone());
    Some(toplevel)
}

/// Give the popup role to a surface (`xdg_wm_base.get_xdg_surface` + `xdg_surface.get_popup`)
///
/// A popup without parent must get one through another protocol, such as
/// `zwlr_layer_surface_v1.get_popup`, before its first commit.
///
/// Returns `None` if a protocol error was posted to the client.
pub fn get_popup<D: ShellHandler>(
    state: &mut D,
    surface: &Surface,
    parent: Option<PopupParent>,
    positioner: &Positioner,
) -> Option<PopupSurface> {
    let client = surface.client().clone();
    if !client.alive() || !surface.alive() {
        return None;
    }

    match create_popup(state, surface, parent, positioner) {
        Ok(popup) => Some(popup),
        Err(err) => {
            client.post_error(err);
            None
        }
    }
}

fn create_popup<D: ShellHandler>(
    state: &mut D,
    surface: &Surface,
    parent: Option<PopupParent>,
    positioner: &Positioner,
) -> Result<PopupSurface, ProtocolError> {
    let positioner = positioner.state()?;
    if let Some(parent) = &parent {
        if !parent.alive() || parent.wl_surface().is_none() {
            return Err(ProtocolError::InvalidPopupParent);
        }
    }

    ensure_no_role(surface)
        .map_err(|err| err.into_protocol_error(Interface::XdgWmBase))?;
    let popup = PopupSurface::new(surface, parent.as_ref(), positioner);
    assign_role(surface, Role::Popup(popup.clone()))
        .map_err(|err| err.into_protocol_error(Interface::XdgWmBase))?;

    debug!(surface = %surface.id(), parent = ?parent.as_ref().and_then(|p| p.wl_surface()).map(|s| s.id()), "New xdg popup");
    state.xdg_shell_state().add_popup(popup.clone());
    XdgShellHandler::new_popup(state, popup.clone(), positioner);
    Ok(popup)
}

/// Process a request of a toplevel
pub fn handle_toplevel_request<D: ShellHandler>(state: &mut D, toplevel: &ToplevelSurface, request: ToplevelRequest) {
    let client = toplevel.client().clone();
    if !client.alive() || !toplevel.alive() {
        return;
    }
    trace!(?request, "xdg_toplevel request");

    if let Err(err) = toplevel_request(state, toplevel, request) {
        client.post_error(err);
    }
}

fn toplevel_request<D: ShellHandler>(
    state: &mut D,
    toplevel: &ToplevelSurface,
    request: ToplevelRequest,
) -> Result<(), ProtocolError> {
    match request {
        ToplevelRequest::AckConfigure(serial) => {
            let configure = toplevel
                .ack_configure(serial)
                .map_err(|UnknownSerial(serial)| ProtocolError::UnknownSerial {
                    interface: Interface::XdgSurface,
                    serial,
                })?;
            if let Some(surface) = toplevel.wl_surface() {
                XdgShellHandler::ack_configure(state, surface, Configure::Toplevel(configure));
            }
        }
        ToplevelRequest::SetWindowGeometry { x, y, width, height } => {
            toplevel.set_window_geometry(window_geometry(x, y, width, height)?);
        }
        ToplevelRequest::SetParent(parent) => {
            toplevel.set_parent(parent.as_ref())?;
            state.parent_changed(toplevel.clone());
        }
        ToplevelRequest::SetTitle(title) => {
            toplevel.set_title(title);
            state.title_changed(toplevel.clone());
        }
        ToplevelRequest::SetAppId(app_id) => {
            toplevel.set_app_id(app_id);
            state.app_id_changed(toplevel.clone());
        }
        ToplevelRequest::ShowWindowMenu { seat, serial, location } => {
            state.show_window_menu(toplevel.clone(), seat, serial, location);
        }
        ToplevelRequest::Move { seat, serial } => {
            if state.validate_grab_serial(seat, serial) {
                state.move_request(toplevel.clone(), seat, serial);
            } else {
                debug!(%seat, %serial, "Ignoring move request with an invalid serial");
            }
        }
        ToplevelRequest::Resize { seat, serial, edges } => {
            let edges = ResizeEdge::try_from(edges)?;
            if state.validate_grab_serial(seat, serial) {
                state.resize_request(toplevel.clone(), seat, serial, edges);
            } else {
                debug!(%seat, %serial, "Ignoring resize request with an invalid serial");
            }
        }
        ToplevelRequest::SetMaxSize { width, height } => {
            toplevel.set_max_size(size_limit(width, height)?.into());
        }
        ToplevelRequest::SetMinSize { width, height } => {
            toplevel.set_min_size(size_limit(width, height)?.into());
        }
        ToplevelRequest::SetMaximized => transition(
            state,
            toplevel,
            |pending| {
                pending.states.set(State::Maximized);
                pending.states.unset(State::Minimized);
            },
            |state, toplevel| state.maximize_request(toplevel),
        ),
        ToplevelRequest::UnsetMaximized => transition(
            state,
            toplevel,
            |pending| {
                pending.states.unset(State::Maximized);
                pending.size = None;
            },
            |state, toplevel| state.unmaximize_request(toplevel),
        ),
        ToplevelRequest::SetFullscreen(output) => {
            let output_id = output.as_ref().map(Output::id);
            transition(
                state,
                toplevel,
                |pending| {
                    pending.states.set(State::Fullscreen);
                    pending.states.unset(State::Minimized);
                    pending.fullscreen_output = output_id;
                },
                |state, toplevel| state.fullscreen_request(toplevel, output),
            )
        }
        ToplevelRequest::UnsetFullscreen => transition(
            state,
            toplevel,
            |pending| {
                pending.states.unset(State::Fullscreen);
                pending.fullscreen_output = None;
                pending.size = None;
            },
            |state, toplevel| state.unfullscreen_request(toplevel),
        ),
        ToplevelRequest::SetMinimized => transition(
            state,
            toplevel,
            |pending| {
                pending.states.set(State::Minimized);
            },
            |state, toplevel| state.minimize_request(toplevel),
        ),
        ToplevelRequest::Destroy => {
            toplevel.destroy();
            if let Some(surface) = toplevel.wl_surface() {
                detach_role(&surface);
            }
            debug!("xdg toplevel destroyed");
            state.xdg_shell_state().cleanup();
            state.toplevel_destroyed(toplevel.clone());
        }
    }
    Ok(())
}

// Client driven window state changes are applied right away, the handler gets a chance
// to adjust the pending state before the configure goes out.
fn transition<D, F, N>(state: &mut D, toplevel: &ToplevelSurface, apply: F, notify: N)
where
    D: ShellHandler,
    F: FnOnce(&mut ToplevelState),
    N: FnOnce(&mut D, ToplevelSurface),
{
    if toplevel.with_pending_state(apply).is_err() {
        return;
    }
    notify(state, toplevel.clone());
    toplevel.send_configure_forced();
}

fn window_geometry(x: i32, y: i32, width: i32, height: i32) -> Result<Rectangle<i32, Logical>, ProtocolError> {
    if width <= 0 || height <= 0 {
        return Err(ProtocolError::InvalidWindowGeometry);
    }
    Ok(Rectangle::from_loc_and_size((x, y), (width, height)))
}

fn size_limit(width: i32, height: i32) -> Result<(i32, i32), ProtocolError> {
    if width < 0 || height < 0 {
        return Err(ProtocolError::InvalidSize {
            interface: Interface::XdgToplevel,
            message: format!("negative size limit {}x{}", width, height),
        });
    }
    Ok((width, height))
}

/// Process a request of a popup
pub fn handle_popup_request<D: ShellHandler>(state: &mut D, popup: &PopupSurface, request: PopupRequest) {
    let client = popup.client().clone();
    if !client.alive() || !popup.alive() {
        return;
    }
    trace!(?request, "xdg_popup request");

    if let Err(err) = popup_request(state, popup, request) {
        client.post_error(err);
    }
}

fn popup_request<D: ShellHandler>(
    state: &mut D,
    popup: &PopupSurface,
    request: PopupRequest,
) -> Result<(), ProtocolError> {
    match request {
        PopupRequest::AckConfigure(serial) => {
            let configure = popup
                .ack_configure(serial)
                .map_err(|UnknownSerial(serial)| ProtocolError::UnknownSerial {
                    interface: Interface::XdgSurface,
                    serial,
                })?;
            if let Some(surface) = popup.wl_surface() {
                XdgShellHandler::ack_configure(state, surface, Configure::Popup(configure));
            }
        }
        PopupRequest::SetWindowGeometry { x, y, width, height } => {
            popup.set_window_geometry(window_geometry(x, y, width, height)?);
        }
        PopupRequest::Grab { seat, serial } => {
            popup.set_grab(seat, serial)?;
            if state.validate_grab_serial(seat, serial) {
                state.grab(popup.clone(), seat, serial);
            } else {
                debug!(%seat, %serial, "Popup grab with an invalid serial, dismissing");
                popup.send_popup_done();
            }
        }
        PopupRequest::Reposition { positioner, token } => {
            let positioner = positioner.state()?;
            popup.reposition(positioner, token);
            state.reposition_request(popup.clone(), positioner, token);
        }
        PopupRequest::Destroy => {
            if !popup.popups().is_empty() {
                return Err(ProtocolError::NotTheTopmostPopup);
            }
            popup.destroy();
            if let Some(surface) = popup.wl_surface() {
                detach_role(&surface);
            }
            debug!("xdg popup destroyed");
            state.xdg_shell_state().cleanup();
            state.popup_destroyed(popup.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wayland::{
        compositor::{handle_surface_request, lookup, role_kind, RoleKind, SurfaceRequest},
        event::Event,
        test_utils::TestState,
    };

    #[test]
    fn second_role_is_reported_on_the_wm_base() {
        let mut state = TestState::new();
        let surface = state.create_surface();
        assert!(get_toplevel(&mut state, &surface).is_some());
        assert!(get_toplevel(&mut state, &surface).is_none());
        assert_eq!(
            surface.client().protocol_error(),
            Some(ProtocolError::RoleAlreadyAssigned {
                interface: Interface::XdgWmBase,
                existing: "xdg_toplevel",
            })
        );
    }

    #[test]
    fn popups_need_a_complete_positioner() {
        let mut state = TestState::new();
        let parent = state.mapped_toplevel();
        let surface = state.create_surface();
        let mut positioner = Positioner::new();
        handle_positioner_request(
            surface.client(),
            &mut positioner,
            PositionerRequest::SetSize { width: 10, height: 10 },
        );

        let popup = get_popup(
            &mut state,
            &surface,
            Some(PopupParent::Toplevel(parent)),
            &positioner,
        );
        assert!(popup.is_none());
        assert_eq!(
            surface.client().protocol_error(),
            Some(ProtocolError::IncompletePositioner)
        );
        assert_eq!(role_kind(&surface), None);
    }

    #[test]
    fn invalid_positioner_input_kills_the_client() {
        let state = TestState::new();
        let client = state.client.clone();
        let mut positioner = Positioner::new();
        handle_positioner_request(
            &client,
            &mut positioner,
            PositionerRequest::SetSize { width: 0, height: 10 },
        );
        let err = client.protocol_error().unwrap();
        assert_eq!(err.interface(), Interface::XdgPositioner);
        assert_eq!(err.code(), 0);
    }

    #[test]
    fn parentless_popups_cannot_be_committed() {
        let mut state = TestState::new();
        let surface = state.create_surface();
        let mut positioner = Positioner::new();
        positioner.set_size(10, 10).unwrap();
        positioner.set_anchor_rect(0, 0, 1, 1).unwrap();
        assert!(get_popup(&mut state, &surface, None, &positioner).is_some());

        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        assert_eq!(
            surface.client().protocol_error(),
            Some(ProtocolError::InvalidPopupParent)
        );
    }

    #[test]
    fn client_maximize_is_configured_right_away() {
        let mut state = TestState::new();
        let toplevel = state.mapped_toplevel();
        let client = toplevel.client().clone();

        handle_toplevel_request(&mut state, &toplevel, ToplevelRequest::SetMaximized);
        // the handler offered a size from its callback, it is part of the same configure
        let events = client.drain_events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::ToplevelConfigure { size, states, .. } => {
                assert_eq!(*size, (1920, 1080).into());
                assert!(states.contains(State::Maximized));
            }
            other => panic!("unexpected event {:?}", other),
        }

        // repeating the request still produces a configure
        handle_toplevel_request(&mut state, &toplevel, ToplevelRequest::SetMaximized);
        assert_eq!(client.drain_events().len(), 1);
        assert_eq!(state.maximize_requests, 2);
    }

    #[test]
    fn state_requests_before_the_first_commit_ride_the_initial_configure() {
        let mut state = TestState::new();
        let surface = state.create_surface();
        let toplevel = state.toplevel(&surface);

        handle_toplevel_request(&mut state, &toplevel, ToplevelRequest::SetFullscreen(None));
        assert!(surface.client().drain_events().is_empty());

        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        let fullscreen = surface.client().drain_events().into_iter().any(|event| {
            matches!(event, Event::ToplevelConfigure { ref states, .. } if states.contains(State::Fullscreen))
        });
        assert!(fullscreen);
    }

    #[test]
    fn invalid_resize_edges_and_geometry_are_rejected() {
        let mut state = TestState::new();
        let toplevel = state.mapped_toplevel();
        handle_toplevel_request(
            &mut state,
            &toplevel,
            ToplevelRequest::Resize {
                seat: SeatId(0),
                serial: Serial::from(3),
                edges: 3,
            },
        );
        assert_eq!(
            toplevel.client().protocol_error(),
            Some(ProtocolError::InvalidResizeEdge(3))
        );

        let toplevel = state.mapped_toplevel_for(crate::wayland::Client::new());
        handle_toplevel_request(
            &mut state,
            &toplevel,
            ToplevelRequest::SetWindowGeometry {
                x: 0,
                y: 0,
                width: 0,
                height: 10,
            },
        );
        assert_eq!(
            toplevel.client().protocol_error(),
            Some(ProtocolError::InvalidWindowGeometry)
        );
    }

    #[test]
    fn destroying_the_role_keeps_the_role_kind() {
        let mut state = TestState::new();
        let toplevel = state.mapped_toplevel();
        let surface = toplevel.wl_surface().unwrap();

        handle_toplevel_request(&mut state, &toplevel, ToplevelRequest::Destroy);
        assert!(lookup(&surface).is_none());
        assert_eq!(role_kind(&surface), Some(RoleKind::Toplevel));
        assert!(state.xdg_shell_state.toplevel_surfaces().is_empty());

        // the surface can now go away without error
        handle_surface_request(&mut state, &surface, SurfaceRequest::Destroy);
        assert!(surface.client().alive());
    }
}
