//! Utilities for handling shell surfaces with the `xdg_shell` protocol
//!
//! This module tracks the toplevel windows and popups defined by the clients and runs
//! the `xdg_surface` configure handshake for them.
//!
//! Toplevels go through a small state machine (restored, maximized, fullscreen,
//! minimized) driven both by the compositor policy and by client requests. Popups are
//! placed with the [`positioner`] solver inside the constraint target you provide, and
//! dismissed together with their children.
//!
//! Drawing, focus and window placement stay with the compositor.
//!
//! ## How to use it
//!
//! ### Initialization
//!
//! Create an [`XdgShellState`] and store it inside your compositor state, then implement
//! [`XdgShellHandler`] to be notified of new surfaces and of client requests.
//! Requests decoded by the transport are fed to the functions of this module:
//! [`get_toplevel`], [`get_popup`], [`handle_toplevel_request`],
//! [`handle_popup_request`] and [`handle_positioner_request`].
//!
//! ### Access to shell surface and clients data
//!
//! There are mainly 2 kind of objects that you'll manipulate from this implementation:
//!
//! - [`ToplevelSurface`]:
//!   This is a handle representing a toplevel surface, you can
//!   retrieve a list of all currently alive toplevel surface from the
//!   [`XdgShellState`].
//! - [`PopupSurface`]:
//!   This is a handle representing a popup/tooltip surface. Similarly,
//!   you can get a list of all currently alive popup surface from the
//!   [`XdgShellState`].
//!
//! You'll obtain these objects though two means: either via the callback methods of
//! the [`XdgShellHandler`], or via methods on the [`XdgShellState`].

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::utils::{IsAlive, Logical, Point, Rectangle, Serial, Size};
use crate::wayland::{
    compositor::{RoleSurface, Surface},
    error::ProtocolError,
    output::{Output, OutputId},
    seat::SeatId,
};

mod handlers;
mod popup;
pub mod positioner;
mod toplevel;

pub use self::handlers::{
    get_popup, get_toplevel, handle_popup_request, handle_positioner_request, handle_toplevel_request,
    PopupRequest, PositionerRequest, ToplevelRequest,
};
pub use self::popup::{PopupConfigureError, PopupParent, PopupSurface, WeakPopupSurface};
pub use self::positioner::{Anchor, ConstraintAdjustment, Gravity, Positioner, PositionerState};
pub use self::toplevel::{ToplevelSurface, WeakToplevelSurface};

/// A state a toplevel can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// The surface is maximized
    Maximized,
    /// The surface is fullscreen
    Fullscreen,
    /// The surface is being resized
    Resizing,
    /// The surface has keyboard focus
    Activated,
    /// The left edge is adjacent to another part of the tiling grid
    TiledLeft,
    /// The right edge is adjacent to another part of the tiling grid
    TiledRight,
    /// The top edge is adjacent to another part of the tiling grid
    TiledTop,
    /// The bottom edge is adjacent to another part of the tiling grid
    TiledBottom,
    /// The surface is minimized
    ///
    /// `xdg_toplevel` has no wire representation for this state; transports drop it
    /// when encoding a configure.
    Minimized,
}

/// Container holding the states for a toplevel
///
/// This container will prevent the toplevel from
/// having the same [`State`] multiple times
/// and simplifies setting and un-setting a particularly
/// [`State`]. Two sets are equal if they hold the same states, in any order.
#[derive(Debug, Default, Clone)]
pub struct ToplevelStateSet {
    states: SmallVec<[State; 4]>,
}

impl ToplevelStateSet {
    /// Returns `true` if the states contains a state.
    pub fn contains(&self, state: State) -> bool {
        self.states.iter().any(|s| *s == state)
    }

    /// Adds a state to the states.
    ///
    /// If the states did not have this state present, `true` is returned.
    ///
    /// If the states did have this state present, `false` is returned.
    pub fn set(&mut self, state: State) -> bool {
        if self.contains(state) {
            false
        } else {
            self.states.push(state);
            true
        }
    }

    /// Removes a state from the states. Returns whether the state was
    /// present in the states.
    pub fn unset(&mut self, state: State) -> bool {
        if !self.contains(state) {
            false
        } else {
            self.states.retain(|s| *s != state);
            true
        }
    }

    /// Iterate over the states, in the order they were set
    pub fn iter(&self) -> impl Iterator<Item = State> + '_ {
        self.states.iter().copied()
    }

    /// Number of states in the set
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no state is set
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl PartialEq for ToplevelStateSet {
    fn eq(&self, other: &Self) -> bool {
        self.states.len() == other.states.len() && self.states.iter().all(|s| other.contains(*s))
    }
}

impl Eq for ToplevelStateSet {}

impl FromIterator<State> for ToplevelStateSet {
    fn from_iter<I: IntoIterator<Item = State>>(iter: I) -> Self {
        let mut set = ToplevelStateSet::default();
        for state in iter {
            set.set(state);
        }
        set
    }
}

impl IntoIterator for ToplevelStateSet {
    type Item = State;
    type IntoIter = smallvec::IntoIter<[State; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.into_iter()
    }
}

bitflags! {
    /// Window management capabilities announced to toplevels
    ///
    /// Clients hide the controls of actions the compositor does not support.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WmCapabilities: u32 {
        /// `show_window_menu` is supported
        const WINDOW_MENU = 1;
        /// `set_maximized` and `unset_maximized` are supported
        const MAXIMIZE = 2;
        /// `set_fullscreen` and `unset_fullscreen` are supported
        const FULLSCREEN = 4;
        /// `set_minimized` is supported
        const MINIMIZE = 8;
    }
}

impl Default for WmCapabilities {
    fn default() -> Self {
        WmCapabilities::all()
    }
}

/// State of a regular toplevel surface
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ToplevelState {
    /// The suggested size of the surface
    pub size: Option<Size<i32, Logical>>,

    /// The states for this surface
    pub states: ToplevelStateSet,

    /// The output for a fullscreen display
    pub fullscreen_output: Option<OutputId>,
}

/// State of a popup surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupState {
    /// The position of the popup relative to the window geometry of its parent
    pub geometry: Rectangle<i32, Logical>,
}

/// Represents the client pending state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCachedState {
    /// Holds the double-buffered geometry that may be specified
    /// by xdg_surface.set_window_geometry.
    pub geometry: Option<Rectangle<i32, Logical>>,
    /// Minimum size requested for this surface
    ///
    /// A value of 0 on an axis means this axis is not constrained
    ///
    /// This is only relevant for xdg_toplevel, and will always be
    /// `(0, 0)` for xdg_popup.
    pub min_size: Size<i32, Logical>,
    /// Maximum size requested for this surface
    ///
    /// A value of 0 on an axis means this axis is not constrained
    ///
    /// This is only relevant for xdg_toplevel, and will always be
    /// `(0, 0)` for xdg_popup.
    pub max_size: Size<i32, Logical>,
}

impl SurfaceCachedState {
    // 0 means unconstrained on that axis
    fn min_exceeds_max(&self) -> bool {
        let exceeds = |min: i32, max: i32| max != 0 && min > max;
        exceeds(self.min_size.w, self.max_size.w) || exceeds(self.min_size.h, self.max_size.h)
    }
}

/// A configure message for toplevel surfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToplevelConfigure {
    /// The state associated with this configure
    pub state: ToplevelState,

    /// Serial the client acknowledged
    ///
    /// Acknowledging a serial discards every older configure still in flight.
    pub serial: Serial,
}

/// A configure message for popup surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupConfigure {
    /// The state associated with this configure
    pub state: PopupState,

    /// Serial the client acknowledged
    pub serial: Serial,

    /// The token the client provided in the `xdg_popup::reposition`
    /// request
    pub reposition_token: Option<u32>,
}

/// An acknowledged configure, as passed to [`XdgShellHandler::ack_configure`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Configure {
    /// Acknowledged by a toplevel
    Toplevel(ToplevelConfigure),
    /// Acknowledged by a popup
    Popup(PopupConfigure),
}

/// Edge or corner a toplevel is resized from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeEdge {
    /// No edge
    None,
    /// Top edge
    Top,
    /// Bottom edge
    Bottom,
    /// Left edge
    Left,
    /// Top left corner
    TopLeft,
    /// Bottom left corner
    BottomLeft,
    /// Right edge
    Right,
    /// Top right corner
    TopRight,
    /// Bottom right corner
    BottomRight,
}

impl TryFrom<u32> for ResizeEdge {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => ResizeEdge::None,
            1 => ResizeEdge::Top,
            2 => ResizeEdge::Bottom,
            4 => ResizeEdge::Left,
            5 => ResizeEdge::TopLeft,
            6 => ResizeEdge::BottomLeft,
            8 => ResizeEdge::Right,
            9 => ResizeEdge::TopRight,
            10 => ResizeEdge::BottomRight,
            _ => return Err(ProtocolError::InvalidResizeEdge(value)),
        })
    }
}

/// Shell global state
///
/// This state allows you to retrieve a list of surfaces
/// currently known to the shell global.
#[derive(Debug, Default)]
pub struct XdgShellState {
    capabilities: WmCapabilities,
    toplevels: Vec<ToplevelSurface>,
    popups: Vec<PopupSurface>,
}

impl XdgShellState {
    /// Create a new `xdg_shell` state advertising every window management capability
    pub fn new() -> XdgShellState {
        Self::new_with_capabilities(WmCapabilities::all())
    }

    /// Create a new `xdg_shell` state advertising the given capabilities
    pub fn new_with_capabilities(capabilities: WmCapabilities) -> XdgShellState {
        XdgShellState {
            capabilities,
            toplevels: Vec::new(),
            popups: Vec::new(),
        }
    }

    /// Capabilities announced to new toplevels
    pub fn capabilities(&self) -> WmCapabilities {
        self.capabilities
    }

    /// Access all the shell surfaces known by this handler
    pub fn toplevel_surfaces(&self) -> &[ToplevelSurface] {
        &self.toplevels
    }

    /// Access all the popup surfaces known by this handler
    pub fn popup_surfaces(&self) -> &[PopupSurface] {
        &self.popups
    }

    /// Find the toplevel of a surface
    pub fn toplevel_for(&self, surface: &Surface) -> Option<&ToplevelSurface> {
        self.toplevels
            .iter()
            .find(|toplevel| toplevel.wl_surface().as_ref() == Some(surface))
    }

    pub(crate) fn add_toplevel(&mut self, toplevel: ToplevelSurface) {
        self.toplevels.push(toplevel);
    }

    pub(crate) fn add_popup(&mut self, popup: PopupSurface) {
        self.popups.push(popup);
    }

    pub(crate) fn cleanup(&mut self) {
        self.toplevels.retain(|toplevel| toplevel.alive());
        self.popups.retain(|popup| popup.alive());
    }
}

/// Handler trait for xdg shell
pub trait XdgShellHandler {
    /// [XdgShellState] getter
    fn xdg_shell_state(&mut self) -> &mut XdgShellState;

    /// A new toplevel surface was created.
    ///
    /// You likely need to send a [`ToplevelConfigure`] to the surface, to hint the
    /// client as to how its window should be sized. The initial configure is sent
    /// automatically on the first commit otherwise.
    fn new_toplevel(&mut self, surface: ToplevelSurface);

    /// A new popup surface was created.
    ///
    /// You can use [`PopupSurface::set_constraint_target`] to define the area the popup
    /// must be fitted into. The initial configure is sent on the first commit.
    fn new_popup(&mut self, surface: PopupSurface, positioner: PositionerState);

    /// A surface has acknowledged a configure serial.
    fn ack_configure(&mut self, surface: Surface, configure: Configure) {
        let _ = (surface, configure);
    }

    /// The client requested the start of an interactive move for this surface.
    fn move_request(&mut self, surface: ToplevelSurface, seat: SeatId, serial: Serial) {
        let _ = (surface, seat, serial);
    }

    /// The client requested the start of an interactive resize for this surface.
    fn resize_request(&mut self, surface: ToplevelSurface, seat: SeatId, serial: Serial, edges: ResizeEdge) {
        let _ = (surface, seat, serial, edges);
    }

    /// This popup requests a grab of the pointer
    ///
    /// This means it requests to be sent a `popup_done` event when the pointer leaves
    /// the grab area.
    fn grab(&mut self, surface: PopupSurface, seat: SeatId, serial: Serial) {
        let _ = (surface, seat, serial);
    }

    /// Whether the serial of a grab, move or resize request matches an input event of
    /// the seat
    ///
    /// A popup whose grab fails validation is dismissed.
    fn validate_grab_serial(&mut self, seat: SeatId, serial: Serial) -> bool {
        let _ = (seat, serial);
        true
    }

    /// A toplevel surface requested to be maximized
    ///
    /// The maximized state is already set on the pending state when this is called;
    /// adjust the offered size here. A configure is sent right after.
    fn maximize_request(&mut self, surface: ToplevelSurface) {
        let _ = surface;
    }

    /// A toplevel surface requested to stop being maximized
    ///
    /// A configure is sent right after.
    fn unmaximize_request(&mut self, surface: ToplevelSurface) {
        let _ = surface;
    }

    /// A toplevel surface requested to be set fullscreen
    ///
    /// A configure is sent right after.
    fn fullscreen_request(&mut self, surface: ToplevelSurface, output: Option<Output>) {
        let _ = (surface, output);
    }

    /// A toplevel surface request to stop being fullscreen
    ///
    /// A configure is sent right after.
    fn unfullscreen_request(&mut self, surface: ToplevelSurface) {
        let _ = surface;
    }

    /// A toplevel surface requested to be minimized
    fn minimize_request(&mut self, surface: ToplevelSurface) {
        let _ = surface;
    }

    /// The client requests the window menu to be displayed on this surface at this location
    ///
    /// This menu belongs to the compositor. It is typically expected to contain options for
    /// control of the window (maximize/minimize/close/move/etc...).
    fn show_window_menu(
        &mut self,
        surface: ToplevelSurface,
        seat: SeatId,
        serial: Serial,
        location: Point<i32, Logical>,
    ) {
        let _ = (surface, seat, serial, location);
    }

    /// A popup was repositioned by the client
    ///
    /// The new placement was already computed and configured.
    fn reposition_request(&mut self, surface: PopupSurface, positioner: PositionerState, token: u32) {
        let _ = (surface, positioner, token);
    }

    /// The toplevel changed its parent
    fn parent_changed(&mut self, surface: ToplevelSurface) {
        let _ = surface;
    }

    /// The toplevel changed its title
    fn title_changed(&mut self, surface: ToplevelSurface) {
        let _ = surface;
    }

    /// The toplevel changed its app id
    fn app_id_changed(&mut self, surface: ToplevelSurface) {
        let _ = surface;
    }

    /// A toplevel surface was destroyed.
    fn toplevel_destroyed(&mut self, surface: ToplevelSurface) {
        let _ = surface;
    }

    /// A popup surface was destroyed.
    fn popup_destroyed(&mut self, surface: PopupSurface) {
        let _ = surface;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_sets_compare_as_sets() {
        let mut first = ToplevelStateSet::default();
        assert!(first.set(State::Maximized));
        assert!(first.set(State::Activated));
        assert!(!first.set(State::Maximized));

        let second: ToplevelStateSet = [State::Activated, State::Maximized].into_iter().collect();
        assert_eq!(first, second);

        assert!(first.unset(State::Activated));
        assert!(!first.unset(State::Activated));
        assert_ne!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn resize_edges_are_validated() {
        assert_eq!(ResizeEdge::try_from(10u32), Ok(ResizeEdge::BottomRight));
        assert_eq!(ResizeEdge::try_from(3u32), Err(ProtocolError::InvalidResizeEdge(3)));
    }

    #[test]
    fn min_size_above_max_size_is_detected() {
        let mut cached = SurfaceCachedState {
            min_size: (200, 100).into(),
            max_size: (0, 0).into(),
            ..Default::default()
        };
        assert!(!cached.min_exceeds_max());
        cached.max_size = (100, 0).into();
        assert!(cached.min_exceeds_max());
    }
}
