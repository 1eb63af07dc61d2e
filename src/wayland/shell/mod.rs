//! Handler utilities for the various shell protocols
//!
//! Wayland, via its different protocol extensions, supports different kind of
//! shells. Here a shell represent the logic associated to displaying windows and
//! arranging them on the screen.
//!
//! This crate currently provides two of them, plus the lock screen in
//! [`session_lock`](crate::wayland::session_lock):
//!
//! - The [`xdg`] module provides handlers for the `xdg_shell` protocol, which is
//!   the current standard for desktop apps
//! - The [`wlr_layer`] module provides handlers for the `wlr_layer_shell`
//!   protocol, which is for panels, docks and backgrounds rendering above/below normal
//!   XDG windows
//!
//! The machinery shared by all of them lives here: the [`ConfigureQueue`] correlating
//! configures with client acknowledgements, and the [`PopupChain`] moving child popups
//! along with their parent.

use crate::wayland::{
    compositor::{CompositorHandler, RoleKind},
    error::Interface,
    session_lock::SessionLockHandler,
};

pub mod configure;
pub mod popup_chain;
pub mod wlr_layer;
pub mod xdg;

pub use self::configure::{ConfigureQueue, ConfigureRecord, ConfigureState, UnknownSerial};
pub use self::popup_chain::{OffsetShift, PopupChain};

/// Window state requested by the window management policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowState {
    /// Neither maximized, fullscreen nor minimized
    Restored,
    /// Maximized
    Maximized,
    /// Fullscreen
    Fullscreen,
    /// Minimized, the previous state is kept for restoration
    Minimized,
}

/// All the handlers a compositor implements to drive every role of this crate
///
/// Automatically implemented for every type implementing the individual handlers.
pub trait ShellHandler:
    CompositorHandler + xdg::XdgShellHandler + wlr_layer::WlrLayerShellHandler + SessionLockHandler
{
}

impl<D> ShellHandler for D where
    D: CompositorHandler + xdg::XdgShellHandler + wlr_layer::WlrLayerShellHandler + SessionLockHandler
{
}

/// Interface protocol errors about a role object are reported on
pub(crate) fn role_interface(kind: RoleKind) -> Interface {
    match kind {
        RoleKind::Toplevel | RoleKind::Popup => Interface::XdgSurface,
        RoleKind::LayerSurface => Interface::LayerSurface,
        RoleKind::LockSurface => Interface::LockSurface,
    }
}
