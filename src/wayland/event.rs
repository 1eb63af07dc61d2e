//! Server-to-client events
//!
//! The core never writes to a socket. Every event addressed to a client is queued on its
//! [`Client`](super::Client) and picked up by the transport through
//! [`Client::drain_events`](super::Client::drain_events).

use crate::utils::{Logical, Rectangle, Serial, Size};
use crate::wayland::compositor::SurfaceId;
use crate::wayland::shell::xdg::{ToplevelStateSet, WmCapabilities};

/// An event queued for delivery to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Capabilities of the window manager, sent once before the first toplevel configure
    WmCapabilities {
        /// surface of the toplevel
        surface: SurfaceId,
        /// advertised capabilities
        capabilities: WmCapabilities,
    },
    /// `xdg_toplevel.configure` followed by `xdg_surface.configure`
    ToplevelConfigure {
        /// surface of the toplevel
        surface: SurfaceId,
        /// serial to acknowledge
        serial: Serial,
        /// offered size, a zero dimension lets the client choose
        size: Size<i32, Logical>,
        /// the full set of active states
        states: ToplevelStateSet,
    },
    /// The compositor asks the toplevel to close
    ToplevelClose {
        /// surface of the toplevel
        surface: SurfaceId,
    },
    /// `xdg_popup.configure` followed by `xdg_surface.configure`
    PopupConfigure {
        /// surface of the popup
        surface: SurfaceId,
        /// serial to acknowledge
        serial: Serial,
        /// placement relative to the parent's window geometry
        geometry: Rectangle<i32, Logical>,
        /// reposition token this configure answers, if any
        token: Option<u32>,
    },
    /// `xdg_popup.repositioned`, always sent before the matching configure
    PopupRepositioned {
        /// surface of the popup
        surface: SurfaceId,
        /// token given by the client in `reposition`
        token: u32,
    },
    /// The popup was dismissed
    PopupDone {
        /// surface of the popup
        surface: SurfaceId,
    },
    /// `zwlr_layer_surface_v1.configure`
    LayerConfigure {
        /// surface of the layer surface
        surface: SurfaceId,
        /// serial to acknowledge
        serial: Serial,
        /// offered size, a zero dimension lets the client choose
        size: Size<i32, Logical>,
    },
    /// `zwlr_layer_surface_v1.closed`
    LayerClosed {
        /// surface of the layer surface
        surface: SurfaceId,
    },
    /// `ext_session_lock_surface_v1.configure`
    LockConfigure {
        /// surface of the lock surface
        surface: SurfaceId,
        /// serial to acknowledge
        serial: Serial,
        /// size the lock surface must use
        size: Size<i32, Logical>,
    },
    /// The lock surface's output disappeared, the surface will never be shown again
    LockSurfaceClosed {
        /// surface of the lock surface
        surface: SurfaceId,
    },
    /// `ext_session_lock_v1.locked`
    Locked,
    /// `ext_session_lock_v1.finished`
    LockFinished,
}

impl Event {
    /// Surface this event is addressed to, if it is surface specific
    pub fn surface(&self) -> Option<SurfaceId> {
        match self {
            Event::WmCapabilities { surface, .. }
            | Event::ToplevelConfigure { surface, .. }
            | Event::ToplevelClose { surface }
            | Event::PopupConfigure { surface, .. }
            | Event::PopupRepositioned { surface, .. }
            | Event::PopupDone { surface }
            | Event::LayerConfigure { surface, .. }
            | Event::LayerClosed { surface }
            | Event::LockConfigure { surface, .. }
            | Event::LockSurfaceClosed { surface } => Some(*surface),
            Event::Locked | Event::LockFinished => None,
        }
    }

    /// Serial carried by a configure event
    pub fn serial(&self) -> Option<Serial> {
        match self {
            Event::ToplevelConfigure { serial, .. }
            | Event::PopupConfigure { serial, .. }
            | Event::LayerConfigure { serial, .. }
            | Event::LockConfigure { serial, .. } => Some(*serial),
            _ => None,
        }
    }
}
