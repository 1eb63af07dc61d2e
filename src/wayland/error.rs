//! Protocol errors posted to misbehaving clients
//!
//! Every variant of [`ProtocolError`] is fatal for the connection that caused it: once
//! posted through [`Client::post_error`](super::Client::post_error) the client is
//! considered dead and no further events are delivered to it.

use std::fmt;

use crate::utils::Serial;

/// The protocol interface an error is reported on
///
/// Error codes are only unique within an interface, like on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    /// `wl_surface`
    Surface,
    /// `xdg_wm_base`
    XdgWmBase,
    /// `xdg_positioner`
    XdgPositioner,
    /// `xdg_surface`
    XdgSurface,
    /// `xdg_toplevel`
    XdgToplevel,
    /// `xdg_popup`
    XdgPopup,
    /// `zwlr_layer_shell_v1`
    LayerShell,
    /// `zwlr_layer_surface_v1`
    LayerSurface,
    /// `ext_session_lock_v1`
    SessionLock,
    /// `ext_session_lock_surface_v1`
    LockSurface,
}

impl Interface {
    /// Name of the interface, as seen on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Interface::Surface => "wl_surface",
            Interface::XdgWmBase => "xdg_wm_base",
            Interface::XdgPositioner => "xdg_positioner",
            Interface::XdgSurface => "xdg_surface",
            Interface::XdgToplevel => "xdg_toplevel",
            Interface::XdgPopup => "xdg_popup",
            Interface::LayerShell => "zwlr_layer_shell_v1",
            Interface::LayerSurface => "zwlr_layer_surface_v1",
            Interface::SessionLock => "ext_session_lock_v1",
            Interface::LockSurface => "ext_session_lock_surface_v1",
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A connection-fatal protocol violation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The client acknowledged a serial that is not in flight for this role
    #[error("serial {serial} does not match any outstanding configure")]
    UnknownSerial {
        /// interface the acknowledgement was sent on
        interface: Interface,
        /// the offending serial
        serial: Serial,
    },
    /// A size was missing, negative or inconsistent
    #[error("invalid size: {message}")]
    InvalidSize {
        /// interface the size was set on
        interface: Interface,
        /// what exactly is wrong
        message: String,
    },
    /// A popup was created from a positioner lacking its size or anchor rectangle
    #[error("incomplete positioner: size and anchor rectangle must both be set")]
    IncompletePositioner,
    /// A positioner request carried invalid arguments
    #[error("invalid positioner input: {0}")]
    InvalidPositionerInput(String),
    /// The surface already has a role
    #[error("surface already has the {existing} role")]
    RoleAlreadyAssigned {
        /// interface of the role factory
        interface: Interface,
        /// name of the role already held by the surface
        existing: &'static str,
    },
    /// A role object was constructed twice for the same surface or output
    #[error("{interface} object was already constructed")]
    AlreadyConstructed {
        /// interface of the duplicated object
        interface: Interface,
    },
    /// The surface was committed before its role handshake allowed it
    #[error("surface committed before the role was configured")]
    NotConstructed {
        /// interface of the role
        interface: Interface,
    },
    /// The surface was destroyed while its role object was still alive
    #[error("surface destroyed before its {role} role object")]
    DefunctRoleObject {
        /// interface of the role
        interface: Interface,
        /// name of the role still alive
        role: &'static str,
    },
    /// A popup was created for a parent that does not exist anymore, or without a parent
    #[error("invalid popup parent")]
    InvalidPopupParent,
    /// A popup was destroyed while it still had child popups
    #[error("popup destroyed while it was not the topmost popup")]
    NotTheTopmostPopup,
    /// Unknown bits in a layer surface anchor
    #[error("invalid anchor {0:#x}")]
    InvalidAnchor(u32),
    /// Unknown layer value
    #[error("invalid layer {0}")]
    InvalidLayer(u32),
    /// Unknown keyboard interactivity value
    #[error("invalid keyboard interactivity {0}")]
    InvalidKeyboardInteractivity(u32),
    /// Exclusive edge is not one of the anchored edges
    #[error("exclusive edge is not an anchored edge")]
    InvalidExclusiveEdge,
    /// Unknown resize edge
    #[error("invalid resize edge {0}")]
    InvalidResizeEdge(u32),
    /// Window geometry with a non-positive size
    #[error("window geometry must have a positive size")]
    InvalidWindowGeometry,
    /// Popup grab requested after the popup was mapped
    #[error("popup grab requested after the initial commit")]
    InvalidGrab,
    /// Toplevel parent would create a loop
    #[error("invalid toplevel parent")]
    InvalidParent,
    /// Two lock surfaces were requested for the same output
    #[error("output already has a lock surface")]
    DuplicateOutput,
    /// The session was unlocked before it was confirmed locked
    #[error("unlock requested before the session was locked")]
    InvalidUnlock,
    /// The lock object was destroyed without unlocking a locked session
    #[error("session lock destroyed while the session is locked")]
    InvalidDestroy,
}

impl ProtocolError {
    /// Interface the error is reported on
    pub fn interface(&self) -> Interface {
        match self {
            ProtocolError::UnknownSerial { interface, .. }
            | ProtocolError::InvalidSize { interface, .. }
            | ProtocolError::RoleAlreadyAssigned { interface, .. }
            | ProtocolError::AlreadyConstructed { interface }
            | ProtocolError::NotConstructed { interface }
            | ProtocolError::DefunctRoleObject { interface, .. } => *interface,
            ProtocolError::IncompletePositioner
            | ProtocolError::InvalidPopupParent
            | ProtocolError::NotTheTopmostPopup => Interface::XdgWmBase,
            ProtocolError::InvalidPositionerInput(_) => Interface::XdgPositioner,
            ProtocolError::InvalidAnchor(_)
            | ProtocolError::InvalidKeyboardInteractivity(_)
            | ProtocolError::InvalidExclusiveEdge => Interface::LayerSurface,
            ProtocolError::InvalidLayer(_) => Interface::LayerShell,
            ProtocolError::InvalidResizeEdge(_) | ProtocolError::InvalidParent => Interface::XdgToplevel,
            ProtocolError::InvalidWindowGeometry => Interface::XdgSurface,
            ProtocolError::InvalidGrab => Interface::XdgPopup,
            ProtocolError::DuplicateOutput | ProtocolError::InvalidUnlock | ProtocolError::InvalidDestroy => {
                Interface::SessionLock
            }
        }
    }

    /// Machine-readable error code, unique within [`ProtocolError::interface`]
    pub fn code(&self) -> u32 {
        use Interface::*;

        match (self, self.interface()) {
            (ProtocolError::RoleAlreadyAssigned { .. }, XdgWmBase) => 0,
            (ProtocolError::RoleAlreadyAssigned { .. }, LayerShell) => 0,
            (ProtocolError::RoleAlreadyAssigned { .. }, SessionLock) => 2,
            (ProtocolError::RoleAlreadyAssigned { .. }, _) => 0,
            (ProtocolError::NotTheTopmostPopup, _) => 2,
            (ProtocolError::InvalidPopupParent, _) => 3,
            (ProtocolError::IncompletePositioner, _) => 5,
            (ProtocolError::InvalidPositionerInput(_), _) => 0,

            (ProtocolError::NotConstructed { .. }, LockSurface) => 0,
            (ProtocolError::NotConstructed { .. }, _) => 1,
            (ProtocolError::AlreadyConstructed { .. }, LayerShell) => 2,
            (ProtocolError::AlreadyConstructed { .. }, SessionLock) => 4,
            (ProtocolError::AlreadyConstructed { .. }, _) => 2,
            (ProtocolError::UnknownSerial { .. }, LockSurface) => 3,
            (ProtocolError::UnknownSerial { .. }, LayerSurface) => 0,
            (ProtocolError::UnknownSerial { .. }, _) => 4,
            (ProtocolError::InvalidSize { .. }, XdgToplevel) => 2,
            (ProtocolError::InvalidSize { .. }, LayerSurface) => 1,
            (ProtocolError::InvalidSize { .. }, LockSurface) => 2,
            (ProtocolError::InvalidSize { .. }, XdgPositioner) => 0,
            (ProtocolError::InvalidSize { .. }, _) => 5,
            (ProtocolError::InvalidWindowGeometry, _) => 5,
            (ProtocolError::DefunctRoleObject { .. }, XdgSurface) => 6,
            (ProtocolError::DefunctRoleObject { .. }, _) => 1,

            (ProtocolError::InvalidResizeEdge(_), _) => 0,
            (ProtocolError::InvalidParent, _) => 1,
            (ProtocolError::InvalidGrab, _) => 0,

            (ProtocolError::InvalidLayer(_), _) => 1,
            (ProtocolError::InvalidAnchor(_), _) => 2,
            (ProtocolError::InvalidKeyboardInteractivity(_), _) => 3,
            (ProtocolError::InvalidExclusiveEdge, _) => 4,

            (ProtocolError::InvalidDestroy, _) => 0,
            (ProtocolError::InvalidUnlock, _) => 1,
            (ProtocolError::DuplicateOutput, _) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_the_interface() {
        let serial = ProtocolError::UnknownSerial {
            interface: Interface::XdgSurface,
            serial: Serial::from(7),
        };
        assert_eq!(serial.code(), 4);
        assert_eq!(serial.to_string(), "serial 7 does not match any outstanding configure");

        let lock = ProtocolError::UnknownSerial {
            interface: Interface::LockSurface,
            serial: Serial::from(7),
        };
        assert_eq!(lock.code(), 3);
        assert_eq!(lock.interface(), Interface::LockSurface);
    }

    #[test]
    fn role_errors_are_reported_on_the_factory() {
        let err = ProtocolError::RoleAlreadyAssigned {
            interface: Interface::SessionLock,
            existing: "xdg_toplevel",
        };
        assert_eq!(err.code(), 2);
        assert_eq!(err.to_string(), "surface already has the xdg_toplevel role");
        assert_eq!(ProtocolError::IncompletePositioner.interface(), Interface::XdgWmBase);
    }
}
