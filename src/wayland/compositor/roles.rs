//! Tools for handling surface roles
//!
//! In the Wayland protocol, surfaces can have several different roles, which
//! define how they are to be used. This crate handles four of them:
//!
//! - `xdg_toplevel`: the surface is what is most often called a "window".
//! - `xdg_popup`: a transient surface placed relative to a parent by a positioner.
//! - `zwlr_layer_surface_v1`: a panel-like surface anchored to the edges of an output.
//! - `ext_session_lock_surface_v1`: the surface covering an output while the session
//!   is locked.
//!
//! A surface is given a role exactly once. Even after the role object is destroyed the
//! surface keeps its role type, and any further role assignment is refused with
//! [`AlreadyHasRole`]. A surface without a role is not displayed at all.
//!
//! The role attached to a surface can be looked up with [`lookup`], which returns the
//! tagged [`Role`] enum. All variants share the lifecycle contract of the [`RoleSurface`]
//! trait while each keeps its own request surface on its handle type.

use bitflags::bitflags;

use crate::utils::{IsAlive, Logical, Size};
use crate::wayland::{
    error::{Interface, ProtocolError},
    session_lock::LockSurface,
    shell::{
        wlr_layer::LayerSurface,
        xdg::{PopupSurface, ToplevelSurface},
        ShellHandler, WindowState,
    },
};

use super::Surface;

/// The kind of role a surface holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    /// `xdg_toplevel`
    Toplevel,
    /// `xdg_popup`
    Popup,
    /// `zwlr_layer_surface_v1`
    LayerSurface,
    /// `ext_session_lock_surface_v1`
    LockSurface,
}

impl RoleKind {
    /// Name of the role, as used in protocol error messages
    pub fn name(&self) -> &'static str {
        match self {
            RoleKind::Toplevel => "xdg_toplevel",
            RoleKind::Popup => "xdg_popup",
            RoleKind::LayerSurface => "zwlr_layer_surface_v1",
            RoleKind::LockSurface => "ext_session_lock_surface_v1",
        }
    }
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// A set of role kinds
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RoleKinds: u32 {
        /// `xdg_toplevel`
        const TOPLEVEL = 1;
        /// `xdg_popup`
        const POPUP = 2;
        /// `zwlr_layer_surface_v1`
        const LAYER_SURFACE = 4;
        /// `ext_session_lock_surface_v1`
        const LOCK_SURFACE = 8;
    }
}

impl From<RoleKind> for RoleKinds {
    fn from(kind: RoleKind) -> Self {
        match kind {
            RoleKind::Toplevel => RoleKinds::TOPLEVEL,
            RoleKind::Popup => RoleKinds::POPUP,
            RoleKind::LayerSurface => RoleKinds::LAYER_SURFACE,
            RoleKind::LockSurface => RoleKinds::LOCK_SURFACE,
        }
    }
}

/// The role of a surface, with the handle of the role object
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    /// The surface is an xdg toplevel
    Toplevel(ToplevelSurface),
    /// The surface is an xdg popup
    Popup(PopupSurface),
    /// The surface is a layer surface
    LayerSurface(LayerSurface),
    /// The surface is a session lock surface
    LockSurface(LockSurface),
}

/// The lifecycle contract shared by every role
pub trait RoleSurface: IsAlive {
    /// Kind of this role
    fn kind(&self) -> RoleKind;

    /// Resolve the role to its underlying surface
    ///
    /// Returns `None` once the surface has been destroyed.
    fn wl_surface(&self) -> Option<Surface>;

    /// Apply the state committed by the client
    fn handle_commit<D: ShellHandler>(&self, state: &mut D) -> Result<(), ProtocolError>;

    /// The compositor wants the role to take the given size
    fn handle_resize(&self, size: Size<i32, Logical>);

    /// The compositor wants the role to go away
    fn handle_close_request(&self);

    /// The compositor changed the window state of the role
    ///
    /// Only meaningful for toplevels, other roles ignore it.
    fn handle_state_change(&self, state: WindowState) {
        let _ = state;
    }
}

macro_rules! dispatch {
    ($self:ident, $role:ident => $body:expr) => {
        match $self {
            Role::Toplevel($role) => $body,
            Role::Popup($role) => $body,
            Role::LayerSurface($role) => $body,
            Role::LockSurface($role) => $body,
        }
    };
}

impl IsAlive for Role {
    fn alive(&self) -> bool {
        dispatch!(self, role => role.alive())
    }
}

impl RoleSurface for Role {
    fn kind(&self) -> RoleKind {
        dispatch!(self, role => role.kind())
    }

    fn wl_surface(&self) -> Option<Surface> {
        dispatch!(self, role => role.wl_surface())
    }

    fn handle_commit<D: ShellHandler>(&self, state: &mut D) -> Result<(), ProtocolError> {
        dispatch!(self, role => role.handle_commit(state))
    }

    fn handle_resize(&self, size: Size<i32, Logical>) {
        dispatch!(self, role => role.handle_resize(size))
    }

    fn handle_close_request(&self) {
        dispatch!(self, role => role.handle_close_request())
    }

    fn handle_state_change(&self, state: WindowState) {
        dispatch!(self, role => role.handle_state_change(state))
    }
}

impl Role {
    /// Access the toplevel handle, if this is a toplevel
    pub fn toplevel(&self) -> Option<&ToplevelSurface> {
        match self {
            Role::Toplevel(toplevel) => Some(toplevel),
            _ => None,
        }
    }

    /// Access the popup handle, if this is a popup
    pub fn popup(&self) -> Option<&PopupSurface> {
        match self {
            Role::Popup(popup) => Some(popup),
            _ => None,
        }
    }

    /// Access the layer surface handle, if this is a layer surface
    pub fn layer_surface(&self) -> Option<&LayerSurface> {
        match self {
            Role::LayerSurface(layer) => Some(layer),
            _ => None,
        }
    }

    /// Access the lock surface handle, if this is a lock surface
    pub fn lock_surface(&self) -> Option<&LockSurface> {
        match self {
            Role::LockSurface(lock) => Some(lock),
            _ => None,
        }
    }

    // The surface went away while the role object is kept around under the leniency
    // policy. The role must stop affecting anything else.
    pub(crate) fn surface_destroyed(&self) {
        match self {
            Role::Toplevel(_) => {}
            Role::Popup(_) => {}
            Role::LayerSurface(layer) => layer.surface_destroyed(),
            Role::LockSurface(lock) => lock.surface_destroyed(),
        }
    }
}

/// The surface already has a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("surface already has the {existing} role")]
pub struct AlreadyHasRole {
    /// role the surface was given first
    pub existing: RoleKind,
}

impl AlreadyHasRole {
    /// The protocol error reported on the role factory `interface`
    pub fn into_protocol_error(self, interface: Interface) -> ProtocolError {
        ProtocolError::RoleAlreadyAssigned {
            interface,
            existing: self.existing.name(),
        }
    }
}

/// Give a role to a surface
///
/// Fails if the surface was ever given a role before, including one whose role object
/// has since been destroyed.
pub fn assign_role(surface: &Surface, role: Role) -> Result<(), AlreadyHasRole> {
    let mut slot = surface.inner.role.lock().unwrap();
    if let Some(existing) = slot.kind {
        return Err(AlreadyHasRole { existing });
    }
    slot.kind = Some(role.kind());
    slot.role = Some(role);
    Ok(())
}

/// Check that a surface can still be given a role
pub(crate) fn ensure_no_role(surface: &Surface) -> Result<(), AlreadyHasRole> {
    match surface.inner.role.lock().unwrap().kind {
        Some(existing) => Err(AlreadyHasRole { existing }),
        None => Ok(()),
    }
}

/// The role object currently attached to a surface
///
/// Returns `None` if the surface never got a role or its role object was destroyed.
pub fn lookup(surface: &Surface) -> Option<Role> {
    surface.inner.role.lock().unwrap().role.clone()
}

/// The kind of role of the surface, even if the role object was destroyed
pub fn role_kind(surface: &Surface) -> Option<RoleKind> {
    surface.inner.role.lock().unwrap().kind
}

// The role object is gone, the surface keeps its role kind.
pub(crate) fn detach_role(surface: &Surface) {
    surface.inner.role.lock().unwrap().role = None;
}
