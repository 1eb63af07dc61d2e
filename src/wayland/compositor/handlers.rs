use tracing::{trace, trace_span, warn};

use crate::utils::IsAlive;
use crate::wayland::{
    error::ProtocolError,
    shell::{role_interface, ShellHandler},
};

use super::{lookup, role_kind, RoleKinds, RoleSurface, Surface};

/// Requests of the `wl_surface` interface handled by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRequest {
    /// `wl_surface.commit`
    Commit,
    /// `wl_surface.destroy`
    Destroy,
}

/// Process a surface request
///
/// Requests of dead clients are ignored.
pub fn handle_surface_request<D: ShellHandler>(state: &mut D, surface: &Surface, request: SurfaceRequest) {
    let client = surface.client().clone();
    if !client.alive() || !surface.alive() {
        return;
    }

    let result = match request {
        SurfaceRequest::Commit => commit(state, surface),
        SurfaceRequest::Destroy => destroy(state, surface),
    };

    if let Err(err) = result {
        client.post_error(err);
    }
}

fn commit<D: ShellHandler>(state: &mut D, surface: &Surface) -> Result<(), ProtocolError> {
    let _span = trace_span!("surface commit", surface = %surface.id()).entered();

    if let Some(role) = lookup(surface).filter(|role| role.alive()) {
        trace!(role = %role.kind(), "Applying role state");
        role.handle_commit(state)?;
    }

    state.commit(surface);
    Ok(())
}

fn destroy<D: ShellHandler>(state: &mut D, surface: &Surface) -> Result<(), ProtocolError> {
    if let Some(role) = lookup(surface).filter(|role| role.alive()) {
        let kind = role.kind();
        let tolerated = state
            .compositor_state()
            .config()
            .tolerate_early_surface_destroy
            .contains(RoleKinds::from(kind));

        if !tolerated {
            return Err(ProtocolError::DefunctRoleObject {
                interface: role_interface(kind),
                role: kind.name(),
            });
        }

        warn!(
            surface = %surface.id(),
            role = %kind,
            "Surface destroyed before its role object, ignoring"
        );
        surface.inner.alive.destroy_notify();
        role.surface_destroyed();
    } else {
        surface.inner.alive.destroy_notify();
    }

    trace!(surface = %surface.id(), role = ?role_kind(surface), "Surface destroyed");
    state.compositor_state().remove_surface(surface);
    state.destroyed(surface);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wayland::{
        compositor::{CompositorConfig, RoleKind},
        error::Interface,
        test_utils::TestState,
    };

    #[test]
    fn strict_policy_rejects_early_surface_destruction() {
        let mut state = TestState::with_config(CompositorConfig::strict());
        let surface = state.create_surface();
        state.make_role(RoleKind::LayerSurface, &surface);

        handle_surface_request(&mut state, &surface, SurfaceRequest::Destroy);
        assert_eq!(
            surface.client().protocol_error(),
            Some(ProtocolError::DefunctRoleObject {
                interface: Interface::LayerSurface,
                role: "zwlr_layer_surface_v1",
            })
        );
    }

    #[test]
    fn lenient_policy_tolerates_layer_surfaces() {
        let mut state = TestState::new();
        let surface = state.create_surface();
        let role = state.make_role(RoleKind::LayerSurface, &surface);

        handle_surface_request(&mut state, &surface, SurfaceRequest::Destroy);
        assert!(surface.client().alive());
        assert!(!surface.alive());
        assert_eq!(role.wl_surface(), None);
        assert_eq!(state.destroyed, vec![surface.id()]);
    }

    #[test]
    fn lenient_policy_still_rejects_toplevels() {
        let mut state = TestState::new();
        let surface = state.create_surface();
        state.make_role(RoleKind::Toplevel, &surface);

        handle_surface_request(&mut state, &surface, SurfaceRequest::Destroy);
        assert!(matches!(
            surface.client().protocol_error(),
            Some(ProtocolError::DefunctRoleObject {
                interface: Interface::XdgSurface,
                ..
            })
        ));
    }

    #[test]
    fn commit_reaches_the_compositor() {
        let mut state = TestState::new();
        let surface = state.create_surface();
        handle_surface_request(&mut state, &surface, SurfaceRequest::Commit);
        assert_eq!(state.commits, vec![surface.id()]);
    }
}
