//! ext-session-lock lock.

use tracing::{debug, trace};

use crate::utils::IsAlive;
use crate::wayland::{
    compositor::{assign_role, ensure_no_role, Role, Surface},
    error::{Interface, ProtocolError},
    output::Output,
    shell::ShellHandler,
};

use super::{LockSurface, SessionLock};

/// Requests of the `ext_session_lock_v1` interface, besides `get_lock_surface`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLockRequest {
    /// `unlock_and_destroy`
    UnlockAndDestroy,
    /// `destroy`
    Destroy,
}

/// Create a lock surface covering `output` (`ext_session_lock_v1.get_lock_surface`)
///
/// The surface is offered the size of the output right away. A lock surface for an
/// output that is already gone is told so immediately.
///
/// Returns `None` if the request was ignored or a protocol error was posted.
pub fn get_lock_surface<D: ShellHandler>(
    state: &mut D,
    lock: &SessionLock,
    surface: &Surface,
    output: &Output,
) -> Option<LockSurface> {
    let client = lock.client().clone();
    if !client.alive() || !lock.alive() || !surface.alive() {
        return None;
    }

    if let Err(err) = ensure_no_role(surface) {
        client.post_error(err.into_protocol_error(Interface::SessionLock));
        return None;
    }

    let lock_surface = LockSurface::new(surface, lock, output);
    if output.alive() {
        if let Err(err) = output.claim_lock_surface(&lock_surface, lock) {
            client.post_error(err);
            return None;
        }
    }
    if let Err(err) = assign_role(surface, Role::LockSurface(lock_surface.clone())) {
        output.release_lock_surface(&lock_surface);
        client.post_error(err.into_protocol_error(Interface::SessionLock));
        return None;
    }

    debug!(surface = %surface.id(), output = %output.id(), "New lock surface");
    state.session_lock_state().add_surface(lock_surface.clone());
    state.new_surface(lock_surface.clone(), output.clone());

    if output.alive() {
        let size = output.geometry().size;
        if lock_surface.with_pending_state(|state| state.size = Some(size)).is_ok() {
            lock_surface.send_configure();
        }
    } else {
        lock_surface.output_destroyed();
    }
    Some(lock_surface)
}

/// Process a request of a session lock object
pub fn handle_session_lock_request<D: ShellHandler>(state: &mut D, lock: &SessionLock, request: SessionLockRequest) {
    let client = lock.client().clone();
    if !client.alive() || !lock.alive() {
        return;
    }
    trace!(?request, "ext_session_lock_v1 request");

    if let Err(err) = session_lock_request(state, lock, request) {
        client.post_error(err);
    }
}

fn session_lock_request<D: ShellHandler>(
    state: &mut D,
    lock: &SessionLock,
    request: SessionLockRequest,
) -> Result<(), ProtocolError> {
    match request {
        SessionLockRequest::UnlockAndDestroy => {
            if !lock.is_locked() {
                return Err(ProtocolError::InvalidUnlock);
            }
            lock.destroy();
            state.session_lock_state().clear_lock(lock);
            debug!(client = %lock.client().id(), "Session unlocked");
            state.unlock();
        }
        SessionLockRequest::Destroy => {
            if lock.is_locked() {
                return Err(ProtocolError::InvalidDestroy);
            }
            lock.destroy();
            state.session_lock_state().clear_lock(lock);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Rectangle;
    use crate::wayland::{event::Event, session_lock, test_utils::TestState};

    fn requested_lock(state: &mut TestState) -> SessionLock {
        let client = state.client.clone();
        session_lock::lock(state, &client).unwrap()
    }

    #[test]
    fn unlocking_requires_a_confirmed_lock() {
        let mut state = TestState::new();
        let lock = requested_lock(&mut state);

        handle_session_lock_request(&mut state, &lock, SessionLockRequest::UnlockAndDestroy);
        assert_eq!(lock.client().protocol_error(), Some(ProtocolError::InvalidUnlock));
        assert_eq!(state.unlocks, 0);
    }

    #[test]
    fn destroying_a_held_lock_is_fatal() {
        let mut state = TestState::new();
        let lock = requested_lock(&mut state);
        state.lockers.remove(0).lock();

        handle_session_lock_request(&mut state, &lock, SessionLockRequest::Destroy);
        let err = lock.client().protocol_error().unwrap();
        assert_eq!(err, ProtocolError::InvalidDestroy);
        assert_eq!(err.interface(), Interface::SessionLock);
    }

    #[test]
    fn unlock_releases_the_session() {
        let mut state = TestState::new();
        let lock = requested_lock(&mut state);
        state.lockers.remove(0).lock();

        handle_session_lock_request(&mut state, &lock, SessionLockRequest::UnlockAndDestroy);
        assert_eq!(state.unlocks, 1);
        assert!(!state.session_lock_state.is_locked());
        assert!(lock.client().alive());
    }

    #[test]
    fn lock_surfaces_are_configured_with_the_output_size() {
        let mut state = TestState::new();
        let lock = requested_lock(&mut state);
        let surface = state.create_surface();
        let output = state.output.clone();

        let lock_surface = get_lock_surface(&mut state, &lock, &surface, &output).unwrap();
        let events = surface.client().drain_events();
        assert!(matches!(
            events.as_slice(),
            [Event::LockConfigure { size, .. }] if *size == (1920, 1080).into()
        ));
        assert_eq!(output.lock_surface(), Some(lock_surface));
    }

    #[test]
    fn one_lock_surface_per_output() {
        let mut state = TestState::new();
        let lock = requested_lock(&mut state);
        let output = state.output.clone();
        let first = state.create_surface();
        get_lock_surface(&mut state, &lock, &first, &output).unwrap();

        let second = state.create_surface();
        assert!(get_lock_surface(&mut state, &lock, &second, &output).is_none());
        assert_eq!(lock.client().protocol_error(), Some(ProtocolError::DuplicateOutput));
    }

    #[test]
    fn surfaces_of_an_old_lock_do_not_block_a_new_one() {
        let mut state = TestState::new();
        let output = Output::new("HDMI-A-1".into(), Rectangle::from_loc_and_size((0, 0), (800, 600)));
        let old_lock = requested_lock(&mut state);
        state.lockers.remove(0).lock();
        let old_surface = state.create_surface();
        get_lock_surface(&mut state, &old_lock, &old_surface, &output).unwrap();
        handle_session_lock_request(&mut state, &old_lock, SessionLockRequest::UnlockAndDestroy);

        let new_lock = requested_lock(&mut state);
        let new_surface = state.create_surface();
        let lock_surface = get_lock_surface(&mut state, &new_lock, &new_surface, &output).unwrap();
        assert_eq!(output.lock_surface(), Some(lock_surface));
    }

    #[test]
    fn lock_surface_for_a_dead_output_is_closed() {
        let mut state = TestState::new();
        let lock = requested_lock(&mut state);
        let output = Output::new("eDP-1".into(), Rectangle::from_loc_and_size((0, 0), (800, 600)));
        output.destroy();

        let surface = state.create_surface();
        let lock_surface = get_lock_surface(&mut state, &lock, &surface, &output).unwrap();
        assert!(lock_surface.is_closed());
        assert_eq!(
            surface.client().drain_events(),
            vec![Event::LockSurfaceClosed { surface: surface.id() }]
        );
    }
}
