//! Utilities for handling surfaces
//!
//! This module tracks the abstract drawable surfaces of the clients and the role
//! attached to each of them.
//!
//! ## Why use this implementation
//!
//! This implementation does a simple job: it keeps a handle for every surface created
//! by the clients, enforces that each surface is given a role at most once, and routes
//! `wl_surface.commit` to the role of the surface, so that all its double-buffered state
//! is applied at once.
//!
//! All the logic regarding buffers and drawing is out of its scope; the compositor is
//! notified through [`CompositorHandler::commit`] once the role has processed a commit.
//!
//! ## How to use it
//!
//! ```
//! use shellwright::wayland::compositor::{CompositorConfig, CompositorState};
//! use shellwright::wayland::Client;
//!
//! let mut compositor_state = CompositorState::new(CompositorConfig::default());
//!
//! let client = Client::new();
//! let surface = compositor_state.create_surface(&client);
//! assert!(shellwright::wayland::compositor::lookup(&surface).is_none());
//! ```
//!
//! Surface requests decoded by the transport are fed to [`handle_surface_request`].
//!
//! ### Destroying a surface before its role
//!
//! The protocols require a role object to be destroyed before its surface. Some real
//! world clients get this wrong. Which roles are let off with a warning is decided by
//! [`CompositorConfig::tolerate_early_surface_destroy`]; for every other role the client
//! is disconnected with [`ProtocolError::DefunctRoleObject`](super::ProtocolError::DefunctRoleObject).

use std::{
    fmt,
    sync::{Arc, Mutex, Weak},
};

use crate::utils::{ids::id_gen, AliveTracker, DeadResource, IsAlive};

use super::Client;

mod cache;
mod handlers;
mod roles;

pub use self::cache::DoubleBuffered;
pub use self::handlers::{handle_surface_request, SurfaceRequest};
pub use self::roles::{assign_role, lookup, role_kind, AlreadyHasRole, Role, RoleKind, RoleKinds, RoleSurface};
pub(crate) use self::roles::{detach_role, ensure_no_role};

id_gen!(surface_ids);

/// Unique identifier of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u32);

impl SurfaceId {
    /// Raw value of the identifier
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wl_surface@{}", self.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct RoleSlot {
    kind: Option<RoleKind>,
    role: Option<Role>,
}

#[derive(Debug)]
pub(crate) struct SurfaceInner {
    id: SurfaceId,
    client: Client,
    alive: AliveTracker,
    role: Mutex<RoleSlot>,
}

impl Drop for SurfaceInner {
    fn drop(&mut self) {
        surface_ids::remove(self.id.0);
    }
}

/// Handle to a client surface
#[derive(Debug, Clone)]
pub struct Surface {
    pub(crate) inner: Arc<SurfaceInner>,
}

impl PartialEq for Surface {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Surface {}

impl std::hash::Hash for Surface {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl IsAlive for Surface {
    #[inline]
    fn alive(&self) -> bool {
        self.inner.alive.alive()
    }
}

impl Surface {
    /// Identifier of the surface
    pub fn id(&self) -> SurfaceId {
        self.inner.id
    }

    /// Client owning this surface
    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// The role object attached to this surface
    pub fn role(&self) -> Option<Role> {
        lookup(self)
    }

    /// Create a weak reference to this surface
    pub fn downgrade(&self) -> WeakSurface {
        WeakSurface {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Weak reference to a [`Surface`]
///
/// Upgrading fails once the surface was destroyed, even if other handles still exist.
#[derive(Debug, Clone)]
pub struct WeakSurface {
    id: SurfaceId,
    inner: Weak<SurfaceInner>,
}

impl WeakSurface {
    /// Identifier of the referenced surface
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Try to get the surface back
    pub fn upgrade(&self) -> Result<Surface, DeadResource> {
        self.inner
            .upgrade()
            .filter(|inner| inner.alive.alive())
            .map(|inner| Surface { inner })
            .ok_or(DeadResource)
    }
}

impl PartialEq for WeakSurface {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

/// Runtime configuration of the surface handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositorConfig {
    /// Roles for which destroying the surface before the role object is tolerated
    ///
    /// For these roles the irregularity is logged at the warning level and the role
    /// stops affecting the rest of the session. For all other roles the client is
    /// disconnected with a protocol error.
    pub tolerate_early_surface_destroy: RoleKinds,
}

impl Default for CompositorConfig {
    /// Tolerates layer surfaces only, on-screen keyboards are known to destroy their
    /// surface first.
    fn default() -> Self {
        CompositorConfig {
            tolerate_early_surface_destroy: RoleKinds::LAYER_SURFACE,
        }
    }
}

impl CompositorConfig {
    /// A configuration tolerating no protocol irregularity
    pub fn strict() -> Self {
        CompositorConfig {
            tolerate_early_surface_destroy: RoleKinds::empty(),
        }
    }
}

/// State of the surface handling
#[derive(Debug)]
pub struct CompositorState {
    config: CompositorConfig,
    surfaces: Vec<Surface>,
}

impl CompositorState {
    /// Create a new state with the given configuration
    pub fn new(config: CompositorConfig) -> Self {
        CompositorState {
            config,
            surfaces: Vec::new(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Create a new surface for a client
    pub fn create_surface(&mut self, client: &Client) -> Surface {
        let surface = Surface {
            inner: Arc::new(SurfaceInner {
                id: SurfaceId(surface_ids::next()),
                client: client.clone(),
                alive: AliveTracker::default(),
                role: Mutex::new(RoleSlot::default()),
            }),
        };
        tracing::trace!(surface = %surface.id(), client = %client.id(), "New surface");
        self.surfaces.push(surface.clone());
        surface
    }

    /// Iterate over all alive surfaces
    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.iter()
    }

    pub(crate) fn remove_surface(&mut self, surface: &Surface) {
        self.surfaces.retain(|s| s != surface);
    }
}

/// Handler for surface events
pub trait CompositorHandler {
    /// [`CompositorState`] getter
    fn compositor_state(&mut self) -> &mut CompositorState;

    /// The surface was committed and its role has applied the new state
    ///
    /// This is where the buffer pipeline picks up the surface content.
    fn commit(&mut self, surface: &Surface) {
        let _ = surface;
    }

    /// The surface was destroyed
    fn destroyed(&mut self, surface: &Surface) {
        let _ = surface;
    }
}
