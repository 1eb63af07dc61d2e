//! Outputs
//!
//! An [`Output`] is a region of the compositor space that layer surfaces and lock
//! surfaces are bound to. This crate does not advertise outputs to clients; it only
//! tracks what the roles need from them:
//!
//! - the geometry, whose size is offered to lock surfaces,
//! - the usable area, in output-local coordinates, that layer surfaces are arranged in
//!   (see [`LayerMap`](crate::desktop::LayerMap)),
//! - the lock surface currently covering it.
//!
//! ```
//! use shellwright::utils::Rectangle;
//! use shellwright::wayland::output::Output;
//!
//! let output = Output::new("DP-1".into(), Rectangle::from_loc_and_size((0, 0), (2560, 1440)));
//! assert_eq!(output.usable_area(), Rectangle::from_loc_and_size((0, 0), (2560, 1440)));
//!
//! // a compositor drawn panel takes away the top 32 pixels
//! let placements = output.set_usable_area(Rectangle::from_loc_and_size((0, 32), (2560, 1408)));
//! assert!(placements.is_empty());
//! ```

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use tracing::{debug, info};

use crate::desktop::{LayerMap, LayerPlacement};
use crate::utils::{ids::id_gen, AliveTracker, DeadResource, IsAlive, Logical, Rectangle};
use crate::wayland::{
    compositor::RoleSurface,
    error::ProtocolError,
    session_lock::{LockSurface, SessionLock},
    shell::wlr_layer::LayerSurface,
};

id_gen!(output_ids);

/// Unique identifier of an output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(u32);

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wl_output@{}", self.0)
    }
}

#[derive(Debug)]
struct Inner {
    id: OutputId,
    name: String,
    alive: AliveTracker,
    geometry: Mutex<Rectangle<i32, Logical>>,
    layers: Mutex<LayerMap>,
    lock_surface: Mutex<Option<LockSurface>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        output_ids::remove(self.id.0);
    }
}

/// An output as seen by the shell roles
#[derive(Debug, Clone)]
pub struct Output {
    inner: Arc<Inner>,
}

impl PartialEq for Output {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Output {}

impl Hash for Output {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl IsAlive for Output {
    #[inline]
    fn alive(&self) -> bool {
        self.inner.alive.alive()
    }
}

impl Output {
    /// Create a new output
    ///
    /// `geometry` is the position and size of the output in the compositor space. The
    /// usable area initially covers the whole output.
    pub fn new(name: String, geometry: Rectangle<i32, Logical>) -> Output {
        let id = OutputId(output_ids::next());
        info!(output = %id, %name, ?geometry, "Output created");
        Output {
            inner: Arc::new(Inner {
                id,
                name,
                alive: AliveTracker::default(),
                geometry: Mutex::new(geometry),
                layers: Mutex::new(LayerMap::new(local_area(geometry))),
                lock_surface: Mutex::new(None),
            }),
        }
    }

    /// Identifier of this output
    pub fn id(&self) -> OutputId {
        self.inner.id
    }

    /// Name of the output, e.g. the connector name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Position and size of the output in the compositor space
    pub fn geometry(&self) -> Rectangle<i32, Logical> {
        *self.inner.geometry.lock().unwrap()
    }

    /// The area layer surfaces are arranged in, in output-local coordinates
    pub fn usable_area(&self) -> Rectangle<i32, Logical> {
        self.layer_map().usable_area()
    }

    /// The area left for regular windows, in output-local coordinates
    pub fn non_exclusive_zone(&self) -> Rectangle<i32, Logical> {
        self.layer_map().non_exclusive_zone()
    }

    /// Create a weak reference to this output
    pub fn downgrade(&self) -> WeakOutput {
        WeakOutput {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The lock surface covering this output, if any
    pub fn lock_surface(&self) -> Option<LockSurface> {
        self.inner
            .lock_surface
            .lock()
            .unwrap()
            .clone()
            .filter(|surface| surface.alive())
    }

    /// Move or resize the output
    ///
    /// A size change resets the usable area to the whole output, re-arranges the layer
    /// surfaces and resizes the lock surface. Returns the layer placements that changed.
    pub fn set_geometry(&self, geometry: Rectangle<i32, Logical>) -> Vec<LayerPlacement> {
        let previous = std::mem::replace(&mut *self.inner.geometry.lock().unwrap(), geometry);
        if previous.size == geometry.size {
            return Vec::new();
        }
        debug!(output = %self.inner.id, ?geometry, "Output resized");

        let placements = self.layer_map().set_usable_area(local_area(geometry));
        if let Some(lock_surface) = self.lock_surface() {
            lock_surface.handle_resize(geometry.size);
        }
        placements
    }

    /// Change the area layer surfaces are arranged in
    ///
    /// Returns the layer placements that changed.
    pub fn set_usable_area(&self, area: Rectangle<i32, Logical>) -> Vec<LayerPlacement> {
        self.layer_map().set_usable_area(area)
    }

    /// The output went away
    ///
    /// Every layer surface on it is closed, the lock surface is told it will never be
    /// shown. Both ignore any further configure.
    pub fn destroy(&self) {
        if !self.inner.alive.destroy_notify() {
            return;
        }
        info!(output = %self.inner.id, "Output destroyed");

        let layers = self.layer_map().take_layers();
        for layer in layers {
            layer.send_close();
        }
        let lock_surface = self.inner.lock_surface.lock().unwrap().take();
        if let Some(lock_surface) = lock_surface {
            lock_surface.output_destroyed();
        }
    }

    pub(crate) fn layer_map(&self) -> MutexGuard<'_, LayerMap> {
        self.inner.layers.lock().unwrap()
    }

    pub(crate) fn map_layer(&self, layer: &LayerSurface) {
        if let Err(err) = self.layer_map().map_layer(layer) {
            debug!(output = %self.inner.id, %err, "Layer surface not mapped");
        }
    }

    pub(crate) fn unmap_layer(&self, layer: &LayerSurface) -> Vec<LayerPlacement> {
        self.layer_map().unmap_layer(layer)
    }

    pub(crate) fn arrange(&self) -> Vec<LayerPlacement> {
        self.layer_map().arrange()
    }

    // Only one lock surface per output and lock. Surfaces of a previous lock are
    // replaced.
    pub(crate) fn claim_lock_surface(&self, surface: &LockSurface, lock: &SessionLock) -> Result<(), ProtocolError> {
        let mut slot = self.inner.lock_surface.lock().unwrap();
        if let Some(existing) = slot.as_ref() {
            if existing.alive() && existing.session_lock() == lock {
                return Err(ProtocolError::DuplicateOutput);
            }
        }
        *slot = Some(surface.clone());
        Ok(())
    }

    pub(crate) fn release_lock_surface(&self, surface: &LockSurface) {
        let mut slot = self.inner.lock_surface.lock().unwrap();
        if slot.as_ref() == Some(surface) {
            *slot = None;
        }
    }
}

fn local_area(geometry: Rectangle<i32, Logical>) -> Rectangle<i32, Logical> {
    Rectangle::from_loc_and_size((0, 0), geometry.size)
}

/// Weak reference to an [`Output`]
#[derive(Debug, Clone)]
pub struct WeakOutput {
    inner: Weak<Inner>,
}

impl WeakOutput {
    /// Try to get the output back
    ///
    /// Fails once the output was destroyed.
    pub fn upgrade(&self) -> Result<Output, DeadResource> {
        self.inner
            .upgrade()
            .filter(|inner| inner.alive.alive())
            .map(|inner| Output { inner })
            .ok_or(DeadResource)
    }
}

impl PartialEq for WeakOutput {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}
