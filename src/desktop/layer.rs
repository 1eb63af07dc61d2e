use std::sync::MutexGuard;

use indexmap::IndexSet;
use tracing::{debug, trace};

use crate::{
    utils::{IsAlive, Logical, Point, Rectangle},
    wayland::{
        compositor::{RoleSurface, Surface},
        output::Output,
        shell::wlr_layer::{self, ExclusiveZone, Layer, LayerGeometry, LayerSurface},
    },
};

/// Map of [`LayerSurface`]s on an [`Output`]
///
/// Surfaces are arranged in the order they were mapped. Each one is placed into the
/// area left over by the exclusive zones of the surfaces before it, so a surface never
/// has to make room for its own zone.
#[derive(Debug)]
pub struct LayerMap {
    layers: IndexSet<LayerSurface>,
    usable_area: Rectangle<i32, Logical>,
    zone: Rectangle<i32, Logical>,
}

/// A new placement computed for a layer surface during an arrangement
#[derive(Debug, Clone, PartialEq)]
pub struct LayerPlacement {
    /// The surface that moved
    pub layer: LayerSurface,
    /// Where it is now
    pub geometry: LayerGeometry,
}

/// Retrieve the [`LayerMap`] of a given [`Output`].
///
/// Note: The map is guarded by a [`Mutex`](std::sync::Mutex) per output. Trying to hold
/// on to multiple guards of the same output *will* deadlock.
pub fn layer_map_for_output(output: &Output) -> MutexGuard<'_, LayerMap> {
    output.layer_map()
}

/// Errors of [`LayerMap::map_layer`]
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    /// The surface is already part of this map
    #[error("Layer is already mapped")]
    AlreadyMapped,
}

impl LayerMap {
    pub(crate) fn new(usable_area: Rectangle<i32, Logical>) -> LayerMap {
        LayerMap {
            layers: IndexSet::new(),
            usable_area,
            zone: usable_area,
        }
    }

    /// Map a [`LayerSurface`] to this [`LayerMap`].
    ///
    /// The surface is placed on its first commit.
    pub fn map_layer(&mut self, layer: &LayerSurface) -> Result<(), LayerError> {
        if !self.layers.insert(layer.clone()) {
            return Err(LayerError::AlreadyMapped);
        }
        trace!(namespace = layer.namespace(), "Layer surface mapped");
        Ok(())
    }

    /// Remove a [`LayerSurface`] from this [`LayerMap`].
    ///
    /// Returns the placements of the remaining surfaces that changed as a result.
    pub fn unmap_layer(&mut self, layer: &LayerSurface) -> Vec<LayerPlacement> {
        if self.layers.shift_remove(layer) {
            trace!(namespace = layer.namespace(), "Layer surface unmapped");
            self.arrange()
        } else {
            Vec::new()
        }
    }

    /// Return the area of this output, that is not exclusive to any [`LayerSurface`]s.
    pub fn non_exclusive_zone(&self) -> Rectangle<i32, Logical> {
        self.zone
    }

    /// The area layer surfaces are arranged in
    pub fn usable_area(&self) -> Rectangle<i32, Logical> {
        self.usable_area
    }

    /// Returns the geometry of a given mapped [`LayerSurface`].
    ///
    /// If the surface was not previously mapped onto this layer map,
    /// or was not placed yet, this function return `None`.
    pub fn layer_geometry(&self, layer: &LayerSurface) -> Option<Rectangle<i32, Logical>> {
        if !self.layers.contains(layer) {
            return None;
        }
        layer.geometry()
    }

    /// Returns a [`LayerSurface`] under a given point and on a given layer, if any.
    pub fn layer_under<P: Into<Point<i32, Logical>>>(&self, layer: Layer, point: P) -> Option<&LayerSurface> {
        let point = point.into();
        self.layers_on(layer).rev().find(|l| {
            self.layer_geometry(l)
                .map(|geometry| geometry.contains(point))
                .unwrap_or(false)
        })
    }

    /// Iterator over all [`LayerSurface`]s currently mapped.
    pub fn layers(&self) -> impl DoubleEndedIterator<Item = &LayerSurface> {
        self.layers.iter()
    }

    /// Iterator over all [`LayerSurface`]s currently mapped on a given layer.
    pub fn layers_on(&self, layer: Layer) -> impl DoubleEndedIterator<Item = &LayerSurface> {
        self.layers.iter().filter(move |l| l.layer() == layer)
    }

    /// Returns the [`LayerSurface`] matching a given [`Surface`], if any.
    pub fn layer_for_surface(&self, surface: &Surface) -> Option<&LayerSurface> {
        if !surface.alive() {
            return None;
        }
        self.layers
            .iter()
            .find(|l| l.wl_surface().as_ref() == Some(surface))
    }

    /// Force re-arranging the layer surfaces, e.g. when the usable area changes.
    ///
    /// Every surface whose placement changed is configured. Returns those placements.
    ///
    /// Note: Unmapping a layer surface, or committing a change to its size, anchors,
    /// margins or exclusive zone, automatically causes a re-arrangement.
    #[profiling::function]
    pub fn arrange(&mut self) -> Vec<LayerPlacement> {
        let area = self.usable_area;
        let mut zone = area;
        let mut changed = Vec::new();
        trace!(?area, layers = self.layers.len(), "Arranging layers");

        for layer in self.layers.iter() {
            let Some(state) = layer.arrangeable_state() else {
                continue;
            };

            let source = match state.exclusive_zone {
                ExclusiveZone::Neutral | ExclusiveZone::Exclusive(_) => zone,
                ExclusiveZone::DontCare => area,
            };
            let placement = wlr_layer::compute(&state, source);
            if let Some(exclusion) = placement.exclusion {
                zone = wlr_layer::shrink_zone(zone, exclusion);
            }

            if layer.apply_placement(placement) {
                debug!(
                    namespace = layer.namespace(),
                    geometry = ?placement.geometry,
                    exclusion = ?placement.exclusion,
                    "Layer surface placed"
                );
                changed.push(LayerPlacement {
                    layer: layer.clone(),
                    geometry: placement,
                });
            }
        }

        trace!(?zone, "Remaining zone");
        self.zone = zone;
        changed
    }

    /// Change the area the surfaces are arranged in and re-arrange them
    pub(crate) fn set_usable_area(&mut self, area: Rectangle<i32, Logical>) -> Vec<LayerPlacement> {
        if self.usable_area == area {
            return Vec::new();
        }
        self.usable_area = area;
        self.arrange()
    }

    // Empty the map, leaving the surfaces where they are.
    pub(crate) fn take_layers(&mut self) -> Vec<LayerSurface> {
        self.zone = self.usable_area;
        self.layers.drain(..).collect()
    }

    /// Drop destroyed surfaces from the map, re-arranging if any was found.
    pub fn cleanup(&mut self) -> Vec<LayerPlacement> {
        if self.layers.iter().any(|l| !l.alive()) {
            self.layers.retain(|layer| layer.alive());
            self.arrange()
        } else {
            Vec::new()
        }
    }

    /// Returns layers count
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.layers.len()
    }
}
