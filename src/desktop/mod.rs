//! Helpers sitting between the protocol state and the compositor policy
//!
//! - [`LayerMap`] arranges the layer surfaces of an output and tracks the area left
//!   for regular windows.

mod layer;

pub use self::layer::{layer_map_for_output, LayerError, LayerMap, LayerPlacement};
