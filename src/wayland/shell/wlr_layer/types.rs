use std::convert::TryFrom;

use crate::wayland::error::ProtocolError;

/// Available layers for surfaces
///
/// These values indicate which layers a surface can be rendered in.
/// They are ordered by z depth, bottom-most first.
/// Traditional shell surfaces will typically be rendered between the bottom and top layers.
/// Fullscreen shell surfaces are typically rendered at the top layer.
/// Multiple surfaces can share a single layer, and ordering within a single layer is undefined.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    /// The lowest layer, used usualy for wallpapers
    #[default]
    Background,
    /// The layer bellow the windows and above the wallpaper
    Bottom,
    /// The layer above the windows and bellow overlay
    Top,
    /// The top layer above all other layers
    Overlay,
}

impl TryFrom<u32> for Layer {
    type Error = ProtocolError;

    fn try_from(layer: u32) -> Result<Self, Self::Error> {
        match layer {
            0 => Ok(Self::Background),
            1 => Ok(Self::Bottom),
            2 => Ok(Self::Top),
            3 => Ok(Self::Overlay),
            layer => Err(ProtocolError::InvalidLayer(layer)),
        }
    }
}

/// Types of keyboard interaction possible for a layer shell surface
///
/// The rationale for this is twofold:
/// - some applications are not interested in keyboard events
///   and not allowing them to be focused can improve the desktop experience
/// - some applications will want to take exclusive keyboard focus.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyboardInteractivity {
    /// This value indicates that this surface is not interested in keyboard events
    /// and the compositor should never assign it the keyboard focus.
    ///
    /// This is the default value, set for newly created layer shell surfaces.
    #[default]
    None,
    /// Request exclusive keyboard focus if this surface is above the shell surface layer.
    ///
    /// For the top and overlay layers, the seat will always give exclusive keyboard focus
    /// to the top-most layer which has keyboard interactivity set to exclusive.
    /// For the bottom and background layers, the compositor is allowed to use normal focus semantics.
    Exclusive,
    /// This requests the compositor to allow this surface
    /// to be focused and unfocused by the user in an implementation-defined manner.
    OnDemand,
}

impl TryFrom<u32> for KeyboardInteractivity {
    type Error = ProtocolError;

    fn try_from(ki: u32) -> Result<Self, Self::Error> {
        match ki {
            0 => Ok(Self::None),
            1 => Ok(Self::Exclusive),
            2 => Ok(Self::OnDemand),
            ki => Err(ProtocolError::InvalidKeyboardInteractivity(ki)),
        }
    }
}

bitflags::bitflags! {
    /// Anchor bitflags, describing how the layers surface should be positioned and sized
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Anchor: u32 {
        /// The top edge of the anchor rectangle
        const TOP = 1;
        /// The bottom edge of the anchor rectangle
        const BOTTOM = 2;
        /// The left edge of the anchor rectangle
        const LEFT = 4;
        /// The right edge of the anchor rectangle
        const RIGHT = 8;
    }
}

impl Anchor {
    /// Parse a raw anchor value, refusing unknown bits
    pub fn from_raw(raw: u32) -> Result<Anchor, ProtocolError> {
        Anchor::from_bits(raw).ok_or(ProtocolError::InvalidAnchor(raw))
    }

    /// Check if anchored horizontally
    ///
    /// If it is anchored to `left` and `right` anchor at the same time
    /// it returns `true`
    pub fn anchored_horizontally(&self) -> bool {
        self.contains(Self::LEFT) && self.contains(Self::RIGHT)
    }

    /// Check if anchored vertically
    ///
    /// If it is anchored to `top` and `bottom` anchor at the same time
    /// it returns `true`
    pub fn anchored_vertically(&self) -> bool {
        self.contains(Self::TOP) && self.contains(Self::BOTTOM)
    }

    /// The single edge an exclusive zone can be carved from
    ///
    /// That is the edge anchored without its opposite one, provided the other axis is
    /// either fully anchored or not anchored at all. Corners and ambiguous anchoring
    /// yield `None`.
    pub fn exclusive_edge(&self) -> Option<Anchor> {
        let horizontal = match (self.contains(Self::LEFT), self.contains(Self::RIGHT)) {
            (true, false) => Some(Self::LEFT),
            (false, true) => Some(Self::RIGHT),
            _ => None,
        };
        let vertical = match (self.contains(Self::TOP), self.contains(Self::BOTTOM)) {
            (true, false) => Some(Self::TOP),
            (false, true) => Some(Self::BOTTOM),
            _ => None,
        };

        match (horizontal, vertical) {
            (Some(edge), None) | (None, Some(edge)) => Some(edge),
            _ => None,
        }
    }

    /// Whether this is exactly one edge
    pub fn is_single_edge(&self) -> bool {
        self.bits().count_ones() == 1
    }
}

/// Exclusive zone descriptor
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExclusiveZone {
    /// Requests that the compositor avoids occluding an area with other surfaces.
    ///
    /// A exclusive zone value is the distance from the edge in surface-local coordinates to consider exclusive.
    ///
    /// A exclusive value is only meaningful if the surface is
    /// anchored to one edge or an edge and both perpendicular edges.
    ///
    /// If the surface is:
    /// - not anchored
    /// - anchored to only two perpendicular edges (a corner),
    /// - anchored to only two parallel edges or anchored to all edges,
    ///
    /// The exclusive value should be treated the same as [`ExclusiveZone::Neutral`],
    /// unless an exclusive edge was set.
    Exclusive(u32),
    /// If set to Neutral,
    /// the surface indicates that it would like to be moved to avoid occluding surfaces with a exclusive zone.
    #[default]
    Neutral,
    /// If set to DontCare,
    /// the surface indicates that it would not like to be moved to accommodate for other surfaces,
    /// and the compositor should extend it all the way to the edges it is anchored to.
    DontCare,
}

impl From<i32> for ExclusiveZone {
    fn from(v: i32) -> Self {
        match v {
            v if v > 0 => Self::Exclusive(v as u32),
            -1 => Self::DontCare,
            _ => Self::Neutral,
        }
    }
}

impl From<ExclusiveZone> for i32 {
    fn from(z: ExclusiveZone) -> i32 {
        match z {
            ExclusiveZone::Exclusive(v) => v as i32,
            ExclusiveZone::Neutral => 0,
            ExclusiveZone::DontCare => -1,
        }
    }
}

/// Describes distance from the anchor point of the output, in surface-local coordinates.
///
/// If surface did not anchor curtain edge, margin for that edge should be ignored.
///
/// The exclusive zone should includes the margins.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Margins {
    /// Distance from [`Anchor::TOP`]
    pub top: i32,
    /// Distance from [`Anchor::RIGHT`]
    pub right: i32,
    /// Distance from [`Anchor::BOTTOM`]
    pub bottom: i32,
    /// Distance from [`Anchor::LEFT`]
    pub left: i32,
}

impl Margins {
    /// Sum of the margins on the anchored horizontal edges, saturating at the `i32` bounds
    pub fn horizontal(&self, anchor: Anchor) -> i32 {
        let left = if anchor.contains(Anchor::LEFT) { self.left } else { 0 };
        let right = if anchor.contains(Anchor::RIGHT) { self.right } else { 0 };
        left.saturating_add(right)
    }

    /// Sum of the margins on the anchored vertical edges, saturating at the `i32` bounds
    pub fn vertical(&self, anchor: Anchor) -> i32 {
        let top = if anchor.contains(Anchor::TOP) { self.top } else { 0 };
        let bottom = if anchor.contains(Anchor::BOTTOM) { self.bottom } else { 0 };
        top.saturating_add(bottom)
    }

    /// Margin of a single edge
    pub fn on_edge(&self, edge: Anchor) -> i32 {
        if edge == Anchor::TOP {
            self.top
        } else if edge == Anchor::BOTTOM {
            self.bottom
        } else if edge == Anchor::LEFT {
            self.left
        } else if edge == Anchor::RIGHT {
            self.right
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_values_map_to_descriptors() {
        assert_eq!(ExclusiveZone::from(50), ExclusiveZone::Exclusive(50));
        assert_eq!(ExclusiveZone::from(0), ExclusiveZone::Neutral);
        assert_eq!(ExclusiveZone::from(-1), ExclusiveZone::DontCare);
        assert_eq!(ExclusiveZone::from(-7), ExclusiveZone::Neutral);
        assert_eq!(i32::from(ExclusiveZone::DontCare), -1);
    }

    #[test]
    fn unknown_values_are_refused() {
        assert_eq!(Anchor::from_raw(16), Err(ProtocolError::InvalidAnchor(16)));
        assert_eq!(Layer::try_from(4u32), Err(ProtocolError::InvalidLayer(4)));
        assert_eq!(
            KeyboardInteractivity::try_from(3u32),
            Err(ProtocolError::InvalidKeyboardInteractivity(3))
        );
        assert_eq!(Layer::try_from(2u32), Ok(Layer::Top));
    }

    #[test]
    fn exclusive_edge_needs_unambiguous_anchoring() {
        assert_eq!(Anchor::TOP.exclusive_edge(), Some(Anchor::TOP));
        assert_eq!(
            (Anchor::TOP | Anchor::LEFT | Anchor::RIGHT).exclusive_edge(),
            Some(Anchor::TOP)
        );
        assert_eq!((Anchor::TOP | Anchor::LEFT).exclusive_edge(), None);
        assert_eq!((Anchor::TOP | Anchor::BOTTOM).exclusive_edge(), None);
        assert_eq!(Anchor::all().exclusive_edge(), None);
        assert_eq!(Anchor::empty().exclusive_edge(), None);
    }
}
