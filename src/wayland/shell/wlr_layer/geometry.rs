//! Placement of layer surfaces on their output
//!
//! Each axis of a layer surface is either *stretched*, when both of its edges are
//! anchored, or *fixed*. A stretched axis spans the available area minus the margins of
//! its anchored edges and ignores the size requested by the client; a fixed axis uses the
//! requested size, which the client therefore has to provide.
//!
//! A positive exclusive zone claims a strip along a single edge of the available area.
//! The strip is as thick as the zone plus the margin of that edge, and spans the whole
//! available area along the edge.
//!
//! Sizes, margins and zones are client supplied and may be anywhere in the `i32` range.
//! All arithmetic saturates, and an exclusion strip never reaches beyond the available
//! area.

use crate::utils::{Logical, Point, Rectangle, Size};
use crate::wayland::error::{Interface, ProtocolError};

use super::{Anchor, ExclusiveZone, LayerSurfaceCachedState};

/// The outcome of placing a layer surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerGeometry {
    /// Location and size of the surface, in output coordinates
    pub geometry: Rectangle<i32, Logical>,
    /// Size offered to the client in the configure
    pub offered_size: Size<i32, Logical>,
    /// Area claimed by the exclusive zone, in output coordinates
    pub exclusion: Option<Rectangle<i32, Logical>>,
}

/// Check that every axis without an explicit size is stretched
pub fn validate_size(state: &LayerSurfaceCachedState) -> Result<(), ProtocolError> {
    if state.size.w == 0 && !state.anchor.anchored_horizontally() {
        return Err(ProtocolError::InvalidSize {
            interface: Interface::LayerSurface,
            message: "width 0 requested without setting left and right anchors".into(),
        });
    }
    if state.size.h == 0 && !state.anchor.anchored_vertically() {
        return Err(ProtocolError::InvalidSize {
            interface: Interface::LayerSurface,
            message: "height 0 requested without setting top and bottom anchors".into(),
        });
    }
    Ok(())
}

/// Check that an explicitly chosen exclusive edge is anchored
pub fn validate_exclusive_edge(state: &LayerSurfaceCachedState) -> Result<(), ProtocolError> {
    match state.exclusive_edge {
        Some(edge) if !state.anchor.contains(edge) => Err(ProtocolError::InvalidExclusiveEdge),
        _ => Ok(()),
    }
}

/// The edge the exclusive zone of a surface is carved from, if any
pub fn exclusive_edge(state: &LayerSurfaceCachedState) -> Option<Anchor> {
    match state.exclusive_edge {
        Some(edge) if state.anchor.contains(edge) => Some(edge),
        _ => state.anchor.exclusive_edge(),
    }
}

/// The offset of the surface content from its anchor point
///
/// Only margins of anchored left and top edges move the content.
pub fn anchor_offset(state: &LayerSurfaceCachedState) -> Point<i32, Logical> {
    let x = if state.anchor.contains(Anchor::LEFT) {
        state.margin.left
    } else {
        0
    };
    let y = if state.anchor.contains(Anchor::TOP) {
        state.margin.top
    } else {
        0
    };
    (x, y).into()
}

/// Place a surface into `area`
///
/// `area` is what the surfaces placed before left of the output. Surfaces opting out of
/// exclusion accounting should be given the full usable area instead.
pub fn compute(state: &LayerSurfaceCachedState, area: Rectangle<i32, Logical>) -> LayerGeometry {
    let anchor = state.anchor;
    let margin = state.margin;

    let mut size = state.size;
    if anchor.anchored_horizontally() {
        size.w = area.size.w.saturating_sub(margin.horizontal(anchor)).max(0);
    }
    if anchor.anchored_vertically() {
        size.h = area.size.h.saturating_sub(margin.vertical(anchor)).max(0);
    }

    let x = if anchor.contains(Anchor::LEFT) {
        area.loc.x.saturating_add(margin.left)
    } else if anchor.contains(Anchor::RIGHT) {
        area.loc
            .x
            .saturating_add(area.size.w)
            .saturating_sub(size.w)
            .saturating_sub(margin.right)
    } else {
        area.loc.x.saturating_add(area.size.w.saturating_sub(size.w) / 2)
    };
    let y = if anchor.contains(Anchor::TOP) {
        area.loc.y.saturating_add(margin.top)
    } else if anchor.contains(Anchor::BOTTOM) {
        area.loc
            .y
            .saturating_add(area.size.h)
            .saturating_sub(size.h)
            .saturating_sub(margin.bottom)
    } else {
        area.loc.y.saturating_add(area.size.h.saturating_sub(size.h) / 2)
    };

    LayerGeometry {
        geometry: Rectangle::from_loc_and_size((x, y), size),
        offered_size: size,
        exclusion: exclusion(state, area),
    }
}

/// The strip of `area` claimed by the exclusive zone of the surface
///
/// Only a single edge can be claimed. When the anchors do not single one out, e.g. for a
/// surface anchored to both the top and the bottom edge, no strip is claimed unless the
/// client picked one of the anchored edges with `set_exclusive_edge`.
///
/// A zone whose thickness, margin included, is not positive claims nothing.
pub fn exclusion(state: &LayerSurfaceCachedState, area: Rectangle<i32, Logical>) -> Option<Rectangle<i32, Logical>> {
    let amount = match state.exclusive_zone {
        ExclusiveZone::Exclusive(amount) => i32::try_from(amount).unwrap_or(i32::MAX),
        ExclusiveZone::Neutral | ExclusiveZone::DontCare => return None,
    };
    let edge = exclusive_edge(state)?;
    let thickness = amount.saturating_add(state.margin.on_edge(edge));
    if thickness <= 0 {
        return None;
    }

    let rect = if edge == Anchor::TOP || edge == Anchor::BOTTOM {
        let thickness = thickness.min(area.size.h.max(0));
        let y = if edge == Anchor::TOP {
            area.loc.y
        } else {
            area.loc.y.saturating_add(area.size.h).saturating_sub(thickness)
        };
        Rectangle::from_loc_and_size((area.loc.x, y), (area.size.w, thickness))
    } else {
        let thickness = thickness.min(area.size.w.max(0));
        let x = if edge == Anchor::LEFT {
            area.loc.x
        } else {
            area.loc.x.saturating_add(area.size.w).saturating_sub(thickness)
        };
        Rectangle::from_loc_and_size((x, area.loc.y), (thickness, area.size.h))
    };
    Some(rect)
}

/// Remove an exclusion strip from the area left for the following surfaces
pub fn shrink_zone(zone: Rectangle<i32, Logical>, exclusion: Rectangle<i32, Logical>) -> Rectangle<i32, Logical> {
    let mut zone = zone;
    let full_width = exclusion.size.w == zone.size.w && exclusion.loc.x == zone.loc.x;
    let full_height = exclusion.size.h == zone.size.h && exclusion.loc.y == zone.loc.y;

    if full_width && exclusion.loc.y == zone.loc.y {
        // top strip
        let h = exclusion.size.h.min(zone.size.h);
        zone.loc.y += h;
        zone.size.h -= h;
    } else if full_width {
        zone.size.h = (zone.size.h - exclusion.size.h).max(0);
    } else if full_height && exclusion.loc.x == zone.loc.x {
        let w = exclusion.size.w.min(zone.size.w);
        zone.loc.x += w;
        zone.size.w -= w;
    } else if full_height {
        zone.size.w = (zone.size.w - exclusion.size.w).max(0);
    }
    zone
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wayland::shell::wlr_layer::Margins;
    use proptest::prelude::*;

    fn output() -> Rectangle<i32, Logical> {
        Rectangle::from_loc_and_size((0, 0), (1920, 1000))
    }

    fn state(anchor: Anchor, size: (i32, i32)) -> LayerSurfaceCachedState {
        LayerSurfaceCachedState {
            anchor,
            size: size.into(),
            ..Default::default()
        }
    }

    #[test]
    fn fixed_axes_need_an_explicit_size() {
        let top_only = state(Anchor::TOP, (100, 0));
        assert!(matches!(
            validate_size(&top_only),
            Err(ProtocolError::InvalidSize {
                interface: Interface::LayerSurface,
                ..
            })
        ));

        let mut stretched = state(Anchor::TOP | Anchor::BOTTOM, (100, 0));
        stretched.margin = Margins {
            top: 10,
            bottom: 5,
            ..Default::default()
        };
        assert!(validate_size(&stretched).is_ok());
        let placed = compute(&stretched, output());
        assert_eq!(placed.offered_size, (100, 985).into());
        assert_eq!(placed.geometry.loc, (910, 10).into());
    }

    #[test]
    fn stretched_axes_ignore_the_requested_size() {
        let bar = state(Anchor::LEFT | Anchor::RIGHT | Anchor::TOP, (300, 30));
        let placed = compute(&bar, output());
        assert_eq!(placed.geometry, Rectangle::from_loc_and_size((0, 0), (1920, 30)));
    }

    #[test]
    fn exclusive_zone_includes_the_edge_margin() {
        let mut panel = state(Anchor::all(), (0, 0));
        panel.margin = Margins {
            top: 10,
            bottom: 5,
            ..Default::default()
        };
        panel.exclusive_zone = ExclusiveZone::Exclusive(50);
        panel.exclusive_edge = Some(Anchor::TOP);

        let placed = compute(&panel, output());
        assert_eq!(placed.offered_size.h, 985);
        assert_eq!(
            placed.exclusion,
            Some(Rectangle::from_loc_and_size((0, 0), (1920, 60)))
        );

        panel.exclusive_zone = ExclusiveZone::from(-1);
        assert_eq!(compute(&panel, output()).exclusion, None);
        panel.exclusive_zone = ExclusiveZone::from(0);
        assert_eq!(compute(&panel, output()).exclusion, None);
    }

    #[test]
    fn ambiguous_anchoring_claims_nothing() {
        let mut corner = state(Anchor::TOP | Anchor::LEFT, (100, 100));
        corner.exclusive_zone = ExclusiveZone::Exclusive(20);
        assert_eq!(compute(&corner, output()).exclusion, None);

        corner.exclusive_edge = Some(Anchor::LEFT);
        assert_eq!(
            compute(&corner, output()).exclusion,
            Some(Rectangle::from_loc_and_size((0, 0), (20, 1000)))
        );
    }

    #[test]
    fn exclusive_edge_must_be_anchored() {
        let mut panel = state(Anchor::TOP, (100, 30));
        panel.exclusive_edge = Some(Anchor::BOTTOM);
        assert_eq!(
            validate_exclusive_edge(&panel),
            Err(ProtocolError::InvalidExclusiveEdge)
        );
    }

    #[test]
    fn zones_shrink_from_their_edge() {
        let zone = output();
        let bottom = Rectangle::from_loc_and_size((0, 960), (1920, 40));
        assert_eq!(
            shrink_zone(zone, bottom),
            Rectangle::from_loc_and_size((0, 0), (1920, 960))
        );
        let left = Rectangle::from_loc_and_size((0, 0), (64, 1000));
        assert_eq!(
            shrink_zone(zone, left),
            Rectangle::from_loc_and_size((64, 0), (1856, 1000))
        );
    }

    #[test]
    fn margin_offset_only_counts_anchored_edges() {
        let mut panel = state(Anchor::BOTTOM | Anchor::RIGHT, (10, 10));
        panel.margin = Margins {
            top: 1,
            right: 2,
            bottom: 3,
            left: 4,
        };
        assert_eq!(anchor_offset(&panel), (0, 0).into());
        panel.anchor = Anchor::TOP | Anchor::LEFT;
        assert_eq!(anchor_offset(&panel), (4, 1).into());
    }

    #[test]
    fn huge_zone_is_clamped_to_the_area() {
        let mut panel = state(Anchor::TOP, (100, 30));
        panel.margin.top = 10;
        panel.exclusive_zone = ExclusiveZone::from(i32::MAX);

        let placed = compute(&panel, output());
        assert_eq!(
            placed.exclusion,
            Some(Rectangle::from_loc_and_size((0, 0), (1920, 1000)))
        );
        assert_eq!(placed.geometry.loc, (910, 10).into());
    }

    #[test]
    fn huge_margins_saturate() {
        let mut panel = state(Anchor::all(), (0, 0));
        panel.margin = Margins {
            top: i32::MIN,
            right: i32::MAX,
            bottom: i32::MIN,
            left: i32::MAX,
        };
        let placed = compute(&panel, output());
        assert_eq!(placed.offered_size, (0, i32::MAX).into());
        assert_eq!(placed.geometry.loc, (i32::MAX, i32::MIN).into());
    }

    #[test]
    fn non_positive_thickness_claims_nothing() {
        let mut panel = state(Anchor::BOTTOM, (100, 30));
        panel.margin.bottom = -40;
        panel.exclusive_zone = ExclusiveZone::Exclusive(30);
        assert_eq!(compute(&panel, output()).exclusion, None);
    }

    fn anchors() -> impl Strategy<Value = Anchor> {
        (0u32..16).prop_map(Anchor::from_bits_truncate)
    }

    proptest! {
        #[test]
        fn exclusions_stay_inside_the_area(
            anchor in anchors(),
            w in 0i32..=i32::MAX,
            h in 0i32..=i32::MAX,
            top in any::<i32>(),
            right in any::<i32>(),
            bottom in any::<i32>(),
            left in any::<i32>(),
            zone in any::<i32>(),
            edge in anchors(),
        ) {
            let mut surface = state(anchor, (w, h));
            surface.margin = Margins { top, right, bottom, left };
            surface.exclusive_zone = ExclusiveZone::from(zone);
            surface.exclusive_edge = Some(edge).filter(|edge| edge.is_single_edge());

            let area = Rectangle::from_loc_and_size((0, 0), (1920, 1000));
            let placed = compute(&surface, area);
            prop_assert!(placed.offered_size.w >= 0 && placed.offered_size.h >= 0);
            if let Some(exclusion) = placed.exclusion {
                prop_assert!(area.contains_rect(exclusion));
                let remaining = shrink_zone(area, exclusion);
                prop_assert!(area.contains_rect(remaining));
            }
        }
    }
}
