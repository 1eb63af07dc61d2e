//! Popup placement
//!
//! A [`Positioner`] is the client-side blueprint describing where a popup goes relative
//! to an anchor rectangle on its parent. Once both the popup size and the anchor
//! rectangle are known it can be turned into an immutable [`PositionerState`], which is
//! what popups are created and repositioned with.
//!
//! [`PositionerState::get_geometry`] computes the raw placement, and
//! [`PositionerState::get_unconstrained_geometry`] fits it into a target rectangle by
//! applying the allowed constraint adjustments in the order mandated by `xdg_shell`:
//! flip, then slide, then resize.

use bitflags::bitflags;

use crate::utils::{Logical, Point, Rectangle, Serial, Size};
use crate::wayland::error::{Interface, ProtocolError};

macro_rules! edge_enum {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            /// Centered on both axes
            #[default]
            None,
            /// Top edge, centered horizontally
            Top,
            /// Bottom edge, centered horizontally
            Bottom,
            /// Left edge, centered vertically
            Left,
            /// Right edge, centered vertically
            Right,
            /// Top left corner
            TopLeft,
            /// Bottom left corner
            BottomLeft,
            /// Top right corner
            TopRight,
            /// Bottom right corner
            BottomRight,
        }

        impl TryFrom<u32> for $name {
            type Error = ProtocolError;

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                Ok(match value {
                    0 => $name::None,
                    1 => $name::Top,
                    2 => $name::Bottom,
                    3 => $name::Left,
                    4 => $name::Right,
                    5 => $name::TopLeft,
                    6 => $name::BottomLeft,
                    7 => $name::TopRight,
                    8 => $name::BottomRight,
                    _ => {
                        return Err(ProtocolError::InvalidPositionerInput(format!(
                            "invalid {} {}",
                            stringify!($name).to_lowercase(),
                            value
                        )))
                    }
                })
            }
        }

        impl $name {
            fn has_top(self) -> bool {
                matches!(self, $name::Top | $name::TopLeft | $name::TopRight)
            }

            fn has_bottom(self) -> bool {
                matches!(self, $name::Bottom | $name::BottomLeft | $name::BottomRight)
            }

            fn has_left(self) -> bool {
                matches!(self, $name::Left | $name::TopLeft | $name::BottomLeft)
            }

            fn has_right(self) -> bool {
                matches!(self, $name::Right | $name::TopRight | $name::BottomRight)
            }

            fn invert_x(self) -> Self {
                match self {
                    $name::Left => $name::Right,
                    $name::Right => $name::Left,
                    $name::TopLeft => $name::TopRight,
                    $name::TopRight => $name::TopLeft,
                    $name::BottomLeft => $name::BottomRight,
                    $name::BottomRight => $name::BottomLeft,
                    x => x,
                }
            }

            fn invert_y(self) -> Self {
                match self {
                    $name::Top => $name::Bottom,
                    $name::Bottom => $name::Top,
                    $name::TopLeft => $name::BottomLeft,
                    $name::TopRight => $name::BottomRight,
                    $name::BottomLeft => $name::TopLeft,
                    $name::BottomRight => $name::TopRight,
                    x => x,
                }
            }
        }
    };
}

edge_enum!(
    /// Edge or corner of the anchor rectangle the popup is attached to
    Anchor
);
edge_enum!(
    /// Direction the popup extends to from the anchor point
    Gravity
);

bitflags! {
    /// Adjustments allowed when the popup would be constrained
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ConstraintAdjustment: u32 {
        /// Move the popup horizontally until it is no longer constrained
        const SLIDE_X = 1;
        /// Move the popup vertically until it is no longer constrained
        const SLIDE_Y = 2;
        /// Mirror anchor and gravity horizontally
        const FLIP_X = 4;
        /// Mirror anchor and gravity vertically
        const FLIP_Y = 8;
        /// Shrink the popup horizontally
        const RESIZE_X = 16;
        /// Shrink the popup vertically
        const RESIZE_Y = 32;
    }
}

/// The client-side positioner object, as built by `xdg_positioner` requests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Positioner {
    rect_size: Option<Size<i32, Logical>>,
    anchor_rect: Option<Rectangle<i32, Logical>>,
    anchor_edges: Anchor,
    gravity: Gravity,
    constraint_adjustment: ConstraintAdjustment,
    offset: Point<i32, Logical>,
    reactive: bool,
    parent_size: Option<Size<i32, Logical>>,
    parent_configure: Option<Serial>,
}

impl Positioner {
    /// A new, incomplete positioner
    pub fn new() -> Self {
        Positioner::default()
    }

    /// `xdg_positioner.set_size`
    pub fn set_size(&mut self, width: i32, height: i32) -> Result<(), ProtocolError> {
        if width < 1 || height < 1 {
            return Err(ProtocolError::InvalidSize {
                interface: Interface::XdgPositioner,
                message: format!("positioner size must be positive, got {}x{}", width, height),
            });
        }
        self.rect_size = Some((width, height).into());
        Ok(())
    }

    /// `xdg_positioner.set_anchor_rect`
    pub fn set_anchor_rect(&mut self, x: i32, y: i32, width: i32, height: i32) -> Result<(), ProtocolError> {
        if width < 0 || height < 0 {
            return Err(ProtocolError::InvalidPositionerInput(format!(
                "negative anchor rectangle size {}x{}",
                width, height
            )));
        }
        self.anchor_rect = Some(Rectangle::from_loc_and_size((x, y), (width, height)));
        Ok(())
    }

    /// `xdg_positioner.set_anchor`
    pub fn set_anchor(&mut self, anchor: u32) -> Result<(), ProtocolError> {
        self.anchor_edges = Anchor::try_from(anchor)?;
        Ok(())
    }

    /// `xdg_positioner.set_gravity`
    pub fn set_gravity(&mut self, gravity: u32) -> Result<(), ProtocolError> {
        self.gravity = Gravity::try_from(gravity)?;
        Ok(())
    }

    /// `xdg_positioner.set_constraint_adjustment`
    ///
    /// Unknown bits are ignored.
    pub fn set_constraint_adjustment(&mut self, adjustment: u32) {
        self.constraint_adjustment = ConstraintAdjustment::from_bits_truncate(adjustment);
    }

    /// `xdg_positioner.set_offset`
    pub fn set_offset(&mut self, x: i32, y: i32) {
        self.offset = (x, y).into();
    }

    /// `xdg_positioner.set_reactive`
    pub fn set_reactive(&mut self) {
        self.reactive = true;
    }

    /// `xdg_positioner.set_parent_size`
    pub fn set_parent_size(&mut self, width: i32, height: i32) -> Result<(), ProtocolError> {
        if width < 0 || height < 0 {
            return Err(ProtocolError::InvalidPositionerInput(format!(
                "negative parent size {}x{}",
                width, height
            )));
        }
        self.parent_size = Some((width, height).into());
        Ok(())
    }

    /// `xdg_positioner.set_parent_configure`
    pub fn set_parent_configure(&mut self, serial: Serial) {
        self.parent_configure = Some(serial);
    }

    /// Whether both the size and the anchor rectangle are set
    pub fn is_complete(&self) -> bool {
        self.rect_size.is_some() && self.anchor_rect.is_some()
    }

    /// Freeze the positioner into a placement blueprint
    pub fn state(&self) -> Result<PositionerState, ProtocolError> {
        match (self.rect_size, self.anchor_rect) {
            (Some(rect_size), Some(anchor_rect)) => Ok(PositionerState {
                rect_size,
                anchor_rect,
                anchor_edges: self.anchor_edges,
                gravity: self.gravity,
                constraint_adjustment: self.constraint_adjustment,
                offset: self.offset,
                reactive: self.reactive,
                parent_size: self.parent_size,
                parent_configure: self.parent_configure,
            }),
            _ => Err(ProtocolError::IncompletePositioner),
        }
    }
}

/// A complete, immutable popup placement blueprint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionerState {
    /// Size of the rectangle that needs to be positioned
    pub rect_size: Size<i32, Logical>,
    /// Anchor rectangle in the parent surface coordinates
    /// relative to which the surface must be positioned
    pub anchor_rect: Rectangle<i32, Logical>,
    /// Edges defining the anchor point
    pub anchor_edges: Anchor,
    /// Gravity direction for positioning the child surface
    /// relative to its anchor point
    pub gravity: Gravity,
    /// Adjustments to do if previous criteria constrain the
    /// surface
    pub constraint_adjustment: ConstraintAdjustment,
    /// Offset placement relative to the anchor point
    pub offset: Point<i32, Logical>,
    /// When set reactive, the surface is reconstrained if the conditions
    /// used for constraining changed, e.g. the parent window moved.
    pub reactive: bool,
    /// The parent window geometry the client expects the popup to be positioned against
    pub parent_size: Option<Size<i32, Logical>>,
    /// The serial of the parent configure this positioner responds to
    pub parent_configure: Option<Serial>,
}

impl PositionerState {
    /// Get the anchor point for a popup as defined by this positioner.
    ///
    /// Defined by `xdg_positioner.set_anchor_rect` and
    /// `xdg_positioner.set_anchor`.
    pub fn get_anchor_point(&self) -> Point<i32, Logical> {
        let (x, y) = self.anchor_point();
        (saturate(x), saturate(y)).into()
    }

    /// Get the geometry without taking the constraint target into account.
    ///
    /// `Rectangle::width` and `Rectangle::height` corresponds to the
    /// size set by `xdg_positioner.set_size`.
    ///
    /// `Rectangle::x` and `Rectangle::y` define the position of the
    /// popup relative to its parent surface's `window_geometry`. A placement beyond the
    /// `i32` range is clamped to it.
    pub fn get_geometry(&self) -> Rectangle<i32, Logical> {
        self.placement().into_rect()
    }

    /// Get the geometry for a popup as defined by this positioner, after trying to fit the popup into the
    /// target rectangle.
    ///
    /// The target rectangle is in the same coordinate system as the returned rectangle, relative to the
    /// parent surface's window geometry. If the raw placement already fits, it is returned unchanged.
    pub fn get_unconstrained_geometry(mut self, target: Rectangle<i32, Logical>) -> Rectangle<i32, Logical> {
        // The adjustments are applied individually between axes. We can do that safely, given that both
        // the target and the popup are simple rectangles. Flips replace the geometry entirely and are
        // reverted if they do not remove the constraint, further adjustments change individual fields.
        let target = Placement::from_rect(target);
        let mut geo = self.placement();
        let (mut off_left, mut off_right, mut off_top, mut off_bottom) = compute_offsets(target, geo);

        if (off_left > 0 || off_right > 0) && self.constraint_adjustment.contains(ConstraintAdjustment::FLIP_X) {
            let mut new = self;
            new.anchor_edges = new.anchor_edges.invert_x();
            new.gravity = new.gravity.invert_x();
            let new_geo = new.placement();
            let (new_off_left, new_off_right, _, _) = compute_offsets(target, new_geo);

            if new_off_left <= 0 && new_off_right <= 0 {
                self = new;
                geo = new_geo;
                off_left = 0;
                off_right = 0;
            }
        }

        if (off_top > 0 || off_bottom > 0) && self.constraint_adjustment.contains(ConstraintAdjustment::FLIP_Y) {
            let mut new = self;
            new.anchor_edges = new.anchor_edges.invert_y();
            new.gravity = new.gravity.invert_y();
            let new_geo = new.placement();
            let (_, _, new_off_top, new_off_bottom) = compute_offsets(target, new_geo);

            if new_off_top <= 0 && new_off_bottom <= 0 {
                geo = new_geo;
                off_top = 0;
                off_bottom = 0;
            }
        }

        if (off_left > 0 || off_right > 0) && self.constraint_adjustment.contains(ConstraintAdjustment::SLIDE_X) {
            // Prefer showing the top-left corner, so a resize can cut off the rest.
            if off_left > 0 {
                geo.x += off_left;
            } else if off_right > 0 {
                geo.x -= off_right.min(-off_left);
            }
            (off_left, off_right, _, _) = compute_offsets(target, geo);
        }

        if (off_top > 0 || off_bottom > 0) && self.constraint_adjustment.contains(ConstraintAdjustment::SLIDE_Y) {
            if off_top > 0 {
                geo.y += off_top;
            } else if off_bottom > 0 {
                geo.y -= off_bottom.min(-off_top);
            }
            (_, _, off_top, off_bottom) = compute_offsets(target, geo);
        }

        // Resizing only makes sense while part of the popup is still inside the target.
        if self.constraint_adjustment.contains(ConstraintAdjustment::RESIZE_X) {
            if off_left > 0 && off_left < geo.w {
                geo.x += off_left;
                geo.w -= off_left;
            }
            if off_right > 0 && off_right < geo.w {
                geo.w -= off_right;
            }
        }

        if self.constraint_adjustment.contains(ConstraintAdjustment::RESIZE_Y) {
            if off_top > 0 && off_top < geo.h {
                geo.y += off_top;
                geo.h -= off_top;
            }
            if off_bottom > 0 && off_bottom < geo.h {
                geo.h -= off_bottom;
            }
        }

        geo.into_rect()
    }

    /// This blueprint with its anchor rectangle moved by `offset`
    pub fn with_anchor_offset(mut self, offset: Point<i32, Logical>) -> Self {
        self.anchor_rect.loc = self.anchor_rect.loc.saturating_add(offset);
        self
    }

    fn anchor_point(&self) -> (i64, i64) {
        let rect = self.anchor_rect;
        let (w, h) = (i64::from(rect.size.w), i64::from(rect.size.h));
        let y = i64::from(rect.loc.y)
            + if self.anchor_edges.has_top() {
                0
            } else if self.anchor_edges.has_bottom() {
                h
            } else {
                h / 2
            };

        let x = i64::from(rect.loc.x)
            + if self.anchor_edges.has_left() {
                0
            } else if self.anchor_edges.has_right() {
                w
            } else {
                w / 2
            };

        (x, y)
    }

    fn placement(&self) -> Placement {
        // The offset is relative to the anchor point, after gravity was applied:
        // with an anchor at (x, y), gravity bottom|right and offset (ox, oy),
        // the popup ends up at (x + ox, y + oy).
        let (anchor_x, anchor_y) = self.anchor_point();
        let x = anchor_x + i64::from(self.offset.x);
        let y = anchor_y + i64::from(self.offset.y);
        let (w, h) = (i64::from(self.rect_size.w), i64::from(self.rect_size.h));

        // Without gravity on an axis, the popup is centered over the anchor point.
        let y = if self.gravity.has_top() {
            y - h
        } else if !self.gravity.has_bottom() {
            y - h / 2
        } else {
            y
        };

        let x = if self.gravity.has_left() {
            x - w
        } else if !self.gravity.has_right() {
            x - w / 2
        } else {
            x
        };

        Placement { x, y, w, h }
    }
}

// Anchor rectangles, offsets and sizes all come from the client as `i32`, their sums
// are only representable in a wider type.
#[derive(Debug, Clone, Copy)]
struct Placement {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

impl Placement {
    fn from_rect(rect: Rectangle<i32, Logical>) -> Self {
        Placement {
            x: rect.loc.x.into(),
            y: rect.loc.y.into(),
            w: rect.size.w.into(),
            h: rect.size.h.into(),
        }
    }

    fn into_rect(self) -> Rectangle<i32, Logical> {
        Rectangle::from_loc_and_size(
            (saturate(self.x), saturate(self.y)),
            (saturate(self.w), saturate(self.h)),
        )
    }
}

fn saturate(value: i64) -> i32 {
    value.clamp(i32::MIN.into(), i32::MAX.into()) as i32
}

// How far the popup sticks out of the target on each side; positive means constrained.
fn compute_offsets(target: Placement, popup: Placement) -> (i64, i64, i64, i64) {
    let off_left = target.x - popup.x;
    let off_right = (popup.x + popup.w) - (target.x + target.w);
    let off_top = target.y - popup.y;
    let off_bottom = (popup.y + popup.h) - (target.y + target.h);
    (off_left, off_right, off_top, off_bottom)
}
