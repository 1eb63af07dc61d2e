use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Type-level marker for the logical coordinate space
///
/// Every geometry negotiated with clients (window geometry, popup placement,
/// layer-surface margins, output usable areas) lives in this space.
#[derive(Debug)]
pub struct Logical;

/// Numeric type usable as a coordinate of [`Point`], [`Size`] and [`Rectangle`]
pub trait Coordinate:
    Sized + Add<Self, Output = Self> + Sub<Self, Output = Self> + PartialOrd + Default + Copy + fmt::Debug
{
    /// The origin value
    const ZERO: Self;

    /// Addition clamping at the numeric bounds
    fn saturating_add(self, other: Self) -> Self;
    /// Subtraction clamping at the numeric bounds
    fn saturating_sub(self, other: Self) -> Self;
}

impl Coordinate for i32 {
    const ZERO: i32 = 0;

    #[inline]
    fn saturating_add(self, other: Self) -> Self {
        i32::saturating_add(self, other)
    }

    #[inline]
    fn saturating_sub(self, other: Self) -> Self {
        i32::saturating_sub(self, other)
    }
}

impl Coordinate for u32 {
    const ZERO: u32 = 0;

    #[inline]
    fn saturating_add(self, other: Self) -> Self {
        u32::saturating_add(self, other)
    }

    #[inline]
    fn saturating_sub(self, other: Self) -> Self {
        u32::saturating_sub(self, other)
    }
}

/// A point as defined by its x and y coordinates
pub struct Point<N, Kind> {
    /// horizontal coordinate
    pub x: N,
    /// vertical coordinate
    pub y: N,
    _kind: PhantomData<Kind>,
}

impl<N: Coordinate, Kind> Point<N, Kind> {
    /// Whether both coordinates are zero
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.x == N::ZERO && self.y == N::ZERO
    }

    /// Saturating addition, clamping each coordinate at the numeric bounds
    #[inline]
    pub fn saturating_add(self, other: impl Into<Point<N, Kind>>) -> Self {
        let other = other.into();
        (self.x.saturating_add(other.x), self.y.saturating_add(other.y)).into()
    }

    /// Saturating subtraction, clamping each coordinate at the numeric bounds
    #[inline]
    pub fn saturating_sub(self, other: impl Into<Point<N, Kind>>) -> Self {
        let other = other.into();
        (self.x.saturating_sub(other.x), self.y.saturating_sub(other.y)).into()
    }
}

impl<N, Kind> From<(N, N)> for Point<N, Kind> {
    #[inline]
    fn from((x, y): (N, N)) -> Self {
        Point {
            x,
            y,
            _kind: PhantomData,
        }
    }
}

impl<N, Kind> From<Point<N, Kind>> for (N, N) {
    #[inline]
    fn from(point: Point<N, Kind>) -> (N, N) {
        (point.x, point.y)
    }
}

impl<N: Coordinate, Kind> Add for Point<N, Kind> {
    type Output = Point<N, Kind>;

    #[inline]
    fn add(self, other: Self) -> Self {
        (self.x + other.x, self.y + other.y).into()
    }
}

impl<N: Coordinate, Kind> AddAssign for Point<N, Kind> {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl<N: Coordinate, Kind> Sub for Point<N, Kind> {
    type Output = Point<N, Kind>;

    #[inline]
    fn sub(self, other: Self) -> Self {
        (self.x - other.x, self.y - other.y).into()
    }
}

impl<N: Coordinate, Kind> SubAssign for Point<N, Kind> {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl<Kind> Neg for Point<i32, Kind> {
    type Output = Point<i32, Kind>;

    #[inline]
    fn neg(self) -> Self {
        (-self.x, -self.y).into()
    }
}

/// A size as defined by its width and height
///
/// Sizes of 0 are meaningful in the protocols: they leave the choice to the other side.
pub struct Size<N, Kind> {
    /// horizontal dimension
    pub w: N,
    /// vertical dimension
    pub h: N,
    _kind: PhantomData<Kind>,
}

impl<N: Coordinate, Kind> Size<N, Kind> {
    /// Whether either dimension is zero or negative
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w <= N::ZERO || self.h <= N::ZERO
    }
}

impl<N, Kind> From<(N, N)> for Size<N, Kind> {
    #[inline]
    fn from((w, h): (N, N)) -> Self {
        Size {
            w,
            h,
            _kind: PhantomData,
        }
    }
}

impl<N, Kind> From<Size<N, Kind>> for (N, N) {
    #[inline]
    fn from(size: Size<N, Kind>) -> (N, N) {
        (size.w, size.h)
    }
}

/// A rectangle defined by its top-left corner and dimensions
pub struct Rectangle<N, Kind> {
    /// Location of the top-left corner of the rectangle
    pub loc: Point<N, Kind>,
    /// Size of the rectangle, as (width, height)
    pub size: Size<N, Kind>,
}

impl<N: Coordinate, Kind> Rectangle<N, Kind> {
    /// Create a new [`Rectangle`] from the coordinates of its top-left corner and its dimensions
    #[inline]
    pub fn from_loc_and_size(loc: impl Into<Point<N, Kind>>, size: impl Into<Size<N, Kind>>) -> Self {
        Rectangle {
            loc: loc.into(),
            size: size.into(),
        }
    }

    /// Checks whether given [`Point`] is inside the rectangle
    #[inline]
    pub fn contains<P: Into<Point<N, Kind>>>(self, point: P) -> bool {
        let point = point.into();
        point.x >= self.loc.x
            && point.y >= self.loc.y
            && point.x < self.loc.x.saturating_add(self.size.w)
            && point.y < self.loc.y.saturating_add(self.size.h)
    }

    /// Checks whether `other` lies entirely inside the rectangle, edges included
    #[inline]
    pub fn contains_rect(self, other: Rectangle<N, Kind>) -> bool {
        other.loc.x >= self.loc.x
            && other.loc.y >= self.loc.y
            && other.loc.x.saturating_add(other.size.w) <= self.loc.x.saturating_add(self.size.w)
            && other.loc.y.saturating_add(other.size.h) <= self.loc.y.saturating_add(self.size.h)
    }
}

// Manual impls, deriving would require the same traits of the `Kind` marker.

impl<N: Clone, Kind> Clone for Point<N, Kind> {
    #[inline]
    fn clone(&self) -> Self {
        (self.x.clone(), self.y.clone()).into()
    }
}

impl<N: Copy, Kind> Copy for Point<N, Kind> {}

impl<N: PartialEq, Kind> PartialEq for Point<N, Kind> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl<N: Eq, Kind> Eq for Point<N, Kind> {}

impl<N: Default, Kind> Default for Point<N, Kind> {
    #[inline]
    fn default() -> Self {
        (N::default(), N::default()).into()
    }
}

impl<N: fmt::Debug, Kind> fmt::Debug for Point<N, Kind> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?})", self.x, self.y)
    }
}

impl<N: Clone, Kind> Clone for Size<N, Kind> {
    #[inline]
    fn clone(&self) -> Self {
        (self.w.clone(), self.h.clone()).into()
    }
}

impl<N: Copy, Kind> Copy for Size<N, Kind> {}

impl<N: PartialEq, Kind> PartialEq for Size<N, Kind> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.w == other.w && self.h == other.h
    }
}

impl<N: Eq, Kind> Eq for Size<N, Kind> {}

impl<N: Default, Kind> Default for Size<N, Kind> {
    #[inline]
    fn default() -> Self {
        (N::default(), N::default()).into()
    }
}

impl<N: fmt::Debug, Kind> fmt::Debug for Size<N, Kind> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}x{:?}", self.w, self.h)
    }
}

impl<N: Clone, Kind> Clone for Rectangle<N, Kind> {
    #[inline]
    fn clone(&self) -> Self {
        Rectangle {
            loc: self.loc.clone(),
            size: self.size.clone(),
        }
    }
}

impl<N: Copy, Kind> Copy for Rectangle<N, Kind> {}

impl<N: PartialEq, Kind> PartialEq for Rectangle<N, Kind> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.loc == other.loc && self.size == other.size
    }
}

impl<N: Eq, Kind> Eq for Rectangle<N, Kind> {}

impl<N: Default, Kind> Default for Rectangle<N, Kind> {
    #[inline]
    fn default() -> Self {
        Rectangle {
            loc: Point::default(),
            size: Size::default(),
        }
    }
}

impl<N: fmt::Debug, Kind> fmt::Debug for Rectangle<N, Kind> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at {:?}", self.size, self.loc)
    }
}

#[cfg(test)]
mod tests {
    use super::{Logical, Point, Rectangle, Size};

    #[test]
    fn right_and_bottom_edges_are_exclusive() {
        let rect = Rectangle::<i32, Logical>::from_loc_and_size((10, 20), (30, 40));
        assert!(rect.contains((10, 20)));
        assert!(rect.contains((39, 59)));
        assert!(!rect.contains((40, 59)));
        assert!(!rect.contains((39, 60)));
    }

    #[test]
    fn rectangles_contain_themselves() {
        let rect = Rectangle::<i32, Logical>::from_loc_and_size((10, 20), (30, 40));
        assert!(rect.contains_rect(rect));
        assert!(!rect.contains_rect(Rectangle::from_loc_and_size((11, 20), (30, 40))));
    }

    #[test]
    fn point_arithmetic() {
        let mut point = Point::<i32, Logical>::from((3, -7));
        assert_eq!(-point, Point::from((-3, 7)));
        assert!((point - point).is_zero());
        point += Point::from((1, 1));
        assert_eq!(point, Point::from((4, -6)));
    }

    #[test]
    fn saturating_point_arithmetic_clamps() {
        let point = Point::<i32, Logical>::from((i32::MAX - 1, i32::MIN + 1));
        assert_eq!(point.saturating_add((5, -5)), Point::from((i32::MAX, i32::MIN)));
        assert_eq!(point.saturating_sub((-5, 5)), Point::from((i32::MAX, i32::MIN)));
    }

    #[test]
    fn zero_sizes_are_empty() {
        assert!(Size::<i32, Logical>::from((0, 10)).is_empty());
        assert!(!Size::<i32, Logical>::from((1, 1)).is_empty());
    }
}
