//! Planar geometry: sizes, rects, and 2D affine transforms.
//!
//! Transforms follow the row-vector convention used by media containers'
//! display matrices:
//!
//! ```text
//! x' = a·x + c·y + tx
//! y' = b·x + d·y + ty
//! ```
//!
//! Pixel space is y-down with the origin at the top-left of the frame.
//! Overlay layout uses a y-up space with the origin at the bottom-left;
//! [`AffineTransform::flip_vertical`] converts between the two.

use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-6;

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A width/height pair. Either component may be negative after a transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Component-wise absolute value.
    pub fn abs(&self) -> Size {
        Size::new(self.width.abs(), self.height.abs())
    }

    /// True when either extent is zero (or not a number).
    pub fn is_empty(&self) -> bool {
        !(self.width.abs() > EPSILON && self.height.abs() > EPSILON)
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.max_x(), self.y),
            Point::new(self.x, self.max_y()),
            Point::new(self.max_x(), self.max_y()),
        ]
    }
}

/// Output frame size after orientation correction.
///
/// Always positive in both dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    /// Bounding box of `natural` under `transform`, rounded to whole pixels.
    ///
    /// Returns `None` if the result would be empty.
    pub fn from_transformed(natural: Size, transform: &AffineTransform) -> Option<Self> {
        let transformed = transform.apply_to_size(natural).abs();
        let width = transformed.width.round();
        let height = transformed.height.round();
        if !(width >= 1.0 && height >= 1.0) || !width.is_finite() || !height.is_finite() {
            return None;
        }
        Some(Self {
            width: width as u32,
            height: height as u32,
        })
    }

    pub fn as_size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }

    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

/// Axis-aligned reorientations: the eight symmetries of a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Identity,
    /// 90° clockwise.
    Rotate90,
    Rotate180,
    /// 270° clockwise (90° counter-clockwise).
    Rotate270,
    FlipHorizontal,
    FlipVertical,
    /// Mirror across the main diagonal (`x' = y, y' = x`).
    Transpose,
    /// Mirror across the anti-diagonal (`x' = -y, y' = -x`).
    AntiTranspose,
}

impl Orientation {
    /// Whether width and height trade places.
    pub fn swaps_axes(self) -> bool {
        matches!(
            self,
            Orientation::Rotate90
                | Orientation::Rotate270
                | Orientation::Transpose
                | Orientation::AntiTranspose
        )
    }
}

/// A 2D affine transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineTransform {
    pub const IDENTITY: AffineTransform = AffineTransform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    /// Clockwise quarter-turn rotation that keeps a frame of size
    /// `natural` inside the positive quadrant.
    pub fn quarter_turns(turns: i32, natural: Size) -> Self {
        let (w, h) = (natural.width, natural.height);
        match turns.rem_euclid(4) {
            1 => Self::new(0.0, 1.0, -1.0, 0.0, h, 0.0),
            2 => Self::new(-1.0, 0.0, 0.0, -1.0, w, h),
            3 => Self::new(0.0, -1.0, 1.0, 0.0, 0.0, w),
            _ => Self::IDENTITY,
        }
    }

    /// Upright transform for a clip that must be turned `degrees`
    /// clockwise for display. Only multiples of 90° (±0.5°) are accepted.
    pub fn from_clockwise_degrees(degrees: f64, natural: Size) -> Option<Self> {
        if !degrees.is_finite() {
            return None;
        }
        let turns = (degrees / 90.0).round();
        if (degrees - turns * 90.0).abs() > 0.5 {
            return None;
        }
        Some(Self::quarter_turns(turns as i32, natural))
    }

    /// Mirror top/bottom within a frame of the given height.
    pub fn flip_vertical(height: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, -1.0, 0.0, height)
    }

    pub fn is_identity(&self) -> bool {
        self.approx_eq(&Self::IDENTITY)
    }

    pub fn approx_eq(&self, other: &AffineTransform) -> bool {
        (self.a - other.a).abs() < EPSILON
            && (self.b - other.b).abs() < EPSILON
            && (self.c - other.c).abs() < EPSILON
            && (self.d - other.d).abs() < EPSILON
            && (self.tx - other.tx).abs() < EPSILON
            && (self.ty - other.ty).abs() < EPSILON
    }

    pub fn apply_to_point(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// Apply the linear part only; translation does not move a size.
    pub fn apply_to_size(&self, size: Size) -> Size {
        Size::new(
            self.a * size.width + self.c * size.height,
            self.b * size.width + self.d * size.height,
        )
    }

    /// Bounding box of the transformed rect.
    pub fn apply_to_rect(&self, rect: Rect) -> Rect {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for corner in rect.corners() {
            let p = self.apply_to_point(corner);
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Classify the linear part as one of the axis-aligned reorientations.
    ///
    /// Returns `None` for scales, shears, and arbitrary rotations.
    pub fn orientation(&self) -> Option<Orientation> {
        let snap = |v: f64| -> Option<i8> {
            if (v - 1.0).abs() < EPSILON {
                Some(1)
            } else if (v + 1.0).abs() < EPSILON {
                Some(-1)
            } else if v.abs() < EPSILON {
                Some(0)
            } else {
                None
            }
        };
        let linear = (snap(self.a)?, snap(self.b)?, snap(self.c)?, snap(self.d)?);
        match linear {
            (1, 0, 0, 1) => Some(Orientation::Identity),
            (0, 1, -1, 0) => Some(Orientation::Rotate90),
            (-1, 0, 0, -1) => Some(Orientation::Rotate180),
            (0, -1, 1, 0) => Some(Orientation::Rotate270),
            (-1, 0, 0, 1) => Some(Orientation::FlipHorizontal),
            (1, 0, 0, -1) => Some(Orientation::FlipVertical),
            (0, 1, 1, 0) => Some(Orientation::Transpose),
            (0, -1, -1, 0) => Some(Orientation::AntiTranspose),
            _ => None,
        }
    }
}
