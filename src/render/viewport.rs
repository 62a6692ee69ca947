//! Viewport definition for the host surface.
//!
//! A [`Viewport`] is the physical surface the host gives us: its size in
//! pixels and how the device is rotated. The window an effect sees is the
//! *logical* size, which swaps width and height for quarter turns when the
//! effect asks to ignore device rotation.
//!
//! # Examples
//!
//! ```
//! use drawbridge::render::{Rotation, Viewport};
//!
//! let vp = Viewport::new(800, 600).with_rotation(Rotation::Deg90);
//! assert_eq!(vp.logical_size(false).width, 800);
//! assert_eq!(vp.logical_size(true).width, 600);
//! ```

use crate::geometry::Point;
use crate::render::backend::SurfaceSize;

/// Device rotation in quarter turns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Snaps an angle in degrees to the nearest quarter turn.
    pub fn from_degrees(degrees: f64) -> Self {
        let quarter = ((degrees / 90.0).round() as i64).rem_euclid(4);
        match quarter {
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            3 => Rotation::Deg270,
            _ => Rotation::Deg0,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// Represents the host surface.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    pub rotation: Rotation,
}

impl std::fmt::Debug for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Viewport {{ width: {}, height: {}, rotation: {} }}",
            self.width,
            self.height,
            self.rotation.degrees()
        )
    }
}

impl Viewport {
    /// Creates a new [`Viewport`] with the given size and no rotation.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, rotation: Rotation::Deg0 }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Resizes the viewport to the given width and height.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Returns the aspect ratio (`width / height`) as `f32`.
    ///
    /// Returns `0.0` if `height` is `0` to avoid division by zero.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Converts this viewport to a [`SurfaceSize`].
    pub fn as_size(&self) -> SurfaceSize {
        SurfaceSize { width: self.width, height: self.height }
    }

    /// Window size an effect sees.
    pub fn logical_size(&self, ignore_rotation: bool) -> SurfaceSize {
        if ignore_rotation && self.rotation.is_quarter_turn() {
            SurfaceSize::new(self.height, self.width)
        } else {
            self.as_size()
        }
    }

    /// Maps a point on the physical surface into window coordinates.
    pub fn to_logical(&self, p: Point, ignore_rotation: bool) -> Point {
        if !ignore_rotation {
            return p;
        }
        let (w, h) = (self.width as i32, self.height as i32);
        match self.rotation {
            Rotation::Deg0 => p,
            Rotation::Deg90 => Point::new(p.y, w - 1 - p.x),
            Rotation::Deg180 => Point::new(w - 1 - p.x, h - 1 - p.y),
            Rotation::Deg270 => Point::new(h - 1 - p.y, p.x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_snaps_to_quarter_turns() {
        assert_eq!(Rotation::from_degrees(0.0), Rotation::Deg0);
        assert_eq!(Rotation::from_degrees(89.0), Rotation::Deg90);
        assert_eq!(Rotation::from_degrees(-90.0), Rotation::Deg270);
        assert_eq!(Rotation::from_degrees(540.0), Rotation::Deg180);
    }

    #[test]
    fn logical_points_stay_inside_logical_size() {
        let vp = Viewport::new(40, 30);
        for rot in [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270] {
            let vp = vp.with_rotation(rot);
            let size = vp.logical_size(true);
            for p in [Point::new(0, 0), Point::new(39, 29), Point::new(39, 0), Point::new(0, 29)] {
                let q = vp.to_logical(p, true);
                assert!(q.x >= 0 && q.x < size.width as i32, "{rot:?} {q:?}");
                assert!(q.y >= 0 && q.y < size.height as i32, "{rot:?} {q:?}");
            }
        }
        assert_eq!(vp.to_logical(Point::new(3, 4), false), Point::new(3, 4));
    }
}
