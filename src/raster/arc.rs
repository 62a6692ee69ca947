//! Elliptical arcs.
//!
//! Arcs are given by their bounding box and two angles in 64ths of a degree,
//! counter-clockwise from three o'clock. They are flattened into polylines
//! whose segment count grows with the square root of the circumference.

use super::line::{stroke_path, Stroke};
use super::polygon::fill_polygon_f;
use super::Coverage;
use crate::gc::{ArcMode, FillRule, GraphicsContext};
use crate::geometry::Rect;
use std::f64::consts::PI;

/// One full turn in arc angle units.
pub const FULL_CIRCLE: i32 = 360 * 64;

/// An arc request as passed to the arc primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EllipticArc {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub angle1: i32,
    pub angle2: i32,
}

impl EllipticArc {
    pub fn new(x: i32, y: i32, width: u32, height: u32, angle1: i32, angle2: i32) -> Self {
        Self { x, y, width, height, angle1, angle2 }
    }

    /// A full ellipse inscribed in the rectangle.
    pub fn ellipse(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self::new(x, y, width, height, 0, FULL_CIRCLE)
    }

    fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    fn is_full(&self) -> bool {
        self.angle2.unsigned_abs() >= FULL_CIRCLE as u32
    }

    /// Start angle and positive sweep, in radians.
    fn sweep(&self) -> (f64, f64) {
        let (mut a1, mut a2) = (self.angle1 as f64, self.angle2 as f64);
        if a2 < 0.0 {
            a1 += a2;
            a2 = -a2;
        }
        a2 = a2.min(FULL_CIRCLE as f64);
        (a1 / 64.0 * PI / 180.0, a2 / 64.0 * PI / 180.0)
    }

    /// Number of straight segments used for the whole ellipse.
    fn full_segments(&self) -> usize {
        let a = self.width as f64 / 2.0;
        let b = self.height as f64 / 2.0;
        // Ramanujan's approximation of the ellipse perimeter.
        let h = if a + b > 0.0 { ((a - b) / (a + b)).powi(2) } else { 0.0 };
        let circumference = PI * (a + b) * (1.0 + 3.0 * h / (10.0 + (4.0 - 3.0 * h).sqrt()));
        ((4.0 * (circumference / (2.0 * PI)).sqrt()).ceil() as usize).max(8)
    }

    /// Points along the arc, first and last included.
    pub fn points(&self) -> Vec<(f64, f64)> {
        let (cx, cy) = self.center();
        let (rx, ry) = (self.width as f64 / 2.0, self.height as f64 / 2.0);
        let (start, sweep) = self.sweep();
        if sweep == 0.0 {
            return Vec::new();
        }
        let n = ((self.full_segments() as f64 * sweep / (2.0 * PI)).ceil() as usize).max(1);
        (0..=n)
            .map(|i| {
                let t = start + sweep * i as f64 / n as f64;
                (cx + t.cos() * rx, cy - t.sin() * ry)
            })
            .collect()
    }
}

/// Outline of an arc.
pub fn stroke_arc(arc: &EllipticArc, gc: &GraphicsContext, limit: Rect) -> Stroke {
    stroke_path(&arc.points(), gc, limit)
}

/// Filled arc: a pie slice to the centre or a chord, per the context's arc mode.
pub fn fill_arc(arc: &EllipticArc, gc: &GraphicsContext, limit: Rect) -> Coverage {
    let mut out = Coverage::new();
    let mut poly = arc.points();
    if poly.is_empty() {
        return out;
    }
    if !arc.is_full() && gc.values().arc_mode == ArcMode::PieSlice {
        poly.push(arc.center());
    }
    fill_polygon_f(&poly, FillRule::Winding, limit, &mut out);
    out
}
