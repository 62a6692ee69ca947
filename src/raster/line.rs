//! Line stroking: thin Bresenham lines and wide lines built from polygons.
//!
//! Widths 0 and 1 are drawn as thin lines, one pixel per step. Wider lines
//! are expanded into quads for segments, plus cap and join polygons, and
//! filled. Dash patterns continue across the joints of a polyline.

use super::polygon::fill_polygon_f;
use super::Coverage;
use crate::gc::{CapStyle, FillRule, GraphicsContext, JoinStyle, LineStyle};
use crate::geometry::{Point, Rect};

/// Pixels drawn with the foreground, and with the background for double dashes.
#[derive(Debug, Default)]
pub struct Stroke {
    pub fg: Coverage,
    pub bg: Coverage,
}

/// Interior angles below this use a bevel instead of a miter.
const MITER_LIMIT_DEGREES: f64 = 11.0;

/// Walks a dash pattern. Odd-length lists repeat twice so on/off alternate.
struct DashCursor {
    pattern: Vec<f64>,
    index: usize,
    remaining: f64,
}

impl DashCursor {
    fn new(list: &[u8], offset: u32) -> Self {
        let mut pattern: Vec<f64> = list.iter().map(|d| (*d).max(1) as f64).collect();
        if pattern.is_empty() {
            pattern.push(4.0);
        }
        if pattern.len() % 2 == 1 {
            pattern.extend_from_within(..);
        }
        let mut cursor = Self { remaining: pattern[0], pattern, index: 0 };
        let period: f64 = cursor.pattern.iter().sum();
        cursor.advance(offset as f64 % period);
        cursor
    }

    /// Advances by `n` whole pixels without stepping through every period.
    fn skip(&mut self, n: i64) {
        if n <= 0 {
            return;
        }
        let period: f64 = self.pattern.iter().sum();
        self.advance((n as f64) % period);
    }

    fn is_on(&self) -> bool {
        self.index % 2 == 0
    }

    fn advance(&mut self, mut d: f64) {
        while d > 0.0 {
            if self.remaining > d {
                self.remaining -= d;
                return;
            }
            d -= self.remaining;
            self.index = (self.index + 1) % self.pattern.len();
            self.remaining = self.pattern[self.index];
        }
    }

    /// Splits `[0, len)` into runs of constant on/off state.
    fn runs(&mut self, len: f64) -> Vec<(bool, f64, f64)> {
        let mut out = Vec::new();
        let mut t = 0.0;
        while t < len {
            let step = self.remaining.min(len - t);
            out.push((self.is_on(), t, t + step));
            self.advance(step);
            t += step;
        }
        out
    }
}

/// A thin line from `a` to `b`, both ends included: one pixel per step along
/// the major axis, with the minor axis rounded to the nearest pixel.
#[derive(Clone, Copy, Debug)]
pub struct ThinLine {
    a: Point,
    x_major: bool,
    steps: i64,
    major_dir: i64,
    minor_delta: i64,
}

impl ThinLine {
    pub fn new(a: Point, b: Point) -> Self {
        let dx = b.x as i64 - a.x as i64;
        let dy = b.y as i64 - a.y as i64;
        let x_major = dx.abs() >= dy.abs();
        let (major, minor) = if x_major { (dx, dy) } else { (dy, dx) };
        Self { a, x_major, steps: major.abs(), major_dir: major.signum(), minor_delta: minor }
    }

    /// Index of the last pixel; the line has `steps() + 1` pixels.
    pub fn steps(&self) -> i64 {
        self.steps
    }

    fn minor_offset(&self, k: i64) -> i64 {
        if self.steps == 0 {
            return 0;
        }
        let n = self.steps as i128;
        let off = (2 * k as i128 * self.minor_delta.abs() as i128 + n) / (2 * n);
        self.minor_delta.signum() * off as i64
    }

    /// The pixel at step `k`.
    pub fn pixel(&self, k: i64) -> (i32, i32) {
        let (ax, ay) = (self.a.x as i64, self.a.y as i64);
        let major = k * self.major_dir;
        let minor = self.minor_offset(k);
        let (x, y) = if self.x_major { (ax + major, ay + minor) } else { (ax + minor, ay + major) };
        (x as i32, y as i32)
    }

    /// The range of steps whose pixels can fall inside `limit`, if any.
    ///
    /// The major axis is clipped exactly; the minor axis conservatively, so
    /// callers still test each pixel.
    pub fn visible_steps(&self, limit: Rect) -> Option<(i64, i64)> {
        if limit.is_empty() {
            return None;
        }
        let (ax, ay) = (self.a.x as i64, self.a.y as i64);
        let (x_lo, x_hi) = (limit.x as i64, limit.right() as i64 - 1);
        let (y_lo, y_hi) = (limit.y as i64, limit.bottom() as i64 - 1);
        let (a_major, a_minor, (maj_lo, maj_hi), (min_lo, min_hi)) = if self.x_major {
            (ax, ay, (x_lo, x_hi), (y_lo, y_hi))
        } else {
            (ay, ax, (y_lo, y_hi), (x_lo, x_hi))
        };

        let (mut k0, mut k1) = if self.major_dir >= 0 {
            (maj_lo - a_major, maj_hi - a_major)
        } else {
            (a_major - maj_hi, a_major - maj_lo)
        };
        if self.major_dir == 0 {
            // A single pixel.
            if a_major < maj_lo || a_major > maj_hi {
                return None;
            }
            (k0, k1) = (0, 0);
        }

        if self.minor_delta == 0 {
            if a_minor < min_lo || a_minor > min_hi {
                return None;
            }
        } else {
            let (off_lo, off_hi) = if self.minor_delta > 0 {
                (min_lo - a_minor, min_hi - a_minor)
            } else {
                (a_minor - min_hi, a_minor - min_lo)
            };
            let n = self.steps as i128;
            let m = self.minor_delta.abs() as i128;
            let lo = ((off_lo as i128 - 1) * n).div_euclid(m);
            let hi = ((off_hi as i128 + 1) * n).div_euclid(m) + 1;
            k0 = k0.max(lo.clamp(i64::MIN as i128, i64::MAX as i128) as i64);
            k1 = k1.min(hi.clamp(i64::MIN as i128, i64::MAX as i128) as i64);
        }

        let (k0, k1) = (k0.max(0), k1.min(self.steps));
        (k0 <= k1).then_some((k0, k1))
    }
}

/// Strokes a connected polyline with the context's line attributes.
pub fn stroke_polyline(points: &[Point], gc: &GraphicsContext, limit: Rect) -> Stroke {
    let mut stroke = Stroke::default();
    if gc.values().line_width <= 1 {
        thin_polyline(points, gc, limit, &mut stroke);
    } else {
        let pts: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
        wide_polyline(&pts, gc, limit, &mut stroke);
    }
    stroke
}

/// Strokes a polyline with fractional vertices. Thin lines round to the pixel grid.
pub fn stroke_path(points: &[(f64, f64)], gc: &GraphicsContext, limit: Rect) -> Stroke {
    let mut stroke = Stroke::default();
    if gc.values().line_width <= 1 {
        let mut pts: Vec<Point> = points
            .iter()
            .map(|(x, y)| Point::new(x.round() as i32, y.round() as i32))
            .collect();
        pts.dedup();
        thin_polyline(&pts, gc, limit, &mut stroke);
    } else {
        wide_polyline(points, gc, limit, &mut stroke);
    }
    stroke
}

fn thin_polyline(points: &[Point], gc: &GraphicsContext, limit: Rect, out: &mut Stroke) {
    let v = gc.values();
    let dashed = v.line_style != LineStyle::Solid;
    let double = v.line_style == LineStyle::DoubleDash;
    let mut dashes = DashCursor::new(gc.dash_list(), v.dash_offset);

    let plot = |x: i32, y: i32, dashes: &mut DashCursor, out: &mut Stroke| {
        let on = !dashed || dashes.is_on();
        if dashed {
            dashes.advance(1.0);
        }
        if !limit.contains(x, y) {
            return;
        }
        if on {
            out.fg.push_pixel(x, y);
        } else if double {
            out.bg.push_pixel(x, y);
        }
    };

    match points {
        [] => {}
        [p] => plot(p.x, p.y, &mut dashes, out),
        _ => {
            let segments = points.len() - 1;
            for (i, w) in points.windows(2).enumerate() {
                let line = ThinLine::new(w[0], w[1]);
                // Joints are shared with the previous segment.
                let first = i64::from(i > 0);
                let last = if i + 1 == segments && v.cap_style == CapStyle::NotLast && line.steps() > 0 {
                    line.steps() - 1
                } else {
                    line.steps()
                };
                if first > last {
                    continue;
                }
                // Off-limit steps only move the dash pattern along.
                let Some((k0, k1)) = line.visible_steps(limit).map(|(a, b)| (a.max(first), b.min(last))).filter(|(a, b)| a <= b)
                else {
                    if dashed {
                        dashes.skip(last - first + 1);
                    }
                    continue;
                };
                if dashed {
                    dashes.skip(k0 - first);
                }
                for k in k0..=k1 {
                    let (x, y) = line.pixel(k);
                    plot(x, y, &mut dashes, out);
                }
                if dashed {
                    dashes.skip(last - k1);
                }
            }
        }
    }
}

type Vec2 = (f64, f64);

fn sub(a: Vec2, b: Vec2) -> Vec2 {
    (a.0 - b.0, a.1 - b.1)
}

fn add(a: Vec2, b: Vec2) -> Vec2 {
    (a.0 + b.0, a.1 + b.1)
}

fn scale(a: Vec2, s: f64) -> Vec2 {
    (a.0 * s, a.1 * s)
}

fn length(a: Vec2) -> f64 {
    a.0.hypot(a.1)
}

fn cross(a: Vec2, b: Vec2) -> f64 {
    a.0 * b.1 - a.1 * b.0
}

fn dot(a: Vec2, b: Vec2) -> f64 {
    a.0 * b.0 + a.1 * b.1
}

/// Approximates a disc as a polygon.
pub fn disc(center: Vec2, radius: f64) -> Vec<Vec2> {
    let n = ((radius * 4.0).ceil() as usize).clamp(8, 256);
    (0..n)
        .map(|i| {
            let t = i as f64 / n as f64 * std::f64::consts::TAU;
            (center.0 + radius * t.cos(), center.1 + radius * t.sin())
        })
        .collect()
}

struct WidePen {
    half: f64,
    limit: Rect,
}

impl WidePen {
    fn fill(&self, poly: &[Vec2], out: &mut Coverage) {
        fill_polygon_f(poly, FillRule::Winding, self.limit, out);
    }

    /// Quad for `a -> b`, with the start pulled back by `e0` and the end pushed out by `e1`.
    fn segment(&self, a: Vec2, b: Vec2, e0: f64, e1: f64, out: &mut Coverage) {
        let d = sub(b, a);
        let len = length(d);
        if len == 0.0 {
            return;
        }
        let u = scale(d, 1.0 / len);
        let n = scale((-u.1, u.0), self.half);
        let a = sub(a, scale(u, e0));
        let b = add(b, scale(u, e1));
        self.fill(&[add(a, n), add(b, n), sub(b, n), sub(a, n)], out);
    }

    fn cap_extension(&self, cap: CapStyle) -> f64 {
        if cap == CapStyle::Projecting {
            self.half
        } else {
            0.0
        }
    }

    fn cap(&self, p: Vec2, cap: CapStyle, out: &mut Coverage) {
        if cap == CapStyle::Round {
            self.fill(&disc(p, self.half), out);
        }
    }

    fn join(&self, p: Vec2, d0: Vec2, d1: Vec2, style: JoinStyle, out: &mut Coverage) {
        let n0 = scale((-d0.1, d0.0), self.half);
        let n1 = scale((-d1.1, d1.0), self.half);
        let turn = cross(d0, d1);
        if turn.abs() < 1e-9 && dot(d0, d1) > 0.0 {
            return;
        }

        let interior = std::f64::consts::PI - dot(d0, d1).clamp(-1.0, 1.0).acos();
        let style = if style == JoinStyle::Miter && interior.to_degrees() < MITER_LIMIT_DEGREES {
            JoinStyle::Bevel
        } else {
            style
        };

        match style {
            JoinStyle::Round => self.fill(&disc(p, self.half), out),
            JoinStyle::Bevel => {
                self.fill(&[p, add(p, n0), add(p, n1)], out);
                self.fill(&[p, sub(p, n0), sub(p, n1)], out);
            }
            JoinStyle::Miter => {
                for side in [1.0, -1.0] {
                    let a = add(p, scale(n0, side));
                    let b = add(p, scale(n1, side));
                    // Intersection of a + t*d0 and b + s*d1.
                    let denom = cross(d0, d1);
                    if denom.abs() < 1e-9 {
                        continue;
                    }
                    let t = cross(sub(b, a), d1) / denom;
                    let tip = add(a, scale(d0, t));
                    self.fill(&[p, a, tip, b], out);
                }
            }
        }
    }
}

fn wide_polyline(points: &[Vec2], gc: &GraphicsContext, limit: Rect, out: &mut Stroke) {
    let v = gc.values();
    let pen = WidePen { half: v.line_width as f64 / 2.0, limit };
    let cap = if v.cap_style == CapStyle::NotLast { CapStyle::Butt } else { v.cap_style };

    let mut pts: Vec<Vec2> = points.to_vec();
    pts.dedup();
    if pts.is_empty() {
        return;
    }
    if pts.len() == 1 {
        let p = pts[0];
        match cap {
            CapStyle::Round => pen.cap(p, cap, &mut out.fg),
            CapStyle::Projecting => {
                let h = pen.half;
                pen.fill(&[(p.0 - h, p.1 - h), (p.0 + h, p.1 - h), (p.0 + h, p.1 + h), (p.0 - h, p.1 + h)], &mut out.fg);
            }
            _ => {}
        }
        return;
    }

    if v.line_style != LineStyle::Solid {
        let double = v.line_style == LineStyle::DoubleDash;
        let mut dashes = DashCursor::new(gc.dash_list(), v.dash_offset);
        let ext = pen.cap_extension(cap);
        for w in pts.windows(2) {
            let d = sub(w[1], w[0]);
            let len = length(d);
            let u = scale(d, 1.0 / len);
            for (on, t0, t1) in dashes.runs(len) {
                let target = if on {
                    &mut out.fg
                } else if double {
                    &mut out.bg
                } else {
                    continue;
                };
                let a = add(w[0], scale(u, t0));
                let b = add(w[0], scale(u, t1));
                pen.segment(a, b, ext, ext, target);
                pen.cap(a, cap, target);
                pen.cap(b, cap, target);
            }
        }
        return;
    }

    let closed = pts.len() > 2 && pts.first() == pts.last();
    let segments = pts.len() - 1;
    let dirs: Vec<Vec2> = pts
        .windows(2)
        .map(|w| {
            let d = sub(w[1], w[0]);
            scale(d, 1.0 / length(d))
        })
        .collect();

    for (i, w) in pts.windows(2).enumerate() {
        let e0 = if i == 0 && !closed { pen.cap_extension(cap) } else { 0.0 };
        let e1 = if i + 1 == segments && !closed { pen.cap_extension(cap) } else { 0.0 };
        pen.segment(w[0], w[1], e0, e1, &mut out.fg);
    }
    for i in 1..segments {
        pen.join(pts[i], dirs[i - 1], dirs[i], v.join_style, &mut out.fg);
    }
    if closed {
        pen.join(pts[0], dirs[segments - 1], dirs[0], v.join_style, &mut out.fg);
    } else {
        pen.cap(pts[0], cap, &mut out.fg);
        pen.cap(pts[segments], cap, &mut out.fg);
    }
}
