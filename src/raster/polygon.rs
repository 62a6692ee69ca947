//! Scanline polygon filling.
//!
//! Vertices live in continuous coordinates where pixel `(x, y)` covers the
//! square `[x, x+1) x [y, y+1)`. A pixel is inside when its centre is inside,
//! so a polygon through `(0,0) (10,0) (10,10) (0,10)` fills exactly 100 pixels.

use super::Coverage;
use crate::gc::FillRule;
use crate::geometry::{Point, Rect};

/// Fills an integer polygon. The path is implicitly closed.
pub fn fill_polygon(points: &[Point], rule: FillRule, limit: Rect, out: &mut Coverage) {
    let pts: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    fill_polygon_f(&pts, rule, limit, out);
}

/// Fills a polygon with fractional vertices, restricted to rows and columns inside `limit`.
pub fn fill_polygon_f(points: &[(f64, f64)], rule: FillRule, limit: Rect, out: &mut Coverage) {
    if points.len() < 3 || limit.is_empty() {
        return;
    }

    let (min_y, max_y) = points
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.1), hi.max(p.1)));
    let first_row = (min_y.floor() as i64).max(limit.y as i64);
    let last_row = (max_y.ceil() as i64).min(limit.bottom() as i64);

    let edges: Vec<((f64, f64), (f64, f64))> = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .filter(|(a, b)| a.1 != b.1)
        .map(|(a, b)| (*a, *b))
        .collect();

    let mut crossings: Vec<(f64, i32)> = Vec::new();
    for row in first_row..last_row {
        let yc = row as f64 + 0.5;
        crossings.clear();
        for &((x0, y0), (x1, y1)) in &edges {
            let (lo, hi, dir) = if y0 < y1 { (y0, y1, 1) } else { (y1, y0, -1) };
            if yc >= lo && yc < hi {
                let x = x0 + (yc - y0) * (x1 - x0) / (y1 - y0);
                crossings.push((x, dir));
            }
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let y = row as i32;
        match rule {
            FillRule::EvenOdd => {
                for pair in crossings.chunks_exact(2) {
                    push_interval(out, y, pair[0].0, pair[1].0, limit);
                }
            }
            FillRule::Winding => {
                let mut winding = 0;
                let mut start = 0.0;
                for &(x, dir) in &crossings {
                    let was_inside = winding != 0;
                    winding += dir;
                    if !was_inside && winding != 0 {
                        start = x;
                    } else if was_inside && winding == 0 {
                        push_interval(out, y, start, x, limit);
                    }
                }
            }
        }
    }
}

/// Adds the pixels whose centres lie in `[xa, xb)`.
fn push_interval(out: &mut Coverage, y: i32, xa: f64, xb: f64, limit: Rect) {
    let x0 = ((xa - 0.5).ceil() as i64).max(limit.x as i64);
    let x1 = ((xb - 0.5).ceil() as i64).min(limit.right() as i64);
    if x1 > x0 {
        out.push_span(y, x0 as i32, x1 as i32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: Rect = Rect::sized(100, 100);

    fn fill(points: &[(i32, i32)], rule: FillRule) -> Coverage {
        let pts: Vec<Point> = points.iter().map(|&(x, y)| Point::new(x, y)).collect();
        let mut c = Coverage::new();
        fill_polygon(&pts, rule, LIMIT, &mut c);
        c
    }

    #[test]
    fn square_fills_exact_pixels() {
        let mut c = fill(&[(0, 0), (10, 0), (10, 10), (0, 10)], FillRule::EvenOdd);
        assert_eq!(c.pixel_count(), 100);
        assert_eq!(c.bounds(), Some(Rect::new(0, 0, 10, 10)));
    }

    #[test]
    fn self_overlapping_star_differs_by_rule() {
        // Pentagram: the centre pentagon is a hole under even-odd only.
        let star = [(50, 0), (79, 90), (2, 35), (98, 35), (21, 90)];
        let mut even = fill(&star, FillRule::EvenOdd);
        let mut wind = fill(&star, FillRule::Winding);
        assert!(!even.contains(50, 50));
        assert!(wind.contains(50, 50));
        assert!(wind.pixel_count() > even.pixel_count());
        // Points of the star are filled either way.
        assert!(even.contains(50, 10));
        assert!(wind.contains(50, 10));
    }

    #[test]
    fn degenerate_input_is_ignored() {
        assert!(fill(&[(0, 0), (5, 5)], FillRule::EvenOdd).is_empty());
        assert!(fill(&[(0, 0), (5, 0), (9, 0)], FillRule::EvenOdd).is_empty());
    }

    #[test]
    fn limit_clips_far_away_vertices() {
        let mut c = fill(&[(-1_000_000, -10), (1_000_000, -10), (0, 1_000_000)], FillRule::EvenOdd);
        let b = c.bounds().unwrap();
        assert!(LIMIT.intersect(&b) == Some(b));
    }
}
