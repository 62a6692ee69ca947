//! Software rasterizer for the drawing primitives.
//!
//! Every primitive first produces a [`Coverage`]: the set of pixels it
//! touches, stored as horizontal spans. The coverage is normalized (sorted,
//! overlaps merged) before painting, so within one call each pixel is read and
//! written exactly once. This is what keeps read-modify-write functions such
//! as XOR reversible: drawing the same shape twice restores the destination.

pub mod arc;
pub mod line;
pub mod polygon;
pub mod text;

use crate::color::Pixel;
use crate::gc::{Clip, GraphicsContext, RasterOp};
use crate::geometry::Rect;
use crate::image::Image;

/// A run of pixels `[x0, x1)` on row `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span {
    pub y: i32,
    pub x0: i32,
    pub x1: i32,
}

/// The pixels a primitive covers.
#[derive(Clone, Debug, Default)]
pub struct Coverage {
    spans: Vec<Span>,
    normalized: bool,
}

impl Coverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn push_span(&mut self, y: i32, x0: i32, x1: i32) {
        if x1 > x0 {
            self.spans.push(Span { y, x0, x1 });
            self.normalized = false;
        }
    }

    pub fn push_pixel(&mut self, x: i32, y: i32) {
        self.push_span(y, x, x.saturating_add(1));
    }

    pub fn push_rect(&mut self, r: Rect) {
        for y in r.y..r.bottom() {
            self.push_span(y, r.x, r.right());
        }
    }

    pub fn extend(&mut self, other: Coverage) {
        if !other.spans.is_empty() {
            self.spans.extend(other.spans);
            self.normalized = false;
        }
    }

    /// Sorts spans and merges overlapping or touching runs on the same row.
    pub fn normalize(&mut self) {
        if self.normalized {
            return;
        }
        self.spans.sort_unstable();
        let mut merged: Vec<Span> = Vec::with_capacity(self.spans.len());
        for s in self.spans.drain(..) {
            match merged.last_mut() {
                Some(last) if last.y == s.y && s.x0 <= last.x1 => {
                    last.x1 = last.x1.max(s.x1);
                }
                _ => merged.push(s),
            }
        }
        self.spans = merged;
        self.normalized = true;
    }

    /// Normalized spans.
    pub fn spans(&mut self) -> &[Span] {
        self.normalize();
        &self.spans
    }

    pub fn pixel_count(&mut self) -> u64 {
        self.spans().iter().map(|s| (s.x1 - s.x0) as u64).sum()
    }

    pub fn contains(&mut self, x: i32, y: i32) -> bool {
        self.spans().iter().any(|s| s.y == y && x >= s.x0 && x < s.x1)
    }

    pub fn bounds(&mut self) -> Option<Rect> {
        let spans = self.spans();
        let first = spans.first()?;
        let last = spans.last()?;
        let x0 = spans.iter().map(|s| s.x0).min()?;
        let x1 = spans.iter().map(|s| s.x1).max()?;
        Some(Rect::from_edges(x0, first.y, x1, last.y + 1))
    }
}

/// Where a context allows drawing on a particular drawable.
pub(crate) enum ClipRegion<'a> {
    Bounds(Rect),
    Rects { bounds: Rect, rects: Vec<Rect> },
    Mask { bounds: Rect, mask: &'a Image, x: i32, y: i32 },
}

impl<'a> ClipRegion<'a> {
    pub(crate) fn new(gc: &'a GraphicsContext, bounds: Rect) -> Self {
        let ox = gc.values().clip_x_origin;
        let oy = gc.values().clip_y_origin;
        match gc.clip() {
            Clip::None => ClipRegion::Bounds(bounds),
            Clip::Rectangles(rects) => ClipRegion::Rects {
                bounds,
                rects: rects
                    .iter()
                    .filter_map(|r| r.translate(ox, oy).intersect(&bounds))
                    .collect(),
            },
            Clip::Mask(mask) => ClipRegion::Mask { bounds, mask, x: ox, y: oy },
        }
    }

    /// Calls `emit` for each disjoint visible run of `[x0, x1)` on row `y`.
    pub(crate) fn clip_span(&self, y: i32, x0: i32, x1: i32, mut emit: impl FnMut(i32, i32)) {
        let bounds = match self {
            ClipRegion::Bounds(b) | ClipRegion::Rects { bounds: b, .. } | ClipRegion::Mask { bounds: b, .. } => b,
        };
        if y < bounds.y || y >= bounds.bottom() {
            return;
        }
        let x0 = x0.max(bounds.x);
        let x1 = x1.min(bounds.right());
        if x1 <= x0 {
            return;
        }

        match self {
            ClipRegion::Bounds(_) => emit(x0, x1),
            ClipRegion::Rects { rects, .. } => {
                let mut runs: Vec<(i32, i32)> = rects
                    .iter()
                    .filter(|r| y >= r.y && y < r.bottom())
                    .map(|r| (x0.max(r.x), x1.min(r.right())))
                    .filter(|(a, b)| b > a)
                    .collect();
                runs.sort_unstable();
                let mut current: Option<(i32, i32)> = None;
                for (a, b) in runs {
                    match current {
                        Some((ca, cb)) if a <= cb => current = Some((ca, cb.max(b))),
                        Some((ca, cb)) => {
                            emit(ca, cb);
                            current = Some((a, b));
                        }
                        None => current = Some((a, b)),
                    }
                }
                if let Some((a, b)) = current {
                    emit(a, b);
                }
            }
            ClipRegion::Mask { mask, x, y: my, .. } => {
                let mut run_start: Option<i32> = None;
                for px in x0..x1 {
                    let on = mask.get_pixel(px - x, y - my).unwrap_or(0) != 0;
                    match (on, run_start) {
                        (true, None) => run_start = Some(px),
                        (false, Some(start)) => {
                            emit(start, px);
                            run_start = None;
                        }
                        _ => {}
                    }
                }
                if let Some(start) = run_start {
                    emit(start, x1);
                }
            }
        }
    }
}

/// Blends `src` over `dst` using the source alpha byte. Destination alpha is kept.
#[inline]
pub fn blend(src: Pixel, dst: Pixel) -> Pixel {
    let a = src >> 24;
    if a == 0xFF {
        return (dst & 0xFF00_0000) | (src & 0x00FF_FFFF);
    }
    let inv = 255 - a;
    let mix = |shift: u32| -> u32 {
        let s = (src >> shift) & 0xFF;
        let d = (dst >> shift) & 0xFF;
        ((s * a + d * inv) >> 8) & 0xFF
    };
    (dst & 0xFF00_0000) | (mix(16) << 16) | (mix(8) << 8) | mix(0)
}

#[inline]
fn write_pixel(slot: &mut Pixel, src: Pixel, op: RasterOp, planes: u32, blending: bool) {
    *slot = if blending {
        blend(src, *slot)
    } else {
        op.apply(src, *slot, planes)
    };
}

/// Paints a coverage with one source pixel, honouring the context's function,
/// plane mask and clip. Returns the bounding box of the pixels touched.
pub fn paint_coverage(image: &mut Image, gc: &GraphicsContext, coverage: &mut Coverage, pixel: Pixel) -> Option<Rect> {
    let op = gc.values().function;
    if op == RasterOp::Noop || coverage.is_empty() {
        return None;
    }
    let planes = gc.planes();
    let src = gc.normalize_pixel(pixel);
    let blending = op == RasterOp::Copy && gc.values().alpha_allowed && image.depth() != 1 && src >> 24 != 0xFF;

    let clip = ClipRegion::new(gc, image.bounds());
    let mut dirty = Rect::default();
    for span in coverage.spans() {
        clip.clip_span(span.y, span.x0, span.x1, |a, b| {
            let row = image.row_mut(span.y as u32);
            for slot in &mut row[a as usize..b as usize] {
                write_pixel(slot, src, op, planes, blending);
            }
            dirty = dirty.union(&Rect::from_edges(a, span.y, b, span.y + 1));
        });
    }
    (!dirty.is_empty()).then_some(dirty)
}

/// How source pixels of a blit are turned into values for the destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlitSource {
    /// Same-depth copy of the pixel value.
    Direct,
    /// Pixels whose `plane` bits are set become the foreground, others the background.
    Plane(u32),
    /// Source alpha blended over the destination.
    Blend,
}

/// Copies `src_rect` of `src` to `(dst_x, dst_y)` in `dst` through the context.
///
/// `src` must not alias `dst`; callers copy overlapping regions out first.
pub fn blit(
    dst: &mut Image,
    gc: &GraphicsContext,
    src: &Image,
    src_rect: Rect,
    dst_x: i32,
    dst_y: i32,
    mode: BlitSource,
) -> Option<Rect> {
    let op = gc.values().function;
    if op == RasterOp::Noop {
        return None;
    }
    // Only the part of the source that exists is copied.
    let visible = src_rect.intersect(&src.bounds())?;
    let dx = dst_x + (visible.x - src_rect.x);
    let dy = dst_y + (visible.y - src_rect.y);
    let target = Rect::new(dx, dy, visible.width, visible.height).intersect(&dst.bounds())?;

    let planes = gc.planes();
    let fg = gc.foreground();
    let bg = gc.background();
    let deep = dst.depth() != 1;
    let clip = ClipRegion::new(gc, dst.bounds());
    let mut dirty = Rect::default();

    for y in target.y..target.bottom() {
        let sy = visible.y + (y - dy);
        clip.clip_span(y, target.x, target.right(), |a, b| {
            let src_row = src.row(sy as u32);
            let row = dst.row_mut(y as u32);
            for x in a..b {
                let s = src_row[(visible.x + (x - dx)) as usize];
                let slot = &mut row[x as usize];
                match mode {
                    BlitSource::Direct => write_pixel(slot, s, op, planes, false),
                    BlitSource::Plane(plane) => {
                        let v = if s & plane != 0 { fg } else { bg };
                        write_pixel(slot, v, op, planes, false)
                    }
                    BlitSource::Blend if deep => write_pixel(slot, s, op, planes, op == RasterOp::Copy),
                    BlitSource::Blend => write_pixel(slot, s, op, planes, false),
                }
            }
            dirty = dirty.union(&Rect::from_edges(a, y, b, y + 1));
        });
    }
    (!dirty.is_empty()).then_some(dirty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color;
    use std::sync::Arc;

    #[test]
    fn normalize_merges_overlaps() {
        let mut c = Coverage::new();
        c.push_span(1, 5, 10);
        c.push_span(1, 0, 6);
        c.push_span(1, 10, 12);
        c.push_pixel(3, 0);
        c.push_pixel(3, 0);
        assert_eq!(
            c.spans(),
            &[Span { y: 0, x0: 3, x1: 4 }, Span { y: 1, x0: 0, x1: 12 }]
        );
        assert_eq!(c.pixel_count(), 13);
        assert_eq!(c.bounds(), Some(Rect::new(0, 0, 12, 2)));
    }

    #[test]
    fn xor_paint_twice_restores() {
        let mut img = Image::filled(8, 8, 32, color::rgb(10, 20, 30)).unwrap();
        let before = img.clone();
        let mut gc = GraphicsContext::new(32);
        gc.set_function(RasterOp::Xor);

        let mut cov = Coverage::new();
        cov.push_rect(Rect::new(1, 1, 4, 4));
        cov.push_rect(Rect::new(2, 2, 4, 4));
        paint_coverage(&mut img, &gc, &mut cov, color::WHITE_PIXEL);
        assert_ne!(img, before);
        paint_coverage(&mut img, &gc, &mut cov, color::WHITE_PIXEL);
        assert_eq!(img, before);
    }

    #[test]
    fn clip_rectangles_and_mask() {
        let mut img = Image::filled(6, 6, 32, color::BLACK_PIXEL).unwrap();
        let mut gc = GraphicsContext::new(32);
        gc.set_clip_rectangles(1, 1, vec![Rect::new(0, 0, 2, 2), Rect::new(1, 0, 2, 1)]);
        let mut cov = Coverage::new();
        cov.push_rect(img.bounds());
        let dirty = paint_coverage(&mut img, &gc, &mut cov, color::WHITE_PIXEL);
        assert_eq!(dirty, Some(Rect::new(1, 1, 3, 2)));
        assert_eq!(img.get_pixel(3, 1), Some(color::WHITE_PIXEL));
        assert_eq!(img.get_pixel(3, 2), Some(color::BLACK_PIXEL));
        assert_eq!(img.get_pixel(0, 0), Some(color::BLACK_PIXEL));

        // Raster ops leave the destination alpha alone.
        let mut clear = Image::new(2, 2, 32).unwrap();
        let mut all = Coverage::new();
        all.push_rect(clear.bounds());
        paint_coverage(&mut clear, &GraphicsContext::new(32), &mut all, color::WHITE_PIXEL);
        assert_eq!(clear.get_pixel(1, 1), Some(color::COLOR_PLANES));

        let mut mask = Image::new(2, 1, 1).unwrap();
        mask.put_pixel(1, 0, 1);
        let mut img = Image::filled(4, 4, 32, color::BLACK_PIXEL).unwrap();
        let mut gc = GraphicsContext::new(32);
        gc.set_clip_mask(Some(Arc::new(mask))).unwrap();
        gc.set_clip_origin(2, 2);
        paint_coverage(&mut img, &gc, &mut cov, color::WHITE_PIXEL);
        let lit: Vec<_> = (0..16).filter(|i| img.pixels()[*i] & color::COLOR_PLANES != 0).collect();
        assert_eq!(lit, vec![2 * 4 + 3]);
    }

    #[test]
    fn plane_blit_maps_bits_to_colors() {
        let bits = Image::from_bitmap_bits(&[0b01], 2, 1).unwrap();
        let mut dst = Image::filled(2, 1, 32, color::BLACK_PIXEL).unwrap();
        let mut gc = GraphicsContext::new(32);
        gc.set_foreground(color::rgb(255, 0, 0));
        gc.set_background(color::rgb(0, 0, 255));
        blit(&mut dst, &gc, &bits, bits.bounds(), 0, 0, BlitSource::Plane(1));
        assert_eq!(dst.pixels(), &[color::rgb(255, 0, 0), color::rgb(0, 0, 255)]);
    }

    #[test]
    fn blend_weights_by_source_alpha() {
        let out = blend(color::rgba(255, 0, 0, 128), color::rgb(0, 0, 255));
        let [r, g, b, a] = color::to_rgba8(out);
        assert_eq!((r, g, b, a), (127, 0, 126, 255));
    }
}
