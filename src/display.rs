//! The Xlib-shaped drawing API effects are written against.
//!
//! A [`Display`] owns the window, the resource arena and the current target
//! binding. Drawing calls never fail: bad ids, freed resources and depth
//! mismatches are logged, counted and ignored so the frame carries on.
//! Only resource creation returns errors.

use crate::arena::{FontId, GcId, PixmapId, ResourceArena, ResourceCounts, ResourceLimits, SweepReport};
use crate::color::{self, Color16, Pixel};
use crate::drawable::{Drawable, Geometry, Window, WindowAttributes};
use crate::errors::BridgeError;
use crate::gc::{ArcMode, CapStyle, FillRule, GcMask, GcValues, GraphicsContext, JoinStyle, LineStyle, RasterOp};
use crate::geometry::{Point, Rect};
use crate::image::Image;
use crate::raster::arc::{fill_arc, stroke_arc, EllipticArc};
use crate::raster::line::{stroke_polyline, Stroke};
use crate::raster::polygon::fill_polygon;
use crate::raster::text::{Font, TextExtents};
use crate::raster::{blit, paint_coverage, BlitSource, Coverage};
use crate::render::Viewport;
use log::{trace, warn};
use rand::Rng;
use std::sync::Arc;

/// Screen resolution assumed for physical size queries.
const DOTS_PER_INCH: f64 = 75.0;

/// How polyline and polygon vertices are given.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CoordMode {
    /// Every point is absolute.
    #[default]
    Origin,
    /// Every point after the first is relative to the previous one.
    Previous,
}

/// A line segment for [`Display::draw_segments`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Segment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Segment {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// One coverage painted with one pixel value.
struct Paint {
    coverage: Coverage,
    pixel: Pixel,
}

impl Paint {
    fn from_stroke(stroke: Stroke, gc: &GraphicsContext) -> Vec<Paint> {
        let mut out = Vec::with_capacity(2);
        if !stroke.bg.is_empty() {
            out.push(Paint { coverage: stroke.bg, pixel: gc.background() });
        }
        out.push(Paint { coverage: stroke.fg, pixel: gc.foreground() });
        out
    }
}

/// Keeps a drawable bound as the current target; the previous binding is restored on drop.
struct Bound<'a> {
    display: &'a mut Display,
    previous: Drawable,
}

impl Bound<'_> {
    fn image(&mut self) -> Option<&mut Image> {
        match self.display.bound {
            Drawable::Window => self.display.window.backbuffer_mut().image_mut(),
            Drawable::Pixmap(id) => self.display.arena.pixmap_mut(id),
        }
    }
}

impl Drop for Bound<'_> {
    fn drop(&mut self) {
        self.display.bound = self.previous;
    }
}

fn to_absolute(points: &[Point], mode: CoordMode) -> Vec<Point> {
    match mode {
        CoordMode::Origin => points.to_vec(),
        CoordMode::Previous => {
            let mut last = Point::default();
            points
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    last = if i == 0 { *p } else { Point::new(last.x + p.x, last.y + p.y) };
                    last
                })
                .collect()
        }
    }
}

#[derive(Debug)]
pub struct Display {
    window: Window,
    arena: ResourceArena,
    bound: Drawable,
    binds: u64,
    misuse_count: u64,
    last_misuse: Option<BridgeError>,
}

impl Display {
    pub fn new(viewport: Viewport, limits: ResourceLimits) -> Self {
        Self {
            window: Window::new(viewport),
            arena: ResourceArena::new(limits),
            bound: Drawable::Window,
            binds: 0,
            misuse_count: 0,
            last_misuse: None,
        }
    }

    // ------------------------------------------------------------------
    // Window and screen

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub(crate) fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    pub fn default_depth(&self) -> u8 {
        color::VISUAL_DEPTH
    }

    pub fn black_pixel(&self) -> Pixel {
        color::BLACK_PIXEL
    }

    pub fn white_pixel(&self) -> Pixel {
        color::WHITE_PIXEL
    }

    pub fn display_width(&self) -> u32 {
        self.window.width()
    }

    pub fn display_height(&self) -> u32 {
        self.window.height()
    }

    pub fn display_width_mm(&self) -> u32 {
        (self.window.width() as f64 * 25.4 / DOTS_PER_INCH).round() as u32
    }

    pub fn display_height_mm(&self) -> u32 {
        (self.window.height() as f64 * 25.4 / DOTS_PER_INCH).round() as u32
    }

    pub fn get_window_attributes(&self) -> WindowAttributes {
        self.window.attributes()
    }

    /// Last pointer position delivered to the window.
    pub fn query_pointer(&self) -> Point {
        self.window.pointer()
    }

    /// All drawables share the window's origin.
    pub fn translate_coordinates(&mut self, src: Drawable, dst: Drawable, x: i32, y: i32) -> Option<Point> {
        if self.depth_of(src).is_none() || self.depth_of(dst).is_none() {
            self.misuse(format!("translate_coordinates: unknown drawable {src} or {dst}"));
            return None;
        }
        Some(Point::new(x, y))
    }

    pub fn set_window_background(&mut self, pixel: Pixel) {
        self.window.set_background(pixel);
    }

    pub fn clear_window(&mut self) {
        self.clear_area(0, 0, 0, 0);
    }

    /// Fills an area of the window with its background. A zero width or
    /// height extends to the window edge.
    pub fn clear_area(&mut self, x: i32, y: i32, width: u32, height: u32) {
        let size = self.window.size();
        let w = if width == 0 { (size.width as i32 - x).max(0) as u32 } else { width };
        let h = if height == 0 { (size.height as i32 - y).max(0) as u32 } else { height };
        let background = self.window.background();
        let bb = self.window.backbuffer_mut();
        let Some(image) = bb.image_mut() else {
            return;
        };
        if let Some(r) = Rect::new(x, y, w, h).intersect(&image.bounds()) {
            image.fill_rect(r, background);
            bb.add_dirty(r);
        }
    }

    pub fn get_geometry(&self, d: Drawable) -> Result<Geometry, BridgeError> {
        let (width, height, depth) = match d {
            Drawable::Window => (self.window.width(), self.window.height(), color::VISUAL_DEPTH),
            Drawable::Pixmap(id) => {
                let img = self
                    .arena
                    .pixmap(id)
                    .ok_or_else(|| BridgeError::ProtocolMisuse(format!("get_geometry: unknown {id}")))?;
                (img.width(), img.height(), img.depth())
            }
        };
        Ok(Geometry { x: 0, y: 0, width, height, border_width: 0, depth })
    }

    /// The drawable current operations are bound to.
    pub fn current_target(&self) -> Drawable {
        self.bound
    }

    /// Number of times a different target had to be bound.
    pub fn target_switches(&self) -> u64 {
        self.binds
    }

    // ------------------------------------------------------------------
    // Error bookkeeping

    pub fn misuse_count(&self) -> u64 {
        self.misuse_count
    }

    pub fn last_misuse(&self) -> Option<&BridgeError> {
        self.last_misuse.as_ref()
    }

    fn misuse(&mut self, msg: String) {
        warn!("ignoring request: {msg}");
        self.misuse_count += 1;
        self.last_misuse = Some(BridgeError::ProtocolMisuse(msg));
    }

    // ------------------------------------------------------------------
    // Resources

    pub fn resource_counts(&self) -> ResourceCounts {
        self.arena.counts()
    }

    /// Frees every resource still held. Returns what was reclaimed.
    pub(crate) fn release_all(&mut self) -> SweepReport {
        self.bound = Drawable::Window;
        self.arena.sweep()
    }

    fn depth_of(&self, d: Drawable) -> Option<u8> {
        match d {
            Drawable::Window => Some(color::VISUAL_DEPTH),
            Drawable::Pixmap(id) => self.arena.pixmap(id).map(Image::depth),
        }
    }

    fn image(&self, d: Drawable) -> Option<&Image> {
        match d {
            Drawable::Window => self.window.backbuffer().image(),
            Drawable::Pixmap(id) => self.arena.pixmap(id),
        }
    }

    fn bind(&mut self, target: Drawable) -> Bound<'_> {
        let previous = self.bound;
        if previous != target {
            trace!("binding {target} (was {previous})");
            self.binds += 1;
        }
        self.bound = target;
        Bound { display: self, previous }
    }

    pub fn create_pixmap(&mut self, d: Drawable, width: u32, height: u32, depth: u8) -> Result<PixmapId, BridgeError> {
        if self.depth_of(d).is_none() {
            return Err(BridgeError::ProtocolMisuse(format!("create_pixmap: unknown drawable {d}")));
        }
        if depth != 1 && depth != color::VISUAL_DEPTH {
            return Err(BridgeError::ProtocolMisuse(format!("create_pixmap: unsupported depth {depth}")));
        }
        let (width, height) = (width.max(1), height.max(1));
        self.arena.reserve_pixmap(width, height)?;
        // New pixmap contents are undefined; make that visible instead of handing out zeroes.
        let fill = if depth == 1 { 0 } else { rand::rng().random::<u32>() | 0xFF00_0000 };
        let image = Image::filled(width, height, depth, fill)?;
        let id = self.arena.insert_pixmap(image)?;
        trace!("created {id} {width}x{height}x{depth}");
        Ok(id)
    }

    /// Creates a pixmap from XBM bits: set bits become `fg`, clear bits `bg`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_pixmap_from_bitmap_data(
        &mut self,
        d: Drawable,
        bits: &[u8],
        width: u32,
        height: u32,
        fg: Pixel,
        bg: Pixel,
        depth: u8,
    ) -> Result<PixmapId, BridgeError> {
        let bitmap = Image::from_bitmap_bits(bits, width, height)?;
        let id = self.create_pixmap(d, width, height, depth)?;
        let mut gc = GraphicsContext::new(depth);
        gc.set_foreground(fg);
        gc.set_background(bg);
        if let Some(img) = self.arena.pixmap_mut(id) {
            blit(img, &gc, &bitmap, bitmap.bounds(), 0, 0, BlitSource::Plane(1));
        }
        Ok(id)
    }

    pub fn free_pixmap(&mut self, id: PixmapId) {
        if self.arena.remove_pixmap(id).is_none() {
            self.misuse(format!("free_pixmap: unknown {id}"));
        } else if self.bound == Drawable::Pixmap(id) {
            self.bound = Drawable::Window;
        }
    }

    pub fn create_gc(&mut self, d: Drawable, mask: GcMask, values: &GcValues) -> Result<GcId, BridgeError> {
        let depth = self
            .depth_of(d)
            .ok_or_else(|| BridgeError::ProtocolMisuse(format!("create_gc: unknown drawable {d}")))?;
        let gc = GraphicsContext::with_values(depth, mask, values);
        self.arena.insert_gc(gc)
    }

    pub fn free_gc(&mut self, gc: GcId) {
        if self.arena.remove_gc(gc).is_none() {
            self.misuse(format!("free_gc: unknown {gc}"));
        }
    }

    pub fn get_gc_values(&self, gc: GcId) -> Option<GcValues> {
        self.arena.gc(gc).map(|g| g.values().clone())
    }

    fn with_gc(&mut self, gc: GcId, what: &str, f: impl FnOnce(&mut GraphicsContext)) {
        match self.arena.gc_mut(gc) {
            Some(g) => f(g),
            None => self.misuse(format!("{what}: unknown {gc}")),
        }
    }

    pub fn change_gc(&mut self, gc: GcId, mask: GcMask, values: &GcValues) {
        self.with_gc(gc, "change_gc", |g| g.change(mask, values));
    }

    pub fn set_foreground(&mut self, gc: GcId, pixel: Pixel) {
        self.with_gc(gc, "set_foreground", |g| g.set_foreground(pixel));
    }

    pub fn set_background(&mut self, gc: GcId, pixel: Pixel) {
        self.with_gc(gc, "set_background", |g| g.set_background(pixel));
    }

    pub fn set_function(&mut self, gc: GcId, op: RasterOp) {
        self.with_gc(gc, "set_function", |g| g.set_function(op));
    }

    pub fn set_plane_mask(&mut self, gc: GcId, mask: u32) {
        self.with_gc(gc, "set_plane_mask", |g| g.set_plane_mask(mask));
    }

    pub fn set_line_attributes(&mut self, gc: GcId, width: u32, style: LineStyle, cap: CapStyle, join: JoinStyle) {
        self.with_gc(gc, "set_line_attributes", |g| g.set_line_attributes(width, style, cap, join));
    }

    pub fn set_dashes(&mut self, gc: GcId, offset: u32, dashes: &[u8]) {
        let mut result = Ok(());
        self.with_gc(gc, "set_dashes", |g| result = g.set_dashes(offset, dashes));
        if let Err(e) = result {
            self.misuse(e.to_string());
        }
    }

    pub fn set_fill_rule(&mut self, gc: GcId, rule: FillRule) {
        self.with_gc(gc, "set_fill_rule", |g| g.set_fill_rule(rule));
    }

    pub fn set_arc_mode(&mut self, gc: GcId, mode: ArcMode) {
        self.with_gc(gc, "set_arc_mode", |g| g.set_arc_mode(mode));
    }

    pub fn set_font(&mut self, gc: GcId, font: FontId) {
        if self.arena.font(font).is_none() {
            self.misuse(format!("set_font: unknown {font}"));
            return;
        }
        self.with_gc(gc, "set_font", |g| g.set_font(Some(font)));
    }

    pub fn set_clip_origin(&mut self, gc: GcId, x: i32, y: i32) {
        self.with_gc(gc, "set_clip_origin", |g| g.set_clip_origin(x, y));
    }

    pub fn set_clip_rectangles(&mut self, gc: GcId, x: i32, y: i32, rects: &[Rect]) {
        self.with_gc(gc, "set_clip_rectangles", |g| g.set_clip_rectangles(x, y, rects.to_vec()));
    }

    /// Clips to one rectangle, or removes the clip.
    pub fn set_clip_rectangle(&mut self, gc: GcId, rect: Option<Rect>) {
        self.with_gc(gc, "set_clip_rectangle", |g| match rect {
            Some(r) => g.set_clip_rectangles(0, 0, vec![r]),
            None => {
                g.set_clip_origin(0, 0);
                let _ = g.set_clip_mask(None);
            }
        });
    }

    /// Uses a depth-1 pixmap as the clip mask. Its contents are copied now.
    pub fn set_clip_mask(&mut self, gc: GcId, mask: Option<PixmapId>) {
        let stencil = match mask {
            None => None,
            Some(id) => match self.arena.pixmap(id) {
                Some(img) => Some(Arc::new(img.clone())),
                None => {
                    self.misuse(format!("set_clip_mask: unknown {id}"));
                    return;
                }
            },
        };
        let mut result = Ok(());
        self.with_gc(gc, "set_clip_mask", |g| result = g.set_clip_mask(stencil));
        if let Err(e) = result {
            self.misuse(e.to_string());
        }
    }

    pub fn set_alpha_allowed(&mut self, gc: GcId, allowed: bool) {
        self.with_gc(gc, "set_alpha_allowed", |g| g.set_alpha_allowed(allowed));
    }

    pub fn set_antialiasing(&mut self, gc: GcId, on: bool) {
        self.with_gc(gc, "set_antialiasing", |g| g.set_antialias(on));
    }

    pub fn load_font(&mut self, name: &str) -> Result<FontId, BridgeError> {
        let font = Font::load(name).ok_or_else(|| BridgeError::ProtocolMisuse(format!("no font matches {name:?}")))?;
        Ok(self.arena.insert_font(font))
    }

    pub fn free_font(&mut self, font: FontId) {
        if self.arena.remove_font(font).is_none() {
            self.misuse(format!("free_font: unknown {font}"));
        }
    }

    pub fn text_extents(&self, font: FontId, text: &str) -> Option<TextExtents> {
        self.arena.font(font).map(|f| f.extents(text))
    }

    pub fn text_width(&self, font: FontId, text: &str) -> Option<u32> {
        self.arena.font(font).map(|f| f.text_width(text))
    }

    // ------------------------------------------------------------------
    // Colours

    /// Fills in the exact colour and returns its pixel.
    pub fn alloc_color(&self, c: &mut Color16) -> Pixel {
        let pixel = color::alloc_color(*c);
        *c = color::query_color(pixel);
        pixel
    }

    pub fn alloc_named_color(&self, name: &str) -> Option<Pixel> {
        color::parse_color(name).map(color::alloc_color)
    }

    pub fn parse_color(&self, spec: &str) -> Option<Color16> {
        color::parse_color(spec)
    }

    pub fn query_color(&self, pixel: Pixel) -> Color16 {
        color::query_color(pixel)
    }

    // ------------------------------------------------------------------
    // Drawing

    /// Looks up a context for drawing on `d`. Returns a copy and the drawable bounds.
    fn context_for(&mut self, d: Drawable, gc: GcId, what: &str) -> Option<(GraphicsContext, Rect)> {
        let Some(ctx) = self.arena.gc(gc).cloned() else {
            self.misuse(format!("{what}: unknown {gc}"));
            return None;
        };
        let Some(depth) = self.depth_of(d) else {
            self.misuse(format!("{what}: unknown drawable {d}"));
            return None;
        };
        if depth != ctx.depth() {
            self.misuse(format!("{what}: {gc} has depth {} but {d} has depth {depth}", ctx.depth()));
            return None;
        }
        let bounds = match self.image(d) {
            Some(img) => img.bounds(),
            None => {
                self.misuse(format!("{what}: {d} has no storage yet"));
                return None;
            }
        };
        Some((ctx, bounds))
    }

    fn paint(&mut self, d: Drawable, gc: &GraphicsContext, jobs: Vec<Paint>) {
        let mut bound = self.bind(d);
        let mut dirty: Option<Rect> = None;
        if let Some(image) = bound.image() {
            for mut job in jobs {
                if let Some(r) = paint_coverage(image, gc, &mut job.coverage, job.pixel) {
                    dirty = Some(dirty.map_or(r, |d| d.union(&r)));
                }
            }
        }
        if let (Drawable::Window, Some(r)) = (d, dirty) {
            bound.display.window.backbuffer_mut().add_dirty(r);
        }
    }

    /// Builds coverage per item and paints each item on its own.
    fn draw_each<T>(
        &mut self,
        d: Drawable,
        gc: GcId,
        what: &str,
        items: &[T],
        mut build: impl FnMut(&T, &GraphicsContext, Rect) -> Vec<Paint>,
    ) {
        let Some((ctx, bounds)) = self.context_for(d, gc, what) else {
            return;
        };
        trace!("{what}: {} item(s) on {d}", items.len());
        for item in items {
            let jobs = build(item, &ctx, bounds);
            self.paint(d, &ctx, jobs);
        }
    }

    pub fn draw_point(&mut self, d: Drawable, gc: GcId, x: i32, y: i32) {
        self.draw_points(d, gc, &[Point::new(x, y)], CoordMode::Origin);
    }

    pub fn draw_points(&mut self, d: Drawable, gc: GcId, points: &[Point], mode: CoordMode) {
        let points = to_absolute(points, mode);
        self.draw_each(d, gc, "draw_points", &[points], |pts, ctx, _| {
            let mut coverage = Coverage::new();
            for p in pts {
                coverage.push_pixel(p.x, p.y);
            }
            vec![Paint { coverage, pixel: ctx.foreground() }]
        });
    }

    pub fn draw_line(&mut self, d: Drawable, gc: GcId, x1: i32, y1: i32, x2: i32, y2: i32) {
        self.draw_lines(d, gc, &[Point::new(x1, y1), Point::new(x2, y2)], CoordMode::Origin);
    }

    /// A connected polyline; joints use the context's join style.
    pub fn draw_lines(&mut self, d: Drawable, gc: GcId, points: &[Point], mode: CoordMode) {
        let points = to_absolute(points, mode);
        self.draw_each(d, gc, "draw_lines", &[points], |pts, ctx, bounds| {
            Paint::from_stroke(stroke_polyline(pts, ctx, bounds), ctx)
        });
    }

    /// Independent segments, each capped on its own.
    pub fn draw_segments(&mut self, d: Drawable, gc: GcId, segments: &[Segment]) {
        self.draw_each(d, gc, "draw_segments", segments, |s, ctx, bounds| {
            let pts = [Point::new(s.x1, s.y1), Point::new(s.x2, s.y2)];
            Paint::from_stroke(stroke_polyline(&pts, ctx, bounds), ctx)
        });
    }

    /// Outlines a rectangle covering `width + 1` by `height + 1` pixels.
    pub fn draw_rectangle(&mut self, d: Drawable, gc: GcId, x: i32, y: i32, width: u32, height: u32) {
        self.draw_rectangles(d, gc, &[Rect::new(x, y, width, height)]);
    }

    pub fn draw_rectangles(&mut self, d: Drawable, gc: GcId, rects: &[Rect]) {
        self.draw_each(d, gc, "draw_rectangles", rects, |r, ctx, bounds| {
            let (x0, y0) = (r.x, r.y);
            let (x1, y1) = (r.right(), r.bottom());
            let pts = [
                Point::new(x0, y0),
                Point::new(x1, y0),
                Point::new(x1, y1),
                Point::new(x0, y1),
                Point::new(x0, y0),
            ];
            Paint::from_stroke(stroke_polyline(&pts, ctx, bounds), ctx)
        });
    }

    pub fn fill_rectangle(&mut self, d: Drawable, gc: GcId, x: i32, y: i32, width: u32, height: u32) {
        self.fill_rectangles(d, gc, &[Rect::new(x, y, width, height)]);
    }

    pub fn fill_rectangles(&mut self, d: Drawable, gc: GcId, rects: &[Rect]) {
        self.draw_each(d, gc, "fill_rectangles", rects, |r, ctx, bounds| {
            let mut coverage = Coverage::new();
            if let Some(r) = r.intersect(&bounds) {
                coverage.push_rect(r);
            }
            vec![Paint { coverage, pixel: ctx.foreground() }]
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_arc(&mut self, d: Drawable, gc: GcId, x: i32, y: i32, width: u32, height: u32, angle1: i32, angle2: i32) {
        self.draw_arcs(d, gc, &[EllipticArc::new(x, y, width, height, angle1, angle2)]);
    }

    pub fn draw_arcs(&mut self, d: Drawable, gc: GcId, arcs: &[EllipticArc]) {
        self.draw_each(d, gc, "draw_arcs", arcs, |a, ctx, bounds| {
            Paint::from_stroke(stroke_arc(a, ctx, bounds), ctx)
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fill_arc(&mut self, d: Drawable, gc: GcId, x: i32, y: i32, width: u32, height: u32, angle1: i32, angle2: i32) {
        self.fill_arcs(d, gc, &[EllipticArc::new(x, y, width, height, angle1, angle2)]);
    }

    pub fn fill_arcs(&mut self, d: Drawable, gc: GcId, arcs: &[EllipticArc]) {
        self.draw_each(d, gc, "fill_arcs", arcs, |a, ctx, bounds| {
            vec![Paint { coverage: fill_arc(a, ctx, bounds), pixel: ctx.foreground() }]
        });
    }

    pub fn fill_polygon(&mut self, d: Drawable, gc: GcId, points: &[Point], mode: CoordMode) {
        let points = to_absolute(points, mode);
        self.draw_each(d, gc, "fill_polygon", &[points], |pts, ctx, bounds| {
            let mut coverage = Coverage::new();
            fill_polygon(pts, ctx.values().fill_rule, bounds, &mut coverage);
            vec![Paint { coverage, pixel: ctx.foreground() }]
        });
    }

    fn font_for(&self, gc: &GraphicsContext) -> Font {
        gc.values()
            .font
            .and_then(|id| self.arena.font(id).cloned())
            .unwrap_or_else(Font::default_font)
    }

    /// Draws glyphs only; the baseline starts at `(x, y)`.
    pub fn draw_string(&mut self, d: Drawable, gc: GcId, x: i32, y: i32, text: &str) {
        let Some((ctx, _)) = self.context_for(d, gc, "draw_string") else {
            return;
        };
        let font = self.font_for(&ctx);
        let mut coverage = Coverage::new();
        font.render(text, x, y, &mut coverage, None);
        let pixel = ctx.foreground();
        self.paint(d, &ctx, vec![Paint { coverage, pixel }]);
    }

    /// Draws glyphs over their cells filled with the background. The function is always copy.
    pub fn draw_image_string(&mut self, d: Drawable, gc: GcId, x: i32, y: i32, text: &str) {
        let Some((ctx, _)) = self.context_for(d, gc, "draw_image_string") else {
            return;
        };
        let font = self.font_for(&ctx);
        self.draw_image_string_with(d, &ctx, &font, x, y, text);
    }

    /// [`draw_image_string`](Self::draw_image_string) with a context and font
    /// the caller owns, for overlays that live outside the effect's resources.
    pub(crate) fn draw_image_string_with(
        &mut self,
        d: Drawable,
        ctx: &GraphicsContext,
        font: &Font,
        x: i32,
        y: i32,
        text: &str,
    ) {
        if self.depth_of(d) != Some(ctx.depth()) {
            return self.misuse(format!("draw_image_string: context depth {} does not match {d}", ctx.depth()));
        }
        let mut ctx = ctx.clone();
        ctx.set_function(RasterOp::Copy);
        let mut fg = Coverage::new();
        let mut bg = Coverage::new();
        font.render(text, x, y, &mut fg, Some(&mut bg));
        let jobs = vec![
            Paint { coverage: bg, pixel: ctx.background() },
            Paint { coverage: fg, pixel: ctx.foreground() },
        ];
        self.paint(d, &ctx, jobs);
    }

    /// Draws part of a client image. Depth-1 images are drawn in the
    /// foreground and background; full-depth images blend when the context
    /// allows alpha.
    #[allow(clippy::too_many_arguments)]
    pub fn put_image(
        &mut self,
        d: Drawable,
        gc: GcId,
        image: &Image,
        src_x: i32,
        src_y: i32,
        dst_x: i32,
        dst_y: i32,
        width: u32,
        height: u32,
    ) {
        let Some((ctx, _)) = self.context_for(d, gc, "put_image") else {
            return;
        };
        let mode = if image.depth() == 1 {
            BlitSource::Plane(1)
        } else if ctx.depth() == 1 {
            self.misuse(format!("put_image: depth {} image on a depth 1 drawable", image.depth()));
            return;
        } else if ctx.values().alpha_allowed {
            BlitSource::Blend
        } else {
            BlitSource::Direct
        };
        let src_rect = Rect::new(src_x, src_y, width, height);
        let mut bound = self.bind(d);
        let dirty = bound.image().and_then(|target| blit(target, &ctx, image, src_rect, dst_x, dst_y, mode));
        if let (Drawable::Window, Some(r)) = (d, dirty) {
            bound.display.window.backbuffer_mut().add_dirty(r);
        }
    }

    /// Reads back a rectangle, which must lie inside the drawable.
    pub fn get_image(&mut self, d: Drawable, rect: Rect) -> Result<Image, BridgeError> {
        let image = self
            .image(d)
            .ok_or_else(|| BridgeError::ProtocolMisuse(format!("get_image: unknown drawable {d}")))?;
        if rect.is_empty() || rect.intersect(&image.bounds()) != Some(rect) {
            return Err(BridgeError::ProtocolMisuse(format!(
                "get_image: {rect:?} is not inside {d}"
            )));
        }
        image.sub_image(rect)
    }

    /// Copies a rectangle between drawables of the same depth.
    ///
    /// Source areas outside the source drawable are not copied. When the
    /// destination is the window those areas are cleared to its background.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_area(
        &mut self,
        src: Drawable,
        dst: Drawable,
        gc: GcId,
        src_x: i32,
        src_y: i32,
        width: u32,
        height: u32,
        dst_x: i32,
        dst_y: i32,
    ) {
        let Some((ctx, bounds)) = self.context_for(dst, gc, "copy_area") else {
            return;
        };
        match self.depth_of(src) {
            None => return self.misuse(format!("copy_area: unknown drawable {src}")),
            Some(depth) if depth != ctx.depth() => {
                return self.misuse(format!(
                    "copy_area: {src} has depth {depth} but {dst} has depth {}; use copy_plane",
                    ctx.depth()
                ))
            }
            Some(_) => {}
        }

        let dst_rect = Rect::new(dst_x, dst_y, width, height);
        if ctx.values().function.ignores_source() {
            let mut coverage = Coverage::new();
            if let Some(r) = dst_rect.intersect(&bounds) {
                coverage.push_rect(r);
            }
            let pixel = ctx.foreground();
            return self.paint(dst, &ctx, vec![Paint { coverage, pixel }]);
        }

        let src_rect = Rect::new(src_x, src_y, width, height);
        let (visible, copied) = match self.image(src) {
            Some(img) => {
                let visible = src_rect.intersect(&img.bounds());
                // Copy out first so source and destination may be the same drawable.
                let copied = match visible.map(|v| img.sub_image(v)) {
                    Some(Ok(tmp)) => Some(tmp),
                    Some(Err(e)) => return self.misuse(format!("copy_area: {e}")),
                    None => None,
                };
                (visible, copied)
            }
            None => return self.misuse(format!("copy_area: {src} has no storage yet")),
        };
        let background = self.window.background();

        let mut bound = self.bind(dst);
        let Some(target) = bound.image() else {
            return;
        };
        let mut dirty = None;
        if let (Some(v), Some(tmp)) = (visible, &copied) {
            let (dx, dy) = (dst_x + (v.x - src_x), dst_y + (v.y - src_y));
            dirty = blit(target, &ctx, tmp, tmp.bounds(), dx, dy, BlitSource::Direct);
        }
        if dst == Drawable::Window && visible != Some(src_rect) {
            let exposed = match visible {
                Some(v) => dst_rect.subtract(&v.translate(dst_x - src_x, dst_y - src_y)),
                None => vec![dst_rect],
            };
            let target_bounds = target.bounds();
            let mut coverage = Coverage::new();
            for r in exposed.iter().filter_map(|r| r.intersect(&target_bounds)) {
                coverage.push_rect(r);
            }
            // Exposed areas are cleared through the context so its clip and planes apply.
            let mut fill = ctx.clone();
            fill.set_function(RasterOp::Copy);
            if let Some(r) = paint_coverage(target, &fill, &mut coverage, background) {
                dirty = Some(dirty.map_or(r, |d: Rect| d.union(&r)));
            }
        }
        if let (Drawable::Window, Some(r)) = (dst, dirty) {
            bound.display.window.backbuffer_mut().add_dirty(r);
        }
    }

    /// Copies one bit plane of `src`: set bits draw the foreground, clear bits the background.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_plane(
        &mut self,
        src: Drawable,
        dst: Drawable,
        gc: GcId,
        src_x: i32,
        src_y: i32,
        width: u32,
        height: u32,
        dst_x: i32,
        dst_y: i32,
        plane: u32,
    ) {
        if plane.count_ones() != 1 {
            return self.misuse(format!("copy_plane: plane {plane:#x} must have exactly one bit set"));
        }
        let Some((ctx, _)) = self.context_for(dst, gc, "copy_plane") else {
            return;
        };
        let src_rect = Rect::new(src_x, src_y, width, height);
        let copied = match self.image(src) {
            Some(img) => match src_rect.intersect(&img.bounds()).map(|v| (v, img.sub_image(v))) {
                Some((v, Ok(tmp))) => Some((v, tmp)),
                Some((_, Err(e))) => return self.misuse(format!("copy_plane: {e}")),
                None => None,
            },
            None => return self.misuse(format!("copy_plane: unknown drawable {src}")),
        };
        let Some((v, tmp)) = copied else {
            return;
        };
        let mut bound = self.bind(dst);
        let (dx, dy) = (dst_x + (v.x - src_x), dst_y + (v.y - src_y));
        let dirty = bound
            .image()
            .and_then(|target| blit(target, &ctx, &tmp, tmp.bounds(), dx, dy, BlitSource::Plane(plane)));
        if let (Drawable::Window, Some(r)) = (dst, dirty) {
            bound.display.window.backbuffer_mut().add_dirty(r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::SurfaceSize;

    fn display(w: u32, h: u32) -> Display {
        let mut d = Display::new(Viewport::new(w, h), ResourceLimits::default());
        d.window_mut().realize().unwrap();
        d
    }

    fn pixel(d: &Display, x: i32, y: i32) -> Pixel {
        d.window().backbuffer().image().unwrap().get_pixel(x, y).unwrap()
    }

    #[test]
    fn red_diagonal_touches_only_the_diagonal() {
        let mut d = display(200, 200);
        let gc = d.create_gc(Drawable::Window, GcMask::empty(), &GcValues::default()).unwrap();
        d.set_foreground(gc, color::rgb(255, 0, 0));
        d.window_mut().backbuffer_mut().take_dirty();

        d.draw_line(Drawable::Window, gc, 0, 0, 199, 199);

        for i in 0..200 {
            assert_eq!(pixel(&d, i, i), color::rgb(255, 0, 0), "({i}, {i})");
        }
        assert_eq!(pixel(&d, 1, 0), color::BLACK_PIXEL);
        assert_eq!(pixel(&d, 0, 1), color::BLACK_PIXEL);
        assert_eq!(pixel(&d, 150, 20), color::BLACK_PIXEL);
        assert_eq!(pixel(&d, 198, 199), color::BLACK_PIXEL);
        assert_eq!(d.window().backbuffer().dirty(), Some(Rect::new(0, 0, 200, 200)));
        assert_eq!(d.misuse_count(), 0);
    }

    #[test]
    fn xor_twice_restores_the_window() {
        let mut d = display(64, 64);
        let gc = d.create_gc(Drawable::Window, GcMask::empty(), &GcValues::default()).unwrap();
        d.set_foreground(gc, color::rgb(10, 200, 30));
        d.fill_rectangle(Drawable::Window, gc, 5, 5, 30, 30);
        let before = d.window().backbuffer().image().unwrap().clone();

        d.set_function(gc, RasterOp::Xor);
        d.set_line_attributes(gc, 5, LineStyle::OnOffDash, CapStyle::Round, JoinStyle::Round);
        for _ in 0..2 {
            d.draw_lines(
                Drawable::Window,
                gc,
                &[Point::new(2, 2), Point::new(60, 10), Point::new(20, 50)],
                CoordMode::Origin,
            );
            d.fill_arc(Drawable::Window, gc, 10, 10, 40, 30, 0, 270 * 64);
            d.draw_string(Drawable::Window, gc, 3, 60, "xor");
        }
        assert!(*d.window().backbuffer().image().unwrap() == before);
    }

    #[test]
    fn pixmap_drawing_restores_the_window_binding() {
        let mut d = display(20, 20);
        let pm = d.create_pixmap(Drawable::Window, 8, 8, 32).unwrap();
        let gc = d.create_gc(Drawable::Pixmap(pm), GcMask::empty(), &GcValues::default()).unwrap();
        d.fill_rectangle(Drawable::Pixmap(pm), gc, 0, 0, 8, 8);
        assert_eq!(d.current_target(), Drawable::Window);
        assert_eq!(d.target_switches(), 1);
        // Pixmap drawing does not dirty the window.
        d.window_mut().backbuffer_mut().take_dirty();
        d.fill_rectangle(Drawable::Pixmap(pm), gc, 0, 0, 8, 8);
        assert_eq!(d.window().backbuffer().dirty(), None);

        d.copy_area(Drawable::Pixmap(pm), Drawable::Window, gc, 0, 0, 8, 8, 4, 4);
        assert_eq!(pixel(&d, 4, 4), color::WHITE_PIXEL);
        assert_eq!(pixel(&d, 11, 11), color::WHITE_PIXEL);
        assert_eq!(pixel(&d, 12, 12), color::BLACK_PIXEL);
    }

    #[test]
    fn depth_mismatch_is_ignored_and_counted() {
        let mut d = display(16, 16);
        let bitmap = d.create_pixmap(Drawable::Window, 4, 4, 1).unwrap();
        let mono_gc = d.create_gc(Drawable::Pixmap(bitmap), GcMask::empty(), &GcValues::default()).unwrap();
        let gc = d.create_gc(Drawable::Window, GcMask::empty(), &GcValues::default()).unwrap();

        d.fill_rectangle(Drawable::Window, mono_gc, 0, 0, 4, 4);
        assert_eq!(d.misuse_count(), 1);
        assert_eq!(pixel(&d, 0, 0), color::BLACK_PIXEL);

        d.copy_area(Drawable::Pixmap(bitmap), Drawable::Window, gc, 0, 0, 4, 4, 0, 0);
        assert_eq!(d.misuse_count(), 2);
        assert!(matches!(d.last_misuse(), Some(BridgeError::ProtocolMisuse(_))));

        // The explicit conversion path works.
        d.fill_rectangle(Drawable::Pixmap(bitmap), mono_gc, 0, 0, 2, 4);
        d.set_foreground(gc, color::rgb(0, 0, 255));
        d.set_background(gc, color::rgb(0, 255, 0));
        d.copy_plane(Drawable::Pixmap(bitmap), Drawable::Window, gc, 0, 0, 4, 4, 8, 8, 1);
        assert_eq!(pixel(&d, 8, 8), color::rgb(0, 0, 255));
        assert_eq!(pixel(&d, 11, 8), color::rgb(0, 255, 0));
        assert_eq!(d.misuse_count(), 2);
    }

    #[test]
    fn copy_area_clears_exposed_window_area() {
        let mut d = display(10, 10);
        d.set_window_background(color::rgb(0, 0, 200));
        let gc = d.create_gc(Drawable::Window, GcMask::empty(), &GcValues::default()).unwrap();
        d.fill_rectangle(Drawable::Window, gc, 0, 0, 10, 10);

        // Scroll left by 3: the rightmost three columns have no source.
        d.copy_area(Drawable::Window, Drawable::Window, gc, 3, 0, 10, 10, 0, 0);
        assert_eq!(pixel(&d, 6, 5), color::WHITE_PIXEL);
        assert_eq!(pixel(&d, 7, 5), color::rgb(0, 0, 200));
        assert_eq!(pixel(&d, 9, 9), color::rgb(0, 0, 200));
    }

    #[test]
    fn exposed_area_fill_respects_the_clip() {
        let mut d = display(10, 10);
        d.set_window_background(color::rgb(0, 0, 200));
        let gc = d.create_gc(Drawable::Window, GcMask::empty(), &GcValues::default()).unwrap();
        d.fill_rectangle(Drawable::Window, gc, 0, 0, 10, 10);
        d.set_clip_rectangle(gc, Some(Rect::new(6, 0, 2, 2)));

        d.copy_area(Drawable::Window, Drawable::Window, gc, 3, 0, 10, 10, 0, 0);
        // Inside the clip the exposed column is cleared.
        assert_eq!(pixel(&d, 7, 0), color::rgb(0, 0, 200));
        assert_eq!(pixel(&d, 6, 1), color::WHITE_PIXEL);
        // Outside it nothing changes, exposed or not.
        assert_eq!(pixel(&d, 8, 8), color::WHITE_PIXEL);
        assert_eq!(pixel(&d, 7, 5), color::WHITE_PIXEL);
        assert_eq!(pixel(&d, 9, 0), color::WHITE_PIXEL);
    }

    #[test]
    fn gc_changes_only_affect_later_draws_through_that_gc() {
        let (red, green, blue) = (color::rgb(255, 0, 0), color::rgb(0, 255, 0), color::rgb(0, 0, 255));
        let mut d = display(20, 10);
        let pm = d.create_pixmap(Drawable::Window, 20, 10, 32).unwrap();
        let a = d.create_gc(Drawable::Window, GcMask::empty(), &GcValues::default()).unwrap();
        let b = d.create_gc(Drawable::Pixmap(pm), GcMask::empty(), &GcValues::default()).unwrap();
        d.set_foreground(a, red);
        d.set_foreground(b, green);
        d.fill_rectangle(Drawable::Window, a, 0, 0, 5, 5);
        d.fill_rectangle(Drawable::Pixmap(pm), b, 0, 0, 5, 5);

        d.set_foreground(a, blue);
        d.set_function(a, RasterOp::Xor);

        // Pixels already drawn keep their colours.
        assert_eq!(pixel(&d, 0, 0), red);
        let pm_pixel = |d: &mut Display, x, y| d.get_image(Drawable::Pixmap(pm), Rect::new(x, y, 1, 1)).unwrap().pixels()[0];
        assert_eq!(pm_pixel(&mut d, 0, 0), green);

        // The other context still copies green, on either drawable.
        d.fill_rectangle(Drawable::Pixmap(pm), b, 10, 0, 5, 5);
        d.fill_rectangle(Drawable::Window, b, 15, 0, 5, 5);
        assert_eq!(pm_pixel(&mut d, 10, 0), green);
        assert_eq!(pixel(&d, 15, 0), green);

        // The changed context xors blue from now on.
        d.fill_rectangle(Drawable::Window, a, 10, 0, 5, 5);
        assert_eq!(pixel(&d, 10, 0), blue);
        d.fill_rectangle(Drawable::Window, a, 0, 0, 1, 1);
        assert_eq!(pixel(&d, 0, 0), color::rgb(255, 0, 255));
        assert_eq!(d.misuse_count(), 0);
    }

    #[test]
    fn rectangles_near_the_coordinate_limit_do_not_overflow() {
        let mut d = display(8, 8);
        let gc = d.create_gc(Drawable::Window, GcMask::empty(), &GcValues::default()).unwrap();
        d.draw_rectangle(Drawable::Window, gc, i32::MAX - 5, i32::MAX - 5, 100, 100);
        d.draw_rectangles(Drawable::Window, gc, &[Rect::new(-3, 2, u32::MAX / 4, 3)]);
        assert_eq!(pixel(&d, 0, 2), color::WHITE_PIXEL);
        assert_eq!(pixel(&d, 0, 3), color::BLACK_PIXEL);
        assert_eq!(d.misuse_count(), 0);
    }

    #[test]
    fn copy_area_with_clear_fills_destination() {
        let mut d = display(10, 10);
        let gc = d.create_gc(Drawable::Window, GcMask::empty(), &GcValues::default()).unwrap();
        d.fill_rectangle(Drawable::Window, gc, 0, 0, 10, 10);
        d.set_function(gc, RasterOp::Clear);
        d.copy_area(Drawable::Window, Drawable::Window, gc, 50, 50, 2, 2, 1, 1);
        assert_eq!(pixel(&d, 1, 1) & color::COLOR_PLANES, 0);
        assert_eq!(pixel(&d, 3, 3), color::WHITE_PIXEL);
    }

    #[test]
    fn freed_ids_are_misuse_not_panics() {
        let mut d = display(8, 8);
        let gc = d.create_gc(Drawable::Window, GcMask::empty(), &GcValues::default()).unwrap();
        let pm = d.create_pixmap(Drawable::Window, 2, 2, 32).unwrap();
        d.free_pixmap(pm);
        d.free_gc(gc);
        d.fill_rectangle(Drawable::Window, gc, 0, 0, 1, 1);
        d.free_pixmap(pm);
        assert!(d.get_geometry(Drawable::Pixmap(pm)).is_err());
        assert_eq!(d.misuse_count(), 2);
    }

    #[test]
    fn pixmap_limits_are_out_of_resources() {
        let limits = ResourceLimits { max_pixmaps: 1, ..ResourceLimits::default() };
        let mut d = Display::new(Viewport::new(4, 4), limits);
        d.create_pixmap(Drawable::Window, 2, 2, 32).unwrap();
        let err = d.create_pixmap(Drawable::Window, 2, 2, 32).unwrap_err();
        assert!(matches!(err, BridgeError::OutOfResources(_)));
        assert!(err.is_recoverable());
        assert!(d.create_pixmap(Drawable::Window, 2, 2, 8).is_err());

        // The byte limit is checked before any pixels are allocated.
        let limits = ResourceLimits { max_pixmap_bytes: 4096, ..ResourceLimits::default() };
        let mut d = Display::new(Viewport::new(4, 4), limits);
        let started = std::time::Instant::now();
        let err = d.create_pixmap(Drawable::Window, 8192, 8192, 32).unwrap_err();
        assert!(matches!(err, BridgeError::OutOfResources(_)));
        assert!(started.elapsed() < std::time::Duration::from_millis(250));
        assert_eq!(d.resource_counts().pixmap_bytes, 0);
        assert!(d.create_pixmap(Drawable::Window, 32, 32, 32).is_ok());
    }

    #[test]
    fn bitmap_pixmaps_and_clip_masks() {
        let mut d = display(8, 1);
        // 0b0000_0101: pixels 0 and 2 set.
        let mask = d
            .create_pixmap_from_bitmap_data(Drawable::Window, &[0b0000_0101], 8, 1, 1, 0, 1)
            .unwrap();
        let gc = d.create_gc(Drawable::Window, GcMask::empty(), &GcValues::default()).unwrap();
        d.set_clip_mask(gc, Some(mask));
        d.fill_rectangle(Drawable::Window, gc, 0, 0, 8, 1);
        assert_eq!(pixel(&d, 0, 0), color::WHITE_PIXEL);
        assert_eq!(pixel(&d, 1, 0), color::BLACK_PIXEL);
        assert_eq!(pixel(&d, 2, 0), color::WHITE_PIXEL);

        // A full-depth pixmap is not a valid mask.
        let deep = d.create_pixmap(Drawable::Window, 1, 1, 32).unwrap();
        d.set_clip_mask(gc, Some(deep));
        assert_eq!(d.misuse_count(), 1);
    }

    #[test]
    fn clip_rectangle_limits_fills() {
        let mut d = display(10, 10);
        let gc = d.create_gc(Drawable::Window, GcMask::empty(), &GcValues::default()).unwrap();
        d.set_clip_rectangle(gc, Some(Rect::new(2, 2, 3, 3)));
        d.fill_rectangle(Drawable::Window, gc, 0, 0, 10, 10);
        assert_eq!(pixel(&d, 2, 2), color::WHITE_PIXEL);
        assert_eq!(pixel(&d, 5, 5), color::BLACK_PIXEL);
        d.set_clip_rectangle(gc, None);
        d.fill_rectangle(Drawable::Window, gc, 0, 0, 10, 10);
        assert_eq!(pixel(&d, 5, 5), color::WHITE_PIXEL);
    }

    #[test]
    fn image_string_paints_its_background_box() {
        let mut d = display(40, 20);
        let font = d.load_font("fixed").unwrap();
        let gc = d.create_gc(Drawable::Window, GcMask::empty(), &GcValues::default()).unwrap();
        d.set_font(gc, font);
        d.set_background(gc, color::rgb(255, 0, 0));
        d.set_function(gc, RasterOp::Xor);
        let ext = d.text_extents(font, "ab").unwrap();
        d.draw_image_string(Drawable::Window, gc, 0, ext.ascent as i32, "ab");
        // Top-left corner of the first cell is background, drawn with copy.
        assert_eq!(pixel(&d, 0, 0), color::rgb(255, 0, 0));
        assert!(d.load_font("no-such-font").is_err());
    }

    #[test]
    fn put_and_get_image() {
        let mut d = display(6, 6);
        let gc = d.create_gc(Drawable::Window, GcMask::empty(), &GcValues::default()).unwrap();
        let img = Image::filled(2, 2, 32, color::rgb(1, 2, 3)).unwrap();
        d.put_image(Drawable::Window, gc, &img, 0, 0, 4, 4, 2, 2);
        let back = d.get_image(Drawable::Window, Rect::new(4, 4, 2, 2)).unwrap();
        assert_eq!(back, img);
        assert!(d.get_image(Drawable::Window, Rect::new(5, 5, 2, 2)).is_err());

        d.set_alpha_allowed(gc, true);
        let half = Image::filled(1, 1, 32, color::rgba(255, 255, 255, 0)).unwrap();
        d.put_image(Drawable::Window, gc, &half, 0, 0, 0, 0, 1, 1);
        assert_eq!(pixel(&d, 0, 0), color::BLACK_PIXEL);
    }

    #[test]
    fn screen_queries() {
        let mut d = display(150, 75);
        assert_eq!(d.display_width_mm(), 51);
        assert_eq!(d.display_height_mm(), 25);
        assert_eq!(d.get_geometry(Drawable::Window).unwrap().depth, 32);
        assert_eq!(
            d.translate_coordinates(Drawable::Window, Drawable::Window, 3, 4),
            Some(Point::new(3, 4))
        );
        d.clear_area(0, 0, 0, 0);
        assert_eq!(d.window().backbuffer().size(), Some(SurfaceSize::new(150, 75)));
        let mut c = Color16::opaque(0xFFFF, 0, 0x1234);
        let p = d.alloc_color(&mut c);
        assert_eq!(p, color::rgb(255, 0, 0x12));
        assert_eq!(c.blue, 0x1212);
    }

    #[test]
    fn coord_mode_previous_is_relative() {
        let pts = to_absolute(&[Point::new(1, 1), Point::new(2, 0), Point::new(0, 3)], CoordMode::Previous);
        assert_eq!(pts, vec![Point::new(1, 1), Point::new(3, 1), Point::new(3, 4)]);
    }
}
