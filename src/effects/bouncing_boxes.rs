//! Outlined boxes with a ball in each, bouncing around the window. Frames
//! are composed in a pixmap and copied to the window when `doubleBuffer`
//! is on and the pixmap could be allocated.

use crate::arena::{GcId, PixmapId};
use crate::color::{self, Pixel};
use crate::drawable::Drawable;
use crate::effect::{EffectContext, EffectDescriptor, EffectState};
use crate::event::{Event, MouseButton};
use crate::gc::{GcMask, GcValues};
use crate::geometry::Rect;
use crate::options::OptionSpec;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

const MAX_BOXES: usize = 64;

pub fn descriptor() -> EffectDescriptor {
    EffectDescriptor::new("bouncingboxes", |ctx| {
        Ok(Box::new(BouncingBoxes::new(ctx, StdRng::from_os_rng())?) as Box<dyn EffectState>)
    })
    .class("BouncingBoxes")
    .option(OptionSpec::arg("-count", "count"))
    .option(OptionSpec::arg("-size", "size"))
    .option(OptionSpec::arg("-delay", "delay"))
    .option(OptionSpec::flag("-db", "doubleBuffer", "true"))
    .option(OptionSpec::flag("-no-db", "doubleBuffer", "false"))
    .defaults(&["*count: 6", "*size: 24", "*delay: 16000", "*doubleBuffer: true"])
}

#[derive(Clone, Copy, Debug)]
struct Bouncer {
    x: i32,
    y: i32,
    dx: i32,
    dy: i32,
    color: Pixel,
}

struct BouncingBoxes {
    rng: StdRng,
    boxes: Vec<Bouncer>,
    size: u32,
    delay: Duration,
    width: u32,
    height: u32,
    double_buffer: bool,
    /// Offscreen frame when double buffering.
    back: Option<PixmapId>,
    erase_gc: GcId,
    draw_gc: GcId,
}

impl BouncingBoxes {
    fn new(ctx: &mut EffectContext<'_>, rng: StdRng) -> anyhow::Result<Self> {
        let res = ctx.resources;
        let erase = GcValues { foreground: res.get_pixel("background"), ..GcValues::default() };
        let erase_gc = ctx.display.create_gc(ctx.window, GcMask::FOREGROUND, &erase)?;
        let draw_gc = ctx.display.create_gc(ctx.window, GcMask::empty(), &GcValues::default())?;

        let mut fx = Self {
            rng,
            boxes: Vec::new(),
            size: res.get_integer("size").clamp(4, 512) as u32,
            delay: Duration::from_micros(res.get_integer("delay").clamp(0, 10_000_000) as u64),
            width: ctx.width(),
            height: ctx.height(),
            double_buffer: res.get_boolean("doubleBuffer"),
            back: None,
            erase_gc,
            draw_gc,
        };
        for _ in 0..res.get_integer("count").clamp(1, MAX_BOXES as i64) {
            fx.spawn(None);
        }
        fx.allocate_back(ctx);
        Ok(fx)
    }

    /// Adds a box, centred on `at` or placed at random.
    fn spawn(&mut self, at: Option<(i32, i32)>) {
        if self.boxes.len() >= MAX_BOXES {
            return;
        }
        let max_x = self.width.saturating_sub(self.size) as i32;
        let max_y = self.height.saturating_sub(self.size) as i32;
        let half = self.size as i32 / 2;
        let (x, y) = match at {
            Some((x, y)) => ((x - half).clamp(0, max_x), (y - half).clamp(0, max_y)),
            None => (self.rng.random_range(0..=max_x), self.rng.random_range(0..=max_y)),
        };
        let mut speed = || {
            let v = self.rng.random_range(1..5);
            if self.rng.random_bool(0.5) {
                v
            } else {
                -v
            }
        };
        let (dx, dy) = (speed(), speed());
        let color = color::rgb(self.rng.random_range(64..=255), self.rng.random_range(64..=255), self.rng.random_range(64..=255));
        self.boxes.push(Bouncer { x, y, dx, dy, color });
    }

    /// Allocates the offscreen frame. Without one, frames go straight to the window.
    fn allocate_back(&mut self, ctx: &mut EffectContext<'_>) {
        if let Some(old) = self.back.take() {
            ctx.display.free_pixmap(old);
        }
        if !self.double_buffer {
            return;
        }
        match ctx.display.create_pixmap(ctx.window, self.width, self.height, color::VISUAL_DEPTH) {
            Ok(id) => self.back = Some(id),
            Err(e) => debug!("bouncingboxes: drawing without a back buffer: {e}"),
        }
    }

    fn step(&mut self) {
        let max_x = self.width.saturating_sub(self.size) as i32;
        let max_y = self.height.saturating_sub(self.size) as i32;
        for b in &mut self.boxes {
            b.x += b.dx;
            b.y += b.dy;
            if b.x <= 0 || b.x >= max_x {
                b.dx = -b.dx;
                b.x = b.x.clamp(0, max_x);
            }
            if b.y <= 0 || b.y >= max_y {
                b.dy = -b.dy;
                b.y = b.y.clamp(0, max_y);
            }
        }
    }

    fn paint(&self, ctx: &mut EffectContext<'_>, target: Drawable) {
        let d = &mut *ctx.display;
        d.fill_rectangle(target, self.erase_gc, 0, 0, self.width, self.height);
        let inset = self.size / 4;
        for b in &self.boxes {
            d.set_foreground(self.draw_gc, b.color);
            d.draw_rectangle(target, self.draw_gc, b.x, b.y, self.size - 1, self.size - 1);
            d.fill_arc(
                target,
                self.draw_gc,
                b.x + inset as i32,
                b.y + inset as i32,
                self.size - 2 * inset,
                self.size - 2 * inset,
                0,
                360 * 64,
            );
        }
    }

    fn bounds(&self) -> Rect {
        Rect::sized(self.width, self.height)
    }
}

impl EffectState for BouncingBoxes {
    fn draw(&mut self, ctx: &mut EffectContext<'_>) -> Option<Duration> {
        self.step();
        match self.back {
            Some(back) => {
                self.paint(ctx, Drawable::Pixmap(back));
                let r = self.bounds();
                ctx.display.copy_area(Drawable::Pixmap(back), ctx.window, self.draw_gc, 0, 0, r.width, r.height, 0, 0);
            }
            None => {
                let window = ctx.window;
                self.paint(ctx, window);
            }
        }
        Some(self.delay)
    }

    fn reshape(&mut self, ctx: &mut EffectContext<'_>, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.allocate_back(ctx);
        self.step();
    }

    fn event(&mut self, _ctx: &mut EffectContext<'_>, event: &Event) -> bool {
        match event {
            Event::ButtonPress { x, y, button: MouseButton::Left, .. } => {
                self.spawn(Some((*x, *y)));
                true
            }
            Event::ButtonPress { button: MouseButton::Right, .. } => {
                self.boxes.pop();
                true
            }
            _ => false,
        }
    }

    fn free(&mut self, ctx: &mut EffectContext<'_>) {
        if let Some(back) = self.back.take() {
            ctx.display.free_pixmap(back);
        }
        ctx.display.free_gc(self.erase_gc);
        ctx.display.free_gc(self.draw_gc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ResourceLimits;
    use crate::display::Display;
    use crate::event::Modifiers;
    use crate::options::{Preferences, Resources};
    use crate::render::Viewport;

    fn setup(prefs: Preferences, limits: ResourceLimits) -> (Display, Resources) {
        let mut display = Display::new(Viewport::new(100, 80), limits);
        display.window_mut().realize().unwrap();
        let d = descriptor();
        let res = Resources::load(d.name(), d.default_lines(), &prefs);
        (display, res)
    }

    #[test]
    fn boxes_stay_inside_and_the_back_buffer_follows_reshape() {
        let (mut display, res) = setup(Preferences::new(), ResourceLimits::default());
        let mut ctx = EffectContext::new(&mut display, &res, 0);
        let mut fx = BouncingBoxes::new(&mut ctx, StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(fx.boxes.len(), 6);
        let back = fx.back.expect("back buffer");

        for _ in 0..300 {
            fx.draw(&mut ctx);
            for b in &fx.boxes {
                assert!(b.x >= 0 && b.x + fx.size as i32 <= 100, "{b:?}");
                assert!(b.y >= 0 && b.y + fx.size as i32 <= 80, "{b:?}");
            }
        }

        fx.reshape(&mut ctx, 60, 40);
        let new_back = fx.back.expect("back buffer");
        assert_ne!(back, new_back);
        let geometry = ctx.display.get_geometry(Drawable::Pixmap(new_back)).unwrap();
        assert_eq!((geometry.width, geometry.height), (60, 40));

        fx.free(&mut ctx);
        drop(ctx);
        let counts = display.resource_counts();
        assert_eq!((counts.pixmaps, counts.gcs), (0, 0));
        assert_eq!(display.misuse_count(), 0);
    }

    #[test]
    fn falls_back_to_direct_drawing_without_pixmap_memory() {
        let limits = ResourceLimits { max_pixmap_bytes: 64, ..ResourceLimits::default() };
        let (mut display, res) = setup(Preferences::new(), limits);
        let mut ctx = EffectContext::new(&mut display, &res, 0);
        let mut fx = BouncingBoxes::new(&mut ctx, StdRng::seed_from_u64(9)).unwrap();
        assert!(fx.back.is_none());

        fx.draw(&mut ctx);
        // The last box is painted on top of the others.
        let b = fx.boxes[fx.boxes.len() - 1];
        drop(ctx);
        let img = display.window().backbuffer().image().unwrap();
        assert_eq!(img.get_pixel(b.x, b.y), Some(b.color));
    }

    #[test]
    fn clicks_add_and_remove_boxes() {
        let (mut display, res) = setup(Preferences::new(), ResourceLimits::default());
        let mut ctx = EffectContext::new(&mut display, &res, 0);
        let mut fx = BouncingBoxes::new(&mut ctx, StdRng::seed_from_u64(5)).unwrap();

        let left = Event::ButtonPress { x: 50, y: 40, button: MouseButton::Left, modifiers: Modifiers::empty() };
        assert!(fx.event(&mut ctx, &left));
        assert_eq!(fx.boxes.len(), 7);
        let added = fx.boxes[6];
        assert_eq!((added.x, added.y), (38, 28));

        let right = Event::ButtonPress { x: 0, y: 0, button: MouseButton::Right, modifiers: Modifiers::empty() };
        assert!(fx.event(&mut ctx, &right));
        assert_eq!(fx.boxes.len(), 6);
        assert!(!fx.event(&mut ctx, &Event::Motion { x: 1, y: 1, modifiers: Modifiers::empty() }));
    }
}
