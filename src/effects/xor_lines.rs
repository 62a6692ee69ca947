//! A trail of bouncing lines drawn with xor, so the oldest line is erased
//! by drawing it a second time.

use crate::arena::GcId;
use crate::display::Segment;
use crate::effect::{EffectContext, EffectDescriptor, EffectState};
use crate::event::Event;
use crate::gc::{CapStyle, GcMask, GcValues, JoinStyle, LineStyle, RasterOp};
use crate::options::OptionSpec;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::time::Duration;

pub fn descriptor() -> EffectDescriptor {
    EffectDescriptor::new("xorlines", |ctx| Ok(Box::new(XorLines::new(ctx, StdRng::from_os_rng())?) as Box<dyn EffectState>))
        .class("XorLines")
        .option(OptionSpec::arg("-count", "count"))
        .option(OptionSpec::arg("-delay", "delay"))
        .option(OptionSpec::arg("-thickness", "thickness"))
        .defaults(&["*count: 24", "*delay: 20000", "*thickness: 1", "*foreground: #40c0ff"])
}

/// A moving endpoint.
#[derive(Clone, Copy, Debug)]
struct Mover {
    x: i32,
    y: i32,
    dx: i32,
    dy: i32,
}

impl Mover {
    fn random(rng: &mut StdRng, width: u32, height: u32) -> Self {
        let speed = |rng: &mut StdRng| {
            let v = rng.random_range(2..7);
            if rng.random_bool(0.5) {
                v
            } else {
                -v
            }
        };
        Self {
            x: rng.random_range(0..width.max(1) as i32),
            y: rng.random_range(0..height.max(1) as i32),
            dx: speed(rng),
            dy: speed(rng),
        }
    }

    fn step(&mut self, width: u32, height: u32) {
        let (max_x, max_y) = (width.saturating_sub(1) as i32, height.saturating_sub(1) as i32);
        self.x += self.dx;
        self.y += self.dy;
        if self.x < 0 || self.x > max_x {
            self.dx = -self.dx;
            self.x = self.x.clamp(0, max_x);
        }
        if self.y < 0 || self.y > max_y {
            self.dy = -self.dy;
            self.y = self.y.clamp(0, max_y);
        }
    }
}

struct XorLines {
    gc: GcId,
    rng: StdRng,
    ends: [Mover; 2],
    trail: VecDeque<Segment>,
    max_trail: usize,
    delay: Duration,
    width: u32,
    height: u32,
}

impl XorLines {
    fn new(ctx: &mut EffectContext<'_>, mut rng: StdRng) -> anyhow::Result<Self> {
        let res = ctx.resources;
        let values = GcValues {
            function: RasterOp::Xor,
            foreground: res.get_pixel("foreground"),
            line_width: res.get_integer("thickness").clamp(0, 64) as u32,
            cap_style: CapStyle::Round,
            ..GcValues::default()
        };
        let gc = ctx.display.create_gc(
            ctx.window,
            GcMask::FUNCTION | GcMask::FOREGROUND | GcMask::LINE_WIDTH | GcMask::CAP_STYLE,
            &values,
        )?;
        if values.line_width > 1 {
            ctx.display.set_line_attributes(gc, values.line_width, LineStyle::Solid, CapStyle::Round, JoinStyle::Round);
        }

        let (width, height) = (ctx.width(), ctx.height());
        let ends = [Mover::random(&mut rng, width, height), Mover::random(&mut rng, width, height)];
        Ok(Self {
            gc,
            rng,
            ends,
            trail: VecDeque::new(),
            max_trail: res.get_integer("count").clamp(1, 1000) as usize,
            delay: Duration::from_micros(res.get_integer("delay").clamp(0, 10_000_000) as u64),
            width,
            height,
        })
    }

    fn restart(&mut self, ctx: &mut EffectContext<'_>) {
        ctx.display.clear_window();
        self.trail.clear();
        self.ends = [
            Mover::random(&mut self.rng, self.width, self.height),
            Mover::random(&mut self.rng, self.width, self.height),
        ];
    }
}

impl EffectState for XorLines {
    fn draw(&mut self, ctx: &mut EffectContext<'_>) -> Option<Duration> {
        for end in &mut self.ends {
            end.step(self.width, self.height);
        }
        let [a, b] = self.ends;
        let segment = Segment::new(a.x, a.y, b.x, b.y);
        ctx.display.draw_segments(ctx.window, self.gc, &[segment]);
        self.trail.push_back(segment);

        while self.trail.len() > self.max_trail {
            if let Some(old) = self.trail.pop_front() {
                ctx.display.draw_segments(ctx.window, self.gc, &[old]);
            }
        }
        Some(self.delay)
    }

    fn reshape(&mut self, ctx: &mut EffectContext<'_>, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.restart(ctx);
    }

    fn event(&mut self, ctx: &mut EffectContext<'_>, event: &Event) -> bool {
        match event {
            Event::ButtonPress { .. } => {
                self.restart(ctx);
                true
            }
            _ => false,
        }
    }

    fn free(&mut self, ctx: &mut EffectContext<'_>) {
        ctx.display.free_gc(self.gc);
    }
}
