//! Frames-per-second overlay, drawn over the window after each frame.
//!
//! The overlay belongs to the driver, not the effect: its context and font
//! are held here rather than in the display's resource arena, so they never
//! count against the effect's limits or show up in its teardown sweep.

use crate::color;
use crate::display::Display;
use crate::drawable::Drawable;
use crate::gc::{GcMask, GcValues, GraphicsContext};
use crate::raster::text::Font;
use log::debug;
use std::time::{Duration, Instant};

/// How often the displayed numbers are recomputed.
const SAMPLE_PERIOD: Duration = Duration::from_secs(1);
const MARGIN: i32 = 4;

/// Counts frames and the time spent drawing them.
#[derive(Debug)]
pub struct FpsOverlay {
    top: bool,
    frames: u32,
    busy: Duration,
    sample_start: Option<Instant>,
    fps: f64,
    load: f64,
    gc: GraphicsContext,
    font: Option<Font>,
}

impl FpsOverlay {
    /// `top` puts the text in the top-left corner instead of the bottom-left.
    pub fn new(top: bool) -> Self {
        let values = GcValues { foreground: color::WHITE_PIXEL, background: color::BLACK_PIXEL, ..GcValues::default() };
        let gc = GraphicsContext::with_values(color::VISUAL_DEPTH, GcMask::FOREGROUND | GcMask::BACKGROUND, &values);
        let font = Font::load("fixed");
        if font.is_none() {
            debug!("fps overlay disabled: no fixed font");
        }
        Self { top, frames: 0, busy: Duration::ZERO, sample_start: None, fps: 0.0, load: 0.0, gc, font }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Share of wall time spent in the effect's draw, 0..=1.
    pub fn load(&self) -> f64 {
        self.load
    }

    /// Records one finished frame that took `draw_time` to draw.
    pub fn record_frame(&mut self, now: Instant, draw_time: Duration) {
        let start = *self.sample_start.get_or_insert(now);
        self.frames += 1;
        self.busy += draw_time;

        let elapsed = now.saturating_duration_since(start);
        if elapsed >= SAMPLE_PERIOD {
            let secs = elapsed.as_secs_f64();
            self.fps = f64::from(self.frames) / secs;
            self.load = (self.busy.as_secs_f64() / secs).min(1.0);
            self.frames = 0;
            self.busy = Duration::ZERO;
            self.sample_start = Some(now);
        }
    }

    pub fn lines(&self) -> [String; 2] {
        [format!("FPS: {:.1}", self.fps), format!("Load: {:.1}%", self.load * 100.0)]
    }

    /// Draws the current numbers onto the window.
    pub fn draw(&self, display: &mut Display) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        let extents = font.extents("FPS");
        let line_height = (extents.ascent + extents.descent) as i32;
        let lines = self.lines();
        let block = line_height * lines.len() as i32;
        let mut y = if self.top {
            MARGIN + extents.ascent as i32
        } else {
            display.window().height() as i32 - MARGIN - block + extents.ascent as i32
        };
        for line in &lines {
            display.draw_image_string_with(Drawable::Window, &self.gc, font, MARGIN, y, line);
            y += line_height;
        }
    }
}
