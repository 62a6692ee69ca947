//! Drawables: the single window and the pixmaps effects allocate.

use crate::arena::PixmapId;
use crate::color::{self, Pixel};
use crate::errors::BridgeError;
use crate::geometry::Point;
use crate::render::backbuffer::Backbuffer;
use crate::render::backend::SurfaceSize;
use crate::render::Viewport;
use std::fmt;

/// Something that can be drawn to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Drawable {
    /// The display's one window, backed by the backbuffer.
    Window,
    Pixmap(PixmapId),
}

impl fmt::Display for Drawable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drawable::Window => write!(f, "window"),
            Drawable::Pixmap(id) => write!(f, "{id}"),
        }
    }
}

/// Result of a geometry query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub border_width: u32,
    pub depth: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapState {
    Unmapped,
    Viewable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowAttributes {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub border_width: u32,
    pub depth: u8,
    pub background: Pixel,
    pub map_state: MapState,
}

/// The window: host surface description plus the backbuffer drawn into.
#[derive(Debug)]
pub struct Window {
    viewport: Viewport,
    /// Device pixels per logical pixel.
    scale: f32,
    ignore_rotation: bool,
    background: Pixel,
    visible: bool,
    pointer: Point,
    backbuffer: Backbuffer,
}

impl Window {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            scale: 1.0,
            ignore_rotation: false,
            background: color::BLACK_PIXEL,
            visible: true,
            pointer: Point::default(),
            backbuffer: Backbuffer::new(),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Size as seen by the effect.
    pub fn size(&self) -> SurfaceSize {
        let s = self.viewport.logical_size(self.ignore_rotation);
        SurfaceSize::new(s.width.max(1), s.height.max(1))
    }

    pub fn width(&self) -> u32 {
        self.size().width
    }

    pub fn height(&self) -> u32 {
        self.size().height
    }

    pub fn ignore_rotation(&self) -> bool {
        self.ignore_rotation
    }

    pub fn background(&self) -> Pixel {
        self.background
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn pointer(&self) -> Point {
        self.pointer
    }

    pub fn backbuffer(&self) -> &Backbuffer {
        &self.backbuffer
    }

    pub fn backbuffer_mut(&mut self) -> &mut Backbuffer {
        &mut self.backbuffer
    }

    pub fn attributes(&self) -> WindowAttributes {
        let size = self.size();
        WindowAttributes {
            x: 0,
            y: 0,
            width: size.width,
            height: size.height,
            border_width: 0,
            depth: color::VISUAL_DEPTH,
            background: self.background,
            map_state: if self.visible { MapState::Viewable } else { MapState::Unmapped },
        }
    }

    pub(crate) fn set_background(&mut self, pixel: Pixel) {
        self.background = pixel | 0xFF00_0000;
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn set_pointer(&mut self, p: Point) {
        self.pointer = p;
    }

    pub(crate) fn set_ignore_rotation(&mut self, ignore: bool) {
        self.ignore_rotation = ignore;
        self.backbuffer.mark_stale(self.size());
    }

    /// Takes a new host surface description. Returns `true` when the window size changed.
    pub(crate) fn reconfigure(&mut self, viewport: Viewport, scale: f32) -> bool {
        let before = self.size();
        self.viewport = viewport;
        self.scale = scale;
        let after = self.size();
        if before != after {
            self.backbuffer.mark_stale(after);
        }
        before != after
    }

    /// Brings the backbuffer to the window size.
    pub(crate) fn realize(&mut self) -> Result<bool, BridgeError> {
        let size = self.size();
        let background = self.background;
        self.backbuffer.realize(size, background)
    }
}
