//! Graphics context emulation.
//!
//! A [`GraphicsContext`] is a bag of drawing state (raster function, colours,
//! line attributes, clipping) that primitives consult on every call. Values
//! are changed either one at a time through the setters or in bulk through
//! [`GraphicsContext::change`] with a [`GcMask`] selecting which fields apply.
//! The most recently applied value always wins.

use crate::arena::FontId;
use crate::color::{self, Pixel};
use crate::errors::BridgeError;
use crate::geometry::Rect;
use crate::image::Image;
use bitflags::bitflags;
use std::sync::Arc;

/// The sixteen boolean raster functions, in their conventional numeric order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RasterOp {
    Clear,
    And,
    AndReverse,
    #[default]
    Copy,
    AndInverted,
    Noop,
    Xor,
    Or,
    Nor,
    Equiv,
    Invert,
    OrReverse,
    CopyInverted,
    OrInverted,
    Nand,
    Set,
}

impl RasterOp {
    const ALL: [RasterOp; 16] = [
        RasterOp::Clear,
        RasterOp::And,
        RasterOp::AndReverse,
        RasterOp::Copy,
        RasterOp::AndInverted,
        RasterOp::Noop,
        RasterOp::Xor,
        RasterOp::Or,
        RasterOp::Nor,
        RasterOp::Equiv,
        RasterOp::Invert,
        RasterOp::OrReverse,
        RasterOp::CopyInverted,
        RasterOp::OrInverted,
        RasterOp::Nand,
        RasterOp::Set,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Combines `src` and `dst` bitwise, over all 32 bits.
    #[inline]
    pub fn combine(self, src: u32, dst: u32) -> u32 {
        match self {
            RasterOp::Clear => 0,
            RasterOp::And => src & dst,
            RasterOp::AndReverse => src & !dst,
            RasterOp::Copy => src,
            RasterOp::AndInverted => !src & dst,
            RasterOp::Noop => dst,
            RasterOp::Xor => src ^ dst,
            RasterOp::Or => src | dst,
            RasterOp::Nor => !(src | dst),
            RasterOp::Equiv => !src ^ dst,
            RasterOp::Invert => !dst,
            RasterOp::OrReverse => src | !dst,
            RasterOp::CopyInverted => !src,
            RasterOp::OrInverted => !src | dst,
            RasterOp::Nand => !(src & dst),
            RasterOp::Set => u32::MAX,
        }
    }

    /// Applies the op to the planes in `planes`; every other bit keeps `dst`.
    #[inline]
    pub fn apply(self, src: u32, dst: u32, planes: u32) -> u32 {
        (self.combine(src, dst) & planes) | (dst & !planes)
    }

    /// Whether the result depends on the existing destination pixel.
    pub fn reads_destination(self) -> bool {
        !matches!(
            self,
            RasterOp::Clear | RasterOp::Copy | RasterOp::CopyInverted | RasterOp::Set
        )
    }

    /// Whether the result is independent of the source pixel.
    pub fn ignores_source(self) -> bool {
        matches!(
            self,
            RasterOp::Clear | RasterOp::Noop | RasterOp::Invert | RasterOp::Set
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineStyle {
    #[default]
    Solid,
    OnOffDash,
    DoubleDash,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CapStyle {
    NotLast,
    #[default]
    Butt,
    Round,
    Projecting,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JoinStyle {
    #[default]
    Miter,
    Round,
    Bevel,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FillRule {
    #[default]
    EvenOdd,
    Winding,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArcMode {
    Chord,
    #[default]
    PieSlice,
}

/// Clipping applied to every primitive drawn with a context.
///
/// Rectangles and masks are positioned relative to the clip origin.
#[derive(Clone, Debug, Default)]
pub enum Clip {
    #[default]
    None,
    Rectangles(Vec<Rect>),
    /// A depth-1 image; only pixels where the mask is 1 are drawn.
    Mask(Arc<Image>),
}

bitflags! {
    /// Selects which fields of [`GcValues`] a [`GraphicsContext::change`] applies.
    pub struct GcMask: u32 {
        const FUNCTION      = 1 << 0;
        const PLANE_MASK    = 1 << 1;
        const FOREGROUND    = 1 << 2;
        const BACKGROUND    = 1 << 3;
        const LINE_WIDTH    = 1 << 4;
        const LINE_STYLE    = 1 << 5;
        const CAP_STYLE     = 1 << 6;
        const JOIN_STYLE    = 1 << 7;
        const FILL_RULE     = 1 << 8;
        const ARC_MODE      = 1 << 9;
        const FONT          = 1 << 10;
        const CLIP_X_ORIGIN = 1 << 11;
        const CLIP_Y_ORIGIN = 1 << 12;
        const DASH_OFFSET   = 1 << 13;
        const DASH_LIST     = 1 << 14;
        const ALPHA_ALLOWED = 1 << 15;
        const ANTIALIAS     = 1 << 16;
    }
}

/// Plain values of a graphics context.
#[derive(Clone, Debug, PartialEq)]
pub struct GcValues {
    pub function: RasterOp,
    pub plane_mask: u32,
    pub foreground: Pixel,
    pub background: Pixel,
    pub line_width: u32,
    pub line_style: LineStyle,
    pub cap_style: CapStyle,
    pub join_style: JoinStyle,
    pub fill_rule: FillRule,
    pub arc_mode: ArcMode,
    pub font: Option<FontId>,
    pub clip_x_origin: i32,
    pub clip_y_origin: i32,
    pub dash_offset: u32,
    /// Uniform dash length; applying it sets the dash list to `[dashes, dashes]`.
    pub dashes: u8,
    /// Honour the alpha byte of source pixels by blending instead of replacing.
    pub alpha_allowed: bool,
    pub antialias: bool,
}

impl GcValues {
    /// Defaults for a context created against a drawable of `depth`.
    pub fn for_depth(depth: u8) -> Self {
        Self {
            function: RasterOp::Copy,
            plane_mask: u32::MAX,
            foreground: color::white_pixel(depth),
            background: color::black_pixel(depth),
            line_width: 1,
            line_style: LineStyle::Solid,
            cap_style: CapStyle::Butt,
            join_style: JoinStyle::Miter,
            fill_rule: FillRule::EvenOdd,
            arc_mode: ArcMode::PieSlice,
            font: None,
            clip_x_origin: 0,
            clip_y_origin: 0,
            dash_offset: 0,
            dashes: 4,
            alpha_allowed: false,
            antialias: true,
        }
    }
}

impl Default for GcValues {
    fn default() -> Self {
        Self::for_depth(color::VISUAL_DEPTH)
    }
}

/// Drawing state bound to one depth.
#[derive(Clone, Debug)]
pub struct GraphicsContext {
    depth: u8,
    values: GcValues,
    dash_list: Vec<u8>,
    clip: Clip,
}

impl GraphicsContext {
    pub fn new(depth: u8) -> Self {
        let values = GcValues::for_depth(depth);
        let dash_list = vec![values.dashes, values.dashes];
        Self {
            depth,
            values,
            dash_list,
            clip: Clip::None,
        }
    }

    /// Creates a context and applies `values` selected by `mask` on top of the defaults.
    pub fn with_values(depth: u8, mask: GcMask, values: &GcValues) -> Self {
        let mut gc = Self::new(depth);
        gc.change(mask, values);
        gc
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn values(&self) -> &GcValues {
        &self.values
    }

    pub fn dash_list(&self) -> &[u8] {
        &self.dash_list
    }

    pub fn clip(&self) -> &Clip {
        &self.clip
    }

    /// Copies the fields selected by `mask` from `values`.
    pub fn change(&mut self, mask: GcMask, values: &GcValues) {
        let v = &mut self.values;
        if mask.contains(GcMask::FUNCTION) {
            v.function = values.function;
        }
        if mask.contains(GcMask::PLANE_MASK) {
            v.plane_mask = values.plane_mask;
        }
        if mask.contains(GcMask::FOREGROUND) {
            v.foreground = values.foreground;
        }
        if mask.contains(GcMask::BACKGROUND) {
            v.background = values.background;
        }
        if mask.contains(GcMask::LINE_WIDTH) {
            v.line_width = values.line_width;
        }
        if mask.contains(GcMask::LINE_STYLE) {
            v.line_style = values.line_style;
        }
        if mask.contains(GcMask::CAP_STYLE) {
            v.cap_style = values.cap_style;
        }
        if mask.contains(GcMask::JOIN_STYLE) {
            v.join_style = values.join_style;
        }
        if mask.contains(GcMask::FILL_RULE) {
            v.fill_rule = values.fill_rule;
        }
        if mask.contains(GcMask::ARC_MODE) {
            v.arc_mode = values.arc_mode;
        }
        if mask.contains(GcMask::FONT) {
            v.font = values.font;
        }
        if mask.contains(GcMask::CLIP_X_ORIGIN) {
            v.clip_x_origin = values.clip_x_origin;
        }
        if mask.contains(GcMask::CLIP_Y_ORIGIN) {
            v.clip_y_origin = values.clip_y_origin;
        }
        if mask.contains(GcMask::DASH_OFFSET) {
            v.dash_offset = values.dash_offset;
        }
        if mask.contains(GcMask::DASH_LIST) && values.dashes > 0 {
            v.dashes = values.dashes;
            self.dash_list = vec![values.dashes, values.dashes];
        }
        if mask.contains(GcMask::ALPHA_ALLOWED) {
            v.alpha_allowed = values.alpha_allowed;
        }
        if mask.contains(GcMask::ANTIALIAS) {
            v.antialias = values.antialias;
        }
    }

    pub fn set_function(&mut self, op: RasterOp) {
        self.values.function = op;
    }

    pub fn set_plane_mask(&mut self, mask: u32) {
        self.values.plane_mask = mask;
    }

    pub fn set_foreground(&mut self, pixel: Pixel) {
        self.values.foreground = pixel;
    }

    pub fn set_background(&mut self, pixel: Pixel) {
        self.values.background = pixel;
    }

    pub fn set_line_attributes(&mut self, width: u32, style: LineStyle, cap: CapStyle, join: JoinStyle) {
        self.values.line_width = width;
        self.values.line_style = style;
        self.values.cap_style = cap;
        self.values.join_style = join;
    }

    pub fn set_fill_rule(&mut self, rule: FillRule) {
        self.values.fill_rule = rule;
    }

    pub fn set_arc_mode(&mut self, mode: ArcMode) {
        self.values.arc_mode = mode;
    }

    pub fn set_font(&mut self, font: Option<FontId>) {
        self.values.font = font;
    }

    pub fn set_alpha_allowed(&mut self, allowed: bool) {
        self.values.alpha_allowed = allowed;
    }

    pub fn set_antialias(&mut self, on: bool) {
        self.values.antialias = on;
    }

    /// Replaces the dash pattern. Every entry must be non-zero.
    pub fn set_dashes(&mut self, offset: u32, dashes: &[u8]) -> Result<(), BridgeError> {
        if dashes.is_empty() || dashes.contains(&0) {
            return Err(BridgeError::ProtocolMisuse(format!(
                "dash list must be non-empty with non-zero entries, got {dashes:?}"
            )));
        }
        self.values.dash_offset = offset;
        self.values.dashes = dashes[0];
        self.dash_list = dashes.to_vec();
        Ok(())
    }

    pub fn set_clip_origin(&mut self, x: i32, y: i32) {
        self.values.clip_x_origin = x;
        self.values.clip_y_origin = y;
    }

    pub fn set_clip_rectangles(&mut self, x: i32, y: i32, rects: Vec<Rect>) {
        self.set_clip_origin(x, y);
        self.clip = Clip::Rectangles(rects);
    }

    /// Sets or removes the clip mask. The mask must have depth 1.
    pub fn set_clip_mask(&mut self, mask: Option<Arc<Image>>) -> Result<(), BridgeError> {
        match mask {
            None => self.clip = Clip::None,
            Some(m) if m.depth() == 1 => self.clip = Clip::Mask(m),
            Some(m) => {
                return Err(BridgeError::ProtocolMisuse(format!(
                    "clip mask must have depth 1, got {}",
                    m.depth()
                )))
            }
        }
        Ok(())
    }

    /// Planes the current function may modify on this context's depth.
    pub fn planes(&self) -> u32 {
        self.values.plane_mask & color::planes_for_depth(self.depth)
    }

    /// Normalizes a pixel for this context's depth.
    ///
    /// Depth 1 keeps only the low bit. Full-depth pixels are forced opaque
    /// unless alpha is allowed.
    pub fn normalize_pixel(&self, pixel: Pixel) -> Pixel {
        if self.depth == 1 {
            pixel & 1
        } else if self.values.alpha_allowed {
            pixel
        } else {
            pixel | 0xFF00_0000
        }
    }

    /// Whether `pixel` is representable on this context's depth without normalization.
    pub fn is_valid_pixel(&self, pixel: Pixel) -> bool {
        self.depth != 1 || pixel <= 1
    }

    pub fn foreground(&self) -> Pixel {
        self.normalize_pixel(self.values.foreground)
    }

    pub fn background(&self) -> Pixel {
        self.normalize_pixel(self.values.background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_protocol() {
        let gc = GraphicsContext::new(32);
        let v = gc.values();
        assert_eq!(v.function, RasterOp::Copy);
        assert_eq!(v.foreground, color::WHITE_PIXEL);
        assert_eq!(v.background, color::BLACK_PIXEL);
        assert_eq!(v.line_width, 1);
        assert_eq!(v.cap_style, CapStyle::Butt);
        assert_eq!(v.join_style, JoinStyle::Miter);
        assert_eq!(v.fill_rule, FillRule::EvenOdd);
        assert!(!v.alpha_allowed);
        assert!(v.antialias);

        let mono = GraphicsContext::new(1);
        assert_eq!(mono.foreground(), 1);
        assert_eq!(mono.background(), 0);
    }

    #[test]
    fn last_set_value_wins() {
        let mut gc = GraphicsContext::new(32);
        gc.set_foreground(color::rgb(1, 2, 3));
        gc.set_function(RasterOp::Xor);

        let mut values = GcValues::default();
        values.foreground = color::rgb(9, 9, 9);
        values.function = RasterOp::Or;
        gc.change(GcMask::FOREGROUND, &values);

        assert_eq!(gc.values().foreground, color::rgb(9, 9, 9));
        // FUNCTION was not in the mask
        assert_eq!(gc.values().function, RasterOp::Xor);

        gc.set_foreground(color::rgb(4, 5, 6));
        assert_eq!(gc.foreground(), color::rgb(4, 5, 6));
    }

    #[test]
    fn all_sixteen_functions_follow_truth_tables() {
        // Bit patterns: src = 0b1100, dst = 0b1010 enumerate the four input pairs.
        let (s, d) = (0b1100u32, 0b1010u32);
        let expected = [
            0b0000, 0b1000, 0b0100, 0b1100, 0b0010, 0b1010, 0b0110, 0b1110, 0b0001, 0b1001,
            0b0101, 0b1101, 0b0011, 0b1011, 0b0111, 0b1111,
        ];
        for (code, want) in expected.iter().enumerate() {
            let op = RasterOp::from_code(code as u8).unwrap();
            assert_eq!(op.code() as usize, code);
            assert_eq!(op.combine(s, d) & 0b1111, *want, "{op:?}");
        }
        assert_eq!(RasterOp::from_code(16), None);
    }

    #[test]
    fn apply_respects_planes() {
        let dst = 0x80_10_20_30;
        let out = RasterOp::Set.apply(0, dst, color::COLOR_PLANES);
        assert_eq!(out, 0x80_FF_FF_FF);
        let twice = RasterOp::Xor.apply(0x00_FF_00_FF, RasterOp::Xor.apply(0x00_FF_00_FF, dst, color::COLOR_PLANES), color::COLOR_PLANES);
        assert_eq!(twice, dst);
    }

    #[test]
    fn pixel_normalization() {
        let gc = GraphicsContext::new(32);
        assert_eq!(gc.normalize_pixel(0x00_12_34_56), 0xFF_12_34_56);
        let mut alpha = GraphicsContext::new(32);
        alpha.set_alpha_allowed(true);
        assert_eq!(alpha.normalize_pixel(0x40_12_34_56), 0x40_12_34_56);
        let mono = GraphicsContext::new(1);
        assert!(!mono.is_valid_pixel(2));
        assert_eq!(mono.normalize_pixel(3), 1);
    }

    #[test]
    fn dashes_reject_zero_entries() {
        let mut gc = GraphicsContext::new(32);
        assert!(gc.set_dashes(0, &[]).is_err());
        assert!(gc.set_dashes(0, &[3, 0]).is_err());
        gc.set_dashes(2, &[3, 1, 2]).unwrap();
        assert_eq!(gc.dash_list(), &[3, 1, 2]);
        assert_eq!(gc.values().dash_offset, 2);
    }

    #[test]
    fn clip_mask_requires_depth_one() {
        let mut gc = GraphicsContext::new(32);
        let deep = Arc::new(Image::new(4, 4, 32).unwrap());
        assert!(gc.set_clip_mask(Some(deep)).is_err());
        let mask = Arc::new(Image::new(4, 4, 1).unwrap());
        gc.set_clip_mask(Some(mask)).unwrap();
        assert!(matches!(gc.clip(), Clip::Mask(_)));
    }
}
