//! Bitmap text.
//!
//! Fonts resolve to the fixed-width bitmap faces shipped with
//! `embedded-graphics`. Classic aliases (`fixed`, `9x15`, ...) and XLFD names
//! are accepted; an XLFD picks the face closest to its pixel size, weight and
//! slant. Glyphs are rendered into [`Coverage`] so text goes through the same
//! raster-op path as every other primitive.

use super::Coverage;
use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Point as EgPoint, Size},
    mono_font::{ascii, MonoFont, MonoTextStyleBuilder},
    pixelcolor::BinaryColor,
    text::{Baseline, Text},
    Drawable, Pixel,
};
use std::convert::Infallible;
use std::fmt;

/// Name of the font used when a context has none set.
pub const DEFAULT_FONT: &str = "fixed";

/// Metrics of a string in a font.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextExtents {
    pub width: u32,
    pub ascent: u32,
    pub descent: u32,
    pub lbearing: i32,
    pub rbearing: i32,
}

#[derive(Clone)]
pub struct Font {
    name: String,
    face: &'static MonoFont<'static>,
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Font")
            .field("name", &self.name)
            .field("cell", &self.face.character_size)
            .finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Weight {
    Medium,
    Bold,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Slant {
    Roman,
    Italic,
}

fn face_for(pixels: u32, weight: Weight, slant: Slant) -> &'static MonoFont<'static> {
    let bold = weight == Weight::Bold;
    let italic = slant == Slant::Italic;
    match pixels {
        0..=6 => &ascii::FONT_4X6,
        7..=8 => &ascii::FONT_5X8,
        9..=10 => &ascii::FONT_6X10,
        11..=12 => &ascii::FONT_6X12,
        13 if bold => &ascii::FONT_7X13_BOLD,
        13 if italic => &ascii::FONT_7X13_ITALIC,
        13 => &ascii::FONT_7X13,
        14 if bold => &ascii::FONT_7X14_BOLD,
        14 => &ascii::FONT_7X14,
        15 if bold => &ascii::FONT_9X15_BOLD,
        15 => &ascii::FONT_9X15,
        16..=18 if bold => &ascii::FONT_9X18_BOLD,
        16..=18 => &ascii::FONT_9X18,
        _ => &ascii::FONT_10X20,
    }
}

fn alias(name: &str) -> Option<&'static MonoFont<'static>> {
    Some(match name {
        "fixed" | "6x13" => &ascii::FONT_6X13,
        "6x13bold" => &ascii::FONT_6X13_BOLD,
        "6x10" => &ascii::FONT_6X10,
        "6x12" => &ascii::FONT_6X12,
        "7x13" => &ascii::FONT_7X13,
        "7x13bold" => &ascii::FONT_7X13_BOLD,
        "7x14" => &ascii::FONT_7X14,
        "8x13" => &ascii::FONT_8X13,
        "8x13bold" => &ascii::FONT_8X13_BOLD,
        "9x15" => &ascii::FONT_9X15,
        "9x15bold" => &ascii::FONT_9X15_BOLD,
        "9x18" => &ascii::FONT_9X18,
        "10x20" => &ascii::FONT_10X20,
        _ => return None,
    })
}

/// Picks a face for `-foundry-family-weight-slant-width-style-pixels-points-...`.
fn from_xlfd(name: &str) -> Option<&'static MonoFont<'static>> {
    let fields: Vec<&str> = name.split('-').collect();
    if fields.len() < 9 || !fields[0].is_empty() {
        return None;
    }
    let weight = if fields[3].eq_ignore_ascii_case("bold") { Weight::Bold } else { Weight::Medium };
    let slant = match fields[4] {
        "i" | "I" | "o" | "O" => Slant::Italic,
        _ => Slant::Roman,
    };
    let pixels = fields[7]
        .parse::<u32>()
        .ok()
        .filter(|p| *p > 0)
        .or_else(|| {
            // Decipoints at 75 dpi.
            fields[8].parse::<u32>().ok().filter(|p| *p > 0).map(|p| (p * 75 + 360) / 720)
        })
        .unwrap_or(13);
    Some(face_for(pixels, weight, slant))
}

impl Font {
    /// Resolves a font name. Returns `None` for names that match nothing.
    pub fn load(name: &str) -> Option<Font> {
        let key = name.trim().to_ascii_lowercase();
        let face = alias(&key).or_else(|| from_xlfd(&key))?;
        Some(Font { name: name.trim().to_string(), face })
    }

    pub fn default_font() -> Font {
        Font { name: DEFAULT_FONT.to_string(), face: &ascii::FONT_6X13 }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ascent(&self) -> u32 {
        self.face.baseline
    }

    pub fn descent(&self) -> u32 {
        self.face.character_size.height.saturating_sub(self.face.baseline)
    }

    /// Horizontal advance of one character.
    pub fn advance(&self) -> u32 {
        self.face.character_size.width + self.face.character_spacing
    }

    pub fn text_width(&self, text: &str) -> u32 {
        let n = text.chars().count() as u32;
        if n == 0 {
            0
        } else {
            n * self.advance() - self.face.character_spacing
        }
    }

    pub fn extents(&self, text: &str) -> TextExtents {
        let width = self.text_width(text);
        TextExtents {
            width,
            ascent: self.ascent(),
            descent: self.descent(),
            lbearing: 0,
            rbearing: width as i32,
        }
    }

    /// Renders `text` with its baseline starting at `(x, y)`.
    ///
    /// Glyph pixels go to `fg`. When `bg` is given, the rest of every character
    /// cell goes there, which is how image text paints its background.
    pub fn render(&self, text: &str, x: i32, y: i32, fg: &mut Coverage, bg: Option<&mut Coverage>) {
        let mut builder = MonoTextStyleBuilder::new().font(self.face).text_color(BinaryColor::On);
        if bg.is_some() {
            builder = builder.background_color(BinaryColor::Off);
        }
        let style = builder.build();
        let mut sink = CoverageSink { fg, bg };
        Text::with_baseline(text, EgPoint::new(x, y), style, Baseline::Alphabetic)
            .draw(&mut sink)
            .ok();
    }
}

/// Collects glyph pixels into coverages.
struct CoverageSink<'a> {
    fg: &'a mut Coverage,
    bg: Option<&'a mut Coverage>,
}

impl DrawTarget for CoverageSink<'_> {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(EgPoint { x, y }, color) in pixels {
            match color {
                BinaryColor::On => self.fg.push_pixel(x, y),
                BinaryColor::Off => {
                    if let Some(bg) = self.bg.as_deref_mut() {
                        bg.push_pixel(x, y);
                    }
                }
            }
        }
        Ok(())
    }
}

impl OriginDimensions for CoverageSink<'_> {
    fn size(&self) -> Size {
        Size::new(u32::MAX >> 1, u32::MAX >> 1)
    }
}
