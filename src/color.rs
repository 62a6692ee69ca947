//! Pixel values and colour name parsing.
//!
//! Pixels are fixed 32-bit `0xAARRGGBB` values for full-depth drawables. Depth-1
//! drawables store `0` or `1`. Raster operations only ever touch the colour
//! planes ([`COLOR_PLANES`]), so destination alpha survives every operation.

/// A pixel value as stored in a drawable.
pub type Pixel = u32;

pub const BLACK_PIXEL: Pixel = 0xFF00_0000;
pub const WHITE_PIXEL: Pixel = 0xFFFF_FFFF;

/// Planes written by raster operations on full-depth drawables.
pub const COLOR_PLANES: u32 = 0x00FF_FFFF;
/// Planes written on depth-1 drawables.
pub const MONO_PLANES: u32 = 0x0000_0001;

/// Depth of the window and of full-colour pixmaps.
pub const VISUAL_DEPTH: u8 = 32;

/// Planes a raster op may modify for a drawable of `depth`.
pub fn planes_for_depth(depth: u8) -> u32 {
    if depth == 1 {
        MONO_PLANES
    } else {
        COLOR_PLANES
    }
}

/// The black or white pixel for a drawable of `depth`.
pub fn black_pixel(depth: u8) -> Pixel {
    if depth == 1 {
        0
    } else {
        BLACK_PIXEL
    }
}

pub fn white_pixel(depth: u8) -> Pixel {
    if depth == 1 {
        1
    } else {
        WHITE_PIXEL
    }
}

/// A colour with 16-bit channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color16 {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub alpha: u16,
}

impl Color16 {
    pub const fn opaque(red: u16, green: u16, blue: u16) -> Self {
        Self { red, green, blue, alpha: 0xFFFF }
    }

    /// Expands 8-bit channels the way a server would (`c << 8 | c`).
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::opaque(widen(r), widen(g), widen(b))
    }
}

const fn widen(c: u8) -> u16 {
    ((c as u16) << 8) | c as u16
}

/// Allocates the pixel for a colour. Only the high byte of each channel is kept.
pub fn alloc_color(color: Color16) -> Pixel {
    let a = (color.alpha >> 8) as u32;
    let r = (color.red >> 8) as u32;
    let g = (color.green >> 8) as u32;
    let b = (color.blue >> 8) as u32;
    (a << 24) | (r << 16) | (g << 8) | b
}

/// Inverse of [`alloc_color`].
pub fn query_color(pixel: Pixel) -> Color16 {
    let [a, r, g, b] = pixel.to_be_bytes();
    Color16 {
        red: widen(r),
        green: widen(g),
        blue: widen(b),
        alpha: widen(a),
    }
}

pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Pixel {
    ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

pub const fn rgb(r: u8, g: u8, b: u8) -> Pixel {
    rgba(r, g, b, 0xFF)
}

/// Splits a pixel into `[r, g, b, a]`.
pub fn to_rgba8(pixel: Pixel) -> [u8; 4] {
    let [a, r, g, b] = pixel.to_be_bytes();
    [r, g, b, a]
}

const NAMED_COLORS: &[(&str, Pixel)] = &[
    ("black", rgb(0, 0, 0)),
    ("white", rgb(255, 255, 255)),
    ("red", rgb(255, 0, 0)),
    ("green", rgb(0, 255, 0)),
    ("blue", rgb(0, 0, 255)),
    ("cyan", rgb(0, 255, 255)),
    ("magenta", rgb(255, 0, 255)),
    ("yellow", rgb(255, 255, 0)),
    ("gray", rgb(190, 190, 190)),
    ("grey", rgb(190, 190, 190)),
    ("darkgray", rgb(169, 169, 169)),
    ("darkgrey", rgb(169, 169, 169)),
    ("lightgray", rgb(211, 211, 211)),
    ("lightgrey", rgb(211, 211, 211)),
    ("orange", rgb(255, 165, 0)),
    ("purple", rgb(160, 32, 240)),
    ("pink", rgb(255, 192, 203)),
    ("brown", rgb(165, 42, 42)),
    ("navy", rgb(0, 0, 128)),
    ("gold", rgb(255, 215, 0)),
];

/// Parses `#rgb`, `#rrggbb`, `#rrrgggbbb`, `#rrrrggggbbbb` or a colour name.
pub fn parse_color(spec: &str) -> Option<Color16> {
    let spec = spec.trim();

    if let Some(hex) = spec.strip_prefix('#') {
        return parse_hex(hex);
    }

    let name: String = spec
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    NAMED_COLORS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, pixel)| query_color(*pixel))
}

fn parse_hex(hex: &str) -> Option<Color16> {
    if hex.is_empty() || hex.len() % 3 != 0 || hex.len() > 12 {
        return None;
    }
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let digits = hex.len() / 3;
    let channel = |i: usize| -> Option<u16> {
        let raw = u16::from_str_radix(&hex[i * digits..(i + 1) * digits], 16).ok()?;
        Some(match digits {
            1 => raw * 0x1111,
            2 => (raw << 8) | raw,
            3 => (raw << 4) | (raw >> 8),
            _ => raw,
        })
    };

    Some(Color16::opaque(channel(0)?, channel(1)?, channel(2)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(parse_color("#ff0000"), Some(Color16::opaque(0xFFFF, 0, 0)));
        assert_eq!(parse_color("#0f8"), Some(Color16::opaque(0, 0xFFFF, 0x8888)));
        assert_eq!(parse_color("#123456"), Some(Color16::opaque(0x1212, 0x3434, 0x5656)));
        assert_eq!(parse_color("#ffff00000000"), Some(Color16::opaque(0xFFFF, 0, 0)));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("#gg0000"), None);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!(parse_color("Red").map(alloc_color), Some(rgb(255, 0, 0)));
        assert_eq!(parse_color(" light gray ").map(alloc_color), Some(rgb(211, 211, 211)));
        assert_eq!(parse_color("no-such-colour"), None);
    }

    #[test]
    fn alloc_and_query_agree() {
        let c = Color16::from_rgb8(10, 20, 30);
        let p = alloc_color(c);
        assert_eq!(p, rgb(10, 20, 30));
        assert_eq!(query_color(p), c);
        assert_eq!(to_rgba8(p), [10, 20, 30, 255]);
    }

    #[test]
    fn depth_specific_constants() {
        assert_eq!(black_pixel(1), 0);
        assert_eq!(white_pixel(1), 1);
        assert_eq!(white_pixel(VISUAL_DEPTH), WHITE_PIXEL);
        assert_eq!(planes_for_depth(1), 1);
        assert_eq!(planes_for_depth(32), 0x00FF_FFFF);
    }
}
