//! Converting backbuffer pixels into texture uploads.

use crate::color::Pixel;
use crate::geometry::Rect;
use crate::image::Image;
use crate::render::backend::{BackendCaps, Origin, PixelFormat, SurfaceSize};

/// Smallest power of two that is `>= n` (and at least 1).
pub fn to_pow2(n: u32) -> u32 {
    n.max(1).next_power_of_two()
}

/// How backbuffer content maps onto a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureLayout {
    /// Size of the meaningful content (the window).
    pub content: SurfaceSize,
    /// Allocated texture size; padded to powers of two without NPOT support.
    pub texture: SurfaceSize,
    pub format: PixelFormat,
    pub origin: Origin,
}

impl TextureLayout {
    pub fn for_content(content: SurfaceSize, caps: &BackendCaps) -> Self {
        let texture = if caps.npot_textures {
            content
        } else {
            SurfaceSize::new(to_pow2(content.width), to_pow2(content.height))
        };
        Self { content, texture, format: caps.format, origin: caps.origin }
    }

    /// Fraction of the texture covered by content, for texture coordinates.
    pub fn content_extent(&self) -> (f32, f32) {
        if self.texture.is_empty() {
            return (0.0, 0.0);
        }
        (
            self.content.width as f32 / self.texture.width as f32,
            self.content.height as f32 / self.texture.height as f32,
        )
    }

    pub fn fits(&self, caps: &BackendCaps) -> bool {
        self.texture.width <= caps.max_texture_size && self.texture.height <= caps.max_texture_size
    }
}

/// One upload: a rectangle of converted rows, in texture coordinates.
#[derive(Clone, Debug)]
pub struct FrameUpload {
    pub layout: TextureLayout,
    /// Target rectangle in texture space (already flipped for bottom-left origins).
    pub region: Rect,
    /// Bytes per row of `bytes`.
    pub stride: u32,
    /// Rows ordered by ascending texture row.
    pub bytes: Vec<u8>,
    pub frame_id: u64,
}

#[inline]
fn encode(pixel: Pixel, format: PixelFormat) -> [u8; 4] {
    let [a, r, g, b] = pixel.to_be_bytes();
    match format {
        PixelFormat::Rgba8 => [r, g, b, a],
        PixelFormat::Bgra8 => [b, g, r, a],
        PixelFormat::PreMulArgb32 => {
            let pm = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u8;
            u32::from_be_bytes([a, pm(r), pm(g), pm(b)]).to_ne_bytes()
        }
    }
}

/// Converts `region` of `image` (window coordinates) into an upload for `layout`.
pub fn convert_region(image: &Image, region: Rect, layout: TextureLayout, frame_id: u64) -> Option<FrameUpload> {
    let region = region.intersect(&image.bounds())?;
    let stride = region.width * 4;
    let mut bytes = Vec::with_capacity(stride as usize * region.height as usize);

    let content_h = image.height() as i32;
    let tex_region = match layout.origin {
        Origin::TopLeft => region,
        Origin::BottomLeft => Rect::new(region.x, content_h - region.bottom(), region.width, region.height),
    };

    for tex_row in tex_region.y..tex_region.bottom() {
        let y = match layout.origin {
            Origin::TopLeft => tex_row,
            Origin::BottomLeft => content_h - 1 - tex_row,
        };
        let row = &image.row(y as u32)[region.x as usize..region.right() as usize];
        for &p in row {
            bytes.extend_from_slice(&encode(p, layout.format));
        }
    }

    Some(FrameUpload { layout, region: tex_region, stride, bytes, frame_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color;

    #[test]
    fn pow2_padding_only_without_npot() {
        let caps = BackendCaps { npot_textures: false, ..BackendCaps::default() };
        let layout = TextureLayout::for_content(SurfaceSize::new(200, 100), &caps);
        assert_eq!(layout.texture, SurfaceSize::new(256, 128));
        assert_eq!(layout.content_extent(), (200.0 / 256.0, 100.0 / 128.0));

        let layout = TextureLayout::for_content(SurfaceSize::new(200, 100), &BackendCaps::default());
        assert_eq!(layout.texture, SurfaceSize::new(200, 100));

        assert_eq!(to_pow2(0), 1);
        assert_eq!(to_pow2(64), 64);
        assert_eq!(to_pow2(65), 128);
    }

    #[test]
    fn bottom_left_origin_flips_rows() {
        let mut img = Image::new(2, 3, 32).unwrap();
        img.put_pixel(0, 0, color::rgb(255, 0, 0));
        let caps = BackendCaps { origin: Origin::BottomLeft, ..BackendCaps::default() };
        let layout = TextureLayout::for_content(SurfaceSize::new(2, 3), &caps);

        let up = convert_region(&img, Rect::new(0, 0, 2, 1), layout, 1).unwrap();
        assert_eq!(up.region, Rect::new(0, 2, 2, 1));
        assert_eq!(&up.bytes[..4], &[255, 0, 0, 255]);

        let full = convert_region(&img, img.bounds(), layout, 1).unwrap();
        // Window row 0 is the last texture row.
        assert_eq!(&full.bytes[2 * 8..2 * 8 + 4], &[255, 0, 0, 255]);
    }

    #[test]
    fn formats_reorder_channels() {
        let p = color::rgba(10, 20, 30, 255);
        assert_eq!(encode(p, PixelFormat::Rgba8), [10, 20, 30, 255]);
        assert_eq!(encode(p, PixelFormat::Bgra8), [30, 20, 10, 255]);
        let pm = u32::from_ne_bytes(encode(color::rgba(200, 0, 0, 0), PixelFormat::PreMulArgb32));
        assert_eq!(pm, 0);
    }
}
