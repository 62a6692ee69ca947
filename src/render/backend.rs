use crate::render::upload::{FrameUpload, TextureLayout};
use crate::render::Viewport;
use anyhow::{anyhow, Result};
use std::any::Any;
use std::path::Path;

/// Size of a surface in pixels. It's a simple struct to hold width and height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<Viewport> for SurfaceSize {
    fn from(vp: Viewport) -> Self {
        Self { width: vp.width, height: vp.height }
    }
}

/// Byte layout a backend wants for uploaded pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// `r, g, b, a` bytes.
    Rgba8,
    /// `b, g, r, a` bytes.
    Bgra8,
    /// Native-endian `u32` ARGB with premultiplied alpha (cairo's ARGB32).
    PreMulArgb32,
}

/// Where row 0 of a texture lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    TopLeft,
    /// GL convention: row 0 is the bottom row, so uploads are flipped.
    BottomLeft,
}

/// What a backend can do with textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendCaps {
    /// Non-power-of-two textures are supported.
    pub npot_textures: bool,
    pub format: PixelFormat,
    pub origin: Origin,
    pub max_texture_size: u32,
}

impl Default for BackendCaps {
    fn default() -> Self {
        Self {
            npot_textures: true,
            format: PixelFormat::Rgba8,
            origin: Origin::TopLeft,
            max_texture_size: 16384,
        }
    }
}

/// Handle the host can composite. Ownership & sync are backend-specific; see docs per variant.
#[derive(Clone, Debug)]
pub enum ExternalHandle {
    /// CPU pixels, owned copy of the last presented frame.
    CpuPixelsOwned { width: u32, height: u32, stride: u32, pixels: Vec<u8>, format: PixelFormat },

    /// Cairo image surface holding the last presented frame.
    #[cfg(feature = "backend_cairo")]
    CairoSurface { surface: cairo::ImageSurface, width: u32, height: u32 },

    /// App-owned texture indirection. Contract: host can resolve `id` to a usable texture.
    WgpuTextureId { id: u64, width: u32, height: u32, frame_id: u64 },

    /// Nothing to composite; only frame bookkeeping.
    NullHandle { width: u32, height: u32, frame_id: u64 },
}

/// RGBA8 snapshot of a presented frame.
#[derive(Clone)]
pub struct RgbaImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
}

impl RgbaImage {
    pub fn from_raw(pixels: Vec<u8>, width: u32, height: u32, stride: u32, format: PixelFormat) -> Result<Self> {
        if pixels.len() < (height as usize) * (stride as usize) {
            return Err(anyhow!("pixel buffer too small for image dimensions"));
        }
        Ok(Self { pixels, width, height, stride, format })
    }

    /// RGBA bytes of the pixel at `(x, y)`, converted from the stored format.
    pub fn rgba_at(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.stride + x * 4) as usize;
        let p = &self.pixels[i..i + 4];
        Some(match self.format {
            PixelFormat::Rgba8 => [p[0], p[1], p[2], p[3]],
            PixelFormat::Bgra8 => [p[2], p[1], p[0], p[3]],
            PixelFormat::PreMulArgb32 => {
                let v = u32::from_ne_bytes([p[0], p[1], p[2], p[3]]);
                let [a, r, g, b] = v.to_be_bytes();
                let un = |c: u8| if a == 0 { 0 } else { ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8 };
                [un(r), un(g), un(b), a]
            }
        })
    }

    /// Writes the image as an 8-bit RGBA PNG.
    pub fn write_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;

        let mut data = Vec::with_capacity((self.width * self.height * 4) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                data.extend_from_slice(&self.rgba_at(x, y).unwrap_or_default());
            }
        }
        writer.write_image_data(&data)?;
        Ok(())
    }
}

impl std::fmt::Debug for RgbaImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbaImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.pixels.len())
            .finish()
    }
}

/// Type-erased surface so the compositor can hold it without generics.
pub trait ErasedSurface: Any + Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn size(&self) -> SurfaceSize;
}

/// Core backend interface. Calls occur on the driver's thread.
pub trait RenderBackend: Send {
    fn name(&self) -> &str;

    fn caps(&self) -> BackendCaps;

    /// Allocates a texture surface for the given layout.
    fn create_surface(&mut self, layout: &TextureLayout) -> Result<Box<dyn ErasedSurface>>;

    /// Copies converted pixels for a region of the backbuffer into the surface.
    fn upload(&mut self, surface: &mut dyn ErasedSurface, upload: &FrameUpload) -> Result<()>;

    /// Makes the uploaded content visible.
    fn present(&mut self, surface: &mut dyn ErasedSurface) -> Result<()>;

    /// RGBA snapshot of the last presented frame.
    fn snapshot(&mut self, surface: &mut dyn ErasedSurface) -> Result<RgbaImage>;

    /// Returns an external handle for the surface, if supported.
    fn external_handle(&mut self, surface: &mut dyn ErasedSurface) -> Option<ExternalHandle>;

    /// Blocks until in-flight uploads have completed.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    /// Releases a surface created by this backend.
    fn destroy_surface(&mut self, surface: Box<dyn ErasedSurface>) {
        drop(surface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_checks_length() {
        assert!(RgbaImage::from_raw(vec![0; 15], 2, 2, 8, PixelFormat::Rgba8).is_err());
        assert!(RgbaImage::from_raw(vec![0; 16], 2, 2, 8, PixelFormat::Rgba8).is_ok());
    }

    #[test]
    fn rgba_at_undoes_format() {
        let bgra = RgbaImage::from_raw(vec![3, 2, 1, 255], 1, 1, 4, PixelFormat::Bgra8).unwrap();
        assert_eq!(bgra.rgba_at(0, 0), Some([1, 2, 3, 255]));

        let premul = 0x80_40_00_20u32.to_ne_bytes().to_vec();
        let img = RgbaImage::from_raw(premul, 1, 1, 4, PixelFormat::PreMulArgb32).unwrap();
        assert_eq!(img.rgba_at(0, 0), Some([128, 0, 64, 128]));
        assert_eq!(img.rgba_at(1, 0), None);
    }

    #[test]
    fn png_export_writes_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let img = RgbaImage::from_raw(vec![255; 2 * 2 * 4], 2, 2, 8, PixelFormat::Rgba8).unwrap();
        img.write_png(&path).unwrap();

        let decoder = png::Decoder::new(std::fs::File::open(&path).unwrap());
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().width, 2);
        assert_eq!(reader.info().height, 2);
    }
}
