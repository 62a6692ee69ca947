use crate::render::backend::{
    BackendCaps, ErasedSurface, ExternalHandle, Origin, RenderBackend, RgbaImage, SurfaceSize,
};
use crate::render::upload::{FrameUpload, TextureLayout};
use anyhow::{anyhow, Result};
use std::any::Any;

/// Software backend: textures are plain byte buffers in host memory.
///
/// The presented frame can be read back through [`RenderBackend::snapshot`]
/// or handed to the host as [`ExternalHandle::CpuPixelsOwned`].
pub struct CpuBackend {
    caps: BackendCaps,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    pub fn new() -> Self {
        Self { caps: BackendCaps::default() }
    }

    /// Emulates a restricted GPU: power-of-two textures with a bottom-left origin.
    pub fn pow2_only() -> Self {
        Self {
            caps: BackendCaps { npot_textures: false, origin: Origin::BottomLeft, ..BackendCaps::default() },
        }
    }

    pub fn with_caps(caps: BackendCaps) -> Self {
        Self { caps }
    }
}

fn downcast(surface: &mut dyn ErasedSurface) -> Result<&mut CpuSurface> {
    surface
        .as_any_mut()
        .downcast_mut::<CpuSurface>()
        .ok_or_else(|| anyhow!("CpuBackend used with non-CPU surface"))
}

impl RenderBackend for CpuBackend {
    fn name(&self) -> &str {
        "CpuBackend"
    }

    fn caps(&self) -> BackendCaps {
        self.caps
    }

    fn create_surface(&mut self, layout: &TextureLayout) -> Result<Box<dyn ErasedSurface>> {
        Ok(Box::new(CpuSurface::new(*layout)?))
    }

    fn upload(&mut self, surface: &mut dyn ErasedSurface, upload: &FrameUpload) -> Result<()> {
        let s = downcast(surface)?;
        let r = upload.region;
        if r.x < 0 || r.y < 0 || r.right() as u32 > s.layout.texture.width || r.bottom() as u32 > s.layout.texture.height {
            return Err(anyhow!("upload region {r:?} outside texture {:?}", s.layout.texture));
        }

        let tex_stride = s.layout.texture.width as usize * 4;
        let row_bytes = upload.stride as usize;
        for (i, src) in upload.bytes.chunks_exact(row_bytes).enumerate() {
            let start = (r.y as usize + i) * tex_stride + r.x as usize * 4;
            s.texture[start..start + row_bytes].copy_from_slice(src);
        }
        Ok(())
    }

    fn present(&mut self, surface: &mut dyn ErasedSurface) -> Result<()> {
        let s = downcast(surface)?;
        s.frame_id = s.frame_id.wrapping_add(1);
        Ok(())
    }

    /// Reads the content region back in window orientation.
    fn snapshot(&mut self, surface: &mut dyn ErasedSurface) -> Result<RgbaImage> {
        let s = downcast(surface)?;
        let (w, h) = (s.layout.content.width as usize, s.layout.content.height as usize);
        let tex_stride = s.layout.texture.width as usize * 4;

        let mut pixels = Vec::with_capacity(w * h * 4);
        for y in 0..h {
            let tex_row = match s.layout.origin {
                Origin::TopLeft => y,
                Origin::BottomLeft => h - 1 - y,
            };
            let start = tex_row * tex_stride;
            pixels.extend_from_slice(&s.texture[start..start + w * 4]);
        }
        RgbaImage::from_raw(pixels, w as u32, h as u32, w as u32 * 4, s.layout.format)
    }

    fn external_handle(&mut self, surface: &mut dyn ErasedSurface) -> Option<ExternalHandle> {
        let s = surface.as_any_mut().downcast_mut::<CpuSurface>()?;
        Some(ExternalHandle::CpuPixelsOwned {
            width: s.layout.texture.width,
            height: s.layout.texture.height,
            stride: s.layout.texture.width * 4,
            pixels: s.texture.clone(),
            format: s.layout.format,
        })
    }
}

pub struct CpuSurface {
    layout: TextureLayout,
    texture: Vec<u8>,
    frame_id: u64,
}

impl CpuSurface {
    fn new(layout: TextureLayout) -> Result<Self> {
        let len = layout.texture.width as usize * layout.texture.height as usize * 4;
        let mut texture = Vec::new();
        texture.try_reserve_exact(len)?;
        texture.resize(len, 0);
        Ok(Self { layout, texture, frame_id: 0 })
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
}

impl ErasedSurface for CpuSurface {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn size(&self) -> SurfaceSize {
        self.layout.texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color;
    use crate::geometry::Rect;
    use crate::image::Image;
    use crate::render::upload::convert_region;

    #[test]
    fn pow2_surface_round_trips_through_flip() {
        let mut backend = CpuBackend::pow2_only();
        let layout = TextureLayout::for_content(SurfaceSize::new(3, 5), &backend.caps());
        assert_eq!(layout.texture, SurfaceSize::new(4, 8));
        let mut surface = backend.create_surface(&layout).unwrap();

        let mut img = Image::filled(3, 5, 32, color::BLACK_PIXEL).unwrap();
        img.put_pixel(2, 0, color::rgb(0, 255, 0));
        let up = convert_region(&img, img.bounds(), layout, 1).unwrap();
        backend.upload(surface.as_mut(), &up).unwrap();
        backend.present(surface.as_mut()).unwrap();

        let snap = backend.snapshot(surface.as_mut()).unwrap();
        assert_eq!((snap.width, snap.height), (3, 5));
        assert_eq!(snap.rgba_at(2, 0), Some([0, 255, 0, 255]));
        assert_eq!(snap.rgba_at(0, 4), Some([0, 0, 0, 255]));
    }

    #[test]
    fn upload_outside_texture_is_an_error() {
        let mut backend = CpuBackend::new();
        let layout = TextureLayout::for_content(SurfaceSize::new(2, 2), &backend.caps());
        let mut surface = backend.create_surface(&layout).unwrap();
        let img = Image::new(4, 4, 32).unwrap();
        let up = convert_region(&img, Rect::new(0, 0, 4, 4), layout, 1).unwrap();
        assert!(backend.upload(surface.as_mut(), &up).is_err());
    }
}
