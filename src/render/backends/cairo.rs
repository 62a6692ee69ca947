use crate::render::backend::{
    BackendCaps, ErasedSurface, ExternalHandle, Origin, PixelFormat, RenderBackend, RgbaImage, SurfaceSize,
};
use crate::render::upload::{FrameUpload, TextureLayout};
use anyhow::{anyhow, Result};
use std::any::Any;

/// Cairo backend: uploads land in an ARGB32 texture buffer and presenting
/// paints the content region onto a cairo image surface.
///
/// Cairo surfaces are not `Send`, so the surface keeps plain byte buffers and
/// cairo objects only live for the duration of a call.
pub struct CairoBackend;

impl Default for CairoBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CairoBackend {
    pub fn new() -> Self {
        Self {}
    }
}

fn downcast(surface: &mut dyn ErasedSurface) -> Result<&mut CairoSurface> {
    surface
        .as_any_mut()
        .downcast_mut::<CairoSurface>()
        .ok_or_else(|| anyhow!("CairoBackend used with non-Cairo surface"))
}

/// Builds an owned image surface holding a copy of `bytes`.
fn image_surface(bytes: &[u8], size: SurfaceSize, stride: i32) -> Result<cairo::ImageSurface> {
    let mut surface = cairo::ImageSurface::create(cairo::Format::ARgb32, size.width as i32, size.height as i32)?;
    if surface.stride() != stride {
        return Err(anyhow!("cairo stride {} does not match buffer stride {stride}", surface.stride()));
    }
    {
        let mut data = surface.data()?;
        data.copy_from_slice(bytes);
    }
    Ok(surface)
}

impl RenderBackend for CairoBackend {
    fn name(&self) -> &str {
        "CairoBackend"
    }

    fn caps(&self) -> BackendCaps {
        BackendCaps {
            npot_textures: true,
            format: PixelFormat::PreMulArgb32,
            origin: Origin::TopLeft,
            max_texture_size: i16::MAX as u32,
        }
    }

    fn create_surface(&mut self, layout: &TextureLayout) -> Result<Box<dyn ErasedSurface>> {
        Ok(Box::new(CairoSurface::new(*layout)?))
    }

    fn upload(&mut self, surface: &mut dyn ErasedSurface, upload: &FrameUpload) -> Result<()> {
        let s = downcast(surface)?;
        let r = upload.region;
        if r.x < 0 || r.y < 0 || r.right() as u32 > s.layout.texture.width || r.bottom() as u32 > s.layout.texture.height {
            return Err(anyhow!("upload region {r:?} outside texture"));
        }
        let row_bytes = upload.stride as usize;
        for (i, src) in upload.bytes.chunks_exact(row_bytes).enumerate() {
            let start = (r.y as usize + i) * s.stride as usize + r.x as usize * 4;
            s.texture[start..start + row_bytes].copy_from_slice(src);
        }
        Ok(())
    }

    /// Paints the content region of the texture onto the front surface.
    fn present(&mut self, surface: &mut dyn ErasedSurface) -> Result<()> {
        let s = downcast(surface)?;
        let content = s.layout.content;

        let texture = image_surface(&s.texture, s.layout.texture, s.stride)?;
        let mut front = cairo::ImageSurface::create(cairo::Format::ARgb32, content.width as i32, content.height as i32)?;
        {
            let cr = cairo::Context::new(&front)?;
            cr.set_operator(cairo::Operator::Source);
            cr.set_source_surface(&texture, 0.0, 0.0)?;
            cr.rectangle(0.0, 0.0, content.width as f64, content.height as f64);
            cr.fill()?;
        }
        front.flush();

        let front_stride = front.stride() as u32;
        s.front = front.data()?.to_vec();
        s.front_stride = front_stride;
        s.frame_id = s.frame_id.wrapping_add(1);
        Ok(())
    }

    fn snapshot(&mut self, surface: &mut dyn ErasedSurface) -> Result<RgbaImage> {
        let s = downcast(surface)?;
        if s.front.is_empty() {
            return Err(anyhow!("nothing presented yet"));
        }
        RgbaImage::from_raw(
            s.front.clone(),
            s.layout.content.width,
            s.layout.content.height,
            s.front_stride,
            PixelFormat::PreMulArgb32,
        )
    }

    fn external_handle(&mut self, surface: &mut dyn ErasedSurface) -> Option<ExternalHandle> {
        let s = surface.as_any_mut().downcast_mut::<CairoSurface>()?;
        if s.front.is_empty() {
            return None;
        }
        let content = s.layout.content;
        let surface = image_surface(&s.front, content, s.front_stride as i32).ok()?;
        Some(ExternalHandle::CairoSurface { surface, width: content.width, height: content.height })
    }
}

pub struct CairoSurface {
    layout: TextureLayout,
    /// ARGB32 texture, `stride` bytes per row.
    texture: Vec<u8>,
    stride: i32,
    /// Last presented frame at content size.
    front: Vec<u8>,
    front_stride: u32,
    frame_id: u64,
}

impl CairoSurface {
    fn new(layout: TextureLayout) -> Result<Self> {
        let stride = cairo::Format::ARgb32
            .stride_for_width(layout.texture.width)
            .unwrap_or((layout.texture.width * 4) as i32);
        let len = layout.texture.height as usize * stride as usize;
        let mut texture = Vec::new();
        texture.try_reserve_exact(len)?;
        texture.resize(len, 0);

        Ok(Self { layout, texture, stride, front: Vec::new(), front_stride: 0, frame_id: 0 })
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
}

impl ErasedSurface for CairoSurface {
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
