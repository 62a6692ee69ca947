use crate::geometry::Rect;
use crate::render::backend::{
    BackendCaps, ErasedSurface, ExternalHandle, PixelFormat, RenderBackend, RgbaImage, SurfaceSize,
};
use crate::render::upload::{FrameUpload, TextureLayout};
use anyhow::{anyhow, Result};
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Counters {
    surfaces_created: AtomicU64,
    uploads: AtomicU64,
    bytes_uploaded: AtomicU64,
    presents: AtomicU64,
    last_region: Mutex<Option<Rect>>,
}

/// Shared view of what a [`NullBackend`] was asked to do.
#[derive(Clone, Debug, Default)]
pub struct NullStats(Arc<Counters>);

impl NullStats {
    pub fn surfaces_created(&self) -> u64 {
        self.0.surfaces_created.load(Ordering::Relaxed)
    }

    pub fn uploads(&self) -> u64 {
        self.0.uploads.load(Ordering::Relaxed)
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.0.bytes_uploaded.load(Ordering::Relaxed)
    }

    pub fn presents(&self) -> u64 {
        self.0.presents.load(Ordering::Relaxed)
    }

    pub fn last_region(&self) -> Option<Rect> {
        match self.0.last_region.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Null backend renderer that does not perform any rendering.
///
/// It accepts uploads and counts them, which makes it the backend of choice
/// for tests and headless runs.
pub struct NullBackend {
    stats: NullStats,
    fail_allocation: bool,
    caps: BackendCaps,
}

impl NullBackend {
    /// Creates a new instance of the null backend.
    pub fn new() -> Result<Self> {
        Ok(Self::new_with_stats().0)
    }

    pub fn new_with_stats() -> (Self, NullStats) {
        let stats = NullStats::default();
        let backend = Self { stats: stats.clone(), fail_allocation: false, caps: BackendCaps::default() };
        (backend, stats)
    }

    /// A backend whose texture allocation always fails.
    pub fn failing() -> (Self, NullStats) {
        let (mut backend, stats) = Self::new_with_stats();
        backend.fail_allocation = true;
        (backend, stats)
    }

    pub fn with_caps(mut self, caps: BackendCaps) -> Self {
        self.caps = caps;
        self
    }
}

impl RenderBackend for NullBackend {
    fn name(&self) -> &str {
        "NullBackend"
    }

    fn caps(&self) -> BackendCaps {
        self.caps
    }

    fn create_surface(&mut self, layout: &TextureLayout) -> Result<Box<dyn ErasedSurface>> {
        if self.fail_allocation {
            return Err(anyhow!(
                "texture allocation of {}x{} refused",
                layout.texture.width,
                layout.texture.height
            ));
        }
        self.stats.0.surfaces_created.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(NullSurface::new(layout.content)?))
    }

    fn upload(&mut self, surface: &mut dyn ErasedSurface, upload: &FrameUpload) -> Result<()> {
        let _ = surface
            .as_any_mut()
            .downcast_mut::<NullSurface>()
            .ok_or_else(|| anyhow!("NullBackend used with non-Null surface"))?;

        self.stats.0.uploads.fetch_add(1, Ordering::Relaxed);
        self.stats.0.bytes_uploaded.fetch_add(upload.bytes.len() as u64, Ordering::Relaxed);
        if let Ok(mut g) = self.stats.0.last_region.lock() {
            *g = Some(upload.region);
        }
        Ok(())
    }

    fn present(&mut self, surface: &mut dyn ErasedSurface) -> Result<()> {
        let s = surface
            .as_any_mut()
            .downcast_mut::<NullSurface>()
            .ok_or_else(|| anyhow!("NullBackend used with non-Null surface"))?;

        s.frame_id = s.frame_id.wrapping_add(1);
        self.stats.0.presents.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn snapshot(&mut self, surface: &mut dyn ErasedSurface) -> Result<RgbaImage> {
        let s = surface
            .as_any_mut()
            .downcast_mut::<NullSurface>()
            .ok_or_else(|| anyhow!("NullBackend used with non-Null surface"))?;

        let pixels = vec![0u8; (s.size.width * s.size.height * 4) as usize];
        RgbaImage::from_raw(pixels, s.size.width, s.size.height, s.size.width * 4, PixelFormat::Rgba8)
    }

    fn external_handle(&mut self, surface: &mut dyn ErasedSurface) -> Option<ExternalHandle> {
        let s = surface.as_any_mut().downcast_mut::<NullSurface>()?;

        Some(ExternalHandle::NullHandle {
            width: s.size.width,
            height: s.size.height,
            frame_id: s.frame_id,
        })
    }
}

pub struct NullSurface {
    /// Size of the surface in pixels.
    pub size: SurfaceSize,
    /// Frame ID for the surface, used to track rendering frames.
    frame_id: u64,
}

impl NullSurface {
    pub fn new(size: SurfaceSize) -> Result<Self> {
        Ok(Self { size, frame_id: 0 })
    }
}

impl ErasedSurface for NullSurface {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn size(&self) -> SurfaceSize {
        self.size
    }
}
