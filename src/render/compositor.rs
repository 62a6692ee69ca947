//! Uploading the backbuffer and presenting it through a backend.
//!
//! The compositor owns the backend and its texture surface. A backend that
//! cannot allocate a surface puts the compositor into degraded mode for the
//! rest of the session: drawing continues into the backbuffer, but nothing
//! is uploaded or presented until a new backend is installed.

use crate::errors::BridgeError;
use crate::geometry::Rect;
use crate::render::backbuffer::Backbuffer;
use crate::render::backend::{ErasedSurface, ExternalHandle, RenderBackend, RgbaImage, SurfaceSize};
use crate::render::upload::{convert_region, TextureLayout};
use log::{debug, warn};

/// Why a frame was not presented.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The backend is unavailable; see [`Compositor::degraded_error`].
    Degraded,
    /// The backbuffer no longer matches the surface size; the frame is dropped.
    SizeMismatch,
    NoBackbuffer,
    UploadFailed,
    /// The compositor was released (hidden or torn down).
    Released,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented { frame_id: u64, region: Rect },
    /// Nothing was drawn since the last upload.
    Unchanged,
    Skipped(SkipReason),
}

impl PresentOutcome {
    pub fn presented(&self) -> bool {
        matches!(self, PresentOutcome::Presented { .. })
    }
}

/// Counters for frames that went through the compositor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositorStats {
    pub presented: u64,
    pub skipped: u64,
    pub uploaded_bytes: u64,
    pub surfaces_created: u64,
}

pub struct Compositor {
    backend: Box<dyn RenderBackend>,
    surface: Option<Box<dyn ErasedSurface>>,
    layout: Option<TextureLayout>,
    degraded: Option<BridgeError>,
    /// Degradation not yet reported through [`Compositor::take_error`].
    unreported: Option<BridgeError>,
    released: bool,
    dirty_uploads: bool,
    frame_id: u64,
    stats: CompositorStats,
}

impl Compositor {
    pub fn new(backend: Box<dyn RenderBackend>, dirty_uploads: bool) -> Self {
        Self {
            backend,
            surface: None,
            layout: None,
            degraded: None,
            unreported: None,
            released: false,
            dirty_uploads,
            frame_id: 0,
            stats: CompositorStats::default(),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    /// Why presentation is disabled, as [`BridgeError::BackendUnavailable`].
    pub fn degraded_error(&self) -> Option<&BridgeError> {
        self.degraded.as_ref()
    }

    /// Hands out the degradation error once, the first time it is asked for
    /// after it happened.
    pub fn take_error(&mut self) -> Option<BridgeError> {
        self.unreported.take()
    }

    fn degrade(&mut self, error: BridgeError) {
        warn!("render backend unavailable, continuing without presentation: {error}");
        self.drop_surface();
        self.unreported = Some(error.clone());
        self.degraded = Some(error);
    }

    pub fn layout(&self) -> Option<TextureLayout> {
        self.layout
    }

    pub fn stats(&self) -> CompositorStats {
        self.stats
    }

    fn skip(&mut self, reason: SkipReason) -> PresentOutcome {
        self.stats.skipped += 1;
        PresentOutcome::Skipped(reason)
    }

    fn drop_surface(&mut self) {
        if let Some(surface) = self.surface.take() {
            self.backend.destroy_surface(surface);
        }
        self.layout = None;
    }

    /// Makes sure a surface exists for `content`. Returns `true` when a new one was created.
    fn ensure_surface(&mut self, content: SurfaceSize) -> Result<bool, String> {
        if self.surface.is_some() && self.layout.map(|l| l.content) == Some(content) {
            return Ok(false);
        }
        self.drop_surface();

        let caps = self.backend.caps();
        let layout = TextureLayout::for_content(content, &caps);
        if !layout.fits(&caps) {
            return Err(format!(
                "texture {}x{} exceeds the backend maximum of {}",
                layout.texture.width, layout.texture.height, caps.max_texture_size
            ));
        }
        let surface = self
            .backend
            .create_surface(&layout)
            .map_err(|e| format!("{}: {e:#}", self.backend.name()))?;
        debug!(
            "created {}x{} surface for {}x{} content on {}",
            layout.texture.width,
            layout.texture.height,
            content.width,
            content.height,
            self.backend.name()
        );
        self.surface = Some(surface);
        self.layout = Some(layout);
        self.stats.surfaces_created += 1;
        Ok(true)
    }

    /// Uploads what changed in the backbuffer and presents it.
    ///
    /// `expected` is the current window size; a backbuffer of any other size
    /// belongs to a superseded resize and its frame is dropped.
    pub fn composite(&mut self, backbuffer: &mut Backbuffer, expected: SurfaceSize) -> PresentOutcome {
        if self.degraded.is_some() {
            backbuffer.take_dirty();
            return self.skip(SkipReason::Degraded);
        }
        if self.released {
            return self.skip(SkipReason::Released);
        }
        let Some(size) = backbuffer.size() else {
            return self.skip(SkipReason::NoBackbuffer);
        };
        if size != expected {
            debug!("dropping frame: backbuffer {size:?} does not match window {expected:?}");
            return self.skip(SkipReason::SizeMismatch);
        }

        match self.ensure_surface(size) {
            Ok(true) => backbuffer.mark_all_dirty(),
            Ok(false) => {}
            Err(reason) => {
                self.degrade(BridgeError::BackendUnavailable(reason));
                backbuffer.take_dirty();
                return self.skip(SkipReason::Degraded);
            }
        }

        let Some(dirty) = backbuffer.take_dirty() else {
            return PresentOutcome::Unchanged;
        };
        let region = if self.dirty_uploads { dirty } else { Rect::sized(size.width, size.height) };

        let (Some(image), Some(layout), Some(surface)) = (backbuffer.image(), self.layout, self.surface.as_mut()) else {
            return self.skip(SkipReason::NoBackbuffer);
        };
        let frame_id = self.frame_id + 1;
        let Some(upload) = convert_region(image, region, layout, frame_id) else {
            return PresentOutcome::Unchanged;
        };

        let result = self
            .backend
            .upload(surface.as_mut(), &upload)
            .and_then(|_| self.backend.present(surface.as_mut()));
        if let Err(e) = result {
            warn!("frame {frame_id} upload failed on {}: {e:#}", self.backend.name());
            backbuffer.add_dirty(region);
            return self.skip(SkipReason::UploadFailed);
        }

        self.frame_id = frame_id;
        self.stats.presented += 1;
        self.stats.uploaded_bytes += upload.bytes.len() as u64;
        PresentOutcome::Presented { frame_id, region }
    }

    /// The device context was lost: drop the surface and re-upload everything next frame.
    pub fn invalidate(&mut self) {
        self.surface = None;
        self.layout = None;
    }

    /// Stops presenting, waits for in-flight uploads and frees the surface.
    pub fn release(&mut self) {
        if let Err(e) = self.backend.finish() {
            warn!("{} failed to finish pending uploads: {e:#}", self.backend.name());
        }
        self.drop_surface();
        self.released = true;
    }

    /// Allows presentation again after [`release`](Self::release).
    pub fn resume(&mut self) {
        self.released = false;
    }

    /// Enters degraded mode without trying the backend.
    pub fn disable(&mut self, error: BridgeError) {
        let error = match error {
            BridgeError::BackendUnavailable(_) => error,
            other => BridgeError::BackendUnavailable(other.to_string()),
        };
        self.degrade(error);
    }

    /// Swaps in a new backend, clearing degraded mode. Returns the old one.
    pub fn replace_backend(&mut self, backend: Box<dyn RenderBackend>) -> Box<dyn RenderBackend> {
        if let Err(e) = self.backend.finish() {
            warn!("{} failed to finish pending uploads: {e:#}", self.backend.name());
        }
        self.drop_surface();
        self.degraded = None;
        self.unreported = None;
        std::mem::replace(&mut self.backend, backend)
    }

    pub fn snapshot(&mut self) -> Option<RgbaImage> {
        let surface = self.surface.as_mut()?;
        match self.backend.snapshot(surface.as_mut()) {
            Ok(img) => Some(img),
            Err(e) => {
                debug!("snapshot unavailable on {}: {e:#}", self.backend.name());
                None
            }
        }
    }

    pub fn external_handle(&mut self) -> Option<ExternalHandle> {
        let surface = self.surface.as_mut()?;
        self.backend.external_handle(surface.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color;
    use crate::render::backends::cpu::CpuBackend;
    use crate::render::backends::null::NullBackend;

    fn realized(w: u32, h: u32) -> Backbuffer {
        let mut bb = Backbuffer::new();
        bb.realize(SurfaceSize::new(w, h), color::BLACK_PIXEL).unwrap();
        bb
    }

    #[test]
    fn first_frame_uploads_everything_then_only_dirty() {
        let mut c = Compositor::new(Box::new(CpuBackend::new()), true);
        let mut bb = realized(16, 8);
        let size = SurfaceSize::new(16, 8);

        assert_eq!(
            c.composite(&mut bb, size),
            PresentOutcome::Presented { frame_id: 1, region: Rect::new(0, 0, 16, 8) }
        );
        assert_eq!(c.composite(&mut bb, size), PresentOutcome::Unchanged);

        bb.image_mut().unwrap().put_pixel(3, 3, color::WHITE_PIXEL);
        bb.add_dirty(Rect::new(3, 3, 1, 1));
        assert_eq!(
            c.composite(&mut bb, size),
            PresentOutcome::Presented { frame_id: 2, region: Rect::new(3, 3, 1, 1) }
        );
        let snap = c.snapshot().unwrap();
        assert_eq!(snap.rgba_at(3, 3), Some([255, 255, 255, 255]));
        assert_eq!(snap.rgba_at(0, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn allocation_failure_degrades_without_panicking() {
        let (backend, stats) = NullBackend::failing();
        let mut c = Compositor::new(Box::new(backend), true);
        let mut bb = realized(4, 4);
        let size = SurfaceSize::new(4, 4);

        assert_eq!(c.composite(&mut bb, size), PresentOutcome::Skipped(SkipReason::Degraded));
        assert!(c.is_degraded());
        assert!(matches!(c.take_error(), Some(BridgeError::BackendUnavailable(_))));
        assert_eq!(c.take_error(), None);
        bb.add_dirty(Rect::new(0, 0, 1, 1));
        assert_eq!(c.composite(&mut bb, size), PresentOutcome::Skipped(SkipReason::Degraded));
        assert_eq!(stats.presents(), 0);

        c.replace_backend(Box::new(CpuBackend::new()));
        assert!(!c.is_degraded());
        bb.add_dirty(Rect::new(0, 0, 1, 1));
        assert!(c.composite(&mut bb, size).presented());
    }

    #[test]
    fn mismatched_size_drops_the_frame() {
        let mut c = Compositor::new(Box::new(CpuBackend::new()), true);
        let mut bb = realized(4, 4);
        assert_eq!(
            c.composite(&mut bb, SurfaceSize::new(5, 4)),
            PresentOutcome::Skipped(SkipReason::SizeMismatch)
        );
        // The dirty region survives for the next matching frame.
        assert!(bb.dirty().is_some());
    }

    #[test]
    fn context_loss_recreates_surface_and_uploads_all() {
        let (backend, stats) = NullBackend::new_with_stats();
        let mut c = Compositor::new(Box::new(backend), true);
        let mut bb = realized(8, 8);
        let size = SurfaceSize::new(8, 8);
        c.composite(&mut bb, size);
        c.invalidate();
        bb.add_dirty(Rect::new(1, 1, 1, 1));
        assert_eq!(
            c.composite(&mut bb, size),
            PresentOutcome::Presented { frame_id: 2, region: Rect::new(0, 0, 8, 8) }
        );
        assert_eq!(stats.surfaces_created(), 2);
    }

    #[test]
    fn full_uploads_when_dirty_tracking_is_off() {
        let mut c = Compositor::new(Box::new(CpuBackend::new()), false);
        let mut bb = realized(8, 8);
        let size = SurfaceSize::new(8, 8);
        c.composite(&mut bb, size);
        bb.add_dirty(Rect::new(1, 1, 1, 1));
        assert_eq!(
            c.composite(&mut bb, size),
            PresentOutcome::Presented { frame_id: 2, region: Rect::new(0, 0, 8, 8) }
        );
    }
}
