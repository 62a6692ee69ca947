//! The offscreen image behind the window.
//!
//! All window drawing lands in the backbuffer. It is allocated on first
//! realization, marked stale on resize and reallocated to the new size before
//! the next draw, and tracks the union of regions drawn since the last upload.

use crate::color::Pixel;
use crate::errors::BridgeError;
use crate::geometry::Rect;
use crate::image::Image;
use crate::render::backend::SurfaceSize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackbufferState {
    Unallocated,
    Allocated,
    /// A resize happened; storage will be reallocated to `size` before the next draw.
    Stale { size: SurfaceSize },
}

#[derive(Debug)]
pub struct Backbuffer {
    state: BackbufferState,
    image: Option<Image>,
    dirty: Option<Rect>,
    reallocations: u64,
}

impl Default for Backbuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Backbuffer {
    pub fn new() -> Self {
        Self {
            state: BackbufferState::Unallocated,
            image: None,
            dirty: None,
            reallocations: 0,
        }
    }

    pub fn state(&self) -> BackbufferState {
        self.state
    }

    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    pub fn image_mut(&mut self) -> Option<&mut Image> {
        self.image.as_mut()
    }

    /// Size of the allocated storage, if any.
    pub fn size(&self) -> Option<SurfaceSize> {
        self.image.as_ref().map(|i| SurfaceSize::new(i.width(), i.height()))
    }

    /// How many times storage has been (re)allocated.
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Notes a new window size; storage is replaced on the next [`realize`](Self::realize).
    pub fn mark_stale(&mut self, size: SurfaceSize) {
        if self.state != BackbufferState::Unallocated {
            self.state = BackbufferState::Stale { size };
        }
    }

    /// Ensures storage exists at `size`.
    ///
    /// Existing content is kept in the overlapping top-left region and new
    /// area is filled with `background`. The whole buffer is marked dirty
    /// whenever storage changes.
    pub fn realize(&mut self, size: SurfaceSize, background: Pixel) -> Result<bool, BridgeError> {
        if self.state == BackbufferState::Allocated && self.size() == Some(size) {
            return Ok(false);
        }
        let width = size.width.max(1);
        let height = size.height.max(1);
        let image = match &self.image {
            Some(old) => old.resized(width, height, background)?,
            None => Image::filled(width, height, crate::color::VISUAL_DEPTH, background)?,
        };
        log::debug!("backbuffer realized at {width}x{height}");
        self.image = Some(image);
        self.state = BackbufferState::Allocated;
        self.reallocations += 1;
        self.mark_all_dirty();
        Ok(true)
    }

    pub fn release(&mut self) {
        self.image = None;
        self.dirty = None;
        self.state = BackbufferState::Unallocated;
    }

    pub fn add_dirty(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.dirty = Some(match self.dirty {
            Some(d) => d.union(&rect),
            None => rect,
        });
    }

    pub fn mark_all_dirty(&mut self) {
        if let Some(img) = &self.image {
            self.dirty = Some(img.bounds());
        }
    }

    pub fn dirty(&self) -> Option<Rect> {
        self.dirty
    }

    pub fn take_dirty(&mut self) -> Option<Rect> {
        self.dirty.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color;

    #[test]
    fn lifecycle_states() {
        let mut bb = Backbuffer::new();
        assert_eq!(bb.state(), BackbufferState::Unallocated);
        // Stale only applies to allocated storage.
        bb.mark_stale(SurfaceSize::new(5, 5));
        assert_eq!(bb.state(), BackbufferState::Unallocated);

        assert!(bb.realize(SurfaceSize::new(4, 4), color::BLACK_PIXEL).unwrap());
        assert_eq!(bb.state(), BackbufferState::Allocated);
        assert!(!bb.realize(SurfaceSize::new(4, 4), color::BLACK_PIXEL).unwrap());

        bb.mark_stale(SurfaceSize::new(8, 2));
        assert_eq!(bb.state(), BackbufferState::Stale { size: SurfaceSize::new(8, 2) });
        bb.realize(SurfaceSize::new(8, 2), color::WHITE_PIXEL).unwrap();
        assert_eq!(bb.size(), Some(SurfaceSize::new(8, 2)));
        assert_eq!(bb.reallocations(), 2);

        bb.release();
        assert!(bb.image().is_none());
    }

    #[test]
    fn resize_keeps_content_and_fills_new_area() {
        let mut bb = Backbuffer::new();
        bb.realize(SurfaceSize::new(2, 2), color::BLACK_PIXEL).unwrap();
        bb.image_mut().unwrap().put_pixel(1, 1, color::rgb(1, 2, 3));
        bb.mark_stale(SurfaceSize::new(3, 3));
        bb.realize(SurfaceSize::new(3, 3), color::WHITE_PIXEL).unwrap();
        let img = bb.image().unwrap();
        assert_eq!(img.get_pixel(1, 1), Some(color::rgb(1, 2, 3)));
        assert_eq!(img.get_pixel(2, 2), Some(color::WHITE_PIXEL));
        assert_eq!(bb.dirty(), Some(Rect::new(0, 0, 3, 3)));
    }

    #[test]
    fn dirty_regions_accumulate() {
        let mut bb = Backbuffer::new();
        bb.realize(SurfaceSize::new(10, 10), 0).unwrap();
        bb.take_dirty();
        bb.add_dirty(Rect::new(1, 1, 1, 1));
        bb.add_dirty(Rect::new(5, 5, 2, 2));
        bb.add_dirty(Rect::new(9, 9, 0, 0));
        assert_eq!(bb.take_dirty(), Some(Rect::new(1, 1, 6, 6)));
        assert_eq!(bb.take_dirty(), None);
    }
}
