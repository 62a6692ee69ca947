//! Ownership of every resource an effect allocates.
//!
//! Effects are free to forget to release pixmaps, contexts and fonts. The
//! arena keeps every live resource in per-kind tables so teardown can sweep
//! them all, and hands out ids from a single counter that never repeats, so a
//! stale id can never alias a newer resource.

use crate::color::Pixel;
use crate::errors::BridgeError;
use crate::gc::GraphicsContext;
use crate::image::Image;
use crate::raster::text::Font;
use hashbrown::HashMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PixmapId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GcId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(u64);

impl fmt::Display for PixmapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pixmap#{}", self.0)
    }
}

impl fmt::Display for GcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gc#{}", self.0)
    }
}

impl fmt::Display for FontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "font#{}", self.0)
    }
}

/// Caps on what a single effect may hold at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceLimits {
    pub max_pixmaps: usize,
    pub max_pixmap_bytes: usize,
    pub max_gcs: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_pixmaps: 1024,
            max_pixmap_bytes: 512 * 1024 * 1024,
            max_gcs: 4096,
        }
    }
}

/// What a sweep released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub pixmaps: usize,
    pub gcs: usize,
    pub fonts: usize,
    pub bytes: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.pixmaps + self.gcs + self.fonts
    }
}

/// Live resource counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub pixmaps: usize,
    pub gcs: usize,
    pub fonts: usize,
    pub pixmap_bytes: usize,
}

#[derive(Debug, Default)]
pub struct ResourceArena {
    next_id: u64,
    limits: ResourceLimits,
    pixmap_bytes: usize,
    pixmaps: HashMap<u64, Image>,
    gcs: HashMap<u64, GraphicsContext>,
    fonts: HashMap<u64, Font>,
}

impl ResourceArena {
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            next_id: 0,
            limits,
            pixmap_bytes: 0,
            pixmaps: HashMap::new(),
            gcs: HashMap::new(),
            fonts: HashMap::new(),
        }
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn counts(&self) -> ResourceCounts {
        ResourceCounts {
            pixmaps: self.pixmaps.len(),
            gcs: self.gcs.len(),
            fonts: self.fonts.len(),
            pixmap_bytes: self.pixmap_bytes,
        }
    }

    /// Checks that a `width` by `height` pixmap fits the limits, before any pixels are allocated.
    pub fn reserve_pixmap(&self, width: u32, height: u32) -> Result<(), BridgeError> {
        if self.pixmaps.len() >= self.limits.max_pixmaps {
            return Err(BridgeError::OutOfResources(format!(
                "pixmap limit of {} reached",
                self.limits.max_pixmaps
            )));
        }
        let bytes = u64::from(width)
            .checked_mul(u64::from(height))
            .and_then(|n| n.checked_mul(std::mem::size_of::<Pixel>() as u64))
            .and_then(|n| usize::try_from(n).ok());
        match bytes.and_then(|b| self.pixmap_bytes.checked_add(b)) {
            Some(total) if total <= self.limits.max_pixmap_bytes => Ok(()),
            _ => Err(BridgeError::OutOfResources(format!(
                "pixmap memory limit of {} bytes reached",
                self.limits.max_pixmap_bytes
            ))),
        }
    }

    pub fn insert_pixmap(&mut self, image: Image) -> Result<PixmapId, BridgeError> {
        self.reserve_pixmap(image.width(), image.height())?;
        let bytes = image.byte_len();

        let id = self.alloc_id();
        self.pixmap_bytes += bytes;
        self.pixmaps.insert(id, image);
        Ok(PixmapId(id))
    }

    pub fn pixmap(&self, id: PixmapId) -> Option<&Image> {
        self.pixmaps.get(&id.0)
    }

    pub fn pixmap_mut(&mut self, id: PixmapId) -> Option<&mut Image> {
        self.pixmaps.get_mut(&id.0)
    }

    pub fn remove_pixmap(&mut self, id: PixmapId) -> Option<Image> {
        let img = self.pixmaps.remove(&id.0)?;
        self.pixmap_bytes = self.pixmap_bytes.saturating_sub(img.byte_len());
        Some(img)
    }

    pub fn insert_gc(&mut self, gc: GraphicsContext) -> Result<GcId, BridgeError> {
        if self.gcs.len() >= self.limits.max_gcs {
            return Err(BridgeError::OutOfResources(format!(
                "graphics context limit of {} reached",
                self.limits.max_gcs
            )));
        }
        let id = self.alloc_id();
        self.gcs.insert(id, gc);
        Ok(GcId(id))
    }

    pub fn gc(&self, id: GcId) -> Option<&GraphicsContext> {
        self.gcs.get(&id.0)
    }

    pub fn gc_mut(&mut self, id: GcId) -> Option<&mut GraphicsContext> {
        self.gcs.get_mut(&id.0)
    }

    pub fn remove_gc(&mut self, id: GcId) -> Option<GraphicsContext> {
        self.gcs.remove(&id.0)
    }

    pub fn insert_font(&mut self, font: Font) -> FontId {
        let id = self.alloc_id();
        self.fonts.insert(id, font);
        FontId(id)
    }

    pub fn font(&self, id: FontId) -> Option<&Font> {
        self.fonts.get(&id.0)
    }

    pub fn remove_font(&mut self, id: FontId) -> Option<Font> {
        self.fonts.remove(&id.0)
    }

    /// Releases every live resource. Ids keep counting up afterwards.
    pub fn sweep(&mut self) -> SweepReport {
        let report = SweepReport {
            pixmaps: self.pixmaps.len(),
            gcs: self.gcs.len(),
            fonts: self.fonts.len(),
            bytes: self.pixmap_bytes,
        };
        self.pixmaps.clear();
        self.gcs.clear();
        self.fonts.clear();
        self.pixmap_bytes = 0;
        report
    }
}
