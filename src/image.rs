//! Client-side pixel images.
//!
//! An [`Image`] is the storage behind every drawable (the window backbuffer and
//! pixmaps) and the payload of `put_image`/`get_image`. Pixels are row-major
//! `u32` values; depth-1 images hold `0` or `1` per pixel.

use crate::color::Pixel;
use crate::errors::BridgeError;
use crate::geometry::Rect;

#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    depth: u8,
    pixels: Vec<Pixel>,
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("depth", &self.depth)
            .finish()
    }
}

impl Image {
    /// Allocates a zero-filled image.
    ///
    /// Allocation failure is reported as [`BridgeError::OutOfResources`] rather than aborting.
    pub fn new(width: u32, height: u32, depth: u8) -> Result<Self, BridgeError> {
        Self::filled(width, height, depth, 0)
    }

    pub fn filled(width: u32, height: u32, depth: u8, pixel: Pixel) -> Result<Self, BridgeError> {
        if depth != 1 && depth != crate::color::VISUAL_DEPTH {
            return Err(BridgeError::ProtocolMisuse(format!("unsupported image depth {depth}")));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| BridgeError::OutOfResources(format!("image {width}x{height} overflows")))?;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|e| BridgeError::OutOfResources(format!("image {width}x{height}: {e}")))?;
        pixels.resize(len, pixel);

        Ok(Self { width, height, depth, pixels })
    }

    /// Wraps existing pixels. `pixels.len()` must equal `width * height`.
    pub fn from_pixels(width: u32, height: u32, depth: u8, pixels: Vec<Pixel>) -> Result<Self, BridgeError> {
        if pixels.len() != width as usize * height as usize {
            return Err(BridgeError::ProtocolMisuse(format!(
                "{} pixels supplied for a {width}x{height} image",
                pixels.len()
            )));
        }
        if depth != 1 && depth != crate::color::VISUAL_DEPTH {
            return Err(BridgeError::ProtocolMisuse(format!("unsupported image depth {depth}")));
        }
        Ok(Self { width, height, depth, pixels })
    }

    /// Builds a depth-1 image from XBM-style bitmap data.
    ///
    /// Rows are padded to whole bytes and bits are least-significant first.
    pub fn from_bitmap_bits(bits: &[u8], width: u32, height: u32) -> Result<Self, BridgeError> {
        let row_bytes = (width as usize).div_ceil(8);
        if bits.len() < row_bytes * height as usize {
            return Err(BridgeError::ProtocolMisuse(format!(
                "bitmap data too short for {width}x{height}: {} bytes",
                bits.len()
            )));
        }

        let mut img = Self::new(width, height, 1)?;
        for y in 0..height as usize {
            let row = &bits[y * row_bytes..(y + 1) * row_bytes];
            for x in 0..width as usize {
                let bit = (row[x / 8] >> (x % 8)) & 1;
                img.pixels[y * width as usize + x] = bit as Pixel;
            }
        }
        Ok(img)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn bounds(&self) -> Rect {
        Rect::sized(self.width, self.height)
    }

    /// Bytes held by the pixel store.
    pub fn byte_len(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<Pixel>()
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Pixel] {
        &mut self.pixels
    }

    pub fn row(&self, y: u32) -> &[Pixel] {
        let w = self.width as usize;
        let start = y as usize * w;
        &self.pixels[start..start + w]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [Pixel] {
        let w = self.width as usize;
        let start = y as usize * w;
        &mut self.pixels[start..start + w]
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Option<Pixel> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(self.pixels[y as usize * self.width as usize + x as usize])
    }

    /// Stores a pixel; out-of-bounds writes are ignored and return `false`.
    pub fn put_pixel(&mut self, x: i32, y: i32, pixel: Pixel) -> bool {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return false;
        }
        self.pixels[y as usize * self.width as usize + x as usize] = pixel;
        true
    }

    pub fn fill(&mut self, pixel: Pixel) {
        self.pixels.fill(pixel);
    }

    /// Fills `rect` (clipped to the image) with `pixel`.
    pub fn fill_rect(&mut self, rect: Rect, pixel: Pixel) {
        let Some(r) = rect.intersect(&self.bounds()) else {
            return;
        };
        for y in r.y..r.bottom() {
            let row = self.row_mut(y as u32);
            row[r.x as usize..r.right() as usize].fill(pixel);
        }
    }

    /// Copies `rect` (clipped to the image) into a new image of the same depth.
    ///
    /// Parts of `rect` outside the image read as zero.
    pub fn sub_image(&self, rect: Rect) -> Result<Image, BridgeError> {
        let mut out = Image::new(rect.width, rect.height, self.depth)?;
        if let Some(src) = rect.intersect(&self.bounds()) {
            let dx = (src.x - rect.x) as usize;
            for y in src.y..src.bottom() {
                let from = &self.row(y as u32)[src.x as usize..src.right() as usize];
                let to_row = out.row_mut((y - rect.y) as u32);
                to_row[dx..dx + from.len()].copy_from_slice(from);
            }
        }
        Ok(out)
    }

    /// Reallocates to a new size, keeping the overlapping top-left region.
    pub fn resized(&self, width: u32, height: u32, fill: Pixel) -> Result<Image, BridgeError> {
        let mut out = Image::filled(width, height, self.depth, fill)?;
        let keep_w = self.width.min(width) as usize;
        for y in 0..self.height.min(height) {
            out.row_mut(y)[..keep_w].copy_from_slice(&self.row(y)[..keep_w]);
        }
        Ok(out)
    }
}
