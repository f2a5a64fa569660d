//! Decoded photo container.
//!
//! - `Photo`: owned RGB pixel grid handed to the pipeline by the caller.
//! - `Region`: read-only rectangular view over a photo, used for color metrics.
//!
//! Decoding is the only fallible step of an analysis. Once a `Photo` exists,
//! every downstream stage is infallible.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use sha2::{Digest, Sha256};

use crate::detect::BoundingBox;

/// A decoded photo: `height` rows of `width` RGB pixels.
///
/// The pipeline only ever borrows a `Photo`; it never mutates or retains one.
#[derive(Clone, Debug)]
pub struct Photo {
    image: RgbImage,
}

impl Photo {
    /// Wrap raw interleaved RGB bytes (`width * height * 3` of them).
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("photo dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes for a {}x{} photo, received {}",
                expected_len,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("pixel buffer does not match {}x{}", width, height))?;
        Self::from_image(image)
    }

    /// Take ownership of an already decoded `image` buffer.
    pub fn from_image(image: RgbImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(anyhow!(
                "photo has zero area ({}x{})",
                image.width(),
                image.height()
            ));
        }
        Ok(Self { image })
    }

    /// Decode an encoded image (JPEG, PNG) from memory.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(anyhow!("cannot decode an empty image buffer"));
        }
        let decoded = image::load_from_memory(bytes).context("decode image")?;
        Self::from_image(decoded.to_rgb8())
    }

    /// Read and decode an image file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read image {}", path.display()))?;
        Self::decode(&bytes).with_context(|| format!("invalid image {}", path.display()))
    }

    /// Build a photo by evaluating `pixel(x, y)` for every coordinate.
    pub fn from_fn<F>(width: u32, height: u32, mut pixel: F) -> Result<Self>
    where
        F: FnMut(u32, u32) -> [u8; 3],
    {
        Self::from_image(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb(pixel(x, y))
        }))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Total pixel count (`width * height`), never zero.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Borrow the underlying buffer (used by model backends for resizing).
    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    /// View covering the whole photo.
    pub fn full(&self) -> Region<'_> {
        Region {
            photo: self,
            x1: 0,
            y1: 0,
            x2: self.width(),
            y2: self.height(),
        }
    }

    /// View covering `bbox`, clipped to the photo bounds. May be empty.
    pub fn region(&self, bbox: &BoundingBox) -> Region<'_> {
        let x2 = bbox.x2.min(self.width());
        let y2 = bbox.y2.min(self.height());
        Region {
            photo: self,
            x1: bbox.x1.min(x2),
            y1: bbox.y1.min(y2),
            x2,
            y2,
        }
    }

    /// Short SHA-256 fingerprint of the pixel data, for log correlation.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.image.as_raw());
        hex::encode(&digest[..8])
    }
}

/// Rectangular read-only view into a [`Photo`].
#[derive(Clone, Copy, Debug)]
pub struct Region<'a> {
    photo: &'a Photo,
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl<'a> Region<'a> {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn pixel_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// Iterate the pixels of the region in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + 'a {
        let photo: &'a Photo = self.photo;
        let image = &photo.image;
        let (x1, x2) = (self.x1, self.x2);
        (self.y1..self.y2)
            .flat_map(move |y| (x1..x2).map(move |x| image.get_pixel(x, y).0))
    }
}
