use image::{ImageReader, RgbImage};
use log::debug;
use routeline_core::PixelPoint;
use std::io::Cursor;

use crate::error::{TraceError, TraceResult};
use crate::types::Color;

/// Decode raster bytes (PNG, JPEG, ...) into an RGB image.
///
/// Grayscale and alpha images are widened/flattened to RGB so every sampler
/// sees three channels.
pub fn decode_image(bytes: &[u8]) -> TraceResult<RgbImage> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TraceError::Decode(image::ImageError::IoError(e)))?;
    let img = reader.decode()?.to_rgb8();
    debug!("decoded {}x{} image from {} bytes", img.width(), img.height(), bytes.len());
    Ok(img)
}

/// Read-only, bounds-checked accessor over decoded pixels
#[derive(Debug, Clone, Copy)]
pub struct RasterSampler<'a> {
    img: &'a RgbImage,
}

impl<'a> RasterSampler<'a> {
    pub fn new(img: &'a RgbImage) -> Self {
        Self { img }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.img.dimensions()
    }

    pub fn contains(&self, p: PixelPoint) -> bool {
        let (w, h) = self.img.dimensions();
        p.within(w, h)
    }

    /// Fails with `OutOfBounds` when `p` is outside the image
    pub fn check(&self, p: PixelPoint) -> TraceResult<()> {
        if self.contains(p) {
            Ok(())
        } else {
            let (width, height) = self.img.dimensions();
            Err(TraceError::OutOfBounds { x: p.x, y: p.y, width, height })
        }
    }

    /// Color at `p`, or `None` outside the image
    #[inline]
    pub fn color(&self, p: PixelPoint) -> Option<Color> {
        if !self.contains(p) {
            return None;
        }
        let px = self.img.get_pixel(p.x as u32, p.y as u32);
        Some([px[0] as f32, px[1] as f32, px[2] as f32])
    }
}
