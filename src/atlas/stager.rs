use image::imageops::{self, FilterType};
use image::RgbaImage;

#[allow(unused_imports)]
use log::{debug, trace};

use crate::device::BYTES_PER_PIXEL;
use crate::error::{AtlasError, Result};

/// Tightly packed RGBA8 pixels ready for upload.
#[derive(Debug, Clone, Copy)]
pub struct StagedImage<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
}

/// Fits source images into one tile.
///
/// Images larger than a tile on either axis are downscaled, and the stager holds the result
/// until the next call. Images that already fit are passed through without a copy.
/// Nothing outside the staged width x height is touched, so callers that need a clean tile
/// clear it first.
#[derive(Debug)]
pub struct ImageStager {
    tile_resolution: u32,
    clear_color: [u8; 4],
    scaled: RgbaImage,
    blank: Vec<u8>,
}

impl ImageStager {
    pub fn new(tile_resolution: u32, clear_color: [u8; 4]) -> Self {
        Self {
            tile_resolution,
            clear_color,
            scaled: RgbaImage::new(0, 0),
            blank: Vec::new(),
        }
    }

    pub fn tile_resolution(&self) -> u32 {
        self.tile_resolution
    }

    /// Dimensions `width` x `height` will have once staged.
    pub fn staged_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let tile = self.tile_resolution;
        if width.max(height) <= tile {
            return (width, height);
        }

        // Larger side becomes exactly one tile, the other keeps the aspect ratio
        let scale_side = |side: u32, longest: u32| -> u32 {
            let scaled = (side as u64 * tile as u64 + longest as u64 / 2) / longest as u64;
            (scaled as u32).clamp(1, tile)
        };

        if width >= height {
            (tile, scale_side(height, width))
        } else {
            (scale_side(width, height), tile)
        }
    }

    pub fn stage<'a>(&'a mut self, image: &'a RgbaImage) -> Result<StagedImage<'a>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(AtlasError::InvalidImage { width, height });
        }

        let (staged_width, staged_height) = self.staged_dimensions(width, height);
        if (staged_width, staged_height) == (width, height) {
            trace!("ImageStager: {width}x{height} fits, passing through");
            return Ok(StagedImage {
                pixels: image.as_raw(),
                width,
                height,
            });
        }

        debug!(
            "ImageStager: downscaling {width}x{height} to {staged_width}x{staged_height}"
        );
        self.scaled = imageops::resize(image, staged_width, staged_height, FilterType::Triangle);

        Ok(StagedImage {
            pixels: self.scaled.as_raw(),
            width: staged_width,
            height: staged_height,
        })
    }

    /// A full tile of the clear color.
    pub fn blank_tile(&mut self) -> StagedImage<'_> {
        let tile = self.tile_resolution as usize;
        let len = tile * tile * BYTES_PER_PIXEL;
        if self.blank.len() != len {
            self.blank = self.clear_color.repeat(tile * tile);
        }

        StagedImage {
            pixels: &self.blank,
            width: self.tile_resolution,
            height: self.tile_resolution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_small_image_passes_through() {
        let mut stager = ImageStager::new(64, [0; 4]);
        let image = RgbaImage::from_pixel(30, 64, Rgba([1, 2, 3, 4]));

        let staged = stager.stage(&image).unwrap();
        assert_eq!((staged.width, staged.height), (30, 64));
        assert!(std::ptr::eq(staged.pixels.as_ptr(), image.as_raw().as_ptr()));
    }

    #[test]
    fn test_wide_image_downscaled() {
        let mut stager = ImageStager::new(1024, [0; 4]);
        let image = RgbaImage::new(2048, 1024);

        let staged = stager.stage(&image).unwrap();
        assert_eq!((staged.width, staged.height), (1024, 512));
        assert_eq!(staged.pixels.len(), 1024 * 512 * 4);
    }

    #[test]
    fn test_tall_image_downscaled() {
        let stager = ImageStager::new(100, [0; 4]);
        assert_eq!(stager.staged_dimensions(50, 300), (17, 100));
    }

    #[test]
    fn test_oversize_on_height_only() {
        let stager = ImageStager::new(256, [0; 4]);
        assert_eq!(stager.staged_dimensions(100, 512), (50, 256));
    }

    #[test]
    fn test_aspect_ratio_preserved() {
        let tile = 128;
        let stager = ImageStager::new(tile, [0; 4]);
        for (w, h) in [(129, 1), (1000, 999), (300, 7), (7, 300), (4000, 3000), (640, 480)] {
            let (sw, sh) = stager.staged_dimensions(w, h);
            assert_eq!(sw.max(sh), tile);

            let (long, short, staged_short) = if w >= h { (w, h, sh) } else { (h, w, sw) };
            let exact = short as f64 * tile as f64 / long as f64;
            assert!((staged_short as f64 - exact.max(1.0)).abs() <= 0.5 + 1e-9);
        }
    }

    #[test]
    fn test_downscale_keeps_color() {
        let mut stager = ImageStager::new(8, [0; 4]);
        let image = RgbaImage::from_pixel(32, 16, Rgba([200, 100, 50, 255]));

        let staged = stager.stage(&image).unwrap();
        assert_eq!((staged.width, staged.height), (8, 4));
        for px in staged.pixels.chunks_exact(4) {
            assert_eq!(px, &[200, 100, 50, 255]);
        }
    }

    #[test]
    fn test_downscaled_pixels_are_held_by_stager() {
        let mut stager = ImageStager::new(8, [0; 4]);
        let first = RgbaImage::from_pixel(32, 16, Rgba([10, 20, 30, 255]));
        let second = RgbaImage::from_pixel(16, 64, Rgba([40, 50, 60, 255]));

        let ptr = stager.stage(&first).unwrap().pixels.as_ptr();
        assert!(std::ptr::eq(ptr, stager.scaled.as_raw().as_ptr()));

        let staged = stager.stage(&second).unwrap();
        assert_eq!((staged.width, staged.height), (2, 8));
        assert_eq!(staged.pixels.len(), 2 * 8 * 4);
        assert!(staged.pixels.chunks_exact(4).all(|px| px == [40, 50, 60, 255]));
    }

    #[test]
    fn test_zero_area_rejected() {
        let mut stager = ImageStager::new(64, [0; 4]);
        let image = RgbaImage::new(0, 10);
        assert!(matches!(
            stager.stage(&image),
            Err(AtlasError::InvalidImage {
                width: 0,
                height: 10
            })
        ));
    }

    #[test]
    fn test_blank_tile_uses_clear_color() {
        let mut stager = ImageStager::new(4, [9, 9, 9, 255]);
        let blank = stager.blank_tile();
        assert_eq!((blank.width, blank.height), (4, 4));
        assert_eq!(blank.pixels.len(), 64);
        assert!(blank.pixels.chunks_exact(4).all(|px| px == [9, 9, 9, 255]));
    }
}
