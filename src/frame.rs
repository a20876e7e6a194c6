//! # Image buffers
//!
//! Floating point grayscale images, rectified stereo pairs and pixel coordinates.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::{DynamicImage, GrayImage};

use crate::error::*;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A single-channel image of `f32` intensities stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct GrayFloatImage {
    width: usize,
    height: usize,
    data: Vec<f32>
}

/// A rectified stereo pair. Disparities are measured from `base` into `matched`.
#[derive(Clone, Debug)]
pub struct StereoFrame {
    pub base: GrayFloatImage,
    pub matched: GrayFloatImage
}

/// Signed pixel coordinate, so that candidate matches may fall outside the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pixel {
    pub x: isize,
    pub y: isize
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl GrayFloatImage {
    /// Create a new black image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height]
        }
    }

    /// Create an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> f32
    {
        let mut data = Vec::with_capacity(width * height);

        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }

        Self { width, height, data }
    }

    /// Convert an 8 bit grayscale image, normalising intensities into `[0, 1]`.
    pub fn from_luma(img: &GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.pixels().map(|p| p[0] as f32 / 255.0).collect()
        }
    }

    /// Convert any image, going through its luma representation.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        Self::from_luma(&img.to_luma())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn put(&mut self, x: usize, y: usize, val: f32) {
        self.data[y * self.width + x] = val;
    }

    /// Get a pixel, reflecting coordinates that fall outside the image back inside it.
    pub fn get_mirrored(&self, x: isize, y: isize) -> f32 {
        self.get(mirror(x, self.width), mirror(y, self.height))
    }
}

impl StereoFrame {
    pub fn new(base: GrayFloatImage, matched: GrayFloatImage) -> Self {
        Self { base, matched }
    }

    pub fn width(&self) -> usize {
        self.base.width()
    }

    pub fn height(&self) -> usize {
        self.base.height()
    }

    /// Check both images of the pair have the same dimensions.
    pub fn check_dimensions(&self) -> Result<()> {
        let base = (self.base.width(), self.base.height());
        let matched = (self.matched.width(), self.matched.height());

        if base != matched {
            return Err(Error::DimensionMismatch { base, matched });
        }

        Ok(())
    }
}

impl Pixel {
    pub fn new(x: isize, y: isize) -> Self {
        Self { x, y }
    }

    /// The pixel `dx` columns along the same row.
    pub fn offset_x(self, dx: isize) -> Self {
        Self { x: self.x + dx, y: self.y }
    }

    /// Whether the pixel lies inside a `width` x `height` image.
    pub fn is_inside(self, width: usize, height: usize) -> bool {
        self.x >= 0 && self.y >= 0 && (self.x as usize) < width && (self.y as usize) < height
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Reflect a coordinate about the nearest edge of an axis of length `extent`.
///
/// Negative coordinates map to `-p` and coordinates past the end to `2 * extent - p - 2`, so
/// the edge pixel itself is not repeated. Coordinates already inside are returned unchanged. If
/// the reflection still misses the axis (the image is smaller than the reach) the result is
/// clamped onto it.
pub fn mirror(p: isize, extent: usize) -> usize {
    let extent = extent as isize;
    let mut m = p;

    if m < 0 {
        m = -m;
    }
    if m > extent - 1 {
        m = 2 * extent - m - 2;
    }

    m.max(0).min(extent - 1) as usize
}
