//! # General disparity objects
//!
//! This module provides generic disparity traits and structures for use by different algorithms.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::GrayImage;

use crate::error::*;
use crate::frame::StereoFrame;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// The disparity chosen for a single pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Disparity {
    /// Integer offset from the base pixel to its match, `matched.x - base.x`.
    pub dx: i32,

    /// Sub-pixel estimate of `dx`.
    pub sub_dx: f64,

    /// Matching cost at `dx`, or infinity if the pixel is invalid.
    pub cost: f64,

    /// Score in `[0, 1]`, higher meaning more of the candidates agreed.
    pub confidence: f64,

    pub flag: DisparityFlag
}

/// A dense map of per-pixel disparities.
#[derive(Clone, Debug)]
pub struct DisparityMap {
    width: usize,
    height: usize,
    data: Vec<Disparity>
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisparityFlag {
    Valid,

    /// No candidate disparity reached the pixel.
    Invalid
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait DisparityAlgorithm {
    /// Compute the disparity map of the given stereo frame.
    fn compute(&mut self, frame: &StereoFrame) -> Result<DisparityMap>;
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Disparity {
    /// The placeholder written for pixels without any candidate.
    pub fn invalid() -> Self {
        Self {
            dx: 0,
            sub_dx: 0.0,
            cost: f64::INFINITY,
            confidence: 0.0,
            flag: DisparityFlag::Invalid
        }
    }

    pub fn is_valid(&self) -> bool {
        self.flag == DisparityFlag::Valid
    }
}

impl Default for Disparity {
    fn default() -> Self {
        Self::invalid()
    }
}

impl DisparityMap {
    /// Create a map with every pixel marked invalid.
    pub fn new(width: usize, height: usize) -> Self {
        DisparityMap {
            width,
            height,
            data: vec![Disparity::invalid(); width * height]
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> &Disparity {
        &self.data[y * self.width + x]
    }

    pub fn put(&mut self, x: usize, y: usize, val: Disparity) {
        self.data[y * self.width + x] = val;
    }

    /// Mutable access to the row-major cells, for filling disjoint rows in parallel.
    pub fn as_mut_slice(&mut self) -> &mut [Disparity] {
        &mut self.data
    }

    /// Number of pixels holding a valid disparity.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|d| d.is_valid()).count()
    }

    /// Largest absolute sub-pixel disparity among valid pixels.
    pub fn max_abs_disparity(&self) -> Option<f64> {
        self.data
            .iter()
            .filter(|d| d.is_valid())
            .map(|d| d.sub_dx.abs())
            .fold(None, |max, v| match max {
                Some(m) if m >= v => Some(m),
                _ => Some(v)
            })
    }

    /// Converts the map into a Luma8 image of absolute disparities. Invalid pixels are black.
    pub fn to_luma(&self) -> GrayImage {
        self.render(1.0)
    }

    /// Converts the map to a normalised GrayImage.
    ///
    /// Normalises by the largest absolute disparity in the map. If there are no valid pixels
    /// then the function is equivalent to `.to_luma()`.
    pub fn to_luma_normalised(&self) -> GrayImage {
        let mult = match self.max_abs_disparity() {
            Some(d) if d > 0.0 => 255.0 / d,
            _ => 1.0
        };

        self.render(mult)
    }

    fn render(&self, mult: f64) -> GrayImage {
        let mut new = image::GrayImage::new(self.width as u32, self.height as u32);

        for y in 0..new.height() {
            for x in 0..new.width() {
                let disp = self.get(x as usize, y as usize);

                let val = match disp.is_valid() {
                    true => (disp.sub_dx.abs() * mult).max(0.0).min(255.0),
                    false => 0.0
                };

                *new.get_pixel_mut(x, y) = image::Luma([val as u8]);
            }
        }

        new
    }
}
