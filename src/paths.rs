//! # Path voting disparity computation
//!
//! A reference aggregation driver for the census cost and the disparity accumulator. Each base
//! pixel is scored along a handful of straight paths leaving it; every path votes for the
//! disparity with the lowest mean census cost over the pixels it crosses, and the accumulator
//! reduces the votes to the pixel's disparity.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::debug;
use rayon::prelude::*;
use serde::Deserialize;

use crate::accumulator::{
    AccumulatorParams, DisparityAccumulator, DisparityCandidate, MAX_CANDIDATES
};
use crate::census::{CensusCostComputer, CensusParams, MatchingCostComputer};
use crate::disparity::{DisparityAlgorithm, DisparityMap};
use crate::error::*;
use crate::frame::{Pixel, StereoFrame};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

pub struct PathMatcher {
    params: Params,
    census: CensusCostComputer,
    accumulator: DisparityAccumulator
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Params {
    /// Inclusive range of `matched.x - base.x` offsets to search.
    pub disparity_range: (i32, i32),

    /// Number of pixels each path covers, including the base pixel.
    pub path_length: usize,

    /// Step direction of each path, at most one path per candidate slot.
    pub paths: Vec<(i32, i32)>,

    pub census: CensusParams,
    pub accumulator: AccumulatorParams
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            disparity_range: (-64, 0),
            path_length: 8,
            paths: vec![
                (1, 0),
                (-1, 0),
                (0, 1),
                (0, -1),
                (1, 1),
                (-1, 1),
                (1, -1),
                (-1, -1),
            ],
            census: CensusParams::new(3, 3),
            accumulator: AccumulatorParams::default()
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        if self.disparity_range.0 > self.disparity_range.1 {
            return Err(Error::InvalidParams(format!(
                "disparity range {:?} is empty",
                self.disparity_range
            )));
        }

        if self.path_length == 0 {
            return Err(Error::InvalidParams("path length must be at least 1".into()));
        }

        if self.paths.is_empty() || self.paths.len() > MAX_CANDIDATES {
            return Err(Error::InvalidParams(format!(
                "between 1 and {} paths are needed, got {}",
                MAX_CANDIDATES,
                self.paths.len()
            )));
        }

        if self.paths.contains(&(0, 0)) {
            return Err(Error::InvalidParams("paths must have a direction".into()));
        }

        self.accumulator.validate()
    }
}

impl PathMatcher {
    /// Create a new instance of the algorithm with the given parameters.
    pub fn new(params: Params) -> Result<Self> {
        params.validate()?;

        let census = CensusCostComputer::new(params.census)?;
        let accumulator = DisparityAccumulator::new(params.accumulator)?;

        Ok(Self {
            params,
            census,
            accumulator
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The census cost of the last computed frame.
    pub fn census(&self) -> &CensusCostComputer {
        &self.census
    }

    /// Vote for the disparity of `base` along the path stepping by `dir`.
    ///
    /// Returns `None` if no disparity in range puts the match inside the image.
    fn vote(
        &self,
        base: Pixel,
        dir: (i32, i32),
        width: usize,
        height: usize
    ) -> Option<DisparityCandidate> {
        let (lo, hi) = self.params.disparity_range;
        let mut best: Option<(i32, f64, usize)> = None;

        for d in lo..=hi {
            if !base.offset_x(d as isize).is_inside(width, height) {
                continue;
            }

            let mut sum = 0.0;
            let mut steps = 0;

            for k in 0..self.params.path_length as isize {
                let b = Pixel::new(base.x + k * dir.0 as isize, base.y + k * dir.1 as isize);
                let m = b.offset_x(d as isize);

                if !b.is_inside(width, height) || !m.is_inside(width, height) {
                    break;
                }

                sum += self.census.cost(b, m);
                steps += 1;
            }

            // The base pixel itself is always on the path, so steps is at least 1
            let mean = sum / steps as f64;

            match best {
                Some((_, c, _)) if c <= mean => (),
                _ => best = Some((d, mean, steps))
            }
        }

        best.map(|(d, cost, steps)| {
            DisparityCandidate::new(base, base.offset_x(d as isize), cost)
                .with_path_length(steps as f64 / self.params.path_length as f64)
        })
    }
}

impl DisparityAlgorithm for PathMatcher {
    /// Compute the disparity map for the given frame.
    fn compute(&mut self, frame: &StereoFrame) -> Result<DisparityMap> {
        frame.check_dimensions()?;

        let width = frame.width();
        let height = frame.height();

        self.census.init(frame)?;

        let start = std::time::Instant::now();
        let mut disp_map = DisparityMap::new(width, height);

        if width > 0 && height > 0 {
            let this = &*self;

            disp_map
                .as_mut_slice()
                .par_chunks_mut(width)
                .enumerate()
                .for_each_init(
                    || this.accumulator.clone(),
                    |acc, (y, row)| {
                        for (x, cell) in row.iter_mut().enumerate() {
                            let pixel = Pixel::new(x as isize, y as isize);

                            acc.reset();
                            for &dir in &this.params.paths {
                                if let Some(candidate) = this.vote(pixel, dir, width, height) {
                                    acc.store_disparity(candidate);
                                }
                            }

                            *cell = acc.finalize(pixel, &this.census);
                        }
                    }
                );
        }

        self.accumulator.finalize_map(&mut disp_map);

        debug!(
            "[paths] {} x {} map over {} paths in {}ms",
            width,
            height,
            self.params.paths.len(),
            start.elapsed().as_millis()
        );

        Ok(disp_map)
    }
}
