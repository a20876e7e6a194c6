//! # Disparity accumulation
//!
//! An aggregation driver proposes up to [`MAX_CANDIDATES`] disparities for the pixel it is
//! working on, typically one per aggregation path. The accumulator reduces them to a single
//! disparity with a trimmed mean: candidates are sorted, and the window over them is shrunk one
//! element at a time from whichever end lowers the dispersion cost the most, until neither end
//! helps or only three candidates remain.
//!
//! A pixel is processed as `reset`, any number of `store_disparity` calls, then
//! `finalize_for_pixel`. One accumulator serves one pixel at a time; parallel drivers give each
//! worker its own.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::{debug, trace};
use serde::Deserialize;

use crate::census::MatchingCostComputer;
use crate::disparity::{Disparity, DisparityFlag, DisparityMap};
use crate::error::*;
use crate::frame::Pixel;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Most candidates that can be stored for one pixel.
pub const MAX_CANDIDATES: usize = 16;

/// Windows are never trimmed below this many candidates.
pub const MIN_WINDOW: usize = 3;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A disparity proposed for a base pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisparityCandidate {
    pub pixel_base: Pixel,
    pub pixel_matched: Pixel,

    /// `pixel_matched.x - pixel_base.x`
    pub disparity: i32,

    pub cost: f64,

    /// Fraction of its aggregation path the candidate was gathered over, in `(0, 1]`.
    pub path_length: f64
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct AccumulatorParams {
    pub mean_method: MeanMethod,
    pub cost_method: CostMethod,

    /// Exponent applied to the window size when normalising the dispersion cost.
    pub cost_method_power: f64,

    /// Scale applied to path lengths by the weighted mean before capping them at 1.
    pub path_length_threshold: u32
}

/// Reduces the candidates of one pixel at a time to a single disparity.
#[derive(Clone, Debug)]
pub struct DisparityAccumulator {
    params: AccumulatorParams,
    candidates: Vec<DisparityCandidate>
}

/// A contiguous run of the sorted candidates with its mean and dispersion cost.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Window {
    start: usize,
    count: usize,
    mean: f64,
    cost: f64
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// How the centre of a window of candidates is estimated.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeanMethod {
    /// Arithmetic mean of the disparities.
    SimpleAverage,

    /// Mean weighted by `min(1, path_length * threshold) / (cost + 1)`.
    WeightedAverageWithPathLength
}

/// How the spread of a window of candidates around its mean is scored.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CostMethod {
    /// `sum(|mean - dx|) / count^(power / 2)`
    DistanceToMean,

    /// `sum((mean - dx)^2) / count^power`
    DistanceSquaredToMean
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl DisparityCandidate {
    pub fn new(pixel_base: Pixel, pixel_matched: Pixel, cost: f64) -> Self {
        Self {
            pixel_base,
            pixel_matched,
            disparity: (pixel_matched.x - pixel_base.x) as i32,
            cost,
            path_length: 1.0
        }
    }

    pub fn with_path_length(mut self, path_length: f64) -> Self {
        self.path_length = path_length;
        self
    }
}

impl MeanMethod {
    pub fn mean(self, window: &[DisparityCandidate], path_length_threshold: u32) -> f64 {
        match self {
            MeanMethod::SimpleAverage => {
                let sum: f64 = window.iter().map(|c| c.disparity as f64).sum();
                sum / window.len() as f64
            }
            MeanMethod::WeightedAverageWithPathLength => {
                let threshold = path_length_threshold as f64;
                let mut weighted = 0.0;
                let mut total = 0.0;

                for c in window {
                    let w = (c.path_length * threshold).min(1.0) / (c.cost + 1.0);
                    weighted += w * c.disparity as f64;
                    total += w;
                }

                weighted / total
            }
        }
    }
}

impl CostMethod {
    pub fn cost(self, window: &[DisparityCandidate], mean: f64, power: f64) -> f64 {
        let count = window.len() as f64;

        match self {
            CostMethod::DistanceToMean => {
                let sum: f64 = window.iter().map(|c| (mean - c.disparity as f64).abs()).sum();
                sum / count.powf(power / 2.0)
            }
            CostMethod::DistanceSquaredToMean => {
                let sum: f64 = window
                    .iter()
                    .map(|c| (mean - c.disparity as f64).powi(2))
                    .sum();
                sum / count.powf(power)
            }
        }
    }
}

impl AccumulatorParams {
    pub fn validate(&self) -> Result<()> {
        if !self.cost_method_power.is_finite() {
            return Err(Error::InvalidParams(format!(
                "cost method power must be finite, got {}",
                self.cost_method_power
            )));
        }

        if self.mean_method == MeanMethod::WeightedAverageWithPathLength
            && self.path_length_threshold == 0
        {
            return Err(Error::InvalidParams(
                "the weighted mean needs a path length threshold of at least 1".into()
            ));
        }

        Ok(())
    }
}

impl Default for AccumulatorParams {
    fn default() -> Self {
        Self {
            mean_method: MeanMethod::SimpleAverage,
            cost_method: CostMethod::DistanceSquaredToMean,
            cost_method_power: 2.0,
            path_length_threshold: 1
        }
    }
}

impl DisparityAccumulator {
    pub fn new(params: AccumulatorParams) -> Result<Self> {
        params.validate()?;

        Ok(Self {
            params,
            candidates: Vec::with_capacity(MAX_CANDIDATES)
        })
    }

    pub fn params(&self) -> &AccumulatorParams {
        &self.params
    }

    /// Candidates stored for the current pixel.
    pub fn candidates(&self) -> &[DisparityCandidate] {
        &self.candidates
    }

    /// Discard any stored candidates, ready for the next pixel.
    pub fn reset(&mut self) {
        self.candidates.clear();
    }

    /// Store a candidate for the current pixel.
    ///
    /// # Panics
    ///
    /// If [`MAX_CANDIDATES`] candidates are already stored.
    pub fn store_disparity(&mut self, candidate: DisparityCandidate) {
        assert!(
            self.candidates.len() < MAX_CANDIDATES,
            "at most {} candidates can be stored per pixel",
            MAX_CANDIDATES
        );
        debug_assert!(candidate.cost >= 0.0 && candidate.cost.is_finite());
        debug_assert!(candidate.path_length > 0.0);

        self.candidates.push(candidate);
    }

    /// Reduce the stored candidates to one disparity for `pixel` and write it into `map`.
    pub fn finalize_for_pixel<C>(&mut self, pixel: Pixel, costs: &C, map: &mut DisparityMap)
    where
        C: MatchingCostComputer + ?Sized
    {
        let disp = self.finalize(pixel, costs);
        map.put(pixel.x as usize, pixel.y as usize, disp);
    }

    /// Reduce the stored candidates to one disparity for `pixel`, leaving the buffer empty.
    pub fn finalize<C>(&mut self, pixel: Pixel, costs: &C) -> Disparity
    where
        C: MatchingCostComputer + ?Sized
    {
        if self.candidates.is_empty() {
            return Disparity::invalid();
        }

        self.candidates
            .sort_unstable_by(|a, b| b.disparity.cmp(&a.disparity));

        let total = self.candidates.len();
        let window = self.trim(&self.candidates);

        trace!(
            "[accumulator] {:?}: kept {}..{} of {}, mean {:.3}, cost {:.3}",
            pixel,
            window.start,
            window.start + window.count,
            total,
            window.mean,
            window.cost
        );

        let dx = window.mean.round() as i32;
        let confidence = (window.count as f64 / total as f64) * (1.0 / (window.cost + 1.0));

        self.reset();

        Disparity {
            dx,
            sub_dx: window.mean,
            cost: costs.cost_border(pixel, pixel.offset_x(dx as isize)),
            confidence,
            flag: DisparityFlag::Valid
        }
    }

    /// Whole-map post-processing, run once the driver has finalised every pixel.
    pub fn finalize_map(&mut self, map: &mut DisparityMap) {
        debug!(
            "[accumulator] map finalised with {} of {} pixels valid",
            map.valid_count(),
            map.width() * map.height()
        );
    }

    fn evaluate(&self, window: &[DisparityCandidate]) -> (f64, f64) {
        let mean = self
            .params
            .mean_method
            .mean(window, self.params.path_length_threshold);
        let cost = self
            .params
            .cost_method
            .cost(window, mean, self.params.cost_method_power);

        (mean, cost)
    }

    /// Shrink the window over `sorted` while dropping an end lowers its cost.
    fn trim(&self, sorted: &[DisparityCandidate]) -> Window {
        let (mean, cost) = self.evaluate(sorted);
        let mut window = Window {
            start: 0,
            count: sorted.len(),
            mean,
            cost
        };

        while window.count > MIN_WINDOW {
            let end = window.start + window.count;
            let (mean_left, cost_left) = self.evaluate(&sorted[window.start + 1..end]);
            let (mean_right, cost_right) = self.evaluate(&sorted[window.start..end - 1]);

            if !(window.cost > cost_left || window.cost > cost_right) {
                break;
            }

            if cost_left <= cost_right {
                window.start += 1;
                window.mean = mean_left;
                window.cost = cost_left;
            }
            else {
                window.mean = mean_right;
                window.cost = cost_right;
            }
            window.count -= 1;
        }

        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(dxs: &[i32]) -> Vec<DisparityCandidate> {
        let mut v: Vec<_> = dxs
            .iter()
            .map(|&dx| {
                DisparityCandidate::new(Pixel::new(20, 0), Pixel::new(20 + dx as isize, 0), 0.0)
            })
            .collect();
        v.sort_unstable_by(|a, b| b.disparity.cmp(&a.disparity));
        v
    }

    #[test]
    fn trimming_never_goes_below_three() {
        let acc = DisparityAccumulator::new(AccumulatorParams::default()).unwrap();
        let spread: Vec<i32> = (0..16).map(|i| (1 << i) - 1).collect();

        for n in 4..=16 {
            let window = acc.trim(&sorted(&spread[..n]));
            assert!(window.count >= MIN_WINDOW, "n = {}: {:?}", n, window);
            assert!(window.start + window.count <= n);
        }
    }

    #[test]
    fn outlier_is_dropped_from_the_left() {
        let acc = DisparityAccumulator::new(AccumulatorParams::default()).unwrap();
        let window = acc.trim(&sorted(&[5, 5, 5, 5, 50]));

        assert_eq!(window.start, 1);
        assert_eq!(window.count, 4);
        assert_eq!(window.mean, 5.0);
        assert_eq!(window.cost, 0.0);
    }

    #[test]
    fn equal_costs_drop_the_leftmost() {
        let acc = DisparityAccumulator::new(AccumulatorParams::default()).unwrap();
        // Dropping either end of [20, 10, 10, 10, 0] costs the same
        let window = acc.trim(&sorted(&[0, 10, 10, 10, 20]));

        assert_eq!(window.start, 1);
        assert_eq!(window.count, 3);
        assert_eq!(window.mean, 10.0);
    }

    #[test]
    fn small_sets_are_not_trimmed() {
        let acc = DisparityAccumulator::new(AccumulatorParams::default()).unwrap();
        let window = acc.trim(&sorted(&[1, 9, 30]));

        assert_eq!(window.start, 0);
        assert_eq!(window.count, 3);
        assert!((window.mean - 40.0 / 3.0).abs() < 1e-12);
    }
}
