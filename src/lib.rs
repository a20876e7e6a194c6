//! # Census Disparity Computation
//!
//! This crate provides census transform matching costs and robust per-pixel disparity
//! selection for stereo computer vision.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod accumulator;
pub mod bitword;
pub mod census;
mod disparity;
mod error;
pub mod frame;
pub mod paths;

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::accumulator::{DisparityAccumulator, DisparityCandidate};
    pub use crate::census::{CensusCostComputer, CensusParams, MatchingCostComputer};
    pub use crate::disparity::{Disparity, DisparityAlgorithm, DisparityFlag, DisparityMap};
    pub use crate::frame::{GrayFloatImage, Pixel, StereoFrame};
}
