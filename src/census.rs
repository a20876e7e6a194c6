//! # Census matching cost
//!
//! Every pixel of both images is encoded as a census word: one bit per position of a
//! rectangular window around the pixel, set when the neighbour at that position is strictly
//! darker than the centre. The matching cost between a base and a matched pixel is the Hamming
//! distance between their words.
//!
//! Window positions are visited row by row (`dy` outer, `dx` inner), so bit `i` of a word
//! corresponds to the `i`th position in that order. The centre position is part of the order
//! but its bit is never set. Windows reaching over the image edge are sampled with mirrored
//! coordinates.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::debug;
use rayon::prelude::*;
use serde::Deserialize;

use crate::bitword::{BitWord, BitWordCodec, WidthClass, BLOCK_BITS};
use crate::error::*;
use crate::frame::{mirror, GrayFloatImage, Pixel, StereoFrame};

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// A source of pixel to pixel matching costs over a stereo pair.
pub trait MatchingCostComputer {
    /// Prepare the cost field for a new stereo pair. Must be called before any cost query.
    fn init(&mut self, frame: &StereoFrame) -> Result<()>;

    /// Refresh the cost field between aggregation iterations.
    fn update(&mut self);

    /// Cost of matching `base` with `matched`. Both pixels must lie inside the image; lower is
    /// better.
    fn cost(&self, base: Pixel, matched: Pixel) -> f64;

    /// As [`MatchingCostComputer::cost`], but pixels outside the image are mirrored back in.
    fn cost_border(&self, base: Pixel, matched: Pixel) -> f64;

    /// Largest cost `cost` can return.
    fn max_cost(&self) -> f64;

    /// Horizontal margin inside which the encoding needed border handling.
    fn border_width(&self) -> usize;

    /// Vertical margin inside which the encoding needed border handling.
    fn border_height(&self) -> usize;
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Half extents of the census window. The full window is
/// `(2 * height_radius + 1) x (2 * width_radius + 1)`.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CensusParams {
    pub width_radius: usize,
    pub height_radius: usize
}

/// One census word per pixel of an image.
#[derive(Clone, Debug, PartialEq)]
pub struct CensusImage<const N: usize> {
    width: usize,
    height: usize,
    words: Vec<BitWord<N>>
}

/// Census encodings of a stereo pair at one word width.
#[derive(Clone, Debug)]
pub struct CensusField<const N: usize> {
    params: CensusParams,
    codec: BitWordCodec,
    base: CensusImage<N>,
    matched: CensusImage<N>
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Census cost computer, specialised on the word width chosen from the window size.
///
/// The width is fixed when the computer is built, so every cost query runs on words of a known
/// block count.
#[derive(Clone, Debug)]
pub enum CensusCostComputer {
    W32(CensusField<1>),
    W64(CensusField<2>),
    W96(CensusField<3>),
    W128(CensusField<4>),
    W160(CensusField<5>),
    W192(CensusField<6>),
    W224(CensusField<7>),
    W256(CensusField<8>)
}

// -----------------------------------------------------------------------------------------------
// MACROS
// -----------------------------------------------------------------------------------------------

macro_rules! with_field {
    ($computer:expr, $field:ident => $body:expr) => {
        match $computer {
            CensusCostComputer::W32($field) => $body,
            CensusCostComputer::W64($field) => $body,
            CensusCostComputer::W96($field) => $body,
            CensusCostComputer::W128($field) => $body,
            CensusCostComputer::W160($field) => $body,
            CensusCostComputer::W192($field) => $body,
            CensusCostComputer::W224($field) => $body,
            CensusCostComputer::W256($field) => $body
        }
    };
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl CensusParams {
    pub fn new(width_radius: usize, height_radius: usize) -> Self {
        Self { width_radius, height_radius }
    }

    pub fn window_width(&self) -> usize {
        2 * self.width_radius + 1
    }

    pub fn window_height(&self) -> usize {
        2 * self.height_radius + 1
    }

    /// Number of positions in the window, which is also the census word length in bits.
    pub fn word_length(&self) -> usize {
        self.window_width() * self.window_height()
    }
}

impl Default for CensusParams {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl<const N: usize> CensusImage<N> {
    /// An image with no pixels, used before the first encoding.
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            words: Vec::new()
        }
    }

    /// Encode every pixel of `img`.
    pub fn build(img: &GrayFloatImage, params: &CensusParams, codec: &BitWordCodec) -> Self {
        let width = img.width();
        let height = img.height();
        let mut words = vec![BitWord::zero(); width * height];

        if width > 0 {
            words
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, word) in row.iter_mut().enumerate() {
                        *word = encode_pixel(img, x, y, params, codec);
                    }
                });
        }

        Self { width, height, words }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> &BitWord<N> {
        &self.words[y * self.width + x]
    }

    fn get_mirrored(&self, p: Pixel) -> &BitWord<N> {
        self.get(mirror(p.x, self.width), mirror(p.y, self.height))
    }
}

impl<const N: usize> CensusField<N> {
    fn new(params: CensusParams, codec: BitWordCodec) -> Self {
        Self {
            params,
            codec,
            base: CensusImage::empty(),
            matched: CensusImage::empty()
        }
    }

    pub fn base(&self) -> &CensusImage<N> {
        &self.base
    }

    pub fn matched(&self) -> &CensusImage<N> {
        &self.matched
    }
}

impl<const N: usize> MatchingCostComputer for CensusField<N> {
    fn init(&mut self, frame: &StereoFrame) -> Result<()> {
        frame.check_dimensions()?;

        let start = std::time::Instant::now();

        self.base = CensusImage::build(&frame.base, &self.params, &self.codec);
        self.matched = CensusImage::build(&frame.matched, &self.params, &self.codec);

        debug!(
            "[census] encoded {} x {} pair with {} bit words in {}ms",
            frame.width(),
            frame.height(),
            N * BLOCK_BITS,
            start.elapsed().as_millis()
        );

        Ok(())
    }

    fn update(&mut self) {}

    fn cost(&self, base: Pixel, matched: Pixel) -> f64 {
        debug_assert!(base.is_inside(self.base.width, self.base.height));
        debug_assert!(matched.is_inside(self.matched.width, self.matched.height));

        let a = self.base.get(base.x as usize, base.y as usize);
        let b = self.matched.get(matched.x as usize, matched.y as usize);

        a.hamming_distance(b) as f64
    }

    fn cost_border(&self, base: Pixel, matched: Pixel) -> f64 {
        let a = self.base.get_mirrored(base);
        let b = self.matched.get_mirrored(matched);

        a.hamming_distance(b) as f64
    }

    fn max_cost(&self) -> f64 {
        (self.params.word_length() - 1) as f64
    }

    fn border_width(&self) -> usize {
        self.params.width_radius
    }

    fn border_height(&self) -> usize {
        self.params.height_radius
    }
}

impl CensusCostComputer {
    /// Create a computer for the given window, choosing the narrowest word that fits it.
    pub fn new(params: CensusParams) -> Result<Self> {
        let codec = BitWordCodec::configure_width(params.word_length())?;

        debug!(
            "[census] {} x {} window uses {:?} words",
            params.window_width(),
            params.window_height(),
            codec.class()
        );

        let computer = match codec.class() {
            WidthClass::W32 => CensusCostComputer::W32(CensusField::new(params, codec)),
            WidthClass::W64 => CensusCostComputer::W64(CensusField::new(params, codec)),
            WidthClass::W96 => CensusCostComputer::W96(CensusField::new(params, codec)),
            WidthClass::W128 => CensusCostComputer::W128(CensusField::new(params, codec)),
            WidthClass::W160 => CensusCostComputer::W160(CensusField::new(params, codec)),
            WidthClass::W192 => CensusCostComputer::W192(CensusField::new(params, codec)),
            WidthClass::W224 => CensusCostComputer::W224(CensusField::new(params, codec)),
            WidthClass::W256 => CensusCostComputer::W256(CensusField::new(params, codec))
        };

        Ok(computer)
    }

    pub fn params(&self) -> CensusParams {
        with_field!(self, f => f.params)
    }

    pub fn class(&self) -> WidthClass {
        with_field!(self, f => f.codec.class())
    }

    /// Number of meaningful bits in each census word.
    pub fn word_length(&self) -> usize {
        with_field!(self, f => f.codec.bits())
    }

    /// Blocks of the base image's census word at `(x, y)`.
    pub fn base_word(&self, x: usize, y: usize) -> &[u32] {
        with_field!(self, f => &f.base.get(x, y).blocks()[..])
    }

    /// Blocks of the matched image's census word at `(x, y)`.
    pub fn matched_word(&self, x: usize, y: usize) -> &[u32] {
        with_field!(self, f => &f.matched.get(x, y).blocks()[..])
    }
}

impl MatchingCostComputer for CensusCostComputer {
    fn init(&mut self, frame: &StereoFrame) -> Result<()> {
        with_field!(self, f => f.init(frame))
    }

    fn update(&mut self) {
        with_field!(self, f => f.update())
    }

    fn cost(&self, base: Pixel, matched: Pixel) -> f64 {
        with_field!(self, f => f.cost(base, matched))
    }

    fn cost_border(&self, base: Pixel, matched: Pixel) -> f64 {
        with_field!(self, f => f.cost_border(base, matched))
    }

    fn max_cost(&self) -> f64 {
        with_field!(self, f => f.max_cost())
    }

    fn border_width(&self) -> usize {
        with_field!(self, f => f.border_width())
    }

    fn border_height(&self) -> usize {
        with_field!(self, f => f.border_height())
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn encode_pixel<const N: usize>(
    img: &GrayFloatImage,
    x: usize,
    y: usize,
    params: &CensusParams,
    codec: &BitWordCodec
) -> BitWord<N> {
    let interior = x >= params.width_radius
        && x + params.width_radius < img.width()
        && y >= params.height_radius
        && y + params.height_radius < img.height();

    let blocks: [u32; N] = if interior {
        encode_window(x, y, params, img.get(x, y), |px, py| {
            img.get(px as usize, py as usize)
        })
    }
    else {
        encode_window(x, y, params, img.get(x, y), |px, py| img.get_mirrored(px, py))
    };

    codec.create(&blocks)
}

/// Compare every window position against `centre`, sampling neighbours through `sample`.
fn encode_window<const N: usize, F>(
    x: usize,
    y: usize,
    params: &CensusParams,
    centre: f32,
    sample: F
) -> [u32; N]
where
    F: Fn(isize, isize) -> f32
{
    let wr = params.width_radius as isize;
    let hr = params.height_radius as isize;
    let (x, y) = (x as isize, y as isize);

    let mut blocks = [0u32; N];
    let mut i = 0;

    for dy in -hr..=hr {
        for dx in -wr..=wr {
            if sample(x + dx, y + dy) < centre {
                blocks[i / BLOCK_BITS] |= 1 << (i % BLOCK_BITS);
            }
            i += 1;
        }
    }

    blocks
}
