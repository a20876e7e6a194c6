//! Census encoding and cost queries

use cv_census::{
    bitword::WidthClass,
    frame::mirror,
    prelude::*,
    Error
};

// -----------------------------------------------------------------------------------------------
// HELPERS
// -----------------------------------------------------------------------------------------------

/// 10 x 10 image of the repeating `(col + row + shift) mod 3` pattern.
fn diagonal_pattern(shift: usize) -> GrayFloatImage {
    GrayFloatImage::from_fn(10, 10, |x, y| ((x + y + shift) % 3) as f32 / 2.0)
}

fn texture(width: usize, height: usize, seed: u32) -> GrayFloatImage {
    GrayFloatImage::from_fn(width, height, |x, y| {
        let mut h = (x as u32).wrapping_mul(73_856_093)
            ^ (y as u32).wrapping_mul(19_349_663)
            ^ seed;
        h ^= h >> 13;
        h = h.wrapping_mul(0x5bd1_e995);
        h ^= h >> 15;
        (h % 256) as f32 / 255.0
    })
}

/// Straightforward census word of `(x, y)`, one bit per window position in raster order.
fn reference_word(img: &GrayFloatImage, x: usize, y: usize, params: &CensusParams) -> Vec<u32> {
    let wr = params.width_radius as isize;
    let hr = params.height_radius as isize;
    let centre = img.get(x, y);

    let mut words = vec![0u32; (params.word_length() + 31) / 32];
    let mut i = 0;
    for dy in -hr..=hr {
        for dx in -wr..=wr {
            let px = mirror(x as isize + dx, img.width());
            let py = mirror(y as isize + dy, img.height());
            if img.get(px, py) < centre {
                words[i / 32] |= 1 << (i % 32);
            }
            i += 1;
        }
    }

    words
}

fn init(params: CensusParams, frame: &StereoFrame) -> Result<CensusCostComputer, Error> {
    let mut census = CensusCostComputer::new(params)?;
    census.init(frame)?;
    Ok(census)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[test]
fn diagonal_pattern_words() -> Result<(), Box<dyn std::error::Error>> {
    let frame = StereoFrame::new(diagonal_pattern(0), diagonal_pattern(1));
    let census = init(CensusParams::new(1, 1), &frame)?;

    assert_eq!(census.class(), WidthClass::W32);
    assert_eq!(census.word_length(), 9);

    // (row, col, base word, matched word)
    let table: &[(usize, usize, u32, u32)] = &[
        (0, 0, 0, 0b1_0100_0101),
        (1, 1, 0b1_1010_1011, 0),
        (1, 2, 0, 0b1_0000_1010),
        (1, 3, 0b1_0000_1010, 0b1_1010_1011),
        (4, 4, 0b1_1010_1011, 0),
        (0, 1, 0b1_0000_1100, 0b1_1010_1110),
        (9, 5, 0b0_1110_1011, 0),
        (9, 9, 0, 0b0_1010_1010),
    ];

    for &(row, col, base, matched) in table {
        assert_eq!(census.base_word(col, row), &[base], "base ({}, {})", row, col);
        assert_eq!(census.matched_word(col, row), &[matched], "matched ({}, {})", row, col);
    }

    let cost = |row: isize, col: isize| census.cost(Pixel::new(col, row), Pixel::new(col, row));
    assert_eq!(cost(0, 0), 4.0);
    assert_eq!(cost(1, 1), 6.0);
    assert_eq!(cost(1, 2), 3.0);
    assert_eq!(cost(1, 3), 3.0);

    Ok(())
}

#[test]
fn words_follow_the_raster_rule_everywhere() -> Result<(), Box<dyn std::error::Error>> {
    let frame = StereoFrame::new(texture(13, 11, 1), texture(13, 11, 2));

    for &(wr, hr) in &[(1, 1), (2, 1), (1, 3), (3, 3), (5, 4), (7, 7)] {
        let params = CensusParams::new(wr, hr);
        let census = init(params, &frame)?;

        for y in 0..11 {
            for x in 0..13 {
                assert_eq!(
                    census.base_word(x, y),
                    &reference_word(&frame.base, x, y, &params)[..],
                    "radius ({}, {}) at ({}, {})",
                    wr,
                    hr,
                    x,
                    y
                );
                assert_eq!(
                    census.matched_word(x, y),
                    &reference_word(&frame.matched, x, y, &params)[..]
                );
            }
        }
    }

    Ok(())
}

#[test]
fn init_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
    let frame = StereoFrame::new(texture(24, 16, 3), texture(24, 16, 4));
    let params = CensusParams::new(3, 2);

    let mut census = init(params, &frame)?;
    let first: Vec<Vec<u32>> = (0..16)
        .flat_map(|y| (0..24).map(move |x| (x, y)))
        .map(|(x, y)| census.base_word(x, y).to_vec())
        .collect();

    census.init(&frame)?;
    census.update();

    for (i, word) in first.iter().enumerate() {
        assert_eq!(census.base_word(i % 24, i / 24), &word[..]);
    }

    Ok(())
}

#[test]
fn border_cost_matches_interior_cost() -> Result<(), Box<dyn std::error::Error>> {
    let frame = StereoFrame::new(texture(20, 12, 5), texture(20, 12, 6));
    let census = init(CensusParams::new(2, 2), &frame)?;

    for y in 0..12 {
        for x in 0..20 {
            for d in -4..=0 {
                let base = Pixel::new(x, y);
                let matched = base.offset_x(d);
                if matched.x < 0 {
                    continue;
                }
                assert_eq!(census.cost(base, matched), census.cost_border(base, matched));
            }
        }
    }

    // Out of range matches are reflected back into the image
    let base = Pixel::new(1, 4);
    assert_eq!(
        census.cost_border(base, Pixel::new(-2, 4)),
        census.cost(base, Pixel::new(2, 4))
    );
    assert_eq!(
        census.cost_border(Pixel::new(19, 11), Pixel::new(21, 12)),
        census.cost(Pixel::new(19, 11), Pixel::new(17, 10))
    );

    Ok(())
}

#[test]
fn costs_are_hamming_distances_in_range() -> Result<(), Box<dyn std::error::Error>> {
    let frame = StereoFrame::new(texture(16, 16, 7), texture(16, 16, 8));
    let census = init(CensusParams::new(2, 3), &frame)?;

    assert_eq!(census.max_cost(), 34.0);
    assert_eq!(census.border_width(), 2);
    assert_eq!(census.border_height(), 3);

    for y in 0..16 {
        for x in 0..16 {
            let p = Pixel::new(x, y);
            let c = census.cost(p, p);
            assert!(c >= 0.0 && c <= census.max_cost());
            assert_eq!(c.fract(), 0.0);
        }
    }

    // Identical images match perfectly at zero disparity
    let same = StereoFrame::new(texture(16, 16, 9), texture(16, 16, 9));
    let census = init(CensusParams::new(2, 3), &same)?;
    assert_eq!(census.cost(Pixel::new(7, 7), Pixel::new(7, 7)), 0.0);

    Ok(())
}

#[test]
fn word_width_follows_the_window() -> Result<(), Box<dyn std::error::Error>> {
    assert_eq!(CensusCostComputer::new(CensusParams::new(1, 1))?.class(), WidthClass::W32);
    assert_eq!(CensusCostComputer::new(CensusParams::new(3, 3))?.class(), WidthClass::W64);
    assert_eq!(CensusCostComputer::new(CensusParams::new(4, 4))?.class(), WidthClass::W96);
    assert_eq!(CensusCostComputer::new(CensusParams::new(7, 7))?.class(), WidthClass::W256);

    assert!(matches!(
        CensusCostComputer::new(CensusParams::new(8, 8)),
        Err(Error::UnsupportedWidth { bits: 289 })
    ));

    Ok(())
}

#[test]
fn mismatched_frames_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut census = CensusCostComputer::new(CensusParams::default())?;
    let frame = StereoFrame::new(GrayFloatImage::new(8, 6), GrayFloatImage::new(8, 5));

    assert_eq!(
        census.init(&frame),
        Err(Error::DimensionMismatch {
            base: (8, 6),
            matched: (8, 5)
        })
    );

    Ok(())
}

#[test]
fn params_deserialize() -> Result<(), Box<dyn std::error::Error>> {
    let params: CensusParams = serde_json::from_str(r#"{ "width_radius": 4, "height_radius": 2 }"#)?;

    assert_eq!(params, CensusParams::new(4, 2));
    assert_eq!(params.word_length(), 45);

    Ok(())
}
