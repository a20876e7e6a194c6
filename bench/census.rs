use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cv_census::{
    bitword::BitWord,
    paths::{Params, PathMatcher},
    prelude::*
};

fn texture(width: usize, height: usize, shift: usize) -> GrayFloatImage {
    GrayFloatImage::from_fn(width, height, |x, y| {
        let mut h = ((x + shift) as u32).wrapping_mul(0x9E37_79B1)
            ^ (y as u32).wrapping_mul(0x85EB_CA77);
        h ^= h >> 15;
        h = h.wrapping_mul(0xC2B2_AE3D);
        h ^= h >> 13;
        (h & 0xFF) as f32 / 255.0
    })
}

fn census_bench(c: &mut Criterion) {
    // Build frame
    let frame = StereoFrame::new(texture(320, 240, 0), texture(320, 240, 12));

    // Hamming distance of the widest words
    let a = BitWord::<8>::from_blocks([0xDEAD_BEEF; 8]);
    let b = BitWord::<8>::from_blocks([0x0BAD_F00D; 8]);
    c.bench_function("hamming 256 bit", |bch| {
        bch.iter(|| black_box(&a).hamming_distance(black_box(&b)))
    });

    // Census encoding of a pair with a 7 x 7 window
    let mut census = CensusCostComputer::new(CensusParams::new(3, 3)).unwrap();
    c.bench_function("census init 320x240 7x7", |bch| {
        bch.iter(|| census.init(black_box(&frame)))
    });

    // Full path voting pipeline
    let mut matcher = PathMatcher::new(Params {
        disparity_range: (-24, 0),
        path_length: 4,
        ..Params::default()
    })
    .unwrap();
    let mut group = c.benchmark_group("paths");
    group.sample_size(10);
    group.bench_function("path matcher 320x240", |bch| bch.iter(|| matcher.compute(&frame)));
    group.finish();
}

criterion_group!(benches, census_bench);
criterion_main!(benches);
