//! SIMD-optimized audio processing utilities
//!
//! Onset detection computes an RMS energy every 128 samples over a
//! 2048-sample window, which dominates song-load time for long click
//! tracks. The `wide` crate gives us portable 4-lane f32 SIMD for it.

use wide::f32x4;

/// Sum of squares of a block of samples (4-way SIMD with scalar tail)
pub fn simd_sum_of_squares(samples: &[f32]) -> f32 {
    let mut acc = f32x4::ZERO;
    let chunks = samples.chunks_exact(4);
    let tail = chunks.remainder();

    for chunk in chunks {
        let v = f32x4::from([chunk[0], chunk[1], chunk[2], chunk[3]]);
        acc += v * v;
    }

    let lanes: [f32; 4] = acc.into();
    let mut sum = lanes.iter().sum::<f32>();
    for &s in tail {
        sum += s * s;
    }
    sum
}

/// Root-mean-square energy of a window
pub fn simd_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (simd_sum_of_squares(samples) / samples.len() as f32).sqrt()
}
