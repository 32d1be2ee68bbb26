//! Sequential reference implementation of the moment computation.
//!
//! Accumulates in f64 and walks the stack frame-major in three passes
//! (weighted mean; variance; skewness and kurtosis fused), so no buffer of
//! the stack's shape is ever allocated. This is the implementation the
//! chunked and GPU paths are validated against.

use super::{check_inputs, MomentPlanes, FWHM_FACTOR};

/// Compute the four moment maps of `data` over `values`.
///
/// `values` holds one scan position per frame; `data` is the frame-major
/// stack buffer with `values.len() * pixels` elements.
///
/// Pixels with zero total intensity produce NaN in all four maps; pixels
/// whose distribution has zero width produce NaN skewness and kurtosis.
pub fn compute_moments(
    values: &[f64],
    data: &[f32],
    pixels: usize,
) -> Result<MomentPlanes, String> {
    check_inputs(values, data, pixels)?;

    if values.is_empty() {
        return Ok(MomentPlanes::nan_filled(pixels));
    }

    // Pass 1: total weight and weighted position sum
    let mut wsum = vec![0.0f64; pixels];
    let mut mean = vec![0.0f64; pixels];
    for (frame, &x) in data.chunks_exact(pixels).zip(values.iter()) {
        for (p, &w) in frame.iter().enumerate() {
            let w = w as f64;
            wsum[p] += w;
            mean[p] += w * x;
        }
    }
    for (m, &w) in mean.iter_mut().zip(wsum.iter()) {
        // 0/0 yields NaN for pixels with no intensity
        *m /= w;
    }

    // Pass 2: variance
    let mut var = vec![0.0f64; pixels];
    for (frame, &x) in data.chunks_exact(pixels).zip(values.iter()) {
        for (p, &w) in frame.iter().enumerate() {
            let d = x - mean[p];
            var[p] += w as f64 * d * d;
        }
    }
    let mut sigma = vec![0.0f64; pixels];
    let mut fwhm = vec![0.0f64; pixels];
    for p in 0..pixels {
        var[p] /= wsum[p];
        sigma[p] = var[p].sqrt();
        fwhm[p] = FWHM_FACTOR * sigma[p];
    }

    // Pass 3: skewness and excess kurtosis, fused
    let mut skew = vec![0.0f64; pixels];
    let mut kurt = vec![0.0f64; pixels];
    for (frame, &x) in data.chunks_exact(pixels).zip(values.iter()) {
        for (p, &w) in frame.iter().enumerate() {
            let d = (x - mean[p]) / sigma[p];
            let d3 = d * d * d;
            skew[p] += w as f64 * d3;
            kurt[p] += w as f64 * d3 * d;
        }
    }
    for p in 0..pixels {
        skew[p] /= wsum[p];
        // Fisher's definition: a normal distribution has kurtosis 0
        kurt[p] = kurt[p] / wsum[p] - 3.0;
    }

    Ok(MomentPlanes {
        com: mean,
        fwhm,
        skewness: skew,
        kurtosis: kurt,
    })
}
