//! Chunked moment implementation: row bands, f32 accumulation.
//!
//! The pixel plane is split into bands of `chunk_pixels` and each band is
//! processed independently on the rayon thread pool. Per pixel, the frame
//! axis is walked three times (mean; variance; skewness and kurtosis fused)
//! with f32 accumulators, the same arithmetic the WGSL kernel in the `gpu`
//! module performs, so both chunked paths agree with the f64 reference only
//! within tolerance. Band boundaries never change results: every pixel is
//! computed independently.

use rayon::prelude::*;

use super::{check_inputs, MomentPlanes, FWHM_FACTOR};

/// Compute the four moment maps band by band.
///
/// `chunk_pixels` is the band size; it is clamped to at least one pixel.
/// Output is identical for any band size, only scheduling changes.
pub fn compute_moments_chunked(
    values: &[f64],
    data: &[f32],
    pixels: usize,
    chunk_pixels: usize,
) -> Result<MomentPlanes, String> {
    check_inputs(values, data, pixels)?;

    if values.is_empty() {
        return Ok(MomentPlanes::nan_filled(pixels));
    }

    let frames = values.len();
    let positions: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    let chunk = chunk_pixels.clamp(1, pixels);

    let mut com = vec![0.0f64; pixels];
    let mut fwhm = vec![0.0f64; pixels];
    let mut skew = vec![0.0f64; pixels];
    let mut kurt = vec![0.0f64; pixels];

    com.par_chunks_mut(chunk)
        .zip(fwhm.par_chunks_mut(chunk))
        .zip(skew.par_chunks_mut(chunk).zip(kurt.par_chunks_mut(chunk)))
        .enumerate()
        .for_each(|(band, ((com_band, fwhm_band), (skew_band, kurt_band)))| {
            let start = band * chunk;
            for p in 0..com_band.len() {
                let idx = start + p;
                let moments = pixel_moments(&positions, data, pixels, frames, idx);
                com_band[p] = moments[0] as f64;
                fwhm_band[p] = moments[1] as f64;
                skew_band[p] = moments[2] as f64;
                kurt_band[p] = moments[3] as f64;
            }
        });

    Ok(MomentPlanes {
        com,
        fwhm,
        skewness: skew,
        kurtosis: kurt,
    })
}

/// Moments of a single pixel: [mean, fwhm, skewness, kurtosis].
#[inline]
fn pixel_moments(
    positions: &[f32],
    data: &[f32],
    pixels: usize,
    frames: usize,
    idx: usize,
) -> [f32; 4] {
    let mut wsum = 0.0f32;
    let mut m = 0.0f32;
    for f in 0..frames {
        let w = data[f * pixels + idx];
        wsum += w;
        m += w * positions[f];
    }
    let mean = m / wsum;

    let mut var = 0.0f32;
    for f in 0..frames {
        let d = positions[f] - mean;
        var += data[f * pixels + idx] * d * d;
    }
    var /= wsum;
    let sigma = var.sqrt();

    let mut skew = 0.0f32;
    let mut kurt = 0.0f32;
    for f in 0..frames {
        let d = (positions[f] - mean) / sigma;
        let d3 = d * d * d;
        let w = data[f * pixels + idx];
        skew += w * d3;
        kurt += w * d3 * d;
    }
    skew /= wsum;
    kurt = kurt / wsum - 3.0;

    [mean, FWHM_FACTOR as f32 * sigma, skew, kurt]
}
