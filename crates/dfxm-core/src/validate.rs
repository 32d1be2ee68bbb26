//! Cross-validation of the moment implementations.
//!
//! Runs the sequential f64 reference and the chunked (or GPU) implementation
//! on the same stack and counts, per map, the pixels whose values are not
//! close. "Close" follows numpy's `isclose`: `|a - b| <= atol + rtol * |b|`,
//! with NaN considered equal to NaN so that zero-intensity pixels do not
//! count as mismatches.

use serde::Serialize;

use crate::moments::{
    compute_moments, compute_moments_chunked, MomentEngine, MomentKind, MomentPlanes,
};
use crate::stack::ImageStack;

/// Tolerances and engine selection for [`validate_stack`].
#[derive(Debug, Clone, Copy)]
pub struct ValidateOptions {
    /// Implementation compared against the sequential reference
    pub engine: MomentEngine,
    pub rtol: f64,
    pub atol: f64,
    /// Rows per band for the chunked/GPU implementation
    pub chunk_rows: usize,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            engine: MomentEngine::Chunked,
            rtol: 1e-4,
            atol: 1e-4,
            chunk_rows: 128,
        }
    }
}

/// Comparison result for one moment map.
#[derive(Debug, Clone, Serialize)]
pub struct MapComparison {
    /// Moment kind key ("com", "fwhm", ...)
    pub kind: String,
    /// Pixels where the two implementations disagree beyond tolerance
    pub mismatches: usize,
    /// Largest absolute difference over comparable (non-NaN) pixels
    pub max_abs_diff: f64,
}

/// Comparison results for one scan dimension (four maps).
#[derive(Debug, Clone, Serialize)]
pub struct DimensionComparison {
    pub dimension: String,
    pub maps: Vec<MapComparison>,
}

/// Full cross-validation report for a stack.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub rtol: f64,
    pub atol: f64,
    pub pixels: usize,
    pub dimensions: Vec<DimensionComparison>,
}

impl ValidationReport {
    /// Total mismatch count over every map of every dimension.
    pub fn total_mismatches(&self) -> usize {
        self.dimensions
            .iter()
            .flat_map(|d| d.maps.iter())
            .map(|m| m.mismatches)
            .sum()
    }

    /// True when the implementations agree everywhere.
    pub fn passed(&self) -> bool {
        self.total_mismatches() == 0
    }
}

/// numpy-`isclose` with NaN equal to NaN.
pub fn is_close(a: f64, b: f64, rtol: f64, atol: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    if a == b {
        // Covers matching infinities
        return true;
    }
    (a - b).abs() <= atol + rtol * b.abs()
}

/// Compare two moment planes per map.
pub fn compare_planes(
    reference: &MomentPlanes,
    candidate: &MomentPlanes,
    rtol: f64,
    atol: f64,
) -> Vec<MapComparison> {
    MomentKind::all()
        .iter()
        .map(|&kind| {
            let a = reference.plane(kind);
            let b = candidate.plane(kind);
            let mut mismatches = 0;
            let mut max_abs_diff = 0.0f64;
            for (&x, &y) in a.iter().zip(b.iter()) {
                if !is_close(y, x, rtol, atol) {
                    mismatches += 1;
                }
                let diff = (x - y).abs();
                if diff.is_finite() && diff > max_abs_diff {
                    max_abs_diff = diff;
                }
            }
            MapComparison {
                kind: kind.key().to_string(),
                mismatches,
                max_abs_diff,
            }
        })
        .collect()
}

/// Run both implementations over every scan dimension and compare.
pub fn validate_stack(
    stack: &ImageStack,
    options: &ValidateOptions,
) -> Result<ValidationReport, String> {
    let pixels = stack.pixels();
    let chunk_pixels = options.chunk_rows.max(1) * stack.width;

    let mut dimensions = Vec::with_capacity(stack.dimensions.len());
    for dim in &stack.dimensions {
        let reference = compute_moments(&dim.positions, &stack.data, pixels)?;
        let candidate = match options.engine {
            MomentEngine::Sequential | MomentEngine::Chunked => {
                compute_moments_chunked(&dim.positions, &stack.data, pixels, chunk_pixels)?
            }
            MomentEngine::Gpu => crate::moments::compute_moments_accelerated(
                &dim.positions,
                &stack.data,
                pixels,
                chunk_pixels,
            )?,
        };

        dimensions.push(DimensionComparison {
            dimension: dim.name.clone(),
            maps: compare_planes(&reference, &candidate, options.rtol, options.atol),
        });
    }

    Ok(ValidationReport {
        rtol: options.rtol,
        atol: options.atol,
        pixels,
        dimensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::ScanDimension;

    // ========================================================================
    // is_close semantics
    // ========================================================================

    #[test]
    fn test_is_close_basic() {
        assert!(is_close(1.0, 1.0, 1e-4, 1e-4));
        assert!(is_close(1.00005, 1.0, 1e-4, 1e-4));
        assert!(!is_close(1.1, 1.0, 1e-4, 1e-4));
    }

    #[test]
    fn test_is_close_nan_equals_nan() {
        assert!(is_close(f64::NAN, f64::NAN, 1e-4, 1e-4));
        assert!(!is_close(f64::NAN, 1.0, 1e-4, 1e-4));
        assert!(!is_close(1.0, f64::NAN, 1e-4, 1e-4));
    }

    #[test]
    fn test_is_close_infinities() {
        assert!(is_close(f64::INFINITY, f64::INFINITY, 1e-4, 1e-4));
        assert!(!is_close(f64::INFINITY, 1.0, 1e-4, 1e-4));
    }

    #[test]
    fn test_is_close_near_zero_uses_atol() {
        assert!(is_close(5e-5, 0.0, 1e-4, 1e-4));
        assert!(!is_close(5e-3, 0.0, 1e-4, 1e-4));
    }

    // ========================================================================
    // Stack validation
    // ========================================================================

    fn gaussian_stack() -> ImageStack {
        let frames = 31;
        let (h, w) = (12, 10);
        let pixels = h * w;
        let positions: Vec<f64> = (0..frames).map(|i| -1.0 + 2.0 * i as f64 / 30.0).collect();

        let mut data = vec![0.0f32; frames * pixels];
        for (f, &x) in positions.iter().enumerate() {
            for p in 0..pixels {
                let center = -0.4 + 0.8 * (p as f64 / pixels as f64);
                let d = (x - center) / 0.2;
                data[f * pixels + p] = (500.0 * (-0.5 * d * d).exp()) as f32;
            }
        }

        ImageStack::new(
            frames,
            h,
            w,
            data,
            vec![ScanDimension::new("diffry", positions)],
        )
        .unwrap()
    }

    #[test]
    fn test_validate_stack_passes_at_default_tolerance() {
        let stack = gaussian_stack();
        let report = validate_stack(&stack, &ValidateOptions::default()).unwrap();

        assert_eq!(report.dimensions.len(), 1);
        assert_eq!(report.dimensions[0].maps.len(), 4);
        assert!(
            report.passed(),
            "chunked implementation should agree with the reference: {} mismatches",
            report.total_mismatches()
        );
    }

    #[test]
    fn test_validate_stack_fails_at_absurd_tolerance() {
        let stack = gaussian_stack();
        let report = validate_stack(
            &stack,
            &ValidateOptions {
                rtol: 0.0,
                atol: 0.0,
                ..ValidateOptions::default()
            },
        )
        .unwrap();

        // f32 vs f64 accumulation cannot agree bit for bit everywhere
        assert!(report.total_mismatches() > 0);
    }

    #[test]
    fn test_zero_intensity_pixels_do_not_mismatch() {
        // All-zero stack: every pixel is NaN in both implementations
        let stack = ImageStack::new(
            3,
            2,
            2,
            vec![0.0; 12],
            vec![ScanDimension::new("chi", vec![0.0, 1.0, 2.0])],
        )
        .unwrap();
        let report = validate_stack(&stack, &ValidateOptions::default()).unwrap();

        assert!(report.passed());
    }

    #[test]
    fn test_report_serializes_to_json() {
        let stack = gaussian_stack();
        let report = validate_stack(&stack, &ValidateOptions::default()).unwrap();
        let json = serde_json::to_string_pretty(&report).unwrap();

        assert!(json.contains("\"mismatches\""));
        assert!(json.contains("\"diffry\""));
    }
}
