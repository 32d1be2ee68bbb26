//! Built-in pipeline defaults and their sanitization.

use serde::Deserialize;

/// Tunable defaults for the analysis pipeline.
///
/// All fields can be overridden from a `dfxm.yml` config file; out-of-range
/// values are clamped back to something usable by [`sanitize`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineDefaults {
    /// Rows per band for the chunked moment implementation
    pub chunk_rows: usize,

    /// Apply a 3x3 median filter to each finished moment map
    pub smooth_maps: bool,

    /// Relative tolerance for sequential/chunked cross-validation
    pub validate_rtol: f64,

    /// Absolute tolerance for sequential/chunked cross-validation
    pub validate_atol: f64,

    /// Number of intensity bins for volume segmentation
    pub segmentation_bins: usize,

    /// Number of largest components kept during postprocessing
    pub segmentation_components: usize,

    /// Ball radius for the binary closing step
    pub closing_radius: usize,

    /// Neighbor connectivity for component labeling (6, 18 or 26)
    pub connectivity: usize,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            chunk_rows: 128,
            smooth_maps: true,
            validate_rtol: 1e-4,
            validate_atol: 1e-4,
            segmentation_bins: 5,
            segmentation_components: 5,
            closing_radius: 2,
            connectivity: 26,
        }
    }
}

impl PipelineDefaults {
    /// Clamp config values into usable ranges.
    pub fn sanitize(&mut self) {
        if self.chunk_rows == 0 {
            self.chunk_rows = PipelineDefaults::default().chunk_rows;
        }
        if !self.validate_rtol.is_finite() || self.validate_rtol < 0.0 {
            self.validate_rtol = PipelineDefaults::default().validate_rtol;
        }
        if !self.validate_atol.is_finite() || self.validate_atol < 0.0 {
            self.validate_atol = PipelineDefaults::default().validate_atol;
        }
        if self.segmentation_bins == 0 {
            self.segmentation_bins = 1;
        }
        if self.segmentation_components == 0 {
            self.segmentation_components = 1;
        }
        if !matches!(self.connectivity, 6 | 18 | 26) {
            self.connectivity = 26;
        }
    }
}
