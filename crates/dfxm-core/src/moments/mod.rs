//! Per-pixel statistical moments of intensity distributions.
//!
//! For every pixel, the stack of frames along a scan dimension is treated as
//! a weighted empirical distribution over that dimension's positions: frame
//! intensities are the weights, positions are the values. This module
//! computes the first four moments of that distribution (center of mass,
//! FWHM from the variance, skewness, and excess kurtosis) as one 2D map
//! per moment.
//!
//! Two implementations are provided:
//! - `sequential`: the f64 reference, three frame-major passes over the stack
//! - `chunked`: row-band processing with f32 accumulation, parallelized with
//!   rayon and mirrored by the wgpu compute kernel in the `gpu` module
//!
//! The two must agree within floating-point tolerance; see the `validate`
//! module for the cross-check.

mod chunked;
mod sequential;


pub use chunked::compute_moments_chunked;
pub use sequential::compute_moments;

use crate::preprocess::median_filter_3x3;
use crate::stack::ImageStack;

/// Conversion factor from standard deviation to FWHM: `2*sqrt(2*ln 2)`.
pub const FWHM_FACTOR: f64 = 2.354_820_045_030_949;

/// The four moment maps produced per scan dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MomentKind {
    CenterOfMass,
    Fwhm,
    Skewness,
    Kurtosis,
}

impl MomentKind {
    /// All kinds in export order.
    pub fn all() -> [MomentKind; 4] {
        [
            MomentKind::CenterOfMass,
            MomentKind::Fwhm,
            MomentKind::Skewness,
            MomentKind::Kurtosis,
        ]
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            MomentKind::CenterOfMass => "Center of mass",
            MomentKind::Fwhm => "FWHM",
            MomentKind::Skewness => "Skewness",
            MomentKind::Kurtosis => "Kurtosis",
        }
    }

    /// Short identifier used in file names and manifests.
    pub fn key(&self) -> &'static str {
        match self {
            MomentKind::CenterOfMass => "com",
            MomentKind::Fwhm => "fwhm",
            MomentKind::Skewness => "skewness",
            MomentKind::Kurtosis => "kurtosis",
        }
    }

    /// Parse a short identifier back into a kind.
    pub fn from_key(key: &str) -> Result<MomentKind, String> {
        match key {
            "com" => Ok(MomentKind::CenterOfMass),
            "fwhm" => Ok(MomentKind::Fwhm),
            "skewness" => Ok(MomentKind::Skewness),
            "kurtosis" => Ok(MomentKind::Kurtosis),
            other => Err(format!(
                "Unknown moment kind '{}' (expected com, fwhm, skewness or kurtosis)",
                other
            )),
        }
    }
}

/// The four flat moment planes for one scan dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentPlanes {
    pub com: Vec<f64>,
    pub fwhm: Vec<f64>,
    pub skewness: Vec<f64>,
    pub kurtosis: Vec<f64>,
}

impl MomentPlanes {
    pub(crate) fn nan_filled(pixels: usize) -> Self {
        Self {
            com: vec![f64::NAN; pixels],
            fwhm: vec![f64::NAN; pixels],
            skewness: vec![f64::NAN; pixels],
            kurtosis: vec![f64::NAN; pixels],
        }
    }

    /// Borrow the plane for one moment kind.
    pub fn plane(&self, kind: MomentKind) -> &[f64] {
        match kind {
            MomentKind::CenterOfMass => &self.com,
            MomentKind::Fwhm => &self.fwhm,
            MomentKind::Skewness => &self.skewness,
            MomentKind::Kurtosis => &self.kurtosis,
        }
    }
}

/// Moment maps for one scan dimension of a stack.
#[derive(Debug, Clone)]
pub struct MomentMaps {
    /// Scan dimension (motor) name these maps belong to
    pub dimension: String,

    /// Map height in pixels
    pub height: usize,

    /// Map width in pixels
    pub width: usize,

    /// The four maps
    pub planes: MomentPlanes,
}

impl MomentMaps {
    /// Borrow the map for one moment kind.
    pub fn map(&self, kind: MomentKind) -> &[f64] {
        self.planes.plane(kind)
    }
}

/// Which implementation computes the moments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomentEngine {
    /// f64 reference, single-threaded
    Sequential,
    /// Row-band f32 implementation on the CPU thread pool
    Chunked,
    /// wgpu compute version of the chunked implementation; falls back to
    /// `Chunked` when the `gpu` feature is disabled or no adapter is found
    Gpu,
}

/// Options for [`moment_maps`].
#[derive(Debug, Clone, Copy)]
pub struct MomentOptions {
    pub engine: MomentEngine,

    /// Apply a 3x3 median filter to each finished map
    pub smooth: bool,

    /// Rows per band for the chunked/GPU implementations
    pub chunk_rows: usize,
}

impl Default for MomentOptions {
    fn default() -> Self {
        Self {
            engine: MomentEngine::Chunked,
            smooth: true,
            chunk_rows: 128,
        }
    }
}

/// Compute moment maps for every scan dimension of a stack.
///
/// Routes to the implementation selected in `options.engine`. The GPU path
/// degrades gracefully: if the feature is compiled out, no adapter is
/// available, or execution fails, the chunked CPU implementation runs
/// instead and a `[WARN]` line is printed.
pub fn moment_maps(stack: &ImageStack, options: &MomentOptions) -> Result<Vec<MomentMaps>, String> {
    let pixels = stack.pixels();
    let chunk_pixels = options.chunk_rows.max(1) * stack.width;

    let mut results = Vec::with_capacity(stack.dimensions.len());
    for dim in &stack.dimensions {
        let planes = match options.engine {
            MomentEngine::Sequential => compute_moments(&dim.positions, &stack.data, pixels)?,
            MomentEngine::Chunked => {
                compute_moments_chunked(&dim.positions, &stack.data, pixels, chunk_pixels)?
            }
            MomentEngine::Gpu => {
                compute_moments_accelerated(&dim.positions, &stack.data, pixels, chunk_pixels)?
            }
        };

        let mut maps = MomentMaps {
            dimension: dim.name.clone(),
            height: stack.height,
            width: stack.width,
            planes,
        };

        if options.smooth {
            smooth_maps(&mut maps);
        }

        results.push(maps);
    }

    Ok(results)
}

/// GPU when possible, chunked CPU otherwise.
pub(crate) fn compute_moments_accelerated(
    values: &[f64],
    data: &[f32],
    pixels: usize,
    chunk_pixels: usize,
) -> Result<MomentPlanes, String> {
    #[cfg(feature = "gpu")]
    {
        if crate::gpu::is_gpu_available() {
            if let Some(info) = crate::gpu::gpu_info() {
                crate::verbose_println!("[DEBUG] Using GPU acceleration: {}", info);
            }
            match crate::gpu::compute_moments_gpu(values, data, pixels, chunk_pixels) {
                Ok(planes) => return Ok(planes),
                Err(e) => {
                    eprintln!("[WARN] GPU moment computation failed, falling back to CPU: {}", e);
                }
            }
        } else {
            eprintln!("[WARN] GPU requested but not available, using CPU");
        }
    }

    #[cfg(not(feature = "gpu"))]
    eprintln!("[WARN] GPU support not compiled in, using chunked CPU implementation");

    compute_moments_chunked(values, data, pixels, chunk_pixels)
}

/// 3x3 median filter over each of the four maps.
fn smooth_maps(maps: &mut MomentMaps) {
    let (h, w) = (maps.height, maps.width);
    maps.planes.com = median_filter_3x3(&maps.planes.com, h, w);
    maps.planes.fwhm = median_filter_3x3(&maps.planes.fwhm, h, w);
    maps.planes.skewness = median_filter_3x3(&maps.planes.skewness, h, w);
    maps.planes.kurtosis = median_filter_3x3(&maps.planes.kurtosis, h, w);
}

/// Validate the shared preconditions of both implementations.
pub(crate) fn check_inputs(values: &[f64], data: &[f32], pixels: usize) -> Result<(), String> {
    if pixels == 0 {
        return Err("Moment computation requires at least one pixel".to_string());
    }
    if data.len() != values.len() * pixels {
        return Err(format!(
            "The length of 'values' ({}) and 'data' ({} elements / {} pixels) is not equal",
            values.len(),
            data.len(),
            pixels
        ));
    }
    Ok(())
}
