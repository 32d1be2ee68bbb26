//! DFXM Core Library
//!
//! Core functionality for dark-field X-ray microscopy moment-map analysis:
//! stack loading, preprocessing, per-pixel statistical moments, map export,
//! volume segmentation, and frame rendering.

pub mod config;
pub mod diagnostics;
pub mod exporters;
pub mod loaders;
pub mod moments;
pub mod preprocess;
pub mod render;
pub mod segmentation;
pub mod stack;
pub mod validate;
pub mod volume;

// GPU acceleration module (optional, enabled with "gpu" feature)
#[cfg(feature = "gpu")]
pub mod gpu;

// Re-export commonly used types
pub use moments::{
    compute_moments, compute_moments_chunked, moment_maps, MomentEngine, MomentKind, MomentMaps,
    MomentOptions, MomentPlanes, FWHM_FACTOR,
};
pub use stack::{ImageStack, ScanDimension};
pub use validate::{validate_stack, ValidateOptions, ValidationReport};
pub use volume::{assemble_volume, Volume};

// Re-export GPU functions when available
#[cfg(feature = "gpu")]
pub use gpu::{compute_moments_gpu, gpu_info, is_gpu_available};
