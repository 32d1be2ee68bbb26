//! GPU acceleration for the chunked moment computation.
//!
//! This module runs the row-band moment kernel as a wgpu compute shader.
//! It supports Metal on macOS, Vulkan on Linux/Windows, and DX12 on Windows.
//!
//! # Usage
//!
//! The GPU backend is enabled via the `gpu` feature flag:
//!
//! ```toml
//! [dependencies]
//! dfxm-core = { version = "0.1", features = ["gpu"] }
//! ```
//!
//! At runtime, `MomentEngine::Gpu` selects this path; if no adapter is found
//! the chunked CPU implementation runs instead.

mod buffers;
mod context;
mod pipeline;
mod shaders;

pub use context::{GpuContext, GpuError};
pub use pipeline::compute_moments_gpu;

/// Check if GPU acceleration is available on this system.
pub fn is_gpu_available() -> bool {
    GpuContext::is_available()
}

/// Get information about the available GPU device.
pub fn gpu_info() -> Option<String> {
    GpuContext::device_info()
}
