//! GPU pipeline orchestration for the moment computation.

mod moments;

pub use moments::compute_moments_gpu;

/// Workgroup size for compute shaders
pub(crate) const WORKGROUP_SIZE: u32 = 256;

/// Maximum workgroups per dimension (GPU limit)
pub(crate) const MAX_WORKGROUPS_PER_DIM: u32 = 65535;
