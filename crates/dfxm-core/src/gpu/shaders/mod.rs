//! WGSL shader sources embedded at compile time.

/// Container for all shader source code.
pub struct Shaders;

impl Shaders {
    /// Per-pixel moment computation over one row band.
    pub const MOMENTS: &'static str = include_str!("moments.wgsl");
}
