//! Compute pipeline creation for the moments kernel.

use crate::gpu::shaders::Shaders;

/// Pre-compiled compute pipeline and its bind group layout.
pub struct GpuPipelines {
    pub moments: wgpu::ComputePipeline,
    pub moments_layout: wgpu::BindGroupLayout,
}

/// Compile the moments shader and build its pipeline.
pub fn create_pipelines(device: &wgpu::Device) -> GpuPipelines {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("moments"),
        source: wgpu::ShaderSource::Wgsl(Shaders::MOMENTS.into()),
    });

    let moments_layout = create_moments_layout(device);
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("moments_pipeline_layout"),
        bind_group_layouts: &[&moments_layout],
        push_constant_ranges: &[],
    });

    let moments = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("moments"),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some("compute_band_moments"),
        compilation_options: Default::default(),
        cache: None,
    });

    GpuPipelines {
        moments,
        moments_layout,
    }
}

/// Bind group layout: band intensities, scan positions, output planes,
/// parameters.
fn create_moments_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("moments_layout"),
        entries: &[
            // Band intensities (read-only)
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // Scan positions (read-only)
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // Output: four planes of band_pixels each
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // Parameters (uniform)
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    })
}
