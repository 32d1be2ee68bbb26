//! Band-by-band execution of the moments kernel.

use crate::gpu::buffers::{
    create_output_buffer, create_storage_buffer, create_uniform_buffer, download_f32, MomentParams,
};
use crate::gpu::context::{GpuContext, GpuError};
use crate::moments::{check_inputs, MomentPlanes, FWHM_FACTOR};

use super::{MAX_WORKGROUPS_PER_DIM, WORKGROUP_SIZE};

/// Compute the four moment maps on the GPU.
///
/// Mirrors the chunked CPU implementation: the pixel plane is split into
/// bands of `chunk_pixels`, each band is gathered into a contiguous buffer,
/// dispatched, and read back. Results are identical for any band size.
pub fn compute_moments_gpu(
    values: &[f64],
    data: &[f32],
    pixels: usize,
    chunk_pixels: usize,
) -> Result<MomentPlanes, GpuError> {
    check_inputs(values, data, pixels).map_err(GpuError::Other)?;

    if values.is_empty() {
        return Ok(MomentPlanes::nan_filled(pixels));
    }

    let ctx = GpuContext::new()?;
    let frames = values.len();
    let chunk = chunk_pixels.clamp(1, pixels);

    let positions: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    let positions_buffer = create_storage_buffer(&ctx.device, &positions, "scan_positions");

    let mut planes = MomentPlanes::nan_filled(pixels);
    let mut band = vec![0.0f32; frames * chunk];

    let mut start = 0usize;
    while start < pixels {
        let band_pixels = chunk.min(pixels - start);

        // Gather the band out of the frame-major stack
        for f in 0..frames {
            let src = &data[f * pixels + start..f * pixels + start + band_pixels];
            band[f * band_pixels..(f + 1) * band_pixels].copy_from_slice(src);
        }

        let out = run_band(
            &ctx,
            &positions_buffer,
            &band[..frames * band_pixels],
            frames,
            band_pixels,
        )?;

        for p in 0..band_pixels {
            planes.com[start + p] = out[p] as f64;
            planes.fwhm[start + p] = out[band_pixels + p] as f64;
            planes.skewness[start + p] = out[2 * band_pixels + p] as f64;
            planes.kurtosis[start + p] = out[3 * band_pixels + p] as f64;
        }

        start += band_pixels;
    }

    Ok(planes)
}

/// Dispatch one band and read the four output planes back.
fn run_band(
    ctx: &GpuContext,
    positions_buffer: &wgpu::Buffer,
    band: &[f32],
    frames: usize,
    band_pixels: usize,
) -> Result<Vec<f32>, GpuError> {
    let band_buffer = create_storage_buffer(&ctx.device, band, "band_intensities");
    let output_buffer = create_output_buffer(&ctx.device, 4 * band_pixels, "moment_planes");

    let params = MomentParams {
        frames: frames as u32,
        band_pixels: band_pixels as u32,
        fwhm_factor: FWHM_FACTOR as f32,
        _padding: 0,
    };
    let uniform_buffer = create_uniform_buffer(&ctx.device, &params, "moment_params");

    let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("moments_bind_group"),
        layout: &ctx.pipelines.moments_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: band_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: positions_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: output_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: uniform_buffer.as_entire_binding(),
            },
        ],
    });

    let total_workgroups = (band_pixels as u32).div_ceil(WORKGROUP_SIZE);
    let (workgroups_x, workgroups_y) = if total_workgroups <= MAX_WORKGROUPS_PER_DIM {
        (total_workgroups, 1)
    } else {
        // 2D dispatch for very large bands
        let side = ((total_workgroups as f64).sqrt().ceil() as u32).min(MAX_WORKGROUPS_PER_DIM);
        let y = total_workgroups.div_ceil(side);
        if y > MAX_WORKGROUPS_PER_DIM {
            return Err(GpuError::Other(format!(
                "Band too large: {} pixels requires {} workgroups, max supported is {}",
                band_pixels,
                total_workgroups,
                MAX_WORKGROUPS_PER_DIM as u64 * MAX_WORKGROUPS_PER_DIM as u64
            )));
        }
        (side, y)
    };

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("moments_encoder"),
        });

    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("moments_pass"),
            timestamp_writes: None,
        });

        pass.set_pipeline(&ctx.pipelines.moments);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroups_x, workgroups_y, 1);
    }

    ctx.submit_and_wait(encoder);

    download_f32(&ctx.device, &ctx.queue, &output_buffer, 4 * band_pixels)
}
