//! Device and adapter initialization for GPU context.

use super::GpuError;

/// Check if GPU acceleration is available without fully initializing.
pub fn is_available() -> bool {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    pollster::block_on(async {
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .is_some()
    })
}

/// Get information about the available GPU device.
pub fn device_info() -> Option<String> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    pollster::block_on(async {
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map(|adapter| {
                let info = adapter.get_info();
                format!("{} ({:?}, {:?})", info.name, info.device_type, info.backend)
            })
    })
}

/// Initialize the wgpu device and queue.
///
/// Returns the device, queue, and adapter info.
pub async fn initialize_device() -> Result<(wgpu::Device, wgpu::Queue, wgpu::AdapterInfo), GpuError>
{
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(GpuError::NoAdapter)?;

    let adapter_info = adapter.get_info();

    let adapter_limits = adapter.limits();

    // A full-resolution detector band can exceed the default 128MB storage
    // binding limit, so request whatever the adapter offers
    let limits = wgpu::Limits {
        max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
        max_uniform_buffer_binding_size: adapter_limits.max_uniform_buffer_binding_size,
        max_buffer_size: adapter_limits.max_buffer_size,
        ..Default::default()
    };

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("dfxm-gpu"),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        )
        .await
        .map_err(|e| GpuError::DeviceRequest(e.to_string()))?;

    Ok((device, queue, adapter_info))
}
