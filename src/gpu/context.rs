//! Headless device setup.

use crate::backend::BackendError;

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Request a device with no surface attached.
    pub async fn headless() -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None, // Headless
                force_fallback_adapter: false,
            })
            .await
            .ok_or(BackendError::AdapterNotFound)?;

        let adapter_info = adapter.get_info();
        log::info!("Using adapter: {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Selective Bloom Device"),
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| BackendError::Device(e.to_string()))?;

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    pub fn headless_blocking() -> Result<Self, BackendError> {
        pollster::block_on(Self::headless())
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Run `create` with error scopes open, turning out-of-memory and
    /// validation failures into an allocation error.
    pub fn catch_allocation<T>(
        &self,
        label: &str,
        width: u32,
        height: u32,
        create: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, BackendError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(BackendError::Allocation {
                label: label.to_string(),
                width,
                height,
                message: format!("exceeds device limit of {}", max),
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let value = create(&self.device);
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        let validation = pollster::block_on(self.device.pop_error_scope());

        match out_of_memory.or(validation) {
            Some(err) => Err(BackendError::Allocation {
                label: label.to_string(),
                width,
                height,
                message: err.to_string(),
            }),
            None => Ok(value),
        }
    }
}
