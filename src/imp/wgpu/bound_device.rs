// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::context::{ContextOptions, PowerPreference};
use crate::imp::Error;
use logwise::privacy::LogIt;
use wgpu::{Limits, Trace};

/// Instance, adapter, device and queue, created together and dropped together.
#[derive(Debug)]
pub(super) struct BoundDevice {
    pub(super) adapter: wgpu::Adapter,
    pub(super) device: wgpu::Device,
    pub(super) queue: wgpu::Queue,
}

impl BoundDevice {
    pub(super) fn bind(options: &ContextOptions) -> Result<Self, Error> {
        let descriptor = wgpu::InstanceDescriptor::from_env_or_default();
        let instance = wgpu::Instance::new(&descriptor);
        let adapter_options = wgpu::RequestAdapterOptions {
            power_preference: match options.power_preference {
                PowerPreference::None => wgpu::PowerPreference::None,
                PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
                PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            },
            force_fallback_adapter: options.force_fallback_adapter,
            compatible_surface: None,
        };
        let adapter = test_executors::sleep_on(instance.request_adapter(&adapter_options))
            .map_err(|_| Error::NoSuchAdapter)?;
        let info = adapter.get_info();
        logwise::info_sync!(
            "wgpu adapter {name} on {backend}",
            name = LogIt(&info.name),
            backend = LogIt(&info.backend)
        );

        //kernels commonly bind more storage buffers than the defaults allow,
        //so ask for everything the adapter has
        let limits: Limits = adapter.limits();
        let descriptor = wgpu::DeviceDescriptor {
            label: Some(&options.label),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::Performance,
            trace: Trace::Off,
        };
        let (device, queue) = test_executors::sleep_on(adapter.request_device(&descriptor))
            .map_err(|e| Error::Driver(e.to_string()))?;
        Ok(BoundDevice {
            adapter,
            device,
            queue,
        })
    }

    /// Blocks until the device is idle.
    pub(super) fn wait_idle(&self) -> Result<(), Error> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|e| Error::Driver(e.to_string()))
    }

    /// Runs `f` inside a validation and out-of-memory error scope and reports what it caught.
    pub(super) fn scoped<R>(&self, f: impl FnOnce(&wgpu::Device) -> R) -> (R, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let r = f(&self.device);
        let validation = test_executors::sleep_on(self.device.pop_error_scope());
        let out_of_memory = test_executors::sleep_on(self.device.pop_error_scope());
        (r, validation.or(out_of_memory))
    }
}
