// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! WGSL programs and compute dispatch.
//!
//! Kernel arguments map to `@group(0) @binding(slot)` read-write storage buffers.  The pipeline
//! is created with an explicit layout covering exactly the bound slots, and is rebuilt whenever
//! the set of bound slots changes.

use super::bound_device::BoundDevice;
use super::buffer::DeviceBuffer;
use crate::imp::Error;
use logwise::privacy::LogIt;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::sync::Arc;

#[derive(Debug)]
pub(super) struct DeviceKernel {
    module: Arc<wgpu::ShaderModule>,
    entry_point: String,
    pub(super) args: BTreeMap<u32, u64>,
    pipeline: Option<CachedPipeline>,
}

#[derive(Debug)]
struct CachedPipeline {
    slots: Vec<u32>,
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

/// Compiles `source`, with every `-D NAME=VALUE` option turned into a module-scope `const`.
pub(super) fn build_program(
    bound_device: &BoundDevice,
    source: &str,
    options: &str,
) -> Result<Arc<wgpu::ShaderModule>, Error> {
    let mut full_source = String::new();
    let defines = crate::imp::defines(options);
    for (name, value) in &defines {
        let _ = writeln!(full_source, "const {name} = {value};");
    }
    let prelude_lines = defines.len() as u32;
    full_source.push_str(source);

    let (module, scope_error) = bound_device.scoped(|device| {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("neutrino program"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(full_source)),
        })
    });
    let info = test_executors::sleep_on(module.get_compilation_info());
    let mut log = String::new();
    for message in &info.messages {
        if message.message_type != wgpu::CompilationMessageType::Error {
            continue;
        }
        match &message.location {
            Some(location) => {
                let _ = writeln!(
                    log,
                    "line {}: error: {}",
                    location.line_number.saturating_sub(prelude_lines),
                    message.message
                );
            }
            None => {
                let _ = writeln!(log, "error: {}", message.message);
            }
        }
    }
    if log.is_empty() {
        if let Some(error) = scope_error {
            log = error.to_string();
        }
    }
    if !log.is_empty() {
        return Err(Error::Build { log });
    }
    Ok(Arc::new(module))
}

pub(super) fn create_kernel(
    bound_device: &BoundDevice,
    module: Arc<wgpu::ShaderModule>,
    entry_point: &str,
) -> Result<DeviceKernel, Error> {
    //an auto-layout pipeline is the cheapest way to ask whether the entry point exists
    let (_probe, error) = bound_device.scoped(|device| {
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(entry_point),
            layout: None,
            module: &module,
            entry_point: Some(entry_point),
            compilation_options: Default::default(),
            cache: None,
        })
    });
    if let Some(error) = error {
        logwise::error_sync!(
            "can't create kernel {entry}: {error}",
            entry = LogIt(entry_point),
            error = LogIt(&error)
        );
        return Err(Error::NoSuchEntryPoint(entry_point.to_string()));
    }
    Ok(DeviceKernel {
        module,
        entry_point: entry_point.to_string(),
        args: BTreeMap::new(),
        pipeline: None,
    })
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl DeviceKernel {
    fn pipeline(&mut self, bound_device: &BoundDevice) -> Result<&CachedPipeline, Error> {
        let slots: Vec<u32> = self.args.keys().copied().collect();
        let stale = match &self.pipeline {
            Some(cached) => cached.slots != slots,
            None => true,
        };
        if stale {
            let entries: Vec<wgpu::BindGroupLayoutEntry> =
                slots.iter().copied().map(storage_entry).collect();
            let ((layout, pipeline), error) = bound_device.scoped(|device| {
                let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("neutrino kernel arguments"),
                    entries: &entries,
                });
                let pipeline_layout =
                    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some("neutrino kernel"),
                        bind_group_layouts: &[&layout],
                        push_constant_ranges: &[],
                    });
                let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(&self.entry_point),
                    layout: Some(&pipeline_layout),
                    module: &self.module,
                    entry_point: Some(&self.entry_point),
                    compilation_options: Default::default(),
                    cache: None,
                });
                (layout, pipeline)
            });
            if let Some(error) = error {
                return Err(Error::Driver(error.to_string()));
            }
            self.pipeline = Some(CachedPipeline {
                slots,
                layout,
                pipeline,
            });
        }
        self.pipeline
            .as_ref()
            .ok_or_else(|| Error::Driver("pipeline missing".to_string()))
    }

    pub(super) fn dispatch(
        &mut self,
        bound_device: &BoundDevice,
        buffers: &HashMap<u64, DeviceBuffer>,
        global_size: [usize; 3],
        workgroup_size: [u32; 3],
    ) -> Result<(), Error> {
        let mut workgroups = [0u32; 3];
        for axis in 0..3 {
            let per_group = workgroup_size[axis].max(1) as usize;
            workgroups[axis] = u32::try_from(global_size[axis].div_ceil(per_group))
                .map_err(|_| Error::Driver(format!("global size {global_size:?} too large")))?;
        }
        let mut bound = Vec::with_capacity(self.args.len());
        for (slot, id) in &self.args {
            let buffer = buffers.get(id).ok_or(Error::InvalidHandle {
                kind: "buffer",
                id: *id,
            })?;
            bound.push((*slot, buffer.buffer.clone()));
        }
        let cached = self.pipeline(bound_device)?;
        let entries: Vec<wgpu::BindGroupEntry<'_>> = bound
            .iter()
            .map(|(slot, buffer)| wgpu::BindGroupEntry {
                binding: *slot,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let ((), error) = bound_device.scoped(|device| {
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("neutrino kernel arguments"),
                layout: &cached.layout,
                entries: &entries,
            });
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("neutrino dispatch"),
            });
            if workgroups.iter().all(|w| *w > 0) {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("neutrino dispatch"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&cached.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(workgroups[0], workgroups[1], workgroups[2]);
            }
            bound_device.queue.submit(std::iter::once(encoder.finish()));
        });
        match error {
            Some(error) => Err(Error::Driver(error.to_string())),
            None => Ok(()),
        }
    }
}
