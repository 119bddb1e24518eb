// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! wgpu backend.

Kernels are WGSL compute shaders with the entry point `thekernel`; argument slot `n` is
`@group(0) @binding(n) var<storage, read_write>`.  Every array buffer is a storage buffer and
render-shared ones are also vertex buffers, so the buffer a kernel writes is the buffer a render
pass draws from.  wgpu orders the two uses itself; acquire/release are still tracked so misuse
is reported the same way as on any other backend, and the vertex attribute table returned by
[`WgpuBackend::vertex_buffers`] follows the handoff.
*/

mod bound_device;
mod buffer;
mod kernel;

use crate::context::ContextOptions;
use crate::imp::{
    Backend, BufferDescriptor, BufferHandle, Error, EventHandle, KernelHandle, ProgramHandle,
    QueueHandle,
};
use crate::vertex_layout::VertexAttribute;
use crate::visible_to::Visibility;
use bound_device::BoundDevice;
use buffer::DeviceBuffer;
use kernel::DeviceKernel;
use logwise::privacy::LogIt;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A render-shared buffer currently released to rendering, and how to read it as vertices.
#[derive(Debug, Clone)]
pub struct VertexBinding {
    pub buffer: wgpu::Buffer,
    pub attribute: VertexAttribute,
}

impl VertexBinding {
    /// The attribute list for a `wgpu::VertexBufferLayout`.
    pub fn wgpu_attributes(&self) -> [wgpu::VertexAttribute; 1] {
        [self.attribute.wgpu_attribute()]
    }
}

#[derive(Debug, Default)]
struct WgpuState {
    next_id: u64,
    buffers: HashMap<u64, DeviceBuffer>,
    programs: HashMap<u64, Arc<wgpu::ShaderModule>>,
    kernels: HashMap<u64, DeviceKernel>,
    queues: HashSet<u64>,
    events: HashSet<u64>,
    attributes: BTreeMap<u32, (u64, VertexAttribute)>,
}

impl WgpuState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
    fn buffer(&self, buffer: BufferHandle) -> Result<&DeviceBuffer, Error> {
        self.buffers.get(&buffer.0).ok_or(Error::InvalidHandle {
            kind: "buffer",
            id: buffer.0,
        })
    }
    fn buffer_mut(&mut self, buffer: BufferHandle) -> Result<&mut DeviceBuffer, Error> {
        self.buffers.get_mut(&buffer.0).ok_or(Error::InvalidHandle {
            kind: "buffer",
            id: buffer.0,
        })
    }
    fn check_queue(&self, queue: QueueHandle) -> Result<(), Error> {
        if self.queues.contains(&queue.0) {
            Ok(())
        } else {
            Err(Error::InvalidHandle {
                kind: "queue",
                id: queue.0,
            })
        }
    }
}

/// GPU backend on top of wgpu.
#[derive(Debug)]
pub struct WgpuBackend {
    bound_device: BoundDevice,
    state: Mutex<WgpuState>,
}

impl WgpuBackend {
    pub fn new(options: &ContextOptions) -> Result<Self, Error> {
        let bound_device = BoundDevice::bind(options)?;
        Ok(WgpuBackend {
            bound_device,
            state: Mutex::new(WgpuState::default()),
        })
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.bound_device.adapter
    }

    /// The device, for building render pipelines that draw shared buffers.
    pub fn device(&self) -> &wgpu::Device {
        &self.bound_device.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.bound_device.queue
    }

    /// Enabled vertex attributes in shader-location order.
    pub fn vertex_buffers(&self) -> Vec<VertexBinding> {
        let state = self.state.lock().unwrap();
        state
            .attributes
            .values()
            .filter_map(|(buffer, attribute)| {
                state.buffers.get(buffer).map(|b| VertexBinding {
                    buffer: b.buffer.clone(),
                    attribute: *attribute,
                })
            })
            .collect()
    }
}

impl Backend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn finish_render(&self) -> Result<(), Error> {
        self.bound_device.wait_idle()
    }

    fn create_queue(&self) -> Result<QueueHandle, Error> {
        //wgpu has one queue per device; handles are bookkeeping
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.queues.insert(id);
        Ok(QueueHandle(id))
    }

    fn release_queue(&self, queue: QueueHandle) {
        self.state.lock().unwrap().queues.remove(&queue.0);
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor<'_>) -> Result<BufferHandle, Error> {
        let buffer = buffer::create(&self.bound_device, descriptor)?;
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn release_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state.lock().unwrap();
        if let Some(removed) = state.buffers.remove(&buffer.0) {
            for kernel in state.kernels.values_mut() {
                kernel.args.retain(|_, b| *b != buffer.0);
            }
            state.attributes.retain(|_, (b, _)| *b != buffer.0);
            removed.buffer.destroy();
        }
    }

    fn build_program(&self, source: &str, options: &str) -> Result<ProgramHandle, Error> {
        let module = kernel::build_program(&self.bound_device, source, options)?;
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.programs.insert(id, module);
        Ok(ProgramHandle(id))
    }

    fn release_program(&self, program: ProgramHandle) {
        self.state.lock().unwrap().programs.remove(&program.0);
    }

    fn create_kernel(
        &self,
        program: ProgramHandle,
        entry_point: &str,
    ) -> Result<KernelHandle, Error> {
        let module = self
            .state
            .lock()
            .unwrap()
            .programs
            .get(&program.0)
            .cloned()
            .ok_or(Error::InvalidHandle {
                kind: "program",
                id: program.0,
            })?;
        let kernel = kernel::create_kernel(&self.bound_device, module, entry_point)?;
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.kernels.insert(id, kernel);
        Ok(KernelHandle(id))
    }

    fn release_kernel(&self, kernel: KernelHandle) {
        self.state.lock().unwrap().kernels.remove(&kernel.0);
    }

    fn set_kernel_arg(
        &self,
        kernel: KernelHandle,
        slot: u32,
        buffer: BufferHandle,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.buffer(buffer)?;
        let k = state.kernels.get_mut(&kernel.0).ok_or(Error::InvalidHandle {
            kind: "kernel",
            id: kernel.0,
        })?;
        k.args.insert(slot, buffer.0);
        Ok(())
    }

    fn acquire(&self, queue: QueueHandle, buffer: BufferHandle) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.check_queue(queue)?;
        let b = state.buffer_mut(buffer)?;
        if b.visibility != Visibility::Render {
            return Err(Error::NotShared { buffer: buffer.0 });
        }
        if b.acquired {
            return Err(Error::AlreadyAcquired { buffer: buffer.0 });
        }
        b.acquired = true;
        Ok(())
    }

    fn release(&self, queue: QueueHandle, buffer: BufferHandle) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.check_queue(queue)?;
        let b = state.buffer_mut(buffer)?;
        if b.visibility != Visibility::Render {
            return Err(Error::NotShared { buffer: buffer.0 });
        }
        if !b.acquired {
            return Err(Error::NotAcquired { buffer: buffer.0 });
        }
        b.acquired = false;
        Ok(())
    }

    fn disable_vertex_attribute(&self, slot: u32) {
        self.state.lock().unwrap().attributes.remove(&slot);
    }

    fn enable_vertex_attribute(&self, buffer: BufferHandle, attribute: &VertexAttribute) {
        self.state
            .lock()
            .unwrap()
            .attributes
            .insert(attribute.shader_location, (buffer.0, *attribute));
    }

    fn read_buffer(
        &self,
        queue: QueueHandle,
        buffer: BufferHandle,
        dst: &mut [u8],
    ) -> Result<(), Error> {
        let state = self.state.lock().unwrap();
        state.check_queue(queue)?;
        let b = state.buffer(buffer)?;
        if b.visibility == Visibility::Render && !b.acquired {
            return Err(Error::NotAcquired { buffer: buffer.0 });
        }
        if dst.len() as u64 != b.byte_len {
            return Err(Error::SizeMismatch {
                buffer: buffer.0,
                requested: dst.len(),
                actual: b.byte_len as usize,
            });
        }
        let perf = logwise::perfwarn_begin!("wgpu::read_buffer");
        let result = buffer::read(&self.bound_device, b, dst);
        drop(perf);
        result
    }

    fn write_buffer(
        &self,
        queue: QueueHandle,
        buffer: BufferHandle,
        src: &[u8],
    ) -> Result<(), Error> {
        let state = self.state.lock().unwrap();
        state.check_queue(queue)?;
        let b = state.buffer(buffer)?;
        if b.visibility == Visibility::Render && !b.acquired {
            return Err(Error::NotAcquired { buffer: buffer.0 });
        }
        if src.len() as u64 != b.byte_len {
            return Err(Error::SizeMismatch {
                buffer: buffer.0,
                requested: src.len(),
                actual: b.byte_len as usize,
            });
        }
        buffer::write(&self.bound_device, b, src)
    }

    fn enqueue_kernel(
        &self,
        queue: QueueHandle,
        kernel: KernelHandle,
        global_size: [usize; 3],
        workgroup_size: [u32; 3],
    ) -> Result<EventHandle, Error> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.check_queue(queue)?;
        let k = state.kernels.get_mut(&kernel.0).ok_or(Error::InvalidHandle {
            kind: "kernel",
            id: kernel.0,
        })?;
        for id in k.args.values() {
            if let Some(b) = state.buffers.get(id) {
                if b.visibility == Visibility::Render && !b.acquired {
                    return Err(Error::NotAcquired { buffer: *id });
                }
            }
        }
        k.dispatch(&self.bound_device, &state.buffers, global_size, workgroup_size)
            .inspect_err(|e| {
                logwise::error_sync!("dispatch failed: {e}", e = LogIt(e));
            })?;
        let id = state.next_id();
        state.events.insert(id);
        Ok(EventHandle(id))
    }

    fn wait_event(&self, event: EventHandle) -> Result<(), Error> {
        if !self.state.lock().unwrap().events.contains(&event.0) {
            return Err(Error::InvalidHandle {
                kind: "event",
                id: event.0,
            });
        }
        self.bound_device.wait_idle()
    }

    fn release_event(&self, event: EventHandle) {
        self.state.lock().unwrap().events.remove(&event.0);
    }

    fn finish(&self, queue: QueueHandle) -> Result<(), Error> {
        self.state.lock().unwrap().check_queue(queue)?;
        self.bound_device.wait_idle()
    }
}
