// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Buffer allocation and blocking transfers for the wgpu backend.
//!
//! Every array buffer is a storage buffer.  Render-shared ones additionally carry vertex usage,
//! which is what makes kernel output drawable without a copy.  Reads go through a throwaway
//! `MAP_READ` staging buffer; writes use `Queue::write_buffer`.  Both wait for the device before
//! returning.

use super::bound_device::BoundDevice;
use crate::imp::{BufferDescriptor, Error};
use crate::visible_to::Visibility;
use wgpu::{BufferUsages, MapMode};

#[derive(Debug)]
pub(super) struct DeviceBuffer {
    pub(super) buffer: wgpu::Buffer,
    /// Size requested by the caller; the allocation may be larger.
    pub(super) byte_len: u64,
    pub(super) visibility: Visibility,
    pub(super) acquired: bool,
}

pub(super) fn create(
    bound_device: &BoundDevice,
    descriptor: &BufferDescriptor<'_>,
) -> Result<DeviceBuffer, Error> {
    let mut usage = BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST;
    if descriptor.visibility.is_render_shared() {
        usage |= BufferUsages::VERTEX;
    }
    let byte_len = descriptor.contents.len() as u64;
    //zero-sized buffers can't be bound, and sizes must respect COPY_BUFFER_ALIGNMENT
    let allocated_size = (byte_len.max(wgpu::COPY_BUFFER_ALIGNMENT)
        + wgpu::COPY_BUFFER_ALIGNMENT
        - 1)
        & !(wgpu::COPY_BUFFER_ALIGNMENT - 1);

    let (buffer, error) = bound_device.scoped(|device| {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(descriptor.label),
            size: allocated_size,
            usage,
            mapped_at_creation: false,
        });
        if !descriptor.contents.is_empty() {
            bound_device
                .queue
                .write_buffer(&buffer, 0, descriptor.contents);
        }
        buffer
    });
    if let Some(error) = error {
        buffer.destroy();
        return Err(Error::Driver(error.to_string()));
    }
    bound_device
        .queue
        .submit(std::iter::empty::<wgpu::CommandBuffer>());
    Ok(DeviceBuffer {
        buffer,
        byte_len,
        visibility: descriptor.visibility,
        acquired: false,
    })
}

pub(super) fn read(
    bound_device: &BoundDevice,
    source: &DeviceBuffer,
    dst: &mut [u8],
) -> Result<(), Error> {
    let size = dst.len() as u64;
    if size == 0 {
        return Ok(());
    }
    let device = &bound_device.device;
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("neutrino read staging"),
        size,
        usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("neutrino read"),
    });
    encoder.copy_buffer_to_buffer(&source.buffer, 0, &staging, 0, size);
    bound_device.queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    bound_device.wait_idle()?;
    match receiver.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(Error::Driver(e.to_string())),
        Err(_) => return Err(Error::Driver("map callback never ran".to_string())),
    }
    {
        let view = slice.get_mapped_range();
        dst.copy_from_slice(&view);
    }
    staging.unmap();
    Ok(())
}

pub(super) fn write(
    bound_device: &BoundDevice,
    destination: &DeviceBuffer,
    src: &[u8],
) -> Result<(), Error> {
    if src.is_empty() {
        return Ok(());
    }
    bound_device
        .queue
        .write_buffer(&destination.buffer, 0, src);
    bound_device
        .queue
        .submit(std::iter::empty::<wgpu::CommandBuffer>());
    bound_device.wait_idle()
}
