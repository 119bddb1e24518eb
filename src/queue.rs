// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The execution queue.

use crate::array::GpuArray;
use crate::context::Context;
use crate::element::Element;
use crate::error::{DispatchError, Error, KernelBindError};
use crate::imp::QueueHandle;
use crate::kernel::Kernel;

/**
Orders transfers, hand-offs and kernel dispatches.

All operations block until they are complete on the device, except [`run`](Self::run), which
returns once the dispatch is submitted; [`wait`](Self::wait) and [`finish`](Self::finish) block
on it.

The transfer methods are the same operations as on [`GpuArray`], spelled queue-first.
*/
#[derive(Debug)]
pub struct Queue {
    context: Context,
    handle: QueueHandle,
}

impl Queue {
    pub fn new(context: &Context) -> Result<Self, Error> {
        let handle = context.backend().create_queue()?;
        Ok(Queue {
            context: context.clone(),
            handle,
        })
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle
    }

    pub fn read<T: Element>(&self, array: &mut GpuArray<T>, slot: u32) -> Result<(), Error> {
        array.read(self, slot)
    }

    pub fn write<T: Element>(&self, array: &mut GpuArray<T>, slot: u32) -> Result<(), Error> {
        array.write(self, slot)
    }

    pub fn acquire<T: Element>(&self, array: &mut GpuArray<T>, slot: u32) -> Result<(), Error> {
        array.acquire(self, slot)
    }

    pub fn release<T: Element>(&self, array: &mut GpuArray<T>, slot: u32) -> Result<(), Error> {
        array.release(self, slot)
    }

    /// Dispatches `kernel` over its global size and records the completion event in it.
    pub fn run(&self, kernel: &mut Kernel) -> Result<(), Error> {
        let handle = kernel.handle().ok_or(KernelBindError::NotBuilt)?;
        let event = self
            .context
            .backend()
            .enqueue_kernel(
                self.handle,
                handle,
                kernel.global_size(),
                kernel.workgroup_size(),
            )
            .map_err(|source| DispatchError { source })?;
        kernel.record_event(event);
        Ok(())
    }

    /// Blocks until the most recent dispatch of `kernel` has completed.
    pub fn wait(&self, kernel: &Kernel) -> Result<(), Error> {
        if let Some(event) = kernel.event() {
            self.context
                .backend()
                .wait_event(event)
                .map_err(|source| DispatchError { source })?;
        }
        Ok(())
    }

    pub fn finish(&self) -> Result<(), Error> {
        self.context
            .backend()
            .finish(self.handle)
            .map_err(|source| DispatchError { source })?;
        Ok(())
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        self.context.backend().release_queue(self.handle);
    }
}
