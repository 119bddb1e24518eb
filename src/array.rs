// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Typed arrays that live on the host and, once bound, on the GPU.

A [`GpuArray`] starts out as plain host memory.  The first time it is bound to a kernel
argument it allocates a GPU buffer initialized from that memory, and remembers the slot it was
bound at as its *layout*.  From then on every transfer and hand-off must name the same slot.

Arrays created with [`Visibility::Render`] are also vertex buffers: the attribute at shader
location `layout` sources from them while rendering owns the buffer.  Compute has to
[acquire](GpuArray::acquire) the buffer before a kernel touches it and
[release](GpuArray::release) it afterwards.

```
use neutrino::{Context, Int1Array, Kernel, Queue, Visibility};

let context = Context::host();
let queue = Queue::new(&context).unwrap();
let mut kernel = Kernel::new(&context);
kernel.add_source("thekernel");
kernel.build(3, 1, 1).unwrap();

let mut ids = Int1Array::from_vec(&context, vec![7, 8, 9], Visibility::ComputeOnly, "ids");
assert!(!ids.is_ready());
ids.bind(&kernel, 2).unwrap();
assert_eq!(ids.layout(), Some(2));

ids[0] = 70;
ids.write(&queue, 2).unwrap();
ids.as_mut_slice().fill(0);
ids.read(&queue, 2).unwrap();
assert_eq!(ids.as_slice(), &[70, 8, 9]);
```
*/

use crate::context::{ArrayId, Context};
use crate::element::{Element, as_bytes, as_bytes_mut};
use crate::error::{
    Error, GpuAllocationError, KernelBindError, LayoutMismatchError, OwnershipError,
    TransferError,
};
use crate::imp::{BufferDescriptor, BufferHandle};
use crate::kernel::Kernel;
use crate::queue::Queue;
use crate::vertex_layout::VertexAttribute;
use crate::visible_to::Visibility;
use logwise::privacy::LogIt;
use std::fmt::{Display, Formatter};
use std::ops::{Index, IndexMut};

/// Which API currently owns an array's GPU memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Render,
    Compute,
}

impl Display for Owner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Owner::Render => f.write_str("render"),
            Owner::Compute => f.write_str("compute"),
        }
    }
}

fn transfer_error(operation: &'static str, label: String) -> impl FnOnce(crate::imp::Error) -> Error {
    move |source| {
        TransferError {
            operation,
            label,
            source,
        }
        .into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationState {
    Unallocated,
    Allocated { buffer: BufferHandle, layout: u32 },
}

#[derive(Debug)]
pub struct GpuArray<T: Element> {
    context: Context,
    id: ArrayId,
    data: Vec<T>,
    visibility: Visibility,
    label: String,
    state: AllocationState,
    owner: Owner,
}

pub type Int1Array = GpuArray<i32>;
pub type Int2Array = GpuArray<[i32; 2]>;
pub type Int3Array = GpuArray<[i32; 3]>;
pub type Int4Array = GpuArray<[i32; 4]>;
pub type Float1Array = GpuArray<f32>;
pub type Float2Array = GpuArray<[f32; 2]>;
pub type Float3Array = GpuArray<[f32; 3]>;
pub type Float4Array = GpuArray<[f32; 4]>;

impl<T: Element> GpuArray<T> {
    /// `count` default-valued elements.
    pub fn new(context: &Context, count: usize, visibility: Visibility, label: &str) -> Self {
        Self::from_vec(context, vec![T::default(); count], visibility, label)
    }

    pub fn filled(
        context: &Context,
        count: usize,
        value: T,
        visibility: Visibility,
        label: &str,
    ) -> Self {
        Self::from_vec(context, vec![value; count], visibility, label)
    }

    pub fn from_vec(context: &Context, data: Vec<T>, visibility: Visibility, label: &str) -> Self {
        GpuArray {
            id: context.register_array(),
            context: context.clone(),
            data,
            visibility,
            label: label.to_string(),
            state: AllocationState::Unallocated,
            owner: Owner::Render,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Host copy of the data.  Only [`read`](Self::read) refreshes it from the GPU.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Changes are uploaded by the next [`write`](Self::write), or by the first bind.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn state(&self) -> AllocationState {
        self.state
    }

    /// Whether the GPU buffer exists.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, AllocationState::Allocated { .. })
    }

    pub fn buffer(&self) -> Option<BufferHandle> {
        match self.state {
            AllocationState::Allocated { buffer, .. } => Some(buffer),
            AllocationState::Unallocated => None,
        }
    }

    /// The slot fixed by the first bind.
    pub fn layout(&self) -> Option<u32> {
        match self.state {
            AllocationState::Allocated { layout, .. } => Some(layout),
            AllocationState::Unallocated => None,
        }
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// How rendering reads this array, for render-shared arrays that have been allocated.
    pub fn vertex_attribute(&self) -> Option<VertexAttribute> {
        match (self.visibility, self.state) {
            (Visibility::Render, AllocationState::Allocated { layout, .. }) => {
                Some(VertexAttribute::of::<T>(layout))
            }
            _ => None,
        }
    }

    /**
    Sets this array as argument `slot` of `kernel`.

    The first bind issues a render barrier, allocates the GPU buffer from the host data, and
    fixes the layout to `slot`.  Every bind then issues another barrier and sets the argument at
    `slot`.  Later binds may use any slot, for example on a second kernel; the layout keeps the
    slot of the first bind, and transfers and hand-offs still name that one.

    If allocation fails the array stays unallocated and may be bound again later.
    */
    pub fn bind(&mut self, kernel: &Kernel, slot: u32) -> Result<(), Error> {
        let kernel_handle = kernel.handle().ok_or(KernelBindError::NotBuilt)?;
        let buffer = match self.state {
            AllocationState::Unallocated => self.allocate(slot)?,
            AllocationState::Allocated { buffer, .. } => buffer,
        };
        let backend = self.context.backend();
        backend
            .finish_render()
            .and_then(|_| backend.set_kernel_arg(kernel_handle, slot, buffer))
            .map_err(|source| KernelBindError::Argument { slot, source })?;
        Ok(())
    }

    fn allocate(&mut self, slot: u32) -> Result<BufferHandle, GpuAllocationError> {
        let backend = self.context.backend();
        let contents = as_bytes(&self.data);
        let bytes = contents.len();
        let alloc_error = |source| GpuAllocationError::Backend {
            label: self.label.clone(),
            bytes,
            source,
        };
        backend.finish_render().map_err(alloc_error)?;
        let buffer = backend
            .create_buffer(&BufferDescriptor {
                label: &self.label,
                contents,
                visibility: self.visibility,
            })
            .map_err(alloc_error)?;
        logwise::info_sync!(
            "allocated {bytes} bytes for {label} at slot {slot}",
            bytes = bytes,
            label = LogIt(&self.label),
            slot = slot
        );
        if self.visibility.is_render_shared() {
            backend.enable_vertex_attribute(buffer, &VertexAttribute::of::<T>(slot));
        }
        self.context.record_allocation(self.id, slot, buffer);
        self.state = AllocationState::Allocated {
            buffer,
            layout: slot,
        };
        Ok(buffer)
    }

    fn checked_buffer(&self, slot: u32) -> Result<BufferHandle, Error> {
        match self.state {
            AllocationState::Unallocated => Err(GpuAllocationError::Unallocated {
                label: self.label.clone(),
            }
            .into()),
            AllocationState::Allocated { layout, .. } if layout != slot => {
                Err(LayoutMismatchError {
                    expected: layout,
                    found: slot,
                }
                .into())
            }
            AllocationState::Allocated { buffer, .. } => Ok(buffer),
        }
    }

    /**
    Hands the GPU memory to compute.

    For render-shared arrays the vertex attribute at `slot` is disabled first.  Fails with
    [`OwnershipError`] if compute already owns the array.
    */
    pub fn acquire(&mut self, queue: &Queue, slot: u32) -> Result<(), Error> {
        let buffer = self.checked_buffer(slot)?;
        if self.owner == Owner::Compute {
            return Err(OwnershipError {
                label: self.label.clone(),
                slot,
                owner: self.owner,
            }
            .into());
        }
        if self.visibility.is_render_shared() {
            let backend = self.context.backend();
            backend.disable_vertex_attribute(slot);
            if let Err(source) = backend.acquire(queue.handle(), buffer) {
                backend.enable_vertex_attribute(buffer, &VertexAttribute::of::<T>(slot));
                return Err(transfer_error("acquire", self.label.clone())(source));
            }
        }
        self.owner = Owner::Compute;
        Ok(())
    }

    /// Hands the GPU memory back to rendering and restores the vertex attribute.
    pub fn release(&mut self, queue: &Queue, slot: u32) -> Result<(), Error> {
        let buffer = self.checked_buffer(slot)?;
        if self.owner == Owner::Render {
            return Err(OwnershipError {
                label: self.label.clone(),
                slot,
                owner: self.owner,
            }
            .into());
        }
        if self.visibility.is_render_shared() {
            let backend = self.context.backend();
            backend
                .release(queue.handle(), buffer)
                .map_err(transfer_error("release", self.label.clone()))?;
            backend.enable_vertex_attribute(buffer, &VertexAttribute::of::<T>(slot));
        }
        self.owner = Owner::Render;
        Ok(())
    }

    //render-shared arrays owned by rendering are borrowed for the duration of a transfer
    fn needs_handoff(&self) -> bool {
        self.visibility.is_render_shared() && self.owner == Owner::Render
    }

    /// Blocking copy of the GPU buffer into the host data.
    pub fn read(&mut self, queue: &Queue, slot: u32) -> Result<(), Error> {
        let buffer = self.checked_buffer(slot)?;
        let handoff = self.needs_handoff();
        if handoff {
            self.acquire(queue, slot)?;
        }
        logwise::trace_sync!("read {label}", label = LogIt(&self.label));
        let map_error = transfer_error("read", self.label.clone());
        let result = self
            .context
            .backend()
            .read_buffer(queue.handle(), buffer, as_bytes_mut(&mut self.data))
            .map_err(map_error);
        let released = if handoff {
            self.release(queue, slot)
        } else {
            Ok(())
        };
        //a failed transfer outranks a failed release
        result.and(released)
    }

    /// Blocking copy of the host data into the GPU buffer.
    pub fn write(&mut self, queue: &Queue, slot: u32) -> Result<(), Error> {
        let buffer = self.checked_buffer(slot)?;
        let handoff = self.needs_handoff();
        if handoff {
            self.acquire(queue, slot)?;
        }
        logwise::trace_sync!("write {label}", label = LogIt(&self.label));
        let result = self
            .context
            .backend()
            .write_buffer(queue.handle(), buffer, as_bytes(&self.data))
            .map_err(transfer_error("write", self.label.clone()));
        let released = if handoff {
            self.release(queue, slot)
        } else {
            Ok(())
        };
        //a failed transfer outranks a failed release
        result.and(released)
    }
}

impl<T: Element> Index<usize> for GpuArray<T> {
    type Output = T;
    fn index(&self, index: usize) -> &T {
        &self.data[index]
    }
}

impl<T: Element> IndexMut<usize> for GpuArray<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.data[index]
    }
}

impl<T: Element> Drop for GpuArray<T> {
    fn drop(&mut self) {
        if let AllocationState::Allocated { buffer, .. } = self.state {
            //also drops the vertex attribute and any kernel argument referring to it
            self.context.backend().release_buffer(buffer);
        }
        self.context.unregister_array(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::{Command, HostBackend};
    use std::sync::Arc;

    fn setup() -> (Arc<HostBackend>, Context, Queue, Kernel) {
        let backend = Arc::new(HostBackend::recording());
        let context = Context::new(backend.clone());
        let queue = Queue::new(&context).unwrap();
        let mut kernel = Kernel::new(&context);
        kernel.add_source("thekernel");
        kernel.build(1, 1, 1).unwrap();
        (backend, context, queue, kernel)
    }

    #[test]
    fn second_bind_does_not_allocate() {
        let (backend, context, _queue, kernel) = setup();
        let mut a = Float2Array::new(&context, 3, Visibility::ComputeOnly, "a");
        a.bind(&kernel, 1).unwrap();
        let first = a.buffer();
        a.bind(&kernel, 1).unwrap();
        assert_eq!(a.buffer(), first);
        let creates = backend
            .journal()
            .iter()
            .filter(|c| matches!(c, Command::CreateBuffer { .. }))
            .count();
        assert_eq!(creates, 1);
        assert_eq!(backend.used_bytes(), 3 * 8);
    }

    #[test]
    fn unallocated_transfer_fails() {
        let (_backend, context, queue, _kernel) = setup();
        let mut a = Int1Array::new(&context, 2, Visibility::Render, "a");
        assert!(matches!(
            a.read(&queue, 0),
            Err(Error::Allocation(GpuAllocationError::Unallocated { .. }))
        ));
        assert!(matches!(
            a.acquire(&queue, 0),
            Err(Error::Allocation(GpuAllocationError::Unallocated { .. }))
        ));
    }

    #[test]
    fn drop_releases_buffer_and_attribute() {
        let (backend, context, _queue, kernel) = setup();
        {
            let mut a = Float4Array::new(&context, 2, Visibility::Render, "a");
            a.bind(&kernel, 0).unwrap();
            assert!(backend.vertex_attribute(0).is_some());
            assert_eq!(context.array_count(), 1);
        }
        assert_eq!(backend.live_buffers(), 0);
        assert!(backend.vertex_attribute(0).is_none());
        assert_eq!(context.array_count(), 0);
        assert!(context.allocated_arrays().is_empty());
    }

    #[test]
    fn vertex_attribute_follows_layout() {
        let (_backend, context, _queue, kernel) = setup();
        let mut a = Float3Array::new(&context, 2, Visibility::Render, "a");
        assert_eq!(a.vertex_attribute(), None);
        a.bind(&kernel, 5).unwrap();
        let attribute = a.vertex_attribute().unwrap();
        assert_eq!(attribute.shader_location, 5);
        assert_eq!(attribute.components, 3);
        assert_eq!(attribute.stride, 12);

        let mut b = Float3Array::new(&context, 2, Visibility::ComputeOnly, "b");
        b.bind(&kernel, 6).unwrap();
        assert_eq!(b.vertex_attribute(), None);
    }

    #[test]
    fn failed_transfer_is_reported_over_failed_release() {
        let (backend, context, queue, kernel) = setup();
        let mut a = Float1Array::new(&context, 2, Visibility::Render, "a");
        a.bind(&kernel, 0).unwrap();
        backend.fail_when(|command| {
            matches!(command, Command::Read { .. } | Command::Release { .. })
        });
        match a.read(&queue, 0) {
            Err(Error::Transfer(TransferError { operation, .. })) => assert_eq!(operation, "read"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(a.owner(), Owner::Compute);
        backend.stop_failing();
        a.release(&queue, 0).unwrap();

        backend.fail_when(|command| matches!(command, Command::Release { .. }));
        match a.write(&queue, 0) {
            Err(Error::Transfer(TransferError { operation, .. })) => {
                assert_eq!(operation, "release")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
