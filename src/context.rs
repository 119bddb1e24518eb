// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The compute context shared by every array, kernel and queue.

There is one device per process in practice, but it is passed explicitly rather than kept in
statics: each [`GpuArray`](crate::GpuArray), [`Kernel`](crate::Kernel) and
[`Queue`](crate::Queue) holds a clone of the [`Context`] it was created from.

Besides the backend, the context keeps two registries:

* every live array, in creation order, together with the slot and buffer it was allocated with;
* the ids of every built kernel.

When a kernel is built, all allocated arrays are bound to it at their slots, so several kernels
operating on the same arrays stay consistent.
*/

use crate::imp::{Backend, BufferHandle, KernelHandle};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Identifies an array in the context's registry.  Ids grow with creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(u64);

#[derive(Debug, Default)]
struct Registry {
    next_array: u64,
    //None until the array is first bound
    arrays: BTreeMap<ArrayId, Option<(u32, BufferHandle)>>,
    kernels: Vec<KernelHandle>,
}

#[derive(Debug)]
struct Shared {
    backend: Arc<dyn Backend>,
    registry: Mutex<Registry>,
}

/// Which adapter to prefer when several are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerPreference {
    #[default]
    None,
    LowPower,
    HighPerformance,
}

/**
Options for creating a GPU-backed [`Context`].

```
use neutrino::context::{ContextOptions, PowerPreference};

let options = ContextOptions {
    power_preference: PowerPreference::HighPerformance,
    ..ContextOptions::default()
};
assert_eq!(options.label, "neutrino");
```
*/
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Device label, visible in debuggers and driver logs.
    pub label: String,
    pub power_preference: PowerPreference,
    /// Use a software adapter even if hardware is available.
    pub force_fallback_adapter: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions {
            label: "neutrino".to_string(),
            power_preference: PowerPreference::default(),
            force_fallback_adapter: false,
        }
    }
}

/// Cheaply cloneable handle to a backend and its registries.
#[derive(Debug, Clone)]
pub struct Context {
    shared: Arc<Shared>,
}

impl Context {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        logwise::info_sync!(
            "neutrino context on {backend} backend",
            backend = backend.name()
        );
        Context {
            shared: Arc::new(Shared {
                backend,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// A context on the host backend.
    pub fn host() -> Self {
        Self::new(Arc::new(crate::imp::HostBackend::new()))
    }

    /// A context on the first suitable GPU.
    ///
    /// The wgpu instance reads its configuration from the environment (for example
    /// `WGPU_BACKEND`).
    #[cfg(feature = "backend_wgpu")]
    pub fn gpu(options: &ContextOptions) -> Result<Self, crate::Error> {
        let backend = crate::imp::WgpuBackend::new(options)?;
        Ok(Self::new(Arc::new(backend)))
    }

    pub fn backend(&self) -> &dyn Backend {
        &*self.shared.backend
    }

    /// Ids of every kernel built in this context and not yet dropped, in build order.
    pub fn kernels(&self) -> Vec<KernelHandle> {
        self.shared.registry.lock().unwrap().kernels.clone()
    }

    /// Number of live arrays, allocated or not.
    pub fn array_count(&self) -> usize {
        self.shared.registry.lock().unwrap().arrays.len()
    }

    /// `(slot, buffer)` of every allocated array, in creation order.
    pub fn allocated_arrays(&self) -> Vec<(u32, BufferHandle)> {
        self.shared
            .registry
            .lock()
            .unwrap()
            .arrays
            .values()
            .filter_map(|a| *a)
            .collect()
    }

    pub(crate) fn register_array(&self) -> ArrayId {
        let mut registry = self.shared.registry.lock().unwrap();
        registry.next_array += 1;
        let id = ArrayId(registry.next_array);
        registry.arrays.insert(id, None);
        id
    }

    pub(crate) fn record_allocation(&self, id: ArrayId, slot: u32, buffer: BufferHandle) {
        self.shared
            .registry
            .lock()
            .unwrap()
            .arrays
            .insert(id, Some((slot, buffer)));
    }

    pub(crate) fn unregister_array(&self, id: ArrayId) {
        self.shared.registry.lock().unwrap().arrays.remove(&id);
    }

    pub(crate) fn register_kernel(&self, kernel: KernelHandle) {
        self.shared.registry.lock().unwrap().kernels.push(kernel);
    }

    pub(crate) fn unregister_kernel(&self, kernel: KernelHandle) {
        self.shared
            .registry
            .lock()
            .unwrap()
            .kernels
            .retain(|k| *k != kernel);
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Context {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_keeps_creation_order() {
        let context = Context::host();
        let first = context.register_array();
        let second = context.register_array();
        let third = context.register_array();
        context.record_allocation(third, 0, BufferHandle(30));
        context.record_allocation(first, 2, BufferHandle(10));
        assert_eq!(
            context.allocated_arrays(),
            vec![(2, BufferHandle(10)), (0, BufferHandle(30))]
        );
        assert_eq!(context.array_count(), 3);
        context.unregister_array(second);
        assert_eq!(context.array_count(), 2);
    }

    #[test]
    fn clones_share_state() {
        let context = Context::host();
        let clone = context.clone();
        clone.register_kernel(KernelHandle(4));
        assert_eq!(context.kernels(), vec![KernelHandle(4)]);
        assert_eq!(context, clone);
        assert_ne!(context, Context::host());
    }
}
