/*! neutrino is a host-side runtime for GPU compute kernels whose data is rendered in place.

Simulation state lives in [`GpuArray`]s.  The same GPU buffer is both a kernel argument
and (optionally) a vertex buffer, so a frame can be computed and drawn without copying
anything back to the host.  Because two consumers share one allocation, access to it is
handed back and forth explicitly:

| Step      | Who owns the buffer afterwards | What happens                                              |
|-----------|--------------------------------|-----------------------------------------------------------|
| `bind`    | render                         | first call allocates; every call sets the kernel argument |
| `acquire` | compute                        | vertex attribute disabled, memory handed to compute       |
| `release` | render                         | memory handed back, vertex attribute re-established       |
| `read`    | unchanged                      | acquire, blocking device-to-host copy, release            |
| `write`   | unchanged                      | acquire, blocking host-to-device copy, release            |

# Backends

All GPU work goes through an [`imp::Backend`].  Two are provided:

* [`imp::HostBackend`] keeps buffers in host memory and runs kernel bodies written in Rust.
  It enforces the acquire/release protocol and records every command it receives, which makes
  it the backend of choice for tests and for machines without a GPU.
* `imp::WgpuBackend` (feature `backend_wgpu`, on by default) runs WGSL compute shaders through
  [wgpu](https://wgpu.rs).  Storage buffers are created with vertex usage, so the render side sees
  kernel output directly.

# Meshes

[`mesh::Mesh`] imports Gmsh `.msh` files into flat node and element arrays, and
[`mesh::adjacency::Adjacency`] derives the neighbor set of every node.  [`bonds::BondSet`]
lays out per-neighbor spring parameters in the same order for upload.

```
use std::sync::Arc;
use neutrino::imp::HostBackend;
use neutrino::{Context, Float4Array, Kernel, Queue, Visibility};

let backend = Arc::new(HostBackend::new());
let context = Context::new(backend.clone());
let queue = Queue::new(&context).unwrap();

let mut kernel = Kernel::new(&context);
kernel.add_source("void thekernel(float4* position) {}");
kernel.build(4, 1, 1).unwrap();

let mut position = Float4Array::filled(&context, 4, [0.0, 0.0, 0.0, 1.0], Visibility::Render, "position");
position.bind(&kernel, 0).unwrap();
position.acquire(&queue, 0).unwrap();
queue.run(&mut kernel).unwrap();
position.release(&queue, 0).unwrap();
position.read(&queue, 0).unwrap();
```
*/

pub mod array;
pub mod bonds;
pub mod context;
pub mod element;
pub mod error;
pub mod imp;
pub mod kernel;
pub mod mesh;
pub mod queue;
pub mod shader;
pub mod vertex_layout;
pub mod visible_to;

pub use array::{
    Float1Array, Float2Array, Float3Array, Float4Array, GpuArray, Int1Array, Int2Array,
    Int3Array, Int4Array,
};
pub use bonds::BondSet;
pub use context::{Context, ContextOptions};
pub use element::{Element, ScalarKind};
pub use error::{
    CompileError, DispatchError, Error, GpuAllocationError, KernelBindError, LayoutMismatchError,
    OwnershipError, TransferError,
};
pub use kernel::Kernel;
pub use mesh::{Mesh, MeshImportError};
pub use queue::Queue;
pub use visible_to::Visibility;
