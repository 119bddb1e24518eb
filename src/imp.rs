// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Backend abstraction.

Everything that touches a device goes through [`Backend`].  Objects are referred to by small
copyable handles; the backend owns the real resources behind them.  The trait is object-safe so
a [`Context`](crate::Context) can hold any backend without becoming generic.
*/

use crate::vertex_layout::VertexAttribute;
use crate::visible_to::Visibility;
use std::fmt::Debug;

mod host;
#[cfg(feature = "backend_wgpu")]
mod wgpu;

pub use host::{Command, HostBackend, HostInvocation};
#[cfg(feature = "backend_wgpu")]
pub use self::wgpu::{VertexBinding, WgpuBackend};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u64);

        impl $name {
            /// The raw id, unique per backend.
            pub fn id(self) -> u64 {
                self.0
            }
        }
    };
}

handle!(
    /// A device buffer.
    BufferHandle
);
handle!(
    /// A compiled program.
    ProgramHandle
);
handle!(
    /// A kernel created from a program's entry point.
    KernelHandle
);
handle!(
    /// A command queue.
    QueueHandle
);
handle!(
    /// Completion marker of one kernel dispatch.
    EventHandle
);

/// Backend failure.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("no {kind} with id {id}")]
    InvalidHandle { kind: &'static str, id: u64 },
    #[error("program build failed")]
    Build { log: String },
    #[error("no entry point named {0}")]
    NoSuchEntryPoint(String),
    #[error("out of device memory ({requested} bytes requested, {available} available)")]
    OutOfMemory { requested: usize, available: usize },
    #[error("buffer {buffer} is shared with rendering and was used by compute without being acquired")]
    NotAcquired { buffer: u64 },
    #[error("buffer {buffer} is already acquired")]
    AlreadyAcquired { buffer: u64 },
    #[error("buffer {buffer} is not shared with rendering")]
    NotShared { buffer: u64 },
    #[error("transfer of {requested} bytes does not match buffer {buffer} of {actual} bytes")]
    SizeMismatch {
        buffer: u64,
        requested: usize,
        actual: usize,
    },
    #[error("No such adapter")]
    NoSuchAdapter,
    #[error("{0}")]
    Driver(String),
}

/// Everything needed to create a buffer.
#[derive(Debug, Clone, Copy)]
pub struct BufferDescriptor<'a> {
    pub label: &'a str,
    /// Initial contents; also determines the size.  Always a whole number of 32-bit words.
    pub contents: &'a [u8],
    pub visibility: Visibility,
}

/**
A device that can run kernels and share their buffers with rendering.

Calls are blocking.  Implementations use interior mutability; a backend is shared by every
object created from the same [`Context`](crate::Context).
*/
pub trait Backend: Debug + Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Waits until all outstanding render-side work has completed.
    ///
    /// This is the coarse barrier issued before every allocation and argument bind.
    fn finish_render(&self) -> Result<(), Error>;

    fn create_queue(&self) -> Result<QueueHandle, Error>;
    fn release_queue(&self, queue: QueueHandle);

    fn create_buffer(&self, descriptor: &BufferDescriptor<'_>) -> Result<BufferHandle, Error>;
    /// Frees the buffer and unsets it from every kernel argument that refers to it.
    fn release_buffer(&self, buffer: BufferHandle);

    /// Compiles `source`.  Failures carry the full build log in [`Error::Build`].
    fn build_program(&self, source: &str, options: &str) -> Result<ProgramHandle, Error>;
    fn release_program(&self, program: ProgramHandle);

    fn create_kernel(&self, program: ProgramHandle, entry_point: &str)
    -> Result<KernelHandle, Error>;
    fn release_kernel(&self, kernel: KernelHandle);
    fn set_kernel_arg(&self, kernel: KernelHandle, slot: u32, buffer: BufferHandle)
    -> Result<(), Error>;

    /// Hands a render-shared buffer to compute.
    fn acquire(&self, queue: QueueHandle, buffer: BufferHandle) -> Result<(), Error>;
    /// Hands a render-shared buffer back to rendering.
    fn release(&self, queue: QueueHandle, buffer: BufferHandle) -> Result<(), Error>;

    /// Stops sourcing the vertex attribute at `slot` from any buffer.
    fn disable_vertex_attribute(&self, slot: u32);
    /// Sources the vertex attribute at `attribute.shader_location` from `buffer`.
    fn enable_vertex_attribute(&self, buffer: BufferHandle, attribute: &VertexAttribute);

    /// Blocking device-to-host copy of the whole buffer.
    fn read_buffer(&self, queue: QueueHandle, buffer: BufferHandle, dst: &mut [u8])
    -> Result<(), Error>;
    /// Blocking host-to-device copy of the whole buffer.
    fn write_buffer(&self, queue: QueueHandle, buffer: BufferHandle, src: &[u8])
    -> Result<(), Error>;

    fn enqueue_kernel(
        &self,
        queue: QueueHandle,
        kernel: KernelHandle,
        global_size: [usize; 3],
        workgroup_size: [u32; 3],
    ) -> Result<EventHandle, Error>;
    fn wait_event(&self, event: EventHandle) -> Result<(), Error>;
    fn release_event(&self, event: EventHandle);

    /// Blocks until everything submitted to `queue` has completed.
    fn finish(&self, queue: QueueHandle) -> Result<(), Error>;
}

/**
Extracts `-D NAME=VALUE` definitions from a compiler option string.

Both `-D NAME=VALUE` and `-DNAME=VALUE` are accepted; a definition without a value gets `1`.
Other options are ignored.
*/
pub fn defines(options: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut tokens = options.split_whitespace();
    while let Some(token) = tokens.next() {
        let definition = match token.strip_prefix("-D") {
            Some("") => match tokens.next() {
                Some(next) => next,
                None => break,
            },
            Some(rest) => rest,
            None => continue,
        };
        let (name, value) = match definition.split_once('=') {
            Some((name, value)) => (name, value),
            None => (definition, "1"),
        };
        if !name.is_empty() {
            out.push((name.to_string(), value.to_string()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::defines;

    #[test]
    fn parses_defines() {
        let parsed = defines("-cl-fast-relaxed-math -D NODES=4 -DDT=0.01 -DVERBOSE -D");
        assert_eq!(
            parsed,
            vec![
                ("NODES".to_string(), "4".to_string()),
                ("DT".to_string(), "0.01".to_string()),
                ("VERBOSE".to_string(), "1".to_string()),
            ]
        );
    }
}
