// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! A backend that keeps everything in host memory.

Kernel "compilation" only checks the source text; dispatch runs a Rust closure registered with
[`HostBackend::register_kernel`].  The acquire/release protocol is enforced strictly: touching a
render-shared buffer from compute without acquiring it is an error here, where a real driver
would silently corrupt data.

A backend made with [`HostBackend::recording`] appends every call to a journal so tests can
assert ordering; one made with [`HostBackend::new`] keeps no history.  [`HostBackend::fail_when`]
makes matching calls fail, for exercising error paths.
*/

use super::{
    Backend, BufferDescriptor, BufferHandle, Error, EventHandle, KernelHandle, ProgramHandle,
    QueueHandle,
};
use crate::element::{Element, from_words, from_words_mut};
use crate::vertex_layout::VertexAttribute;
use crate::visible_to::Visibility;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};

type HostKernelFn = dyn Fn(&mut HostInvocation) + Send + Sync;
type FaultFn = dyn Fn(&Command) -> bool + Send;

/// One call received by a [`HostBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    RenderFinish,
    CreateBuffer {
        buffer: BufferHandle,
        bytes: usize,
        visibility: Visibility,
    },
    ReleaseBuffer {
        buffer: BufferHandle,
    },
    BuildProgram {
        program: ProgramHandle,
    },
    CreateKernel {
        kernel: KernelHandle,
    },
    SetArg {
        kernel: KernelHandle,
        slot: u32,
        buffer: BufferHandle,
    },
    Acquire {
        buffer: BufferHandle,
    },
    Release {
        buffer: BufferHandle,
    },
    DisableAttribute {
        slot: u32,
    },
    EnableAttribute {
        slot: u32,
        buffer: BufferHandle,
    },
    Read {
        buffer: BufferHandle,
    },
    Write {
        buffer: BufferHandle,
    },
    Dispatch {
        kernel: KernelHandle,
        global_size: [usize; 3],
    },
    Finish,
}

struct HostBuffer {
    words: Vec<u32>,
    visibility: Visibility,
    acquired: bool,
}

struct HostProgram {
    source: String,
    defines: Vec<(String, String)>,
    body: Option<Arc<HostKernelFn>>,
}

struct HostKernel {
    args: BTreeMap<u32, u64>,
    defines: Vec<(String, String)>,
    body: Option<Arc<HostKernelFn>>,
}

#[derive(Default)]
struct HostState {
    next_id: u64,
    used_bytes: usize,
    buffers: HashMap<u64, HostBuffer>,
    programs: HashMap<u64, HostProgram>,
    kernels: HashMap<u64, HostKernel>,
    queues: HashSet<u64>,
    events: HashSet<u64>,
    attributes: BTreeMap<u32, (BufferHandle, VertexAttribute)>,
    journal: Option<Vec<Command>>,
    fault: Option<Box<FaultFn>>,
}

impl HostState {
    fn record(&mut self, command: Command) {
        if let Some(journal) = &mut self.journal {
            journal.push(command);
        }
    }
    /// Fails with a driver error if `command` matches the installed fault.
    fn check_fault(&self, command: &Command) -> Result<(), Error> {
        match &self.fault {
            Some(fault) if fault(command) => {
                Err(Error::Driver(format!("injected failure at {command:?}")))
            }
            _ => Ok(()),
        }
    }
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
    fn buffer(&self, buffer: BufferHandle) -> Result<&HostBuffer, Error> {
        self.buffers.get(&buffer.0).ok_or(Error::InvalidHandle {
            kind: "buffer",
            id: buffer.0,
        })
    }
    fn buffer_mut(&mut self, buffer: BufferHandle) -> Result<&mut HostBuffer, Error> {
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

/**
The arguments of one host kernel dispatch.

Arguments are addressed by slot and viewed as any [`Element`] type; the view covers as many
whole elements as fit in the buffer.
*/
pub struct HostInvocation {
    global_size: [usize; 3],
    args: BTreeMap<u32, (u64, Vec<u32>)>,
    defines: Vec<(String, String)>,
}

impl HostInvocation {
    pub fn global_size(&self) -> [usize; 3] {
        self.global_size
    }

    /// Total number of work items.
    pub fn global_len(&self) -> usize {
        self.global_size.iter().product()
    }

    pub fn arg<T: Element>(&self, slot: u32) -> Option<&[T]> {
        self.args.get(&slot).map(|(_, words)| from_words(words))
    }

    pub fn arg_mut<T: Element>(&mut self, slot: u32) -> Option<&mut [T]> {
        self.args
            .get_mut(&slot)
            .map(|(_, words)| from_words_mut(words))
    }

    /// Two distinct arguments at once, e.g. an input and an output.
    pub fn pair_mut<T: Element, U: Element>(
        &mut self,
        first: u32,
        second: u32,
    ) -> Option<(&mut [T], &mut [U])> {
        if first == second {
            return None;
        }
        let mut a = None;
        let mut b = None;
        for (slot, (_, words)) in self.args.iter_mut() {
            if *slot == first {
                a = Some(words);
            } else if *slot == second {
                b = Some(words);
            }
        }
        Some((from_words_mut(a?), from_words_mut(b?)))
    }

    /// Value of a `-D NAME=VALUE` compiler option.
    pub fn define(&self, name: &str) -> Option<&str> {
        self.defines
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/**
Software backend.

```
use neutrino::imp::{Backend, BufferDescriptor, HostBackend};
use neutrino::Visibility;

let backend = HostBackend::new();
let buffer = backend
    .create_buffer(&BufferDescriptor { label: "a", contents: &[0; 16], visibility: Visibility::ComputeOnly })
    .unwrap();
assert_eq!(backend.live_buffers(), 1);
backend.release_buffer(buffer);
assert_eq!(backend.live_buffers(), 0);
```
*/
pub struct HostBackend {
    state: Mutex<HostState>,
    bodies: Mutex<Vec<(String, Arc<HostKernelFn>)>>,
    memory_limit: Option<usize>,
}

impl Debug for HostBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBackend")
            .field("memory_limit", &self.memory_limit)
            .finish_non_exhaustive()
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBackend {
    pub fn new() -> Self {
        HostBackend {
            state: Mutex::new(HostState::default()),
            bodies: Mutex::new(Vec::new()),
            memory_limit: None,
        }
    }

    /// A backend that journals every call it receives.
    pub fn recording() -> Self {
        let backend = Self::new();
        backend.state.lock().unwrap().journal = Some(Vec::new());
        backend
    }

    /// A backend that refuses allocations once `bytes` are in use.
    pub fn with_memory_limit(bytes: usize) -> Self {
        HostBackend {
            memory_limit: Some(bytes),
            ..Self::new()
        }
    }

    /**
    Makes every later call whose command matches `fault` fail with [`Error::Driver`] before it
    takes effect.

    Covers argument binding, acquire, release, transfers, and both finishes.
    */
    pub fn fail_when(&self, fault: impl Fn(&Command) -> bool + Send + 'static) {
        self.state.lock().unwrap().fault = Some(Box::new(fault));
    }

    pub fn stop_failing(&self) {
        self.state.lock().unwrap().fault = None;
    }

    /**
    Registers the body run for programs whose source contains `marker`.

    When a program is built, the first registered marker found in its source selects the body.
    Programs matching no marker dispatch as no-ops.
    */
    pub fn register_kernel(
        &self,
        marker: &str,
        body: impl Fn(&mut HostInvocation) + Send + Sync + 'static,
    ) {
        let body: Arc<HostKernelFn> = Arc::new(body);
        self.bodies.lock().unwrap().push((marker.to_string(), body));
    }

    /// Every call received so far, in order.  Always empty unless the backend is
    /// [recording](Self::recording).
    pub fn journal(&self) -> Vec<Command> {
        self.state.lock().unwrap().journal.clone().unwrap_or_default()
    }

    pub fn clear_journal(&self) {
        if let Some(journal) = &mut self.state.lock().unwrap().journal {
            journal.clear();
        }
    }

    pub fn live_buffers(&self) -> usize {
        self.state.lock().unwrap().buffers.len()
    }

    pub fn used_bytes(&self) -> usize {
        self.state.lock().unwrap().used_bytes
    }

    /// Whether a render-shared buffer is currently held by compute.
    pub fn is_acquired(&self, buffer: BufferHandle) -> Option<bool> {
        self.state
            .lock()
            .unwrap()
            .buffers
            .get(&buffer.0)
            .map(|b| b.acquired)
    }

    /// The buffer currently sourcing the vertex attribute at `slot`.
    pub fn vertex_attribute(&self, slot: u32) -> Option<(BufferHandle, VertexAttribute)> {
        self.state.lock().unwrap().attributes.get(&slot).copied()
    }

    pub fn kernel_args(&self, kernel: KernelHandle) -> Vec<(u32, BufferHandle)> {
        self.state
            .lock()
            .unwrap()
            .kernels
            .get(&kernel.0)
            .map(|k| {
                k.args
                    .iter()
                    .map(|(slot, buffer)| (*slot, BufferHandle(*buffer)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn body_for(&self, source: &str) -> Option<Arc<HostKernelFn>> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .find(|(marker, _)| source.contains(marker.as_str()))
            .map(|(_, body)| body.clone())
    }
}

fn build_log(source: &str) -> Option<String> {
    if source.trim().is_empty() {
        return Some("error: program source is empty".to_string());
    }
    let errors: Vec<String> = source
        .lines()
        .enumerate()
        .filter_map(|(number, line)| {
            line.trim_start()
                .strip_prefix("#error")
                .map(|message| format!("line {}: error: {}", number + 1, message.trim()))
        })
        .collect();
    if errors.is_empty() {
        None
    } else {
        Some(errors.join("\n"))
    }
}

impl Backend for HostBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    fn finish_render(&self) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.check_fault(&Command::RenderFinish)?;
        state.record(Command::RenderFinish);
        Ok(())
    }

    fn create_queue(&self) -> Result<QueueHandle, Error> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.queues.insert(id);
        Ok(QueueHandle(id))
    }

    fn release_queue(&self, queue: QueueHandle) {
        self.state.lock().unwrap().queues.remove(&queue.0);
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor<'_>) -> Result<BufferHandle, Error> {
        let bytes = descriptor.contents.len();
        if bytes % 4 != 0 {
            return Err(Error::Driver(format!(
                "buffer {} is {} bytes, not a whole number of words",
                descriptor.label, bytes
            )));
        }
        let mut state = self.state.lock().unwrap();
        if let Some(limit) = self.memory_limit {
            let available = limit.saturating_sub(state.used_bytes);
            if bytes > available {
                logwise::warn_sync!(
                    "host memory limit reached: {requested} requested, {available} available",
                    requested = bytes,
                    available = available
                );
                return Err(Error::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
        }
        let words = descriptor
            .contents
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let id = state.next_id();
        state.buffers.insert(
            id,
            HostBuffer {
                words,
                visibility: descriptor.visibility,
                acquired: false,
            },
        );
        state.used_bytes += bytes;
        state.record(Command::CreateBuffer {
            buffer: BufferHandle(id),
            bytes,
            visibility: descriptor.visibility,
        });
        Ok(BufferHandle(id))
    }

    fn release_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state.lock().unwrap();
        if let Some(removed) = state.buffers.remove(&buffer.0) {
            state.used_bytes -= removed.words.len() * 4;
            for kernel in state.kernels.values_mut() {
                kernel.args.retain(|_, b| *b != buffer.0);
            }
            state.attributes.retain(|_, (b, _)| *b != buffer);
            state.record(Command::ReleaseBuffer { buffer });
        }
    }

    fn build_program(&self, source: &str, options: &str) -> Result<ProgramHandle, Error> {
        if let Some(log) = build_log(source) {
            return Err(Error::Build { log });
        }
        let body = self.body_for(source);
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.programs.insert(
            id,
            HostProgram {
                source: source.to_string(),
                defines: super::defines(options),
                body,
            },
        );
        state.record(Command::BuildProgram {
            program: ProgramHandle(id),
        });
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
        let mut state = self.state.lock().unwrap();
        let (defines, body) = {
            let program = state.programs.get(&program.0).ok_or(Error::InvalidHandle {
                kind: "program",
                id: program.0,
            })?;
            if !program.source.contains(entry_point) {
                return Err(Error::NoSuchEntryPoint(entry_point.to_string()));
            }
            (program.defines.clone(), program.body.clone())
        };
        let id = state.next_id();
        state.kernels.insert(
            id,
            HostKernel {
                args: BTreeMap::new(),
                defines,
                body,
            },
        );
        state.record(Command::CreateKernel {
            kernel: KernelHandle(id),
        });
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
        state.check_fault(&Command::SetArg {
            kernel,
            slot,
            buffer,
        })?;
        state.buffer(buffer)?;
        let k = state.kernels.get_mut(&kernel.0).ok_or(Error::InvalidHandle {
            kind: "kernel",
            id: kernel.0,
        })?;
        k.args.insert(slot, buffer.0);
        state.record(Command::SetArg {
            kernel,
            slot,
            buffer,
        });
        Ok(())
    }

    fn acquire(&self, queue: QueueHandle, buffer: BufferHandle) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.check_fault(&Command::Acquire { buffer })?;
        state.check_queue(queue)?;
        let b = state.buffer_mut(buffer)?;
        if b.visibility != Visibility::Render {
            return Err(Error::NotShared { buffer: buffer.0 });
        }
        if b.acquired {
            return Err(Error::AlreadyAcquired { buffer: buffer.0 });
        }
        b.acquired = true;
        state.record(Command::Acquire { buffer });
        Ok(())
    }

    fn release(&self, queue: QueueHandle, buffer: BufferHandle) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.check_fault(&Command::Release { buffer })?;
        state.check_queue(queue)?;
        let b = state.buffer_mut(buffer)?;
        if b.visibility != Visibility::Render {
            return Err(Error::NotShared { buffer: buffer.0 });
        }
        if !b.acquired {
            return Err(Error::NotAcquired { buffer: buffer.0 });
        }
        b.acquired = false;
        state.record(Command::Release { buffer });
        Ok(())
    }

    fn disable_vertex_attribute(&self, slot: u32) {
        let mut state = self.state.lock().unwrap();
        state.attributes.remove(&slot);
        state.record(Command::DisableAttribute { slot });
    }

    fn enable_vertex_attribute(&self, buffer: BufferHandle, attribute: &VertexAttribute) {
        let mut state = self.state.lock().unwrap();
        state
            .attributes
            .insert(attribute.shader_location, (buffer, *attribute));
        state.record(Command::EnableAttribute {
            slot: attribute.shader_location,
            buffer,
        });
    }

    fn read_buffer(
        &self,
        queue: QueueHandle,
        buffer: BufferHandle,
        dst: &mut [u8],
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.check_fault(&Command::Read { buffer })?;
        state.check_queue(queue)?;
        let b = state.buffer(buffer)?;
        if b.visibility == Visibility::Render && !b.acquired {
            return Err(Error::NotAcquired { buffer: buffer.0 });
        }
        if dst.len() != b.words.len() * 4 {
            return Err(Error::SizeMismatch {
                buffer: buffer.0,
                requested: dst.len(),
                actual: b.words.len() * 4,
            });
        }
        for (chunk, word) in dst.chunks_exact_mut(4).zip(b.words.iter()) {
            chunk.copy_from_slice(&word.to_ne_bytes());
        }
        state.record(Command::Read { buffer });
        Ok(())
    }

    fn write_buffer(
        &self,
        queue: QueueHandle,
        buffer: BufferHandle,
        src: &[u8],
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.check_fault(&Command::Write { buffer })?;
        state.check_queue(queue)?;
        let b = state.buffer_mut(buffer)?;
        if b.visibility == Visibility::Render && !b.acquired {
            return Err(Error::NotAcquired { buffer: buffer.0 });
        }
        if src.len() != b.words.len() * 4 {
            return Err(Error::SizeMismatch {
                buffer: buffer.0,
                requested: src.len(),
                actual: b.words.len() * 4,
            });
        }
        for (word, c) in b.words.iter_mut().zip(src.chunks_exact(4)) {
            *word = u32::from_ne_bytes([c[0], c[1], c[2], c[3]]);
        }
        state.record(Command::Write { buffer });
        Ok(())
    }

    fn enqueue_kernel(
        &self,
        queue: QueueHandle,
        kernel: KernelHandle,
        global_size: [usize; 3],
        _workgroup_size: [u32; 3],
    ) -> Result<EventHandle, Error> {
        //take the argument buffers out so the body runs without the lock
        let (mut invocation, body) = {
            let mut state = self.state.lock().unwrap();
            state.check_queue(queue)?;
            let k = state.kernels.get(&kernel.0).ok_or(Error::InvalidHandle {
                kind: "kernel",
                id: kernel.0,
            })?;
            let args: Vec<(u32, u64)> = k.args.iter().map(|(s, b)| (*s, *b)).collect();
            let defines = k.defines.clone();
            let body = k.body.clone();
            for (_, buffer) in &args {
                let b = state.buffer(BufferHandle(*buffer))?;
                if b.visibility == Visibility::Render && !b.acquired {
                    logwise::warn_sync!(
                        "dispatch with render-owned buffer {buffer}",
                        buffer = *buffer
                    );
                    return Err(Error::NotAcquired { buffer: *buffer });
                }
            }
            let mut seen = HashSet::new();
            if let Some((_, buffer)) = args.iter().find(|(_, b)| !seen.insert(*b)) {
                return Err(Error::Driver(format!(
                    "buffer {buffer} is bound to more than one slot"
                )));
            }
            let mut taken = BTreeMap::new();
            for (slot, buffer) in args {
                if let Some(b) = state.buffers.get_mut(&buffer) {
                    taken.insert(slot, (buffer, std::mem::take(&mut b.words)));
                }
            }
            state.record(Command::Dispatch {
                kernel,
                global_size,
            });
            (
                HostInvocation {
                    global_size,
                    args: taken,
                    defines,
                },
                body,
            )
        };
        if let Some(body) = body {
            body(&mut invocation);
        }
        let mut state = self.state.lock().unwrap();
        for (_, (id, words)) in std::mem::take(&mut invocation.args) {
            if let Some(b) = state.buffers.get_mut(&id) {
                b.words = words;
            }
        }
        let id = state.next_id();
        state.events.insert(id);
        Ok(EventHandle(id))
    }

    fn wait_event(&self, event: EventHandle) -> Result<(), Error> {
        if self.state.lock().unwrap().events.contains(&event.0) {
            Ok(())
        } else {
            Err(Error::InvalidHandle {
                kind: "event",
                id: event.0,
            })
        }
    }

    fn release_event(&self, event: EventHandle) {
        self.state.lock().unwrap().events.remove(&event.0);
    }

    fn finish(&self, queue: QueueHandle) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.check_fault(&Command::Finish)?;
        state.check_queue(queue)?;
        state.record(Command::Finish);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn shared_buffers_require_acquire() {
        let backend = HostBackend::new();
        let queue = backend.create_queue().unwrap();
        let contents = words(&[1.0, 2.0]);
        let buffer = backend
            .create_buffer(&BufferDescriptor {
                label: "shared",
                contents: &contents,
                visibility: Visibility::Render,
            })
            .unwrap();
        let mut out = vec![0u8; 8];
        assert!(matches!(
            backend.read_buffer(queue, buffer, &mut out),
            Err(Error::NotAcquired { .. })
        ));
        backend.acquire(queue, buffer).unwrap();
        assert!(matches!(
            backend.acquire(queue, buffer),
            Err(Error::AlreadyAcquired { .. })
        ));
        backend.read_buffer(queue, buffer, &mut out).unwrap();
        assert_eq!(out, contents);
        backend.release(queue, buffer).unwrap();
        assert!(matches!(
            backend.release(queue, buffer),
            Err(Error::NotAcquired { .. })
        ));
    }

    #[test]
    fn only_recording_backends_keep_a_journal() {
        let backends = [(HostBackend::new(), false), (HostBackend::recording(), true)];
        for (backend, recording) in backends {
            let queue = backend.create_queue().unwrap();
            let buffer = backend
                .create_buffer(&BufferDescriptor {
                    label: "scratch",
                    contents: &[0; 4],
                    visibility: Visibility::ComputeOnly,
                })
                .unwrap();
            for _ in 0..10_000 {
                backend.write_buffer(queue, buffer, &[1, 0, 0, 0]).unwrap();
            }
            let expected = if recording { 10_001 } else { 0 };
            assert_eq!(backend.journal().len(), expected);
        }
    }

    #[test]
    fn faults_fail_matching_calls_only() {
        let backend = HostBackend::recording();
        let queue = backend.create_queue().unwrap();
        let buffer = backend
            .create_buffer(&BufferDescriptor {
                label: "faulty",
                contents: &[0; 4],
                visibility: Visibility::ComputeOnly,
            })
            .unwrap();
        backend.fail_when(|command| matches!(command, Command::Write { .. }));
        assert!(matches!(
            backend.write_buffer(queue, buffer, &[1, 0, 0, 0]),
            Err(Error::Driver(_))
        ));
        let mut out = [9u8; 4];
        backend.read_buffer(queue, buffer, &mut out).unwrap();
        assert_eq!(out, [0; 4]);
        backend.stop_failing();
        backend.write_buffer(queue, buffer, &[1, 0, 0, 0]).unwrap();
        assert_eq!(
            backend.journal()[1..],
            [Command::Read { buffer }, Command::Write { buffer }]
        );
    }

    #[test]
    fn compute_buffers_cannot_be_handed_off() {
        let backend = HostBackend::new();
        let queue = backend.create_queue().unwrap();
        let buffer = backend
            .create_buffer(&BufferDescriptor {
                label: "plain",
                contents: &[0; 4],
                visibility: Visibility::ComputeOnly,
            })
            .unwrap();
        assert!(matches!(
            backend.acquire(queue, buffer),
            Err(Error::NotShared { .. })
        ));
        backend.write_buffer(queue, buffer, &[1, 0, 0, 0]).unwrap();
    }

    #[test]
    fn error_directive_fails_the_build() {
        let backend = HostBackend::new();
        let err = backend
            .build_program("void thekernel() {}\n#error missing include\n", "")
            .unwrap_err();
        match err {
            Error::Build { log } => assert_eq!(log, "line 2: error: missing include"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn pair_mut_gives_two_views() {
        let mut invocation = HostInvocation {
            global_size: [2, 1, 1],
            args: BTreeMap::from([(0, (1, vec![1, 2])), (1, (2, vec![0, 0]))]),
            defines: Vec::new(),
        };
        let (input, output) = invocation.pair_mut::<i32, i32>(0, 1).unwrap();
        output.copy_from_slice(input);
        assert_eq!(invocation.arg::<i32>(1).unwrap(), &[1, 2]);
        assert!(invocation.pair_mut::<i32, i32>(0, 0).is_none());
    }
}
