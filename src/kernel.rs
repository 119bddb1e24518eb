// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Kernel programs.

A [`Kernel`] collects source fragments and compiler options, then is built exactly once.
Building compiles the program, creates the kernel from the entry point [`ENTRY_POINT`], and
binds every already-allocated array of the context at its layout slot, so that arrays shared
between several kernels do not have to be bound to each of them by hand.
*/

use crate::context::Context;
use crate::error::{CompileError, Error, KernelBindError};
use crate::imp::{self, EventHandle, KernelHandle, ProgramHandle};
use logwise::privacy::LogIt;
use std::path::Path;

/// The function every kernel program must define.
pub const ENTRY_POINT: &str = "thekernel";

#[derive(Debug)]
pub struct Kernel {
    context: Context,
    source: String,
    options: String,
    program: Option<ProgramHandle>,
    kernel: Option<KernelHandle>,
    global_size: [usize; 3],
    workgroup_size: [u32; 3],
    event: Option<EventHandle>,
}

impl Kernel {
    pub fn new(context: &Context) -> Self {
        Kernel {
            context: context.clone(),
            source: String::new(),
            options: String::new(),
            program: None,
            kernel: None,
            global_size: [0; 3],
            workgroup_size: [1, 1, 1],
            event: None,
        }
    }

    /// Appends a source fragment followed by a newline.
    pub fn add_source(&mut self, text: &str) {
        self.source.push_str(text);
        self.source.push('\n');
    }

    pub fn add_source_file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.add_source(&text);
        Ok(())
    }

    /**
    Appends a compiler option.

    `-D NAME=VALUE` options become named constants visible to the program on every backend.
    */
    pub fn add_option(&mut self, option: &str) {
        if !self.options.is_empty() {
            self.options.push(' ');
        }
        self.options.push_str(option);
    }

    /// Work items per workgroup, for backends that dispatch in workgroups.  Defaults to `[1, 1, 1]`.
    pub fn set_workgroup_size(&mut self, size: [u32; 3]) {
        self.workgroup_size = size;
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn options(&self) -> &str {
        &self.options
    }

    /**
    Compiles the program and creates the kernel, with a global work size of
    `size_i * size_j * size_k` items.

    On a compile failure the full build log is logged and returned in [`CompileError`]; the
    kernel stays unbuilt.  If binding an allocated array fails, the program and kernel are
    released and the kernel also stays unbuilt, so `build` may be retried.  A second successful
    call is a [`KernelBindError::AlreadyBuilt`].
    */
    pub fn build(&mut self, size_i: usize, size_j: usize, size_k: usize) -> Result<(), Error> {
        if self.kernel.is_some() {
            return Err(KernelBindError::AlreadyBuilt.into());
        }
        let backend = self.context.backend();
        let perf = logwise::perfwarn_begin!("Kernel::build");
        let built = backend.build_program(&self.source, &self.options);
        drop(perf);
        let program = match built {
            Ok(program) => program,
            Err(imp::Error::Build { log }) => {
                logwise::error_sync!("kernel build failed:\n{log}", log = LogIt(&log));
                return Err(CompileError { log }.into());
            }
            Err(other) => return Err(other.into()),
        };
        let kernel = match backend.create_kernel(program, ENTRY_POINT) {
            Ok(kernel) => kernel,
            Err(source) => {
                backend.release_program(program);
                return Err(KernelBindError::Create {
                    entry_point: ENTRY_POINT.to_string(),
                    source,
                }
                .into());
            }
        };
        //existing arrays are bound before anything is stored or registered
        for (slot, buffer) in self.context.allocated_arrays() {
            let bound = backend
                .finish_render()
                .and_then(|_| backend.set_kernel_arg(kernel, slot, buffer));
            if let Err(source) = bound {
                backend.release_kernel(kernel);
                backend.release_program(program);
                return Err(KernelBindError::Argument { slot, source }.into());
            }
        }
        self.program = Some(program);
        self.kernel = Some(kernel);
        self.global_size = [size_i, size_j, size_k];
        self.context.register_kernel(kernel);
        logwise::info_sync!(
            "built kernel {id} over {size}",
            id = kernel.id(),
            size = LogIt(&self.global_size)
        );
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.kernel.is_some()
    }

    /// `None` until built.
    pub fn handle(&self) -> Option<KernelHandle> {
        self.kernel
    }

    pub fn global_size(&self) -> [usize; 3] {
        self.global_size
    }

    pub fn workgroup_size(&self) -> [u32; 3] {
        self.workgroup_size
    }

    /// Completion event of the most recent dispatch.
    pub fn event(&self) -> Option<EventHandle> {
        self.event
    }

    pub(crate) fn record_event(&mut self, event: EventHandle) {
        if let Some(old) = self.event.replace(event) {
            self.context.backend().release_event(old);
        }
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        let backend = self.context.backend();
        if let Some(event) = self.event.take() {
            backend.release_event(event);
        }
        if let Some(kernel) = self.kernel.take() {
            self.context.unregister_kernel(kernel);
            backend.release_kernel(kernel);
        }
        if let Some(program) = self.program.take() {
            backend.release_program(program);
        }
    }
}
