// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The wgpu backend on whatever adapter the machine has.  Tests return early without one.

#![cfg(feature = "backend_wgpu")]

use neutrino::context::ContextOptions;
use neutrino::imp::WgpuBackend;
use neutrino::{Context, Error, Float1Array, Float4Array, Kernel, Queue, Visibility};
use std::sync::Arc;

const SCALE: &str = "
@group(0) @binding(0) var<storage, read_write> values: array<f32>;

@compute @workgroup_size(1)
fn thekernel(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x < arrayLength(&values)) {
        values[id.x] = values[id.x] * FACTOR;
    }
}
";

fn gpu() -> Option<(Arc<WgpuBackend>, Context)> {
    match WgpuBackend::new(&ContextOptions::default()) {
        Ok(backend) => {
            let backend = Arc::new(backend);
            let context = Context::new(backend.clone());
            Some((backend, context))
        }
        Err(e) => {
            logwise::warn_sync!("skipping wgpu test: {e}", e = logwise::privacy::LogIt(&e));
            None
        }
    }
}

#[test]
fn kernel_scales_a_shared_array() {
    let Some((backend, context)) = gpu() else {
        return;
    };
    let queue = Queue::new(&context).unwrap();
    let mut kernel = Kernel::new(&context);
    kernel.add_source(SCALE);
    kernel.add_option("-D FACTOR=3.0");
    kernel.build(4, 1, 1).unwrap();

    let mut values =
        Float1Array::from_vec(&context, vec![1.0, 2.0, 3.0, 4.0], Visibility::Render, "values");
    values.bind(&kernel, 0).unwrap();
    assert_eq!(backend.vertex_buffers().len(), 1);

    values.acquire(&queue, 0).unwrap();
    assert!(backend.vertex_buffers().is_empty());
    queue.run(&mut kernel).unwrap();
    queue.wait(&kernel).unwrap();
    values.read(&queue, 0).unwrap();
    values.release(&queue, 0).unwrap();
    assert_eq!(values.as_slice(), &[3.0, 6.0, 9.0, 12.0]);

    let bindings = backend.vertex_buffers();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].attribute.shader_location, 0);
}

#[test]
fn write_then_read_round_trips() {
    let Some((_backend, context)) = gpu() else {
        return;
    };
    let queue = Queue::new(&context).unwrap();
    let mut kernel = Kernel::new(&context);
    kernel.add_source(
        "@group(0) @binding(2) var<storage, read_write> p: array<vec4<f32>>;
@compute @workgroup_size(1) fn thekernel() { p[0].w = 1.0; }",
    );
    kernel.build(1, 1, 1).unwrap();
    let mut positions = Float4Array::new(&context, 3, Visibility::Render, "positions");
    positions.bind(&kernel, 2).unwrap();
    positions.as_mut_slice()[1] = [0.5, -1.0, 2.0, 1.0];
    positions.write(&queue, 2).unwrap();
    positions.as_mut_slice().fill([0.0; 4]);
    positions.read(&queue, 2).unwrap();
    assert_eq!(positions[1], [0.5, -1.0, 2.0, 1.0]);
    queue.finish().unwrap();
}

#[test]
fn invalid_wgsl_reports_a_compile_log() {
    let Some((_backend, context)) = gpu() else {
        return;
    };
    let mut kernel = Kernel::new(&context);
    kernel.add_source("@compute @workgroup_size(1) fn thekernel() { let x: f32 = ; }");
    match kernel.build(1, 1, 1) {
        Err(Error::Compile(e)) => assert!(e.log.contains("error"), "{}", e.log),
        other => panic!("expected a compile error, got {other:?}"),
    }
}
