// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//
// Adjacency construction on a structured tetrahedral grid.

use criterion::*;
use neutrino::mesh::adjacency::Adjacency;
use std::hint::black_box;

/// Splits each cube of an `n * n * n` grid into six tetrahedra.
fn tetrahedral_grid(n: u32) -> (usize, Vec<[u32; 4]>) {
    let side = n + 1;
    let at = |x: u32, y: u32, z: u32| (z * side + y) * side + x;
    let mut elements = Vec::with_capacity((n * n * n * 6) as usize);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let c = [
                    at(x, y, z),
                    at(x + 1, y, z),
                    at(x + 1, y + 1, z),
                    at(x, y + 1, z),
                    at(x, y, z + 1),
                    at(x + 1, y, z + 1),
                    at(x + 1, y + 1, z + 1),
                    at(x, y + 1, z + 1),
                ];
                for [a, b] in [[1, 2], [2, 3], [3, 7], [7, 4], [4, 5], [5, 1]] {
                    elements.push([c[0], c[a], c[b], c[6]]);
                }
            }
        }
    }
    ((side * side * side) as usize, elements)
}

fn adjacency_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("adjacency");
    group.sample_size(20);
    for n in [8, 16, 32] {
        let (node_count, elements) = tetrahedral_grid(n);
        group.throughput(Throughput::Elements(elements.len() as u64));
        group.bench_with_input(BenchmarkId::new("tetrahedral_grid", n), &elements, |b, elements| {
            b.iter(|| black_box(Adjacency::from_elements(node_count, elements)));
        });
    }
    group.finish();
}

criterion_group!(benches, adjacency_benchmark);
criterion_main!(benches);
