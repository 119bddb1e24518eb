// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Spring bonds between neighboring nodes.

A [`BondSet`] holds one bond per entry of an [`Adjacency`], in the same CSR order, so bond `b`
connects node `i` to `adjacency.indices()[b]` where `offsets[i] <= b < offsets[i + 1]`.
Kernels index the bond arrays with the adjacency offsets they already have.

Each pair of neighbors appears twice, once from each side; the two bonds are independent.
*/

use crate::array::Float1Array;
use crate::context::Context;
use crate::error::Error;
use crate::mesh::Mesh;
use crate::mesh::adjacency::Adjacency;
use crate::visible_to::Visibility;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct BondSet {
    offsets: Vec<usize>,
    stiffness: Vec<f32>,
    damping: Vec<f32>,
    rest_length: Vec<f32>,
}

impl BondSet {
    /**
    Bonds with uniform stiffness and damping, at rest in the mesh's current shape.

    `adjacency` must describe the nodes of `mesh`; a node count that differs is
    [`Error::NodeCountMismatch`].
    */
    pub fn new(
        mesh: &Mesh,
        adjacency: &Adjacency,
        stiffness: f32,
        damping: f32,
    ) -> Result<Self, Error> {
        if adjacency.node_count() != mesh.node_count() {
            return Err(Error::NodeCountMismatch {
                mesh: mesh.node_count(),
                adjacency: adjacency.node_count(),
            });
        }
        let nodes = mesh.nodes();
        let mut rest_length = Vec::with_capacity(adjacency.len());
        for (node, neighbors) in adjacency.iter() {
            let a = nodes[node];
            for &neighbor in neighbors {
                let b = nodes[neighbor as usize];
                let d = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
                rest_length.push((d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt());
            }
        }
        Ok(BondSet {
            offsets: adjacency.offsets().to_vec(),
            stiffness: vec![stiffness; adjacency.len()],
            damping: vec![damping; adjacency.len()],
            rest_length,
        })
    }

    pub fn len(&self) -> usize {
        self.stiffness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stiffness.is_empty()
    }

    /// The bonds of `node`.
    pub fn bonds_of(&self, node: usize) -> Range<usize> {
        self.offsets[node]..self.offsets[node + 1]
    }

    pub fn stiffness(&self, bond: usize) -> f32 {
        self.stiffness[bond]
    }

    pub fn damping(&self, bond: usize) -> f32 {
        self.damping[bond]
    }

    pub fn rest_length(&self, bond: usize) -> f32 {
        self.rest_length[bond]
    }

    pub fn set_stiffness(&mut self, bond: usize, value: f32) {
        self.stiffness[bond] = value;
    }

    pub fn set_damping(&mut self, bond: usize, value: f32) {
        self.damping[bond] = value;
    }

    pub fn set_rest_length(&mut self, bond: usize, value: f32) {
        self.rest_length[bond] = value;
    }

    /// `(stiffness, damping, rest length)` as compute-only arrays.
    pub fn to_arrays(&self, context: &Context) -> (Float1Array, Float1Array, Float1Array) {
        (
            Float1Array::from_vec(
                context,
                self.stiffness.clone(),
                Visibility::ComputeOnly,
                "bond stiffness",
            ),
            Float1Array::from_vec(
                context,
                self.damping.clone(),
                Visibility::ComputeOnly,
                "bond damping",
            ),
            Float1Array::from_vec(
                context,
                self.rest_length.clone(),
                Visibility::ComputeOnly,
                "bond rest length",
            ),
        )
    }
}
