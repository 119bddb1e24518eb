// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Node adjacency.

Two nodes are neighbors when some element contains both.  The neighbor sets of all nodes are
stored in compressed sparse row form: the neighbors of node `i` are
`indices[offsets[i]..offsets[i + 1]]`, ascending and without duplicates, never containing `i`
itself.  The same two arrays upload directly as kernel arguments.

Construction goes through an inverted index (node to the elements containing it), so the cost
is proportional to the total number of element-node incidences rather than to
`nodes * elements`.

```
use neutrino::mesh::adjacency::Adjacency;

let adjacency = Adjacency::from_elements(4, [[0u32, 1, 2], [1, 2, 3]]);
assert_eq!(adjacency.neighbors(0), &[1, 2]);
assert_eq!(adjacency.neighbors(1), &[0, 2, 3]);
assert_eq!(adjacency.neighbors(3), &[1, 2]);
```
*/

use crate::array::Int1Array;
use crate::context::Context;
use crate::error::Error;
use crate::visible_to::Visibility;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjacency {
    offsets: Vec<usize>,
    indices: Vec<u32>,
}

/// Node-to-element membership in CSR form.
struct Membership {
    offsets: Vec<usize>,
    elements: Vec<usize>,
}

impl Membership {
    fn build(node_count: usize, elements: &[&[u32]]) -> Self {
        let mut counts = vec![0usize; node_count + 1];
        for element in elements {
            for &node in element.iter() {
                counts[node as usize + 1] += 1;
            }
        }
        for i in 1..counts.len() {
            counts[i] += counts[i - 1];
        }
        let offsets = counts.clone();
        let mut cursor = counts;
        let mut members = vec![0usize; offsets[node_count]];
        for (element_index, element) in elements.iter().enumerate() {
            for &node in element.iter() {
                let at = &mut cursor[node as usize];
                members[*at] = element_index;
                *at += 1;
            }
        }
        Membership {
            offsets,
            elements: members,
        }
    }

    fn of(&self, node: usize) -> &[usize] {
        &self.elements[self.offsets[node]..self.offsets[node + 1]]
    }
}

impl Adjacency {
    /**
    Builds the neighbor sets of `node_count` nodes from element node lists.

    # Panics

    If an element refers to a node `>= node_count`.
    */
    pub fn from_elements<E: AsRef<[u32]>>(
        node_count: usize,
        elements: impl IntoIterator<Item = E>,
    ) -> Self {
        let elements: Vec<E> = elements.into_iter().collect();
        let views: Vec<&[u32]> = elements.iter().map(|e| e.as_ref()).collect();
        if let Some(bad) = views.iter().flat_map(|e| e.iter()).find(|n| **n as usize >= node_count)
        {
            panic!("element refers to node {bad} of {node_count}");
        }
        let membership = Membership::build(node_count, &views);

        let mut offsets = Vec::with_capacity(node_count + 1);
        let mut indices = Vec::new();
        let mut scratch = Vec::new();
        offsets.push(0);
        for node in 0..node_count {
            scratch.clear();
            for &element in membership.of(node) {
                scratch.extend(views[element].iter().copied().filter(|n| *n as usize != node));
            }
            scratch.sort_unstable();
            scratch.dedup();
            indices.extend_from_slice(&scratch);
            offsets.push(indices.len());
        }
        Adjacency { offsets, indices }
    }

    pub fn node_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of (node, neighbor) entries, counting each pair in both directions.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Ascending neighbors of `node`.
    pub fn neighbors(&self, node: usize) -> &[u32] {
        &self.indices[self.offsets[node]..self.offsets[node + 1]]
    }

    /// `node_count + 1` entries; the first is 0 and the last is [`len`](Self::len).
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[u32])> {
        (0..self.node_count()).map(|node| (node, self.neighbors(node)))
    }

    /// The offsets and indices as compute-only integer arrays, labelled `adjacency offsets` and
    /// `adjacency indices`.
    pub fn to_arrays(&self, context: &Context) -> Result<(Int1Array, Int1Array), Error> {
        let offsets = to_i32(self.offsets.iter().copied())?;
        let indices = to_i32(self.indices.iter().map(|i| *i as usize))?;
        Ok((
            Int1Array::from_vec(
                context,
                offsets,
                Visibility::ComputeOnly,
                "adjacency offsets",
            ),
            Int1Array::from_vec(
                context,
                indices,
                Visibility::ComputeOnly,
                "adjacency indices",
            ),
        ))
    }
}

fn to_i32(values: impl IntoIterator<Item = usize>) -> Result<Vec<i32>, Error> {
    values
        .into_iter()
        .map(|v| i32::try_from(v).map_err(|_| Error::IndexOverflow { value: v }))
        .collect()
}
