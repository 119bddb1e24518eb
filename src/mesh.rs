// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Mesh import.

A [`Mesh`] is read from a Gmsh MSH 4.1 file, ASCII or binary, parsed by `mshio`.  Gmsh node tags may be sparse and in any
order; on import they are renumbered densely from 0 in ascending tag order, so node `i` is the
node with the `i`-th smallest tag.  Elements refer to nodes by that dense index.

```
use neutrino::Mesh;

let mesh: Mesh = "\
$MeshFormat
4.1 0 8
$EndMeshFormat
$Nodes
1 3 3 17
2 1 0 3
5
17
3
0 0 0
1 0 0
0 1 0
$EndNodes
$Elements
1 1 1 1
2 1 2 1
1 3 5 17
$EndElements
"
.parse()
.unwrap();

assert_eq!(mesh.node_tags(), &[3, 5, 17]);
assert_eq!(mesh.nodes()[0], [0.0, 1.0, 0.0, 1.0]);
assert_eq!(mesh.elements()[0].nodes(), &[0, 1, 2]);
assert_eq!(mesh.adjacency().neighbors(0), &[1, 2]);
```
*/

pub mod adjacency;
pub mod element_type;
mod msh;

use crate::array::Float4Array;
use crate::context::Context;
use crate::visible_to::Visibility;
use adjacency::Adjacency;
use element_type::ElementType;
use logwise::privacy::LogIt;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MeshImportError {
    #[error("can't open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("unsupported mesh feature: {0}")]
    Unsupported(String),
    #[error("missing ${0} section")]
    MissingSection(&'static str),
    #[error("MSH version {0} is not supported; save as version 4.1")]
    UnsupportedVersion(String),
    #[error("entity dimension {0} is not between 0 and 3")]
    Dimension(i32),
    #[error("{declared} nodes declared but {found} found")]
    NodeCountMismatch { declared: usize, found: usize },
    #[error("{declared} elements declared but {found} found")]
    ElementCountMismatch { declared: usize, found: usize },
    #[error("unknown element type {code}")]
    UnknownElementType { code: u32 },
    #[error("element {element} has {found} nodes, but its type needs {expected}")]
    ElementSize {
        element: u64,
        expected: usize,
        found: usize,
    },
    #[error("element {element} refers to unknown node {node}")]
    UnknownNode { element: u64, node: u64 },
    #[error("the tags of {0} nodes are not unique")]
    DuplicateNodeTags(usize),
    #[error("{0} nodes is more than a kernel can index")]
    TooManyNodes(usize),
}

/// A sub-region of the model: a point, curve, surface or volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub dimension: u8,
    pub tag: i32,
    pub physical_tags: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: u64,
    element_type: ElementType,
    entity: (u8, i32),
    nodes: Vec<u32>,
}

impl Element {
    /// Checks the node count against the type.
    pub fn new(
        tag: u64,
        element_type: ElementType,
        entity: (u8, i32),
        nodes: Vec<u32>,
    ) -> Result<Self, MeshImportError> {
        if nodes.len() != element_type.node_count() {
            return Err(MeshImportError::ElementSize {
                element: tag,
                expected: element_type.node_count(),
                found: nodes.len(),
            });
        }
        Ok(Element {
            tag,
            element_type,
            entity,
            nodes,
        })
    }

    /// The Gmsh element tag.
    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// `(dimension, tag)` of the owning entity.
    pub fn entity(&self) -> (u8, i32) {
        self.entity
    }

    /// Dense node indices, in the order of the element type's node numbering.
    pub fn nodes(&self) -> &[u32] {
        &self.nodes
    }
}

impl AsRef<[u32]> for Element {
    fn as_ref(&self) -> &[u32] {
        &self.nodes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    nodes: Vec<[f32; 4]>,
    node_tags: Vec<u64>,
    entities: Vec<Entity>,
    elements: Vec<Element>,
}

impl Mesh {
    pub fn import(path: impl AsRef<Path>) -> Result<Self, MeshImportError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| MeshImportError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mesh = Self::from_reader(BufReader::new(file))?;
        logwise::info_sync!(
            "imported {path}: {nodes} nodes, {elements} elements",
            path = LogIt(path),
            nodes = mesh.node_count(),
            elements = mesh.elements.len()
        );
        Ok(mesh)
    }

    /// Reads a whole MSH file, ASCII or binary, from `reader`.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, MeshImportError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MeshImportError> {
        let raw = msh::parse(bytes)?;

        let mut nodes = raw.nodes;
        let declared = nodes.len();
        nodes.sort_unstable_by_key(|(tag, _)| *tag);
        if nodes.windows(2).any(|pair| pair[0].0 == pair[1].0) {
            return Err(MeshImportError::DuplicateNodeTags(declared));
        }
        if i32::try_from(nodes.len()).is_err() {
            return Err(MeshImportError::TooManyNodes(nodes.len()));
        }
        let node_tags: Vec<u64> = nodes.iter().map(|(tag, _)| *tag).collect();

        let mut elements = Vec::with_capacity(raw.elements.len());
        for element in raw.elements {
            let element_type = ElementType::from_code(element.code).ok_or(
                MeshImportError::UnknownElementType { code: element.code },
            )?;
            let mut indices = Vec::with_capacity(element.nodes.len());
            for node in &element.nodes {
                //sorted and below i32::MAX, so the index fits
                let index = node_tags.binary_search(node).map_err(|_| {
                    MeshImportError::UnknownNode {
                        element: element.tag,
                        node: *node,
                    }
                })?;
                indices.push(index as u32);
            }
            elements.push(Element::new(
                element.tag,
                element_type,
                element.entity,
                indices,
            )?);
        }

        Ok(Mesh {
            node_tags,
            nodes: nodes
                .iter()
                .map(|(_, [x, y, z])| [*x as f32, *y as f32, *z as f32, 1.0])
                .collect(),
            entities: raw.entities,
            elements,
        })
    }

    /**
    A mesh from already-dense data.  Node `i` gets tag `i + 1`.

    Fails with [`MeshImportError::UnknownNode`] if an element refers past the end of `nodes`.
    */
    pub fn from_parts(nodes: Vec<[f32; 4]>, elements: Vec<Element>) -> Result<Self, MeshImportError> {
        if i32::try_from(nodes.len()).is_err() {
            return Err(MeshImportError::TooManyNodes(nodes.len()));
        }
        for element in &elements {
            if let Some(node) = element.nodes.iter().find(|n| **n as usize >= nodes.len()) {
                return Err(MeshImportError::UnknownNode {
                    element: element.tag,
                    node: *node as u64,
                });
            }
        }
        Ok(Mesh {
            node_tags: (1..=nodes.len() as u64).collect(),
            nodes,
            entities: Vec::new(),
            elements,
        })
    }

    /// Homogeneous coordinates `(x, y, z, 1)`, in dense order.
    pub fn nodes(&self) -> &[[f32; 4]] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The file's tag of each dense node index; ascending.
    pub fn node_tags(&self) -> &[u64] {
        &self.node_tags
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn elements_of_dimension(&self, dimension: u8) -> impl Iterator<Item = &Element> {
        self.elements
            .iter()
            .filter(move |e| e.element_type.dimension() == dimension)
    }

    /// Neighbor sets across all elements, whatever their dimension.
    pub fn adjacency(&self) -> Adjacency {
        Adjacency::from_elements(self.node_count(), &self.elements)
    }

    /// The node coordinates as an array labelled `nodes`.
    pub fn node_array(&self, context: &Context, visibility: Visibility) -> Float4Array {
        Float4Array::from_vec(context, self.nodes.clone(), visibility, "nodes")
    }
}

impl FromStr for Mesh {
    type Err = MeshImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}
