// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Gmsh import and node adjacency.

use neutrino::mesh::adjacency::Adjacency;
use neutrino::mesh::element_type::ElementType;
use neutrino::mesh::{Element, Entity, Mesh, MeshImportError};
use neutrino::{Context, Visibility};
use std::collections::BTreeSet;

/// A unit square split into two triangles, with a boundary curve and a stray point.
const SQUARE: &str = "$MeshFormat
4.1 0 8
$EndMeshFormat
$PhysicalNames
1
2 1 \"plate\"
$EndPhysicalNames
$Entities
1 1 1 0
1 2 2 0 0
1 0 0 0 1 0 0 0 2 1 -1
1 0 0 0 1 1 0 1 1 1 1
$EndEntities
$Nodes
2 5 10 50
1 1 0 2
10
20
0 0 0
1 0 0
2 1 0 3
40
30
50
1 1 0
0 1 0
3 3 3
$EndNodes
$Elements
2 3 1 3
1 1 1 1
1 10 20
2 1 2 2
2 10 20 40
3 20 40 30
$EndElements
";

fn brute_force_neighbors(node_count: usize, elements: &[Vec<u32>]) -> Vec<BTreeSet<u32>> {
    let mut out = vec![BTreeSet::new(); node_count];
    for element in elements {
        for &a in element {
            for &b in element {
                if a != b {
                    out[a as usize].insert(b);
                }
            }
        }
    }
    out
}

fn triangle(tag: u64, nodes: [u32; 3]) -> Element {
    Element::new(tag, ElementType::from_code(2).unwrap(), (2, 1), nodes.to_vec()).unwrap()
}

#[test]
fn two_triangles_sharing_an_edge() {
    let nodes = vec![[0.0, 0.0, 0.0, 1.0]; 4];
    let mesh = Mesh::from_parts(nodes, vec![triangle(1, [0, 1, 2]), triangle(2, [1, 2, 3])])
        .unwrap();
    let adjacency = mesh.adjacency();
    assert_eq!(adjacency.neighbors(0), &[1, 2]);
    assert_eq!(adjacency.neighbors(1), &[0, 2, 3]);
    assert_eq!(adjacency.neighbors(2), &[0, 1, 3]);
    assert_eq!(adjacency.neighbors(3), &[1, 2]);
}

#[test]
fn node_in_no_element_has_no_neighbors() {
    let nodes = vec![[0.0, 0.0, 0.0, 1.0]; 5];
    let mesh = Mesh::from_parts(nodes, vec![triangle(1, [0, 1, 2])]).unwrap();
    let adjacency = mesh.adjacency();
    assert!(adjacency.neighbors(3).is_empty());
    assert!(adjacency.neighbors(4).is_empty());
    assert_eq!(adjacency.node_count(), 5);
}

#[test]
fn sparse_tags_are_renumbered_by_rank() {
    let text = "$MeshFormat
4.1 0 8
$EndMeshFormat
$Nodes
1 3 3 17
0 1 0 3
5
17
3
5 5 5
17 17 17
3 3 3
$EndNodes
";
    let mesh: Mesh = text.parse().unwrap();
    assert_eq!(mesh.node_tags(), &[3, 5, 17]);
    assert_eq!(
        mesh.nodes(),
        &[
            [3.0, 3.0, 3.0, 1.0],
            [5.0, 5.0, 5.0, 1.0],
            [17.0, 17.0, 17.0, 1.0]
        ]
    );
}

#[test]
fn square_imports_with_entities_and_sections_skipped() {
    let mesh: Mesh = SQUARE.parse().unwrap();
    assert_eq!(mesh.node_tags(), &[10, 20, 30, 40, 50]);
    assert_eq!(mesh.nodes()[3], [1.0, 1.0, 0.0, 1.0]);
    assert_eq!(
        mesh.entities(),
        &[
            Entity {
                dimension: 0,
                tag: 1,
                physical_tags: vec![]
            },
            Entity {
                dimension: 1,
                tag: 1,
                physical_tags: vec![]
            },
            Entity {
                dimension: 2,
                tag: 1,
                physical_tags: vec![1]
            },
        ]
    );
    assert_eq!(mesh.elements().len(), 3);
    let triangles: Vec<&[u32]> = mesh.elements_of_dimension(2).map(|e| e.nodes()).collect();
    assert_eq!(triangles, vec![&[0u32, 1, 3][..], &[1, 3, 2][..]]);
    assert_eq!(mesh.elements()[0].element_type().name(), "line");
    assert_eq!(mesh.elements()[2].tag(), 3);
    assert_eq!(mesh.elements()[2].entity(), (2, 1));

    let adjacency = mesh.adjacency();
    assert_eq!(adjacency.neighbors(0), &[1, 3]);
    assert_eq!(adjacency.neighbors(3), &[0, 1, 2]);
    assert!(adjacency.neighbors(4).is_empty());
}

#[test]
fn adjacency_properties_hold_on_the_square() {
    let mesh: Mesh = SQUARE.parse().unwrap();
    let adjacency = mesh.adjacency();
    let elements: Vec<Vec<u32>> = mesh.elements().iter().map(|e| e.nodes().to_vec()).collect();
    let expected = brute_force_neighbors(mesh.node_count(), &elements);

    for (node, neighbors) in adjacency.iter() {
        assert!(!neighbors.contains(&(node as u32)), "node {node} is its own neighbor");
        assert!(neighbors.windows(2).all(|w| w[0] < w[1]), "node {node} not strictly ascending");
        for &other in neighbors {
            assert!(adjacency.neighbors(other as usize).contains(&(node as u32)));
        }
        let found: BTreeSet<u32> = neighbors.iter().copied().collect();
        assert_eq!(found, expected[node]);
    }
}

#[test]
fn adjacency_matches_brute_force_on_a_grid() {
    //quads on a 6x5 grid with every other cell split into triangles
    let width = 6u32;
    let height = 5u32;
    let at = |x: u32, y: u32| y * width + x;
    let mut elements = Vec::new();
    for y in 0..height - 1 {
        for x in 0..width - 1 {
            let corners = [at(x, y), at(x + 1, y), at(x + 1, y + 1), at(x, y + 1)];
            if (x + y) % 2 == 0 {
                elements.push(corners.to_vec());
            } else {
                elements.push(vec![corners[0], corners[1], corners[2]]);
                elements.push(vec![corners[0], corners[2], corners[3]]);
            }
        }
    }
    let node_count = (width * height) as usize;
    let adjacency = Adjacency::from_elements(node_count, &elements);
    let expected = brute_force_neighbors(node_count, &elements);
    for node in 0..node_count {
        let expected: Vec<u32> = expected[node].iter().copied().collect();
        assert_eq!(adjacency.neighbors(node), expected.as_slice());
    }
    assert_eq!(adjacency.offsets().len(), node_count + 1);
    assert_eq!(*adjacency.offsets().last().unwrap() as usize, adjacency.len());
}

#[test]
fn arrays_upload_through_a_context() {
    let mesh: Mesh = SQUARE.parse().unwrap();
    let context = Context::host();
    let nodes = mesh.node_array(&context, Visibility::Render);
    assert_eq!(nodes.len(), 5);
    assert_eq!(nodes.label(), "nodes");
    let (offsets, indices) = mesh.adjacency().to_arrays(&context).unwrap();
    assert_eq!(offsets.as_slice(), &[0, 2, 5, 7, 10, 10]);
    assert_eq!(indices.len(), 10);
    assert_eq!(context.array_count(), 3);
}

#[test]
fn import_reads_files() {
    let path = std::env::temp_dir().join(format!("neutrino-square-{}.msh", std::process::id()));
    std::fs::write(&path, SQUARE).unwrap();
    let mesh = Mesh::import(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(mesh.node_count(), 5);

    assert!(matches!(
        Mesh::import("/nonexistent/neutrino.msh"),
        Err(MeshImportError::Open { .. })
    ));
}

fn with_elements(block: &str) -> String {
    format!(
        "$MeshFormat\n4.1 0 8\n$EndMeshFormat\n$Nodes\n1 3 1 3\n2 1 0 3\n1\n2\n3\n0 0 0\n1 0 0\n0 1 0\n$EndNodes\n$Elements\n{block}$EndElements\n"
    )
}

#[test]
fn malformed_files_are_reported() {
    let err = |text: &str| text.parse::<Mesh>().unwrap_err();

    assert!(matches!(
        err("$MeshFormat\n2.2 0 8\n$EndMeshFormat\n"),
        MeshImportError::UnsupportedVersion(v) if v == "2.2"
    ));
    assert!(matches!(
        err("$MeshFormat\n4.0 0 8\n$EndMeshFormat\n$Nodes\n1 1 1 1\n0 1 0 1\n1\n0 0 0\n$EndNodes\n"),
        MeshImportError::UnsupportedVersion(v) if v == "4.0"
    ));
    assert!(matches!(
        err("$Nodes\n0 0 0 0\n$EndNodes\n"),
        MeshImportError::MissingSection("MeshFormat")
    ));
    assert!(matches!(
        err("$MeshFormat\n4.1 0 8\n$EndMeshFormat\n"),
        MeshImportError::MissingSection("Nodes")
    ));
    assert!(matches!(
        err(&with_elements("1 1 1 1\n2 1 200 1\n1 1 2 3\n")),
        MeshImportError::UnknownElementType { code: 200 }
    ));
    //a 22-node tetrahedron: readable, but not a type meshes are built from
    assert!(matches!(
        err(&with_elements(&format!("1 1 1 1\n3 1 32 1\n1{}\n", " 1".repeat(22)))),
        MeshImportError::UnknownElementType { code: 32 }
    ));
    assert!(matches!(
        err(&with_elements("1 1 1 1\n2 1 2 1\n1 1 2\n")),
        MeshImportError::Syntax { .. }
    ));
    assert!(matches!(
        err(&with_elements("1 1 1 1\n2 1 2 1\n1 1 2 4\n")),
        MeshImportError::UnknownNode {
            element: 1,
            node: 4
        }
    ));
    assert!(matches!(
        err(&with_elements("1 2 1 2\n2 1 2 1\n1 1 2 3\n")),
        MeshImportError::ElementCountMismatch {
            declared: 2,
            found: 1
        }
    ));
    assert!(matches!(
        err(&with_elements("1 1 1 1\n7 1 2 1\n1 1 2 3\n")),
        MeshImportError::Dimension(7)
    ));
    assert!(matches!(
        err("$MeshFormat\n4.1 0 8\n$EndMeshFormat\n$Nodes\n1 3 1 2\n0 1 0 2\n1\n2\n0 0 0\n1 1 1\n$EndNodes\n"),
        MeshImportError::NodeCountMismatch {
            declared: 3,
            found: 2
        }
    ));
    assert!(matches!(
        err("$MeshFormat\n4.1 0 8\n$EndMeshFormat\n$Nodes\n1 2 1 1\n0 1 0 2\n1\n1\n0 0 0\n1 1 1\n$EndNodes\n"),
        MeshImportError::DuplicateNodeTags(2)
    ));
    assert!(matches!(
        err("$MeshFormat\n4.1 0 8\n$EndMeshFormat\n$Nodes\n1 3 1 9\n0 1 0 3\n1\n9\n1\n0 0 0\n1 1 1\n2 2 2\n$EndNodes\n"),
        MeshImportError::DuplicateNodeTags(3)
    ));
    assert!(matches!(
        err("$MeshFormat\n4.1 0 8\n"),
        MeshImportError::Syntax { .. }
    ));
}

#[test]
fn element_size_is_checked_on_construction() {
    let result = Element::new(4, ElementType::from_code(4).unwrap(), (3, 1), vec![0, 1, 2]);
    assert!(matches!(
        result,
        Err(MeshImportError::ElementSize {
            element: 4,
            expected: 4,
            found: 3
        })
    ));
}

#[test]
fn from_parts_rejects_out_of_range_nodes() {
    let result = Mesh::from_parts(vec![[0.0; 4]; 2], vec![triangle(7, [0, 1, 2])]);
    assert!(matches!(
        result,
        Err(MeshImportError::UnknownNode {
            element: 7,
            node: 2
        })
    ));
}
