// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Gmsh MSH 4.1 files through [`mshio`].

`mshio` does the parsing, ASCII or binary.  This module turns its parse tree into tagged nodes
and elements, and its error backtrace into a [`MeshImportError`].  Renumbering happens in
[`Mesh`](super::Mesh).

`mshio` keeps node tags only when they are sparse.  When the declared tag range is exactly as
large as the node count, the tags are read back as consecutive from the minimum tag, in file
order.
*/

use super::{Entity, MeshImportError};
use mshio::error::MshParserErrorKind;
use mshio::{MshFile, MshParserError};
use std::collections::BTreeSet;

#[derive(Debug)]
pub(super) struct RawElement {
    pub(super) tag: u64,
    pub(super) code: u32,
    pub(super) entity: (u8, i32),
    pub(super) nodes: Vec<u64>,
}

#[derive(Debug, Default)]
pub(super) struct RawMesh {
    pub(super) entities: Vec<Entity>,
    pub(super) nodes: Vec<(u64, [f64; 3])>,
    pub(super) elements: Vec<RawElement>,
}

const KNOWN_SECTIONS: &[&[u8]] = &[b"MeshFormat", b"Entities", b"Nodes", b"Elements"];

fn dimension(value: i32) -> Result<u8, MeshImportError> {
    u8::try_from(value)
        .ok()
        .filter(|d| *d <= 3)
        .ok_or(MeshImportError::Dimension(value))
}

/// Byte offset of `rest` inside `bytes`, for slices borrowed from it.
fn offset_of(bytes: &[u8], rest: &[u8]) -> usize {
    (rest.as_ptr() as usize)
        .saturating_sub(bytes.as_ptr() as usize)
        .min(bytes.len())
}

/// 1-based line of the first token at or after `rest`.
fn line_of(bytes: &[u8], rest: &[u8]) -> usize {
    let offset = offset_of(bytes, rest.trim_ascii_start());
    bytes[..offset].iter().filter(|b| **b == b'\n').count() + 1
}

fn first_token(rest: &[u8]) -> String {
    let token = rest
        .trim_ascii_start()
        .split(|b| b.is_ascii_whitespace())
        .next()
        .unwrap_or_default();
    String::from_utf8_lossy(token).into_owned()
}

fn import_error(bytes: &[u8], error: &MshParserError<&[u8]>) -> MeshImportError {
    let line = error
        .backtrace
        .first()
        .map(|(rest, _)| line_of(bytes, rest))
        .unwrap_or(0);
    let Some((rest, kind)) = error.begin_msh_errors().next() else {
        return MeshImportError::Syntax {
            line,
            message: "unreadable mesh file".to_string(),
        };
    };
    //innermost first: "what went wrong, in what, in what"
    let message = error
        .filter_msh_errors()
        .map(|(_, kind)| kind.to_string())
        .collect::<Vec<_>>()
        .join(", in ");
    match kind {
        MshParserErrorKind::UnsupportedMshVersion => {
            MeshImportError::UnsupportedVersion(first_token(rest))
        }
        MshParserErrorKind::UnknownElement => match first_token(rest).parse() {
            Ok(code) => MeshImportError::UnknownElementType { code },
            Err(_) => MeshImportError::Syntax { line, message },
        },
        MshParserErrorKind::Unimplemented => MeshImportError::Unsupported(message),
        _ => MeshImportError::Syntax { line, message },
    }
}

fn warn_unknown_sections(bytes: &[u8]) {
    for line in bytes.split(|b| *b == b'\n') {
        let Some(name) = line.trim_ascii().strip_prefix(b"$") else {
            continue;
        };
        if name.starts_with(b"End") || KNOWN_SECTIONS.contains(&name) {
            continue;
        }
        logwise::warn_sync!(
            "skipping mesh section ${name}",
            name = logwise::privacy::LogIt(&String::from_utf8_lossy(name))
        );
    }
}

fn convert_entities(file: &MshFile<u64, i32, f64>) -> Vec<Entity> {
    let Some(entities) = &file.data.entities else {
        return Vec::new();
    };
    let points = entities.points.iter().map(|p| (0, p.tag, &p.physical_tags));
    let curves = entities.curves.iter().map(|c| (1, c.tag, &c.physical_tags));
    let surfaces = entities.surfaces.iter().map(|s| (2, s.tag, &s.physical_tags));
    let volumes = entities.volumes.iter().map(|v| (3, v.tag, &v.physical_tags));
    points
        .chain(curves)
        .chain(surfaces)
        .chain(volumes)
        .map(|(dimension, tag, physical_tags)| Entity {
            dimension,
            tag,
            physical_tags: physical_tags.clone(),
        })
        .collect()
}

fn convert_nodes(
    file: &MshFile<u64, i32, f64>,
    out: &mut RawMesh,
) -> Result<(), MeshImportError> {
    let nodes = file
        .data
        .nodes
        .as_ref()
        .ok_or(MeshImportError::MissingSection("Nodes"))?;
    let declared = nodes.num_nodes as usize;
    let found: usize = nodes.node_blocks.iter().map(|b| b.nodes.len()).sum();
    if found != declared {
        return Err(MeshImportError::NodeCountMismatch { declared, found });
    }

    let mut next_tag = nodes.min_node_tag;
    for block in &nodes.node_blocks {
        dimension(block.entity_dim)?;
        let coordinates = block.nodes.iter().map(|n| [n.x, n.y, n.z]);
        match &block.node_tags {
            Some(tags) => {
                //a repeated tag overwrites its earlier index
                if tags.len() != block.nodes.len() {
                    return Err(MeshImportError::DuplicateNodeTags(declared));
                }
                let mut by_index = vec![0; block.nodes.len()];
                for (tag, index) in tags {
                    by_index[*index] = *tag;
                }
                out.nodes.extend(by_index.into_iter().zip(coordinates));
            }
            None => {
                let range = nodes.max_node_tag - nodes.min_node_tag + 1;
                if range < nodes.num_nodes {
                    return Err(MeshImportError::DuplicateNodeTags(declared));
                }
                let count = block.nodes.len() as u64;
                out.nodes.extend((next_tag..next_tag + count).zip(coordinates));
                next_tag += count;
            }
        }
    }
    Ok(())
}

fn convert_elements(
    file: &MshFile<u64, i32, f64>,
    out: &mut RawMesh,
) -> Result<(), MeshImportError> {
    let Some(elements) = &file.data.elements else {
        return Ok(());
    };
    let declared = elements.num_elements as usize;
    let found: usize = elements.element_blocks.iter().map(|b| b.elements.len()).sum();
    if found != declared {
        return Err(MeshImportError::ElementCountMismatch { declared, found });
    }
    for block in &elements.element_blocks {
        let entity = (dimension(block.entity_dim)?, block.entity_tag);
        let code = block.element_type as u32;
        out.elements
            .extend(block.elements.iter().map(|element| RawElement {
                tag: element.element_tag,
                code,
                entity,
                nodes: element.nodes.clone(),
            }));
    }
    Ok(())
}

/// Entities implied by element blocks, for files without `$Entities`.
fn implied_entities(mesh: &RawMesh) -> Vec<Entity> {
    let seen: BTreeSet<(u8, i32)> = mesh.elements.iter().map(|e| e.entity).collect();
    seen.into_iter()
        .map(|(dimension, tag)| Entity {
            dimension,
            tag,
            physical_tags: Vec::new(),
        })
        .collect()
}

pub(super) fn parse(bytes: &[u8]) -> Result<RawMesh, MeshImportError> {
    let body = bytes.trim_ascii_start();
    if !body.starts_with(b"$MeshFormat") {
        return Err(MeshImportError::MissingSection("MeshFormat"));
    }
    let file = mshio::parse_msh_bytes(body).map_err(|e| import_error(bytes, &e))?;
    if file.header.file_type == 0 {
        warn_unknown_sections(body);
    }

    let mut mesh = RawMesh::default();
    convert_nodes(&file, &mut mesh)?;
    convert_elements(&file, &mut mesh)?;
    mesh.entities = match file.data.entities {
        Some(_) => convert_entities(&file),
        None => implied_entities(&mesh),
    };
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "$MeshFormat\n4.1 0 8\n$EndMeshFormat\n";

    #[test]
    fn dense_tags_follow_file_order() {
        let text = format!("{HEADER}$Nodes\n2 3 4 6\n0 1 0 1\n4\n0 0 0\n1 2 0 2\n5\n6\n1 0 0\n2 0 0\n$EndNodes\n");
        let mesh = parse(text.as_bytes()).unwrap();
        let tags: Vec<u64> = mesh.nodes.iter().map(|(tag, _)| *tag).collect();
        assert_eq!(tags, vec![4, 5, 6]);
        assert_eq!(mesh.nodes[2].1, [2.0, 0.0, 0.0]);
        assert!(mesh.entities.is_empty());
    }

    #[test]
    fn sparse_tags_keep_their_order() {
        let text = format!("{HEADER}$Nodes\n1 3 2 30\n0 1 0 3\n30\n2\n11\n3 3 3\n2 2 2\n1 1 1\n$EndNodes\n");
        let mesh = parse(text.as_bytes()).unwrap();
        assert_eq!(
            mesh.nodes,
            vec![
                (30, [3.0, 3.0, 3.0]),
                (2, [2.0, 2.0, 2.0]),
                (11, [1.0, 1.0, 1.0])
            ]
        );
    }

    #[test]
    fn unterminated_section() {
        let err = parse("$MeshFormat\n4.1 0 8\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MeshImportError::Syntax { .. }), "{err:?}");
    }

    #[test]
    fn syntax_errors_carry_line_numbers() {
        let text = format!("{HEADER}$Nodes\n1 1 1 1\n0 1 0 1\n1\n0 zero 0\n$EndNodes\n");
        match parse(text.as_bytes()).unwrap_err() {
            MeshImportError::Syntax { line, message } => {
                assert_eq!(line, 8, "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn leading_blank_lines_are_allowed() {
        let text = format!("\n\n{HEADER}$Nodes\n1 1 1 1\n0 1 0 1\n1\n0 0 0\n$EndNodes\n");
        assert_eq!(parse(text.as_bytes()).unwrap().nodes.len(), 1);
    }

    #[test]
    fn later_versions_are_rejected() {
        for version in ["4.0", "4.2", "2.2"] {
            let text = format!("$MeshFormat\n{version} 0 8\n$EndMeshFormat\n");
            match parse(text.as_bytes()).unwrap_err() {
                MeshImportError::UnsupportedVersion(found) => assert_eq!(found, version),
                other => panic!("{version}: unexpected {other:?}"),
            }
        }
    }
}
