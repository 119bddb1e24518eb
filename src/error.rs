// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Error types.
//!
//! Each fallible step has its own error so callers can match on exactly what went wrong;
//! [`Error`] wraps all of them for code that only wants to propagate.

use crate::array::Owner;
use crate::imp;
use crate::mesh::MeshImportError;
use std::path::PathBuf;

/// A GPU buffer could not be created, or an operation needed one that does not exist yet.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GpuAllocationError {
    #[error("array {label} has no GPU buffer yet; bind it to a kernel first")]
    Unallocated { label: String },
    #[error("can't allocate {bytes} bytes for array {label}: {source}")]
    Backend {
        label: String,
        bytes: usize,
        #[source]
        source: imp::Error,
    },
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum KernelBindError {
    #[error("kernel has not been built")]
    NotBuilt,
    #[error("kernel has already been built")]
    AlreadyBuilt,
    #[error("can't create kernel {entry_point}: {source}")]
    Create {
        entry_point: String,
        #[source]
        source: imp::Error,
    },
    #[error("can't set kernel argument {slot}: {source}")]
    Argument {
        slot: u32,
        #[source]
        source: imp::Error,
    },
}

/// An array was used at a slot other than the one it was allocated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("array is laid out at slot {expected} but was used at slot {found}")]
pub struct LayoutMismatchError {
    pub expected: u32,
    pub found: u32,
}

/// A kernel program failed to compile.  `log` is the complete build log.
#[derive(Debug, Clone, thiserror::Error)]
#[error("kernel program failed to build:\n{log}")]
pub struct CompileError {
    pub log: String,
}

/// Acquire while compute already owns the array, or release while render does.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("array {label} at slot {slot} is already owned by {owner}")]
pub struct OwnershipError {
    pub label: String,
    pub slot: u32,
    pub owner: Owner,
}

/// A read, write, acquire or release failed in the backend.
#[derive(Debug, thiserror::Error)]
#[error("{operation} of array {label} failed: {source}")]
pub struct TransferError {
    pub operation: &'static str,
    pub label: String,
    #[source]
    pub source: imp::Error,
}

#[derive(Debug, thiserror::Error)]
#[error("kernel dispatch failed: {source}")]
pub struct DispatchError {
    #[source]
    pub source: imp::Error,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Can't allocate {0}")]
    Allocation(#[from] GpuAllocationError),
    #[error("Can't bind {0}")]
    Bind(#[from] KernelBindError),
    #[error("Wrong layout {0}")]
    Layout(#[from] LayoutMismatchError),
    #[error("Can't compile {0}")]
    Compile(#[from] CompileError),
    #[error("Wrong owner {0}")]
    Ownership(#[from] OwnershipError),
    #[error("Can't transfer {0}")]
    Transfer(#[from] TransferError),
    #[error("Can't dispatch {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Can't import mesh {0}")]
    MeshImport(#[from] MeshImportError),
    #[error("Can't read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Adjacency covers {adjacency} nodes but the mesh has {mesh}")]
    NodeCountMismatch { mesh: usize, adjacency: usize },
    #[error("Index {value} does not fit in a 32-bit kernel argument")]
    IndexOverflow { value: usize },
    #[error("Implementation error {0}")]
    Backend(#[from] imp::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_slots() {
        let e: Error = LayoutMismatchError {
            expected: 0,
            found: 2,
        }
        .into();
        assert_eq!(
            e.to_string(),
            "Wrong layout array is laid out at slot 0 but was used at slot 2"
        );
        let e = OwnershipError {
            label: "velocity".to_string(),
            slot: 1,
            owner: Owner::Compute,
        };
        assert_eq!(
            e.to_string(),
            "array velocity at slot 1 is already owned by compute"
        );
    }

    #[test]
    fn compile_error_keeps_log() {
        let e: Error = CompileError {
            log: "line 3: error: bad".to_string(),
        }
        .into();
        assert!(e.to_string().ends_with("line 3: error: bad"));
    }
}
