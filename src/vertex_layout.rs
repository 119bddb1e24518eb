// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Vertex attribute descriptions for render-shared arrays.
//!
//! When an array with [`Visibility::Render`](crate::Visibility::Render) is released, its buffer
//! becomes the vertex attribute at the array's layout index again.  This module describes that
//! attribute in a backend-independent way: which shader location, what scalar type, how many
//! components, and how far apart consecutive elements are.
//!
//! # Example
//!
//! ```
//! use neutrino::vertex_layout::{VertexAttribute, VertexFieldType};
//!
//! // float4 positions at shader location 0
//! let attribute = VertexAttribute::of::<[f32; 4]>(0);
//! assert_eq!(attribute.field_type, VertexFieldType::F32);
//! assert_eq!(attribute.components, 4);
//! assert_eq!(attribute.stride, 16);
//! ```

use crate::element::{Element, ScalarKind};

/// Specifies the scalar type of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum VertexFieldType {
    /// A 32-bit floating point value.
    F32,
    /// A 32-bit signed integer, passed to the shader without normalization.
    I32,
}

impl VertexFieldType {
    pub(crate) fn stride(&self) -> usize {
        match self {
            VertexFieldType::F32 => 4,
            VertexFieldType::I32 => 4,
        }
    }
}

impl From<ScalarKind> for VertexFieldType {
    fn from(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Int => VertexFieldType::I32,
            ScalarKind::Float => VertexFieldType::F32,
        }
    }
}

/// One vertex attribute, sourced from a whole buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// The shader location, which is the array's layout index.
    pub shader_location: u32,
    pub field_type: VertexFieldType,
    /// Components per vertex, 1 through 4.
    pub components: u8,
    /// Bytes between consecutive vertices.
    pub stride: u64,
    /// Byte offset of the first vertex.
    pub offset: u64,
}

impl VertexAttribute {
    /// The attribute for a tightly packed buffer of `T` at `shader_location`.
    pub fn of<T: Element>(shader_location: u32) -> Self {
        let field_type = VertexFieldType::from(T::KIND);
        VertexAttribute {
            shader_location,
            field_type,
            components: T::ARITY,
            stride: (field_type.stride() * T::ARITY as usize) as u64,
            offset: 0,
        }
    }

    /// The matching wgpu vertex format.
    #[cfg(feature = "backend_wgpu")]
    pub fn wgpu_format(&self) -> wgpu::VertexFormat {
        use wgpu::VertexFormat;
        match (self.field_type, self.components) {
            (VertexFieldType::F32, 1) => VertexFormat::Float32,
            (VertexFieldType::F32, 2) => VertexFormat::Float32x2,
            (VertexFieldType::F32, 3) => VertexFormat::Float32x3,
            (VertexFieldType::F32, _) => VertexFormat::Float32x4,
            (VertexFieldType::I32, 1) => VertexFormat::Sint32,
            (VertexFieldType::I32, 2) => VertexFormat::Sint32x2,
            (VertexFieldType::I32, 3) => VertexFormat::Sint32x3,
            (VertexFieldType::I32, _) => VertexFormat::Sint32x4,
        }
    }

    /// The matching wgpu attribute description.
    ///
    /// Use it together with [`stride`](Self::stride) to build a `wgpu::VertexBufferLayout`.
    #[cfg(feature = "backend_wgpu")]
    pub fn wgpu_attribute(&self) -> wgpu::VertexAttribute {
        wgpu::VertexAttribute {
            format: self.wgpu_format(),
            offset: self.offset,
            shader_location: self.shader_location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_for_int2() {
        let attribute = VertexAttribute::of::<[i32; 2]>(3);
        assert_eq!(attribute.shader_location, 3);
        assert_eq!(attribute.field_type, VertexFieldType::I32);
        assert_eq!(attribute.components, 2);
        assert_eq!(attribute.stride, 8);
        assert_eq!(attribute.offset, 0);
    }

    #[cfg(feature = "backend_wgpu")]
    #[test]
    fn wgpu_formats() {
        assert_eq!(
            VertexAttribute::of::<[f32; 3]>(0).wgpu_format(),
            wgpu::VertexFormat::Float32x3
        );
        assert_eq!(
            VertexAttribute::of::<i32>(0).wgpu_format(),
            wgpu::VertexFormat::Sint32
        );
    }
}
