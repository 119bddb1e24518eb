// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Element types that can be stored in a [`GpuArray`](crate::GpuArray).

An element is one to four 32-bit scalars of a single kind.  Kind and arity are
associated constants rather than separate array types, so `GpuArray<[f32; 4]>` and
`GpuArray<i32>` share all of their code.
*/

use std::fmt::Debug;

/// The scalar an element is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// 32-bit signed integer.
    Int,
    /// 32-bit IEEE float.
    Float,
}

impl ScalarKind {
    /// Size of one scalar in bytes.
    pub const fn size(self) -> usize {
        4
    }
}

/**
A value that can be uploaded to the GPU as-is.

# Safety

Implementors must be plain data made of exactly `ARITY` scalars of `KIND`, with no padding,
4-byte alignment, and no invalid bit patterns.  The crate reinterprets slices of elements as
bytes (and back) based on this promise.
*/
pub unsafe trait Element: Copy + Default + PartialEq + Debug + Send + Sync + 'static {
    const KIND: ScalarKind;
    /// Number of scalars, 1 through 4.
    const ARITY: u8;

    /// Size of one element in bytes.
    fn byte_size() -> usize {
        Self::KIND.size() * Self::ARITY as usize
    }
}

unsafe impl Element for i32 {
    const KIND: ScalarKind = ScalarKind::Int;
    const ARITY: u8 = 1;
}
unsafe impl Element for [i32; 2] {
    const KIND: ScalarKind = ScalarKind::Int;
    const ARITY: u8 = 2;
}
unsafe impl Element for [i32; 3] {
    const KIND: ScalarKind = ScalarKind::Int;
    const ARITY: u8 = 3;
}
unsafe impl Element for [i32; 4] {
    const KIND: ScalarKind = ScalarKind::Int;
    const ARITY: u8 = 4;
}
unsafe impl Element for f32 {
    const KIND: ScalarKind = ScalarKind::Float;
    const ARITY: u8 = 1;
}
unsafe impl Element for [f32; 2] {
    const KIND: ScalarKind = ScalarKind::Float;
    const ARITY: u8 = 2;
}
unsafe impl Element for [f32; 3] {
    const KIND: ScalarKind = ScalarKind::Float;
    const ARITY: u8 = 3;
}
unsafe impl Element for [f32; 4] {
    const KIND: ScalarKind = ScalarKind::Float;
    const ARITY: u8 = 4;
}

pub(crate) fn as_bytes<T: Element>(elements: &[T]) -> &[u8] {
    //safety: Element guarantees plain data without padding
    unsafe {
        std::slice::from_raw_parts(
            elements.as_ptr() as *const u8,
            std::mem::size_of_val(elements),
        )
    }
}

pub(crate) fn as_bytes_mut<T: Element>(elements: &mut [T]) -> &mut [u8] {
    //safety: Element guarantees every bit pattern is valid
    unsafe {
        std::slice::from_raw_parts_mut(
            elements.as_mut_ptr() as *mut u8,
            std::mem::size_of_val(elements),
        )
    }
}

/// Reinterprets 32-bit words as elements.  Trailing words that don't form a whole element are
/// ignored.
pub(crate) fn from_words<T: Element>(words: &[u32]) -> &[T] {
    let count = words.len() / T::ARITY as usize;
    //safety: u32 has the same size and alignment as every scalar, and Element has no padding
    unsafe { std::slice::from_raw_parts(words.as_ptr() as *const T, count) }
}

pub(crate) fn from_words_mut<T: Element>(words: &mut [u32]) -> &mut [T] {
    let count = words.len() / T::ARITY as usize;
    //safety: see from_words
    unsafe { std::slice::from_raw_parts_mut(words.as_mut_ptr() as *mut T, count) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_layout() {
        assert_eq!(<[f32; 4]>::byte_size(), std::mem::size_of::<[f32; 4]>());
        assert_eq!(<[i32; 3]>::byte_size(), 12);
        assert_eq!(i32::byte_size(), 4);
        assert_eq!(<[f32; 2] as Element>::KIND, ScalarKind::Float);
    }

    #[test]
    fn word_views() {
        let mut words = vec![0u32; 9];
        {
            let as_float3: &mut [[f32; 3]] = from_words_mut(&mut words);
            assert_eq!(as_float3.len(), 3);
            as_float3[1] = [1.0, 2.0, 3.0];
        }
        assert_eq!(words[3], 1.0f32.to_bits());
        let as_float4: &[[f32; 4]] = from_words(&words);
        assert_eq!(as_float4.len(), 2);
        assert_eq!(as_bytes(&[7i32, 8]).len(), 8);
    }
}
