// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Declares who, besides kernels, will look at an array's GPU buffer.
//!
//! Every [`GpuArray`](crate::GpuArray) is visible to compute kernels.  Some of them are also
//! drawn: node positions, colors, and the like.  Declaring that up front lets the backend create
//! a single buffer usable both as a kernel argument and as a vertex buffer, instead of copying
//! kernel output into a separate vertex buffer each frame.
//!
//! # Examples
//!
//! ```
//! use neutrino::Visibility;
//!
//! // positions are computed by a kernel and drawn as points
//! let positions = Visibility::Render;
//!
//! // per-node scratch state only ever touched by kernels
//! let scratch = Visibility::ComputeOnly;
//! assert!(positions.is_render_shared());
//! assert!(!scratch.is_render_shared());
//! ```

/// Describes whether an array's buffer is shared with the render side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// The buffer doubles as a vertex buffer.
    ///
    /// Such buffers take part in the acquire/release handoff: kernels may only touch them while
    /// they are acquired, and the vertex attribute at the array's layout index is only enabled
    /// while they are released.
    Render,

    /// The buffer is a plain compute buffer.
    ///
    /// Acquire and release still track ownership so that misuse is caught the same way, but
    /// nothing is handed to the render side.
    ComputeOnly,
}

impl Visibility {
    pub const fn is_render_shared(self) -> bool {
        matches!(self, Visibility::Render)
    }
}
