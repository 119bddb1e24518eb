// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Gmsh element type codes.

use std::fmt::{Display, Formatter};

/// Shape and order of a mesh element, as identified by its Gmsh type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementType {
    code: u32,
    name: &'static str,
    node_count: usize,
    dimension: u8,
}

macro_rules! element_types {
    ($($code:literal => $name:literal, $nodes:literal, $dim:literal;)*) => {
        const TABLE: &[ElementType] = &[
            $(ElementType { code: $code, name: $name, node_count: $nodes, dimension: $dim },)*
        ];
    };
}

element_types! {
    1 => "line", 2, 1;
    2 => "triangle", 3, 2;
    3 => "quadrangle", 4, 2;
    4 => "tetrahedron", 4, 3;
    5 => "hexahedron", 8, 3;
    6 => "prism", 6, 3;
    7 => "pyramid", 5, 3;
    8 => "line3", 3, 1;
    9 => "triangle6", 6, 2;
    10 => "quadrangle9", 9, 2;
    11 => "tetrahedron10", 10, 3;
    12 => "hexahedron27", 27, 3;
    13 => "prism18", 18, 3;
    14 => "pyramid14", 14, 3;
    15 => "point", 1, 0;
    16 => "quadrangle8", 8, 2;
    17 => "hexahedron20", 20, 3;
    18 => "prism15", 15, 3;
    19 => "pyramid13", 13, 3;
    20 => "triangle9", 9, 2;
    21 => "triangle10", 10, 2;
    22 => "triangle12", 12, 2;
    23 => "triangle15", 15, 2;
    24 => "triangle15i", 15, 2;
    25 => "triangle21", 21, 2;
    26 => "line4", 4, 1;
    27 => "line5", 5, 1;
    28 => "line6", 6, 1;
    29 => "tetrahedron20", 20, 3;
    30 => "tetrahedron35", 35, 3;
    31 => "tetrahedron56", 56, 3;
    36 => "quadrangle16", 16, 2;
    37 => "quadrangle25", 25, 2;
    38 => "quadrangle36", 36, 2;
    39 => "quadrangle12", 12, 2;
    40 => "quadrangle16i", 16, 2;
    41 => "quadrangle20", 20, 2;
    92 => "hexahedron64", 64, 3;
    93 => "hexahedron125", 125, 3;
}

impl ElementType {
    pub fn from_code(code: u32) -> Option<Self> {
        TABLE.iter().find(|t| t.code == code).copied()
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Topological dimension: 0 for points up to 3 for volumes.
    pub fn dimension(&self) -> u8 {
        self.dimension
    }

    /// Every known type.
    pub fn all() -> &'static [ElementType] {
        TABLE
    }
}

impl Display for ElementType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}
