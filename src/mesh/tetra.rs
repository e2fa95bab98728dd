//! Element records: tetrahedra, boundary triangles and edges.

use bytemuck::Zeroable;

/// Local vertex indices of face `i` of a tetrahedron (the face opposite
/// vertex `i`), oriented outward.
pub const IDIR: [[usize; 3]; 4] = [[1, 2, 3], [0, 3, 2], [0, 1, 3], [0, 2, 1]];

/// Tetrahedron: four 1-based vertex indices, `0` = null vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Zeroable)]
#[repr(C)]
pub struct Tetra {
    pub v: [usize; 4],
    pub qual: f64,
    pub reference: i32,
    pub tag: u16,
}

impl Tetra {
    pub fn new(v: [usize; 4]) -> Self {
        Self {
            v,
            ..Self::default()
        }
    }

    /// A slot whose first vertex is null is free.
    #[inline]
    pub fn is_used(&self) -> bool {
        self.v[0] != 0
    }

    /// Number of vertex references set to the null vertex.
    #[inline]
    pub fn null_vertices(&self) -> usize {
        self.v.iter().filter(|&&v| v == 0).count()
    }

    /// Vertex indices of face `i`.
    #[inline]
    pub fn face(&self, i: usize) -> [usize; 3] {
        let [a, b, c] = IDIR[i];
        [self.v[a], self.v[b], self.v[c]]
    }
}

/// Boundary triangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Zeroable)]
#[repr(C)]
pub struct Tria {
    pub v: [usize; 3],
    pub reference: i32,
    pub tag: u16,
}

/// Boundary edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Zeroable)]
#[repr(C)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    pub reference: i32,
    pub tag: u16,
}
