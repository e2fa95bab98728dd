//! Vertex records.
//!
//! Points are stored 1-based: slot `0` of a mesh's point block is never a
//! real vertex, so a vertex index of `0` always means "no vertex".

use bytemuck::Zeroable;

/// Tag bit marking a point slot as unused.
pub const TAG_NUL: u16 = 1 << 14;
/// Tag bit marking a point on the boundary surface.
pub const TAG_BDY: u16 = 1 << 4;

/// Mesh vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Zeroable)]
#[repr(C)]
pub struct Point {
    /// Coordinates.
    pub c: [f64; 3],
    /// Normal at boundary points (unused in the interior).
    pub n: [f64; 3],
    /// Index into the boundary-point block, 0 when the point is interior.
    pub xp: usize,
    /// Scratch field for kernel and packing routines.
    pub tmp: usize,
    /// Boundary reference.
    pub reference: i32,
    pub tag: u16,
}

impl Point {
    pub fn new(c: [f64; 3]) -> Self {
        Self {
            c,
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.tag & TAG_NUL == 0
    }
}

/// Extra geometric data for boundary points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Zeroable)]
#[repr(C)]
pub struct XPoint {
    pub n1: [f64; 3],
    pub n2: [f64; 3],
}
