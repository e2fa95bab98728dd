//! Tetra-to-tetra face adjacency.
//!
//! The adjacency block is indexed by `4*(k-1) + 1 + i` for tetrahedron `k`
//! (1-based) and local face `i ∈ [0, 3]`. A stored value `4*kk + ii` means
//! face `i` of `k` is glued to face `ii` of `kk`; `0` means the face lies on
//! the boundary.
//!
//! Lookups outside `k ∈ [1, ne]`, `i ∈ [0, 3]` are programming errors and
//! panic.

use super::Mesh;

/// Position of `(element, face)` in the adjacency block.
#[inline]
pub fn adja_index(element: usize, face: usize) -> usize {
    4 * (element - 1) + 1 + face
}

/// Packed value stored for a neighbor `(element, face)`.
#[inline]
pub fn pack(element: usize, face: usize) -> usize {
    4 * element + face
}

/// Length of an adjacency block able to hold `nemax` tetrahedra.
#[inline]
pub fn block_len(nemax: usize) -> usize {
    4 * nemax + 5
}

impl Mesh {
    /// Raw packed adjacency value of face `face` of tetra `element`.
    pub fn adja_idx_of_face(&self, element: usize, face: usize) -> usize {
        assert!(face < 4, "there are only 4 faces per tetra");
        assert!(
            (1..=self.ne).contains(&element),
            "adja out of bound: tetra {element} of {}",
            self.ne
        );
        self.adja[adja_index(element, face)]
    }

    /// Neighbor tetra across `face` of `element` (0 on the boundary).
    #[inline]
    pub fn adja_tetra_to_face(&self, element: usize, face: usize) -> usize {
        self.adja_idx_of_face(element, face) / 4
    }

    /// Face of the neighbor tetra glued to `face` of `element`.
    #[inline]
    pub fn adja_face_to_face(&self, element: usize, face: usize) -> usize {
        self.adja_idx_of_face(element, face) % 4
    }

    /// `(neighbor, neighbor_face)` across `face` of `element`, `None` on the
    /// boundary.
    pub fn neighbor(&self, element: usize, face: usize) -> Option<(usize, usize)> {
        match self.adja_idx_of_face(element, face) {
            0 => None,
            packed => Some((packed / 4, packed % 4)),
        }
    }
}
