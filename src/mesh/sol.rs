//! Solution fields (metric and auxiliary solutions) sized to a mesh.

use crate::memory::{Block, MemBudget, MemError};

/// Metric size tag of an isotropic field.
pub const SIZE_ISO: usize = 1;
/// Metric size tag of an anisotropic (symmetric 3x3) field.
pub const SIZE_ANISO: usize = 6;

/// A per-vertex field. Values are stored 1-based: `m[size*k .. size*(k+1)]`
/// belongs to vertex `k`, slot `0` is unused.
///
/// The storage is charged to the budget of the mesh the field is attached to.
/// A default field is isotropic and empty.
#[derive(Debug)]
pub struct Sol {
    /// Number of values per vertex.
    pub size: usize,
    /// Active number of vertices carrying a value.
    pub np: usize,
    /// Logical vertex count remembered across packing.
    pub npi: usize,
    pub npmax: usize,
    pub m: Block<f64>,
}

impl Default for Sol {
    fn default() -> Self {
        Self {
            size: SIZE_ISO,
            np: 0,
            npi: 0,
            npmax: 0,
            m: Block::unset(),
        }
    }
}

impl Sol {
    /// An empty field of the given per-vertex size.
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Allocate `np` vertex values of `size` components against `budget`,
    /// dropping any previous storage first.
    pub fn set_size(&mut self, budget: &mut MemBudget, size: usize, np: usize) -> Result<(), MemError> {
        budget.release(&mut self.m, "solution values");
        self.size = size;
        self.np = 0;
        self.npi = 0;
        self.npmax = 0;
        budget.callocate(&mut self.m, size * (np + 1), "solution values")?;
        self.np = np;
        self.npi = np;
        self.npmax = np;
        Ok(())
    }

    /// Drop the values and forget the vertex count.
    pub fn discard(&mut self, budget: &mut MemBudget) {
        budget.release(&mut self.m, "solution values");
        self.np = 0;
        self.npi = 0;
    }

    /// Values of vertex `k`.
    pub fn values(&self, k: usize) -> &[f64] {
        &self.m[self.size * k..self.size * (k + 1)]
    }

    pub fn values_mut(&mut self, k: usize) -> &mut [f64] {
        let size = self.size;
        &mut self.m[size * k..size * (k + 1)]
    }

    #[inline]
    pub fn sync_logical_counts(&mut self) {
        self.npi = self.np;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_field_is_isotropic_and_empty() {
        let met = Sol::default();
        assert_eq!(met.size, SIZE_ISO);
        assert_eq!(met.np, 0);
        assert!(!met.m.is_set());
    }

    #[test]
    fn set_size_charges_one_based_storage() {
        let mut budget = MemBudget::new(1 << 10);
        let mut met = Sol::default();
        met.set_size(&mut budget, SIZE_ANISO, 4).unwrap();
        assert_eq!(met.m.len(), 30);
        assert_eq!(budget.cur(), 30 * 8);

        met.values_mut(4).copy_from_slice(&[1.0; 6]);
        assert_eq!(met.values(4), &[1.0; 6]);

        met.discard(&mut budget);
        assert_eq!(budget.cur(), 0);
        assert_eq!(met.np, 0);
    }
}
