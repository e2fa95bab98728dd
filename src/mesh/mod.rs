//! Tetrahedral mesh partitions and the fields attached to them.
//!
//! A [`Mesh`] owns its arrays through [`Block`]s charged to its own
//! [`MemBudget`]; the metric and auxiliary solutions of a [`Group`] are
//! charged to the same budget.
//!
//! Counts come in pairs: the *active* count (`np`, `ne`, `nt`, `na`) tracks the
//! entities currently in use, the *logical* count (`npi`, `nei`, `nti`, `nai`)
//! remembers the pre-adaptation size across packing. The pipeline
//! resynchronizes logical counts on exit.

pub mod adjacency;
pub mod group;
pub mod point;
pub mod sol;
pub mod tetra;

pub use group::Group;
pub use point::{Point, XPoint};
pub use sol::Sol;
pub use tetra::{Edge, Tetra, Tria};

use serde::{Deserialize, Serialize};

use crate::debug_invariants::DebugInvariants;
use crate::memory::{Block, MemBudget, MemError};
use crate::mesh_error::ParMeshError;

/// Per-mesh remeshing options checked by input validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshOptions {
    /// Lagrangian motion mode, `-1` when disabled.
    pub lag: i32,
    /// Level-set discretization.
    pub iso: bool,
    /// Optimization mode (keep edge lengths).
    pub optim: bool,
    /// Strong optimization for LES computations.
    pub optim_les: bool,
    /// Constant target size, disabled when `<= 0`.
    pub hsiz: f64,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            lag: -1,
            iso: false,
            optim: false,
            optim_les: false,
            hsiz: 0.0,
        }
    }
}

/// Reference frame of the coordinates: `c_scaled = (c - min) / delta`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleState {
    pub scaled: bool,
    pub delta: f64,
    pub min: [f64; 3],
}

impl Default for ScaleState {
    fn default() -> Self {
        Self {
            scaled: false,
            delta: 1.0,
            min: [0.0; 3],
        }
    }
}

/// One tetrahedral partition.
#[derive(Debug, Default)]
pub struct Mesh {
    pub np: usize,
    pub npi: usize,
    pub npmax: usize,
    pub ne: usize,
    pub nei: usize,
    pub nemax: usize,
    pub nt: usize,
    pub nti: usize,
    pub na: usize,
    pub nai: usize,
    /// Number of boundary points in use.
    pub xp: usize,

    pub point: Block<Point>,
    pub xpoint: Block<XPoint>,
    pub tetra: Block<Tetra>,
    pub tria: Block<Tria>,
    pub edge: Block<Edge>,
    /// Face adjacency, see [`adjacency`].
    pub adja: Block<usize>,

    pub info: MeshOptions,
    pub scale: ScaleState,
    /// `memCur` / `memMax` of this partition.
    pub mem: MemBudget,
}

impl Mesh {
    /// Empty mesh allowed to charge up to `mem_max` bytes.
    pub fn new(mem_max: usize) -> Self {
        Self {
            mem: MemBudget::new(mem_max),
            ..Self::default()
        }
    }

    /// Allocate storage for `np` points, `ne` tetrahedra, `nt` boundary
    /// triangles and `na` edges, dropping previous arrays. Counts and
    /// capacities are set to the requested sizes.
    pub fn set_mesh_size(&mut self, np: usize, ne: usize, nt: usize, na: usize) -> Result<(), MemError> {
        self.free_arrays();
        self.mem.callocate(&mut self.point, np + 1, "points")?;
        self.mem.callocate(&mut self.tetra, ne + 1, "tetra")?;
        if nt > 0 {
            self.mem.callocate(&mut self.tria, nt + 1, "triangles")?;
        }
        if na > 0 {
            self.mem.callocate(&mut self.edge, na + 1, "edges")?;
        }
        self.np = np;
        self.npi = np;
        self.npmax = np;
        self.ne = ne;
        self.nei = ne;
        self.nemax = ne;
        self.nt = nt;
        self.nti = nt;
        self.na = na;
        self.nai = na;
        Ok(())
    }

    /// Release every array back to the budget.
    pub fn free_arrays(&mut self) {
        let Self {
            point,
            xpoint,
            tetra,
            tria,
            edge,
            adja,
            mem,
            ..
        } = self;
        mem.release(point, "points");
        mem.release(xpoint, "boundary points");
        mem.release(tetra, "tetra");
        mem.release(tria, "triangles");
        mem.release(edge, "edges");
        mem.release(adja, "adjacency");
        self.np = 0;
        self.ne = 0;
        self.nt = 0;
        self.na = 0;
        self.xp = 0;
        self.npmax = 0;
        self.nemax = 0;
    }

    /// Copy the active counts into the logical ones.
    pub fn sync_logical_counts(&mut self) {
        self.npi = self.np;
        self.nti = self.nt;
        self.nai = self.na;
        self.nei = self.ne;
    }

    /// Used tetrahedra in `1..=ne`, as `(index, tetra)`.
    pub fn tetras(&self) -> impl Iterator<Item = (usize, &Tetra)> {
        self.tetra
            .iter()
            .enumerate()
            .skip(1)
            .take(self.ne)
            .filter(|(_, t)| t.is_used())
    }

    /// Indices of tetrahedra referencing three or more null vertices.
    pub fn tetras_with_null_vertices(&self) -> Vec<usize> {
        self.tetra
            .iter()
            .enumerate()
            .skip(1)
            .take(self.ne)
            .filter(|(_, t)| t.null_vertices() >= 3)
            .map(|(k, _)| k)
            .collect()
    }
}

impl DebugInvariants for Mesh {
    fn debug_assert_invariants(&self) {
        crate::assert_invariants!(self.validate_invariants(), "Mesh");
    }

    fn validate_invariants(&self) -> Result<(), ParMeshError> {
        self.mem.validate_invariants()?;
        if self.np + 1 > self.point.len().max(1) || self.ne + 1 > self.tetra.len().max(1) {
            return Err(ParMeshError::CountExceedsCapacity {
                np: self.np,
                ne: self.ne,
            });
        }
        if let Some(&tetra) = self.tetras_with_null_vertices().first() {
            return Err(ParMeshError::NullVertexTetra { tetra });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_mesh_size_charges_arrays() {
        let mut mesh = Mesh::new(1 << 20);
        mesh.set_mesh_size(4, 1, 4, 0).unwrap();
        let expected = 5 * std::mem::size_of::<Point>()
            + 2 * std::mem::size_of::<Tetra>()
            + 5 * std::mem::size_of::<Tria>();
        assert_eq!(mesh.mem.cur(), expected);
        assert!(!mesh.edge.is_set());

        mesh.free_arrays();
        assert_eq!(mesh.mem.cur(), 0);
    }

    #[test]
    fn set_mesh_size_refused_by_budget() {
        let mut mesh = Mesh::new(std::mem::size_of::<Point>());
        let err = mesh.set_mesh_size(4, 1, 0, 0).unwrap_err();
        assert!(matches!(err, MemError::BudgetExceeded { what: "points", .. }));
        assert_eq!(mesh.mem.cur(), 0);
    }

    #[test]
    fn null_vertex_tetras_are_reported() {
        let mut mesh = Mesh::new(1 << 20);
        mesh.set_mesh_size(4, 2, 0, 0).unwrap();
        mesh.tetra[1] = Tetra::new([1, 2, 3, 4]);
        mesh.tetra[2] = Tetra::new([4, 0, 0, 0]);
        assert_eq!(mesh.tetras_with_null_vertices(), vec![2]);
        assert!(matches!(
            mesh.validate_invariants(),
            Err(ParMeshError::NullVertexTetra { tetra: 2 })
        ));
    }

    #[test]
    fn sync_resets_logical_counts() {
        let mut mesh = Mesh::new(1 << 20);
        mesh.set_mesh_size(8, 3, 0, 0).unwrap();
        mesh.np = 6;
        mesh.ne = 2;
        mesh.sync_logical_counts();
        assert_eq!((mesh.npi, mesh.nei), (6, 2));
    }
}
