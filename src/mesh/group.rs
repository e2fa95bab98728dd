//! A group: one mesh partition owned by a rank, with its metric, auxiliary
//! solutions and the index arrays linking its interface entities to the
//! rank's internal communicators.

use crate::memory::{Block, MemBudget, MemError};
use crate::mesh::{Mesh, Sol};
use crate::mesh_error::ParMeshError;

#[derive(Debug, Default)]
pub struct Group {
    pub mesh: Option<Mesh>,
    pub met: Option<Sol>,
    /// Auxiliary solution fields, charged to the mesh budget.
    pub sols: Block<Sol>,

    /// Interface node index in the mesh / position in the internal node
    /// communicator, charged to the container budget.
    pub node2int_node_comm_index1: Block<usize>,
    pub node2int_node_comm_index2: Block<usize>,
    pub nitem_int_node_comm: usize,
    /// Interface face index in the mesh / position in the internal face
    /// communicator, charged to the container budget.
    pub face2int_face_comm_index1: Block<usize>,
    pub face2int_face_comm_index2: Block<usize>,
    pub nitem_int_face_comm: usize,
}

impl Group {
    pub fn new(mesh: Mesh, met: Sol) -> Self {
        Self {
            mesh: Some(mesh),
            met: Some(met),
            ..Self::default()
        }
    }

    /// Attach `nsols` empty auxiliary fields of `size` components, charged to
    /// the group's mesh. A group without a mesh has nothing to charge them to.
    pub fn add_solutions(&mut self, nsols: usize, size: usize) -> Result<(), ParMeshError> {
        let Some(mesh) = self.mesh.as_mut() else {
            return Err(ParMeshError::InvalidInput("solutions attached to a group without mesh"));
        };
        mesh.mem.allocate(&mut self.sols, nsols, "solutions")?;
        for sol in self.sols.iter_mut() {
            sol.size = size;
        }
        Ok(())
    }

    /// Allocate the node-to-internal-communicator index pair.
    pub fn alloc_node_comm_index(&mut self, comm_budget: &mut MemBudget, nitem: usize) -> Result<(), MemError> {
        comm_budget.callocate(&mut self.node2int_node_comm_index1, nitem, "node communicator")?;
        if let Err(e) = comm_budget.callocate(&mut self.node2int_node_comm_index2, nitem, "node communicator") {
            comm_budget.release(&mut self.node2int_node_comm_index1, "node communicator");
            return Err(e);
        }
        self.nitem_int_node_comm = nitem;
        Ok(())
    }

    /// Allocate the face-to-internal-communicator index pair.
    pub fn alloc_face_comm_index(&mut self, comm_budget: &mut MemBudget, nitem: usize) -> Result<(), MemError> {
        comm_budget.callocate(&mut self.face2int_face_comm_index1, nitem, "face communicator")?;
        if let Err(e) = comm_budget.callocate(&mut self.face2int_face_comm_index2, nitem, "face communicator") {
            comm_budget.release(&mut self.face2int_face_comm_index1, "face communicator");
            return Err(e);
        }
        self.nitem_int_face_comm = nitem;
        Ok(())
    }

    /// Release the communicator index arrays.
    pub fn free_comm_indices(&mut self, comm_budget: &mut MemBudget) {
        comm_budget.release(&mut self.node2int_node_comm_index1, "node communicator");
        comm_budget.release(&mut self.node2int_node_comm_index2, "node communicator");
        comm_budget.release(&mut self.face2int_face_comm_index1, "face communicator");
        comm_budget.release(&mut self.face2int_face_comm_index2, "face communicator");
        self.nitem_int_node_comm = 0;
        self.nitem_int_face_comm = 0;
    }

    /// Release everything the group owns. The mesh, metric and solutions are
    /// dropped once their storage has been returned to the mesh budget.
    pub fn free(&mut self, comm_budget: &mut MemBudget) {
        self.free_comm_indices(comm_budget);
        if let Some(mesh) = self.mesh.as_mut() {
            if let Some(met) = self.met.as_mut() {
                met.discard(&mut mesh.mem);
            }
            for sol in self.sols.iter_mut() {
                sol.discard(&mut mesh.mem);
            }
            mesh.mem.release(&mut self.sols, "solutions");
            mesh.free_arrays();
        }
        self.met = None;
        self.mesh = None;
    }

    /// Copy active counts into logical counts for the mesh, metric and
    /// solutions still owned by the group.
    pub fn sync_logical_counts(&mut self) {
        if let Some(mesh) = self.mesh.as_mut() {
            mesh.sync_logical_counts();
            for sol in self.sols.iter_mut() {
                sol.sync_logical_counts();
            }
        }
        if let Some(met) = self.met.as_mut() {
            met.sync_logical_counts();
        }
    }
}
