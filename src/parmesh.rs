//! `DistributedMesh`: the rank-local container owning every group, the
//! communicator handle and the memory ceilings.
//!
//! Memory model: the container's own arrays (group list, communicator
//! bookkeeping) are charged to [`DistributedMesh::mem`]; each group's mesh,
//! metric and solutions are charged to that mesh's budget. `mem_glo_max` is
//! the process-wide ceiling for the sum of all of them. It is checked only by
//! the advisory auditor ([`crate::memory::audit`]).
//!
//! Communicator lifecycle: [`CommState::Active`] until
//! [`release_communicators`](DistributedMesh::release_communicators), then
//! [`CommState::Released`] for good. Any later request for the communicator
//! fails with [`ParMeshError::CommunicatorsReleased`].

use serde::{Deserialize, Serialize};

use crate::algs::communicator::Communicator;
use crate::debug_invariants::DebugInvariants;
use crate::memory::{self, Block, MemBudget, MemError};
use crate::mesh::Group;
use crate::mesh_error::ParMeshError;

const MB: usize = 1024 * 1024;
/// Budget used when neither a request nor the physical memory size is known.
pub const DEFAULT_MEM_MB: usize = 800;

/// Run options of the container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParMeshInfo {
    /// Verbosity: `0` silent, `1` phase banners, `>1` histograms.
    pub imprim: i32,
    /// Number of remesh / load-balance rounds.
    pub niter: usize,
    /// Requested global memory ceiling in MB; physical memory when `None`.
    pub mem: Option<usize>,
    /// Share (in percent) of the free global budget granted to group meshes
    /// by [`DistributedMesh::set_mem_max`].
    pub mem_percent: usize,
}

impl Default for ParMeshInfo {
    fn default() -> Self {
        Self {
            imprim: 1,
            niter: 1,
            mem: None,
            mem_percent: 80,
        }
    }
}

/// Whether inter-rank bookkeeping may still be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommState {
    Active,
    Released,
}

/// Internal communicator: values exchanged between the groups of one rank.
#[derive(Debug, Default)]
pub struct IntComm {
    pub nitem: usize,
    pub intvalues: Block<i32>,
    pub doublevalues: Block<f64>,
}

/// External communicator towards one neighbor rank. Entities are referenced
/// by position in the internal communicator, never by pointer.
#[derive(Debug, Default)]
pub struct ExtComm {
    /// This rank.
    pub color_in: usize,
    /// Neighbor rank.
    pub color_out: usize,
    pub nitem: usize,
    pub int_comm_index: Block<usize>,
}

/// Rank-local owner of the mesh groups.
#[derive(Debug)]
pub struct DistributedMesh<C> {
    comm: C,
    comm_state: CommState,
    pub myrank: usize,
    pub nprocs: usize,
    pub info: ParMeshInfo,
    /// `memCur` / `memMax` of the container itself (groups excluded).
    pub mem: MemBudget,
    mem_glo_max: usize,
    pub listgrp: Block<Group>,
    pub int_node_comm: Option<IntComm>,
    pub ext_node_comm: Block<ExtComm>,
    pub int_face_comm: Option<IntComm>,
    pub ext_face_comm: Block<ExtComm>,
}

/// Resolve the global ceiling from a request in MB and the detected physical
/// memory. A request larger than the physical memory is clamped.
pub fn resolve_mem_glo_max(requested_mb: Option<usize>) -> usize {
    let physical = memory::report::physical_memory();
    match (requested_mb, physical) {
        (Some(req), Some(phys)) if req.saturating_mul(MB) > phys => {
            log::warn!(
                "requested {req} MB exceeds the physical memory ({} MB); using the physical memory",
                phys / MB
            );
            phys
        }
        (Some(req), _) => req.saturating_mul(MB),
        (None, Some(phys)) => phys,
        (None, None) => DEFAULT_MEM_MB * MB,
    }
}

impl<C: Communicator> DistributedMesh<C> {
    /// Container with a global ceiling derived from `info.mem`.
    pub fn new(comm: C, info: ParMeshInfo) -> Self {
        let requested = info.mem;
        let mut pm = Self::with_mem_glo_max(comm, info, 0);
        pm.set_mem_glo_max(requested);
        pm
    }

    /// Container with an explicit global ceiling in bytes. The container's own
    /// ceiling starts at the full global ceiling.
    pub fn with_mem_glo_max(comm: C, info: ParMeshInfo, mem_glo_max: usize) -> Self {
        Self {
            myrank: comm.rank(),
            nprocs: comm.size(),
            comm,
            comm_state: CommState::Active,
            info,
            mem: MemBudget::new(mem_glo_max),
            mem_glo_max,
            listgrp: Block::unset(),
            int_node_comm: None,
            ext_node_comm: Block::unset(),
            int_face_comm: None,
            ext_face_comm: Block::unset(),
        }
    }

    /// The communicator, as long as it has not been released.
    pub fn comm(&self) -> Result<&C, ParMeshError> {
        match self.comm_state {
            CommState::Active => Ok(&self.comm),
            CommState::Released => Err(ParMeshError::CommunicatorsReleased),
        }
    }
}

impl<C> DistributedMesh<C> {
    #[inline]
    pub fn comm_state(&self) -> CommState {
        self.comm_state
    }

    /// Process-wide ceiling (`memGloMax`).
    #[inline]
    pub fn mem_glo_max(&self) -> usize {
        self.mem_glo_max
    }

    /// Set the global ceiling from a request in MB (physical memory when
    /// `None`) and reset the container ceiling to it. Call before any group is
    /// added; [`set_mem_max`](Self::set_mem_max) then splits it.
    pub fn set_mem_glo_max(&mut self, requested_mb: Option<usize>) {
        self.mem_glo_max = resolve_mem_glo_max(requested_mb);
        self.mem.set_max(self.mem_glo_max);
        if self.info.imprim > 1 {
            log::info!(
                "[rank {}] global memory ceiling: {} MB",
                self.myrank,
                self.mem_glo_max / MB
            );
        }
    }

    #[inline]
    pub fn ngrp(&self) -> usize {
        self.listgrp.len()
    }

    pub fn group(&self, igrp: usize) -> Result<&Group, ParMeshError> {
        self.listgrp.get(igrp).ok_or(ParMeshError::MissingGroup(igrp))
    }

    pub fn group_mut(&mut self, igrp: usize) -> Result<&mut Group, ParMeshError> {
        self.listgrp
            .get_mut(igrp)
            .ok_or(ParMeshError::MissingGroup(igrp))
    }

    /// Append a group, growing the group list on the container budget.
    pub fn add_group(&mut self, group: Group) -> Result<usize, ParMeshError> {
        let igrp = self.listgrp.len();
        self.mem.reallocate(&mut self.listgrp, igrp + 1, "group list")?;
        self.listgrp[igrp] = group;
        Ok(igrp)
    }

    /// Split the free part of the global ceiling: every group mesh gets an
    /// equal share of `percent`% of it on top of what it already uses, the
    /// container keeps the rest. Afterwards `Σ memMax == memGloMax` whenever
    /// current usage fits under the global ceiling.
    pub fn set_mem_max(&mut self, percent: usize) {
        let percent = percent.min(100);
        let meshes_cur: usize = self
            .listgrp
            .iter()
            .filter_map(|g| g.mesh.as_ref())
            .map(|m| m.mem.cur())
            .sum();
        let used = self.mem.cur() + meshes_cur;
        if used > self.mem_glo_max {
            log::warn!(
                "[rank {}] {used} bytes already in use exceed the global ceiling of {} bytes",
                self.myrank,
                self.mem_glo_max
            );
        }
        let free = self.mem_glo_max.saturating_sub(used);
        let nmesh = self.listgrp.iter().filter(|g| g.mesh.is_some()).count();

        let mut meshes_max = 0;
        if nmesh > 0 {
            let share = free / 100 * percent / nmesh;
            for mesh in self.listgrp.iter_mut().filter_map(|g| g.mesh.as_mut()) {
                mesh.mem.set_max(mesh.mem.cur() + share);
                meshes_max += mesh.mem.max();
            }
        }
        self.mem
            .set_max(self.mem_glo_max.saturating_sub(meshes_max).max(self.mem.cur()));
    }

    /// Allocate the internal node communicator.
    pub fn alloc_int_node_comm(&mut self, nitem: usize) -> Result<(), ParMeshError> {
        self.int_node_comm = Some(alloc_int_comm(&mut self.mem, nitem)?);
        Ok(())
    }

    /// Allocate the internal face communicator.
    pub fn alloc_int_face_comm(&mut self, nitem: usize) -> Result<(), ParMeshError> {
        self.int_face_comm = Some(alloc_int_comm(&mut self.mem, nitem)?);
        Ok(())
    }

    /// Allocate one external node communicator per `(neighbor rank, nitem)`.
    pub fn alloc_ext_node_comm(&mut self, neighbors: &[(usize, usize)]) -> Result<(), ParMeshError> {
        alloc_ext_comms(&mut self.mem, &mut self.ext_node_comm, self.myrank, neighbors)
    }

    /// Allocate one external face communicator per `(neighbor rank, nitem)`.
    pub fn alloc_ext_face_comm(&mut self, neighbors: &[(usize, usize)]) -> Result<(), ParMeshError> {
        alloc_ext_comms(&mut self.mem, &mut self.ext_face_comm, self.myrank, neighbors)
    }

    /// Allocate the interface index arrays of group `igrp` on the container
    /// budget.
    pub fn alloc_group_comm_indices(
        &mut self,
        igrp: usize,
        nnode: usize,
        nface: usize,
    ) -> Result<(), ParMeshError> {
        let Self { mem, listgrp, .. } = self;
        let grp = listgrp
            .get_mut(igrp)
            .ok_or(ParMeshError::MissingGroup(igrp))?;
        grp.alloc_node_comm_index(mem, nnode)?;
        grp.alloc_face_comm_index(mem, nface)?;
        Ok(())
    }

    /// Free every communicator structure and mark the communicators as
    /// released. This is a one-way transition.
    pub fn release_communicators(&mut self) -> Result<(), ParMeshError> {
        if self.comm_state == CommState::Released {
            return Err(ParMeshError::CommunicatorsReleased);
        }
        let Self {
            mem,
            listgrp,
            int_node_comm,
            ext_node_comm,
            int_face_comm,
            ext_face_comm,
            ..
        } = self;
        for grp in listgrp.iter_mut() {
            grp.free_comm_indices(mem);
        }
        for int_comm in [int_node_comm, int_face_comm] {
            if let Some(mut c) = int_comm.take() {
                mem.release(&mut c.intvalues, "internal communicator");
                mem.release(&mut c.doublevalues, "internal communicator");
            }
        }
        for ext in [ext_node_comm, ext_face_comm] {
            for c in ext.iter_mut() {
                mem.release(&mut c.int_comm_index, "external communicator");
            }
            mem.release(ext, "external communicator");
        }
        self.comm_state = CommState::Released;
        log::debug!("[rank {}] communicators released", self.myrank);
        Ok(())
    }

    /// Give the container's unused ceiling to the mesh of group 0. The sum of
    /// the two ceilings is unchanged. Returns the transferred byte count.
    pub fn devote_memory_to_mesh(&mut self) -> Result<usize, ParMeshError> {
        let Self { mem, listgrp, .. } = self;
        let mesh = listgrp
            .get_mut(0)
            .ok_or(ParMeshError::MissingGroup(0))?
            .mesh
            .as_mut()
            .ok_or(ParMeshError::EmptyGroup(0))?;
        Ok(mem.give_slack_to(&mut mesh.mem))
    }

    /// Free every group and the group list itself.
    pub fn free_listgrp(&mut self) {
        let Self { mem, listgrp, .. } = self;
        for grp in listgrp.iter_mut() {
            grp.free(mem);
        }
        mem.release(listgrp, "group list");
    }

    /// Copy active counts into logical counts for every owned group.
    pub fn sync_logical_counts(&mut self) {
        for grp in self.listgrp.iter_mut() {
            grp.sync_logical_counts();
        }
    }
}

fn alloc_int_comm(mem: &mut MemBudget, nitem: usize) -> Result<IntComm, MemError> {
    let mut comm = IntComm {
        nitem,
        ..IntComm::default()
    };
    mem.callocate(&mut comm.intvalues, nitem, "internal communicator")?;
    Ok(comm)
}

fn alloc_ext_comms(
    mem: &mut MemBudget,
    ext: &mut Block<ExtComm>,
    myrank: usize,
    neighbors: &[(usize, usize)],
) -> Result<(), ParMeshError> {
    for c in ext.iter_mut() {
        mem.release(&mut c.int_comm_index, "external communicator");
    }
    mem.release(ext, "external communicator");
    mem.allocate(ext, neighbors.len(), "external communicator")?;
    for (c, &(color_out, nitem)) in ext.iter_mut().zip(neighbors) {
        c.color_in = myrank;
        c.color_out = color_out;
        c.nitem = nitem;
        mem.callocate(&mut c.int_comm_index, nitem, "external communicator")?;
    }
    Ok(())
}

impl<C> DebugInvariants for DistributedMesh<C> {
    fn debug_assert_invariants(&self) {
        crate::assert_invariants!(self.validate_invariants(), "DistributedMesh");
    }

    fn validate_invariants(&self) -> Result<(), ParMeshError> {
        self.mem.validate_invariants()?;
        for mesh in self.listgrp.iter().filter_map(|g| g.mesh.as_ref()) {
            mesh.mem.validate_invariants()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::mesh::{Mesh, Sol};
    use static_assertions::assert_impl_all;

    assert_impl_all!(DistributedMesh<NoComm>: Send);

    fn parmesh(glo: usize) -> DistributedMesh<NoComm> {
        DistributedMesh::with_mem_glo_max(NoComm, ParMeshInfo::default(), glo)
    }

    #[test]
    fn groups_are_charged_to_the_container() {
        let mut pm = parmesh(1 << 20);
        pm.add_group(Group::new(Mesh::new(0), Sol::default())).unwrap();
        pm.add_group(Group::default()).unwrap();
        assert_eq!(pm.ngrp(), 2);
        assert_eq!(pm.mem.cur(), 2 * std::mem::size_of::<Group>());
        pm.free_listgrp();
        assert_eq!(pm.mem.cur(), 0);
        assert_eq!(pm.ngrp(), 0);
    }

    #[test]
    fn set_mem_max_splits_global_ceiling() {
        let mut pm = parmesh(1_000_000);
        pm.add_group(Group::new(Mesh::new(0), Sol::default())).unwrap();
        pm.add_group(Group::new(Mesh::new(0), Sol::default())).unwrap();
        pm.set_mem_max(50);

        let meshes: usize = pm
            .listgrp
            .iter()
            .map(|g| g.mesh.as_ref().unwrap().mem.max())
            .sum();
        assert_eq!(meshes + pm.mem.max(), pm.mem_glo_max());
        assert!(pm.listgrp[0].mesh.as_ref().unwrap().mem.max() > 0);
    }

    #[test]
    fn release_is_one_way_and_frees_bookkeeping() {
        let mut pm = parmesh(1 << 20);
        pm.add_group(Group::new(Mesh::new(1 << 16), Sol::default())).unwrap();
        let base = pm.mem.cur();
        pm.alloc_group_comm_indices(0, 12, 4).unwrap();
        pm.alloc_int_node_comm(12).unwrap();
        pm.alloc_int_face_comm(4).unwrap();
        pm.alloc_ext_node_comm(&[(1, 5), (2, 7)]).unwrap();
        pm.alloc_ext_face_comm(&[(1, 2)]).unwrap();
        assert!(pm.mem.cur() > base);
        assert_eq!(pm.ext_node_comm[1].color_out, 2);

        pm.release_communicators().unwrap();
        assert_eq!(pm.mem.cur(), base);
        assert_eq!(pm.comm_state(), CommState::Released);
        assert_eq!(pm.comm().unwrap_err(), ParMeshError::CommunicatorsReleased);
        assert_eq!(
            pm.release_communicators().unwrap_err(),
            ParMeshError::CommunicatorsReleased
        );
    }

    #[test]
    fn devoting_memory_preserves_total_ceiling() {
        let mut pm = parmesh(1 << 20);
        pm.add_group(Group::new(Mesh::new(1 << 10), Sol::default())).unwrap();
        pm.set_mem_max(50);
        let before = pm.mem.max() + pm.listgrp[0].mesh.as_ref().unwrap().mem.max();

        let moved = pm.devote_memory_to_mesh().unwrap();
        let after = pm.mem.max() + pm.listgrp[0].mesh.as_ref().unwrap().mem.max();
        assert_eq!(before, after);
        assert_eq!(pm.mem.max(), pm.mem.cur());
        assert!(moved > 0);
    }

    #[test]
    fn devote_without_group_is_an_error() {
        let mut pm = parmesh(1 << 20);
        assert_eq!(
            pm.devote_memory_to_mesh().unwrap_err(),
            ParMeshError::MissingGroup(0)
        );
    }

    #[test]
    fn explicit_request_is_honoured_or_clamped() {
        let glo = resolve_mem_glo_max(Some(16));
        match memory::report::physical_memory() {
            Some(phys) if phys < 16 * MB => assert_eq!(glo, phys),
            _ => assert_eq!(glo, 16 * MB),
        }
    }

    #[test]
    fn new_resolves_requested_ceiling() {
        let info = ParMeshInfo {
            mem: Some(1),
            ..ParMeshInfo::default()
        };
        let pm = DistributedMesh::new(NoComm, info);
        assert!(pm.mem_glo_max() <= MB);
        assert_eq!(pm.mem.max(), pm.mem_glo_max());
        assert_eq!(pm.comm_state(), CommState::Active);
    }
}
