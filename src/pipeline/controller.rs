//! The collective pipeline controller.
//!
//! [`Remesher`] sequences the phases of a run over every rank of the
//! communicator. Each phase ends with a blocking checkpoint: input validation
//! with an agreement reduction, every later phase with a severity reduction.
//! All ranks therefore take the same branch after each phase.
//!
//! Whatever the exit path, the logical counts of every group still owned by
//! the container are resynchronized through a drop guard ([`Finalize`]).

use std::ops::{Deref, DerefMut};
use std::time::Instant;

use crate::algs::checkpoint::Checkpoint;
use crate::algs::communicator::Communicator;
use crate::debug_invariants::DebugInvariants;
use crate::memory::audit::check_mem_max_and_mem_cur;
use crate::mesh::sol::SIZE_ANISO;
use crate::mesh_error::ParMeshError;
use crate::parmesh::DistributedMesh;
use crate::pipeline::check::check_input_data;
use crate::pipeline::distribution::Distribution;
use crate::pipeline::kernel::RemeshKernel;
use crate::pipeline::preprocess::{adapt_mesh, on_group, preprocess_mesh};
use crate::pipeline::severity::Severity;

const RULE: &str = "%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%";

/// Resynchronizes logical counts when dropped.
pub struct Finalize<'a, C> {
    parmesh: &'a mut DistributedMesh<C>,
}

impl<'a, C> Finalize<'a, C> {
    pub fn new(parmesh: &'a mut DistributedMesh<C>) -> Self {
        Self { parmesh }
    }
}

impl<C> Drop for Finalize<'_, C> {
    fn drop(&mut self) {
        self.parmesh.sync_logical_counts();
    }
}

impl<C> Deref for Finalize<'_, C> {
    type Target = DistributedMesh<C>;
    fn deref(&self) -> &Self::Target {
        &*self.parmesh
    }
}

impl<C> DerefMut for Finalize<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.parmesh
    }
}

/// Drives centralized and distributed runs with a kernel `K` and a
/// distribution subsystem `D`.
#[derive(Debug, Default)]
pub struct Remesher<K, D> {
    kernel: K,
    distribution: D,
}

impl<K, D> Remesher<K, D> {
    pub fn new(kernel: K, distribution: D) -> Self {
        Self {
            kernel,
            distribution,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn distribution(&self) -> &D {
        &self.distribution
    }

    pub fn into_parts(self) -> (K, D) {
        (self.kernel, self.distribution)
    }
}

fn agree<C: Communicator>(parmesh: &DistributedMesh<C>, phase: &'static str, ok: bool) -> bool {
    parmesh
        .comm()
        .and_then(|comm| Checkpoint::new(comm, phase).agree(ok))
        .unwrap_or_else(|e| {
            log::error!("[rank {}] checkpoint {phase}: {e}", parmesh.myrank);
            false
        })
}

fn reduce<C: Communicator>(
    parmesh: &DistributedMesh<C>,
    phase: &'static str,
    local: Severity,
) -> Severity {
    parmesh
        .comm()
        .and_then(|comm| Checkpoint::new(comm, phase).severity(local))
        .unwrap_or_else(|e| {
            log::error!("[rank {}] checkpoint {phase}: {e}", parmesh.myrank);
            Severity::StrongFailure
        })
}

fn local_outcome(what: &str, myrank: usize, result: Result<(), ParMeshError>, on_error: Severity) -> Severity {
    match result {
        Ok(()) => Severity::Success,
        Err(e) => {
            log::error!("[rank {myrank}] {what}: {e}");
            on_error
        }
    }
}

impl<K: RemeshKernel, D> Remesher<K, D> {
    /// Centralized run: the input mesh lives on the root rank, is broadcast,
    /// distributed, remeshed in parallel and merged back on the root rank.
    pub fn run_centralized<C>(&mut self, parmesh: &mut DistributedMesh<C>) -> Severity
    where
        C: Communicator,
        D: Distribution<C>,
    {
        let mut guard = Finalize::new(parmesh);
        let pm = &mut *guard;
        let verbose = pm.info.imprim > 0;
        let start = Instant::now();
        self.banner(pm);

        if !self.check_phase(pm) {
            return Severity::LowFailure;
        }

        let phase = Instant::now();
        if verbose {
            log::info!("\n  {RULE}\n   MODULE PARMESH CENTRALIZED\n  {RULE}");
            log::info!("   -- PHASE 1 : DISTRIBUTE MESH AMONG PROCESSES");
        }
        let myrank = pm.myrank;
        let mut local = local_outcome(
            "broadcast",
            myrank,
            self.distribution.bcast_mesh(pm),
            Severity::LowFailure,
        );
        if local.is_success() {
            local = self.preprocess_group(pm, 0);
        }
        let global = reduce(pm, "preprocess", local);
        if !global.is_success() {
            return global;
        }

        let local = local_outcome(
            "distribution",
            myrank,
            self.distribution.distribute_mesh(pm),
            Severity::LowFailure,
        );
        let global = reduce(pm, "distribute", local);
        if !global.is_success() {
            return global;
        }
        if verbose {
            log::info!("   -- PHASE 1 COMPLETED.     {:.3?}", phase.elapsed());
        }

        let ierlib = self.remesh_phase(pm);
        if verbose {
            log::info!("\n  {RULE}\n   END OF MODULE PARMESH CENTRALIZED\n  {RULE}");
        }
        if ierlib == Severity::StrongFailure {
            return ierlib;
        }

        let phase = Instant::now();
        if verbose {
            log::info!("   -- PHASE 3 : MERGE MESHES OVER PROCESSORS");
        }
        let local = local_outcome(
            "merge",
            myrank,
            self.distribution.merge(pm),
            Severity::StrongFailure,
        );
        let global = reduce(pm, "merge", local);
        if !global.is_success() {
            return global;
        }
        if verbose {
            log::info!("   -- PHASE 3 COMPLETED.     {:.3?}", phase.elapsed());
        }

        if myrank == 0 {
            let phase = Instant::now();
            if verbose {
                log::info!("   -- PHASE 4 : MESH PACKED UP");
            }
            if let Err(e) = self.pack_up(pm) {
                log::error!("[rank {myrank}] impossible to build the boundary mesh: {e}");
                return Severity::LowFailure;
            }
            if verbose {
                log::info!("   -- PHASE 4 COMPLETED.     {:.3?}", phase.elapsed());
            }
        }

        if verbose {
            log::info!("   PARMESH CENTRALIZED: ELAPSED TIME  {:.3?}", start.elapsed());
        }
        ierlib
    }

    /// Distributed run: every rank starts with its own groups and keeps them.
    pub fn run_distributed<C>(&mut self, parmesh: &mut DistributedMesh<C>) -> Severity
    where
        C: Communicator,
        D: Distribution<C>,
    {
        let mut guard = Finalize::new(parmesh);
        let pm = &mut *guard;
        let verbose = pm.info.imprim > 0;
        let start = Instant::now();
        self.banner(pm);

        if !self.check_phase(pm) {
            return Severity::LowFailure;
        }

        let phase = Instant::now();
        if verbose {
            log::info!("\n  {RULE}\n   MODULE PARMESH DISTRIBUTED\n  {RULE}");
            log::info!("   -- PHASE 1 : ANALYSIS");
        }
        let local = (0..pm.ngrp())
            .map(|igrp| self.preprocess_group(pm, igrp))
            .fold(Severity::Success, Severity::worst);
        let global = reduce(pm, "preprocess", local);
        if !global.is_success() {
            return global;
        }
        if verbose {
            log::info!("   -- PHASE 1 COMPLETED.     {:.3?}", phase.elapsed());
        }

        let ierlib = self.remesh_phase(pm);
        if verbose {
            log::info!("\n  {RULE}\n   END OF MODULE PARMESH DISTRIBUTED\n  {RULE}");
        }
        if ierlib == Severity::StrongFailure {
            return ierlib;
        }

        let phase = Instant::now();
        if verbose {
            log::info!("   -- PHASE 3 : MESH PACKED UP");
        }
        if let Err(e) = self.pack_up(pm) {
            log::error!("[rank {}] impossible to build the boundary mesh: {e}", pm.myrank);
            return Severity::LowFailure;
        }
        if verbose {
            log::info!("   -- PHASE 3 COMPLETED.     {:.3?}", phase.elapsed());
            log::info!("   PARMESH DISTRIBUTED: ELAPSED TIME  {:.3?}", start.elapsed());
        }
        ierlib
    }

    fn banner<C>(&self, pm: &DistributedMesh<C>) {
        if pm.info.imprim > 0 && pm.myrank == 0 {
            log::info!(
                "  -- {}, Release {} on {} rank(s)",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                pm.nprocs
            );
        }
    }

    fn check_phase<C: Communicator>(&self, pm: &mut DistributedMesh<C>) -> bool {
        let start = Instant::now();
        let ok = check_input_data(pm).is_ok();
        if !agree(pm, "check input", ok) {
            return false;
        }
        if pm.info.imprim > 0 {
            log::info!("  -- CHECK INPUT DATA COMPLETED.     {:.3?}", start.elapsed());
        }
        true
    }

    fn preprocess_group<C>(&mut self, pm: &mut DistributedMesh<C>, igrp: usize) -> Severity {
        let imprim = pm.info.imprim;
        let myrank = pm.myrank;
        match pm.group_mut(igrp) {
            Ok(grp) => on_group(&mut self.kernel, grp, igrp, |k, mesh, met| {
                preprocess_mesh(k, mesh, met, imprim)
            }),
            Err(e) => {
                log::error!("[rank {myrank}] preprocess: {e}");
                Severity::LowFailure
            }
        }
    }

    /// `niter` rounds of adaptation, load balancing between rounds. Stops at
    /// the first round whose agreed severity is not a success.
    fn remesh_phase<C>(&mut self, pm: &mut DistributedMesh<C>) -> Severity
    where
        C: Communicator,
        D: Distribution<C>,
    {
        let phase = Instant::now();
        if pm.info.imprim > 0 {
            let aniso = pm
                .listgrp
                .first()
                .and_then(|g| g.met.as_ref())
                .is_some_and(|met| met.size == SIZE_ANISO);
            log::info!(
                "   -- PHASE 2 : {} MESHING",
                if aniso { "ANISOTROPIC" } else { "ISOTROPIC" }
            );
        }

        let niter = pm.info.niter.max(1);
        let mut result = Severity::Success;
        for round in 0..niter {
            let local = pm
                .listgrp
                .iter_mut()
                .enumerate()
                .map(|(igrp, grp)| on_group(&mut self.kernel, grp, igrp, adapt_mesh))
                .fold(Severity::Success, Severity::worst);
            result = reduce(pm, "remesh", local);
            if !result.is_success() {
                break;
            }
            if round + 1 < niter {
                let local = local_outcome(
                    "load balancing",
                    pm.myrank,
                    self.distribution.load_balance(pm),
                    Severity::LowFailure,
                );
                result = reduce(pm, "load balance", local);
                if !result.is_success() {
                    break;
                }
            }
            log::debug!("[rank {}] remesh round {} done", pm.myrank, round + 1);
        }

        if pm.info.imprim > 0 {
            log::info!("   -- PHASE 2 COMPLETED.     {:.3?}", phase.elapsed());
        }
        result
    }

    /// Release the communicators, give the freed budget to the first mesh and
    /// rebuild adjacency and boundary of every group.
    fn pack_up<C>(&mut self, pm: &mut DistributedMesh<C>) -> Result<(), ParMeshError> {
        pm.release_communicators()?;
        let moved = pm.devote_memory_to_mesh()?;
        log::debug!("[rank {}] {moved} bytes devoted to the mesh", pm.myrank);
        check_mem_max_and_mem_cur(pm, "pack up");

        for (igrp, grp) in pm.listgrp.iter_mut().enumerate() {
            let mesh = grp.mesh.as_mut().ok_or(ParMeshError::EmptyGroup(igrp))?;
            self.kernel.hash_tetra(mesh)?;
            self.kernel.build_boundary(mesh)?;
        }
        // budget overruns are reported, never fatal
        if let Err(e) = pm.validate_invariants() {
            log::error!("[rank {}] pack up: {e}", pm.myrank);
        }
        Ok(())
    }
}
