//! The distribution seam: moving groups between ranks.
//!
//! Partitioning, rebalancing and merging are done by an external collaborator
//! implementing [`Distribution`]. Each call may itself communicate; the
//! controller only folds the outcome into the next checkpoint.

use crate::algs::communicator::Communicator;
use crate::mesh_error::ParMeshError;
use crate::parmesh::DistributedMesh;

/// Collaborator moving mesh data between ranks.
pub trait Distribution<C: Communicator> {
    /// Replicate the input mesh of the root rank on every rank.
    fn bcast_mesh(&mut self, parmesh: &mut DistributedMesh<C>) -> Result<(), ParMeshError>;

    /// Partition the replicated mesh so that each rank keeps its own groups
    /// and build the communicators between them.
    fn distribute_mesh(&mut self, parmesh: &mut DistributedMesh<C>) -> Result<(), ParMeshError>;

    /// Move groups between remeshing rounds to even out the load.
    fn load_balance(&mut self, parmesh: &mut DistributedMesh<C>) -> Result<(), ParMeshError>;

    /// Gather every group into a single mesh on the root rank.
    fn merge(&mut self, parmesh: &mut DistributedMesh<C>) -> Result<(), ParMeshError>;
}

/// Distribution for a run where every rank already holds the data it works
/// on (in particular, a single-rank run). Every step leaves the container as
/// it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialDistribution;

impl<C: Communicator> Distribution<C> for SerialDistribution {
    fn bcast_mesh(&mut self, parmesh: &mut DistributedMesh<C>) -> Result<(), ParMeshError> {
        parmesh.comm()?;
        Ok(())
    }

    fn distribute_mesh(&mut self, parmesh: &mut DistributedMesh<C>) -> Result<(), ParMeshError> {
        parmesh.comm()?;
        Ok(())
    }

    fn load_balance(&mut self, parmesh: &mut DistributedMesh<C>) -> Result<(), ParMeshError> {
        parmesh.comm()?;
        Ok(())
    }

    fn merge(&mut self, parmesh: &mut DistributedMesh<C>) -> Result<(), ParMeshError> {
        parmesh.comm()?;
        if parmesh.ngrp() > 1 {
            log::warn!(
                "[rank {}] {} groups left unmerged by the serial distribution",
                parmesh.myrank,
                parmesh.ngrp()
            );
        }
        Ok(())
    }
}
