//! Input validation run on every rank before any collective phase.

use crate::mesh::sol::{SIZE_ANISO, SIZE_ISO};
use crate::mesh::{Mesh, MeshOptions, Sol};
use crate::mesh_error::ParMeshError;
use crate::parmesh::DistributedMesh;

/// Validate the options and metric of every group. A metric whose point count
/// does not match its mesh is discarded with a warning; every other mismatch
/// is an error.
pub fn check_input_data<C>(parmesh: &mut DistributedMesh<C>) -> Result<(), ParMeshError> {
    if parmesh.info.imprim > 0 {
        log::info!("  -- CHECK INPUT DATA");
    }
    let myrank = parmesh.myrank;
    for (igrp, grp) in parmesh.listgrp.iter_mut().enumerate() {
        let (Some(mesh), Some(met)) = (grp.mesh.as_mut(), grp.met.as_mut()) else {
            return Err(ParMeshError::EmptyGroup(igrp));
        };
        check_options(&mesh.info, met).inspect_err(|e| {
            log::error!("[rank {myrank}] group {igrp}: {e}");
        })?;
        check_metric(mesh, met).inspect_err(|e| {
            log::error!("[rank {myrank}] group {igrp}: {e}");
        })?;
    }
    Ok(())
}

fn check_options(info: &MeshOptions, met: &Sol) -> Result<(), ParMeshError> {
    if info.lag > -1 {
        return Err(ParMeshError::InvalidInput("lagrangian mode unavailable"));
    }
    if info.iso {
        return Err(ParMeshError::InvalidInput("level-set discretisation unavailable"));
    }
    if info.optim_les && met.size == SIZE_ANISO {
        return Err(ParMeshError::InvalidInput(
            "strong mesh optimization for LES methods unavailable with an anisotropic metric",
        ));
    }
    if met.np > 0 && info.optim {
        return Err(ParMeshError::InvalidInput("optim option can not be used with an input metric"));
    }
    if met.np > 0 && info.hsiz > 0.0 {
        return Err(ParMeshError::InvalidInput("hsiz option can not be used with an input metric"));
    }
    if info.optim && info.hsiz > 0.0 {
        return Err(ParMeshError::InvalidInput("hsiz and optim options can not be used together"));
    }
    Ok(())
}

fn check_metric(mesh: &mut Mesh, met: &mut Sol) -> Result<(), ParMeshError> {
    if met.np > 0 && met.np != mesh.np {
        log::warn!(
            "wrong metric number ({} values for {} points), metric ignored",
            met.np,
            mesh.np
        );
        met.discard(&mut mesh.mem);
    } else if met.size != SIZE_ISO && met.size != SIZE_ANISO {
        return Err(ParMeshError::InvalidInput("wrong metric data type"));
    }
    Ok(())
}
