//! Medit ASCII writers (`.mesh` / `.sol`) for per-group debugging output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use itertools::Itertools;

use crate::mesh::sol::{SIZE_ANISO, SIZE_ISO};
use crate::mesh::{Mesh, Sol};
use crate::mesh_error::ParMeshError;
use crate::parmesh::DistributedMesh;
use crate::pipeline::kernel::RemeshKernel;

/// Write the used points, boundary triangles and used tetrahedra of `mesh`.
pub fn write_mesh<W: Write>(mut writer: W, mesh: &Mesh) -> Result<(), ParMeshError> {
    writeln!(writer, "MeshVersionFormatted 2\n")?;
    writeln!(writer, "Dimension 3\n")?;

    writeln!(writer, "Vertices")?;
    writeln!(writer, "{}", mesh.np)?;
    for p in mesh.point.iter().skip(1).take(mesh.np) {
        writeln!(writer, "{} {} {} {}", p.c[0], p.c[1], p.c[2], p.reference)?;
    }

    if mesh.nt > 0 {
        writeln!(writer, "\nTriangles")?;
        writeln!(writer, "{}", mesh.nt)?;
        for t in mesh.tria.iter().skip(1).take(mesh.nt) {
            writeln!(writer, "{} {} {} {}", t.v[0], t.v[1], t.v[2], t.reference)?;
        }
    }

    let used = mesh.tetras().count();
    writeln!(writer, "\nTetrahedra")?;
    writeln!(writer, "{used}")?;
    for (_, t) in mesh.tetras() {
        writeln!(writer, "{} {} {} {} {}", t.v[0], t.v[1], t.v[2], t.v[3], t.reference)?;
    }

    writeln!(writer, "\nEnd")?;
    writer.flush()?;
    Ok(())
}

/// Write the values of `sol` at the first `mesh.np` vertices.
pub fn write_sol<W: Write>(mut writer: W, mesh: &Mesh, sol: &Sol) -> Result<(), ParMeshError> {
    let kind = match sol.size {
        SIZE_ISO => 1,
        SIZE_ANISO => 3,
        _ => return Err(ParMeshError::InvalidInput("metric size must be 1 or 6")),
    };
    let np = mesh.np.min(sol.np);

    writeln!(writer, "MeshVersionFormatted 2\n")?;
    writeln!(writer, "Dimension 3\n")?;
    writeln!(writer, "SolAtVertices")?;
    writeln!(writer, "{np}")?;
    writeln!(writer, "1 {kind}")?;
    for k in 1..=np {
        writeln!(writer, "{}", sol.values(k).iter().join(" "))?;
    }
    writeln!(writer, "\nEnd")?;
    writer.flush()?;
    Ok(())
}

/// File stem of group `igrp` on `rank`: `<basename>-P<rank>-<igrp>`.
pub fn group_file_stem(basename: &str, rank: usize, igrp: usize) -> String {
    format!("{basename}-P{rank:02}-{igrp:02}")
}

/// Save every group of the rank as `<basename>-P<rank>-<igrp>.mesh`, plus a
/// `.sol` file when the group carries a metric with values. Returns the
/// written paths.
///
/// Boundary triangles are written as currently held; before pack-up a group
/// usually has none. Use [`save_groups_with_boundary`] to rebuild them first.
pub fn save_groups<C>(
    parmesh: &DistributedMesh<C>,
    dir: &Path,
    basename: &str,
) -> Result<Vec<PathBuf>, ParMeshError> {
    let mut written = Vec::new();
    for (igrp, grp) in parmesh.listgrp.iter().enumerate() {
        let Some(mesh) = grp.mesh.as_ref() else {
            continue;
        };
        let stem = group_file_stem(basename, parmesh.myrank, igrp);

        let path = dir.join(format!("{stem}.mesh"));
        write_mesh(BufWriter::new(File::create(&path)?), mesh)?;
        written.push(path);

        if let Some(met) = grp.met.as_ref().filter(|m| m.np > 0 && m.m.is_set()) {
            let path = dir.join(format!("{stem}.sol"));
            write_sol(BufWriter::new(File::create(&path)?), mesh, met)?;
            written.push(path);
        }
    }
    Ok(written)
}

/// Rebuild adjacency and boundary triangles of every group with `kernel`,
/// then [`save_groups`].
pub fn save_groups_with_boundary<C, K>(
    kernel: &mut K,
    parmesh: &mut DistributedMesh<C>,
    dir: &Path,
    basename: &str,
) -> Result<Vec<PathBuf>, ParMeshError>
where
    K: RemeshKernel + ?Sized,
{
    for mesh in parmesh.listgrp.iter_mut().filter_map(|g| g.mesh.as_mut()) {
        kernel.hash_tetra(mesh)?;
        kernel.build_boundary(mesh)?;
    }
    save_groups(parmesh, dir, basename)
}
