//! Plain-text dumps of mesh arrays, for comparing ranks side by side.

use std::io::Write;

use itertools::Itertools;

use crate::mesh::Mesh;
use crate::mesh_error::ParMeshError;

/// One line per point: index, coordinates, tag and reference.
pub fn dump_points<W: Write>(mut writer: W, mesh: &Mesh) -> Result<(), ParMeshError> {
    writeln!(writer, "# points: {}", mesh.np)?;
    for (k, p) in mesh.point.iter().enumerate().skip(1).take(mesh.np) {
        writeln!(
            writer,
            "{k} {} tag={} ref={}",
            p.c.iter().join(" "),
            p.tag,
            p.reference
        )?;
    }
    Ok(())
}

/// One line per tetrahedron slot in `1..=ne`, used or not.
pub fn dump_tetras<W: Write>(mut writer: W, mesh: &Mesh) -> Result<(), ParMeshError> {
    writeln!(writer, "# tetra: {}", mesh.ne)?;
    for (k, t) in mesh.tetra.iter().enumerate().skip(1).take(mesh.ne) {
        writeln!(writer, "{k} {} ref={}", t.v.iter().join(" "), t.reference)?;
    }
    Ok(())
}

/// One line per tetrahedron: the packed neighbor value of each face.
pub fn dump_adjacency<W: Write>(mut writer: W, mesh: &Mesh) -> Result<(), ParMeshError> {
    if !mesh.adja.is_set() {
        return Err(ParMeshError::MissingAdjacency);
    }
    writeln!(writer, "# adjacency: {}", mesh.ne)?;
    for k in 1..=mesh.ne {
        let faces = (0..4).map(|i| mesh.adja_idx_of_face(k, i)).join(" ");
        writeln!(writer, "{k} {faces}")?;
    }
    Ok(())
}

/// Log every tetrahedron referencing three or more null vertices. Returns
/// their indices; the mesh is not modified.
pub fn search_null_vertices(mesh: &Mesh, context: &str) -> Vec<usize> {
    let bad = mesh.tetras_with_null_vertices();
    for &k in &bad {
        log::error!("{context}: tetra {k} has null vertices {:?}", mesh.tetra[k].v);
    }
    bad
}
