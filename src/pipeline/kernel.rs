//! The serial remeshing kernel seam.
//!
//! The pipeline drives one kernel call per group and phase through
//! [`RemeshKernel`]. Geometry work (quality, analysis, adaptation) is left to
//! implementors; the bounding-box scaling, the face-hash adjacency and the
//! boundary extraction have default implementations so that a partition can
//! be prepared and packed on a single rank.

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;

use crate::mesh::adjacency::{adja_index, block_len, pack};
use crate::mesh::point::TAG_BDY;
use crate::mesh::sol::{SIZE_ANISO, SIZE_ISO};
use crate::mesh::{Mesh, Sol, Tria};
use crate::mesh_error::ParMeshError;

/// Smallest bounding-box extent accepted by [`scale_mesh`].
pub const EPS: f64 = 1e-30;

/// Collaborator performing the serial remeshing steps on one group.
///
/// Every method reports failure through `Err`; the controller classifies it.
pub trait RemeshKernel {
    /// Map the mesh into the unit box and rescale metric and `hsiz`.
    fn scale_mesh(&mut self, mesh: &mut Mesh, met: &mut Sol) -> Result<(), ParMeshError> {
        scale_mesh(mesh, met)
    }

    /// Inverse of [`scale_mesh`](Self::scale_mesh). A no-op on an unscaled
    /// mesh; this is the recovery path after a failure.
    fn unscale_mesh(&mut self, mesh: &mut Mesh, met: &mut Sol) -> Result<(), ParMeshError> {
        unscale_mesh(mesh, met)
    }

    /// Build a sizing field preserving current edge lengths (`optim` mode).
    fn compute_optim_sol(&mut self, mesh: &mut Mesh, met: &mut Sol) -> Result<(), ParMeshError>;

    /// Build a constant isotropic sizing field equal to `hsiz`.
    fn set_constant_size(&mut self, mesh: &mut Mesh, met: &mut Sol) -> Result<(), ParMeshError> {
        set_constant_size(mesh, met)
    }

    /// Compute the quality of every tetrahedron.
    fn tetra_quality(&mut self, mesh: &mut Mesh, met: &Sol) -> Result<(), ParMeshError>;

    /// Report the quality histogram.
    fn quality_histogram(&mut self, mesh: &Mesh, met: &Sol) -> Result<(), ParMeshError>;

    /// Surface and topology analysis.
    fn analyze(&mut self, mesh: &mut Mesh) -> Result<(), ParMeshError>;

    /// Report the edge-length histogram.
    fn length_histogram(&mut self, _mesh: &Mesh, _met: &Sol) -> Result<(), ParMeshError> {
        Ok(())
    }

    /// Adapt the (scaled) mesh to the metric.
    fn adapt(&mut self, mesh: &mut Mesh, met: &mut Sol) -> Result<(), ParMeshError>;

    /// Rebuild tetra-to-tetra adjacency.
    fn hash_tetra(&mut self, mesh: &mut Mesh) -> Result<(), ParMeshError> {
        hash_tetra(mesh)
    }

    /// Rebuild boundary triangles from the adjacency.
    fn build_boundary(&mut self, mesh: &mut Mesh) -> Result<(), ParMeshError> {
        build_boundary(mesh)
    }
}

/// Default bounding-box scaling: `c <- (c - min) / delta` with `delta` the
/// largest extent of the used points. Isotropic sizes are divided by `delta`,
/// anisotropic tensors multiplied by `delta²`. Scaling a scaled mesh is a
/// no-op.
pub fn scale_mesh(mesh: &mut Mesh, met: &mut Sol) -> Result<(), ParMeshError> {
    if mesh.scale.scaled {
        return Ok(());
    }
    let mut min = [f64::MAX; 3];
    let mut max = [f64::MIN; 3];
    let mut any = false;
    for p in mesh.point.iter().skip(1).take(mesh.np).filter(|p| p.is_used()) {
        any = true;
        for i in 0..3 {
            min[i] = min[i].min(p.c[i]);
            max[i] = max[i].max(p.c[i]);
        }
    }
    if !any {
        return Err(ParMeshError::DegenerateBoundingBox(0.0));
    }
    let delta = (0..3).map(|i| max[i] - min[i]).fold(0.0_f64, f64::max);
    if delta < EPS {
        return Err(ParMeshError::DegenerateBoundingBox(delta));
    }

    let inv = 1.0 / delta;
    for p in mesh.point.iter_mut().skip(1).take(mesh.np) {
        for i in 0..3 {
            p.c[i] = (p.c[i] - min[i]) * inv;
        }
    }
    if mesh.info.hsiz > 0.0 {
        mesh.info.hsiz *= inv;
    }
    rescale_metric(met, mesh.np, inv)?;

    mesh.scale.scaled = true;
    mesh.scale.delta = delta;
    mesh.scale.min = min;
    Ok(())
}

/// Default inverse of [`scale_mesh`].
pub fn unscale_mesh(mesh: &mut Mesh, met: &mut Sol) -> Result<(), ParMeshError> {
    if !mesh.scale.scaled {
        return Ok(());
    }
    let delta = mesh.scale.delta;
    let min = mesh.scale.min;
    for p in mesh.point.iter_mut().skip(1).take(mesh.np) {
        for i in 0..3 {
            p.c[i] = p.c[i] * delta + min[i];
        }
    }
    if mesh.info.hsiz > 0.0 {
        mesh.info.hsiz *= delta;
    }
    rescale_metric(met, mesh.np, delta)?;

    mesh.scale = Default::default();
    Ok(())
}

/// Sizes scale like lengths, tensors like inverse squared lengths.
fn rescale_metric(met: &mut Sol, np: usize, factor: f64) -> Result<(), ParMeshError> {
    if !met.m.is_set() || met.np == 0 {
        return Ok(());
    }
    let n = np.min(met.np);
    match met.size {
        SIZE_ISO => {
            for k in 1..=n {
                met.values_mut(k)[0] *= factor;
            }
        }
        SIZE_ANISO => {
            let tensor_factor = 1.0 / (factor * factor);
            for k in 1..=n {
                for v in met.values_mut(k) {
                    *v *= tensor_factor;
                }
            }
        }
        _ => return Err(ParMeshError::InvalidInput("metric size must be 1 or 6")),
    }
    Ok(())
}

/// Default constant sizing: an isotropic metric equal to `hsiz` at every
/// point, allocated on the mesh budget.
pub fn set_constant_size(mesh: &mut Mesh, met: &mut Sol) -> Result<(), ParMeshError> {
    let hsiz = mesh.info.hsiz;
    if hsiz <= 0.0 {
        return Err(ParMeshError::InvalidInput("constant size requires hsiz > 0"));
    }
    met.set_size(&mut mesh.mem, SIZE_ISO, mesh.np)?;
    for k in 1..=mesh.np {
        met.values_mut(k)[0] = hsiz;
    }
    Ok(())
}

/// Default adjacency builder: faces are matched through a hash keyed by their
/// sorted vertex triple. A face shared by three tetrahedra is rejected and the
/// adjacency left unset.
pub fn hash_tetra(mesh: &mut Mesh) -> Result<(), ParMeshError> {
    let Mesh {
        tetra,
        adja,
        mem,
        ne,
        nemax,
        ..
    } = mesh;
    mem.release(adja, "adjacency");
    mem.callocate(adja, block_len((*nemax).max(*ne)), "adjacency")?;

    let mut first_owner: HashMap<[usize; 3], (usize, usize)> = HashMap::with_capacity(2 * *ne);
    for (k, t) in tetra.iter().enumerate().skip(1).take(*ne) {
        if !t.is_used() {
            continue;
        }
        for i in 0..4 {
            let mut key = t.face(i);
            key.sort_unstable();
            match first_owner.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert((k, i));
                }
                Entry::Occupied(slot) => {
                    let (kk, ii) = *slot.get();
                    let glued = adja[adja_index(kk, ii)];
                    if glued != 0 {
                        mem.release(adja, "adjacency");
                        return Err(ParMeshError::NonManifoldFace {
                            first: kk,
                            second: glued / 4,
                            third: k,
                        });
                    }
                    adja[adja_index(kk, ii)] = pack(k, i);
                    adja[adja_index(k, i)] = pack(kk, ii);
                }
            }
        }
    }
    Ok(())
}

/// Default boundary builder: one triangle per face without neighbor,
/// oriented outward, carrying the reference of its tetrahedron. The vertices
/// of those faces are tagged as boundary points.
pub fn build_boundary(mesh: &mut Mesh) -> Result<(), ParMeshError> {
    if !mesh.adja.is_set() {
        return Err(ParMeshError::MissingAdjacency);
    }
    let faces: Vec<Tria> = mesh
        .tetras()
        .flat_map(|(k, t)| (0..4).map(move |i| (k, t, i)))
        .filter(|&(k, _, i)| mesh.adja[adja_index(k, i)] == 0)
        .map(|(_, t, i)| Tria {
            v: t.face(i),
            reference: t.reference,
            tag: TAG_BDY,
        })
        .collect();

    let Mesh {
        tria, point, mem, ..
    } = mesh;
    mem.release(tria, "triangles");
    mem.callocate(tria, faces.len() + 1, "triangles")?;
    for (slot, face) in tria.iter_mut().skip(1).zip(&faces) {
        *slot = *face;
        for &v in &face.v {
            if let Some(p) = point.get_mut(v) {
                p.tag |= TAG_BDY;
            }
        }
    }
    mesh.nt = faces.len();
    mesh.nti = faces.len();
    Ok(())
}
