#![allow(dead_code)]
use parmesh::prelude::*;
use parmesh::mesh::sol::SIZE_ISO;

/// Two tetrahedra glued along face (2, 3, 4), with an isotropic metric.
pub fn two_tetra_group(mem_max: usize) -> Group {
    let mut mesh = Mesh::new(mem_max);
    mesh.set_mesh_size(5, 2, 0, 0).unwrap();
    let coords = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
    ];
    for (k, c) in coords.into_iter().enumerate() {
        mesh.point[k + 1] = Point::new(c);
    }
    mesh.tetra[1] = Tetra::new([1, 2, 3, 4]);
    mesh.tetra[2] = Tetra::new([5, 2, 4, 3]);

    let mut met = Sol::default();
    met.set_size(&mut mesh.mem, SIZE_ISO, 5).unwrap();
    for k in 1..=5 {
        met.values_mut(k)[0] = 0.1;
    }
    Group::new(mesh, met)
}

/// A container on `comm` holding one two-tetra group, its ceiling split.
pub fn parmesh_on<C: Communicator>(comm: C, imprim: i32) -> DistributedMesh<C> {
    let info = ParMeshInfo {
        imprim,
        ..ParMeshInfo::default()
    };
    let mut pm = DistributedMesh::with_mem_glo_max(comm, info, 1 << 22);
    pm.add_group(two_tetra_group(1 << 20)).unwrap();
    pm.set_mem_max(80);
    pm
}

/// Run `f` once per rank of a fresh in-process world, one thread per rank.
pub fn on_world<T: Send>(size: usize, f: impl Fn(LocalComm) -> T + Sync) -> Vec<T> {
    std::thread::scope(|s| {
        let handles: Vec<_> = LocalComm::world(size)
            .into_iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(comm))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Kernel doing no geometry, failing on request.
#[derive(Debug, Default, Clone)]
pub struct StubKernel {
    pub fail_analyze: bool,
    pub fail_adapt: bool,
    /// Unscaling fails once adaptation has been attempted.
    pub fail_unscale_after_adapt: bool,
    pub adapt_calls: usize,
}

impl RemeshKernel for StubKernel {
    fn unscale_mesh(&mut self, mesh: &mut Mesh, met: &mut Sol) -> Result<(), ParMeshError> {
        if self.fail_unscale_after_adapt && self.adapt_calls > 0 {
            return Err(ParMeshError::Collaborator("unscale"));
        }
        parmesh::pipeline::kernel::unscale_mesh(mesh, met)
    }
    fn compute_optim_sol(&mut self, _: &mut Mesh, _: &mut Sol) -> Result<(), ParMeshError> {
        Ok(())
    }
    fn tetra_quality(&mut self, _: &mut Mesh, _: &Sol) -> Result<(), ParMeshError> {
        Ok(())
    }
    fn quality_histogram(&mut self, _: &Mesh, _: &Sol) -> Result<(), ParMeshError> {
        Ok(())
    }
    fn analyze(&mut self, _: &mut Mesh) -> Result<(), ParMeshError> {
        if self.fail_analyze {
            Err(ParMeshError::Collaborator("analysis"))
        } else {
            Ok(())
        }
    }
    fn adapt(&mut self, mesh: &mut Mesh, _: &mut Sol) -> Result<(), ParMeshError> {
        self.adapt_calls += 1;
        if self.fail_adapt {
            return Err(ParMeshError::Collaborator("adapt"));
        }
        assert!(mesh.scale.scaled, "adaptation runs on the scaled mesh");
        Ok(())
    }
}

/// Distribution that keeps every group in place and records its calls.
#[derive(Debug, Default, Clone)]
pub struct ScriptedDistribution {
    pub fail_bcast: bool,
    pub fail_distribute: bool,
    pub fail_load_balance: bool,
    pub fail_merge: bool,
    pub calls: Vec<&'static str>,
}

impl ScriptedDistribution {
    fn step(&mut self, name: &'static str, fail: bool) -> Result<(), ParMeshError> {
        self.calls.push(name);
        if fail {
            Err(ParMeshError::Collaborator(name))
        } else {
            Ok(())
        }
    }
}

impl<C: Communicator> Distribution<C> for ScriptedDistribution {
    fn bcast_mesh(&mut self, _: &mut DistributedMesh<C>) -> Result<(), ParMeshError> {
        self.step("bcast", self.fail_bcast)
    }
    fn distribute_mesh(&mut self, _: &mut DistributedMesh<C>) -> Result<(), ParMeshError> {
        self.step("distribute", self.fail_distribute)
    }
    fn load_balance(&mut self, _: &mut DistributedMesh<C>) -> Result<(), ParMeshError> {
        self.step("load_balance", self.fail_load_balance)
    }
    fn merge(&mut self, _: &mut DistributedMesh<C>) -> Result<(), ParMeshError> {
        self.step("merge", self.fail_merge)
    }
}
