mod util;

use parmesh::mesh::point::TAG_BDY;
use parmesh::prelude::*;
use util::*;

struct RankOutcome {
    severity: Severity,
    kernel: StubKernel,
    dist: ScriptedDistribution,
    pm: DistributedMesh<LocalComm>,
}

fn centralized(size: usize, setup: impl Fn(usize, &mut StubKernel, &mut ScriptedDistribution) + Sync) -> Vec<RankOutcome> {
    on_world(size, |comm| {
        let rank = comm.rank();
        let mut kernel = StubKernel::default();
        let mut dist = ScriptedDistribution::default();
        setup(rank, &mut kernel, &mut dist);
        let mut pm = parmesh_on(comm, 0);
        let mut remesher = Remesher::new(kernel, dist);
        let severity = remesher.run_centralized(&mut pm);
        let (kernel, dist) = remesher.into_parts();
        RankOutcome {
            severity,
            kernel,
            dist,
            pm,
        }
    })
}

#[test]
fn four_ranks_run_to_completion() {
    let out = centralized(4, |_, _, _| {});
    for (rank, o) in out.iter().enumerate() {
        assert_eq!(o.severity, Severity::Success, "rank {rank}");
        assert_eq!(o.dist.calls, ["bcast", "distribute", "merge"]);
        assert_eq!(o.kernel.adapt_calls, 1);
    }

    // only the root packs the merged mesh up
    let root = &out[0].pm;
    assert_eq!(root.comm_state(), CommState::Released);
    let mesh = root.listgrp[0].mesh.as_ref().unwrap();
    assert_eq!(mesh.nt, 6);
    assert_eq!(mesh.neighbor(1, 0), Some((2, 0)));
    assert!(mesh.point.iter().skip(1).all(|p| p.tag & TAG_BDY != 0));
    for o in &out[1..] {
        assert_eq!(o.pm.comm_state(), CommState::Active);
        assert_eq!(o.pm.listgrp[0].mesh.as_ref().unwrap().nt, 0);
    }
}

#[test]
fn strong_failure_on_one_rank_stops_before_merge() {
    let out = centralized(4, |rank, kernel, _| {
        if rank == 2 {
            kernel.fail_adapt = true;
            kernel.fail_unscale_after_adapt = true;
        }
    });
    for o in &out {
        assert_eq!(o.severity, Severity::StrongFailure);
        assert!(!o.dist.calls.contains(&"merge"));
        assert_eq!(o.pm.comm_state(), CommState::Active);
    }
}

#[test]
fn adapt_failure_with_successful_unscale_is_low_and_merges() {
    let out = centralized(2, |rank, kernel, _| {
        if rank == 1 {
            kernel.fail_adapt = true;
        }
    });
    for o in &out {
        assert_eq!(o.severity, Severity::LowFailure);
        assert!(o.dist.calls.contains(&"merge"));
    }
    assert!(!out[1].pm.listgrp[0].mesh.as_ref().unwrap().scale.scaled);
}

#[test]
fn preprocessing_failure_after_scaling_is_demoted() {
    let out = centralized(4, |rank, kernel, _| {
        if rank == 1 {
            kernel.fail_analyze = true;
        }
    });
    for o in &out {
        assert_eq!(o.severity, Severity::LowFailure);
        assert_eq!(o.dist.calls, ["bcast"]);
        assert_eq!(o.kernel.adapt_calls, 0);
    }
    let mesh = out[1].pm.listgrp[0].mesh.as_ref().unwrap();
    assert!(!mesh.scale.scaled);
    assert_eq!(mesh.point[2].c, [1.0, 0.0, 0.0]);
}

#[test]
fn failed_broadcast_is_a_shared_low_failure() {
    let out = centralized(4, |rank, _, dist| dist.fail_bcast = rank == 3);
    for o in &out {
        assert_eq!(o.severity, Severity::LowFailure);
        assert!(!o.dist.calls.contains(&"distribute"));
    }
}

#[test]
fn failed_distribution_is_low() {
    let out = centralized(3, |rank, _, dist| dist.fail_distribute = rank == 0);
    for o in &out {
        assert_eq!(o.severity, Severity::LowFailure);
        assert_eq!(o.kernel.adapt_calls, 0);
    }
}

#[test]
fn failed_merge_is_strong() {
    let out = centralized(2, |rank, _, dist| dist.fail_merge = rank == 1);
    for o in &out {
        assert_eq!(o.severity, Severity::StrongFailure);
        assert_eq!(o.pm.comm_state(), CommState::Active);
    }
}

#[test]
fn invalid_input_on_one_rank_fails_everywhere() {
    let out = on_world(4, |comm| {
        let rank = comm.rank();
        let mut pm = parmesh_on(comm, 0);
        if rank == 3 {
            pm.listgrp[0].mesh.as_mut().unwrap().info.iso = true;
        }
        let mut remesher = Remesher::new(StubKernel::default(), ScriptedDistribution::default());
        let sev = remesher.run_centralized(&mut pm);
        (sev, remesher.into_parts().1.calls)
    });
    for (sev, calls) in out {
        assert_eq!(sev, Severity::LowFailure);
        assert!(calls.is_empty());
    }
}

#[test]
fn rounds_are_separated_by_load_balancing() {
    let out = on_world(2, |comm| {
        let mut pm = parmesh_on(comm, 0);
        pm.info.niter = 3;
        let mut remesher = Remesher::new(StubKernel::default(), ScriptedDistribution::default());
        let sev = remesher.run_distributed(&mut pm);
        (sev, remesher.into_parts())
    });
    for (sev, (kernel, dist)) in out {
        assert_eq!(sev, Severity::Success);
        assert_eq!(kernel.adapt_calls, 3);
        assert_eq!(dist.calls, ["load_balance", "load_balance"]);
    }
}

#[test]
fn failed_load_balancing_ends_the_rounds() {
    let out = on_world(2, |comm| {
        let rank = comm.rank();
        let mut pm = parmesh_on(comm, 0);
        pm.info.niter = 4;
        let dist = ScriptedDistribution {
            fail_load_balance: rank == 0,
            ..ScriptedDistribution::default()
        };
        let mut remesher = Remesher::new(StubKernel::default(), dist);
        let sev = remesher.run_distributed(&mut pm);
        (sev, remesher.into_parts().0.adapt_calls, pm.comm_state())
    });
    for (sev, adapt_calls, state) in out {
        assert_eq!(sev, Severity::LowFailure);
        assert_eq!(adapt_calls, 1);
        // a low failure still packs the mesh up
        assert_eq!(state, CommState::Released);
    }
}

#[test]
fn distributed_run_packs_every_rank() {
    let out = on_world(3, |comm| {
        let mut pm = parmesh_on(comm, 1);
        pm.add_group(two_tetra_group(1 << 16)).unwrap();
        let sev = Remesher::new(StubKernel::default(), SerialDistribution).run_distributed(&mut pm);
        (sev, pm)
    });
    for (sev, pm) in out {
        assert_eq!(sev, Severity::Success);
        assert_eq!(pm.comm_state(), CommState::Released);
        for grp in pm.listgrp.iter() {
            assert_eq!(grp.mesh.as_ref().unwrap().nt, 6);
        }
    }
}
