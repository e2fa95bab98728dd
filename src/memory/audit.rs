//! Advisory consistency check of the memory counters of one rank.

use crate::parmesh::DistributedMesh;

/// Totals gathered by [`check_mem_max_and_mem_cur`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemAudit {
    /// Container `cur` plus every group mesh `cur`.
    pub cur_total: usize,
    /// Container `max` plus every group mesh `max`.
    pub max_total: usize,
    pub glo_max: usize,
    pub cur_exceeded: bool,
    pub max_exceeded: bool,
}

impl MemAudit {
    #[inline]
    pub fn is_consistent(&self) -> bool {
        !self.cur_exceeded && !self.max_exceeded
    }
}

/// Sum the current usage and the ceilings of the container and of every group
/// mesh and compare both sums to the global ceiling. Overflows are logged with
/// `msg` as context; the run is never aborted.
pub fn check_mem_max_and_mem_cur<C>(parmesh: &DistributedMesh<C>, msg: &str) -> MemAudit {
    let (cur_meshes, max_meshes) = parmesh
        .listgrp
        .iter()
        .filter_map(|g| g.mesh.as_ref())
        .fold((0usize, 0usize), |(cur, max), m| {
            (cur.saturating_add(m.mem.cur()), max.saturating_add(m.mem.max()))
        });
    let cur_total = parmesh.mem.cur().saturating_add(cur_meshes);
    let max_total = parmesh.mem.max().saturating_add(max_meshes);
    let glo_max = parmesh.mem_glo_max();

    let audit = MemAudit {
        cur_total,
        max_total,
        glo_max,
        cur_exceeded: cur_total > glo_max,
        max_exceeded: max_total > glo_max,
    };
    if audit.cur_exceeded {
        log::error!(
            "[rank {}] {msg}: memory in use ({cur_total}) exceeds the global ceiling ({glo_max})",
            parmesh.myrank
        );
    }
    if audit.max_exceeded {
        log::error!(
            "[rank {}] {msg}: sum of ceilings ({max_total}) exceeds the global ceiling ({glo_max})",
            parmesh.myrank
        );
    }
    audit
}
