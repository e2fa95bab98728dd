//! Per-group phase bodies and their failure classification.
//!
//! A failure before the mesh is scaled leaves it untouched: `LowFailure`.
//! Later failures may leave it scaled: `StrongFailure`, unless the recovery
//! unscale succeeds, in which case the group is consistent again and the
//! outcome is demoted to `LowFailure`.

use crate::mesh::{Group, Mesh, Sol};
use crate::mesh_error::ParMeshError;
use crate::pipeline::kernel::RemeshKernel;
use crate::pipeline::severity::Severity;

fn classify(step: &str, result: Result<(), ParMeshError>, on_error: Severity) -> Severity {
    match result {
        Ok(()) => Severity::Success,
        Err(e) => {
            log::error!("{step}: {e}");
            on_error
        }
    }
}

macro_rules! step {
    ($name:literal, $call:expr, $on_error:expr) => {
        let sev = classify($name, $call, $on_error);
        if !sev.is_success() {
            return sev;
        }
    };
}

/// Scale, size, qualify, analyze and unscale one mesh.
pub fn preprocess_mesh<K>(kernel: &mut K, mesh: &mut Mesh, met: &mut Sol, imprim: i32) -> Severity
where
    K: RemeshKernel + ?Sized,
{
    step!("scale", kernel.scale_mesh(mesh, met), Severity::LowFailure);

    if mesh.info.optim && met.np == 0 {
        step!(
            "optim sizing",
            kernel.compute_optim_sol(mesh, met),
            Severity::StrongFailure
        );
    }
    if mesh.info.hsiz > 0.0 {
        step!(
            "constant sizing",
            kernel.set_constant_size(mesh, met),
            Severity::StrongFailure
        );
    }
    step!("tetra quality", kernel.tetra_quality(mesh, met), Severity::StrongFailure);
    if imprim.abs() > 0 {
        step!(
            "quality histogram",
            kernel.quality_histogram(mesh, met),
            Severity::StrongFailure
        );
    }
    step!("analysis", kernel.analyze(mesh), Severity::StrongFailure);
    if imprim > 1 && met.m.is_set() {
        step!(
            "length histogram",
            kernel.length_histogram(mesh, met),
            Severity::StrongFailure
        );
    }
    step!("unscale", kernel.unscale_mesh(mesh, met), Severity::StrongFailure);
    Severity::Success
}

/// Scale, adapt and unscale one mesh.
pub fn adapt_mesh<K>(kernel: &mut K, mesh: &mut Mesh, met: &mut Sol) -> Severity
where
    K: RemeshKernel + ?Sized,
{
    step!("scale", kernel.scale_mesh(mesh, met), Severity::LowFailure);
    step!("adapt", kernel.adapt(mesh, met), Severity::StrongFailure);
    step!("unscale", kernel.unscale_mesh(mesh, met), Severity::StrongFailure);
    Severity::Success
}

/// Demote a `StrongFailure` to `LowFailure` when unscaling succeeds.
pub fn recover<K>(kernel: &mut K, mesh: &mut Mesh, met: &mut Sol, sev: Severity) -> Severity
where
    K: RemeshKernel + ?Sized,
{
    if sev == Severity::StrongFailure && kernel.unscale_mesh(mesh, met).is_ok() {
        log::info!("mesh unscaled after failure");
        return Severity::LowFailure;
    }
    sev
}

/// Run `body` on the mesh and metric of `grp`, then apply [`recover`]. A
/// group without mesh or metric is a `LowFailure`.
pub fn on_group<K, F>(kernel: &mut K, grp: &mut Group, igrp: usize, body: F) -> Severity
where
    K: RemeshKernel + ?Sized,
    F: FnOnce(&mut K, &mut Mesh, &mut Sol) -> Severity,
{
    let (Some(mesh), Some(met)) = (grp.mesh.as_mut(), grp.met.as_mut()) else {
        log::error!("{}", ParMeshError::EmptyGroup(igrp));
        return Severity::LowFailure;
    };
    let sev = body(&mut *kernel, &mut *mesh, &mut *met);
    recover(kernel, mesh, met, sev)
}
