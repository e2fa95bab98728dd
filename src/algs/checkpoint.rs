//! Phase checkpoints: the blocking collective reductions that separate
//! pipeline phases.
//!
//! Two flavors:
//! - [`Checkpoint::agree`]: minimum over booleans. Passes iff every rank
//!   passes; one dissenting rank fails the whole run.
//! - [`Checkpoint::severity`]: maximum over [`Severity`]. The worst outcome
//!   anywhere becomes the outcome everywhere.
//!
//! Both are all-reductions, so they also act as a barrier: no rank leaves a
//! checkpoint before every rank has reported.

use crate::algs::communicator::Communicator;
use crate::mesh_error::ParMeshError;
use crate::pipeline::severity::Severity;

/// A named synchronization point on a communicator.
pub struct Checkpoint<'a, C: ?Sized> {
    comm: &'a C,
    phase: &'static str,
}

impl<'a, C> Checkpoint<'a, C>
where
    C: Communicator + ?Sized,
{
    pub fn new(comm: &'a C, phase: &'static str) -> Self {
        Self { comm, phase }
    }

    /// Agreement reduction: `true` iff `ok` holds on every rank.
    pub fn agree(&self, ok: bool) -> Result<bool, ParMeshError> {
        let global = self.comm.allreduce_min_i32(i32::from(ok))? != 0;
        log::debug!(
            "[rank {}] checkpoint {}: local={} agreed={}",
            self.comm.rank(),
            self.phase,
            ok,
            global
        );
        Ok(global)
    }

    /// Severity reduction: the worst local outcome over all ranks.
    pub fn severity(&self, local: Severity) -> Result<Severity, ParMeshError> {
        let code = self.comm.allreduce_max_i32(local.code())?;
        let global = Severity::from_code(code).ok_or(ParMeshError::InvalidSeverity(code))?;
        log::debug!(
            "[rank {}] checkpoint {}: local={} global={}",
            self.comm.rank(),
            self.phase,
            local,
            global
        );
        Ok(global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalComm, NoComm};

    fn on_world<T: Send>(size: usize, f: impl Fn(LocalComm) -> T + Sync) -> Vec<T> {
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

    #[test]
    fn all_ranks_pass_agreement() {
        let out = on_world(4, |comm| Checkpoint::new(&comm, "check").agree(true).unwrap());
        assert_eq!(out, vec![true; 4]);
    }

    #[test]
    fn one_dissenting_rank_fails_agreement() {
        let out = on_world(4, |comm| {
            let ok = comm.rank() != 3;
            Checkpoint::new(&comm, "check").agree(ok).unwrap()
        });
        assert_eq!(out, vec![false; 4]);
    }

    #[test]
    fn worst_severity_wins_everywhere() {
        let out = on_world(4, |comm| {
            let local = if comm.rank() == 2 {
                Severity::StrongFailure
            } else {
                Severity::Success
            };
            Checkpoint::new(&comm, "remesh").severity(local).unwrap()
        });
        assert_eq!(out, vec![Severity::StrongFailure; 4]);
    }

    #[test]
    fn serial_checkpoint_returns_local_value() {
        let cp = Checkpoint::new(&NoComm, "serial");
        assert!(!cp.agree(false).unwrap());
        assert_eq!(cp.severity(Severity::LowFailure).unwrap(), Severity::LowFailure);
    }
}
