//! Structural checks on budgeted containers.
//!
//! `validate_invariants` is always available and returns the first violation
//! found. `debug_assert_invariants` panics on a violation, but only in debug
//! builds or with the `strict-invariants` / `check-invariants` features; in
//! release builds it compiles to nothing.

use crate::mesh_error::ParMeshError;

pub trait DebugInvariants {
    /// Panic on the first violation when invariant checking is enabled.
    fn debug_assert_invariants(&self);
    /// First violation found, if any.
    fn validate_invariants(&self) -> Result<(), ParMeshError>;
}

/// Evaluate a `Result` and panic with `$what` as context on `Err`, when
/// invariant checking is enabled.
#[macro_export]
macro_rules! assert_invariants {
    ($check:expr, $what:literal) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $check {
            panic!(concat!($what, " invariant violated: {}"), e);
        }
    };
}
