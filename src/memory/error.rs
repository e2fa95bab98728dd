//! Governor errors for parmesh

use thiserror::Error;

/// Errors from budgeted allocation routines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemError {
    /// The request would push the structure past its `memMax` ceiling.
    #[error("{what}: exceeded max memory allowed: requested {requested} bytes, {cur}/{max} bytes in use")]
    BudgetExceeded {
        what: &'static str,
        requested: usize,
        cur: usize,
        max: usize,
    },
    /// The system allocator refused the request.
    #[error("{what}: allocation of {bytes} bytes failed")]
    AllocFailed { what: &'static str, bytes: usize },
    /// `n * size_of::<T>()` does not fit in `usize`.
    #[error("{what}: byte count overflow for {len} elements of {elem_size} bytes")]
    Overflow {
        what: &'static str,
        len: usize,
        elem_size: usize,
    },
    /// Fresh allocation requested into a block that is still set.
    #[error("{what}: block is already allocated")]
    AlreadySet { what: &'static str },
}
