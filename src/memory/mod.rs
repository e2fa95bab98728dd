//! Memory governor: budgeted storage for every mesh-owning structure.
//!
//! - [`MemBudget`] keeps the `memCur` / `memMax` pair of one structure and
//!   performs every allocation charged to it.
//! - [`Block`] is the storage slot those allocations live in.
//! - [`audit`] cross-checks the sum of all budgets against the process-wide
//!   ceiling.
//! - [`report`] detects the physical memory and writes per-rank allocator
//!   statistics.

pub mod audit;
pub mod block;
pub mod budget;
pub mod error;
pub mod report;

pub use audit::{MemAudit, check_mem_max_and_mem_cur};
pub use block::Block;
pub use budget::MemBudget;
pub use error::MemError;
