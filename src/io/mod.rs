//! Debugging output: Medit files per group and plain-text array dumps.

pub mod dump;
pub mod medit;

pub use medit::{save_groups, save_groups_with_boundary};
