#![cfg_attr(docsrs, feature(doc_cfg))]
//! # parmesh
//!
//! parmesh is the distributed-execution core of a parallel tetrahedral
//! remeshing tool. Each rank owns one or more mesh partitions ("groups"); a
//! collective pipeline validates the input, distributes the mesh, remeshes
//! every group with a serial kernel, merges the result and rebuilds its
//! boundary, agreeing on a single outcome after every phase.
//!
//! ## Features
//! - Budgeted storage: every mesh array is allocated, resized and released
//!   through a per-structure [`MemBudget`](memory::MemBudget), with an
//!   advisory process-wide ceiling and an auditor
//! - Ordered phase outcomes ([`Severity`](pipeline::Severity)) reduced over
//!   all ranks at named checkpoints
//! - Pluggable communication backends (serial, in-process threads, MPI)
//! - Narrow seams for the serial kernel ([`RemeshKernel`](pipeline::RemeshKernel))
//!   and the partitioner ([`Distribution`](pipeline::Distribution))
//! - Medit and plain-text debugging output
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! parmesh = "0.1"
//! # features = ["mpi-support"]
//! ```
//!
//! A run builds a [`DistributedMesh`](parmesh::DistributedMesh), adds its
//! groups, splits the memory ceiling with
//! [`set_mem_max`](parmesh::DistributedMesh::set_mem_max) and hands the
//! container to [`Remesher::run_centralized`](pipeline::Remesher::run_centralized)
//! or [`Remesher::run_distributed`](pipeline::Remesher::run_distributed).
//! The returned severity tells the caller whether the container is usable.

pub mod algs;
pub mod debug_invariants;
pub mod io;
pub mod memory;
pub mod mesh;
pub mod mesh_error;
pub mod parmesh;
pub mod pipeline;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::checkpoint::Checkpoint;
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::memory::{Block, MemBudget, MemError, check_mem_max_and_mem_cur};
    pub use crate::mesh::{Group, Mesh, MeshOptions, Point, Sol, Tetra};
    pub use crate::mesh_error::ParMeshError;
    pub use crate::parmesh::{CommState, DistributedMesh, ParMeshInfo};
    pub use crate::pipeline::{
        Distribution, RemeshKernel, Remesher, SerialDistribution, Severity, check_input_data,
    };
}
