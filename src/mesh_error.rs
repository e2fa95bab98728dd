//! ParMeshError: Unified error type for parmesh public APIs
//!
//! Fallible operations of the container, the kernel collaborators and the
//! diagnostics return this type. The pipeline controller never propagates it
//! to its caller: errors are logged and classified into a [`Severity`].
//!
//! [`Severity`]: crate::pipeline::severity::Severity

use thiserror::Error;

use crate::memory::MemError;

/// Unified error type for parmesh operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParMeshError {
    /// A budgeted allocation was refused or failed.
    #[error(transparent)]
    Mem(#[from] MemError),
    /// The communicators were released; no further distributed phase may run.
    #[error("communicators already released")]
    CommunicatorsReleased,
    /// A collective message was missing or malformed.
    #[error("communication with rank {peer} failed: {reason}")]
    CommFailure { peer: usize, reason: &'static str },
    /// MPI could not be initialized (or was initialized twice).
    #[error("MPI initialization failed")]
    MpiInit,
    /// A reduction produced a value outside the severity domain.
    #[error("invalid severity code {0}")]
    InvalidSeverity(i32),
    /// Input data or options that the pipeline does not support.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// The container holds no group where one is required.
    #[error("no group {0} on this rank")]
    MissingGroup(usize),
    /// A group is missing its mesh or metric.
    #[error("group {0} has no mesh or metric")]
    EmptyGroup(usize),
    /// `memCur` exceeds `memMax` on a single structure.
    #[error("memory counter overrun: {cur} bytes charged, {max} allowed")]
    BudgetOverrun { cur: usize, max: usize },
    /// Active counts exceed allocated capacity.
    #[error("mesh counts exceed capacity (np={np}, ne={ne})")]
    CountExceedsCapacity { np: usize, ne: usize },
    /// A tetrahedron references three or more null vertices.
    #[error("tetra {tetra} references null vertices")]
    NullVertexTetra { tetra: usize },
    /// The bounding box of the mesh is degenerate; it cannot be scaled.
    #[error("degenerate bounding box (extent {0})")]
    DegenerateBoundingBox(f64),
    /// More than two tetrahedra share a face.
    #[error("non-manifold face shared by tetra {first}, {second} and {third}")]
    NonManifoldFace {
        first: usize,
        second: usize,
        third: usize,
    },
    /// Adjacency has not been built for the mesh.
    #[error("adjacency table is missing")]
    MissingAdjacency,
    /// An external collaborator (kernel, distribution) reported failure.
    #[error("{0} failed")]
    Collaborator(&'static str),
    /// Filesystem error while writing diagnostics.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ParMeshError {
    fn from(e: std::io::Error) -> Self {
        ParMeshError::Io(e.to_string())
    }
}
