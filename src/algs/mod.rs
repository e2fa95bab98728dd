//! Collective building blocks: communicator backends and phase checkpoints.

pub mod checkpoint;
pub mod communicator;

pub use checkpoint::Checkpoint;
