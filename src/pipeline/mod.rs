//! Remeshing pipeline: phase outcomes, input validation, the kernel and
//! distribution seams, and the collective controller that sequences them.

pub mod check;
pub mod controller;
pub mod distribution;
pub mod kernel;
pub mod preprocess;
pub mod severity;

pub use check::check_input_data;
pub use controller::{Finalize, Remesher};
pub use distribution::{Distribution, SerialDistribution};
pub use kernel::RemeshKernel;
pub use severity::Severity;
