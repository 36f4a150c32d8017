//! Runtime core: the process supervisor and its lifecycle plumbing.
//!
//! - [`supervisor`]: startup, liveness monitoring, restarts and shutdown;
//! - [`pipeline`]: the tracked stage processes;
//! - [`shutdown`]: cross-platform termination signal handling.

mod pipeline;
mod shutdown;
mod supervisor;

pub use shutdown::ShutdownSignals;
pub use supervisor::ProcessSupervisor;
