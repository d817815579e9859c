//! Worker primitives for the session engine.
//!
//! * [`spawn`]: classified task spawning.
//! * [`OperationQueue`]: strict FIFO, one-at-a-time execution of async operations.
//! * [`Debouncer`]: coalesces bursts of triggers into one task after a quiet period.

mod class;
mod debounce;
mod queue;
mod spawn;

pub use class::TaskClass;
pub use debounce::Debouncer;
pub use queue::{OperationQueue, QueueError};
pub use spawn::spawn;
