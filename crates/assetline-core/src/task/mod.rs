//! Cancellable load tasks and bulk orchestration.
//!
//! Cancellation is cooperative: aborting suppresses result propagation and
//! stops scheduling work that has not started. Fetches already dispatched are
//! never preempted and may still populate the cache.

mod load_task;
mod orchestrator;

pub use load_task::{LoadFailure, LoadTask, TaskControl, TaskOutcome, TaskState};
pub use orchestrator::{LoadHandle, LoadItem, LoadOrchestrator, LoadProgress, LoadResults};
