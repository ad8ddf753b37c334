//! Bounded-concurrency execution of render units.
//!
//! The scheduler depends only on [`UnitExecutor::submit`]; everything about
//! worker threads, queuing and the concurrency ceiling stays behind that
//! seam.
//!
//! # Architecture
//!
//! ```text
//!  submit(unit) ──► unbounded channel (FIFO) ──► dispatcher task
//!                                                │
//!                                                ▼
//!                                   acquire permit (K permits)
//!                                                │
//!                                                ▼
//!                                   spawn_blocking(unit) on a worker
//!                                                │
//!                                                ▼
//!                                     permit released on completion
//! ```

mod bounded;

pub use bounded::{
    default_worker_count, BoundedExecutor, DEFAULT_WORKER_MULTIPLIER, FALLBACK_CPU_COUNT,
};

use thiserror::Error;

/// A unit of work: runs once, start to finish, on a worker thread.
pub type WorkUnit = Box<dyn FnOnce() + Send + 'static>;

/// Errors from the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// The executor no longer accepts work.
    #[error("Executor is closed")]
    Closed,

    /// The worker runtime could not be created.
    #[error("Failed to create worker runtime: {0}")]
    RuntimeCreation(String),

    /// Zero workers requested.
    #[error("Worker count must be > 0")]
    NoWorkers,
}

/// Runs submitted units under some concurrency policy.
///
/// `submit` must return promptly without waiting for the unit to start.
pub trait UnitExecutor: Send + Sync + 'static {
    /// Schedules `unit` for execution.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Closed`] if the executor has stopped
    /// accepting work. The unit is dropped without running.
    fn submit(&self, unit: WorkUnit) -> Result<(), ExecutorError>;
}
