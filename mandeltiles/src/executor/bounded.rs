//! Fixed-ceiling executor on Tokio's blocking pool.
//!
//! At most `workers` units run at once. Submissions go into one unbounded
//! channel read by a single dispatcher task. The dispatcher takes a permit
//! from a semaphore for each unit in channel order, then hands the unit to a
//! blocking thread that releases the permit when it returns. Overflow
//! therefore starts in submission order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{ExecutorError, UnitExecutor, WorkUnit};

/// Workers per CPU.
pub const DEFAULT_WORKER_MULTIPLIER: usize = 10;

/// Fallback CPU count when detection fails.
pub const FALLBACK_CPU_COUNT: usize = 4;

/// Async threads driving the dispatcher (units never run on these).
const DRIVER_THREADS: usize = 2;

/// Computes the default worker ceiling: `cpus × DEFAULT_WORKER_MULTIPLIER`.
///
/// - 4 cores: 40 workers
/// - 8 cores: 80 workers
pub fn default_worker_count() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(FALLBACK_CPU_COUNT);
    cpus * DEFAULT_WORKER_MULTIPLIER
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    completed: AtomicUsize,
    panicked: AtomicUsize,
    discarded: AtomicUsize,
}

/// Executor running at most `workers` units concurrently.
///
/// # Example
///
/// ```
/// use mandeltiles::executor::{BoundedExecutor, UnitExecutor};
/// use std::sync::mpsc;
///
/// let executor = BoundedExecutor::new(4).unwrap();
/// let (tx, rx) = mpsc::channel();
/// executor.submit(Box::new(move || tx.send(42).unwrap())).unwrap();
/// assert_eq!(rx.recv().unwrap(), 42);
/// ```
pub struct BoundedExecutor {
    queue: UnboundedSender<WorkUnit>,
    permits: Arc<Semaphore>,
    workers: usize,
    counters: Arc<Counters>,
    /// Present when this executor owns its runtime.
    runtime: Option<Runtime>,
}

impl BoundedExecutor {
    /// Creates an executor with its own runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::NoWorkers`] if `workers` is zero, or
    /// [`ExecutorError::RuntimeCreation`] if the runtime cannot be built.
    pub fn new(workers: usize) -> Result<Self, ExecutorError> {
        if workers == 0 {
            return Err(ExecutorError::NoWorkers);
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(DRIVER_THREADS)
            .max_blocking_threads(workers)
            .thread_name("mandeltiles-worker")
            .build()
            .map_err(|e| ExecutorError::RuntimeCreation(e.to_string()))?;

        let handle = runtime.handle().clone();
        let mut executor = Self::build(handle, workers);
        executor.runtime = Some(runtime);
        Ok(executor)
    }

    /// Creates an executor with the default worker ceiling.
    pub fn with_default_workers() -> Result<Self, ExecutorError> {
        Self::new(default_worker_count())
    }

    /// Creates an executor on an existing runtime.
    ///
    /// The runtime's blocking pool must allow at least `workers` threads
    /// for the ceiling to be reached.
    pub fn with_handle(handle: Handle, workers: usize) -> Result<Self, ExecutorError> {
        if workers == 0 {
            return Err(ExecutorError::NoWorkers);
        }
        Ok(Self::build(handle, workers))
    }

    fn build(handle: Handle, workers: usize) -> Self {
        let (queue, pending) = mpsc::unbounded_channel();
        let permits = Arc::new(Semaphore::new(workers));
        let counters = Arc::new(Counters::default());

        handle.spawn(run_dispatcher(
            pending,
            Arc::clone(&permits),
            Arc::clone(&counters),
        ));

        info!(workers, "Created bounded executor");
        Self {
            queue,
            permits,
            workers,
            counters,
            runtime: None,
        }
    }

    /// Concurrency ceiling.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Units currently running.
    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::Acquire)
    }

    /// Highest number of units ever running at once.
    pub fn peak_active(&self) -> usize {
        self.counters.peak_active.load(Ordering::Acquire)
    }

    /// Units submitted but not yet started.
    pub fn queued(&self) -> usize {
        self.counters.queued.load(Ordering::Acquire)
    }

    /// Units that ran to completion (including ones that panicked).
    pub fn completed(&self) -> usize {
        self.counters.completed.load(Ordering::Acquire)
    }

    /// Units that panicked.
    pub fn panicked(&self) -> usize {
        self.counters.panicked.load(Ordering::Acquire)
    }

    /// Queued units dropped by [`close`](Self::close).
    pub fn discarded(&self) -> usize {
        self.counters.discarded.load(Ordering::Acquire)
    }

    /// Stops accepting work.
    ///
    /// Running units finish; queued units are dropped without running.
    pub fn close(&self) {
        if !self.permits.is_closed() {
            info!(queued = self.queued(), "Closing bounded executor");
            self.permits.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

impl UnitExecutor for BoundedExecutor {
    fn submit(&self, unit: WorkUnit) -> Result<(), ExecutorError> {
        if self.permits.is_closed() {
            return Err(ExecutorError::Closed);
        }

        self.counters.queued.fetch_add(1, Ordering::AcqRel);
        if self.queue.send(unit).is_err() {
            // Dispatcher already stopped; the unit comes back inside the error
            self.counters.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(ExecutorError::Closed);
        }
        Ok(())
    }
}

/// Takes units in channel order, waiting for a free permit before each one.
///
/// Once the semaphore is closed the channel is closed too and everything
/// still buffered is discarded.
async fn run_dispatcher(
    mut pending: UnboundedReceiver<WorkUnit>,
    permits: Arc<Semaphore>,
    counters: Arc<Counters>,
) {
    while let Some(unit) = pending.recv().await {
        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                discard(&counters, unit);
                break;
            }
        };
        counters.queued.fetch_sub(1, Ordering::AcqRel);

        let running = Arc::clone(&counters);
        tokio::task::spawn_blocking(move || {
            let now_active = running.active.fetch_add(1, Ordering::AcqRel) + 1;
            running.peak_active.fetch_max(now_active, Ordering::AcqRel);
            let outcome = catch_unwind(AssertUnwindSafe(unit));
            running.active.fetch_sub(1, Ordering::AcqRel);

            running.completed.fetch_add(1, Ordering::AcqRel);
            if outcome.is_err() {
                running.panicked.fetch_add(1, Ordering::AcqRel);
                warn!("Work unit panicked");
            }
            drop(permit);
        });
    }

    pending.close();
    while let Ok(unit) = pending.try_recv() {
        discard(&counters, unit);
    }
}

fn discard(counters: &Counters, unit: WorkUnit) {
    counters.queued.fetch_sub(1, Ordering::AcqRel);
    counters.discarded.fetch_add(1, Ordering::AcqRel);
    debug!("Executor closed, discarding queued unit");
    drop(unit);
}

impl std::fmt::Debug for BoundedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedExecutor")
            .field("workers", &self.workers)
            .field("active", &self.active())
            .field("queued", &self.queued())
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}

impl Drop for BoundedExecutor {
    fn drop(&mut self) {
        // The last reference can be released from one of our own worker
        // threads, where a blocking shutdown would deadlock.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
