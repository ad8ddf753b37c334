//! Tile request scheduling.
//!
//! [`TileScheduler`] accepts tile requests from the viewport, renders them on
//! a bounded executor and reports every result to a [`TileSink`]. Admission
//! favours the most recent request: when the system is busy, new requests go
//! onto a LIFO backlog, and each finished render pulls the newest waiting
//! request before anything older.
//!
//! # Architecture
//!
//! ```text
//!                request_tile(index)
//!                        │
//!            ┌───────────┴────────────┐
//!   backlog empty and            otherwise
//!   chain slot free                  │
//!            │                       ▼
//!            │                 BacklogStack.push
//!            ▼                       │
//!    executor.submit ◄──── pop newest ┘
//!            │                 ▲
//!            ▼                 │
//!   render ──► sink ──► drain_next (pop or end chain)
//! ```
//!
//! A *chain* is a sequence of units where each one submits the next backlog
//! entry as it finishes. At most `max_chains` chains are active at once, so
//! with the default of one chain the render order after a burst is the
//! direct request followed by the backlog newest-first.

mod backlog;

pub use backlog::{BacklogStack, PendingRequest};

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigError, TileServerConfig};
use crate::coord::{PlaneMapper, PlaneRegion, TileIndex};
use crate::executor::{BoundedExecutor, ExecutorError, UnitExecutor};
use crate::fractal::{FractalRenderer, HsbPalette, Palette, RenderError, TilePixels};

// =============================================================================
// Errors
// =============================================================================

/// Why a requested tile produced no pixels.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TileError {
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Render panicked: {0}")]
    Panicked(String),

    #[error("Executor rejected tile: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Tile {index} is outside served range (levels {min}..={max})")]
    OutOfRange { index: TileIndex, min: u8, max: u8 },
}

/// Errors building a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create executor: {0}")]
    Executor(#[from] ExecutorError),
}

// =============================================================================
// Sink
// =============================================================================

/// Receives rendered tiles.
///
/// Called from worker threads, once per accepted request. Implementations
/// must not block for long; the worker is not released to the next backlog
/// entry until the call returns.
pub trait TileSink: Send + Sync + 'static {
    fn on_tile_ready(&self, index: TileIndex, result: Result<TilePixels, TileError>);
}

impl<F> TileSink for F
where
    F: Fn(TileIndex, Result<TilePixels, TileError>) + Send + Sync + 'static,
{
    fn on_tile_ready(&self, index: TileIndex, result: Result<TilePixels, TileError>) {
        self(index, result)
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Point-in-time scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Calls to `request_tile`
    pub requested: u64,
    /// Requests submitted straight to the executor
    pub direct: u64,
    /// Requests pushed onto the backlog
    pub backlogged: u64,
    /// Render units that started on a worker
    pub executed: u64,
    /// Tiles reported with pixels
    pub rendered: u64,
    /// Tiles reported with an error (including out-of-range)
    pub failed: u64,
    /// Requests waiting in the backlog now
    pub backlog_len: usize,
    /// Drain chains active now
    pub active_chains: usize,
}

impl SchedulerStats {
    /// Requests accepted but not yet reported.
    pub fn in_flight(&self) -> u64 {
        self.requested.saturating_sub(self.rendered + self.failed)
    }
}

#[derive(Debug, Default)]
struct Counters {
    requested: AtomicU64,
    direct: AtomicU64,
    backlogged: AtomicU64,
    executed: AtomicU64,
    rendered: AtomicU64,
    failed: AtomicU64,
}

// =============================================================================
// Scheduler
// =============================================================================

/// Accepts tile requests and renders them newest-first on a bounded executor.
///
/// Cloning is cheap; clones share the same backlog and executor.
///
/// # Example
///
/// ```no_run
/// use mandeltiles::config::TileServerConfig;
/// use mandeltiles::coord::TileIndex;
/// use mandeltiles::fractal::TilePixels;
/// use mandeltiles::scheduler::{TileError, TileScheduler};
///
/// let sink = |index: TileIndex, result: Result<TilePixels, TileError>| {
///     println!("{} ready: {}", index, result.is_ok());
/// };
/// let scheduler = TileScheduler::new(TileServerConfig::default(), sink).unwrap();
///
/// scheduler.request_tile(TileIndex::new(2, 0, 0));
/// ```
#[derive(Clone)]
pub struct TileScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    mapper: PlaneMapper,
    renderer: FractalRenderer,
    palette: Arc<dyn Palette>,
    sink: Arc<dyn TileSink>,
    executor: Arc<dyn UnitExecutor>,
    backlog: BacklogStack,
    active_chains: AtomicUsize,
    max_chains: usize,
    server_name: String,
    counters: Counters,
}

impl TileScheduler {
    /// Creates a scheduler with the default palette and its own bounded
    /// executor.
    pub fn new(config: TileServerConfig, sink: impl TileSink) -> Result<Self, SchedulerError> {
        Self::builder(config).build(sink)
    }

    /// Starts a builder for custom executor or palette.
    pub fn builder(config: TileServerConfig) -> TileSchedulerBuilder {
        TileSchedulerBuilder {
            config,
            executor: None,
            palette: None,
        }
    }

    /// Requests a tile.
    ///
    /// Never blocks on rendering. The sink is called exactly once for this
    /// request: from a worker thread once the tile is rendered, or
    /// synchronously from this call when the tile is not served (level
    /// out of range, or a column or row too far out to map exactly).
    pub fn request_tile(&self, index: TileIndex) {
        let inner = &self.inner;
        inner.counters.requested.fetch_add(1, Ordering::Relaxed);

        if !inner.mapper.contains(&index) {
            debug!(tile = %index, "Tile outside served range");
            inner.report(
                index,
                Err(TileError::OutOfRange {
                    index,
                    min: inner.mapper.min_level(),
                    max: inner.mapper.max_level(),
                }),
            );
            return;
        }

        let request = PendingRequest {
            index,
            region: inner.mapper.map_tile(&index),
        };

        if inner.backlog.is_empty_hint() && inner.try_claim_chain() {
            inner.counters.direct.fetch_add(1, Ordering::Relaxed);
            trace!(tile = %index, "Direct submission");
            inner.dispatch(request);
        } else {
            inner.counters.backlogged.fetch_add(1, Ordering::Relaxed);
            inner.backlog.push(request);
            trace!(tile = %index, backlog = inner.backlog.len(), "Backlogged");
            inner.resume();
        }
    }

    /// Plane region a tile covers.
    pub fn region_for(&self, index: &TileIndex) -> PlaneRegion {
        self.inner.mapper.map_tile(index)
    }

    /// Whether the tile is served; see [`PlaneMapper::contains`].
    pub fn contains(&self, index: &TileIndex) -> bool {
        self.inner.mapper.contains(index)
    }

    /// Tile side length in pixels.
    pub fn tile_size(&self) -> u32 {
        self.inner.renderer.resolution()
    }

    pub fn min_level(&self) -> u8 {
        self.inner.mapper.min_level()
    }

    pub fn max_level(&self) -> u8 {
        self.inner.mapper.max_level()
    }

    pub fn server_name(&self) -> &str {
        &self.inner.server_name
    }

    pub fn max_chains(&self) -> usize {
        self.inner.max_chains
    }

    /// Snapshot of the scheduler counters.
    pub fn stats(&self) -> SchedulerStats {
        let c = &self.inner.counters;
        SchedulerStats {
            requested: c.requested.load(Ordering::Relaxed),
            direct: c.direct.load(Ordering::Relaxed),
            backlogged: c.backlogged.load(Ordering::Relaxed),
            executed: c.executed.load(Ordering::Relaxed),
            rendered: c.rendered.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            backlog_len: self.inner.backlog.len(),
            active_chains: self.inner.active_chains.load(Ordering::SeqCst),
        }
    }
}

impl std::fmt::Debug for TileScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileScheduler")
            .field("server_name", &self.inner.server_name)
            .field("mapper", &self.inner.mapper)
            .field("renderer", &self.inner.renderer)
            .field("max_chains", &self.inner.max_chains)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Inner {
    fn try_claim_chain(&self) -> bool {
        let mut current = self.active_chains.load(Ordering::SeqCst);
        while current < self.max_chains {
            match self.active_chains.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    fn release_chain(&self) {
        self.active_chains.fetch_sub(1, Ordering::SeqCst);
    }

    /// Starts chains for backlog entries while slots are free.
    ///
    /// Runs after every push and every chain end. Both sides publish their
    /// change before checking the other, so an entry pushed while the last
    /// chain is ending is picked up by one of them.
    fn resume(self: &Arc<Self>) {
        while !self.backlog.is_empty_hint() && self.try_claim_chain() {
            match self.backlog.try_pop() {
                Some(request) => {
                    self.dispatch(request);
                    return;
                }
                None => self.release_chain(),
            }
        }
    }

    /// Submits `request` on the calling chain.
    ///
    /// When the executor refuses, the tile is reported as failed and the
    /// chain moves on to the next backlog entry.
    fn dispatch(self: &Arc<Self>, mut request: PendingRequest) {
        loop {
            let handoff = Arc::new(AtomicU8::new(HANDOFF_SUBMITTING));
            let unit = RenderUnit {
                inner: Arc::clone(self),
                request: Some(request),
                handoff: Arc::clone(&handoff),
            };
            let submitted = self.executor.submit(Box::new(move || unit.run()));
            let dropped = handoff.swap(HANDOFF_SUBMITTED, Ordering::SeqCst) == HANDOFF_DROPPED;

            let error = match submitted {
                Ok(()) if !dropped => return,
                Ok(()) => ExecutorError::Closed,
                Err(e) => e,
            };
            warn!(tile = %request.index, error = %error, "Executor refused tile");
            let unwind = DrainOnDrop { inner: self };
            self.report(request.index, Err(TileError::Executor(error)));
            // The sink returned, so this loop continues the chain itself
            std::mem::forget(unwind);

            match self.backlog.try_pop() {
                Some(next) => request = next,
                None => {
                    self.end_chain();
                    return;
                }
            }
        }
    }

    /// Handles a unit the executor accepted but dropped without running.
    fn abandon(self: &Arc<Self>, request: PendingRequest) {
        warn!(tile = %request.index, "Executor discarded tile before running it");
        let _drain = DrainOnDrop { inner: self };
        self.report(
            request.index,
            Err(TileError::Executor(ExecutorError::Closed)),
        );
    }

    /// Body of a work unit.
    fn execute(self: &Arc<Self>, request: PendingRequest) {
        let _drain = DrainOnDrop { inner: self };
        self.counters.executed.fetch_add(1, Ordering::Relaxed);

        let result = catch_unwind(AssertUnwindSafe(|| {
            self.renderer.render(&request.region, self.palette.as_ref())
        }))
        .map_err(|payload| TileError::Panicked(panic_message(payload.as_ref())))
        .and_then(|rendered| rendered.map_err(TileError::from));

        if let Err(ref e) = result {
            warn!(tile = %request.index, error = %e, "Tile render failed");
        }
        self.report(request.index, result);
    }

    /// Continues the chain after a unit finishes.
    fn drain_next(self: &Arc<Self>) {
        match self.backlog.try_pop() {
            Some(request) => self.dispatch(request),
            None => self.end_chain(),
        }
    }

    fn end_chain(self: &Arc<Self>) {
        self.release_chain();
        self.resume();
    }

    fn report(&self, index: TileIndex, result: Result<TilePixels, TileError>) {
        let counter = if result.is_ok() {
            &self.counters.rendered
        } else {
            &self.counters.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.sink.on_tile_ready(index, result);
    }
}

const HANDOFF_SUBMITTING: u8 = 0;
const HANDOFF_SUBMITTED: u8 = 1;
const HANDOFF_DROPPED: u8 = 2;

/// A render request in the executor's hands.
///
/// If the executor drops it unrun, whichever side sees the drop second
/// reports the tile: `dispatch` when the drop happened inside `submit`,
/// the unit itself when it happened later.
struct RenderUnit {
    inner: Arc<Inner>,
    request: Option<PendingRequest>,
    handoff: Arc<AtomicU8>,
}

impl RenderUnit {
    fn run(mut self) {
        if let Some(request) = self.request.take() {
            self.inner.execute(request);
        }
    }
}

impl Drop for RenderUnit {
    fn drop(&mut self) {
        if let Some(request) = self.request.take() {
            if self.handoff.swap(HANDOFF_DROPPED, Ordering::SeqCst) == HANDOFF_SUBMITTED {
                self.inner.abandon(request);
            }
        }
    }
}

/// Runs `drain_next` when dropped, including while the sink unwinds.
struct DrainOnDrop<'a> {
    inner: &'a Arc<Inner>,
}

impl Drop for DrainOnDrop<'_> {
    fn drop(&mut self) {
        self.inner.drain_next();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`TileScheduler`].
pub struct TileSchedulerBuilder {
    config: TileServerConfig,
    executor: Option<Arc<dyn UnitExecutor>>,
    palette: Option<Arc<dyn Palette>>,
}

impl TileSchedulerBuilder {
    /// Uses an existing executor instead of creating a [`BoundedExecutor`].
    ///
    /// The `workers` setting is ignored in that case.
    pub fn with_executor(mut self, executor: Arc<dyn UnitExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_palette(mut self, palette: impl Palette + 'static) -> Self {
        self.palette = Some(Arc::new(palette));
        self
    }

    /// Validates the configuration and creates the scheduler.
    pub fn build(self, sink: impl TileSink) -> Result<TileScheduler, SchedulerError> {
        let config = self.config;
        config.validate()?;

        let executor = match self.executor {
            Some(executor) => executor,
            None => Arc::new(BoundedExecutor::new(config.worker_count())?),
        };
        let palette = self
            .palette
            .unwrap_or_else(|| Arc::new(HsbPalette::default()));

        info!(
            server = %config.server_name,
            tile_size = config.tile_size,
            max_iterations = config.max_iterations,
            levels = %format!("{}..={}", config.min_level, config.max_level),
            max_chains = config.max_chains,
            "Tile scheduler ready"
        );

        Ok(TileScheduler {
            inner: Arc::new(Inner {
                mapper: PlaneMapper::new(config.root, config.min_level, config.max_level),
                renderer: FractalRenderer::new(config.tile_size, config.max_iterations),
                palette,
                sink: Arc::new(sink),
                executor,
                backlog: BacklogStack::new(),
                active_chains: AtomicUsize::new(0),
                max_chains: config.max_chains,
                server_name: config.server_name,
                counters: Counters::default(),
            }),
        })
    }
}
