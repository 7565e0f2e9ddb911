//! Bounded worker pool running submitted jobs on long-lived tokio tasks.
//!
//! Jobs travel through three queues:
//!
//! - **input**: a rendezvous channel that `submit` hands jobs to;
//! - **ready**: a bounded channel (capacity = `queue_capacity`, possibly 0)
//!   workers read from;
//! - **overflow**: an unbounded FIFO used only in non-blocking mode.
//!
//! A single dispatcher moves jobs from input to ready. When ready is full it
//! spawns a worker if the pool is below capacity, then either parks the job in
//! overflow (non-blocking mode) or waits until a worker takes it (blocking
//! mode, the default).
//!
//! # Example
//!
//! ```rust,ignore
//! use prometheus_async_core::core::{Context, PoolOptions, WorkerPool};
//!
//! let pool = WorkerPool::new(4, PoolOptions::new().with_prefill(2))?;
//! pool.submit(Context::new(), |ctx| async move {
//!     if !ctx.is_cancelled() {
//!         do_work().await;
//!     }
//! })
//! .await;
//! pool.close();
//! ```

mod dispatcher;
mod worker;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::{Context, PoolError};
use crate::runtime::{Spawn, TokioSpawner};
use crate::util::telemetry::{LogSink, PanicSink, Sinks};

/// Capacity used when a pool is created with capacity 0.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Construction options for a [`WorkerPool`].
#[derive(Clone, Default)]
pub struct PoolOptions {
    prefill: usize,
    idle_timeout: Option<Duration>,
    queue_capacity: usize,
    non_blocking: bool,
    panic_sink: Option<PanicSink>,
    log_sink: Option<LogSink>,
    handle: Option<Handle>,
}

impl PoolOptions {
    /// Defaults: no pre-fill, no idle reaping, rendezvous ready queue, blocking mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn this many workers eagerly (capped at capacity).
    #[must_use]
    pub fn with_prefill(mut self, prefill: usize) -> Self {
        self.prefill = prefill;
        self
    }

    /// Reap workers idle for longer than `timeout`.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Buffer up to `capacity` jobs between the dispatcher and the workers.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Park jobs in the unbounded overflow list instead of blocking the dispatcher.
    #[must_use]
    pub fn with_non_blocking(mut self) -> Self {
        self.non_blocking = true;
        self
    }

    /// Receive recovered handler panics.
    #[must_use]
    pub fn with_panic_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&Context, &(dyn std::any::Any + Send), &std::backtrace::Backtrace)
            + Send
            + Sync
            + 'static,
    {
        self.panic_sink = Some(Arc::new(sink));
        self
    }

    /// Receive the pool's drop and failure messages.
    #[must_use]
    pub fn with_log_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&Context, &str) + Send + Sync + 'static,
    {
        self.log_sink = Some(Arc::new(sink));
        self
    }

    /// Spawn the pool's tasks on `handle` instead of the current runtime.
    #[must_use]
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub(crate) fn set_panic_sink(&mut self, sink: Option<PanicSink>) {
        if sink.is_some() {
            self.panic_sink = sink;
        }
    }

    pub(crate) fn set_log_sink(&mut self, sink: Option<LogSink>) {
        if sink.is_some() {
            self.log_sink = sink;
        }
    }
}

impl fmt::Debug for PoolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("prefill", &self.prefill)
            .field("idle_timeout", &self.idle_timeout)
            .field("queue_capacity", &self.queue_capacity)
            .field("non_blocking", &self.non_blocking)
            .field("panic_sink", &self.panic_sink.is_some())
            .field("log_sink", &self.log_sink.is_some())
            .finish_non_exhaustive()
    }
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Maximum number of workers.
    pub capacity: usize,
    /// Workers currently alive (including ones finishing after a reap).
    pub workers: usize,
    /// Handlers executing right now.
    pub running: u64,
    /// Jobs waiting in the ready queue and the overflow list.
    pub queued: usize,
    /// Jobs accepted by `submit`.
    pub submitted: u64,
    /// Handlers that ran to completion.
    pub completed: u64,
    /// Handlers that panicked.
    pub panicked: u64,
    /// Jobs discarded without running (cancelled scope or pool closed).
    pub dropped: u64,
    /// Jobs that went through the overflow list.
    pub overflowed: u64,
    /// Workers retired by the idle reaper.
    pub reaped: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub running: AtomicU64,
    pub submitted: AtomicU64,
    pub completed: AtomicU64,
    pub panicked: AtomicU64,
    pub dropped: AtomicU64,
    pub overflowed: AtomicU64,
    pub reaped: AtomicU64,
}

/// The caller's closure, boxed so a worker can call it.
pub(crate) type JobFn = Box<dyn FnOnce(Context) -> BoxFuture<'static, ()> + Send>;

/// A submitted job: its scope and the closure a worker calls with it.
pub(crate) struct Job {
    pub ctx: Context,
    pub run: JobFn,
}

/// Book-keeping for one live worker.
#[derive(Debug)]
struct WorkerSlot {
    last_used: Instant,
    busy: bool,
    cancel: CancellationToken,
}

/// State shared by the pool handle, the dispatcher, the reaper and the workers.
pub(crate) struct PoolShared {
    capacity: usize,
    prefill: usize,
    non_blocking: bool,
    input_tx: Mutex<Option<flume::Sender<Job>>>,
    ready_rx: flume::Receiver<Job>,
    overflow_tx: crossbeam_channel::Sender<Job>,
    overflow_rx: crossbeam_channel::Receiver<Job>,
    /// Signalled when a job lands in overflow.
    overflow_ready: Notify,
    /// Signalled when a worker leaves the map.
    worker_exited: Notify,
    workers: Mutex<HashMap<Uuid, WorkerSlot>>,
    closed: AtomicBool,
    cancel: CancellationToken,
    counters: PoolCounters,
    sinks: Sinks,
    spawner: TokioSpawner,
}

impl PoolShared {
    /// Spawn one worker unless the pool is closed or at capacity.
    ///
    /// The capacity check and the map insertion happen under the same lock.
    fn spawn_worker(self: &Arc<Self>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let id = Uuid::new_v4();
        let cancel = self.cancel.child_token();
        {
            let mut workers = self.workers.lock();
            if workers.len() >= self.capacity {
                return false;
            }
            workers.insert(
                id,
                WorkerSlot {
                    last_used: Instant::now(),
                    busy: false,
                    cancel: cancel.clone(),
                },
            );
        }
        self.spawner.spawn(worker::run(Arc::clone(self), id, cancel));
        debug!(worker_id = %id, "Spawned pool worker");
        true
    }

    /// Workers that are alive, not reaped and not running a handler.
    fn idle_workers(&self) -> usize {
        self.workers
            .lock()
            .values()
            .filter(|slot| !slot.busy && !slot.cancel.is_cancelled())
            .count()
    }

    fn backlog(&self) -> usize {
        self.ready_rx.len() + self.overflow_rx.len()
    }

    fn set_busy(&self, id: Uuid, busy: bool) {
        if let Some(slot) = self.workers.lock().get_mut(&id) {
            slot.busy = busy;
            slot.last_used = Instant::now();
        }
    }

    /// Remove an exiting worker and replace it if work is still queued.
    fn retire(self: &Arc<Self>, id: Uuid) {
        self.workers.lock().remove(&id);
        self.worker_exited.notify_one();
        if !self.cancel.is_cancelled() && self.backlog() > 0 {
            self.spawn_worker();
        }
    }

    /// Discard everything still queued; returns how many jobs were dropped.
    fn drain_queued(&self) -> usize {
        let discarded = self.ready_rx.drain().count() + self.overflow_rx.try_iter().count();
        self.counters
            .dropped
            .fetch_add(discarded as u64, Ordering::Relaxed);
        discarded
    }

    fn drop_job(&self, ctx: &Context, reason: &str) {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        self.sinks.log(ctx, reason);
    }
}

/// Bounded pool of long-lived workers.
///
/// At most `capacity` handlers run at once. Each handler runs inside a panic
/// recovery scope; a panic is reported to the panic sink and the worker keeps
/// serving jobs. Dropping the pool closes it.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
}

impl WorkerPool {
    /// Create a pool allowing `capacity` concurrent handlers (0 selects
    /// [`DEFAULT_CAPACITY`]).
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` for a zero idle timeout
    /// - `PoolError::NoRuntime` when no handle is given and no runtime is current
    pub fn new(capacity: usize, options: PoolOptions) -> Result<Self, PoolError> {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };
        if options.idle_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(PoolError::InvalidConfig(
                "idle_timeout must be greater than 0".into(),
            ));
        }
        let spawner = TokioSpawner::resolve(options.handle)?;

        let (input_tx, input_rx) = flume::bounded::<Job>(0);
        let (ready_tx, ready_rx) = flume::bounded::<Job>(options.queue_capacity);
        let (overflow_tx, overflow_rx) = crossbeam_channel::unbounded::<Job>();
        let prefill = options.prefill.min(capacity);

        let shared = Arc::new(PoolShared {
            capacity,
            prefill,
            non_blocking: options.non_blocking,
            input_tx: Mutex::new(Some(input_tx)),
            ready_rx,
            overflow_tx,
            overflow_rx,
            overflow_ready: Notify::new(),
            worker_exited: Notify::new(),
            workers: Mutex::new(HashMap::with_capacity(prefill)),
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            counters: PoolCounters::default(),
            sinks: Sinks::new(options.log_sink, options.panic_sink),
            spawner,
        });

        for _ in 0..prefill {
            shared.spawn_worker();
        }
        shared
            .spawner
            .spawn(dispatcher::run(Arc::clone(&shared), input_rx, ready_tx));
        if let Some(timeout) = options.idle_timeout {
            shared
                .spawner
                .spawn(worker::reap_idle(Arc::clone(&shared), timeout));
        }

        info!(
            capacity,
            prefill,
            queue_capacity = options.queue_capacity,
            non_blocking = options.non_blocking,
            idle_timeout = ?options.idle_timeout,
            "WorkerPool started"
        );

        Ok(Self { shared })
    }

    /// Submit a job for asynchronous execution.
    ///
    /// `f` is called on a worker with `ctx`, so both its synchronous body and
    /// the future it returns count against the capacity and run inside the
    /// worker's panic recovery. Waits only for the dispatcher to take the job. A job whose scope is already cancelled, or is cancelled while
    /// waiting, is dropped; so is any job submitted after [`close`](Self::close).
    pub async fn submit<F, Fut>(&self, ctx: Context, f: F)
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some((tx, job)) = self.admit(ctx, f) else {
            return;
        };
        let scope = job.ctx.clone();
        tokio::select! {
            sent = tx.send_async(job) => {
                if sent.is_err() {
                    self.shared.drop_job(&scope, "pool closed before the job was dispatched");
                }
            }
            () = scope.cancelled() => {
                debug!("Submission cancelled while waiting for the dispatcher");
                self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Blocking variant of [`submit`](Self::submit) for synchronous callers.
    ///
    /// Must not be called from within an async task: it parks the thread until
    /// the dispatcher takes the job.
    pub fn blocking_submit<F, Fut>(&self, ctx: Context, f: F)
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some((tx, job)) = self.admit(ctx, f) else {
            return;
        };
        let scope = job.ctx.clone();
        if tx.send(job).is_err() {
            self.shared
                .drop_job(&scope, "pool closed before the job was dispatched");
        }
    }

    fn admit<F, Fut>(&self, ctx: Context, f: F) -> Option<(flume::Sender<Job>, Job)>
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if ctx.is_cancelled() {
            debug!("Dropping submission with a cancelled scope");
            self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        if self.shared.closed.load(Ordering::Acquire) {
            warn!("Submit called on a closed worker pool");
            self.shared.drop_job(&ctx, "submit called on a closed worker pool");
            return None;
        }
        let tx = self.shared.input_tx.lock().clone()?;
        let run: JobFn = Box::new(move |scope| f(scope).boxed());
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Some((tx, Job { ctx, run }))
    }

    /// Shut the pool down.
    ///
    /// Cancels every worker (each finishes at most the handler it is running),
    /// closes the input and ready queues, and discards queued and overflowed
    /// jobs. Further submissions are dropped. Calling it again is a no-op.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Closing worker pool");

        self.shared.input_tx.lock().take();
        self.shared.cancel.cancel();
        let discarded = self.shared.drain_queued();

        info!(discarded, "Worker pool closed");
        self.shared
            .sinks
            .log(&Context::background(), "worker pool closed");
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let counters = &self.shared.counters;
        PoolStats {
            capacity: self.shared.capacity,
            workers: self.shared.workers.lock().len(),
            running: counters.running.load(Ordering::Relaxed),
            queued: self.shared.backlog(),
            submitted: counters.submitted.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            panicked: counters.panicked.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
            overflowed: counters.overflowed.load(Ordering::Relaxed),
            reaped: counters.reaped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.shared.closed.load(Ordering::Acquire) {
            debug!("WorkerPool dropped without explicit close");
            self.close();
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("stats", &self.stats())
            .finish()
    }
}
