//! Single-layer hashed time wheel.
//!
//! The wheel has `slot_count` buckets and advances one bucket per `tick`. A
//! task with delay `d` is parked `d / tick` buckets ahead of the cursor with
//! `round = d / (tick × slot_count)` revolutions to wait; the leftover
//! `d mod tick` is slept by the executor right before the handler runs.
//!
//! Released tasks run inline on the runtime, or on a [`WorkerPool`] when one
//! is attached so the pool's ceiling bounds scheduled work too. A failed or
//! panicking attempt is re-queued with the delay returned by the task's
//! [`DelayPolicy`](crate::core::DelayPolicy) until its attempts run out.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use prometheus_async_core::core::{Context, DelayPolicy, TaskOptions, TimeWheel, WheelOptions};
//!
//! let wheel = TimeWheel::new(Duration::from_millis(100), 60, WheelOptions::new())?;
//! wheel.run();
//! wheel.add_task(
//!     Context::new(),
//!     "send-digest",
//!     |_ctx| async { send_digest().await },
//!     TaskOptions::new()
//!         .with_max_attempts(3)
//!         .with_delay_policy(DelayPolicy::linear(Duration::from_secs(1))),
//! );
//! ```

mod slot;
mod task;

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::{Context, TaskHandler, WheelError, WorkerPool};
use crate::runtime::{Spawn, TokioSpawner};
use crate::util::telemetry::{LogSink, PanicSink, Sinks};

use slot::Slot;
pub use task::TaskOptions;
use task::WheelTask;

const CONSTRUCTED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle of a [`TimeWheel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelState {
    /// Built, not yet advancing.
    Constructed,
    /// The advance task is running.
    Running,
    /// Stopped; every parked task has been dropped.
    Stopped,
}

impl From<u8> for WheelState {
    fn from(raw: u8) -> Self {
        match raw {
            CONSTRUCTED => Self::Constructed,
            RUNNING => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// Construction options for a [`TimeWheel`].
#[derive(Clone, Default)]
pub struct WheelOptions {
    panic_sink: Option<PanicSink>,
    log_sink: Option<LogSink>,
    pool: Option<Arc<WorkerPool>>,
    handle: Option<Handle>,
}

impl WheelOptions {
    /// Defaults: inline execution on the current runtime, no sinks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
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

    /// Receive the wheel's drop, failure and lifecycle messages.
    #[must_use]
    pub fn with_log_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&Context, &str) + Send + Sync + 'static,
    {
        self.log_sink = Some(Arc::new(sink));
        self
    }

    /// Release tasks through `pool` instead of spawning them directly.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Spawn the wheel's tasks on `handle` instead of the current runtime.
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

impl fmt::Debug for WheelOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WheelOptions")
            .field("panic_sink", &self.panic_sink.is_some())
            .field("log_sink", &self.log_sink.is_some())
            .field("pool", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}

/// Position of the wheel: the current slot and how many ticks have elapsed.
#[derive(Debug, Default)]
struct Cursor {
    slot: usize,
    tick: u64,
}

struct WheelInner {
    tick: Duration,
    slot_count: usize,
    /// Placement reads and advances both go through this lock.
    cursor: Mutex<Cursor>,
    slots: Vec<Slot>,
    state: AtomicU8,
    stop: CancellationToken,
    pool: Option<Arc<WorkerPool>>,
    spawner: TokioSpawner,
    sinks: Sinks,
}

/// Hashed time wheel scheduling delayed, retriable tasks.
///
/// Cloning yields another handle to the same wheel. The advance task stops on
/// [`stop`](Self::stop) or once every handle has been dropped.
#[derive(Clone)]
pub struct TimeWheel {
    inner: Arc<WheelInner>,
}

impl TimeWheel {
    /// Build a wheel of `slot_count` buckets advancing every `tick`.
    ///
    /// # Errors
    ///
    /// - `WheelError::InvalidConfig` if `tick` or `slot_count` is zero
    /// - `WheelError::NoRuntime` when no handle is given and no runtime is current
    pub fn new(tick: Duration, slot_count: usize, options: WheelOptions) -> Result<Self, WheelError> {
        if tick.is_zero() {
            return Err(WheelError::InvalidConfig("tick must be greater than 0".into()));
        }
        if slot_count == 0 {
            return Err(WheelError::InvalidConfig(
                "slot_count must be greater than 0".into(),
            ));
        }
        let spawner = TokioSpawner::resolve(options.handle)?;

        Ok(Self {
            inner: Arc::new(WheelInner {
                tick,
                slot_count,
                cursor: Mutex::new(Cursor::default()),
                slots: (0..slot_count).map(|_| Slot::default()).collect(),
                state: AtomicU8::new(CONSTRUCTED),
                stop: CancellationToken::new(),
                pool: options.pool,
                spawner,
                sinks: Sinks::new(options.log_sink, options.panic_sink),
            }),
        })
    }

    /// Schedule `handler` under identity `id`.
    ///
    /// The first attempt is delayed by `delay_policy(0)`; after attempt `k`
    /// fails the next one is delayed by `delay_policy(k)`. A task whose scope
    /// is already cancelled, or that is added to a stopped wheel, is dropped.
    pub fn add_task<H>(&self, ctx: Context, id: impl Into<String>, handler: H, options: TaskOptions)
    where
        H: TaskHandler,
    {
        let task = WheelTask::new(ctx, id.into(), Arc::new(handler), options);
        if task.ctx.is_cancelled() {
            debug!(task_id = %task.id, "Dropping task with a cancelled scope");
            self.inner
                .sinks
                .log(&task.ctx, &format!("task {} dropped: scope cancelled", task.id));
            return;
        }
        self.inner.requeue(task);
    }

    /// Start advancing. Only the first call on a fresh wheel has an effect.
    pub fn run(&self) {
        match self
            .inner
            .state
            .compare_exchange(CONSTRUCTED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                let weak = Arc::downgrade(&self.inner);
                self.inner.spawner.spawn(advance(
                    weak,
                    self.inner.tick,
                    self.inner.stop.clone(),
                ));
                info!(
                    tick = ?self.inner.tick,
                    slot_count = self.inner.slot_count,
                    pool = self.inner.pool.is_some(),
                    "TimeWheel running"
                );
                self.inner
                    .sinks
                    .log(&Context::background(), "time wheel running");
            }
            Err(state) => {
                warn!(state = ?WheelState::from(state), "TimeWheel::run ignored");
            }
        }
    }

    /// Stop the wheel and drop every parked task. Calling it again is a no-op.
    ///
    /// Handlers already running finish. An attempt that passed its stopped
    /// check before this call may still start its handler; every attempt that
    /// reaches the check afterwards is skipped, including attempts waiting in
    /// an attached pool's queues.
    pub fn stop(&self) {
        if self.inner.state.swap(STOPPED, Ordering::AcqRel) == STOPPED {
            return;
        }
        self.inner.stop.cancel();
        let dropped: usize = {
            let _cursor = self.inner.cursor.lock();
            self.inner.slots.iter().map(Slot::clear).sum()
        };
        info!(dropped, "TimeWheel stopped");
        self.inner
            .sinks
            .log(&Context::background(), "time wheel stopped");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WheelState {
        WheelState::from(self.inner.state.load(Ordering::Acquire))
    }

    /// Number of tasks parked in the wheel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.slots.iter().map(Slot::len).sum()
    }

    /// Whether no task is parked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tick duration.
    #[must_use]
    pub fn tick(&self) -> Duration {
        self.inner.tick
    }

    /// Number of slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.inner.slot_count
    }
}

impl fmt::Debug for TimeWheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeWheel")
            .field("tick", &self.inner.tick)
            .field("slot_count", &self.inner.slot_count)
            .field("state", &self.state())
            .field("parked", &self.len())
            .finish()
    }
}

/// Where `delay` lands relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    round: u64,
    slot: usize,
    remainder: Duration,
}

fn place(delay: Duration, tick: Duration, slot_count: usize, current: usize) -> Placement {
    let tick_ns = tick.as_nanos();
    let delay_ns = delay.as_nanos();
    let ticks = delay_ns / tick_ns;
    let slots = slot_count as u128;
    let round = u64::try_from(ticks / slots).unwrap_or(u64::MAX);
    // `ticks % slots` < slot_count, so it fits.
    let offset = usize::try_from(ticks % slots).unwrap_or(0);
    let remainder = Duration::from_nanos(u64::try_from(delay_ns % tick_ns).unwrap_or(u64::MAX));
    Placement {
        round,
        slot: (offset + current) % slot_count,
        remainder,
    }
}

impl WheelInner {
    fn is_stopped(&self) -> bool {
        self.state.load(Ordering::Acquire) == STOPPED
    }

    /// Schedule the next attempt of `task`, or drop it if none remain.
    fn requeue(self: &Arc<Self>, mut task: WheelTask) {
        let attempts_made = task.attempt;
        task.attempt += 1;
        if task.attempt > task.max_attempts {
            warn!(task_id = %task.id, attempts = attempts_made, "Dropping task: attempts exhausted");
            self.sinks.log(
                &task.ctx,
                &format!("task {} dropped after {attempts_made} attempts", task.id),
            );
            return;
        }

        task.added_at = Instant::now();
        let delay = task.delay_policy.delay_for(attempts_made);

        let mut cursor = self.cursor.lock();
        if self.is_stopped() {
            drop(cursor);
            debug!(task_id = %task.id, "Dropping task: wheel stopped");
            self.sinks
                .log(&task.ctx, &format!("task {} dropped: wheel stopped", task.id));
            return;
        }

        let placement = place(delay, self.tick, self.slot_count, cursor.slot);
        task.remainder = placement.remainder;
        if placement.slot == cursor.slot && placement.round == 0 {
            drop(cursor);
            debug!(task_id = %task.id, attempt = task.attempt, ?delay, "Releasing task immediately");
            self.release(task);
            return;
        }
        // The cursor has already visited this slot for the current tick.
        task.round = if placement.slot == cursor.slot {
            placement.round - 1
        } else {
            placement.round
        };
        task.parked_tick = cursor.tick;

        let id = task.id.clone();
        let attempt = task.attempt;
        let superseded = self.slots[placement.slot].park(task);
        drop(cursor);

        debug!(
            task_id = %id,
            attempt,
            slot = placement.slot,
            round = placement.round,
            ?delay,
            "Task parked"
        );
        if superseded.is_some() {
            debug!(task_id = %id, "Superseded a stale entry with the same identity");
        }
    }

    /// Move the cursor one slot; returns the new slot and tick number.
    fn advance_cursor(&self) -> (usize, u64) {
        let mut cursor = self.cursor.lock();
        cursor.slot = (cursor.slot + 1) % self.slot_count;
        cursor.tick += 1;
        (cursor.slot, cursor.tick)
    }

    async fn process_slot(self: Arc<Self>, slot: usize, tick: u64) {
        if self.is_stopped() {
            return;
        }
        let sweep = self.slots[slot].sweep(tick);
        for task in &sweep.cancelled {
            debug!(task_id = %task.id, "Dropping task: scope cancelled before release");
            self.sinks
                .log(&task.ctx, &format!("task {} dropped: scope cancelled", task.id));
        }
        for task in sweep.due {
            if self.is_stopped() {
                return;
            }
            Arc::clone(&self).hand_off(task).await;
        }
    }

    /// Release from a synchronous context.
    fn release(self: &Arc<Self>, task: WheelTask) {
        self.spawner.spawn(Arc::clone(self).hand_off(task));
    }

    /// Give the attempt to the pool, or spawn it when no pool is attached.
    async fn hand_off(self: Arc<Self>, task: WheelTask) {
        if let Some(pool) = &self.pool {
            let ctx = task.ctx.clone();
            let inner = Arc::clone(&self);
            pool.submit(ctx, move |_| inner.attempt(task)).await;
        } else {
            self.spawner.spawn(Arc::clone(&self).attempt(task));
        }
    }

    /// Sleep the remainder, run the handler, re-queue on failure.
    async fn attempt(self: Arc<Self>, task: WheelTask) {
        if !task.remainder.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(task.remainder) => {}
                () = task.ctx.cancelled() => {}
                () = self.stop.cancelled() => {}
            }
        }
        // Last stopped check before the handler starts.
        if self.is_stopped() {
            debug!(task_id = %task.id, "Skipping attempt: wheel stopped");
            return;
        }
        if task.ctx.is_cancelled() {
            debug!(task_id = %task.id, "Skipping attempt: scope cancelled");
            self.sinks
                .log(&task.ctx, &format!("task {} dropped: scope cancelled", task.id));
            return;
        }

        let ctx = task.scoped_context();
        let outcome = AssertUnwindSafe(task.handler.handle(ctx.clone()))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {
                debug!(task_id = %task.id, attempt = task.attempt, "Task completed");
            }
            Ok(Err(err)) => {
                warn!(task_id = %task.id, attempt = task.attempt, error = %err, "Task attempt failed");
                self.sinks.log(
                    &ctx,
                    &format!("task {} attempt {} failed: {err}", task.id, task.attempt),
                );
                self.requeue(task);
            }
            Err(payload) => {
                let message = self.sinks.report_panic(&ctx, payload);
                error!(task_id = %task.id, attempt = task.attempt, panic = %message, "Task handler panicked");
                self.sinks.log(
                    &ctx,
                    &format!("task {} attempt {} panicked: {message}", task.id, task.attempt),
                );
                self.requeue(task);
            }
        }
    }
}

/// Advance one slot per tick until stopped or every handle is gone.
async fn advance(wheel: Weak<WheelInner>, tick: Duration, stop: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = wheel.upgrade() else {
            break;
        };
        let (slot, tick_no) = inner.advance_cursor();
        inner
            .spawner
            .spawn(Arc::clone(&inner).process_slot(slot, tick_no));
    }
    debug!("TimeWheel advance loop exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_secs(1);

    #[test]
    fn test_place_within_first_revolution() {
        let p = place(Duration::from_secs(3), TICK, 7, 0);
        assert_eq!(p, Placement { round: 0, slot: 3, remainder: Duration::ZERO });

        let p = place(Duration::from_millis(2500), TICK, 7, 5);
        assert_eq!(p.round, 0);
        assert_eq!(p.slot, 0);
        assert_eq!(p.remainder, Duration::from_millis(500));
    }

    #[test]
    fn test_place_multiple_revolutions() {
        let p = place(Duration::from_secs(15), TICK, 7, 2);
        assert_eq!(p.round, 2);
        assert_eq!(p.slot, 3);

        let p = place(Duration::from_secs(7), TICK, 7, 4);
        assert_eq!(p.round, 1);
        assert_eq!(p.slot, 4);
    }

    #[test]
    fn test_place_sub_tick_stays_on_cursor() {
        let p = place(Duration::from_millis(300), TICK, 7, 6);
        assert_eq!(p, Placement { round: 0, slot: 6, remainder: Duration::from_millis(300) });
    }

    #[test]
    fn test_wheel_state_from_raw() {
        assert_eq!(WheelState::from(CONSTRUCTED), WheelState::Constructed);
        assert_eq!(WheelState::from(RUNNING), WheelState::Running);
        assert_eq!(WheelState::from(STOPPED), WheelState::Stopped);
    }

    #[test]
    fn test_new_rejects_zero_tick_and_slots() {
        let err = TimeWheel::new(Duration::ZERO, 8, WheelOptions::new()).unwrap_err();
        assert!(matches!(err, WheelError::InvalidConfig(_)));
        let err = TimeWheel::new(TICK, 0, WheelOptions::new()).unwrap_err();
        assert!(matches!(err, WheelError::InvalidConfig(_)));
    }

    #[test]
    fn test_new_requires_runtime() {
        let err = TimeWheel::new(TICK, 8, WheelOptions::new()).unwrap_err();
        assert!(matches!(err, WheelError::NoRuntime(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parked_task_counts() {
        let wheel = TimeWheel::new(TICK, 4, WheelOptions::new()).unwrap();
        wheel.add_task(
            Context::new(),
            "later",
            |_ctx: Context| async { crate::core::AppResult::Ok(()) },
            TaskOptions::new().with_delay_policy(crate::core::DelayPolicy::fixed(Duration::from_secs(9))),
        );
        assert_eq!(wheel.len(), 1);
        assert_eq!(wheel.state(), WheelState::Constructed);

        wheel.stop();
        assert!(wheel.is_empty());
        assert_eq!(wheel.state(), WheelState::Stopped);
    }
}
