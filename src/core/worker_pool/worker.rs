//! Worker loop and idle reaper.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

use super::{Job, PoolShared};

/// Serve jobs until the pool closes or this worker is reaped.
pub(super) async fn run(shared: Arc<PoolShared>, id: Uuid, cancel: CancellationToken) {
    debug!(worker_id = %id, "Worker started");
    loop {
        let job = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            job = next_job(&shared) => match job {
                Some(job) => job,
                None => break,
            },
        };
        execute(&shared, id, job).await;
    }
    shared.retire(id);
    debug!(worker_id = %id, "Worker exiting");
}

/// Ready queue first, then overflow (non-blocking mode), then park.
async fn next_job(shared: &PoolShared) -> Option<Job> {
    loop {
        match shared.ready_rx.try_recv() {
            Ok(job) => return Some(job),
            Err(flume::TryRecvError::Disconnected) => return None,
            Err(flume::TryRecvError::Empty) => {}
        }
        if !shared.non_blocking {
            return shared.ready_rx.recv_async().await.ok();
        }
        if let Ok(job) = shared.overflow_rx.try_recv() {
            return Some(job);
        }
        tokio::select! {
            job = shared.ready_rx.recv_async() => return job.ok(),
            () = shared.overflow_ready.notified() => {}
        }
    }
}

async fn execute(shared: &PoolShared, id: Uuid, job: Job) {
    let Job { ctx, run } = job;
    if ctx.is_cancelled() {
        debug!(worker_id = %id, "Skipping job whose scope was cancelled while queued");
        shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
        return;
    }

    shared.set_busy(id, true);
    shared.counters.running.fetch_add(1, Ordering::AcqRel);
    let scope = ctx.clone();
    let outcome = AssertUnwindSafe(async move { run(scope).await })
        .catch_unwind()
        .await;
    shared.counters.running.fetch_sub(1, Ordering::AcqRel);
    shared.set_busy(id, false);

    match outcome {
        Ok(()) => {
            shared.counters.completed.fetch_add(1, Ordering::Relaxed);
        }
        Err(payload) => {
            shared.counters.panicked.fetch_add(1, Ordering::Relaxed);
            let message = shared.sinks.report_panic(&ctx, payload);
            error!(worker_id = %id, panic = %message, "Recovered panic in pool job");
            shared
                .sinks
                .log(&ctx, &format!("recovered panic in pool job: {message}"));
        }
    }
}

/// Periodically retire workers that have not run a job for `idle_timeout`.
pub(super) async fn reap_idle(shared: Arc<PoolShared>, idle_timeout: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + idle_timeout, idle_timeout);
    loop {
        tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break,
            _ = ticker.tick() => {
                let reaped = reap_once(&shared, idle_timeout);
                if reaped > 0 {
                    debug!(reaped, "Reaped idle workers");
                }
            }
        }
    }
}

/// Fire the cancellation token of each idle worker past the timeout, keeping
/// at least `prefill` workers and never reaping while jobs are queued.
fn reap_once(shared: &PoolShared, idle_timeout: Duration) -> usize {
    if shared.backlog() > 0 {
        return 0;
    }
    let now = Instant::now();
    let workers = shared.workers.lock();
    let live = workers
        .values()
        .filter(|slot| !slot.cancel.is_cancelled())
        .count();
    let mut surplus = live.saturating_sub(shared.prefill);
    let mut reaped = 0;
    for slot in workers.values() {
        if surplus == 0 {
            break;
        }
        if slot.busy
            || slot.cancel.is_cancelled()
            || now.duration_since(slot.last_used) < idle_timeout
        {
            continue;
        }
        slot.cancel.cancel();
        surplus -= 1;
        reaped += 1;
    }
    drop(workers);
    shared
        .counters
        .reaped
        .fetch_add(reaped as u64, Ordering::Relaxed);
    reaped
}
