//! The single task moving jobs from the input channel to the ready queue.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use flume::TrySendError;
use tracing::debug;

use super::{Job, PoolShared};

pub(super) async fn run(
    shared: Arc<PoolShared>,
    input_rx: flume::Receiver<Job>,
    ready_tx: flume::Sender<Job>,
) {
    debug!("Pool dispatcher started");
    loop {
        let job = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break,
            job = input_rx.recv_async() => match job {
                Ok(job) => job,
                Err(_) => break,
            },
        };
        if !forward(&shared, &ready_tx, job).await {
            break;
        }
    }
    // Jobs forwarded after `close` drained the queues.
    let discarded = shared.drain_queued();
    debug!(discarded, "Pool dispatcher exiting");
}

/// Hand one job to the workers. Returns `false` once the pool is shutting down.
async fn forward(shared: &Arc<PoolShared>, ready_tx: &flume::Sender<Job>, job: Job) -> bool {
    let job = match ready_tx.try_send(job) {
        Ok(()) => {
            // Buffered ready queue with nobody free to read it.
            if shared.idle_workers() == 0 {
                shared.spawn_worker();
            }
            return true;
        }
        Err(TrySendError::Disconnected(_)) => return false,
        Err(TrySendError::Full(job)) => job,
    };

    shared.spawn_worker();

    if shared.non_blocking {
        shared.counters.overflowed.fetch_add(1, Ordering::Relaxed);
        if shared.overflow_tx.send(job).is_err() {
            return false;
        }
        shared.overflow_ready.notify_one();
        return true;
    }

    // Blocking mode: wait for a worker, and keep the worker count topped up
    // if one exits (idle reap) while we wait.
    let send = ready_tx.send_async(job);
    tokio::pin!(send);
    loop {
        tokio::select! {
            biased;
            sent = &mut send => return sent.is_ok(),
            () = shared.cancel.cancelled() => {
                // The job is still held by the pending send.
                shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            () = shared.worker_exited.notified() => {
                shared.spawn_worker();
            }
        }
    }
}
