//! One bucket of the wheel.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::task::WheelTask;

/// Tasks parked in a slot, keyed by identity.
#[derive(Default)]
pub(super) struct Slot {
    tasks: Mutex<HashMap<String, WheelTask>>,
}

/// Outcome of visiting a slot on one tick.
#[derive(Default)]
pub(super) struct Sweep {
    /// Tasks whose time has come, removed from the slot.
    pub due: Vec<WheelTask>,
    /// Tasks whose scope was cancelled, removed from the slot.
    pub cancelled: Vec<WheelTask>,
}

impl Slot {
    /// Park `task`, superseding any entry with the same identity. Returns the
    /// superseded entry.
    pub(super) fn park(&self, task: WheelTask) -> Option<WheelTask> {
        self.tasks.lock().insert(task.id.clone(), task)
    }

    /// Visit the slot for wheel tick `tick`.
    ///
    /// Entries parked during `tick` itself are left alone; the rest are dropped
    /// if cancelled, moved one revolution closer if `round > 0`, or taken.
    pub(super) fn sweep(&self, tick: u64) -> Sweep {
        let mut sweep = Sweep::default();
        let mut tasks = self.tasks.lock();
        let parked = std::mem::take(&mut *tasks);
        for (id, mut task) in parked {
            if task.parked_tick >= tick {
                tasks.insert(id, task);
            } else if task.ctx.is_cancelled() {
                sweep.cancelled.push(task);
            } else if task.round > 0 {
                task.round -= 1;
                tasks.insert(id, task);
            } else {
                sweep.due.push(task);
            }
        }
        sweep
    }

    pub(super) fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Drop every parked task; returns how many there were.
    pub(super) fn clear(&self) -> usize {
        let mut tasks = self.tasks.lock();
        let count = tasks.len();
        tasks.clear();
        count
    }
}
