//! Per-task options and the parked representation of a task.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::core::{Context, DelayPolicy, TaskHandler, TASK_ADDED_AT};

/// Options accepted by [`TimeWheel::add_task`](super::TimeWheel::add_task).
#[derive(Debug, Clone)]
pub struct TaskOptions {
    max_attempts: u32,
    delay_policy: DelayPolicy,
}

impl TaskOptions {
    /// One attempt, released on the next scheduling pass.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of attempts, the first included. Zero is treated as one.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay policy consulted before every attempt.
    #[must_use]
    pub fn with_delay_policy(mut self, policy: DelayPolicy) -> Self {
        self.delay_policy = policy;
        self
    }

    /// Configured attempt limit.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Configured delay policy.
    #[must_use]
    pub const fn delay_policy(&self) -> &DelayPolicy {
        &self.delay_policy
    }
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            delay_policy: DelayPolicy::immediate(),
        }
    }
}

/// A task owned by the wheel between attempts.
pub(crate) struct WheelTask {
    pub id: String,
    pub ctx: Context,
    pub handler: Arc<dyn TaskHandler>,
    /// Number of the attempt currently scheduled (1-based once placed).
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay_policy: DelayPolicy,
    /// Full revolutions left before release.
    pub round: u64,
    /// Sub-tick sleep performed before the handler runs.
    pub remainder: Duration,
    /// Wheel tick during which the task was parked; that tick's sweep skips it.
    pub parked_tick: u64,
    pub added_at: Instant,
}

impl WheelTask {
    pub(crate) fn new(
        ctx: Context,
        id: String,
        handler: Arc<dyn TaskHandler>,
        options: TaskOptions,
    ) -> Self {
        Self {
            id,
            ctx,
            handler,
            attempt: 0,
            max_attempts: options.max_attempts,
            delay_policy: options.delay_policy,
            round: 0,
            remainder: Duration::ZERO,
            parked_tick: 0,
            added_at: Instant::now(),
        }
    }

    /// The scope handed to the handler, carrying this attempt's submission time.
    pub(crate) fn scoped_context(&self) -> Context {
        self.ctx.with_value(TASK_ADDED_AT, self.added_at)
    }
}
