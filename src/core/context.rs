//! Cancellation scopes carried by every job.
//!
//! A [`Context`] is a cheap, cloneable handle combining a
//! [`CancellationToken`] with an immutable chain of key/value attachments.
//! Clones share the token; [`Context::child`] derives a token that is
//! cancelled together with its parent but can also be cancelled on its own.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Key under which the time wheel attaches the submission timestamp of the
/// current attempt (a [`tokio::time::Instant`]).
pub const TASK_ADDED_AT: &str = "TaskAddedAt";

struct Binding {
    key: &'static str,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Binding>>,
}

/// Cancellation scope with attached values.
#[derive(Clone, Default)]
pub struct Context {
    token: CancellationToken,
    bindings: Option<Arc<Binding>>,
}

impl Context {
    /// Create a root scope that is only cancelled explicitly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope used for log lines that do not belong to a job.
    pub(crate) fn background() -> Self {
        Self::default()
    }

    /// Derive a scope cancelled with `self` or on its own; values are inherited.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            bindings: self.bindings.clone(),
        }
    }

    /// Derive a child scope that cancels itself once `timeout` has elapsed.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let child = self.child();
        let token = child.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(timeout) => token.cancel(),
            }
        });
        child
    }

    /// Attach `value` under `key`. Later bindings shadow earlier ones.
    #[must_use]
    pub fn with_value<T>(&self, key: &'static str, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            token: self.token.clone(),
            bindings: Some(Arc::new(Binding {
                key,
                value: Arc::new(value),
                parent: self.bindings.clone(),
            })),
        }
    }

    /// Look up the innermost value bound under `key`, if it has type `T`.
    #[must_use]
    pub fn value<T: Any>(&self, key: &str) -> Option<&T> {
        let mut node = self.bindings.as_deref();
        while let Some(binding) = node {
            if binding.key == key {
                return (*binding.value).downcast_ref::<T>();
            }
            node = binding.parent.as_deref();
        }
        None
    }

    /// Cancel this scope and every scope derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the scope has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the scope is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// The underlying token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl From<CancellationToken> for Context {
    fn from(token: CancellationToken) -> Self {
        Self {
            token,
            bindings: None,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = Vec::new();
        let mut node = self.bindings.as_deref();
        while let Some(binding) = node {
            keys.push(binding.key);
            node = binding.parent.as_deref();
        }
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("keys", &keys)
            .finish()
    }
}

/// Submission time of the attempt a handler is running, as attached by the wheel.
#[must_use]
pub fn task_added_at(ctx: &Context) -> Option<Instant> {
    ctx.value::<Instant>(TASK_ADDED_AT).copied()
}
