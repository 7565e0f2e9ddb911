//! Telemetry helpers for structured logging and panic reporting.
//!
//! Every log line the core emits goes to `tracing`. Callers that want the same
//! lines routed somewhere else (their own logger, a test harness) attach a
//! [`LogSink`]; recovered panics are additionally handed to a [`PanicSink`].

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

use crate::core::Context;

/// Receives every drop, failure and lifecycle message the core logs.
pub type LogSink = Arc<dyn Fn(&Context, &str) + Send + Sync>;

/// Receives recovered panics: the job's scope, the panic payload, and the
/// stack captured where the panic was recovered.
pub type PanicSink = Arc<dyn Fn(&Context, &(dyn Any + Send), &Backtrace) + Send + Sync>;

/// Initialize tracing/telemetry. Users can install their own subscriber; this
/// helper installs a default env-based subscriber if none is set.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Render a panic payload as text.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// The optional caller sinks a pool or wheel reports into.
#[derive(Clone, Default)]
pub(crate) struct Sinks {
    log: Option<LogSink>,
    panic: Option<PanicSink>,
}

impl Sinks {
    pub(crate) fn new(log: Option<LogSink>, panic: Option<PanicSink>) -> Self {
        Self { log, panic }
    }

    pub(crate) fn log(&self, ctx: &Context, message: &str) {
        if let Some(sink) = &self.log {
            sink(ctx, message);
        }
    }

    /// Capture the stack, hand the panic to the panic sink, and return its message.
    pub(crate) fn report_panic(&self, ctx: &Context, payload: Box<dyn Any + Send>) -> String {
        let backtrace = Backtrace::force_capture();
        let message = panic_message(&*payload);
        if let Some(sink) = &self.panic {
            sink(ctx, &*payload, &backtrace);
        }
        message
    }
}

impl fmt::Debug for Sinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sinks")
            .field("log", &self.log.is_some())
            .field("panic", &self.panic.is_some())
            .finish()
    }
}
