//! Assemble a running wheel, and the pool it feeds, from [`CoreConfig`].

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use crate::builders::{PoolBuilder, WheelBuilder};
use crate::config::CoreConfig;
use crate::core::{BuildError, TimeWheel, WorkerPool};
use crate::util::telemetry::{LogSink, PanicSink};

/// Sinks shared by every component [`build_core`] creates.
#[derive(Clone, Default)]
pub struct CoreSinks {
    /// Receives drop, failure and lifecycle messages.
    pub log: Option<LogSink>,
    /// Receives recovered handler panics.
    pub panic: Option<PanicSink>,
    /// Runtime to spawn on; the current one when absent.
    pub handle: Option<Handle>,
}

impl std::fmt::Debug for CoreSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreSinks")
            .field("log", &self.log.is_some())
            .field("panic", &self.panic.is_some())
            .field("handle", &self.handle.is_some())
            .finish()
    }
}

/// A running wheel and, when configured, the pool it releases into.
#[derive(Debug)]
pub struct AsyncCore {
    /// Pool bounding released tasks.
    pub pool: Option<Arc<WorkerPool>>,
    /// Running wheel.
    pub wheel: TimeWheel,
}

impl AsyncCore {
    /// Stop the wheel, then close the pool.
    pub fn shutdown(&self) {
        self.wheel.stop();
        if let Some(pool) = &self.pool {
            pool.close();
        }
    }
}

/// Build and start the components described by `cfg`.
///
/// # Errors
///
/// Returns `BuildError` if the configuration does not validate or a component
/// cannot be constructed.
pub fn build_core(cfg: &CoreConfig, sinks: CoreSinks) -> Result<AsyncCore, BuildError> {
    cfg.validate()?;

    let pool = match &cfg.pool {
        Some(pool_cfg) => {
            let mut builder = PoolBuilder::from_config(pool_cfg)?;
            let options = builder.options_mut();
            options.set_log_sink(sinks.log.clone());
            options.set_panic_sink(sinks.panic.clone());
            if let Some(handle) = sinks.handle.clone() {
                builder = builder.handle(handle);
            }
            Some(Arc::new(builder.build()?))
        }
        None => None,
    };

    let mut builder = WheelBuilder::from(&cfg.wheel);
    let options = builder.options_mut();
    options.set_log_sink(sinks.log);
    options.set_panic_sink(sinks.panic);
    if let Some(handle) = sinks.handle {
        builder = builder.handle(handle);
    }
    if let Some(pool) = &pool {
        builder = builder.pool(Arc::clone(pool));
    }
    let wheel = builder.build()?;
    wheel.run();

    info!(
        tick_ms = cfg.wheel.tick_ms,
        slot_count = cfg.wheel.slot_count,
        pooled = pool.is_some(),
        "Async core started"
    );
    Ok(AsyncCore { pool, wheel })
}
