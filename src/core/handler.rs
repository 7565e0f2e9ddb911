//! Handler abstraction for scheduled tasks.

use std::future::Future;

use async_trait::async_trait;

use super::{AppResult, Context};

/// A unit of work the time wheel can invoke, possibly several times.
///
/// Returning an error (or panicking) counts as a failed attempt; the wheel
/// re-queues the task while attempts remain.
///
/// Any `Fn(Context) -> impl Future<Output = AppResult<()>>` closure is a
/// handler:
///
/// ```rust,ignore
/// wheel.add_task(Context::new(), "refresh-cache", |ctx: Context| async move {
///     refresh(&ctx).await?;
///     Ok(())
/// }, TaskOptions::new());
/// ```
///
/// Types with state can implement the trait directly:
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_async_core::core::{AppResult, Context, TaskHandler};
///
/// struct Ping {
///     url: String,
/// }
///
/// #[async_trait]
/// impl TaskHandler for Ping {
///     async fn handle(&self, ctx: Context) -> AppResult<()> {
///         if ctx.is_cancelled() {
///             return Ok(());
///         }
///         ping(&self.url).await
///     }
/// }
/// ```
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Run one attempt within the given scope.
    async fn handle(&self, ctx: Context) -> AppResult<()>;
}

#[async_trait]
impl<F, Fut> TaskHandler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    async fn handle(&self, ctx: Context) -> AppResult<()> {
        (self)(ctx).await
    }
}
