// ABOUTME: Task-runner seam for fire-and-forget background work
//
// Refreshes and graceful closes are dispatched through this trait so callers
// never block on them and embedders can route pool work onto their own
// scheduler.

use futures_util::future::BoxFuture;

/// Schedules a task for asynchronous execution without blocking the caller
pub trait TaskRunner: Send + Sync {
    /// Run `task` in the background
    fn go(&self, task: BoxFuture<'static, ()>);
}

/// Default runner backed by `tokio::spawn`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

impl TaskRunner for TokioRunner {
    fn go(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }
}
