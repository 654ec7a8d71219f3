//! The unit of scheduled work.

use std::future::Future;

/// Something the registry runs on every fire.
///
/// Runs of one job never overlap: the next fire waits for the previous run
/// to return. Errors are the job's own business; log them and return.
pub trait Job: Send + Sync + 'static {
    fn run(&self) -> impl Future<Output = ()> + Send;
}

/// Adapts an async closure into a [`Job`].
pub struct FnJob<F>(pub F);

impl<F, Fut> Job for FnJob<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send,
{
    fn run(&self) -> impl Future<Output = ()> + Send {
        (self.0)()
    }
}
