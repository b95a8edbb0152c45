use crate::result::EditResult;

/// Receives one notification after every processed batch item.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize, current: Option<&EditResult>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_progress(&self, _completed: usize, _total: usize, _current: Option<&EditResult>) {}
}

/// Adapter so a closure can stand in for an observer.
pub struct ProgressFn<F>(pub F);

impl<F> ProgressObserver for ProgressFn<F>
where
    F: Fn(usize, usize, Option<&EditResult>) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize, current: Option<&EditResult>) {
        (self.0)(completed, total, current)
    }
}
