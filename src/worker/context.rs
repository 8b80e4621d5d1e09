//! Execution context passed down the dispatch chain.

/// Where a handler is running.
///
/// The router offloads only from the engine thread; anything already on a
/// worker runs inline, so a request is never queued twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchContext {
    worker: Option<usize>,
}

impl DispatchContext {
    /// The engine's own dispatch thread.
    pub const fn engine() -> Self {
        Self { worker: None }
    }

    pub const fn worker(index: usize) -> Self {
        Self {
            worker: Some(index),
        }
    }

    pub fn is_worker(&self) -> bool {
        self.worker.is_some()
    }

    pub fn worker_index(&self) -> Option<usize> {
        self.worker
    }
}
