//! Explicit "continue on the foreground context" primitive.
//!
//! Background work never touches UI-owned state directly. It posts a task to
//! the [`ForegroundLoop`] owned by the UI thread, which runs tasks one at a
//! time in posting order. Targets are referenced weakly so that a result
//! arriving after the owning surface was torn down is dropped silently.

use std::sync::{Arc, Weak};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::trace;

/// Unit of work executed on the foreground context.
pub type ForegroundTask = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ForegroundError {
    /// The foreground loop was dropped.
    #[error("foreground loop is closed")]
    Closed,
}

/// Cloneable sender side used by background contexts.
#[derive(Clone, Debug)]
pub struct ForegroundHandle {
    task_tx: mpsc::UnboundedSender<ForegroundTask>,
}

impl ForegroundHandle {
    /// Schedule `task` on the foreground loop.
    pub fn post<F>(&self, task: F) -> Result<(), ForegroundError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.task_tx
            .send(Box::new(task))
            .map_err(|_| ForegroundError::Closed)
    }

    /// Schedule `deliver` against `target`, skipping it if the target is gone
    /// by the time the foreground loop gets to it.
    pub fn post_to<S, F>(&self, target: Weak<S>, deliver: F) -> Result<(), ForegroundError>
    where
        S: Send + Sync + 'static,
        F: FnOnce(Arc<S>) + Send + 'static,
    {
        self.post(move || match target.upgrade() {
            Some(target) => deliver(target),
            None => trace!("foreground target released; dropping delivery"),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.task_tx.is_closed()
    }
}

/// Receiver side, owned and driven by the foreground (UI) context.
#[derive(Debug)]
pub struct ForegroundLoop {
    task_rx: mpsc::UnboundedReceiver<ForegroundTask>,
}

impl ForegroundLoop {
    /// Create a loop and the handle used to post onto it.
    pub fn new() -> (Self, ForegroundHandle) {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        (Self { task_rx }, ForegroundHandle { task_tx })
    }

    /// Run every task that is already queued without waiting.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.task_rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait for the next task and run it. Returns `false` once every handle
    /// is gone and the queue is drained.
    pub async fn run_next(&mut self) -> bool {
        match self.task_rx.recv().await {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until every handle is dropped.
    pub async fn run(mut self) {
        while self.run_next().await {}
        trace!("foreground loop finished");
    }
}
