//! Detached cache writes.
//!
//! Writes spawned here are not awaited by the request that triggered them
//! and keep running if that request is dropped. `settle` waits until every
//! write spawned so far has finished.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;

/// Handle for spawning and awaiting detached writes. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct BackgroundWrites {
    tracker: TaskTracker,
    /// Serializes `settle`, which closes and reopens the tracker.
    settling: Arc<Mutex<()>>,
}

impl BackgroundWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a write on the tokio runtime without awaiting it.
    pub fn spawn<F>(&self, write: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(write);
    }

    /// Number of writes still running.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until no write is running.
    pub async fn settle(&self) {
        let _settling = self.settling.lock().await;
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
