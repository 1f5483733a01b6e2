//! Scheduled-event manager: a binary min-heap of (expiry, id, callback)
//! entries with O(log n) schedule, cancel and replace-by-id, driven by a
//! single scheduler loop that sleeps until the earliest expiry and dispatches
//! due callbacks onto a bounded pool of worker tasks.

mod heap;

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use heap::{TaskHeap, TimerTask};

/// Work deferred to a future instant. Callbacks run on worker tasks, never on
/// the scheduler loop, and may reschedule themselves through the manager.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    #[error("timer: manager is stopped")]
    Stopped,
}

/// Snapshot of the manager's load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerStats {
    pub scheduled_tasks: usize,
    pub workers: usize,
}

struct Inner {
    heap: TaskHeap,
    stopped: bool,
}

/// Manages deferred callbacks keyed by an opaque id. Scheduling an id that is
/// already pending atomically replaces the previous entry.
pub struct TimerManager {
    inner: Mutex<Inner>,
    wakeup_tx: mpsc::Sender<()>,
    wakeup_rx: Mutex<Option<mpsc::Receiver<()>>>,
    workers: Arc<Semaphore>,
    worker_count: usize,
    shutdown: CancellationToken,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl TimerManager {
    pub fn new(workers: usize) -> Arc<Self> {
        // Capacity-1 conflated signal: one pending wakeup is enough.
        let (wakeup_tx, wakeup_rx) = mpsc::channel(1);
        Arc::new(Self {
            inner: Mutex::new(Inner {
                heap: TaskHeap::new(),
                stopped: false,
            }),
            wakeup_tx,
            wakeup_rx: Mutex::new(Some(wakeup_rx)),
            workers: Arc::new(Semaphore::new(workers)),
            worker_count: workers,
            shutdown: CancellationToken::new(),
            scheduler: Mutex::new(None),
        })
    }

    /// Spawn the scheduler loop. Idempotent per manager.
    pub fn start(self: &Arc<Self>) {
        let Some(rx) = self.wakeup_rx.lock().unwrap_or_else(|e| e.into_inner()).take() else {
            return;
        };
        let manager = self.clone();
        let handle = tokio::spawn(manager.run(rx));
        *self.scheduler.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Stop the scheduler. Pending events are discarded; in-flight callbacks
    /// finish on their workers.
    pub async fn stop(&self) {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.stopped {
                return;
            }
            inner.stopped = true;
        }
        self.shutdown.cancel();
        let handle = self
            .scheduler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Schedule `callback` to run at `expiry`, replacing any pending event
    /// with the same id. Fails only once the manager is stopped.
    pub fn schedule(
        &self,
        id: impl Into<String>,
        expiry: Instant,
        callback: Callback,
    ) -> Result<(), TimerError> {
        let id = id.into();
        let became_min = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.stopped {
                return Err(TimerError::Stopped);
            }
            inner.heap.remove(&id);
            inner.heap.push(TimerTask {
                id,
                expiry,
                callback,
            });
            inner.heap.min_expiry() == Some(expiry)
        };

        // Nudge the loop only when the sleep deadline moved forward.
        if became_min {
            let _ = self.wakeup_tx.try_send(());
        }
        Ok(())
    }

    /// Cancel a pending event. Returns whether anything was removed.
    pub fn cancel(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.heap.remove(id).is_some()
    }

    pub fn stats(&self) -> TimerStats {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        TimerStats {
            scheduled_tasks: inner.heap.len(),
            workers: self.worker_count,
        }
    }

    async fn run(self: Arc<Self>, mut wakeup_rx: mpsc::Receiver<()>) {
        const IDLE_WAIT: std::time::Duration = std::time::Duration::from_secs(24 * 3600);

        loop {
            let wait = {
                let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
                if inner.stopped {
                    return;
                }
                loop {
                    match inner.heap.min_expiry() {
                        None => break IDLE_WAIT,
                        Some(expiry) => {
                            let now = Instant::now();
                            if expiry <= now {
                                if let Some(task) = inner.heap.pop() {
                                    self.dispatch(task);
                                }
                                continue;
                            }
                            break expiry - now;
                        }
                    }
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = wakeup_rx.recv() => {}
                _ = self.shutdown.cancelled() => return,
            }
        }
    }

    /// Hand a due callback to the worker pool. The spawned task isolates
    /// panics from the scheduler loop and from other pending events.
    fn dispatch(&self, task: TimerTask) {
        let workers = self.workers.clone();
        tokio::spawn(async move {
            if let Ok(_permit) = workers.acquire_owned().await {
                (task.callback)();
            }
        });
    }
}

#[cfg(test)]
mod tests;
