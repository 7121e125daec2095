//! Bounded worker pool over an unbounded queue
//!
//! Workers are tokio tasks sharing one receiver. Submission never blocks;
//! backpressure is exerted by the queue primitive, not by dropping.
//! Shutdown closes the queue and waits for the workers, which drain every
//! queued item before exiting, so no item is lost on graceful stop.

use super::EngineError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::mpsc;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tracing::warn;

pub struct WorkerPool<T> {
    sender: StdMutex<Option<mpsc::UnboundedSender<T>>>,
    handles: TokioMutex<Vec<JoinHandle<()>>>,
    processed: Arc<AtomicU64>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn `workers` tasks consuming from a fresh queue.
    pub fn new<F, Fut>(workers: usize, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self::start(sender, receiver, workers, handler)
    }

    /// Spawn workers over an existing channel. The pool owns `sender`;
    /// callers may keep additional clones for upstream stages.
    pub fn start<F, Fut>(
        sender: mpsc::UnboundedSender<T>,
        receiver: mpsc::UnboundedReceiver<T>,
        workers: usize,
        handler: F,
    ) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let receiver = Arc::new(TokioMutex::new(receiver));
        let processed = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::with_capacity(workers.max(1));

        for _ in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            let handler = handler.clone();
            let processed = Arc::clone(&processed);

            handles.push(tokio::spawn(async move {
                loop {
                    // Hold the receiver lock only for the dequeue itself.
                    let item = { receiver.lock().await.recv().await };
                    match item {
                        Some(item) => {
                            handler(item).await;
                            processed.fetch_add(1, Ordering::Relaxed);
                        }
                        None => break,
                    }
                }
            }));
        }

        WorkerPool {
            sender: StdMutex::new(Some(sender)),
            handles: TokioMutex::new(handles),
            processed,
        }
    }

    /// Enqueue an item. Fails once the pool has been shut down; correctness
    /// of downstream consumers depends on never dropping mid-stream data
    /// silently.
    pub fn submit(&self, item: T) -> Result<(), EngineError> {
        let sender = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sender
            .as_ref()
            .ok_or(EngineError::PipelineClosed)?
            .send(item)
            .map_err(|_| EngineError::PipelineClosed)
    }

    /// Close the queue and wait for the workers to drain it completely.
    pub async fn shutdown(&self) {
        {
            let mut sender = match self.sender.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            sender.take();
        }

        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(error) = handle.await {
                warn!(%error, "worker task failed during shutdown");
            }
        }
    }

    /// Items handled so far across all workers.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

impl<T> std::fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("processed", &self.processed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
