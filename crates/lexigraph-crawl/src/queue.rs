//! Bounded multi-producer / multi-consumer queue.
//!
//! A tokio mpsc channel whose receiver is shared behind an async mutex, so a
//! pool of tasks can consume from it. `push` parks while the queue is full
//! and `pop` parks while it is empty; both give up when shutdown fires.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::{CrawlError, Shutdown};

pub struct BoundedQueue<T> {
    name: &'static str,
    tx: mpsc::Sender<T>,
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T: Send> BoundedQueue<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            name,
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue, waiting for space. Returns `Cancelled` if shutdown fires first.
    pub async fn push(&self, item: T, shutdown: &Shutdown) -> Result<(), CrawlError> {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => Err(CrawlError::Cancelled),
            sent = self.tx.send(item) => sent.map_err(|_| CrawlError::QueueClosed(self.name)),
        }
    }

    /// Enqueue without waiting.
    pub fn try_push(&self, item: T) -> Result<(), CrawlError> {
        self.tx.try_send(item).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => CrawlError::QueueFull(self.name),
            mpsc::error::TrySendError::Closed(_) => CrawlError::QueueClosed(self.name),
        })
    }

    /// Wait for a free slot. The returned permit sends without waiting.
    ///
    /// Dropping the future before it resolves gives up nothing, so this is
    /// safe to race against other work in `select!`.
    pub async fn reserve(&self) -> Result<mpsc::Permit<'_, T>, CrawlError> {
        self.tx
            .reserve()
            .await
            .map_err(|_| CrawlError::QueueClosed(self.name))
    }

    /// Claim a free slot if there is one.
    pub fn try_reserve(&self) -> Result<mpsc::Permit<'_, T>, CrawlError> {
        self.tx.try_reserve().map_err(|err| match err {
            mpsc::error::TrySendError::Full(()) => CrawlError::QueueFull(self.name),
            mpsc::error::TrySendError::Closed(()) => CrawlError::QueueClosed(self.name),
        })
    }

    /// Dequeue, waiting for an item. `None` once shutdown fires.
    pub async fn pop(&self, shutdown: &Shutdown) -> Option<T> {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => None,
            item = async { self.rx.lock().await.recv().await } => item,
        }
    }

    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}
