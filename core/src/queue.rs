//! Fixed-capacity FIFO between the stream tees and the delivery worker.
//!
//! Producers suspend on a full queue and the consumer suspends on an empty
//! one. A slot is released as soon as a line is dequeued, whether or not its
//! delivery later succeeds.
use tokio::sync::mpsc;

use crate::error::WrapError;
use crate::tee::LogLine;

/// Largest capacity the underlying channel accepts.
pub const MAX_CAPACITY: usize = tokio::sync::Semaphore::MAX_PERMITS;

/// Owner of both queue ends until [`BoundedQueue::split`] hands them out.
pub struct BoundedQueue {
    tx: mpsc::Sender<LogLine>,
    rx: mpsc::Receiver<LogLine>,
}

impl BoundedQueue {
    pub fn new(capacity: usize) -> Result<Self, WrapError> {
        if capacity == 0 {
            return Err(WrapError::Config(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if capacity > MAX_CAPACITY {
            return Err(WrapError::Config(format!(
                "queue capacity must be at most {MAX_CAPACITY}, got {capacity}"
            )));
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self { tx, rx })
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    pub fn split(self) -> (QueueProducer, QueueConsumer) {
        (QueueProducer { tx: self.tx }, QueueConsumer { rx: self.rx })
    }
}

/// Returned by [`QueueProducer::enqueue`] once the consumer has gone away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueClosed(pub LogLine);

#[derive(Clone)]
pub struct QueueProducer {
    tx: mpsc::Sender<LogLine>,
}

impl QueueProducer {
    pub async fn enqueue(&self, line: LogLine) -> Result<(), QueueClosed> {
        self.tx.send(line).await.map_err(|e| QueueClosed(e.0))
    }

    /// Lines currently buffered.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct QueueConsumer {
    rx: mpsc::Receiver<LogLine>,
}

impl QueueConsumer {
    /// Oldest line, or `None` once every producer is gone and the queue is empty.
    pub async fn dequeue(&mut self) -> Option<LogLine> {
        self.rx.recv().await
    }
}
