use std::sync::Arc;
use std::time::Duration;

use consensus::Transaction;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::NodeResult;
use crate::storage::Storage;

/// Durable FIFO of transactions whose forge attempt was deferred.
///
/// Consumers peek at the head and [`ack`](RetryQueue::ack) it once the
/// outcome is persisted, so an entry survives a crash mid-resubmission.
#[derive(Clone, Debug)]
pub struct RetryQueue {
    storage: Storage,
    pushed: Arc<Notify>,
}

impl RetryQueue {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            pushed: Arc::new(Notify::new()),
        }
    }

    pub fn push(&self, transaction: &Transaction) -> NodeResult<()> {
        self.storage.enqueue_transaction(transaction)?;
        self.pushed.notify_one();
        Ok(())
    }

    pub fn try_peek(&self) -> NodeResult<Option<QueuedTransaction>> {
        Ok(self
            .storage
            .peek_transaction()?
            .map(|(id, transaction)| QueuedTransaction { id, transaction }))
    }

    /// Waits up to `timeout` for a head entry. Returns `None` when the queue
    /// stayed empty for the whole window.
    pub async fn peek_timeout(&self, timeout: Duration) -> NodeResult<Option<QueuedTransaction>> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.pushed.notified();
            if let Some(entry) = self.try_peek()? {
                return Ok(Some(entry));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_peek();
            }
        }
    }

    /// Removes a peeked entry. Returns false if it was already gone.
    pub fn ack(&self, id: u64) -> NodeResult<bool> {
        self.storage.remove_queued(id)
    }

    pub fn len(&self) -> usize {
        self.storage.queue_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A queued transaction together with the id needed to acknowledge it.
#[derive(Clone, Debug)]
pub struct QueuedTransaction {
    pub id: u64,
    pub transaction: Transaction,
}
