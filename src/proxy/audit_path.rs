//! Off-request audit path: a bounded queue of exchange records drained by a
//! single worker task into the configured [`AuditStore`]

use crate::domain::exchange::ExchangeRecord;
use crate::infrastructure::audit_store::{AuditStore, AuditStoreError};
use crate::infrastructure::log_messages::audit;
use crate::proxy::types::QueueCapacity;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

/// Handle used on the request path to hand records to the worker
///
/// Submitting never waits: when the queue is full or the worker has gone the
/// record is dropped with a warning, so audit trouble never reaches clients.
#[derive(Clone, Debug)]
pub struct AuditLogger {
    tx: mpsc::Sender<ExchangeRecord>,
}

impl AuditLogger {
    /// Create a logger together with the receiving end for its worker
    pub fn channel(capacity: QueueCapacity) -> (Self, mpsc::Receiver<ExchangeRecord>) {
        let (tx, rx) = mpsc::channel(*capacity.as_ref());
        (Self { tx }, rx)
    }

    /// Enqueue a record for persistence
    pub fn submit(&self, record: ExchangeRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                warn!(request_id = %record.request_id, "{}", audit::QUEUE_FULL);
            }
            Err(TrySendError::Closed(record)) => {
                warn!(request_id = %record.request_id, "{}", audit::QUEUE_CLOSED);
            }
        }
    }
}

/// Background task persisting queued records one at a time
pub struct AuditWorker {
    rx: mpsc::Receiver<ExchangeRecord>,
    store: Arc<dyn AuditStore>,
    insert_timeout: Duration,
}

impl AuditWorker {
    pub fn new(
        rx: mpsc::Receiver<ExchangeRecord>,
        store: Arc<dyn AuditStore>,
        insert_timeout: Duration,
    ) -> Self {
        Self {
            rx,
            store,
            insert_timeout,
        }
    }

    /// Run until every [`AuditLogger`] clone has been dropped and the queue
    /// is empty. Returns the number of records persisted.
    pub async fn run(mut self) -> usize {
        info!("{}", audit::WORKER_STARTED);
        let mut persisted = 0;

        while let Some(record) = self.rx.recv().await {
            match self.persist(&record).await {
                Ok(()) => {
                    persisted += 1;
                    debug!(request_id = %record.request_id, "Exchange record persisted");
                }
                Err(e) => {
                    error!(
                        request_id = %record.request_id,
                        error = %e,
                        "{}",
                        audit::INSERT_FAILED
                    );
                }
            }
        }

        info!(persisted, "{}", audit::WORKER_STOPPED);
        persisted
    }

    async fn persist(&self, record: &ExchangeRecord) -> Result<(), AuditStoreError> {
        tokio::time::timeout(self.insert_timeout, self.store.insert(record))
            .await
            .map_err(|_| AuditStoreError::Timeout(self.insert_timeout))?
    }
}
