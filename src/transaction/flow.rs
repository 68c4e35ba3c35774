//! End-to-end orchestration of one ledger write.

use std::sync::Arc;

use crate::error::WriteError;
use crate::ledger::{LedgerWriter, WriteRequest};
use crate::services::DataServiceRegistry;
use crate::transaction::tracker::{TransactionProgress, TransactionTracker, TxStatus};

/// Drives a write through the tracker: simulate, submit, confirm, refresh.
pub struct WriteFlow {
    tracker: TransactionTracker,
    writer: Arc<dyn LedgerWriter>,
    registry: Option<Arc<DataServiceRegistry>>,
}

impl WriteFlow {
    pub fn new(tracker: TransactionTracker, writer: Arc<dyn LedgerWriter>) -> Self {
        Self {
            tracker,
            writer,
            registry: None,
        }
    }

    /// Refresh every domain after a confirmed write.
    pub fn with_registry(mut self, registry: Arc<DataServiceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn tracker(&self) -> &TransactionTracker {
        &self.tracker
    }

    fn fail(&self, error: WriteError) -> WriteError {
        let error = match error {
            WriteError::Network(raw) => WriteError::classify(&raw),
            other => other,
        };
        self.tracker.set_error(&error.to_string());
        error
    }

    /// Run `request` to completion.
    ///
    /// Errors are returned for writes that never reached the ledger; nothing
    /// is dispatched when simulation fails. Once dispatched, the settled
    /// progress is returned whether it confirmed or failed. A confirmed
    /// write triggers a forced refresh of every domain.
    pub async fn execute(&self, request: &WriteRequest) -> Result<TransactionProgress, WriteError> {
        let attempt = self.tracker.try_start().ok_or(WriteError::AlreadyPending)?;
        tracing::info!(%attempt, label = %request.label, to = %request.to, "Executing write");

        self.tracker.mark_simulating();
        if let Err(e) = self.writer.simulate(request).await {
            return Err(self.fail(e));
        }

        let hash = match self.writer.submit(request).await {
            Ok(hash) => hash,
            Err(e) => return Err(self.fail(e)),
        };

        if !self.tracker.set_hash(&hash) {
            return Err(WriteError::Confirmation(
                "Transaction tracking was reset before submission completed".to_string(),
            ));
        }

        let settled = self.tracker.wait_for_attempt(attempt).await;
        if settled.attempt != Some(attempt) {
            return Err(WriteError::Confirmation(
                "Transaction tracking was superseded by a newer write".to_string(),
            ));
        }

        if settled.status == TxStatus::Confirmed {
            if let Some(registry) = &self.registry {
                let report = registry.force_refresh_all().await;
                if !report.is_success() {
                    tracing::warn!(failed = report.failures().len(), "Post-write refresh incomplete");
                }
            }
        }
        Ok(settled)
    }
}
