//! Best-effort transaction acknowledgment back to the commerce store.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::models::TransactionHandle;
use crate::store::StoreConnection;

/// Acknowledges processed transactions so the store stops redelivering
/// them. Finalization is cleanup, not a correctness requirement for the
/// entitlement: errors are logged once and swallowed, and a failed
/// acknowledgment never overrides an outcome already published.
pub struct TransactionFinalizer {
    connection: Arc<StoreConnection>,
}

impl TransactionFinalizer {
    pub fn new(connection: Arc<StoreConnection>) -> Self {
        Self { connection }
    }

    #[instrument(skip(self))]
    pub async fn finalize(&self, handle: &TransactionHandle, was_successful: bool) {
        match handle {
            // Sentinel transactions must never be acknowledged as real
            // money; the store call is skipped outright.
            TransactionHandle::Sentinel => {
                debug!("skipping acknowledgment for sentinel transaction");
            }
            TransactionHandle::Production(transaction_id) => {
                if let Err(err) = self
                    .connection
                    .acknowledge_transaction(transaction_id, was_successful)
                    .await
                {
                    warn!(
                        error = %err,
                        transaction_id = %transaction_id,
                        was_successful,
                        "transaction acknowledgment failed"
                    );
                }
            }
        }
    }
}
