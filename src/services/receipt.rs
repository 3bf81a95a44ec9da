//! Proof-of-purchase acquisition with ordered fallback.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::error::{BillingError, Result};
use crate::models::{PurchaseUpdateEvent, Receipt};
use crate::store::StoreConnection;

/// Obtains the receipt for a completed transaction. Strategies, in order:
///
/// 1. a fresh receipt pulled from the store (authoritative, covers all
///    historical entitlements);
/// 2. the receipt embedded in the triggering event, when present;
/// 3. a bounded fixed delay to absorb store eventual-consistency, then one
///    retry of (1).
///
/// Empty receipts count as missing at every step.
pub struct ReceiptAcquirer {
    connection: Arc<StoreConnection>,
    retry_delay: Duration,
}

impl ReceiptAcquirer {
    pub fn new(connection: Arc<StoreConnection>, retry_delay: Duration) -> Self {
        Self {
            connection,
            retry_delay,
        }
    }

    #[instrument(skip(self, event))]
    pub async fn acquire(&self, event: &PurchaseUpdateEvent) -> Result<Receipt> {
        if let Some(receipt) = self.fresh_receipt().await {
            debug!("acquired fresh store receipt");
            return Ok(receipt);
        }

        if let Some(receipt) = event.receipt.as_ref().filter(|r| !r.is_empty()) {
            debug!("falling back to receipt embedded in the store event");
            return Ok(receipt.clone());
        }

        debug!(
            delay_ms = self.retry_delay.as_millis() as u64,
            "no receipt yet, waiting before one delayed retry"
        );
        tokio::time::sleep(self.retry_delay).await;

        if let Some(receipt) = self.fresh_receipt().await {
            debug!("acquired store receipt on delayed retry");
            return Ok(receipt);
        }

        Err(BillingError::ReceiptUnavailable(
            "all acquisition strategies exhausted".to_string(),
        ))
    }

    async fn fresh_receipt(&self) -> Option<Receipt> {
        match self.connection.receipt().await {
            Ok(receipt) => receipt.filter(|r| !r.is_empty()),
            Err(err) => {
                debug!(error = %err, "store receipt fetch failed");
                None
            }
        }
    }
}
