//! The purchase orchestrator: consumes store events and drives receipt
//! acquisition, verification, and finalization to a single published
//! terminal outcome per attempt.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::bus::NotificationBus;
use crate::error::{BillingError, Result};
use crate::models::{
    Product, PurchaseErrorEvent, PurchaseOutcome, PurchaseUpdateEvent, Receipt, StoreErrorKind,
    TransactionHandle,
};
use crate::services::{ReceiptAcquirer, ReceiptVerifier, TransactionFinalizer};
use crate::store::StoreConnection;

/// Non-terminal states of one purchase attempt. Terminal transitions
/// publish an outcome and clear the attempt slot, which is the idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Requested,
    AwaitingStoreEvent,
    AcquiringReceipt,
    VerifyingReceipt,
    Finalizing,
}

/// One in-flight purchase. Owned exclusively by the pipeline's single slot
/// and destroyed once its terminal outcome has been published.
#[derive(Debug)]
pub struct PurchaseAttempt {
    pub id: Uuid,
    pub product_id: String,
    pub state: AttemptState,
    pub transaction: Option<TransactionHandle>,
    pub receipt: Option<Receipt>,
    pub error: Option<BillingError>,
}

impl PurchaseAttempt {
    fn new(product_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id: product_id.to_string(),
            state: AttemptState::Requested,
            transaction: None,
            receipt: None,
            error: None,
        }
    }
}

/// The purchase state machine.
///
/// The store's event stream carries no attempt correlation, so at most one
/// attempt is in flight: the slot's mutex is held for the whole of event
/// processing and `request_purchase` rejects instead of queueing behind it.
pub struct PurchasePipeline {
    connection: Arc<StoreConnection>,
    receipts: ReceiptAcquirer,
    verifier: Arc<dyn ReceiptVerifier>,
    finalizer: TransactionFinalizer,
    bus: Arc<NotificationBus>,
    attempt: Mutex<Option<PurchaseAttempt>>,
    availability: StdMutex<HashMap<String, bool>>,
    production_store: bool,
}

impl PurchasePipeline {
    pub fn new(
        connection: Arc<StoreConnection>,
        receipts: ReceiptAcquirer,
        verifier: Arc<dyn ReceiptVerifier>,
        finalizer: TransactionFinalizer,
        bus: Arc<NotificationBus>,
        production_store: bool,
    ) -> Self {
        Self {
            connection,
            receipts,
            verifier,
            finalizer,
            bus,
            attempt: Mutex::new(None),
            availability: StdMutex::new(HashMap::new()),
            production_store,
        }
    }

    /// Record the latest reconciled catalog; `request_purchase` consults
    /// this snapshot for its precondition check.
    pub fn record_catalog(&self, products: &[Product]) {
        let mut availability = self.availability.lock().expect("availability lock");
        availability.clear();
        for product in products {
            availability.insert(product.product_id.clone(), product.is_available);
        }
    }

    /// Begin a purchase. The outcome arrives via the notification bus, not
    /// the return value; the only error returned here is
    /// `AttemptInProgress`, which leaves the active attempt untouched.
    #[instrument(skip(self))]
    pub async fn request_purchase(&self, product_id: &str) -> Result<()> {
        let mut slot = self
            .attempt
            .try_lock()
            .map_err(|_| BillingError::AttemptInProgress)?;
        if slot.is_some() {
            return Err(BillingError::AttemptInProgress);
        }

        if !self.connection.is_connected() {
            self.bus
                .publish(&PurchaseOutcome::failed(product_id, BillingError::StoreUnavailable));
            return Ok(());
        }

        match self
            .availability
            .lock()
            .expect("availability lock")
            .get(product_id)
            .copied()
        {
            Some(true) => {}
            Some(false) => {
                self.bus.publish(&PurchaseOutcome::failed(
                    product_id,
                    BillingError::Preconditions(format!(
                        "product {product_id} is not available in the store"
                    )),
                ));
                return Ok(());
            }
            None => {
                self.bus.publish(&PurchaseOutcome::failed(
                    product_id,
                    BillingError::Preconditions(format!(
                        "product {product_id} is not in the catalog"
                    )),
                ));
                return Ok(());
            }
        }

        let mut attempt = PurchaseAttempt::new(product_id);
        info!(attempt = %attempt.id, product_id, "starting purchase attempt");

        if let Err(err) = self.connection.request_subscription_purchase(product_id).await {
            warn!(attempt = %attempt.id, error = %err, "store purchase request failed");
            self.bus.publish(&PurchaseOutcome::failed(product_id, err));
            return Ok(());
        }

        attempt.state = AttemptState::AwaitingStoreEvent;
        *slot = Some(attempt);
        Ok(())
    }

    /// Consume a purchase-update event. Events with no awaiting attempt are
    /// stray (late or duplicate deliveries) and dropped.
    pub async fn handle_update(&self, event: PurchaseUpdateEvent) {
        let mut slot = self.attempt.lock().await;
        if !matches!(
            slot.as_ref(),
            Some(attempt) if attempt.state == AttemptState::AwaitingStoreEvent
        ) {
            debug!("ignoring stray store update event");
            return;
        }
        let Some(mut attempt) = slot.take() else {
            return;
        };

        if event.transaction.is_sentinel() && self.production_store {
            warn!(
                attempt = %attempt.id,
                "sentinel transaction observed in production store environment"
            );
        }

        attempt.state = AttemptState::AcquiringReceipt;
        attempt.transaction = Some(event.transaction.clone());

        let receipt = match self.receipts.acquire(&event).await {
            Ok(receipt) => receipt,
            Err(err) => {
                // Best-effort cleanup even though the attempt failed.
                self.finalizer.finalize(&event.transaction, false).await;
                info!(attempt = %attempt.id, error = %err, "purchase failed before verification");
                attempt.error = Some(err.clone());
                self.bus
                    .publish(&PurchaseOutcome::failed(attempt.product_id.as_str(), err));
                return;
            }
        };

        debug!(
            attempt = %attempt.id,
            receipt = %receipt.fingerprint(),
            "receipt acquired, verifying"
        );
        attempt.receipt = Some(receipt.clone());
        attempt.state = AttemptState::VerifyingReceipt;

        let result = self.verifier.verify(&receipt).await;
        if result.success {
            attempt.state = AttemptState::Finalizing;
            self.finalizer.finalize(&event.transaction, true).await;

            let entitlement = result.entitlement.unwrap_or_default();
            info!(attempt = %attempt.id, product_id = %attempt.product_id, "purchase verified");
            self.bus
                .publish(&PurchaseOutcome::succeeded(attempt.product_id.as_str(), entitlement));
        } else {
            self.finalizer.finalize(&event.transaction, false).await;

            let err = result.error.unwrap_or_else(|| {
                BillingError::VerificationRejected {
                    message: "verification failed".to_string(),
                    details: None,
                    status: None,
                }
            });
            warn!(attempt = %attempt.id, error = %err, "purchase verification failed");
            attempt.error = Some(err.clone());
            self.bus
                .publish(&PurchaseOutcome::failed(attempt.product_id.as_str(), err));
        }
    }

    /// Consume a purchase-error event. User cancellation is expected and
    /// published quietly; store errors are classified network vs. internal.
    pub async fn handle_error(&self, event: PurchaseErrorEvent) {
        let mut slot = self.attempt.lock().await;
        if !matches!(
            slot.as_ref(),
            Some(attempt) if attempt.state == AttemptState::AwaitingStoreEvent
        ) {
            debug!("ignoring stray store error event");
            return;
        }
        let Some(attempt) = slot.take() else {
            return;
        };

        let err = match event.kind {
            StoreErrorKind::UserCancelled => {
                debug!(attempt = %attempt.id, "purchase cancelled by user");
                BillingError::UserCancelled
            }
            StoreErrorKind::Network => {
                warn!(attempt = %attempt.id, message = %event.message, "store network error");
                BillingError::NetworkFailure(event.message)
            }
            StoreErrorKind::Store => {
                warn!(attempt = %attempt.id, message = %event.message, "store internal error");
                BillingError::StoreInternal(event.message)
            }
        };

        self.bus
            .publish(&PurchaseOutcome::failed(attempt.product_id.as_str(), err));
    }

    /// Product id and state of the active attempt, if any.
    pub async fn active_attempt(&self) -> Option<(String, AttemptState)> {
        self.attempt
            .lock()
            .await
            .as_ref()
            .map(|attempt| (attempt.product_id.clone(), attempt.state))
    }
}
