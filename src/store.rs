//! Connection lifecycle for the platform commerce store.
//!
//! The real store adapter lives in the host app; this module owns the
//! connect/disconnect lifecycle and the two persistent event subscriptions,
//! and fails fast with `StoreUnavailable` whenever the connection is down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::error::{BillingError, Result, StoreError};
use crate::models::{PurchaseErrorEvent, PurchaseUpdateEvent, RawStoreProduct, Receipt};

/// Sender halves handed to the store adapter on connect; the adapter
/// forwards purchase events through them unchanged.
pub struct StoreEventSinks {
    pub updates: UnboundedSender<PurchaseUpdateEvent>,
    pub errors: UnboundedSender<PurchaseErrorEvent>,
}

/// Receiver halves consumed by the facade's event loop.
pub struct StoreEventStreams {
    pub updates: UnboundedReceiver<PurchaseUpdateEvent>,
    pub errors: UnboundedReceiver<PurchaseErrorEvent>,
}

/// The platform commerce store, as the pipeline sees it.
#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Establish the store connection and register the event sinks.
    async fn connect(&self, sinks: StoreEventSinks) -> std::result::Result<(), StoreError>;

    /// Tear down the connection and release registered listeners.
    async fn disconnect(&self);

    /// Live subscription data for exactly the given product ids.
    async fn subscription_products(
        &self,
        product_ids: &[String],
    ) -> std::result::Result<Vec<RawStoreProduct>, StoreError>;

    /// Begin the native purchase flow; completion arrives via the sinks.
    async fn request_subscription_purchase(
        &self,
        product_id: &str,
    ) -> std::result::Result<(), StoreError>;

    /// Fresh receipt covering all historical entitlements, when available.
    async fn receipt(&self) -> std::result::Result<Option<Receipt>, StoreError>;

    /// Acknowledge a processed transaction so the store stops redelivering
    /// it. `was_successful` tells the store whether our side completed.
    async fn acknowledge_transaction(
        &self,
        transaction_id: &str,
        was_successful: bool,
    ) -> std::result::Result<(), StoreError>;
}

/// Owns the store connection lifecycle. Every store-backed operation gates
/// on the connected flag so a failed `connect` degrades to fast
/// `StoreUnavailable` errors instead of half-working calls.
pub struct StoreConnection {
    store: Arc<dyn CommerceStore>,
    connected: AtomicBool,
    streams: Mutex<Option<StoreEventStreams>>,
}

impl StoreConnection {
    pub fn new(store: Arc<dyn CommerceStore>) -> Self {
        Self {
            store,
            connected: AtomicBool::new(false),
            streams: Mutex::new(None),
        }
    }

    /// Connect exactly once; repeated calls while connected are no-ops
    /// returning `true`. Registers one channel per event type with the
    /// store and stashes the receiver halves for [`take_event_streams`].
    ///
    /// [`take_event_streams`]: StoreConnection::take_event_streams
    pub async fn connect(&self) -> bool {
        if self.connected.load(Ordering::Acquire) {
            debug!("store already connected");
            return true;
        }

        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        match self
            .store
            .connect(StoreEventSinks {
                updates: update_tx,
                errors: error_tx,
            })
            .await
        {
            Ok(()) => {
                *self.streams.lock().expect("streams lock") = Some(StoreEventStreams {
                    updates: update_rx,
                    errors: error_rx,
                });
                self.connected.store(true, Ordering::Release);
                debug!("store connected");
                true
            }
            Err(err) => {
                warn!(error = %err, "store connection failed");
                false
            }
        }
    }

    /// Unregister store listeners, then drop the event receivers, then clear
    /// the connected flag. Safe to call when never connected.
    pub async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            self.store.disconnect().await;
        }
        self.streams.lock().expect("streams lock").take();
        debug!("store disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Hand the event receivers to the facade's event loop. Yields `None`
    /// once taken or when never connected.
    pub fn take_event_streams(&self) -> Option<StoreEventStreams> {
        self.streams.lock().expect("streams lock").take()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(BillingError::StoreUnavailable)
        }
    }

    pub async fn subscription_products(
        &self,
        product_ids: &[String],
    ) -> Result<Vec<RawStoreProduct>> {
        self.ensure_connected()?;
        Ok(self.store.subscription_products(product_ids).await?)
    }

    pub async fn request_subscription_purchase(&self, product_id: &str) -> Result<()> {
        self.ensure_connected()?;
        Ok(self.store.request_subscription_purchase(product_id).await?)
    }

    pub async fn receipt(&self) -> Result<Option<Receipt>> {
        self.ensure_connected()?;
        Ok(self.store.receipt().await?)
    }

    pub async fn acknowledge_transaction(
        &self,
        transaction_id: &str,
        was_successful: bool,
    ) -> Result<()> {
        self.ensure_connected()?;
        Ok(self
            .store
            .acknowledge_transaction(transaction_id, was_successful)
            .await?)
    }
}
