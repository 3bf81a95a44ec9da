//! Facade wiring the billing components together for the UI layer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::auth::TokenProvider;
use crate::bus::{NotificationBus, SubscriptionId};
use crate::config::BillingConfig;
use crate::error::Result;
use crate::models::{EntitlementStatus, Product, PurchaseOutcome};
use crate::pipeline::PurchasePipeline;
use crate::services::{
    CatalogReconciler, EntitlementStatusClient, ReceiptAcquirer, TransactionFinalizer,
    VerificationClient,
};
use crate::store::{CommerceStore, StoreConnection, StoreEventStreams};

/// Entry point for the host app. Owns the store connection lifecycle, the
/// event loop task, and the purchase pipeline.
pub struct BillingClient {
    connection: Arc<StoreConnection>,
    pipeline: Arc<PurchasePipeline>,
    catalog: CatalogReconciler,
    status: EntitlementStatusClient,
    bus: Arc<NotificationBus>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl BillingClient {
    pub fn new(
        config: BillingConfig,
        store: Arc<dyn CommerceStore>,
        tokens: Arc<dyn TokenProvider>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.api.request_timeout_ms))
            .build()?;

        let connection = Arc::new(StoreConnection::new(store));
        let bus = Arc::new(NotificationBus::new());

        let verifier = Arc::new(VerificationClient::new(
            http.clone(),
            &config.api,
            Arc::clone(&tokens),
        ));
        let pipeline = Arc::new(PurchasePipeline::new(
            Arc::clone(&connection),
            ReceiptAcquirer::new(
                Arc::clone(&connection),
                Duration::from_millis(config.store.receipt_retry_delay_ms),
            ),
            verifier,
            TransactionFinalizer::new(Arc::clone(&connection)),
            Arc::clone(&bus),
            config.store.is_production(),
        ));
        let catalog = CatalogReconciler::new(
            http.clone(),
            &config.api,
            Arc::clone(&tokens),
            Arc::clone(&connection),
        );
        let status = EntitlementStatusClient::new(http, &config.api, tokens);

        Ok(Self {
            connection,
            pipeline,
            catalog,
            status,
            bus,
            event_loop: Mutex::new(None),
        })
    }

    /// Connect to the commerce store and start consuming its event streams.
    /// Returns `false` when the store connection could not be established;
    /// the client then fails fast on store-backed operations until retried.
    pub async fn initialize(&self) -> bool {
        if !self.connection.connect().await {
            return false;
        }

        if let Some(streams) = self.connection.take_event_streams() {
            let pipeline = Arc::clone(&self.pipeline);
            let handle = tokio::spawn(run_event_loop(pipeline, streams));
            *self.event_loop.lock().expect("event loop lock") = Some(handle);
        }

        info!("billing client initialized");
        true
    }

    /// Stop the event loop and tear the store connection down.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.event_loop.lock().expect("event loop lock").take() {
            handle.abort();
        }
        self.connection.disconnect().await;
        info!("billing client shut down");
    }

    /// Fetch the reconciled product catalog and record availability for
    /// purchase precondition checks.
    pub async fn get_catalog(&self) -> Result<Vec<Product>> {
        let products = self.catalog.fetch_catalog().await?;
        self.pipeline.record_catalog(&products);
        Ok(products)
    }

    /// Begin a purchase; the outcome is delivered through [`subscribe`],
    /// not the return value.
    ///
    /// [`subscribe`]: BillingClient::subscribe
    pub async fn request_purchase(&self, product_id: &str) -> Result<()> {
        self.pipeline.request_purchase(product_id).await
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PurchaseOutcome) + Send + Sync + 'static,
    {
        self.bus.subscribe(callback)
    }

    pub fn unsubscribe(&self, subscription: SubscriptionId) {
        self.bus.unsubscribe(subscription);
    }

    /// Current subscription status from the backend. Independent read path;
    /// never touches the purchase pipeline.
    pub async fn get_status(&self) -> Result<EntitlementStatus> {
        self.status.get_status().await
    }
}

async fn run_event_loop(pipeline: Arc<PurchasePipeline>, mut streams: StoreEventStreams) {
    loop {
        tokio::select! {
            update = streams.updates.recv() => match update {
                Some(event) => pipeline.handle_update(event).await,
                None => break,
            },
            error = streams.errors.recv() => match error {
                Some(event) => pipeline.handle_error(event).await,
                None => break,
            },
        }
    }
    debug!("store event loop ended");
}
