//! Shared test doubles: a scripted commerce store and verifier.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use inspectra_billing::auth::TokenProvider;
use inspectra_billing::bus::NotificationBus;
use inspectra_billing::error::StoreError;
use inspectra_billing::models::{
    PeriodUnit, Product, PurchaseErrorEvent, PurchaseOutcome, PurchaseUpdateEvent,
    RawStoreProduct, Receipt, SubscriptionPeriod, TransactionHandle, VerificationResult,
};
use inspectra_billing::pipeline::PurchasePipeline;
use inspectra_billing::services::{ReceiptAcquirer, ReceiptVerifier, TransactionFinalizer};
use inspectra_billing::store::{CommerceStore, StoreConnection, StoreEventSinks};

/// Scripted fake commerce store. `receipts` holds the results of successive
/// `receipt()` calls; an exhausted script yields `Ok(None)`.
#[derive(Default)]
pub struct MockStore {
    pub live_products: Mutex<Vec<RawStoreProduct>>,
    pub receipts: Mutex<VecDeque<Option<Receipt>>>,
    pub fail_connect: Mutex<bool>,
    pub receipt_calls: AtomicUsize,
    pub acknowledged: Mutex<Vec<(String, bool)>>,
    pub purchase_requests: Mutex<Vec<String>>,
    pub product_queries: Mutex<Vec<Vec<String>>>,
    sinks: Mutex<Option<StoreEventSinks>>,
}

impl MockStore {
    pub fn with_live_products(products: Vec<RawStoreProduct>) -> Self {
        Self {
            live_products: Mutex::new(products),
            ..Default::default()
        }
    }

    pub fn push_receipt(&self, receipt: Option<Receipt>) {
        self.receipts.lock().unwrap().push_back(receipt);
    }

    pub fn emit_update(&self, event: PurchaseUpdateEvent) {
        let sinks = self.sinks.lock().unwrap();
        sinks
            .as_ref()
            .expect("store connected")
            .updates
            .send(event)
            .expect("update receiver alive");
    }

    pub fn emit_error(&self, event: PurchaseErrorEvent) {
        let sinks = self.sinks.lock().unwrap();
        sinks
            .as_ref()
            .expect("store connected")
            .errors
            .send(event)
            .expect("error receiver alive");
    }
}

#[async_trait]
impl CommerceStore for MockStore {
    async fn connect(&self, sinks: StoreEventSinks) -> Result<(), StoreError> {
        if *self.fail_connect.lock().unwrap() {
            return Err(StoreError::Connection("simulated connect failure".into()));
        }
        *self.sinks.lock().unwrap() = Some(sinks);
        Ok(())
    }

    async fn disconnect(&self) {
        self.sinks.lock().unwrap().take();
    }

    async fn subscription_products(
        &self,
        product_ids: &[String],
    ) -> Result<Vec<RawStoreProduct>, StoreError> {
        self.product_queries
            .lock()
            .unwrap()
            .push(product_ids.to_vec());
        Ok(self.live_products.lock().unwrap().clone())
    }

    async fn request_subscription_purchase(&self, product_id: &str) -> Result<(), StoreError> {
        self.purchase_requests
            .lock()
            .unwrap()
            .push(product_id.to_string());
        Ok(())
    }

    async fn receipt(&self) -> Result<Option<Receipt>, StoreError> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .receipts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(None))
    }

    async fn acknowledge_transaction(
        &self,
        transaction_id: &str,
        was_successful: bool,
    ) -> Result<(), StoreError> {
        self.acknowledged
            .lock()
            .unwrap()
            .push((transaction_id.to_string(), was_successful));
        Ok(())
    }
}

/// Scripted verifier; an exhausted script fails loudly so tests never pass
/// on an accidental extra verification call.
#[derive(Default)]
pub struct MockVerifier {
    pub results: Mutex<VecDeque<VerificationResult>>,
    pub calls: AtomicUsize,
}

impl MockVerifier {
    pub fn scripted(results: Vec<VerificationResult>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReceiptVerifier for MockVerifier {
    async fn verify(&self, _receipt: &Receipt) -> VerificationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .expect("verifier called more times than scripted")
    }
}

pub struct StaticTokens(pub Option<String>);

#[async_trait]
impl TokenProvider for StaticTokens {
    async fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Pipeline wired to the mock store and verifier with a short receipt retry
/// delay. The store is left unconnected; call `connection.connect()` first
/// in tests that need it.
pub fn build_pipeline(
    store: Arc<MockStore>,
    verifier: Arc<MockVerifier>,
    production_store: bool,
) -> (Arc<PurchasePipeline>, Arc<StoreConnection>, Arc<NotificationBus>) {
    let connection = Arc::new(StoreConnection::new(store));
    let bus = Arc::new(NotificationBus::new());
    let pipeline = Arc::new(PurchasePipeline::new(
        Arc::clone(&connection),
        ReceiptAcquirer::new(Arc::clone(&connection), Duration::from_millis(10)),
        verifier,
        TransactionFinalizer::new(Arc::clone(&connection)),
        Arc::clone(&bus),
        production_store,
    ));
    (pipeline, connection, bus)
}

/// Subscribe a collector that appends every published outcome.
pub fn collect_outcomes(bus: &NotificationBus) -> Arc<Mutex<Vec<PurchaseOutcome>>> {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outcomes);
    bus.subscribe(move |outcome| sink.lock().unwrap().push(outcome.clone()));
    outcomes
}

pub fn available_product(product_id: &str) -> Product {
    Product {
        product_id: product_id.to_string(),
        display_name: format!("{product_id} plan"),
        description: "Unlimited inspections".to_string(),
        features: vec!["Unlimited units".to_string()],
        localized_price: "$9.99".to_string(),
        currency: Some("USD".to_string()),
        subscription_period: Some(SubscriptionPeriod {
            unit: PeriodUnit::Month,
            count: 1,
        }),
        is_available: true,
    }
}

pub fn unavailable_product(product_id: &str) -> Product {
    Product {
        is_available: false,
        localized_price: "N/A".to_string(),
        currency: None,
        subscription_period: None,
        ..available_product(product_id)
    }
}

pub fn update_event(transaction: TransactionHandle, receipt: Option<Receipt>) -> PurchaseUpdateEvent {
    PurchaseUpdateEvent {
        transaction,
        product_id: Some("pro.monthly".to_string()),
        receipt,
    }
}
