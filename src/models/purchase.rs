use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::BillingError;

use super::entitlement::EntitlementStatus;

/// Transaction id the store reports for non-production test purchases.
pub const SENTINEL_TRANSACTION_ID: &str = "-1";

/// Opaque proof-of-purchase blob issued by the commerce store.
///
/// The blob itself is sensitive and large; `Debug` prints a SHA-256
/// fingerprint instead.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Receipt(String);

impl Receipt {
    pub fn new(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty blob counts as "no receipt" everywhere in the pipeline.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// SHA-256 fingerprint, safe to log.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Debug for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Receipt")
            .field(&format!("sha256:{}", &self.fingerprint()[..16]))
            .finish()
    }
}

/// Store-issued reference to one purchase event.
///
/// Sentinel handles identify non-production test transactions; they must
/// never be acknowledged as real money, which the variant split makes
/// unrepresentable rather than a scattered id comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionHandle {
    Production(String),
    Sentinel,
}

impl TransactionHandle {
    /// Tag a raw store transaction id. The store reports the reserved
    /// [`SENTINEL_TRANSACTION_ID`] for test transactions.
    pub fn from_store_id(id: impl Into<String>) -> Self {
        let id = id.into();
        if id == SENTINEL_TRANSACTION_ID {
            TransactionHandle::Sentinel
        } else {
            TransactionHandle::Production(id)
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, TransactionHandle::Sentinel)
    }
}

/// Purchase-update event emitted by the commerce store after the native
/// purchase flow completes.
#[derive(Debug, Clone)]
pub struct PurchaseUpdateEvent {
    pub transaction: TransactionHandle,
    pub product_id: Option<String>,
    /// Receipt embedded in the event itself, when the store includes one.
    pub receipt: Option<Receipt>,
}

/// Classification the store adapter applies to purchase-error events, so the
/// pipeline never string-matches store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The user dismissed the native purchase sheet.
    UserCancelled,
    /// The store could not reach its own backend.
    Network,
    /// Anything else the store reports.
    Store,
}

#[derive(Debug, Clone)]
pub struct PurchaseErrorEvent {
    pub kind: StoreErrorKind,
    pub message: String,
}

/// The single terminal value published for one purchase attempt.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub product_id: String,
    pub success: bool,
    pub entitlement: Option<EntitlementStatus>,
    pub error: Option<BillingError>,
}

impl PurchaseOutcome {
    pub fn succeeded(product_id: impl Into<String>, entitlement: EntitlementStatus) -> Self {
        Self {
            product_id: product_id.into(),
            success: true,
            entitlement: Some(entitlement),
            error: None,
        }
    }

    pub fn failed(product_id: impl Into<String>, error: BillingError) -> Self {
        Self {
            product_id: product_id.into(),
            success: false,
            entitlement: None,
            error: Some(error),
        }
    }
}
