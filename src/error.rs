//! Error taxonomy for the billing pipeline.
//!
//! Every failure produced inside the pipeline is delivered to subscribers as
//! part of a `PurchaseOutcome`; nothing is returned across the
//! `request_purchase` boundary except `AttemptInProgress`.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    /// The commerce store connection was never established (or has been torn
    /// down). Fatal to all store-backed operations until `connect` succeeds.
    #[error("commerce store unavailable")]
    StoreUnavailable,

    /// Unknown or unavailable product: caller bug or stale catalog.
    #[error("purchase preconditions not met: {0}")]
    Preconditions(String),

    /// A purchase attempt is already in flight; the store's event stream
    /// carries no attempt correlation, so concurrent attempts are rejected.
    #[error("a purchase attempt is already in progress")]
    AttemptInProgress,

    /// The user dismissed the native purchase sheet. Expected, non-alarming.
    #[error("purchase cancelled by user")]
    UserCancelled,

    /// Every receipt acquisition strategy exhausted.
    #[error("receipt unavailable: {0}")]
    ReceiptUnavailable(String),

    /// The backend (or store) was unreachable; the request never produced a
    /// response.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The backend explicitly rejected the receipt. Carries the
    /// server-supplied message, details, and HTTP status when present.
    #[error("verification rejected: {message}")]
    VerificationRejected {
        message: String,
        details: Option<String>,
        status: Option<u16>,
    },

    /// The commerce store reported an internal error for the purchase.
    #[error("store error: {0}")]
    StoreInternal(String),
}

impl BillingError {
    /// Stable machine-readable code for the UI layer.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::StoreUnavailable => "STORE_UNAVAILABLE",
            BillingError::Preconditions(_) => "PRECONDITIONS",
            BillingError::AttemptInProgress => "ATTEMPT_IN_PROGRESS",
            BillingError::UserCancelled => "USER_CANCELLED",
            BillingError::ReceiptUnavailable(_) => "RECEIPT_UNAVAILABLE",
            BillingError::NetworkFailure(_) => "NETWORK_FAILURE",
            BillingError::VerificationRejected { .. } => "VERIFICATION_REJECTED",
            BillingError::StoreInternal(_) => "STORE_ERROR",
        }
    }

    /// Whether re-attempting the same purchase can reasonably succeed
    /// without any other state changing first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BillingError::StoreUnavailable
                | BillingError::ReceiptUnavailable(_)
                | BillingError::NetworkFailure(_)
                | BillingError::StoreInternal(_)
        )
    }

    /// Server-supplied detail text, when the backend provided one.
    pub fn details(&self) -> Option<&str> {
        match self {
            BillingError::VerificationRejected { details, .. } => details.as_deref(),
            _ => None,
        }
    }
}

/// Errors surfaced by the platform commerce store adapter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("store operation failed: {0}")]
    Operation(String),
}

impl From<StoreError> for BillingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connection(_) => BillingError::StoreUnavailable,
            StoreError::Operation(msg) => BillingError::StoreInternal(msg),
        }
    }
}

// Helper type for results
pub type Result<T> = std::result::Result<T, BillingError>;
