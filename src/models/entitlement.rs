use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::error::BillingError;

/// Normalized subscription status.
///
/// The backend answers status and verification calls with several ad hoc
/// shapes (flat vs. nested under `subscription`, with or without a `success`
/// flag); all of them collapse to this one type and shape variance never
/// leaks past the verification/status clients. `Default` is the
/// inactive-no-entitlement shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntitlementStatus {
    pub is_active: bool,
    pub status: Option<String>,
    pub product_id: Option<String>,
    pub expiration_date: Option<String>,
    pub auto_renewing: bool,
    pub has_entitlement: bool,
    pub purchase_date: Option<String>,
}

impl EntitlementStatus {
    /// The expected steady state before any purchase exists.
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Local expiration check for UI gating between status refreshes.
    /// Returns `false` when no expiration date is present or it fails to
    /// parse; the backend's `is_active` stays authoritative.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expiration_date
            .as_deref()
            .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
            .map(|expires| expires <= now)
            .unwrap_or(false)
    }
}

/// Result of submitting a receipt to the backend entitlement service.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub success: bool,
    pub entitlement: Option<EntitlementStatus>,
    pub error: Option<BillingError>,
}

impl VerificationResult {
    pub fn verified(entitlement: EntitlementStatus) -> Self {
        Self {
            success: true,
            entitlement: Some(entitlement),
            error: None,
        }
    }

    pub fn failed(error: BillingError) -> Self {
        Self {
            success: false,
            entitlement: None,
            error: Some(error),
        }
    }
}
