//! Receipt verification against the backend entitlement service.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::auth::TokenProvider;
use crate::config::ApiConfig;
use crate::error::BillingError;
use crate::models::{EntitlementStatus, Receipt, VerificationResult};

/// Seam between the pipeline and the real verification client, so pipeline
/// transitions are testable with a scripted verifier.
#[async_trait]
pub trait ReceiptVerifier: Send + Sync {
    async fn verify(&self, receipt: &Receipt) -> VerificationResult;
}

/// Submits receipts to the backend entitlement endpoint and normalizes its
/// response and error shapes. Performs no retries of its own; retry policy
/// belongs to the caller.
pub struct VerificationClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

/// Success body: `{success, subscription}` or a bare `{subscription}`.
#[derive(Debug, Deserialize)]
struct VerifyBody {
    #[serde(default)]
    success: Option<bool>,
    subscription: EntitlementStatus,
}

/// Error body the backend attaches to non-2xx verification responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
    details: Option<String>,
    status: Option<u16>,
}

impl VerificationClient {
    pub fn new(http: reqwest::Client, api: &ApiConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Verify a receipt. Failures are carried inside the result, never
    /// returned as `Err`. The pipeline publishes them as outcomes.
    #[instrument(skip(self, receipt), fields(receipt = %receipt.fingerprint()))]
    pub async fn verify(&self, receipt: &Receipt) -> VerificationResult {
        let mut request = self
            .http
            .post(format!("{}/billing/subscription/verify", self.base_url))
            .json(&serde_json::json!({ "receipt": receipt.as_str() }));

        if let Some(token) = self.tokens.bearer_token().await {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                // No response received: distinct from a server rejection.
                warn!(error = %err, "verification request never reached the server");
                return VerificationResult::failed(BillingError::NetworkFailure(err.to_string()));
            }
        };

        let status = response.status().as_u16();
        let body = response
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null);

        let result = interpret_verify_response(status, body);
        if result.success {
            info!("receipt verified");
        }
        result
    }
}

#[async_trait]
impl ReceiptVerifier for VerificationClient {
    async fn verify(&self, receipt: &Receipt) -> VerificationResult {
        VerificationClient::verify(self, receipt).await
    }
}

/// Pure interpretation of the verification response, keyed on HTTP status
/// and body so it unit-tests without a server.
pub fn interpret_verify_response(status: u16, body: serde_json::Value) -> VerificationResult {
    if !(200..300).contains(&status) {
        return VerificationResult::failed(classify_error_body(status, &body));
    }

    match serde_json::from_value::<VerifyBody>(body) {
        Ok(VerifyBody {
            success: Some(false),
            ..
        }) => VerificationResult::failed(BillingError::VerificationRejected {
            message: "server reported verification failure".to_string(),
            details: None,
            status: Some(status),
        }),
        Ok(VerifyBody { subscription, .. }) => VerificationResult::verified(subscription),
        Err(_) => VerificationResult::failed(BillingError::VerificationRejected {
            message: "unrecognized verification response shape".to_string(),
            details: None,
            status: Some(status),
        }),
    }
}

/// Extract `{error|message, details, status}` from a non-2xx body. The HTTP
/// status fills in when the body omits its own.
pub(crate) fn classify_error_body(status: u16, body: &serde_json::Value) -> BillingError {
    let parsed: ErrorBody = serde_json::from_value(body.clone()).unwrap_or_default();

    BillingError::VerificationRejected {
        message: parsed
            .error
            .or(parsed.message)
            .unwrap_or_else(|| format!("request failed with status {status}")),
        details: parsed.details,
        status: parsed.status.or(Some(status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flagged_success_body() {
        let result = interpret_verify_response(
            200,
            json!({
                "success": true,
                "subscription": {
                    "isActive": true,
                    "hasEntitlement": true,
                    "productId": "pro.monthly",
                    "autoRenewing": true
                }
            }),
        );

        assert!(result.success);
        let entitlement = result.entitlement.expect("entitlement present");
        assert!(entitlement.is_active);
        assert_eq!(entitlement.product_id.as_deref(), Some("pro.monthly"));
    }

    #[test]
    fn test_bare_subscription_body_is_success() {
        let result = interpret_verify_response(
            200,
            json!({ "subscription": { "isActive": true, "hasEntitlement": true } }),
        );
        assert!(result.success);
    }

    #[test]
    fn test_success_false_is_rejection() {
        let result = interpret_verify_response(
            200,
            json!({ "success": false, "subscription": { "isActive": false } }),
        );
        assert!(!result.success);
        assert!(matches!(
            result.error,
            Some(BillingError::VerificationRejected { .. })
        ));
    }

    #[test]
    fn test_unrecognized_shape_is_normalization_failure() {
        let result = interpret_verify_response(200, json!({ "ok": true }));
        assert!(!result.success);
        match result.error {
            Some(BillingError::VerificationRejected { message, .. }) => {
                assert!(message.contains("unrecognized"));
            }
            other => panic!("expected VerificationRejected, got {other:?}"),
        }
    }

    #[test]
    fn test_http_error_carries_server_details() {
        let result = interpret_verify_response(
            400,
            json!({ "error": "invalid receipt", "details": "expired", "status": 400 }),
        );

        assert!(!result.success);
        match result.error {
            Some(BillingError::VerificationRejected {
                message,
                details,
                status,
            }) => {
                assert_eq!(message, "invalid receipt");
                assert_eq!(details.as_deref(), Some("expired"));
                assert_eq!(status, Some(400));
            }
            other => panic!("expected VerificationRejected, got {other:?}"),
        }
    }

    #[test]
    fn test_http_error_falls_back_to_message_field_and_http_status() {
        let result = interpret_verify_response(500, json!({ "message": "boom" }));
        match result.error {
            Some(BillingError::VerificationRejected {
                message, status, ..
            }) => {
                assert_eq!(message, "boom");
                assert_eq!(status, Some(500));
            }
            other => panic!("expected VerificationRejected, got {other:?}"),
        }
    }

    #[test]
    fn test_http_error_with_empty_body() {
        let result = interpret_verify_response(503, serde_json::Value::Null);
        match result.error {
            Some(BillingError::VerificationRejected { message, .. }) => {
                assert!(message.contains("503"));
            }
            other => panic!("expected VerificationRejected, got {other:?}"),
        }
    }
}
