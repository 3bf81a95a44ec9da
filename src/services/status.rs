//! Read path for the user's current subscription status.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{instrument, warn};

use crate::auth::TokenProvider;
use crate::config::ApiConfig;
use crate::error::{BillingError, Result};
use crate::models::EntitlementStatus;

use super::verification::classify_error_body;

/// Queries the backend status endpoint and normalizes its response shapes.
/// Independent of the purchase pipeline.
pub struct EntitlementStatusClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

/// The backend answers with either a flat status body or one nested under
/// `subscription`. Nested must be tried first: the flat shape defaults every
/// field and would otherwise match anything.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatusBody {
    Nested { subscription: EntitlementStatus },
    Flat(EntitlementStatus),
}

impl EntitlementStatusClient {
    pub fn new(http: reqwest::Client, api: &ApiConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Fetch the current entitlement status. 404 means "no subscription
    /// exists yet", an expected steady state, returned as the inactive
    /// status rather than an error.
    #[instrument(skip(self))]
    pub async fn get_status(&self) -> Result<EntitlementStatus> {
        let mut request = self
            .http
            .get(format!("{}/billing/subscription/status", self.base_url));

        if let Some(token) = self.tokens.bearer_token().await {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "status request never reached the server");
                return Err(BillingError::NetworkFailure(err.to_string()));
            }
        };

        let status = response.status().as_u16();
        let body = response
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null);

        interpret_status_response(status, body)
    }
}

/// Pure interpretation of the status response, keyed on HTTP status and body.
pub fn interpret_status_response(
    status: u16,
    body: serde_json::Value,
) -> Result<EntitlementStatus> {
    if status == 404 {
        return Ok(EntitlementStatus::inactive());
    }

    if !(200..300).contains(&status) {
        return Err(classify_error_body(status, &body));
    }

    match serde_json::from_value::<StatusBody>(body) {
        Ok(StatusBody::Nested { subscription }) | Ok(StatusBody::Flat(subscription)) => {
            Ok(subscription)
        }
        Err(_) => Err(BillingError::VerificationRejected {
            message: "unrecognized status response shape".to_string(),
            details: None,
            status: Some(status),
        }),
    }
}
