//! Catalog reconciliation: backend-declared products joined with live store
//! pricing.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::auth::TokenProvider;
use crate::config::ApiConfig;
use crate::error::{BillingError, Result};
use crate::models::{BackendProduct, Product, RawStoreProduct};
use crate::store::StoreConnection;

use super::verification::classify_error_body;

/// Price string shown for products the live store catalog does not carry.
pub const UNAVAILABLE_PRICE: &str = "N/A";

pub struct CatalogReconciler {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    connection: Arc<StoreConnection>,
}

impl CatalogReconciler {
    pub fn new(
        http: reqwest::Client,
        api: &ApiConfig,
        tokens: Arc<dyn TokenProvider>,
        connection: Arc<StoreConnection>,
    ) -> Self {
        Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            tokens,
            connection,
        }
    }

    /// Fetch the backend catalog and merge live store pricing into it.
    #[instrument(skip(self))]
    pub async fn fetch_catalog(&self) -> Result<Vec<Product>> {
        let backend = self.backend_products().await?;
        self.resolve(backend).await
    }

    /// Resolve an already-fetched backend catalog against the store. An
    /// empty backend list short-circuits without contacting the store.
    pub async fn resolve(&self, backend: Vec<BackendProduct>) -> Result<Vec<Product>> {
        if backend.is_empty() {
            debug!("backend declared no products, skipping store lookup");
            return Ok(Vec::new());
        }

        let ids: Vec<String> = backend.iter().map(|p| p.product_id.clone()).collect();
        let live = self.connection.subscription_products(&ids).await?;
        Ok(merge_catalog(backend, live))
    }

    async fn backend_products(&self) -> Result<Vec<BackendProduct>> {
        let mut request = self.http.get(format!("{}/billing/products", self.base_url));

        if let Some(token) = self.tokens.bearer_token().await {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "product catalog request never reached the server");
                return Err(BillingError::NetworkFailure(err.to_string()));
            }
        };

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response
                .json::<serde_json::Value>()
                .await
                .unwrap_or(serde_json::Value::Null);
            return Err(classify_error_body(status, &body));
        }

        response
            .json::<Vec<BackendProduct>>()
            .await
            .map_err(|err| BillingError::NetworkFailure(format!("invalid catalog body: {err}")))
    }
}

/// Left join on the backend catalog: the store contributes pricing for
/// declared products and never introduces new ones. Backend entries absent
/// from the store surface as unavailable with a placeholder price.
pub fn merge_catalog(backend: Vec<BackendProduct>, live: Vec<RawStoreProduct>) -> Vec<Product> {
    let mut by_id: HashMap<String, RawStoreProduct> = live
        .into_iter()
        .map(|p| (p.product_id.clone(), p))
        .collect();

    backend
        .into_iter()
        .map(|declared| match by_id.remove(&declared.product_id) {
            Some(store) => Product {
                product_id: declared.product_id,
                display_name: declared.display_name,
                description: declared.description,
                features: declared.features,
                localized_price: store.localized_price,
                currency: Some(store.currency),
                subscription_period: store.subscription_period,
                is_available: true,
            },
            None => {
                debug!(product_id = %declared.product_id, "product absent from live store catalog");
                Product {
                    product_id: declared.product_id,
                    display_name: declared.display_name,
                    description: declared.description,
                    features: declared.features,
                    localized_price: UNAVAILABLE_PRICE.to_string(),
                    currency: None,
                    subscription_period: None,
                    is_available: false,
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PeriodUnit, SubscriptionPeriod};

    fn declared(id: &str) -> BackendProduct {
        BackendProduct {
            product_id: id.to_string(),
            display_name: format!("{id} plan"),
            description: "Unlimited inspections".to_string(),
            features: vec!["Unlimited units".to_string()],
        }
    }

    fn live(id: &str) -> RawStoreProduct {
        RawStoreProduct {
            product_id: id.to_string(),
            localized_price: "$9.99".to_string(),
            currency: "USD".to_string(),
            subscription_period: Some(SubscriptionPeriod {
                unit: PeriodUnit::Month,
                count: 1,
            }),
        }
    }

    #[test]
    fn test_merge_joins_live_pricing() {
        let products = merge_catalog(vec![declared("pro.monthly")], vec![live("pro.monthly")]);

        assert_eq!(products.len(), 1);
        let product = &products[0];
        assert!(product.is_available);
        assert_eq!(product.localized_price, "$9.99");
        assert_eq!(product.currency.as_deref(), Some("USD"));
        assert_eq!(product.display_name, "pro.monthly plan");
    }

    #[test]
    fn test_merge_marks_missing_products_unavailable() {
        let products = merge_catalog(
            vec![declared("pro.monthly"), declared("pro.yearly")],
            vec![live("pro.monthly")],
        );

        let yearly = products
            .iter()
            .find(|p| p.product_id == "pro.yearly")
            .expect("declared product kept");
        assert!(!yearly.is_available);
        assert_eq!(yearly.localized_price, UNAVAILABLE_PRICE);
        assert!(yearly.currency.is_none());
        assert!(yearly.subscription_period.is_none());
    }

    #[test]
    fn test_merge_never_introduces_store_products() {
        let products = merge_catalog(vec![declared("pro.monthly")], vec![live("rogue.product")]);

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product_id, "pro.monthly");
        assert!(!products[0].is_available);
    }

    #[test]
    fn test_merge_preserves_backend_order() {
        let products = merge_catalog(
            vec![declared("b"), declared("a")],
            vec![live("a"), live("b")],
        );
        let ids: Vec<_> = products.iter().map(|p| p.product_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
