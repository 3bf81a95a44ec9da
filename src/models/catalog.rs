use serde::{Deserialize, Serialize};

/// Billing period unit reported by the commerce store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPeriod {
    pub unit: PeriodUnit,
    pub count: u32,
}

/// A catalog entry declared by the backend: identity and display metadata
/// only, no pricing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendProduct {
    pub product_id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Live subscription data reported by the commerce store for one product id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStoreProduct {
    pub product_id: String,
    pub localized_price: String,
    pub currency: String,
    #[serde(default)]
    pub subscription_period: Option<SubscriptionPeriod>,
}

/// A reconciled catalog entry: backend metadata merged with live store
/// pricing. `is_available` is false when the backend-declared product is
/// absent from the live store catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: String,
    pub display_name: String,
    pub description: String,
    pub features: Vec<String>,
    pub localized_price: String,
    pub currency: Option<String>,
    pub subscription_period: Option<SubscriptionPeriod>,
    pub is_available: bool,
}
