// Library exports for the host app and tests
pub mod auth;
pub mod bus;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use auth::TokenProvider;
pub use client::BillingClient;
pub use config::BillingConfig;
pub use error::{BillingError, Result, StoreError};
pub use models::{EntitlementStatus, Product, PurchaseOutcome};
pub use store::CommerceStore;
