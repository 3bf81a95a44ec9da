// Model modules
pub mod catalog;
pub mod entitlement;
pub mod purchase;

pub use catalog::{BackendProduct, PeriodUnit, Product, RawStoreProduct, SubscriptionPeriod};
pub use entitlement::{EntitlementStatus, VerificationResult};
pub use purchase::{
    PurchaseErrorEvent, PurchaseOutcome, PurchaseUpdateEvent, Receipt, StoreErrorKind,
    TransactionHandle,
};
