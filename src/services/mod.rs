// Service modules
pub mod catalog;
pub mod finalization;
pub mod receipt;
pub mod status;
pub mod verification;

pub use catalog::CatalogReconciler;
pub use finalization::TransactionFinalizer;
pub use receipt::ReceiptAcquirer;
pub use status::EntitlementStatusClient;
pub use verification::{ReceiptVerifier, VerificationClient};
