//! In-process publish/subscribe for terminal purchase outcomes.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::models::PurchaseOutcome;

type OutcomeCallback = Arc<dyn Fn(&PurchaseOutcome) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Delivers each published outcome to every currently-registered callback,
/// synchronously and in registration order. Outcomes are not queued or
/// replayed: subscribe before starting a purchase attempt to observe its
/// result.
#[derive(Default)]
pub struct NotificationBus {
    subscribers: Mutex<Vec<(u64, OutcomeCallback)>>,
    next_id: AtomicU64,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PurchaseOutcome) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("subscriber list lock")
            .push((id, Arc::new(callback)));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, subscription: SubscriptionId) {
        self.subscribers
            .lock()
            .expect("subscriber list lock")
            .retain(|(id, _)| *id != subscription.0);
    }

    /// Invoke every registered callback with the outcome. The list is
    /// snapshotted first so callbacks may subscribe/unsubscribe reentrantly,
    /// and each call is unwind-isolated so one panicking subscriber cannot
    /// starve the rest.
    pub fn publish(&self, outcome: &PurchaseOutcome) {
        let snapshot: Vec<OutcomeCallback> = self
            .subscribers
            .lock()
            .expect("subscriber list lock")
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(outcome))).is_err() {
                warn!(
                    product_id = %outcome.product_id,
                    "purchase outcome subscriber panicked"
                );
            }
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("subscriber list lock").len()
    }
}
