use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{LoanId, UserId};

/// cache-invalidation event emitted after a successful mutating operation
///
/// Delivery is best-effort: read correctness never depends on the sink
/// having consumed these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Invalidation {
    /// the listing of loans open for offers changed
    AvailableLoans,
    /// a single loan (detail, offers, schedule) changed
    Loan(LoanId),
    /// a user's loans or wallet changed
    User(UserId),
}

/// sink for invalidation events, injected into each engine
pub trait CacheNotifier: Send + Sync {
    fn invalidate(&self, event: Invalidation);
}

/// notifier that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl CacheNotifier for NullNotifier {
    fn invalidate(&self, _event: Invalidation) {}
}

/// notifier that records events for later draining
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    events: Mutex<Vec<Invalidation>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Invalidation> {
        self.events.lock().clone()
    }

    pub fn take_events(&self) -> Vec<Invalidation> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl CacheNotifier for MemoryNotifier {
    fn invalidate(&self, event: Invalidation) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_memory_notifier_records_and_drains() {
        let notifier = MemoryNotifier::new();
        let loan_id = Uuid::new_v4();

        notifier.invalidate(Invalidation::AvailableLoans);
        notifier.invalidate(Invalidation::Loan(loan_id));

        assert_eq!(
            notifier.events(),
            vec![Invalidation::AvailableLoans, Invalidation::Loan(loan_id)]
        );

        let drained = notifier.take_events();
        assert_eq!(drained.len(), 2);
        assert!(notifier.events().is_empty());
    }
}
