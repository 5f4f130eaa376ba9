use std::collections::HashSet;

use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::MemoryStore;
use crate::types::{PaymentId, PaymentStatus};

/// counts reported by one sweep pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SweepSummary {
    pub payments_found: usize,
    pub payments_marked_overdue: usize,
    pub affected_loans: usize,
    pub affected_borrowers: usize,
}

/// batch pass flipping stale Pending payments to Overdue
///
/// Invoked periodically by an external scheduler; each row is its own
/// transaction so one bad row never blocks the rest, and a re-run over
/// unchanged data marks nothing new.
pub struct OverdueSweep {
    store: MemoryStore,
}

impl OverdueSweep {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    pub fn run(&self, time: &SafeTimeProvider) -> SweepSummary {
        let today = time.now().date_naive();

        // candidate snapshot; every row is re-checked at its own update
        let candidates: Vec<PaymentId> = self.store.read(|tables| {
            tables
                .payments()
                .filter(|p| p.status == PaymentStatus::Pending && p.due_date < today)
                .map(|p| p.id)
                .collect()
        });

        let mut summary = SweepSummary {
            payments_found: candidates.len(),
            ..SweepSummary::default()
        };
        if candidates.is_empty() {
            info!("overdue sweep found nothing to do");
            return summary;
        }

        let mut loans = HashSet::new();
        let mut borrowers = HashSet::new();

        for payment_id in candidates {
            let result = self.store.transaction(|tables| {
                let Some(payment) = tables.payment(payment_id) else {
                    return Ok(None);
                };
                // the payment may have been paid since the snapshot
                if payment.status != PaymentStatus::Pending || payment.due_date >= today {
                    return Ok(None);
                }
                let loan_id = payment.loan_id;
                let due_date = payment.due_date;
                let borrower_id = tables.loan(loan_id)?.borrower_id;

                if let Some(payment) = tables.payment_mut(payment_id) {
                    payment.status = PaymentStatus::Overdue;
                }
                Ok(Some((loan_id, borrower_id, due_date)))
            });

            match result {
                Ok(Some((loan_id, borrower_id, due_date))) => {
                    summary.payments_marked_overdue += 1;
                    loans.insert(loan_id);
                    borrowers.insert(borrower_id);
                    warn!(
                        payment = %payment_id,
                        loan = %loan_id,
                        due = %due_date,
                        "payment marked overdue"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    // isolated per row: log and keep sweeping
                    warn!(payment = %payment_id, error = %e, "sweep skipped payment");
                }
            }
        }

        summary.affected_loans = loans.len();
        summary.affected_borrowers = borrowers.len();
        info!(
            found = summary.payments_found,
            marked = summary.payments_marked_overdue,
            loans = summary.affected_loans,
            borrowers = summary.affected_borrowers,
            "overdue sweep completed"
        );
        summary
    }
}
