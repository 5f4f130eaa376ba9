use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::store::MemoryStore;
use crate::types::{LoanStatus, PaymentStatus};

/// loan counts per lifecycle status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LoanStatusCounts {
    pub requested: usize,
    pub pending_funding: usize,
    pub funded: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl LoanStatusCounts {
    pub fn total(&self) -> usize {
        self.requested + self.pending_funding + self.funded + self.completed + self.cancelled
    }
}

/// payment counts per status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PaymentStatusCounts {
    pub pending: usize,
    pub paid: usize,
    pub overdue: usize,
}

impl PaymentStatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.paid + self.overdue
    }
}

/// read-only platform aggregation for the external reporting job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub loans: LoanStatusCounts,
    pub payments: PaymentStatusCounts,
    /// completed loans as a percentage of all loans
    pub loan_completion_rate: Decimal,
    /// overdue payments as a percentage of all payments
    pub payment_overdue_rate: Decimal,
}

impl StatusReport {
    pub fn generate(store: &MemoryStore) -> Self {
        let (loans, payments) = store.read(|tables| {
            let mut loans = LoanStatusCounts::default();
            for loan in tables.loans() {
                match loan.status {
                    LoanStatus::Requested => loans.requested += 1,
                    LoanStatus::PendingFunding => loans.pending_funding += 1,
                    LoanStatus::Funded => loans.funded += 1,
                    LoanStatus::Completed => loans.completed += 1,
                    LoanStatus::Cancelled => loans.cancelled += 1,
                }
            }

            let mut payments = PaymentStatusCounts::default();
            for payment in tables.payments() {
                match payment.status {
                    PaymentStatus::Pending => payments.pending += 1,
                    PaymentStatus::Paid => payments.paid += 1,
                    PaymentStatus::Overdue => payments.overdue += 1,
                }
            }
            (loans, payments)
        });

        let loan_completion_rate = percentage(loans.completed, loans.total());
        let payment_overdue_rate = percentage(payments.overdue, payments.total());

        Self {
            loans,
            payments,
            loan_completion_rate,
            payment_overdue_rate,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn percentage(part: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(part as u64) * Decimal::from(100) / Decimal::from(total as u64))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformConfig;
    use crate::decimal::{Money, Rate};
    use crate::loans::{LoanBook, LoanTerms};
    use crate::types::{Role, User};
    use chrono::{TimeZone, Utc};
    use hourglass_rs::{SafeTimeProvider, TimeSource};
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_report() {
        let store = MemoryStore::new();
        let report = StatusReport::generate(&store);
        assert_eq!(report.loans.total(), 0);
        assert_eq!(report.loan_completion_rate, Decimal::ZERO);
        assert_eq!(report.payment_overdue_rate, Decimal::ZERO);
    }

    #[test]
    fn test_report_counts_and_rates() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let store = MemoryStore::new();
        let book = LoanBook::new(store.clone(), PlatformConfig::default());
        let borrower = User::new("bob", Role::Borrower);

        for _ in 0..3 {
            book.request_loan(
                &borrower,
                LoanTerms {
                    amount: Money::from_major(500),
                    term_months: 6,
                    annual_rate: Rate::from_percentage(10),
                    purpose: String::new(),
                },
                &time,
            )
            .unwrap();
        }

        let report = StatusReport::generate(&store);
        assert_eq!(report.loans.requested, 3);
        assert_eq!(report.loans.total(), 3);
        assert_eq!(report.loan_completion_rate, Decimal::ZERO);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"requested\": 3"));
    }

    #[test]
    fn test_percentage_rounds_to_two_places() {
        assert_eq!(percentage(1, 3), dec!(33.33));
        assert_eq!(percentage(2, 3), dec!(66.67));
        assert_eq!(percentage(0, 0), Decimal::ZERO);
    }
}
