use std::sync::Arc;

use hourglass_rs::SafeTimeProvider;
use tracing::info;

use crate::errors::{LendingError, Result};
use crate::events::{CacheNotifier, Invalidation, NullNotifier};
use crate::store::{MemoryStore, Payment};
use crate::types::{EntryKind, LoanId, LoanStatus, PaymentStatus, User};
use crate::wallet;

/// outcome of one repayment call
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub payment: Payment,
    /// true when this installment was the last one and the loan completed
    pub loan_completed: bool,
}

/// applies installments strictly in order and completes the loan on the
/// final one, all in one transaction
pub struct PaymentEngine {
    store: MemoryStore,
    notifier: Arc<dyn CacheNotifier>,
}

impl PaymentEngine {
    pub fn new(store: MemoryStore) -> Self {
        Self::with_notifier(store, Arc::new(NullNotifier))
    }

    pub fn with_notifier(store: MemoryStore, notifier: Arc<dyn CacheNotifier>) -> Self {
        Self { store, notifier }
    }

    /// pay the earliest pending installment on a funded loan
    pub fn make_payment(
        &self,
        loan_id: LoanId,
        borrower: &User,
        time: &SafeTimeProvider,
    ) -> Result<PaymentOutcome> {
        let now = time.now();
        let borrower_id = borrower.id;

        let (outcome, lender_id) = self.store.transaction(|tables| {
            let loan = tables.loan(loan_id)?;
            if loan.borrower_id != borrower_id {
                return Err(LendingError::Unauthorized {
                    user_id: borrower_id,
                });
            }
            loan.ensure_status(LoanStatus::Funded)?;
            let lender_id = loan.lender_id.ok_or(LendingError::Validation {
                message: format!("funded loan {} has no lender on record", loan_id),
            })?;

            let next = tables
                .next_pending_payment(loan_id)
                .ok_or(LendingError::NoPendingPayment { loan_id })?;

            wallet::transfer(
                tables,
                borrower_id,
                lender_id,
                next.amount,
                EntryKind::LoanPayment,
                &format!("payment_{}", next.id),
                format!("Installment {} sent for loan {}", next.payment_number, loan_id),
                format!(
                    "Installment {} received for loan {}",
                    next.payment_number, loan_id
                ),
                now,
            )?;

            let payment = tables
                .payment_mut(next.id)
                .ok_or(LendingError::NoPendingPayment { loan_id })?;
            payment.status = PaymentStatus::Paid;
            payment.paid_at = Some(now);
            let paid_payment = payment.clone();

            // recompute inside the same unit so "last payment paid" and
            // "loan completed" can never be observed apart
            let (paid, total) = tables.payment_counts(loan_id);
            let loan_completed = total > 0 && paid == total;
            if loan_completed {
                let loan = tables.loan_mut(loan_id)?;
                loan.status = LoanStatus::Completed;
                loan.updated_at = now;
            }

            Ok((
                PaymentOutcome {
                    payment: paid_payment,
                    loan_completed,
                },
                lender_id,
            ))
        })?;

        info!(
            borrower = %borrower.username,
            loan = %loan_id,
            installment = outcome.payment.payment_number,
            amount = %outcome.payment.amount,
            completed = outcome.loan_completed,
            "payment applied"
        );
        self.notifier.invalidate(Invalidation::Loan(loan_id));
        self.notifier.invalidate(Invalidation::User(borrower_id));
        self.notifier.invalidate(Invalidation::User(lender_id));
        Ok(outcome)
    }

    /// full schedule, visible only to the loan's participants
    pub fn schedule(&self, loan_id: LoanId, viewer: &User) -> Result<Vec<Payment>> {
        let viewer_id = viewer.id;
        self.store.read(|tables| {
            let loan = tables.loan(loan_id)?;
            let participant =
                loan.borrower_id == viewer_id || loan.lender_id == Some(viewer_id);
            if !participant {
                return Err(LendingError::Unauthorized { user_id: viewer_id });
            }
            Ok(tables.payments_for_loan(loan_id))
        })
    }

    /// pending installments across all of a borrower's loans, soonest due first
    pub fn pending_payments(&self, borrower: &User) -> Vec<Payment> {
        let borrower_id = borrower.id;
        self.store.read(|tables| {
            let mut pending: Vec<Payment> = tables
                .payments()
                .filter(|p| p.status == PaymentStatus::Pending)
                .filter(|p| {
                    tables
                        .loan(p.loan_id)
                        .map(|l| l.borrower_id == borrower_id)
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            pending.sort_by(|a, b| {
                a.due_date
                    .cmp(&b.due_date)
                    .then(a.payment_number.cmp(&b.payment_number))
            });
            pending
        })
    }
}
