use std::sync::Arc;

use hourglass_rs::SafeTimeProvider;
use tracing::info;

use crate::amortization;
use crate::config::PlatformConfig;
use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::events::{CacheNotifier, Invalidation, NullNotifier};
use crate::store::{Loan, MemoryStore};
use crate::types::{EntryKind, LoanId, LoanStatus, User};
use crate::wallet;

/// outcome of funding a loan
#[derive(Debug, Clone, PartialEq)]
pub struct FundingReceipt {
    pub loan: Loan,
    pub total_deducted: Money,
    pub platform_fee: Money,
    pub installments: u32,
}

/// moves principal and fee, flips the loan to Funded, and generates the
/// repayment schedule, all in one transaction
pub struct FundingEngine {
    store: MemoryStore,
    config: PlatformConfig,
    notifier: Arc<dyn CacheNotifier>,
}

impl FundingEngine {
    pub fn new(store: MemoryStore, config: PlatformConfig) -> Self {
        Self::with_notifier(store, config, Arc::new(NullNotifier))
    }

    pub fn with_notifier(
        store: MemoryStore,
        config: PlatformConfig,
        notifier: Arc<dyn CacheNotifier>,
    ) -> Self {
        Self {
            store,
            config,
            notifier,
        }
    }

    pub fn fund_loan(
        &self,
        loan_id: LoanId,
        lender: &User,
        time: &SafeTimeProvider,
    ) -> Result<FundingReceipt> {
        let now = time.now();
        let lender_id = lender.id;
        let platform_fee = self.config.platform_fee;

        let receipt = self.store.transaction(|tables| {
            let loan = tables.loan(loan_id)?;
            if loan.lender_id != Some(lender_id) {
                return Err(LendingError::Unauthorized { user_id: lender_id });
            }
            loan.ensure_status(LoanStatus::PendingFunding)?;

            let amount = loan.amount;
            let borrower_id = loan.borrower_id;
            let total_needed = amount + platform_fee;

            // full cost checked up front so the fee can never strand a
            // half-funded loan
            let available = tables
                .wallet_by_user(lender_id)
                .map(|w| w.balance)
                .unwrap_or(Money::ZERO);
            if available < total_needed {
                return Err(LendingError::InsufficientFunds {
                    available,
                    requested: total_needed,
                });
            }

            wallet::transfer(
                tables,
                lender_id,
                borrower_id,
                amount,
                EntryKind::LoanFunding,
                &format!("loan_{}", loan_id),
                format!("Funding sent for loan {}", loan_id),
                format!("Funding received for loan {}", loan_id),
                now,
            )?;

            if platform_fee.is_positive() {
                wallet::deduct_fee(
                    tables,
                    lender_id,
                    platform_fee,
                    &format!("loan_{}_fee", loan_id),
                    now,
                )?;
            }

            let loan = tables.loan_mut(loan_id)?;
            loan.status = LoanStatus::Funded;
            loan.funded_at = Some(now);
            loan.updated_at = now;
            let funded = loan.clone();

            for payment in amortization::schedule(&funded, now.date_naive(), now) {
                tables.insert_payment(payment)?;
            }

            Ok(FundingReceipt {
                installments: funded.term_months,
                loan: funded,
                total_deducted: total_needed,
                platform_fee,
            })
        })?;

        info!(
            lender = %lender.username,
            loan = %loan_id,
            amount = %receipt.loan.amount,
            fee = %receipt.platform_fee,
            total_deducted = %receipt.total_deducted,
            "loan funded"
        );
        self.notifier.invalidate(Invalidation::Loan(loan_id));
        self.notifier.invalidate(Invalidation::User(receipt.loan.borrower_id));
        self.notifier.invalidate(Invalidation::User(lender_id));
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::loans::{LoanBook, LoanTerms};
    use crate::offers::OfferBook;
    use crate::types::{PaymentStatus, Role};
    use crate::wallet::WalletLedger;
    use chrono::{NaiveDate, TimeZone, Utc};
    use hourglass_rs::TimeSource;

    struct Fixture {
        store: MemoryStore,
        funding: FundingEngine,
        ledger: WalletLedger,
        time: SafeTimeProvider,
        borrower: User,
        lender: User,
        loan: Loan,
    }

    fn pending_loan(amount: i64, term: u32) -> Fixture {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
        ));
        let store = MemoryStore::new();
        let config = PlatformConfig::default();
        let book = LoanBook::new(store.clone(), config.clone());
        let offers = OfferBook::new(store.clone(), config.clone());

        let borrower = User::new("bob", Role::Borrower);
        let lender = User::new("lena", Role::Lender);
        let loan = book
            .request_loan(
                &borrower,
                LoanTerms {
                    amount: Money::from_major(amount),
                    term_months: term,
                    annual_rate: Rate::from_percentage(20),
                    purpose: "working capital".to_string(),
                },
                &time,
            )
            .unwrap();
        let offer = offers
            .create_offer(loan.id, &lender, Rate::from_percentage(12), &time)
            .unwrap();
        let loan = offers
            .accept_offer(loan.id, offer.id, &borrower, &time)
            .unwrap();

        Fixture {
            funding: FundingEngine::new(store.clone(), config),
            ledger: WalletLedger::new(store.clone()),
            store,
            time,
            borrower,
            lender,
            loan,
        }
    }

    #[test]
    fn test_fund_loan_moves_principal_fee_and_schedule() {
        let f = pending_loan(1_000, 6);
        f.ledger
            .deposit(&f.lender, Money::from_major(1_200), &f.time)
            .unwrap();

        let receipt = f.funding.fund_loan(f.loan.id, &f.lender, &f.time).unwrap();
        assert_eq!(receipt.loan.status, LoanStatus::Funded);
        assert!(receipt.loan.funded_at.is_some());
        assert_eq!(receipt.total_deducted, Money::from_major(1_100));

        // lender paid principal + fee, borrower received principal
        assert_eq!(f.ledger.balance(&f.lender), Money::from_major(100));
        assert_eq!(f.ledger.balance(&f.borrower), Money::from_major(1_000));

        // schedule generated off the funding date
        let payments = f.store.read(|t| t.payments_for_loan(f.loan.id));
        assert_eq!(payments.len(), 6);
        assert_eq!(
            payments[0].due_date,
            NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()
        );
        assert_eq!(
            payments[5].due_date,
            NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
        );
        assert!(payments.iter().all(|p| p.status == PaymentStatus::Pending));
        assert!(payments
            .iter()
            .all(|p| p.amount == Money::from_str_exact("172.55").unwrap()));

        // funding entries share the loan reference and sum to zero
        let entries = f
            .store
            .read(|t| t.entries_for_reference(&format!("loan_{}", f.loan.id)));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].amount + entries[1].amount, Money::ZERO);

        // fee is its own tagged entry
        let fee_entries = f
            .store
            .read(|t| t.entries_for_reference(&format!("loan_{}_fee", f.loan.id)));
        assert_eq!(fee_entries.len(), 1);
        assert_eq!(fee_entries[0].kind, EntryKind::PlatformFee);
        assert_eq!(fee_entries[0].amount, -Money::from_major(100));
    }

    #[test]
    fn test_fund_loan_insufficient_funds_aborts_everything() {
        let f = pending_loan(1_000, 6);
        // enough for principal but not the fee
        f.ledger
            .deposit(&f.lender, Money::from_major(1_050), &f.time)
            .unwrap();

        let err = f
            .funding
            .fund_loan(f.loan.id, &f.lender, &f.time)
            .unwrap_err();
        assert_eq!(
            err,
            LendingError::InsufficientFunds {
                available: Money::from_major(1_050),
                requested: Money::from_major(1_100),
            }
        );

        // nothing moved, no schedule, loan still pending
        assert_eq!(f.ledger.balance(&f.lender), Money::from_major(1_050));
        assert_eq!(f.ledger.balance(&f.borrower), Money::ZERO);
        assert!(f.store.read(|t| t.payments_for_loan(f.loan.id)).is_empty());
        let loan = f.store.read(|t| t.loan(f.loan.id).cloned()).unwrap();
        assert_eq!(loan.status, LoanStatus::PendingFunding);
    }

    #[test]
    fn test_fund_loan_guards() {
        let f = pending_loan(1_000, 6);
        f.ledger
            .deposit(&f.lender, Money::from_major(2_000), &f.time)
            .unwrap();

        // unknown loan
        let missing = uuid::Uuid::new_v4();
        assert!(matches!(
            f.funding.fund_loan(missing, &f.lender, &f.time),
            Err(LendingError::LoanNotFound { .. })
        ));

        // not the assigned lender
        let other = User::new("luke", Role::Lender);
        assert!(matches!(
            f.funding.fund_loan(f.loan.id, &other, &f.time),
            Err(LendingError::Unauthorized { .. })
        ));

        // double funding: second attempt loses the compare-and-set
        f.funding.fund_loan(f.loan.id, &f.lender, &f.time).unwrap();
        assert!(matches!(
            f.funding.fund_loan(f.loan.id, &f.lender, &f.time),
            Err(LendingError::InvalidState {
                current: LoanStatus::Funded,
                expected: LoanStatus::PendingFunding,
            })
        ));
    }
}
