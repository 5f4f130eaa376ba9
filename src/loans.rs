use std::sync::Arc;

use hourglass_rs::SafeTimeProvider;
use tracing::info;

use crate::config::PlatformConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};
use crate::events::{CacheNotifier, Invalidation, NullNotifier};
use crate::store::{Loan, MemoryStore};
use crate::types::{LoanId, LoanStatus, Role, User};

/// terms of a new loan request
#[derive(Debug, Clone, PartialEq)]
pub struct LoanTerms {
    pub amount: Money,
    pub term_months: u32,
    pub annual_rate: Rate,
    pub purpose: String,
}

/// loan requests and lifecycle queries
pub struct LoanBook {
    store: MemoryStore,
    config: PlatformConfig,
    notifier: Arc<dyn CacheNotifier>,
}

impl LoanBook {
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

    /// post a new loan request, open for offers
    pub fn request_loan(
        &self,
        borrower: &User,
        terms: LoanTerms,
        time: &SafeTimeProvider,
    ) -> Result<Loan> {
        if borrower.role != Role::Borrower {
            return Err(LendingError::RolePermission {
                required: Role::Borrower,
                actual: borrower.role,
            });
        }
        self.config.limits.check_amount(terms.amount)?;
        self.config.limits.check_term(terms.term_months)?;
        self.config.limits.check_rate(terms.annual_rate)?;

        let now = time.now();
        let borrower_id = borrower.id;
        let loan = self.store.transaction(|tables| {
            let loan = Loan::new(
                borrower_id,
                terms.amount,
                terms.term_months,
                terms.annual_rate,
                terms.purpose.clone(),
                now,
            );
            let id = tables.insert_loan(loan);
            tables.loan(id).cloned()
        })?;

        info!(
            borrower = %borrower.username,
            loan = %loan.id,
            amount = %loan.amount,
            term_months = loan.term_months,
            rate = %loan.annual_rate,
            "loan requested"
        );
        self.notifier.invalidate(Invalidation::AvailableLoans);
        Ok(loan)
    }

    pub fn loan(&self, id: LoanId) -> Result<Loan> {
        self.store.read(|tables| tables.loan(id).cloned())
    }

    /// loans still open for offers, newest first
    pub fn available_loans(&self) -> Vec<Loan> {
        self.store
            .read(|tables| tables.loans_where(|l| l.status == LoanStatus::Requested))
    }

    pub fn loans_by_borrower(&self, borrower: &User) -> Vec<Loan> {
        let id = borrower.id;
        self.store
            .read(|tables| tables.loans_where(|l| l.borrower_id == id))
    }

    pub fn loans_by_lender(&self, lender: &User) -> Vec<Loan> {
        let id = lender.id;
        self.store
            .read(|tables| tables.loans_where(|l| l.lender_id == Some(id)))
    }

    /// loans visible to a user, according to their role
    pub fn loans_by_user(&self, user: &User) -> Vec<Loan> {
        match user.role {
            Role::Borrower => self.loans_by_borrower(user),
            Role::Lender => self.loans_by_lender(user),
        }
    }
}
