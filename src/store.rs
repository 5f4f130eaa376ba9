use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};
use crate::types::{
    EntryId, EntryKind, LoanId, LoanStatus, OfferId, PaymentId, PaymentStatus, UserId, WalletId,
};

/// persisted loan row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub borrower_id: UserId,
    pub lender_id: Option<UserId>,
    pub amount: Money,
    pub term_months: u32,
    pub annual_rate: Rate,
    pub status: LoanStatus,
    pub purpose: String,
    pub funded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn new(
        borrower_id: UserId,
        amount: Money,
        term_months: u32,
        annual_rate: Rate,
        purpose: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            borrower_id,
            lender_id: None,
            amount,
            term_months,
            annual_rate,
            status: LoanStatus::Requested,
            purpose,
            funded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// compare step of every compare-and-set transition; callers run this
    /// inside a store transaction so check and write are one atomic unit
    pub fn ensure_status(&self, expected: LoanStatus) -> Result<()> {
        if self.status != expected {
            return Err(LendingError::InvalidState {
                current: self.status,
                expected,
            });
        }
        Ok(())
    }

    /// fixed monthly installment implied by the current terms
    pub fn monthly_payment(&self) -> Money {
        crate::amortization::monthly_payment(self.amount, self.annual_rate, self.term_months)
    }

    /// total repaid across the full schedule
    pub fn total_amount(&self) -> Money {
        crate::amortization::total_amount(self.amount, self.annual_rate, self.term_months)
    }
}

/// persisted offer row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub loan_id: LoanId,
    pub lender_id: UserId,
    pub annual_rate: Rate,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    pub fn new(loan_id: LoanId, lender_id: UserId, annual_rate: Rate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            lender_id,
            annual_rate,
            accepted: false,
            created_at: now,
        }
    }
}

/// persisted scheduled payment row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub payment_number: u32,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// persisted wallet row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance: Money::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// immutable ledger entry; appended, never mutated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub wallet_id: WalletId,
    pub kind: EntryKind,
    /// signed: negative leaves the wallet, positive enters it
    pub amount: Money,
    pub reference: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        wallet_id: WalletId,
        kind: EntryKind,
        amount: Money,
        reference: Option<String>,
        description: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            kind,
            amount,
            reference,
            description,
            created_at: now,
        }
    }
}

/// all tables; a transaction sees and mutates these as one unit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    loans: HashMap<LoanId, Loan>,
    offers: HashMap<OfferId, Offer>,
    payments: HashMap<PaymentId, Payment>,
    wallets: HashMap<WalletId, Wallet>,
    entries: Vec<LedgerEntry>,
}

impl Tables {
    // -- loans --

    pub fn insert_loan(&mut self, loan: Loan) -> LoanId {
        let id = loan.id;
        self.loans.insert(id, loan);
        id
    }

    pub fn loan(&self, id: LoanId) -> Result<&Loan> {
        self.loans.get(&id).ok_or(LendingError::LoanNotFound { id })
    }

    pub fn loan_mut(&mut self, id: LoanId) -> Result<&mut Loan> {
        self.loans.get_mut(&id).ok_or(LendingError::LoanNotFound { id })
    }

    pub fn loans_where(&self, predicate: impl Fn(&Loan) -> bool) -> Vec<Loan> {
        let mut loans: Vec<Loan> = self.loans.values().filter(|l| predicate(l)).cloned().collect();
        loans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        loans
    }

    pub fn loans(&self) -> impl Iterator<Item = &Loan> {
        self.loans.values()
    }

    // -- offers --

    /// insert enforcing the (loan, lender) uniqueness constraint
    pub fn insert_offer(&mut self, offer: Offer) -> Result<OfferId> {
        let duplicate = self
            .offers
            .values()
            .any(|o| o.loan_id == offer.loan_id && o.lender_id == offer.lender_id);
        if duplicate {
            return Err(LendingError::DuplicateOffer {
                loan_id: offer.loan_id,
                lender_id: offer.lender_id,
            });
        }
        let id = offer.id;
        self.offers.insert(id, offer);
        Ok(id)
    }

    pub fn offer(&self, id: OfferId) -> Result<&Offer> {
        self.offers.get(&id).ok_or(LendingError::OfferNotFound { id })
    }

    pub fn offer_mut(&mut self, id: OfferId) -> Result<&mut Offer> {
        self.offers.get_mut(&id).ok_or(LendingError::OfferNotFound { id })
    }

    /// offers on a loan, lowest rate first, earliest submission breaking ties
    pub fn offers_for_loan(&self, loan_id: LoanId) -> Vec<Offer> {
        let mut offers: Vec<Offer> = self
            .offers
            .values()
            .filter(|o| o.loan_id == loan_id)
            .cloned()
            .collect();
        offers.sort_by(|a, b| {
            a.annual_rate
                .cmp(&b.annual_rate)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        offers
    }

    // -- payments --

    /// insert enforcing the (loan, payment_number) uniqueness constraint
    pub fn insert_payment(&mut self, payment: Payment) -> Result<PaymentId> {
        let duplicate = self
            .payments
            .values()
            .any(|p| p.loan_id == payment.loan_id && p.payment_number == payment.payment_number);
        if duplicate {
            return Err(LendingError::Validation {
                message: format!(
                    "payment number {} already exists for loan {}",
                    payment.payment_number, payment.loan_id
                ),
            });
        }
        let id = payment.id;
        self.payments.insert(id, payment);
        Ok(id)
    }

    pub fn payment(&self, id: PaymentId) -> Option<&Payment> {
        self.payments.get(&id)
    }

    pub fn payment_mut(&mut self, id: PaymentId) -> Option<&mut Payment> {
        self.payments.get_mut(&id)
    }

    /// full schedule for a loan, in installment order
    pub fn payments_for_loan(&self, loan_id: LoanId) -> Vec<Payment> {
        let mut payments: Vec<Payment> = self
            .payments
            .values()
            .filter(|p| p.loan_id == loan_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.payment_number);
        payments
    }

    /// earliest unpaid installment, if any
    pub fn next_pending_payment(&self, loan_id: LoanId) -> Option<Payment> {
        self.payments
            .values()
            .filter(|p| p.loan_id == loan_id && p.status == PaymentStatus::Pending)
            .min_by_key(|p| p.payment_number)
            .cloned()
    }

    /// (paid, total) installment counts for a loan
    pub fn payment_counts(&self, loan_id: LoanId) -> (usize, usize) {
        let mut paid = 0;
        let mut total = 0;
        for p in self.payments.values().filter(|p| p.loan_id == loan_id) {
            total += 1;
            if p.status == PaymentStatus::Paid {
                paid += 1;
            }
        }
        (paid, total)
    }

    pub fn payments(&self) -> impl Iterator<Item = &Payment> {
        self.payments.values()
    }

    // -- wallets --

    pub fn insert_wallet(&mut self, wallet: Wallet) -> WalletId {
        let id = wallet.id;
        self.wallets.insert(id, wallet);
        id
    }

    pub fn wallet_by_user(&self, user_id: UserId) -> Option<&Wallet> {
        self.wallets.values().find(|w| w.user_id == user_id)
    }

    pub fn wallet_by_user_mut(&mut self, user_id: UserId) -> Option<&mut Wallet> {
        self.wallets.values_mut().find(|w| w.user_id == user_id)
    }

    // -- ledger --

    pub fn push_entry(&mut self, entry: LedgerEntry) -> EntryId {
        let id = entry.id;
        self.entries.push(entry);
        id
    }

    /// entries for one wallet, newest first
    pub fn entries_for_wallet(&self, wallet_id: WalletId) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self
            .entries
            .iter()
            .filter(|e| e.wallet_id == wallet_id)
            .cloned()
            .collect();
        entries.reverse();
        entries
    }

    /// entries correlated by a reference id, in write order
    pub fn entries_for_reference(&self, reference: &str) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| e.reference.as_deref() == Some(reference))
            .cloned()
            .collect()
    }
}

/// in-memory durable store: one mutex over the tables gives every
/// transaction serializable isolation, and the scratch-copy commit makes
/// each transaction all-or-nothing
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// run `f` atomically; mutations become visible only if it returns Ok
    pub fn transaction<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.lock();
        let mut scratch = guard.clone();
        match f(&mut scratch) {
            Ok(value) => {
                *guard = scratch;
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    /// run a non-mutating query against a consistent view
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(&self.inner.lock())
    }

    /// serialize the full state, mirroring the JSON-state pattern
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.inner.lock())
    }
}
