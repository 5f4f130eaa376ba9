use std::sync::Arc;

use hourglass_rs::SafeTimeProvider;
use tracing::info;

use crate::config::PlatformConfig;
use crate::decimal::Rate;
use crate::errors::{LendingError, Result};
use crate::events::{CacheNotifier, Invalidation, NullNotifier};
use crate::store::{Loan, MemoryStore, Offer};
use crate::types::{LoanId, LoanStatus, OfferId, Role, User};

/// competing interest-rate offers over a requested loan
pub struct OfferBook {
    store: MemoryStore,
    config: PlatformConfig,
    notifier: Arc<dyn CacheNotifier>,
}

impl OfferBook {
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

    /// place an offer on a requested loan
    pub fn create_offer(
        &self,
        loan_id: LoanId,
        lender: &User,
        annual_rate: Rate,
        time: &SafeTimeProvider,
    ) -> Result<Offer> {
        if lender.role != Role::Lender {
            return Err(LendingError::RolePermission {
                required: Role::Lender,
                actual: lender.role,
            });
        }

        let now = time.now();
        let lender_id = lender.id;
        let limits = self.config.limits.clone();
        let offer = self.store.transaction(|tables| {
            let loan = tables.loan(loan_id)?;
            loan.ensure_status(LoanStatus::Requested)?;
            if loan.borrower_id == lender_id {
                return Err(LendingError::Validation {
                    message: "cannot make an offer on your own loan".to_string(),
                });
            }
            limits.check_rate(annual_rate)?;

            let offer = Offer::new(loan_id, lender_id, annual_rate, now);
            let id = tables.insert_offer(offer)?;
            tables.offer(id).cloned()
        })?;

        info!(
            lender = %lender.username,
            loan = %loan_id,
            rate = %annual_rate,
            "offer placed"
        );
        self.notifier.invalidate(Invalidation::Loan(loan_id));
        Ok(offer)
    }

    /// accept one offer; the losing concurrent acceptance fails InvalidState
    ///
    /// The status check and the writes share one transaction, so this is a
    /// compare-and-set against the loan's current status.
    pub fn accept_offer(
        &self,
        loan_id: LoanId,
        offer_id: OfferId,
        borrower: &User,
        time: &SafeTimeProvider,
    ) -> Result<Loan> {
        let now = time.now();
        let borrower_id = borrower.id;
        let loan = self.store.transaction(|tables| {
            let loan = tables.loan(loan_id)?;
            if loan.borrower_id != borrower_id {
                return Err(LendingError::Unauthorized {
                    user_id: borrower_id,
                });
            }
            loan.ensure_status(LoanStatus::Requested)?;

            let offer = tables.offer(offer_id)?;
            if offer.loan_id != loan_id {
                return Err(LendingError::OfferNotFound { id: offer_id });
            }
            if offer.accepted {
                return Err(LendingError::OfferAlreadyAccepted { id: offer_id });
            }
            let lender_id = offer.lender_id;
            let accepted_rate = offer.annual_rate;

            tables.offer_mut(offer_id)?.accepted = true;

            let loan = tables.loan_mut(loan_id)?;
            loan.lender_id = Some(lender_id);
            loan.annual_rate = accepted_rate;
            loan.status = LoanStatus::PendingFunding;
            loan.updated_at = now;
            Ok(loan.clone())
        })?;

        info!(
            borrower = %borrower.username,
            loan = %loan_id,
            offer = %offer_id,
            rate = %loan.annual_rate,
            "offer accepted"
        );
        self.notifier.invalidate(Invalidation::Loan(loan_id));
        self.notifier.invalidate(Invalidation::AvailableLoans);
        Ok(loan)
    }

    /// offers on a loan, lowest rate first, earliest submission on ties
    pub fn offers_for_loan(&self, loan_id: LoanId) -> Result<Vec<Offer>> {
        self.store.read(|tables| {
            tables.loan(loan_id)?;
            Ok(tables.offers_for_loan(loan_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::loans::{LoanBook, LoanTerms};
    use chrono::TimeZone;
    use chrono::Utc;
    use hourglass_rs::TimeSource;
    use std::thread;

    fn setup() -> (MemoryStore, LoanBook, OfferBook, SafeTimeProvider) {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let store = MemoryStore::new();
        let book = LoanBook::new(store.clone(), PlatformConfig::default());
        let offers = OfferBook::new(store.clone(), PlatformConfig::default());
        (store, book, offers, time)
    }

    fn requested_loan(book: &LoanBook, time: &SafeTimeProvider) -> (User, Loan) {
        let borrower = User::new("bob", Role::Borrower);
        let loan = book
            .request_loan(
                &borrower,
                LoanTerms {
                    amount: Money::from_major(2_000),
                    term_months: 6,
                    annual_rate: Rate::from_percentage(15),
                    purpose: "inventory".to_string(),
                },
                time,
            )
            .unwrap();
        (borrower, loan)
    }

    #[test]
    fn test_create_offer_happy_path() {
        let (_, book, offers, time) = setup();
        let (_, loan) = requested_loan(&book, &time);
        let lender = User::new("lena", Role::Lender);

        let offer = offers
            .create_offer(loan.id, &lender, Rate::from_percentage(9), &time)
            .unwrap();
        assert!(!offer.accepted);
        assert_eq!(offer.lender_id, lender.id);
        assert_eq!(offers.offers_for_loan(loan.id).unwrap().len(), 1);
    }

    #[test]
    fn test_create_offer_guards() {
        let (_, book, offers, time) = setup();
        let (borrower, loan) = requested_loan(&book, &time);
        let lender = User::new("lena", Role::Lender);

        // wrong role
        assert!(matches!(
            offers.create_offer(loan.id, &borrower, Rate::from_percentage(9), &time),
            Err(LendingError::RolePermission { .. })
        ));

        // own loan: a lender-role user with the borrower's id cannot offer
        let self_dealer = User {
            id: borrower.id,
            username: borrower.username.clone(),
            role: Role::Lender,
        };
        assert!(matches!(
            offers.create_offer(loan.id, &self_dealer, Rate::from_percentage(9), &time),
            Err(LendingError::Validation { .. })
        ));

        // rate out of bounds
        assert!(matches!(
            offers.create_offer(loan.id, &lender, Rate::from_percentage(55), &time),
            Err(LendingError::Validation { .. })
        ));

        // duplicate per (loan, lender)
        offers
            .create_offer(loan.id, &lender, Rate::from_percentage(9), &time)
            .unwrap();
        assert!(matches!(
            offers.create_offer(loan.id, &lender, Rate::from_percentage(8), &time),
            Err(LendingError::DuplicateOffer { .. })
        ));
    }

    #[test]
    fn test_accept_offer_transfers_terms() {
        let (_, book, offers, time) = setup();
        let (borrower, loan) = requested_loan(&book, &time);
        let lender = User::new("lena", Role::Lender);
        let offer = offers
            .create_offer(loan.id, &lender, Rate::from_percentage(9), &time)
            .unwrap();

        let updated = offers
            .accept_offer(loan.id, offer.id, &borrower, &time)
            .unwrap();
        assert_eq!(updated.status, LoanStatus::PendingFunding);
        assert_eq!(updated.lender_id, Some(lender.id));
        assert_eq!(updated.annual_rate, Rate::from_percentage(9));

        // further offers are rejected once the loan leaves Requested
        let late = User::new("luke", Role::Lender);
        assert!(matches!(
            offers.create_offer(loan.id, &late, Rate::from_percentage(7), &time),
            Err(LendingError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_accept_offer_guards() {
        let (_, book, offers, time) = setup();
        let (borrower, loan) = requested_loan(&book, &time);
        let lender = User::new("lena", Role::Lender);
        let offer = offers
            .create_offer(loan.id, &lender, Rate::from_percentage(9), &time)
            .unwrap();

        // not the owner
        let stranger = User::new("eve", Role::Borrower);
        assert!(matches!(
            offers.accept_offer(loan.id, offer.id, &stranger, &time),
            Err(LendingError::Unauthorized { .. })
        ));

        // offer on a different loan
        let (other_borrower, other_loan) = requested_loan(&book, &time);
        let _ = other_borrower;
        assert!(matches!(
            offers.accept_offer(other_loan.id, offer.id, &borrower, &time),
            Err(LendingError::Unauthorized { .. } | LendingError::OfferNotFound { .. })
        ));

        // double accept
        offers
            .accept_offer(loan.id, offer.id, &borrower, &time)
            .unwrap();
        assert!(matches!(
            offers.accept_offer(loan.id, offer.id, &borrower, &time),
            Err(LendingError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_concurrent_accepts_resolve_to_one_winner() {
        let (store, book, _, time) = setup();
        let (borrower, loan) = requested_loan(&book, &time);
        let lender_a = User::new("lena", Role::Lender);
        let lender_b = User::new("luke", Role::Lender);

        let offers = OfferBook::new(store.clone(), PlatformConfig::default());
        let offer_a = offers
            .create_offer(loan.id, &lender_a, Rate::from_percentage(9), &time)
            .unwrap();
        let offer_b = offers
            .create_offer(loan.id, &lender_b, Rate::from_percentage(10), &time)
            .unwrap();

        let results: Vec<Result<Loan>> = thread::scope(|s| {
            let handles = [offer_a.id, offer_b.id].map(|offer_id| {
                let store = store.clone();
                let borrower = borrower.clone();
                s.spawn(move || {
                    let time = SafeTimeProvider::new(TimeSource::Test(
                        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                    ));
                    let offers = OfferBook::new(store, PlatformConfig::default());
                    offers.accept_offer(loan.id, offer_id, &borrower, &time)
                })
            });
            handles.map(|h| h.join().expect("accept thread panicked")).into()
        });

        let winners: Vec<&Loan> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let losers: Vec<&LendingError> = results.iter().filter_map(|r| r.as_ref().err()).collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(losers.len(), 1);
        assert!(matches!(losers[0], LendingError::InvalidState { .. }));

        // final lender matches the winning offer
        let final_loan = store.read(|tables| tables.loan(loan.id).cloned()).unwrap();
        assert_eq!(final_loan.status, LoanStatus::PendingFunding);
        assert_eq!(final_loan.lender_id, winners[0].lender_id);
        assert_eq!(final_loan.annual_rate, winners[0].annual_rate);
    }
}
