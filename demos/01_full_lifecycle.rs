/// full lifecycle - request, competing offers, funding, repayment to completion
use std::sync::Arc;

use peer_lending_rs::chrono::{TimeZone, Utc};
use peer_lending_rs::{
    FundingEngine, LoanBook, LoanTerms, MemoryNotifier, MemoryStore, Money, OfferBook,
    PaymentEngine, PlatformConfig, Rate, Role, SafeTimeProvider, StatusReport, TimeSource, User,
    WalletLedger,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
    ));
    let store = MemoryStore::new();
    let config = PlatformConfig::default();
    let notifier = Arc::new(MemoryNotifier::new());

    let loans = LoanBook::with_notifier(store.clone(), config.clone(), notifier.clone());
    let offers = OfferBook::with_notifier(store.clone(), config.clone(), notifier.clone());
    let funding = FundingEngine::with_notifier(store.clone(), config, notifier.clone());
    let payments = PaymentEngine::with_notifier(store.clone(), notifier.clone());
    let wallets = WalletLedger::new(store.clone());

    let borrower = User::new("bob", Role::Borrower);
    let cheap = User::new("lena", Role::Lender);
    let pricey = User::new("luke", Role::Lender);

    let loan = loans.request_loan(
        &borrower,
        LoanTerms {
            amount: Money::from_major(1_000),
            term_months: 6,
            annual_rate: Rate::from_percentage(20),
            purpose: "inventory".to_string(),
        },
        &time,
    )?;
    println!("loan requested: {}", loan.id);

    // two competing offers; the book lists lowest rate first
    offers.create_offer(loan.id, &pricey, Rate::from_percentage(15), &time)?;
    let best = offers.create_offer(loan.id, &cheap, Rate::from_percentage(12), &time)?;
    for offer in offers.offers_for_loan(loan.id)? {
        println!("  offer at {}", offer.annual_rate);
    }

    offers.accept_offer(loan.id, best.id, &borrower, &time)?;
    println!("accepted offer at {}", best.annual_rate);

    wallets.deposit(&cheap, Money::from_major(1_200), &time)?;
    let receipt = funding.fund_loan(loan.id, &cheap, &time)?;
    println!(
        "funded on {}: {} installments of {}",
        receipt
            .loan
            .funded_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        receipt.installments,
        payments.schedule(loan.id, &borrower)?[0].amount,
    );

    // repay to completion
    wallets.deposit(&borrower, Money::from_major(100), &time)?;
    loop {
        let outcome = payments.make_payment(loan.id, &borrower, &time)?;
        println!(
            "paid installment {} ({})",
            outcome.payment.payment_number, outcome.payment.amount
        );
        if outcome.loan_completed {
            println!("loan completed!");
            break;
        }
    }

    println!("\nledger for {}:", borrower.username);
    for entry in wallets.history(&borrower, None) {
        println!("  {} {} {}", entry.kind, entry.amount, entry.description);
    }

    println!("\ninvalidations emitted: {}", notifier.events().len());
    println!("\n{}", StatusReport::generate(&store).to_json()?);

    Ok(())
}
