/// overdue sweep - time travel past due dates and run the hourly batch pass
use peer_lending_rs::chrono::{Duration, TimeZone, Utc};
use peer_lending_rs::{
    FundingEngine, LoanBook, LoanTerms, MemoryStore, Money, OfferBook, PlatformConfig, Rate, Role,
    OverdueSweep, SafeTimeProvider, TimeSource, User, WalletLedger,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
    ));
    let store = MemoryStore::new();
    let config = PlatformConfig::default();

    let loans = LoanBook::new(store.clone(), config.clone());
    let offers = OfferBook::new(store.clone(), config.clone());
    let funding = FundingEngine::new(store.clone(), config);
    let wallets = WalletLedger::new(store.clone());
    let sweep = OverdueSweep::new(store);

    let borrower = User::new("bob", Role::Borrower);
    let lender = User::new("lena", Role::Lender);

    let loan = loans.request_loan(
        &borrower,
        LoanTerms {
            amount: Money::from_major(600),
            term_months: 3,
            annual_rate: Rate::from_percentage(10),
            purpose: "seed stock".to_string(),
        },
        &time,
    )?;
    let offer = offers.create_offer(loan.id, &lender, Rate::from_percentage(8), &time)?;
    offers.accept_offer(loan.id, offer.id, &borrower, &time)?;
    wallets.deposit(&lender, Money::from_major(700), &time)?;
    funding.fund_loan(loan.id, &lender, &time)?;
    println!("funded on {}", time.now().format("%Y-%m-%d"));

    // nothing due yet
    let summary = sweep.run(&time);
    println!("sweep on {}: {:?}", time.now().format("%Y-%m-%d"), summary);

    // jump past the first two due dates
    let control = time.test_control().unwrap();
    control.advance(Duration::days(65));
    let summary = sweep.run(&time);
    println!("sweep on {}: {:?}", time.now().format("%Y-%m-%d"), summary);

    // re-running marks nothing further
    let summary = sweep.run(&time);
    println!("sweep again:     {:?}", summary);

    Ok(())
}
