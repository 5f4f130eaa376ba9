/// quick start - minimal example to get started
use peer_lending_rs::{
    FundingEngine, LoanBook, LoanTerms, MemoryStore, Money, OfferBook, PaymentEngine,
    PlatformConfig, Rate, Role, SafeTimeProvider, TimeSource, User, WalletLedger,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::System);
    let store = MemoryStore::new();
    let config = PlatformConfig::default();

    let loans = LoanBook::new(store.clone(), config.clone());
    let offers = OfferBook::new(store.clone(), config.clone());
    let funding = FundingEngine::new(store.clone(), config);
    let payments = PaymentEngine::new(store.clone());
    let wallets = WalletLedger::new(store);

    let borrower = User::new("bob", Role::Borrower);
    let lender = User::new("lena", Role::Lender);

    // borrower posts a $1,000 request at a 20% ceiling
    let loan = loans.request_loan(
        &borrower,
        LoanTerms {
            amount: Money::from_major(1_000),
            term_months: 6,
            annual_rate: Rate::from_percentage(20),
            purpose: "bike repair".to_string(),
        },
        &time,
    )?;

    // lender undercuts at 12% and the borrower accepts
    let offer = offers.create_offer(loan.id, &lender, Rate::from_percentage(12), &time)?;
    offers.accept_offer(loan.id, offer.id, &borrower, &time)?;

    // lender funds principal + platform fee
    wallets.deposit(&lender, Money::from_major(1_200), &time)?;
    let receipt = funding.fund_loan(loan.id, &lender, &time)?;
    println!("funded: {} installments", receipt.installments);

    // first repayment
    wallets.deposit(&borrower, Money::from_major(100), &time)?;
    let outcome = payments.make_payment(loan.id, &borrower, &time)?;
    println!(
        "paid installment {} of {}",
        outcome.payment.payment_number, outcome.payment.amount
    );

    Ok(())
}
