pub mod amortization;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod funding;
pub mod loans;
pub mod offers;
pub mod payments;
pub mod report;
pub mod store;
pub mod sweep;
pub mod types;
pub mod wallet;

// re-export key types
pub use config::{LoanLimits, PlatformConfig};
pub use decimal::{Money, Rate};
pub use errors::{LendingError, Result};
pub use events::{CacheNotifier, Invalidation, MemoryNotifier, NullNotifier};
pub use funding::{FundingEngine, FundingReceipt};
pub use loans::{LoanBook, LoanTerms};
pub use offers::OfferBook;
pub use payments::{PaymentEngine, PaymentOutcome};
pub use report::StatusReport;
pub use store::{LedgerEntry, Loan, MemoryStore, Offer, Payment, Wallet};
pub use sweep::{OverdueSweep, SweepSummary};
pub use types::{
    EntryKind, LoanId, LoanStatus, OfferId, PaymentId, PaymentStatus, Role, User, UserId,
};
pub use wallet::{LedgerReceipt, TransferReceipt, WalletLedger};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
