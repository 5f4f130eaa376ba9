use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// unique identifier for a loan
pub type LoanId = Uuid;
/// unique identifier for an offer
pub type OfferId = Uuid;
/// unique identifier for a scheduled payment
pub type PaymentId = Uuid;
/// unique identifier for a wallet
pub type WalletId = Uuid;
/// unique identifier for a ledger entry
pub type EntryId = Uuid;
/// unique identifier for a platform user
pub type UserId = Uuid;

/// platform role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Borrower,
    Lender,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Borrower => write!(f, "borrower"),
            Role::Lender => write!(f, "lender"),
        }
    }
}

/// acting user, supplied by the caller; authentication happens upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl User {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            role,
        }
    }
}

/// loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// borrower posted the request, open for offers
    Requested,
    /// offer accepted, waiting on the lender to move funds
    PendingFunding,
    /// principal transferred, repayment schedule active
    Funded,
    /// every installment paid
    Completed,
    /// terminal, no operation produces this yet
    Cancelled,
}

impl LoanStatus {
    /// terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Completed | LoanStatus::Cancelled)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanStatus::Requested => write!(f, "REQUESTED"),
            LoanStatus::PendingFunding => write!(f, "PENDING_FUNDING"),
            LoanStatus::Funded => write!(f, "FUNDED"),
            LoanStatus::Completed => write!(f, "COMPLETED"),
            LoanStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// scheduled payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Overdue,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Paid => write!(f, "PAID"),
            PaymentStatus::Overdue => write!(f, "OVERDUE"),
        }
    }
}

/// ledger entry classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Deposit,
    Withdrawal,
    LoanFunding,
    LoanPayment,
    PlatformFee,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Deposit => write!(f, "DEPOSIT"),
            EntryKind::Withdrawal => write!(f, "WITHDRAWAL"),
            EntryKind::LoanFunding => write!(f, "LOAN_FUNDING"),
            EntryKind::LoanPayment => write!(f, "LOAN_PAYMENT"),
            EntryKind::PlatformFee => write!(f, "PLATFORM_FEE"),
        }
    }
}
