use thiserror::Error;

use crate::decimal::Money;
use crate::types::{LoanId, LoanStatus, OfferId, Role, UserId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LendingError {
    #[error("role {actual} may not perform this operation, requires {required}")]
    RolePermission {
        required: Role,
        actual: Role,
    },

    #[error("loan not found: {id}")]
    LoanNotFound {
        id: LoanId,
    },

    #[error("offer not found: {id}")]
    OfferNotFound {
        id: OfferId,
    },

    #[error("wallet not found for user: {user_id}")]
    WalletNotFound {
        user_id: UserId,
    },

    #[error("user {user_id} is not authorized to access this loan")]
    Unauthorized {
        user_id: UserId,
    },

    #[error("invalid loan state: current {current}, expected {expected}")]
    InvalidState {
        current: LoanStatus,
        expected: LoanStatus,
    },

    #[error("offer already accepted: {id}")]
    OfferAlreadyAccepted {
        id: OfferId,
    },

    #[error("lender {lender_id} already has an offer on loan {loan_id}")]
    DuplicateOffer {
        loan_id: LoanId,
        lender_id: UserId,
    },

    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Money,
        requested: Money,
    },

    #[error("no pending payments remain for loan {loan_id}")]
    NoPendingPayment {
        loan_id: LoanId,
    },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, LendingError>;
