use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};

/// platform-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// flat fee deducted from the lender at funding time
    pub platform_fee: Money,
    pub limits: LoanLimits,
}

/// bounds applied when validating a loan request or an offer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanLimits {
    pub max_amount: Money,
    pub min_term_months: u32,
    pub max_term_months: u32,
    pub max_rate: Rate,
}

impl Default for LoanLimits {
    fn default() -> Self {
        Self {
            max_amount: Money::from_major(1_000_000),
            min_term_months: 1,
            max_term_months: 360,
            max_rate: Rate::from_percentage(50),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            platform_fee: Money::from_major(100),
            limits: LoanLimits::default(),
        }
    }
}

impl PlatformConfig {
    /// configuration with a custom funding fee
    pub fn with_fee(platform_fee: Money) -> Self {
        Self {
            platform_fee,
            ..Self::default()
        }
    }
}

impl LoanLimits {
    /// validate requested principal
    pub fn check_amount(&self, amount: Money) -> Result<()> {
        if !amount.is_positive() {
            return Err(LendingError::Validation {
                message: format!("loan amount must be greater than 0, got {}", amount),
            });
        }
        if amount > self.max_amount {
            return Err(LendingError::Validation {
                message: format!("loan amount cannot exceed {}, got {}", self.max_amount, amount),
            });
        }
        Ok(())
    }

    /// validate term length
    pub fn check_term(&self, term_months: u32) -> Result<()> {
        if term_months < self.min_term_months {
            return Err(LendingError::Validation {
                message: format!(
                    "term must be at least {} month(s), got {}",
                    self.min_term_months, term_months
                ),
            });
        }
        if term_months > self.max_term_months {
            return Err(LendingError::Validation {
                message: format!(
                    "term cannot exceed {} months, got {}",
                    self.max_term_months, term_months
                ),
            });
        }
        Ok(())
    }

    /// validate annual interest rate
    pub fn check_rate(&self, rate: Rate) -> Result<()> {
        if rate.as_decimal() < Decimal::ZERO {
            return Err(LendingError::Validation {
                message: format!("interest rate cannot be negative, got {}", rate),
            });
        }
        if rate > self.max_rate {
            return Err(LendingError::Validation {
                message: format!("interest rate cannot exceed {}, got {}", self.max_rate, rate),
            });
        }
        Ok(())
    }
}
