use chrono::{DateTime, Datelike, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::store::{Loan, Payment};
use crate::types::PaymentStatus;

/// fixed monthly installment for an amortized loan
///
/// EMI = P * r * (1 + r)^n / ((1 + r)^n - 1), with r the monthly rate.
/// Zero-rate loans amortize linearly. Result is rounded half-up to cents.
pub fn monthly_payment(amount: Money, annual_rate: Rate, term_months: u32) -> Money {
    if term_months == 0 {
        return Money::ZERO;
    }

    let r = annual_rate.monthly_rate().as_decimal();
    if r.is_zero() {
        return amount / Decimal::from(term_months);
    }

    let base = Decimal::ONE + r;
    let mut compound = Decimal::ONE;
    for _ in 0..term_months {
        compound *= base;
    }

    let numerator = amount.as_decimal() * r * compound;
    let denominator = compound - Decimal::ONE;
    Money::from_decimal(numerator / denominator)
}

/// total repaid over the life of the loan
pub fn total_amount(amount: Money, annual_rate: Rate, term_months: u32) -> Money {
    monthly_payment(amount, annual_rate, term_months) * Decimal::from(term_months)
}

/// generate the full repayment schedule for a loan
///
/// One Pending installment per month, numbered 1..=term, each due
/// `payment_number` calendar months after `base_date`. Callers pass the
/// funding date as the base; today is only a fallback before funding.
pub fn schedule(loan: &Loan, base_date: NaiveDate, now: DateTime<Utc>) -> Vec<Payment> {
    let installment = monthly_payment(loan.amount, loan.annual_rate, loan.term_months);

    (1..=loan.term_months)
        .map(|number| Payment {
            id: Uuid::new_v4(),
            loan_id: loan.id,
            payment_number: number,
            due_date: add_months(base_date, number),
            amount: installment,
            status: PaymentStatus::Pending,
            paid_at: None,
            created_at: now,
        })
        .collect()
}

/// schedule based on the loan's funding date; today is only the fallback
/// for a loan that has not been funded yet
pub fn schedule_from_funding(loan: &Loan, time: &SafeTimeProvider) -> Vec<Payment> {
    let now = time.now();
    let base_date = loan
        .funded_at
        .map(|t| t.date_naive())
        .unwrap_or_else(|| now.date_naive());
    schedule(loan, base_date, now)
}

/// a pending installment past its due date counts as overdue
pub fn is_overdue(payment: &Payment, today: NaiveDate) -> bool {
    payment.status == PaymentStatus::Pending && payment.due_date < today
}

/// advance a date by whole calendar months, preserving the day of month
/// and clipping at month end (Jan 31 + 1 month = Feb 29/28)
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monthly_payment_reference_case() {
        // $1000 at 12% over 6 months
        let emi = monthly_payment(Money::from_major(1_000), Rate::from_percentage(12), 6);
        assert_eq!(emi, Money::from_str_exact("172.55").unwrap());
        assert_eq!(
            total_amount(Money::from_major(1_000), Rate::from_percentage(12), 6),
            Money::from_str_exact("1035.30").unwrap()
        );
    }

    #[test]
    fn test_monthly_payment_zero_rate() {
        let emi = monthly_payment(Money::from_major(1_200), Rate::ZERO, 12);
        assert_eq!(emi, Money::from_major(100));
    }

    #[test]
    fn test_monthly_payment_zero_term() {
        assert_eq!(monthly_payment(Money::from_major(500), Rate::from_percentage(5), 0), Money::ZERO);
    }

    #[test]
    fn test_add_months_preserves_day() {
        assert_eq!(add_months(date(2024, 1, 15), 1), date(2024, 2, 15));
        assert_eq!(add_months(date(2024, 1, 15), 6), date(2024, 7, 15));
        assert_eq!(add_months(date(2024, 11, 15), 2), date(2025, 1, 15));
    }

    #[test]
    fn test_add_months_clips_at_month_end() {
        assert_eq!(add_months(date(2024, 1, 31), 1), date(2024, 2, 29)); // leap year
        assert_eq!(add_months(date(2023, 1, 31), 1), date(2023, 2, 28));
        // clipping does not stick: two months from Jan 31 is Mar 31
        assert_eq!(add_months(date(2024, 1, 31), 2), date(2024, 3, 31));
        assert_eq!(add_months(date(2024, 3, 31), 1), date(2024, 4, 30));
    }

    #[test]
    fn test_schedule_dates_and_amounts() {
        let borrower = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let loan = Loan::new(
            borrower,
            Money::from_major(1_000),
            6,
            Rate::from_percentage(12),
            "reference case".to_string(),
            now,
        );

        let payments = schedule(&loan, date(2024, 1, 15), now);
        assert_eq!(payments.len(), 6);

        let expected_dates = [
            date(2024, 2, 15),
            date(2024, 3, 15),
            date(2024, 4, 15),
            date(2024, 5, 15),
            date(2024, 6, 15),
            date(2024, 7, 15),
        ];
        for (i, payment) in payments.iter().enumerate() {
            assert_eq!(payment.payment_number as usize, i + 1);
            assert_eq!(payment.due_date, expected_dates[i]);
            assert_eq!(payment.amount, Money::from_str_exact("172.55").unwrap());
            assert_eq!(payment.status, PaymentStatus::Pending);
            assert!(payment.paid_at.is_none());
        }
    }

    #[test]
    fn test_schedule_from_funding_prefers_funded_at() {
        use hourglass_rs::TimeSource;

        let borrower = Uuid::new_v4();
        let funded = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let mut loan = Loan::new(
            borrower,
            Money::from_major(1_000),
            6,
            Rate::from_percentage(12),
            String::new(),
            funded,
        );
        loan.funded_at = Some(funded);

        // clock sits weeks later; the funding date still anchors the schedule
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 2, 3, 0, 0, 0).unwrap(),
        ));
        let payments = schedule_from_funding(&loan, &time);
        assert_eq!(payments[0].due_date, date(2024, 2, 15));

        // unfunded loan falls back to today
        loan.funded_at = None;
        let payments = schedule_from_funding(&loan, &time);
        assert_eq!(payments[0].due_date, date(2024, 3, 3));
    }

    #[test]
    fn test_is_overdue_requires_pending() {
        let borrower = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let loan = Loan::new(
            borrower,
            Money::from_major(600),
            3,
            Rate::ZERO,
            String::new(),
            now,
        );
        let mut payments = schedule(&loan, date(2024, 1, 1), now);

        let today = date(2024, 3, 1);
        assert!(is_overdue(&payments[0], today)); // due Feb 1
        assert!(!is_overdue(&payments[1], today)); // due Mar 1, not yet past
        payments[0].status = PaymentStatus::Paid;
        assert!(!is_overdue(&payments[0], today));
    }
}
