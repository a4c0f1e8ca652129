//! Customer payments

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{string_enum, CustomerId, PaymentId, RenewalCaseId};

use crate::error::RenewalError;

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
    Partial,
    Overdue,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
    Refunded => "refunded",
    Partial => "partial",
    Overdue => "overdue",
});

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Upi,
    CreditCard,
    DebitCard,
    NetBanking,
    BankTransfer,
    Cheque,
    Cash,
    Wallet,
    AutoDebit,
}

string_enum!(PaymentMode, "payment mode", {
    Upi => "upi",
    CreditCard => "credit_card",
    DebitCard => "debit_card",
    NetBanking => "net_banking",
    BankTransfer => "bank_transfer",
    Cheque => "cheque",
    Cash => "cash",
    Wallet => "wallet",
    AutoDebit => "auto_debit",
});

/// A payment received from a customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerPayment {
    pub id: PaymentId,
    pub customer_id: CustomerId,
    pub renewal_case_id: Option<RenewalCaseId>,
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub status: PaymentStatus,
    pub mode: PaymentMode,
    /// External transaction reference
    pub transaction_id: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerPayment {
    pub fn new(
        customer_id: CustomerId,
        amount: Decimal,
        payment_date: DateTime<Utc>,
        due_date: NaiveDate,
        mode: PaymentMode,
    ) -> Result<Self, RenewalError> {
        if amount <= Decimal::ZERO {
            return Err(RenewalError::InvalidAmount(amount.to_string()));
        }
        let now = Utc::now();
        Ok(Self {
            id: PaymentId::new_v7(),
            customer_id,
            renewal_case_id: None,
            amount,
            payment_date,
            due_date,
            status: PaymentStatus::Pending,
            mode,
            transaction_id: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn for_case(mut self, case_id: RenewalCaseId) -> Self {
        self.renewal_case_id = Some(case_id);
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    /// Completed and paid on or before the due date
    pub fn is_on_time(&self) -> bool {
        self.is_completed() && self.payment_date.date_naive() <= self.due_date
    }

    /// Days paid ahead of the due date; negative when late
    pub fn days_early(&self) -> i64 {
        (self.due_date - self.payment_date.date_naive()).num_days()
    }

    /// Marks the payment deleted; returns false if it already was
    pub fn soft_delete(&mut self) -> bool {
        if self.is_deleted {
            return false;
        }
        self.is_deleted = true;
        self.updated_at = Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn payment(paid: (i32, u32, u32), due: (i32, u32, u32)) -> CustomerPayment {
        CustomerPayment::new(
            CustomerId::new(),
            dec!(5000),
            Utc.with_ymd_and_hms(paid.0, paid.1, paid.2, 10, 0, 0).unwrap(),
            NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap(),
            PaymentMode::Upi,
        )
        .unwrap()
    }

    #[test]
    fn test_on_time_requires_completed() {
        let p = payment((2024, 3, 1), (2024, 3, 1));
        assert!(!p.is_on_time());
        assert!(p.with_status(PaymentStatus::Completed).is_on_time());
    }

    #[test]
    fn test_late_payment() {
        let p = payment((2024, 3, 5), (2024, 3, 1)).with_status(PaymentStatus::Completed);
        assert!(!p.is_on_time());
        assert_eq!(p.days_early(), -4);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let result = CustomerPayment::new(
            CustomerId::new(),
            dec!(0),
            Utc::now(),
            Utc::now().date_naive(),
            PaymentMode::Cash,
        );
        assert!(result.is_err());
    }
}
