use super::money::Balance;
use crate::error::PaymentError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Blocked,
}

/// A customer's deposit account.
///
/// `available_balance` is the balance minus holds. Both move together on
/// every signed delta; holds themselves are managed outside this core.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: String,
    pub customer_id: String,
    pub balance: Balance,
    pub available_balance: Balance,
    #[serde(default)]
    pub status: AccountStatus,
}

impl Account {
    pub fn new(id: impl Into<String>, customer_id: impl Into<String>, balance: Balance) -> Self {
        Self {
            id: id.into(),
            customer_id: customer_id.into(),
            balance,
            available_balance: balance,
            status: AccountStatus::Active,
        }
    }

    pub fn apply_delta(&mut self, delta: Balance) {
        self.balance += delta;
        self.available_balance += delta;
    }

    pub fn ensure_active(&self) -> Result<(), PaymentError> {
        match self.status {
            AccountStatus::Active => Ok(()),
            AccountStatus::Blocked => Err(PaymentError::AccountBlocked(self.id.clone())),
        }
    }
}

/// A revolving credit line (credit card) that can fund instant transfers.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CreditLine {
    pub id: String,
    pub customer_id: String,
    pub credit_limit: Decimal,
    pub used_limit: Decimal,
    pub available_limit: Decimal,
    pub pix_credit_enabled: bool,
    pub pix_credit_limit: Decimal,
    pub pix_credit_used: Decimal,
}

impl CreditLine {
    /// Used/available pair after charging `total` to the line.
    /// Available never goes negative.
    pub fn charged(&self, total: Decimal) -> (Decimal, Decimal) {
        let used = self.used_limit + total;
        let available = (self.credit_limit - used).max(Decimal::ZERO);
        (used, available)
    }
}

/// How a customer is displayed on receipts.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct PartyIdentity {
    pub name: String,
    pub document: String,
    pub bank: String,
    pub branch: String,
    pub account: String,
}

/// Customer directory entry.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Customer {
    pub id: String,
    pub identity: PartyIdentity,
    pub primary_account_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_apply_delta_moves_both_balances() {
        let mut account = Account::new("acc-1", "cust-1", Balance::new(dec!(100)));
        account.available_balance = Balance::new(dec!(80));

        account.apply_delta(Balance::new(dec!(-30)));
        assert_eq!(account.balance, Balance::new(dec!(70)));
        assert_eq!(account.available_balance, Balance::new(dec!(50)));
    }

    #[test]
    fn test_blocked_account() {
        let mut account = Account::new("acc-1", "cust-1", Balance::ZERO);
        assert!(account.ensure_active().is_ok());
        account.status = AccountStatus::Blocked;
        assert!(matches!(
            account.ensure_active(),
            Err(PaymentError::AccountBlocked(_))
        ));
    }

    #[test]
    fn test_credit_line_charge_clamps_available() {
        let line = CreditLine {
            id: "card-1".into(),
            customer_id: "cust-1".into(),
            credit_limit: dec!(1000),
            used_limit: dec!(950),
            available_limit: dec!(50),
            pix_credit_enabled: true,
            pix_credit_limit: dec!(2000),
            pix_credit_used: dec!(0),
        };
        assert_eq!(line.charged(dec!(104)), (dec!(1054), dec!(0)));
        assert_eq!(line.charged(dec!(30)), (dec!(980), dec!(20)));
    }
}
