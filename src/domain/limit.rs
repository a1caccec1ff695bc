use crate::error::PaymentError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LimitCategory {
    Pix,
}

impl fmt::Display for LimitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitCategory::Pix => f.write_str("pix"),
        }
    }
}

/// Spending policy for one customer and category.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LimitPolicy {
    pub customer_id: String,
    pub category: LimitCategory,
    pub single_limit: Decimal,
    pub daily_limit: Decimal,
    #[serde(default)]
    pub daily_used: Decimal,
}

impl LimitPolicy {
    /// Single-transaction ceiling first, then the remaining daily allowance.
    pub fn check(&self, amount: Decimal) -> Result<(), PaymentError> {
        if amount > self.single_limit {
            return Err(PaymentError::LimitExceeded {
                which: "single_pix",
                ceiling: self.single_limit,
                attempted: amount,
            });
        }
        let projected = self.daily_used + amount;
        if projected > self.daily_limit {
            return Err(PaymentError::LimitExceeded {
                which: "daily_pix",
                ceiling: self.daily_limit,
                attempted: projected,
            });
        }
        Ok(())
    }
}
