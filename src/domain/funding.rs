use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default fee charged per additional installment (2%).
pub const DEFAULT_FEE_RATE: Decimal = dec!(0.02);

/// Most installments a credit-line transfer may be split into.
pub const MAX_INSTALLMENTS: i32 = 12;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum FundingSource {
    #[default]
    #[serde(rename = "balance")]
    Balance,
    #[serde(rename = "credit_card")]
    CreditLine,
}

impl fmt::Display for FundingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundingSource::Balance => f.write_str("balance"),
            FundingSource::CreditLine => f.write_str("credit_card"),
        }
    }
}

/// Installment cost of a credit-line funded transfer.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub struct InstallmentPlan {
    pub installments: u32,
    pub fee_rate: Decimal,
    pub amount: Decimal,
    pub total: Decimal,
}

impl InstallmentPlan {
    /// `total = amount × (1 + fee_rate × (installments − 1))`.
    ///
    /// Non-positive installments become 1, a non-positive fee rate becomes
    /// [`DEFAULT_FEE_RATE`]. More than [`MAX_INSTALLMENTS`] is rejected, as is
    /// a total that does not fit a `Decimal`.
    pub fn compute(
        amount: Decimal,
        installments: Option<i32>,
        fee_rate: Option<Decimal>,
    ) -> Result<Self> {
        let installments = match installments {
            Some(n) if n > MAX_INSTALLMENTS => {
                return Err(PaymentError::validation(
                    "installments",
                    format!("must be between 1 and {MAX_INSTALLMENTS}"),
                ));
            }
            Some(n) if n > 0 => n as u32,
            _ => 1,
        };
        let fee_rate = match fee_rate {
            Some(rate) if rate > Decimal::ZERO => rate,
            _ => DEFAULT_FEE_RATE,
        };
        let extra = Decimal::from(installments - 1);
        let total = fee_rate
            .checked_mul(extra)
            .and_then(|fee| fee.checked_add(Decimal::ONE))
            .and_then(|factor| amount.checked_mul(factor))
            .ok_or_else(|| PaymentError::validation("amount", "total with fees is out of range"))?;
        Ok(Self {
            installments,
            fee_rate,
            amount,
            total,
        })
    }

    pub fn fee(&self) -> Decimal {
        self.total - self.amount
    }

    pub fn installment_value(&self) -> Decimal {
        self.total / Decimal::from(self.installments)
    }
}

/// How an accepted transfer is paid.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FundingPlan {
    Balance {
        amount: Decimal,
    },
    CreditLine {
        credit_line_id: String,
        plan: InstallmentPlan,
    },
}

impl FundingPlan {
    pub fn source(&self) -> FundingSource {
        match self {
            FundingPlan::Balance { .. } => FundingSource::Balance,
            FundingPlan::CreditLine { .. } => FundingSource::CreditLine,
        }
    }

    /// What leaves the payer: the raw amount, or the total with fees.
    pub fn debit_total(&self) -> Decimal {
        match self {
            FundingPlan::Balance { amount } => *amount,
            FundingPlan::CreditLine { plan, .. } => plan.total,
        }
    }

    pub fn fee(&self) -> Decimal {
        match self {
            FundingPlan::Balance { .. } => Decimal::ZERO,
            FundingPlan::CreditLine { plan, .. } => plan.fee(),
        }
    }

    pub fn installments(&self) -> u32 {
        match self {
            FundingPlan::Balance { .. } => 1,
            FundingPlan::CreditLine { plan, .. } => plan.installments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_installments_at_two_percent() {
        let plan = InstallmentPlan::compute(dec!(100), Some(3), Some(dec!(0.02))).unwrap();
        assert_eq!(plan.total, dec!(104.00));
        assert_eq!(plan.fee(), dec!(4.00));
        let per_installment = plan.installment_value();
        assert!((per_installment - dec!(34.667)).abs() < dec!(0.001));
    }

    #[test]
    fn test_defaults() {
        let plan = InstallmentPlan::compute(dec!(100), None, None).unwrap();
        assert_eq!(plan.installments, 1);
        assert_eq!(plan.fee_rate, DEFAULT_FEE_RATE);
        assert_eq!(plan.total, dec!(100));

        let plan = InstallmentPlan::compute(dec!(100), Some(-2), Some(dec!(0))).unwrap();
        assert_eq!(plan.installments, 1);
        assert_eq!(plan.fee_rate, DEFAULT_FEE_RATE);

        let plan = InstallmentPlan::compute(dec!(200), Some(2), None).unwrap();
        assert_eq!(plan.total, dec!(204));
    }

    #[test]
    fn test_installments_are_capped() {
        let plan = InstallmentPlan::compute(dec!(100), Some(MAX_INSTALLMENTS), None).unwrap();
        assert_eq!(plan.total, dec!(122));
        assert!(matches!(
            InstallmentPlan::compute(dec!(100), Some(MAX_INSTALLMENTS + 1), None),
            Err(PaymentError::Validation { ref field, .. }) if field == "installments"
        ));
        assert!(InstallmentPlan::compute(dec!(100), Some(i32::MAX), None).is_err());
    }

    #[test]
    fn test_oversized_total_is_rejected() {
        assert!(matches!(
            InstallmentPlan::compute(Decimal::MAX, Some(12), None),
            Err(PaymentError::Validation { ref field, .. }) if field == "amount"
        ));
        assert!(InstallmentPlan::compute(dec!(100), Some(2), Some(Decimal::MAX)).is_err());
        // a single installment never grows the amount
        let plan = InstallmentPlan::compute(Decimal::MAX, Some(1), None).unwrap();
        assert_eq!(plan.total, Decimal::MAX);
    }

    #[test]
    fn test_funding_plan_debit_total() {
        let balance = FundingPlan::Balance { amount: dec!(10) };
        assert_eq!(balance.debit_total(), dec!(10));
        assert_eq!(balance.fee(), dec!(0));

        let credit = FundingPlan::CreditLine {
            credit_line_id: "card-1".into(),
            plan: InstallmentPlan::compute(dec!(100), Some(3), None).unwrap(),
        };
        assert_eq!(credit.debit_total(), dec!(104));
        assert_eq!(credit.installments(), 3);
        assert_eq!(credit.source(), FundingSource::CreditLine);
    }
}
