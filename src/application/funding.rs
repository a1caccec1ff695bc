use crate::domain::account::Account;
use crate::domain::funding::{FundingPlan, FundingSource, InstallmentPlan};
use crate::domain::ports::StoreHandle;
use crate::domain::transfer::ValidatedRequest;
use crate::error::{PaymentError, Result};

/// Decides how a transfer is paid and whether the payer can afford it.
#[derive(Clone)]
pub struct FundingResolver {
    store: StoreHandle,
}

impl FundingResolver {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    pub async fn resolve(
        &self,
        customer_id: &str,
        account: &Account,
        request: &ValidatedRequest,
    ) -> Result<FundingPlan> {
        let amount = request.amount.value();
        match request.funding_source {
            FundingSource::Balance => {
                let available = account.available_balance.value();
                if available < amount {
                    return Err(PaymentError::InsufficientFunds {
                        available,
                        required: amount,
                    });
                }
                Ok(FundingPlan::Balance { amount })
            }
            FundingSource::CreditLine => {
                let line_id = request.credit_line_id.as_deref().ok_or_else(|| {
                    PaymentError::validation(
                        "credit_line_id",
                        "required when funded by credit card",
                    )
                })?;
                let line = self
                    .store
                    .get_credit_line(customer_id, line_id)
                    .await?
                    .ok_or_else(|| PaymentError::not_found("credit line", line_id))?;
                if !line.pix_credit_enabled {
                    return Err(PaymentError::validation(
                        "credit_line_id",
                        "pix via credit card not enabled for this card",
                    ));
                }

                let plan = InstallmentPlan::compute(amount, request.installments, request.fee_rate)?;
                let attempted = line.pix_credit_used + plan.total;
                if attempted > line.pix_credit_limit {
                    return Err(PaymentError::LimitExceeded {
                        which: "pix_credit",
                        ceiling: line.pix_credit_limit,
                        attempted,
                    });
                }
                Ok(FundingPlan::CreditLine {
                    credit_line_id: line.id,
                    plan,
                })
            }
        }
    }
}
