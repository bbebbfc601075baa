use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::errors::ServiceError;
use crate::models::money::percent_of;
use crate::models::{AffiliateSplitData, PaymentSplit, PaymentSplitResult, SplitParty};

/// Splits a payment between platform, store and (optionally) an affiliate.
///
/// Platform fee and affiliate commission are rounded to cents; the store
/// receives the remainder, so the three amounts always add up to the total.
#[derive(Debug, Clone)]
pub struct PaymentSplitCalculator {
    platform_wallet_id: String,
    fee_percent: Decimal,
}

impl PaymentSplitCalculator {
    pub fn new(platform_wallet_id: impl Into<String>, fee_percent: Decimal) -> Self {
        Self {
            platform_wallet_id: platform_wallet_id.into(),
            fee_percent,
        }
    }

    pub fn fee_percent(&self) -> Decimal {
        self.fee_percent
    }

    pub fn calculate_payment_splits(
        &self,
        total_amount: Decimal,
        store_wallet_id: &str,
        affiliate: Option<&AffiliateSplitData>,
    ) -> Result<PaymentSplitResult, ServiceError> {
        if total_amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Split total must be positive".to_string(),
            ));
        }
        if store_wallet_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "Store wallet id is required".to_string(),
            ));
        }

        let commission_percent = match affiliate {
            Some(data) => {
                if data.wallet_id.trim().is_empty() {
                    return Err(ServiceError::InvalidInput(
                        "Affiliate wallet id is required".to_string(),
                    ));
                }
                if data.commission_percentage < Decimal::ZERO
                    || data.commission_percentage + self.fee_percent > dec!(100)
                {
                    return Err(ServiceError::InvalidInput(format!(
                        "Commission of {}% leaves the store a negative share",
                        data.commission_percentage
                    )));
                }
                data.commission_percentage
            }
            None => Decimal::ZERO,
        };

        let platform_fee = percent_of(total_amount, self.fee_percent);
        let affiliate_commission = percent_of(total_amount, commission_percent);
        let store_amount = total_amount - platform_fee - affiliate_commission;

        let mut splits = vec![PaymentSplit {
            wallet_id: self.platform_wallet_id.clone(),
            percentage_value: self.fee_percent,
            party: SplitParty::Platform,
        }];
        if let Some(data) = affiliate {
            splits.push(PaymentSplit {
                wallet_id: data.wallet_id.trim().to_string(),
                percentage_value: commission_percent,
                party: SplitParty::Affiliate,
            });
        }
        splits.push(PaymentSplit {
            wallet_id: store_wallet_id.trim().to_string(),
            percentage_value: dec!(100) - self.fee_percent - commission_percent,
            party: SplitParty::Store,
        });

        debug!(
            %total_amount,
            %platform_fee,
            %affiliate_commission,
            %store_amount,
            "payment split computed"
        );

        Ok(PaymentSplitResult {
            total_amount,
            platform_fee,
            store_amount,
            affiliate_commission,
            splits,
        })
    }
}
