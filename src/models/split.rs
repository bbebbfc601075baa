use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::percent_of;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitParty {
    Platform,
    Store,
    Affiliate,
}

/// One gateway split instruction: route `percentage_value` percent of the
/// payment to `wallet_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSplit {
    pub wallet_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub percentage_value: Decimal,
    pub party: SplitParty,
}

/// Affiliate side of a split request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateSplitData {
    pub wallet_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub commission_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSplitResult {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub platform_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub store_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub affiliate_commission: Decimal,
    pub splits: Vec<PaymentSplit>,
}

/// The amount a split entry resolves to for a concrete total.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitAllocation {
    pub wallet_id: String,
    pub party: SplitParty,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl PaymentSplitResult {
    /// Applies the split percentages to `total_amount` the way the gateway
    /// does. The store takes whatever the other parties leave, so the
    /// allocations always sum to `total_amount`.
    pub fn allocate(&self) -> Vec<SplitAllocation> {
        let mut allocations: Vec<SplitAllocation> = self
            .splits
            .iter()
            .filter(|split| split.party != SplitParty::Store)
            .map(|split| SplitAllocation {
                wallet_id: split.wallet_id.clone(),
                party: split.party,
                amount: percent_of(self.total_amount, split.percentage_value),
            })
            .collect();

        let claimed: Decimal = allocations.iter().map(|a| a.amount).sum();
        if let Some(store) = self.splits.iter().find(|s| s.party == SplitParty::Store) {
            allocations.push(SplitAllocation {
                wallet_id: store.wallet_id.clone(),
                party: SplitParty::Store,
                amount: self.total_amount - claimed,
            });
        }
        allocations
    }

    pub fn split_for(&self, party: SplitParty) -> Option<&PaymentSplit> {
        self.splits.iter().find(|split| split.party == party)
    }
}
