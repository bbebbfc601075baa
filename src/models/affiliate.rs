use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Affiliate activation flag, persisted as `SIM` / `NAO`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(3))")]
pub enum AffiliateStatus {
    #[sea_orm(string_value = "SIM")]
    #[serde(rename = "SIM")]
    Active,
    #[sea_orm(string_value = "NAO")]
    #[serde(rename = "NAO")]
    Inactive,
}

/// A referring party promoting one company (`affiliated` collection).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "affiliates")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning account id.
    pub user: String,
    pub wallet_id: String,
    /// Commission in percent of the sale total.
    #[serde(with = "rust_decimal::serde::float")]
    pub commission_rate: Decimal,
    pub active: AffiliateStatus,
    #[serde(rename = "company_relationed")]
    pub company_relationed: String,
    #[sea_orm(unique)]
    #[serde(rename = "invite_code")]
    pub invite_code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_active(&self) -> bool {
        self.active == AffiliateStatus::Active
    }

    /// The payout wallet, if it is a non-blank string.
    pub fn payout_wallet(&self) -> Option<&str> {
        Some(self.wallet_id.trim()).filter(|wallet| !wallet.is_empty())
    }
}
