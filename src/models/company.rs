use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A franchise store selling on the marketplace (`companies` collection).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "companies")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub active: bool,
    /// Payment-gateway wallet receiving the store's share of each sale.
    pub wallet_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The configured payout wallet, if it is a non-blank string.
    pub fn payout_wallet(&self) -> Option<&str> {
        self.wallet_id
            .as_deref()
            .map(str::trim)
            .filter(|wallet| !wallet.is_empty())
    }
}
