use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Schema,
    TransactionTrait,
};
use tracing::{info, instrument, warn};

use super::{CommerceStore, NewOrder};
use crate::errors::ServiceError;
use crate::models::{
    affiliate, affiliate_invitation, company, coupon, order, order_item, product, Affiliate,
    AffiliateInvitation, Company, Coupon, InvitationStatus, Order, OrderItem, Product,
};

/// sea-orm backed store. Multi-row operations run inside a database
/// transaction; stock is decremented with a guarded `UPDATE` so a concurrent
/// checkout can never drive it below zero.
#[derive(Debug, Clone)]
pub struct SqlStore {
    db: Arc<DatabaseConnection>,
}

impl SqlStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn connect(database_url: &str) -> Result<Self, ServiceError> {
        let db = sea_orm::Database::connect(database_url).await?;
        Ok(Self::new(Arc::new(db)))
    }

    /// Creates every table from the entity definitions if it does not exist.
    pub async fn create_schema(&self) -> Result<(), ServiceError> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);

        let mut statements = vec![
            schema.create_table_from_entity(company::Entity),
            schema.create_table_from_entity(product::Entity),
            schema.create_table_from_entity(coupon::Entity),
            schema.create_table_from_entity(affiliate::Entity),
            schema.create_table_from_entity(affiliate_invitation::Entity),
            schema.create_table_from_entity(order::Entity),
            schema.create_table_from_entity(order_item::Entity),
        ];
        for statement in statements.iter_mut() {
            statement.if_not_exists();
            self.db.execute(backend.build(&*statement)).await?;
        }

        info!("Checkout schema ready");
        Ok(())
    }

    pub async fn insert_company(&self, model: Company) -> Result<(), ServiceError> {
        model.into_active_model().insert(&*self.db).await?;
        Ok(())
    }

    pub async fn insert_product(&self, model: Product) -> Result<(), ServiceError> {
        model.into_active_model().insert(&*self.db).await?;
        Ok(())
    }

    pub async fn insert_coupon(&self, mut model: Coupon) -> Result<(), ServiceError> {
        model.code = model.code.trim().to_uppercase();
        model.into_active_model().insert(&*self.db).await?;
        Ok(())
    }

    pub async fn insert_affiliate(&self, model: Affiliate) -> Result<(), ServiceError> {
        model.into_active_model().insert(&*self.db).await?;
        Ok(())
    }

    pub async fn insert_invitation(&self, model: AffiliateInvitation) -> Result<(), ServiceError> {
        model.into_active_model().insert(&*self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl CommerceStore for SqlStore {
    async fn get_company(&self, id: &str) -> Result<Option<Company>, ServiceError> {
        Ok(company::Entity::find_by_id(id.to_owned()).one(&*self.db).await?)
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>, ServiceError> {
        Ok(product::Entity::find_by_id(id.to_owned()).one(&*self.db).await?)
    }

    async fn find_coupons_by_code(&self, code: &str) -> Result<Vec<Coupon>, ServiceError> {
        Ok(coupon::Entity::find()
            .filter(coupon::Column::Code.eq(code))
            .order_by_asc(coupon::Column::Id)
            .all(&*self.db)
            .await?)
    }

    async fn get_coupon(&self, id: &str) -> Result<Option<Coupon>, ServiceError> {
        Ok(coupon::Entity::find_by_id(id.to_owned()).one(&*self.db).await?)
    }

    #[instrument(skip(self))]
    async fn increment_coupon_usage(&self, id: &str) -> Result<i64, ServiceError> {
        let result = coupon::Entity::update_many()
            .col_expr(
                coupon::Column::UsedCount,
                Expr::col(coupon::Column::UsedCount).add(1),
            )
            .filter(coupon::Column::Id.eq(id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Coupon {} not found", id)));
        }

        let coupon = coupon::Entity::find_by_id(id.to_owned())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", id)))?;
        Ok(coupon.used_count)
    }

    async fn get_affiliate(&self, id: &str) -> Result<Option<Affiliate>, ServiceError> {
        Ok(affiliate::Entity::find_by_id(id.to_owned()).one(&*self.db).await?)
    }

    async fn find_affiliates_by_user(&self, user_id: &str) -> Result<Vec<Affiliate>, ServiceError> {
        Ok(affiliate::Entity::find()
            .filter(affiliate::Column::User.eq(user_id))
            .all(&*self.db)
            .await?)
    }

    async fn affiliate_code_exists(&self, code: &str) -> Result<bool, ServiceError> {
        let count = affiliate::Entity::find()
            .filter(affiliate::Column::InviteCode.eq(code))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }

    async fn find_invitation(
        &self,
        token: &str,
        email: &str,
    ) -> Result<Option<AffiliateInvitation>, ServiceError> {
        let invitation = affiliate_invitation::Entity::find()
            .filter(affiliate_invitation::Column::Token.eq(token))
            .one(&*self.db)
            .await?;
        Ok(invitation.filter(|inv| inv.email.eq_ignore_ascii_case(email)))
    }

    async fn transition_invitation_status(
        &self,
        id: &str,
        from: InvitationStatus,
        to: InvitationStatus,
    ) -> Result<bool, ServiceError> {
        let result = affiliate_invitation::Entity::update_many()
            .col_expr(affiliate_invitation::Column::Status, Expr::value(to))
            .filter(affiliate_invitation::Column::Id.eq(id))
            .filter(affiliate_invitation::Column::Status.eq(from))
            .exec(&*self.db)
            .await?;
        if result.rows_affected > 0 {
            return Ok(true);
        }
        let exists = affiliate_invitation::Entity::find_by_id(id.to_owned())
            .one(&*self.db)
            .await?
            .is_some();
        if !exists {
            return Err(ServiceError::NotFound(format!("Invitation {} not found", id)));
        }
        Ok(false)
    }

    #[instrument(skip(self, affiliate), fields(affiliate_id = %affiliate.id))]
    async fn accept_invitation(
        &self,
        invitation_id: &str,
        affiliate: Affiliate,
    ) -> Result<bool, ServiceError> {
        let txn = self.db.begin().await?;

        let moved = affiliate_invitation::Entity::update_many()
            .col_expr(
                affiliate_invitation::Column::Status,
                Expr::value(InvitationStatus::Accepted),
            )
            .col_expr(
                affiliate_invitation::Column::AcceptedAt,
                Expr::value(Utc::now()),
            )
            .filter(affiliate_invitation::Column::Id.eq(invitation_id))
            .filter(affiliate_invitation::Column::Status.eq(InvitationStatus::Pending))
            .exec(&txn)
            .await?;

        if moved.rows_affected == 0 {
            txn.rollback().await?;
            warn!(invitation_id, "invitation no longer pending; nothing written");
            return Ok(false);
        }

        affiliate.into_active_model().insert(&txn).await?;
        txn.commit().await?;
        Ok(true)
    }

    #[instrument(skip(self, new_order), fields(order_id = %new_order.order.id))]
    async fn commit_order(&self, new_order: NewOrder) -> Result<Order, ServiceError> {
        let txn = self.db.begin().await?;

        if order::Entity::find_by_id(new_order.order.id.clone())
            .one(&txn)
            .await?
            .is_some()
        {
            txn.rollback().await?;
            return Err(ServiceError::Conflict(format!(
                "Order {} already exists",
                new_order.order.id
            )));
        }

        for item in &new_order.items {
            let updated = product::Entity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(item.quantity),
                )
                .filter(product::Column::Id.eq(item.product_id.as_str()))
                .filter(product::Column::Stock.gte(item.quantity))
                .exec(&txn)
                .await?;

            if updated.rows_affected == 0 {
                txn.rollback().await?;
                return Err(ServiceError::InsufficientStock(format!(
                    "Product {} cannot serve {} units",
                    item.product_id, item.quantity
                )));
            }
        }

        let order = new_order.order.into_active_model().insert(&txn).await?;
        for item in new_order.items {
            item.into_active_model().insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(order)
    }

    async fn get_order(&self, id: &str) -> Result<Option<(Order, Vec<OrderItem>)>, ServiceError> {
        let Some(order) = order::Entity::find_by_id(id.to_owned()).one(&*self.db).await? else {
            return Ok(None);
        };
        let items = order
            .find_related(order_item::Entity)
            .order_by_asc(order_item::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(Some((order, items)))
    }
}
