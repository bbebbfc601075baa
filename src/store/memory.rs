use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::Mutex;
use tracing::debug;

use super::{CommerceStore, NewOrder};
use crate::errors::ServiceError;
use crate::models::{
    Affiliate, AffiliateInvitation, Company, Coupon, InvitationStatus, Order, OrderItem, Product,
};

/// Process-local store backed by concurrent maps.
///
/// Single-document updates (coupon usage, invitation status) rely on the
/// per-entry lock of [`DashMap`]. Order commits touch several products and
/// are serialized by `commit_lock`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    companies: DashMap<String, Company>,
    products: DashMap<String, Product>,
    coupons: DashMap<String, Coupon>,
    affiliates: DashMap<String, Affiliate>,
    affiliate_codes: DashMap<String, String>,
    invitations: DashMap<String, AffiliateInvitation>,
    orders: DashMap<String, (Order, Vec<OrderItem>)>,
    commit_lock: Mutex<()>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_company(&self, company: Company) {
        self.companies.insert(company.id.clone(), company);
    }

    pub fn insert_product(&self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    pub fn insert_coupon(&self, mut coupon: Coupon) {
        coupon.code = coupon.code.trim().to_uppercase();
        self.coupons.insert(coupon.id.clone(), coupon);
    }

    pub fn insert_affiliate(&self, affiliate: Affiliate) {
        self.affiliate_codes
            .insert(affiliate.invite_code.clone(), affiliate.id.clone());
        self.affiliates.insert(affiliate.id.clone(), affiliate);
    }

    pub fn insert_invitation(&self, invitation: AffiliateInvitation) {
        self.invitations.insert(invitation.id.clone(), invitation);
    }

    pub fn invitation(&self, id: &str) -> Option<AffiliateInvitation> {
        self.invitations.get(id).map(|entry| entry.clone())
    }

    pub fn affiliate_count(&self) -> usize {
        self.affiliates.len()
    }
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    async fn get_company(&self, id: &str) -> Result<Option<Company>, ServiceError> {
        Ok(self.companies.get(id).map(|entry| entry.clone()))
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>, ServiceError> {
        Ok(self.products.get(id).map(|entry| entry.clone()))
    }

    async fn find_coupons_by_code(&self, code: &str) -> Result<Vec<Coupon>, ServiceError> {
        let mut found: Vec<Coupon> = self
            .coupons
            .iter()
            .filter(|entry| entry.code == code)
            .map(|entry| entry.clone())
            .collect();
        // DashMap iteration order is unspecified.
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn get_coupon(&self, id: &str) -> Result<Option<Coupon>, ServiceError> {
        Ok(self.coupons.get(id).map(|entry| entry.clone()))
    }

    async fn increment_coupon_usage(&self, id: &str) -> Result<i64, ServiceError> {
        let mut coupon = self
            .coupons
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", id)))?;
        coupon.used_count += 1;
        Ok(coupon.used_count)
    }

    async fn get_affiliate(&self, id: &str) -> Result<Option<Affiliate>, ServiceError> {
        Ok(self.affiliates.get(id).map(|entry| entry.clone()))
    }

    async fn find_affiliates_by_user(&self, user_id: &str) -> Result<Vec<Affiliate>, ServiceError> {
        Ok(self
            .affiliates
            .iter()
            .filter(|entry| entry.user == user_id)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn affiliate_code_exists(&self, code: &str) -> Result<bool, ServiceError> {
        Ok(self.affiliate_codes.contains_key(code))
    }

    async fn find_invitation(
        &self,
        token: &str,
        email: &str,
    ) -> Result<Option<AffiliateInvitation>, ServiceError> {
        Ok(self
            .invitations
            .iter()
            .find(|entry| entry.token == token && entry.email.eq_ignore_ascii_case(email))
            .map(|entry| entry.clone()))
    }

    async fn transition_invitation_status(
        &self,
        id: &str,
        from: InvitationStatus,
        to: InvitationStatus,
    ) -> Result<bool, ServiceError> {
        let mut invitation = self
            .invitations
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(format!("Invitation {} not found", id)))?;
        if invitation.status != from {
            return Ok(false);
        }
        invitation.status = to;
        Ok(true)
    }

    async fn accept_invitation(
        &self,
        invitation_id: &str,
        affiliate: Affiliate,
    ) -> Result<bool, ServiceError> {
        let mut invitation = self.invitations.get_mut(invitation_id).ok_or_else(|| {
            ServiceError::NotFound(format!("Invitation {} not found", invitation_id))
        })?;
        if invitation.status != InvitationStatus::Pending {
            return Ok(false);
        }

        match self.affiliate_codes.entry(affiliate.invite_code.clone()) {
            Entry::Occupied(_) => {
                return Err(ServiceError::Conflict(format!(
                    "Affiliate code {} already taken",
                    affiliate.invite_code
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(affiliate.id.clone());
            }
        }
        self.affiliates.insert(affiliate.id.clone(), affiliate);

        invitation.status = InvitationStatus::Accepted;
        invitation.accepted_at = Some(Utc::now());
        Ok(true)
    }

    async fn commit_order(&self, new_order: NewOrder) -> Result<Order, ServiceError> {
        let _guard = self.commit_lock.lock().await;

        if self.orders.contains_key(&new_order.order.id) {
            return Err(ServiceError::Conflict(format!(
                "Order {} already exists",
                new_order.order.id
            )));
        }

        // Lines repeating a product draw from the same stock.
        let mut requested: HashMap<&str, i64> = HashMap::new();
        for item in &new_order.items {
            let wanted = requested.entry(item.product_id.as_str()).or_insert(0);
            *wanted = wanted.saturating_add(item.quantity);
        }

        for (&product_id, &quantity) in &requested {
            let product = self.products.get(product_id).ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", product_id))
            })?;
            if product.stock < quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Product {} has {} units, {} requested",
                    product.id, product.stock, quantity
                )));
            }
        }

        for (product_id, quantity) in requested {
            if let Some(mut product) = self.products.get_mut(product_id) {
                product.stock -= quantity;
            }
        }

        let order = new_order.order.clone();
        debug!(order_id = %order.id, lines = new_order.items.len(), "order committed");
        self.orders
            .insert(order.id.clone(), (new_order.order, new_order.items));
        Ok(order)
    }

    async fn get_order(&self, id: &str) -> Result<Option<(Order, Vec<OrderItem>)>, ServiceError> {
        Ok(self.orders.get(id).map(|entry| entry.clone()))
    }
}
