//! Persistence contract for the checkout core.
//!
//! The checkout, coupon and invitation services only ever read and write
//! through [`CommerceStore`]. Two backends exist: [`InMemoryStore`] for tests
//! and single-node development, and [`SqlStore`] on top of sea-orm.

use async_trait::async_trait;

use crate::errors::ServiceError;
use crate::models::{
    Affiliate, AffiliateInvitation, Company, Coupon, InvitationStatus, Order, OrderItem, Product,
};

pub mod memory;
pub mod sql;

pub use memory::InMemoryStore;
pub use sql::SqlStore;

/// An order together with its lines, written in one atomic step.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[async_trait]
pub trait CommerceStore: Send + Sync {
    async fn get_company(&self, id: &str) -> Result<Option<Company>, ServiceError>;

    async fn get_product(&self, id: &str) -> Result<Option<Product>, ServiceError>;

    /// Coupons whose (upper-case) code equals `code`, across all companies.
    async fn find_coupons_by_code(&self, code: &str) -> Result<Vec<Coupon>, ServiceError>;

    async fn get_coupon(&self, id: &str) -> Result<Option<Coupon>, ServiceError>;

    /// Atomically increments `used_count` and returns the new value.
    async fn increment_coupon_usage(&self, id: &str) -> Result<i64, ServiceError>;

    async fn get_affiliate(&self, id: &str) -> Result<Option<Affiliate>, ServiceError>;

    async fn find_affiliates_by_user(&self, user_id: &str) -> Result<Vec<Affiliate>, ServiceError>;

    async fn affiliate_code_exists(&self, code: &str) -> Result<bool, ServiceError>;

    /// Looks up an invitation by token; the e-mail must match as well
    /// (case-insensitive).
    async fn find_invitation(
        &self,
        token: &str,
        email: &str,
    ) -> Result<Option<AffiliateInvitation>, ServiceError>;

    /// Moves the invitation from `from` to `to`. Returns `false`, writing
    /// nothing, when its current status is not `from`.
    async fn transition_invitation_status(
        &self,
        id: &str,
        from: InvitationStatus,
        to: InvitationStatus,
    ) -> Result<bool, ServiceError>;

    /// Inserts `affiliate` and moves the invitation from PENDING to ACCEPTED
    /// in one atomic step. Returns `false`, writing nothing, when the
    /// invitation was no longer PENDING.
    async fn accept_invitation(
        &self,
        invitation_id: &str,
        affiliate: Affiliate,
    ) -> Result<bool, ServiceError>;

    /// Re-checks and decrements stock for every line and inserts the order,
    /// all or nothing. Fails with [`ServiceError::InsufficientStock`] when any
    /// line can no longer be served.
    async fn commit_order(&self, order: NewOrder) -> Result<Order, ServiceError>;

    async fn get_order(&self, id: &str) -> Result<Option<(Order, Vec<OrderItem>)>, ServiceError>;
}
