pub mod affiliate;
pub mod affiliate_invitation;
pub mod checkout;
pub mod company;
pub mod coupon;
pub mod discount;
pub mod money;
pub mod order;
pub mod order_item;
pub mod product;
pub mod split;

pub use affiliate::{AffiliateStatus, Model as Affiliate};
pub use affiliate_invitation::{InvitationStatus, Model as AffiliateInvitation};
pub use checkout::{
    CheckoutItem, CheckoutPayload, CheckoutValidation, PricedItem, ValidatedCheckout,
    ValidationError, ValidationErrorCode,
};
pub use company::Model as Company;
pub use coupon::{CouponKind, DiscountType, Model as Coupon};
pub use discount::CartDiscount;
pub use order::{Model as Order, OrderStatus};
pub use order_item::Model as OrderItem;
pub use product::Model as Product;
pub use split::{AffiliateSplitData, PaymentSplit, PaymentSplitResult, SplitAllocation, SplitParty};
