pub mod affiliates;
pub mod checkout;
pub mod checkout_validation;
pub mod coupons;
pub mod invitations;
pub mod orders;
pub mod payment_split;
pub mod signature;

pub use checkout::CheckoutOrchestrator;
pub use checkout_validation::CheckoutValidator;
pub use coupons::CouponService;
pub use invitations::InvitationService;
pub use orders::OrderService;
pub use payment_split::PaymentSplitCalculator;
pub use signature::CheckoutSigner;
